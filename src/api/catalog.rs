use super::helper;
use crate::errors::AppError;
use crate::model::catalog::{Course, Event, Internship};
use crate::response::ApiResponse;
use crate::schema::{
    courses::dsl as courses_dsl, events::dsl as events_dsl, internships::dsl as internships_dsl,
};
use crate::state::AppState;
use axum::extract::State;
use diesel::prelude::*;
use tracing::{debug, info, instrument};

/// Lists all events, newest start date first.
///
/// The first call hydrates the in-memory list from the database; later calls
/// serve that list, which admin inserts keep current (new rows first).
///
/// Returns (wrapped in `ApiResponse`)
/// * `Vec<Event>` (200)
#[instrument(skip(state))]
pub async fn list_events(
    State(state): State<AppState>,
) -> Result<ApiResponse<Vec<Event>>, AppError> {
    {
        let events = state.catalog.events.read().await;
        if events.is_hydrated() {
            debug!("Serving {} cached events", events.items().len());
            return Ok(ApiResponse::ok(events.items().to_vec()));
        }
    }

    info!("Fetching events");
    let fetched = helper::run_query(&state.pool, |conn| {
        events_dsl::events
            .order(events_dsl::start_date.desc())
            .select(Event::as_select())
            .load::<Event>(conn)
    })
    .await?;

    let mut events = state.catalog.events.write().await;
    events.replace_with_fetch(fetched);
    debug!("Serving {} events", events.items().len());
    Ok(ApiResponse::ok(events.items().to_vec()))
}

/// Lists all internships, newest first. Served like the event list.
///
/// Returns (wrapped in `ApiResponse`)
/// * `Vec<Internship>` (200)
#[instrument(skip(state))]
pub async fn list_internships(
    State(state): State<AppState>,
) -> Result<ApiResponse<Vec<Internship>>, AppError> {
    {
        let internships = state.catalog.internships.read().await;
        if internships.is_hydrated() {
            return Ok(ApiResponse::ok(internships.items().to_vec()));
        }
    }

    info!("Fetching internships");
    let fetched = helper::run_query(&state.pool, |conn| {
        internships_dsl::internships
            .order(internships_dsl::created_at.desc())
            .select(Internship::as_select())
            .load::<Internship>(conn)
    })
    .await?;

    let mut internships = state.catalog.internships.write().await;
    internships.replace_with_fetch(fetched);
    Ok(ApiResponse::ok(internships.items().to_vec()))
}

#[instrument(skip(state))]
pub async fn list_courses(
    State(state): State<AppState>,
) -> Result<ApiResponse<Vec<Course>>, AppError> {
    let courses = helper::run_query(&state.pool, |conn| {
        courses_dsl::courses
            .order(courses_dsl::title.asc())
            .select(Course::as_select())
            .load::<Course>(conn)
    })
    .await?;
    Ok(ApiResponse::ok(courses))
}
