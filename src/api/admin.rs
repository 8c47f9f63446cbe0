use super::helper;
use crate::errors::{AppError, FieldError};
use crate::guards::Access;
use crate::model::EventStatus;
use crate::model::catalog::{Event, Internship, NewEvent, NewInternship};
use crate::model::registration::EventRegistration;
use crate::model::workshop::{
    NewWorkshop, NewWorkshopGroup, NewWorkshopTask, Workshop, WorkshopGroup, WorkshopTask,
};
use crate::payloads::admin::{
    CreateEventPayload, CreateGroupPayload, CreateInternshipPayload, CreateTaskPayload,
    CreateWorkshopPayload, ListRegistrationsParams,
};
use crate::response::ApiResponse;
use crate::schema::{
    event_registrations::dsl as regs_dsl, events::dsl as events_dsl,
    internships::dsl as internships_dsl, workshop_groups::dsl as groups_dsl,
    workshop_tasks::dsl as tasks_dsl, workshops::dsl as workshops_dsl,
};
use crate::state::AppState;
use axum::Extension;
use axum::extract::{Path, Query, State};
use axum::response::Json;
use chrono::Utc;
use diesel::prelude::*;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

fn require_text(errors: &mut Vec<FieldError>, field: &str, value: &str) {
    if value.trim().is_empty() {
        errors.push(FieldError::new(field, "Must not be empty"));
    }
}

fn finish(errors: Vec<FieldError>) -> Result<(), AppError> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(errors))
    }
}

/// Creates an event and announces it to the live event list.
///
/// Request Body: `CreateEventPayload`
///
/// Returns (wrapped in `ApiResponse`)
/// * `Event` (201)
/// * `422 Unprocessable Entity` on empty fields or an end before the start
#[instrument(skip(state, access, payload), fields(admin_id = %access.principal.id))]
pub async fn create_event(
    State(state): State<AppState>,
    Extension(access): Extension<Access>,
    Json(payload): Json<CreateEventPayload>,
) -> Result<ApiResponse<Event>, AppError> {
    let mut errors = Vec::new();
    require_text(&mut errors, "title", &payload.title);
    require_text(&mut errors, "location", &payload.location);
    if payload.end_date < payload.start_date {
        errors.push(FieldError::new("end_date", "End date precedes start date"));
    }
    finish(errors)?;

    let new_event = NewEvent {
        title: payload.title.trim().to_string(),
        description: payload.description,
        start_date: payload.start_date,
        end_date: payload.end_date,
        location: payload.location.trim().to_string(),
        banner_url: payload.banner_url,
        status: payload.status.unwrap_or(EventStatus::Upcoming),
    };

    let event = helper::run_query(&state.pool, move |conn| {
        diesel::insert_into(events_dsl::events)
            .values(&new_event)
            .returning(Event::as_returning())
            .get_result::<Event>(conn)
    })
    .await?;

    info!("Created event {} ('{}')", event.id, event.title);
    state.catalog.events.write().await.apply_insert(event.clone());
    Ok(ApiResponse::created(event))
}

/// Creates an internship and announces it to the live internship list.
///
/// Request Body: `CreateInternshipPayload`
///
/// Returns (wrapped in `ApiResponse`)
/// * `Internship` (201)
#[instrument(skip(state, access, payload), fields(admin_id = %access.principal.id))]
pub async fn create_internship(
    State(state): State<AppState>,
    Extension(access): Extension<Access>,
    Json(payload): Json<CreateInternshipPayload>,
) -> Result<ApiResponse<Internship>, AppError> {
    let mut errors = Vec::new();
    require_text(&mut errors, "title", &payload.title);
    require_text(&mut errors, "company", &payload.company);
    require_text(&mut errors, "duration", &payload.duration);
    finish(errors)?;

    let new_internship = NewInternship {
        title: payload.title.trim().to_string(),
        company: payload.company.trim().to_string(),
        duration: payload.duration.trim().to_string(),
        description: payload.description,
        location: payload.location,
    };

    let internship = helper::run_query(&state.pool, move |conn| {
        diesel::insert_into(internships_dsl::internships)
            .values(&new_internship)
            .returning(Internship::as_returning())
            .get_result::<Internship>(conn)
    })
    .await?;

    info!("Created internship {} at {}", internship.id, internship.company);
    state
        .catalog
        .internships
        .write()
        .await
        .apply_insert(internship.clone());
    Ok(ApiResponse::created(internship))
}

#[instrument(skip(state, access, payload), fields(admin_id = %access.principal.id))]
pub async fn create_workshop(
    State(state): State<AppState>,
    Extension(access): Extension<Access>,
    Json(payload): Json<CreateWorkshopPayload>,
) -> Result<ApiResponse<Workshop>, AppError> {
    let mut errors = Vec::new();
    require_text(&mut errors, "title", &payload.title);
    if payload.end_date < payload.start_date {
        errors.push(FieldError::new("end_date", "End date precedes start date"));
    }
    finish(errors)?;

    let new_workshop = NewWorkshop {
        title: payload.title.trim().to_string(),
        description: payload.description,
        start_date: payload.start_date,
        end_date: payload.end_date,
    };

    let workshop = helper::run_query(&state.pool, move |conn| {
        diesel::insert_into(workshops_dsl::workshops)
            .values(&new_workshop)
            .returning(Workshop::as_returning())
            .get_result::<Workshop>(conn)
    })
    .await?;

    info!("Created workshop {} ('{}')", workshop.id, workshop.title);
    Ok(ApiResponse::created(workshop))
}

/// Adds a task to a workshop. Tasks start inactive.
///
/// Request Body: `CreateTaskPayload`
///
/// Returns (wrapped in `ApiResponse`)
/// * `WorkshopTask` (201)
/// * `404 Not Found` if the workshop does not exist
/// * `409 Conflict` if the position is taken
#[instrument(skip(state, access, payload), fields(admin_id = %access.principal.id))]
pub async fn create_task(
    State(state): State<AppState>,
    Extension(access): Extension<Access>,
    Path(workshop_id): Path<Uuid>,
    Json(payload): Json<CreateTaskPayload>,
) -> Result<ApiResponse<WorkshopTask>, AppError> {
    let mut errors = Vec::new();
    require_text(&mut errors, "title", &payload.title);
    if payload.points <= 0 {
        errors.push(FieldError::new("points", "Points must be positive"));
    }
    if payload.timer_minutes.is_some_and(|minutes| minutes <= 0) {
        errors.push(FieldError::new("timer_minutes", "Timer must be positive"));
    }
    finish(errors)?;

    let position = payload.position;
    let new_task = NewWorkshopTask {
        workshop_id,
        position,
        title: payload.title.trim().to_string(),
        description: payload.description,
        points: payload.points,
        timer_minutes: payload.timer_minutes,
    };

    let task = helper::run_query(&state.pool, move |conn| {
        diesel::insert_into(tasks_dsl::workshop_tasks)
            .values(&new_task)
            .returning(WorkshopTask::as_returning())
            .get_result::<WorkshopTask>(conn)
    })
    .await
    .map_err(|e| {
        helper::map_insert_error(
            e,
            || format!("Workshop {} already has a task at position {}.", workshop_id, position),
            || format!("Workshop with ID {} not found.", workshop_id),
        )
    })?;

    info!("Added task {} to workshop {}", task.id, workshop_id);
    Ok(ApiResponse::created(task))
}

/// Forms a group in a workshop. The leader is not repeated among members.
///
/// Request Body: `CreateGroupPayload`
///
/// Returns (wrapped in `ApiResponse`)
/// * `WorkshopGroup` (201)
/// * `404 Not Found` if the workshop does not exist
#[instrument(skip(state, access, payload), fields(admin_id = %access.principal.id))]
pub async fn create_group(
    State(state): State<AppState>,
    Extension(access): Extension<Access>,
    Path(workshop_id): Path<Uuid>,
    Json(payload): Json<CreateGroupPayload>,
) -> Result<ApiResponse<WorkshopGroup>, AppError> {
    let mut errors = Vec::new();
    require_text(&mut errors, "name", &payload.name);
    finish(errors)?;

    let leader_id = payload.leader_id;
    let mut member_ids: Vec<Uuid> = Vec::with_capacity(payload.member_ids.len());
    for member in payload.member_ids {
        if member != leader_id && !member_ids.contains(&member) {
            member_ids.push(member);
        }
    }

    let new_group = NewWorkshopGroup {
        workshop_id,
        name: payload.name.trim().to_string(),
        leader_id,
        member_ids,
    };

    let group = helper::run_query(&state.pool, move |conn| {
        diesel::insert_into(groups_dsl::workshop_groups)
            .values(&new_group)
            .returning(WorkshopGroup::as_returning())
            .get_result::<WorkshopGroup>(conn)
    })
    .await
    .map_err(|e| {
        helper::map_insert_error(
            e,
            || "A group with this name already exists.".to_string(),
            || format!("Workshop with ID {} not found.", workshop_id),
        )
    })?;

    info!(
        "Created group {} in workshop {} with {} member(s)",
        group.id,
        workshop_id,
        group.member_ids.len() + 1
    );
    Ok(ApiResponse::created(group))
}

/// Opens a task to groups and starts its timer now. Activating an already
/// active task restarts the timer.
///
/// Returns (wrapped in `ApiResponse`)
/// * `WorkshopTask` (200)
/// * `404 Not Found` if the task does not exist
#[instrument(skip(state, access), fields(admin_id = %access.principal.id))]
pub async fn activate_task(
    State(state): State<AppState>,
    Extension(access): Extension<Access>,
    Path(task_id): Path<Uuid>,
) -> Result<ApiResponse<WorkshopTask>, AppError> {
    let now = Utc::now();
    let task = helper::run_query(&state.pool, move |conn| {
        diesel::update(tasks_dsl::workshop_tasks.find(task_id))
            .set((
                tasks_dsl::is_active.eq(true),
                tasks_dsl::activated_at.eq(Some(now)),
            ))
            .returning(WorkshopTask::as_returning())
            .get_result::<WorkshopTask>(conn)
            .optional()
    })
    .await?
    .ok_or_else(|| {
        warn!("Activation of unknown task {}", task_id);
        AppError::NotFound(format!("Task with ID {} not found.", task_id))
    })?;

    info!("Activated task {} at {}", task.id, now);
    Ok(ApiResponse::ok(task))
}

/// Registrations, newest first, optionally for one event.
///
/// Returns (wrapped in `ApiResponse`)
/// * `Vec<EventRegistration>` (200)
#[instrument(skip(state, access), fields(admin_id = %access.principal.id))]
pub async fn list_registrations(
    State(state): State<AppState>,
    Extension(access): Extension<Access>,
    Query(params): Query<ListRegistrationsParams>,
) -> Result<ApiResponse<Vec<EventRegistration>>, AppError> {
    let registrations = helper::run_query(&state.pool, move |conn| {
        let mut query = regs_dsl::event_registrations
            .select(EventRegistration::as_select())
            .order(regs_dsl::created_at.desc())
            .into_boxed();
        if let Some(event_id) = params.event_id {
            query = query.filter(regs_dsl::event_id.eq(event_id));
        }
        query.load::<EventRegistration>(conn)
    })
    .await?;

    debug!("Returning {} registration(s)", registrations.len());
    Ok(ApiResponse::ok(registrations))
}
