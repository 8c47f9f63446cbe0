use crate::errors::AppError;
use crate::model::catalog::{Event, EventAction};
use crate::schema::events::dsl as events_dsl;
use deadpool_diesel::postgres::Pool;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use tracing::{debug, error, warn};
use uuid::Uuid;

pub(crate) async fn run_query<T, F>(pool: &Pool, query: F) -> Result<T, AppError>
where
    F: FnOnce(&mut diesel::PgConnection) -> Result<T, diesel::result::Error> + Send + 'static,
    T: Send + 'static,
{
    let conn = pool.get().await.map_err(|pool_err| {
        error!(
            "Failed to get DB connection object from pool: {:?}",
            pool_err
        );
        AppError::PoolError(pool_err)
    })?;
    debug!("DB connection object obtained from pool for interaction");

    let res = conn.interact(query).await;

    match res {
        Ok(Ok(result)) => Ok(result),
        Ok(Err(diesel_err)) => {
            error!("Diesel query failed within interaction: {:?}", diesel_err);
            Err(AppError::DieselError(diesel_err))
        }
        Err(interact_err) => {
            error!("Deadpool interact error: {:?}", interact_err);
            Err(AppError::InteractError(interact_err))
        }
    }
}

/// Turns unique and foreign key violations of an insert into client errors.
pub(crate) fn map_insert_error(
    err: AppError,
    on_conflict: impl FnOnce() -> String,
    on_missing: impl FnOnce() -> String,
) -> AppError {
    match err {
        AppError::DieselError(DieselError::DatabaseError(kind, info)) => match kind {
            DatabaseErrorKind::UniqueViolation => {
                warn!("Insert rejected by unique constraint: {}", info.message());
                AppError::Conflict(on_conflict())
            }
            DatabaseErrorKind::ForeignKeyViolation => {
                warn!("Insert rejected by foreign key: {}", info.message());
                AppError::NotFound(on_missing())
            }
            other => AppError::DieselError(DieselError::DatabaseError(other, info)),
        },
        other => other,
    }
}

/// Registration is only open while an event is upcoming.
pub(crate) async fn ensure_event_open(pool: &Pool, event_id: Uuid) -> Result<Event, AppError> {
    let event = run_query(pool, move |conn| {
        events_dsl::events
            .find(event_id)
            .select(Event::as_select())
            .first::<Event>(conn)
            .optional()
    })
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Event with ID {} not found.", event_id)))?;

    if EventAction::from(event.status) != EventAction::Register {
        warn!(
            "Registration attempted for event {} in status {}",
            event_id, event.status
        );
        return Err(AppError::Conflict(format!(
            "Registration for '{}' is closed.",
            event.title
        )));
    }
    Ok(event)
}
