use super::helper;
use crate::errors::AppError;
use crate::model::catalog::{NewInternshipApplication, NewUserCourse};
use crate::model::{ApplicationStatus, EnrollmentStatus};
use crate::payloads::actions::{
    ApplyInternshipPayload, CompleteActionPayload, EnrollCoursePayload, ExecuteActionPayload,
};
use crate::pending::{ActionKind, DispatchTable, PendingStatus, ProtectedOutcome, ReplayReport};
use crate::registration::{PgRegistrationSink, RegistrationForm, RegistrationPipeline};
use crate::response::ApiResponse;
use crate::schema::{
    internship_applications::dsl as apps_dsl, user_courses::dsl as enrollments_dsl,
};
use crate::session::Principal;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::response::Json;
use chrono::Utc;
use diesel::prelude::*;
use serde::de::DeserializeOwned;
use serde_json::{Value as JsonValue, json};
use tracing::{info, instrument};
use uuid::Uuid;

fn parse_payload<T: DeserializeOwned>(kind: ActionKind, payload: JsonValue) -> Result<T, AppError> {
    serde_json::from_value(payload)
        .map_err(|e| AppError::BadRequest(format!("Invalid payload for {:?}: {}", kind, e)))
}

async fn register_event(
    state: AppState,
    principal: Principal,
    payload: JsonValue,
) -> Result<JsonValue, AppError> {
    let form: RegistrationForm = parse_payload(ActionKind::RegisterEvent, payload)?;
    let sink = PgRegistrationSink::new(state.pool.clone());
    let pipeline = RegistrationPipeline::new(state.storage.as_ref(), &sink);
    let submitted = pipeline
        .submit(Some(principal), form, Vec::new(), Utc::now())
        .await?;
    Ok(serde_json::to_value(submitted)?)
}

async fn apply_internship(
    state: AppState,
    principal: Principal,
    payload: JsonValue,
) -> Result<JsonValue, AppError> {
    let payload: ApplyInternshipPayload = parse_payload(ActionKind::ApplyInternship, payload)?;
    let internship_id = payload.internship_id;
    let application = NewInternshipApplication {
        internship_id,
        user_id: principal.id,
        status: ApplicationStatus::Applied,
    };

    let application_id = helper::run_query(&state.pool, move |conn| {
        diesel::insert_into(apps_dsl::internship_applications)
            .values(&application)
            .returning(apps_dsl::id)
            .get_result::<Uuid>(conn)
    })
    .await
    .map_err(|e| {
        helper::map_insert_error(
            e,
            || "You have already applied for this internship.".to_string(),
            || format!("Internship with ID {} not found.", internship_id),
        )
    })?;

    info!(
        "User {} applied for internship {} (application {})",
        principal.id, internship_id, application_id
    );
    Ok(json!({ "application_id": application_id }))
}

async fn enroll_course(
    state: AppState,
    principal: Principal,
    payload: JsonValue,
) -> Result<JsonValue, AppError> {
    let payload: EnrollCoursePayload = parse_payload(ActionKind::EnrollCourse, payload)?;
    let course_id = payload.course_id;
    let enrollment = NewUserCourse {
        user_id: principal.id,
        course_id,
        status: EnrollmentStatus::Enrolled,
    };

    let enrollment_id = helper::run_query(&state.pool, move |conn| {
        diesel::insert_into(enrollments_dsl::user_courses)
            .values(&enrollment)
            .returning(enrollments_dsl::id)
            .get_result::<Uuid>(conn)
    })
    .await
    .map_err(|e| {
        helper::map_insert_error(
            e,
            || "You are already enrolled in this course.".to_string(),
            || format!("Course with ID {} not found.", course_id),
        )
    })?;

    info!(
        "User {} enrolled in course {} (enrollment {})",
        principal.id, course_id, enrollment_id
    );
    Ok(json!({ "enrollment_id": enrollment_id }))
}

/// The protected actions the portal can defer until sign-in.
pub fn dispatch_table(state: &AppState) -> DispatchTable {
    let (s1, s2, s3) = (state.clone(), state.clone(), state.clone());
    DispatchTable::new()
        .on(ActionKind::RegisterEvent, move |principal, payload| {
            register_event(s1.clone(), principal, payload)
        })
        .on(ActionKind::ApplyInternship, move |principal, payload| {
            apply_internship(s2.clone(), principal, payload)
        })
        .on(ActionKind::EnrollCourse, move |principal, payload| {
            enroll_course(s3.clone(), principal, payload)
        })
}

/// Runs a protected action, or defers it until the caller signs in.
///
/// Request Body: `ExecuteActionPayload`
///
/// Returns (wrapped in `ApiResponse`)
/// * `ProtectedOutcome::Completed` with the action result (200)
/// * `ProtectedOutcome::Deferred` when no one is signed in (202)
/// * the action's own error when it runs and fails
#[instrument(skip(state, principal, payload), fields(client_id = %payload.client_id, kind = ?payload.kind))]
pub async fn execute_action(
    State(state): State<AppState>,
    principal: Option<Principal>,
    Json(payload): Json<ExecuteActionPayload>,
) -> Result<ApiResponse<ProtectedOutcome>, AppError> {
    let table = dispatch_table(&state);
    let kind = payload.kind;

    let outcome = state
        .pending
        .execute_protected_action(
            payload.client_id,
            principal,
            kind,
            payload.payload,
            move |principal, body| async move { table.dispatch(kind, principal, body).await },
        )
        .await?;

    Ok(match outcome {
        deferred @ ProtectedOutcome::Deferred { .. } => ApiResponse::with_message(
            axum::http::StatusCode::ACCEPTED,
            "Sign in to continue",
            deferred,
        ),
        completed => ApiResponse::ok(completed),
    })
}

/// Replays the client's deferred action after sign-in. The action is
/// cleared before it runs, so calling this twice runs it at most once.
///
/// Request Body: `CompleteActionPayload`
///
/// Returns (wrapped in `ApiResponse`)
/// * `ReplayReport` (200), also when nothing was pending
/// * `401 Unauthorized` when not signed in
#[instrument(skip(state, payload), fields(client_id = %payload.client_id))]
pub async fn complete_action(
    State(state): State<AppState>,
    principal: Principal,
    Json(payload): Json<CompleteActionPayload>,
) -> Result<ApiResponse<ReplayReport>, AppError> {
    let table = dispatch_table(&state);
    let report = state
        .pending
        .complete_pending_action(payload.client_id, principal, &table)
        .await?;
    Ok(ApiResponse::ok(report))
}

/// Reports whether the client has an action waiting for sign-in, so the
/// front-end knows to call `/actions/complete` after signing in.
///
/// Returns (wrapped in `ApiResponse`)
/// * `PendingStatus` (200)
#[instrument(skip(state))]
pub async fn get_pending_action(
    State(state): State<AppState>,
    Path(client_id): Path<Uuid>,
) -> Result<ApiResponse<PendingStatus>, AppError> {
    Ok(ApiResponse::ok(state.pending.pending(client_id).await?))
}
