use crate::errors::AppError;
use crate::guards::{
    ADMIN_POLICY, AccessDecision, GuardKind, JUDGE_POLICY, check_authenticated, resolve_access,
};
use crate::response::ApiResponse;
use crate::session::{SessionHandle, SessionSnapshot};
use crate::state::AppState;
use axum::Extension;
use axum::extract::{Path, State};
use tracing::{debug, info, instrument, warn};

/// Reports who is signed in and with which role.
///
/// The role is resolved with a single read of the role table. A failed read
/// leaves the role unset rather than failing the request.
///
/// Returns (wrapped in `ApiResponse`)
/// * `SessionSnapshot` (200)
#[instrument(skip(state, session))]
pub async fn get_session(
    State(state): State<AppState>,
    Extension(session): Extension<SessionHandle>,
) -> Result<ApiResponse<SessionSnapshot>, AppError> {
    if let Some(principal) = session.state().principal() {
        match session.resolve_role(state.roles.as_ref()).await {
            Ok(role) => debug!("Session for {} resolved to role {:?}", principal.id, role),
            Err(e) => {
                warn!("Role lookup failed for {}: {}", principal.id, e);
                session.role_resolved(None);
            }
        }
    }

    Ok(ApiResponse::ok(session.snapshot()))
}

/// Runs the guard of an area (`student`, `judge` or `admin`) for the caller
/// and reports the decision without redirecting.
///
/// Returns (wrapped in `ApiResponse`)
/// * `AccessDecision` (200)
/// * `404 Not Found` for an unknown area
#[instrument(skip(state, session))]
pub async fn get_access(
    State(state): State<AppState>,
    Extension(session): Extension<SessionHandle>,
    Path(area): Path<String>,
) -> Result<ApiResponse<AccessDecision>, AppError> {
    let (kind, outcome) = match area.as_str() {
        "student" => (
            GuardKind::Authenticated,
            check_authenticated(&session, state.settings.session_grace).await,
        ),
        "judge" => (
            GuardKind::Judge,
            resolve_access(&JUDGE_POLICY, &session.state(), state.roles.as_ref()).await,
        ),
        "admin" => (
            GuardKind::Admin,
            resolve_access(&ADMIN_POLICY, &session.state(), state.roles.as_ref()).await,
        ),
        other => {
            return Err(AppError::NotFound(format!("Unknown area '{}'", other)));
        }
    };

    let decision = AccessDecision::new(kind, &outcome);
    info!("Access check for {} area: {:?}", area, decision.state);
    Ok(ApiResponse::ok(decision))
}
