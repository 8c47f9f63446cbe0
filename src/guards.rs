//! Route guards deciding whether a caller may reach a protected area.
//!
//! The judge and admin guards share [`resolve_access`], parameterised by a
//! [`GuardPolicy`]. Rejections are redirects, never errors; every redirect is
//! emitted as a structured event on the `access` target.

use crate::model::AppRole;
use crate::response::ApiResponse;
use crate::roles::RoleDirectory;
use crate::session::{Principal, SessionHandle, SessionState, SessionStore};
use crate::state::AppState;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const HOME: &str = "/";
pub const STUDENT_DASHBOARD: &str = "/dashboard/student";
pub const JUDGE_DASHBOARD: &str = "/dashboard/judge";
pub const ADMIN_HOME: &str = "/admin";

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GuardKind {
    Authenticated,
    Judge,
    Admin,
}

/// Where to send a rejected principal, by the role they turned out to hold.
#[derive(Debug, Clone, Copy)]
pub struct RedirectMap {
    pub by_role: &'static [(AppRole, &'static str)],
    pub otherwise: &'static str,
}

impl RedirectMap {
    pub fn target(&self, role: Option<AppRole>) -> &'static str {
        role.and_then(|role| {
            self.by_role
                .iter()
                .find(|(candidate, _)| *candidate == role)
                .map(|(_, target)| *target)
        })
        .unwrap_or(self.otherwise)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct GuardPolicy {
    pub kind: GuardKind,
    pub accepted: &'static [AppRole],
    pub anonymous_redirect: &'static str,
    /// Used when the session already carries a resolved role.
    pub cached_redirects: RedirectMap,
    /// Used after the direct role-table fallback misses.
    pub fallback_redirects: RedirectMap,
    /// Used when a role read fails.
    pub failure_redirect: &'static str,
}

pub const JUDGE_POLICY: GuardPolicy = GuardPolicy {
    kind: GuardKind::Judge,
    accepted: &[AppRole::Judge],
    anonymous_redirect: HOME,
    cached_redirects: RedirectMap {
        by_role: &[(AppRole::Admin, ADMIN_HOME), (AppRole::Superadmin, ADMIN_HOME)],
        otherwise: STUDENT_DASHBOARD,
    },
    fallback_redirects: RedirectMap {
        by_role: &[(AppRole::Admin, ADMIN_HOME), (AppRole::Superadmin, ADMIN_HOME)],
        otherwise: STUDENT_DASHBOARD,
    },
    failure_redirect: STUDENT_DASHBOARD,
};

// The fallback branch sends every non-admin to the student dashboard, judges included.
pub const ADMIN_POLICY: GuardPolicy = GuardPolicy {
    kind: GuardKind::Admin,
    accepted: &[AppRole::Admin, AppRole::Superadmin],
    anonymous_redirect: HOME,
    cached_redirects: RedirectMap {
        by_role: &[(AppRole::Judge, JUDGE_DASHBOARD)],
        otherwise: STUDENT_DASHBOARD,
    },
    fallback_redirects: RedirectMap {
        by_role: &[],
        otherwise: STUDENT_DASHBOARD,
    },
    failure_redirect: STUDENT_DASHBOARD,
};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum GuardOutcome {
    Authorized {
        principal: Principal,
        role: Option<AppRole>,
    },
    /// Shown inline; dismissing the prompt navigates to `dismiss_redirect`.
    SignInRequired { dismiss_redirect: String },
    Redirect { to: String },
}

/// Request extension inserted for handlers behind a guard.
#[derive(Debug, Clone, Copy)]
pub struct Access {
    pub principal: Principal,
    pub role: Option<AppRole>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GuardState {
    Unauthorized,
    Authorized,
}

/// JSON form of a guard decision for the front-end's route rendering.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AccessDecision {
    pub guard: GuardKind,
    pub state: GuardState,
    pub role: Option<AppRole>,
    pub redirect_to: Option<String>,
    pub sign_in_prompt: bool,
}

impl AccessDecision {
    pub fn new(guard: GuardKind, outcome: &GuardOutcome) -> Self {
        match outcome {
            GuardOutcome::Authorized { role, .. } => AccessDecision {
                guard,
                state: GuardState::Authorized,
                role: *role,
                redirect_to: None,
                sign_in_prompt: false,
            },
            GuardOutcome::SignInRequired { dismiss_redirect } => AccessDecision {
                guard,
                state: GuardState::Unauthorized,
                role: None,
                redirect_to: Some(dismiss_redirect.clone()),
                sign_in_prompt: true,
            },
            GuardOutcome::Redirect { to } => AccessDecision {
                guard,
                state: GuardState::Unauthorized,
                role: None,
                redirect_to: Some(to.clone()),
                sign_in_prompt: false,
            },
        }
    }
}

/// Generic guard: any principal passes, the role is not consulted.
pub async fn check_authenticated(session: &SessionStore, grace: Duration) -> GuardOutcome {
    match session.wait_until_hydrated(grace).await {
        SessionState::Authenticated { principal, .. } => GuardOutcome::Authorized {
            principal,
            role: session.state().cached_role(),
        },
        _ => {
            info!(
                target: "access",
                guard = ?GuardKind::Authenticated,
                "no session after grace window, prompting sign-in"
            );
            GuardOutcome::SignInRequired {
                dismiss_redirect: HOME.to_string(),
            }
        }
    }
}

/// Role guard shared by the judge and admin areas.
///
/// A resolved role on the session decides immediately. Otherwise the role
/// table is read scoped to the accepted set; on a miss the unscoped role is
/// read to pick the redirect. Read failures count as "not accepted".
pub async fn resolve_access(
    policy: &GuardPolicy,
    session: &SessionState,
    directory: &dyn RoleDirectory,
) -> GuardOutcome {
    let Some(principal) = session.principal() else {
        return redirect(policy, None, None, policy.anonymous_redirect);
    };

    if let Some(role) = session.cached_role() {
        return if policy.accepted.contains(&role) {
            GuardOutcome::Authorized {
                principal,
                role: Some(role),
            }
        } else {
            redirect(
                policy,
                Some(principal),
                Some(role),
                policy.cached_redirects.target(Some(role)),
            )
        };
    }

    debug!(
        "No cached role for {}, querying role table for {:?}",
        principal.id, policy.accepted
    );
    match directory.find_role_in(principal.id, policy.accepted).await {
        Ok(Some(role)) => GuardOutcome::Authorized {
            principal,
            role: Some(role),
        },
        Ok(None) if policy.fallback_redirects.by_role.is_empty() => redirect(
            policy,
            Some(principal),
            None,
            policy.fallback_redirects.otherwise,
        ),
        Ok(None) => match directory.primary_role(principal.id).await {
            Ok(role) => redirect(
                policy,
                Some(principal),
                role,
                policy.fallback_redirects.target(role),
            ),
            Err(e) => {
                warn!(
                    target: "access",
                    guard = ?policy.kind,
                    user_id = %principal.id,
                    error = %e,
                    "role lookup failed, treating as not authorized"
                );
                redirect(policy, Some(principal), None, policy.failure_redirect)
            }
        },
        Err(e) => {
            warn!(
                target: "access",
                guard = ?policy.kind,
                user_id = %principal.id,
                error = %e,
                "role lookup failed, treating as not authorized"
            );
            redirect(policy, Some(principal), None, policy.failure_redirect)
        }
    }
}

fn redirect(
    policy: &GuardPolicy,
    principal: Option<Principal>,
    role: Option<AppRole>,
    target: &'static str,
) -> GuardOutcome {
    info!(
        target: "access",
        guard = ?policy.kind,
        user_id = ?principal.map(|p| p.id),
        role = ?role,
        redirect_to = target,
        "access redirected"
    );
    GuardOutcome::Redirect {
        to: target.to_string(),
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SignInPrompt {
    pub sign_in_required: bool,
    pub dismiss_redirect: String,
}

fn session_of(req: &Request) -> SessionHandle {
    req.extensions()
        .get::<SessionHandle>()
        .cloned()
        .unwrap_or_else(|| {
            let store = SessionStore::new();
            store.hydrate(None);
            Arc::new(store)
        })
}

async fn admit_or_reject(mut req: Request, next: Next, outcome: GuardOutcome) -> Response {
    match outcome {
        GuardOutcome::Authorized { principal, role } => {
            req.extensions_mut().insert(Access { principal, role });
            next.run(req).await
        }
        GuardOutcome::SignInRequired { dismiss_redirect } => (
            StatusCode::UNAUTHORIZED,
            ApiResponse::with_message(
                StatusCode::UNAUTHORIZED,
                "Authentication Required",
                SignInPrompt {
                    sign_in_required: true,
                    dismiss_redirect,
                },
            ),
        )
            .into_response(),
        GuardOutcome::Redirect { to } => Redirect::to(&to).into_response(),
    }
}

pub async fn require_authenticated(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    let session = session_of(&req);
    let outcome = check_authenticated(&session, state.settings.session_grace).await;
    admit_or_reject(req, next, outcome).await
}

pub async fn require_judge(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let session = session_of(&req);
    let outcome = resolve_access(&JUDGE_POLICY, &session.state(), state.roles.as_ref()).await;
    admit_or_reject(req, next, outcome).await
}

pub async fn require_admin(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let session = session_of(&req);
    let outcome = resolve_access(&ADMIN_POLICY, &session.state(), state.roles.as_ref()).await;
    admit_or_reject(req, next, outcome).await
}
