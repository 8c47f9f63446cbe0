//! Session bootstrap: who is calling and, once resolved, with which role.
//!
//! The session is an explicit state machine published over a `watch`
//! channel so that guards can wait for hydration instead of polling flags.

use crate::errors::AppError;
use crate::model::AppRole;
use crate::roles::RoleDirectory;
use axum::extract::{FromRequestParts, OptionalFromRequestParts, Request};
use axum::http::Extensions;
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::Response;
use axum_keycloak_auth::KeycloakAuthStatus;
use axum_keycloak_auth::decode::ProfileAndEmail;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

/// Header the test router reads the caller id from.
pub const TEST_PRINCIPAL_HEADER: &str = "x-test-user-id";

/// An authenticated end-user identity issued by the identity provider.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Principal {
    pub id: Uuid,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(tag = "state", content = "role", rename_all = "snake_case")]
pub enum RoleStatus {
    Resolving,
    Resolved(Option<AppRole>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Loading,
    Anonymous,
    Authenticated {
        principal: Principal,
        role: RoleStatus,
    },
}

impl SessionState {
    pub fn principal(&self) -> Option<Principal> {
        match self {
            SessionState::Authenticated { principal, .. } => Some(*principal),
            _ => None,
        }
    }

    /// The role, when it has been resolved to an actual role row.
    pub fn cached_role(&self) -> Option<AppRole> {
        match self {
            SessionState::Authenticated {
                role: RoleStatus::Resolved(role),
                ..
            } => *role,
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, SessionState::Loading)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Loading,
    Ready,
}

/// What `GET /session` reports to the front-end.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub status: SessionStatus,
    pub principal: Option<Principal>,
    pub role: Option<AppRole>,
    pub is_loading_role: bool,
}

impl From<SessionState> for SessionSnapshot {
    fn from(state: SessionState) -> Self {
        match state {
            SessionState::Loading => SessionSnapshot {
                status: SessionStatus::Loading,
                principal: None,
                role: None,
                is_loading_role: true,
            },
            SessionState::Anonymous => SessionSnapshot {
                status: SessionStatus::Ready,
                principal: None,
                role: None,
                is_loading_role: false,
            },
            SessionState::Authenticated { principal, role } => SessionSnapshot {
                status: SessionStatus::Ready,
                principal: Some(principal),
                role: match role {
                    RoleStatus::Resolved(role) => role,
                    RoleStatus::Resolving => None,
                },
                is_loading_role: role == RoleStatus::Resolving,
            },
        }
    }
}

pub struct SessionStore {
    tx: watch::Sender<SessionState>,
}

pub type SessionHandle = Arc<SessionStore>;

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(SessionState::Loading);
        Self { tx }
    }

    pub fn state(&self) -> SessionState {
        *self.tx.borrow()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state().into()
    }

    /// Settles the initial `Loading` state from what the identity provider reported.
    pub fn hydrate(&self, principal: Option<Principal>) {
        match principal {
            Some(principal) => self.sign_in(principal),
            None => self.sign_out(),
        }
    }

    pub fn sign_in(&self, principal: Principal) {
        debug!("Session established for user {}", principal.id);
        self.tx.send_replace(SessionState::Authenticated {
            principal,
            role: RoleStatus::Resolving,
        });
    }

    pub fn sign_out(&self) {
        self.tx.send_replace(SessionState::Anonymous);
    }

    /// Records the resolved role. Ignored unless a principal is signed in.
    pub fn role_resolved(&self, resolved: Option<AppRole>) -> bool {
        self.tx.send_if_modified(|state| match state {
            SessionState::Authenticated { role, .. } => {
                *role = RoleStatus::Resolved(resolved);
                true
            }
            _ => false,
        })
    }

    /// Waits up to `grace` for the session to leave `Loading` and returns
    /// whatever state it is in at that point.
    pub async fn wait_until_hydrated(&self, grace: Duration) -> SessionState {
        let mut rx = self.tx.subscribe();
        let settled = tokio::time::timeout(grace, async {
            rx.wait_for(|state| !state.is_loading())
                .await
                .map(|state| *state)
        })
        .await;

        match settled {
            Ok(Ok(state)) => state,
            _ => self.state(),
        }
    }

    /// Resolves the signed-in principal's role with a single directory read.
    #[instrument(skip(self, directory))]
    pub async fn resolve_role(
        &self,
        directory: &dyn RoleDirectory,
    ) -> Result<Option<AppRole>, AppError> {
        let Some(principal) = self.state().principal() else {
            return Ok(None);
        };
        let role = directory.primary_role(principal.id).await?;
        self.role_resolved(role);
        Ok(role)
    }
}

/// Identity status the pass-through Keycloak layer attaches to each request.
pub type KeycloakStatus = KeycloakAuthStatus<String, ProfileAndEmail>;

/// Reads the [`Principal`] out of the Keycloak status on a request, if the
/// token was verified and its subject is a user id.
pub fn principal_from_status(extensions: &Extensions) -> Option<Principal> {
    match extensions.get::<KeycloakStatus>()? {
        KeycloakAuthStatus::Success(token) => match Uuid::parse_str(&token.subject) {
            Ok(id) => Some(Principal { id }),
            Err(e) => {
                warn!("Token subject '{}' is not a user id: {}", token.subject, e);
                None
            }
        },
        KeycloakAuthStatus::Failure(e) => {
            debug!("Token rejected, continuing anonymously: {}", e);
            None
        }
    }
}

/// Converts a verified identity-provider token into a [`Principal`] extension.
/// A missing or rejected token leaves the request anonymous.
pub async fn principal_from_keycloak(mut req: Request, next: Next) -> Response {
    if let Some(principal) = principal_from_status(req.extensions()) {
        req.extensions_mut().insert(principal);
    }
    next.run(req).await
}

/// Test-only identity source: trusts the [`TEST_PRINCIPAL_HEADER`] header.
pub async fn principal_from_test_header(mut req: Request, next: Next) -> Response {
    let principal = req
        .headers()
        .get(TEST_PRINCIPAL_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| Uuid::parse_str(v).ok())
        .map(|id| Principal { id });

    if let Some(principal) = principal {
        req.extensions_mut().insert(principal);
    }
    next.run(req).await
}

/// Creates the request's session from the principal extension, if any.
pub async fn establish_session(mut req: Request, next: Next) -> Response {
    let store = SessionStore::new();
    store.hydrate(req.extensions().get::<Principal>().copied());
    req.extensions_mut().insert::<SessionHandle>(Arc::new(store));
    next.run(req).await
}

fn session_from_parts(parts: &Parts) -> Option<SessionHandle> {
    parts.extensions.get::<SessionHandle>().cloned()
}

impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        session_from_parts(parts)
            .and_then(|session| session.state().principal())
            .ok_or_else(|| AppError::Unauthorized("Please sign in to continue".to_string()))
    }
}

impl<S> OptionalFromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(session_from_parts(parts).and_then(|session| session.state().principal()))
    }
}
