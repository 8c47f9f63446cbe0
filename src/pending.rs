//! Deferred protected actions.
//!
//! An action attempted without a principal is persisted per client and
//! replayed exactly once after sign-in. A client holds at most one pending
//! action: queuing another replaces it (last write wins).

use crate::errors::AppError;
use crate::session::Principal;
use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};
use uuid::Uuid;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    RegisterEvent,
    ApplyInternship,
    EnrollCourse,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PendingAction {
    pub kind: ActionKind,
    pub payload: JsonValue,
    pub queued_at: DateTime<Utc>,
}

#[async_trait]
pub trait PendingActionStore: Send + Sync {
    /// Persists `action` for `client`, returning the action it replaced.
    async fn save(
        &self,
        client: Uuid,
        action: &PendingAction,
    ) -> Result<Option<PendingAction>, AppError>;

    async fn peek(&self, client: Uuid) -> Result<Option<PendingAction>, AppError>;

    /// Removes and returns the pending action for `client`.
    async fn take(&self, client: Uuid) -> Result<Option<PendingAction>, AppError>;
}

/// One JSON file per client under a directory; survives reloads and restarts.
pub struct FilePendingStore {
    dir: PathBuf,
    // serialises read-modify-write on the same directory
    lock: Mutex<()>,
}

impl FilePendingStore {
    pub async fn new(dir: PathBuf) -> anyhow::Result<Self> {
        fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create pending action dir {}", dir.display()))?;
        Ok(Self {
            dir,
            lock: Mutex::new(()),
        })
    }

    fn file_for(&self, client: Uuid) -> PathBuf {
        self.dir.join(format!("{}.json", client))
    }

    async fn read(&self, client: Uuid) -> Result<Option<PendingAction>, AppError> {
        let path = self.file_for(client);
        match fs::read(&path).await {
            Ok(bytes) => {
                let action = serde_json::from_slice(&bytes).with_context(|| {
                    format!("Corrupt pending action file {}", path.display())
                })?;
                Ok(Some(action))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(anyhow::Error::new(e)
                .context(format!("Failed to read {}", path.display()))
                .into()),
        }
    }
}

#[async_trait]
impl PendingActionStore for FilePendingStore {
    async fn save(
        &self,
        client: Uuid,
        action: &PendingAction,
    ) -> Result<Option<PendingAction>, AppError> {
        let _guard = self.lock.lock().await;
        let previous = self.read(client).await?;

        let path = self.file_for(client);
        let temp = self.dir.join(format!("{}.json.tmp", client));
        let bytes = serde_json::to_vec(action)?;
        fs::write(&temp, bytes)
            .await
            .with_context(|| format!("Failed to write {}", temp.display()))?;
        fs::rename(&temp, &path)
            .await
            .with_context(|| format!("Failed to move pending action into {}", path.display()))?;
        Ok(previous)
    }

    async fn peek(&self, client: Uuid) -> Result<Option<PendingAction>, AppError> {
        self.read(client).await
    }

    async fn take(&self, client: Uuid) -> Result<Option<PendingAction>, AppError> {
        let _guard = self.lock.lock().await;
        let action = self.read(client).await?;
        if action.is_some() {
            let path = self.file_for(client);
            match fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(anyhow::Error::new(e)
                        .context(format!("Failed to clear {}", path.display()))
                        .into());
                }
            }
        }
        Ok(action)
    }
}

#[derive(Default)]
pub struct MemoryPendingStore {
    actions: Mutex<HashMap<Uuid, PendingAction>>,
}

impl MemoryPendingStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PendingActionStore for MemoryPendingStore {
    async fn save(
        &self,
        client: Uuid,
        action: &PendingAction,
    ) -> Result<Option<PendingAction>, AppError> {
        Ok(self.actions.lock().await.insert(client, action.clone()))
    }

    async fn peek(&self, client: Uuid) -> Result<Option<PendingAction>, AppError> {
        Ok(self.actions.lock().await.get(&client).cloned())
    }

    async fn take(&self, client: Uuid) -> Result<Option<PendingAction>, AppError> {
        Ok(self.actions.lock().await.remove(&client))
    }
}

pub type ActionHandler = Arc<
    dyn Fn(Principal, JsonValue) -> BoxFuture<'static, Result<JsonValue, AppError>> + Send + Sync,
>;

/// Maps each action kind to the handler that performs it.
#[derive(Clone, Default)]
pub struct DispatchTable {
    handlers: HashMap<ActionKind, ActionHandler>,
}

impl DispatchTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on<F, Fut>(mut self, kind: ActionKind, handler: F) -> Self
    where
        F: Fn(Principal, JsonValue) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<JsonValue, AppError>> + Send + 'static,
    {
        let handler: ActionHandler = Arc::new(move |principal, payload| {
            Box::pin(handler(principal, payload)) as BoxFuture<'static, _>
        });
        self.handlers.insert(kind, handler);
        self
    }

    pub async fn dispatch(
        &self,
        kind: ActionKind,
        principal: Principal,
        payload: JsonValue,
    ) -> Result<JsonValue, AppError> {
        let handler = self
            .handlers
            .get(&kind)
            .ok_or_else(|| AppError::BadRequest(format!("No handler for action {:?}", kind)))?;
        handler(principal, payload).await
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ProtectedOutcome {
    Completed {
        result: JsonValue,
    },
    Deferred {
        sign_in_required: bool,
        replaced: Option<ActionKind>,
    },
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ReplayReport {
    pub replayed: Option<ActionKind>,
    pub succeeded: bool,
    pub result: Option<JsonValue>,
    pub error: Option<String>,
}

impl ReplayReport {
    fn nothing_pending() -> Self {
        Self {
            replayed: None,
            succeeded: false,
            result: None,
            error: None,
        }
    }
}

/// What a client has waiting for sign-in. The payload is not echoed back.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PendingStatus {
    pub pending: Option<ActionKind>,
    pub queued_at: Option<DateTime<Utc>>,
}

impl From<Option<PendingAction>> for PendingStatus {
    fn from(action: Option<PendingAction>) -> Self {
        Self {
            pending: action.as_ref().map(|a| a.kind),
            queued_at: action.map(|a| a.queued_at),
        }
    }
}

pub struct PendingActionQueue {
    store: Arc<dyn PendingActionStore>,
}

impl PendingActionQueue {
    pub fn new(store: Arc<dyn PendingActionStore>) -> Self {
        Self { store }
    }

    pub async fn pending(&self, client: Uuid) -> Result<PendingStatus, AppError> {
        Ok(self.store.peek(client).await?.into())
    }

    /// Runs the action now when a principal is present, otherwise queues it
    /// and asks the caller to sign in.
    #[instrument(skip(self, payload, run_now))]
    pub async fn execute_protected_action<F, Fut>(
        &self,
        client: Uuid,
        principal: Option<Principal>,
        kind: ActionKind,
        payload: JsonValue,
        run_now: F,
    ) -> Result<ProtectedOutcome, AppError>
    where
        F: FnOnce(Principal, JsonValue) -> Fut,
        Fut: Future<Output = Result<JsonValue, AppError>>,
    {
        if let Some(principal) = principal {
            info!("Running {:?} immediately for user {}", kind, principal.id);
            let result = run_now(principal, payload).await?;
            return Ok(ProtectedOutcome::Completed { result });
        }

        let action = PendingAction {
            kind,
            payload,
            queued_at: Utc::now(),
        };
        let replaced = self.store.save(client, &action).await?.map(|previous| {
            warn!(
                "Pending {:?} for client {} replaced by {:?}",
                previous.kind, client, kind
            );
            previous.kind
        });
        info!("Deferred {:?} for client {} until sign-in", kind, client);

        Ok(ProtectedOutcome::Deferred {
            sign_in_required: true,
            replaced,
        })
    }

    /// Replays the client's pending action once. The action is cleared before
    /// the handler runs, so a failing handler is not retried.
    #[instrument(skip(self, dispatch))]
    pub async fn complete_pending_action(
        &self,
        client: Uuid,
        principal: Principal,
        dispatch: &DispatchTable,
    ) -> Result<ReplayReport, AppError> {
        let Some(action) = self.store.take(client).await? else {
            return Ok(ReplayReport::nothing_pending());
        };

        info!(
            "Replaying {:?} for user {} (queued at {})",
            action.kind, principal.id, action.queued_at
        );
        match dispatch.dispatch(action.kind, principal, action.payload).await {
            Ok(result) => Ok(ReplayReport {
                replayed: Some(action.kind),
                succeeded: true,
                result: Some(result),
                error: None,
            }),
            Err(e) => {
                warn!("Replay of {:?} failed: {}", action.kind, e);
                Ok(ReplayReport {
                    replayed: Some(action.kind),
                    succeeded: false,
                    result: None,
                    error: Some(e.to_string()),
                })
            }
        }
    }
}
