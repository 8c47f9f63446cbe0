use crate::cli::Args;
use crate::feed::CatalogCache;
use crate::pending::PendingActionQueue;
use crate::roles::RoleDirectory;
use crate::storage::ObjectStorage;
use deadpool_diesel::postgres::Pool;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Runtime knobs derived from [`Args`].
#[derive(Debug, Clone)]
pub struct Settings {
    /// How long a guard waits for the session to hydrate.
    pub session_grace: Duration,
    /// Delay the front-end waits before following a post-submit redirect.
    pub redirect_delay: Duration,
    pub storage_root: PathBuf,
    pub registration_bucket: String,
    pub pending_actions_dir: PathBuf,
    pub max_upload_bytes: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            session_grace: Duration::from_millis(100),
            redirect_delay: Duration::from_millis(2000),
            storage_root: PathBuf::from("./data/storage"),
            registration_bucket: "registration-documents".to_string(),
            pending_actions_dir: PathBuf::from("./data/pending-actions"),
            max_upload_bytes: 10 * 1024 * 1024,
        }
    }
}

impl From<&Args> for Settings {
    fn from(args: &Args) -> Self {
        Self {
            session_grace: Duration::from_millis(args.session_grace_ms),
            redirect_delay: Duration::from_millis(args.redirect_delay_ms),
            storage_root: args.storage_root.clone(),
            registration_bucket: args.registration_bucket.clone(),
            pending_actions_dir: args.pending_actions_dir.clone(),
            max_upload_bytes: args.max_upload_bytes,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub pool: Pool,
    pub roles: Arc<dyn RoleDirectory>,
    pub storage: Arc<dyn ObjectStorage>,
    pub pending: Arc<PendingActionQueue>,
    pub catalog: Arc<CatalogCache>,
    pub settings: Arc<Settings>,
}
