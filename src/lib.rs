use crate::cli::Args;
use crate::feed::CatalogCache;
use crate::pending::{FilePendingStore, MemoryPendingStore, PendingActionQueue};
use crate::roles::PgRoleDirectory;
use crate::state::{AppState, Settings};
use crate::storage::FilesystemStorage;
use anyhow::Context;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{get, post};
use axum_keycloak_auth::PassthroughMode;
use axum_keycloak_auth::instance::{KeycloakAuthInstance, KeycloakConfig};
use axum_keycloak_auth::layer::KeycloakAuthLayer;
use deadpool_diesel::Runtime;
use deadpool_diesel::postgres::{Manager, Pool};
use std::sync::Arc;
use tracing::info;

pub mod cli;
pub mod errors;
pub mod feed;
pub mod guards;
pub mod leaderboard;
pub mod model;
pub mod payloads;
pub mod pending;
pub mod registration;
pub mod response;
pub mod roles;
pub mod schema;
pub mod session;
pub mod state;
pub mod storage;
pub mod workshop;

mod api;

pub async fn init_router(args: &Args) -> anyhow::Result<Router> {
    info!("Initializing database pool...");
    let pool = init_pool(&args.connection_str, args.db_pool_max_size)
        .context("Failed to initialize database pool")?;

    let settings = Settings::from(args);
    info!("Initializing application state...");
    let pending = FilePendingStore::new(settings.pending_actions_dir.clone())
        .await
        .context("Failed to initialize pending action store")?;
    let state = init_state(pool, settings, Arc::new(pending)).await?;

    info!("Initializing Keycloak authentication layer...");
    let keycloak_layer =
        init_protection_layer(args).context("Failed to initialize Keycloak layer")?;

    info!("Initializing router...");
    Ok(routes(&state)
        .layer(from_fn(session::establish_session))
        .layer(from_fn(session::principal_from_keycloak))
        .layer(keycloak_layer)
        .with_state(state))
}

/// Router without the identity provider: the caller id is read from the
/// [`session::TEST_PRINCIPAL_HEADER`] header. Pending actions are kept in memory.
pub async fn init_test_router(pool: Pool, settings: Settings) -> anyhow::Result<Router> {
    let state = init_state(pool, settings, Arc::new(MemoryPendingStore::new())).await?;
    Ok(routes(&state)
        .layer(from_fn(session::establish_session))
        .layer(from_fn(session::principal_from_test_header))
        .with_state(state))
}

async fn init_state(
    pool: Pool,
    settings: Settings,
    pending: Arc<dyn pending::PendingActionStore>,
) -> anyhow::Result<AppState> {
    let storage = FilesystemStorage::new(
        settings.storage_root.clone(),
        &settings.registration_bucket,
        settings.max_upload_bytes,
    )
    .await
    .context("Failed to initialize object storage")?;

    Ok(AppState {
        roles: Arc::new(PgRoleDirectory::new(pool.clone())),
        pool,
        storage: Arc::new(storage),
        pending: Arc::new(PendingActionQueue::new(pending)),
        catalog: Arc::new(CatalogCache::new()),
        settings: Arc::new(settings),
    })
}

fn init_pool(conn_str: &str, max_size: u32) -> anyhow::Result<Pool> {
    let manager = Manager::new(conn_str, Runtime::Tokio1);
    let pool = Pool::builder(manager).max_size(max_size as usize).build()?;
    Ok(pool)
}

fn init_protection_layer(args: &Args) -> anyhow::Result<KeycloakAuthLayer<String>> {
    let config = KeycloakConfig::builder()
        .server(args.keycloak_server_url.clone())
        .realm(args.keycloak_realm.clone())
        .build();

    let instance = KeycloakAuthInstance::new(config);

    // Public pages stay reachable; an unverified token simply yields no principal.
    let layer = KeycloakAuthLayer::builder()
        .instance(instance)
        .passthrough_mode(PassthroughMode::Pass)
        .persist_raw_claims(false)
        .expected_audiences(vec![args.keycloak_audiences.clone()])
        .build();

    Ok(layer)
}

fn routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .merge(public_routes())
        .nest("/dashboard/student", student_routes(state))
        .nest("/judge", judge_routes(state))
        .nest("/admin", admin_routes(state))
}

fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/session", get(api::access::get_session))
        .route("/access/{area}", get(api::access::get_access))
        .route("/events", get(api::catalog::list_events))
        .route("/internships", get(api::catalog::list_internships))
        .route("/courses", get(api::catalog::list_courses))
        .route("/actions", post(api::actions::execute_action))
        .route("/actions/complete", post(api::actions::complete_action))
        .route(
            "/actions/{client_id}",
            get(api::actions::get_pending_action),
        )
}

fn student_routes(state: &AppState) -> Router<AppState> {
    // a registration carries up to four members with two documents each
    let body_limit = (state.settings.max_upload_bytes as usize).saturating_mul(8) + 64 * 1024;

    Router::new()
        .route("/overview", get(api::student::get_overview))
        .route("/registrations", post(api::student::submit_registration))
        .route(
            "/workshops/{workshop_id}/tasks",
            get(api::student::get_workshop_tasks),
        )
        .route(
            "/tasks/{task_id}/submissions",
            post(api::student::submit_task),
        )
        .route(
            "/workshops/{workshop_id}/leaderboard",
            get(api::student::get_leaderboard),
        )
        .route_layer(from_fn_with_state(
            state.clone(),
            guards::require_authenticated,
        ))
        .layer(DefaultBodyLimit::max(body_limit))
}

fn judge_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/workshops/{workshop_id}/submissions",
            get(api::judge::list_submissions),
        )
        .route("/scores", post(api::judge::score_submission))
        .route_layer(from_fn_with_state(state.clone(), guards::require_judge))
}

fn admin_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/events", post(api::admin::create_event))
        .route("/internships", post(api::admin::create_internship))
        .route("/workshops", post(api::admin::create_workshop))
        .route(
            "/workshops/{workshop_id}/tasks",
            post(api::admin::create_task),
        )
        .route(
            "/workshops/{workshop_id}/groups",
            post(api::admin::create_group),
        )
        .route("/tasks/{task_id}/activate", post(api::admin::activate_task))
        .route("/registrations", get(api::admin::list_registrations))
        .route_layer(from_fn_with_state(state.clone(), guards::require_admin))
}
