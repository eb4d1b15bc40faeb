//! Shared application state and startup wiring.

use std::sync::Arc;

use stepsync_core::accounts::{AccountService, AccountServiceTrait};
use stepsync_core::sync::{
    SyncConfig, SyncOrchestrator, SyncScheduler, SyncService, SyncServiceTrait,
};
use stepsync_google_fit::GoogleFitClient;
use stepsync_oneself::OneselfClient;
use stepsync_storage_sqlite::{
    create_pool, init_at, run_migrations, spawn_writer, AccountRepository, SyncRunRepository,
};
use tracing_subscriber::EnvFilter;

use crate::config::Config;

pub struct AppState {
    pub account_service: Arc<dyn AccountServiceTrait>,
    pub sync_service: Arc<dyn SyncServiceTrait>,
    pub scheduler: Arc<SyncScheduler>,
    pub oneself: Arc<OneselfClient>,
    pub public_host: String,
}

/// Installs the tracing subscriber and routes `log` records from the library
/// crates into it. Filter comes from `RUST_LOG`, default `info`.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_ok() {
        let _ = tracing_log::LogTracer::init();
    }
}

pub fn build_state(config: &Config) -> anyhow::Result<Arc<AppState>> {
    let db_path = init_at(&config.database_path)?;
    run_migrations(&db_path)?;
    let pool = create_pool(&db_path)?;
    let writer = spawn_writer(pool.as_ref().clone());

    let account_repository = Arc::new(AccountRepository::new(pool.clone(), writer.clone()));
    let run_repository = Arc::new(SyncRunRepository::new(pool, writer));

    let sync_config = SyncConfig::default().with_granularity(config.granularity);
    let google = Arc::new(GoogleFitClient::new(config.google.clone()));
    let oneself = Arc::new(OneselfClient::new(
        config
            .oneself
            .clone()
            .with_source_name(sync_config.source_name.clone()),
    ));

    let orchestrator = Arc::new(SyncOrchestrator::new(
        sync_config,
        google.clone(),
        oneself.clone(),
        account_repository.clone(),
    )?);
    let sync_service: Arc<dyn SyncServiceTrait> = Arc::new(SyncService::new(
        account_repository.clone(),
        run_repository,
        google,
        orchestrator,
    ));
    let scheduler = Arc::new(SyncScheduler::new(
        sync_service.clone(),
        account_repository.clone(),
        config.sync_interval,
    ));

    Ok(Arc::new(AppState {
        account_service: Arc::new(AccountService::new(account_repository)),
        sync_service,
        scheduler,
        oneself,
        public_host: config.public_host.clone(),
    }))
}
