//! Account-level sync entry point: gate, run, persist history.

use async_trait::async_trait;
use log::{debug, info, warn};
use std::sync::Arc;
use thiserror::Error;

use crate::accounts::{AccountRepositoryTrait, TokenUpdate};
use crate::errors::{Error, Result};

use super::single_flight::SingleFlight;
use super::sync_model::{SyncReport, SyncRunRecord};
use super::sync_orchestrator::SyncOrchestrator;
use super::sync_traits::{SampleSource, SyncRunRepositoryTrait};

#[derive(Error, Debug)]
pub enum SyncServiceError {
    #[error("A sync is already running for account {0}")]
    AlreadyRunning(String),

    #[error(transparent)]
    Core(#[from] Error),
}

#[async_trait]
pub trait SyncServiceTrait: Send + Sync {
    /// Runs one attempt for the account. Rejected while another attempt for
    /// the same account is running.
    async fn sync_account(
        &self,
        account_id: &str,
    ) -> std::result::Result<SyncReport, SyncServiceError>;

    fn recent_runs(&self, account_id: &str, limit: i64) -> Result<Vec<SyncRunRecord>>;

    fn is_running(&self, account_id: &str) -> bool;
}

pub struct SyncService {
    accounts: Arc<dyn AccountRepositoryTrait>,
    runs: Arc<dyn SyncRunRepositoryTrait>,
    source: Arc<dyn SampleSource>,
    orchestrator: Arc<SyncOrchestrator>,
    gate: SingleFlight,
}

impl SyncService {
    pub fn new(
        accounts: Arc<dyn AccountRepositoryTrait>,
        runs: Arc<dyn SyncRunRepositoryTrait>,
        source: Arc<dyn SampleSource>,
        orchestrator: Arc<SyncOrchestrator>,
    ) -> Self {
        Self {
            accounts,
            runs,
            source,
            orchestrator,
            gate: SingleFlight::new(),
        }
    }

    async fn persist_rotated_token(&self, account_id: &str, refresh_token: String) {
        let update = TokenUpdate {
            refresh_token: Some(refresh_token),
            access_token: None,
        };
        match self.accounts.update_tokens(account_id, update).await {
            Ok(_) => info!("[StepSync] account={} stored rotated refresh token", account_id),
            Err(err) => warn!(
                "[StepSync] account={} failed to store rotated refresh token: {}",
                account_id, err
            ),
        }
    }
}

#[async_trait]
impl SyncServiceTrait for SyncService {
    async fn sync_account(
        &self,
        account_id: &str,
    ) -> std::result::Result<SyncReport, SyncServiceError> {
        let Some(_flight) = self.gate.try_acquire(account_id) else {
            debug!("[StepSync] account={} sync already in flight", account_id);
            return Err(SyncServiceError::AlreadyRunning(account_id.to_string()));
        };

        let account = self.accounts.get_by_id(account_id)?;
        let credential = account.credential();
        let report = self
            .orchestrator
            .run(&account.id, &credential, &account.destination())
            .await;

        if let Some(rotated) = self.source.take_rotated_refresh_token(&credential) {
            self.persist_rotated_token(&account.id, rotated).await;
        }

        if let Err(err) = self.runs.record_run(SyncRunRecord::from_report(&report)).await {
            warn!(
                "[StepSync] account={} failed to record sync run: {}",
                account.id, err
            );
        }

        Ok(report)
    }

    fn recent_runs(&self, account_id: &str, limit: i64) -> Result<Vec<SyncRunRecord>> {
        self.runs.list_recent(account_id, limit.clamp(1, 500))
    }

    fn is_running(&self, account_id: &str) -> bool {
        self.gate.is_in_flight(account_id)
    }
}
