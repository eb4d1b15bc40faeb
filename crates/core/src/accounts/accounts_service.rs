use async_trait::async_trait;
use log::{debug, info};
use std::sync::Arc;

use crate::errors::{Error, Result};

use super::accounts_model::{LinkedAccount, NewLinkedAccount, TokenUpdate};
use super::accounts_traits::{AccountRepositoryTrait, AccountServiceTrait};

pub struct AccountService {
    repository: Arc<dyn AccountRepositoryTrait>,
}

impl AccountService {
    pub fn new(repository: Arc<dyn AccountRepositoryTrait>) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl AccountServiceTrait for AccountService {
    fn get_account(&self, account_id: &str) -> Result<LinkedAccount> {
        self.repository.get_by_id(account_id)
    }

    fn list_accounts(&self) -> Result<Vec<LinkedAccount>> {
        self.repository.list()
    }

    async fn link_account(&self, new_account: NewLinkedAccount) -> Result<LinkedAccount> {
        new_account.validate()?;
        let account = self.repository.create(new_account).await?;
        info!(
            "[Accounts] Linked account {} to stream {}",
            account.id, account.stream_id
        );
        Ok(account)
    }

    async fn update_tokens(&self, account_id: &str, update: TokenUpdate) -> Result<LinkedAccount> {
        if update.refresh_token.is_none() && update.access_token.is_none() {
            return self.repository.get_by_id(account_id);
        }
        if matches!(update.refresh_token.as_deref(), Some(token) if token.trim().is_empty()) {
            return Err(Error::InvalidInput(
                "rotated refresh token must not be empty".to_string(),
            ));
        }
        debug!("[Accounts] Updating tokens for account {}", account_id);
        self.repository.update_tokens(account_id, update).await
    }

    async fn unlink_account(&self, account_id: &str) -> Result<()> {
        let deleted = self.repository.delete(account_id).await?;
        if deleted == 0 {
            return Err(Error::NotFound(format!("account {}", account_id)));
        }
        info!("[Accounts] Unlinked account {}", account_id);
        Ok(())
    }
}
