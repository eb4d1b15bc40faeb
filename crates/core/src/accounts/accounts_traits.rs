use async_trait::async_trait;

use crate::errors::Result;

use super::accounts_model::{LinkedAccount, NewLinkedAccount, TokenUpdate};

/// Persistence for linked accounts.
#[async_trait]
pub trait AccountRepositoryTrait: Send + Sync {
    fn get_by_id(&self, account_id: &str) -> Result<LinkedAccount>;
    fn list(&self) -> Result<Vec<LinkedAccount>>;
    /// Inserts the account with its cursor at the Unix epoch.
    async fn create(&self, new_account: NewLinkedAccount) -> Result<LinkedAccount>;
    async fn update_tokens(&self, account_id: &str, update: TokenUpdate) -> Result<LinkedAccount>;
    async fn delete(&self, account_id: &str) -> Result<usize>;
}

/// Account operations exposed to the HTTP surface.
#[async_trait]
pub trait AccountServiceTrait: Send + Sync {
    fn get_account(&self, account_id: &str) -> Result<LinkedAccount>;
    fn list_accounts(&self) -> Result<Vec<LinkedAccount>>;
    async fn link_account(&self, new_account: NewLinkedAccount) -> Result<LinkedAccount>;
    async fn update_tokens(&self, account_id: &str, update: TokenUpdate) -> Result<LinkedAccount>;
    async fn unlink_account(&self, account_id: &str) -> Result<()>;
}
