use crate::domain::model::{AcknowledgePolicy, Account, BounceNotification};
use crate::utils::error::Result;
use async_trait::async_trait;

/// Remote backlog of bounce notifications.
#[async_trait]
pub trait BounceSource: Send + Sync {
    /// One bounded page, most recent first.
    async fn fetch(&self, limit: usize) -> Result<Vec<BounceNotification>>;

    /// Clears one address from the backlog. Independent per address.
    async fn acknowledge(&self, address: &str) -> Result<()>;
}

/// Builds a [`BounceSource`] once a credential is known. Failing here means
/// the provider client capability is unavailable.
pub trait SourceConnector {
    type Source: BounceSource;

    fn connect(&self, credential: &str) -> Result<Self::Source>;
}

/// Local account store. All mutations of one run go through a single unit.
pub trait AccountDirectory {
    type Unit<'a>: DirectoryUnit
    where
        Self: 'a;

    fn begin(&self) -> Result<Self::Unit<'_>>;
}

/// Dropping a unit without calling [`DirectoryUnit::commit`] discards its changes.
pub trait DirectoryUnit {
    /// Active accounts whose address matches `normalized_address`, case-insensitively.
    fn find_active(&self, normalized_address: &str) -> Result<Vec<Account>>;

    /// Returns how many accounts actually flipped to inactive.
    fn deactivate_all(&self, ids: &[i64]) -> Result<usize>;

    fn commit(self) -> Result<()>;
}

pub trait ReconcileConfig {
    fn credential(&self) -> Option<&str>;
    fn fetch_limit(&self) -> usize;
    fn acknowledge_policy(&self) -> AcknowledgePolicy;
    fn additional_indicators(&self) -> &[String];
}
