use async_trait::async_trait;

use crate::error::StoreError;
use crate::flag::Flag;

/// FlagStore is the interface to the persistence layer that owns authored flags.
///
/// Implementations must return every flag fully hydrated (segments with their constraints and
/// distributions, variants and tags) in a single call; the cache never issues follow-up queries.
#[async_trait]
pub trait FlagStore: Send + Sync {
    /// Retrieve all flags with their nested configuration.
    async fn find_all_flags(&self) -> Result<Vec<Flag>, StoreError>;
}
