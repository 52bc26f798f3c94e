use crate::models::MatchId;
use async_trait::async_trait;

/// Mints identifiers for new matches; they must not repeat within a process.
#[async_trait]
pub trait MatchIdGenerator {
    async fn generate() -> MatchId;
}
