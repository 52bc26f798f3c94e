use crate::{models::MatchId, ports::MatchIdGenerator};
use async_trait::async_trait;

#[derive(Clone)]
pub struct UuidGenerator;

#[async_trait]
impl MatchIdGenerator for UuidGenerator {
    async fn generate() -> MatchId {
        MatchId::new(uuid::Uuid::new_v4().simple().to_string())
    }
}
