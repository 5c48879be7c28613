use async_trait::async_trait;
use js5watch_proto::ResetRecord;

/// Durable history of resets
#[async_trait]
pub trait ResetStore: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// The most recent reset on record, if any
    async fn last_reset(&self) -> Result<Option<ResetRecord>, Self::Error>;

    async fn insert_reset(&self, record: &ResetRecord) -> Result<(), Self::Error>;
}
