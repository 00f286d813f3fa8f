use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use super::IdempotencyKey;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubstrateError {
    #[error("Value-transfer substrate unavailable: {0}")]
    Unavailable(String),
}

/// The value-transfer substrate a submission must be confirmed by before
/// its effects are applied to the ledger.
#[async_trait]
pub trait Substrate: Send + Sync {
    async fn confirm(&self, key: &IdempotencyKey) -> Result<(), SubstrateError>;
}

/// Confirms every submission on the spot.
#[derive(Debug, Default, Clone, Copy)]
pub struct Immediate;

#[async_trait]
impl Substrate for Immediate {
    async fn confirm(&self, _key: &IdempotencyKey) -> Result<(), SubstrateError> {
        Ok(())
    }
}

/// Confirms every submission after a fixed delay.
#[derive(Debug, Clone, Copy)]
pub struct Latency(pub Duration);

#[async_trait]
impl Substrate for Latency {
    async fn confirm(&self, _key: &IdempotencyKey) -> Result<(), SubstrateError> {
        tokio::time::sleep(self.0).await;
        Ok(())
    }
}
