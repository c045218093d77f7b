//! Labeling platform seam
//!
//! The driver talks to the platform through this trait so tests can stub
//! delivery and so the on-chain signing mechanics stay out of the batch
//! state machine.

use async_trait::async_trait;

use crate::domain::ContractLabel;
use crate::infra::Result;

/// One-label-at-a-time delivery to the labeling platform.
///
/// Implementations must be safe to share across the off-chain worker
/// pool. Serialization of on-chain calls is the driver's responsibility,
/// not the platform's.
#[async_trait]
pub trait LabelPlatform: Send + Sync {
    /// Store the label in the platform database. Free, no transaction.
    async fn submit_offchain(&self, label: &ContractLabel) -> Result<()>;

    /// Create an on-chain attestation for the label and return its
    /// transaction hash. Costs gas and consumes a nonce of the shared
    /// signing account.
    async fn submit_onchain(&self, label: &ContractLabel) -> Result<String>;
}
