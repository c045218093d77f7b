//! Label types submitted to the labeling platform
//!
//! A `TagSet` is the fixed tag vocabulary derived from one joined record;
//! a `ContractLabel` addresses it to a contract. Submission outcomes are
//! correlated by chain id and address, never by completion order.

use std::fmt;

use serde::Serialize;

/// Constant value of the `source_code_verified` tag
pub const VERIFICATION_SOURCE: &str = "sourcify";

/// Tag names accepted by the platform, in canonical order
pub const TAG_VOCABULARY: [&str; 8] = [
    "source_code_verified",
    "is_contract",
    "code_language",
    "code_compiler",
    "deployment_block",
    "deployment_tx",
    "deployer_address",
    "contract_name",
];

/// The fixed tag set derived from one joined record.
///
/// Field declaration order is the canonical tag order; serialization
/// preserves it. `contract_name` is omitted entirely when absent, never
/// emitted as null or an empty string.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TagSet {
    pub source_code_verified: &'static str,
    pub is_contract: bool,
    pub code_language: String,
    pub code_compiler: String,
    pub deployment_block: i64,
    pub deployment_tx: String,
    pub deployer_address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contract_name: Option<String>,
}

impl TagSet {
    /// Number of tags that will be serialized
    pub fn len(&self) -> usize {
        if self.contract_name.is_some() {
            8
        } else {
            7
        }
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

/// A tag set addressed to a contract
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContractLabel {
    /// Numeric chain id of the deployment
    pub chain_id: u64,
    /// Contract address, 0x-prefixed lowercase hex
    pub address: String,
    /// Derived tags
    pub tags: TagSet,
}

impl ContractLabel {
    /// Chain id in the CAIP-2 form the platform expects
    pub fn caip2(&self) -> String {
        format!("eip155:{}", self.chain_id)
    }
}

impl fmt::Display for ContractLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} on {}", self.address, self.caip2())
    }
}

/// Per-label submission outcome
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SubmissionStatus {
    /// Delivered; on-chain submissions carry the attestation tx hash
    Succeeded { tx_hash: Option<String> },
    /// The platform call failed
    Failed(String),
    /// Validation rejected the label before any platform call
    Skipped(String),
}

/// Outcome of one label submission, correlated by chain id and address
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmissionResult {
    pub chain_id: u64,
    pub address: String,
    pub status: SubmissionStatus,
}

impl SubmissionResult {
    pub fn is_success(&self) -> bool {
        matches!(self.status, SubmissionStatus::Succeeded { .. })
    }
}

/// Per-batch submission report.
///
/// `results` corresponds 1:1, in order, to the labels of the batch it was
/// produced from.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub batch_index: u64,
    pub successful: usize,
    pub failed: usize,
    pub skipped: usize,
    pub results: Vec<SubmissionResult>,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.results.len()
    }

    /// The `(successful, total)` pair reported per batch
    pub fn counts(&self) -> (usize, usize) {
        (self.successful, self.total())
    }
}

/// Cumulative totals for one run
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    /// Batches fully submitted
    pub batches_completed: u64,
    /// Records excluded by the tag deriver
    pub records_excluded: u64,
    pub successful: u64,
    pub failed: u64,
    pub skipped: u64,
    /// Labels attempted (successful + failed + skipped)
    pub total: u64,
    /// False when the run stopped early on a shutdown request
    pub completed: bool,
    /// Offset a new run should resume from
    pub next_offset: u64,
}
