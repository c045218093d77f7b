//! OLI Labeler Library
//!
//! Pipeline that joins a Sourcify verified-contract export locally and
//! submits the derived tag sets to the Open Labels Initiative platform as
//! off-chain labels or on-chain attestations.
//!
//! ## Modules
//!
//! - [`domain`] - Core domain types (joined records, tag sets, outcomes)
//! - [`engine`] - Columnar join engine over the parquet export
//! - [`derive`] - Tag derivation from joined records
//! - [`batch`] - Fixed-size, offset-stamped batch iteration
//! - [`submit`] - Platform clients and the batch submission driver
//! - [`infra`] - Errors, graceful shutdown, offset checkpointing
//! - [`metrics`] - Run counters
//! - [`telemetry`] - Logging setup

pub mod batch;
pub mod derive;
pub mod domain;
pub mod engine;
pub mod infra;
pub mod metrics;
pub mod submit;
pub mod telemetry;

// Re-export commonly used types
pub use domain::{
    BatchReport, ContractLabel, JoinedContractRecord, RunSummary, SubmissionResult,
    SubmissionStatus, TableCounts, TagSet,
};

pub use batch::{Batcher, BatcherConfig, TagBatch};
pub use engine::{ContractJoinEngine, EngineConfig, RecordScan, RecordStream};
pub use infra::{Checkpoint, CheckpointStore, LabelerError, Result, ShutdownSignal};
pub use metrics::{MetricsSnapshot, RunMetrics};
pub use submit::{
    DeliveryMode, EasLabelPlatform, LabelPlatform, PlatformConfig, SubmissionDriver,
    SubmitterConfig,
};
