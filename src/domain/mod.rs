//! Core domain types for the labeling pipeline

mod label;
mod record;

pub use label::{
    BatchReport, ContractLabel, RunSummary, SubmissionResult, SubmissionStatus, TagSet,
    TAG_VOCABULARY, VERIFICATION_SOURCE,
};
pub use record::{JoinedContractRecord, TableCounts};
