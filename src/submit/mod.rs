//! Submission layer
//!
//! The platform seam, the EAS-backed production client, and the batch
//! submission driver.

mod driver;
mod eas;
mod platform;

pub use driver::{
    validate_label, DeliveryMode, SubmissionDriver, SubmitterConfig, DEFAULT_MAX_WORKERS,
    DEFAULT_SUBMISSION_DELAY, MAX_WORKER_CEILING,
};
pub use eas::{EasLabelPlatform, PlatformConfig};
pub use platform::LabelPlatform;
