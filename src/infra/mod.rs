//! Infrastructure layer for the labeling pipeline
//!
//! Contains the shared error taxonomy, graceful shutdown support, and the
//! offset checkpoint the caller persists between runs.

mod checkpoint;
mod error;
mod shutdown;

pub use checkpoint::{Checkpoint, CheckpointStore};
pub use error::*;
pub use shutdown::{
    shutdown_signal, spawn_signal_listener, ShutdownCoordinator, ShutdownSignal,
};
