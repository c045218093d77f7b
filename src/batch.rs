//! Batch iteration over the tag stream
//!
//! Folds the joined record stream through the tag deriver into fixed-size
//! batches. Each batch carries the source-record offset reached at its
//! end, counting excluded records too, so that offset is always a valid
//! resume point for a fresh engine scan.

use futures::StreamExt;
use tracing::debug;

use crate::derive::derive_label;
use crate::domain::ContractLabel;
use crate::engine::RecordStream;
use crate::infra::Result;

/// Default labels per batch
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Batcher configuration
#[derive(Debug, Clone)]
pub struct BatcherConfig {
    /// Labels per batch; the last batch of a stream may be smaller
    pub batch_size: usize,
}

impl Default for BatcherConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl BatcherConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let batch_size = std::env::var("LABELER_BATCH_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|size| *size > 0)
            .unwrap_or(DEFAULT_BATCH_SIZE);
        Self { batch_size }
    }
}

/// One batch of labels ready for submission
#[derive(Debug)]
pub struct TagBatch {
    /// Zero-based batch index within the run
    pub index: u64,
    /// Source-record offset this batch started at
    pub start_offset: u64,
    /// Source-record offset to resume from once this batch is submitted.
    /// Includes records the deriver excluded while filling the batch.
    pub next_offset: u64,
    /// Labels in stream order
    pub labels: Vec<ContractLabel>,
    /// Records excluded by the deriver while filling this batch
    pub excluded: u64,
}

/// Pulls records, derives labels, and yields fixed-size batches.
///
/// Forward-only and lazy: nothing is buffered beyond the batch being
/// filled. Restart is by re-invoking the engine at `next_offset`, not by
/// rewinding this iterator.
pub struct Batcher {
    stream: RecordStream,
    batch_size: usize,
    /// Scan offset the stream was opened at
    start_offset: u64,
    /// Records consumed from the stream so far, excluded ones included
    consumed: u64,
    next_index: u64,
    exhausted: bool,
}

impl Batcher {
    /// Wrap a record stream that was opened at `start_offset`.
    pub fn new(stream: RecordStream, start_offset: u64, config: BatcherConfig) -> Self {
        Self {
            stream,
            batch_size: config.batch_size.max(1),
            start_offset,
            consumed: 0,
            next_index: 0,
            exhausted: false,
        }
    }

    /// Source-record offset after everything consumed so far
    pub fn current_offset(&self) -> u64 {
        self.start_offset + self.consumed
    }

    /// Configured labels per batch
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Produce the next batch, or `None` once the stream is exhausted.
    ///
    /// An empty trailing remainder yields no final batch. Fatal stream
    /// errors propagate; per-record exclusions are counted and logged.
    pub async fn next_batch(&mut self) -> Result<Option<TagBatch>> {
        if self.exhausted {
            return Ok(None);
        }

        let start_offset = self.current_offset();
        let mut labels = Vec::with_capacity(self.batch_size);
        let mut excluded = 0u64;

        while labels.len() < self.batch_size {
            match self.stream.next().await {
                Some(Ok(record)) => {
                    self.consumed += 1;
                    match derive_label(&record) {
                        Ok(label) => labels.push(label),
                        Err(e) if e.is_exclusion() => {
                            excluded += 1;
                            debug!(error = %e, "Excluding record from tag stream");
                        }
                        Err(e) => return Err(e),
                    }
                }
                Some(Err(e)) => return Err(e),
                None => {
                    self.exhausted = true;
                    break;
                }
            }
        }

        if labels.is_empty() {
            // Trailing records may all have been excluded; no empty batch
            return Ok(None);
        }

        let batch = TagBatch {
            index: self.next_index,
            start_offset,
            next_offset: self.current_offset(),
            labels,
            excluded,
        };
        self.next_index += 1;
        Ok(Some(batch))
    }
}
