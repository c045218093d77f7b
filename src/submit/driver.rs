//! Batch submission driver
//!
//! Consumes tag batches and drives delivery through a [`LabelPlatform`]:
//! per-label validation, bounded-parallel off-chain dispatch, strictly
//! serialized on-chain dispatch, a fixed inter-call delay, and per-batch
//! accounting. One label's failure never aborts its batch.
//!
//! There is no built-in per-item retry and no backoff curve; retry is the
//! caller's responsibility across a new invocation resumed from the
//! checkpoint offset.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::batch::{Batcher, TagBatch};
use crate::domain::{BatchReport, ContractLabel, RunSummary, SubmissionResult, SubmissionStatus};
use crate::infra::{Checkpoint, CheckpointStore, LabelerError, Result, ShutdownSignal};
use crate::metrics::RunMetrics;

use super::platform::LabelPlatform;

/// Default off-chain worker-pool size
pub const DEFAULT_MAX_WORKERS: usize = 10;

/// Hard ceiling on the off-chain worker pool
pub const MAX_WORKER_CEILING: usize = 20;

/// Default delay between successive dispatches
pub const DEFAULT_SUBMISSION_DELAY: Duration = Duration::from_secs(1);

/// Delivery mode for a run. Uniform across a batch, never mixed per item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMode {
    /// Platform database write, free
    OffChain,
    /// Blockchain attestation, costs gas
    OnChain,
}

/// Submission driver configuration
#[derive(Debug, Clone)]
pub struct SubmitterConfig {
    pub mode: DeliveryMode,
    /// Delay applied at the point of issuing each platform call
    pub delay: Duration,
    /// Off-chain worker-pool size, clamped to [`MAX_WORKER_CEILING`]
    pub max_workers: usize,
}

impl Default for SubmitterConfig {
    fn default() -> Self {
        Self {
            mode: DeliveryMode::OffChain,
            delay: DEFAULT_SUBMISSION_DELAY,
            max_workers: DEFAULT_MAX_WORKERS,
        }
    }
}

impl SubmitterConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let mode = if std::env::var("LABELER_SUBMIT_ONCHAIN")
            .map(|s| s == "true" || s == "1")
            .unwrap_or(false)
        {
            DeliveryMode::OnChain
        } else {
            DeliveryMode::OffChain
        };

        let delay = std::env::var("LABELER_SUBMISSION_DELAY")
            .ok()
            .and_then(|s| s.parse::<f64>().ok())
            .filter(|secs| *secs >= 0.0)
            .map(Duration::from_secs_f64)
            .unwrap_or(DEFAULT_SUBMISSION_DELAY);

        let max_workers = std::env::var("LABELER_MAX_WORKERS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_MAX_WORKERS);

        Self {
            mode,
            delay,
            max_workers,
        }
        .clamped()
    }

    /// Enforce the worker-pool ceiling
    pub fn clamped(mut self) -> Self {
        self.max_workers = self.max_workers.clamp(1, MAX_WORKER_CEILING);
        self
    }
}

/// Serialization token for the shared signing account.
///
/// Held for the duration of the on-chain submission loop; two on-chain
/// submissions from the same account must never be in flight at once or
/// they race on the transaction nonce.
struct SigningToken;

/// The submission driver
pub struct SubmissionDriver {
    platform: Arc<dyn LabelPlatform>,
    config: SubmitterConfig,
    metrics: Arc<RunMetrics>,
    signing_token: Mutex<SigningToken>,
}

impl SubmissionDriver {
    pub fn new(
        platform: Arc<dyn LabelPlatform>,
        config: SubmitterConfig,
        metrics: Arc<RunMetrics>,
    ) -> Self {
        Self {
            platform,
            config: config.clamped(),
            metrics,
            signing_token: Mutex::new(SigningToken),
        }
    }

    pub fn metrics(&self) -> &RunMetrics {
        &self.metrics
    }

    /// Submit one batch.
    ///
    /// The returned report's `results` correspond 1:1, in order, to
    /// `batch.labels`, whatever the completion order of parallel
    /// dispatch was.
    pub async fn submit_batch(&self, batch: &TagBatch) -> BatchReport {
        info!(
            batch = batch.index,
            labels = batch.labels.len(),
            mode = ?self.config.mode,
            "Starting batch submission"
        );

        let results = match self.config.mode {
            DeliveryMode::OffChain => self.dispatch_offchain(&batch.labels).await,
            DeliveryMode::OnChain => self.dispatch_onchain(&batch.labels).await,
        };

        let mut report = BatchReport {
            batch_index: batch.index,
            successful: 0,
            failed: 0,
            skipped: 0,
            results,
        };
        for result in &report.results {
            match result.status {
                SubmissionStatus::Succeeded { .. } => {
                    report.successful += 1;
                    self.metrics.inc_succeeded();
                }
                SubmissionStatus::Failed(_) => {
                    report.failed += 1;
                    self.metrics.inc_failed();
                }
                SubmissionStatus::Skipped(_) => {
                    report.skipped += 1;
                    self.metrics.inc_skipped();
                }
            }
        }

        info!(
            batch = batch.index,
            successful = report.successful,
            failed = report.failed,
            skipped = report.skipped,
            total = report.total(),
            "Batch submission complete"
        );
        report
    }

    /// Off-chain dispatch: bounded worker pool, delay at each issue point.
    async fn dispatch_offchain(&self, labels: &[ContractLabel]) -> Vec<SubmissionResult> {
        let mut slots: Vec<Option<SubmissionResult>> = labels
            .iter()
            .map(|label| {
                validate_label(label)
                    .err()
                    .map(|e| skipped(label, e.to_string()))
            })
            .collect();

        let semaphore = Arc::new(Semaphore::new(self.config.max_workers));
        let mut workers: JoinSet<(usize, SubmissionResult)> = JoinSet::new();
        let mut first_dispatch = true;

        for (idx, label) in labels.iter().enumerate() {
            if slots[idx].is_some() {
                continue;
            }
            if !first_dispatch {
                sleep(self.config.delay).await;
            }
            first_dispatch = false;

            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                // The semaphore is never closed; treat it as a stop anyway
                Err(_) => break,
            };
            let platform = self.platform.clone();
            let label = label.clone();
            workers.spawn(async move {
                let result = match platform.submit_offchain(&label).await {
                    Ok(()) => succeeded(&label, None),
                    Err(e) => failed(&label, e.to_string()),
                };
                drop(permit);
                (idx, result)
            });
        }

        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok((idx, result)) => slots[idx] = Some(result),
                Err(e) => warn!(error = %e, "Offchain worker task failed"),
            }
        }

        // A panicked worker leaves its slot empty; account for it so the
        // batch totals stay exact
        slots
            .into_iter()
            .zip(labels)
            .map(|(slot, label)| {
                slot.unwrap_or_else(|| failed(label, "worker task did not complete".to_string()))
            })
            .collect()
    }

    /// On-chain dispatch: one at a time behind the signing token.
    async fn dispatch_onchain(&self, labels: &[ContractLabel]) -> Vec<SubmissionResult> {
        let _token = self.signing_token.lock().await;

        let mut results = Vec::with_capacity(labels.len());
        let mut first_dispatch = true;

        for label in labels {
            if let Err(e) = validate_label(label) {
                debug!(address = %label.address, reason = %e, "Skipping invalid label");
                results.push(skipped(label, e.to_string()));
                continue;
            }

            if !first_dispatch {
                sleep(self.config.delay).await;
            }
            first_dispatch = false;

            let result = match self.platform.submit_onchain(label).await {
                Ok(tx_hash) => succeeded(label, Some(tx_hash)),
                Err(e) => {
                    warn!(address = %label.address, error = %e, "Onchain submission failed");
                    failed(label, e.to_string())
                }
            };
            results.push(result);
        }

        results
    }

    /// Run the whole pipeline: pull batches, submit, checkpoint, stop
    /// cleanly on shutdown.
    ///
    /// The shutdown flag is only honored between batches, so the reported
    /// `next_offset` is always the boundary of a fully completed batch.
    pub async fn run(
        &self,
        batcher: &mut Batcher,
        shutdown: &ShutdownSignal,
        checkpoint: Option<&CheckpointStore>,
    ) -> Result<RunSummary> {
        let mut summary = RunSummary {
            next_offset: batcher.current_offset(),
            ..RunSummary::default()
        };

        loop {
            if shutdown.is_shutdown() {
                info!(
                    next_offset = summary.next_offset,
                    "Shutdown requested, stopping before next batch"
                );
                return Ok(summary);
            }

            let Some(batch) = batcher.next_batch().await? else {
                break;
            };

            self.metrics
                .add_records_scanned(batch.next_offset - batch.start_offset);
            self.metrics.add_records_excluded(batch.excluded);

            let report = self.submit_batch(&batch).await;

            summary.batches_completed += 1;
            summary.records_excluded += batch.excluded;
            summary.successful += report.successful as u64;
            summary.failed += report.failed as u64;
            summary.skipped += report.skipped as u64;
            summary.total += report.total() as u64;
            summary.next_offset = batch.next_offset;
            self.metrics.inc_batches_completed();

            if let Some(store) = checkpoint {
                store.save(&Checkpoint::new(
                    batch.index,
                    batcher.batch_size(),
                    batch.next_offset,
                ))?;
            }
        }

        summary.completed = true;
        // Trailing records may have been consumed without forming a batch
        // (all excluded); the resume offset still covers them
        summary.next_offset = batcher.current_offset();
        if let Some(store) = checkpoint {
            store.clear()?;
        }

        info!(
            batches = summary.batches_completed,
            successful = summary.successful,
            failed = summary.failed,
            skipped = summary.skipped,
            total = summary.total,
            excluded = summary.records_excluded,
            "Run complete"
        );
        Ok(summary)
    }
}

fn succeeded(label: &ContractLabel, tx_hash: Option<String>) -> SubmissionResult {
    SubmissionResult {
        chain_id: label.chain_id,
        address: label.address.clone(),
        status: SubmissionStatus::Succeeded { tx_hash },
    }
}

fn failed(label: &ContractLabel, reason: String) -> SubmissionResult {
    SubmissionResult {
        chain_id: label.chain_id,
        address: label.address.clone(),
        status: SubmissionStatus::Failed(reason),
    }
}

fn skipped(label: &ContractLabel, reason: String) -> SubmissionResult {
    SubmissionResult {
        chain_id: label.chain_id,
        address: label.address.clone(),
        status: SubmissionStatus::Skipped(reason),
    }
}

fn is_hex_string(value: &str, expected_len: usize) -> bool {
    value.len() == expected_len
        && value.starts_with("0x")
        && value[2..].chars().all(|c| c.is_ascii_hexdigit())
}

/// Validate one label before submission.
///
/// Checks the required-tag presence and the basic formats: 42-char hex
/// addresses, 66-char hex tx hashes, non-negative block numbers. A label
/// failing here is skipped without any platform call.
pub fn validate_label(label: &ContractLabel) -> Result<()> {
    let fail = |reason: String| Err(LabelerError::Validation(reason));

    if !is_hex_string(&label.address, 42) {
        return fail(format!("invalid address format: {}", label.address));
    }

    let tags = &label.tags;
    if tags.code_language.trim().is_empty() {
        return fail("code_language is empty".to_string());
    }
    if tags.code_compiler.trim().is_empty() {
        return fail("code_compiler is empty".to_string());
    }
    if !is_hex_string(&tags.deployment_tx, 66) {
        return fail(format!(
            "invalid deployment_tx format: {}",
            tags.deployment_tx
        ));
    }
    if !is_hex_string(&tags.deployer_address, 42) {
        return fail(format!(
            "invalid deployer_address format: {}",
            tags.deployer_address
        ));
    }
    if tags.deployment_block < 0 {
        return fail(format!(
            "negative deployment_block: {}",
            tags.deployment_block
        ));
    }

    Ok(())
}
