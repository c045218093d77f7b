//! Common test utilities and fixtures for integration tests

#![allow(dead_code)]

use std::collections::HashSet;
use std::fs::File;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use arrow::array::{BinaryArray, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use futures::StreamExt;
use parquet::arrow::ArrowWriter;

use oli_labeler::batch::{Batcher, BatcherConfig};
use oli_labeler::domain::{ContractLabel, JoinedContractRecord, TagSet, VERIFICATION_SOURCE};
use oli_labeler::engine::RecordStream;
use oli_labeler::infra::{LabelerError, Result, ShutdownCoordinator};
use oli_labeler::submit::LabelPlatform;

// ============================================================================
// Parquet export fixtures
// ============================================================================

pub struct VerifiedRow {
    pub id: String,
    pub deployment_id: String,
    pub compilation_id: String,
    pub created_at: String,
}

pub struct DeploymentRow {
    pub id: String,
    pub chain_id: i64,
    pub address: Vec<u8>,
    pub transaction_hash: Option<Vec<u8>>,
    pub block_number: Option<i64>,
    pub deployer: Option<Vec<u8>>,
}

pub struct CompilationRow {
    pub id: String,
    pub language: Option<String>,
    pub compiler: Option<String>,
    pub version: Option<String>,
    pub name: Option<String>,
}

/// 20-byte address filled with `seed`
pub fn addr_bytes(seed: u8) -> Vec<u8> {
    vec![seed; 20]
}

/// 32-byte hash filled with `seed`
pub fn hash_bytes(seed: u8) -> Vec<u8> {
    vec![seed; 32]
}

/// Hex rendering the engine produces for fixture bytes
pub fn hex_of(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

fn write_parquet(path: &Path, schema: Arc<Schema>, batch: RecordBatch) {
    let file = File::create(path).unwrap();
    let mut writer = ArrowWriter::try_new(file, schema, None).unwrap();
    writer.write(&batch).unwrap();
    writer.close().unwrap();
}

fn binary_col(values: Vec<Option<&[u8]>>) -> BinaryArray {
    BinaryArray::from_opt_vec(values)
}

/// Write the three export tables under `dir`, one parquet file each.
pub fn write_export(
    dir: &Path,
    verified: &[VerifiedRow],
    deployments: &[DeploymentRow],
    compilations: &[CompilationRow],
) {
    let verified_dir = dir.join("verified_contracts");
    let deployments_dir = dir.join("contract_deployments");
    let compilations_dir = dir.join("compiled_contracts");
    for table_dir in [&verified_dir, &deployments_dir, &compilations_dir] {
        std::fs::create_dir_all(table_dir).unwrap();
    }

    let verified_schema = Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new("deployment_id", DataType::Utf8, false),
        Field::new("compilation_id", DataType::Utf8, false),
        Field::new("created_at", DataType::Utf8, true),
    ]));
    let verified_batch = RecordBatch::try_new(
        verified_schema.clone(),
        vec![
            Arc::new(StringArray::from_iter_values(
                verified.iter().map(|r| r.id.as_str()),
            )),
            Arc::new(StringArray::from_iter_values(
                verified.iter().map(|r| r.deployment_id.as_str()),
            )),
            Arc::new(StringArray::from_iter_values(
                verified.iter().map(|r| r.compilation_id.as_str()),
            )),
            Arc::new(StringArray::from_iter_values(
                verified.iter().map(|r| r.created_at.as_str()),
            )),
        ],
    )
    .unwrap();
    write_parquet(
        &verified_dir.join("part-0.parquet"),
        verified_schema,
        verified_batch,
    );

    let deployments_schema = Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new("chain_id", DataType::Int64, true),
        Field::new("address", DataType::Binary, true),
        Field::new("transaction_hash", DataType::Binary, true),
        Field::new("block_number", DataType::Int64, true),
        Field::new("deployer", DataType::Binary, true),
    ]));
    let deployments_batch = RecordBatch::try_new(
        deployments_schema.clone(),
        vec![
            Arc::new(StringArray::from_iter_values(
                deployments.iter().map(|r| r.id.as_str()),
            )),
            Arc::new(Int64Array::from_iter_values(
                deployments.iter().map(|r| r.chain_id),
            )),
            Arc::new(binary_col(
                deployments
                    .iter()
                    .map(|r| Some(r.address.as_slice()))
                    .collect(),
            )),
            Arc::new(binary_col(
                deployments
                    .iter()
                    .map(|r| r.transaction_hash.as_deref())
                    .collect(),
            )),
            Arc::new(Int64Array::from(
                deployments
                    .iter()
                    .map(|r| r.block_number)
                    .collect::<Vec<_>>(),
            )),
            Arc::new(binary_col(
                deployments.iter().map(|r| r.deployer.as_deref()).collect(),
            )),
        ],
    )
    .unwrap();
    write_parquet(
        &deployments_dir.join("part-0.parquet"),
        deployments_schema,
        deployments_batch,
    );

    let compilations_schema = Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new("language", DataType::Utf8, true),
        Field::new("compiler", DataType::Utf8, true),
        Field::new("version", DataType::Utf8, true),
        Field::new("name", DataType::Utf8, true),
    ]));
    let compilations_batch = RecordBatch::try_new(
        compilations_schema.clone(),
        vec![
            Arc::new(StringArray::from_iter_values(
                compilations.iter().map(|r| r.id.as_str()),
            )),
            Arc::new(StringArray::from(
                compilations
                    .iter()
                    .map(|r| r.language.as_deref())
                    .collect::<Vec<_>>(),
            )),
            Arc::new(StringArray::from(
                compilations
                    .iter()
                    .map(|r| r.compiler.as_deref())
                    .collect::<Vec<_>>(),
            )),
            Arc::new(StringArray::from(
                compilations
                    .iter()
                    .map(|r| r.version.as_deref())
                    .collect::<Vec<_>>(),
            )),
            Arc::new(StringArray::from(
                compilations
                    .iter()
                    .map(|r| r.name.as_deref())
                    .collect::<Vec<_>>(),
            )),
        ],
    )
    .unwrap();
    write_parquet(
        &compilations_dir.join("part-0.parquet"),
        compilations_schema,
        compilations_batch,
    );
}

/// A fully joinable contract: one row in each table, keyed by `n`.
pub fn joinable_contract(n: u8, chain_id: i64) -> (VerifiedRow, DeploymentRow, CompilationRow) {
    let verified = VerifiedRow {
        id: format!("vc-{n:03}"),
        deployment_id: format!("dep-{n:03}"),
        compilation_id: format!("cmp-{n:03}"),
        created_at: "2024-06-01 12:00:00".to_string(),
    };
    let deployment = DeploymentRow {
        id: format!("dep-{n:03}"),
        chain_id,
        address: addr_bytes(n),
        transaction_hash: Some(hash_bytes(n)),
        block_number: Some(1000 + n as i64),
        deployer: Some(addr_bytes(n.wrapping_add(100))),
    };
    let compilation = CompilationRow {
        id: format!("cmp-{n:03}"),
        language: Some("Solidity".to_string()),
        compiler: Some("solc".to_string()),
        version: Some("0.8.19".to_string()),
        name: Some(format!("Contract{n}")),
    };
    (verified, deployment, compilation)
}

/// Write an export of `n` fully joinable contracts on one chain.
pub fn write_standard_export(dir: &Path, n: u8, chain_id: i64) {
    let mut verified = Vec::new();
    let mut deployments = Vec::new();
    let mut compilations = Vec::new();
    for i in 1..=n {
        let (v, d, c) = joinable_contract(i, chain_id);
        verified.push(v);
        deployments.push(d);
        compilations.push(c);
    }
    write_export(dir, &verified, &deployments, &compilations);
}

// ============================================================================
// In-memory record fixtures
// ============================================================================

/// A complete joined record keyed by `n`
pub fn joined_record(n: u8) -> JoinedContractRecord {
    JoinedContractRecord {
        verified_contract_id: format!("vc-{n:03}"),
        chain_id: 8453,
        address: hex_of(&addr_bytes(n)),
        deployment_tx: Some(hex_of(&hash_bytes(n))),
        deployment_block: Some(1000 + n as i64),
        deployer_address: Some(hex_of(&addr_bytes(n.wrapping_add(100)))),
        code_language: Some("solidity".to_string()),
        code_compiler: Some("solc-0.8.19".to_string()),
        contract_name: Some(format!("Contract{n}")),
        verified_at: Some("2024-06-01 12:00:00".to_string()),
    }
}

/// A valid label keyed by `n`
pub fn valid_label(n: u8) -> ContractLabel {
    ContractLabel {
        chain_id: 8453,
        address: hex_of(&addr_bytes(n)),
        tags: TagSet {
            source_code_verified: VERIFICATION_SOURCE,
            is_contract: true,
            code_language: "solidity".to_string(),
            code_compiler: "solc-0.8.19".to_string(),
            deployment_block: 1000 + n as i64,
            deployment_tx: hex_of(&hash_bytes(n)),
            deployer_address: hex_of(&addr_bytes(n.wrapping_add(100))),
            contract_name: None,
        },
    }
}

pub fn record_stream(records: Vec<JoinedContractRecord>) -> RecordStream {
    futures::stream::iter(records.into_iter().map(Ok)).boxed()
}

pub fn batcher_over(records: Vec<JoinedContractRecord>, batch_size: usize) -> Batcher {
    Batcher::new(record_stream(records), 0, BatcherConfig { batch_size })
}

// ============================================================================
// Stub platform
// ============================================================================

/// Scriptable platform stub.
///
/// Records every call in dispatch-completion order, tracks the peak
/// number of in-flight calls, and can fail specific addresses or trip a
/// shutdown coordinator after a number of calls.
#[derive(Default)]
pub struct StubPlatform {
    /// Addresses whose submissions fail
    pub fail_addresses: HashSet<String>,
    /// Simulated call latency
    pub call_delay: Duration,
    /// Trip this coordinator once the given number of calls completed
    pub shutdown_after: Option<(usize, Arc<ShutdownCoordinator>)>,
    calls: Mutex<Vec<String>>,
    inflight: AtomicUsize,
    max_inflight: AtomicUsize,
}

impl StubPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(addresses: impl IntoIterator<Item = String>) -> Self {
        Self {
            fail_addresses: addresses.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.call_delay = delay;
        self
    }

    /// Trip `coordinator` once `calls` submissions have completed
    pub fn with_shutdown_after(
        mut self,
        calls: usize,
        coordinator: Arc<ShutdownCoordinator>,
    ) -> Self {
        self.shutdown_after = Some((calls, coordinator));
        self
    }

    /// Addresses the platform was called for, in completion order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Peak number of calls in flight simultaneously
    pub fn max_inflight(&self) -> usize {
        self.max_inflight.load(Ordering::SeqCst)
    }

    async fn track(&self, label: &ContractLabel) -> Result<()> {
        let inflight = self.inflight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_inflight.fetch_max(inflight, Ordering::SeqCst);

        if !self.call_delay.is_zero() {
            tokio::time::sleep(self.call_delay).await;
        }

        self.inflight.fetch_sub(1, Ordering::SeqCst);
        let completed = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(label.address.clone());
            calls.len()
        };

        if let Some((threshold, coordinator)) = &self.shutdown_after {
            if completed >= *threshold {
                coordinator.shutdown();
            }
        }

        if self.fail_addresses.contains(&label.address) {
            return Err(LabelerError::Submission(format!(
                "stubbed failure for {}",
                label.address
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl LabelPlatform for StubPlatform {
    async fn submit_offchain(&self, label: &ContractLabel) -> Result<()> {
        self.track(label).await
    }

    async fn submit_onchain(&self, label: &ContractLabel) -> Result<String> {
        self.track(label).await?;
        Ok(format!("0x{}", "77".repeat(32)))
    }
}
