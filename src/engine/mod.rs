//! Columnar join engine over the contract export
//!
//! Registers the three export tables as listing tables and executes the
//! three-way inner join inside DataFusion, so the join runs within the
//! engine's memory budget instead of materializing tables in process
//! memory. Output is a lazy stream of [`JoinedContractRecord`]s, windowed
//! by an explicit resume offset for restartability.

mod decode;
mod schema;

use std::path::{Path, PathBuf};

use datafusion::prelude::{ParquetReadOptions, SessionConfig, SessionContext};
use futures::stream::BoxStream;
use futures::StreamExt;
use tracing::{debug, info};

use crate::domain::{JoinedContractRecord, TableCounts};
use crate::infra::{LabelerError, Result};

pub use decode::decode_batch;
pub use schema::{
    validate_source_schemas, COMPILED_CONTRACTS, CONTRACT_DEPLOYMENTS, REQUIRED_COLUMNS,
    SOURCE_TABLES, VERIFIED_CONTRACTS,
};

/// Lazy stream of joined records, pulled batch by batch from the engine
pub type RecordStream = BoxStream<'static, Result<JoinedContractRecord>>;

/// Engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Directory holding one subdirectory of parquet files per table
    pub data_dir: PathBuf,
}

impl EngineConfig {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let data_dir = std::env::var("LABELER_DATA_DIR")
            .map_err(|_| LabelerError::Configuration("LABELER_DATA_DIR is not set".to_string()))?;
        Ok(Self::new(data_dir))
    }
}

/// One scan over the joined export
#[derive(Debug, Clone, Default)]
pub struct RecordScan {
    /// Restrict output to a single chain
    pub chain_id: Option<u64>,
    /// Maximum records to produce
    pub limit: Option<usize>,
    /// Records to skip, in the engine's stable per-invocation order.
    /// This is the resume offset a previous run reported.
    pub offset: usize,
}

impl RecordScan {
    pub fn for_chain(chain_id: u64) -> Self {
        Self {
            chain_id: Some(chain_id),
            ..Self::default()
        }
    }

    pub fn with_window(mut self, offset: usize, limit: Option<usize>) -> Self {
        self.offset = offset;
        self.limit = limit;
        self
    }
}

/// Contracts per chain, used by the planning stage
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct ChainCount {
    pub chain_id: u64,
    pub contracts: u64,
}

/// The columnar join engine.
///
/// Purely a read path; table files are shared safely across concurrent
/// readers and the engine holds no mutable state after `open`.
pub struct ContractJoinEngine {
    ctx: SessionContext,
    data_dir: PathBuf,
}

impl std::fmt::Debug for ContractJoinEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContractJoinEngine")
            .field("data_dir", &self.data_dir)
            .finish_non_exhaustive()
    }
}

impl ContractJoinEngine {
    /// Open the export at `config.data_dir`: verify the table directories,
    /// register them, and check the expected columns are present.
    pub async fn open(config: EngineConfig) -> Result<Self> {
        verify_data_files(&config.data_dir)?;

        // Read parquet strings and binaries as plain arrays so the decoder
        // sees StringArray/BinaryArray rather than view types.
        let session_config = SessionConfig::new()
            .set_bool("datafusion.execution.parquet.schema_force_view_types", false);
        let ctx = SessionContext::new_with_config(session_config);

        for table in SOURCE_TABLES {
            let table_dir = config.data_dir.join(table);
            ctx.register_parquet(
                table,
                table_dir.to_string_lossy().as_ref(),
                ParquetReadOptions::default(),
            )
            .await?;
            debug!(table, dir = %table_dir.display(), "Registered source table");
        }

        validate_source_schemas(&ctx).await?;
        info!(data_dir = %config.data_dir.display(), "Join engine ready");

        Ok(Self {
            ctx,
            data_dir: config.data_dir,
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Row counts for the three source tables
    pub async fn table_counts(&self) -> Result<TableCounts> {
        Ok(TableCounts {
            verified_contracts: self.count_table(VERIFIED_CONTRACTS).await?,
            contract_deployments: self.count_table(CONTRACT_DEPLOYMENTS).await?,
            compiled_contracts: self.count_table(COMPILED_CONTRACTS).await?,
        })
    }

    async fn count_table(&self, table: &str) -> Result<u64> {
        let sql = format!("SELECT COUNT(*) FROM {table}");
        self.scalar_count(&sql).await
    }

    /// Total joinable rows for a scan, before any limit/offset window.
    /// Used for progress reporting and batch-count estimates.
    pub async fn count_joined(&self, scan: &RecordScan) -> Result<u64> {
        let sql = format!(
            "SELECT COUNT(*) {}",
            joined_from_clause(scan.chain_id)
        );
        self.scalar_count(&sql).await
    }

    /// Contracts per chain, largest first
    pub async fn chain_distribution(&self, limit: usize) -> Result<Vec<ChainCount>> {
        let sql = format!(
            "SELECT CAST(cd.chain_id AS BIGINT) AS chain_id, COUNT(*) AS contracts \
             {} \
             GROUP BY CAST(cd.chain_id AS BIGINT) \
             ORDER BY contracts DESC \
             LIMIT {limit}",
            joined_from_clause(None)
        );
        let batches = self.ctx.sql(&sql).await?.collect().await?;

        let mut counts = Vec::new();
        for batch in &batches {
            let chains = batch
                .column(0)
                .as_any()
                .downcast_ref::<arrow::array::Int64Array>()
                .ok_or_else(|| LabelerError::SchemaMismatch {
                    table: "chain_distribution".to_string(),
                    column: "chain_id".to_string(),
                })?;
            let contracts = batch
                .column(1)
                .as_any()
                .downcast_ref::<arrow::array::Int64Array>()
                .ok_or_else(|| LabelerError::SchemaMismatch {
                    table: "chain_distribution".to_string(),
                    column: "contracts".to_string(),
                })?;
            for row in 0..batch.num_rows() {
                counts.push(ChainCount {
                    chain_id: chains.value(row) as u64,
                    contracts: contracts.value(row) as u64,
                });
            }
        }
        Ok(counts)
    }

    /// Stream joined records for a scan.
    ///
    /// Ordering is stable within one invocation for the same inputs
    /// (sorted by verification id), which is what makes the offset window
    /// a valid resume point. No cross-run global ordering is promised.
    pub async fn records(&self, scan: &RecordScan) -> Result<RecordStream> {
        let sql = joined_select_sql(scan.chain_id);
        debug!(offset = scan.offset, limit = ?scan.limit, "Executing joined scan");

        let df = self.ctx.sql(&sql).await?.limit(scan.offset, scan.limit)?;
        let batches = df.execute_stream().await?;

        let records = batches
            .map(|next| -> Result<Vec<JoinedContractRecord>> {
                let batch = next?;
                decode_batch(&batch)
            })
            .map(|decoded| match decoded {
                Ok(records) => futures::stream::iter(
                    records.into_iter().map(Ok).collect::<Vec<_>>(),
                ),
                Err(e) => futures::stream::iter(vec![Err(e)]),
            })
            .flatten()
            .boxed();

        Ok(records)
    }

    async fn scalar_count(&self, sql: &str) -> Result<u64> {
        let batches = self.ctx.sql(sql).await?.collect().await?;
        let count = batches
            .first()
            .filter(|batch| batch.num_rows() > 0)
            .and_then(|batch| {
                batch
                    .column(0)
                    .as_any()
                    .downcast_ref::<arrow::array::Int64Array>()
                    .map(|col| col.value(0))
            })
            .unwrap_or(0);
        Ok(count as u64)
    }
}

/// Shared FROM/WHERE clause of every joined query.
///
/// Both joins are inner joins: a verified contract without a matching
/// deployment or compilation row yields no output. The baseline filters
/// drop rows that could never become a valid label (no chain, no address,
/// zero address, no language).
fn joined_from_clause(chain_id: Option<u64>) -> String {
    let mut clause = String::from(
        "FROM verified_contracts vc \
         JOIN contract_deployments cd ON vc.deployment_id = cd.id \
         JOIN compiled_contracts cc ON vc.compilation_id = cc.id \
         WHERE cd.chain_id IS NOT NULL \
           AND cd.address IS NOT NULL \
           AND cc.language IS NOT NULL \
           AND encode(cd.address, 'hex') <> '0000000000000000000000000000000000000000'",
    );
    if let Some(chain) = chain_id {
        clause.push_str(&format!(" AND CAST(cd.chain_id AS BIGINT) = {chain}"));
    }
    clause
}

/// Full joined projection, one output row per verified contract.
fn joined_select_sql(chain_id: Option<u64>) -> String {
    format!(
        "SELECT \
            CAST(vc.id AS VARCHAR) AS verified_contract_id, \
            CAST(cd.chain_id AS BIGINT) AS chain_id, \
            '0x' || encode(cd.address, 'hex') AS address, \
            CASE WHEN cd.transaction_hash IS NOT NULL \
                 THEN '0x' || encode(cd.transaction_hash, 'hex') END AS deployment_tx, \
            CAST(cd.block_number AS BIGINT) AS deployment_block, \
            CASE WHEN cd.deployer IS NOT NULL \
                 THEN '0x' || encode(cd.deployer, 'hex') END AS deployer_address, \
            lower(CAST(cc.language AS VARCHAR)) AS code_language, \
            CASE WHEN cc.compiler IS NOT NULL AND cc.version IS NOT NULL \
                 THEN CAST(cc.compiler AS VARCHAR) || '-' || CAST(cc.version AS VARCHAR) \
                 END AS code_compiler, \
            CAST(cc.name AS VARCHAR) AS contract_name, \
            CAST(vc.created_at AS VARCHAR) AS verified_at \
         {} \
         ORDER BY vc.id",
        joined_from_clause(chain_id)
    )
}

/// Check the data directory and each table subdirectory for parquet files.
fn verify_data_files(data_dir: &Path) -> Result<()> {
    if !data_dir.is_dir() {
        return Err(LabelerError::DataUnavailable(format!(
            "data directory not found: {}",
            data_dir.display()
        )));
    }

    for table in SOURCE_TABLES {
        let table_dir = data_dir.join(table);
        if !table_dir.is_dir() {
            return Err(LabelerError::DataUnavailable(format!(
                "table directory not found: {}",
                table_dir.display()
            )));
        }

        let parquet_files = std::fs::read_dir(&table_dir)
            .map_err(|e| {
                LabelerError::DataUnavailable(format!("reading {}: {e}", table_dir.display()))
            })?
            .filter_map(|entry| entry.ok())
            .filter(|entry| {
                entry
                    .path()
                    .extension()
                    .map(|ext| ext == "parquet")
                    .unwrap_or(false)
            })
            .count();

        if parquet_files == 0 {
            return Err(LabelerError::DataUnavailable(format!(
                "no parquet files found in: {}",
                table_dir.display()
            )));
        }
        info!(table, files = parquet_files, "Found table files");
    }

    Ok(())
}
