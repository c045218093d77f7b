//! Expected source-table schemas
//!
//! The export ships three tables as directories of parquet files. Columns
//! listed here must be present after registration; anything extra is
//! ignored by the join projection.

use datafusion::prelude::SessionContext;

use crate::infra::{LabelerError, Result};

/// Table holding one row per verification event
pub const VERIFIED_CONTRACTS: &str = "verified_contracts";
/// Table holding one row per deployment event
pub const CONTRACT_DEPLOYMENTS: &str = "contract_deployments";
/// Table holding one row per compilation artifact
pub const COMPILED_CONTRACTS: &str = "compiled_contracts";

/// All source tables, in registration order
pub const SOURCE_TABLES: [&str; 3] = [VERIFIED_CONTRACTS, CONTRACT_DEPLOYMENTS, COMPILED_CONTRACTS];

/// Columns the join projection reads from each table
pub const REQUIRED_COLUMNS: [(&str, &[&str]); 3] = [
    (
        VERIFIED_CONTRACTS,
        &["id", "deployment_id", "compilation_id", "created_at"],
    ),
    (
        CONTRACT_DEPLOYMENTS,
        &[
            "id",
            "chain_id",
            "address",
            "transaction_hash",
            "block_number",
            "deployer",
        ],
    ),
    (
        COMPILED_CONTRACTS,
        &["id", "language", "compiler", "version", "name"],
    ),
];

/// Check that every required column is present on the registered tables.
pub async fn validate_source_schemas(ctx: &SessionContext) -> Result<()> {
    for (table, columns) in REQUIRED_COLUMNS {
        let df = ctx.table(table).await?;
        let schema = df.schema();
        for column in columns {
            if !schema.has_column_with_unqualified_name(column) {
                return Err(LabelerError::SchemaMismatch {
                    table: table.to_string(),
                    column: column.to_string(),
                });
            }
        }
    }
    Ok(())
}
