//! Joined contract records produced by the columnar join engine

use serde::{Deserialize, Serialize};

/// One verified contract joined with its deployment and compilation rows.
///
/// A record exists only when all three source rows are present; the engine
/// drops verified contracts whose foreign keys do not resolve. Address and
/// hash fields are rendered as 0x-prefixed lowercase hex, `code_compiler`
/// is `compiler-version`, and `code_language` is already lower-cased.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinedContractRecord {
    /// Verification event id from the export
    pub verified_contract_id: String,

    /// Chain the contract is deployed on
    pub chain_id: u64,

    /// Contract address, 0x-prefixed lowercase hex
    pub address: String,

    /// Deployment transaction hash, if the export recorded one
    pub deployment_tx: Option<String>,

    /// Block the deployment landed in
    pub deployment_block: Option<i64>,

    /// Address that sent the deployment transaction
    pub deployer_address: Option<String>,

    /// Source language, lower-cased
    pub code_language: Option<String>,

    /// Compiler and version, joined as `compiler-version`
    pub code_compiler: Option<String>,

    /// Contract name from the compilation artifact
    pub contract_name: Option<String>,

    /// When the contract was verified
    pub verified_at: Option<String>,
}

/// Row counts for the three registered source tables
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct TableCounts {
    pub verified_contracts: u64,
    pub contract_deployments: u64,
    pub compiled_contracts: u64,
}
