//! Tag derivation
//!
//! Pure mapping from one joined record to the fixed tag vocabulary. A
//! record missing any required field is excluded from the stream with a
//! per-record error; it is never submitted as a partial tag set.

use crate::domain::{ContractLabel, JoinedContractRecord, TagSet, VERIFICATION_SOURCE};
use crate::infra::{LabelerError, Result};

/// Languages the platform accepts for the `code_language` tag
const LANGUAGE_VOCABULARY: [&str; 5] = ["solidity", "vyper", "yul", "fe", "huff"];

fn normalize_language(raw: &str) -> Option<&'static str> {
    let lowered = raw.trim().to_ascii_lowercase();
    LANGUAGE_VOCABULARY
        .iter()
        .find(|accepted| **accepted == lowered)
        .copied()
}

fn required<'a>(
    value: &'a Option<String>,
    field: &'static str,
    record: &JoinedContractRecord,
) -> Result<&'a str> {
    match value.as_deref() {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(LabelerError::MissingField {
            field,
            address: record.address.clone(),
        }),
    }
}

/// Derive the tag set for one joined record.
///
/// Deterministic: deriving twice from the same record yields identical
/// output. Values are copied verbatim except the two constants and the
/// language normalization; format validation is the submission layer's.
pub fn derive_tags(record: &JoinedContractRecord) -> Result<TagSet> {
    let raw_language = required(&record.code_language, "code_language", record)?;
    let code_language =
        normalize_language(raw_language).ok_or_else(|| LabelerError::UnsupportedLanguage {
            language: raw_language.to_string(),
            address: record.address.clone(),
        })?;

    let code_compiler = required(&record.code_compiler, "code_compiler", record)?;
    let deployment_tx = required(&record.deployment_tx, "deployment_tx", record)?;
    let deployer_address = required(&record.deployer_address, "deployer_address", record)?;
    let deployment_block = record
        .deployment_block
        .ok_or_else(|| LabelerError::MissingField {
            field: "deployment_block",
            address: record.address.clone(),
        })?;

    // Empty names are omitted, never emitted as an empty tag
    let contract_name = record
        .contract_name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(String::from);

    Ok(TagSet {
        source_code_verified: VERIFICATION_SOURCE,
        is_contract: true,
        code_language: code_language.to_string(),
        code_compiler: code_compiler.to_string(),
        deployment_block,
        deployment_tx: deployment_tx.to_string(),
        deployer_address: deployer_address.to_string(),
        contract_name,
    })
}

/// Derive and address the tag set for one joined record.
pub fn derive_label(record: &JoinedContractRecord) -> Result<ContractLabel> {
    Ok(ContractLabel {
        chain_id: record.chain_id,
        address: record.address.clone(),
        tags: derive_tags(record)?,
    })
}
