//! Decoding of joined record batches into domain records

use arrow::array::{Array, Int64Array, StringArray};
use arrow::record_batch::RecordBatch;

use crate::domain::JoinedContractRecord;
use crate::infra::{LabelerError, Result};

/// Name of the synthetic joined projection, used in schema errors.
const JOINED: &str = "joined";

fn string_col<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .and_then(|col| col.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| LabelerError::SchemaMismatch {
            table: JOINED.to_string(),
            column: name.to_string(),
        })
}

fn int_col<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a Int64Array> {
    batch
        .column_by_name(name)
        .and_then(|col| col.as_any().downcast_ref::<Int64Array>())
        .ok_or_else(|| LabelerError::SchemaMismatch {
            table: JOINED.to_string(),
            column: name.to_string(),
        })
}

fn opt_string(array: &StringArray, row: usize) -> Option<String> {
    if array.is_null(row) {
        None
    } else {
        Some(array.value(row).to_string())
    }
}

fn opt_int(array: &Int64Array, row: usize) -> Option<i64> {
    if array.is_null(row) {
        None
    } else {
        Some(array.value(row))
    }
}

/// Decode one record batch of the joined projection.
///
/// The projection guarantees non-null id, chain id, and address; everything
/// else stays optional and is settled by the tag deriver.
pub fn decode_batch(batch: &RecordBatch) -> Result<Vec<JoinedContractRecord>> {
    let ids = string_col(batch, "verified_contract_id")?;
    let chain_ids = int_col(batch, "chain_id")?;
    let addresses = string_col(batch, "address")?;
    let deployment_txs = string_col(batch, "deployment_tx")?;
    let deployment_blocks = int_col(batch, "deployment_block")?;
    let deployers = string_col(batch, "deployer_address")?;
    let languages = string_col(batch, "code_language")?;
    let compilers = string_col(batch, "code_compiler")?;
    let names = string_col(batch, "contract_name")?;
    let verified_ats = string_col(batch, "verified_at")?;

    let mut records = Vec::with_capacity(batch.num_rows());
    for row in 0..batch.num_rows() {
        records.push(JoinedContractRecord {
            verified_contract_id: ids.value(row).to_string(),
            chain_id: chain_ids.value(row) as u64,
            address: addresses.value(row).to_string(),
            deployment_tx: opt_string(deployment_txs, row),
            deployment_block: opt_int(deployment_blocks, row),
            deployer_address: opt_string(deployers, row),
            code_language: opt_string(languages, row),
            code_compiler: opt_string(compilers, row),
            contract_name: opt_string(names, row),
            verified_at: opt_string(verified_ats, row),
        });
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow::datatypes::{DataType, Field, Schema};

    use super::*;

    fn joined_batch() -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![
            Field::new("verified_contract_id", DataType::Utf8, false),
            Field::new("chain_id", DataType::Int64, false),
            Field::new("address", DataType::Utf8, false),
            Field::new("deployment_tx", DataType::Utf8, true),
            Field::new("deployment_block", DataType::Int64, true),
            Field::new("deployer_address", DataType::Utf8, true),
            Field::new("code_language", DataType::Utf8, true),
            Field::new("code_compiler", DataType::Utf8, true),
            Field::new("contract_name", DataType::Utf8, true),
            Field::new("verified_at", DataType::Utf8, true),
        ]));

        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(vec!["1", "2"])),
                Arc::new(Int64Array::from(vec![1, 8453])),
                Arc::new(StringArray::from(vec![
                    "0x1111111111111111111111111111111111111111",
                    "0x2222222222222222222222222222222222222222",
                ])),
                Arc::new(StringArray::from(vec![Some("0xabc"), None])),
                Arc::new(Int64Array::from(vec![Some(100), None])),
                Arc::new(StringArray::from(vec![Some("0xdef"), None])),
                Arc::new(StringArray::from(vec![Some("solidity"), Some("vyper")])),
                Arc::new(StringArray::from(vec![Some("solc-0.8.19"), None])),
                Arc::new(StringArray::from(vec![None, Some("Token")])),
                Arc::new(StringArray::from(vec![Some("2024-01-01"), None])),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_decode_batch() {
        let records = decode_batch(&joined_batch()).unwrap();
        assert_eq!(records.len(), 2);

        assert_eq!(records[0].chain_id, 1);
        assert_eq!(records[0].deployment_block, Some(100));
        assert_eq!(records[0].contract_name, None);

        assert_eq!(records[1].chain_id, 8453);
        assert_eq!(records[1].deployment_tx, None);
        assert_eq!(records[1].contract_name.as_deref(), Some("Token"));
    }

    #[test]
    fn test_decode_missing_column_is_schema_mismatch() {
        let schema = Arc::new(Schema::new(vec![Field::new(
            "verified_contract_id",
            DataType::Utf8,
            false,
        )]));
        let batch =
            RecordBatch::try_new(schema, vec![Arc::new(StringArray::from(vec!["1"]))]).unwrap();

        let err = decode_batch(&batch).unwrap_err();
        assert!(matches!(err, LabelerError::SchemaMismatch { .. }));
    }
}
