//! EAS-backed labeling platform client
//!
//! Off-chain labels are posted to the platform HTTP API. On-chain labels
//! are delivered as EAS attestations against the label-pool schema,
//! signed with a local private key.

use alloy::primitives::{address, b256, Address, Bytes, B256, U256};
use alloy::providers::ProviderBuilder;
use alloy::signers::local::PrivateKeySigner;
use alloy::sol;
use alloy::sol_types::SolValue;
use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, info};

use crate::domain::ContractLabel;
use crate::infra::{LabelerError, Result};

use super::platform::LabelPlatform;

// Generate contract bindings
sol! {
    #[sol(rpc)]
    interface IEAS {
        struct AttestationRequestData {
            address recipient;
            uint64 expirationTime;
            bool revocable;
            bytes32 refUID;
            bytes data;
            uint256 value;
        }

        struct AttestationRequest {
            bytes32 schema;
            AttestationRequestData data;
        }

        function attest(AttestationRequest calldata request) external payable returns (bytes32);
    }
}

/// EAS predeploy address on OP-stack chains (Base and Base Sepolia)
const EAS_PREDEPLOY: Address = address!("4200000000000000000000000000000000000021");

/// Label-pool schema UID
const LABEL_POOL_SCHEMA: B256 =
    b256!("b763e62d940bed6f527dd82418e146a904e62a297b8fa765c9b3e1f0bc6fdd68");

/// Platform client configuration
#[derive(Debug, Clone)]
pub struct PlatformConfig {
    /// RPC URL of the attestation chain
    pub rpc_url: String,
    /// EAS contract address
    pub eas_address: Address,
    /// Label-pool schema UID
    pub schema_uid: B256,
    /// Base URL of the off-chain label API
    pub api_url: String,
    /// Private key for signing attestations
    pub private_key: String,
    /// Attestation chain id (production or test network)
    pub chain_id: u64,
}

impl PlatformConfig {
    /// Production configuration: attestations on Base Mainnet
    pub fn base_mainnet(private_key: impl Into<String>) -> Self {
        Self {
            rpc_url: "https://mainnet.base.org".to_string(),
            eas_address: EAS_PREDEPLOY,
            schema_uid: LABEL_POOL_SCHEMA,
            api_url: "https://api.openlabelsinitiative.org/v1".to_string(),
            private_key: private_key.into(),
            chain_id: 8453,
        }
    }

    /// Test configuration: attestations on Base Sepolia
    pub fn base_sepolia(private_key: impl Into<String>) -> Self {
        Self {
            rpc_url: "https://sepolia.base.org".to_string(),
            eas_address: EAS_PREDEPLOY,
            schema_uid: LABEL_POOL_SCHEMA,
            api_url: "https://api-sepolia.openlabelsinitiative.org/v1".to_string(),
            private_key: private_key.into(),
            chain_id: 84532,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// `LABELER_PRIVATE_KEY` is required; `LABELER_PRODUCTION` selects the
    /// network preset and the remaining variables override preset fields.
    pub fn from_env() -> Result<Self> {
        let private_key = std::env::var("LABELER_PRIVATE_KEY").map_err(|_| {
            LabelerError::Configuration("LABELER_PRIVATE_KEY is not set".to_string())
        })?;

        let is_production = std::env::var("LABELER_PRODUCTION")
            .map(|s| s == "true" || s == "1")
            .unwrap_or(false);

        let mut config = if is_production {
            Self::base_mainnet(private_key)
        } else {
            Self::base_sepolia(private_key)
        };

        if let Ok(rpc_url) = std::env::var("LABELER_RPC_URL") {
            config.rpc_url = rpc_url;
        }
        if let Ok(api_url) = std::env::var("LABELER_API_URL") {
            config.api_url = api_url;
        }
        if let Ok(eas) = std::env::var("LABELER_EAS_ADDRESS") {
            config.eas_address = eas
                .parse()
                .map_err(|e| LabelerError::Configuration(format!("Invalid EAS address: {e}")))?;
        }
        if let Ok(schema) = std::env::var("LABELER_SCHEMA_UID") {
            config.schema_uid = schema
                .parse()
                .map_err(|e| LabelerError::Configuration(format!("Invalid schema UID: {e}")))?;
        }

        Ok(config)
    }
}

/// Production platform client
pub struct EasLabelPlatform {
    config: PlatformConfig,
    http: reqwest::Client,
}

impl EasLabelPlatform {
    pub fn new(config: PlatformConfig) -> Self {
        info!(
            chain_id = config.chain_id,
            eas = %config.eas_address,
            api = %config.api_url,
            "Platform client initialized"
        );
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    /// ABI-encode the label payload per the label-pool schema:
    /// `(string chain_id, string tags_json)`.
    fn encode_label_data(label: &ContractLabel) -> Result<Bytes> {
        let tags_json = serde_json::to_string(&label.tags)
            .map_err(|e| LabelerError::Submission(format!("encoding tags: {e}")))?;
        Ok(Bytes::from((label.caip2(), tags_json).abi_encode_params()))
    }
}

#[async_trait]
impl LabelPlatform for EasLabelPlatform {
    async fn submit_offchain(&self, label: &ContractLabel) -> Result<()> {
        let url = format!("{}/labels", self.config.api_url);
        let body = json!({
            "address": label.address,
            "chain_id": label.caip2(),
            "tags": label.tags,
        });

        let response = self.http.post(&url).json(&body).send().await?;
        if !response.status().is_success() {
            return Err(LabelerError::Submission(format!(
                "label API returned {} for {}",
                response.status(),
                label.address
            )));
        }

        debug!(address = %label.address, chain = %label.caip2(), "Offchain label stored");
        Ok(())
    }

    async fn submit_onchain(&self, label: &ContractLabel) -> Result<String> {
        // Parse private key and create signer
        let signer: PrivateKeySigner = self
            .config
            .private_key
            .parse()
            .map_err(|e| LabelerError::Configuration(format!("Invalid private key: {e}")))?;

        let provider = ProviderBuilder::new()
            .wallet(alloy::network::EthereumWallet::from(signer))
            .on_http(
                self.config
                    .rpc_url
                    .parse()
                    .map_err(|e| LabelerError::Configuration(format!("Invalid RPC URL: {e}")))?,
            );

        let contract = IEAS::new(self.config.eas_address, &provider);

        let recipient: Address = label
            .address
            .parse()
            .map_err(|e| LabelerError::Submission(format!("invalid recipient address: {e}")))?;

        let request = IEAS::AttestationRequest {
            schema: self.config.schema_uid,
            data: IEAS::AttestationRequestData {
                recipient,
                expirationTime: 0,
                revocable: true,
                refUID: B256::ZERO,
                data: Self::encode_label_data(label)?,
                value: U256::ZERO,
            },
        };

        let pending = contract
            .attest(request)
            .send()
            .await
            .map_err(|e| LabelerError::Submission(format!("Failed to send attestation: {e}")))?;

        debug!(address = %label.address, tx = %pending.tx_hash(), "Attestation sent");

        let receipt = pending
            .get_receipt()
            .await
            .map_err(|e| LabelerError::Submission(format!("Failed to get receipt: {e}")))?;

        let tx_hash = format!("{:#x}", receipt.transaction_hash);
        info!(
            address = %label.address,
            chain = %label.caip2(),
            tx = %tx_hash,
            block = receipt.block_number.unwrap_or(0),
            "Onchain label attested"
        );

        Ok(tx_hash)
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::{TagSet, VERIFICATION_SOURCE};

    use super::*;

    fn sample_label() -> ContractLabel {
        ContractLabel {
            chain_id: 8453,
            address: format!("0x{}", "11".repeat(20)),
            tags: TagSet {
                source_code_verified: VERIFICATION_SOURCE,
                is_contract: true,
                code_language: "solidity".to_string(),
                code_compiler: "solc-0.8.19".to_string(),
                deployment_block: 100,
                deployment_tx: format!("0x{}", "ab".repeat(32)),
                deployer_address: format!("0x{}", "cd".repeat(20)),
                contract_name: None,
            },
        }
    }

    #[test]
    fn test_network_presets() {
        let mainnet = PlatformConfig::base_mainnet("0xkey");
        assert_eq!(mainnet.chain_id, 8453);

        let sepolia = PlatformConfig::base_sepolia("0xkey");
        assert_eq!(sepolia.chain_id, 84532);

        assert_eq!(mainnet.eas_address, sepolia.eas_address);
        assert_ne!(mainnet.rpc_url, sepolia.rpc_url);
    }

    #[test]
    fn test_label_data_encoding_is_deterministic() {
        let label = sample_label();
        let first = EasLabelPlatform::encode_label_data(&label).unwrap();
        let second = EasLabelPlatform::encode_label_data(&label).unwrap();
        assert_eq!(first, second);
        assert!(!first.is_empty());
    }

    #[test]
    fn test_label_data_contains_caip2_chain() {
        let label = sample_label();
        let encoded = EasLabelPlatform::encode_label_data(&label).unwrap();
        let haystack = encoded.to_vec();
        let needle = b"eip155:8453";
        assert!(haystack
            .windows(needle.len())
            .any(|window| window == needle));
    }
}
