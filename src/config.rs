//! Deployment configuration
//!
//! Everything the original operator workflow hardcoded lives here instead:
//! the governor/approver constructor arguments, the target network, and the
//! endpoints. Values come from a TOML file with CLI overrides on top; the
//! verifier API key is deliberately NOT part of this struct so it never
//! lands in a config file (it is read from the environment at startup).

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::types::Address;

/// Governor/approver defaults are the Base Sepolia operator accounts
const DEFAULT_GOVERNOR: Address = Address([
    0x06, 0xa9, 0xc5, 0x3e, 0x1d, 0xd1, 0xd4, 0x41, 0x1f, 0x21, 0xd0, 0xaa, 0xd3, 0xb9, 0x84,
    0x48, 0xc3, 0x43, 0xdc, 0xae,
]);
const DEFAULT_APPROVER: Address = Address([
    0x4e, 0x14, 0x3f, 0x76, 0xce, 0x2f, 0xbe, 0xf0, 0x89, 0x87, 0x66, 0xbb, 0xf8, 0x09, 0x3f,
    0xfc, 0x6a, 0xad, 0x7a, 0x89,
]);

/// Main configuration for a deployment run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployConfig {
    // === Target ===

    /// Network identifier, reported to the verification service
    pub network: String,

    /// Chain JSON-RPC endpoint
    pub rpc_url: String,

    /// Account the node signs the creation transaction with
    pub from: Address,

    // === Constructor arguments ===

    /// GOVERNOR role holder passed to the constructor
    pub governor: Address,

    /// Approver (multi-sig checker) passed to the constructor
    pub approver: Address,

    // === Build artifacts ===

    /// Contract to look up in the artifact directory
    pub contract_name: String,

    /// Directory of compiled artifacts (<name>.json)
    pub artifacts_dir: PathBuf,

    /// Flattened source file sent to the verification service
    pub source_path: PathBuf,

    /// Compiler version string the verifier matches against
    pub compiler_version: String,

    /// Optimizer runs the contract was compiled with
    pub optimizer_runs: u32,

    /// Gas limit override; None lets the node estimate
    pub gas_limit: Option<u64>,

    // === Confirmation wait ===

    /// Receipt poll interval (seconds)
    pub receipt_poll_secs: u64,

    /// Give up waiting for a receipt after this long (seconds)
    pub receipt_timeout_secs: u64,

    /// Block depth to reach before asking for verification
    pub confirmations: u64,

    /// Head poll interval while waiting for depth (seconds)
    pub confirmation_poll_secs: u64,

    /// Stop waiting for depth after this long (seconds)
    pub confirmation_timeout_secs: u64,

    // === Verification ===

    /// Etherscan-family API endpoint
    pub verifier_api_url: String,

    /// Explorer base URL, only used for operator-facing links
    pub explorer_url: String,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            // Target - Base Sepolia
            network: "base_sepolia".to_string(),
            rpc_url: "https://sepolia.base.org".to_string(),
            from: DEFAULT_GOVERNOR,

            // Constructor arguments
            governor: DEFAULT_GOVERNOR,
            approver: DEFAULT_APPROVER,

            // Build artifacts
            contract_name: "GNaira".to_string(),
            artifacts_dir: PathBuf::from("./artifacts"),
            source_path: PathBuf::from("./artifacts/GNaira.flat.sol"),
            compiler_version: "v0.8.20+commit.a1b79de6".to_string(),
            optimizer_runs: 200,
            gas_limit: None,

            // Confirmation wait - ~2s blocks on Base, 5 block target
            receipt_poll_secs: 2,
            receipt_timeout_secs: 180,
            confirmations: 5,
            confirmation_poll_secs: 2,
            confirmation_timeout_secs: 120,

            // Verification
            verifier_api_url: "https://api-sepolia.basescan.org/api".to_string(),
            explorer_url: "https://sepolia.basescan.org".to_string(),
        }
    }
}

impl DeployConfig {
    /// Load configuration from TOML file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    // Builder-style methods for CLI overrides

    pub fn with_rpc_url(mut self, url: Option<String>) -> Self {
        if let Some(url) = url {
            self.rpc_url = url;
        }
        self
    }

    pub fn with_network(mut self, network: Option<String>) -> Self {
        if let Some(network) = network {
            self.network = network;
        }
        self
    }

    pub fn with_from(mut self, from: Option<Address>) -> Self {
        if let Some(from) = from {
            self.from = from;
        }
        self
    }

    pub fn with_governor(mut self, governor: Option<Address>) -> Self {
        if let Some(governor) = governor {
            self.governor = governor;
        }
        self
    }

    pub fn with_approver(mut self, approver: Option<Address>) -> Self {
        if let Some(approver) = approver {
            self.approver = approver;
        }
        self
    }

    pub fn with_artifacts_dir(mut self, dir: Option<PathBuf>) -> Self {
        if let Some(dir) = dir {
            self.artifacts_dir = dir;
        }
        self
    }

    pub fn with_confirmations(mut self, confirmations: Option<u64>) -> Self {
        if let Some(confirmations) = confirmations {
            self.confirmations = confirmations;
        }
        self
    }

    /// Validate configuration values
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.network.trim().is_empty() {
            anyhow::bail!("network must not be empty");
        }

        if !self.rpc_url.starts_with("http://") && !self.rpc_url.starts_with("https://") {
            anyhow::bail!("rpc_url ({}) must be an http(s) endpoint", self.rpc_url);
        }

        if self.contract_name.trim().is_empty() {
            anyhow::bail!("contract_name must not be empty");
        }

        if self.confirmations == 0 {
            anyhow::bail!("confirmations must be at least 1");
        }

        if self.receipt_poll_secs == 0 || self.confirmation_poll_secs == 0 {
            anyhow::bail!("poll intervals must be non-zero");
        }

        if self.receipt_poll_secs >= self.receipt_timeout_secs {
            anyhow::bail!(
                "receipt_poll_secs ({}) must be less than receipt_timeout_secs ({})",
                self.receipt_poll_secs,
                self.receipt_timeout_secs
            );
        }

        if self.confirmation_poll_secs >= self.confirmation_timeout_secs {
            anyhow::bail!(
                "confirmation_poll_secs ({}) must be less than confirmation_timeout_secs ({})",
                self.confirmation_poll_secs,
                self.confirmation_timeout_secs
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DeployConfig::default();
        assert_eq!(config.network, "base_sepolia");
        assert_eq!(config.contract_name, "GNaira");
        assert_eq!(config.confirmations, 5);
        assert_eq!(
            config.governor.to_string(),
            "0x06a9c53e1dd1d4411f21d0aad3b98448c343dcae"
        );
        assert_eq!(
            config.approver.to_string(),
            "0x4e143f76ce2fbef0898766bbf8093ffc6aad7a89"
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = DeployConfig::default();
        assert!(config.validate().is_ok());

        // Invalid: depth target of zero
        config.confirmations = 0;
        assert!(config.validate().is_err());

        // Invalid: poll >= timeout
        config = DeployConfig::default();
        config.confirmation_poll_secs = 300;
        assert!(config.validate().is_err());

        // Invalid: non-http endpoint
        config = DeployConfig::default();
        config.rpc_url = "ws://sepolia.base.org".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_builder_methods() {
        let config = DeployConfig::default()
            .with_network(Some("base_mainnet".to_string()))
            .with_confirmations(Some(12))
            .with_rpc_url(None);

        assert_eq!(config.network, "base_mainnet");
        assert_eq!(config.confirmations, 12);
        assert_eq!(config.rpc_url, "https://sepolia.base.org");
    }

    #[test]
    fn test_toml_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deploy.toml");

        let config = DeployConfig::default().with_confirmations(Some(3));
        config.save(&path).unwrap();

        let loaded = DeployConfig::load(&path).unwrap();
        assert_eq!(loaded.confirmations, 3);
        assert_eq!(loaded.governor, config.governor);
        assert_eq!(loaded.network, config.network);
    }
}
