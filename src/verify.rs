// Source-verification service client (Etherscan API family)
//
// Failures here are best-effort territory: the runner logs them together
// with the parameters needed to retry manually and keeps the deployment.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

use crate::types::Address;

#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    #[error("Verifier transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Could not read contract source: {0}")]
    Source(#[from] std::io::Error),

    #[error("Verifier rejected submission: {0}")]
    Rejected(String),

    #[error("Verification failed: {0}")]
    Failed(String),

    #[error("Verification still pending after {attempts} status checks")]
    Pending { attempts: u32 },
}

/// Everything the verification service needs to recompute the deployed
/// bytecode. The constructor arguments must be the exact encoding used
/// at creation or the match will fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationRequest {
    pub address: Address,
    pub network: String,
    pub contract_name: String,
    pub compiler_version: String,
    pub source: String,
    /// Hex without 0x, as produced by abi::constructor_args_hex
    pub constructor_args_hex: String,
    pub optimizer_runs: u32,
}

#[async_trait]
pub trait VerificationBackend: Send + Sync {
    async fn verify(&self, request: &VerificationRequest) -> Result<(), VerifyError>;
}

/// status/message/result envelope shared by all Etherscan-family endpoints
#[derive(Debug, Deserialize)]
struct ApiResponse {
    status: String,
    #[allow(dead_code)]
    message: String,
    result: String,
}

impl ApiResponse {
    fn is_ok(&self) -> bool {
        self.status == "1"
    }

    fn is_pending(&self) -> bool {
        self.result.contains("Pending in queue")
    }
}

/// Client for a Basescan/Etherscan-style verification API
pub struct EtherscanVerifier {
    api_url: String,
    api_key: String,
    client: reqwest::Client,
    status_poll_interval: Duration,
    max_status_checks: u32,
}

impl EtherscanVerifier {
    pub fn new(api_url: &str, api_key: &str) -> Self {
        Self {
            api_url: api_url.to_string(),
            api_key: api_key.to_string(),
            client: reqwest::Client::new(),
            status_poll_interval: Duration::from_secs(5),
            max_status_checks: 10,
        }
    }

    pub fn with_status_poll(mut self, interval: Duration, max_checks: u32) -> Self {
        self.status_poll_interval = interval;
        self.max_status_checks = max_checks;
        self
    }

    /// Form fields for the verifysourcecode submission.
    /// "constructorArguements" is the API's own spelling.
    fn submit_params(&self, request: &VerificationRequest) -> Vec<(&'static str, String)> {
        vec![
            ("apikey", self.api_key.clone()),
            ("module", "contract".to_string()),
            ("action", "verifysourcecode".to_string()),
            ("contractaddress", request.address.to_string()),
            ("sourceCode", request.source.clone()),
            ("codeformat", "solidity-single-file".to_string()),
            ("contractname", request.contract_name.clone()),
            ("compilerversion", request.compiler_version.clone()),
            ("optimizationUsed", "1".to_string()),
            ("runs", request.optimizer_runs.to_string()),
            ("constructorArguements", request.constructor_args_hex.clone()),
        ]
    }

    fn status_params(&self, guid: &str) -> Vec<(&'static str, String)> {
        vec![
            ("apikey", self.api_key.clone()),
            ("module", "contract".to_string()),
            ("action", "checkverifystatus".to_string()),
            ("guid", guid.to_string()),
        ]
    }

    async fn post_form(&self, params: &[(&'static str, String)]) -> Result<ApiResponse, VerifyError> {
        let response = self
            .client
            .post(&self.api_url)
            .form(params)
            .send()
            .await?
            .error_for_status()
            .map_err(VerifyError::Transport)?;
        Ok(response.json().await?)
    }

    /// Submit the source and return the receipt GUID for status polling
    async fn submit(&self, request: &VerificationRequest) -> Result<String, VerifyError> {
        let response = self.post_form(&self.submit_params(request)).await?;
        if !response.is_ok() {
            return Err(VerifyError::Rejected(response.result));
        }
        debug!(guid = %response.result, "verification submitted");
        Ok(response.result)
    }

    /// Poll checkverifystatus until the service settles or we give up
    async fn await_result(&self, guid: &str) -> Result<(), VerifyError> {
        for attempt in 1..=self.max_status_checks {
            tokio::time::sleep(self.status_poll_interval).await;

            let response = self.post_form(&self.status_params(guid)).await?;
            if response.is_ok() {
                return Ok(());
            }
            if response.is_pending() {
                debug!(attempt, "verification pending in queue");
                continue;
            }
            return Err(VerifyError::Failed(response.result));
        }
        Err(VerifyError::Pending {
            attempts: self.max_status_checks,
        })
    }
}

#[async_trait]
impl VerificationBackend for EtherscanVerifier {
    async fn verify(&self, request: &VerificationRequest) -> Result<(), VerifyError> {
        info!(
            address = %request.address,
            network = %request.network,
            "submitting source verification"
        );
        let guid = self.submit(request).await?;
        self.await_result(&guid).await
    }
}
