// JSON-RPC client for the chain node

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::types::{parse_quantity, TransactionReceipt, TransactionRequest, TxHash};

/// JSON-RPC request
#[derive(Debug, Serialize)]
struct JsonRpcRequest {
    jsonrpc: &'static str,
    method: String,
    params: serde_json::Value,
    id: u64,
}

/// JSON-RPC response
#[derive(Debug, Deserialize)]
struct JsonRpcResponse<T> {
    #[allow(dead_code)]
    jsonrpc: String,
    result: Option<T>,
    error: Option<JsonRpcErrorBody>,
    #[allow(dead_code)]
    id: u64,
}

/// JSON-RPC error body
#[derive(Debug, Deserialize)]
struct JsonRpcErrorBody {
    code: i64,
    message: String,
}

#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("Network error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP error: {0}")]
    Http(reqwest::StatusCode),

    #[error("Node rejected request (code {code}): {message}")]
    Node { code: i64, message: String },

    #[error("Empty response for {method}")]
    Empty { method: String },

    #[error("Malformed response: {0}")]
    Malformed(String),
}

/// Operations the deployment pass needs from the chain, behind a seam so
/// the runner can be exercised against a scripted chain in tests.
#[async_trait]
pub trait ChainBackend: Send + Sync {
    async fn chain_id(&self) -> Result<u64, RpcError>;
    async fn block_number(&self) -> Result<u64, RpcError>;
    async fn send_transaction(&self, tx: &TransactionRequest) -> Result<TxHash, RpcError>;
    async fn transaction_receipt(
        &self,
        hash: &TxHash,
    ) -> Result<Option<TransactionReceipt>, RpcError>;
}

/// HTTP JSON-RPC client for an Ethereum-family node
pub struct ChainClient {
    url: String,
    client: reqwest::Client,
    request_id: AtomicU64,
}

impl ChainClient {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            client: reqwest::Client::new(),
            request_id: AtomicU64::new(1),
        }
    }

    fn next_id(&self) -> u64 {
        self.request_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Make a JSON-RPC call; None means the node returned a null result
    async fn call_opt<T: DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<Option<T>, RpcError> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            method: method.to_string(),
            params,
            id: self.next_id(),
        };

        let response = self.client.post(&self.url).json(&request).send().await?;

        if !response.status().is_success() {
            return Err(RpcError::Http(response.status()));
        }

        let json_response: JsonRpcResponse<T> = response
            .json()
            .await
            .map_err(|e| RpcError::Malformed(e.to_string()))?;

        if let Some(error) = json_response.error {
            return Err(RpcError::Node {
                code: error.code,
                message: error.message,
            });
        }

        Ok(json_response.result)
    }

    /// Make a JSON-RPC call where a null result is a protocol violation
    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<T, RpcError> {
        self.call_opt(method, params)
            .await?
            .ok_or_else(|| RpcError::Empty {
                method: method.to_string(),
            })
    }

    async fn call_quantity(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<u64, RpcError> {
        let raw: String = self.call(method, params).await?;
        parse_quantity(&raw).map_err(|e| RpcError::Malformed(e.to_string()))
    }
}

#[async_trait]
impl ChainBackend for ChainClient {
    async fn chain_id(&self) -> Result<u64, RpcError> {
        self.call_quantity("eth_chainId", serde_json::json!([])).await
    }

    async fn block_number(&self) -> Result<u64, RpcError> {
        self.call_quantity("eth_blockNumber", serde_json::json!([])).await
    }

    async fn send_transaction(&self, tx: &TransactionRequest) -> Result<TxHash, RpcError> {
        self.call("eth_sendTransaction", serde_json::json!([tx])).await
    }

    async fn transaction_receipt(
        &self,
        hash: &TxHash,
    ) -> Result<Option<TransactionReceipt>, RpcError> {
        self.call_opt("eth_getTransactionReceipt", serde_json::json!([hash.to_string()]))
            .await
    }
}
