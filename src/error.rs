// Fatal error taxonomy for the deployment pass
//
// Verification errors live in verify.rs and never reach this type: the
// runner catches them, logs the reproduction parameters, and continues.

use std::path::PathBuf;

use crate::rpc::RpcError;
use crate::types::TxHash;

#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error("Build artifact for `{name}` not found in {dir:?} (has the contract been compiled?)")]
    ArtifactNotFound { name: String, dir: PathBuf },

    #[error("Malformed build artifact {path:?}: {reason}")]
    BadArtifact { path: PathBuf, reason: String },

    #[error("Transaction submission failed: {0}")]
    Submission(#[source] RpcError),

    #[error("RPC error: {0}")]
    Rpc(#[from] RpcError),

    #[error("Constructor reverted in transaction {tx}")]
    Reverted { tx: TxHash },

    #[error("No receipt for transaction {tx} after {waited_secs}s")]
    ReceiptTimeout { tx: TxHash, waited_secs: u64 },

    #[error("Receipt for transaction {tx} carries no contract address")]
    MissingAddress { tx: TxHash },
}
