// Build-artifact registry
//
// Reads Hardhat-style compilation artifacts (<dir>/<ContractName>.json).
// The toolchain that produces them is an external collaborator; we only
// look blueprints up by name and assemble creation code from them.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::abi::encode_constructor_args;
use crate::error::DeployError;
use crate::types::Address;

/// Compiled contract blueprint as emitted by the build toolchain
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractArtifact {
    pub contract_name: String,
    pub abi: serde_json::Value,
    /// 0x-prefixed creation bytecode
    pub bytecode: String,
}

impl ContractArtifact {
    /// Creation code for the deployment transaction: bytecode ++ encoded args
    pub fn creation_code(
        &self,
        path: &Path,
        ctor_args: &[Address],
    ) -> Result<Vec<u8>, DeployError> {
        let hex_part = self.bytecode.strip_prefix("0x").unwrap_or(&self.bytecode);
        let mut code = hex::decode(hex_part).map_err(|e| DeployError::BadArtifact {
            path: path.to_path_buf(),
            reason: format!("bytecode is not valid hex: {e}"),
        })?;
        if code.is_empty() {
            return Err(DeployError::BadArtifact {
                path: path.to_path_buf(),
                reason: "bytecode is empty (abstract contract or interface?)".to_string(),
            });
        }
        code.extend_from_slice(&encode_constructor_args(ctor_args));
        Ok(code)
    }
}

/// Lookup-by-name over a directory of compiled artifacts
#[derive(Debug, Clone)]
pub struct ArtifactRegistry {
    dir: PathBuf,
}

impl ArtifactRegistry {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path an artifact for `name` is expected at
    pub fn artifact_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.json"))
    }

    /// Load the artifact for `name`, failing if it has not been compiled
    pub fn load(&self, name: &str) -> Result<ContractArtifact, DeployError> {
        let path = self.artifact_path(name);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(DeployError::ArtifactNotFound {
                    name: name.to_string(),
                    dir: self.dir.clone(),
                })
            }
            Err(e) => {
                return Err(DeployError::BadArtifact {
                    path,
                    reason: e.to_string(),
                })
            }
        };
        serde_json::from_str(&content).map_err(|e| DeployError::BadArtifact {
            path,
            reason: e.to_string(),
        })
    }
}
