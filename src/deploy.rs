//! Deployment runner
//!
//! One forward pass: resolve the compiled blueprint, submit the creation
//! transaction, wait for inclusion, wait for confirmation depth, then ask
//! the verification service to match the source. Everything up to and
//! including inclusion is fatal; verification is best-effort and the run
//! succeeds without it.

use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::abi;
use crate::artifacts::ArtifactRegistry;
use crate::config::DeployConfig;
use crate::error::DeployError;
use crate::rpc::ChainBackend;
use crate::types::{to_hex_prefixed, Address, Quantity, TransactionReceipt, TransactionRequest, TxHash};
use crate::verify::{VerificationBackend, VerificationRequest, VerifyError};

/// What a completed run produced
#[derive(Debug, Clone)]
pub struct DeploymentOutcome {
    pub address: Address,
    pub tx_hash: TxHash,
    pub block: u64,
    pub verified: bool,
}

pub struct DeployRunner<C, V> {
    config: DeployConfig,
    artifacts: ArtifactRegistry,
    chain: C,
    /// None when verification was skipped by the operator
    verifier: Option<V>,
}

impl<C: ChainBackend, V: VerificationBackend> DeployRunner<C, V> {
    pub fn new(config: DeployConfig, artifacts: ArtifactRegistry, chain: C, verifier: Option<V>) -> Self {
        Self {
            config,
            artifacts,
            chain,
            verifier,
        }
    }

    /// Run the deployment pass end to end
    pub async fn run(&self) -> Result<DeploymentOutcome, DeployError> {
        let ctor_args = [self.config.governor, self.config.approver];

        // 1. Resolve the blueprint
        let artifact = self.artifacts.load(&self.config.contract_name)?;
        let artifact_path = self.artifacts.artifact_path(&self.config.contract_name);
        let creation_code = artifact.creation_code(&artifact_path, &ctor_args)?;

        info!(
            contract = %self.config.contract_name,
            network = %self.config.network,
            governor = %self.config.governor,
            approver = %self.config.approver,
            "🚀 Deploying contract"
        );

        // 2. Submit the creation transaction; submission failures are fatal
        //    and not retried, the operator re-runs
        let request = TransactionRequest {
            from: self.config.from,
            to: None,
            data: to_hex_prefixed(&creation_code),
            gas: self.config.gas_limit.map(Quantity),
        };
        let tx_hash = self
            .chain
            .send_transaction(&request)
            .await
            .map_err(DeployError::Submission)?;
        info!(tx = %tx_hash, "Creation transaction submitted");

        // 3. Await inclusion
        let receipt = self.wait_for_receipt(&tx_hash).await?;
        if receipt.status.0 == 0 {
            return Err(DeployError::Reverted { tx: tx_hash });
        }

        // 4. The deployed address exists only from this point on
        let address = receipt
            .contract_address
            .ok_or(DeployError::MissingAddress { tx: tx_hash })?;
        let block = receipt.block_number.0;
        info!(%address, block, "✅ Contract deployed");
        info!(
            "View contract: {}/address/{}",
            self.config.explorer_url, address
        );

        // 5. Wait for confirmation depth before asking the verifier, so it
        //    sees the creation transaction on its own node
        self.wait_for_confirmations(block).await;

        // 6. Verification is non-fatal: log and continue on any error
        let verified = match &self.verifier {
            Some(verifier) => self.run_verification(verifier, address, &ctor_args).await,
            None => {
                info!("Verification skipped");
                false
            }
        };

        Ok(DeploymentOutcome {
            address,
            tx_hash,
            block,
            verified,
        })
    }

    /// Poll for the receipt until the chain confirms inclusion, bounded by
    /// receipt_timeout_secs
    async fn wait_for_receipt(&self, tx_hash: &TxHash) -> Result<TransactionReceipt, DeployError> {
        let started = Instant::now();
        let deadline = started + Duration::from_secs(self.config.receipt_timeout_secs);

        loop {
            if let Some(receipt) = self.chain.transaction_receipt(tx_hash).await? {
                return Ok(receipt);
            }
            if Instant::now() >= deadline {
                return Err(DeployError::ReceiptTimeout {
                    tx: *tx_hash,
                    waited_secs: started.elapsed().as_secs(),
                });
            }
            debug!(tx = %tx_hash, "Waiting for inclusion");
            sleep(Duration::from_secs(self.config.receipt_poll_secs)).await;
        }
    }

    /// Poll the chain head until the deployment is `confirmations` blocks
    /// deep. Bounded by confirmation_timeout_secs: depth is a heuristic for
    /// the verifier's benefit, not a gate that should strand a completed
    /// deployment, so on timeout we warn and move on.
    async fn wait_for_confirmations(&self, deploy_block: u64) {
        let target = deploy_block + self.config.confirmations;
        let deadline = Instant::now() + Duration::from_secs(self.config.confirmation_timeout_secs);

        info!(
            confirmations = self.config.confirmations,
            "Waiting for block confirmations"
        );

        loop {
            match self.chain.block_number().await {
                Ok(head) if head >= target => {
                    info!(depth = head - deploy_block, "Confirmation depth reached");
                    return;
                }
                Ok(head) => {
                    debug!(depth = head.saturating_sub(deploy_block), "Still confirming");
                }
                Err(e) => {
                    warn!(error = %e, "Head query failed while confirming");
                }
            }
            if Instant::now() >= deadline {
                warn!(
                    timeout_secs = self.config.confirmation_timeout_secs,
                    "Confirmation wait timed out, proceeding to verification"
                );
                return;
            }
            sleep(Duration::from_secs(self.config.confirmation_poll_secs)).await;
        }
    }

    /// Verify with the exact constructor arguments used at creation.
    /// Returns whether the service accepted the match.
    async fn run_verification(&self, verifier: &V, address: Address, ctor_args: &[Address]) -> bool {
        let request = match self.build_verification_request(address, ctor_args) {
            Ok(request) => request,
            Err(e) => {
                self.log_manual_verification(address, &e);
                return false;
            }
        };

        match verifier.verify(&request).await {
            Ok(()) => {
                info!("✅ Contract verified");
                info!(
                    "View verified source: {}/address/{}#code",
                    self.config.explorer_url, address
                );
                true
            }
            Err(e) => {
                self.log_manual_verification(address, &e);
                false
            }
        }
    }

    fn build_verification_request(
        &self,
        address: Address,
        ctor_args: &[Address],
    ) -> Result<VerificationRequest, VerifyError> {
        let source = std::fs::read_to_string(&self.config.source_path)?;
        Ok(VerificationRequest {
            address,
            network: self.config.network.clone(),
            contract_name: self.config.contract_name.clone(),
            compiler_version: self.config.compiler_version.clone(),
            source,
            constructor_args_hex: abi::constructor_args_hex(ctor_args),
            optimizer_runs: self.config.optimizer_runs,
        })
    }

    /// The deployment stands; give the operator everything needed to retry
    /// verification by hand
    fn log_manual_verification(&self, address: Address, error: &VerifyError) {
        warn!(error = %error, "Verification failed; deployment is unaffected");
        warn!("Retry manually with these parameters:");
        warn!("  Contract address: {address}");
        warn!(
            "  Constructor arguments: [{}, {}]",
            self.config.governor, self.config.approver
        );
        warn!("  Network: {}", self.config.network);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::RpcError;
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::{Arc, Mutex};

    const DEPLOY_BLOCK: u64 = 100;

    fn contract_address() -> Address {
        "0x1111111111111111111111111111111111111111".parse().unwrap()
    }

    fn tx_hash() -> TxHash {
        TxHash([0xab; 32])
    }

    /// Scripted chain: configurable head progression and receipt behavior
    struct MockChain {
        sent: Mutex<Vec<TransactionRequest>>,
        fail_send: bool,
        revert: bool,
        /// Receipt polls that come back empty before the receipt appears
        receipt_delay_polls: u64,
        receipt_polls: AtomicU64,
        head: Arc<AtomicU64>,
        /// Blocks the head advances per query; 0 simulates a stalled chain
        head_advance: u64,
    }

    impl MockChain {
        fn new() -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                fail_send: false,
                revert: false,
                receipt_delay_polls: 0,
                receipt_polls: AtomicU64::new(0),
                head: Arc::new(AtomicU64::new(DEPLOY_BLOCK)),
                head_advance: 1,
            }
        }

        fn sent_count(&self) -> usize {
            self.sent.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ChainBackend for Arc<MockChain> {
        async fn chain_id(&self) -> Result<u64, RpcError> {
            Ok(84532)
        }

        async fn block_number(&self) -> Result<u64, RpcError> {
            Ok(self.head.fetch_add(self.head_advance, Ordering::SeqCst))
        }

        async fn send_transaction(&self, tx: &TransactionRequest) -> Result<TxHash, RpcError> {
            if self.fail_send {
                return Err(RpcError::Node {
                    code: -32000,
                    message: "insufficient funds".to_string(),
                });
            }
            self.sent.lock().unwrap().push(tx.clone());
            Ok(tx_hash())
        }

        async fn transaction_receipt(
            &self,
            hash: &TxHash,
        ) -> Result<Option<TransactionReceipt>, RpcError> {
            let polls = self.receipt_polls.fetch_add(1, Ordering::SeqCst);
            if polls < self.receipt_delay_polls {
                return Ok(None);
            }
            Ok(Some(TransactionReceipt {
                transaction_hash: *hash,
                contract_address: Some(contract_address()),
                block_number: Quantity(DEPLOY_BLOCK),
                status: Quantity(if self.revert { 0 } else { 1 }),
                gas_used: Some(Quantity(1_500_000)),
            }))
        }
    }

    /// Recording verifier; snapshots the chain head at the moment of the call
    struct MockVerifier {
        calls: Mutex<Vec<VerificationRequest>>,
        fail: bool,
        head: Arc<AtomicU64>,
        head_at_verify: AtomicU64,
    }

    impl MockVerifier {
        fn new(head: Arc<AtomicU64>) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                fail: false,
                head,
                head_at_verify: AtomicU64::new(0),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl VerificationBackend for Arc<MockVerifier> {
        async fn verify(&self, request: &VerificationRequest) -> Result<(), VerifyError> {
            self.head_at_verify
                .store(self.head.load(Ordering::SeqCst), Ordering::SeqCst);
            self.calls.lock().unwrap().push(request.clone());
            if self.fail {
                return Err(VerifyError::Failed("Unable to verify".to_string()));
            }
            Ok(())
        }
    }

    fn write_fixtures(dir: &Path) {
        let artifact = serde_json::json!({
            "contractName": "GNaira",
            "abi": [],
            "bytecode": "0x60806040",
        });
        std::fs::write(
            dir.join("GNaira.json"),
            serde_json::to_string(&artifact).unwrap(),
        )
        .unwrap();
        std::fs::write(dir.join("GNaira.flat.sol"), "contract GNaira {}").unwrap();
    }

    fn test_config(dir: &Path) -> DeployConfig {
        let mut config = DeployConfig::default();
        config.artifacts_dir = dir.to_path_buf();
        config.source_path = dir.join("GNaira.flat.sol");
        config.receipt_poll_secs = 1;
        config.receipt_timeout_secs = 30;
        config.confirmations = 5;
        config.confirmation_poll_secs = 1;
        config.confirmation_timeout_secs = 60;
        config
    }

    fn runner(
        config: DeployConfig,
        chain: Arc<MockChain>,
        verifier: Option<Arc<MockVerifier>>,
    ) -> DeployRunner<Arc<MockChain>, Arc<MockVerifier>> {
        let artifacts = ArtifactRegistry::new(config.artifacts_dir.clone());
        DeployRunner::new(config, artifacts, chain, verifier)
    }

    #[tokio::test(start_paused = true)]
    async fn test_successful_run_submits_once_and_verifies_once() {
        let dir = tempfile::tempdir().unwrap();
        write_fixtures(dir.path());
        let config = test_config(dir.path());

        let chain = Arc::new(MockChain::new());
        let verifier = Arc::new(MockVerifier::new(chain.head.clone()));

        let outcome = runner(config.clone(), chain.clone(), Some(verifier.clone()))
            .run()
            .await
            .unwrap();

        assert_eq!(outcome.address, contract_address());
        assert_eq!(outcome.block, DEPLOY_BLOCK);
        assert!(outcome.verified);

        // exactly one creation transaction, carrying bytecode ++ both args
        assert_eq!(chain.sent_count(), 1);
        let sent = chain.sent.lock().unwrap();
        let expected_data = format!(
            "0x60806040{}",
            abi::constructor_args_hex(&[config.governor, config.approver])
        );
        assert_eq!(sent[0].data, expected_data);
        assert!(sent[0].to.is_none());

        // exactly one verification, with the same arguments plus the address
        assert_eq!(verifier.call_count(), 1);
        let calls = verifier.calls.lock().unwrap();
        assert_eq!(calls[0].address, contract_address());
        assert_eq!(
            calls[0].constructor_args_hex,
            abi::constructor_args_hex(&[config.governor, config.approver])
        );
        assert_eq!(calls[0].network, config.network);
        assert_eq!(calls[0].source, "contract GNaira {}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_submission_failure_is_fatal_and_skips_verification() {
        let dir = tempfile::tempdir().unwrap();
        write_fixtures(dir.path());

        let mut chain = MockChain::new();
        chain.fail_send = true;
        let chain = Arc::new(chain);
        let verifier = Arc::new(MockVerifier::new(chain.head.clone()));

        let result = runner(test_config(dir.path()), chain.clone(), Some(verifier.clone()))
            .run()
            .await;

        assert!(matches!(result, Err(DeployError::Submission(_))));
        assert_eq!(verifier.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reverted_constructor_is_fatal_and_skips_verification() {
        let dir = tempfile::tempdir().unwrap();
        write_fixtures(dir.path());

        let mut chain = MockChain::new();
        chain.revert = true;
        let chain = Arc::new(chain);
        let verifier = Arc::new(MockVerifier::new(chain.head.clone()));

        let result = runner(test_config(dir.path()), chain, Some(verifier.clone()))
            .run()
            .await;

        assert!(matches!(result, Err(DeployError::Reverted { .. })));
        assert_eq!(verifier.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_artifact_submits_nothing() {
        let dir = tempfile::tempdir().unwrap();
        // no fixtures written: nothing has been compiled

        let chain = Arc::new(MockChain::new());
        let verifier = Arc::new(MockVerifier::new(chain.head.clone()));
        let mut config = test_config(dir.path());
        config.source_path = dir.path().join("GNaira.flat.sol");

        let result = runner(config, chain.clone(), Some(verifier)).run().await;

        assert!(matches!(result, Err(DeployError::ArtifactNotFound { .. })));
        assert_eq!(chain.sent_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_verification_failure_still_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        write_fixtures(dir.path());

        let chain = Arc::new(MockChain::new());
        let mut verifier = MockVerifier::new(chain.head.clone());
        verifier.fail = true;
        let verifier = Arc::new(verifier);

        let outcome = runner(test_config(dir.path()), chain, Some(verifier.clone()))
            .run()
            .await
            .unwrap();

        assert!(!outcome.verified);
        assert_eq!(outcome.address, contract_address());
        assert_eq!(verifier.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_verification_waits_for_confirmation_depth() {
        let dir = tempfile::tempdir().unwrap();
        write_fixtures(dir.path());
        let config = test_config(dir.path());
        let confirmations = config.confirmations;

        // head advances one block per poll, so reaching depth takes polls
        let chain = Arc::new(MockChain::new());
        let verifier = Arc::new(MockVerifier::new(chain.head.clone()));

        runner(config, chain.clone(), Some(verifier.clone()))
            .run()
            .await
            .unwrap();

        let head_at_verify = verifier.head_at_verify.load(Ordering::SeqCst);
        assert!(
            head_at_verify >= DEPLOY_BLOCK + confirmations,
            "verification issued at depth {}, target {}",
            head_at_verify - DEPLOY_BLOCK,
            confirmations
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_head_times_out_but_run_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        write_fixtures(dir.path());
        let mut config = test_config(dir.path());
        config.confirmation_timeout_secs = 10;

        let mut chain = MockChain::new();
        chain.head_advance = 0;
        let chain = Arc::new(chain);
        let verifier = Arc::new(MockVerifier::new(chain.head.clone()));

        let started = Instant::now();
        let outcome = runner(config, chain, Some(verifier.clone()))
            .run()
            .await
            .unwrap();

        // the bounded wait elapsed in full, then verification still ran
        assert!(started.elapsed() >= Duration::from_secs(10));
        assert!(outcome.verified);
        assert_eq!(verifier.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_receipt_timeout_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        write_fixtures(dir.path());
        let mut config = test_config(dir.path());
        config.receipt_timeout_secs = 5;

        let mut chain = MockChain::new();
        chain.receipt_delay_polls = u64::MAX;
        let chain = Arc::new(chain);
        let verifier = Arc::new(MockVerifier::new(chain.head.clone()));

        let result = runner(config, chain, Some(verifier.clone())).run().await;

        assert!(matches!(result, Err(DeployError::ReceiptTimeout { .. })));
        assert_eq!(verifier.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delayed_receipt_is_awaited() {
        let dir = tempfile::tempdir().unwrap();
        write_fixtures(dir.path());

        let mut chain = MockChain::new();
        chain.receipt_delay_polls = 4;
        let chain = Arc::new(chain);
        let verifier = Arc::new(MockVerifier::new(chain.head.clone()));

        let outcome = runner(test_config(dir.path()), chain.clone(), Some(verifier))
            .run()
            .await
            .unwrap();

        assert_eq!(outcome.address, contract_address());
        assert!(chain.receipt_polls.load(Ordering::SeqCst) >= 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_skip_verify_reports_unverified() {
        let dir = tempfile::tempdir().unwrap();
        write_fixtures(dir.path());

        let chain = Arc::new(MockChain::new());
        let outcome = runner(test_config(dir.path()), chain, None)
            .run()
            .await
            .unwrap();

        assert!(!outcome.verified);
    }
}
