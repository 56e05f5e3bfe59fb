use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use solana_sdk::{signature::Signature, transaction::VersionedTransaction};
use tracing::{info, warn};

use crate::config::Mode;
use crate::constants::MAX_BUNDLE_TRANSACTIONS;
use crate::errors::SubmissionError;
use crate::rpc::ChainClient;

/// Fully signed transactions destined for one submission.
///
/// Construction consumes the transactions; a dispatched bundle cannot be
/// handed out again.
#[derive(Debug)]
pub struct Bundle {
    transactions: Vec<VersionedTransaction>,
}

impl Bundle {
    pub fn new(transactions: Vec<VersionedTransaction>) -> Result<Self, SubmissionError> {
        if transactions.is_empty() {
            return Err(SubmissionError::EmptyBundle);
        }
        if transactions.len() > MAX_BUNDLE_TRANSACTIONS {
            return Err(SubmissionError::BundleTooLarge {
                len: transactions.len(),
                max: MAX_BUNDLE_TRANSACTIONS,
            });
        }
        if let Some(index) = transactions.iter().position(|tx| !is_fully_signed(tx)) {
            return Err(SubmissionError::PartiallySigned { index });
        }
        Ok(Self { transactions })
    }

    pub fn single(transaction: VersionedTransaction) -> Result<Self, SubmissionError> {
        Self::new(vec![transaction])
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    pub fn transactions(&self) -> &[VersionedTransaction] {
        &self.transactions
    }
}

fn is_fully_signed(tx: &VersionedTransaction) -> bool {
    let required = tx.message.header().num_required_signatures as usize;
    tx.signatures.len() == required
        && tx.signatures.iter().all(|sig| *sig != Signature::default())
        && tx.verify_with_results().into_iter().all(|ok| ok)
}

/// Atomic multi-transaction submission.
#[async_trait]
pub trait BlockEngine: Send + Sync {
    /// Submits all transactions as one all-or-nothing bundle; returns the
    /// bundle id.
    async fn send_bundle(&self, transactions: &[VersionedTransaction]) -> Result<String, SubmissionError>;
}

/// Jito block engine over its JSON-RPC `sendBundle` endpoint.
pub struct JitoBlockEngine {
    client: reqwest::Client,
    url: String,
}

#[derive(Serialize)]
struct EncodingOption {
    encoding: &'static str,
}

#[derive(Serialize)]
struct SendBundleRequest {
    jsonrpc: &'static str,
    id: u64,
    method: &'static str,
    params: (Vec<String>, EncodingOption),
}

#[derive(Deserialize)]
struct RpcErrorBody {
    message: String,
}

#[derive(Deserialize)]
struct SendBundleResponse {
    result: Option<String>,
    error: Option<RpcErrorBody>,
}

impl JitoBlockEngine {
    pub fn new(url: impl Into<String>) -> Result<Self, SubmissionError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| SubmissionError::BlockEngine(e.to_string()))?;
        Ok(Self {
            client,
            url: url.into().trim_end_matches('/').to_string(),
        })
    }

    fn bundle_request(transactions: &[VersionedTransaction]) -> Result<SendBundleRequest, SubmissionError> {
        let encoded = transactions
            .iter()
            .map(|tx| {
                bincode::serialize(tx)
                    .map(|bytes| STANDARD.encode(bytes))
                    .map_err(|e| SubmissionError::Encode(e.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(SendBundleRequest {
            jsonrpc: "2.0",
            id: 1,
            method: "sendBundle",
            params: (encoded, EncodingOption { encoding: "base64" }),
        })
    }
}

#[async_trait]
impl BlockEngine for JitoBlockEngine {
    async fn send_bundle(&self, transactions: &[VersionedTransaction]) -> Result<String, SubmissionError> {
        let request = Self::bundle_request(transactions)?;
        let response = self
            .client
            .post(format!("{}/api/v1/bundles", self.url))
            .json(&request)
            .send()
            .await
            .map_err(|e| SubmissionError::BlockEngine(e.to_string()))?;

        let status = response.status();
        let body: SendBundleResponse = response
            .json()
            .await
            .map_err(|e| SubmissionError::BlockEngine(format!("{status}: {e}")))?;
        match (body.result, body.error) {
            (Some(bundle_id), _) => Ok(bundle_id),
            (None, Some(error)) => Err(SubmissionError::BlockEngine(error.message)),
            (None, None) => Err(SubmissionError::BlockEngine(format!("{status}: empty response"))),
        }
    }
}

/// Outcome of a dispatch.
#[derive(Debug)]
pub enum DispatchReport {
    /// Accepted by the block engine as one atomic bundle.
    Bundle { bundle_id: String },
    /// Sent one by one; each transaction landed or failed on its own.
    Independent(Vec<Result<Signature, SubmissionError>>),
}

impl DispatchReport {
    pub fn all_succeeded(&self) -> bool {
        match self {
            DispatchReport::Bundle { .. } => true,
            DispatchReport::Independent(results) => results.iter().all(Result::is_ok),
        }
    }
}

impl fmt::Display for DispatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchReport::Bundle { bundle_id } => write!(f, "Bundle: {bundle_id}"),
            DispatchReport::Independent(results) => {
                for (i, result) in results.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    match result {
                        Ok(signature) => write!(f, "Sig: {signature}")?,
                        Err(err) => write!(f, "Error: {err}")?,
                    }
                }
                Ok(())
            }
        }
    }
}

/// Sends bundles according to the configured mode.
///
/// On mainnet every bundle goes to the block engine atomically. On devnet
/// there is no block engine, so the transactions are sent through the RPC
/// node one at a time and may land partially. Nothing is retried.
#[derive(Clone)]
pub struct BundleDispatcher {
    mode: Mode,
    block_engine: Arc<dyn BlockEngine>,
    chain: Arc<dyn ChainClient>,
}

impl BundleDispatcher {
    pub fn new(mode: Mode, block_engine: Arc<dyn BlockEngine>, chain: Arc<dyn ChainClient>) -> Self {
        Self {
            mode,
            block_engine,
            chain,
        }
    }

    pub async fn dispatch(&self, bundle: Bundle) -> Result<DispatchReport, SubmissionError> {
        match self.mode {
            Mode::Mainnet => {
                let bundle_id = self.block_engine.send_bundle(bundle.transactions()).await?;
                info!(%bundle_id, transactions = bundle.len(), "bundle accepted");
                Ok(DispatchReport::Bundle { bundle_id })
            }
            Mode::Devnet => {
                let mut results = Vec::with_capacity(bundle.len());
                for tx in bundle.transactions() {
                    let result = self.chain.send_transaction(tx).await.map_err(SubmissionError::from);
                    match &result {
                        Ok(signature) => info!(%signature, "transaction sent"),
                        Err(err) => warn!(%err, "transaction failed"),
                    }
                    results.push(result);
                }
                Ok(DispatchReport::Independent(results))
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use super::*;

    /// Records submitted bundles instead of sending them.
    #[derive(Default)]
    pub struct MockBlockEngine {
        pub submitted: Mutex<Vec<Vec<VersionedTransaction>>>,
        pub reject: bool,
    }

    #[async_trait]
    impl BlockEngine for MockBlockEngine {
        async fn send_bundle(&self, transactions: &[VersionedTransaction]) -> Result<String, SubmissionError> {
            if self.reject {
                return Err(SubmissionError::BlockEngine("bundle dropped".to_string()));
            }
            let mut submitted = self.submitted.lock().unwrap();
            submitted.push(transactions.to_vec());
            Ok(format!("bundle-{}", submitted.len()))
        }
    }
}
