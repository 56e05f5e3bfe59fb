use async_trait::async_trait;
use solana_client::{nonblocking::rpc_client::RpcClient, rpc_config::RpcSendTransactionConfig};
use solana_sdk::{
    commitment_config::CommitmentConfig, hash::Hash, pubkey::Pubkey, signature::Signature,
    transaction::VersionedTransaction,
};
use tracing::debug;

use crate::errors::RpcError;

/// The slice of chain access the trader needs. Every call goes to the
/// network; nothing is cached between calls.
#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn get_account_data(&self, address: &Pubkey) -> Result<Option<Vec<u8>>, RpcError>;

    async fn get_latest_blockhash(&self) -> Result<Hash, RpcError>;

    async fn get_balance(&self, address: &Pubkey) -> Result<u64, RpcError>;

    /// Raw token amount held by `token_account`, or `None` if the account
    /// does not exist.
    async fn get_token_balance(&self, token_account: &Pubkey) -> Result<Option<u64>, RpcError>;

    async fn send_transaction(&self, transaction: &VersionedTransaction) -> Result<Signature, RpcError>;

    async fn account_exists(&self, address: &Pubkey) -> Result<bool, RpcError> {
        Ok(self.get_account_data(address).await?.is_some())
    }
}

/// RPC client at `processed` commitment, the level trades are priced at.
pub fn processed_rpc_client(url: &str) -> RpcClient {
    RpcClient::new_with_commitment(url.to_string(), CommitmentConfig::processed())
}

fn rpc_error(err: impl ToString) -> RpcError {
    RpcError(err.to_string())
}

/// Whether a `getTokenAccountBalance` failure means the account is absent
/// rather than the node being unreachable or unhealthy.
fn is_missing_account(message: &str) -> bool {
    message.contains("could not find account")
}

#[async_trait]
impl ChainClient for RpcClient {
    async fn get_account_data(&self, address: &Pubkey) -> Result<Option<Vec<u8>>, RpcError> {
        let response = self
            .get_account_with_commitment(address, self.commitment())
            .await
            .map_err(rpc_error)?;
        Ok(response.value.map(|account| account.data))
    }

    async fn get_latest_blockhash(&self) -> Result<Hash, RpcError> {
        let (blockhash, _last_valid_height) = self
            .get_latest_blockhash_with_commitment(self.commitment())
            .await
            .map_err(rpc_error)?;
        Ok(blockhash)
    }

    async fn get_balance(&self, address: &Pubkey) -> Result<u64, RpcError> {
        let response = self
            .get_balance_with_commitment(address, self.commitment())
            .await
            .map_err(rpc_error)?;
        Ok(response.value)
    }

    async fn get_token_balance(&self, token_account: &Pubkey) -> Result<Option<u64>, RpcError> {
        match self
            .get_token_account_balance_with_commitment(token_account, self.commitment())
            .await
        {
            Ok(response) => response
                .value
                .amount
                .parse::<u64>()
                .map(Some)
                .map_err(rpc_error),
            // a missing token account surfaces as an RPC error
            Err(err) if is_missing_account(&err.to_string()) => {
                debug!(%token_account, %err, "token account not found");
                Ok(None)
            }
            Err(err) => Err(rpc_error(err)),
        }
    }

    async fn send_transaction(&self, transaction: &VersionedTransaction) -> Result<Signature, RpcError> {
        self.send_transaction_with_config(
            transaction,
            RpcSendTransactionConfig {
                skip_preflight: true,
                ..RpcSendTransactionConfig::default()
            },
        )
        .await
        .map_err(rpc_error)
    }
}
