use std::sync::Arc;

use solana_sdk::{
    instruction::Instruction,
    message::{v0, VersionedMessage},
    pubkey::Pubkey,
    signature::Keypair,
    signer::Signer,
    transaction::VersionedTransaction,
};
use tracing::debug;

use crate::config::PriorityFees;
use crate::errors::SigningError;
use crate::instructions::compute_budget_instructions;
use crate::rpc::ChainClient;

/// Compiles instruction lists into signed v0 transactions.
///
/// A blockhash is fetched for every transaction right before it is compiled;
/// nothing is reused between calls.
#[derive(Clone)]
pub struct TransactionAssembler {
    chain: Arc<dyn ChainClient>,
}

impl TransactionAssembler {
    pub fn new(chain: Arc<dyn ChainClient>) -> Self {
        Self { chain }
    }

    /// Signs `instructions` with `payer` as fee payer.
    ///
    /// `signers` must cover the payer and every account flagged as signer;
    /// extra keypairs are ignored. When `priority_fees` is set, compute-budget
    /// instructions are placed in front of the list.
    pub async fn sign(
        &self,
        instructions: &[Instruction],
        payer: &Pubkey,
        signers: &[&Keypair],
        priority_fees: Option<PriorityFees>,
    ) -> Result<VersionedTransaction, SigningError> {
        for required in required_signers(instructions, payer) {
            if !signers.iter().any(|kp| kp.pubkey() == required) {
                return Err(SigningError::MissingSigner(required));
            }
        }

        let mut all_ixs = Vec::with_capacity(instructions.len() + 2);
        if let Some(fees) = priority_fees {
            all_ixs.extend(compute_budget_instructions(&fees));
        }
        all_ixs.extend_from_slice(instructions);

        let blockhash = self
            .chain
            .get_latest_blockhash()
            .await
            .map_err(SigningError::Blockhash)?;
        let message = v0::Message::try_compile(payer, &all_ixs, &[], blockhash)
            .map_err(|e| SigningError::Compile(e.to_string()))?;

        let num_required = message.header.num_required_signatures as usize;
        let signing: Vec<&Keypair> = message.account_keys[..num_required]
            .iter()
            .filter_map(|key| signers.iter().copied().find(|kp| kp.pubkey() == *key))
            .collect();

        let tx = VersionedTransaction::try_new(VersionedMessage::V0(message), signing.as_slice())
            .map_err(|e| SigningError::Sign(e.to_string()))?;
        debug!(%payer, %blockhash, signatures = tx.signatures.len(), "transaction signed");
        Ok(tx)
    }
}

/// Fee payer first, then every signer account in instruction order.
fn required_signers(instructions: &[Instruction], payer: &Pubkey) -> Vec<Pubkey> {
    let mut keys = vec![*payer];
    for meta in instructions.iter().flat_map(|ix| &ix.accounts) {
        if meta.is_signer && !keys.contains(&meta.pubkey) {
            keys.push(meta.pubkey);
        }
    }
    keys
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::testing::MockChain;
    use solana_sdk::{compute_budget, system_instruction};

    fn assembler(chain: MockChain) -> (TransactionAssembler, Arc<MockChain>) {
        let chain = Arc::new(chain);
        (TransactionAssembler::new(chain.clone()), chain)
    }

    #[tokio::test]
    async fn signs_with_fresh_blockhash_each_time() {
        let (assembler, chain) = assembler(MockChain::default());
        let payer = Keypair::new();
        let ixs = [system_instruction::transfer(&payer.pubkey(), &Pubkey::new_unique(), 10)];

        let first = assembler.sign(&ixs, &payer.pubkey(), &[&payer], None).await.unwrap();
        let second = assembler.sign(&ixs, &payer.pubkey(), &[&payer], None).await.unwrap();

        assert_eq!(chain.blockhash_calls.load(std::sync::atomic::Ordering::SeqCst), 2);
        assert_ne!(first.message.recent_blockhash(), second.message.recent_blockhash());
        assert!(first.verify_with_results().into_iter().all(|ok| ok));
    }

    #[tokio::test]
    async fn second_signer_and_extra_keys() {
        let (assembler, _) = assembler(MockChain::default());
        let (payer, mint, unrelated) = (Keypair::new(), Keypair::new(), Keypair::new());
        let mut ix = system_instruction::transfer(&payer.pubkey(), &mint.pubkey(), 10);
        ix.accounts[1].is_signer = true;

        let tx = assembler
            .sign(&[ix], &payer.pubkey(), &[&unrelated, &mint, &payer], None)
            .await
            .unwrap();
        assert_eq!(tx.signatures.len(), 2);
        assert!(tx.verify_with_results().into_iter().all(|ok| ok));
    }

    #[tokio::test]
    async fn priority_fees_go_first() {
        let (assembler, _) = assembler(MockChain::default());
        let payer = Keypair::new();
        let ixs = [system_instruction::transfer(&payer.pubkey(), &Pubkey::new_unique(), 10)];
        let fees = PriorityFees {
            unit_limit: 200_000,
            unit_price: 1_000,
        };

        let tx = assembler.sign(&ixs, &payer.pubkey(), &[&payer], Some(fees)).await.unwrap();
        let keys = tx.message.static_account_keys();
        let programs: Vec<Pubkey> = tx
            .message
            .instructions()
            .iter()
            .map(|ix| keys[ix.program_id_index as usize])
            .collect();
        assert_eq!(programs.len(), 3);
        assert_eq!(programs[0], compute_budget::ID);
        assert_eq!(programs[1], compute_budget::ID);
    }

    #[tokio::test]
    async fn missing_signer_is_reported_before_any_fetch() {
        let (assembler, chain) = assembler(MockChain::default());
        let (payer, mint) = (Keypair::new(), Keypair::new());
        let mut ix = system_instruction::transfer(&payer.pubkey(), &mint.pubkey(), 10);
        ix.accounts[1].is_signer = true;

        let err = assembler.sign(&[ix], &payer.pubkey(), &[&payer], None).await.unwrap_err();
        assert!(matches!(err, SigningError::MissingSigner(key) if key == mint.pubkey()));
        assert_eq!(chain.blockhash_calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn blockhash_failure_surfaces() {
        let (assembler, _) = assembler(MockChain {
            fail_blockhash: true,
            ..MockChain::default()
        });
        let payer = Keypair::new();
        let ixs = [system_instruction::transfer(&payer.pubkey(), &Pubkey::new_unique(), 10)];

        let err = assembler.sign(&ixs, &payer.pubkey(), &[&payer], None).await.unwrap_err();
        assert!(matches!(err, SigningError::Blockhash(_)));
    }
}
