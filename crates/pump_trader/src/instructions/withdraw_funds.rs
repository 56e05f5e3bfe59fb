use anchor_spl::associated_token::get_associated_token_address;
use anchor_spl::token::{self, spl_token};
use solana_sdk::{instruction::Instruction, pubkey::Pubkey, system_instruction};

use crate::constants::WITHDRAW_RESERVE_LAMPORTS;
use crate::errors::BuildError;

/// # Withdraw Funds
///
/// Sweeps the trade account's SOL to the withdrawal address, leaving
/// `WITHDRAW_RESERVE_LAMPORTS` behind to pay the transfer fee.
///
/// Returns `None` when the balance does not cover the reserve; there is
/// nothing to move in that case.
pub fn withdraw_instruction(from: &Pubkey, to: &Pubkey, balance: u64) -> Option<(Instruction, u64)> {
    let lamports = balance.checked_sub(WITHDRAW_RESERVE_LAMPORTS).filter(|l| *l > 0)?;
    Some((system_instruction::transfer(from, to, lamports), lamports))
}

/// Closes `owner`'s token account for `mint`, returning its rent to `owner`.
/// The token program refuses to close an account that still holds tokens.
pub fn close_token_account_instruction(owner: &Pubkey, mint: &Pubkey) -> Result<Instruction, BuildError> {
    let account = get_associated_token_address(owner, mint);
    spl_token::instruction::close_account(&token::ID, &account, owner, owner, &[])
        .map_err(|e| BuildError::Instruction(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::system_program;

    #[test]
    fn withdraw_keeps_fee_reserve() {
        let (from, to) = (Pubkey::new_unique(), Pubkey::new_unique());
        let (ix, lamports) = withdraw_instruction(&from, &to, 1_000_005_000).unwrap();

        assert_eq!(lamports, 1_000_000_000);
        assert_eq!(ix.program_id, system_program::ID);
        assert_eq!(ix.accounts[0].pubkey, from);
        assert_eq!(ix.accounts[1].pubkey, to);
    }

    #[test]
    fn withdraw_skips_dust() {
        let (from, to) = (Pubkey::new_unique(), Pubkey::new_unique());
        assert!(withdraw_instruction(&from, &to, WITHDRAW_RESERVE_LAMPORTS).is_none());
        assert!(withdraw_instruction(&from, &to, 0).is_none());
        assert!(withdraw_instruction(&from, &to, WITHDRAW_RESERVE_LAMPORTS + 1).is_some());
    }

    #[test]
    fn close_targets_owner_token_account() {
        let (owner, mint) = (Pubkey::new_unique(), Pubkey::new_unique());
        let ix = close_token_account_instruction(&owner, &mint).unwrap();

        assert_eq!(ix.program_id, token::ID);
        assert_eq!(ix.accounts[0].pubkey, get_associated_token_address(&owner, &mint));
        assert_eq!(ix.accounts[1].pubkey, owner);
        assert!(ix.accounts[2].is_signer);
    }
}
