pub mod launch_coin;
pub mod trade_coin;
pub mod withdraw_funds;

pub use launch_coin::*;
pub use trade_coin::*;
pub use withdraw_funds::*;

use anchor_spl::{associated_token::get_associated_token_address, metadata::mpl_token_metadata};
use solana_sdk::pubkey::Pubkey;

use crate::constants::*;
use crate::errors::BuildError;

fn find_pda(seeds: &[&[u8]], program_id: &Pubkey, name: &'static str) -> Result<Pubkey, BuildError> {
    Pubkey::try_find_program_address(seeds, program_id)
        .map(|(address, _bump)| address)
        .ok_or(BuildError::AccountResolution(name))
}

pub fn global_pda() -> Result<Pubkey, BuildError> {
    find_pda(&[GLOBAL_SEED], &crate::ID, "global")
}

pub fn mint_authority_pda() -> Result<Pubkey, BuildError> {
    find_pda(&[MINT_AUTHORITY_SEED], &crate::ID, "mint authority")
}

pub fn event_authority_pda() -> Result<Pubkey, BuildError> {
    find_pda(&[EVENT_AUTHORITY_SEED], &crate::ID, "event authority")
}

pub fn bonding_curve_pda(mint: &Pubkey) -> Result<Pubkey, BuildError> {
    find_pda(&[BONDING_CURVE_SEED, mint.as_ref()], &crate::ID, "bonding curve")
}

/// Token account holding the curve's unsold supply.
pub fn associated_bonding_curve(mint: &Pubkey) -> Result<Pubkey, BuildError> {
    Ok(get_associated_token_address(&bonding_curve_pda(mint)?, mint))
}

pub fn metadata_pda(mint: &Pubkey) -> Result<Pubkey, BuildError> {
    let metadata_program = mpl_token_metadata::ID;
    find_pda(
        &[METADATA_SEED, metadata_program.as_ref(), mint.as_ref()],
        &metadata_program,
        "metadata",
    )
}
