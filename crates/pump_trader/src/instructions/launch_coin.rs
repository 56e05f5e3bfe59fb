use anchor_lang::AnchorSerialize;
use anchor_spl::associated_token::{
    self, get_associated_token_address, spl_associated_token_account::instruction::create_associated_token_account,
};
use anchor_spl::metadata::mpl_token_metadata;
use anchor_spl::token;
use solana_sdk::{
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
    system_program, sysvar,
};
use tracing::{debug, info};

use crate::config::TokenMetadata;
use crate::constants::CREATE_DISCRIMINATOR;
use crate::errors::BuildError;
use crate::math::with_slippage_buy;
use crate::state::GlobalAccount;

use super::trade_coin::instruction_data;
use super::{
    associated_bonding_curve, bonding_curve_pda, buy_instruction, event_authority_pda, global_pda,
    metadata_pda, mint_authority_pda, TradeAccounts, TradeInstructions,
};

/// Arguments of the program's `create` instruction.
#[derive(AnchorSerialize)]
struct CreateArgs {
    name: String,
    symbol: String,
    uri: String,
}

/// # Create Instruction
///
/// Launches a new token on the bonding curve program. The program mints the
/// full supply into the associated bonding curve account, writes the Metaplex
/// metadata and opens the curve at the global initial reserves.
///
/// ## Accounts
/// The mint and the creator both sign: the mint keypair is freshly generated
/// for the launch, the creator pays rent for every account created.
///
/// ## Parameters
/// - `creator`: fee payer and signer
/// - `mint`: address of the new token mint
/// - `metadata`: name, symbol and URI of the off-chain metadata JSON
pub fn create_instruction(
    creator: &Pubkey,
    mint: &Pubkey,
    metadata: &TokenMetadata,
) -> Result<Instruction, BuildError> {
    let accounts = vec![
        AccountMeta::new(*mint, true),
        AccountMeta::new_readonly(mint_authority_pda()?, false),
        AccountMeta::new(bonding_curve_pda(mint)?, false),
        AccountMeta::new(associated_bonding_curve(mint)?, false),
        AccountMeta::new_readonly(global_pda()?, false),
        AccountMeta::new_readonly(mpl_token_metadata::ID, false),
        AccountMeta::new(metadata_pda(mint)?, false),
        AccountMeta::new(*creator, true),
        AccountMeta::new_readonly(system_program::ID, false),
        AccountMeta::new_readonly(token::ID, false),
        AccountMeta::new_readonly(associated_token::ID, false),
        AccountMeta::new_readonly(sysvar::rent::ID, false),
        AccountMeta::new_readonly(event_authority_pda()?, false),
        AccountMeta::new_readonly(crate::ID, false),
    ];

    let args = CreateArgs {
        name: metadata.name.clone(),
        symbol: metadata.symbol.clone(),
        uri: metadata.uri.clone(),
    };

    Ok(Instruction {
        program_id: crate::ID,
        accounts,
        data: instruction_data(CREATE_DISCRIMINATOR, &args)?,
    })
}

impl TradeInstructions {
    /// Appends the `create` instruction for `mint`.
    pub fn add_create(
        &mut self,
        creator: &Pubkey,
        mint: &Pubkey,
        metadata: &TokenMetadata,
    ) -> Result<&mut Self, BuildError> {
        self.push_trade(create_instruction(creator, mint, metadata)?)?;
        info!(%mint, %creator, symbol = %metadata.symbol, "create instruction built");
        Ok(self)
    }

    /// Buys into a token created earlier in the same transaction.
    ///
    /// The curve account does not exist yet, so the quote comes from the
    /// global initial reserves and the creator's token account is always
    /// created. Slippage is applied unscaled here.
    ///
    /// ## Returns
    /// - the token amount requested from the program
    pub fn add_initial_buy(
        &mut self,
        global: &GlobalAccount,
        creator: &Pubkey,
        mint: &Pubkey,
        sol_amount: u64,
        slippage_basis_points: u64,
    ) -> Result<u64, BuildError> {
        let token_amount = global.initial_buy_price(sol_amount)?;
        let max_sol_cost = with_slippage_buy(sol_amount, slippage_basis_points)?;

        let accounts = TradeAccounts::resolve(creator, mint, &global.fee_recipient)?;
        self.push_account_creation(create_associated_token_account(
            creator, creator, mint, &token::ID,
        ))?;
        self.push_trade(buy_instruction(&accounts, token_amount, max_sol_cost)?)?;

        debug!(
            %mint,
            sol_amount,
            token_amount,
            max_sol_cost,
            associated_user = %get_associated_token_address(creator, mint),
            "initial buy instruction built"
        );
        Ok(token_amount)
    }
}
