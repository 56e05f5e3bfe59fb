use anchor_lang::AnchorSerialize;
use anchor_spl::associated_token::{
    self, get_associated_token_address, spl_associated_token_account::instruction::create_associated_token_account,
};
use anchor_spl::token;
use rand::Rng;
use solana_sdk::{
    compute_budget::ComputeBudgetInstruction,
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
    system_instruction, system_program, sysvar,
};
use tracing::debug;

use crate::config::PriorityFees;
use crate::constants::TIP_ACCOUNTS;
use crate::constants::{BUY_DISCRIMINATOR, SELL_DISCRIMINATOR};
use crate::errors::BuildError;
use crate::math::{with_slippage_buy, with_slippage_sell};
use crate::rpc::ChainClient;
use crate::state::{BondingCurveAccount, GlobalAccount};

use super::{associated_bonding_curve, bonding_curve_pda, event_authority_pda, global_pda};

/// Position in the instruction sequence of a transaction.
///
/// Account creation and trades may interleave (one block per participant),
/// compute budget follows every trade, and the tip closes the transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Stage {
    Open,
    Trade,
    ComputeBudget,
    Tip,
}

impl Stage {
    fn name(self) -> &'static str {
        match self {
            Stage::Open => "open",
            Stage::Trade => "trade",
            Stage::ComputeBudget => "compute budget",
            Stage::Tip => "tip",
        }
    }
}

/// Ordered instruction list for one transaction.
#[derive(Debug)]
pub struct TradeInstructions {
    stage: Stage,
    instructions: Vec<Instruction>,
}

impl Default for TradeInstructions {
    fn default() -> Self {
        Self::new()
    }
}

impl TradeInstructions {
    pub fn new() -> Self {
        Self {
            stage: Stage::Open,
            instructions: Vec::with_capacity(6),
        }
    }

    fn advance(&mut self, next: Stage) -> Result<(), BuildError> {
        let repeatable = next == Stage::Trade && self.stage == Stage::Trade;
        if next <= self.stage && !repeatable {
            return Err(BuildError::OutOfOrder {
                current: self.stage.name(),
                attempted: next.name(),
            });
        }
        self.stage = next;
        Ok(())
    }

    /// Destination-account creation; must precede the trade that fills it.
    pub fn push_account_creation(&mut self, ix: Instruction) -> Result<&mut Self, BuildError> {
        self.advance(Stage::Trade)?;
        self.instructions.push(ix);
        Ok(self)
    }

    pub fn push_trade(&mut self, ix: Instruction) -> Result<&mut Self, BuildError> {
        self.advance(Stage::Trade)?;
        self.instructions.push(ix);
        Ok(self)
    }

    pub fn push_compute_budget(&mut self, fees: &PriorityFees) -> Result<&mut Self, BuildError> {
        self.advance(Stage::ComputeBudget)?;
        self.instructions.extend(compute_budget_instructions(fees));
        Ok(self)
    }

    /// Tip transfer to a random block-engine tip account.
    pub fn push_tip(&mut self, payer: &Pubkey, lamports: u64) -> Result<&mut Self, BuildError> {
        self.push_tip_to(payer, &random_tip_account(), lamports)
    }

    pub fn push_tip_to(&mut self, payer: &Pubkey, tip_account: &Pubkey, lamports: u64) -> Result<&mut Self, BuildError> {
        self.advance(Stage::Tip)?;
        self.instructions
            .push(system_instruction::transfer(payer, tip_account, lamports));
        Ok(self)
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn into_instructions(self) -> Vec<Instruction> {
        self.instructions
    }

    /// Appends a buy of `order.sol_amount` lamports against `curve`, creating
    /// the buyer's token account first when it does not exist yet.
    ///
    /// Returns the token amount requested from the program.
    pub async fn add_buy(
        &mut self,
        chain: &dyn ChainClient,
        global: &GlobalAccount,
        curve: &BondingCurveAccount,
        order: &BuyOrder,
    ) -> Result<u64, BuildError> {
        let token_amount = curve.quote_buy(order.sol_amount, order.bump)?;
        let max_sol_cost = with_slippage_buy(order.sol_amount, order.slippage_basis_points)?;

        let accounts = TradeAccounts::resolve(&order.user, &order.mint, &global.fee_recipient)?;
        if !chain.account_exists(&accounts.associated_user).await? {
            self.push_account_creation(create_associated_token_account(
                &order.user,
                &order.user,
                &order.mint,
                &token::ID,
            ))?;
        }
        self.push_trade(buy_instruction(&accounts, token_amount, max_sol_cost)?)?;

        debug!(
            mint = %order.mint,
            user = %order.user,
            sol_amount = order.sol_amount,
            token_amount,
            max_sol_cost,
            "buy instruction built"
        );
        Ok(token_amount)
    }

    /// Appends a sell of `order.token_amount` against `curve`.
    ///
    /// Returns the minimum SOL output the program will accept.
    pub fn add_sell(
        &mut self,
        global: &GlobalAccount,
        curve: &BondingCurveAccount,
        order: &SellOrder,
    ) -> Result<u64, BuildError> {
        let sol_output = curve.quote_sell(order.token_amount, global.fee_basis_points)?;
        let min_sol_output = with_slippage_sell(sol_output, order.slippage_basis_points)?;

        let accounts = TradeAccounts::resolve(&order.user, &order.mint, &global.fee_recipient)?;
        self.push_trade(sell_instruction(&accounts, order.token_amount, min_sol_output)?)?;

        debug!(
            mint = %order.mint,
            user = %order.user,
            token_amount = order.token_amount,
            sol_output,
            min_sol_output,
            "sell instruction built"
        );
        Ok(min_sol_output)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuyOrder {
    pub user: Pubkey,
    pub mint: Pubkey,
    pub sol_amount: u64,
    pub bump: bool,
    pub slippage_basis_points: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SellOrder {
    pub user: Pubkey,
    pub mint: Pubkey,
    pub token_amount: u64,
    pub slippage_basis_points: u64,
}

/// Every address a buy or sell touches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeAccounts {
    pub global: Pubkey,
    pub fee_recipient: Pubkey,
    pub mint: Pubkey,
    pub bonding_curve: Pubkey,
    pub associated_bonding_curve: Pubkey,
    pub associated_user: Pubkey,
    pub user: Pubkey,
    pub event_authority: Pubkey,
}

impl TradeAccounts {
    pub fn resolve(user: &Pubkey, mint: &Pubkey, fee_recipient: &Pubkey) -> Result<Self, BuildError> {
        Ok(Self {
            global: global_pda()?,
            fee_recipient: *fee_recipient,
            mint: *mint,
            bonding_curve: bonding_curve_pda(mint)?,
            associated_bonding_curve: associated_bonding_curve(mint)?,
            associated_user: get_associated_token_address(user, mint),
            user: *user,
            event_authority: event_authority_pda()?,
        })
    }

    fn buy_metas(&self) -> Vec<AccountMeta> {
        vec![
            AccountMeta::new_readonly(self.global, false),
            AccountMeta::new(self.fee_recipient, false),
            AccountMeta::new_readonly(self.mint, false),
            AccountMeta::new(self.bonding_curve, false),
            AccountMeta::new(self.associated_bonding_curve, false),
            AccountMeta::new(self.associated_user, false),
            AccountMeta::new(self.user, true),
            AccountMeta::new_readonly(system_program::ID, false),
            AccountMeta::new_readonly(token::ID, false),
            AccountMeta::new_readonly(sysvar::rent::ID, false),
            AccountMeta::new_readonly(self.event_authority, false),
            AccountMeta::new_readonly(crate::ID, false),
        ]
    }

    fn sell_metas(&self) -> Vec<AccountMeta> {
        vec![
            AccountMeta::new_readonly(self.global, false),
            AccountMeta::new(self.fee_recipient, false),
            AccountMeta::new_readonly(self.mint, false),
            AccountMeta::new(self.bonding_curve, false),
            AccountMeta::new(self.associated_bonding_curve, false),
            AccountMeta::new(self.associated_user, false),
            AccountMeta::new(self.user, true),
            AccountMeta::new_readonly(system_program::ID, false),
            AccountMeta::new_readonly(associated_token::ID, false),
            AccountMeta::new_readonly(token::ID, false),
            AccountMeta::new_readonly(self.event_authority, false),
            AccountMeta::new_readonly(crate::ID, false),
        ]
    }
}

#[derive(AnchorSerialize)]
struct BuyArgs {
    amount: u64,
    max_sol_cost: u64,
}

#[derive(AnchorSerialize)]
struct SellArgs {
    amount: u64,
    min_sol_output: u64,
}

pub(crate) fn instruction_data(discriminator: [u8; 8], args: &impl AnchorSerialize) -> Result<Vec<u8>, BuildError> {
    let mut data = discriminator.to_vec();
    args.serialize(&mut data)
        .map_err(|e| BuildError::Instruction(e.to_string()))?;
    Ok(data)
}

pub fn buy_instruction(accounts: &TradeAccounts, amount: u64, max_sol_cost: u64) -> Result<Instruction, BuildError> {
    Ok(Instruction {
        program_id: crate::ID,
        accounts: accounts.buy_metas(),
        data: instruction_data(BUY_DISCRIMINATOR, &BuyArgs { amount, max_sol_cost })?,
    })
}

pub fn sell_instruction(accounts: &TradeAccounts, amount: u64, min_sol_output: u64) -> Result<Instruction, BuildError> {
    Ok(Instruction {
        program_id: crate::ID,
        accounts: accounts.sell_metas(),
        data: instruction_data(SELL_DISCRIMINATOR, &SellArgs { amount, min_sol_output })?,
    })
}

pub fn compute_budget_instructions(fees: &PriorityFees) -> [Instruction; 2] {
    [
        ComputeBudgetInstruction::set_compute_unit_limit(fees.unit_limit),
        ComputeBudgetInstruction::set_compute_unit_price(fees.unit_price),
    ]
}

pub fn random_tip_account() -> Pubkey {
    TIP_ACCOUNTS[rand::thread_rng().gen_range(0..TIP_ACCOUNTS.len())]
}
