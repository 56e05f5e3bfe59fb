use std::str::FromStr;
use std::sync::Arc;

use anchor_spl::associated_token::get_associated_token_address;
use async_trait::async_trait;
use solana_sdk::{
    native_token::{lamports_to_sol, sol_to_lamports},
    pubkey::Pubkey,
    signature::Keypair,
    signer::Signer,
};
use tracing::{info, warn};

use crate::bundle::{BlockEngine, Bundle, BundleDispatcher, DispatchReport, JitoBlockEngine};
use crate::config::TraderConfig;
use crate::errors::{BuildError, TraderError};
use crate::instructions::{
    bonding_curve_pda, close_token_account_instruction, global_pda, withdraw_instruction, BuyOrder, SellOrder,
    TradeInstructions,
};
use crate::keystore::KeyStore;
use crate::math::scaled_basis_points;
use crate::rpc::{processed_rpc_client, ChainClient};
use crate::state::{BondingCurveAccount, GlobalAccount};
use crate::transaction::TransactionAssembler;

/// One operator request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TradeAction {
    Withdraw,
    Create,
    Buy { mint: Pubkey, lamports: u64, bump: bool },
    SellAll { mint: Pubkey },
    CloseAccount { mint: Pubkey },
    SellOnSecondaryAmm { mint: Pubkey },
}

impl TradeAction {
    /// Validates a raw request. `amount` is in SOL and only read for buys.
    pub fn from_request(
        action: &str,
        contract_address: Option<&str>,
        amount: Option<&str>,
        is_bump: bool,
    ) -> Result<Self, TraderError> {
        let mint = || -> Result<Pubkey, TraderError> {
            let address = contract_address
                .filter(|a| !a.is_empty())
                .ok_or_else(|| TraderError::InvalidRequest(format!("{action} requires a contract address")))?;
            Pubkey::from_str(address)
                .map_err(|e| TraderError::InvalidRequest(format!("contract address {address:?}: {e}")))
        };

        match action {
            "withdraw" => Ok(TradeAction::Withdraw),
            "create" => Ok(TradeAction::Create),
            "buy" => {
                let raw = amount.ok_or_else(|| TraderError::InvalidRequest("buy requires an amount".into()))?;
                let sol: f64 = raw
                    .trim()
                    .parse()
                    .map_err(|_| TraderError::InvalidRequest(format!("amount {raw:?} is not a number")))?;
                if !sol.is_finite() || sol <= 0.0 {
                    return Err(TraderError::InvalidRequest(format!("amount {raw:?} must be positive")));
                }
                Ok(TradeAction::Buy {
                    mint: mint()?,
                    lamports: sol_to_lamports(sol),
                    bump: is_bump,
                })
            }
            "sellall" => Ok(TradeAction::SellAll { mint: mint()? }),
            "closeaccount" => Ok(TradeAction::CloseAccount { mint: mint()? }),
            "sellAllTokenOnRay" => Ok(TradeAction::SellOnSecondaryAmm { mint: mint()? }),
            other => Err(TraderError::InvalidRequest(format!("unknown action {other:?}"))),
        }
    }
}

/// Swap venue used once a token has left the bonding curve.
#[async_trait]
pub trait SecondaryAmm: Send + Sync {
    /// Swaps `amount` raw tokens of `mint` held by `owner` for SOL and
    /// describes the outcome.
    async fn sell_all(&self, owner: &Keypair, mint: &Pubkey, amount: u64) -> Result<String, TraderError>;
}

/// Runs trade actions end to end: fetch, price, build, sign, dispatch.
pub struct Trader {
    config: TraderConfig,
    chain: Arc<dyn ChainClient>,
    keys: KeyStore,
    assembler: TransactionAssembler,
    dispatcher: BundleDispatcher,
    secondary_amm: Option<Arc<dyn SecondaryAmm>>,
}

impl Trader {
    pub fn new(config: TraderConfig, chain: Arc<dyn ChainClient>, block_engine: Arc<dyn BlockEngine>) -> Self {
        Self {
            keys: KeyStore::new(config.keys_dir()),
            assembler: TransactionAssembler::new(chain.clone()),
            dispatcher: BundleDispatcher::new(config.mode, block_engine, chain.clone()),
            chain,
            config,
            secondary_amm: None,
        }
    }

    /// Trader on the configured RPC endpoint and block engine.
    pub fn from_config(config: TraderConfig) -> Result<Self, TraderError> {
        config.validate()?;
        let chain: Arc<dyn ChainClient> = Arc::new(processed_rpc_client(config.rpc_url()));
        let block_engine = Arc::new(JitoBlockEngine::new(config.block_engine_url.clone())?);
        Ok(Self::new(config, chain, block_engine))
    }

    pub fn with_secondary_amm(mut self, amm: Arc<dyn SecondaryAmm>) -> Self {
        self.secondary_amm = Some(amm);
        self
    }

    pub fn config(&self) -> &TraderConfig {
        &self.config
    }

    /// Address of the trade account, creating its keypair on first use.
    pub fn trader_address(&self) -> Result<Pubkey, TraderError> {
        Ok(self.trade_keypair()?.pubkey())
    }

    fn trade_keypair(&self) -> Result<Keypair, TraderError> {
        Ok(self.keys.get_or_create(&self.config.trade_account)?)
    }

    fn curve_slippage(&self) -> Result<u64, TraderError> {
        Ok(scaled_basis_points(
            self.config.slippage_basis_points,
            self.config.slippage_multiplier,
        )?)
    }

    pub async fn execute(&self, action: TradeAction) -> Result<String, TraderError> {
        info!(?action, mode = ?self.config.mode, "executing trade action");
        match action {
            TradeAction::Withdraw => self.withdraw().await,
            TradeAction::Create => self.create().await,
            TradeAction::Buy { mint, lamports, bump } => {
                let buyer = self.trade_keypair()?;
                let report = self.buy_many(&[&buyer], &mint, lamports, bump).await?;
                Ok(report.to_string())
            }
            TradeAction::SellAll { mint } => {
                let seller = self.trade_keypair()?;
                let balance = self.nonzero_token_balance(&seller.pubkey(), &mint).await?;
                let report = self.sell_many(&[(&seller, balance)], &mint).await?;
                Ok(report.to_string())
            }
            TradeAction::CloseAccount { mint } => self.close_account(&mint).await,
            TradeAction::SellOnSecondaryAmm { mint } => {
                let amm = self
                    .secondary_amm
                    .as_ref()
                    .ok_or_else(|| TraderError::SecondaryAmm("no secondary AMM configured".into()))?;
                let owner = self.trade_keypair()?;
                let balance = self.nonzero_token_balance(&owner.pubkey(), &mint).await?;
                amm.sell_all(&owner, &mint, balance).await
            }
        }
    }

    /// Buys `lamports` worth of `mint` for every buyer in one transaction.
    /// The first buyer pays the fee and the tip.
    pub async fn buy_many(
        &self,
        buyers: &[&Keypair],
        mint: &Pubkey,
        lamports: u64,
        bump: bool,
    ) -> Result<DispatchReport, TraderError> {
        let payer = buyers
            .first()
            .ok_or_else(|| TraderError::InvalidRequest("at least one buyer is required".into()))?
            .pubkey();
        let global = self.fetch_global().await?;
        let curve = self.fetch_curve(mint).await?;
        let slippage_basis_points = self.curve_slippage()?;

        let mut ixs = TradeInstructions::new();
        for buyer in buyers {
            let order = BuyOrder {
                user: buyer.pubkey(),
                mint: *mint,
                sol_amount: lamports,
                bump,
                slippage_basis_points,
            };
            ixs.add_buy(self.chain.as_ref(), &global, &curve, &order).await?;
        }
        ixs.push_compute_budget(&self.config.buy_priority_fees)?;
        ixs.push_tip(&payer, self.config.buy_tip_lamports)?;

        let tx = self
            .assembler
            .sign(&ixs.into_instructions(), &payer, buyers, None)
            .await?;
        Ok(self.dispatcher.dispatch(Bundle::single(tx)?).await?)
    }

    /// Sells each seller's given token amount of `mint` in one transaction.
    /// The first seller pays the fee and the tip.
    pub async fn sell_many(&self, sellers: &[(&Keypair, u64)], mint: &Pubkey) -> Result<DispatchReport, TraderError> {
        let payer = sellers
            .first()
            .ok_or_else(|| TraderError::InvalidRequest("at least one seller is required".into()))?
            .0
            .pubkey();
        let global = self.fetch_global().await?;
        let curve = self.fetch_curve(mint).await?;
        let slippage_basis_points = self.curve_slippage()?;

        let mut ixs = TradeInstructions::new();
        for (seller, token_amount) in sellers {
            let order = SellOrder {
                user: seller.pubkey(),
                mint: *mint,
                token_amount: *token_amount,
                slippage_basis_points,
            };
            ixs.add_sell(&global, &curve, &order)?;
        }
        ixs.push_compute_budget(&self.config.sell_priority_fees)?;
        ixs.push_tip(&payer, self.config.sell_tip_lamports)?;

        let signers: Vec<&Keypair> = sellers.iter().map(|(kp, _)| *kp).collect();
        let tx = self
            .assembler
            .sign(&ixs.into_instructions(), &payer, &signers, None)
            .await?;
        Ok(self.dispatcher.dispatch(Bundle::single(tx)?).await?)
    }

    async fn withdraw(&self) -> Result<String, TraderError> {
        let to = self
            .config
            .withdrawal_address()?
            .ok_or(TraderError::WithdrawalAddressUnset)?;
        let from = self.trade_keypair()?;
        let balance = self.chain.get_balance(&from.pubkey()).await?;

        let Some((ix, lamports)) = withdraw_instruction(&from.pubkey(), &to, balance) else {
            warn!(account = %from.pubkey(), balance, "balance too low to withdraw");
            return Ok(format!("Skipping {} insufficient balance.", from.pubkey()));
        };
        let tx = self.assembler.sign(&[ix], &from.pubkey(), &[&from], None).await?;
        let signature = self.chain.send_transaction(&tx).await?;

        info!(%signature, lamports, %to, "withdrawal sent");
        Ok(format!(
            "Transferred {:.6} SOL from {} to {}",
            lamports_to_sol(lamports),
            from.pubkey(),
            to
        ))
    }

    async fn create(&self) -> Result<String, TraderError> {
        let mint = self.keys.get_or_create(&self.config.mint_account)?;
        let creator = self.trade_keypair()?;

        if self.chain.account_exists(&mint.pubkey()).await? {
            info!(mint = %mint.pubkey(), "mint already exists, skipping create");
            return Ok(format!("Mint account already created: {}", mint.pubkey()));
        }

        let mut ixs = TradeInstructions::new();
        ixs.add_create(&creator.pubkey(), &mint.pubkey(), &self.config.token)?;
        if self.config.create_buy_lamports > 0 {
            let global = self.fetch_global().await?;
            ixs.add_initial_buy(
                &global,
                &creator.pubkey(),
                &mint.pubkey(),
                self.config.create_buy_lamports,
                self.config.slippage_basis_points,
            )?;
        }
        ixs.push_compute_budget(&self.config.create_priority_fees)?;
        ixs.push_tip(&creator.pubkey(), self.config.create_tip_lamports)?;

        let tx = self
            .assembler
            .sign(&ixs.into_instructions(), &creator.pubkey(), &[&creator, &mint], None)
            .await?;
        let report = self.dispatcher.dispatch(Bundle::single(tx)?).await?;
        Ok(format!("Success: {}\n{report}", mint.pubkey()))
    }

    async fn close_account(&self, mint: &Pubkey) -> Result<String, TraderError> {
        let owner = self.trade_keypair()?;
        let token_account = get_associated_token_address(&owner.pubkey(), mint);
        match self.chain.get_token_balance(&token_account).await? {
            None => return Err(BuildError::AccountNotFound(token_account).into()),
            Some(0) => {}
            Some(_) => return Err(TraderError::NonZeroBalance(token_account)),
        }

        let ix = close_token_account_instruction(&owner.pubkey(), mint)?;
        let tx = self.assembler.sign(&[ix], &owner.pubkey(), &[&owner], None).await?;
        let signature = self.chain.send_transaction(&tx).await?;
        info!(%signature, %token_account, "token account closed");
        Ok(format!("Sig: {signature}"))
    }

    async fn nonzero_token_balance(&self, owner: &Pubkey, mint: &Pubkey) -> Result<u64, TraderError> {
        let token_account = get_associated_token_address(owner, mint);
        match self.chain.get_token_balance(&token_account).await? {
            Some(balance) if balance > 0 => Ok(balance),
            _ => Err(TraderError::EmptyBalance(token_account)),
        }
    }

    async fn fetch_global(&self) -> Result<GlobalAccount, BuildError> {
        let address = global_pda()?;
        let data = self
            .chain
            .get_account_data(&address)
            .await?
            .ok_or(BuildError::AccountNotFound(address))?;
        Ok(GlobalAccount::decode(&data)?)
    }

    async fn fetch_curve(&self, mint: &Pubkey) -> Result<BondingCurveAccount, BuildError> {
        let address = bonding_curve_pda(mint)?;
        let data = self
            .chain
            .get_account_data(&address)
            .await?
            .ok_or(BuildError::AccountNotFound(address))?;
        Ok(BondingCurveAccount::decode(&data)?)
    }
}
