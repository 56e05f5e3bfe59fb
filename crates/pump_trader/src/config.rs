use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;

use crate::constants::{DEFAULT_BLOCK_ENGINE_URL, DEVNET_RPC_URL, MAINNET_RPC_URL};
use crate::errors::ConfigError;

/// Which cluster the trader talks to. Only mainnet submits through the block
/// engine; devnet sends each transaction on its own.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Devnet,
    Mainnet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorityFees {
    pub unit_limit: u32,
    /// micro-lamports per compute unit
    pub unit_price: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenMetadata {
    pub name: String,
    pub symbol: String,
    pub uri: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraderConfig {
    pub mode: Mode,
    /// Falls back to the public endpoint of `mode` when unset.
    pub rpc_url: Option<String>,
    /// Falls back to `.keys` on mainnet and `.devkeys` elsewhere.
    pub keys_dir: Option<PathBuf>,
    pub trade_account: String,
    pub mint_account: String,
    pub withdrawal_address: Option<String>,
    pub block_engine_url: String,

    pub slippage_basis_points: u64,
    /// Applied on top of `slippage_basis_points` for every curve buy and sell.
    pub slippage_multiplier: u64,

    pub buy_tip_lamports: u64,
    pub sell_tip_lamports: u64,
    pub create_tip_lamports: u64,
    /// SOL spent buying into a freshly created token; zero skips the buy.
    pub create_buy_lamports: u64,

    pub buy_priority_fees: PriorityFees,
    pub sell_priority_fees: PriorityFees,
    pub create_priority_fees: PriorityFees,

    pub token: TokenMetadata,
}

impl Default for TraderConfig {
    fn default() -> Self {
        Self {
            mode: Mode::Devnet,
            rpc_url: None,
            keys_dir: None,
            trade_account: "trade-account-1".to_string(),
            mint_account: "mint".to_string(),
            withdrawal_address: None,
            block_engine_url: DEFAULT_BLOCK_ENGINE_URL.to_string(),
            slippage_basis_points: 1_000,
            slippage_multiplier: 10,
            buy_tip_lamports: 3_000_000,
            sell_tip_lamports: 3_000_000,
            create_tip_lamports: 100_000,
            create_buy_lamports: 15_000_000,
            buy_priority_fees: PriorityFees {
                unit_limit: 250_000,
                unit_price: 150_000,
            },
            sell_priority_fees: PriorityFees {
                unit_limit: 250_000,
                unit_price: 250_000,
            },
            create_priority_fees: PriorityFees {
                unit_limit: 500_000,
                unit_price: 250_000,
            },
            token: TokenMetadata::default(),
        }
    }
}

impl TraderConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml_str(&contents)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Defaults plus environment overrides, for running without a file.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Applies `PRODUCTION`, `MAINNET_RPC_URL`, `KEYS_FOLDER`, `TRADE_ACCOUNT`,
    /// `WITHDRAWAL_ADDRESS` and `JITO_BLOCK_ENGINE_URL` from `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(production) = lookup("PRODUCTION") {
            self.mode = if production == "mainnet" {
                Mode::Mainnet
            } else {
                Mode::Devnet
            };
        }
        if self.mode == Mode::Mainnet {
            if let Some(url) = lookup("MAINNET_RPC_URL") {
                self.rpc_url = Some(url);
            }
        }
        if let Some(dir) = lookup("KEYS_FOLDER") {
            self.keys_dir = Some(PathBuf::from(dir));
        }
        if let Some(account) = lookup("TRADE_ACCOUNT") {
            self.trade_account = account;
        }
        if let Some(address) = lookup("WITHDRAWAL_ADDRESS") {
            self.withdrawal_address = Some(address).filter(|a| !a.is_empty());
        }
        if let Some(url) = lookup("JITO_BLOCK_ENGINE_URL") {
            self.block_engine_url = url;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.trade_account.is_empty() || self.mint_account.is_empty() {
            return Err(ConfigError::Invalid("key role names must not be empty".into()));
        }
        if self.slippage_multiplier == 0 {
            return Err(ConfigError::Invalid("slippage_multiplier must be at least 1".into()));
        }
        if self.slippage_basis_points.checked_mul(self.slippage_multiplier).is_none() {
            return Err(ConfigError::Invalid("scaled slippage overflows".into()));
        }
        self.withdrawal_address()?;
        Ok(())
    }

    pub fn rpc_url(&self) -> &str {
        match (&self.rpc_url, self.mode) {
            (Some(url), _) => url,
            (None, Mode::Mainnet) => MAINNET_RPC_URL,
            (None, Mode::Devnet) => DEVNET_RPC_URL,
        }
    }

    pub fn keys_dir(&self) -> PathBuf {
        match (&self.keys_dir, self.mode) {
            (Some(dir), _) => dir.clone(),
            (None, Mode::Mainnet) => PathBuf::from(".keys"),
            (None, Mode::Devnet) => PathBuf::from(".devkeys"),
        }
    }

    pub fn withdrawal_address(&self) -> Result<Option<Pubkey>, ConfigError> {
        self.withdrawal_address
            .as_deref()
            .map(|address| {
                Pubkey::from_str(address).map_err(|e| {
                    ConfigError::Invalid(format!("withdrawal_address {address:?}: {e}"))
                })
            })
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_follow_mode() {
        let mut config = TraderConfig::default();
        assert_eq!(config.rpc_url(), DEVNET_RPC_URL);
        assert_eq!(config.keys_dir(), PathBuf::from(".devkeys"));

        config.mode = Mode::Mainnet;
        assert_eq!(config.rpc_url(), MAINNET_RPC_URL);
        assert_eq!(config.keys_dir(), PathBuf::from(".keys"));
    }

    #[test]
    fn parses_partial_toml() {
        let config = TraderConfig::from_toml_str(
            r#"
            mode = "mainnet"
            slippage_basis_points = 500
            trade_account = "desk-2"

            [buy_priority_fees]
            unit_limit = 300000
            unit_price = 1000

            [token]
            name = "Vine"
            symbol = "VINE"
            uri = "https://example.org/vine.json"
            "#,
        )
        .unwrap();

        assert_eq!(config.mode, Mode::Mainnet);
        assert_eq!(config.slippage_basis_points, 500);
        assert_eq!(config.slippage_multiplier, 10);
        assert_eq!(config.trade_account, "desk-2");
        assert_eq!(config.buy_priority_fees.unit_limit, 300_000);
        assert_eq!(config.sell_priority_fees, TraderConfig::default().sell_priority_fees);
        assert_eq!(config.token.symbol, "VINE");
    }

    #[test]
    fn env_overrides_select_mainnet() {
        let mut config = TraderConfig::default();
        let withdrawal = Pubkey::new_unique().to_string();
        config.apply_overrides(lookup_from(&[
            ("PRODUCTION", "mainnet"),
            ("MAINNET_RPC_URL", "https://rpc.example.org"),
            ("TRADE_ACCOUNT", "trade-account-7"),
            ("WITHDRAWAL_ADDRESS", withdrawal.as_str()),
        ]));

        assert_eq!(config.mode, Mode::Mainnet);
        assert_eq!(config.rpc_url(), "https://rpc.example.org");
        assert_eq!(config.trade_account, "trade-account-7");
        assert_eq!(
            config.withdrawal_address().unwrap().map(|p| p.to_string()),
            Some(withdrawal)
        );
    }

    #[test]
    fn mainnet_rpc_override_ignored_on_devnet() {
        let mut config = TraderConfig::default();
        config.apply_overrides(lookup_from(&[("MAINNET_RPC_URL", "https://rpc.example.org")]));
        assert_eq!(config.rpc_url(), DEVNET_RPC_URL);
    }

    #[test]
    fn validate_rejects_bad_values() {
        let mut config = TraderConfig::default();
        config.slippage_multiplier = 0;
        assert!(config.validate().is_err());

        let mut config = TraderConfig::default();
        config.withdrawal_address = Some("not-a-key".into());
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }
}
