use solana_sdk::{native_token::LAMPORTS_PER_SOL, pubkey, pubkey::Pubkey};

pub const GLOBAL_SEED: &[u8] = b"global";
pub const MINT_AUTHORITY_SEED: &[u8] = b"mint-authority";
pub const BONDING_CURVE_SEED: &[u8] = b"bonding-curve";
pub const METADATA_SEED: &[u8] = b"metadata";
pub const EVENT_AUTHORITY_SEED: &[u8] = b"__event_authority";

pub const DEFAULT_DECIMALS: u8 = 6;

pub const BASIS_POINTS_DENOMINATOR: u64 = 10_000;

// A bump buy is refused once the curve holds more than 0.01 SOL of real liquidity.
pub const BUMP_REAL_SOL_LIMIT: u64 = LAMPORTS_PER_SOL / 100;

// Left behind on the trade account when sweeping its balance.
pub const WITHDRAW_RESERVE_LAMPORTS: u64 = 5_000;

// Anchor instruction discriminators: sha256("global:<name>")[..8]
pub const CREATE_DISCRIMINATOR: [u8; 8] = [24, 30, 200, 40, 5, 28, 7, 119];
pub const BUY_DISCRIMINATOR: [u8; 8] = [102, 6, 61, 18, 1, 218, 235, 234];
pub const SELL_DISCRIMINATOR: [u8; 8] = [51, 230, 133, 164, 1, 127, 131, 173];

pub const MAX_BUNDLE_TRANSACTIONS: usize = 5;

pub const DEFAULT_BLOCK_ENGINE_URL: &str = "https://mainnet.block-engine.jito.wtf";
pub const MAINNET_RPC_URL: &str = "https://api.mainnet-beta.solana.com";
pub const DEVNET_RPC_URL: &str = "https://api.devnet.solana.com";

/// Block-engine tip accounts; one is picked at random per transaction.
pub const TIP_ACCOUNTS: [Pubkey; 8] = [
    pubkey!("96gYZGLnJYVFmbjzopPSU6QiEV5fGqZNyN9nmNhvrZU5"),
    pubkey!("HFqU5x63VTqvQss8hp11i4wVV8bD44PvwucfZ2bU7gRe"),
    pubkey!("Cw8CFyM9FkoMi7K7Crf6HNQqf4uEMzpKw6QNghXLvLkY"),
    pubkey!("ADaUMid9yfUytqMBgopwjb2DTLSokTSzL1zt6iGPaS49"),
    pubkey!("DfXygSm4jCyNCybVYYK6DwvWqjKee8pbDmJGcLWNDXjh"),
    pubkey!("ADuUkR4vqLUMWXxW9gh6D6L8pMSawimctcNZ5pGwDcEt"),
    pubkey!("DttWaMuVvTiduZRnguLF7jNxTgiMBZ1hyAumKUiL2KRL"),
    pubkey!("3AVi9Tg9Uo68tJfuvoKvqKNWKkC5wPdSSdeBnizKZ6jT"),
];
