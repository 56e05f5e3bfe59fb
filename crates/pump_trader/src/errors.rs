use solana_sdk::pubkey::Pubkey;
use thiserror::Error;

/// Raw account bytes that do not match the expected record layout.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("account data too short: expected at least {expected} bytes, got {actual}")]
    TooShort { expected: usize, actual: usize },
    #[error("invalid bool tag {value} at offset {offset}")]
    InvalidBool { offset: usize, value: u8 },
    #[error("bonding curve is open but reports zero virtual reserves")]
    ZeroReserves,
    #[error("malformed account data: {0}")]
    Malformed(String),
}

/// Business-rule and arithmetic failures of the pricing engine.
///
/// Each rejection gets its own variant; callers react differently to a
/// completed curve than to a restricted bump buy.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PricingError {
    #[error("bonding curve is complete")]
    CurveComplete,
    #[error("bump buy restricted: real SOL reserves {real_sol_reserves} exceed {limit} lamports")]
    BumpRestricted { real_sol_reserves: u64, limit: u64 },
    #[error("buy-out of {sol_tokens} leaves no virtual token reserves (have {virtual_token_reserves})")]
    BuyOutExceedsReserves {
        sol_tokens: u64,
        virtual_token_reserves: u64,
    },
    #[error("slippage of {basis_points} bps exceeds the traded amount")]
    SlippageTooLarge { basis_points: u64 },
    #[error("division by zero")]
    DivisionByZero,
    #[error("arithmetic overflow")]
    ArithmeticOverflow,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("rpc request failed: {0}")]
pub struct RpcError(pub String);

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("could not derive {0} address")]
    AccountResolution(&'static str),
    #[error("account {0} not found")]
    AccountNotFound(Pubkey),
    #[error("instruction stage {attempted} cannot follow {current}")]
    OutOfOrder {
        current: &'static str,
        attempted: &'static str,
    },
    #[error("invalid instruction: {0}")]
    Instruction(String),
    #[error(transparent)]
    Pricing(#[from] PricingError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Rpc(#[from] RpcError),
}

#[derive(Debug, Error)]
pub enum SigningError {
    #[error("required signer {0} was not supplied")]
    MissingSigner(Pubkey),
    #[error("failed to fetch recent blockhash: {0}")]
    Blockhash(#[source] RpcError),
    #[error("failed to compile message: {0}")]
    Compile(String),
    #[error("failed to sign transaction: {0}")]
    Sign(String),
}

#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("bundle contains no transactions")]
    EmptyBundle,
    #[error("bundle holds {len} transactions, block engine accepts at most {max}")]
    BundleTooLarge { len: usize, max: usize },
    #[error("transaction {index} is not fully signed")]
    PartiallySigned { index: usize },
    #[error("failed to encode transaction: {0}")]
    Encode(String),
    #[error("block engine rejected bundle: {0}")]
    BlockEngine(String),
    #[error(transparent)]
    Rpc(#[from] RpcError),
}

#[derive(Debug, Error)]
pub enum KeyStoreError {
    #[error("invalid key role name {0:?}")]
    InvalidRole(String),
    #[error("secret of {len} characters is shorter than the {min} needed for obfuscation")]
    SecretTooShort { len: usize, min: usize },
    #[error("invalid secret key: {0}")]
    InvalidSecret(String),
    #[error("stored public key {stored} does not match secret key {derived}")]
    PublicKeyMismatch { stored: String, derived: String },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Invalid(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Toml(#[from] toml::de::Error),
}

/// Failure of a whole trade action.
#[derive(Debug, Error)]
pub enum TraderError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("withdrawal address is not set")]
    WithdrawalAddressUnset,
    #[error("token balance of {0} is zero")]
    EmptyBalance(Pubkey),
    #[error("token account {0} can only be closed with a zero balance")]
    NonZeroBalance(Pubkey),
    #[error("secondary AMM swap failed: {0}")]
    SecondaryAmm(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    KeyStore(#[from] KeyStoreError),
    #[error(transparent)]
    Build(#[from] BuildError),
    #[error(transparent)]
    Signing(#[from] SigningError),
    #[error(transparent)]
    Submission(#[from] SubmissionError),
    #[error(transparent)]
    Rpc(#[from] RpcError),
}

impl From<PricingError> for TraderError {
    fn from(err: PricingError) -> Self {
        TraderError::Build(BuildError::Pricing(err))
    }
}

impl From<DecodeError> for TraderError {
    fn from(err: DecodeError) -> Self {
        TraderError::Build(BuildError::Decode(err))
    }
}
