/*
 ██████╗ ██╗   ██╗███╗   ███╗██████╗     ████████╗██████╗  █████╗ ██████╗ ███████╗██████╗
 ██╔══██╗██║   ██║████╗ ████║██╔══██╗    ╚══██╔══╝██╔══██╗██╔══██╗██╔══██╗██╔════╝██╔══██╗
 ██████╔╝██║   ██║██╔████╔██║██████╔╝       ██║   ██████╔╝███████║██║  ██║█████╗  ██████╔╝
 ██╔═══╝ ██║   ██║██║╚██╔╝██║██╔═══╝        ██║   ██╔══██╗██╔══██║██║  ██║██╔══╝  ██╔══██╗
 ██║     ╚██████╔╝██║ ╚═╝ ██║██║            ██║   ██║  ██║██║  ██║██████╔╝███████╗██║  ██║
 ╚═╝      ╚═════╝ ╚═╝     ╚═╝╚═╝            ╚═╝   ╚═╝  ╚═╝╚═╝  ╚═╝╚═════╝ ╚══════╝╚═╝  ╚═╝

  ✨ Off-chain trading client for the pump bonding curve program ✨

 💹 Price
   ^
   |                                 /|
   |                               /
   |                             /
   |                           /
   |                        /
   |                     /
   |                  /
   |              /
   |         _/
   |___----
   +---------------------------------> Tokens Sold

 🔹 Reserve Decoding - Curve and global accounts read fresh before every trade
 🔹 Exact Pricing - Constant product quotes matching the program to the lamport
 🔹 Bounded Slippage - Max cost and min output enforced on chain
 🔹 Atomic Bundles - Tipped submission through the block engine

 🚀 Create → 📈 Buy → 💰 Sell → 🔄 Withdraw
*/

use anchor_lang::declare_id;

pub mod bundle;
pub mod config;
pub mod constants;
pub mod errors;
pub mod instructions;
pub mod keystore;
pub mod math;
pub mod rpc;
pub mod state;
pub mod trader;
pub mod transaction;

pub use bundle::{BlockEngine, Bundle, BundleDispatcher, DispatchReport, JitoBlockEngine};
pub use config::{Mode, PriorityFees, TokenMetadata, TraderConfig};
pub use errors::*;
pub use keystore::KeyStore;
pub use rpc::ChainClient;
pub use state::{BondingCurveAccount, GlobalAccount};
pub use trader::{SecondaryAmm, TradeAction, Trader};
pub use transaction::TransactionAssembler;

// Pump bonding curve program.
declare_id!("6EF8rrecthR5Dkzon8Nwu78hRvfCKubJ14M5uBEwF6P");
