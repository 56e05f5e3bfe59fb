pub mod bonding_curve;
pub mod global_account;

pub use bonding_curve::*;
pub use global_account::*;
