use anchor_lang::{AnchorDeserialize, AnchorSerialize};
use solana_sdk::pubkey::Pubkey;

use crate::errors::{DecodeError, PricingError};
use crate::math::mul_div;

/// Protocol-wide parameters: fee rate, fee recipient and the reserves every
/// new curve starts from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AnchorSerialize, AnchorDeserialize)]
pub struct GlobalAccount {
    pub discriminator: u64,
    pub initialized: bool,
    pub authority: Pubkey,
    pub fee_recipient: Pubkey,
    pub initial_virtual_token_reserves: u64,
    pub initial_virtual_sol_reserves: u64,
    pub initial_real_token_reserves: u64,
    pub token_total_supply: u64,
    pub fee_basis_points: u64,
}

impl GlobalAccount {
    pub const LEN: usize = 8 + 1 + 32 + 32 + 8 * 5;
    const INITIALIZED_OFFSET: usize = 8;

    pub fn decode(data: &[u8]) -> Result<Self, DecodeError> {
        if data.len() < Self::LEN {
            return Err(DecodeError::TooShort {
                expected: Self::LEN,
                actual: data.len(),
            });
        }
        let tag = data[Self::INITIALIZED_OFFSET];
        if tag > 1 {
            return Err(DecodeError::InvalidBool {
                offset: Self::INITIALIZED_OFFSET,
                value: tag,
            });
        }
        Self::deserialize(&mut &data[..Self::LEN]).map_err(|e| DecodeError::Malformed(e.to_string()))
    }

    /// Tokens a brand-new curve hands out for `sol_in`; used when creating a
    /// token and buying into it in the same transaction, before the curve
    /// account exists to be read.
    pub fn initial_buy_price(&self, sol_in: u64) -> Result<u64, PricingError> {
        if sol_in == 0 {
            return Ok(0);
        }
        let virtual_sol = self.initial_virtual_sol_reserves as u128;
        let virtual_token = self.initial_virtual_token_reserves as u128;

        let new_token_reserves = mul_div(virtual_sol, virtual_token, virtual_sol + sol_in as u128)? + 1;
        let tokens_out = virtual_token
            .checked_sub(new_token_reserves)
            .ok_or(PricingError::ArithmeticOverflow)?;

        Ok(tokens_out.min(self.initial_real_token_reserves as u128) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anchor_lang::AnchorSerialize;

    fn sample() -> GlobalAccount {
        GlobalAccount {
            discriminator: 9_183_522_199_395_952_807,
            initialized: true,
            authority: Pubkey::new_unique(),
            fee_recipient: Pubkey::new_unique(),
            initial_virtual_token_reserves: 1_073_000_000_000_000,
            initial_virtual_sol_reserves: 30_000_000_000,
            initial_real_token_reserves: 793_100_000_000_000,
            token_total_supply: 1_000_000_000_000_000,
            fee_basis_points: 100,
        }
    }

    #[test]
    fn decodes_serialized_record() {
        let global = sample();
        let data = global.try_to_vec().unwrap();
        assert_eq!(data.len(), GlobalAccount::LEN);
        assert_eq!(GlobalAccount::decode(&data), Ok(global));
    }

    #[test]
    fn rejects_short_and_bad_flag() {
        let mut data = sample().try_to_vec().unwrap();
        assert!(matches!(
            GlobalAccount::decode(&data[..40]),
            Err(DecodeError::TooShort { .. })
        ));
        data[8] = 3;
        assert!(matches!(
            GlobalAccount::decode(&data),
            Err(DecodeError::InvalidBool { offset: 8, value: 3 })
        ));
    }

    #[test]
    fn initial_buy_price_follows_curve_formula() {
        let global = sample();
        assert_eq!(global.initial_buy_price(0), Ok(0));

        // 3e10 * 1.073e15 / 3.0015e10 = 1_072_463_768_115_942 (truncated), +1
        let expected = 1_073_000_000_000_000u64 - 1_072_463_768_115_943;
        assert_eq!(global.initial_buy_price(15_000_000), Ok(expected));
        assert_eq!(global.initial_buy_price(u64::MAX), Ok(793_100_000_000_000));
    }
}
