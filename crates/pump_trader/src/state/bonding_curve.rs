use anchor_lang::{AnchorDeserialize, AnchorSerialize};

use crate::constants::{BASIS_POINTS_DENOMINATOR, BUMP_REAL_SOL_LIMIT};
use crate::errors::{DecodeError, PricingError};
use crate::math::mul_div;

/// Point-in-time snapshot of a bonding curve account.
///
/// Decoded fresh before every pricing decision and never mutated; a stale
/// snapshot prices against reserves the program no longer holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AnchorSerialize, AnchorDeserialize)]
pub struct BondingCurveAccount {
    pub discriminator: u64,
    pub virtual_token_reserves: u64,
    pub virtual_sol_reserves: u64,
    pub real_token_reserves: u64,
    pub real_sol_reserves: u64,
    pub token_total_supply: u64,
    pub complete: bool,
}

impl BondingCurveAccount {
    /// Six u64 fields followed by the `complete` flag.
    pub const LEN: usize = 8 * 6 + 1;
    const COMPLETE_OFFSET: usize = 8 * 6;

    /// Parses the fixed little-endian layout. Bytes past [`Self::LEN`] are
    /// ignored; newer program versions append fields after `complete`.
    pub fn decode(data: &[u8]) -> Result<Self, DecodeError> {
        if data.len() < Self::LEN {
            return Err(DecodeError::TooShort {
                expected: Self::LEN,
                actual: data.len(),
            });
        }
        let tag = data[Self::COMPLETE_OFFSET];
        if tag > 1 {
            return Err(DecodeError::InvalidBool {
                offset: Self::COMPLETE_OFFSET,
                value: tag,
            });
        }

        let curve = Self::deserialize(&mut &data[..Self::LEN])
            .map_err(|e| DecodeError::Malformed(e.to_string()))?;

        if !curve.complete
            && (curve.virtual_token_reserves == 0 || curve.virtual_sol_reserves == 0)
        {
            return Err(DecodeError::ZeroReserves);
        }
        Ok(curve)
    }

    /// Tokens received for `sol_in` lamports.
    ///
    /// Constant product over the virtual reserves:
    ///
    /// ```text
    /// k          = virtual_sol * virtual_token
    /// new_token  = k / (virtual_sol + sol_in) + 1
    /// tokens_out = min(virtual_token - new_token, real_token)
    /// ```
    ///
    /// The `+ 1` rounds the remaining supply up so truncation never favours
    /// the buyer, and the clamp keeps a buy from claiming more than the real
    /// reserves backing the curve. Both must match the program exactly or the
    /// buy instruction is rejected.
    ///
    /// A bump buy is refused outright once real SOL reserves pass
    /// [`BUMP_REAL_SOL_LIMIT`].
    pub fn quote_buy(&self, sol_in: u64, bump: bool) -> Result<u64, PricingError> {
        if self.complete {
            return Err(PricingError::CurveComplete);
        }
        if bump && self.real_sol_reserves > BUMP_REAL_SOL_LIMIT {
            return Err(PricingError::BumpRestricted {
                real_sol_reserves: self.real_sol_reserves,
                limit: BUMP_REAL_SOL_LIMIT,
            });
        }
        if sol_in == 0 {
            return Ok(0);
        }

        let virtual_sol = self.virtual_sol_reserves as u128;
        let virtual_token = self.virtual_token_reserves as u128;

        let new_token_reserves = mul_div(virtual_sol, virtual_token, virtual_sol + sol_in as u128)? + 1;
        let tokens_out = virtual_token
            .checked_sub(new_token_reserves)
            .ok_or(PricingError::ArithmeticOverflow)?;

        Ok(tokens_out.min(self.real_token_reserves as u128) as u64)
    }

    /// Lamports received for selling `tokens_in`, after the protocol fee.
    ///
    /// `gross = tokens_in * virtual_sol / (virtual_token + tokens_in)`, then
    /// `fee = gross * fee_basis_points / 10000`; both divisions truncate.
    pub fn quote_sell(&self, tokens_in: u64, fee_basis_points: u64) -> Result<u64, PricingError> {
        if self.complete {
            return Err(PricingError::CurveComplete);
        }
        if tokens_in == 0 {
            return Ok(0);
        }

        let gross = mul_div(
            tokens_in as u128,
            self.virtual_sol_reserves as u128,
            self.virtual_token_reserves as u128 + tokens_in as u128,
        )?;
        let fee = mul_div(gross, fee_basis_points as u128, BASIS_POINTS_DENOMINATOR as u128)?;

        gross
            .checked_sub(fee)
            .map(|net| net as u64)
            .ok_or(PricingError::ArithmeticOverflow)
    }

    /// Market cap in lamports at the current virtual price.
    pub fn market_cap(&self) -> u128 {
        if self.virtual_token_reserves == 0 {
            return 0;
        }
        self.token_total_supply as u128 * self.virtual_sol_reserves as u128
            / self.virtual_token_reserves as u128
    }

    /// Cost of buying out the remaining real reserves, fee included.
    ///
    /// The effective amount is `max(amount, real_sol_reserves)`. When it
    /// reaches the virtual token reserves there is nothing left to price
    /// against and the buy-out is rejected rather than dividing by zero.
    pub fn buy_out_price(&self, amount: u64, fee_basis_points: u64) -> Result<u128, PricingError> {
        let sol_tokens = amount.max(self.real_sol_reserves);
        if self.virtual_token_reserves <= sol_tokens {
            return Err(PricingError::BuyOutExceedsReserves {
                sol_tokens,
                virtual_token_reserves: self.virtual_token_reserves,
            });
        }

        let total_sell_value = mul_div(
            sol_tokens as u128,
            self.virtual_sol_reserves as u128,
            (self.virtual_token_reserves - sol_tokens) as u128,
        )? + 1;
        let fee = mul_div(
            total_sell_value,
            fee_basis_points as u128,
            BASIS_POINTS_DENOMINATOR as u128,
        )?;

        total_sell_value
            .checked_add(fee)
            .ok_or(PricingError::ArithmeticOverflow)
    }

    /// Market cap once every real token has been bought out.
    pub fn final_market_cap(&self, fee_basis_points: u64) -> Result<u128, PricingError> {
        let total_virtual_tokens = self
            .virtual_token_reserves
            .checked_sub(self.real_token_reserves)
            .ok_or(PricingError::ArithmeticOverflow)?;
        if total_virtual_tokens == 0 {
            return Ok(0);
        }

        let total_sell_value = self.buy_out_price(self.real_token_reserves, fee_basis_points)?;
        let total_virtual_value = (self.virtual_sol_reserves as u128)
            .checked_add(total_sell_value)
            .ok_or(PricingError::ArithmeticOverflow)?;

        mul_div(
            self.token_total_supply as u128,
            total_virtual_value,
            total_virtual_tokens as u128,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference_curve() -> BondingCurveAccount {
        BondingCurveAccount {
            discriminator: 6_966_180_631_402_821_399,
            virtual_token_reserves: 1_000_000_000,
            virtual_sol_reserves: 30_000_000_000,
            real_token_reserves: 800_000_000,
            real_sol_reserves: 0,
            token_total_supply: 1_000_000_000,
            complete: false,
        }
    }

    fn encode(curve: &BondingCurveAccount) -> Vec<u8> {
        let mut data = Vec::with_capacity(BondingCurveAccount::LEN);
        for field in [
            curve.discriminator,
            curve.virtual_token_reserves,
            curve.virtual_sol_reserves,
            curve.real_token_reserves,
            curve.real_sol_reserves,
            curve.token_total_supply,
        ] {
            data.extend_from_slice(&field.to_le_bytes());
        }
        data.push(curve.complete as u8);
        data
    }

    #[test]
    fn decodes_exact_layout() {
        let curve = reference_curve();
        let data = encode(&curve);
        assert_eq!(data.len(), BondingCurveAccount::LEN);
        assert_eq!(BondingCurveAccount::decode(&data), Ok(curve));
    }

    #[test]
    fn decode_ignores_trailing_fields() {
        let curve = reference_curve();
        let mut data = encode(&curve);
        data.extend_from_slice(&[7u8; 32]);
        assert_eq!(BondingCurveAccount::decode(&data), Ok(curve));
    }

    #[test]
    fn decode_rejects_short_buffer() {
        let data = encode(&reference_curve());
        assert_eq!(
            BondingCurveAccount::decode(&data[..BondingCurveAccount::LEN - 1]),
            Err(DecodeError::TooShort {
                expected: 49,
                actual: 48
            })
        );
        assert!(BondingCurveAccount::decode(&[]).is_err());
    }

    #[test]
    fn decode_rejects_out_of_range_flag() {
        let mut data = encode(&reference_curve());
        data[48] = 2;
        assert_eq!(
            BondingCurveAccount::decode(&data),
            Err(DecodeError::InvalidBool {
                offset: 48,
                value: 2
            })
        );
    }

    #[test]
    fn decode_rejects_open_curve_without_reserves() {
        let mut curve = reference_curve();
        curve.virtual_sol_reserves = 0;
        assert_eq!(
            BondingCurveAccount::decode(&encode(&curve)),
            Err(DecodeError::ZeroReserves)
        );

        curve.complete = true;
        assert!(BondingCurveAccount::decode(&encode(&curve)).is_ok());
    }

    #[test]
    fn quote_buy_reference_value() {
        // 30e18 / 31e9 = 967_741_935, +1, subtracted from 1e9
        assert_eq!(reference_curve().quote_buy(1_000_000_000, false), Ok(32_258_064));
    }

    #[test]
    fn quote_buy_clamps_to_real_reserves() {
        let curve = reference_curve();
        for sol_in in [1u64, 1_000, 1_000_000_000, 30_000_000_000, 500_000_000_000_000, u64::MAX] {
            let tokens = curve.quote_buy(sol_in, false).unwrap();
            assert!(tokens <= curve.real_token_reserves);
        }
        assert_eq!(curve.quote_buy(u64::MAX, false), Ok(800_000_000));
    }

    #[test]
    fn zero_amounts_are_no_ops() {
        let curve = reference_curve();
        assert_eq!(curve.quote_buy(0, false), Ok(0));
        assert_eq!(curve.quote_sell(0, 100), Ok(0));
    }

    #[test]
    fn complete_curve_rejects_trades() {
        let mut curve = reference_curve();
        curve.complete = true;
        for amount in [0u64, 1, 1_000_000_000] {
            assert_eq!(curve.quote_buy(amount, false), Err(PricingError::CurveComplete));
            assert_eq!(curve.quote_buy(amount, true), Err(PricingError::CurveComplete));
            assert_eq!(curve.quote_sell(amount, 100), Err(PricingError::CurveComplete));
        }
    }

    #[test]
    fn bump_buy_respects_real_sol_limit() {
        let mut curve = reference_curve();

        curve.real_sol_reserves = BUMP_REAL_SOL_LIMIT;
        assert!(curve.quote_buy(1_000_000, true).is_ok());

        curve.real_sol_reserves = BUMP_REAL_SOL_LIMIT + 1;
        assert_eq!(
            curve.quote_buy(1_000_000, true),
            Err(PricingError::BumpRestricted {
                real_sol_reserves: BUMP_REAL_SOL_LIMIT + 1,
                limit: BUMP_REAL_SOL_LIMIT,
            })
        );
        // the restriction only applies to bump buys
        assert!(curve.quote_buy(1_000_000, false).is_ok());
    }

    #[test]
    fn quote_sell_applies_fee() {
        let curve = reference_curve();
        // gross = 1e8 * 3e10 / 1.1e9 = 2_727_272_727, fee 1% = 27_272_727
        assert_eq!(curve.quote_sell(100_000_000, 100), Ok(2_700_000_000));
        assert_eq!(curve.quote_sell(100_000_000, 0), Ok(2_727_272_727));
    }

    #[test]
    fn quote_sell_rejects_fee_above_full_amount() {
        let curve = reference_curve();
        assert_eq!(curve.quote_sell(100_000_000, 10_000), Ok(0));
        assert_eq!(
            curve.quote_sell(100_000_000, 10_001),
            Err(PricingError::ArithmeticOverflow)
        );
    }

    #[test]
    fn market_cap_values() {
        let mut curve = reference_curve();
        assert_eq!(curve.market_cap(), 30_000_000_000);
        curve.virtual_token_reserves = 0;
        assert_eq!(curve.market_cap(), 0);
    }

    #[test]
    fn buy_out_price_includes_fee() {
        // 8e8 * 3e10 / 2e8 + 1 = 120_000_000_001, plus 1% fee
        assert_eq!(
            reference_curve().buy_out_price(800_000_000, 100),
            Ok(121_200_000_001)
        );
    }

    #[test]
    fn buy_out_price_uses_larger_of_amount_and_real_sol() {
        let mut curve = reference_curve();
        curve.real_sol_reserves = 800_000_000;
        assert_eq!(
            curve.buy_out_price(1, 0),
            reference_curve().buy_out_price(800_000_000, 0)
        );
    }

    #[test]
    fn buy_out_price_rejects_exhausted_reserves() {
        let curve = reference_curve();
        assert_eq!(
            curve.buy_out_price(1_000_000_000, 100),
            Err(PricingError::BuyOutExceedsReserves {
                sol_tokens: 1_000_000_000,
                virtual_token_reserves: 1_000_000_000,
            })
        );
    }

    #[test]
    fn final_market_cap_values() {
        // supply * (3e10 + 121_200_000_001) / 2e8
        assert_eq!(reference_curve().final_market_cap(100), Ok(756_000_000_005));

        let mut curve = reference_curve();
        curve.real_token_reserves = curve.virtual_token_reserves;
        assert_eq!(curve.final_market_cap(100), Ok(0));
    }

    #[test]
    fn pricing_is_deterministic() {
        let curve = reference_curve();
        assert_eq!(
            curve.quote_buy(123_456_789, false),
            curve.quote_buy(123_456_789, false)
        );
        assert_eq!(curve.quote_sell(987_654, 125), curve.quote_sell(987_654, 125));
    }
}
