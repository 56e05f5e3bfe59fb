use crate::constants::BASIS_POINTS_DENOMINATOR;
use crate::errors::PricingError;

// Safe (a*b) / d with overflow checks
#[inline]
pub fn mul_div(a: u128, b: u128, d: u128) -> Result<u128, PricingError> {
    if d == 0 {
        return Err(PricingError::DivisionByZero);
    }
    a.checked_mul(b)
        .map(|p| p / d)
        .ok_or(PricingError::ArithmeticOverflow)
}

#[inline]
fn basis_points_of(amount: u64, basis_points: u64) -> Result<u128, PricingError> {
    mul_div(
        amount as u128,
        basis_points as u128,
        BASIS_POINTS_DENOMINATOR as u128,
    )
}

/// Upper bound a buyer is willing to pay: `amount + amount * bp / 10000`.
pub fn with_slippage_buy(amount: u64, basis_points: u64) -> Result<u64, PricingError> {
    let bound = (amount as u128)
        .checked_add(basis_points_of(amount, basis_points)?)
        .ok_or(PricingError::ArithmeticOverflow)?;
    u64::try_from(bound).map_err(|_| PricingError::ArithmeticOverflow)
}

/// Lower bound a seller will accept: `amount - amount * bp / 10000`.
/// Tolerances above 100% are rejected whatever the amount.
pub fn with_slippage_sell(amount: u64, basis_points: u64) -> Result<u64, PricingError> {
    if basis_points > BASIS_POINTS_DENOMINATOR {
        return Err(PricingError::SlippageTooLarge { basis_points });
    }
    let cut = basis_points_of(amount, basis_points)?;
    (amount as u128)
        .checked_sub(cut)
        .map(|bound| bound as u64)
        .ok_or(PricingError::SlippageTooLarge { basis_points })
}

/// Tolerance actually applied to curve trades: configured bps times the
/// configured multiplier.
pub fn scaled_basis_points(basis_points: u64, multiplier: u64) -> Result<u64, PricingError> {
    basis_points
        .checked_mul(multiplier)
        .ok_or(PricingError::ArithmeticOverflow)
}
