//! Partner payout pricing.

use crate::error::{MarketError, MarketResult};
use crate::money::Money;

/// Compute the partner's payout for one click, after the platform fee.
///
/// `fee_percent` is clamped to `[0, 100]`; the result is rounded half up
/// to the cent, matching `Money`'s rounding convention.
pub fn partner_payout(buyer_cpc: Money, fee_percent: f64) -> MarketResult<Money> {
    if buyer_cpc.is_negative() || buyer_cpc == Money::ZERO {
        return Err(MarketError::Config(format!(
            "buyer_cpc must be positive, got {buyer_cpc}"
        )));
    }
    let fee = fee_percent.clamp(0.0, 100.0);
    let payout_dollars = buyer_cpc.as_dollars() * (100.0 - fee) / 100.0;
    Ok(Money::from_dollars(payout_dollars))
}
