//! Fixed-point money type — minor units (cents), half-up rounding.
//!
//! Scoring math (profit, CTR weighting) still happens in `f64` per the
//! scoring engine's contract; `Money` is the ledger-accurate representation
//! used for budgets and deltas, where float drift would eventually violate
//! `budget_spent <= budget_total`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub};

/// An amount of money in minor units (cents). `Money(250)` is $2.50.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct Money(pub i64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Build from a decimal dollar amount, rounding half up to the cent.
    ///
    /// Dollars are first snapped to four decimal places (ten-thousandths of
    /// a dollar) before rounding to whole cents. A literal like `1.005` is
    /// stored as `1.00499999999999989...` in `f64`, so multiplying straight
    /// through by 100 and flooring would silently round it down to 100
    /// cents instead of the intended 101; snapping recovers the decimal the
    /// caller meant.
    pub fn from_dollars(dollars: f64) -> Self {
        let ten_thousandths = (dollars * 10_000.0).round() as i64;
        Money(round_half_up_cents(ten_thousandths))
    }

    pub fn as_dollars(self) -> f64 {
        self.0 as f64 / 100.0
    }

    pub fn is_negative(self) -> bool {
        self.0 < 0
    }

    pub fn checked_sub(self, rhs: Money) -> Option<Money> {
        self.0.checked_sub(rhs.0).map(Money)
    }
}

impl Add for Money {
    type Output = Money;
    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) {
        self.0 += rhs.0;
    }
}

impl Sub for Money {
    type Output = Money;
    fn sub(self, rhs: Money) -> Money {
        Money(self.0 - rhs.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        Money(iter.map(|m| m.0).sum())
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.as_dollars())
    }
}

/// Half-up round ten-thousandths of a dollar to whole cents.
fn round_half_up_cents(ten_thousandths: i64) -> i64 {
    if ten_thousandths >= 0 {
        (ten_thousandths + 50) / 100
    } else {
        -((-ten_thousandths + 50) / 100)
    }
}
