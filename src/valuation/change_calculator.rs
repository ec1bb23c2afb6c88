use std::fmt;
use rust_decimal::Decimal;
use rust_decimal::prelude::*;

/// Percentage change against a baseline, or the lack of a usable baseline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    Present(Decimal),
    Absent,
}

impl Change {
    pub fn from_option(value: Option<Decimal>) -> Self {
        value.map_or(Change::Absent, Change::Present)
    }

    pub fn as_option(&self) -> Option<Decimal> {
        match self {
            Change::Present(v) => Some(*v),
            Change::Absent => None,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Change::Absent)
    }

    /// Rounds a present value to `dp` places; absent stays absent
    pub fn round_dp(self, dp: u32) -> Self {
        match self {
            Change::Present(v) => Change::Present(v.round_dp(dp)),
            Change::Absent => Change::Absent,
        }
    }
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Change::Present(v) => {
                let rounded = v.round_dp(2);
                if rounded.is_sign_negative() && !rounded.is_zero() {
                    write!(f, "{:.2}%", rounded)
                } else {
                    write!(f, "+{:.2}%", rounded.abs())
                }
            }
            Change::Absent => write!(f, "N/A"),
        }
    }
}

/// `(current - previous) / previous * 100`, exact; no baseline, a zero baseline
/// or a ratio outside the `Decimal` range gives `Absent`
pub fn percent_change(current: Decimal, previous: Option<Decimal>) -> Change {
    let Some(prev) = previous.filter(|p| !p.is_zero()) else {
        return Change::Absent;
    };
    let ratio = current
        .checked_sub(prev)
        .and_then(|delta| delta.checked_div(prev))
        .and_then(|ratio| ratio.checked_mul(dec!(100)));
    Change::from_option(ratio)
}
