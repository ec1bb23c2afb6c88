pub mod asset_observations;
pub mod portfolio_snapshots;

use std::str::FromStr;
use rust_decimal::Decimal;

use crate::valuation::Change;

// Decimals are stored as text so nothing is lost to REAL affinity

pub(crate) fn decimal_to_text(value: Decimal) -> String {
    value.to_string()
}

pub(crate) fn change_to_text(change: Change) -> Option<String> {
    change.as_option().map(decimal_to_text)
}

pub(crate) fn text_to_decimal(column: &str, raw: &str) -> Result<Decimal, sqlx::Error> {
    Decimal::from_str(raw).map_err(|e| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(e),
    })
}

pub(crate) fn text_to_change(column: &str, raw: Option<&str>) -> Result<Change, sqlx::Error> {
    match raw {
        Some(raw) => Ok(Change::Present(text_to_decimal(column, raw)?)),
        None => Ok(Change::Absent),
    }
}
