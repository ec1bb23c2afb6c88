use std::str::FromStr;
use rust_decimal::Decimal;
use serde_json::{Number, Value};

/// Converts a JSON number through its shortest textual form, so `0.1` stays `0.1`
pub fn json_number_to_decimal(number: &Number) -> Option<Decimal> {
    let repr = number.to_string();
    Decimal::from_str(&repr)
        .or_else(|_| Decimal::from_scientific(&repr))
        .ok()
}

/// Accepts JSON numbers and numeric strings
pub fn json_value_to_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => json_number_to_decimal(n),
        Value::String(s) => {
            let trimmed = s.trim();
            Decimal::from_str(trimmed)
                .or_else(|_| Decimal::from_scientific(trimmed))
                .ok()
        }
        _ => None,
    }
}
