use std::fs;
use std::path::{Path, PathBuf};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::decimal_utils::json_value_to_decimal;
use crate::errors::ConfigError;
use crate::valuation::Holding;

/// Holdings to value and the currency to value them in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortfolioSpec {
    pub holdings: Vec<Holding>, // In the order the source defines them
    pub currency: String,
}

impl PortfolioSpec {
    pub fn symbols(&self) -> Vec<String> {
        self.holdings.iter().map(|h| h.symbol.clone()).collect()
    }
}

/// Supplies the portfolio spec at the start of each cycle
pub trait PortfolioSource: Send + Sync {
    fn load(&self) -> Result<PortfolioSpec, ConfigError>;
}

/// `{"portfolio": {"BTC": 0.5, ...}, "currency": "USD"}` on disk, re-read every cycle
#[derive(Debug, Clone)]
pub struct JsonPortfolioFile {
    path: PathBuf,
}

impl JsonPortfolioFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PortfolioSource for JsonPortfolioFile {
    #[instrument(skip(self), fields(path = %self.path.display()))]
    fn load(&self) -> Result<PortfolioSpec, ConfigError> {
        let content = fs::read_to_string(&self.path).map_err(|source| ConfigError::Io {
            path: self.path.display().to_string(),
            source,
        })?;
        let spec = parse_portfolio(&content)?;
        debug!(holdings = spec.holdings.len(), currency = %spec.currency, "Portfolio spec loaded");
        Ok(spec)
    }
}

pub fn parse_portfolio(content: &str) -> Result<PortfolioSpec, ConfigError> {
    let json: Value = serde_json::from_str(content)?;

    let portfolio = json
        .get("portfolio")
        .and_then(Value::as_object)
        .ok_or(ConfigError::MissingField("portfolio"))?;
    let currency = json
        .get("currency")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .ok_or(ConfigError::MissingField("currency"))?;

    let mut holdings = Vec::with_capacity(portfolio.len());
    for (symbol, raw_amount) in portfolio {
        let amount = json_value_to_decimal(raw_amount).ok_or_else(|| ConfigError::InvalidAmount {
            symbol: symbol.clone(),
            reason: format!("not a number: {}", raw_amount),
        })?;
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(ConfigError::InvalidAmount {
                symbol: symbol.clone(),
                reason: format!("negative amount {}", amount),
            });
        }
        holdings.push(Holding::new(symbol.clone(), amount));
    }

    if holdings.is_empty() {
        return Err(ConfigError::EmptyPortfolio);
    }

    Ok(PortfolioSpec {
        holdings,
        currency: currency.to_string(),
    })
}
