pub mod config;
pub mod logging;
pub mod errors;
pub mod decimal_utils;
pub mod db;
pub mod valuation;
pub mod price_feed;
pub mod portfolio_spec;
pub mod presentation;
pub mod scheduler;
