pub mod types;
pub mod change_calculator;
pub mod engine;

pub use change_calculator::{percent_change, Change};
pub use engine::ValuationEngine;
pub use types::{AssetObservation, CycleReport, Holding, PortfolioSnapshot, Quotes};
