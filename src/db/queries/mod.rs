pub mod asset_observations;
pub mod portfolio_snapshots;
