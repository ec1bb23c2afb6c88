pub mod connection;
pub mod schema;
pub mod models;
pub mod queries;
pub mod history_store;

pub use history_store::HistoryStore;
