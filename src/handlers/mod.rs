pub mod audit;
pub mod metrics;
pub mod movements;
pub mod permissions;
pub mod stock_counts;

pub use crate::AppState;
