pub mod audit;
pub mod metrics;
pub mod movements;
pub mod stock_count;
