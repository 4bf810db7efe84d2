pub mod alpaca;
pub mod core;
pub mod csv_market_data;
pub mod factory;
pub mod mock;
pub mod persistence;

pub use factory::ServiceFactory;
