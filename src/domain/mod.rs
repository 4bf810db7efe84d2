// Domain-specific error types
pub mod errors;

// Data preparation and model contracts
pub mod ml;

// Port interfaces
pub mod ports;
