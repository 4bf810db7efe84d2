//! Leakage-free data-to-tensor preparation: tables, scaling, splitting,
//! windowing and accuracy metrics.

pub mod feature_schema;
pub mod frame;
pub mod metrics;
pub mod model;
pub mod request;
pub mod scaler;
pub mod sequence;
pub mod split;
