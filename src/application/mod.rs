// Data preparation, training and inference pipeline
pub mod ml;

// Request-level orchestration
pub mod model_service;
