pub mod evaluator;
pub mod lstm_regressor;
pub mod predict_prepare;
pub mod predictor;
pub mod preprocess;
pub mod train_prepare;
pub mod trainer;
