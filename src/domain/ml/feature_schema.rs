use crate::domain::errors::PipelineError;

/// Column holding the bar timestamp in raw provider frames.
pub const DATE_COLUMN: &str = "Date";

/// Ordered list of model input columns.
/// This order is baked into every fitted scaler and trained model.
/// Any change here is a breaking change for persisted artifacts.
pub const FEATURE_COLUMNS: &[&str] = &["Open", "High", "Low", "Close", "Volume"];

/// Minimum number of clean rows a training request must exceed.
pub const MIN_TRAINING_ROWS: usize = 200;

/// Upper bound on training epochs accepted from a request.
pub const MAX_EPOCHS: usize = 1000;

/// Position of `name` in [`FEATURE_COLUMNS`].
pub fn feature_index(name: &str) -> Result<usize, PipelineError> {
    FEATURE_COLUMNS
        .iter()
        .position(|c| *c == name)
        .ok_or_else(|| {
            PipelineError::schema(format!(
                "column `{}` is not one of {:?}",
                name, FEATURE_COLUMNS
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_index_lookup() {
        assert_eq!(feature_index("Open").unwrap(), 0);
        assert_eq!(feature_index("Close").unwrap(), 3);
        assert_eq!(feature_index("Volume").unwrap(), FEATURE_COLUMNS.len() - 1);
    }

    #[test]
    fn test_unknown_column_is_schema_error() {
        let err = feature_index("Adj Close").unwrap_err();
        assert!(matches!(err, PipelineError::Schema { .. }));
    }
}
