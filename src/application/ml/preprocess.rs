use crate::domain::errors::PipelineError;
use crate::domain::ml::feature_schema::MIN_TRAINING_ROWS;
use crate::domain::ml::frame::{FeatureTable, MarketFrame};
use tracing::debug;

/// Row-count requirement checked before and after null removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowRequirement {
    /// Training: strictly more than `n` rows, else `InvalidData`.
    MoreThan(usize),
    /// Inference: at least `n` rows, else `InsufficientData`.
    AtLeast(usize),
}

impl RowRequirement {
    pub fn training() -> Self {
        Self::MoreThan(MIN_TRAINING_ROWS)
    }

    pub fn check(&self, rows: usize) -> Result<(), PipelineError> {
        if rows == 0 {
            return Err(PipelineError::invalid_data("table must not be empty"));
        }
        match *self {
            Self::MoreThan(n) if rows <= n => Err(PipelineError::invalid_data(format!(
                "table must have more than {} rows, got {}",
                n, rows
            ))),
            Self::AtLeast(n) if rows < n => Err(PipelineError::InsufficientData {
                required: n,
                available: rows,
            }),
            _ => Ok(()),
        }
    }
}

/// Validates a raw frame, drops null rows, re-validates and selects the
/// model feature columns.
#[derive(Debug, Clone, Copy)]
pub struct Preprocessor {
    requirement: RowRequirement,
}

impl Preprocessor {
    pub fn new(requirement: RowRequirement) -> Self {
        Self { requirement }
    }

    pub fn clean(&self, frame: MarketFrame) -> Result<FeatureTable, PipelineError> {
        self.requirement.check(frame.len())?;

        let before = frame.len();
        let frame = frame.drop_null_rows();
        if frame.len() != before {
            debug!(
                "Preprocessor: Dropped {} rows with null values ({} remain)",
                before - frame.len(),
                frame.len()
            );
        }

        // Null removal can push the table below the threshold.
        self.requirement.check(frame.len())?;

        frame.select_features()
    }
}
