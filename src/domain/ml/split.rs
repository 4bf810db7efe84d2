use super::frame::TargetedTable;
use crate::domain::errors::PipelineError;
use ndarray::s;

/// Chronological train/test partitions. The test partition starts right
/// after the last training row; nothing is shuffled across the boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitTables {
    pub train: TargetedTable,
    pub test: TargetedTable,
}

/// Splits an ordered table into a training prefix and a testing suffix.
#[derive(Debug, Clone, Copy)]
pub struct DatasetSplitter {
    train_size: f64,
}

impl DatasetSplitter {
    /// `train_size` must lie strictly between 0 and 1.
    pub fn new(train_size: f64) -> Result<Self, PipelineError> {
        if !(train_size > 0.0 && train_size < 1.0) {
            return Err(PipelineError::invalid_parameter(
                "train_size",
                format!("must be between 0 and 1 (exclusive), got {}", train_size),
            ));
        }
        Ok(Self { train_size })
    }

    /// Number of training rows for a table of `len` rows: `floor(len * p)`.
    pub fn train_len(&self, len: usize) -> usize {
        (len as f64 * self.train_size).floor() as usize
    }

    pub fn split(&self, table: TargetedTable) -> SplitTables {
        let cut = self.train_len(table.len());
        let TargetedTable {
            mut timestamps,
            features,
            target,
        } = table;

        let test_timestamps = timestamps.split_off(cut);

        SplitTables {
            train: TargetedTable {
                timestamps,
                features: features.slice(s![..cut, ..]).to_owned(),
                target: target.slice(s![..cut]).to_owned(),
            },
            test: TargetedTable {
                timestamps: test_timestamps,
                features: features.slice(s![cut.., ..]).to_owned(),
                target: target.slice(s![cut..]).to_owned(),
            },
        }
    }
}
