//! Training-side preparation: turns a clean feature table into train/test
//! tensors plus the scaler fitted on the training rows.
//!
//! Each stage is a distinct type consumed by exactly one function, so the
//! order `Validated → DateOrdered → TargetDerived → Split → Scaled →
//! Windowed → Tensorized` is enforced by the compiler. Any failure drops
//! every partition built so far.

use super::preprocess::RowRequirement;
use crate::domain::errors::PipelineError;
use crate::domain::ml::frame::{FeatureTable, OrderedTable, TargetedTable};
use crate::domain::ml::scaler::{FeatureScaler, ScalingMethod};
use crate::domain::ml::sequence::{LabeledWindow, SequenceBuilder, SequenceTensors};
use crate::domain::ml::split::{DatasetSplitter, SplitTables};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq)]
pub struct TrainPrepareConfig {
    pub train_size: f64,
    pub sequence_length: usize,
    pub target_column: String,
    pub scaling: ScalingMethod,
}

/// Output of the training preparation.
#[derive(Debug, Clone)]
pub struct PreparedDatasets {
    pub train: SequenceTensors,
    pub test: SequenceTensors,
    pub scaler: FeatureScaler,
}

pub struct Validated(FeatureTable);
pub struct DateOrdered(OrderedTable);
pub struct TargetDerived(TargetedTable);
pub struct Split(SplitTables);

pub struct Scaled {
    train: TargetedTable,
    test: TargetedTable,
    scaler: FeatureScaler,
}

pub struct Windowed {
    train: Vec<LabeledWindow>,
    test: Vec<LabeledWindow>,
    scaler: FeatureScaler,
    n_features: usize,
}

pub struct TrainPreparePipeline {
    splitter: DatasetSplitter,
    builder: SequenceBuilder,
    target_column: String,
    scaling: ScalingMethod,
}

impl TrainPreparePipeline {
    pub fn new(config: TrainPrepareConfig) -> Result<Self, PipelineError> {
        Ok(Self {
            splitter: DatasetSplitter::new(config.train_size)?,
            builder: SequenceBuilder::new(config.sequence_length)?,
            target_column: config.target_column,
            scaling: config.scaling,
        })
    }

    pub fn execute(&self, table: FeatureTable) -> Result<PreparedDatasets, PipelineError> {
        let validated = self.validate(table)?;
        let ordered = self.order(validated)?;
        let derived = self.derive_target(ordered)?;
        let split = self.split(derived);
        let scaled = self.scale(split)?;
        let windowed = self.window(scaled)?;
        self.tensorize(windowed)
    }

    pub fn validate(&self, table: FeatureTable) -> Result<Validated, PipelineError> {
        RowRequirement::training().check(table.len())?;

        let sequence_length = self.builder.sequence_length();
        if sequence_length > table.len() {
            return Err(PipelineError::invalid_parameter(
                "sequence_length",
                format!(
                    "{} cannot be greater than the number of rows ({})",
                    sequence_length,
                    table.len()
                ),
            ));
        }
        Ok(Validated(table))
    }

    pub fn order(&self, Validated(table): Validated) -> Result<DateOrdered, PipelineError> {
        Ok(DateOrdered(table.into_date_ordered()?))
    }

    pub fn derive_target(
        &self,
        DateOrdered(table): DateOrdered,
    ) -> Result<TargetDerived, PipelineError> {
        Ok(TargetDerived(table.derive_target(&self.target_column)?))
    }

    pub fn split(&self, TargetDerived(table): TargetDerived) -> Split {
        let split = self.splitter.split(table);
        debug!(
            "TrainPreparePipeline: Split into {} train / {} test rows",
            split.train.len(),
            split.test.len()
        );
        Split(split)
    }

    /// Fits the scaler on the training features only, then reuses it on the
    /// test features. The target column is never scaled.
    pub fn scale(&self, Split(split): Split) -> Result<Scaled, PipelineError> {
        let SplitTables { mut train, mut test } = split;
        let mut scaler = FeatureScaler::new(self.scaling);

        train.features = scaler.fit_transform(train.features)?;
        test.features = scaler.transform(test.features)?;

        Ok(Scaled {
            train,
            test,
            scaler,
        })
    }

    pub fn window(&self, scaled: Scaled) -> Result<Windowed, PipelineError> {
        let n_features = scaled.train.features.ncols();
        let train = self
            .builder
            .training_windows(scaled.train.features.view(), scaled.train.target.view())?;
        let test = self
            .builder
            .training_windows(scaled.test.features.view(), scaled.test.target.view())?;

        Ok(Windowed {
            train,
            test,
            scaler: scaled.scaler,
            n_features,
        })
    }

    pub fn tensorize(&self, windowed: Windowed) -> Result<PreparedDatasets, PipelineError> {
        let sequence_length = self.builder.sequence_length();
        let train =
            SequenceTensors::from_windows(windowed.train, sequence_length, windowed.n_features)?;
        let test =
            SequenceTensors::from_windows(windowed.test, sequence_length, windowed.n_features)?;

        info!(
            "TrainPreparePipeline: Prepared {} train / {} test sequences (length {}, {} features, scaler={})",
            train.len(),
            test.len(),
            sequence_length,
            windowed.n_features,
            windowed.scaler.method()
        );

        Ok(PreparedDatasets {
            train,
            test,
            scaler: windowed.scaler,
        })
    }
}
