use crate::domain::errors::PipelineError;
use ndarray::{Array1, Array2, Array3, ArrayView1, ArrayView2, Axis, s, stack};

/// One training example: `sequence_length` consecutive feature rows and the
/// target that follows them.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledWindow {
    pub inputs: Array2<f64>,
    pub target: f64,
}

/// Model-ready batch: inputs `[n, sequence_length, features]`, targets `[n]`.
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceTensors {
    pub inputs: Array3<f64>,
    pub targets: Array1<f64>,
}

impl SequenceTensors {
    /// Packs labeled windows into contiguous tensors.
    pub fn from_windows(
        windows: Vec<LabeledWindow>,
        sequence_length: usize,
        n_features: usize,
    ) -> Result<Self, PipelineError> {
        let targets = windows.iter().map(|w| w.target).collect::<Array1<f64>>();
        let views: Vec<ArrayView2<f64>> = windows.iter().map(|w| w.inputs.view()).collect();

        let inputs = if views.is_empty() {
            Array3::zeros((0, sequence_length, n_features))
        } else {
            stack(Axis(0), &views).map_err(|e| {
                PipelineError::invalid_data(format!("windows have inconsistent shapes: {}", e))
            })?
        };

        Ok(Self { inputs, targets })
    }

    pub fn len(&self) -> usize {
        self.inputs.shape()[0]
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn sequence_length(&self) -> usize {
        self.inputs.shape()[1]
    }

    pub fn n_features(&self) -> usize {
        self.inputs.shape()[2]
    }
}

/// Cuts ordered feature rows into fixed-length windows.
#[derive(Debug, Clone, Copy)]
pub struct SequenceBuilder {
    sequence_length: usize,
}

impl SequenceBuilder {
    pub fn new(sequence_length: usize) -> Result<Self, PipelineError> {
        if sequence_length == 0 {
            return Err(PipelineError::invalid_parameter(
                "sequence_length",
                "must be greater than 0",
            ));
        }
        Ok(Self { sequence_length })
    }

    pub fn sequence_length(&self) -> usize {
        self.sequence_length
    }

    fn ensure_rows(&self, rows: usize) -> Result<(), PipelineError> {
        if rows < self.sequence_length {
            return Err(PipelineError::InsufficientData {
                required: self.sequence_length,
                available: rows,
            });
        }
        Ok(())
    }

    /// Training mode: `rows - S` examples, example `i` pairs
    /// `features[i..i+S]` with `target[i+S]`. A window never contains the row
    /// its target is taken from.
    pub fn training_windows(
        &self,
        features: ArrayView2<f64>,
        target: ArrayView1<f64>,
    ) -> Result<Vec<LabeledWindow>, PipelineError> {
        if features.nrows() != target.len() {
            return Err(PipelineError::invalid_data(format!(
                "{} feature rows but {} targets",
                features.nrows(),
                target.len()
            )));
        }

        let rows = features.nrows();
        self.ensure_rows(rows)?;

        let s = self.sequence_length;
        Ok((0..rows - s)
            .map(|i| LabeledWindow {
                inputs: features.slice(s![i..i + s, ..]).to_owned(),
                target: target[i + s],
            })
            .collect())
    }

    /// Inference mode: `rows - S + 1` windows, the last one ending on the
    /// final row.
    pub fn inference_windows(&self, features: ArrayView2<f64>) -> Result<Array3<f64>, PipelineError> {
        let rows = features.nrows();
        self.ensure_rows(rows)?;

        let s = self.sequence_length;
        let count = rows - s + 1;
        let mut windows = Array3::zeros((count, s, features.ncols()));
        for i in 0..count {
            windows
                .index_axis_mut(Axis(0), i)
                .assign(&features.slice(s![i..i + s, ..]));
        }
        Ok(windows)
    }
}
