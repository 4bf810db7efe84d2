//! Per-feature normalization fitted on the training partition only.
//!
//! A scaler starts as `Identity` (no scaling configured) or
//! `Unfitted(method)`. `fit_transform` turns an unfitted scaler into
//! `Fitted(state)`; from then on only `transform` is allowed and the state is
//! never touched again. The fitted state is what gets persisted next to a
//! trained model.

use crate::domain::errors::PipelineError;
use ndarray::{Array1, Array2, ArrayView2, Axis, Zip};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalingMethod {
    Identity,
    MinMax,
    Standard,
}

impl FromStr for ScalingMethod {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "identity" | "none" => Ok(Self::Identity),
            "minmax" | "min_max" => Ok(Self::MinMax),
            "standard" => Ok(Self::Standard),
            _ => Err(PipelineError::invalid_parameter(
                "scaling_method",
                format!("unknown method `{}` (expected identity, minmax or standard)", s),
            )),
        }
    }
}

impl fmt::Display for ScalingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Identity => "identity",
            Self::MinMax => "minmax",
            Self::Standard => "standard",
        };
        write!(f, "{}", name)
    }
}

/// Learned parameters of a fitted scaler, one entry per feature column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum ScalerState {
    /// Maps `[data_min, data_max]` onto `[0, 1]`.
    MinMax {
        data_min: Vec<f64>,
        data_max: Vec<f64>,
    },
    /// Centres on `mean` and divides by the population standard deviation.
    Standard { mean: Vec<f64>, scale: Vec<f64> },
}

impl ScalerState {
    fn fit(method: ScalingMethod, data: ArrayView2<f64>) -> Result<Option<Self>, PipelineError> {
        if data.nrows() == 0 {
            return Err(PipelineError::InsufficientData {
                required: 1,
                available: 0,
            });
        }

        let state = match method {
            ScalingMethod::Identity => None,
            ScalingMethod::MinMax => {
                let data_min = data
                    .axis_iter(Axis(1))
                    .map(|col| col.fold(f64::INFINITY, |acc, &v| acc.min(v)))
                    .collect();
                let data_max = data
                    .axis_iter(Axis(1))
                    .map(|col| col.fold(f64::NEG_INFINITY, |acc, &v| acc.max(v)))
                    .collect();
                Some(Self::MinMax { data_min, data_max })
            }
            ScalingMethod::Standard => {
                let n = data.nrows() as f64;
                let mean: Vec<f64> = data
                    .axis_iter(Axis(1))
                    .map(|col| col.sum() / n)
                    .collect();
                let scale = data
                    .axis_iter(Axis(1))
                    .zip(mean.iter())
                    .map(|(col, m)| (col.fold(0.0, |acc, &v| acc + (v - m).powi(2)) / n).sqrt())
                    .collect();
                Some(Self::Standard { mean, scale })
            }
        };
        Ok(state)
    }

    pub fn method(&self) -> ScalingMethod {
        match self {
            Self::MinMax { .. } => ScalingMethod::MinMax,
            Self::Standard { .. } => ScalingMethod::Standard,
        }
    }

    pub fn n_features(&self) -> usize {
        match self {
            Self::MinMax { data_min, .. } => data_min.len(),
            Self::Standard { mean, .. } => mean.len(),
        }
    }

    /// Per-column `(offset, divisor)` so that `scaled = (x - offset) / divisor`.
    /// A zero divisor (constant column) is replaced by 1.
    fn coefficients(&self) -> (Array1<f64>, Array1<f64>) {
        let (offset, divisor): (Vec<f64>, Vec<f64>) = match self {
            Self::MinMax { data_min, data_max } => data_min
                .iter()
                .zip(data_max.iter())
                .map(|(lo, hi)| (*lo, non_zero(hi - lo)))
                .unzip(),
            Self::Standard { mean, scale } => mean
                .iter()
                .zip(scale.iter())
                .map(|(m, s)| (*m, non_zero(*s)))
                .unzip(),
        };
        (Array1::from(offset), Array1::from(divisor))
    }

    pub fn apply(&self, mut data: Array2<f64>) -> Result<Array2<f64>, PipelineError> {
        if data.ncols() != self.n_features() {
            return Err(PipelineError::schema(format!(
                "scaler was fitted on {} features, got {}",
                self.n_features(),
                data.ncols()
            )));
        }

        let (offset, divisor) = self.coefficients();
        for mut row in data.axis_iter_mut(Axis(0)) {
            Zip::from(&mut row)
                .and(&offset)
                .and(&divisor)
                .for_each(|v, &o, &d| *v = (*v - o) / d);
        }
        Ok(data)
    }
}

fn non_zero(v: f64) -> f64 {
    if v == 0.0 { 1.0 } else { v }
}

/// Normalization wrapper used by the preparation pipelines.
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureScaler {
    /// No scaling configured: data passes through unchanged.
    Identity,
    Unfitted(ScalingMethod),
    Fitted(ScalerState),
}

impl FeatureScaler {
    pub fn new(method: ScalingMethod) -> Self {
        match method {
            ScalingMethod::Identity => Self::Identity,
            method => Self::Unfitted(method),
        }
    }

    pub fn method(&self) -> ScalingMethod {
        match self {
            Self::Identity => ScalingMethod::Identity,
            Self::Unfitted(method) => *method,
            Self::Fitted(state) => state.method(),
        }
    }

    pub fn is_fitted(&self) -> bool {
        matches!(self, Self::Fitted(_))
    }

    /// Fitted parameters, if any.
    pub fn state(&self) -> Option<&ScalerState> {
        match self {
            Self::Fitted(state) => Some(state),
            _ => None,
        }
    }

    /// Learns the scaling parameters from `data` and returns `data` scaled.
    pub fn fit_transform(&mut self, data: Array2<f64>) -> Result<Array2<f64>, PipelineError> {
        match self {
            Self::Identity => Ok(data),
            Self::Unfitted(method) => match ScalerState::fit(*method, data.view())? {
                Some(state) => {
                    let scaled = state.apply(data)?;
                    *self = Self::Fitted(state);
                    Ok(scaled)
                }
                None => {
                    *self = Self::Identity;
                    Ok(data)
                }
            },
            Self::Fitted(_) => Err(PipelineError::invalid_parameter(
                "scaler",
                "already fitted; fitted parameters are immutable",
            )),
        }
    }

    /// Applies previously fitted parameters. Never re-fits.
    pub fn transform(&self, data: Array2<f64>) -> Result<Array2<f64>, PipelineError> {
        match self {
            Self::Identity => Ok(data),
            Self::Unfitted(method) => Err(PipelineError::NotFitted {
                reason: format!("{} scaler used before fit_transform", method),
            }),
            Self::Fitted(state) => state.apply(data),
        }
    }
}
