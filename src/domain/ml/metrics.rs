//! Regression accuracy metrics, each computed in one pass over a full
//! partition.

use crate::domain::errors::PipelineError;
use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};

/// Accuracy of one partition: `{mae, mape, rmse, r2}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    pub mae: f64,
    /// Fraction, not percent.
    pub mape: f64,
    pub rmse: f64,
    pub r2: f64,
}

impl RegressionMetrics {
    pub fn compute(
        y_true: ArrayView1<f64>,
        y_pred: ArrayView1<f64>,
    ) -> Result<Self, PipelineError> {
        if y_true.len() != y_pred.len() {
            return Err(PipelineError::invalid_data(format!(
                "{} targets but {} predictions",
                y_true.len(),
                y_pred.len()
            )));
        }
        if y_true.is_empty() {
            return Err(PipelineError::InsufficientData {
                required: 1,
                available: 0,
            });
        }

        Ok(Self {
            mae: mean_absolute_error(y_true, y_pred),
            mape: mean_absolute_percentage_error(y_true, y_pred),
            rmse: root_mean_squared_error(y_true, y_pred),
            r2: r2_score(y_true, y_pred),
        })
    }
}

pub fn mean_absolute_error(y_true: ArrayView1<f64>, y_pred: ArrayView1<f64>) -> f64 {
    let n = y_true.len() as f64;
    y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(t, p)| (t - p).abs())
        .sum::<f64>()
        / n
}

/// `|y - ŷ| / max(|y|, ε)`, averaged. Zero targets do not divide by zero.
pub fn mean_absolute_percentage_error(y_true: ArrayView1<f64>, y_pred: ArrayView1<f64>) -> f64 {
    let n = y_true.len() as f64;
    y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(t, p)| (t - p).abs() / t.abs().max(f64::EPSILON))
        .sum::<f64>()
        / n
}

pub fn root_mean_squared_error(y_true: ArrayView1<f64>, y_pred: ArrayView1<f64>) -> f64 {
    let n = y_true.len() as f64;
    (y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(t, p)| (t - p).powi(2))
        .sum::<f64>()
        / n)
        .sqrt()
}

/// Coefficient of determination. A constant target scores 1.0 when predicted
/// exactly and 0.0 otherwise.
pub fn r2_score(y_true: ArrayView1<f64>, y_pred: ArrayView1<f64>) -> f64 {
    let n = y_true.len() as f64;
    let mean = y_true.sum() / n;

    let ss_res: f64 = y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(t, p)| (t - p).powi(2))
        .sum();
    let ss_tot: f64 = y_true.iter().map(|t| (t - mean).powi(2)).sum();

    if ss_tot == 0.0 {
        if ss_res == 0.0 { 1.0 } else { 0.0 }
    } else {
        1.0 - ss_res / ss_tot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_metrics_known_values() {
        let y_true = array![1.0, 2.0, 4.0];
        let y_pred = array![2.0, 2.0, 2.0];

        let m = RegressionMetrics::compute(y_true.view(), y_pred.view()).unwrap();

        assert!((m.mae - 1.0).abs() < 1e-12);
        assert!((m.mape - (1.0 + 0.0 + 0.5) / 3.0).abs() < 1e-12);
        assert!((m.rmse - (5.0f64 / 3.0).sqrt()).abs() < 1e-12);
        // mean = 7/3, ss_tot = 14/3, ss_res = 5
        assert!((m.r2 - (1.0 - 5.0 / (14.0 / 3.0))).abs() < 1e-12);
    }

    #[test]
    fn test_perfect_prediction() {
        let y = array![3.0, 1.0, 2.0];
        let m = RegressionMetrics::compute(y.view(), y.view()).unwrap();
        assert_eq!(m.mae, 0.0);
        assert_eq!(m.rmse, 0.0);
        assert_eq!(m.r2, 1.0);
    }

    #[test]
    fn test_constant_target_r2() {
        let y = array![5.0, 5.0];
        assert_eq!(r2_score(y.view(), y.view()), 1.0);
        assert_eq!(r2_score(y.view(), array![4.0, 6.0].view()), 0.0);
    }

    #[test]
    fn test_zero_target_mape_is_finite() {
        let mape = mean_absolute_percentage_error(array![0.0].view(), array![1.0].view());
        assert!(mape.is_finite());
    }

    #[test]
    fn test_length_mismatch_and_empty() {
        let err = RegressionMetrics::compute(array![1.0].view(), array![1.0, 2.0].view())
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidData { .. }));

        let empty = ndarray::Array1::<f64>::zeros(0);
        let err = RegressionMetrics::compute(empty.view(), empty.view()).unwrap_err();
        assert!(matches!(err, PipelineError::InsufficientData { .. }));
    }
}
