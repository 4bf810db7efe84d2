//! Tabular market data as it flows through the preparation pipeline.
//!
//! `MarketFrame` is the raw, column-flexible provider output. Cleaning turns
//! it into a `FeatureTable` restricted to [`FEATURE_COLUMNS`], ordering turns
//! that into an `OrderedTable`, and target derivation into a `TargetedTable`.
//! Each step consumes the previous value so partitions never share storage.

use super::feature_schema::{FEATURE_COLUMNS, feature_index};
use crate::domain::errors::PipelineError;
use ndarray::{Array1, Array2, Axis, s};

/// One named numeric column. `None` and NaN are both null cells.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub values: Vec<Option<f64>>,
}

impl Column {
    pub fn new(name: impl Into<String>, values: Vec<Option<f64>>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    fn is_null(&self, row: usize) -> bool {
        match self.values.get(row) {
            Some(Some(v)) => v.is_nan(),
            _ => true,
        }
    }
}

/// Raw provider output keyed by bar timestamp (milliseconds since epoch).
///
/// Every column holds exactly one value per timestamp; `new` is the only
/// way to build one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarketFrame {
    timestamps: Vec<i64>,
    columns: Vec<Column>,
}

impl MarketFrame {
    pub fn new(timestamps: Vec<i64>, columns: Vec<Column>) -> Result<Self, PipelineError> {
        for column in &columns {
            if column.values.len() != timestamps.len() {
                return Err(PipelineError::invalid_data(format!(
                    "column `{}` has {} values for {} timestamps",
                    column.name,
                    column.values.len(),
                    timestamps.len()
                )));
            }
        }
        Ok(Self {
            timestamps,
            columns,
        })
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn timestamps(&self) -> &[i64] {
        &self.timestamps
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Drops every row holding a null in any column.
    pub fn drop_null_rows(self) -> Self {
        let keep: Vec<usize> = (0..self.len())
            .filter(|&row| self.columns.iter().all(|c| !c.is_null(row)))
            .collect();
        self.retain_rows(&keep)
    }

    /// Keeps the `n` most recent rows, preserving their current order.
    pub fn latest_rows(self, n: usize) -> Self {
        if self.len() <= n {
            return self;
        }
        let mut keep: Vec<usize> = (0..self.len()).collect();
        keep.sort_by_key(|&row| std::cmp::Reverse(self.timestamps[row]));
        keep.truncate(n);
        keep.sort_unstable();
        self.retain_rows(&keep)
    }

    /// Keeps rows with `start_ms <= timestamp < end_ms`.
    pub fn between(self, start_ms: i64, end_ms: i64) -> Self {
        let keep: Vec<usize> = (0..self.len())
            .filter(|&row| (start_ms..end_ms).contains(&self.timestamps[row]))
            .collect();
        self.retain_rows(&keep)
    }

    fn retain_rows(self, keep: &[usize]) -> Self {
        if keep.len() == self.len() {
            return self;
        }

        let timestamps = keep.iter().map(|&row| self.timestamps[row]).collect();
        let columns = self
            .columns
            .into_iter()
            .map(|c| Column {
                values: keep.iter().map(|&row| c.values[row]).collect(),
                name: c.name,
            })
            .collect();

        Self {
            timestamps,
            columns,
        }
    }

    /// Restricts the frame to [`FEATURE_COLUMNS`], in that order.
    /// Other columns are dropped silently; a missing one is a schema error.
    pub fn select_features(self) -> Result<FeatureTable, PipelineError> {
        let rows = self.len();
        let mut features = Array2::<f64>::zeros((rows, FEATURE_COLUMNS.len()));

        for (j, name) in FEATURE_COLUMNS.iter().enumerate() {
            let column = self.column(name).ok_or_else(|| {
                PipelineError::schema(format!("required column `{}` is missing", name))
            })?;

            for (i, value) in column.values.iter().enumerate() {
                features[[i, j]] = value.ok_or_else(|| {
                    PipelineError::invalid_data(format!("null in column `{}` at row {}", name, i))
                })?;
            }
        }

        Ok(FeatureTable {
            timestamps: self.timestamps,
            features,
        })
    }
}

/// Clean table restricted to the model feature columns, in provider order.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTable {
    pub timestamps: Vec<i64>,
    pub features: Array2<f64>,
}

impl FeatureTable {
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Sorts rows ascending by timestamp. Timestamps must be unique.
    pub fn into_date_ordered(self) -> Result<OrderedTable, PipelineError> {
        let mut order: Vec<usize> = (0..self.len()).collect();
        order.sort_by_key(|&i| self.timestamps[i]);

        if let Some(pair) = order
            .windows(2)
            .find(|pair| self.timestamps[pair[0]] == self.timestamps[pair[1]])
        {
            return Err(PipelineError::invalid_data(format!(
                "duplicate timestamp {}",
                self.timestamps[pair[0]]
            )));
        }

        let timestamps = order.iter().map(|&i| self.timestamps[i]).collect();
        let features = self.features.select(Axis(0), &order);

        Ok(OrderedTable {
            timestamps,
            features,
        })
    }
}

/// Rows in strictly increasing timestamp order.
///
/// `timestamps` is kept only as a row index; it never enters `features`.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderedTable {
    pub timestamps: Vec<i64>,
    pub features: Array2<f64>,
}

impl OrderedTable {
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Derives `target[i] = column[i + 1]` and drops the final row, whose
    /// target is undefined.
    pub fn derive_target(self, target_column: &str) -> Result<TargetedTable, PipelineError> {
        let column = feature_index(target_column)?;
        let rows = self.len();

        if rows < 2 {
            return Err(PipelineError::InsufficientData {
                required: 2,
                available: rows,
            });
        }

        let target = self.features.slice(s![1.., column]).to_owned();
        let features = self.features.slice(s![..rows - 1, ..]).to_owned();
        let mut timestamps = self.timestamps;
        timestamps.truncate(rows - 1);

        Ok(TargetedTable {
            timestamps,
            features,
            target,
        })
    }
}

/// Ordered rows with a next-step target aligned to each row.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetedTable {
    pub timestamps: Vec<i64>,
    pub features: Array2<f64>,
    pub target: Array1<f64>,
}

impl TargetedTable {
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }
}
