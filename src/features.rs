//! Feature extraction and scaling.
//!
//! Selects the clustering columns from a [`TrackTable`] and standardizes
//! each one to zero mean and unit variance. Statistics are fit on the rows
//! of each call and thrown away afterwards, so normalization is only
//! consistent within one batch of tracks.

use crate::table::TrackTable;
use crate::track::FEATURE_COLUMNS;
use anyhow::{bail, Context, Result};
use log::{debug, trace};

/// Rectangular numeric table: one row per track, one column per attribute.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureMatrix {
    rows: Vec<Vec<f64>>,
    width: usize,
}

impl FeatureMatrix {
    /// Builds a matrix from rows, rejecting rows of unequal width.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self> {
        let width = rows.first().map_or(0, Vec::len);
        if let Some(idx) = rows.iter().position(|row| row.len() != width) {
            bail!(
                "Row {idx} has {} values, expected {width}",
                rows[idx].len()
            );
        }
        Ok(Self { rows, width })
    }

    #[must_use]
    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    #[must_use]
    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn n_cols(&self) -> usize {
        self.width
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Copy of column `idx`.
    #[must_use]
    pub fn column(&self, idx: usize) -> Vec<f64> {
        self.rows.iter().map(|row| row[idx]).collect()
    }
}

/// Location and spread of one column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnStats {
    pub mean: f64,
    /// Population standard deviation (divides by `n`).
    pub std_dev: f64,
}

impl ColumnStats {
    /// Fits statistics over `values`. Expects at least one value.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn fit(values: &[f64]) -> Self {
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|&v| (v - mean).powi(2)).sum::<f64>() / n;
        Self {
            mean,
            std_dev: variance.sqrt(),
        }
    }

    /// Standardizes a value. Constant columns keep a scale of 1, so they
    /// come out as zeros rather than NaN.
    #[must_use]
    pub fn scale(&self, value: f64) -> f64 {
        let spread = if self.std_dev > f64::EPSILON {
            self.std_dev
        } else {
            1.0
        };
        (value - self.mean) / spread
    }
}

/// Selects a fixed, ordered set of numeric columns and standardizes them.
#[derive(Debug, Clone)]
pub struct FeatureTransformer {
    columns: Vec<String>,
}

impl Default for FeatureTransformer {
    fn default() -> Self {
        Self {
            columns: FEATURE_COLUMNS.iter().map(|c| (*c).to_string()).collect(),
        }
    }
}

impl FeatureTransformer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Transformer over a custom column list.
    #[must_use]
    pub fn with_columns<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }

    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Selects and standardizes the configured columns of `table`.
    ///
    /// # Errors
    ///
    /// Fails if the table is empty, a required column is missing, or a
    /// cell in a required column is not numeric.
    pub fn transform(&self, table: &TrackTable) -> Result<FeatureMatrix> {
        if table.is_empty() {
            bail!("Cannot extract features from an empty track table");
        }

        let scaled_columns = self
            .columns
            .iter()
            .map(|name| -> Result<Vec<f64>> {
                let values = table
                    .numeric_column(name)
                    .context("Failed to select clustering features")?;
                let stats = ColumnStats::fit(&values);
                trace!(
                    "Column '{name}': mean {:.4}, std {:.4}",
                    stats.mean,
                    stats.std_dev
                );
                Ok(values.into_iter().map(|v| stats.scale(v)).collect())
            })
            .collect::<Result<Vec<_>>>()?;

        // Columns back into rows.
        let rows = (0..table.len())
            .map(|row| scaled_columns.iter().map(|col| col[row]).collect())
            .collect();

        debug!(
            "Scaled {} tracks over {} feature columns",
            table.len(),
            self.columns.len()
        );
        FeatureMatrix::from_rows(rows)
    }
}
