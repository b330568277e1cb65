//! Column-wise preprocessing: standard scaling for numeric columns and
//! one-hot encoding for categorical columns.
//!
//! Statistics and vocabularies are learned from the rows passed to `fit`
//! and frozen afterwards; applying the transform never changes them.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::Estimator;
use crate::models::OrderFeatures;

/// Per-column mean and scale. Constant columns get a scale of 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub means: Vec<f64>,
    pub scales: Vec<f64>,
}

impl StandardScaler {
    pub fn fit(rows: &[Vec<f64>]) -> Result<Self> {
        let Some(width) = rows.first().map(Vec::len) else {
            bail!("cannot fit a scaler on zero rows");
        };
        let n = rows.len() as f64;

        let mut means = vec![0.0; width];
        for row in rows {
            for (m, v) in means.iter_mut().zip(row) {
                *m += v;
            }
        }
        means.iter_mut().for_each(|m| *m /= n);

        let mut variances = vec![0.0; width];
        for row in rows {
            for ((var, v), m) in variances.iter_mut().zip(row).zip(&means) {
                *var += (v - m).powi(2);
            }
        }
        let scales = variances
            .into_iter()
            .map(|var| {
                let std = (var / n).sqrt();
                if std > f64::EPSILON { std } else { 1.0 }
            })
            .collect();

        Ok(Self { means, scales })
    }

    pub fn transform_into(&self, values: &[f64], out: &mut Vec<f64>) {
        for ((v, m), s) in values.iter().zip(&self.means).zip(&self.scales) {
            out.push((v - m) / s);
        }
    }
}

/// Result of looking a value up in a frozen vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryCode {
    Known(usize),
    /// Missing, or never seen while fitting. Encodes as all zeros.
    Unknown,
}

/// Vocabulary of one categorical column, sorted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OneHotEncoder {
    pub categories: Vec<String>,
}

impl OneHotEncoder {
    pub fn fit<'a>(values: impl IntoIterator<Item = Option<&'a str>>) -> Self {
        let categories: BTreeSet<&str> = values.into_iter().flatten().collect();
        Self { categories: categories.into_iter().map(str::to_string).collect() }
    }

    pub fn width(&self) -> usize {
        self.categories.len()
    }

    pub fn encode(&self, value: Option<&str>) -> CategoryCode {
        match value {
            Some(v) => match self.categories.binary_search_by(|c| c.as_str().cmp(v)) {
                Ok(i) => CategoryCode::Known(i),
                Err(_) => CategoryCode::Unknown,
            },
            None => CategoryCode::Unknown,
        }
    }

    pub fn transform_into(&self, value: Option<&str>, out: &mut Vec<f64>) {
        let start = out.len();
        out.resize(start + self.width(), 0.0);
        if let CategoryCode::Known(i) = self.encode(value) {
            out[start + i] = 1.0;
        }
    }
}

/// Which columns to scale and encode. Fitting yields a [`ColumnTransformer`].
#[derive(Debug, Clone, Default)]
pub struct ColumnTransformerSpec;

impl Estimator<OrderFeatures> for ColumnTransformerSpec {
    type Fitted = ColumnTransformer;

    fn fit(&self, rows: &[OrderFeatures], _labels: &[bool]) -> Result<ColumnTransformer> {
        let numeric: Vec<Vec<f64>> = rows.iter().map(|r| r.numeric_values().to_vec()).collect();
        let scaler = StandardScaler::fit(&numeric)?;

        let encoders = (0..OrderFeatures::CATEGORICAL_COLUMNS.len())
            .map(|col| OneHotEncoder::fit(rows.iter().map(|r| r.categorical_values()[col])))
            .collect();

        Ok(ColumnTransformer { scaler, encoders })
    }
}

/// Frozen preprocessing: scaled numeric columns followed by the one-hot
/// blocks of each categorical column, in declaration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnTransformer {
    pub scaler: StandardScaler,
    pub encoders: Vec<OneHotEncoder>,
}

impl ColumnTransformer {
    pub fn output_width(&self) -> usize {
        OrderFeatures::NUMERIC_COLUMNS.len() + self.encoders.iter().map(OneHotEncoder::width).sum::<usize>()
    }

    pub fn transform(&self, row: &OrderFeatures) -> Vec<f64> {
        let mut out = Vec::with_capacity(self.output_width());
        self.scaler.transform_into(&row.numeric_values(), &mut out);
        for (encoder, value) in self.encoders.iter().zip(row.categorical_values()) {
            encoder.transform_into(value, &mut out);
        }
        out
    }

    pub fn transform_all(&self, rows: &[OrderFeatures]) -> Vec<Vec<f64>> {
        rows.iter().map(|r| self.transform(r)).collect()
    }

    /// Output column names, e.g. `price` or `customer_state=SP`.
    pub fn feature_names(&self) -> Vec<String> {
        let mut names: Vec<String> = OrderFeatures::NUMERIC_COLUMNS.iter().map(|c| c.to_string()).collect();
        for (column, encoder) in OrderFeatures::CATEGORICAL_COLUMNS.iter().zip(&self.encoders) {
            names.extend(encoder.categories.iter().map(|c| format!("{}={}", column, c)));
        }
        names
    }
}
