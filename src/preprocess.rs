//! feature preprocessing
//!
//! Two chains run side by side and are concatenated column-wise:
//!
//! - numeric: median imputation, then standard scaling (population std)
//! - categorical: most-frequent imputation, then one-hot encoding over the
//!   categories seen at fit time; unseen categories encode as all zeros
//!
//! Columns classified into neither group are dropped. [`PreprocessorSpec`]
//! only holds configuration; fitting it yields a [`FittedPreprocessor`] whose
//! `transform` borrows `&self`, so applying it to evaluation data can never
//! move the learned statistics.

use std::collections::HashMap;

use log::{debug, warn};
use ndarray::Array2;

use crate::dataset::Dataset;
use crate::error::{Result, SurvivalError};
use crate::features::FeatureKinds;

/// unfit preprocessing pipeline - which columns go through which chain
#[derive(Debug, Clone, PartialEq)]
pub struct PreprocessorSpec {
    kinds: FeatureKinds,
}

impl PreprocessorSpec {
    pub fn new(kinds: FeatureKinds) -> Self {
        Self { kinds }
    }

    /// classify `features` by storage type and build a spec from it
    pub fn from_dataset(features: &Dataset) -> Self {
        Self::new(FeatureKinds::classify(features))
    }

    pub fn kinds(&self) -> &FeatureKinds {
        &self.kinds
    }

    /// learn imputation values, scaling params & vocabularies
    pub fn fit(&self, data: &Dataset) -> Result<FittedPreprocessor> {
        let mut numeric = Vec::with_capacity(self.kinds.numeric.len());
        for name in &self.kinds.numeric {
            let values = data.numeric(name)?;
            match NumericStats::fit(name, &values)? {
                Some(stats) => numeric.push(stats),
                None => warn!("dropping numeric column `{}`: no observed values", name),
            }
        }

        let mut categorical = Vec::with_capacity(self.kinds.categorical.len());
        for name in &self.kinds.categorical {
            let values = data.text(name)?;
            match CategoricalStats::fit(name, &values) {
                Some(stats) => categorical.push(stats),
                None => warn!("dropping categorical column `{}`: no observed values", name),
            }
        }

        let fitted = FittedPreprocessor { numeric, categorical };
        debug!(
            "preprocessor fit on {} rows -> {} output features",
            data.n_rows(),
            fitted.n_features()
        );
        Ok(fitted)
    }

    /// fit then transform the same slice
    pub fn fit_transform(&self, data: &Dataset) -> Result<(FittedPreprocessor, Array2<f64>)> {
        let fitted = self.fit(data)?;
        let matrix = fitted.transform(data)?;
        Ok((fitted, matrix))
    }
}

#[derive(Debug, Clone, PartialEq)]
struct NumericStats {
    column: String,
    median: f64,
    mean: f64,
    scale: f64,
}

impl NumericStats {
    fn fit(column: &str, values: &[Option<f64>]) -> Result<Option<Self>> {
        let mut observed: Vec<f64> = values.iter().flatten().copied().collect();
        if observed.is_empty() {
            return Ok(None);
        }
        if observed.iter().any(|v| !v.is_finite()) {
            return Err(SurvivalError::NonFiniteFeatures {
                message: format!("column `{}` holds non-finite values", column),
            });
        }

        observed.sort_by(|a, b| a.total_cmp(b));
        let mid = observed.len() / 2;
        let median = if observed.len() % 2 == 0 {
            (observed[mid - 1] + observed[mid]) / 2.0
        } else {
            observed[mid]
        };

        // scaler statistics are learned on the imputed column
        let n = values.len() as f64;
        let imputed = || values.iter().map(|v| v.unwrap_or(median));
        let mean = imputed().sum::<f64>() / n;
        let variance = imputed().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let std = variance.sqrt();
        let scale = if std > f64::EPSILON * mean.abs().max(1.0) { std } else { 1.0 };

        Ok(Some(Self {
            column: column.to_string(),
            median,
            mean,
            scale,
        }))
    }

    fn apply(&self, value: Option<f64>) -> f64 {
        (value.unwrap_or(self.median) - self.mean) / self.scale
    }
}

#[derive(Debug, Clone, PartialEq)]
struct CategoricalStats {
    column: String,
    mode: String,
    categories: Vec<String>,
}

impl CategoricalStats {
    fn fit(column: &str, values: &[Option<String>]) -> Option<Self> {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for value in values.iter().flatten() {
            *counts.entry(value.as_str()).or_default() += 1;
        }

        // highest count wins, ties go to the smallest category
        let mode = counts
            .iter()
            .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
            .map(|(value, _)| value.to_string())?;

        let mut categories: Vec<String> = counts.keys().map(|k| k.to_string()).collect();
        categories.sort();

        Some(Self {
            column: column.to_string(),
            mode,
            categories,
        })
    }

    fn index_of(&self, value: Option<&str>) -> Option<usize> {
        let value = value.unwrap_or(&self.mode);
        self.categories.binary_search_by(|c| c.as_str().cmp(value)).ok()
    }
}

/// preprocessing pipeline w/ learned parameters
#[derive(Debug, Clone, PartialEq)]
pub struct FittedPreprocessor {
    numeric: Vec<NumericStats>,
    categorical: Vec<CategoricalStats>,
}

impl FittedPreprocessor {
    /// apply learned statistics to any slice w/ the fitted columns
    pub fn transform(&self, data: &Dataset) -> Result<Array2<f64>> {
        let n_rows = data.n_rows();
        let mut matrix = Array2::zeros((n_rows, self.n_features()));

        let mut offset = 0;
        for stats in &self.numeric {
            let values = data.numeric(&stats.column)?;
            for (i, value) in values.into_iter().enumerate() {
                matrix[[i, offset]] = stats.apply(value);
            }
            offset += 1;
        }

        for stats in &self.categorical {
            let values = data.text(&stats.column)?;
            for (i, value) in values.iter().enumerate() {
                if let Some(k) = stats.index_of(value.as_deref()) {
                    matrix[[i, offset + k]] = 1.0;
                }
            }
            offset += stats.categories.len();
        }

        if let Some(((i, j), v)) = matrix.indexed_iter().find(|(_, v)| !v.is_finite()) {
            return Err(SurvivalError::NonFiniteFeatures {
                message: format!("row {} feature `{}` = {}", i, self.feature_names()[j], v),
            });
        }

        Ok(matrix)
    }

    /// width of the transformed matrix
    pub fn n_features(&self) -> usize {
        self.numeric.len() + self.categorical.iter().map(|c| c.categories.len()).sum::<usize>()
    }

    /// output column names: numeric columns, then `<column>_<category>`
    pub fn feature_names(&self) -> Vec<String> {
        let numeric = self.numeric.iter().map(|s| s.column.clone());
        let one_hot = self.categorical.iter().flat_map(|s| {
            s.categories.iter().map(move |c| format!("{}_{}", s.column, c))
        });
        numeric.chain(one_hot).collect()
    }
}
