//! model evaluation: concordance gates & split reproducibility

use log::info;
use ndarray::{Array2, ArrayView2};

use crate::error::{Result, SurvivalError};
use crate::features::FeatureKinds;
use crate::frame::SurvivalFrame;
use crate::model::CoxModel;
use crate::preprocess::{FittedPreprocessor, PreprocessorSpec};
use crate::schema::SurvivalTable;
use crate::split::{stratified_split, train_test_split, SplitPartitions};

#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationConfig {
    /// share of rows held out for testing
    pub test_size: f64,
    pub seed: u64,
    /// per-sample ridge penalty for the cox fit
    pub penalizer: f64,
    /// weak-baseline gate on training concordance
    pub min_train_concordance: f64,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            test_size: 0.25,
            seed: 42,
            penalizer: 0.1,
            min_train_concordance: 0.55,
        }
    }
}

/// outcome of one train/test evaluation
#[derive(Debug, Clone)]
pub struct EvaluationReport {
    pub train_concordance: f64,
    pub test_concordance: f64,
    pub n_train: usize,
    pub n_test: usize,
    pub feature_names: Vec<String>,
    pub preprocessor: FittedPreprocessor,
    pub model: CoxModel,
}

/// fit preprocessing on every row of the table
pub fn preprocess_table(table: &SurvivalTable) -> Result<(FittedPreprocessor, Array2<f64>)> {
    PreprocessorSpec::new(FeatureKinds::classify(&table.features)).fit_transform(&table.features)
}

/// concordance must be a proportion
pub fn check_concordance_bounds(partition: &str, value: f64) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(SurvivalError::ConcordanceOutOfRange {
            partition: partition.to_string(),
            value,
        })
    }
}

/// split, fit on the training side only, then score both sides
pub fn evaluate(table: &SurvivalTable, config: &EvaluationConfig) -> Result<EvaluationReport> {
    let split = stratified_split(&table.events_or_nan(), config.test_size, config.seed)?;
    let train = table.select_rows(&split.train)?;
    let test = table.select_rows(&split.test)?;

    // preprocessing statistics come from the training rows alone
    let spec = PreprocessorSpec::new(FeatureKinds::classify(&table.features));
    let (preprocessor, x_train) = spec.fit_transform(&train.features)?;
    let x_test = preprocessor.transform(&test.features)?;
    let feature_names = preprocessor.feature_names();

    let train_frame = SurvivalFrame::build(x_train.view(), &train.times_or_nan(), &train.events_or_nan())?;
    let test_frame = SurvivalFrame::build(x_test.view(), &test.times_or_nan(), &test.events_or_nan())?;

    let mut model = CoxModel::new()
        .with_penalizer(config.penalizer)
        .with_feature_names(feature_names.clone());
    model.fit(train_frame.data())?;

    let train_concordance = model.concordance(train_frame.data())?;
    check_concordance_bounds("train", train_concordance)?;
    if train_concordance < config.min_train_concordance {
        return Err(SurvivalError::ConcordanceBelowThreshold {
            value: train_concordance,
            threshold: config.min_train_concordance,
        });
    }

    let test_concordance = model.concordance(test_frame.data())?;
    check_concordance_bounds("test", test_concordance)?;

    info!(
        "cox fit on {} rows ({} features): train c-index {:.4}, test c-index {:.4}",
        train_frame.data().n_samples(),
        feature_names.len(),
        train_concordance,
        test_concordance
    );

    Ok(EvaluationReport {
        train_concordance,
        test_concordance,
        n_train: train_frame.data().n_samples(),
        n_test: test_frame.data().n_samples(),
        feature_names,
        preprocessor,
        model,
    })
}

fn same_bits<'a>(a: impl IntoIterator<Item = &'a f64>, b: impl IntoIterator<Item = &'a f64>) -> bool {
    let mut a = a.into_iter();
    let mut b = b.into_iter();
    loop {
        match (a.next(), b.next()) {
            (None, None) => return true,
            (Some(x), Some(y)) if x.to_bits() == y.to_bits() => continue,
            _ => return false,
        }
    }
}

/// split the same data twice w/ the same seed - the training sides must match bit for bit
pub fn check_split_reproducibility(
    x: ArrayView2<f64>,
    times: &[f64],
    events: &[f64],
    test_size: f64,
    seed: u64,
) -> Result<SplitPartitions> {
    let first = train_test_split(x, times, events, test_size, seed)?;
    let second = train_test_split(x, times, events, test_size, seed)?;

    if first.x_train.dim() != second.x_train.dim() || !same_bits(&first.x_train, &second.x_train) {
        return Err(SurvivalError::NonReproducibleSplit { part: "features".into() });
    }
    if !same_bits(&first.t_train, &second.t_train) {
        return Err(SurvivalError::NonReproducibleSplit { part: "times".into() });
    }
    if !same_bits(&first.e_train, &second.e_train) {
        return Err(SurvivalError::NonReproducibleSplit { part: "events".into() });
    }

    Ok(first)
}
