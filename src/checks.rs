//! the full harness run: load the cohort, then every check in order
//!
//! each check logs PASS/FAIL and a failure never stops the ones after it.
//! a cohort that doesn't load fails the run on its own.

use std::collections::HashSet;

use log::{error, info};

use crate::config::HarnessConfig;
use crate::dataset::Dataset;
use crate::error::{Result, SurvivalError};
use crate::evaluation::{self, check_split_reproducibility, preprocess_table, EvaluationConfig};
use crate::schema::{SchemaAliases, SurvivalTable};
use crate::visualization::{plot_km_by_stratifier, plot_top_coefficients, PlotConfig};

/// a METABRIC export carries far more than the two survival columns
pub const MIN_COLUMNS: usize = 5;
pub const REPRODUCIBILITY_SEED: u64 = 123;

/// what a harness run found
#[derive(Debug, Clone, Default)]
pub struct CheckSummary {
    pub passed: Vec<&'static str>,
    pub failed: Vec<(&'static str, SurvivalError)>,
}

impl CheckSummary {
    pub fn total(&self) -> usize {
        self.passed.len() + self.failed.len()
    }

    pub fn n_failed(&self) -> usize {
        self.failed.len()
    }

    fn record(&mut self, name: &'static str, result: Result<()>) {
        match result {
            Ok(()) => {
                info!("PASS {}", name);
                self.passed.push(name);
            }
            Err(e) => {
                error!("FAIL {}: {}", name, e);
                self.failed.push((name, e));
            }
        }
    }
}

pub fn load_table(config: &HarnessConfig) -> Result<SurvivalTable> {
    let dataset = Dataset::from_path(&config.data_path)?;
    dataset.check_width(MIN_COLUMNS)?;
    SchemaAliases::default().resolve(&dataset)
}

fn check_preprocessing(table: &SurvivalTable) -> Result<()> {
    let (_, x) = preprocess_table(table)?;
    if x.nrows() != table.n_rows() {
        return Err(SurvivalError::invalid_dimensions(format!(
            "preprocessed {} rows from {}",
            x.nrows(),
            table.n_rows()
        )));
    }
    if x.iter().any(|v| !v.is_finite()) {
        return Err(SurvivalError::NonFiniteFeatures {
            message: "missing values survived preprocessing".into(),
        });
    }
    Ok(())
}

fn check_feature_names(table: &SurvivalTable) -> Result<()> {
    let (preprocessor, _) = preprocess_table(table)?;
    let names = preprocessor.feature_names();
    if names.is_empty() {
        return Err(SurvivalError::invalid_dimensions("no features after preprocessing"));
    }
    let unique: HashSet<&String> = names.iter().collect();
    if unique.len() != names.len() {
        return Err(SurvivalError::invalid_dimensions("duplicate feature names"));
    }
    Ok(())
}

fn check_cox(table: &SurvivalTable) -> Result<()> {
    let report = evaluation::evaluate(table, &EvaluationConfig::default())?;
    info!(
        "c-index train {:.4} ({} rows), test {:.4} ({} rows)",
        report.train_concordance, report.n_train, report.test_concordance, report.n_test
    );
    Ok(())
}

fn check_reproducibility(table: &SurvivalTable) -> Result<()> {
    let (_, x) = preprocess_table(table)?;
    let test_size = EvaluationConfig::default().test_size;
    check_split_reproducibility(
        x.view(),
        &table.times_or_nan(),
        &table.events_or_nan(),
        test_size,
        REPRODUCIBILITY_SEED,
    )?;
    Ok(())
}

fn check_km_plot(table: &SurvivalTable, config: &HarnessConfig) -> Result<()> {
    let figure = plot_km_by_stratifier(table, &config.fig_dir, &PlotConfig::default())?;
    info!(
        "{} kaplan-meier curves by `{}`",
        figure.curves.len(),
        figure.stratifier
    );
    Ok(())
}

fn check_coefficient_plot(table: &SurvivalTable, config: &HarnessConfig) -> Result<()> {
    let (_, top) = plot_top_coefficients(table, &config.fig_dir, &PlotConfig::default())?;
    if let Some((name, value)) = top.first() {
        info!("largest coefficient: {} = {:.4}", name, value);
    }
    Ok(())
}

/// run every check against the configured cohort
pub fn run_checks(config: &HarnessConfig) -> CheckSummary {
    let mut summary = CheckSummary::default();

    let table = match load_table(config) {
        Ok(table) => table,
        Err(e) => {
            summary.record("load_and_schema", Err(e));
            return summary;
        }
    };
    summary.record("load_and_schema", Ok(()));

    summary.record("binary_events", table.check_binary_events());
    summary.record("preprocessing_runs", check_preprocessing(&table));
    summary.record("feature_names", check_feature_names(&table));
    summary.record("cox_training_and_cindex", check_cox(&table));
    summary.record("reproducibility", check_reproducibility(&table));
    summary.record("km_plot", check_km_plot(&table, config));
    summary.record("coefficient_plot", check_coefficient_plot(&table, config));

    if summary.n_failed() > 0 {
        error!("{} of {} checks failed", summary.n_failed(), summary.total());
    } else {
        info!("all {} checks passed", summary.total());
    }
    summary
}
