//! figure harness: kaplan-meier curves by stratum & top cox coefficients

use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::dataset::{ColumnKind, Dataset};
use crate::error::{Result, SurvivalError};
use crate::evaluation::preprocess_table;
use crate::frame::SurvivalFrame;
use crate::kaplan_meier::KaplanMeier;
use crate::model::CoxModel;
use crate::render::{draw_bar_chart, draw_survival_curves, CurveSeries, FigureSize};
use crate::schema::SurvivalTable;

pub const TERTILE_LABELS: [&str; 3] = ["low", "mid", "high"];

#[derive(Debug, Clone, PartialEq)]
pub struct PlotConfig {
    /// most levels a categorical may have to stratify on
    pub max_levels: usize,
    /// strata w/ fewer rows than this are skipped
    pub min_stratum_size: usize,
    /// bars in the coefficient chart
    pub top_k: usize,
    /// per-sample ridge penalty for the coefficient fit
    pub penalizer: f64,
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self {
            max_levels: 4,
            min_stratum_size: 5,
            top_k: 20,
            penalizer: 0.1,
        }
    }
}

/// column the KM curves are split by
#[derive(Debug, Clone, PartialEq)]
pub struct Stratifier {
    pub name: String,
    pub labels: Vec<Option<String>>,
    /// true when built by binning a numeric column
    pub derived: bool,
}

impl Stratifier {
    /// distinct labels, sorted
    pub fn levels(&self) -> Vec<String> {
        let mut levels: Vec<String> = self.labels.iter().flatten().cloned().collect();
        levels.sort();
        levels.dedup();
        levels
    }
}

/// pick a low-cardinality categorical, else tertile-bin the first numeric column
pub fn select_stratifier(features: &Dataset, max_levels: usize) -> Result<Stratifier> {
    let kinds = features.kinds();

    for (name, _) in kinds.iter().filter(|(_, kind)| *kind == ColumnKind::Text) {
        let n_levels = features.distinct_text(name)?.len();
        if (2..=max_levels).contains(&n_levels) {
            debug!("stratifying on `{}` ({} levels)", name, n_levels);
            return Ok(Stratifier {
                name: name.to_string(),
                labels: features.text(name)?,
                derived: false,
            });
        }
    }

    let (numeric, _) = kinds
        .iter()
        .find(|(_, kind)| *kind == ColumnKind::Numeric)
        .ok_or_else(|| SurvivalError::no_stratifier("no numeric columns to bin for stratifier"))?;

    let labels = tertile_bins(numeric, &features.numeric(numeric)?)?;
    debug!("stratifying on tertiles of `{}`", numeric);

    Ok(Stratifier {
        name: format!("{}_tertile", numeric),
        labels,
        derived: true,
    })
}

/// linear-interpolated quantile of sorted data
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    sorted[lower] + (sorted[upper] - sorted[lower]) * (pos - lower as f64)
}

/// label each value low/mid/high by tertile; bins are right-closed
pub fn tertile_bins(name: &str, values: &[Option<f64>]) -> Result<Vec<Option<String>>> {
    let mut observed: Vec<f64> = values.iter().flatten().copied().filter(|v| v.is_finite()).collect();
    if observed.is_empty() {
        return Err(SurvivalError::no_stratifier(format!("`{}` has no observed values", name)));
    }
    observed.sort_by(|a, b| a.total_cmp(b));

    let edges = [
        observed[0],
        quantile(&observed, 1.0 / 3.0),
        quantile(&observed, 2.0 / 3.0),
        observed[observed.len() - 1],
    ];
    if edges.windows(2).any(|w| w[0] >= w[1]) {
        return Err(SurvivalError::no_stratifier(format!(
            "tertile edges of `{}` are not unique: {:?}",
            name, edges
        )));
    }

    Ok(values
        .iter()
        .map(|v| {
            let v = (*v).filter(|v| v.is_finite())?;
            let bin = if v <= edges[1] {
                0
            } else if v <= edges[2] {
                1
            } else {
                2
            };
            Some(TERTILE_LABELS[bin].to_string())
        })
        .collect())
}

/// what ended up in a KM figure
#[derive(Debug, Clone)]
pub struct KaplanMeierFigure {
    pub path: PathBuf,
    pub stratifier: String,
    pub curves: Vec<(String, KaplanMeier)>,
    pub skipped: Vec<String>,
}

fn ensure_written(path: &Path) -> Result<()> {
    if path.exists() {
        info!("figure written: {}", path.display());
        Ok(())
    } else {
        Err(SurvivalError::FigureNotWritten { path: path.display().to_string() })
    }
}

/// fit one KM curve per stratum & overlay them in `km_by_<stratifier>.png`
pub fn plot_km_by_stratifier(
    table: &SurvivalTable,
    fig_dir: &Path,
    config: &PlotConfig,
) -> Result<KaplanMeierFigure> {
    let stratifier = select_stratifier(&table.features, config.max_levels)?;

    std::fs::create_dir_all(fig_dir)?;
    let path = fig_dir.join(format!("km_by_{}.png", stratifier.name));

    let mut curves = Vec::new();
    let mut skipped = Vec::new();
    for level in stratifier.levels() {
        let (times, events): (Vec<f64>, Vec<bool>) = (0..table.n_rows())
            .filter(|&i| stratifier.labels[i].as_deref() == Some(level.as_str()))
            .filter_map(|i| match (table.times[i], table.events[i]) {
                (Some(t), Some(e)) if t.is_finite() && t >= 0.0 && e.is_finite() => {
                    Some((t, e.trunc() != 0.0))
                }
                _ => None,
            })
            .unzip();

        if times.len() < config.min_stratum_size {
            debug!("skipping stratum `{}`: {} rows", level, times.len());
            skipped.push(level);
            continue;
        }
        curves.push((level, KaplanMeier::fit(&times, &events)?));
    }

    let x_max = curves
        .iter()
        .flat_map(|(_, km)| km.timeline.last().copied())
        .fold(0.0, f64::max);
    let x_max = table
        .times
        .iter()
        .flatten()
        .copied()
        .filter(|t| t.is_finite())
        .fold(x_max, f64::max);

    let series: Vec<CurveSeries> = curves
        .iter()
        .map(|(label, km)| CurveSeries {
            label: label.clone(),
            points: km.step_points(x_max),
        })
        .collect();

    draw_survival_curves(
        &path,
        FigureSize::KAPLAN_MEIER,
        &format!("Kaplan-Meier survival by {}", stratifier.name),
        &series,
    )?;
    ensure_written(&path)?;

    Ok(KaplanMeierFigure {
        path,
        stratifier: stratifier.name,
        curves,
        skipped,
    })
}

/// fit cox on the whole table & chart the top-k coefficients in `cox_top_coefficients.png`
pub fn plot_top_coefficients(
    table: &SurvivalTable,
    fig_dir: &Path,
    config: &PlotConfig,
) -> Result<(PathBuf, Vec<(String, f64)>)> {
    let (preprocessor, x) = preprocess_table(table)?;
    let frame = SurvivalFrame::build(x.view(), &table.times_or_nan(), &table.events_or_nan())?;

    let mut model = CoxModel::new()
        .with_penalizer(config.penalizer)
        .with_feature_names(preprocessor.feature_names());
    model.fit(frame.data())?;
    let top = model.top_coefficients(config.top_k)?;

    std::fs::create_dir_all(fig_dir)?;
    let path = fig_dir.join("cox_top_coefficients.png");
    draw_bar_chart(&path, FigureSize::COEFFICIENTS, "Top Cox coefficients", &top)?;
    ensure_written(&path)?;

    Ok((path, top))
}
