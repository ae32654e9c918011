//! # metabric survival
//!
//! verification harness for breast-cancer survival modeling - load a cohort csv,
//! find the survival columns, preprocess, fit cox, check it, draw it
//!
//! ## what you get
//!
//! - schema detection by column alias (time + event)
//! - numeric / categorical feature split & a fit-then-transform preprocessor
//! - ridge-penalized cox regression w/ breslow baseline
//! - seeded stratified splits & concordance gates
//! - kaplan-meier curves by stratum + top coefficient chart as png
//!
//! ## quick start
//!
//! ```rust
//! use metabric_survival::{evaluation, Dataset, EvaluationConfig, SchemaAliases};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // tiny cohort: risk rises w/ `grade`, later rows live longer
//! let mut csv = String::from("grade,age,er,Overall_Survival,Overall_Survival_Status\n");
//! for i in 0..80 {
//!     let grade = i % 4;
//!     let time = 200.0 - 40.0 * grade as f64 + (i % 7) as f64;
//!     let event = (i % 5 != 0) as u8;
//!     let er = if i % 2 == 0 { "Pos" } else { "Neg" };
//!     csv.push_str(&format!("{},{},{},{},{}\n", grade, 40 + i % 30, er, time, event));
//! }
//!
//! let dataset = Dataset::from_reader(csv.as_bytes())?;
//! let table = SchemaAliases::default().resolve(&dataset)?;
//! table.check_binary_events()?;
//!
//! let report = evaluation::evaluate(&table, &EvaluationConfig::default())?;
//! assert!(report.train_concordance >= 0.55);
//! # Ok(())
//! # }
//! ```

pub mod checks;
pub mod config;
pub mod data;
pub mod dataset;
pub mod error;
pub mod evaluation;
pub mod features;
pub mod frame;
pub mod kaplan_meier;
pub mod metrics;
pub mod model;
pub mod optimization;
pub mod preprocess;
pub mod render;
pub mod schema;
pub mod split;
pub mod visualization;

pub use checks::{run_checks, CheckSummary};
pub use config::HarnessConfig;
pub use data::SurvivalData;
pub use dataset::{ColumnKind, Dataset, MISSING_MARKERS};
pub use error::{Result, SurvivalError};
pub use evaluation::{EvaluationConfig, EvaluationReport};
pub use features::FeatureKinds;
pub use frame::SurvivalFrame;
pub use kaplan_meier::KaplanMeier;
pub use model::CoxModel;
pub use preprocess::{FittedPreprocessor, PreprocessorSpec};
pub use schema::{SchemaAliases, SurvivalTable};
pub use visualization::{PlotConfig, Stratifier};
