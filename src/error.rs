use thiserror::Error;

pub type Result<T> = std::result::Result<T, SurvivalError>;

#[derive(Error, Debug, Clone)]
pub enum SurvivalError {
    #[error("dataset not found at {path}")]
    DatasetNotFound { path: String },

    #[error("dataset is empty")]
    EmptyDataset,

    #[error("too few columns to be METABRIC-like: got {found}, need more than {min}")]
    TooFewColumns { found: usize, min: usize },

    #[error("could not find a {role} column among: {candidates:?}")]
    MissingSurvivalColumn { role: String, candidates: Vec<String> },

    #[error("event column not binary: {values:?}")]
    NonBinaryEvent { values: Vec<f64> },

    #[error("feature column `{column}` seen at fit time is missing")]
    MissingFeatureColumn { column: String },

    #[error("preprocessed matrix contains non-finite values: {message}")]
    NonFiniteFeatures { message: String },

    #[error("dimensions don't match: {message}")]
    InvalidDimensions { message: String },

    #[error("bad parameter: {parameter} = {value}")]
    InvalidParameter { parameter: String, value: String },

    #[error("survival data is broken: {message}")]
    InvalidSurvivalData { message: String },

    #[error("optimization blew up: {message}")]
    OptimizationFailed { message: String },

    #[error("numerical issues: {message}")]
    NumericalError { message: String },

    #[error("model not fitted yet - call fit() first")]
    ModelNotFitted,

    #[error("invalid {partition} c-index: {value}")]
    ConcordanceOutOfRange { partition: String, value: f64 },

    #[error("c-index too low ({value:.4} < {threshold}); check features or preprocessing")]
    ConcordanceBelowThreshold { value: f64, threshold: f64 },

    #[error("train {part} differ despite fixed seed")]
    NonReproducibleSplit { part: String },

    #[error("no usable stratifier: {message}")]
    NoStratifier { message: String },

    #[error("figure not saved to {path}")]
    FigureNotWritten { path: String },

    #[error("io error: {message}")]
    Io { message: String },

    #[error("polars error: {message}")]
    Polars { message: String },

    #[error("drawing failed: {message}")]
    Plot { message: String },
}

impl SurvivalError {
    pub fn invalid_dimensions(message: impl Into<String>) -> Self {
        Self::InvalidDimensions { message: message.into() }
    }

    pub fn optimization_failed(message: impl Into<String>) -> Self {
        Self::OptimizationFailed { message: message.into() }
    }

    pub fn invalid_parameter(parameter: impl Into<String>, value: impl ToString) -> Self {
        Self::InvalidParameter {
            parameter: parameter.into(),
            value: value.to_string(),
        }
    }

    pub fn numerical_error(message: impl Into<String>) -> Self {
        Self::NumericalError { message: message.into() }
    }

    pub fn invalid_survival_data(message: impl Into<String>) -> Self {
        Self::InvalidSurvivalData { message: message.into() }
    }

    pub fn no_stratifier(message: impl Into<String>) -> Self {
        Self::NoStratifier { message: message.into() }
    }

    pub fn plot(message: impl ToString) -> Self {
        Self::Plot { message: message.to_string() }
    }

    /// event values outside {0,1}, sorted & deduped for the message
    pub fn non_binary_event(values: impl IntoIterator<Item = f64>) -> Self {
        let mut values: Vec<f64> = values.into_iter().collect();
        values.sort_by(|a, b| a.total_cmp(b));
        values.dedup();
        Self::NonBinaryEvent { values }
    }
}

impl From<std::io::Error> for SurvivalError {
    fn from(err: std::io::Error) -> Self {
        Self::Io { message: err.to_string() }
    }
}

impl From<polars::prelude::PolarsError> for SurvivalError {
    fn from(err: polars::prelude::PolarsError) -> Self {
        Self::Polars { message: err.to_string() }
    }
}
