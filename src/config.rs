use std::path::PathBuf;

pub const DEFAULT_DATA_PATH: &str = "/content/METABRIC_cleaned_imputed.csv";
pub const DEFAULT_FIG_DIR: &str = "/content/outputs/figures";

/// where the harness reads data & writes figures
#[derive(Debug, Clone, PartialEq)]
pub struct HarnessConfig {
    pub data_path: PathBuf,
    pub fig_dir: PathBuf,
    /// truetype font for chart text; common system fonts are tried when unset
    pub font_path: Option<PathBuf>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from(DEFAULT_DATA_PATH),
            fig_dir: PathBuf::from(DEFAULT_FIG_DIR),
            font_path: None,
        }
    }
}

impl HarnessConfig {
    /// read `DATA_PATH`, `FIG_DIR` & `FONT_PATH`
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// same as `from_env` but w/ any key -> value source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            data_path: non_empty("DATA_PATH").map(PathBuf::from).unwrap_or(defaults.data_path),
            fig_dir: non_empty("FIG_DIR").map(PathBuf::from).unwrap_or(defaults.fig_dir),
            font_path: non_empty("FONT_PATH").map(PathBuf::from),
        }
    }
}
