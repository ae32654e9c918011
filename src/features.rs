use log::debug;

use crate::dataset::{ColumnKind, Dataset};
use crate::error::{Result, SurvivalError};

/// numeric vs categorical partition of feature columns
///
/// classification goes by storage type only: text columns are categorical,
/// everything else is numeric. integer-coded categoricals therefore end up
/// numeric and get scaled - move them explicitly w/ [`FeatureKinds::with_categorical`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureKinds {
    pub numeric: Vec<String>,
    pub categorical: Vec<String>,
}

impl FeatureKinds {
    /// classify every column of `features`, preserving column order
    pub fn classify(features: &Dataset) -> Self {
        let mut numeric = Vec::new();
        let mut categorical = Vec::new();

        for (name, kind) in features.kinds() {
            match kind {
                ColumnKind::Text => categorical.push(name.to_string()),
                ColumnKind::Numeric => numeric.push(name.to_string()),
            }
        }

        debug!(
            "classified {} numeric & {} categorical features",
            numeric.len(),
            categorical.len()
        );
        Self { numeric, categorical }
    }

    /// treat a column as categorical regardless of storage type
    pub fn with_categorical(mut self, name: &str) -> Result<Self> {
        self.take(name)?;
        self.categorical.push(name.to_string());
        Ok(self)
    }

    /// treat a column as numeric regardless of storage type
    pub fn with_numeric(mut self, name: &str) -> Result<Self> {
        self.take(name)?;
        self.numeric.push(name.to_string());
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.numeric.len() + self.categorical.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn take(&mut self, name: &str) -> Result<()> {
        let before = self.len();
        self.numeric.retain(|c| c != name);
        self.categorical.retain(|c| c != name);

        if self.len() == before {
            return Err(SurvivalError::MissingFeatureColumn { column: name.to_string() });
        }
        Ok(())
    }
}
