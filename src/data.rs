use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use crate::error::{SurvivalError, Result};

/// survival data - times, events, and patient features
#[derive(Debug, Clone)]
pub struct SurvivalData {
    times: Array1<f64>,              // time to event/censoring
    events: Vec<bool>,               // true = event, false = censored
    covariates: Array2<f64>,         // patient features (n_samples x n_features)
    order: Vec<usize>,               // sample indices, longest time first
}

impl SurvivalData {
    /// make new survival data from raw vecs/arrays
    pub fn new(
        times: Vec<f64>,        // survival/censoring times
        events: Vec<bool>,      // true = event occurred, false = censored
        covariates: Array2<f64>, // patient features matrix
    ) -> Result<Self> {
        let n_samples = times.len();

        if events.len() != n_samples {
            return Err(SurvivalError::invalid_dimensions(
                format!("times len ({}) != events len ({})", n_samples, events.len())
            ));
        }

        if covariates.nrows() != n_samples {
            return Err(SurvivalError::invalid_dimensions(
                format!("covariates rows ({}) != n_samples ({})", covariates.nrows(), n_samples)
            ));
        }

        if times.iter().any(|&t| t <= 0.0 || !t.is_finite()) {
            return Err(SurvivalError::invalid_survival_data(
                "survival times must be positive & finite"
            ));
        }

        if covariates.iter().any(|v| !v.is_finite()) {
            return Err(SurvivalError::invalid_survival_data(
                "covariates must be finite"
            ));
        }

        // risk sets become prefixes of this ordering
        let mut order: Vec<usize> = (0..n_samples).collect();
        order.sort_by(|&a, &b| times[b].total_cmp(&times[a]));

        Ok(Self {
            times: Array1::from(times),
            events,
            covariates,
            order,
        })
    }

    /// how many patients
    pub fn n_samples(&self) -> usize {
        self.times.len()
    }

    /// how many features per patient
    pub fn n_features(&self) -> usize {
        self.covariates.ncols()
    }

    /// how many observed events (not censored)
    pub fn n_events(&self) -> usize {
        self.events.iter().filter(|&&e| e).count()
    }

    /// survival/censoring times
    pub fn times(&self) -> ArrayView1<'_, f64> {
        self.times.view()
    }

    /// event indicators (true = event, false = censored)
    pub fn events(&self) -> &[bool] {
        &self.events
    }

    /// patient feature matrix
    pub fn covariates(&self) -> ArrayView2<'_, f64> {
        self.covariates.view()
    }

    /// sample indices sorted by descending time
    pub fn descending_order(&self) -> &[usize] {
        &self.order
    }

    /// unique event times in order
    pub fn event_times(&self) -> Vec<f64> {
        let mut times: Vec<f64> = self.times
            .iter()
            .zip(self.events.iter())
            .filter_map(|(time, event)| if *event { Some(*time) } else { None })
            .collect();

        times.sort_by(|a, b| a.total_cmp(b));
        times.dedup();
        times
    }

    /// grab a subset of patients by indices
    pub fn subset(&self, indices: &[usize]) -> Result<Self> {
        if indices.iter().any(|&i| i >= self.n_samples()) {
            return Err(SurvivalError::invalid_dimensions(
                "subset index out of bounds"
            ));
        }

        let times: Vec<f64> = indices.iter().map(|&i| self.times[i]).collect();
        let events: Vec<bool> = indices.iter().map(|&i| self.events[i]).collect();
        let covariates = self.covariates.select(Axis(0), indices);

        Self::new(times, events, covariates)
    }
}
