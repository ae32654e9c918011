use log::debug;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use crate::{
    data::SurvivalData,
    error::{SurvivalError, Result},
    metrics::concordance_index,
    optimization::{CoxOptimizer, OptimizationConfig},
};

/// cox proportional hazards model w/ ridge regularization
#[derive(Debug, Clone)]
pub struct CoxModel {
    coefficients: Option<Array1<f64>>,  // fitted coefficients
    baseline: Option<BaselineHazard>,   // breslow cumulative baseline hazard
    l2_penalty: f64,                    // ridge penalty on the summed loglik
    penalizer: Option<f64>,             // ridge penalty per sample, overrides l2_penalty
    max_iterations: usize,              // optimization limit
    tolerance: f64,                     // convergence threshold
    feature_names: Option<Vec<String>>, // optional feature labels
}

impl Default for CoxModel {
    fn default() -> Self {
        let config = OptimizationConfig::default();
        Self {
            coefficients: None,
            baseline: None,
            l2_penalty: 0.0,
            penalizer: None,
            max_iterations: config.max_iterations,
            tolerance: config.tolerance,
            feature_names: None,
        }
    }
}

impl CoxModel {
    /// new cox model w/ defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// ridge penalty (L2) on the summed log partial likelihood
    pub fn with_l2_penalty(mut self, penalty: f64) -> Self {
        self.l2_penalty = penalty.max(0.0);
        self.penalizer = None;
        self
    }

    /// ridge penalty on the mean log partial likelihood:
    /// maximizes loglik/n - penalizer/2 * |beta|^2
    pub fn with_penalizer(mut self, penalizer: f64) -> Self {
        self.penalizer = Some(penalizer.max(0.0));
        self
    }

    /// max iterations before giving up
    pub fn with_max_iterations(mut self, max_iter: usize) -> Self {
        self.max_iterations = max_iter;
        self
    }

    /// how close is close enough for convergence
    pub fn with_tolerance(mut self, tol: f64) -> Self {
        self.tolerance = tol;
        self
    }

    /// give names to your features for nicer output
    pub fn with_feature_names(mut self, names: Vec<String>) -> Self {
        self.feature_names = Some(names);
        self
    }

    /// ridge penalty actually applied for a dataset of `n_samples`
    pub fn effective_l2_penalty(&self, n_samples: usize) -> f64 {
        match self.penalizer {
            Some(p) => p * n_samples as f64,
            None => self.l2_penalty,
        }
    }

    /// fit the model to data - this does the actual work
    pub fn fit(&mut self, data: &SurvivalData) -> Result<&mut Self> {
        if let Some(names) = &self.feature_names {
            if names.len() != data.n_features() {
                return Err(SurvivalError::invalid_dimensions(format!(
                    "{} feature names for {} features",
                    names.len(),
                    data.n_features()
                )));
            }
        }

        let config = OptimizationConfig {
            l2_penalty: self.effective_l2_penalty(data.n_samples()),
            max_iterations: self.max_iterations,
            tolerance: self.tolerance,
            ..OptimizationConfig::default()
        };

        let coefficients = CoxOptimizer::new(config).optimize(data)?;
        let baseline = BaselineHazard::breslow(data, &coefficients);
        debug!(
            "cox fit on {} samples ({} events), {} coefficients",
            data.n_samples(),
            data.n_events(),
            coefficients.len()
        );

        self.coefficients = Some(coefficients);
        self.baseline = Some(baseline);

        Ok(self)
    }

    /// get the fitted coefficients (betas)
    pub fn coefficients(&self) -> Result<ArrayView1<'_, f64>> {
        match &self.coefficients {
            Some(coefs) => Ok(coefs.view()),
            None => Err(SurvivalError::ModelNotFitted),
        }
    }

    /// predict risk scores (linear predictors) for new patients
    pub fn predict(&self, covariates: ArrayView2<f64>) -> Result<Array1<f64>> {
        let coefs = self.coefficients()?;

        if covariates.ncols() != coefs.len() {
            return Err(SurvivalError::invalid_dimensions(
                format!("feature count mismatch: expected {}, got {}",
                       coefs.len(), covariates.ncols())
            ));
        }

        Ok(covariates.dot(&coefs))  // linear combination
    }

    /// predict hazard ratios (exp of risk scores)
    pub fn predict_hazard_ratios(&self, covariates: ArrayView2<f64>) -> Result<Array1<f64>> {
        let linear_predictors = self.predict(covariates)?;
        Ok(linear_predictors.mapv(f64::exp))
    }

    /// predict survival probs at specific time points: S(t|x) = exp(-H0(t) * exp(x'b))
    pub fn predict_survival(&self, covariates: ArrayView2<f64>, times: ArrayView1<f64>) -> Result<Array2<f64>> {
        let hazard_ratios = self.predict_hazard_ratios(covariates)?;
        let baseline = self.baseline.as_ref().ok_or(SurvivalError::ModelNotFitted)?;

        let cumulative: Vec<f64> = times.iter().map(|&t| baseline.cumulative_at(t)).collect();
        let survival_probs = Array2::from_shape_fn((covariates.nrows(), times.len()), |(j, i)| {
            (-cumulative[i] * hazard_ratios[j]).exp()
        });

        Ok(survival_probs)
    }

    /// cumulative baseline hazard from the last fit
    pub fn baseline_hazard(&self) -> Result<&BaselineHazard> {
        self.baseline.as_ref().ok_or(SurvivalError::ModelNotFitted)
    }

    /// concordance of this model's risk scores on some data
    pub fn concordance(&self, data: &SurvivalData) -> Result<f64> {
        let risk_scores = self.predict(data.covariates())?;
        concordance_index(risk_scores.view(), data.times(), data.events())
    }

    /// feature importance = abs value of coefficients
    pub fn feature_importance(&self) -> Result<Array1<f64>> {
        let coefs = self.coefficients()?;
        Ok(coefs.mapv(f64::abs))
    }

    /// the k largest coefficients (by value, descending) w/ their names
    pub fn top_coefficients(&self, k: usize) -> Result<Vec<(String, f64)>> {
        let coefs = self.coefficients()?;
        let mut named: Vec<(String, f64)> = coefs
            .iter()
            .enumerate()
            .map(|(i, &c)| (self.feature_name(i), c))
            .collect();
        named.sort_by(|a, b| b.1.total_cmp(&a.1));
        named.truncate(k);
        Ok(named)
    }

    /// get a nice summary of the fitted model
    pub fn summary(&self) -> Result<CoxModelSummary> {
        let coefs = self.coefficients()?.to_owned();
        let hazard_ratios = coefs.mapv(f64::exp);

        Ok(CoxModelSummary {
            coefficients: coefs,
            hazard_ratios,
            l2_penalty: self.l2_penalty,
            penalizer: self.penalizer,
            feature_names: self.feature_names.clone(),
        })
    }

    /// has this model been fit to data yet?
    pub fn is_fitted(&self) -> bool {
        self.coefficients.is_some()
    }

    fn feature_name(&self, i: usize) -> String {
        self.feature_names
            .as_ref()
            .and_then(|names| names.get(i).cloned())
            .unwrap_or_else(|| format!("x{}", i))
    }
}

/// breslow estimate of the cumulative baseline hazard, a step function
#[derive(Debug, Clone, PartialEq)]
pub struct BaselineHazard {
    pub times: Vec<f64>,       // unique event times, ascending
    pub cumulative: Vec<f64>,  // H0 at each of those times
}

impl BaselineHazard {
    /// H0(t) = sum over event times t_k <= t of d_k / sum_{j at risk} exp(x_j'b)
    pub fn breslow(data: &SurvivalData, beta: &Array1<f64>) -> Self {
        let risk = data.covariates().dot(beta).mapv(f64::exp);
        let times = data.times();
        let events = data.events();
        let order = data.descending_order();

        // sweep longest time first, collecting (time, hazard increment)
        let mut increments = Vec::new();
        let mut risk_sum = 0.0;
        let mut start = 0;
        while start < order.len() {
            let t = times[order[start]];
            let mut end = start;
            let mut deaths = 0.0;
            while end < order.len() && times[order[end]] == t {
                risk_sum += risk[order[end]];
                if events[order[end]] {
                    deaths += 1.0;
                }
                end += 1;
            }
            if deaths > 0.0 {
                increments.push((t, deaths / risk_sum));
            }
            start = end;
        }

        increments.reverse();
        let mut total = 0.0;
        let (times, cumulative) = increments
            .into_iter()
            .map(|(t, h)| {
                total += h;
                (t, total)
            })
            .unzip();

        Self { times, cumulative }
    }

    /// H0(t), zero before the first event time
    pub fn cumulative_at(&self, t: f64) -> f64 {
        let idx = self.times.partition_point(|&s| s <= t);
        if idx == 0 { 0.0 } else { self.cumulative[idx - 1] }
    }
}

/// nice summary of what the model learned
#[derive(Debug, Clone)]
pub struct CoxModelSummary {
    pub coefficients: Array1<f64>,   // the betas
    pub hazard_ratios: Array1<f64>,  // exp(betas)
    pub l2_penalty: f64,             // ridge penalty used
    pub penalizer: Option<f64>,      // per-sample ridge penalty, if set
    pub feature_names: Option<Vec<String>>, // optional labels
}

impl std::fmt::Display for CoxModelSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "cox proportional hazards model summary")?;
        writeln!(f, "=====================================")?;
        match self.penalizer {
            Some(p) => writeln!(f, "penalizer (per sample): {:.6}", p)?,
            None => writeln!(f, "l2 penalty (ridge): {:.6}", self.l2_penalty)?,
        }
        writeln!(f)?;

        writeln!(f, "{:<20} {:>12} {:>12}", "feature", "coefficient", "hazard ratio")?;
        write!(f, "{:-<46}", "")?;

        for i in 0..self.coefficients.len() {
            let default_name = format!("x{}", i);
            let feature_name = match &self.feature_names {
                Some(names) => names.get(i).map(|s| s.as_str()).unwrap_or(&default_name),
                None => &default_name,
            };

            write!(f, "\n{:<20} {:>12.6} {:>12.6}",
                    feature_name,
                    self.coefficients[i],
                    self.hazard_ratios[i])?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;
    use approx::assert_relative_eq;

    fn create_test_data() -> SurvivalData {
        let times = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0];
        let events = vec![true, false, true, true, false, true, true, false];
        let covariates = Array2::from_shape_vec((8, 3), vec![
            1.0, 0.0, 0.5,
            0.0, 1.0, -0.5,
            1.0, 1.0, 0.0,
            -1.0, 0.0, 1.0,
            0.0, -1.0, -1.0,
            1.0, -1.0, 0.5,
            -1.0, 1.0, -0.5,
            0.0, 0.0, 0.0,
        ]).unwrap();

        SurvivalData::new(times, events, covariates).unwrap()
    }

    #[test]
    fn test_model_creation() {
        let model = CoxModel::new()
            .with_l2_penalty(0.05)
            .with_max_iterations(500);

        assert_eq!(model.l2_penalty, 0.05);
        assert_eq!(model.max_iterations, 500);
        assert!(!model.is_fitted());
    }

    #[test]
    fn test_penalizer_scales_with_samples() {
        let model = CoxModel::new().with_penalizer(0.1);
        assert_relative_eq!(model.effective_l2_penalty(200), 20.0, epsilon = 1e-12);

        let model = model.with_l2_penalty(3.0);
        assert_relative_eq!(model.effective_l2_penalty(200), 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_model_not_fitted_error() {
        let model = CoxModel::new();
        assert!(model.coefficients().is_err());
        assert!(model.summary().is_err());
        assert!(model.baseline_hazard().is_err());

        let covariates = Array2::zeros((5, 3));
        assert!(model.predict(covariates.view()).is_err());
    }

    #[test]
    fn test_feature_names() {
        let names = vec!["age".to_string(), "gender".to_string(), "treatment".to_string()];
        let mut model = CoxModel::new()
            .with_feature_names(names.clone())
            .with_penalizer(0.1);
        model.fit(&create_test_data()).unwrap();

        let top = model.top_coefficients(2).unwrap();
        assert_eq!(top.len(), 2);
        assert!(top[0].1 >= top[1].1);
        assert!(names.contains(&top[0].0));
    }

    #[test]
    fn test_feature_name_count_mismatch() {
        let mut model = CoxModel::new().with_feature_names(vec!["only_one".to_string()]);
        assert!(model.fit(&create_test_data()).is_err());
    }

    #[test]
    fn test_prediction_dimension_mismatch() {
        let data = create_test_data();
        let mut model = CoxModel::new().with_penalizer(0.1);
        model.fit(&data).unwrap();

        // wrong number of features
        let wrong_covariates = Array2::zeros((5, 2)); // should be 3 features
        assert!(model.predict(wrong_covariates.view()).is_err());
    }

    #[test]
    fn test_breslow_baseline_without_covariates() {
        // beta = 0 -> nelson-aalen: sum d_k / n_k
        let times = vec![1.0, 2.0, 2.0, 3.0];
        let events = vec![true, true, false, true];
        let data = SurvivalData::new(times, events, Array2::zeros((4, 1))).unwrap();

        let baseline = BaselineHazard::breslow(&data, &Array1::zeros(1));
        assert_eq!(baseline.times, vec![1.0, 2.0, 3.0]);
        assert_relative_eq!(baseline.cumulative[0], 0.25, epsilon = 1e-12);
        assert_relative_eq!(baseline.cumulative[1], 0.25 + 1.0 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(baseline.cumulative[2], 0.25 + 1.0 / 3.0 + 1.0, epsilon = 1e-12);

        assert_eq!(baseline.cumulative_at(0.5), 0.0);
        assert_relative_eq!(baseline.cumulative_at(2.5), 0.25 + 1.0 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_summary_display() {
        let mut model = CoxModel::new().with_penalizer(0.1);
        model.fit(&create_test_data()).unwrap();
        let text = model.summary().unwrap().to_string();
        assert!(text.contains("penalizer"));
        assert!(text.contains("x2"));
    }
}
