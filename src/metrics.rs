use ndarray::ArrayView1;
use crate::{
    data::SurvivalData,
    error::{SurvivalError, Result},
};

/// concordance index - how often do higher risk scores = shorter survival?
///
/// a pair (i, j) is comparable when i had the event and j outlived it: a
/// later time, or the same time but censored. ties in risk count half
/// (Harrell's C).
pub fn concordance_index(
    risk_scores: ArrayView1<f64>,
    times: ArrayView1<f64>,
    events: &[bool],
) -> Result<f64> {
    if risk_scores.len() != times.len() || times.len() != events.len() {
        return Err(SurvivalError::invalid_dimensions(
            "risk scores, times, and events must have same length"
        ));
    }

    let n = risk_scores.len();
    if n < 2 {
        return Err(SurvivalError::invalid_dimensions(
            "need at least 2 samples for concordance"
        ));
    }

    let mut concordant = 0.0;
    let mut tied_risk = 0.0;
    let mut comparable = 0u64;

    for i in 0..n {
        if !events[i] {
            continue; // censored obs can't anchor a pair
        }

        for j in 0..n {
            if i == j {
                continue;
            }

            if times[j] > times[i] || (!events[j] && times[j] >= times[i]) {
                comparable += 1;

                if risk_scores[i] > risk_scores[j] {
                    concordant += 1.0;
                } else if risk_scores[i] == risk_scores[j] {
                    tied_risk += 1.0;
                }
            }
        }
    }

    if comparable == 0 {
        return Err(SurvivalError::numerical_error(
            "no comparable pairs for concordance calc"
        ));
    }

    Ok((concordant + 0.5 * tied_risk) / comparable as f64)
}

/// Log-likelihood for Cox model evaluation (Breslow ties)
pub fn log_partial_likelihood(
    data: &SurvivalData,
    risk_scores: ArrayView1<f64>,
) -> Result<f64> {
    if risk_scores.len() != data.n_samples() {
        return Err(SurvivalError::invalid_dimensions(
            "Risk scores length must match number of samples"
        ));
    }

    let times = data.times();
    let events = data.events();
    let order = data.descending_order();
    let max_risk = risk_scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    let mut loglik = 0.0;
    let mut risk_sum = 0.0;
    let mut start = 0;

    // risk set = everyone w/ time >= current, i.e. a prefix of the descending order
    while start < order.len() {
        let t = times[order[start]];
        let mut end = start;
        while end < order.len() && times[order[end]] == t {
            risk_sum += (risk_scores[order[end]] - max_risk).exp();
            end += 1;
        }

        // numerically stable log-sum-exp
        let log_sum_exp = max_risk + risk_sum.ln();
        for &i in &order[start..end] {
            if events[i] {
                loglik += risk_scores[i] - log_sum_exp;
            }
        }
        start = end;
    }

    Ok(loglik)
}

/// AIC (Akaike Information Criterion) for Cox model
pub fn aic(log_likelihood: f64, n_parameters: usize) -> f64 {
    2.0 * n_parameters as f64 - 2.0 * log_likelihood
}

/// BIC (Bayesian Information Criterion) for Cox model
pub fn bic(log_likelihood: f64, n_parameters: usize, n_samples: usize) -> f64 {
    (n_parameters as f64) * (n_samples as f64).ln() - 2.0 * log_likelihood
}

/// Comprehensive model evaluation metrics
#[derive(Debug, Clone)]
pub struct ModelMetrics {
    pub c_index: f64,
    pub log_likelihood: f64,
    pub aic: f64,
    pub bic: f64,
}

impl ModelMetrics {
    /// Compute all metrics for a fitted Cox model
    pub fn compute(
        data: &SurvivalData,
        risk_scores: ArrayView1<f64>,
        n_parameters: usize,
    ) -> Result<Self> {
        let c_index = concordance_index(risk_scores, data.times(), data.events())?;
        let log_likelihood = log_partial_likelihood(data, risk_scores)?;

        Ok(Self {
            c_index,
            log_likelihood,
            aic: aic(log_likelihood, n_parameters),
            bic: bic(log_likelihood, n_parameters, data.n_samples()),
        })
    }
}

impl std::fmt::Display for ModelMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "C-index:        {:.6}", self.c_index)?;
        writeln!(f, "Log-likelihood: {:.6}", self.log_likelihood)?;
        writeln!(f, "AIC:            {:.6}", self.aic)?;
        write!(f, "BIC:            {:.6}", self.bic)
    }
}
