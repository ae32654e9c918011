use log::debug;
use ndarray::{Array1, Array2};
use crate::{
    data::SurvivalData,
    error::{SurvivalError, Result},
};

/// Configuration for Cox model optimization
#[derive(Debug, Clone)]
pub struct OptimizationConfig {
    pub l2_penalty: f64,
    pub max_iterations: usize,
    pub tolerance: f64,
    pub max_halvings: usize,
}

impl Default for OptimizationConfig {
    fn default() -> Self {
        Self {
            l2_penalty: 0.0,
            max_iterations: 100,
            tolerance: 1e-9,
            max_halvings: 30,
        }
    }
}

/// log partial likelihood + first & second derivatives at some beta
#[derive(Debug, Clone)]
pub struct LikelihoodDerivatives {
    pub log_likelihood: f64,
    pub gradient: Array1<f64>,
    pub hessian: Array2<f64>,
}

/// Newton-Raphson for the ridge-penalized Cox partial likelihood (Breslow ties)
pub struct CoxOptimizer {
    config: OptimizationConfig,
}

impl CoxOptimizer {
    pub fn new(config: OptimizationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &OptimizationConfig {
        &self.config
    }

    /// maximize loglik - l2/2 * |beta|^2 starting from zero
    pub fn optimize(&self, data: &SurvivalData) -> Result<Array1<f64>> {
        let n_features = data.n_features();
        let l2 = self.config.l2_penalty;
        let mut beta = Array1::zeros(n_features);

        for iteration in 0..self.config.max_iterations {
            let derivatives = compute_likelihood_derivatives(data, &beta)?;
            let current = derivatives.log_likelihood - 0.5 * l2 * beta.dot(&beta);

            let penalized_gradient = &derivatives.gradient - &(l2 * &beta);
            let mut penalized_hessian = derivatives.hessian;
            for i in 0..n_features {
                penalized_hessian[[i, i]] -= l2;
            }

            // beta_new = beta - H^-1 g
            let step = match solve_linear_system(&penalized_hessian, &penalized_gradient) {
                Ok(step) => step,
                Err(_) => {
                    // singular hessian, fall back to a gradient ascent step
                    -0.01 * &penalized_gradient
                }
            };

            // step halving until the objective doesn't get worse
            let mut scale = 1.0;
            let mut candidate = &beta - &step;
            let mut candidate_value = self.penalized_log_likelihood(data, &candidate);
            let mut halvings = 0;
            while !(candidate_value >= current) && halvings < self.config.max_halvings {
                scale *= 0.5;
                candidate = &beta - &(scale * &step);
                candidate_value = self.penalized_log_likelihood(data, &candidate);
                halvings += 1;
            }

            if !(candidate_value >= current) {
                // no ascent direction left - we're at the optimum numerically
                debug!("newton stalled at iteration {} (objective {:.6})", iteration, current);
                return Ok(beta);
            }

            beta = candidate;
            debug!(
                "newton iteration {}: objective {:.6} -> {:.6} (step scale {})",
                iteration, current, candidate_value, scale
            );

            if (candidate_value - current).abs() < self.config.tolerance * (1.0 + current.abs()) {
                return Ok(beta);
            }
        }

        Err(SurvivalError::optimization_failed(format!(
            "Newton-Raphson failed to converge in {} iterations",
            self.config.max_iterations
        )))
    }

    fn penalized_log_likelihood(&self, data: &SurvivalData, beta: &Array1<f64>) -> f64 {
        match compute_log_likelihood(data, beta) {
            Ok(loglik) => loglik - 0.5 * self.config.l2_penalty * beta.dot(beta),
            Err(_) => f64::NEG_INFINITY,
        }
    }
}

/// linear predictors, shifted so the largest is 0 (returns the shift too)
fn shifted_predictors(data: &SurvivalData, beta: &Array1<f64>) -> Result<(Array1<f64>, f64)> {
    let eta = data.covariates().dot(beta);
    if eta.iter().any(|v| !v.is_finite()) {
        return Err(SurvivalError::numerical_error("non-finite linear predictor"));
    }
    let shift = eta.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let shift = if shift.is_finite() { shift } else { 0.0 };
    Ok((eta.mapv(|v| v - shift), shift))
}

/// walk tied-time groups from the longest time down, growing the risk set
fn for_each_time_group(data: &SurvivalData, mut f: impl FnMut(&[usize], bool)) {
    let order = data.descending_order();
    let times = data.times();
    let mut start = 0;
    while start < order.len() {
        let t = times[order[start]];
        let mut end = start + 1;
        while end < order.len() && times[order[end]] == t {
            end += 1;
        }
        let group = &order[start..end];
        let has_event = group.iter().any(|&i| data.events()[i]);
        f(group, has_event);
        start = end;
    }
}

/// log partial likelihood only
pub fn compute_log_likelihood(data: &SurvivalData, beta: &Array1<f64>) -> Result<f64> {
    let (eta, shift) = shifted_predictors(data, beta)?;
    let events = data.events();

    let mut risk_sum = 0.0;
    let mut loglik = 0.0;

    for_each_time_group(data, |group, has_event| {
        for &i in group {
            risk_sum += eta[i].exp();
        }
        if has_event {
            let log_sum = risk_sum.ln() + shift;
            for &i in group.iter().filter(|&&i| events[i]) {
                loglik += eta[i] + shift - log_sum;
            }
        }
    });

    if !loglik.is_finite() {
        return Err(SurvivalError::numerical_error("log-likelihood is not finite"));
    }
    Ok(loglik)
}

/// log partial likelihood, gradient & hessian in one descending-time sweep
pub fn compute_likelihood_derivatives(
    data: &SurvivalData,
    beta: &Array1<f64>,
) -> Result<LikelihoodDerivatives> {
    let n_features = data.n_features();
    let (eta, shift) = shifted_predictors(data, beta)?;
    let covariates = data.covariates();
    let events = data.events();

    let mut loglik = 0.0;
    let mut gradient = Array1::zeros(n_features);
    let mut hessian = Array2::zeros((n_features, n_features));

    // running risk-set sums of w, w*x and w*x*x^T
    let mut risk_sum = 0.0;
    let mut weighted_covariate_sum = Array1::<f64>::zeros(n_features);
    let mut weighted_outer_sum = Array2::<f64>::zeros((n_features, n_features));

    for_each_time_group(data, |group, has_event| {
        for &i in group {
            let w = eta[i].exp();
            let x = covariates.row(i);
            risk_sum += w;
            weighted_covariate_sum.scaled_add(w, &x);
            for j in 0..n_features {
                let wx = w * x[j];
                if wx == 0.0 {
                    continue;
                }
                for k in 0..n_features {
                    weighted_outer_sum[[j, k]] += wx * x[k];
                }
            }
        }

        if !has_event {
            return;
        }

        let weighted_mean = &weighted_covariate_sum / risk_sum;
        let log_sum = risk_sum.ln() + shift;
        let n_events = group.iter().filter(|&&i| events[i]).count() as f64;

        for &i in group.iter().filter(|&&i| events[i]) {
            loglik += eta[i] + shift - log_sum;
            gradient += &covariates.row(i);
        }
        gradient.scaled_add(-n_events, &weighted_mean);

        for j in 0..n_features {
            for k in 0..n_features {
                let variance = weighted_outer_sum[[j, k]] / risk_sum - weighted_mean[j] * weighted_mean[k];
                hessian[[j, k]] -= n_events * variance;
            }
        }
    });

    if !loglik.is_finite() {
        return Err(SurvivalError::numerical_error("log-likelihood is not finite"));
    }

    Ok(LikelihoodDerivatives {
        log_likelihood: loglik,
        gradient,
        hessian,
    })
}

/// Solve linear system Ax = b (gaussian elimination w/ partial pivoting)
pub fn solve_linear_system(a: &Array2<f64>, b: &Array1<f64>) -> Result<Array1<f64>> {
    let n = a.nrows();
    if n != a.ncols() || n != b.len() {
        return Err(SurvivalError::invalid_dimensions("Matrix dimensions mismatch"));
    }

    let mut a_copy = a.clone();
    let mut b_copy = b.clone();

    // Forward elimination
    for i in 0..n {
        // Find pivot
        let mut max_row = i;
        for k in i + 1..n {
            if a_copy[[k, i]].abs() > a_copy[[max_row, i]].abs() {
                max_row = k;
            }
        }

        if a_copy[[max_row, i]].abs() < 1e-12 {
            return Err(SurvivalError::numerical_error("Matrix is singular"));
        }

        // Swap rows
        if max_row != i {
            for j in 0..n {
                a_copy.swap([i, j], [max_row, j]);
            }
            b_copy.swap(i, max_row);
        }

        // Eliminate
        for k in i + 1..n {
            let factor = a_copy[[k, i]] / a_copy[[i, i]];
            if factor == 0.0 {
                continue;
            }
            for j in i..n {
                a_copy[[k, j]] -= factor * a_copy[[i, j]];
            }
            b_copy[k] -= factor * b_copy[i];
        }
    }

    // Back substitution
    let mut x = Array1::zeros(n);
    for i in (0..n).rev() {
        x[i] = b_copy[i];
        for j in i + 1..n {
            x[i] -= a_copy[[i, j]] * x[j];
        }
        x[i] /= a_copy[[i, i]];
    }

    Ok(x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;
    use approx::assert_relative_eq;

    fn create_test_data() -> SurvivalData {
        let times = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let events = vec![true, true, true, true, true];
        let covariates = Array2::from_shape_vec((5, 2), vec![
            1.0, 0.0,
            0.0, 1.0,
            1.0, 1.0,
            -1.0, 0.0,
            0.0, -1.0,
        ]).unwrap();

        SurvivalData::new(times, events, covariates).unwrap()
    }

    /// brute-force risk sets, the way the textbook writes it
    fn naive_log_likelihood(data: &SurvivalData, beta: &Array1<f64>) -> f64 {
        let eta = data.covariates().dot(beta);
        let mut loglik = 0.0;
        for i in 0..data.n_samples() {
            if !data.events()[i] {
                continue;
            }
            let risk: f64 = (0..data.n_samples())
                .filter(|&j| data.times()[j] >= data.times()[i])
                .map(|j| eta[j].exp())
                .sum();
            loglik += eta[i] - risk.ln();
        }
        loglik
    }

    #[test]
    fn test_likelihood_matches_naive() {
        let times = vec![2.0, 2.0, 3.0, 1.0, 5.0, 3.0];
        let events = vec![true, false, true, true, false, true];
        let covariates = Array2::from_shape_vec((6, 2), vec![
            0.5, -1.0,
            1.5, 0.0,
            -0.3, 0.7,
            0.0, 1.0,
            2.0, -0.5,
            -1.0, -1.0,
        ]).unwrap();
        let data = SurvivalData::new(times, events, covariates).unwrap();
        let beta = Array1::from(vec![0.4, -0.8]);

        let fast = compute_log_likelihood(&data, &beta).unwrap();
        assert_relative_eq!(fast, naive_log_likelihood(&data, &beta), epsilon = 1e-10);

        let derivatives = compute_likelihood_derivatives(&data, &beta).unwrap();
        assert_relative_eq!(derivatives.log_likelihood, fast, epsilon = 1e-10);
    }

    #[test]
    fn test_gradient_matches_finite_differences() {
        let data = create_test_data();
        let beta = Array1::from(vec![0.3, -0.2]);
        let derivatives = compute_likelihood_derivatives(&data, &beta).unwrap();

        let h = 1e-6;
        for j in 0..2 {
            let mut up = beta.clone();
            let mut down = beta.clone();
            up[j] += h;
            down[j] -= h;
            let numeric = (compute_log_likelihood(&data, &up).unwrap()
                - compute_log_likelihood(&data, &down).unwrap()) / (2.0 * h);
            assert_relative_eq!(derivatives.gradient[j], numeric, epsilon = 1e-5);

            let numeric_hessian = (compute_likelihood_derivatives(&data, &up).unwrap().gradient
                - compute_likelihood_derivatives(&data, &down).unwrap().gradient) / (2.0 * h);
            for k in 0..2 {
                assert_relative_eq!(derivatives.hessian[[k, j]], numeric_hessian[k], epsilon = 1e-4);
            }
        }
    }

    #[test]
    fn test_optimization_no_regularization() {
        let data = create_test_data();
        let optimizer = CoxOptimizer::new(OptimizationConfig::default());

        let beta = optimizer.optimize(&data).unwrap();
        assert_eq!(beta.len(), 2);

        // at the optimum the gradient vanishes
        let derivatives = compute_likelihood_derivatives(&data, &beta).unwrap();
        assert!(derivatives.gradient.iter().all(|g| g.abs() < 1e-4));
    }

    #[test]
    fn test_optimization_with_ridge() {
        let data = create_test_data();

        let plain = CoxOptimizer::new(OptimizationConfig::default()).optimize(&data).unwrap();
        let ridge = CoxOptimizer::new(OptimizationConfig {
            l2_penalty: 5.0,
            ..OptimizationConfig::default()
        })
        .optimize(&data)
        .unwrap();

        // Ridge should shrink the coefficient vector
        assert!(ridge.dot(&ridge) < plain.dot(&plain));

        // penalized stationarity: g - l2 * beta = 0
        let derivatives = compute_likelihood_derivatives(&data, &ridge).unwrap();
        for j in 0..2 {
            assert_relative_eq!(derivatives.gradient[j], 5.0 * ridge[j], epsilon = 1e-4);
        }
    }

    #[test]
    fn test_no_events() {
        let covariates = Array2::from_shape_vec((3, 1), vec![1.0, 2.0, 3.0]).unwrap();
        let data = SurvivalData::new(vec![1.0, 2.0, 3.0], vec![false; 3], covariates).unwrap();

        let beta = CoxOptimizer::new(OptimizationConfig {
            l2_penalty: 1.0,
            ..OptimizationConfig::default()
        })
        .optimize(&data)
        .unwrap();
        assert_eq!(beta[0], 0.0);
    }

    #[test]
    fn test_solve_linear_system() {
        let a = Array2::from_shape_vec((2, 2), vec![0.0, 2.0, 1.0, 1.0]).unwrap();
        let b = Array1::from(vec![4.0, 3.0]);
        let x = solve_linear_system(&a, &b).unwrap();
        assert_relative_eq!(x[0], 1.0, epsilon = 1e-12);
        assert_relative_eq!(x[1], 2.0, epsilon = 1e-12);

        let singular = Array2::from_shape_vec((2, 2), vec![1.0, 2.0, 2.0, 4.0]).unwrap();
        assert!(solve_linear_system(&singular, &b).is_err());
    }
}
