use crate::error::{Result, SurvivalError};

/// kaplan-meier product-limit estimate of a survival function
#[derive(Debug, Clone, PartialEq)]
pub struct KaplanMeier {
    /// step times, starting at 0
    pub timeline: Vec<f64>,
    /// S(t) right after each step time
    pub survival: Vec<f64>,
    /// how many subjects went into the estimate
    pub n_subjects: usize,
}

impl KaplanMeier {
    /// fit on durations & event flags (true = event observed)
    pub fn fit(times: &[f64], events: &[bool]) -> Result<Self> {
        if times.len() != events.len() {
            return Err(SurvivalError::invalid_dimensions(format!(
                "times len ({}) != events len ({})",
                times.len(),
                events.len()
            )));
        }
        if times.iter().any(|t| !t.is_finite() || *t < 0.0) {
            return Err(SurvivalError::invalid_survival_data(
                "kaplan-meier durations must be finite & non-negative",
            ));
        }

        let mut order: Vec<usize> = (0..times.len()).collect();
        order.sort_by(|&a, &b| times[a].total_cmp(&times[b]));

        let mut timeline = vec![0.0];
        let mut survival = vec![1.0];
        let mut at_risk = times.len();
        let mut current = 1.0;
        let mut start = 0;

        while start < order.len() {
            let t = times[order[start]];
            let mut end = start;
            let mut deaths = 0;
            while end < order.len() && times[order[end]] == t {
                if events[order[end]] {
                    deaths += 1;
                }
                end += 1;
            }

            if deaths > 0 {
                current *= 1.0 - deaths as f64 / at_risk as f64;
                if t == 0.0 {
                    survival[0] = current;
                } else {
                    timeline.push(t);
                    survival.push(current);
                }
            }

            at_risk -= end - start;
            start = end;
        }

        Ok(Self {
            timeline,
            survival,
            n_subjects: times.len(),
        })
    }

    /// S(t) - right-continuous step function
    pub fn survival_at(&self, t: f64) -> f64 {
        let idx = self.timeline.partition_point(|&s| s <= t);
        if idx == 0 { 1.0 } else { self.survival[idx - 1] }
    }

    /// smallest time where S(t) <= 0.5, if the curve gets there
    pub fn median_survival(&self) -> Option<f64> {
        self.timeline
            .iter()
            .zip(&self.survival)
            .find(|&(_, &s)| s <= 0.5)
            .map(|(&t, _)| t)
    }

    /// corner points for drawing the step curve
    pub fn step_points(&self, until: f64) -> Vec<(f64, f64)> {
        let mut points = Vec::with_capacity(self.timeline.len() * 2 + 1);
        for (k, (&t, &s)) in self.timeline.iter().zip(&self.survival).enumerate() {
            if k > 0 {
                points.push((t, self.survival[k - 1]));
            }
            points.push((t, s));
        }
        if let Some(&(last_t, last_s)) = points.last() {
            if until > last_t {
                points.push((until, last_s));
            }
        }
        points
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_textbook_example() {
        // deaths at 1, 3, 3; censored at 2, 4
        let times = [1.0, 2.0, 3.0, 3.0, 4.0];
        let events = [true, false, true, true, false];
        let km = KaplanMeier::fit(&times, &events).unwrap();

        assert_eq!(km.timeline, vec![0.0, 1.0, 3.0]);
        assert_relative_eq!(km.survival[1], 0.8, epsilon = 1e-12);
        // 3 at risk at t=3, 2 die
        assert_relative_eq!(km.survival[2], 0.8 / 3.0, epsilon = 1e-12);

        assert_relative_eq!(km.survival_at(2.5), 0.8, epsilon = 1e-12);
        assert_eq!(km.survival_at(0.5), 1.0);
        assert_eq!(km.median_survival(), Some(3.0));
    }

    #[test]
    fn test_all_censored_is_flat() {
        let km = KaplanMeier::fit(&[1.0, 2.0, 3.0], &[false, false, false]).unwrap();
        assert_eq!(km.survival, vec![1.0]);
        assert_eq!(km.median_survival(), None);
    }

    #[test]
    fn test_monotone_non_increasing() {
        let times: Vec<f64> = (1..=50).map(|i| (i % 17) as f64 + 0.5).collect();
        let events: Vec<bool> = (1..=50).map(|i| i % 3 != 0).collect();
        let km = KaplanMeier::fit(&times, &events).unwrap();

        for pair in km.survival.windows(2) {
            assert!(pair[1] <= pair[0]);
        }
        assert!(km.survival.iter().all(|&s| (0.0..=1.0).contains(&s)));
    }

    #[test]
    fn test_step_points() {
        let km = KaplanMeier::fit(&[1.0, 2.0], &[true, true]).unwrap();
        let points = km.step_points(3.0);
        assert_eq!(
            points,
            vec![(0.0, 1.0), (1.0, 1.0), (1.0, 0.5), (2.0, 0.5), (2.0, 0.0), (3.0, 0.0)]
        );
    }

    #[test]
    fn test_invalid_input() {
        assert!(KaplanMeier::fit(&[1.0], &[true, false]).is_err());
        assert!(KaplanMeier::fit(&[-1.0], &[true]).is_err());
    }
}
