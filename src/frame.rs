use log::debug;
use ndarray::{ArrayView2, Axis};

use crate::data::SurvivalData;
use crate::error::{Result, SurvivalError};

/// validated survival records built from a feature matrix + time/event vectors
#[derive(Debug, Clone)]
pub struct SurvivalFrame {
    data: SurvivalData,
    rows: Vec<usize>,
    n_input: usize,
}

impl SurvivalFrame {
    /// combine features w/ time & event, dropping rows the fitter can't use
    ///
    /// infinite time/event values count as missing; rows missing either are
    /// dropped, then rows w/ non-positive time. surviving events must be 0 or 1.
    pub fn build(x: ArrayView2<f64>, times: &[f64], events: &[f64]) -> Result<Self> {
        let n = x.nrows();
        if times.len() != n || events.len() != n {
            return Err(SurvivalError::invalid_dimensions(format!(
                "matrix rows ({}), times ({}) & events ({}) must match",
                n,
                times.len(),
                events.len()
            )));
        }

        let rows: Vec<usize> = (0..n)
            .filter(|&i| times[i].is_finite() && events[i].is_finite())
            .filter(|&i| times[i] > 0.0)
            .collect();

        let bad: Vec<f64> = rows
            .iter()
            .map(|&i| events[i])
            .filter(|&e| e != 0.0 && e != 1.0)
            .collect();
        if !bad.is_empty() {
            return Err(SurvivalError::non_binary_event(bad));
        }

        if rows.len() < n {
            debug!("survival frame dropped {} of {} rows", n - rows.len(), n);
        }

        let data = SurvivalData::new(
            rows.iter().map(|&i| times[i]).collect(),
            rows.iter().map(|&i| events[i] == 1.0).collect(),
            x.select(Axis(0), &rows),
        )?;

        Ok(Self { data, rows, n_input: n })
    }

    pub fn data(&self) -> &SurvivalData {
        &self.data
    }

    pub fn into_data(self) -> SurvivalData {
        self.data
    }

    /// source row index for every kept record
    pub fn rows(&self) -> &[usize] {
        &self.rows
    }

    /// how many input rows were filtered out
    pub fn dropped(&self) -> usize {
        self.n_input - self.rows.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    #[test]
    fn test_filters_invalid_rows() {
        let x = Array2::from_shape_fn((6, 2), |(i, j)| (i * 2 + j) as f64);
        let times = [5.0, f64::NAN, 0.0, -2.0, f64::INFINITY, 7.5];
        let events = [1.0, 1.0, 0.0, 1.0, 1.0, 0.0];

        let frame = SurvivalFrame::build(x.view(), &times, &events).unwrap();
        assert_eq!(frame.rows(), &[0, 5]);
        assert_eq!(frame.dropped(), 4);

        let data = frame.data();
        assert_eq!(data.times().to_vec(), vec![5.0, 7.5]);
        assert_eq!(data.events(), &[true, false]);
        assert_eq!(data.covariates().row(1).to_vec(), vec![10.0, 11.0]);
    }

    #[test]
    fn test_missing_event_dropped() {
        let x = Array2::zeros((3, 1));
        let frame = SurvivalFrame::build(x.view(), &[1.0, 2.0, 3.0], &[0.0, f64::NAN, f64::NEG_INFINITY]).unwrap();
        assert_eq!(frame.rows(), &[0]);
    }

    #[test]
    fn test_non_binary_event() {
        let x = Array2::zeros((2, 1));
        let result = SurvivalFrame::build(x.view(), &[1.0, 2.0], &[1.0, 2.0]);
        assert!(matches!(result, Err(SurvivalError::NonBinaryEvent { .. })));
    }

    #[test]
    fn test_length_mismatch() {
        let x = Array2::zeros((2, 1));
        assert!(SurvivalFrame::build(x.view(), &[1.0], &[1.0, 0.0]).is_err());
    }
}
