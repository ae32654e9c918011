//! seeded, stratified train/test splitting
//!
//! All randomness for one split comes from a single `StdRng` seeded by the
//! caller, and strata are visited in sorted label order, so the same input
//! and seed always give the same partitions.

use std::collections::BTreeMap;

use ndarray::{Array1, Array2, ArrayView2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::error::{Result, SurvivalError};

/// row indices for each side of a split
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitIndices {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// stratum key for a float label; missing labels form their own stratum
fn label_key(label: f64) -> Option<u64> {
    if label.is_nan() {
        None
    } else {
        // normalize -0.0 so it shares a stratum w/ 0.0
        Some((label + 0.0).to_bits())
    }
}

/// train/test sizes for `n` samples; test rounds up
fn split_sizes(n: usize, test_size: f64) -> Result<(usize, usize)> {
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(SurvivalError::invalid_parameter("test_size", test_size));
    }

    let n_test = (test_size * n as f64).ceil() as usize;
    let n_train = n.saturating_sub(n_test);
    if n_test == 0 || n_train == 0 {
        return Err(SurvivalError::invalid_parameter(
            "test_size",
            format!("{} leaves an empty partition for {} samples", test_size, n),
        ));
    }
    Ok((n_train, n_test))
}

/// stratified split: each label keeps (about) the same share in both partitions
pub fn stratified_split(labels: &[f64], test_size: f64, seed: u64) -> Result<SplitIndices> {
    let n = labels.len();
    let (_, n_test) = split_sizes(n, test_size)?;

    let mut strata: BTreeMap<Option<u64>, Vec<usize>> = BTreeMap::new();
    for (i, &label) in labels.iter().enumerate() {
        strata.entry(label_key(label)).or_default().push(i);
    }

    // proportional allocation, remainders handed out largest first
    let mut allocation: Vec<(usize, f64)> = strata
        .values()
        .map(|rows| {
            let exact = rows.len() as f64 * n_test as f64 / n as f64;
            (exact.floor() as usize, exact - exact.floor())
        })
        .collect();
    let mut remaining = n_test - allocation.iter().map(|a| a.0).sum::<usize>();
    let mut by_remainder: Vec<usize> = (0..allocation.len()).collect();
    by_remainder.sort_by(|&a, &b| allocation[b].1.total_cmp(&allocation[a].1).then(a.cmp(&b)));
    for k in by_remainder {
        if remaining == 0 {
            break;
        }
        allocation[k].0 += 1;
        remaining -= 1;
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::with_capacity(n - n_test);
    let mut test = Vec::with_capacity(n_test);

    for (rows, (take, _)) in strata.into_values().zip(allocation) {
        let mut rows = rows;
        rows.shuffle(&mut rng);
        let take = take.min(rows.len());
        test.extend_from_slice(&rows[..take]);
        train.extend_from_slice(&rows[take..]);
    }

    train.shuffle(&mut rng);
    test.shuffle(&mut rng);

    Ok(SplitIndices { train, test })
}

/// features, times & events on both sides of a split
#[derive(Debug, Clone, PartialEq)]
pub struct SplitPartitions {
    pub x_train: Array2<f64>,
    pub x_test: Array2<f64>,
    pub t_train: Array1<f64>,
    pub t_test: Array1<f64>,
    pub e_train: Array1<f64>,
    pub e_test: Array1<f64>,
}

/// split a feature matrix w/ its time & event vectors, stratified on events
pub fn train_test_split(
    x: ArrayView2<f64>,
    times: &[f64],
    events: &[f64],
    test_size: f64,
    seed: u64,
) -> Result<SplitPartitions> {
    if times.len() != x.nrows() || events.len() != x.nrows() {
        return Err(SurvivalError::invalid_dimensions(format!(
            "matrix rows ({}), times ({}) & events ({}) must match",
            x.nrows(),
            times.len(),
            events.len()
        )));
    }

    let indices = stratified_split(events, test_size, seed)?;
    let pick = |values: &[f64], rows: &[usize]| -> Array1<f64> {
        rows.iter().map(|&i| values[i]).collect()
    };

    Ok(SplitPartitions {
        x_train: x.select(Axis(0), &indices.train),
        x_test: x.select(Axis(0), &indices.test),
        t_train: pick(times, &indices.train),
        t_test: pick(times, &indices.test),
        e_train: pick(events, &indices.train),
        e_test: pick(events, &indices.test),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(n: usize, positives: usize) -> Vec<f64> {
        (0..n).map(|i| if i < positives { 1.0 } else { 0.0 }).collect()
    }

    #[test]
    fn test_sizes_and_coverage() {
        let y = labels(10, 3);
        let split = stratified_split(&y, 0.25, 42).unwrap();
        assert_eq!(split.test.len(), 3); // ceil(2.5)
        assert_eq!(split.train.len(), 7);

        let mut all: Vec<usize> = split.train.iter().chain(&split.test).copied().collect();
        all.sort();
        assert_eq!(all, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_stratification_preserves_rate() {
        let y = labels(500, 150);
        let split = stratified_split(&y, 0.25, 123).unwrap();

        let test_events = split.test.iter().filter(|&&i| y[i] == 1.0).count();
        let train_events = split.train.iter().filter(|&&i| y[i] == 1.0).count();
        assert_eq!(split.test.len(), 125);
        assert!((37..=38).contains(&test_events));
        assert_eq!(train_events + test_events, 150);
    }

    #[test]
    fn test_same_seed_same_split() {
        let y = labels(200, 60);
        let a = stratified_split(&y, 0.25, 7).unwrap();
        let b = stratified_split(&y, 0.25, 7).unwrap();
        assert_eq!(a, b);

        let c = stratified_split(&y, 0.25, 8).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn test_missing_labels_form_a_stratum() {
        let y = vec![0.0, 1.0, f64::NAN, f64::NAN, 0.0, 1.0, 0.0, 1.0];
        let split = stratified_split(&y, 0.5, 1).unwrap();
        let missing_in_test = split.test.iter().filter(|&&i| y[i].is_nan()).count();
        assert_eq!(missing_in_test, 1);
    }

    #[test]
    fn test_invalid_test_size() {
        let y = labels(10, 3);
        assert!(stratified_split(&y, 0.0, 1).is_err());
        assert!(stratified_split(&y, 1.0, 1).is_err());
        assert!(stratified_split(&y, f64::NAN, 1).is_err());
        assert!(stratified_split(&[1.0], 0.5, 1).is_err());
    }

    #[test]
    fn test_train_test_split_alignment() {
        let x = Array2::from_shape_fn((20, 2), |(i, j)| (i * 10 + j) as f64);
        let times: Vec<f64> = (0..20).map(|i| i as f64 + 1.0).collect();
        let events = labels(20, 8);

        let parts = train_test_split(x.view(), &times, &events, 0.25, 5).unwrap();
        assert_eq!(parts.x_train.nrows(), 15);
        assert_eq!(parts.x_test.nrows(), 5);
        for (row, &t) in parts.x_train.outer_iter().zip(parts.t_train.iter()) {
            // row i holds i*10 and time is i+1
            assert_eq!(row[0], (t - 1.0) * 10.0);
        }
    }
}
