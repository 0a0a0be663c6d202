// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Robust floor and ceiling height estimation
//!
//! A percentile over a sliding window of recent samples rather than a running
//! mean, so stray reflections far above or below the true plane do not drag
//! the estimate.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Sliding-window percentile estimator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeightEstimator {
    samples: VecDeque<f64>,
    window: usize,
    min_samples: usize,
    percentile: f64,
}

impl HeightEstimator {
    /// `percentile` is a fraction in [0, 1]
    pub fn new(window: usize, min_samples: usize, percentile: f64) -> Self {
        let window = window.max(1);
        Self {
            samples: VecDeque::with_capacity(window),
            window,
            min_samples: min_samples.clamp(1, window),
            percentile: percentile.clamp(0.0, 1.0),
        }
    }

    /// Add a sample, evicting the oldest once the window is full.
    /// Non-finite samples are ignored.
    pub fn push(&mut self, y: f64) {
        if !y.is_finite() {
            return;
        }
        if self.samples.len() == self.window {
            self.samples.pop_front();
        }
        self.samples.push_back(y);
    }

    /// Current estimate, once enough samples exist
    pub fn estimate(&self) -> Option<f64> {
        if self.samples.len() < self.min_samples {
            return None;
        }
        let mut sorted: Vec<f64> = self.samples.iter().copied().collect();
        sorted.sort_by(f64::total_cmp);
        Some(percentile_of_sorted(&sorted, self.percentile))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

/// Linear interpolation between the two closest ranks
fn percentile_of_sorted(sorted: &[f64], p: f64) -> f64 {
    let rank = p * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_needs_minimum_samples() {
        let mut est = HeightEstimator::new(100, 10, 0.25);
        for i in 0..9 {
            est.push(i as f64);
        }
        assert_eq!(est.estimate(), None);
        est.push(9.0);
        // 0..=9, rank 2.25
        assert_relative_eq!(est.estimate().unwrap(), 2.25);
    }

    #[test]
    fn test_outliers_do_not_move_estimate() {
        let mut est = HeightEstimator::new(100, 10, 0.25);
        for _ in 0..40 {
            est.push(0.0);
        }
        est.push(-3.0);
        est.push(5.0);
        assert_relative_eq!(est.estimate().unwrap(), 0.0);
    }

    #[test]
    fn test_window_evicts_oldest() {
        let mut est = HeightEstimator::new(10, 10, 0.75);
        for _ in 0..10 {
            est.push(1.0);
        }
        for _ in 0..10 {
            est.push(2.5);
        }
        assert_eq!(est.len(), 10);
        assert_relative_eq!(est.estimate().unwrap(), 2.5);
    }

    #[test]
    fn test_non_finite_samples_are_ignored() {
        let mut est = HeightEstimator::new(10, 1, 0.5);
        est.push(f64::NAN);
        est.push(f64::INFINITY);
        assert!(est.is_empty());
    }
}
