//! Small numeric helpers shared across the ecosystem.
//!
//! Everything here is defined to degrade to a neutral value on empty or
//! degenerate input (zero-length history, zero total weight) instead of
//! panicking, so a thin round can never take the simulation down.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Fixed-capacity history window.
///
/// Momentum and rolling-average signals only ever look at the last few
/// observations, so history is trimmed on push rather than accumulated
/// without bound.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Window<T> {
    capacity: usize,
    items: VecDeque<T>,
}

impl<T> Window<T> {
    /// Creates an empty window holding at most `capacity` items.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            items: VecDeque::with_capacity(capacity.max(1)),
        }
    }

    /// Pushes an item, evicting the oldest when full.
    pub fn push(&mut self, item: T) {
        if self.items.len() == self.capacity {
            self.items.pop_front();
        }
        self.items.push_back(item);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Most recent item, if any.
    pub fn latest(&self) -> Option<&T> {
        self.items.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }
}

impl Window<f64> {
    /// Mean of the window contents; `None` when empty.
    pub fn mean(&self) -> Option<f64> {
        if self.items.is_empty() {
            return None;
        }
        Some(self.items.iter().sum::<f64>() / self.items.len() as f64)
    }

    /// Mean of consecutive deltas (momentum). Zero with fewer than 2 items.
    pub fn mean_delta(&self) -> f64 {
        if self.items.len() < 2 {
            return 0.0;
        }
        let deltas: f64 = self
            .items
            .iter()
            .zip(self.items.iter().skip(1))
            .map(|(a, b)| b - a)
            .sum();
        deltas / (self.items.len() - 1) as f64
    }
}

/// Pearson correlation over (x, y) pairs.
///
/// `None` with fewer than 2 pairs. Degenerate variance (all x or all y
/// identical) yields `Some(0.0)` rather than NaN.
pub fn pearson(pairs: &[(f64, f64)]) -> Option<f64> {
    if pairs.len() < 2 {
        return None;
    }
    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|(_, y)| y).sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (x, y) in pairs {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    let denom = (var_x * var_y).sqrt();
    if denom <= f64::EPSILON {
        return Some(0.0);
    }
    Some((cov / denom).clamp(-1.0, 1.0))
}

/// Normalizes a weight slice in place so it sums to 1.0.
///
/// Negative entries are clamped to zero first. A zero (or all-negative)
/// total degrades to an even split.
pub fn normalize_weights(weights: &mut [f64]) {
    for w in weights.iter_mut() {
        if !w.is_finite() || *w < 0.0 {
            *w = 0.0;
        }
    }
    let total: f64 = weights.iter().sum();
    if total <= f64::EPSILON {
        let even = 1.0 / weights.len().max(1) as f64;
        for w in weights.iter_mut() {
            *w = even;
        }
    } else {
        for w in weights.iter_mut() {
            *w /= total;
        }
    }
}

/// Rounds to 4 decimal places, the precision used for stored round records.
pub fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_window_eviction() {
        let mut w = Window::new(3);
        for i in 0..5 {
            w.push(i as f64);
        }
        assert_eq!(w.len(), 3);
        assert_eq!(*w.latest().unwrap(), 4.0);
        assert_eq!(w.iter().copied().collect::<Vec<_>>(), vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_window_mean_and_momentum() {
        let mut w = Window::new(3);
        assert!(w.mean().is_none());
        assert_eq!(w.mean_delta(), 0.0);

        w.push(0.1);
        assert_eq!(w.mean_delta(), 0.0);

        w.push(0.2);
        w.push(0.3);
        assert_relative_eq!(w.mean().unwrap(), 0.2);
        assert_relative_eq!(w.mean_delta(), 0.1, epsilon = 1e-12);
    }

    #[test]
    fn test_pearson_requires_two_points() {
        assert!(pearson(&[]).is_none());
        assert!(pearson(&[(0.5, 0.5)]).is_none());
    }

    #[test]
    fn test_pearson_perfect_correlation() {
        let pairs: Vec<(f64, f64)> = (0..10).map(|i| (i as f64, 2.0 * i as f64)).collect();
        assert_relative_eq!(pearson(&pairs).unwrap(), 1.0, epsilon = 1e-12);

        let anti: Vec<(f64, f64)> = (0..10).map(|i| (i as f64, -(i as f64))).collect();
        assert_relative_eq!(pearson(&anti).unwrap(), -1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_pearson_degenerate_variance() {
        let flat = vec![(1.0, 0.3), (1.0, 0.9), (1.0, 0.1)];
        assert_eq!(pearson(&flat), Some(0.0));
    }

    #[test]
    fn test_normalize_zero_total_even_split() {
        let mut w = [0.0, 0.0, 0.0, 0.0];
        normalize_weights(&mut w);
        for v in w {
            assert_relative_eq!(v, 0.25);
        }
    }

    #[test]
    fn test_normalize_clamps_negatives() {
        let mut w = [-1.0, 1.0, 3.0];
        normalize_weights(&mut w);
        assert_eq!(w[0], 0.0);
        assert_relative_eq!(w[1], 0.25);
        assert_relative_eq!(w[2], 0.75);
    }

    #[test]
    fn test_round4() {
        assert_eq!(round4(0.123456), 0.1235);
        assert_eq!(round4(1.0), 1.0);
    }
}
