//! Rolling sample history
//!
//! A capped, append-only trailing window of scalar samples with the
//! statistics the voice extractor needs. Serializable so session state can
//! be snapshotted and restored.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Capped trailing window of recent scalar samples. Appending past the cap
/// evicts the oldest entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollingHistory {
    samples: VecDeque<f64>,
    capacity: usize,
}

impl RollingHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, sample: f64) {
        self.samples.push_back(sample);
        while self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().copied()
    }

    /// Mean over all samples; 0.0 when empty.
    pub fn mean(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples.iter().sum::<f64>() / self.samples.len() as f64
    }

    /// Population standard deviation over samples matching `keep`;
    /// `None` when fewer than `min_samples` match.
    pub fn std_dev_filtered<F>(&self, min_samples: usize, keep: F) -> Option<f64>
    where
        F: Fn(f64) -> bool,
    {
        let kept: Vec<f64> = self.samples.iter().copied().filter(|&s| keep(s)).collect();
        if kept.len() < min_samples {
            return None;
        }
        let mean = kept.iter().sum::<f64>() / kept.len() as f64;
        let variance = kept.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / kept.len() as f64;
        Some(variance.sqrt())
    }

    /// Count of adjacent pairs whose absolute delta exceeds `threshold`,
    /// considering only pairs where both samples match `keep`.
    pub fn adjacent_deltas_over<F>(&self, threshold: f64, keep: F) -> usize
    where
        F: Fn(f64) -> bool,
    {
        self.samples
            .iter()
            .zip(self.samples.iter().skip(1))
            .filter(|(&a, &b)| keep(a) && keep(b) && (b - a).abs() > threshold)
            .count()
    }

    /// Count of samples strictly below `threshold`.
    pub fn count_below(&self, threshold: f64) -> usize {
        self.samples.iter().filter(|&&s| s < threshold).count()
    }

    /// Largest sample in the window; `None` when empty.
    pub fn max(&self) -> Option<f64> {
        self.samples.iter().copied().fold(None, |acc, s| match acc {
            Some(m) if m >= s => Some(m),
            _ => Some(s),
        })
    }
}
