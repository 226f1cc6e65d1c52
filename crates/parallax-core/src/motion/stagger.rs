//! L4 Atomic Layer: Stagger plans
//!
//! Computes per-child start delays so a list of siblings animates in order
//! rather than all at once: `delay[i] = base_delay + i * increment`.

use serde::{Deserialize, Serialize};

/// Delays are quantised to this many steps per second
const DELAY_RESOLUTION: f64 = 1e9;

/// Stateless description of a staggered entrance
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StaggerPlan {
    pub child_count: usize,
    pub base_delay: f64,
    pub increment: f64,
}

impl StaggerPlan {
    pub fn new(child_count: usize, base_delay: f64, increment: f64) -> Self {
        Self {
            child_count,
            base_delay,
            increment,
        }
    }

    /// Start delay for child `index`, `None` past the end or for non-finite input
    pub fn delay(&self, index: usize) -> Option<f64> {
        if index >= self.child_count || !self.base_delay.is_finite() || !self.increment.is_finite()
        {
            return None;
        }
        Some(quantise(self.base_delay + index as f64 * self.increment))
    }

    /// Delays for every child in order
    pub fn delays(&self) -> Vec<f64> {
        (0..self.child_count).filter_map(|i| self.delay(i)).collect()
    }

    /// Same timing for a different number of children
    pub fn with_child_count(self, child_count: usize) -> Self {
        Self {
            child_count,
            ..self
        }
    }
}

/// Per-child delays for `child_count` siblings; empty for a negative count
pub fn stagger(child_count: i64, base_delay: f64, increment: f64) -> Vec<f64> {
    match usize::try_from(child_count) {
        Ok(count) => StaggerPlan::new(count, base_delay, increment).delays(),
        Err(_) => Vec::new(),
    }
}

/// Snap to the delay grid so `0.1 + 0.05` reads back as `0.15`
fn quantise(delay: f64) -> f64 {
    (delay * DELAY_RESOLUTION).round() / DELAY_RESOLUTION
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_is_exact() {
        assert_eq!(stagger(5, 0.1, 0.05), vec![0.10, 0.15, 0.20, 0.25, 0.30]);
    }

    #[test]
    fn test_delay_children_pattern() {
        let plan = StaggerPlan::new(4, 0.2, 0.1);
        assert_eq!(plan.delays(), vec![0.2, 0.3, 0.4, 0.5]);
        assert_eq!(plan.delay(4), None);
    }

    #[test]
    fn test_negative_and_empty_counts() {
        assert!(stagger(-1, 0.1, 0.1).is_empty());
        assert!(stagger(0, 0.1, 0.1).is_empty());
    }

    #[test]
    fn test_non_finite_timing_gives_nothing() {
        assert!(stagger(3, f64::NAN, 0.1).is_empty());
        assert!(stagger(3, 0.0, f64::INFINITY).is_empty());
    }

    #[test]
    fn test_recompute_on_count_change() {
        let plan = StaggerPlan::new(2, 0.0, 0.15).with_child_count(3);
        assert_eq!(plan.delays(), vec![0.0, 0.15, 0.3]);
    }
}
