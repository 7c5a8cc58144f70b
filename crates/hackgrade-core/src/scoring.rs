//! Weighted combination of the three criteria into one score.

use serde::{Deserialize, Serialize};

use crate::model::{clamp_criterion, CriterionScores};

const DEFAULT_COMPLETENESS: f64 = 0.3;
const DEFAULT_CONCISENESS: f64 = 0.2;
const DEFAULT_CORRECTNESS: f64 = 0.5;

/// Relative criterion weights as configured. Normalised on use.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Weights {
    #[serde(default = "default_completeness")]
    pub completeness: f64,
    #[serde(default = "default_conciseness")]
    pub conciseness: f64,
    #[serde(default = "default_correctness")]
    pub correctness: f64,
}

fn default_completeness() -> f64 {
    DEFAULT_COMPLETENESS
}

fn default_conciseness() -> f64 {
    DEFAULT_CONCISENESS
}

fn default_correctness() -> f64 {
    DEFAULT_CORRECTNESS
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            completeness: DEFAULT_COMPLETENESS,
            conciseness: DEFAULT_CONCISENESS,
            correctness: DEFAULT_CORRECTNESS,
        }
    }
}

impl Weights {
    pub fn new(completeness: f64, conciseness: f64, correctness: f64) -> Self {
        Self {
            completeness,
            conciseness,
            correctness,
        }
    }

    /// Weights scaled to sum to 1.0.
    ///
    /// Any non-positive or non-finite weight discards the whole set in favour
    /// of the defaults.
    pub fn normalized(&self) -> [f64; 3] {
        let raw = [self.completeness, self.conciseness, self.correctness];
        if raw.iter().any(|w| !w.is_finite() || *w <= 0.0) {
            return [DEFAULT_COMPLETENESS, DEFAULT_CONCISENESS, DEFAULT_CORRECTNESS];
        }
        let total: f64 = raw.iter().sum();
        raw.map(|w| w / total)
    }
}

/// Weighted score rounded to 2 decimals, within `[0, 5]`.
pub fn combine(criteria: &CriterionScores, weights: &Weights) -> f64 {
    let [wc, wz, wr] = weights.normalized();
    let score = wc * clamp_criterion(criteria.completeness)
        + wz * clamp_criterion(criteria.conciseness)
        + wr * clamp_criterion(criteria.correctness);
    clamp_criterion(round2(score))
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
