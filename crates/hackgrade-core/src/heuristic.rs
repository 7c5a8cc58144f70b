//! Deterministic token-overlap scorer used when no model backend is wanted.

use std::collections::BTreeSet;

use crate::model::{clamp_criterion, CriterionScores, MAX_CRITERION};
use crate::scoring::round2;

fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|t| t.trim_matches(|c: char| c.is_ascii_punctuation()).to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Score `answer` against `expected` without calling a model.
///
/// Completeness is expected-token recall, correctness is Jaccard similarity and
/// conciseness rewards answers no longer than the reference.
pub fn heuristic_scores(expected: &str, answer: &str) -> CriterionScores {
    let exp_list = tokenize(expected);
    let ans_list = tokenize(answer);
    let exp: BTreeSet<&str> = exp_list.iter().map(String::as_str).collect();
    let ans: BTreeSet<&str> = ans_list.iter().map(String::as_str).collect();

    let shared = exp.intersection(&ans).count() as f64;

    let completeness = if exp.is_empty() {
        MAX_CRITERION
    } else {
        shared / exp.len() as f64 * MAX_CRITERION
    };

    let conciseness = if ans_list.is_empty() {
        0.0
    } else {
        let ratio = exp_list.len() as f64 / ans_list.len() as f64;
        if ratio >= 1.0 {
            MAX_CRITERION
        } else {
            ratio * MAX_CRITERION
        }
    };

    let union = exp.union(&ans).count();
    let correctness = if union == 0 {
        MAX_CRITERION
    } else {
        shared / union as f64 * MAX_CRITERION
    };

    let missing: Vec<&str> = exp.difference(&ans).copied().collect();
    let extra: Vec<&str> = ans.difference(&exp).copied().collect();
    let mut parts = Vec::new();
    if !missing.is_empty() {
        parts.push(format!("Missing: {}", missing.join(", ")));
    }
    if !extra.is_empty() {
        parts.push(format!("Extra: {}", extra.join(", ")));
    }
    let comment = if parts.is_empty() {
        "Good answer".to_string()
    } else {
        parts.join("; ")
    };

    CriterionScores::new(
        round2(clamp_criterion(completeness)),
        round2(clamp_criterion(conciseness)),
        round2(clamp_criterion(correctness)),
        comment,
    )
}
