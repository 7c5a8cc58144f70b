//! Self-consistency: several independently phrased judgments per answer,
//! combined by per-criterion median.
//!
//! Failed runs are skipped as long as one run succeeds. The median keeps a
//! single hijacked or hallucinated run from dragging the result the way a mean
//! would. Aggregation is a pure function of the successful runs in run-index
//! order, so completion order of concurrent calls never changes the outcome.

use futures::stream::{self, StreamExt};
use tracing::{debug, warn};

use crate::caller::BackendCaller;
use crate::config::{clamp_runs, GraderConfig};
use crate::error::{GradeError, GradeResult};
use crate::model::{AggregatedEvaluation, CriterionScores, EvaluationRequest, VariantScore};
use crate::parse::parse_response;
use crate::prompt::build_request_prompt;
use crate::scoring::{combine, Weights};

/// Thresholds and fan-out for one aggregation.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregationSettings {
    pub weights: Weights,
    pub inconsistency_threshold: f64,
    pub suspicious_threshold: f64,
    pub variant_workers: usize,
}

impl Default for AggregationSettings {
    fn default() -> Self {
        Self::from_config(&GraderConfig::default())
    }
}

impl AggregationSettings {
    pub fn from_config(config: &GraderConfig) -> Self {
        Self {
            weights: config.weights,
            inconsistency_threshold: config.inconsistency_threshold,
            suspicious_threshold: config.suspicious_threshold,
            variant_workers: config.effective_variant_workers(),
        }
    }
}

/// Median with the usual even-length rule (mean of the two middle values).
///
/// Returns `None` for an empty slice.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    Some(if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    })
}

/// Index of the run closest to the medians (sum of absolute deviations).
/// Ties go to the lowest index.
pub fn representative_index(runs: &[VariantScore], medians: [f64; 3]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (idx, run) in runs.iter().enumerate() {
        let distance: f64 = run
            .scores
            .triple()
            .iter()
            .zip(medians.iter())
            .map(|(v, m)| (v - m).abs())
            .sum();
        match best {
            Some((_, d)) if distance >= d => {}
            _ => best = Some((idx, distance)),
        }
    }
    best.map(|(idx, _)| idx)
}

fn spread(values: &[f64]) -> f64 {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    if max.is_finite() && min.is_finite() {
        max - min
    } else {
        0.0
    }
}

/// Combine successful runs, given in run-index order.
///
/// Fails with [`GradeError::Aggregation`] when `runs` is empty.
pub fn aggregate_runs(
    runs: Vec<VariantScore>,
    runs_requested: u32,
    settings: &AggregationSettings,
) -> GradeResult<AggregatedEvaluation> {
    if runs.is_empty() {
        return Err(GradeError::Aggregation {
            runs: runs_requested,
            last_error: "no successful runs".to_string(),
        });
    }

    let column = |pick: fn(&CriterionScores) -> f64| -> Vec<f64> {
        runs.iter().map(|r| pick(&r.scores)).collect()
    };
    let completeness = column(|s| s.completeness);
    let conciseness = column(|s| s.conciseness);
    let correctness = column(|s| s.correctness);

    let medians = [
        median(&completeness).unwrap_or_default(),
        median(&conciseness).unwrap_or_default(),
        median(&correctness).unwrap_or_default(),
    ];

    let max_spread = [&completeness, &conciseness, &correctness]
        .into_iter()
        .map(|c| spread(c))
        .fold(0.0, f64::max);
    let inconsistent = max_spread > settings.inconsistency_threshold;
    let suspicious = medians.iter().all(|m| *m >= settings.suspicious_threshold);
    let runs_succeeded = runs.len() as u32;
    let degraded = runs_succeeded.saturating_mul(2) < runs_requested;

    let comment = representative_index(&runs, medians)
        .map(|idx| runs[idx].scores.comment.clone())
        .unwrap_or_default();

    let criteria = CriterionScores::new(medians[0], medians[1], medians[2], comment);
    let score = combine(&criteria, &settings.weights);

    debug!(
        runs_requested,
        runs_succeeded,
        max_spread,
        inconsistent,
        suspicious,
        score,
        "aggregated self-consistency runs"
    );

    Ok(AggregatedEvaluation {
        criteria,
        score,
        inconsistent,
        needs_manual_review: inconsistent || suspicious || degraded,
        suspicious,
        runs_requested,
        runs_succeeded,
        variant_scores: runs,
    })
}

/// Grades one answer through the backend.
#[derive(Clone)]
pub struct SelfConsistencyEvaluator {
    caller: BackendCaller,
    settings: AggregationSettings,
}

impl SelfConsistencyEvaluator {
    pub fn new(caller: BackendCaller, settings: AggregationSettings) -> Self {
        Self { caller, settings }
    }

    pub fn settings(&self) -> &AggregationSettings {
        &self.settings
    }

    pub fn caller(&self) -> &BackendCaller {
        &self.caller
    }

    /// One variant-0 call. Backend and parse failures propagate.
    pub async fn evaluate_single(
        &self,
        req: &EvaluationRequest,
        model: &str,
    ) -> GradeResult<AggregatedEvaluation> {
        let scores = self.run_variant(req, model, 0).await?;
        aggregate_runs(
            vec![VariantScore {
                model: model.to_string(),
                variant: 0,
                scores,
            }],
            1,
            &self.settings,
        )
    }

    /// Run `runs` variants (clamped to 1..=9) against every model in `models`
    /// and aggregate all successful runs as one pool.
    pub async fn evaluate_self_consistent(
        &self,
        req: &EvaluationRequest,
        models: &[String],
        runs: u32,
    ) -> GradeResult<AggregatedEvaluation> {
        let runs = clamp_runs(runs);
        let jobs: Vec<(String, u32)> = models
            .iter()
            .flat_map(|m| (0..runs).map(move |v| (m.clone(), v)))
            .collect();
        let runs_requested = jobs.len() as u32;
        if runs_requested == 0 {
            return Err(GradeError::Config {
                message: "at least one model is required".to_string(),
            });
        }

        let outcomes: Vec<(String, u32, GradeResult<CriterionScores>)> = stream::iter(jobs)
            .map(|(model, variant)| async move {
                let outcome = self.run_variant(req, &model, variant).await;
                (model, variant, outcome)
            })
            .buffered(self.settings.variant_workers.max(1))
            .collect()
            .await;

        let mut successes = Vec::with_capacity(outcomes.len());
        let mut last_error = None;
        for (model, variant, outcome) in outcomes {
            match outcome {
                Ok(scores) => successes.push(VariantScore {
                    model,
                    variant,
                    scores,
                }),
                Err(e) if e.is_recoverable_run_failure() => {
                    warn!(
                        question_id = %req.question_id,
                        model = %model,
                        variant = variant,
                        error = %e,
                        "self-consistency run failed; skipping"
                    );
                    last_error = Some(e.to_string());
                }
                Err(e) => return Err(e),
            }
        }

        if successes.is_empty() {
            return Err(GradeError::Aggregation {
                runs: runs_requested,
                last_error: last_error.unwrap_or_else(|| "unknown failure".to_string()),
            });
        }

        aggregate_runs(successes, runs_requested, &self.settings)
    }

    async fn run_variant(
        &self,
        req: &EvaluationRequest,
        model: &str,
        variant: u32,
    ) -> GradeResult<CriterionScores> {
        let prompt = build_request_prompt(variant as usize, req);
        let raw = self.caller.call(&prompt, model).await?;
        parse_response(&raw)
    }
}
