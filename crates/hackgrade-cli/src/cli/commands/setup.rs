use std::sync::Arc;

use hackgrade_core::evaluator::HEURISTIC_MODEL;
use hackgrade_core::{
    AggregationSettings, EvaluationOptions, FakeBackend, GradeError, GradeResult, GraderConfig,
    ModelBackend, OpenAiBackend, SubmissionEvaluator,
};
use tracing::{error, info};

use crate::cli::args::{BackendKind, GradingArgs};

const DEFAULT_FAKE_JUDGMENT: &str = concat!(
    r#"{"completeness": 3, "conciseness": 3, "correctness": 3, "#,
    r#""comment": "offline judgment"}"#
);

pub struct Grading {
    pub evaluator: SubmissionEvaluator,
    pub options: EvaluationOptions,
}

/// Config file and environment first, then command-line flags.
pub fn resolve_config(args: &GradingArgs) -> GradeResult<GraderConfig> {
    let mut config = GraderConfig::load(args.config.as_deref())?;
    if args.use_llm {
        config.use_llm = true;
    }
    if args.no_llm {
        config.use_llm = false;
    }
    if let Some(model) = &args.model {
        config.model = model.clone();
    }
    if let Some(model) = &args.secondary_model {
        config.secondary_model = Some(model.clone());
    }
    if let Some(workers) = args.workers {
        config.workers = workers;
    }
    if let Some(runs) = args.sc_runs {
        config.sc_runs = runs;
    }
    config.validate()?;
    Ok(config)
}

pub fn prepare(args: &GradingArgs) -> GradeResult<Grading> {
    let config = resolve_config(args)?;
    let options = EvaluationOptions::from_config(&config);

    let evaluator = if config.use_llm {
        let backend: Arc<dyn ModelBackend> = match args.backend {
            BackendKind::Openai => Arc::new(OpenAiBackend::from_config(&config)?),
            BackendKind::Fake => Arc::new(FakeBackend::new().with_response(
                args.fake_response
                    .clone()
                    .unwrap_or_else(|| DEFAULT_FAKE_JUDGMENT.to_string()),
            )),
        };
        SubmissionEvaluator::from_config(&config, backend)?
    } else {
        SubmissionEvaluator::heuristic_only(AggregationSettings::from_config(&config))
    };

    info!(
        provider = evaluator.provider_name().unwrap_or(HEURISTIC_MODEL),
        use_llm = options.use_llm,
        models = ?options.models,
        workers = options.workers,
        sc_runs = options.sc_runs,
        max_concurrent_calls = config.max_concurrent_calls,
        "grading configured"
    );
    Ok(Grading { evaluator, options })
}

/// Log `err` and map it to the process exit code.
pub fn report(err: &GradeError) -> i32 {
    error!("{err}");
    err.exit_code()
}
