use anyhow::Context;
use hackgrade_core::{run_injection_audit, InjectionAuditReport, QuestionStore};
use serde::Serialize;

use super::setup;
use crate::cli::args::AuditArgs;
use crate::exit_codes::SUCCESS;

#[derive(Serialize)]
struct AuditFile<'a> {
    generated_at: String,
    suspicious_count: usize,
    error_count: usize,
    #[serde(flatten)]
    report: &'a InjectionAuditReport,
}

pub async fn run(args: AuditArgs) -> anyhow::Result<i32> {
    let store = match QuestionStore::open(&args.questions) {
        Ok(store) => store,
        Err(e) => return Ok(setup::report(&e)),
    };
    let grading = match setup::prepare(&args.grading) {
        Ok(grading) => grading,
        Err(e) => return Ok(setup::report(&e)),
    };

    let questions = store.snapshot().await;
    let report = match run_injection_audit(
        &grading.evaluator,
        &questions,
        &args.question_id,
        &grading.options,
    )
    .await
    {
        Ok(report) => report,
        Err(e) => return Ok(setup::report(&e)),
    };

    for outcome in &report.results {
        match (&outcome.scores, &outcome.error) {
            (Some(s), _) => println!(
                "[{}] {}/{}/{} -> {} {}",
                if outcome.suspicious { "SUSPICIOUS" } else { "OK" },
                s.completeness,
                s.conciseness,
                s.correctness,
                s.final_score,
                outcome.test
            ),
            (None, Some(err)) => println!("[FAILED] {}: {}", outcome.test, err),
            (None, None) => println!("[FAILED] {}", outcome.test),
        }
    }

    let file = AuditFile {
        generated_at: chrono::Utc::now().to_rfc3339(),
        suspicious_count: report.suspicious_count(),
        error_count: report.error_count(),
        report: &report,
    };
    let json = serde_json::to_string_pretty(&file)?;
    std::fs::write(&args.out, json)
        .with_context(|| format!("failed to write {}", args.out.display()))?;

    println!(
        "{} payload(s), {} suspicious, {} failed. Report written to {}",
        report.results.len(),
        file.suspicious_count,
        file.error_count,
        args.out.display()
    );
    Ok(SUCCESS)
}
