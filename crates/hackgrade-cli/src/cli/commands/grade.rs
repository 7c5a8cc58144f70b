use std::path::{Path, PathBuf};

use anyhow::Context;
use hackgrade_core::{GradeError, GradeResult, QuestionStore, Submission, SubmissionResult};
use tracing::{error, info, warn};

use super::setup;
use crate::cli::args::GradeArgs;
use crate::exit_codes::{GRADING_FAILED, SUCCESS};

pub async fn run(args: GradeArgs) -> anyhow::Result<i32> {
    let store = match QuestionStore::open(&args.questions) {
        Ok(store) => store,
        Err(e) => return Ok(setup::report(&e)),
    };
    let grading = match setup::prepare(&args.grading) {
        Ok(grading) => grading,
        Err(e) => return Ok(setup::report(&e)),
    };

    let files = match submission_files(&args.submissions) {
        Ok(files) => files,
        Err(e) => return Ok(setup::report(&e)),
    };
    if let Err(e) = std::fs::create_dir_all(&args.out_dir) {
        return Ok(setup::report(&GradeError::Io {
            message: format!("failed to create {}: {e}", args.out_dir.display()),
        }));
    }

    let questions = store.snapshot().await;
    info!(
        questions = %store.path().display(),
        submissions = files.len(),
        "grading submissions"
    );
    let mut graded = 0usize;
    let mut failed = 0usize;
    let mut exit_code = SUCCESS;

    for path in &files {
        let file = path.display().to_string();
        let submission = match read_submission(path) {
            Ok(s) => s,
            Err(e) => {
                warn!(file = %file, error = %format!("{e:#}"), "skipping unreadable submission");
                failed += 1;
                exit_code = exit_code.max(GRADING_FAILED);
                continue;
            }
        };

        match grading
            .evaluator
            .evaluate_submission(&questions, &submission, &grading.options)
            .await
        {
            Ok(result) => {
                let out = write_result(&args.out_dir, &result)?;
                info!(file = %file, out = %out.display(), "results written");
                graded += 1;
            }
            Err(e) => {
                error!(file = %file, error = %e, "submission failed");
                failed += 1;
                exit_code = exit_code.max(e.exit_code());
            }
        }
    }

    println!(
        "Graded {} submission(s), {} failed. Results written to {}",
        graded,
        failed,
        args.out_dir.display()
    );
    Ok(exit_code)
}

/// A single file, or every `*.json` in a directory sorted by file name.
fn submission_files(path: &Path) -> GradeResult<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    let entries = std::fs::read_dir(path).map_err(|e| GradeError::Io {
        message: format!("failed to read submissions from {}: {e}", path.display()),
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let p = entry?.path();
        let is_json = p
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));
        if p.is_file() && is_json {
            files.push(p);
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

fn read_submission(path: &Path) -> anyhow::Result<Submission> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&content).context("invalid submission JSON")
}

fn write_result(out_dir: &Path, result: &SubmissionResult) -> anyhow::Result<PathBuf> {
    let out = out_dir.join(format!("{}.json", file_stem(&result.participant_id)));
    let json = serde_json::to_string_pretty(result)?;
    std::fs::write(&out, json).with_context(|| format!("failed to write {}", out.display()))?;
    Ok(out)
}

/// Participant ids come from submissions; keep them inside the output directory.
fn file_stem(participant_id: &str) -> String {
    let stem: String = participant_id
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    match stem.trim_matches('.') {
        "" => "unknown".to_string(),
        s => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_stem_keeps_ids_in_out_dir() {
        assert_eq!(file_stem("TeamA"), "TeamA");
        assert_eq!(file_stem("../../etc/passwd"), "_.._etc_passwd");
        assert_eq!(file_stem(".."), "unknown");
        assert_eq!(file_stem("team one"), "team_one");
    }

    #[test]
    fn test_missing_submissions_dir_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = submission_files(&dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, GradeError::Io { .. }));
        assert_eq!(err.exit_code(), crate::exit_codes::CONFIG_ERROR);
    }

    #[test]
    fn test_submission_files_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.json", "a.JSON", "notes.txt", "c.json"] {
            std::fs::write(dir.path().join(name), "{}").unwrap();
        }
        let names: Vec<String> = submission_files(dir.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.JSON", "b.json", "c.json"]);
    }
}
