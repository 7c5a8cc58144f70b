//! Error types for the grading engine.

use std::path::PathBuf;

/// Grading errors.
#[derive(Debug, thiserror::Error)]
pub enum GradeError {
    /// No structured object could be recovered from model output.
    #[error("no valid JSON object found in model response: {snippet}")]
    Parse { snippet: String },

    /// Model backend kept failing after the retry budget was spent.
    #[error("model backend '{model}' failed after {attempts} attempts: {message}")]
    Backend {
        model: String,
        attempts: u32,
        message: String,
    },

    /// Every run of a self-consistency batch failed.
    #[error("all self-consistency runs failed ({runs} attempted): {last_error}")]
    Aggregation { runs: u32, last_error: String },

    /// Submission references a question the store does not know.
    #[error("question id '{question_id}' not found in questions file")]
    UnknownQuestion { question_id: String },

    /// Questions file could not be loaded.
    #[error("failed to load questions from {}: {message}", path.display())]
    QuestionStore { path: PathBuf, message: String },

    /// Invalid configuration.
    #[error("configuration error: {message}")]
    Config { message: String },

    /// Filesystem error outside the questions file.
    #[error("io error: {message}")]
    Io { message: String },

    /// A grading task panicked or was cancelled.
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl GradeError {
    /// Exit code for CLI.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::UnknownQuestion { .. } => 1,
            Self::Parse { .. } | Self::Backend { .. } | Self::Aggregation { .. } => 3,
            Self::QuestionStore { .. }
            | Self::Config { .. }
            | Self::Io { .. }
            | Self::Internal { .. } => 2,
        }
    }

    /// Whether a self-consistency batch may skip this run and keep going.
    pub fn is_recoverable_run_failure(&self) -> bool {
        matches!(self, Self::Parse { .. } | Self::Backend { .. })
    }

    pub(crate) fn parse(raw: &str) -> Self {
        const MAX_SNIPPET: usize = 120;
        let trimmed = raw.trim();
        let snippet = match trimmed.char_indices().nth(MAX_SNIPPET) {
            Some((idx, _)) => format!("{}...", &trimmed[..idx]),
            None => trimmed.to_string(),
        };
        Self::Parse { snippet }
    }
}

impl From<std::io::Error> for GradeError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: err.to_string(),
        }
    }
}

/// Result type for grading operations.
pub type GradeResult<T> = Result<T, GradeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_failures_are_recoverable() {
        assert!(GradeError::parse("nope").is_recoverable_run_failure());
        assert!(GradeError::Backend {
            model: "m".into(),
            attempts: 5,
            message: "503".into()
        }
        .is_recoverable_run_failure());
        assert!(!GradeError::UnknownQuestion {
            question_id: "Q9".into()
        }
        .is_recoverable_run_failure());
        assert!(!GradeError::Aggregation {
            runs: 3,
            last_error: "x".into()
        }
        .is_recoverable_run_failure());
    }

    #[test]
    fn test_parse_snippet_is_truncated() {
        let raw = "x".repeat(500);
        match GradeError::parse(&raw) {
            GradeError::Parse { snippet } => {
                assert!(snippet.ends_with("..."));
                assert_eq!(snippet.len(), 123);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_question_message_names_id() {
        let err = GradeError::UnknownQuestion {
            question_id: "Q42".into(),
        };
        assert!(err.to_string().contains("Q42"));
        assert_eq!(err.exit_code(), 1);
    }
}
