use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "hackgrade",
    version,
    about = "Grade free-text hackathon answers with self-consistent LLM scoring"
)]
pub struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Grade every submission file and write per-participant results
    Grade(GradeArgs),
    /// Grade a catalogue of prompt-injection payloads against one question
    Audit(AuditArgs),
    /// Validate a questions file
    CheckQuestions(CheckQuestionsArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackendKind {
    Openai,
    /// Offline backend returning a fixed judgment
    Fake,
}

/// Options shared by every command that grades.
#[derive(Args, Debug, Clone)]
pub struct GradingArgs {
    /// YAML config file
    #[arg(long, env = "HACKGRADE_CONFIG")]
    pub config: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = BackendKind::Openai)]
    pub backend: BackendKind,

    /// Judgment returned by the fake backend
    #[arg(long, env = "HACKGRADE_FAKE_RESPONSE")]
    pub fake_response: Option<String>,

    /// Grade with the model backend
    #[arg(long, conflicts_with = "no_llm")]
    pub use_llm: bool,

    /// Grade with the token-overlap heuristic only
    #[arg(long)]
    pub no_llm: bool,

    #[arg(long)]
    pub model: Option<String>,

    /// Second model; its runs are pooled with the primary model's
    #[arg(long)]
    pub secondary_model: Option<String>,

    /// Answers graded concurrently (1-10)
    #[arg(long)]
    pub workers: Option<usize>,

    /// Self-consistency runs per answer (1-9)
    #[arg(long)]
    pub sc_runs: Option<u32>,
}

#[derive(Args, Debug, Clone)]
pub struct GradeArgs {
    #[arg(long)]
    pub questions: PathBuf,

    /// Submission file, or directory of `*.json` submissions
    #[arg(long)]
    pub submissions: PathBuf,

    #[arg(long)]
    pub out_dir: PathBuf,

    #[command(flatten)]
    pub grading: GradingArgs,
}

#[derive(Args, Debug, Clone)]
pub struct AuditArgs {
    #[arg(long)]
    pub questions: PathBuf,

    #[arg(long, default_value = "Q2")]
    pub question_id: String,

    /// Report path
    #[arg(long, default_value = "injection_audit.json")]
    pub out: PathBuf,

    #[command(flatten)]
    pub grading: GradingArgs,
}

#[derive(Args, Debug, Clone)]
pub struct CheckQuestionsArgs {
    #[arg(long)]
    pub questions: PathBuf,
}
