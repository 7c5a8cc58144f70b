use crate::cli::args::{Cli, Command};

pub async fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    match cli.cmd {
        Command::Grade(args) => super::grade::run(args).await,
        Command::Audit(args) => super::audit::run(args).await,
        Command::CheckQuestions(args) => super::check_questions::run(args),
    }
}
