use hackgrade_core::QuestionBank;

use super::setup;
use crate::cli::args::CheckQuestionsArgs;
use crate::exit_codes::SUCCESS;

pub fn run(args: CheckQuestionsArgs) -> anyhow::Result<i32> {
    match QuestionBank::load(&args.questions) {
        Ok(bank) => {
            println!(
                "{}: {} question(s) OK",
                args.questions.display(),
                bank.len()
            );
            for id in bank.ids() {
                println!("  {id}");
            }
            Ok(SUCCESS)
        }
        Err(e) => Ok(setup::report(&e)),
    }
}
