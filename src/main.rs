mod cli;

use std::error::Error;

use clap::Parser;
use cli::Cli;

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    match cli.cmd {
        cli::Command::Plan(plan_args) => cli::plan::handle_plan_command(plan_args)?,
        cli::Command::Diff(diff_args) => cli::diff::handle_diff_command(diff_args)?,
        cli::Command::Structured(structured_args) => {
            cli::structured::handle_structured_command(structured_args)?
        }
    }

    Ok(())
}
