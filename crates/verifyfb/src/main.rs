mod cli;
mod dumps;
mod run;
mod verify;

use std::process::ExitCode;

use anyhow::Result;
use cli::Command;

fn main() -> Result<ExitCode> {
    let cli = cli::parse();
    run::initialise_tracing();

    match cli.command {
        Command::Verify(args) => run::verify(args),
    }
}
