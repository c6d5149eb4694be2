//! notecore - command-line harness for exercising the expression engine.
//! Not a library module itself; it exists purely to give the library
//! crates a runnable entry point for manual testing and demos.

mod cli_args;
mod commands;
mod error;

use std::process::ExitCode;

use clap::Parser;
use colored::Colorize;

use cli_args::{Cli, Commands};

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Load { file } => commands::load(&file),
        Commands::Eval { file } => commands::eval(&file),
        Commands::Set { file, note_id, prop, expr } => commands::set(&file, note_id, &prop, &expr),
        Commands::DumpGraph { file } => commands::dump_graph(&file),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{} {err}", "error:".red().bold());
            ExitCode::FAILURE
        }
    }
}
