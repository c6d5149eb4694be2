//! CLI argument definitions, kept separate from `main.rs` so dispatch stays
//! focused.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "notecore")]
#[command(author, version, about = "Exercising harness for the notecore expression engine", long_about = None)]
#[command(propagate_version = true)]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Load a module JSON file and report whether it parses and compiles.
    Load {
        /// Path to the module JSON file
        file: String,
    },

    /// Load a module, evaluate it, and print the resulting cache as a table.
    Eval {
        /// Path to the module JSON file
        file: String,
    },

    /// Apply one `set_expression`, re-evaluate, and print the updated cache.
    Set {
        /// Path to the module JSON file
        file: String,
        /// Id of the note to update
        note_id: u16,
        /// Property name: startTime/t, duration/d, frequency/f, tempo,
        /// beatsPerMeasure/bpm
        prop: String,
        /// New source expression (DSL or legacy syntax)
        expr: String,
    },

    /// Print the dependency graph's forward and inverted edges.
    DumpGraph {
        /// Path to the module JSON file
        file: String,
    },
}
