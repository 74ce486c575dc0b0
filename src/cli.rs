//! CLI surface of the batch tool.
//!
//! Exit-code policy: a completed run is a success even when individual
//! nodes failed; only usage-level problems (bad options, a pattern that
//! does not resolve to an openable root) make the invocation fail.

use std::io::{self, Write};

use clap::{ArgAction, Parser, Subcommand};

use crate::{
    run_batch, BatchReport, DeleteOperation, JsonOperation, NodeTree, Operation, PathQuery,
    PrintOperation, PrintTreeOperation, Result, SetListOperation, SetOperation,
};

#[derive(Parser, Debug)]
#[command(
    name = "nbtpath",
    version,
    about = "Batch editor for NBT and region files",
    arg_required_else_help = true
)]
pub struct Cli {
    /// Debug output (repeat for more).
    #[arg(short = 'v', long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Set a scalar tag to a new value.
    Set {
        /// Path pattern (e.g. `world/region/r.0.0.mca/0.0/Level/Status`);
        /// `*` matches any one segment.
        path: String,
        /// New value, parsed according to the tag's current kind.
        #[arg(allow_hyphen_values = true)]
        value: String,
    },
    /// Delete matched tags or chunks.
    Delete {
        /// Path pattern.
        path: String,
    },
    /// Replace a list's elements.
    Setlist {
        /// Path pattern.
        path: String,
        /// Replacement values, parsed as the list's element kind.
        #[arg(allow_hyphen_values = true)]
        values: Vec<String>,
    },
    /// Print each matched node on one line.
    Print {
        /// Path pattern.
        path: String,
    },
    /// Print the subtree outline of each matched node.
    Printtree {
        /// Path pattern.
        path: String,
    },
    /// Export each matched node as JSON.
    Json {
        /// Path pattern.
        path: String,
    },
}

impl Command {
    fn pattern(&self) -> &str {
        match self {
            Command::Set { path, .. }
            | Command::Delete { path }
            | Command::Setlist { path, .. }
            | Command::Print { path }
            | Command::Printtree { path }
            | Command::Json { path } => path,
        }
    }

    fn operation(&self) -> Box<dyn Operation> {
        match self {
            Command::Set { value, .. } => Box::new(SetOperation::new(Some(value.clone()))),
            Command::Delete { .. } => Box::new(DeleteOperation),
            Command::Setlist { values, .. } => Box::new(SetListOperation::new(values.clone())),
            Command::Print { .. } => Box::new(PrintOperation),
            Command::Printtree { .. } => Box::new(PrintTreeOperation),
            Command::Json { .. } => Box::new(JsonOperation),
        }
    }
}

/// Run the selected command, writing per-node output and the outcome
/// report to stdout.
pub fn run(cli: Cli) -> Result<BatchReport> {
    let query = PathQuery::parse(cli.command.pattern())?;
    let op = cli.command.operation();
    let mut tree = NodeTree::new();

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let report = run_batch(&mut tree, &query, op.as_ref(), &mut out)?;
    for outcome in &report.outcomes {
        writeln!(out, "{}", outcome.line())?;
    }
    writeln!(out, "{}", report.summary())?;
    Ok(report)
}
