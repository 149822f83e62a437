//! Dataflow notebook command-line tools.
//!
//! Provides the `dfnb` binary:
//!
//! - `shorten <long-id>` prints the short id of a cell id;
//! - `widen <counter>` prints the short id an execution counter decodes to;
//! - `replay --transcript <file>` applies recorded execute replies to a fresh
//!   dependency graph and prints the resulting snapshot as JSON.
//!
//! Replay uses the same merge operations as the server's coordinator, so a
//! transcript captured from a live session reproduces its graph offline.

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use serde::Deserialize;

use dfnb_core::{shorten, widen, CoreError, DependencyGraph, GraphSnapshot};
use dfnb_server::backend::{ExecuteReplyContent, ReplyStatus};

/// Dataflow notebook tools.
#[derive(Parser)]
#[command(name = "dfnb", about = "Dataflow notebook dependency tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Print the short id of a long cell id.
    Shorten {
        /// Long cell identifier, e.g. a UUID.
        long_id: String,
    },
    /// Print the short id an execution counter decodes to.
    Widen {
        counter: i64,
    },
    /// Rebuild a dependency graph from recorded replies.
    Replay {
        /// JSON array of `{ cell, code, reply }` entries.
        #[arg(short, long)]
        transcript: PathBuf,
    },
}

/// One recorded execution.
#[derive(Debug, Deserialize)]
struct TranscriptEntry {
    /// Long or short id of the executed cell.
    cell: String,
    #[serde(default)]
    code: String,
    /// Content of the execute reply.
    reply: ExecuteReplyContent,
}

fn main() {
    let cli = Cli::parse();

    let exit_code = match cli.command {
        Commands::Shorten { long_id } => match shorten(&long_id) {
            Ok(short) => {
                println!("{}", short);
                0
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                1
            }
        },
        Commands::Widen { counter } => match widen(counter) {
            Some(short) => {
                println!("{}", short);
                0
            }
            None => {
                eprintln!("Error: counter {} does not encode a cell id", counter);
                1
            }
        },
        Commands::Replay { transcript } => run_replay(&transcript),
    };
    process::exit(exit_code);
}

/// Execute the replay subcommand.
///
/// Returns exit code: 0 = success, 1 = invalid transcript, 3 = I/O error.
fn run_replay(path: &Path) -> i32 {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) => {
            eprintln!("Error: failed to read '{}': {}", path.display(), e);
            return 3;
        }
    };

    let entries: Vec<TranscriptEntry> = match serde_json::from_str(&raw) {
        Ok(entries) => entries,
        Err(e) => {
            eprintln!("Error: invalid transcript: {}", e);
            return 1;
        }
    };

    let snapshot = match replay(entries) {
        Ok(snapshot) => snapshot,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };

    match serde_json::to_string_pretty(&snapshot) {
        Ok(json) => {
            println!("{}", json);
            0
        }
        Err(e) => {
            eprintln!("Error: failed to render snapshot: {}", e);
            1
        }
    }
}

/// Applies each successful reply in order. Failed replies never touch the
/// graph.
fn replay(entries: Vec<TranscriptEntry>) -> Result<GraphSnapshot, CoreError> {
    let mut graph = DependencyGraph::new();
    let mut order = Vec::new();

    for (i, entry) in entries.into_iter().enumerate() {
        let cell = shorten(&entry.cell)?;
        if !order.contains(&cell) {
            order.push(cell);
        }
        if entry.reply.status != ReplyStatus::Ok {
            eprintln!("skipping entry {} for {}: reply status {:?}", i, cell, entry.reply.status);
            continue;
        }

        let updates = entry.reply.downstream_updates()?;
        let delta = entry.reply.graph_delta();
        graph.update_cell_contents([(cell, entry.code)]);
        graph.update_graph(cell, &delta);
        if let Some(updates) = updates {
            graph.update_down_links(&updates);
        }
    }

    graph.update_order(order);
    Ok(graph.snapshot())
}
