use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

mod run;

pub use run::run;

const DEFAULT_SERVER: &str = "http://localhost:3000";


#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Config(#[from] crate::config::Error),
    #[error(transparent)]
    Store(#[from] crate::error::Error),
    #[error(transparent)]
    Client(#[from] crate::client::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}


#[derive(Debug, Parser)]
#[command(name = "mindtimer", version, about = "Turn a free-form todo list into timed tasks")]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,
    #[command(subcommand)]
    pub command: Command,
}


#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP server
    Serve {
        #[arg(short, long, default_value = "0.0.0.0")]
        bind: String,
        #[arg(short, long, default_value_t = 3000)]
        port: u16,
        /// SQLite database file, overriding the config file
        #[arg(short, long)]
        database: Option<PathBuf>,
        /// YAML config file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Send a todo list to the server for grooming
    Groom {
        #[arg(short, long)]
        name: String,
        /// File holding the todo text, or - for stdin
        #[arg(short, long)]
        file: PathBuf,
        #[arg(long, default_value = "")]
        context: String,
        #[arg(short, long, env = "MINDTIMER_SERVER", default_value = DEFAULT_SERVER)]
        server: String,
    },
    /// Show a task list with its tasks
    Show {
        id: i64,
        #[arg(short, long, env = "MINDTIMER_SERVER", default_value = DEFAULT_SERVER)]
        server: String,
    },
    /// Show what each task of a list depends on
    Dependencies {
        id: i64,
        #[arg(short, long, env = "MINDTIMER_SERVER", default_value = DEFAULT_SERVER)]
        server: String,
    },
    /// Compute the timeline of a task list
    Timeline {
        id: i64,
        /// sequential, parallel or dependency
        #[arg(long)]
        strategy: Option<String>,
        #[arg(short, long, env = "MINDTIMER_SERVER", default_value = DEFAULT_SERVER)]
        server: String,
    },
    /// Mark a task as completed
    Complete {
        task_id: String,
        #[arg(short, long, env = "MINDTIMER_SERVER", default_value = DEFAULT_SERVER)]
        server: String,
    },
    /// Delete every task and task list
    Reset {
        #[arg(short, long, env = "MINDTIMER_SERVER", default_value = DEFAULT_SERVER)]
        server: String,
    },
}
