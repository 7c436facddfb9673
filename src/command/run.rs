use clap::Parser;
use serde::Serialize;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use crate::client::Client;
use crate::command::{Cli, Command, Error};
use crate::config::Config;
use crate::groom::Groomer;
use crate::schedule::Strategy;
use crate::server::Server;
use crate::store::Store;
use crate::tasks::ProcessTodo;


pub async fn run() -> Result<(), Error> {
    let args = Cli::parse();
    init_tracing(args.verbose);

    match args.command {
        Command::Serve { bind, port, database, config } => {
            serve(bind, port, database, config).await?;
        }
        Command::Groom { name, file, context, server } => {
            let todo = ProcessTodo {
                task_list_name: name,
                todo_text: read_todo(&file)?,
                context,
            };
            print(&Client::new(server).groom(&todo).await?)?;
        }
        Command::Show { id, server } => {
            print(&Client::new(server).task_list(id).await?)?;
        }
        Command::Dependencies { id, server } => {
            print(&Client::new(server).dependencies(id).await?)?;
        }
        Command::Timeline { id, strategy, server } => {
            let strategy = strategy.as_deref().map(Strategy::parse).transpose()?;
            print(&Client::new(server).timeline(id, strategy).await?)?;
        }
        Command::Complete { task_id, server } => {
            print(&Client::new(server).complete(&task_id).await?)?;
        }
        Command::Reset { server } => {
            print(&Client::new(server).reset().await?)?;
        }
    }
    Ok(())
}


fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}


fn read_todo(file: &Path) -> Result<String, Error> {
    if file == Path::new("-") {
        let mut text = String::new();
        std::io::stdin().read_to_string(&mut text)?;
        return Ok(text);
    }
    Ok(std::fs::read_to_string(file)?)
}


fn print<T: Serialize>(value: &T) -> Result<(), Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}


async fn serve(
    bind: String,
    port: u16,
    database: Option<PathBuf>,
    config: Option<PathBuf>
) -> Result<(), Error> {
    let mut config = Config::load(config.as_deref())?;
    if let Some(database) = database {
        config.database = database;
    }

    let store = Store::open(&config.database)?;
    let groomer = match Groomer::from_config(&config) {
        Ok(groomer) => Some(groomer),
        Err(err) => {
            tracing::warn!(error = %err, "grooming disabled");
            None
        }
    };

    let addr = format!("{}:{}", bind, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, database = %config.database.display(), "listening");

    let server = Arc::new(Server::new(store, groomer));
    crate::server::serve(server, listener).await?;
    Ok(())
}
