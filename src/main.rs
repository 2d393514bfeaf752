mod api;
mod cache;
mod cli;
mod config;
mod logging;
mod queue;
mod store;

use clap::Parser;
use color_eyre::Result;
use std::sync::Arc;

use api::{HttpTransport, MutationOutcome, SchoolClient};
use cli::{Args, CacheAction, Command, QueueAction};
use config::Config;
use store::{KeyValueStore, MemoryStore, SqliteStore};

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let _log_guard = logging::init()?;

  let config = Config::load(args.config.as_deref())?;

  let transport = HttpTransport::new(&config.api, Config::get_api_token())?;

  if args.ephemeral {
    let client = SchoolClient::new(&config, transport, Arc::new(MemoryStore::new()))?;
    return run(args.command, &client).await;
  }

  let store = match &config.storage.path {
    Some(path) => SqliteStore::open(path)?,
    None => SqliteStore::open_default()?,
  };
  let client = SchoolClient::new(&config, transport, Arc::new(store))?;
  run(args.command, &client).await
}

async fn run<S: KeyValueStore>(
  command: Command,
  client: &SchoolClient<S, HttpTransport>,
) -> Result<()> {
  match command {
    Command::Get { endpoint, params } => {
      let params = cli::parse_params(&params)?;
      let result = client.fetch(&endpoint, params.as_ref()).await?;
      match result.cached_at {
        Some(cached_at) => eprintln!(
          "source: {} (cached {})",
          result.source.label(),
          cached_at.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M:%S")
        ),
        None => eprintln!("source: {}", result.source.label()),
      }
      println!("{}", serde_json::to_string_pretty(&result.data)?);
    }
    Command::Send {
      method,
      endpoint,
      body,
      headers,
    } => {
      let request = cli::build_request(&method, &endpoint, body.as_deref(), &headers)?;
      match client.mutate(request).await? {
        MutationOutcome::Sent => println!("sent"),
        MutationOutcome::Queued => println!("offline: request queued for the next sync"),
      }
    }
    Command::Sync => {
      let summary = client.sync().await;
      println!("{}", serde_json::to_string_pretty(&summary)?);
    }
    Command::Queue { action } => match action {
      QueueAction::List => {
        println!("{}", serde_json::to_string_pretty(&client.pending())?);
      }
      QueueAction::Clear => client.clear_queue(),
    },
    Command::Cache { action } => match action {
      CacheAction::Clear => client.clear_cache(),
    },
  }

  Ok(())
}
