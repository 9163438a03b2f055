mod config;
mod document;
mod watch;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use docrepo_repository::{AsyncRepositoryCallback, Repository};
use docrepo_store_memory::MemoryStore;
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::{Command, Config};
use document::JsonDocument;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // Logs go to stderr so stdout stays machine-readable
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.default_log_level())),
        )
        .with_writer(std::io::stderr)
        .init();

    let store = match &config.seed {
        Some(path) => MemoryStore::load_seed(path)
            .await
            .with_context(|| format!("failed to load seed {}", path.display()))?,
        None => MemoryStore::new(),
    };

    info!(
        "docrepo over collection {:?} (seed: {:?}, empty batches: {})",
        config.collection, config.seed, config.empty_batch
    );

    let repository: Repository<JsonDocument> = Repository::with_config(
        Arc::new(store),
        config.collection.clone(),
        config.repository_config(),
    );

    match config.command {
        Command::Exists { id } => {
            let exists = complete(|callback| repository.exists(id, callback)).await?;
            println!("{}", exists);
        }
        Command::Get { id } => {
            let document = complete(|callback| repository.get(id, callback)).await?;
            let json = document.map_or(Value::Null, |d| d.to_json());
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        Command::List => {
            let documents = complete(|callback| repository.get_all(callback)).await?;
            let json: Vec<Value> = documents.iter().map(JsonDocument::to_json).collect();
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        Command::Watch { id, ticks } => {
            watch::run(&repository, id, ticks).await?;
        }
    }

    Ok(())
}

/// Run a callback-style repository operation and wait for its completion.
pub(crate) async fn complete<T: Send + 'static>(
    operation: impl FnOnce(AsyncRepositoryCallback<T>),
) -> anyhow::Result<T> {
    let (tx, rx) = oneshot::channel();
    operation(Box::new(move |result| {
        let _ = tx.send(result);
    }));
    Ok(rx.await.context("repository dropped the callback")??)
}
