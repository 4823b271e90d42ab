use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use turbochat_rag::{Config, IngestOptions, MetadataFilter, RagClient};

#[derive(Parser)]
#[command(name = "turbochat-rag")]
#[command(about = "Ingest documents into collections and query them with hybrid retrieval", long_about = None)]
struct Cli {
    /// Configuration file (defaults to the platform config location)
    #[arg(short, long, global = true, env = "TURBOCHAT_RAG_CONFIG")]
    config: Option<PathBuf>,

    /// Override the data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Manage collections
    Collections {
        #[command(subcommand)]
        action: CollectionsAction,
    },
    /// Ingest files or directories into a collection
    Ingest {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        #[arg(short, long)]
        collection: String,
        /// Replace chunks previously ingested from the same file
        #[arg(long)]
        overwrite: bool,
    },
    /// Query a collection
    Query {
        text: String,
        #[arg(short, long)]
        collection: String,
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
        /// Rank by vector similarity only
        #[arg(long)]
        no_hybrid: bool,
        /// Metadata equality filter, repeatable (key=value)
        #[arg(long = "filter", value_parser = parse_filter)]
        filters: Vec<(String, String)>,
    },
    /// Print version and build information
    Version,
}

#[derive(Subcommand)]
enum CollectionsAction {
    List,
    Create {
        name: String,
        #[arg(short, long)]
        description: Option<String>,
    },
    Delete {
        name: String,
    },
}

fn parse_filter(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| format!("expected key=value, got '{}'", raw))
}

/// Numbers and booleans compare as JSON; anything else as a string
fn filter_value(raw: String) -> serde_json::Value {
    serde_json::from_str(&raw).unwrap_or(serde_json::Value::String(raw))
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::load_or_default()?,
    };
    config.apply_env_overrides();
    if let Some(dir) = &cli.data_dir {
        config.storage.data_dir = dir.clone();
    }
    config.validate()?;
    Ok(config)
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout stays valid JSON
    let log_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(log_filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Command::Version = cli.command {
        return print_json(&json!({
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
            "build_timestamp": env!("BUILD_TIMESTAMP"),
            "git_commit": env!("GIT_COMMIT_HASH"),
        }));
    }

    let config = load_config(&cli)?;
    let client = RagClient::with_config(config)
        .await
        .context("Failed to initialize RAG client")?;

    match cli.command {
        Command::Collections { action } => match action {
            CollectionsAction::List => print_json(&client.list_collections().await?),
            CollectionsAction::Create { name, description } => {
                let outcome = client
                    .create_collection(&name, description.as_deref())
                    .await?;
                print_json(&json!({ "name": name, "outcome": outcome }))
            }
            CollectionsAction::Delete { name } => {
                let deleted = client.delete_collection(&name).await?;
                print_json(&json!({ "name": name, "deleted": deleted }))
            }
        },
        Command::Ingest {
            paths,
            collection,
            overwrite,
        } => {
            let options = IngestOptions {
                overwrite_existing: overwrite,
            };

            // Ctrl-C stops after the current stage; nothing partial is written
            let cancel_token = CancellationToken::new();
            let ctrl_c_token = cancel_token.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("Interrupt received, cancelling ingestion");
                    ctrl_c_token.cancel();
                }
            });

            let mut reports = Vec::new();
            for path in paths {
                if path.is_dir() {
                    reports.extend(
                        client
                            .ingest_directory(&path, &collection, &options, cancel_token.clone())
                            .await?,
                    );
                } else {
                    reports.push(
                        client
                            .ingest_document_with(&path, &collection, &options, cancel_token.clone())
                            .await,
                    );
                }
            }
            print_json(&reports)
        }
        Command::Query {
            text,
            collection,
            top_k,
            no_hybrid,
            filters,
        } => {
            let mut request = client.request(text, collection);
            if let Some(top_k) = top_k {
                request = request.with_top_k(top_k);
            }
            if no_hybrid {
                request = request.with_hybrid(false);
            }
            if !filters.is_empty() {
                let filter = filters
                    .into_iter()
                    .fold(MetadataFilter::new(), |f, (k, v)| f.eq(k, filter_value(v)));
                request = request.with_filter(filter);
            }
            print_json(&client.query(request).await?)
        }
        Command::Version => Ok(()),
    }
}
