mod cli;

use clap::Parser;
use cli::{Cli, Commands, ImportArgs};
use docharvest::client::RepositoryClient;
use docharvest::config::Config;
use docharvest::import::{ImportCoordinator, ImportReport, ImportRequest};
use docharvest::observability::init_tracing;
use docharvest::store::{MemoryStore, StoredItem};
use serde::Serialize;
use std::sync::Arc;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Serialize)]
struct ImportOutput {
    report: ImportReport,
    items: Vec<StoredItem>,
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let cli = Cli::parse();

    let config = Config::load_with(cli.config)?;
    init_tracing(&config.telemetry.log_filter);

    let client = RepositoryClient::from_config(&config)?;

    match cli.command {
        Commands::Communities => print_json(&client.communities().await)?,
        Commands::SubCommunities(args) => {
            print_json(&client.sub_communities(&args.community_id).await)?
        }
        Commands::Collections(args) => print_json(&client.collections(&args.community_id).await)?,
        Commands::Items(args) => {
            let count = client.collection_item_count(&args.collection_id).await?;
            let selection = docharvest::client::CollectionSelection::new(args.collection_id, count);
            print_json(&client.items_in_collections(&[selection]).await)?
        }
        Commands::MetadataKeys(args) => {
            print_json(&client.collection_metadata_keys(&args.collection_id).await?)?
        }
        Commands::Import(args) => run_import(client, args).await?,
    }

    Ok(())
}

async fn run_import(client: RepositoryClient, args: ImportArgs) -> Result<(), BoxError> {
    let body = tokio::fs::read_to_string(&args.job).await?;
    let job = ImportRequest::from_json(&body)?.into_job()?;

    let store = Arc::new(MemoryStore::new());
    let coordinator = ImportCoordinator::new(client, store.clone());

    let report = if job.item_ids.is_empty() {
        coordinator.import_collection(job).await?
    } else {
        coordinator.import_items(job).await
    };

    let output = ImportOutput {
        report,
        items: store.items().await,
    };
    let json = serde_json::to_string_pretty(&output)?;

    match args.output {
        Some(path) => tokio::fs::write(&path, json).await?,
        None => println!("{json}"),
    }

    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), BoxError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
