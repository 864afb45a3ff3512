use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "docharvest")]
#[command(about = "Harvest repository records into mapped field values", long_about = None)]
pub struct Cli {
    /// Configuration file (default: $DOCHARVEST_CONFIG or config/docharvest.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List top-level communities
    Communities,
    /// List the sub-communities of a community
    SubCommunities(CommunityArgs),
    /// List the collections of a community
    Collections(CommunityArgs),
    /// List the items of a collection
    Items(CollectionArgs),
    /// List the distinct metadata keys used in a collection
    MetadataKeys(CollectionArgs),
    /// Run an import job against the in-memory store
    Import(ImportArgs),
}

#[derive(clap::Args, Debug)]
pub struct CommunityArgs {
    pub community_id: String,
}

#[derive(clap::Args, Debug)]
pub struct CollectionArgs {
    pub collection_id: String,
}

#[derive(clap::Args, Debug)]
pub struct ImportArgs {
    /// Import request (JSON)
    #[arg(long)]
    pub job: PathBuf,

    /// Write the report here instead of stdout
    #[arg(long)]
    pub output: Option<PathBuf>,
}
