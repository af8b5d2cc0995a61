//! Catalog Loader
//!
//! One-shot job that prepares the FashionMatch vector store:
//! recreates the tables, loads catalog rows from a CSV export and embeds
//! the catalog images found in a Cloud Storage bucket.

mod config;

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use config::Config;
use core_config::FromEnv;
use core_config::tracing::{init_tracing, install_color_eyre};
use database::postgres::connect_from_config;
use domain_image_search::{
    BootstrapOptions, CatalogBootstrap, DEFAULT_IMAGE_LIMIT, GcsObjectReader, ImageSearchService,
    PgImageStore, VertexAIEmbedder,
};
use eyre::{Result, WrapErr};
use serde::Serialize;
use tracing::info;

#[derive(Parser)]
#[command(name = "catalog-loader")]
#[command(about = "Load the FashionMatch catalog into PostgreSQL/pgvector")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Drop and recreate the catalog, lookup and queries tables
    Schema,

    /// Insert catalog rows (id, price, units) from a CSV file
    Load {
        /// Path to the catalog CSV
        #[arg(long, env = "CATALOG_CSV")]
        csv: PathBuf,
    },

    /// Embed the images of a bucket and attach them to catalog rows 1..=n
    Embed {
        #[command(flatten)]
        images: ImageArgs,
    },

    /// Schema, rows and embeddings in one go
    Run {
        /// Path to the catalog CSV
        #[arg(long, env = "CATALOG_CSV")]
        csv: PathBuf,

        #[command(flatten)]
        images: ImageArgs,

        /// Keep the existing tables
        #[arg(long)]
        skip_schema: bool,
    },
}

#[derive(clap::Args)]
struct ImageArgs {
    /// Bucket holding the catalog images
    #[arg(long, env = "CATALOG_BUCKET")]
    catalog_bucket: String,

    /// Maximum number of images to embed
    #[arg(short, long, default_value_t = DEFAULT_IMAGE_LIMIT)]
    limit: usize,

    /// Seconds to wait between embedding calls
    #[arg(long, default_value_t = 2)]
    delay_secs: u64,
}

impl ImageArgs {
    fn options(&self, recreate_schema: bool) -> BootstrapOptions {
        BootstrapOptions {
            limit: self.limit,
            delay: Duration::from_secs(self.delay_secs),
            recreate_schema,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    install_color_eyre();

    let cli = Cli::parse();
    let config = Config::from_env().wrap_err("Failed to load configuration")?;
    init_tracing(&config.environment);

    let db = connect_from_config(config.database.clone())
        .await
        .wrap_err("Failed to connect to PostgreSQL")?;

    let embedder = Arc::new(VertexAIEmbedder::new(config.vertex.clone()));
    let objects = Arc::new(GcsObjectReader::new(config.gcs.clone()));
    let service = ImageSearchService::new(PgImageStore::new(db.clone()), embedder);
    let bootstrap = CatalogBootstrap::new(service, objects);

    match cli.command {
        Commands::Schema => {
            bootstrap.create_schema().await?;
            info!("Schema recreated");
        }
        Commands::Load { csv } => {
            let report = bootstrap.load_rows(open_csv(&csv)?).await?;
            print_report(&report)?;
        }
        Commands::Embed { images } => {
            let report = bootstrap
                .embed_catalog(&images.catalog_bucket, &images.options(false))
                .await?;
            print_report(&report)?;
        }
        Commands::Run {
            csv,
            images,
            skip_schema,
        } => {
            info!(bucket = %images.catalog_bucket, limit = images.limit, "Starting catalog bootstrap");
            let report = bootstrap
                .run(
                    open_csv(&csv)?,
                    &images.catalog_bucket,
                    &images.options(!skip_schema),
                )
                .await?;
            print_report(&report)?;
        }
    }

    db.close().await.wrap_err("Failed to close database pool")?;
    Ok(())
}

fn open_csv(path: &Path) -> Result<File> {
    File::open(path).wrap_err_with(|| format!("Failed to open {}", path.display()))
}

fn print_report<T: Serialize>(report: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}
