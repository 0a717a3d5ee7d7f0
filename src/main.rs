use anyhow::Result;
use chrono::Local;
use clap::Parser;
use reqwest::Client;
use statscraper::{
    catalog::CatalogClient,
    mirror::{self, GcsStore},
    pipeline,
};
use std::{fs, path::PathBuf, time::Instant};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};
use url::Url;

/// Base url to the StatCan Web Data Service.
const BASE_URL: &str = "https://www150.statcan.gc.ca/t1/wds/rest/";

/// Bucket location used when the mirror has to create the bucket.
const BUCKET_LOCATION: &str = "NORTHAMERICA-NORTHEAST1";

#[derive(Parser, Debug)]
struct Args {
    /// Mirror the extracted CSV files into this bucket after downloading
    #[arg(long)]
    bucket: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder().with_env_filter(env).init();
    info!("startup");

    let args = Args::parse();

    // ─── 2) configure client + output dir ────────────────────────────
    let client = Client::new();
    let catalog = CatalogClient::new(client.clone(), Url::parse(BASE_URL)?);
    let data_dir = PathBuf::from("data");
    fs::create_dir_all(&data_dir)?;

    // ─── 3) download every table changed today ───────────────────────
    let today = Local::now().date_naive();
    let start = Instant::now();
    let tables = pipeline::run(&client, &catalog, today, &data_dir).await?;
    info!(tables, elapsed = ?start.elapsed(), "download phase complete");

    // ─── 4) optionally mirror the output into a bucket ───────────────
    if let Some(bucket) = args.bucket {
        let store = GcsStore::new(BUCKET_LOCATION).await?;
        let start = Instant::now();
        mirror::ensure_bucket(&store, &bucket).await?;
        let objects = mirror::mirror_directory(&store, &data_dir, &bucket).await?;
        info!(objects, elapsed = ?start.elapsed(), "upload phase complete");
    }

    Ok(())
}
