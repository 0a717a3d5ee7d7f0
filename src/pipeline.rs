// src/pipeline.rs

use anyhow::{Context, Result};
use chrono::NaiveDate;
use reqwest::Client;
use std::path::Path;
use std::time::Instant;
use tracing::info;

use crate::catalog::CatalogClient;
use crate::fetch;

/// Download, extract, and clean up every table the catalog reports changed on
/// `date`. Strictly sequential; the first failure aborts the remaining ids.
pub async fn run(
    client: &Client,
    catalog: &CatalogClient,
    date: NaiveDate,
    out_dir: &Path,
) -> Result<usize> {
    let ids = catalog.changed_cubes(date).await?;
    info!(count = ids.len(), %date, "changed cube list fetched");

    for id in &ids {
        let start = Instant::now();
        download_table(client, catalog, id, out_dir)
            .await
            .with_context(|| format!("processing table {id}"))?;
        info!(product_id = %id, elapsed = ?start.elapsed(), "table downloaded");
    }

    Ok(ids.len())
}

/// One table's full cycle: resolve the one-time URL, stream the archive to
/// `{out_dir}/{id}.zip`, extract into `{out_dir}/{id}/`, delete the archive.
pub async fn download_table(
    client: &Client,
    catalog: &CatalogClient,
    product_id: &str,
    out_dir: &Path,
) -> Result<()> {
    let url = catalog.full_table_csv_url(product_id).await?;
    let zip_path = out_dir.join(format!("{product_id}.zip"));
    let table_dir = out_dir.join(product_id);

    fetch::download_zip(client, &url, &zip_path).await?;
    fetch::extract_zip(&zip_path, &table_dir)?;
    fetch::remove_zip(&zip_path)?;
    Ok(())
}
