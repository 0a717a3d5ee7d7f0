// src/fetch.rs

use anyhow::{Context, Result};
use reqwest::Client;
use std::fs::File;
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tracing::debug;
use url::Url;
use zip::ZipArchive;

/// Stream the archive at `url` into `dest`, writing chunks as they arrive
/// from the transport. Creates or overwrites `dest`; on failure a partially
/// written file is left behind.
pub async fn download_zip(client: &Client, url: &Url, dest: &Path) -> Result<()> {
    debug!(%url, dest = %dest.display(), "downloading archive");
    let mut resp = client
        .get(url.clone())
        .send()
        .await
        .with_context(|| format!("GET {url}"))?
        .error_for_status()
        .with_context(|| format!("non-success status from {url}"))?;

    let mut file = tokio::fs::File::create(dest)
        .await
        .with_context(|| format!("creating {}", dest.display()))?;
    while let Some(chunk) = resp
        .chunk()
        .await
        .with_context(|| format!("reading body from {url}"))?
    {
        file.write_all(&chunk)
            .await
            .with_context(|| format!("writing {}", dest.display()))?;
    }
    file.flush().await?;
    Ok(())
}

/// Decompress every entry of the archive at `zip_path` into `target_dir`,
/// creating the directory if absent.
pub fn extract_zip(zip_path: &Path, target_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(target_dir)
        .with_context(|| format!("creating {}", target_dir.display()))?;
    let file =
        File::open(zip_path).with_context(|| format!("opening {}", zip_path.display()))?;
    let mut archive =
        ZipArchive::new(file).with_context(|| format!("reading archive {}", zip_path.display()))?;
    archive.extract(target_dir).with_context(|| {
        format!(
            "extracting {} into {}",
            zip_path.display(),
            target_dir.display()
        )
    })?;
    Ok(())
}

/// Delete the archive once its contents are extracted. Failing to delete is
/// fatal, matching the rest of the pipeline.
pub fn remove_zip(zip_path: &Path) -> Result<()> {
    std::fs::remove_file(zip_path).with_context(|| format!("deleting {}", zip_path.display()))
}
