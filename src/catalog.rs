// src/catalog.rs

use anyhow::{Context, Result};
use chrono::NaiveDate;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;
use url::Url;

/// Client for the Web Data Service catalog endpoints. The base URL is supplied
/// by the caller so tests and alternate deployments can point it elsewhere.
pub struct CatalogClient {
    client: Client,
    base_url: Url,
}

#[derive(Deserialize)]
struct ChangedCubeList {
    object: Vec<ChangedCube>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChangedCube {
    product_id: ProductId,
}

/// The live API serves `productId` as a JSON number; treat either form as an
/// opaque string.
#[derive(Deserialize)]
#[serde(untagged)]
enum ProductId {
    Text(String),
    Number(u64),
}

impl ProductId {
    fn into_string(self) -> String {
        match self {
            ProductId::Text(s) => s,
            ProductId::Number(n) => n.to_string(),
        }
    }
}

#[derive(Deserialize)]
struct FullTableDownload {
    object: String,
}

impl CatalogClient {
    pub fn new(client: Client, base_url: Url) -> Self {
        Self { client, base_url }
    }

    /// Product ids of every cube changed on or after `date`, in response order.
    pub async fn changed_cubes(&self, date: NaiveDate) -> Result<Vec<String>> {
        let url = self
            .base_url
            .join(&format!("getChangedCubeList/{}", date.format("%Y-%m-%d")))?;
        let body = self.get_text(&url).await?;
        parse_changed_cubes(&body).with_context(|| format!("decoding changed cube list from {url}"))
    }

    /// One-time download URL for the full-table CSV of `product_id`.
    pub async fn full_table_csv_url(&self, product_id: &str) -> Result<Url> {
        let url = self
            .base_url
            .join(&format!("getFullTableDownloadCSV/{product_id}/en"))?;
        let body = self.get_text(&url).await?;
        parse_download_url(&body)
            .with_context(|| format!("decoding download URL for table {product_id} from {url}"))
    }

    async fn get_text(&self, url: &Url) -> Result<String> {
        debug!(%url, "catalog request");
        self.client
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("GET {url}"))?
            .error_for_status()
            .with_context(|| format!("non-success status from {url}"))?
            .text()
            .await
            .with_context(|| format!("reading body from {url}"))
    }
}

fn parse_changed_cubes(body: &str) -> Result<Vec<String>> {
    let list: ChangedCubeList = serde_json::from_str(body)?;
    Ok(list
        .object
        .into_iter()
        .map(|cube| cube.product_id.into_string())
        .collect())
}

fn parse_download_url(body: &str) -> Result<Url> {
    let resp: FullTableDownload = serde_json::from_str(body)?;
    Url::parse(&resp.object).with_context(|| format!("`object` is not a URL: {}", resp.object))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn changed_cubes_keep_response_order() -> Result<()> {
        let body = r#"{"status":"SUCCESS","object":[
            {"productId":34100006,"releaseTime":"2024-01-01T12:30"},
            {"productId":"13100001"},
            {"productId":34100006}
        ]}"#;
        let ids = parse_changed_cubes(body)?;
        assert_eq!(ids, vec!["34100006", "13100001", "34100006"]);
        Ok(())
    }

    #[test]
    fn changed_cubes_can_be_empty() -> Result<()> {
        let ids = parse_changed_cubes(r#"{"object":[]}"#)?;
        assert!(ids.is_empty());
        Ok(())
    }

    #[test]
    fn missing_object_field_is_an_error() {
        assert!(parse_changed_cubes(r#"{"status":"FAILED"}"#).is_err());
    }

    #[test]
    fn download_url_is_extracted() -> Result<()> {
        let body = r#"{"status":"SUCCESS","object":"https://www150.statcan.gc.ca/n1/tbl/csv/13100001-eng.zip"}"#;
        let url = parse_download_url(body)?;
        assert_eq!(
            url.as_str(),
            "https://www150.statcan.gc.ca/n1/tbl/csv/13100001-eng.zip"
        );
        Ok(())
    }

    #[test]
    fn download_url_must_parse() {
        assert!(parse_download_url(r#"{"object":"not a url"}"#).is_err());
    }
}
