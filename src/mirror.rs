// src/mirror.rs

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use google_cloud_storage::client::{Client, ClientConfig};
use google_cloud_storage::http::buckets::get::GetBucketRequest;
use google_cloud_storage::http::buckets::insert::{
    BucketCreationConfig, InsertBucketParam, InsertBucketRequest,
};
use google_cloud_storage::http::objects::upload::{Media, UploadObjectRequest, UploadType};
use google_cloud_storage::http::Error as GcsError;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// The narrow slice of an object store the mirror needs. Keeps the walk and
/// upload logic testable against an in-memory fake.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn bucket_exists(&self, bucket: &str) -> Result<bool>;
    /// Create `bucket` in the store's configured location.
    async fn create_bucket(&self, bucket: &str) -> Result<()>;
    async fn put_object(&self, bucket: &str, key: &str, local_path: &Path) -> Result<()>;
}

/// Google Cloud Storage implementation, authenticated with application-default
/// credentials. `location` is where buckets are created when absent.
pub struct GcsStore {
    client: Client,
    project: String,
    location: String,
}

impl GcsStore {
    pub async fn new(location: impl Into<String>) -> Result<Self> {
        let config = ClientConfig::default()
            .with_auth()
            .await
            .context("authenticating to object storage")?;
        let project = config
            .project_id
            .clone()
            .ok_or_else(|| anyhow!("resolved credentials carry no project id"))?;
        Ok(Self {
            client: Client::new(config),
            project,
            location: location.into(),
        })
    }
}

#[async_trait]
impl ObjectStore for GcsStore {
    async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        let req = GetBucketRequest {
            bucket: bucket.to_string(),
            ..Default::default()
        };
        match self.client.get_bucket(&req).await {
            Ok(_) => Ok(true),
            Err(GcsError::Response(resp)) if resp.code == 404 => Ok(false),
            Err(e) => Err(e).with_context(|| format!("checking bucket {bucket}")),
        }
    }

    async fn create_bucket(&self, bucket: &str) -> Result<()> {
        let req = InsertBucketRequest {
            name: bucket.to_string(),
            param: InsertBucketParam {
                project: self.project.clone(),
                ..Default::default()
            },
            bucket: BucketCreationConfig {
                location: self.location.clone(),
                ..Default::default()
            },
        };
        self.client
            .insert_bucket(&req)
            .await
            .with_context(|| format!("creating bucket {bucket} in {}", self.location))?;
        Ok(())
    }

    async fn put_object(&self, bucket: &str, key: &str, local_path: &Path) -> Result<()> {
        let data = tokio::fs::read(local_path)
            .await
            .with_context(|| format!("reading {}", local_path.display()))?;
        let req = UploadObjectRequest {
            bucket: bucket.to_string(),
            ..Default::default()
        };
        let upload_type = UploadType::Simple(Media::new(key.to_string()));
        self.client
            .upload_object(&req, data, &upload_type)
            .await
            .with_context(|| format!("uploading {} to {bucket}/{key}", local_path.display()))?;
        Ok(())
    }
}

/// Create `bucket` if it does not already exist. Safe to call repeatedly.
pub async fn ensure_bucket<S: ObjectStore>(store: &S, bucket: &str) -> Result<()> {
    if store.bucket_exists(bucket).await? {
        info!(%bucket, "bucket already exists");
        return Ok(());
    }
    store.create_bucket(bucket).await?;
    info!(%bucket, "bucket created");
    Ok(())
}

/// Upload every `.csv` file under `root` to `bucket`, keyed by its path
/// relative to `root`. Everything else is skipped. No diffing against the
/// bucket: matching files are re-uploaded unconditionally and the backend's
/// overwrite semantics apply. Returns the number of objects uploaded.
pub async fn mirror_directory<S: ObjectStore>(
    store: &S,
    root: &Path,
    bucket: &str,
) -> Result<usize> {
    let files = collect_csv_files(root)?;
    for path in &files {
        let key = object_key(root, path)?;
        debug!(%key, "uploading");
        store
            .put_object(bucket, &key, path)
            .await
            .with_context(|| format!("mirroring {}", path.display()))?;
    }
    Ok(files.len())
}

/// Recursive walk collecting `.csv` files. Entries are classified by file
/// type, not by filename convention.
fn collect_csv_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("reading {}", dir.display()))? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            found.extend(collect_csv_files(&path)?);
        } else if path
            .file_name()
            .and_then(|name| name.to_str())
            .map_or(false, |name| name.to_ascii_lowercase().ends_with(".csv"))
        {
            found.push(path);
        }
    }
    Ok(found)
}

/// Object key for `path`: its components below `root`, joined with `/`.
fn object_key(root: &Path, path: &Path) -> Result<String> {
    let rel = path
        .strip_prefix(root)
        .with_context(|| format!("{} is outside {}", path.display(), root.display()))?;
    let parts: Vec<_> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect();
    Ok(parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::sync::Mutex;
    use tempfile::tempdir;

    #[derive(Default)]
    struct FakeStore {
        buckets: Mutex<BTreeSet<String>>,
        uploads: Mutex<Vec<String>>,
        creates: Mutex<usize>,
    }

    #[async_trait]
    impl ObjectStore for FakeStore {
        async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
            Ok(self.buckets.lock().unwrap().contains(bucket))
        }

        async fn create_bucket(&self, bucket: &str) -> Result<()> {
            *self.creates.lock().unwrap() += 1;
            self.buckets.lock().unwrap().insert(bucket.to_string());
            Ok(())
        }

        async fn put_object(&self, _bucket: &str, key: &str, local_path: &Path) -> Result<()> {
            assert!(local_path.is_file(), "uploads must come from real files");
            self.uploads.lock().unwrap().push(key.to_string());
            Ok(())
        }
    }

    #[tokio::test]
    async fn ensure_bucket_creates_only_once() -> Result<()> {
        let store = FakeStore::default();
        ensure_bucket(&store, "tables").await?;
        ensure_bucket(&store, "tables").await?;
        assert_eq!(*store.creates.lock().unwrap(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn mirror_uploads_only_csv_files() -> Result<()> {
        let dir = tempdir()?;
        fs::write(dir.path().join("a.csv"), "x,y\n1,2\n")?;
        fs::write(dir.path().join("b.txt"), "not a table")?;
        fs::write(dir.path().join("MANIFEST"), "file without extension")?;
        fs::create_dir(dir.path().join("sub"))?;
        fs::write(dir.path().join("sub").join("c.csv"), "a\n1\n")?;

        let store = FakeStore::default();
        let count = mirror_directory(&store, dir.path(), "tables").await?;

        assert_eq!(count, 2);
        let mut uploads = store.uploads.lock().unwrap().clone();
        uploads.sort();
        assert_eq!(uploads, vec!["a.csv", "sub/c.csv"]);
        Ok(())
    }

    #[tokio::test]
    async fn mirror_recurses_into_dotted_directory_names() -> Result<()> {
        let dir = tempdir()?;
        fs::create_dir(dir.path().join("data.v2"))?;
        fs::write(dir.path().join("data.v2").join("d.csv"), "v\n2\n")?;

        let store = FakeStore::default();
        let count = mirror_directory(&store, dir.path(), "tables").await?;

        assert_eq!(count, 1);
        assert_eq!(*store.uploads.lock().unwrap(), vec!["data.v2/d.csv"]);
        Ok(())
    }
}
