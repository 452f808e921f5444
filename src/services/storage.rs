//! Object storage adapters

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::io::AsyncWriteExt;

use super::{ObjectStore, ServiceError, ServiceResult};

const SCHEME: &str = "s3://";
const PARTIAL_SUFFIX: &str = ".partial";
/// Sidecar holding the content type of `<key>`
const CONTENT_TYPE_SUFFIX: &str = ".content-type";

/// `s3://bucket/key` location. The key may be a prefix or empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectUri {
    pub bucket: String,
    pub key: String,
}

impl ObjectUri {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    pub fn parse(uri: &str) -> ServiceResult<Self> {
        let rest = uri
            .strip_prefix(SCHEME)
            .ok_or_else(|| ServiceError::InvalidUri(uri.to_string()))?;
        let (bucket, key) = rest.split_once('/').unwrap_or((rest, ""));
        if bucket.is_empty() {
            return Err(ServiceError::InvalidUri(uri.to_string()));
        }
        Ok(Self::new(bucket, key))
    }

    /// Another object in the same bucket.
    pub fn sibling(&self, key: impl Into<String>) -> Self {
        Self::new(self.bucket.clone(), key)
    }

    pub fn has_extension(&self, ext: &str) -> bool {
        self.key
            .rsplit_once('.')
            .map(|(_, e)| e.eq_ignore_ascii_case(ext))
            .unwrap_or(false)
    }
}

impl fmt::Display for ObjectUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}/{}", SCHEME, self.bucket, self.key)
    }
}

// ============================================================================
// LOCAL FILESYSTEM
// ============================================================================

/// Object store backed by a directory tree: `<root>/<bucket>/<key>`, with the
/// content type kept next to each object in `<key>.content-type`.
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn bucket_dir(&self, bucket: &str) -> ServiceResult<PathBuf> {
        safe_join(&self.root, bucket).ok_or_else(|| ServiceError::InvalidUri(bucket.to_string()))
    }

    fn object_path(&self, object: &ObjectUri) -> ServiceResult<PathBuf> {
        if object.key.is_empty() || object.key.ends_with('/') {
            return Err(ServiceError::InvalidUri(object.to_string()));
        }
        let bucket = self.bucket_dir(&object.bucket)?;
        safe_join(&bucket, &object.key).ok_or_else(|| ServiceError::InvalidUri(object.to_string()))
    }
}

/// Join a relative, `/`-separated key below `base`, refusing traversal.
fn safe_join(base: &Path, key: &str) -> Option<PathBuf> {
    let relative = Path::new(key);
    let mut path = base.to_path_buf();
    for component in relative.components() {
        match component {
            Component::Normal(part) => path.push(part),
            Component::CurDir => {}
            _ => return None,
        }
    }
    Some(path)
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

fn is_bookkeeping(key: &str) -> bool {
    key.ends_with(PARTIAL_SUFFIX) || key.ends_with(CONTENT_TYPE_SUFFIX)
}

/// Write aside, fsync, then rename so readers never see a torn file. The
/// aside file is removed if any step fails.
async fn write_aside(path: &Path, bytes: &[u8]) -> ServiceResult<()> {
    let partial = with_suffix(path, PARTIAL_SUFFIX);
    let written: std::io::Result<()> = async {
        let mut file = tokio::fs::File::create(&partial).await?;
        file.write_all(bytes).await?;
        file.sync_all().await?;
        drop(file);
        tokio::fs::rename(&partial, path).await
    }
    .await;

    if let Err(e) = written {
        match tokio::fs::remove_file(&partial).await {
            Ok(()) => {}
            Err(cleanup) if cleanup.kind() == std::io::ErrorKind::NotFound => {}
            Err(cleanup) => {
                tracing::warn!(path = %partial.display(), error = %cleanup, "Failed to remove partial object")
            }
        }
        return Err(e.into());
    }
    Ok(())
}

/// Persist the directory entry created by a rename.
#[cfg(unix)]
async fn sync_dir(dir: &Path) -> ServiceResult<()> {
    tokio::fs::File::open(dir).await?.sync_all().await?;
    Ok(())
}

#[cfg(not(unix))]
async fn sync_dir(_dir: &Path) -> ServiceResult<()> {
    Ok(())
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn list(&self, prefix: &ObjectUri) -> ServiceResult<Vec<ObjectUri>> {
        let bucket_dir = self.bucket_dir(&prefix.bucket)?;
        if !tokio::fs::try_exists(&bucket_dir).await? {
            return Ok(Vec::new());
        }

        let mut keys = Vec::new();
        let mut pending = vec![(bucket_dir, String::new())];
        while let Some((dir, key_prefix)) = pending.pop() {
            let mut entries = tokio::fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let name = entry.file_name().to_string_lossy().to_string();
                let key = format!("{}{}", key_prefix, name);
                let file_type = entry.file_type().await?;
                if file_type.is_dir() {
                    pending.push((entry.path(), format!("{}/", key)));
                } else if key.starts_with(&prefix.key) && !is_bookkeeping(&key) {
                    keys.push(key);
                }
            }
        }

        keys.sort();
        Ok(keys.into_iter().map(|k| prefix.sibling(k)).collect())
    }

    async fn get(&self, object: &ObjectUri) -> ServiceResult<Vec<u8>> {
        let path = self.object_path(object)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ServiceError::NotFound(object.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&self, object: &ObjectUri, body: Vec<u8>, content_type: &str) -> ServiceResult<()> {
        let path = self.object_path(object)?;
        if is_bookkeeping(&object.key) {
            return Err(ServiceError::InvalidUri(object.to_string()));
        }
        let parent = path
            .parent()
            .ok_or_else(|| ServiceError::InvalidUri(object.to_string()))?;
        tokio::fs::create_dir_all(parent).await?;

        write_aside(&path, &body).await?;
        write_aside(&with_suffix(&path, CONTENT_TYPE_SUFFIX), content_type.as_bytes()).await?;
        sync_dir(parent).await?;

        tracing::debug!(object = %object, bytes = body.len(), content_type, "Object stored");
        Ok(())
    }
}

// ============================================================================
// IN-MEMORY
// ============================================================================

#[derive(Debug, Clone)]
struct StoredObject {
    body: Vec<u8>,
    content_type: String,
}

/// Process-local object store for development and tests.
#[derive(Default)]
pub struct InMemoryObjectStore {
    objects: RwLock<BTreeMap<ObjectUri, StoredObject>>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
impl InMemoryObjectStore {
    /// Content type recorded by the last `put` of `object`.
    pub fn content_type(&self, object: &ObjectUri) -> Option<String> {
        self.objects.read().get(object).map(|o| o.content_type.clone())
    }

    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn list(&self, prefix: &ObjectUri) -> ServiceResult<Vec<ObjectUri>> {
        Ok(self
            .objects
            .read()
            .keys()
            .filter(|uri| uri.bucket == prefix.bucket && uri.key.starts_with(&prefix.key))
            .cloned()
            .collect())
    }

    async fn get(&self, object: &ObjectUri) -> ServiceResult<Vec<u8>> {
        self.objects
            .read()
            .get(object)
            .map(|o| o.body.clone())
            .ok_or_else(|| ServiceError::NotFound(object.to_string()))
    }

    async fn put(&self, object: &ObjectUri, body: Vec<u8>, content_type: &str) -> ServiceResult<()> {
        self.objects.write().insert(
            object.clone(),
            StoredObject {
                body,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_uri() {
        let uri = ObjectUri::parse("s3://data/training-data/real/").unwrap();
        assert_eq!(uri.bucket, "data");
        assert_eq!(uri.key, "training-data/real/");
        assert_eq!(uri.to_string(), "s3://data/training-data/real/");

        let bare = ObjectUri::parse("s3://data").unwrap();
        assert_eq!(bare.key, "");

        assert!(ObjectUri::parse("https://data/x").is_err());
        assert!(ObjectUri::parse("s3:///x").is_err());
    }

    #[test]
    fn test_extension_match() {
        assert!(ObjectUri::new("b", "a/real.CSV").has_extension("csv"));
        assert!(!ObjectUri::new("b", "a/real.json").has_extension("csv"));
        assert!(!ObjectUri::new("b", "a/csv").has_extension("csv"));
    }

    #[tokio::test]
    async fn test_local_store_round_trip_and_listing() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path());

        let a = ObjectUri::new("bucket", "training-data/real/b.csv");
        let b = ObjectUri::new("bucket", "training-data/real/a.csv");
        let other = ObjectUri::new("bucket", "synthetic-fraud/x.json");
        store.put(&a, b"one".to_vec(), "text/csv").await.unwrap();
        store.put(&b, b"two".to_vec(), "text/csv").await.unwrap();
        store.put(&other, b"[]".to_vec(), "application/json").await.unwrap();

        let listed = store
            .list(&ObjectUri::new("bucket", "training-data/real/"))
            .await
            .unwrap();
        assert_eq!(listed, vec![b.clone(), a.clone()]);
        assert_eq!(store.get(&a).await.unwrap(), b"one");

        let missing = store.list(&ObjectUri::new("nobucket", "")).await.unwrap();
        assert!(missing.is_empty());
    }

    #[tokio::test]
    async fn test_local_store_keeps_content_type_out_of_listing() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path());
        let object = ObjectUri::new("bucket", "training-data/combined/m_1.csv");

        store.put(&object, b"h\n1".to_vec(), "text/csv").await.unwrap();

        let sidecar = dir.path().join("bucket/training-data/combined/m_1.csv.content-type");
        assert_eq!(std::fs::read_to_string(sidecar).unwrap(), "text/csv");
        let listed = store.list(&ObjectUri::new("bucket", "")).await.unwrap();
        assert_eq!(listed, vec![object]);

        let reserved = ObjectUri::new("bucket", "training-data/combined/m_1.csv.content-type");
        assert!(matches!(
            store.put(&reserved, b"x".to_vec(), "text/plain").await,
            Err(ServiceError::InvalidUri(_))
        ));
    }

    #[tokio::test]
    async fn test_failed_put_removes_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path());
        let object = ObjectUri::new("bucket", "out/target.csv");
        // A directory in the way makes the final rename fail.
        let target = dir.path().join("bucket/out/target.csv");
        std::fs::create_dir_all(target.join("occupied")).unwrap();

        let result = store.put(&object, b"data".to_vec(), "text/csv").await;

        assert!(matches!(result, Err(ServiceError::Io(_))));
        assert!(!dir.path().join("bucket/out/target.csv.partial").exists());
        assert!(target.is_dir());
    }

    #[tokio::test]
    async fn test_local_store_rejects_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path());
        let evil = ObjectUri::new("bucket", "../escape.csv");
        assert!(matches!(
            store.put(&evil, b"x".to_vec(), "text/csv").await,
            Err(ServiceError::InvalidUri(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_object_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path());
        let err = store.get(&ObjectUri::new("bucket", "nope.csv")).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));

        let memory = InMemoryObjectStore::new();
        let err = memory.get(&ObjectUri::new("bucket", "nope.csv")).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }
}
