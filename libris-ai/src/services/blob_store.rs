//! Blob persistence for generated files

use async_trait::async_trait;
use libris_common::{Error, Result};
use std::path::PathBuf;
use tracing::debug;
use uuid::Uuid;

/// Persists bytes and returns a reference name usable in `/files/<name>`
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, bytes: &[u8], extension: &str) -> Result<String>;
}

/// Filesystem blob store rooted at `<root>/blobs`
pub struct FsBlobStore {
    dir: PathBuf,
}

impl FsBlobStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &std::path::Path {
        &self.dir
    }

    /// Path of a stored blob, rejecting names that escape the directory
    pub fn path_of(&self, name: &str) -> Result<PathBuf> {
        if !is_safe_name(name) {
            return Err(Error::InvalidInput(format!("invalid blob name '{}'", name)));
        }
        Ok(self.dir.join(name))
    }
}

fn is_safe_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(&self, bytes: &[u8], extension: &str) -> Result<String> {
        let extension = extension.trim_start_matches('.');
        let name = if extension.is_empty() {
            Uuid::new_v4().to_string()
        } else {
            format!("{}.{}", Uuid::new_v4(), extension)
        };
        let path = self.path_of(&name)?;

        tokio::fs::create_dir_all(&self.dir).await?;

        // Write to a temp name then rename so readers never see a partial file
        let tmp = self.dir.join(format!(".{}.tmp", name));
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;

        debug!(blob = %name, size = bytes.len(), "Stored blob");
        Ok(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_put_writes_file() {
        let temp = TempDir::new().unwrap();
        let store = FsBlobStore::new(temp.path().join("blobs"));

        let name = store.put(b"image-bytes", "png").await.unwrap();
        assert!(name.ends_with(".png"));

        let stored = std::fs::read(store.path_of(&name).unwrap()).unwrap();
        assert_eq!(stored, b"image-bytes");
    }

    #[test]
    fn test_path_of_rejects_traversal() {
        let store = FsBlobStore::new(PathBuf::from("/tmp/blobs"));
        assert!(store.path_of("../libris.db").is_err());
        assert!(store.path_of("a/b.png").is_err());
        assert!(store.path_of(".hidden").is_err());
        assert!(store.path_of("3f1c.png").is_ok());
    }
}
