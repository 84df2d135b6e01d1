// Local-disk storage adapter, grounded on the teacher's
// `infra/src/storage/local.rs` wrapper around `object_store::local::LocalFileSystem`.
// `LocalFileSystem::put` already writes to a temp file and renames into
// place, which is what gives us the write-temp-then-rename atomicity
// spec.md §4.7 requires.

use async_trait::async_trait;
use bytes::Bytes;
use object_store::{ObjectStore, local::LocalFileSystem, path::Path as ObjectPath};
use std::sync::Arc;

use super::{sanitize_component, sanitize_extension, StorageAdapter};
use crate::errors::{Error, Result};

pub struct LocalStorage {
    store: Arc<LocalFileSystem>,
    base_url: String,
}

impl LocalStorage {
    pub fn new(root_dir: &str, base_url: &str) -> Self {
        std::fs::create_dir_all(root_dir).ok();
        let store = LocalFileSystem::new_with_prefix(root_dir)
            .expect("failed to open local storage root");
        Self {
            store: Arc::new(store),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn by_hash_path(hash: &str) -> ObjectPath {
        ObjectPath::from(format!(".storage/{}", sanitize_component(hash)))
    }

    fn by_name_path(pod: &str, stream_path: &str, record_name: &str, ext: &str) -> ObjectPath {
        let pod = sanitize_component(pod);
        let segments: Vec<String> = stream_path
            .split('/')
            .filter(|s| !s.is_empty())
            .map(sanitize_component)
            .collect();
        let name = sanitize_component(record_name);
        let ext = sanitize_extension(ext);
        let mut full = format!("{pod}/");
        if !segments.is_empty() {
            full.push_str(&segments.join("/"));
            full.push('/');
        }
        full.push_str(&format!("{name}.{ext}"));
        ObjectPath::from(full)
    }
}

#[async_trait]
impl StorageAdapter for LocalStorage {
    async fn store(
        &self,
        pod: &str,
        stream_path: &str,
        record_name: &str,
        content_hash: &str,
        bytes: &[u8],
        ext: &str,
    ) -> Result<String> {
        let payload = Bytes::copy_from_slice(bytes);
        let by_hash = Self::by_hash_path(content_hash);
        self.store
            .put(&by_hash, payload.clone().into())
            .await
            .map_err(|e| Error::Storage(format!("store by-hash failed: {e}")))?;
        crate::metrics::record_storage_write(bytes.len() as u64);

        let by_name = Self::by_name_path(pod, stream_path, record_name, ext);
        self.store
            .put(&by_name, payload.into())
            .await
            .map_err(|e| Error::Storage(format!("store by-name failed: {e}")))?;
        crate::metrics::record_storage_write(bytes.len() as u64);

        Ok(sanitize_component(content_hash))
    }

    fn url(&self, storage_id: &str) -> String {
        format!("{}/{}", self.base_url, storage_id)
    }

    async fn delete(
        &self,
        pod: &str,
        stream_path: &str,
        record_name: &str,
        hash: &str,
        ext: &str,
        purge: bool,
    ) -> Result<()> {
        let by_name = Self::by_name_path(pod, stream_path, record_name, ext);
        if let Err(e) = self.store.delete(&by_name).await {
            log::warn!("[storage] delete by-name failed: {e}");
        }
        crate::metrics::record_storage_delete();
        if purge {
            let by_hash = Self::by_hash_path(hash);
            if let Err(e) = self.store.delete(&by_hash).await {
                log::warn!("[storage] delete by-hash failed: {e}");
            }
            crate::metrics::record_storage_delete();
        }
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        let p = ObjectPath::from(path);
        match self.store.head(&p).await {
            Ok(meta) => {
                crate::metrics::record_storage_read(meta.size as u64);
                Ok(true)
            }
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(Error::Storage(format!("exists check failed: {e}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stores_both_by_hash_and_by_name_paths() {
        let dir = tempdir();
        let storage = LocalStorage::new(&dir, "http://localhost/blobs");
        let id = storage
            .store("alice", "/photos", "cat.png", "abc123", b"pixels", "png")
            .await
            .unwrap();
        assert_eq!(id, "abc123");
        assert!(
            std::path::Path::new(&format!("{dir}/.storage/abc123")).exists()
        );
        assert!(
            std::path::Path::new(&format!("{dir}/alice/photos/cat.png.png")).exists()
        );
    }

    #[tokio::test]
    async fn delete_without_purge_keeps_by_hash() {
        let dir = tempdir();
        let storage = LocalStorage::new(&dir, "http://localhost/blobs");
        storage
            .store("alice", "/photos", "cat.png", "abc123", b"pixels", "png")
            .await
            .unwrap();
        storage
            .delete("alice", "/photos", "cat.png", "abc123", "png", false)
            .await
            .unwrap();
        assert!(std::path::Path::new(&format!("{dir}/.storage/abc123")).exists());
        assert!(!std::path::Path::new(&format!("{dir}/alice/photos/cat.png.png")).exists());
    }

    #[tokio::test]
    async fn purge_removes_by_hash_too() {
        let dir = tempdir();
        let storage = LocalStorage::new(&dir, "http://localhost/blobs");
        storage
            .store("alice", "/photos", "cat.png", "abc123", b"pixels", "png")
            .await
            .unwrap();
        storage
            .delete("alice", "/photos", "cat.png", "abc123", "png", true)
            .await
            .unwrap();
        assert!(!std::path::Path::new(&format!("{dir}/.storage/abc123")).exists());
    }

    fn tempdir() -> String {
        let dir = std::env::temp_dir().join(format!("podstream-test-{}", uuid::Uuid::new_v4()));
        dir.to_string_lossy().to_string()
    }
}
