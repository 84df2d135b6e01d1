// External storage adapter contract (spec.md §4.7).

pub mod local;

use async_trait::async_trait;

use crate::errors::Result;

/// Strips `.`, `..`, and unsafe characters from a single path component so
/// adapter implementations never need to re-derive this themselves.
pub fn sanitize_component(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect();
    if cleaned.is_empty() {
        "_".to_string()
    } else {
        cleaned
    }
}

/// `[A-Za-z0-9]` only; an empty or invalid extension becomes `bin`.
pub fn sanitize_extension(raw: &str) -> String {
    let cleaned: String = raw.chars().filter(|c| c.is_ascii_alphanumeric()).collect();
    if cleaned.is_empty() {
        "bin".to_string()
    } else {
        cleaned
    }
}

#[async_trait]
pub trait StorageAdapter: Send + Sync {
    /// Writes both the permanent by-hash object (`.storage/<hash>`) and the
    /// overwritable by-name object (`<stream_path>/<record_name>.<ext>`),
    /// returning an opaque storage id the DB row keeps in `storage`.
    async fn store(
        &self,
        pod: &str,
        stream_path: &str,
        record_name: &str,
        content_hash: &str,
        bytes: &[u8],
        ext: &str,
    ) -> Result<String>;

    /// A URL clients can `GET` for the content addressed by `storage_id`.
    fn url(&self, storage_id: &str) -> String;

    /// Always removes the by-name object; removes the by-hash object only
    /// when `purge` is set (spec.md §4.5, §4.7).
    async fn delete(
        &self,
        pod: &str,
        stream_path: &str,
        record_name: &str,
        hash: &str,
        ext: &str,
        purge: bool,
    ) -> Result<()>;

    async fn exists(&self, path: &str) -> Result<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitizes_traversal_attempts() {
        assert_eq!(sanitize_component(".."), "_");
        assert_eq!(sanitize_component("."), "_");
        assert_eq!(sanitize_component("../../etc/passwd"), "etcpasswd");
        assert_eq!(sanitize_component("my-record_1"), "my-record_1");
    }

    #[test]
    fn sanitizes_extensions() {
        assert_eq!(sanitize_extension("png"), "png");
        assert_eq!(sanitize_extension("../../sh"), "sh");
        assert_eq!(sanitize_extension(""), "bin");
        assert_eq!(sanitize_extension("tar.gz"), "targz");
    }
}
