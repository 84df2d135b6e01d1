// Identifier syntax (spec.md §6.4).

use once_cell::sync::Lazy;
use regex::Regex;

use crate::errors::{Error, Result};

static POD_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9]([a-z0-9-]{0,61}[a-z0-9])?$").unwrap());

pub fn validate_pod_name(name: &str) -> Result<()> {
    if !POD_NAME_RE.is_match(name) {
        return Err(Error::InvalidInput(format!("invalid pod name: {name}")));
    }
    Ok(())
}

/// A stream segment is one path component of a stream's full path: non-empty,
/// contains no `/`, and does not start or end with `.` (spec.md §6.4) —
/// except the reserved `.config` segment itself, which is the one dot-led
/// name system streams are allowed to use (spec.md §6.5).
pub fn validate_stream_segment(segment: &str) -> Result<()> {
    if segment.is_empty() || segment.contains('/') {
        return Err(Error::InvalidInput(format!(
            "invalid stream segment: {segment}"
        )));
    }
    if segment == ".config" {
        return Ok(());
    }
    if segment.starts_with('.') || segment.ends_with('.') {
        return Err(Error::InvalidInput(format!(
            "invalid stream segment: {segment}"
        )));
    }
    Ok(())
}

const RECORD_NAME_MAX_LEN: usize = 256;

pub fn validate_record_name(name: &str) -> Result<()> {
    if name.is_empty() || name.len() > RECORD_NAME_MAX_LEN {
        return Err(Error::InvalidInput(format!("invalid record name: {name}")));
    }
    if name.contains('/') {
        return Err(Error::InvalidInput(format!("invalid record name: {name}")));
    }
    if name.starts_with('.') || name.ends_with('.') {
        return Err(Error::InvalidInput(format!("invalid record name: {name}")));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-')
    {
        return Err(Error::InvalidInput(format!("invalid record name: {name}")));
    }
    Ok(())
}

pub fn is_system_path(path: &str) -> bool {
    let trimmed = path.trim_start_matches('/');
    trimmed == ".config" || trimmed.starts_with(".config/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pod_names() {
        assert!(validate_pod_name("alice").is_ok());
        assert!(validate_pod_name("a").is_ok());
        assert!(validate_pod_name("a-b-c9").is_ok());
        assert!(validate_pod_name("Alice").is_err());
        assert!(validate_pod_name("-alice").is_err());
        assert!(validate_pod_name("alice-").is_err());
        assert!(validate_pod_name("").is_err());
        assert!(validate_pod_name(&"a".repeat(64)).is_err());
    }

    #[test]
    fn stream_segments() {
        assert!(validate_stream_segment("blog").is_ok());
        assert!(validate_stream_segment(".config").is_ok());
        assert!(validate_stream_segment("").is_err());
        assert!(validate_stream_segment("a/b").is_err());
        assert!(validate_stream_segment(".hidden").is_err());
        assert!(validate_stream_segment("trailing.").is_err());
    }

    #[test]
    fn record_names() {
        assert!(validate_record_name("draft").is_ok());
        assert!(validate_record_name("draft.deleted.123").is_ok());
        assert!(validate_record_name("").is_err());
        assert!(validate_record_name("a/b").is_err());
        assert!(validate_record_name(".hidden").is_err());
        assert!(validate_record_name("trailing.").is_err());
        assert!(validate_record_name(&"a".repeat(257)).is_err());
    }

    #[test]
    fn system_paths() {
        assert!(is_system_path("/.config"));
        assert!(is_system_path("/.config/routing"));
        assert!(is_system_path(".config/owner"));
        assert!(!is_system_path("/blog"));
    }
}
