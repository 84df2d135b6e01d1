// Content and record-link hash derivation (GLOSSARY: Hash chain).
//
// `hash = SHA256(previous_hash || content_hash || user_id || timestamp)`,
// with `previous_hash` replaced by the sentinel "∅" for the first record
// in a stream (spec.md §4.3 step 6).

pub const GENESIS_MARKER: &str = "\u{2205}"; // "∅"

pub fn content_hash(bytes: &[u8]) -> String {
    sha256::digest(bytes)
}

/// `timestamp_iso` must be the exact string embedded in the record's
/// `hash`, so callers normalize a single timestamp once and reuse it for
/// both the stored `created_at` and this derivation.
pub fn record_hash(
    previous_hash: Option<&str>,
    content_hash: &str,
    user_id: &str,
    timestamp_iso: &str,
) -> String {
    let prev = previous_hash.unwrap_or(GENESIS_MARKER);
    let mut buf = String::with_capacity(prev.len() + content_hash.len() + user_id.len() + timestamp_iso.len());
    buf.push_str(prev);
    buf.push_str(content_hash);
    buf.push_str(user_id);
    buf.push_str(timestamp_iso);
    sha256::digest(buf.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn genesis_hash_uses_sentinel() {
        let c = content_hash(b"hi");
        let h0 = record_hash(None, &c, "alice", "2026-01-01T00:00:00Z");
        let h1 = record_hash(Some(GENESIS_MARKER), &c, "alice", "2026-01-01T00:00:00Z");
        assert_eq!(h0, h1);
    }

    #[test]
    fn hash_changes_with_any_input() {
        let c = content_hash(b"hi");
        let base = record_hash(None, &c, "alice", "t0");
        assert_ne!(base, record_hash(Some("x"), &c, "alice", "t0"));
        assert_ne!(base, record_hash(None, &content_hash(b"bye"), "alice", "t0"));
        assert_ne!(base, record_hash(None, &c, "bob", "t0"));
        assert_ne!(base, record_hash(None, &c, "alice", "t1"));
    }

    #[test]
    fn content_hash_is_deterministic() {
        assert_eq!(content_hash(b"hi"), content_hash(b"hi"));
        assert_ne!(content_hash(b"hi"), content_hash(b"ho"));
    }
}
