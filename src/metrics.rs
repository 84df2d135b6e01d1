// Internal-only counters (spec.md §2 ambient "Metrics" row): no HTTP
// surface, just process-wide tallies a future admin endpoint or log line
// could read. Grounded on the teacher's `config::metrics::STORAGE_*`
// counters in `infra/src/storage/local.rs`, reduced from prometheus
// gauges to plain atomics since nothing here exports to a scrape endpoint.

use std::sync::atomic::{AtomicU64, Ordering};

static STORAGE_READ_BYTES: AtomicU64 = AtomicU64::new(0);
static STORAGE_READ_REQUESTS: AtomicU64 = AtomicU64::new(0);
static STORAGE_WRITE_BYTES: AtomicU64 = AtomicU64::new(0);
static STORAGE_WRITE_REQUESTS: AtomicU64 = AtomicU64::new(0);
static STORAGE_DELETE_REQUESTS: AtomicU64 = AtomicU64::new(0);

pub fn record_storage_write(bytes: u64) {
    STORAGE_WRITE_BYTES.fetch_add(bytes, Ordering::Relaxed);
    STORAGE_WRITE_REQUESTS.fetch_add(1, Ordering::Relaxed);
}

pub fn record_storage_read(bytes: u64) {
    STORAGE_READ_BYTES.fetch_add(bytes, Ordering::Relaxed);
    STORAGE_READ_REQUESTS.fetch_add(1, Ordering::Relaxed);
}

pub fn record_storage_delete() {
    STORAGE_DELETE_REQUESTS.fetch_add(1, Ordering::Relaxed);
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StorageSnapshot {
    pub read_bytes: u64,
    pub read_requests: u64,
    pub write_bytes: u64,
    pub write_requests: u64,
    pub delete_requests: u64,
}

pub fn storage_snapshot() -> StorageSnapshot {
    StorageSnapshot {
        read_bytes: STORAGE_READ_BYTES.load(Ordering::Relaxed),
        read_requests: STORAGE_READ_REQUESTS.load(Ordering::Relaxed),
        write_bytes: STORAGE_WRITE_BYTES.load(Ordering::Relaxed),
        write_requests: STORAGE_WRITE_REQUESTS.load(Ordering::Relaxed),
        delete_requests: STORAGE_DELETE_REQUESTS.load(Ordering::Relaxed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_and_read_counters_accumulate() {
        let before = storage_snapshot();
        record_storage_write(10);
        record_storage_read(3);
        record_storage_delete();
        let after = storage_snapshot();
        assert_eq!(after.write_bytes - before.write_bytes, 10);
        assert_eq!(after.write_requests - before.write_requests, 1);
        assert_eq!(after.read_bytes - before.read_bytes, 3);
        assert_eq!(after.read_requests - before.read_requests, 1);
        assert_eq!(after.delete_requests - before.delete_requests, 1);
    }
}
