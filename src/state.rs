// Process-global collaborators (cache, rate limiter, storage adapter,
// schema-compilation cache), injected as abstract interfaces so tests can
// substitute fakes (spec.md §9).

use std::sync::Arc;
use std::time::Duration;

use crate::cache::Pool;
use crate::config::get_config;
use crate::domain::schema_validator::SchemaCache;
use crate::rate_limit::RateLimiter;
use crate::storage::StorageAdapter;
use crate::table::pods::PodRecord;
use crate::table::streams::StreamRecord;

#[derive(Clone)]
pub enum PodCacheEntry {
    Pod(PodRecord),
    UserPodList(Vec<String>),
}

#[derive(Clone)]
pub enum StreamCacheEntry {
    Stream(StreamRecord),
    Children(Vec<StreamRecord>),
    StreamsByPod(Vec<StreamRecord>),
}

#[derive(Clone)]
pub struct RecordListPage {
    pub records: Vec<crate::table::records::RecordRow>,
    pub total: i64,
    pub has_more: bool,
}

pub struct AppState {
    pub pods_cache: Pool<PodCacheEntry>,
    pub streams_cache: Pool<StreamCacheEntry>,
    pub single_records_cache: Pool<crate::table::records::RecordRow>,
    pub record_lists_cache: Pool<RecordListPage>,
    pub rate_limiter: Arc<dyn RateLimiter>,
    pub storage: Option<Arc<dyn StorageAdapter>>,
    pub schema_cache: SchemaCache,
}

impl AppState {
    pub fn new(rate_limiter: Arc<dyn RateLimiter>, storage: Option<Arc<dyn StorageAdapter>>) -> Self {
        let cfg = get_config();
        let ttl = Duration::from_secs(cfg.cache_ttl_secs);
        Self {
            pods_cache: Pool::new(cfg.cache_pods_cap, ttl),
            streams_cache: Pool::new(cfg.cache_streams_cap, ttl),
            single_records_cache: Pool::new(cfg.cache_single_record_cap, ttl),
            record_lists_cache: Pool::new(cfg.cache_record_lists_cap, ttl),
            rate_limiter,
            storage,
            schema_cache: SchemaCache::new(),
        }
    }

    pub fn invalidate_stream(&self, pod: &str, path: &str) {
        self.streams_cache.delete(&format!("stream:{pod}:{path}"));
        self.streams_cache.clear_prefix(&format!("children:{pod}:"));
        self.streams_cache.delete(&format!("by_pod:{pod}"));
    }

    pub fn invalidate_record(&self, stream_id: i64, name: &str) {
        self.single_records_cache
            .delete(&format!("record:{stream_id}:{name}"));
        self.record_lists_cache
            .clear_prefix(&format!("list:{stream_id}:"));
        self.record_lists_cache.clear_prefix("rlist:");
    }

    pub fn invalidate_user_pods(&self, user_id: &str) {
        self.pods_cache.delete(&format!("user_pods:{user_id}"));
    }

    /// Cumulative hit/miss counts across the four pools (spec.md §2 ambient
    /// "Metrics" row); internal-only, no HTTP surface exposes this.
    pub fn cache_metrics(&self) -> CacheMetricsSnapshot {
        CacheMetricsSnapshot {
            pods_hits: self.pods_cache.hits(),
            pods_misses: self.pods_cache.misses(),
            streams_hits: self.streams_cache.hits(),
            streams_misses: self.streams_cache.misses(),
            single_records_hits: self.single_records_cache.hits(),
            single_records_misses: self.single_records_cache.misses(),
            record_lists_hits: self.record_lists_cache.hits(),
            record_lists_misses: self.record_lists_cache.misses(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheMetricsSnapshot {
    pub pods_hits: usize,
    pub pods_misses: usize,
    pub streams_hits: usize,
    pub streams_misses: usize,
    pub single_records_hits: usize,
    pub single_records_misses: usize,
    pub record_lists_hits: usize,
    pub record_lists_misses: usize,
}
