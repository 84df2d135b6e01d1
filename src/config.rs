// Process-wide configuration, loaded once from the environment.
//
// Mirrors the teacher's `config::get_config()` pattern: a single lazily
// built struct that the rest of the crate reads through a free function
// rather than threading a config value through every call site.

use once_cell::sync::Lazy;
use std::env;

#[derive(Debug, Clone)]
pub struct Settings {
    pub host: String,
    pub http_port: u16,
    pub database_url: String,
    pub data_dir: String,
    pub jwt_secret: String,

    pub cache_pods_cap: usize,
    pub cache_streams_cap: usize,
    pub cache_single_record_cap: usize,
    pub cache_single_record_max_bytes: usize,
    pub cache_record_lists_cap: usize,
    pub cache_ttl_secs: u64,

    pub rate_limit_window_ms: i64,
    pub rate_limit_reads: u32,
    pub rate_limit_writes: u32,
    pub rate_limit_pod_create: u32,
    pub rate_limit_stream_create: u32,
    pub rate_limit_cleanup_interval_secs: u64,

    pub list_default_limit: i64,
    pub list_max_limit: i64,

    pub external_storage_enabled: bool,
    pub external_storage_binary_threshold_bytes: usize,

    pub permission_stream_max_hops: u8,
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Settings {
    fn from_env() -> Self {
        Self {
            host: env_or("PODSTREAM_HOST", "0.0.0.0"),
            http_port: env_parse("PODSTREAM_HTTP_PORT", 8080),
            database_url: env_or("PODSTREAM_DATABASE_URL", "sqlite::memory:"),
            data_dir: env_or("PODSTREAM_DATA_DIR", "./data"),
            jwt_secret: env_or("PODSTREAM_JWT_SECRET", "dev-secret-change-me"),

            cache_pods_cap: env_parse("PODSTREAM_CACHE_PODS_CAP", 10_000),
            cache_streams_cap: env_parse("PODSTREAM_CACHE_STREAMS_CAP", 50_000),
            cache_single_record_cap: env_parse("PODSTREAM_CACHE_RECORDS_CAP", 50_000),
            cache_single_record_max_bytes: env_parse("PODSTREAM_CACHE_RECORD_MAX_BYTES", 65_536),
            cache_record_lists_cap: env_parse("PODSTREAM_CACHE_LISTS_CAP", 10_000),
            cache_ttl_secs: env_parse("PODSTREAM_CACHE_TTL_SECS", 60),

            rate_limit_window_ms: env_parse("PODSTREAM_RATE_LIMIT_WINDOW_MS", 60_000),
            rate_limit_reads: env_parse("PODSTREAM_RATE_LIMIT_READS", 600),
            rate_limit_writes: env_parse("PODSTREAM_RATE_LIMIT_WRITES", 120),
            rate_limit_pod_create: env_parse("PODSTREAM_RATE_LIMIT_POD_CREATE", 5),
            rate_limit_stream_create: env_parse("PODSTREAM_RATE_LIMIT_STREAM_CREATE", 60),
            rate_limit_cleanup_interval_secs: env_parse(
                "PODSTREAM_RATE_LIMIT_CLEANUP_INTERVAL_SECS",
                30,
            ),

            list_default_limit: env_parse("PODSTREAM_LIST_DEFAULT_LIMIT", 100),
            list_max_limit: env_parse("PODSTREAM_LIST_MAX_LIMIT", 1000),

            external_storage_enabled: env_parse("PODSTREAM_EXTERNAL_STORAGE_ENABLED", true),
            external_storage_binary_threshold_bytes: env_parse(
                "PODSTREAM_EXTERNAL_STORAGE_THRESHOLD_BYTES",
                262_144,
            ),

            permission_stream_max_hops: env_parse("PODSTREAM_PERMISSION_MAX_HOPS", 8),
        }
    }
}

static SETTINGS: Lazy<Settings> = Lazy::new(|| {
    // best-effort; a missing .env is not an error
    let _ = dotenvy::dotenv();
    Settings::from_env()
});

pub fn get_config() -> &'static Settings {
    &SETTINGS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let s = Settings::from_env();
        assert!(s.list_default_limit <= s.list_max_limit);
        assert!(s.permission_stream_max_hops > 0);
    }
}
