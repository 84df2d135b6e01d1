use std::sync::Arc;

use actix_web::{web, App, HttpServer};

use podstream::config::get_config;
use podstream::db;
use podstream::rate_limit::{FixedWindowLimiter, RateLimiter, SlidingWindowLimiter};
use podstream::state::AppState;
use podstream::storage::local::LocalStorage;
use podstream::storage::StorageAdapter;
use podstream::table;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init();

    let cfg = get_config();
    log::info!("starting podstream on {}:{}", cfg.host, cfg.http_port);

    table::create_all_tables()
        .await
        .expect("failed to initialize tables");

    let rate_limiter: Arc<dyn RateLimiter> = if db::is_sqlite() {
        Arc::new(SlidingWindowLimiter::new())
    } else {
        Arc::new(FixedWindowLimiter)
    };

    let storage: Option<Arc<dyn StorageAdapter>> = if cfg.external_storage_enabled {
        let base_url = format!("http://{}:{}/blobs", cfg.host, cfg.http_port);
        Some(Arc::new(LocalStorage::new(&cfg.data_dir, &base_url)))
    } else {
        None
    };

    let state = web::Data::new(AppState::new(rate_limiter, storage));

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(podstream::http::cors())
            .wrap(actix_web::middleware::Logger::default())
            .configure(podstream::http::configure)
    })
    .bind((cfg.host.as_str(), cfg.http_port))?
    .run()
    .await
}
