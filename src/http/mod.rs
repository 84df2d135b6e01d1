pub mod handlers;
pub mod pod_host;
pub mod query;
pub mod session;

use actix_cors::Cors;
use actix_web::web;

use crate::state::AppState;

/// Wires the core HTTP surface of spec.md §6.2 onto an `actix_web::App`'s
/// `ServiceConfig`, shared by the real server binary and integration tests
/// that spin up an in-process app.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/").route(web::get().to(handlers::get_root)))
        .service(web::resource("/").route(web::delete().to(handlers::delete_pod)))
        .service(
            web::resource("/{path:.*}")
                .route(web::get().to(handlers::get_path))
                .route(web::post().to(handlers::post_path))
                .route(web::patch().to(handlers::patch_path))
                .route(web::delete().to(handlers::delete_path)),
        );
}

pub fn cors() -> Cors {
    Cors::permissive()
}
