mod app_state;
mod config;
mod cookies;
mod events;
mod extractor;
mod metrics;
mod page;
mod publisher;
mod session;

use crate::app_state::AppState;
use actix_web::{get, web, App, HttpResponse, HttpServer, Responder};
use log::{error, info};
use std::sync::Arc;

/// Normalizes a requested stream identifier: trims whitespace and strips a
/// single leading `@`. Returns `None` when nothing usable remains.
fn normalize_username(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let stripped = trimmed.strip_prefix('@').unwrap_or(trimmed);
    if stripped.is_empty() {
        None
    } else {
        Some(stripped.to_string())
    }
}

#[get("/stream/{username}")]
async fn stream_live(data: web::Data<AppState>, username: web::Path<String>) -> impl Responder {
    let target = match normalize_username(&username) {
        Some(target) => target,
        None => {
            return HttpResponse::BadRequest().body("Username is required in the URL path.");
        }
    };

    info!("Stream requested for @{}", target);
    let rx = publisher::spawn_stream(
        data.session.clone(),
        target,
        data.metrics.clone(),
        data.config.clone(),
    );

    // Always 200: anything after this point is reported in-band.
    HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header(("Cache-Control", "no-cache"))
        .insert_header(("Connection", "keep-alive"))
        .streaming(publisher::sse_body(rx))
}

#[get("/metrics")]
async fn get_metrics(data: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(data.metrics.get_all())
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    log4rs::init_file("log4rs.yml", Default::default()).unwrap();

    let cfg = config::Config::load();

    info!("Initializing shared browser session...");
    let manager = match session::SessionManager::initialize(&cfg) {
        Ok(manager) => Arc::new(manager),
        Err(e) => {
            error!("FATAL: failed to initialize browser session: {}", e);
            // No stream can ever be served without an authenticated browser.
            std::process::exit(1);
        }
    };
    info!("Browser session ready");

    let data = web::Data::new(AppState {
        session: manager,
        metrics: metrics::RelayMetrics::new(),
        config: cfg,
    });

    // Try to bind to an available port starting at 8080
    let mut last_err: Option<std::io::Error> = None;
    for port in 8080..=8090 {
        let data_clone = data.clone();
        let addr = format!("127.0.0.1:{}", port);
        match HttpServer::new(move || {
            App::new()
                .app_data(data_clone.clone())
                .service(stream_live)
                .service(get_metrics)
        })
        .bind(&addr)
        {
            Ok(server) => {
                info!("Listening on {}", addr);
                return server.run().await;
            }
            Err(e) => {
                last_err = Some(e);
                continue;
            }
        }
    }
    Err(last_err.unwrap_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::AddrInUse,
            "No available ports 8080-8090",
        )
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_username_strips_at_sign() {
        assert_eq!(normalize_username("@charli"), Some("charli".to_string()));
        assert_eq!(normalize_username("charli"), Some("charli".to_string()));
    }

    #[test]
    fn test_normalize_username_trims_whitespace() {
        assert_eq!(normalize_username("  @charli "), Some("charli".to_string()));
    }

    #[test]
    fn test_normalize_username_rejects_empty() {
        assert_eq!(normalize_username(""), None);
        assert_eq!(normalize_username("@"), None);
        assert_eq!(normalize_username("   "), None);
    }

    #[test]
    fn test_normalize_username_strips_only_one_at_sign() {
        assert_eq!(normalize_username("@@x"), Some("@x".to_string()));
    }
}
