//! Axum server setup
//!
//! Server skeleton with:
//! - CORS from `CORS_ORIGIN` (`*` allows any origin)
//! - Tracing middleware
//! - Per-route rate limiting
//! - Graceful shutdown on SIGTERM/Ctrl+C

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::{HeaderValue, Method, Uri};
use axum::middleware;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::error::{expose_error_details, ApiError};
use super::rate_limit::RateLimits;
use super::routes;
use crate::config::{CorsOrigin, ServerConfig};
use crate::db::Database;

/// Shared application state
pub struct AppState {
    pub db: Database,
    pub config: ServerConfig,
}

fn cors_layer(origin: &CorsOrigin) -> CorsLayer {
    match origin {
        CorsOrigin::Any => {
            tracing::warn!("CORS: Permissive mode enabled - all origins allowed");
            CorsLayer::permissive()
        }
        CorsOrigin::List(origins) => {
            let origins: Vec<HeaderValue> = origins
                .iter()
                .filter_map(|o| match o.parse() {
                    Ok(value) => Some(value),
                    Err(_) => {
                        tracing::warn!(origin = %o, "ignoring unparseable CORS origin");
                        None
                    }
                })
                .collect();
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods(Any)
                .allow_headers(Any)
        }
    }
}

/// 404 for anything no route matched.
async fn fallback(method: Method, uri: Uri) -> ApiError {
    ApiError::RouteNotFound {
        method,
        path: uri.path().to_owned(),
    }
}

/// Build the application router.
///
/// Development routers also show store error text in `DATABASE_ERROR` bodies.
pub fn build_router(state: AppState) -> Router {
    let limits = RateLimits::new(&state.config.rate_limit);
    let cors = cors_layer(&state.config.cors_origin);

    let router = Router::new()
        .merge(routes::health::router())
        .merge(routes::blogs::router(&limits))
        .merge(routes::votes::router(&limits))
        .merge(routes::comments::router(&limits))
        .merge(routes::search::router(&limits))
        .merge(routes::tags::router(&limits))
        .merge(routes::calendar::router(&limits))
        .fallback(fallback);
    let router = if state.config.env.is_development() {
        router.layer(middleware::from_fn(expose_error_details))
    } else {
        router
    };

    router
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

/// Run the HTTP server until Ctrl+C or SIGTERM.
pub async fn run_server(db: Database, config: ServerConfig) -> Result<(), ServerError> {
    let bind_addr = config.bind_addr;
    tracing::info!(env = config.env.as_str(), "starting blog API");
    let app = build_router(AppState { db, config });

    let listener = TcpListener::bind(bind_addr).await?;
    tracing::info!("Server listening on {}", bind_addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
///
/// A handler that fails to install never fires; the other one still does.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting shutdown");
        }
    }
}

/// Server error type
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use blogctl_core::RetryPolicy;
    use serde_json::Value;
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;

    use super::*;
    use crate::config::RateLimitConfig;

    /// Router over a pool that never connects; routes that reach the store
    /// fail fast with a single attempt.
    fn app_with(configure: impl FnOnce(&mut ServerConfig)) -> Router {
        let url = "postgres://blog@127.0.0.1:1/blog";
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(Duration::from_millis(200))
            .connect_lazy(url)
            .expect("url parses");
        let policy = RetryPolicy {
            max_attempts: 1,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(1),
            max_jitter: Duration::ZERO,
        };
        let mut config = ServerConfig::new(url);
        config.env = crate::config::AppEnv::Test;
        config.admin_api_key = Some("secret".into());
        configure(&mut config);
        build_router(AppState {
            db: Database::with_policy(pool, policy),
            config,
        })
    }

    fn app() -> Router {
        app_with(|_| {})
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, headers, body)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn health_is_ok_without_a_database() {
        let (status, _, body) = send(app(), get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn root_lists_endpoints() {
        let (status, _, body) = send(app(), get("/")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["endpoints"]["blogs"], "/api/v1/blogs");
    }

    #[tokio::test]
    async fn database_probe_reports_503() {
        let (status, _, body) = send(app(), get("/health/db")).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["status"], "error");
        assert_eq!(body["database"], "disconnected");
    }

    #[tokio::test]
    async fn unknown_routes_get_the_error_envelope() {
        let (status, _, body) = send(app(), get("/api/v1/nope")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["code"], "NOT_FOUND");
        assert_eq!(body["error"]["message"], "Route GET /api/v1/nope not found");
    }

    #[tokio::test]
    async fn admin_routes_require_a_key() {
        let request = Request::post("/api/v1/blogs")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"title":"Hello"}"#))
            .unwrap();
        let (status, _, body) = send(app(), request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["message"], "API key is required for this operation");

        let request = Request::delete("/api/v1/blogs/hello")
            .header("x-api-key", "wrong")
            .body(Body::empty())
            .unwrap();
        let (status, _, body) = send(app(), request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["message"], "Invalid API key");
    }

    #[tokio::test]
    async fn unconfigured_admin_key_refuses_everyone() {
        let app = app_with(|config| config.admin_api_key = None);
        let request = Request::delete("/api/v1/calendar/events/00000000-0000-0000-0000-000000000000")
            .header("x-api-key", "anything")
            .body(Body::empty())
            .unwrap();
        let (status, _, _) = send(app, request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn invalid_query_is_422() {
        let (status, _, body) = send(app(), get("/api/v1/blogs?limit=500")).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        assert!(body["error"]["details"]["fields"]["limit"].is_array());

        let (status, _, body) = send(app(), get("/api/v1/search?q=")).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["error"]["details"]["fields"]["q"].is_array());
    }

    #[tokio::test]
    async fn invalid_path_params_are_422() {
        let (status, _, body) = send(app(), get("/api/v1/blogs/Not_A_Slug")).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["error"]["details"]["fields"]["slug"].is_array());

        let (status, _, _) = send(app(), get("/api/v1/calendar/events/not-a-uuid")).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn invalid_body_is_422() {
        let request = Request::post("/api/v1/blogs/hello/comments")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"name":"","comment":"hi"}"#))
            .unwrap();
        let (status, _, body) = send(app(), request).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["error"]["details"]["fields"]["name"].is_array());
    }

    #[tokio::test]
    async fn store_failures_are_database_errors() {
        let (status, _, body) = send(app(), get("/api/v1/tags")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["code"], "DATABASE_ERROR");
    }

    #[tokio::test]
    async fn error_details_follow_each_routers_own_env() {
        let development = app_with(|config| config.env = crate::config::AppEnv::Development);
        let production = app_with(|config| config.env = crate::config::AppEnv::Production);

        let (status, _, body) = send(production, get("/api/v1/tags")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["code"], "DATABASE_ERROR");
        assert!(body["error"].get("details").is_none());

        let (status, _, body) = send(development, get("/api/v1/tags")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["message"], "Database operation failed");
        assert!(body["error"]["details"]["message"].is_string());
    }

    #[tokio::test]
    async fn public_routes_are_rate_limited() {
        let app = app_with(|config| {
            config.rate_limit = RateLimitConfig {
                window: Duration::from_secs(60),
                max_requests: 1,
                admin_max_requests: 1,
                trust_proxy: false,
            };
        });
        let request = || {
            Request::get("/api/v1/blogs?limit=0")
                .header("x-forwarded-for", "198.51.100.9")
                .body(Body::empty())
                .unwrap()
        };

        let (status, headers, _) = send(app.clone(), request()).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(headers["ratelimit-limit"], "1");
        assert_eq!(headers["ratelimit-remaining"], "0");

        let (status, headers, body) = send(app, request()).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["error"]["code"], "RATE_LIMIT_EXCEEDED");
        assert_eq!(
            body["error"]["message"],
            "Too many requests from this IP, please try again later."
        );
        assert!(headers.contains_key("ratelimit-reset"));
    }

    #[tokio::test]
    async fn rotating_forwarded_for_does_not_reset_the_limit() {
        let app = app_with(|config| {
            config.rate_limit.max_requests = 1;
        });
        let request = |i: u8| {
            let mut request = Request::get("/api/v1/blogs?limit=0")
                .header("x-forwarded-for", format!("10.0.0.{i}"))
                .body(Body::empty())
                .unwrap();
            request
                .extensions_mut()
                .insert(axum::extract::ConnectInfo(SocketAddr::from(([198, 51, 100, 9], 4000))));
            request
        };

        let mut statuses = Vec::new();
        for i in 0..5 {
            let (status, _, _) = send(app.clone(), request(i)).await;
            statuses.push(status);
        }
        assert_eq!(statuses[0], StatusCode::UNPROCESSABLE_ENTITY);
        assert!(statuses[1..].iter().all(|s| *s == StatusCode::TOO_MANY_REQUESTS));
    }

    #[tokio::test]
    async fn trusted_proxy_keys_on_forwarded_for() {
        let app = app_with(|config| {
            config.rate_limit.max_requests = 1;
            config.rate_limit.trust_proxy = true;
        });
        for i in 0..3u8 {
            let request = Request::get("/api/v1/blogs?limit=0")
                .header("x-forwarded-for", format!("10.0.0.{i}"))
                .body(Body::empty())
                .unwrap();
            let (status, _, _) = send(app.clone(), request).await;
            assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        }
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn blog_lifecycle_against_live_database() {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL required");
        let pool = crate::db::create_pool(&url, 2).await.expect("pool");
        let db = Database::new(pool);
        crate::db::migrations::run(&db).await.expect("migrations");

        let mut config = ServerConfig::new(url);
        config.admin_api_key = Some("secret".into());
        let app = build_router(AppState { db, config });

        let title = format!("Lifecycle {}", uuid::Uuid::new_v4());
        let create = Request::post("/api/v1/blogs")
            .header("content-type", "application/json")
            .header("x-api-key", "secret")
            .body(Body::from(
                serde_json::json!({
                    "title": title,
                    "status": "published",
                    "tags": ["Rust"],
                    "blocks": [{ "type": "paragraph", "content": { "text": "hello world" } }]
                })
                .to_string(),
            ))
            .unwrap();
        let (status, _, body) = send(app.clone(), create).await;
        assert_eq!(status, StatusCode::CREATED);
        let slug = body["data"]["blog"]["slug"].as_str().unwrap().to_owned();
        assert_eq!(body["data"]["blog"]["meta"]["readTime"], 1);

        let (status, _, body) = send(app.clone(), get(&format!("/api/v1/blogs/{slug}"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["blog"]["tags"][0], "Rust");

        let vote = Request::post(format!("/api/v1/blogs/{slug}/vote"))
            .header("content-type", "application/json")
            .header("x-session-id", "lifecycle-session")
            .body(Body::from(r#"{"voteType":"upvote"}"#))
            .unwrap();
        let (status, _, body) = send(app.clone(), vote).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["voting"]["upvotes"], 1);
        assert_eq!(body["data"]["voting"]["userVote"], "upvote");

        let delete = Request::delete(format!("/api/v1/blogs/{slug}"))
            .header("x-api-key", "secret")
            .body(Body::empty())
            .unwrap();
        let (status, _, _) = send(app.clone(), delete).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _, _) = send(app, get(&format!("/api/v1/blogs/{slug}"))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
