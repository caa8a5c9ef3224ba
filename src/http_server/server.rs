//! # HTTP Server
//!
//! Combines the auth, user and workspace routers under `/api` and applies
//! the shared middleware stack: tracing, security headers, CORS, request
//! deadline and per-client rate limiting.

use std::future::{Future, IntoFuture};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    http::{
        header::{self, HeaderName, HeaderValue},
        Method,
    },
    middleware,
    routing::get,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    set_header::SetResponseHeaderLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use super::auth_routes::auth_routes;
use super::config::HttpServerConfig;
use super::rate_limit::{limit_by_ip, ClientLimiter};
use super::state::AppState;
use super::user_routes::user_routes;
use super::workspace_routes::workspace_routes;

const HEALTH_MESSAGE: &str = "Floe CMS is running";

const SECURITY_HEADERS: [(HeaderName, &str); 6] = [
    (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
    (header::X_FRAME_OPTIONS, "DENY"),
    (header::X_XSS_PROTECTION, "1; mode=block"),
    (
        header::CONTENT_SECURITY_POLICY,
        "default-src 'self'; script-src 'self' 'unsafe-inline'; style-src 'self' 'unsafe-inline'; img-src 'self' data:;",
    ),
    (header::REFERRER_POLICY, "strict-origin-when-cross-origin"),
    (header::STRICT_TRANSPORT_SECURITY, "max-age=31536000; includeSubDomains"),
];

/// HTTP server for the CMS API
pub struct HttpServer {
    config: HttpServerConfig,
    router: Router,
    limiter: Option<Arc<ClientLimiter>>,
}

impl HttpServer {
    /// Create a server bound to `config` serving `state`
    pub fn with_config(config: HttpServerConfig, state: AppState) -> Self {
        let limiter = config.rate_limit.limiter();
        if limiter.is_none() {
            tracing::warn!(rate_limit = ?config.rate_limit, "rate limit cannot be enforced, requests are unlimited");
        }

        let router = Self::build_router(&config, state, limiter.clone());
        Self {
            config,
            router,
            limiter,
        }
    }

    /// Build the combined router with all endpoints
    fn build_router(
        config: &HttpServerConfig,
        state: AppState,
        limiter: Option<Arc<ClientLimiter>>,
    ) -> Router {
        let api = Router::new()
            .route("/health", get(health_handler))
            .nest("/auth", auth_routes(state.clone()))
            .merge(user_routes(state.clone()))
            .merge(workspace_routes(state));

        let mut router = Router::new().nest("/api", api);
        if let Some(limiter) = limiter {
            router = router.layer(middleware::from_fn_with_state(limiter, limit_by_ip));
        }

        router = router
            .layer(TimeoutLayer::new(config.request_timeout()))
            .layer(cors_layer(config));

        for (name, value) in SECURITY_HEADERS {
            router = router.layer(SetResponseHeaderLayer::overriding(
                name,
                HeaderValue::from_static(value),
            ));
        }

        router.layer(TraceLayer::new_for_http())
    }

    /// Get the socket address
    pub fn socket_addr(&self) -> String {
        self.config.socket_addr()
    }

    /// Get the router (for testing)
    pub fn router(self) -> Router {
        self.router
    }

    /// Serve until Ctrl-C or SIGTERM
    pub async fn start(self) -> io::Result<()> {
        self.start_with_shutdown(shutdown_signal()).await
    }

    /// Serve until `signal` resolves, then drain in-flight requests
    ///
    /// Connections still open once the graceful shutdown window elapses are
    /// dropped.
    pub async fn start_with_shutdown<F>(self, signal: F) -> io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr: SocketAddr = self
            .config
            .socket_addr()
            .parse()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

        let listener = TcpListener::bind(addr).await?;
        tracing::info!(%addr, "Floe CMS listening");

        // Forget idle client buckets once per window
        let sweeper = self.limiter.clone().map(|limiter| {
            let window = self.config.rate_limit.window;
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(window);
                loop {
                    interval.tick().await;
                    limiter.retain_recent();
                    limiter.shrink_to_fit();
                }
            })
        });

        let stopping = Arc::new(Notify::new());
        let notify = stopping.clone();
        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();
        let server = axum::serve(listener, app).with_graceful_shutdown(async move {
            signal.await;
            tracing::info!("shutdown signal received, draining connections");
            notify.notify_one();
        });

        let grace = self.config.graceful_shutdown();
        let deadline = async move {
            stopping.notified().await;
            tokio::time::sleep(grace).await;
        };

        let outcome = tokio::select! {
            result = server.into_future() => result,
            _ = deadline => {
                tracing::warn!(
                    grace_secs = grace.as_secs(),
                    "graceful shutdown window elapsed, dropping open connections"
                );
                Ok(())
            }
        };

        if let Some(sweeper) = sweeper {
            sweeper.abort();
        }
        outcome?;

        tracing::info!("server stopped");
        Ok(())
    }
}

async fn health_handler() -> &'static str {
    HEALTH_MESSAGE
}

fn cors_layer(config: &HttpServerConfig) -> CorsLayer {
    let origins = if config.cors_origins.is_empty() {
        AllowOrigin::any()
    } else {
        let origins: Vec<HeaderValue> = config
            .cors_origins
            .iter()
            .filter_map(|s| s.parse().ok())
            .collect();
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::ACCEPT,
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static("x-csrf-token"),
        ])
        .expose_headers(Any)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
