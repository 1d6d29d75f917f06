//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the API handlers
//! - Wrap every route (and the fallback) in the request gate
//! - Wire up tracing, request ID and timeout layers
//! - Run the rate-limit sweeper alongside the server
//! - Serve until the shutdown signal

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::FromRef,
    http::Request,
    middleware,
    routing::get,
    Router,
};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::GateConfig;
use crate::http::handlers;
use crate::http::middleware::{gate_middleware, RequestGate};
use crate::http::request::{request_id, UuidRequestId};
use crate::lifecycle::Shutdown;
use crate::security::{rate_limit::spawn_sweeper, AuthGate, TokenVerifier};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub gate: Arc<RequestGate>,
    pub auth: Arc<AuthGate>,
}

impl FromRef<AppState> for Arc<AuthGate> {
    fn from_ref(state: &AppState) -> Self {
        state.auth.clone()
    }
}

/// HTTP server for the gated API.
pub struct HttpServer {
    router: Router,
    config: GateConfig,
    gate: Arc<RequestGate>,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: GateConfig, verifier: Arc<dyn TokenVerifier>) -> Self {
        let state = AppState {
            gate: Arc::new(RequestGate::from_config(&config)),
            auth: Arc::new(AuthGate::new(verifier)),
        };
        Self::with_state(config, state)
    }

    /// Create a server around pre-built gate state.
    pub fn with_state(config: GateConfig, state: AppState) -> Self {
        let gate = state.gate.clone();
        let router = Self::build_router(&config, state);
        Self {
            router,
            config,
            gate,
        }
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// Outer to inner: request ID, trace, gate, timeout, handler. A timeout
    /// response still passes back through the gate.
    #[allow(deprecated)]
    pub fn build_router(config: &GateConfig, state: AppState) -> Router {
        let gate = state.gate.clone();
        Router::new()
            .route("/api/health", get(handlers::health))
            .route("/api/session", get(handlers::session))
            .route("/api/me", get(handlers::me))
            .fallback(handlers::not_found)
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(middleware::from_fn_with_state(gate, gate_middleware))
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
                    .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                        tracing::info_span!(
                            "request",
                            method = %request.method(),
                            uri = %request.uri(),
                            request_id = %request_id(request),
                        )
                    }))
                    .layer(PropagateRequestIdLayer::x_request_id()),
            )
    }

    /// The router, for serving or for in-process tests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server until `shutdown` triggers.
    pub async fn run(self, listener: TcpListener, shutdown: &Shutdown) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            origins = ?self.gate.origins().allow_list(),
            max_requests = self.gate.limiter().max_requests(),
            window_ms = self.config.rate_limit.window_ms,
            consistency = ?self.gate.limiter().consistency(),
            "HTTP server starting"
        );

        let sweep_secs = self.config.rate_limit.sweep_interval_secs;
        let sweeper = (sweep_secs > 0).then(|| {
            spawn_sweeper(
                self.gate.limiter().clone(),
                Duration::from_secs(sweep_secs),
                shutdown.subscribe(),
            )
        });

        let mut stop = shutdown.subscribe();
        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                stop.recv().await;
            })
            .await?;

        if let Some(sweeper) = sweeper {
            let _ = sweeper.await;
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
