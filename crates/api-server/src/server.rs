//! Assembles the axum router and owns the HTTP/metrics listeners.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use campaign_core::config::AppConfig;
use campaign_delivery::{ClickRateLimiter, ClickValidator};
use campaign_marketplace::{BudgetAccountant, ImpressionTracker, InMemoryStore, SelectionOrchestrator};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::rest::{self, AppState};

/// Cheap clone handle over the config the request handlers read. A plain
/// `Arc<AppConfig>` would do today; this indirection is where a future
/// config-reload watcher would plug in without touching handler signatures.
#[derive(Clone)]
pub struct AppConfigState(Arc<AppConfig>);

impl AppConfigState {
    pub fn new(config: AppConfig) -> Self {
        Self(Arc::new(config))
    }

    pub fn load(&self) -> Arc<AppConfig> {
        self.0.clone()
    }
}

pub struct ApiServer {
    config: AppConfig,
    store: Arc<InMemoryStore>,
}

impl ApiServer {
    pub fn new(config: AppConfig, store: Arc<InMemoryStore>) -> Self {
        Self { config, store }
    }

    fn build_state(&self) -> AppState {
        let selector = Arc::new(SelectionOrchestrator::new(self.store.clone()));
        let limiter = Arc::new(ClickRateLimiter::new());
        let validator = Arc::new(ClickValidator::new(self.store.clone(), limiter));
        let accountant = Arc::new(BudgetAccountant::new(self.store.clone()));
        let impressions = Arc::new(ImpressionTracker::new(self.store.clone()));

        AppState {
            config: AppConfigState::new(self.config.clone()),
            selector,
            validator,
            accountant,
            impressions,
        }
    }

    fn router(&self) -> Router {
        let state = self.build_state();

        Router::new()
            .route("/api/partner/ad", get(rest::partner_ad))
            .route("/api/track/impression", post(rest::track_impression))
            .route("/t/:code", get(rest::track_click))
            .route("/health", get(rest::health_check))
            .route("/ready", get(rest::readiness))
            .with_state(state)
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http())
    }

    /// Start the HTTP server; runs until the process is terminated.
    pub async fn start_http(&self) -> anyhow::Result<()> {
        let app = self.router().into_make_service_with_connect_info::<SocketAddr>();
        let addr = SocketAddr::new(self.config.api.host.parse()?, self.config.api.http_port);

        info!(addr = %addr, "Starting HTTP server");

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }

    /// Start the Prometheus metrics exporter on a separate port.
    pub async fn start_metrics(&self) -> anyhow::Result<()> {
        let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
        let handle = builder
            .with_http_listener(SocketAddr::new(
                self.config.api.host.parse()?,
                self.config.metrics.port,
            ))
            .install_recorder()?;

        info!(port = self.config.metrics.port, "Metrics exporter started");

        std::mem::forget(handle);
        Ok(())
    }
}
