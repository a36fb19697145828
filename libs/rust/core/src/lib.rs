//! Core shared utilities for the delay prediction model service.

use anyhow::Result;
use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use once_cell::sync::OnceCell;
use prometheus::{Encoder, TextEncoder};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

static TRACING_INIT: OnceCell<()> = OnceCell::new();
static PROM_INIT: OnceCell<()> = OnceCell::new();

static NODE_LIVENESS: AtomicBool = AtomicBool::new(true);
static NODE_READINESS: AtomicBool = AtomicBool::new(false);
pub fn mark_ready() { NODE_READINESS.store(true, Ordering::SeqCst); }
pub fn clear_ready() { NODE_READINESS.store(false, Ordering::SeqCst); }
pub fn mark_not_live() { NODE_LIVENESS.store(false, Ordering::SeqCst); }
pub fn is_ready() -> bool { NODE_READINESS.load(Ordering::SeqCst) }

/// Installs the global subscriber once. `RUST_LOG` wins over `default_level`;
/// `DELAY_JSON_LOG=1|true` switches to flattened JSON output.
pub fn init_tracing(service: &str, default_level: &str) -> Result<()> {
    TRACING_INIT.get_or_try_init(|| -> Result<()> {
        let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
        let json = std::env::var("DELAY_JSON_LOG").ok().map(|v| v=="1" || v.eq_ignore_ascii_case("true")).unwrap_or(false);
        let registry = tracing_subscriber::registry().with(env_filter);
        if json {
            registry
                .with(tracing_subscriber::fmt::layer()
                    .json()
                    .flatten_event(true)
                    .with_current_span(true)
                    .with_span_list(false))
                .try_init()?;
        } else {
            registry
                .with(tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_line_number(true))
                .try_init()?;
        }
        Ok(())
    })?;
    info!(target: "delay_core", service, "tracing initialized");
    Ok(())
}

/// Registers the registry/service metric families with the default prometheus registry.
pub fn init_metrics() -> Result<()> {
    PROM_INIT.get_or_try_init(|| -> Result<()> {
        metrics_ext::register_metrics()?;
        Ok(())
    })?;
    Ok(())
}

/// Liveness, readiness and `/metrics` routes, merged into the service router.
pub fn health_router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new()
        .route("/live", get(|| async { axum::Json(serde_json::json!({"live": NODE_LIVENESS.load(Ordering::SeqCst)})) }))
        .route("/ready", get(|| async { axum::Json(serde_json::json!({"ready": NODE_READINESS.load(Ordering::SeqCst)})) }))
        .route("/metrics", get(metrics_handler))
}

async fn metrics_handler() -> Response {
    if PROM_INIT.get().is_none() {
        return (StatusCode::SERVICE_UNAVAILABLE, "metrics not initialized").into_response();
    }
    let metric_families = prometheus::default_registry().gather();
    let mut buf = Vec::new();
    if let Err(e) = TextEncoder::new().encode(&metric_families, &mut buf) {
        return (StatusCode::INTERNAL_SERVER_ERROR, format!("encode error: {e}")).into_response();
    }
    (StatusCode::OK, [(header::CONTENT_TYPE, "text/plain; version=0.0.4")], buf).into_response()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    pub service_name: String,
    pub bind_addr: String,
    pub log_level: String,
    /// `user=key` pair accepted by the deploy gate. Unset means every deploy is refused.
    pub api_key: Option<String>,
    /// Serialized model loaded as the registry default at startup.
    pub default_model_path: Option<PathBuf>,
    pub export_dir: PathBuf,
    pub train_timeout_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            service_name: "model-service".into(),
            bind_addr: "0.0.0.0:8000".into(),
            log_level: "info".into(),
            api_key: None,
            default_model_path: None,
            export_dir: PathBuf::from("."),
            train_timeout_secs: 300,
        }
    }
}

/// Defaults, then the optional `DELAY_CONFIG_FILE`, then `DELAY_*` environment variables.
pub fn load_config(service: &str) -> Result<ServiceConfig> {
    let mut builder = config::Config::builder()
        .set_default("service_name", service)?
        .set_default("bind_addr", "0.0.0.0:8000")?
        .set_default("log_level", "info")?
        .set_default("export_dir", ".")?
        .set_default("train_timeout_secs", 300_i64)?;

    if let Ok(file) = std::env::var("DELAY_CONFIG_FILE") {
        builder = builder.add_source(config::File::with_name(&file).required(false));
    }
    builder = builder.add_source(
        config::Environment::with_prefix("DELAY")
            .prefix_separator("_")
            .separator("__"),
    );
    let cfg: ServiceConfig = builder.build()?.try_deserialize()?;
    Ok(cfg)
}

pub mod lifecycle;
pub mod model_registry;
pub mod estimator;
pub mod metrics_ext;

pub use lifecycle::ModelStatus;
pub use model_registry::{ModelId, ModelRegistry, ModelResource, ModelView, RegistryError, ResourceError};
pub use estimator::{Estimator, EstimatorError, EstimatorFactory, Flight};
pub use estimator::delay_model::{DelayModel, DelayModelFactory};
pub use metrics_ext::{registry_metrics, RegistryMetrics};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_builder_defaults() {
        let cfg = ServiceConfig::default();
        assert_eq!(cfg.bind_addr, "0.0.0.0:8000");
        assert_eq!(cfg.train_timeout_secs, 300);
        assert!(cfg.api_key.is_none());
    }

    #[test]
    fn readiness_follows_mark_and_clear() {
        mark_ready();
        assert!(is_ready());
        clear_ready();
        assert!(!is_ready());
    }

    #[test]
    fn liveness_drops_after_mark_not_live() {
        mark_not_live();
        assert!(!NODE_LIVENESS.load(Ordering::SeqCst));
    }
}
