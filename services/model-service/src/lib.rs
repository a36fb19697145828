//! HTTP surface of the delay prediction model registry.

pub mod api;
pub mod auth;
pub mod error;
pub mod state;

pub use api::create_router;
pub use auth::{ApiKeyGate, API_KEY_HEADER};
pub use error::ApiError;
pub use state::{default_resource, AppState};

use anyhow::Result;
use delay_core::{DelayModelFactory, EstimatorFactory, ModelRegistry, ServiceConfig};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

/// Seeds the registry, binds and serves until `shutdown` resolves.
pub async fn run<F>(cfg: ServiceConfig, estimators: Arc<dyn EstimatorFactory>, listener: TcpListener, shutdown: F) -> Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let default = default_resource(&cfg, estimators.as_ref()).await?;
    let registry = ModelRegistry::new(default);
    let state = AppState::new(registry, estimators, &cfg);
    if !state.gate.is_configured() { info!("api_key not set; deployments are refused"); }

    let app = create_router(state);
    info!(addr = %listener.local_addr()?, "model-service listening");
    delay_core::mark_ready();
    let served = axum::serve(listener, app).with_graceful_shutdown(shutdown).await;
    delay_core::clear_ready();
    served?;
    Ok(())
}

/// Production estimator factory.
pub fn delay_estimators() -> Arc<dyn EstimatorFactory> { Arc::new(DelayModelFactory::default()) }
