//! Application state shared by every handler.

use anyhow::{Context, Result};
use delay_core::{EstimatorFactory, ModelRegistry, ModelResource, ServiceConfig};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::auth::ApiKeyGate;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ModelRegistry>,
    pub estimators: Arc<dyn EstimatorFactory>,
    pub gate: ApiKeyGate,
    /// Directory `?export=true` writes into.
    pub export_dir: PathBuf,
    pub train_timeout: Duration,
}

impl AppState {
    pub fn new(registry: ModelRegistry, estimators: Arc<dyn EstimatorFactory>, cfg: &ServiceConfig) -> Self {
        Self {
            registry: Arc::new(registry),
            estimators,
            gate: ApiKeyGate::from_config(cfg.api_key.as_deref()),
            export_dir: cfg.export_dir.clone(),
            train_timeout: Duration::from_secs(cfg.train_timeout_secs.max(1)),
        }
    }
}

/// Resource the registry is seeded with: the configured model file, or an
/// untrained placeholder when none is configured.
pub async fn default_resource(cfg: &ServiceConfig, estimators: &dyn EstimatorFactory) -> Result<ModelResource> {
    match &cfg.default_model_path {
        Some(path) => {
            let estimator = estimators.load(path).await
                .with_context(|| format!("loading default model from {}", path.display()))?;
            info!(path = %path.display(), "default model loaded");
            Ok(ModelResource::completed(estimator))
        }
        None => {
            warn!("no default_model_path configured; predictions are unavailable until a model is deployed");
            Ok(ModelResource::new())
        }
    }
}
