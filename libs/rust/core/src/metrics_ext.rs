//! Prometheus metric families for the model registry and its HTTP surface.
//!
//! Families are created and registered once by `init_metrics`; until then the
//! `record_*` helpers are no-ops, which keeps unit tests free of global state.

use once_cell::sync::OnceCell;
use prometheus::{IntCounter, IntCounterVec, IntGauge, Opts, Registry};

pub struct RegistryMetrics {
    pub models_created_total: IntCounterVec,
    pub deployments_total: IntCounter,
    pub deletions_total: IntCounter,
    pub predictions_total: IntCounter,
    pub models_stored: IntGauge,
}

impl RegistryMetrics {
    fn new() -> prometheus::Result<Self> {
        Ok(Self {
            models_created_total: IntCounterVec::new(
                Opts::new("delay_models_created_total", "Models created through training or upload, by outcome"),
                &["outcome"],
            )?,
            deployments_total: IntCounter::new("delay_model_deployments_total", "Successful deploy pointer swaps")?,
            deletions_total: IntCounter::new("delay_model_deletions_total", "Models removed from the registry")?,
            predictions_total: IntCounter::new("delay_predictions_total", "Rows scored by the deployed model")?,
            models_stored: IntGauge::new("delay_models_stored", "Models currently held by the registry")?,
        })
    }

    fn register(&self, registry: &Registry) -> prometheus::Result<()> {
        registry.register(Box::new(self.models_created_total.clone()))?;
        registry.register(Box::new(self.deployments_total.clone()))?;
        registry.register(Box::new(self.deletions_total.clone()))?;
        registry.register(Box::new(self.predictions_total.clone()))?;
        registry.register(Box::new(self.models_stored.clone()))?;
        Ok(())
    }
}

static REGISTRY_METRICS: OnceCell<RegistryMetrics> = OnceCell::new();

pub(crate) fn register_metrics() -> prometheus::Result<&'static RegistryMetrics> {
    REGISTRY_METRICS.get_or_try_init(|| {
        let metrics = RegistryMetrics::new()?;
        metrics.register(prometheus::default_registry())?;
        Ok(metrics)
    })
}

pub fn registry_metrics() -> Option<&'static RegistryMetrics> { REGISTRY_METRICS.get() }

pub fn record_created(outcome: &str) {
    if let Some(m) = registry_metrics() { m.models_created_total.with_label_values(&[outcome]).inc(); }
}

pub fn record_deployment() { if let Some(m) = registry_metrics() { m.deployments_total.inc(); } }

pub fn record_deletion() { if let Some(m) = registry_metrics() { m.deletions_total.inc(); } }

pub fn record_predictions(rows: usize) {
    if let Some(m) = registry_metrics() { m.predictions_total.inc_by(rows as u64); }
}

pub fn record_stored(count: usize) {
    if let Some(m) = registry_metrics() { m.models_stored.set(count as i64); }
}
