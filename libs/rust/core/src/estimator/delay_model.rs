//! Flight delay classifier: class-balanced logistic regression over a fixed
//! set of one-hot airline, flight-type and month features.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::{Serialize, Deserialize};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{dataset, Estimator, EstimatorError, EstimatorFactory, Flight};

pub const FORMAT_TAG: &str = "delay-logreg";
pub const FORMAT_VERSION: u32 = 1;
/// Flights leaving more than this many minutes after schedule count as delayed.
pub const DELAY_THRESHOLD_MINUTES: f64 = 15.0;
pub const TOP_FEATURES: [&str; 10] = [
    "OPERA_Latin American Wings",
    "MES_7",
    "MES_10",
    "OPERA_Grupo LATAM",
    "MES_12",
    "TIPOVUELO_I",
    "MES_4",
    "MES_11",
    "OPERA_Sky Airline",
    "OPERA_Copa Air",
];
const N_FEATURES: usize = TOP_FEATURES.len();
const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const LEARNING_RATE: f64 = 0.5;
const EPOCHS: usize = 500;
const L2: f64 = 1e-4;

/// Serialized form is the struct itself as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DelayModel {
    format: String,
    version: u32,
    features: Vec<String>,
    weights: Vec<f64>,
    intercept: f64,
}

pub fn encode(flight: &Flight) -> [f64; N_FEATURES] {
    TOP_FEATURES.map(|name| if feature_active(flight, name) { 1.0 } else { 0.0 })
}

fn feature_active(flight: &Flight, name: &str) -> bool {
    match name.split_once('_') {
        Some(("OPERA", v)) => flight.opera == v,
        Some(("TIPOVUELO", v)) => flight.tipo_vuelo == v,
        Some(("MES", v)) => v.parse::<u8>().map_or(false, |m| m == flight.mes),
        _ => false,
    }
}

/// 1.0 when the actual departure is more than the threshold after schedule.
pub fn delay_label(flight: &Flight) -> Result<f64, EstimatorError> {
    let parse = |value: Option<&String>, column: &str| -> Result<NaiveDateTime, EstimatorError> {
        let raw = value.ok_or_else(|| EstimatorError::SchemaMismatch(format!("{column} is required for training")))?;
        NaiveDateTime::parse_from_str(raw, DATE_FORMAT)
            .map_err(|e| EstimatorError::SchemaMismatch(format!("{column} {raw:?}: {e}")))
    };
    let actual = parse(flight.fecha_o.as_ref(), "Fecha-O")?;
    let scheduled = parse(flight.fecha_i.as_ref(), "Fecha-I")?;
    let minutes = (actual - scheduled).num_seconds() as f64 / 60.0;
    Ok(if minutes > DELAY_THRESHOLD_MINUTES { 1.0 } else { 0.0 })
}

fn sigmoid(z: f64) -> f64 { 1.0 / (1.0 + (-z).exp()) }

impl DelayModel {
    pub fn fit(rows: &[Flight]) -> Result<Self, EstimatorError> { Self::fit_until(rows, &AtomicBool::new(false)) }

    /// Like `fit`, but gives up between epochs once `cancel` is set.
    pub fn fit_until(rows: &[Flight], cancel: &AtomicBool) -> Result<Self, EstimatorError> {
        if rows.is_empty() { return Err(EstimatorError::SchemaMismatch("no training rows".into())); }
        let xs: Vec<[f64; N_FEATURES]> = rows.iter().map(encode).collect();
        let ys = rows.iter().map(delay_label).collect::<Result<Vec<f64>, _>>()?;

        // each class is weighted by the share of the other one
        let n = ys.len() as f64;
        let delayed = ys.iter().filter(|y| **y > 0.5).count() as f64;
        let on_time = n - delayed;
        let (w_delayed, w_on_time) = if delayed == 0.0 || on_time == 0.0 { (1.0, 1.0) } else { (on_time / n, delayed / n) };
        let sample_weights: Vec<f64> = ys.iter().map(|y| if *y > 0.5 { w_delayed } else { w_on_time }).collect();
        let total_weight: f64 = sample_weights.iter().sum();

        let mut weights = [0.0f64; N_FEATURES];
        let mut intercept = 0.0f64;
        for epoch in 0..EPOCHS {
            if cancel.load(Ordering::Relaxed) {
                warn!(epoch, "delay model fit cancelled");
                return Err(EstimatorError::Task("training cancelled".into()));
            }
            let mut grad = [0.0f64; N_FEATURES];
            let mut grad_b = 0.0f64;
            for ((x, y), s) in xs.iter().zip(&ys).zip(&sample_weights) {
                let z = intercept + x.iter().zip(&weights).map(|(a, b)| a * b).sum::<f64>();
                let err = (sigmoid(z) - y) * s;
                for (g, xi) in grad.iter_mut().zip(x) { *g += err * xi; }
                grad_b += err;
            }
            for (w, g) in weights.iter_mut().zip(grad) { *w -= LEARNING_RATE * (g / total_weight + L2 * *w); }
            intercept -= LEARNING_RATE * grad_b / total_weight;
        }
        info!(rows = rows.len(), delayed, intercept, "delay model fitted");
        Ok(Self {
            format: FORMAT_TAG.into(),
            version: FORMAT_VERSION,
            features: TOP_FEATURES.iter().map(|f| f.to_string()).collect(),
            weights: weights.to_vec(),
            intercept,
        })
    }

    pub fn probability(&self, flight: &Flight) -> f64 {
        let x = encode(flight);
        sigmoid(self.intercept + x.iter().zip(&self.weights).map(|(a, b)| a * b).sum::<f64>())
    }

    pub fn from_slice(bytes: &[u8], location: &str) -> Result<Self, EstimatorError> {
        let unsupported = |reason: String| EstimatorError::UnsupportedFormat { location: location.to_string(), reason };
        let model: DelayModel = serde_json::from_slice(bytes).map_err(|e| unsupported(e.to_string()))?;
        if model.format != FORMAT_TAG || model.version != FORMAT_VERSION {
            return Err(unsupported(format!("format {} v{}", model.format, model.version)));
        }
        if model.features.iter().map(String::as_str).ne(TOP_FEATURES) || model.weights.len() != N_FEATURES {
            return Err(unsupported("feature layout mismatch".into()));
        }
        Ok(model)
    }
}

impl Estimator for DelayModel {
    fn predict(&self, flights: &[Flight]) -> Vec<u8> {
        flights.iter().map(|f| u8::from(self.probability(f) >= 0.5)).collect()
    }

    fn save(&self, location: &Path) -> Result<(), EstimatorError> {
        let bytes = serde_json::to_vec_pretty(self).map_err(std::io::Error::from)?;
        std::fs::write(location, bytes)?;
        debug!(location = %location.display(), "delay model saved");
        Ok(())
    }
}

/// Trains from CSV sources and loads JSON-serialized `DelayModel`s.
#[derive(Debug, Clone, Default)]
pub struct DelayModelFactory {
    client: reqwest::Client,
}

/// Raises the flag when the owning `train` future is dropped.
struct CancelOnDrop(Arc<AtomicBool>);

impl Drop for CancelOnDrop {
    fn drop(&mut self) { self.0.store(true, Ordering::Relaxed); }
}

#[async_trait]
impl EstimatorFactory for DelayModelFactory {
    async fn train(&self, source: &str) -> Result<Arc<dyn Estimator>, EstimatorError> {
        let rows = dataset::read_source(&self.client, source).await?;
        let cancel = Arc::new(AtomicBool::new(false));
        let guard = CancelOnDrop(cancel.clone());
        let model = tokio::task::spawn_blocking(move || DelayModel::fit_until(&rows, &cancel))
            .await
            .map_err(|e| EstimatorError::Task(e.to_string()))??;
        drop(guard);
        Ok(Arc::new(model))
    }

    async fn load(&self, location: &Path) -> Result<Arc<dyn Estimator>, EstimatorError> {
        let shown = location.display().to_string();
        let bytes = tokio::fs::read(location).await
            .map_err(|e| EstimatorError::SourceUnreadable { location: shown.clone(), reason: e.to_string() })?;
        Ok(Arc::new(DelayModel::from_slice(&bytes, &shown)?))
    }
}
