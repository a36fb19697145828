//! Estimator capability consumed by the request handlers.
//!
//! The registry only stores `Arc<dyn Estimator>` handles; training, loading
//! and serialization happen here, before any registry operation.

use async_trait::async_trait;
use serde::{Serialize, Deserialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

pub mod dataset;
pub mod delay_model;

/// One flight row. Scheduled (`Fecha-I`) and actual (`Fecha-O`) times are only
/// needed for training, where they define the delay label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flight {
    #[serde(rename = "OPERA", alias = "opera")]
    pub opera: String,
    #[serde(rename = "TIPOVUELO", alias = "tipovuelo")]
    pub tipo_vuelo: String,
    #[serde(rename = "MES", alias = "mes")]
    pub mes: u8,
    #[serde(rename = "Fecha-O", alias = "fecha_o", default, skip_serializing_if = "Option::is_none")]
    pub fecha_o: Option<String>,
    #[serde(rename = "Fecha-I", alias = "fecha_i", default, skip_serializing_if = "Option::is_none")]
    pub fecha_i: Option<String>,
}

impl Flight {
    pub fn new(opera: impl Into<String>, tipo_vuelo: impl Into<String>, mes: u8) -> Self {
        Self { opera: opera.into(), tipo_vuelo: tipo_vuelo.into(), mes, fecha_o: None, fecha_i: None }
    }

    pub fn with_times(mut self, scheduled: impl Into<String>, actual: impl Into<String>) -> Self {
        self.fecha_i = Some(scheduled.into());
        self.fecha_o = Some(actual.into());
        self
    }
}

#[derive(Debug, Error)]
pub enum EstimatorError {
    #[error("data source {location} could not be read: {reason}")]
    SourceUnreadable { location: String, reason: String },
    #[error("data source does not match the expected schema: {0}")]
    SchemaMismatch(String),
    #[error("{location} does not contain a supported model: {reason}")]
    UnsupportedFormat { location: String, reason: String },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("estimator task failed: {0}")]
    Task(String),
}

/// A trained or loaded model able to score flights and serialize itself.
pub trait Estimator: Send + Sync + fmt::Debug {
    /// One 0/1 delay prediction per input row, in order.
    fn predict(&self, flights: &[Flight]) -> Vec<u8>;
    fn save(&self, location: &Path) -> Result<(), EstimatorError>;
}

/// Produces estimators; handlers hold it as `Arc<dyn EstimatorFactory>`.
#[async_trait]
pub trait EstimatorFactory: Send + Sync {
    /// `source` is a local CSV path or an `http(s)` URL.
    async fn train(&self, source: &str) -> Result<Arc<dyn Estimator>, EstimatorError>;
    async fn load(&self, location: &Path) -> Result<Arc<dyn Estimator>, EstimatorError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flight_accepts_wire_and_snake_case_names() {
        let wire: Flight = serde_json::from_str(r#"{"OPERA":"Grupo LATAM","TIPOVUELO":"N","MES":3}"#).unwrap();
        let snake: Flight = serde_json::from_str(r#"{"opera":"Grupo LATAM","tipovuelo":"N","mes":3}"#).unwrap();
        assert_eq!(wire, snake);
        assert_eq!(wire, Flight::new("Grupo LATAM", "N", 3));
        assert!(wire.fecha_o.is_none());
    }
}
