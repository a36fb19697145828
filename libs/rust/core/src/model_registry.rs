//! In-memory registry of model resources.
//!
//! One `RwLock` covers the resource map together with the default and the
//! deployed pointers, so deploy, removal fallback and default protection are
//! applied in a single critical section. Nothing inside the lock performs I/O;
//! estimators are trained or loaded by the caller before the registry is touched.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use parking_lot::RwLock;
use serde::{Serialize, Deserialize};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::estimator::Estimator;
use crate::lifecycle::ModelStatus;
use crate::metrics_ext;

pub type ModelId = Uuid;

/// Structured error recorded on a resource while it was being created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceError {
    pub code: String,
    pub message: String,
}

impl ResourceError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self { Self { code: code.into(), message: message.into() } }
}

#[derive(Debug, Clone)]
pub struct ModelResource {
    id: ModelId,
    status: ModelStatus,
    estimator: Option<Arc<dyn Estimator>>,
    errors: Vec<ResourceError>,
}

impl ModelResource {
    /// Fresh `Pending` resource with a random id.
    pub fn new() -> Self { Self::with_id(Uuid::new_v4()) }

    pub fn with_id(id: ModelId) -> Self { Self { id, status: ModelStatus::Pending, estimator: None, errors: Vec::new() } }

    /// Already-`Completed` resource, used to seed the registry default.
    pub fn completed(estimator: Arc<dyn Estimator>) -> Self {
        Self { status: ModelStatus::Completed, estimator: Some(estimator), ..Self::new() }
    }

    pub fn id(&self) -> ModelId { self.id }
    pub fn status(&self) -> ModelStatus { self.status }
    pub fn estimator(&self) -> Option<&Arc<dyn Estimator>> { self.estimator.as_ref() }
    pub fn has_estimator(&self) -> bool { self.estimator.is_some() }
    pub fn errors(&self) -> &[ResourceError] { &self.errors }

    fn transition(&mut self, to: ModelStatus) -> Result<(), RegistryError> {
        if !self.status.can_transition_to(to) {
            return Err(RegistryError::InvalidTransition { id: self.id, from: self.status, to });
        }
        self.status = to;
        Ok(())
    }
}

impl Default for ModelResource { fn default() -> Self { Self::new() } }

/// Read-only snapshot of one resource plus its position relative to the two pointers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelView {
    pub id: ModelId,
    pub status: ModelStatus,
    pub has_estimator: bool,
    pub errors: Vec<ResourceError>,
    pub deployed: bool,
    pub is_default: bool,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("model {0} not found")]
    NotFound(ModelId),
    #[error("model {0} is the protected default")]
    Forbidden(ModelId),
    #[error("model {id} is {from} and cannot move to {to}")]
    InvalidTransition { id: ModelId, from: ModelStatus, to: ModelStatus },
    #[error("model {id} is {status}; only completed models can be deployed")]
    NotReady { id: ModelId, status: ModelStatus },
    #[error("model {0} is already registered")]
    DuplicateId(ModelId),
    #[error("registry has no default model")]
    Unseeded,
}

#[derive(Debug, Default)]
struct Inner {
    resources: HashMap<ModelId, ModelResource>,
    default_id: Option<ModelId>,
    deployed_id: Option<ModelId>,
}

impl Inner {
    fn view(&self, r: &ModelResource) -> ModelView {
        ModelView {
            id: r.id,
            status: r.status,
            has_estimator: r.estimator.is_some(),
            errors: r.errors.clone(),
            deployed: self.deployed_id == Some(r.id),
            is_default: self.default_id == Some(r.id),
        }
    }

    fn get_mut(&mut self, id: &ModelId) -> Result<&mut ModelResource, RegistryError> {
        self.resources.get_mut(id).ok_or(RegistryError::NotFound(*id))
    }
}

#[derive(Debug)]
pub struct ModelRegistry {
    inner: RwLock<Inner>,
}

impl ModelRegistry {
    /// Registry holding only `default`, which is also the deployed model.
    pub fn new(default: ModelResource) -> Self {
        let id = default.id;
        let inner = Inner {
            resources: HashMap::from([(id, default)]),
            default_id: Some(id),
            deployed_id: Some(id),
        };
        metrics_ext::record_stored(1);
        info!(default_id=%id, "model registry created");
        Self { inner: RwLock::new(inner) }
    }

    /// Installs the protected default after a `clear`. Both pointers end up on it.
    pub fn seed_default(&self, default: ModelResource) -> Result<(), RegistryError> {
        let mut inner = self.inner.write();
        if let Some(existing) = inner.default_id { return Err(RegistryError::Forbidden(existing)); }
        let id = default.id;
        match inner.resources.entry(id) {
            Entry::Occupied(_) => return Err(RegistryError::DuplicateId(id)),
            Entry::Vacant(slot) => { slot.insert(default); }
        }
        inner.default_id = Some(id);
        inner.deployed_id = Some(id);
        metrics_ext::record_stored(inner.resources.len());
        info!(default_id=%id, "model registry seeded");
        Ok(())
    }

    pub fn insert(&self, resource: ModelResource) -> Result<(), RegistryError> {
        let mut inner = self.inner.write();
        let id = resource.id;
        match inner.resources.entry(id) {
            Entry::Occupied(_) => return Err(RegistryError::DuplicateId(id)),
            Entry::Vacant(slot) => { slot.insert(resource); }
        }
        metrics_ext::record_stored(inner.resources.len());
        debug!(model_id=%id, "model inserted");
        Ok(())
    }

    pub fn get(&self, id: &ModelId) -> Option<ModelResource> { self.inner.read().resources.get(id).cloned() }

    pub fn view(&self, id: &ModelId) -> Option<ModelView> {
        let inner = self.inner.read();
        inner.resources.get(id).map(|r| inner.view(r))
    }

    pub fn contains(&self, id: &ModelId) -> bool { self.inner.read().resources.contains_key(id) }

    pub fn count(&self) -> usize { self.inner.read().resources.len() }

    pub fn ids(&self) -> HashSet<ModelId> { self.inner.read().resources.keys().copied().collect() }

    /// Snapshot of every resource taken under one read lock. Order is unspecified.
    pub fn list(&self) -> Vec<ModelView> {
        let inner = self.inner.read();
        inner.resources.values().map(|r| inner.view(r)).collect()
    }

    pub fn set_estimator(&self, id: &ModelId, estimator: Arc<dyn Estimator>) -> Result<(), RegistryError> {
        let mut inner = self.inner.write();
        inner.get_mut(id)?.estimator = Some(estimator);
        debug!(model_id=%id, "estimator attached");
        Ok(())
    }

    pub fn transition_status(&self, id: &ModelId, status: ModelStatus) -> Result<(), RegistryError> {
        let mut inner = self.inner.write();
        let resource = inner.get_mut(id)?;
        let from = resource.status;
        resource.transition(status)?;
        debug!(model_id=%id, %from, to=%status, "status transition");
        Ok(())
    }

    /// Moves the resource to `Failed` and records `errors` in the same critical section.
    pub fn fail(&self, id: &ModelId, errors: Vec<ResourceError>) -> Result<(), RegistryError> {
        let mut inner = self.inner.write();
        let resource = inner.get_mut(id)?;
        resource.transition(ModelStatus::Failed)?;
        resource.errors.extend(errors);
        info!(model_id=%id, errors=resource.errors.len(), "model failed");
        Ok(())
    }

    /// Removes `id`. The default is protected; removing the deployed model
    /// points deployment back at the default before the entry goes away.
    pub fn remove(&self, id: &ModelId) -> Result<ModelResource, RegistryError> {
        let mut inner = self.inner.write();
        if inner.default_id == Some(*id) { return Err(RegistryError::Forbidden(*id)); }
        if !inner.resources.contains_key(id) { return Err(RegistryError::NotFound(*id)); }
        if inner.deployed_id == Some(*id) {
            let fallback = inner.default_id;
            inner.deployed_id = fallback;
            info!(model_id=%id, fallback=?fallback, "deployed model removed, falling back to default");
        }
        let removed = inner.resources.remove(id).ok_or(RegistryError::NotFound(*id))?;
        metrics_ext::record_stored(inner.resources.len());
        metrics_ext::record_deletion();
        info!(model_id=%id, "model removed");
        Ok(removed)
    }

    /// Drops every resource, the default included. Reset tooling only; the
    /// owner must `seed_default` again before serving.
    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.resources.clear();
        inner.default_id = None;
        inner.deployed_id = None;
        metrics_ext::record_stored(0);
        info!("model registry cleared");
    }

    pub fn deploy(&self, id: &ModelId) -> Result<(), RegistryError> {
        let mut inner = self.inner.write();
        let status = inner.resources.get(id).map(|r| r.status).ok_or(RegistryError::NotFound(*id))?;
        if !status.is_deployable() { return Err(RegistryError::NotReady { id: *id, status }); }
        let previous = inner.deployed_id.replace(*id);
        metrics_ext::record_deployment();
        info!(model_id=%id, previous=?previous, "model deployed");
        Ok(())
    }

    pub fn currently_deployed(&self) -> Result<ModelResource, RegistryError> {
        let inner = self.inner.read();
        let id = inner.deployed_id.ok_or(RegistryError::Unseeded)?;
        inner.resources.get(&id).cloned().ok_or(RegistryError::NotFound(id))
    }

    /// Estimator of the deployed resource; `None` when it has none or the registry is unseeded.
    pub fn deployed_estimator(&self) -> Option<Arc<dyn Estimator>> {
        let inner = self.inner.read();
        inner.deployed_id.and_then(|id| inner.resources.get(&id)).and_then(|r| r.estimator.clone())
    }

    pub fn default_id(&self) -> Option<ModelId> { self.inner.read().default_id }
    pub fn deployed_id(&self) -> Option<ModelId> { self.inner.read().deployed_id }
}
