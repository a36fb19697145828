//! Model lifecycle status machine.
//!
//! States:
//! - Pending   (created, outcome not yet recorded)
//! - Running   (optional intermediate state)
//! - Completed (terminal, estimator attached)
//! - Failed    (terminal, creation errors recorded)
//!
//! A non-terminal status may move to any status; terminal ones reject every
//! transition, including to themselves.

use serde::{Serialize, Deserialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum ModelStatus { Pending, Running, Completed, Failed }

impl ModelStatus {
    pub fn is_terminal(self) -> bool { matches!(self, ModelStatus::Completed | ModelStatus::Failed) }
    pub fn can_transition_to(self, _next: ModelStatus) -> bool { !self.is_terminal() }
    pub fn is_deployable(self) -> bool { self == ModelStatus::Completed }
    pub fn as_str(self) -> &'static str {
        match self { ModelStatus::Pending => "PENDING", ModelStatus::Running => "RUNNING", ModelStatus::Completed => "COMPLETED", ModelStatus::Failed => "FAILED" }
    }
}

impl Default for ModelStatus { fn default() -> Self { ModelStatus::Pending } }

impl fmt::Display for ModelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}
