//! Apply run types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{RunId, Urn};

/// What the engine did with a registered resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Create,
    Update,
    Same,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operation::Create => write!(f, "create"),
            Operation::Update => write!(f, "update"),
            Operation::Same => write!(f, "same"),
        }
    }
}

/// A resource as reported at the end of an apply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceChange {
    pub urn: Urn,
    pub resource_type: String,
    pub name: String,
    pub operation: Operation,
}

/// Outcome of one apply run, in declaration order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplySummary {
    pub run_id: RunId,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub changes: Vec<ResourceChange>,
}

impl ApplySummary {
    fn count(&self, operation: Operation) -> usize {
        self.changes
            .iter()
            .filter(|c| c.operation == operation)
            .count()
    }

    pub fn created(&self) -> usize {
        self.count(Operation::Create)
    }

    pub fn updated(&self) -> usize {
        self.count(Operation::Update)
    }

    pub fn unchanged(&self) -> usize {
        self.count(Operation::Same)
    }

    /// True when the run converged without touching anything.
    pub fn is_noop(&self) -> bool {
        self.created() == 0 && self.updated() == 0
    }

    /// Look up the change for a resource by logical name.
    pub fn change(&self, name: &str) -> Option<&ResourceChange> {
        self.changes.iter().find(|c| c.name == name)
    }
}
