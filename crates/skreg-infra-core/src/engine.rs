//! Provisioning engine seam.
//!
//! The engine owns everything this crate does not: diffing desired against
//! actual state, talking to the cloud provider, retries and state storage.
//! A [`crate::Context`] calls [`Engine::register`] once per declared resource,
//! after every input has resolved and every explicit dependency has been
//! registered.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fmt;

use crate::stack::Operation;
use crate::{Result, Urn};

pub mod memory;

pub use memory::MemoryEngine;

/// A fully resolved resource declaration.
#[derive(Clone, Serialize)]
pub struct RegisterResourceRequest {
    pub urn: Urn,
    pub type_token: String,
    pub name: String,
    pub parent: Option<Urn>,
    pub inputs: Map<String, Value>,
    /// Input keys whose values came from secret outputs.
    pub secret_inputs: BTreeSet<String>,
    /// Structural and explicit dependencies.
    pub dependencies: BTreeSet<Urn>,
    /// Input keys whose changes must not trigger an update.
    pub ignore_changes: Vec<String>,
    /// Reject deletes and replacements.
    pub protect: bool,
}

impl fmt::Debug for RegisterResourceRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterResourceRequest")
            .field("urn", &self.urn)
            .field("type_token", &self.type_token)
            .field("input_keys", &self.inputs.keys().collect::<Vec<_>>())
            .field("dependencies", &self.dependencies)
            .field("ignore_changes", &self.ignore_changes)
            .field("protect", &self.protect)
            .finish_non_exhaustive()
    }
}

/// The engine's answer to a registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisteredResource {
    pub id: String,
    pub outputs: Map<String, Value>,
    pub operation: Operation,
}

/// Trait for provisioning engines.
#[async_trait]
pub trait Engine: Send + Sync {
    /// Name of this engine.
    fn name(&self) -> &'static str;

    /// Converge one resource to its declared inputs.
    async fn register(&self, request: RegisterResourceRequest) -> Result<RegisteredResource>;
}
