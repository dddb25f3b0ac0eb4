//! In-memory engine.
//!
//! Keeps per-URN state across applies so repeated runs can be diffed the way
//! a real engine would: properties listed in `ignore_changes` keep their
//! stored value, unchanged inputs report [`Operation::Same`]. Used for
//! previews and for tests; it never talks to a cloud provider.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

use super::{Engine, RegisterResourceRequest, RegisteredResource};
use crate::stack::Operation;
use crate::{Error, Result, Urn};

/// Hook filling in provider-computed outputs (ids, ARNs, DNS names, ...).
///
/// Hooks must only insert keys that are absent so stored values stay stable
/// between applies.
pub type ComputedOutputs = dyn Fn(&RegisterResourceRequest, &mut Map<String, Value>) + Send + Sync;

#[derive(Debug, Clone)]
struct StoredResource {
    id: String,
    inputs: Map<String, Value>,
    outputs: Map<String, Value>,
}

/// Engine keeping all state in process memory.
#[derive(Default)]
pub struct MemoryEngine {
    state: Mutex<BTreeMap<Urn, StoredResource>>,
    registrations: Mutex<Vec<Urn>>,
    failures: Mutex<BTreeSet<String>>,
    computed: Vec<Box<ComputedOutputs>>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a computed-output hook, run on every registration.
    pub fn with_computed<F>(mut self, hook: F) -> Self
    where
        F: Fn(&RegisterResourceRequest, &mut Map<String, Value>) + Send + Sync + 'static,
    {
        self.computed.push(Box::new(hook));
        self
    }

    /// Make the registration of the resource with logical name `name` fail.
    pub fn fail_on(&self, name: impl Into<String>) -> Result<()> {
        lock(&self.failures)?.insert(name.into());
        Ok(())
    }

    pub fn clear_failures(&self) -> Result<()> {
        lock(&self.failures)?.clear();
        Ok(())
    }

    /// URNs in the order the engine received them, across all applies.
    pub fn registration_order(&self) -> Result<Vec<Urn>> {
        Ok(lock(&self.registrations)?.clone())
    }

    /// Number of resources currently held in state.
    pub fn resource_count(&self) -> Result<usize> {
        Ok(lock(&self.state)?.len())
    }

    /// Stored inputs of the resource with logical name `name`.
    pub fn stored_inputs(&self, name: &str) -> Result<Option<Map<String, Value>>> {
        Ok(lock(&self.state)?
            .iter()
            .find(|(urn, _)| urn.name() == name)
            .map(|(_, r)| r.inputs.clone()))
    }

    /// Stored outputs of the resource with logical name `name`.
    pub fn stored_outputs(&self, name: &str) -> Result<Option<Map<String, Value>>> {
        Ok(lock(&self.state)?
            .iter()
            .find(|(urn, _)| urn.name() == name)
            .map(|(_, r)| r.outputs.clone()))
    }
}

#[async_trait]
impl Engine for MemoryEngine {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn register(&self, request: RegisterResourceRequest) -> Result<RegisteredResource> {
        lock(&self.registrations)?.push(request.urn.clone());

        if lock(&self.failures)?.contains(&request.name) {
            return Err(Error::Provisioning {
                urn: request.urn.to_string(),
                message: "injected failure".to_string(),
            });
        }

        let mut state = lock(&self.state)?;
        let previous = state.get(&request.urn).cloned();

        let (inputs, operation) = match &previous {
            None => (request.inputs.clone(), Operation::Create),
            Some(prev) => {
                let mut effective = request.inputs.clone();
                for key in &request.ignore_changes {
                    match prev.inputs.get(key) {
                        Some(old) => effective.insert(key.clone(), old.clone()),
                        None => effective.remove(key),
                    };
                }
                let operation = if effective == prev.inputs {
                    Operation::Same
                } else {
                    Operation::Update
                };
                (effective, operation)
            }
        };

        let mut outputs = inputs.clone();
        if let Some(prev) = &previous {
            for (key, value) in &prev.outputs {
                outputs.entry(key.clone()).or_insert_with(|| value.clone());
            }
        }
        for hook in &self.computed {
            hook(&request, &mut outputs);
        }

        let id = previous
            .as_ref()
            .map(|p| p.id.clone())
            .or_else(|| outputs.get("id").and_then(Value::as_str).map(str::to_string))
            .unwrap_or_else(|| format!("{}-id", request.name));

        debug!(urn = %request.urn, %operation, "memory engine registered resource");

        state.insert(
            request.urn.clone(),
            StoredResource {
                id: id.clone(),
                inputs,
                outputs: outputs.clone(),
            },
        );

        Ok(RegisteredResource {
            id,
            outputs,
            operation,
        })
    }
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|_| Error::Internal("memory engine state poisoned".to_string()))
}
