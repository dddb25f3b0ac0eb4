//! Declaration context.
//!
//! A [`Context`] is constructed explicitly for one stack and one engine and
//! passed to every component. It records declarations in a
//! [`ResourceGraph`] and turns each of them into a lazily-driven
//! registration that waits for its inputs and explicit dependencies before
//! calling the engine. [`Context::apply`] drives every registration to
//! completion.
//!
//! Composition is single-threaded: the context uses interior mutability
//! without locking and is not meant to be shared across threads.

use chrono::Utc;
use futures::FutureExt;
use futures::future;
use serde_json::{Map, Value};
use std::cell::{Ref, RefCell};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::engine::{Engine, RegisterResourceRequest};
use crate::graph::{NodeKind, ResourceGraph, ResourceNode};
use crate::output::Output;
use crate::resource::{ComponentResource, Resource, ResourceBuilder, ResourceOptions, ResourceState};
use crate::stack::{ApplySummary, ResourceChange};
use crate::{Error, Result, RunId, Urn};

pub struct Context {
    stack: String,
    engine: Arc<dyn Engine>,
    graph: RefCell<ResourceGraph>,
    resources: RefCell<Vec<Resource>>,
}

impl Context {
    pub fn new(stack: impl Into<String>, engine: Arc<dyn Engine>) -> Self {
        Self {
            stack: stack.into(),
            engine,
            graph: RefCell::new(ResourceGraph::new()),
            resources: RefCell::new(Vec::new()),
        }
    }

    pub fn stack(&self) -> &str {
        &self.stack
    }

    pub fn engine_name(&self) -> &'static str {
        self.engine.name()
    }

    /// Start declaring a provider resource.
    pub fn resource(&self, type_token: &str, name: impl Into<String>) -> ResourceBuilder<'_> {
        ResourceBuilder::new(self, type_token.to_string(), name.into())
    }

    /// Declare a component grouping. Components are recorded in the graph
    /// but never sent to the engine.
    pub fn component(
        &self,
        type_token: &str,
        name: &str,
        parent: Option<&ComponentResource>,
    ) -> Result<ComponentResource> {
        let urn = Urn::new(&self.stack, type_token, name);
        self.graph.borrow_mut().add(ResourceNode {
            urn: urn.clone(),
            kind: NodeKind::Component,
            type_token: type_token.to_string(),
            name: name.to_string(),
            parent: parent.map(|p| p.urn().clone()),
            dependencies: BTreeSet::new(),
            depends_on: BTreeSet::new(),
            ignore_changes: Vec::new(),
            protect: false,
        })?;
        debug!(urn = %urn, "declared component");
        Ok(ComponentResource::new(
            urn,
            type_token.to_string(),
            name.to_string(),
        ))
    }

    /// The declarations recorded so far.
    pub fn graph(&self) -> Ref<'_, ResourceGraph> {
        self.graph.borrow()
    }

    pub(crate) fn register_resource(
        &self,
        type_token: String,
        name: String,
        inputs: BTreeMap<String, Output<Value>>,
        options: ResourceOptions,
    ) -> Result<Resource> {
        let urn = Urn::new(&self.stack, &type_token, &name);

        let dependencies: BTreeSet<Urn> = inputs
            .values()
            .flat_map(|input| input.dependencies().iter().cloned())
            .collect();
        let depends_on: BTreeSet<Urn> = options
            .depends_on
            .iter()
            .map(|r| r.urn().clone())
            .collect();

        self.graph.borrow_mut().add(ResourceNode {
            urn: urn.clone(),
            kind: NodeKind::Resource,
            type_token: type_token.clone(),
            name: name.clone(),
            parent: options.parent.clone(),
            dependencies: dependencies.clone(),
            depends_on: depends_on.clone(),
            ignore_changes: options.ignore_changes.clone(),
            protect: options.protect,
        })?;
        debug!(
            urn = %urn,
            dependencies = dependencies.len(),
            explicit = depends_on.len(),
            "declared resource"
        );

        let engine = Arc::clone(&self.engine);
        let mut all_dependencies = dependencies;
        all_dependencies.extend(depends_on);

        let request_urn = urn.clone();
        let request_type = type_token.clone();
        let request_name = name.clone();
        let ResourceOptions {
            parent,
            depends_on: waits,
            ignore_changes,
            protect,
            additional_secret_outputs,
        } = options;

        let state = async move {
            for dep in &waits {
                dep.state().await?;
            }

            let mut resolved = Map::new();
            let mut secret_inputs = BTreeSet::new();
            for (key, input) in inputs {
                let (value, secret) = input.resolve_with_secret().await?;
                if secret {
                    secret_inputs.insert(key.clone());
                }
                resolved.insert(key, value);
            }

            let request = RegisterResourceRequest {
                urn: request_urn.clone(),
                type_token: request_type,
                name: request_name,
                parent,
                inputs: resolved,
                secret_inputs: secret_inputs.clone(),
                dependencies: all_dependencies,
                ignore_changes,
                protect,
            };

            let registered = engine.register(request).await.map_err(|e| match e {
                Error::Provisioning { .. } => e,
                other => Error::Provisioning {
                    urn: request_urn.to_string(),
                    message: other.to_string(),
                },
            })?;
            debug!(urn = %request_urn, operation = %registered.operation, "registered resource");

            let mut secret_outputs: BTreeSet<String> =
                additional_secret_outputs.into_iter().collect();
            secret_outputs.extend(secret_inputs);

            Ok(Arc::new(ResourceState {
                id: registered.id,
                outputs: registered.outputs,
                secret_outputs,
                operation: registered.operation,
            }))
        }
        .boxed()
        .shared();

        let resource = Resource::new(urn, type_token, name, state);
        self.resources.borrow_mut().push(resource.clone());
        Ok(resource)
    }

    /// Hand every declaration to the engine and wait for all of them.
    ///
    /// The first failure aborts the run; the engine's own state decides
    /// what the next apply has to redo.
    pub async fn apply(&self) -> Result<ApplySummary> {
        self.graph.borrow().validate()?;
        let resources: Vec<Resource> = self.resources.borrow().clone();

        let run_id = RunId::new();
        let started_at = Utc::now();
        info!(
            %run_id,
            stack = %self.stack,
            engine = self.engine.name(),
            resources = resources.len(),
            "apply started"
        );

        let states = future::try_join_all(resources.iter().map(|r| r.state()))
            .await
            .inspect_err(|e| error!(%run_id, error = %e, "apply failed"))?;

        let changes = resources
            .iter()
            .zip(states)
            .map(|(resource, state)| ResourceChange {
                urn: resource.urn().clone(),
                resource_type: resource.type_token().to_string(),
                name: resource.name().to_string(),
                operation: state.operation,
            })
            .collect();

        let summary = ApplySummary {
            run_id,
            started_at,
            finished_at: Utc::now(),
            changes,
        };
        info!(
            %run_id,
            created = summary.created(),
            updated = summary.updated(),
            unchanged = summary.unchanged(),
            "apply finished"
        );
        Ok(summary)
    }
}
