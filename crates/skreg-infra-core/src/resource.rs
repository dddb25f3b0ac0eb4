//! Resource declarations.

use futures::future::{BoxFuture, Shared};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use crate::context::Context;
use crate::output::{IntoInput, Output, OutputValue, Resolved};
use crate::stack::Operation;
use crate::{Error, Result, Urn};

/// State of a resource after the engine registered it.
#[derive(Debug, Clone)]
pub struct ResourceState {
    pub id: String,
    pub outputs: Map<String, Value>,
    /// Output keys that must be treated as secret.
    pub secret_outputs: BTreeSet<String>,
    pub operation: Operation,
}

pub(crate) type StateFuture = Shared<BoxFuture<'static, Result<Arc<ResourceState>>>>;

/// Handle to a declared resource.
///
/// Nothing about the resource is known until the engine registers it; all
/// accessors return deferred values that carry this resource's URN as a
/// dependency.
#[derive(Clone)]
pub struct Resource {
    urn: Urn,
    type_token: String,
    name: String,
    state: StateFuture,
}

impl Resource {
    pub(crate) fn new(urn: Urn, type_token: String, name: String, state: StateFuture) -> Self {
        Self {
            urn,
            type_token,
            name,
            state,
        }
    }

    pub fn urn(&self) -> &Urn {
        &self.urn
    }

    pub fn type_token(&self) -> &str {
        &self.type_token
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Wait for the engine to register this resource.
    pub async fn state(&self) -> Result<Arc<ResourceState>> {
        self.state.clone().await
    }

    /// Provider-assigned identifier.
    pub fn id(&self) -> Output<String> {
        let state = self.state.clone();
        Output::from_future(
            async move {
                let state = state.await?;
                Ok(Resolved {
                    value: state.id.clone(),
                    secret: false,
                })
            },
            BTreeSet::from([self.urn.clone()]),
        )
    }

    /// A required output property.
    pub fn output<T>(&self, key: &str) -> Output<T>
    where
        T: OutputValue + DeserializeOwned,
    {
        let urn = self.urn.clone();
        let key = key.to_string();
        self.optional_output::<T>(&key).try_apply(move |value| {
            value.ok_or_else(|| Error::MissingOutput {
                urn: urn.to_string(),
                key,
            })
        })
    }

    /// An output property the provider may not have populated yet.
    /// Missing keys and JSON nulls both resolve to `None`.
    pub fn optional_output<T>(&self, key: &str) -> Output<Option<T>>
    where
        T: OutputValue + DeserializeOwned,
    {
        let state = self.state.clone();
        let key = key.to_string();
        Output::from_future(
            async move {
                let state = state.await?;
                let secret = state.secret_outputs.contains(&key);
                let value = match state.outputs.get(&key) {
                    None | Some(Value::Null) => None,
                    Some(value) => Some(serde_json::from_value(value.clone())?),
                };
                Ok(Resolved { value, secret })
            },
            BTreeSet::from([self.urn.clone()]),
        )
    }
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("urn", &self.urn)
            .field("type_token", &self.type_token)
            .finish_non_exhaustive()
    }
}

/// Logical grouping of resources under one name.
#[derive(Debug, Clone)]
pub struct ComponentResource {
    urn: Urn,
    type_token: String,
    name: String,
}

impl ComponentResource {
    pub(crate) fn new(urn: Urn, type_token: String, name: String) -> Self {
        Self {
            urn,
            type_token,
            name,
        }
    }

    pub fn urn(&self) -> &Urn {
        &self.urn
    }

    pub fn type_token(&self) -> &str {
        &self.type_token
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Options attached to a declaration.
#[derive(Debug, Clone, Default)]
pub struct ResourceOptions {
    pub parent: Option<Urn>,
    /// Resources that must be registered first even though no output of
    /// theirs is consumed.
    pub depends_on: Vec<Resource>,
    pub ignore_changes: Vec<String>,
    pub protect: bool,
    /// Output keys to treat as secret regardless of inputs.
    pub additional_secret_outputs: Vec<String>,
}

/// Builder returned by [`Context::resource`].
pub struct ResourceBuilder<'a> {
    ctx: &'a Context,
    type_token: String,
    name: String,
    inputs: BTreeMap<String, Output<Value>>,
    options: ResourceOptions,
}

impl<'a> ResourceBuilder<'a> {
    pub(crate) fn new(ctx: &'a Context, type_token: String, name: String) -> Self {
        Self {
            ctx,
            type_token,
            name,
            inputs: BTreeMap::new(),
            options: ResourceOptions::default(),
        }
    }

    pub fn input(mut self, key: &str, value: impl IntoInput) -> Self {
        self.inputs.insert(key.to_string(), value.into_input());
        self
    }

    pub fn parent(mut self, parent: &ComponentResource) -> Self {
        self.options.parent = Some(parent.urn().clone());
        self
    }

    pub fn depends_on(mut self, resource: &Resource) -> Self {
        self.options.depends_on.push(resource.clone());
        self
    }

    pub fn ignore_changes<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options
            .ignore_changes
            .extend(keys.into_iter().map(Into::into));
        self
    }

    pub fn protect(mut self) -> Self {
        self.options.protect = true;
        self
    }

    pub fn additional_secret_outputs<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options
            .additional_secret_outputs
            .extend(keys.into_iter().map(Into::into));
        self
    }

    /// Record the declaration and hand it to the engine.
    pub fn register(self) -> Result<Resource> {
        self.ctx
            .register_resource(self.type_token, self.name, self.inputs, self.options)
    }
}
