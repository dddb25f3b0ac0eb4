//! Deferred values.
//!
//! An [`Output`] is a handle to a value that only exists once the engine has
//! finished registering the resources it derives from. Consumers never read
//! it synchronously; they attach pure transformations with [`Output::apply`]
//! and friends, and hand the result to further declarations.
//!
//! Every output carries:
//! - the set of resource URNs it derives from, so a declaration consuming it
//!   picks up the dependency edge without any manual sequencing;
//! - a secret flag that survives every combinator.
//!
//! Outputs are lazily driven shared futures: cloning is cheap and the
//! underlying registration runs at most once no matter how many consumers
//! await it.

use std::collections::BTreeSet;
use std::fmt;
use std::future::Future;

use futures::future::{self, BoxFuture, FutureExt, Shared};
use serde::Serialize;
use serde_json::Value;

use crate::{Error, Result, Urn};

/// Bound shared by every type carried in an [`Output`].
pub trait OutputValue: Clone + Send + Sync + 'static {}

impl<T: Clone + Send + Sync + 'static> OutputValue for T {}

#[derive(Clone)]
pub(crate) struct Resolved<T> {
    pub(crate) value: T,
    pub(crate) secret: bool,
}

pub(crate) type Resolution<T> = std::result::Result<Resolved<T>, Error>;

/// A value materialized later by the provisioning engine.
pub struct Output<T: OutputValue> {
    future: Shared<BoxFuture<'static, Resolution<T>>>,
    dependencies: BTreeSet<Urn>,
}

impl<T: OutputValue> Output<T> {
    pub(crate) fn from_future<F>(future: F, dependencies: BTreeSet<Urn>) -> Self
    where
        F: Future<Output = Resolution<T>> + Send + 'static,
    {
        Self {
            future: future.boxed().shared(),
            dependencies,
        }
    }

    /// A value known at declaration time.
    pub fn known(value: T) -> Self {
        Self::from_future(
            future::ready(Ok(Resolved {
                value,
                secret: false,
            })),
            BTreeSet::new(),
        )
    }

    /// A value known at declaration time that must never be displayed.
    pub fn secret(value: T) -> Self {
        Self::from_future(
            future::ready(Ok(Resolved {
                value,
                secret: true,
            })),
            BTreeSet::new(),
        )
    }

    /// An output that resolves to `err`.
    pub fn failed(err: Error) -> Self {
        Self::from_future(future::ready(Err(err)), BTreeSet::new())
    }

    /// URNs of the resources this value derives from.
    pub fn dependencies(&self) -> &BTreeSet<Urn> {
        &self.dependencies
    }

    /// Transform the value once it resolves.
    pub fn apply<U, F>(&self, f: F) -> Output<U>
    where
        U: OutputValue,
        F: FnOnce(T) -> U + Send + 'static,
    {
        let upstream = self.future.clone();
        Output::from_future(
            async move {
                let resolved = upstream.await?;
                Ok(Resolved {
                    value: f(resolved.value),
                    secret: resolved.secret,
                })
            },
            self.dependencies.clone(),
        )
    }

    /// Like [`Output::apply`] for transformations that can fail.
    pub fn try_apply<U, F>(&self, f: F) -> Output<U>
    where
        U: OutputValue,
        F: FnOnce(T) -> Result<U> + Send + 'static,
    {
        let upstream = self.future.clone();
        Output::from_future(
            async move {
                let resolved = upstream.await?;
                Ok(Resolved {
                    value: f(resolved.value)?,
                    secret: resolved.secret,
                })
            },
            self.dependencies.clone(),
        )
    }

    /// Combine two outputs. The result is secret if either side is.
    pub fn zip<U: OutputValue>(&self, other: &Output<U>) -> Output<(T, U)> {
        let left = self.future.clone();
        let right = other.future.clone();
        let dependencies = self
            .dependencies
            .union(&other.dependencies)
            .cloned()
            .collect();

        Output::from_future(
            async move {
                let (l, r) = future::try_join(left, right).await?;
                Ok(Resolved {
                    value: (l.value, r.value),
                    secret: l.secret || r.secret,
                })
            },
            dependencies,
        )
    }

    /// Collect many outputs into one, preserving order.
    pub fn all<I>(outputs: I) -> Output<Vec<T>>
    where
        I: IntoIterator<Item = Output<T>>,
    {
        let outputs: Vec<Output<T>> = outputs.into_iter().collect();
        let dependencies = outputs
            .iter()
            .flat_map(|o| o.dependencies.iter().cloned())
            .collect();
        let futures: Vec<_> = outputs.into_iter().map(|o| o.future).collect();

        Output::from_future(
            async move {
                let resolved = future::try_join_all(futures).await?;
                let secret = resolved.iter().any(|r| r.secret);
                Ok(Resolved {
                    value: resolved.into_iter().map(|r| r.value).collect(),
                    secret,
                })
            },
            dependencies,
        )
    }

    /// The same value, marked secret.
    pub fn as_secret(&self) -> Output<T> {
        let upstream = self.future.clone();
        Output::from_future(
            async move {
                let resolved = upstream.await?;
                Ok(Resolved {
                    value: resolved.value,
                    secret: true,
                })
            },
            self.dependencies.clone(),
        )
    }

    /// Wait for the value.
    pub async fn resolve(&self) -> Result<T> {
        self.future.clone().await.map(|r| r.value)
    }

    /// Wait for the value and its secret flag.
    pub async fn resolve_with_secret(&self) -> Result<(T, bool)> {
        self.future.clone().await.map(|r| (r.value, r.secret))
    }
}

impl<T: OutputValue> Clone for Output<T> {
    fn clone(&self) -> Self {
        Self {
            future: self.future.clone(),
            dependencies: self.dependencies.clone(),
        }
    }
}

impl<T: OutputValue> fmt::Debug for Output<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Output")
            .field("dependencies", &self.dependencies)
            .finish_non_exhaustive()
    }
}

impl From<&str> for Output<String> {
    fn from(value: &str) -> Self {
        Output::known(value.to_string())
    }
}

impl From<String> for Output<String> {
    fn from(value: String) -> Self {
        Output::known(value)
    }
}

/// Conversion into a resource input property.
pub trait IntoInput {
    fn into_input(self) -> Output<Value>;
}

impl IntoInput for Value {
    fn into_input(self) -> Output<Value> {
        Output::known(self)
    }
}

impl IntoInput for &str {
    fn into_input(self) -> Output<Value> {
        Output::known(Value::String(self.to_string()))
    }
}

impl IntoInput for String {
    fn into_input(self) -> Output<Value> {
        Output::known(Value::String(self))
    }
}

macro_rules! plain_input {
    ($($ty:ty),*) => {
        $(
            impl IntoInput for $ty {
                fn into_input(self) -> Output<Value> {
                    Output::known(Value::from(self))
                }
            }
        )*
    };
}

plain_input!(bool, i32, i64, u16, u32, u64);

impl<T: OutputValue + Serialize> IntoInput for Output<T> {
    fn into_input(self) -> Output<Value> {
        self.try_apply(|value| serde_json::to_value(value).map_err(Error::from))
    }
}

impl<T: OutputValue + Serialize> IntoInput for &Output<T> {
    fn into_input(self) -> Output<Value> {
        self.clone().into_input()
    }
}

impl<T: IntoInput> IntoInput for Vec<T> {
    fn into_input(self) -> Output<Value> {
        Output::all(self.into_iter().map(IntoInput::into_input)).apply(Value::Array)
    }
}

impl<T: IntoInput, const N: usize> IntoInput for [T; N] {
    fn into_input(self) -> Output<Value> {
        Vec::from(self).into_input()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_apply_transforms_value() {
        let dns = Output::known("alb-123.elb.amazonaws.com".to_string());
        let url = dns.apply(|d| format!("http://{d}"));
        assert_eq!(url.resolve().await.unwrap(), "http://alb-123.elb.amazonaws.com");
    }

    #[tokio::test]
    async fn test_secret_flag_propagates() {
        let password = Output::secret("hunter2".to_string());
        let host = Output::known("db.internal".to_string());
        let url = password
            .zip(&host)
            .apply(|(pw, host)| format!("postgres://skreg:{pw}@{host}"));

        let (_, secret) = url.resolve_with_secret().await.unwrap();
        assert!(secret);

        let (_, plain) = host.resolve_with_secret().await.unwrap();
        assert!(!plain);
    }

    #[tokio::test]
    async fn test_all_preserves_order() {
        let ids = Output::all(vec![
            Output::known("subnet-a".to_string()),
            Output::known("subnet-b".to_string()),
        ]);
        assert_eq!(ids.resolve().await.unwrap(), vec!["subnet-a", "subnet-b"]);
    }

    #[tokio::test]
    async fn test_errors_propagate_through_combinators() {
        let broken: Output<String> = Output::failed(Error::Internal("boom".to_string()));
        let derived = broken.apply(|s| s.len()).zip(&Output::known(1usize));
        let err = derived.resolve().await.unwrap_err();
        assert!(matches!(err, Error::Internal(_)));
    }

    #[tokio::test]
    async fn test_try_apply_surfaces_failure() {
        let value = Output::known(3u32);
        let checked = value.try_apply(|v| {
            if v > 2 {
                Err(Error::InvalidInput("too large".to_string()))
            } else {
                Ok(v)
            }
        });
        assert!(matches!(
            checked.resolve().await,
            Err(Error::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_into_input_serializes_nested_outputs() {
        let input = vec![Output::known("sg-1".to_string()), Output::known("sg-2".to_string())]
            .into_input();
        assert_eq!(input.resolve().await.unwrap(), json!(["sg-1", "sg-2"]));
    }

    #[test]
    fn test_debug_never_prints_value() {
        let secret = Output::secret("super-secret-password".to_string());
        let rendered = format!("{secret:?}");
        assert!(!rendered.contains("super-secret-password"));
    }
}
