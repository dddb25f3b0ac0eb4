//! Core types for declaring skreg infrastructure.
//!
//! This crate contains:
//! - Deferred values ([`Output`]) and their combinators
//! - Resource declaration through an explicit [`Context`]
//! - The declaration graph with cycle detection
//! - The [`Engine`] seam and an in-memory engine
//! - Provider-agnostic outputs records and traits for each component

pub mod compute;
pub mod context;
pub mod database;
pub mod engine;
pub mod error;
pub mod graph;
pub mod id;
pub mod network;
pub mod oidc;
pub mod output;
pub mod pki;
pub mod resource;
pub mod secret;
pub mod stack;
pub mod storage;

pub use context::Context;
pub use engine::{Engine, MemoryEngine, RegisterResourceRequest, RegisteredResource};
pub use error::{Error, Result};
pub use id::{RunId, Urn};
pub use output::{IntoInput, Output, OutputValue};
pub use resource::{ComponentResource, Resource, ResourceBuilder, ResourceState};
pub use secret::SecretRef;
pub use stack::{ApplySummary, Operation, ResourceChange};
