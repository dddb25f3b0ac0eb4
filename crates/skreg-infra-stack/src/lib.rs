//! Stack orchestrator for skreg infrastructure.
//!
//! [`SkregStack`] declares every component for the configured provider in
//! dependency order, hands the declarations to an engine and publishes the
//! outputs downstream tooling consumes.

pub mod outputs;
pub mod stack;

pub use outputs::{REDACTED, StackOutputs};
pub use stack::{SkregStack, StackRun};
