//! AWS implementation of the skreg infrastructure components.
//!
//! Each component declares its resources through a
//! [`skreg_infra_core::Context`] under one component node and exposes the
//! provider-agnostic outputs record from `skreg_infra_core`.

pub mod ca;
pub mod compute;
pub mod database;
pub mod network;
pub mod oidc;
pub mod pki;
pub mod policy;
pub mod simulate;
pub mod storage;
pub mod types;

pub use ca::RootCa;
pub use compute::{AwsCompute, AwsComputeArgs};
pub use database::{AwsDatabase, AwsDatabaseArgs};
pub use network::AwsNetwork;
pub use oidc::AwsOidc;
pub use pki::{AwsPki, AwsPkiArgs};
pub use storage::AwsStorage;

pub use skreg_infra_core::oidc::GithubRepo;

/// Region every skreg resource lives in.
pub const REGION: &str = "us-west-2";
