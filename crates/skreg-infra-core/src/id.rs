//! Identifiers for declarations and apply runs.

use derive_more::Display;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of a single apply run.
/// Uses UUIDv7 so runs sort by start time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[display("{_0}")]
pub struct RunId(Uuid);

impl RunId {
    /// Create a new unique RunId using UUIDv7.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Get the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for RunId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Unique name of a declared resource or component.
///
/// Format: `urn:skreg:{stack}::{type}::{name}`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display)]
#[display("{_0}")]
#[serde(transparent)]
pub struct Urn(String);

impl Urn {
    pub fn new(stack: &str, type_token: &str, name: &str) -> Self {
        Self(format!("urn:skreg:{stack}::{type_token}::{name}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The logical name, i.e. the segment after the last `::`.
    pub fn name(&self) -> &str {
        self.0.rsplit("::").next().unwrap_or(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urn_format() {
        let urn = Urn::new("prod", "aws:ec2/vpc:Vpc", "skreg-network-vpc");
        assert_eq!(
            urn.as_str(),
            "urn:skreg:prod::aws:ec2/vpc:Vpc::skreg-network-vpc"
        );
        assert_eq!(urn.name(), "skreg-network-vpc");
    }

    #[test]
    fn test_run_ids_are_unique() {
        assert_ne!(RunId::new(), RunId::new());
    }
}
