//! References to secret-store entries.

use crate::output::Output;
use crate::resource::Resource;

/// Name and ARN of a secret-store entry.
///
/// Only the reference travels between components; the secret value itself
/// is never part of an outputs record.
#[derive(Debug, Clone)]
pub struct SecretRef {
    pub name: Output<String>,
    pub arn: Output<String>,
}

impl SecretRef {
    /// Reference a registered secret through its `name` and `arn` outputs.
    pub fn from_resource(secret: &Resource) -> Self {
        Self {
            name: secret.output("name"),
            arn: secret.output("arn"),
        }
    }
}
