//! Storage component contract.

use crate::output::Output;
use crate::secret::SecretRef;

#[derive(Debug, Clone)]
pub struct StorageOutputs {
    pub bucket_name: Output<String>,
    /// `https://` base URL of the CDN in front of the bucket.
    pub cdn_base_url: Output<String>,
    pub service_account_secret: SecretRef,
}

/// Private object storage fronted by a CDN.
pub trait Storage {
    fn outputs(&self) -> &StorageOutputs;
}
