//! Compute component contract.

use serde::{Deserialize, Serialize};

use crate::output::Output;

/// DNS record the operator must create to validate a certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CnameRecord {
    pub name: String,
    pub value: String,
    #[serde(rename = "type")]
    pub record_type: String,
}

#[derive(Debug, Clone)]
pub struct ComputeOutputs {
    /// `https://{domain}` when a domain is configured, else
    /// `http://{load balancer dns}`.
    pub service_url: Output<String>,
    pub worker_service_name: Output<String>,
    pub alb_dns_name: Option<Output<String>>,
    /// `None` exactly when no domain is configured. The inner value is
    /// `None` while the provider has not produced validation options.
    pub cert_validation_cname: Option<Output<Option<CnameRecord>>>,
}

impl ComputeOutputs {
    /// Whether the service is served on a custom domain.
    pub fn domain_mode(&self) -> bool {
        self.cert_validation_cname.is_some()
    }
}

/// Container services behind a public load balancer.
pub trait Compute {
    fn outputs(&self) -> &ComputeOutputs;
}
