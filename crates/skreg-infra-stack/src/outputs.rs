//! Published stack outputs.

use serde::Serialize;
use serde_json::Value;
use skreg_infra_core::compute::CnameRecord;
use skreg_infra_core::pki::HsmBackend;
use skreg_infra_core::{Output, OutputValue, Result};
use std::collections::BTreeMap;

/// Placeholder published instead of a secret value.
pub const REDACTED: &str = "[secret]";

/// Deferred values the stack publishes once an apply finishes.
#[derive(Debug, Clone)]
pub struct StackOutputs {
    pub api_url: Output<String>,
    pub alb_dns_name: Option<Output<String>>,
    pub cert_validation_cname: Option<Output<Option<CnameRecord>>>,
    pub cdn_base_url: Output<String>,
    pub root_ca_cert: Output<String>,
    pub ecr_api_repo: Output<String>,
    pub ecr_worker_repo: Output<String>,
    pub oidc_role_arn: Output<String>,
    pub deploy_role_arn: Output<String>,
    /// Backend actually used for the root CA key.
    pub pki_backend: HsmBackend,
}

impl StackOutputs {
    /// Resolve every output. Secret values are replaced by [`REDACTED`] and
    /// absent optional outputs are published as `null`.
    pub async fn publish(&self) -> Result<BTreeMap<String, Value>> {
        let mut published = BTreeMap::new();

        published.insert("api_url".to_string(), publish(&self.api_url).await?);
        published.insert(
            "alb_dns_name".to_string(),
            publish_optional(self.alb_dns_name.as_ref()).await?,
        );
        published.insert(
            "cert_validation_cname".to_string(),
            publish_optional(self.cert_validation_cname.as_ref()).await?,
        );
        published.insert("cdn_base_url".to_string(), publish(&self.cdn_base_url).await?);
        published.insert("root_ca_cert".to_string(), publish(&self.root_ca_cert).await?);
        published.insert("ecr_api_repo".to_string(), publish(&self.ecr_api_repo).await?);
        published.insert(
            "ecr_worker_repo".to_string(),
            publish(&self.ecr_worker_repo).await?,
        );
        published.insert("oidc_role_arn".to_string(), publish(&self.oidc_role_arn).await?);
        published.insert(
            "deploy_role_arn".to_string(),
            publish(&self.deploy_role_arn).await?,
        );

        Ok(published)
    }
}

async fn publish<T: OutputValue + Serialize>(output: &Output<T>) -> Result<Value> {
    let (value, secret) = output.resolve_with_secret().await?;
    if secret {
        return Ok(Value::String(REDACTED.to_string()));
    }
    Ok(serde_json::to_value(value)?)
}

async fn publish_optional<T: OutputValue + Serialize>(output: Option<&Output<T>>) -> Result<Value> {
    match output {
        Some(output) => publish(output).await,
        None => Ok(Value::Null),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[tokio::test]
    async fn test_secrets_are_redacted() {
        let value = publish(&Output::secret("postgres://skreg:pw@db/skreg".to_string()))
            .await
            .unwrap();
        assert_eq!(value, json!(REDACTED));
    }

    #[tokio::test]
    async fn test_absent_and_pending_are_null() {
        assert_eq!(publish_optional::<String>(None).await.unwrap(), Value::Null);

        let pending: Output<Option<CnameRecord>> = Output::known(None);
        assert_eq!(publish_optional(Some(&pending)).await.unwrap(), Value::Null);
    }
}
