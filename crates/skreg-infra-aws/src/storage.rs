//! S3 bucket behind a CloudFront distribution.

use serde_json::json;
use skreg_infra_core::storage::{Storage, StorageOutputs};
use skreg_infra_core::{ComponentResource, Context, Result, SecretRef};
use tracing::debug;

use crate::types;

const ORIGIN_ID: &str = "s3-origin";

/// Private, encrypted bucket for package content. Content is immutable and
/// content-addressed, so the CDN caches GET/HEAD without forwarding query
/// strings or cookies.
pub struct AwsStorage {
    component: ComponentResource,
    outputs: StorageOutputs,
}

impl AwsStorage {
    pub const TYPE: &'static str = "skreg:aws:Storage";

    pub fn new(ctx: &Context, name: &str) -> Result<Self> {
        debug!(component = name, "declaring storage");
        let component = ctx.component(Self::TYPE, name, None)?;

        let bucket = ctx
            .resource(types::BUCKET, format!("{name}-bucket"))
            .parent(&component)
            .input("forceDestroy", false)
            .input(
                "serverSideEncryptionConfiguration",
                json!({
                    "rule": {
                        "applyServerSideEncryptionByDefault": {"sseAlgorithm": "AES256"}
                    }
                }),
            )
            .register()?;

        ctx.resource(types::BUCKET_PUBLIC_ACCESS_BLOCK, format!("{name}-bucket-pab"))
            .parent(&component)
            .input("bucket", bucket.id())
            .input("blockPublicAcls", true)
            .input("blockPublicPolicy", true)
            .input("ignorePublicAcls", true)
            .input("restrictPublicBuckets", true)
            .register()?;

        let service_secret = ctx
            .resource(types::SECRET, format!("{name}-storage-credentials"))
            .parent(&component)
            .register()?;

        let origin = bucket
            .output::<String>("bucketRegionalDomainName")
            .apply(|domain| json!([{"originId": ORIGIN_ID, "domainName": domain}]));

        let distribution = ctx
            .resource(types::DISTRIBUTION, format!("{name}-cdn"))
            .parent(&component)
            .input("enabled", true)
            .input("origins", origin)
            .input(
                "defaultCacheBehavior",
                json!({
                    "targetOriginId": ORIGIN_ID,
                    "viewerProtocolPolicy": "redirect-to-https",
                    "allowedMethods": ["GET", "HEAD"],
                    "cachedMethods": ["GET", "HEAD"],
                    "forwardedValues": {
                        "queryString": false,
                        "cookies": {"forward": "none"}
                    }
                }),
            )
            .input(
                "restrictions",
                json!({"geoRestriction": {"restrictionType": "none"}}),
            )
            .input(
                "viewerCertificate",
                json!({"cloudfrontDefaultCertificate": true}),
            )
            .register()?;

        let outputs = StorageOutputs {
            bucket_name: bucket.output("bucket"),
            cdn_base_url: distribution
                .output::<String>("domainName")
                .apply(|domain| format!("https://{domain}")),
            service_account_secret: SecretRef::from_resource(&service_secret),
        };

        Ok(Self { component, outputs })
    }

    pub fn component(&self) -> &ComponentResource {
        &self.component
    }
}

impl Storage for AwsStorage {
    fn outputs(&self) -> &StorageOutputs {
        &self.outputs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulate;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_outputs_resolve() {
        let ctx = Context::new("test", Arc::new(simulate::engine()));
        let storage = AwsStorage::new(&ctx, "skreg-storage").unwrap();
        ctx.apply().await.unwrap();

        let outputs = storage.outputs();
        let bucket = outputs.bucket_name.resolve().await.unwrap();
        assert!(bucket.starts_with("skreg-storage-bucket-"));

        let url = outputs.cdn_base_url.resolve().await.unwrap();
        assert!(url.starts_with("https://"));
        assert!(url.ends_with(".cloudfront.net"));

        let secret_arn = outputs.service_account_secret.arn.resolve().await.unwrap();
        assert!(secret_arn.starts_with("arn:aws:secretsmanager:"));
    }

    #[tokio::test]
    async fn test_cdn_only_caches_reads() {
        let engine = Arc::new(simulate::engine());
        let ctx = Context::new("test", engine.clone());
        AwsStorage::new(&ctx, "storage").unwrap();
        ctx.apply().await.unwrap();

        let cdn = engine.stored_inputs("storage-cdn").unwrap().unwrap();
        let behavior = &cdn["defaultCacheBehavior"];
        assert_eq!(behavior["allowedMethods"], json!(["GET", "HEAD"]));
        assert_eq!(behavior["forwardedValues"]["queryString"], json!(false));
        assert_eq!(behavior["forwardedValues"]["cookies"]["forward"], json!("none"));

        let bucket = engine.stored_outputs("storage-bucket").unwrap().unwrap();
        assert_eq!(
            cdn["origins"][0]["domainName"],
            bucket["bucketRegionalDomainName"]
        );
    }

    #[tokio::test]
    async fn test_bucket_encrypted_and_private() {
        let engine = Arc::new(simulate::engine());
        let ctx = Context::new("test", engine.clone());
        AwsStorage::new(&ctx, "storage").unwrap();
        ctx.apply().await.unwrap();

        let bucket = engine.stored_inputs("storage-bucket").unwrap().unwrap();
        assert_eq!(
            bucket["serverSideEncryptionConfiguration"]["rule"]["applyServerSideEncryptionByDefault"]
                ["sseAlgorithm"],
            json!("AES256")
        );
        let pab = engine.stored_inputs("storage-bucket-pab").unwrap().unwrap();
        assert_eq!(pab["blockPublicPolicy"], json!(true));
    }
}
