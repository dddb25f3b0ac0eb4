//! The skreg stack.

use serde::Serialize;
use serde_json::Value;
use skreg_infra_aws::{
    AwsCompute, AwsComputeArgs, AwsDatabase, AwsDatabaseArgs, AwsNetwork, AwsOidc, AwsPki,
    AwsPkiArgs, AwsStorage, RootCa,
};
use skreg_infra_config::{CloudProvider, StackConfig};
use skreg_infra_core::compute::Compute;
use skreg_infra_core::database::Database;
use skreg_infra_core::network::Network;
use skreg_infra_core::oidc::Oidc;
use skreg_infra_core::pki::{HsmBackend, Pki};
use skreg_infra_core::storage::Storage;
use skreg_infra_core::{ApplySummary, Context, Engine, Error, Result};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::outputs::StackOutputs;

pub const NETWORK: &str = "skreg-network";
pub const STORAGE: &str = "skreg-storage";
pub const PKI: &str = "skreg-pki";
pub const DATABASE: &str = "skreg-db";
pub const COMPUTE: &str = "skreg-compute";
pub const OIDC: &str = "skreg-oidc";

/// Outcome of [`SkregStack::run`].
#[derive(Debug, Clone, Serialize)]
pub struct StackRun {
    pub summary: ApplySummary,
    pub outputs: BTreeMap<String, Value>,
}

/// Orchestrates every component for one environment.
pub struct SkregStack {
    config: StackConfig,
    root_ca: Option<RootCa>,
}

impl SkregStack {
    pub fn new(config: StackConfig) -> Self {
        Self {
            config,
            root_ca: None,
        }
    }

    /// Use pre-generated root CA material instead of generating a new
    /// RSA-4096 key pair during declaration.
    pub fn with_root_ca(mut self, root_ca: RootCa) -> Self {
        self.root_ca = Some(root_ca);
        self
    }

    pub fn config(&self) -> &StackConfig {
        &self.config
    }

    /// Name used for the stack segment of every URN.
    pub fn stack_name(&self) -> String {
        self.config.environment.to_string()
    }

    /// Declare every component into `ctx`.
    ///
    /// Only AWS is implemented; any other provider fails before anything is
    /// declared.
    pub fn declare(&self, ctx: &Context) -> Result<StackOutputs> {
        match self.config.cloud_provider {
            CloudProvider::Aws => self.declare_aws(ctx),
            other => Err(Error::NotImplemented(other.to_string())),
        }
    }

    fn declare_aws(&self, ctx: &Context) -> Result<StackOutputs> {
        let config = &self.config;

        if config.hsm_backend == HsmBackend::Hsm {
            warn!(
                requested = %config.hsm_backend,
                "HSM-backed PKI is not implemented, using the software backend"
            );
        }

        let network = AwsNetwork::new(ctx, NETWORK)?;
        let storage = AwsStorage::new(ctx, STORAGE)?;

        let mut pki_args = AwsPkiArgs::new(storage.outputs().bucket_name.clone());
        if let Some(root_ca) = &self.root_ca {
            pki_args = pki_args.with_root_ca(root_ca.clone());
        }
        let pki = AwsPki::new(ctx, PKI, pki_args)?;

        let database = AwsDatabase::new(
            ctx,
            DATABASE,
            AwsDatabaseArgs {
                vpc_id: network.outputs().vpc_id.clone(),
                subnet_ids: network.outputs().private_subnets(),
                instance_class: config.db_instance_class.clone(),
                multi_az: config.multi_az,
            },
        )?;

        let compute = AwsCompute::new(
            ctx,
            COMPUTE,
            AwsComputeArgs {
                vpc_id: network.outputs().vpc_id.clone(),
                public_subnet_ids: network.outputs().public_subnets(),
                private_subnet_ids: network.outputs().private_subnets(),
                database_secret: database.outputs().credentials.clone(),
                api_image_uri: config.api_image().map(str::to_string),
                worker_image_uri: config.worker_image().map(str::to_string),
                domain_name: config.domain().map(str::to_string),
            },
        )?;

        let oidc = AwsOidc::new(ctx, OIDC, &config.github_repo)?;

        let compute_outputs = compute.outputs();
        Ok(StackOutputs {
            api_url: compute_outputs.service_url.clone(),
            alb_dns_name: compute_outputs.alb_dns_name.clone(),
            cert_validation_cname: compute_outputs.cert_validation_cname.clone(),
            cdn_base_url: storage.outputs().cdn_base_url.clone(),
            root_ca_cert: pki.root_ca_cert_pem().clone(),
            ecr_api_repo: compute.ecr_api_repo().clone(),
            ecr_worker_repo: compute.ecr_worker_repo().clone(),
            oidc_role_arn: oidc.outputs().push_role_arn.clone(),
            deploy_role_arn: oidc.outputs().deploy_role_arn.clone(),
            pki_backend: pki.outputs().backend,
        })
    }

    /// Declare the stack, apply it with `engine` and publish the outputs.
    pub async fn run(&self, engine: Arc<dyn Engine>) -> Result<StackRun> {
        info!(
            provider = %self.config.cloud_provider,
            environment = %self.config.environment,
            engine = engine.name(),
            "stack run started"
        );

        let ctx = Context::new(self.stack_name(), engine);
        let outputs = self.declare(&ctx)?;
        let summary = ctx.apply().await?;
        let outputs = outputs.publish().await?;

        info!(
            run_id = %summary.run_id,
            created = summary.created(),
            updated = summary.updated(),
            unchanged = summary.unchanged(),
            "stack run finished"
        );
        Ok(StackRun { summary, outputs })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use skreg_infra_aws::simulate;
    use skreg_infra_config::Environment;
    use skreg_infra_core::{MemoryEngine, Operation};

    fn config() -> StackConfig {
        StackConfig::new(CloudProvider::Aws)
    }

    fn stack(config: StackConfig) -> SkregStack {
        SkregStack::new(config).with_root_ca(RootCa::generate_with_key_size(2048).unwrap())
    }

    #[tokio::test]
    async fn test_publishes_every_output() {
        let engine = Arc::new(simulate::engine());
        let run = stack(config()).run(engine).await.unwrap();

        let keys: Vec<&str> = run.outputs.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            vec![
                "alb_dns_name",
                "api_url",
                "cdn_base_url",
                "cert_validation_cname",
                "deploy_role_arn",
                "ecr_api_repo",
                "ecr_worker_repo",
                "oidc_role_arn",
                "root_ca_cert",
            ]
        );

        let dns = run.outputs["alb_dns_name"].as_str().unwrap();
        assert_eq!(run.outputs["api_url"], json!(format!("http://{dns}")));
        assert_eq!(run.outputs["cert_validation_cname"], Value::Null);
        assert!(run.outputs["cdn_base_url"].as_str().unwrap().starts_with("https://"));
        assert!(
            run.outputs["root_ca_cert"]
                .as_str()
                .unwrap()
                .contains("BEGIN CERTIFICATE")
        );
        assert_ne!(run.outputs["oidc_role_arn"], run.outputs["deploy_role_arn"]);
        assert!(run.summary.created() > 0);
        assert_eq!(run.summary.updated(), 0);
    }

    #[tokio::test]
    async fn test_domain_mode() {
        let mut config = config();
        config.domain_name = "skreg.dev".to_string();

        let run = stack(config).run(Arc::new(simulate::engine())).await.unwrap();

        assert_eq!(run.outputs["api_url"], json!("https://skreg.dev"));
        let cname = &run.outputs["cert_validation_cname"];
        assert_eq!(cname["type"], json!("CNAME"));
        assert!(!cname["name"].as_str().unwrap().is_empty());
        assert!(!cname["value"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reapply_converges_without_rotating_ca() {
        let engine = Arc::new(simulate::engine());

        let first = stack(config()).run(engine.clone()).await.unwrap();
        let second = stack(config()).run(engine.clone()).await.unwrap();

        assert!(second.summary.is_noop());
        for name in [
            "skreg-pki-ca-key-version",
            "skreg-pki-ca-cert-version",
            "skreg-pki-crl",
        ] {
            assert_eq!(second.summary.change(name).unwrap().operation, Operation::Same);
        }
        assert_eq!(first.outputs, second.outputs);
    }

    #[tokio::test]
    async fn test_unimplemented_provider_declares_nothing() {
        let engine = Arc::new(MemoryEngine::new());
        for provider in [CloudProvider::Gcp, CloudProvider::Azure] {
            let err = stack(StackConfig::new(provider))
                .run(engine.clone())
                .await
                .unwrap_err();
            match err {
                Error::NotImplemented(name) => assert_eq!(name, provider.to_string()),
                other => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!(engine.registration_order().unwrap().len(), 0);
    }

    #[test]
    fn test_components_wired_in_dependency_order() {
        let ctx = Context::new("prod", Arc::new(simulate::engine()));
        stack(config()).declare(&ctx).unwrap();

        let graph = ctx.graph();
        graph.validate().unwrap();
        let urn = |name: &str| graph.find(name).unwrap().urn.clone();

        // Pki after the storage bucket.
        assert!(graph.depends_on(&urn("skreg-pki-crl"), &urn("skreg-storage-bucket")));
        // Database after the subnets.
        assert!(graph.depends_on(&urn("skreg-db-subnets"), &urn("skreg-network-priv-a")));
        assert!(graph.depends_on(&urn("skreg-db-rds"), &urn("skreg-network-vpc")));
        // Compute after the database secret.
        assert!(graph.depends_on(&urn("skreg-compute-api-task"), &urn("skreg-db-db-password")));
        assert!(graph.depends_on(&urn("skreg-compute-worker-svc"), &urn("skreg-db-db-password")));
        // Explicit overrides.
        assert!(graph.depends_on(&urn("skreg-compute-api-svc"), &urn("skreg-compute-listener")));
        assert!(graph.depends_on(&urn("skreg-network-nat"), &urn("skreg-network-igw")));
        // Oidc stands alone.
        assert!(!graph.depends_on(&urn("skreg-oidc-gh-role"), &urn("skreg-network-vpc")));

        let order = graph.topological_order().unwrap();
        let position = |name: &str| order.iter().position(|u| u.name() == name).unwrap();
        assert!(position("skreg-storage-bucket") < position("skreg-pki-crl"));
        assert!(position("skreg-db-db-password") < position("skreg-compute-api-task"));
    }

    #[tokio::test]
    async fn test_provisioning_failure_aborts_run() {
        let engine = Arc::new(simulate::engine());
        engine.fail_on("skreg-db-rds").unwrap();

        let err = stack(config()).run(engine.clone()).await.unwrap_err();
        match err {
            Error::Provisioning { urn, .. } => assert!(urn.ends_with("::skreg-db-rds")),
            other => panic!("unexpected error: {other}"),
        }

        // A second run after the fault clears picks up where the engine left off.
        engine.clear_failures().unwrap();
        let run = stack(config()).run(engine).await.unwrap();
        assert_eq!(
            run.summary.change("skreg-db-rds").unwrap().operation,
            Operation::Create
        );
        assert_eq!(
            run.summary.change("skreg-network-vpc").unwrap().operation,
            Operation::Same
        );
    }

    #[test]
    fn test_hsm_request_falls_back_to_software() {
        let config = config();
        assert_eq!(config.hsm_backend, HsmBackend::Hsm);

        let ctx = Context::new("prod", Arc::new(simulate::engine()));
        let outputs = stack(config).declare(&ctx).unwrap();
        assert_eq!(outputs.pki_backend, HsmBackend::Software);
    }

    #[tokio::test]
    async fn test_environment_names_the_stack() {
        let mut config = config();
        config.environment = Environment::Staging;

        let engine = Arc::new(simulate::engine());
        stack(config).run(engine.clone()).await.unwrap();

        let order = engine.registration_order().unwrap();
        assert!(order.iter().all(|urn| urn.as_str().starts_with("urn:skreg:staging::")));
    }

    #[tokio::test]
    async fn test_loaded_repo_reaches_trust_policy() {
        let config = StackConfig::from_vars([
            (skreg_infra_config::CLOUD_PROVIDER, "aws"),
            (skreg_infra_config::GITHUB_REPO, "acme/.github"),
        ])
        .unwrap();

        let engine = Arc::new(simulate::engine());
        stack(config).run(engine.clone()).await.unwrap();

        for role in ["skreg-oidc-gh-role", "skreg-oidc-deploy-role"] {
            let inputs = engine.stored_inputs(role).unwrap().unwrap();
            let policy = inputs["assumeRolePolicy"].as_str().unwrap();
            assert!(policy.contains("repo:acme/.github:ref:refs/heads/main"));
        }
    }
}
