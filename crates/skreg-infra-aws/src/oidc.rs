//! GitHub Actions federation for CI image pushes and deploys.

use skreg_infra_core::oidc::{GithubRepo, Oidc, OidcOutputs};
use skreg_infra_core::{ComponentResource, Context, Result};
use tracing::debug;

use crate::policy::{GITHUB_OIDC_AUDIENCE, GITHUB_OIDC_HOST, ecr_push_policy, github_trust_policy};
use crate::types;

/// Certificate thumbprints of the GitHub OIDC endpoint.
pub const GITHUB_THUMBPRINTS: [&str; 2] = [
    "6938fd4d98bab03faadb97b34396831e3780aea1",
    "1c58a3a8518e8759bf075b76b750d4f2df264fcd",
];

pub const ADMINISTRATOR_ACCESS_ARN: &str = "arn:aws:iam::aws:policy/AdministratorAccess";

/// OIDC provider plus a push-only role and a deploy role, both assumable
/// only from `repo`'s main branch.
pub struct AwsOidc {
    component: ComponentResource,
    outputs: OidcOutputs,
}

impl AwsOidc {
    pub const TYPE: &'static str = "skreg:aws:Oidc";

    pub fn new(ctx: &Context, name: &str, repo: &GithubRepo) -> Result<Self> {
        debug!(component = name, repo = %repo, "declaring oidc");
        let component = ctx.component(Self::TYPE, name, None)?;

        let provider = ctx
            .resource(types::OIDC_PROVIDER, format!("{name}-gh-oidc"))
            .parent(&component)
            .input("url", format!("https://{GITHUB_OIDC_HOST}"))
            .input("clientIdLists", [GITHUB_OIDC_AUDIENCE])
            .input("thumbprintLists", GITHUB_THUMBPRINTS)
            .register()?;

        let repo = repo.to_string();
        let trust_policy = provider
            .output::<String>("arn")
            .try_apply(move |arn| github_trust_policy(&arn, &repo).to_json());

        let push_role = ctx
            .resource(types::IAM_ROLE, format!("{name}-gh-role"))
            .parent(&component)
            .input("assumeRolePolicy", &trust_policy)
            .register()?;

        ctx.resource(types::IAM_ROLE_POLICY, format!("{name}-gh-policy"))
            .parent(&component)
            .input("role", push_role.output::<String>("name"))
            .input("policy", ecr_push_policy().to_json()?)
            .register()?;

        let deploy_role = ctx
            .resource(types::IAM_ROLE, format!("{name}-deploy-role"))
            .parent(&component)
            .input("assumeRolePolicy", &trust_policy)
            .register()?;

        ctx.resource(types::IAM_ROLE_POLICY_ATTACHMENT, format!("{name}-deploy-policy"))
            .parent(&component)
            .input("role", deploy_role.output::<String>("name"))
            .input("policyArn", ADMINISTRATOR_ACCESS_ARN)
            .register()?;

        let outputs = OidcOutputs {
            push_role_arn: push_role.output("arn"),
            deploy_role_arn: deploy_role.output("arn"),
        };

        Ok(Self { component, outputs })
    }

    pub fn component(&self) -> &ComponentResource {
        &self.component
    }
}

impl Oidc for AwsOidc {
    fn outputs(&self) -> &OidcOutputs {
        &self.outputs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulate;
    use pretty_assertions::assert_eq;
    use serde_json::{Value, json};
    use std::sync::Arc;

    fn repo() -> GithubRepo {
        "dymocaptin/skreg".parse().unwrap()
    }

    #[tokio::test]
    async fn test_role_arns_distinct_and_non_empty() {
        let ctx = Context::new("test", Arc::new(simulate::engine()));
        let first = AwsOidc::new(&ctx, "skreg-oidc", &repo()).unwrap();
        let second = AwsOidc::new(&ctx, "other-oidc", &repo()).unwrap();
        ctx.apply().await.unwrap();

        let arns = [
            first.outputs().push_role_arn.resolve().await.unwrap(),
            first.outputs().deploy_role_arn.resolve().await.unwrap(),
            second.outputs().push_role_arn.resolve().await.unwrap(),
            second.outputs().deploy_role_arn.resolve().await.unwrap(),
        ];
        for (i, arn) in arns.iter().enumerate() {
            assert!(!arn.is_empty());
            assert!(arns[i + 1..].iter().all(|other| other != arn));
        }
    }

    #[tokio::test]
    async fn test_trust_policy_pins_repo_and_branch() {
        let engine = Arc::new(simulate::engine());
        let ctx = Context::new("test", engine.clone());
        AwsOidc::new(&ctx, "oidc", &repo()).unwrap();
        ctx.apply().await.unwrap();

        let provider_arn = engine.stored_outputs("oidc-gh-oidc").unwrap().unwrap()["arn"].clone();
        for role in ["oidc-gh-role", "oidc-deploy-role"] {
            let inputs = engine.stored_inputs(role).unwrap().unwrap();
            let rendered = inputs["assumeRolePolicy"].as_str().unwrap();
            assert!(rendered.contains("repo:dymocaptin/skreg:ref:refs/heads/main"));
            assert!(!rendered.contains('*'));

            let policy: Value = serde_json::from_str(rendered).unwrap();
            assert_eq!(
                policy["Statement"][0]["Principal"],
                json!({"Federated": provider_arn})
            );
        }
    }

    #[tokio::test]
    async fn test_push_role_is_least_privilege() {
        let engine = Arc::new(simulate::engine());
        let ctx = Context::new("test", engine.clone());
        AwsOidc::new(&ctx, "oidc", &repo()).unwrap();
        ctx.apply().await.unwrap();

        let inputs = engine.stored_inputs("oidc-gh-policy").unwrap().unwrap();
        let policy: Value = serde_json::from_str(inputs["policy"].as_str().unwrap()).unwrap();
        assert_eq!(
            policy["Statement"][1]["Resource"],
            json!(["arn:aws:ecr:us-west-2:*:repository/skreg-*"])
        );

        let deploy = engine.stored_inputs("oidc-deploy-policy").unwrap().unwrap();
        assert_eq!(deploy["policyArn"], json!(ADMINISTRATOR_ACCESS_ARN));

        let provider = engine.stored_inputs("oidc-gh-oidc").unwrap().unwrap();
        assert_eq!(provider["clientIdLists"], json!(["sts.amazonaws.com"]));
        assert_eq!(provider["thumbprintLists"].as_array().unwrap().len(), 2);
    }
}
