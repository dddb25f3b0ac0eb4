//! IAM policy documents.
//!
//! Policies are built as typed documents and rendered to the JSON the IAM
//! API expects, so trust conditions can be inspected in tests instead of
//! grepping hand-written strings.

use serde::{Deserialize, Serialize};
use skreg_infra_core::Result;
use std::collections::BTreeMap;

use crate::REGION;

pub const POLICY_VERSION: &str = "2012-10-17";

pub const GITHUB_OIDC_HOST: &str = "token.actions.githubusercontent.com";
pub const GITHUB_OIDC_AUDIENCE: &str = "sts.amazonaws.com";

pub const ECS_TASKS_PRINCIPAL: &str = "ecs-tasks.amazonaws.com";

/// Only branch whose workflows may assume the CI roles.
pub const DEPLOY_BRANCH: &str = "main";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyDocument {
    pub version: String,
    pub statement: Vec<Statement>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    Allow,
    Deny,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Principal {
    Service(String),
    Federated(String),
}

/// Condition operator -> context key -> required value.
pub type Condition = BTreeMap<String, BTreeMap<String, String>>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Statement {
    pub effect: Effect,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub principal: Option<Principal>,
    pub action: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resource: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub condition: Condition,
}

impl Statement {
    pub fn allow<I, S>(actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            effect: Effect::Allow,
            principal: None,
            action: actions.into_iter().map(Into::into).collect(),
            resource: Vec::new(),
            condition: Condition::new(),
        }
    }

    pub fn principal(mut self, principal: Principal) -> Self {
        self.principal = Some(principal);
        self
    }

    pub fn resource(mut self, resource: impl Into<String>) -> Self {
        self.resource.push(resource.into());
        self
    }

    pub fn condition(mut self, operator: &str, key: &str, value: impl Into<String>) -> Self {
        self.condition
            .entry(operator.to_string())
            .or_default()
            .insert(key.to_string(), value.into());
        self
    }
}

impl PolicyDocument {
    pub fn new(statement: Vec<Statement>) -> Self {
        Self {
            version: POLICY_VERSION.to_string(),
            statement,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Trust policy letting ECS tasks assume a role.
pub fn ecs_task_trust_policy() -> PolicyDocument {
    PolicyDocument::new(vec![
        Statement::allow(["sts:AssumeRole"])
            .principal(Principal::Service(ECS_TASKS_PRINCIPAL.to_string())),
    ])
}

/// Subject claim GitHub puts in tokens for workflows on `repo`'s deploy branch.
pub fn github_subject(repo: &str) -> String {
    format!("repo:{repo}:ref:refs/heads/{DEPLOY_BRANCH}")
}

/// Trust policy letting GitHub Actions workflows of `repo` assume a role,
/// and only from the deploy branch.
pub fn github_trust_policy(provider_arn: &str, repo: &str) -> PolicyDocument {
    PolicyDocument::new(vec![
        Statement::allow(["sts:AssumeRoleWithWebIdentity"])
            .principal(Principal::Federated(provider_arn.to_string()))
            .condition(
                "StringEquals",
                &format!("{GITHUB_OIDC_HOST}:aud"),
                GITHUB_OIDC_AUDIENCE,
            )
            .condition(
                "StringEquals",
                &format!("{GITHUB_OIDC_HOST}:sub"),
                github_subject(repo),
            ),
    ])
}

/// Repositories the CI push role may write to.
pub fn ecr_repository_pattern() -> String {
    format!("arn:aws:ecr:{REGION}:*:repository/skreg-*")
}

/// Permissions needed to push images to the skreg repositories.
pub fn ecr_push_policy() -> PolicyDocument {
    PolicyDocument::new(vec![
        Statement::allow(["ecr:GetAuthorizationToken"]).resource("*"),
        Statement::allow([
            "ecr:BatchCheckLayerAvailability",
            "ecr:PutImage",
            "ecr:InitiateLayerUpload",
            "ecr:UploadLayerPart",
            "ecr:CompleteLayerUpload",
        ])
        .resource(ecr_repository_pattern()),
    ])
}

/// Read access to exactly one secret.
pub fn secret_read_policy(secret_arn: &str) -> PolicyDocument {
    PolicyDocument::new(vec![
        Statement::allow(["secretsmanager:GetSecretValue"]).resource(secret_arn),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const PROVIDER_ARN: &str =
        "arn:aws:iam::123456789012:oidc-provider/token.actions.githubusercontent.com";

    #[test]
    fn test_ecs_trust_policy_shape() {
        let rendered = serde_json::to_value(ecs_task_trust_policy()).unwrap();
        assert_eq!(
            rendered,
            json!({
                "Version": "2012-10-17",
                "Statement": [{
                    "Effect": "Allow",
                    "Principal": {"Service": "ecs-tasks.amazonaws.com"},
                    "Action": ["sts:AssumeRole"],
                }]
            })
        );
    }

    #[test]
    fn test_github_trust_scoped_to_repo_and_main() {
        let policy = github_trust_policy(PROVIDER_ARN, "dymocaptin/skreg");
        let rendered = policy.to_json().unwrap();

        assert!(rendered.contains("repo:dymocaptin/skreg:ref:refs/heads/main"));
        assert!(rendered.contains("\"token.actions.githubusercontent.com:aud\":\"sts.amazonaws.com\""));
        assert!(!rendered.contains('*'));
        assert!(!rendered.contains("StringLike"));
    }

    #[test]
    fn test_github_trust_not_reusable_by_other_repo() {
        let rendered = github_trust_policy(PROVIDER_ARN, "dymocaptin/skreg")
            .to_json()
            .unwrap();
        assert!(!rendered.contains("repo:someone/else"));
        assert!(!rendered.contains("refs/heads/dev"));
    }

    #[test]
    fn test_push_policy_limited_to_skreg_repositories() {
        let policy = ecr_push_policy();
        assert_eq!(policy.statement.len(), 2);
        assert_eq!(policy.statement[0].resource, vec!["*"]);
        assert_eq!(policy.statement[0].action, vec!["ecr:GetAuthorizationToken"]);
        assert_eq!(
            policy.statement[1].resource,
            vec!["arn:aws:ecr:us-west-2:*:repository/skreg-*"]
        );
        assert!(policy.statement[1].action.iter().all(|a| a.starts_with("ecr:")));
    }

    #[test]
    fn test_policy_parses_back() {
        let policy = secret_read_policy("arn:aws:secretsmanager:us-west-2:1:secret:db");
        let parsed: PolicyDocument = serde_json::from_str(&policy.to_json().unwrap()).unwrap();
        assert_eq!(parsed, policy);
    }
}
