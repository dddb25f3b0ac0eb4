//! Stack configuration for skreg infrastructure.
//!
//! Configuration is read once from `SKREG_*` environment variables into an
//! explicit [`StackConfig`] that is passed to the orchestrator. Loading fails
//! fast and reports every offending variable at once.

pub mod error;

pub use error::{ConfigError, ConfigResult};

use regex::Regex;
use serde::{Deserialize, Serialize};
use skreg_infra_core::oidc::GithubRepo;
use skreg_infra_core::pki::HsmBackend;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use tracing::debug;

/// Prefix shared by every configuration variable.
pub const ENV_PREFIX: &str = "SKREG_";

pub const CLOUD_PROVIDER: &str = "SKREG_CLOUD_PROVIDER";
pub const API_IMAGE_URI: &str = "SKREG_API_IMAGE_URI";
pub const WORKER_IMAGE_URI: &str = "SKREG_WORKER_IMAGE_URI";
pub const DOMAIN_NAME: &str = "SKREG_DOMAIN_NAME";
pub const HSM_BACKEND: &str = "SKREG_HSM_BACKEND";
pub const MULTI_AZ: &str = "SKREG_MULTI_AZ";
pub const ENVIRONMENT: &str = "SKREG_ENVIRONMENT";
pub const GITHUB_REPO: &str = "SKREG_GITHUB_REPO";
pub const DB_INSTANCE_CLASS: &str = "SKREG_DB_INSTANCE_CLASS";

pub const DEFAULT_GITHUB_REPO: &str = "dymocaptin/skreg";
pub const DEFAULT_DB_INSTANCE_CLASS: &str = "db.t3.micro";

static DOMAIN_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?i)(?:[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?\.)+[a-z]{2,63}$").unwrap()
});

/// Target cloud provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CloudProvider {
    Aws,
    Gcp,
    Azure,
}

impl fmt::Display for CloudProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloudProvider::Aws => write!(f, "aws"),
            CloudProvider::Gcp => write!(f, "gcp"),
            CloudProvider::Azure => write!(f, "azure"),
        }
    }
}

impl FromStr for CloudProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "aws" => Ok(CloudProvider::Aws),
            "gcp" => Ok(CloudProvider::Gcp),
            "azure" => Ok(CloudProvider::Azure),
            other => Err(format!("unknown provider '{other}', expected aws, gcp or azure")),
        }
    }
}

/// Deployment environment tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Prod,
    Staging,
    Dev,
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Prod => write!(f, "prod"),
            Environment::Staging => write!(f, "staging"),
            Environment::Dev => write!(f, "dev"),
        }
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "prod" => Ok(Environment::Prod),
            "staging" => Ok(Environment::Staging),
            "dev" => Ok(Environment::Dev),
            other => Err(format!(
                "unknown environment '{other}', expected prod, staging or dev"
            )),
        }
    }
}

/// Resolved stack configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackConfig {
    pub cloud_provider: CloudProvider,
    /// API container image; empty means the public fallback image.
    pub api_image_uri: String,
    /// Worker container image; empty means the public fallback image.
    pub worker_image_uri: String,
    /// Custom domain; empty means the load balancer's own DNS name is used.
    pub domain_name: String,
    pub hsm_backend: HsmBackend,
    pub multi_az: bool,
    pub environment: Environment,
    /// Repository whose CI may assume the deploy roles.
    pub github_repo: GithubRepo,
    pub db_instance_class: String,
}

impl StackConfig {
    /// Configuration with every optional field at its default.
    pub fn new(cloud_provider: CloudProvider) -> Self {
        Self {
            cloud_provider,
            api_image_uri: String::new(),
            worker_image_uri: String::new(),
            domain_name: String::new(),
            hsm_backend: HsmBackend::Hsm,
            multi_az: false,
            environment: Environment::Prod,
            github_repo: GithubRepo::default(),
            db_instance_class: DEFAULT_DB_INSTANCE_CLASS.to_string(),
        }
    }

    /// Load from the process environment.
    pub fn load() -> ConfigResult<Self> {
        Self::from_vars(std::env::vars())
    }

    /// Load from an explicit set of variables. Variables without the
    /// `SKREG_` prefix are ignored.
    pub fn from_vars<I, K, V>(vars: I) -> ConfigResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars: HashMap<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .filter(|(k, _)| k.starts_with(ENV_PREFIX))
            .map(|(k, v)| (k, v.trim().to_string()))
            .collect();
        let get = |key: &str| vars.get(key).map(String::as_str).filter(|v| !v.is_empty());

        let mut errors = Vec::new();

        let cloud_provider = match get(CLOUD_PROVIDER) {
            Some(value) => parse(CLOUD_PROVIDER, value, &mut errors),
            None => {
                errors.push(ConfigError::MissingField(CLOUD_PROVIDER.to_string()));
                None
            }
        };

        let hsm_backend = match get(HSM_BACKEND) {
            Some(value) => value.parse::<HsmBackend>().map_or_else(
                |_| {
                    errors.push(invalid(
                        HSM_BACKEND,
                        format!("unknown backend '{value}', expected hsm or software"),
                    ));
                    None
                },
                Some,
            ),
            None => Some(HsmBackend::Hsm),
        };

        let multi_az = match get(MULTI_AZ) {
            Some(value) => parse_bool(value).or_else(|| {
                errors.push(invalid(MULTI_AZ, format!("'{value}' is not a boolean")));
                None
            }),
            None => Some(false),
        };

        let environment = match get(ENVIRONMENT) {
            Some(value) => parse(ENVIRONMENT, value, &mut errors),
            None => Some(Environment::Prod),
        };

        let domain_name = get(DOMAIN_NAME).unwrap_or_default().to_string();
        if !domain_name.is_empty() && !DOMAIN_REGEX.is_match(&domain_name) {
            errors.push(invalid(
                DOMAIN_NAME,
                format!("'{domain_name}' is not a valid hostname"),
            ));
        }

        let github_repo = match get(GITHUB_REPO) {
            Some(value) => value.parse::<GithubRepo>().map_or_else(
                |_| {
                    errors.push(invalid(
                        GITHUB_REPO,
                        format!("'{value}' must be owner/name without wildcards"),
                    ));
                    None
                },
                Some,
            ),
            None => Some(GithubRepo::default()),
        };

        let db_instance_class = get(DB_INSTANCE_CLASS)
            .unwrap_or(DEFAULT_DB_INSTANCE_CLASS)
            .to_string();
        if !db_instance_class.starts_with("db.") {
            errors.push(invalid(
                DB_INSTANCE_CLASS,
                format!("'{db_instance_class}' is not an RDS instance class"),
            ));
        }

        match (cloud_provider, hsm_backend, multi_az, environment, github_repo) {
            (
                Some(cloud_provider),
                Some(hsm_backend),
                Some(multi_az),
                Some(environment),
                Some(github_repo),
            ) if errors.is_empty() =>
            {
                let config = Self {
                    cloud_provider,
                    api_image_uri: get(API_IMAGE_URI).unwrap_or_default().to_string(),
                    worker_image_uri: get(WORKER_IMAGE_URI).unwrap_or_default().to_string(),
                    domain_name,
                    hsm_backend,
                    multi_az,
                    environment,
                    github_repo,
                    db_instance_class,
                };
                debug!(
                    provider = %config.cloud_provider,
                    environment = %config.environment,
                    hsm_backend = %config.hsm_backend,
                    multi_az = config.multi_az,
                    domain = config.domain().unwrap_or("-"),
                    repo = %config.github_repo,
                    "stack config loaded"
                );
                Ok(config)
            }
            _ => Err(ConfigError::Validation(errors)),
        }
    }

    /// The custom domain, if one is configured.
    pub fn domain(&self) -> Option<&str> {
        Some(self.domain_name.as_str()).filter(|d| !d.is_empty())
    }

    /// The API image, if one is configured.
    pub fn api_image(&self) -> Option<&str> {
        Some(self.api_image_uri.as_str()).filter(|i| !i.is_empty())
    }

    /// The worker image, if one is configured.
    pub fn worker_image(&self) -> Option<&str> {
        Some(self.worker_image_uri.as_str()).filter(|i| !i.is_empty())
    }
}

fn invalid(field: &str, message: String) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        message,
    }
}

fn parse<T>(field: &str, value: &str, errors: &mut Vec<ConfigError>) -> Option<T>
where
    T: FromStr<Err = String>,
{
    value
        .parse()
        .map_err(|message| errors.push(invalid(field, message)))
        .ok()
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    fn load(vars: &[(&str, &str)]) -> ConfigResult<StackConfig> {
        StackConfig::from_vars(vars.iter().map(|(k, v)| (k.to_string(), v.to_string())))
    }

    #[test]
    fn test_defaults_with_only_provider() {
        let config = load(&[(CLOUD_PROVIDER, "aws")]).unwrap();

        assert_eq!(config, StackConfig::new(CloudProvider::Aws));
        assert_eq!(config.hsm_backend, HsmBackend::Hsm);
        assert!(!config.multi_az);
        assert_eq!(config.environment, Environment::Prod);
        assert_eq!(config.api_image_uri, "");
        assert_eq!(config.worker_image_uri, "");
        assert_eq!(config.domain_name, "");
        assert_eq!(config.domain(), None);
    }

    #[test_case(API_IMAGE_URI, "123.dkr.ecr.us-west-2.amazonaws.com/skreg-api:v1", |c| c.api_image_uri = "123.dkr.ecr.us-west-2.amazonaws.com/skreg-api:v1".into(); "api image")]
    #[test_case(WORKER_IMAGE_URI, "ghcr.io/skreg/worker:v1", |c| c.worker_image_uri = "ghcr.io/skreg/worker:v1".into(); "worker image")]
    #[test_case(DOMAIN_NAME, "skreg.dev", |c| c.domain_name = "skreg.dev".into(); "domain")]
    #[test_case(HSM_BACKEND, "software", |c| c.hsm_backend = HsmBackend::Software; "hsm backend")]
    #[test_case(MULTI_AZ, "true", |c| c.multi_az = true; "multi az")]
    #[test_case(ENVIRONMENT, "staging", |c| c.environment = Environment::Staging; "environment")]
    #[test_case(CLOUD_PROVIDER, "gcp", |c| c.cloud_provider = CloudProvider::Gcp; "cloud provider")]
    #[test_case(GITHUB_REPO, "acme/registry", |c| c.github_repo = "acme/registry".parse().unwrap(); "github repo")]
    #[test_case(GITHUB_REPO, "acme/.github", |c| c.github_repo = "acme/.github".parse().unwrap(); "dotted github repo")]
    #[test_case(GITHUB_REPO, "acme/_private", |c| c.github_repo = "acme/_private".parse().unwrap(); "underscored github repo")]
    #[test_case(DB_INSTANCE_CLASS, "db.r6g.large", |c| c.db_instance_class = "db.r6g.large".into(); "instance class")]
    fn test_override_changes_only_that_field(
        key: &str,
        value: &str,
        expect: fn(&mut StackConfig),
    ) {
        let config = load(&[(CLOUD_PROVIDER, "aws"), (key, value)]).unwrap();

        let mut expected = StackConfig::new(CloudProvider::Aws);
        expect(&mut expected);
        assert_eq!(config, expected);
    }

    #[test_case("acme/..")]
    #[test_case("acme/.")]
    #[test_case("acme/*")]
    #[test_case("acme")]
    #[test_case("acme/skreg/extra")]
    fn test_malformed_repo_rejected_at_load(repo: &str) {
        let err = load(&[(CLOUD_PROVIDER, "aws"), (GITHUB_REPO, repo)]).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
        assert_eq!(err.fields(), vec![GITHUB_REPO]);
    }

    #[test]
    fn test_default_repo_constant_matches_default() {
        let repo: GithubRepo = DEFAULT_GITHUB_REPO.parse().unwrap();
        assert_eq!(repo, GithubRepo::default());
    }

    #[test_case("aws", CloudProvider::Aws)]
    #[test_case("GCP", CloudProvider::Gcp)]
    #[test_case(" azure ", CloudProvider::Azure)]
    fn test_provider_parsing(value: &str, expected: CloudProvider) {
        let config = load(&[(CLOUD_PROVIDER, value)]).unwrap();
        assert_eq!(config.cloud_provider, expected);
    }

    #[test_case("1", true)]
    #[test_case("Yes", true)]
    #[test_case("off", false)]
    #[test_case("FALSE", false)]
    fn test_bool_spellings(value: &str, expected: bool) {
        let config = load(&[(CLOUD_PROVIDER, "aws"), (MULTI_AZ, value)]).unwrap();
        assert_eq!(config.multi_az, expected);
    }

    #[test]
    fn test_missing_provider_fails() {
        let err = load(&[]).unwrap_err();
        assert_eq!(err.fields(), vec![CLOUD_PROVIDER]);
    }

    #[test]
    fn test_every_invalid_field_is_reported() {
        let err = load(&[
            (CLOUD_PROVIDER, "digitalocean"),
            (HSM_BACKEND, "tpm"),
            (MULTI_AZ, "maybe"),
            (ENVIRONMENT, "qa"),
            (DOMAIN_NAME, "not a domain"),
            (GITHUB_REPO, "dymocaptin/*"),
            (DB_INSTANCE_CLASS, "t3.micro"),
        ])
        .unwrap_err();

        assert_eq!(
            err.fields(),
            vec![
                CLOUD_PROVIDER,
                HSM_BACKEND,
                MULTI_AZ,
                ENVIRONMENT,
                DOMAIN_NAME,
                GITHUB_REPO,
                DB_INSTANCE_CLASS,
            ]
        );
        assert!(err.to_string().starts_with("invalid configuration: "));
    }

    #[test]
    fn test_empty_values_fall_back_to_defaults() {
        let config = load(&[
            (CLOUD_PROVIDER, "aws"),
            (DOMAIN_NAME, "  "),
            (ENVIRONMENT, ""),
        ])
        .unwrap();
        assert_eq!(config.domain(), None);
        assert_eq!(config.environment, Environment::Prod);
    }

    #[test]
    fn test_unprefixed_variables_ignored() {
        let config = load(&[(CLOUD_PROVIDER, "aws"), ("DOMAIN_NAME", "skreg.dev")]).unwrap();
        assert_eq!(config.domain(), None);
    }
}
