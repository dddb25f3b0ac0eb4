//! CI identity federation contract.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use crate::Error;
use crate::output::Output;

static OWNER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9-]*$").unwrap());

static NAME_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Za-z0-9._-]+$").unwrap());

/// A GitHub repository, `owner/name`.
///
/// Wildcards never parse, so trust built from a repository can not extend
/// past it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GithubRepo {
    owner: String,
    name: String,
}

impl GithubRepo {
    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// The skreg repository itself.
impl Default for GithubRepo {
    fn default() -> Self {
        Self {
            owner: "dymocaptin".to_string(),
            name: "skreg".to_string(),
        }
    }
}

impl fmt::Display for GithubRepo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

impl FromStr for GithubRepo {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let invalid = || Error::InvalidInput(format!("'{s}' is not an owner/name repository"));
        let (owner, name) = s.split_once('/').ok_or_else(invalid)?;
        if !OWNER_REGEX.is_match(owner)
            || !NAME_REGEX.is_match(name)
            || name == "."
            || name == ".."
        {
            return Err(invalid());
        }
        Ok(Self {
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }
}

impl TryFrom<String> for GithubRepo {
    type Error = Error;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<GithubRepo> for String {
    fn from(repo: GithubRepo) -> Self {
        repo.to_string()
    }
}

#[derive(Debug, Clone)]
pub struct OidcOutputs {
    /// Role limited to pushing container images.
    pub push_role_arn: Output<String>,
    /// Role used by deployment jobs.
    pub deploy_role_arn: Output<String>,
}

/// Trust between a CI identity provider and the deployment roles.
pub trait Oidc {
    fn outputs(&self) -> &OidcOutputs;
}
