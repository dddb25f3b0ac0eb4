//! Simulated AWS engine.
//!
//! A [`MemoryEngine`] with a hook that fills in the attributes AWS computes
//! on create (ids, ARNs, DNS names, repository URLs, generated passwords,
//! certificate validation records). Values are derived from the SHA-256 of
//! the URN, so they are stable across runs and distinct per resource.

use serde_json::{Map, Value, json};
use sha2::{Digest, Sha256};
use skreg_infra_core::{MemoryEngine, RegisterResourceRequest};

use crate::REGION;
use crate::types;

/// Account id used in simulated ARNs and registry hosts.
pub const ACCOUNT_ID: &str = "123456789012";

/// An in-memory engine that behaves enough like AWS for previews and tests.
pub fn engine() -> MemoryEngine {
    MemoryEngine::new().with_computed(computed_attributes)
}

fn digest(request: &RegisterResourceRequest) -> String {
    hex::encode(Sha256::digest(request.urn.as_str().as_bytes()))
}

fn id_prefix(type_token: &str) -> &'static str {
    match type_token {
        types::VPC => "vpc",
        types::SUBNET => "subnet",
        types::INTERNET_GATEWAY => "igw",
        types::EIP => "eipalloc",
        types::NAT_GATEWAY => "nat",
        types::ROUTE_TABLE => "rtb",
        types::ROUTE_TABLE_ASSOCIATION => "rtbassoc",
        types::SECURITY_GROUP => "sg",
        _ => "",
    }
}

/// `aws:ec2/vpc:Vpc` -> `ec2`
fn service(type_token: &str) -> &str {
    type_token
        .split(':')
        .nth(1)
        .and_then(|s| s.split('/').next())
        .unwrap_or("unknown")
}

fn computed_attributes(request: &RegisterResourceRequest, outputs: &mut Map<String, Value>) {
    let hash = digest(request);
    let short = &hash[..8];
    let type_token = request.type_token.as_str();

    let name = match outputs.get("name").and_then(Value::as_str) {
        Some(name) => name.to_string(),
        None => format!("{}-{}", request.name, &hash[..7]),
    };
    outputs
        .entry("name")
        .or_insert_with(|| json!(name.clone()));

    let id = match id_prefix(type_token) {
        "" => name.clone(),
        prefix => format!("{prefix}-{}", &hash[..17]),
    };
    outputs.entry("id").or_insert_with(|| json!(id));

    let arn = match service(type_token) {
        "iam" => {
            let kind = if type_token == types::OIDC_PROVIDER {
                "oidc-provider"
            } else {
                "role"
            };
            format!("arn:aws:iam::{ACCOUNT_ID}:{kind}/{name}")
        }
        "index" => format!("arn:random:{name}"),
        service => format!("arn:aws:{service}:{REGION}:{ACCOUNT_ID}:{name}"),
    };
    outputs.entry("arn").or_insert_with(|| json!(arn));

    match type_token {
        types::BUCKET => {
            let bucket = format!("{}-{short}", request.name);
            outputs
                .entry("bucketRegionalDomainName")
                .or_insert_with(|| json!(format!("{bucket}.s3.{REGION}.amazonaws.com")));
            outputs.entry("bucket").or_insert_with(|| json!(bucket));
        }
        types::DISTRIBUTION => {
            outputs
                .entry("domainName")
                .or_insert_with(|| json!(format!("d{}.cloudfront.net", &hash[..13])));
        }
        types::LOAD_BALANCER => {
            outputs.entry("dnsName").or_insert_with(|| {
                json!(format!("{}-{short}.{REGION}.elb.amazonaws.com", request.name))
            });
        }
        types::ECR_REPOSITORY => {
            outputs.entry("repositoryUrl").or_insert_with(|| {
                json!(format!("{ACCOUNT_ID}.dkr.ecr.{REGION}.amazonaws.com/{name}"))
            });
        }
        types::RDS_INSTANCE => {
            let address = format!("{}.{short}.{REGION}.rds.amazonaws.com", request.name);
            outputs
                .entry("endpoint")
                .or_insert_with(|| json!(format!("{address}:5432")));
            outputs.entry("address").or_insert_with(|| json!(address));
        }
        types::RANDOM_PASSWORD => {
            let length = outputs
                .get("length")
                .and_then(Value::as_u64)
                .map_or(hash.len(), |l| l as usize)
                .min(hash.len());
            outputs
                .entry("result")
                .or_insert_with(|| json!(hash[..length].to_string()));
        }
        types::ACM_CERTIFICATE => {
            let domain = outputs
                .get("domainName")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            outputs.entry("domainValidationOptions").or_insert_with(|| {
                json!([{
                    "domainName": domain,
                    "resourceRecordName": format!("_{}.{domain}.", &hash[..32]),
                    "resourceRecordValue": format!("_{}.acm-validations.aws.", &hash[32..]),
                    "resourceRecordType": "CNAME",
                }])
            });
        }
        _ => {}
    }
}
