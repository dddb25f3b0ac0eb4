//! Software-backed root CA kept in Secrets Manager.

use skreg_infra_core::pki::{HsmBackend, Pki, PkiOutputs};
use skreg_infra_core::{ComponentResource, Context, Output, Result, SecretRef};
use tracing::{debug, info};

use crate::ca::RootCa;
use crate::types;

pub const ROOT_CA_KEY_SECRET: &str = "skreg/pki/root-ca-key";
pub const ROOT_CA_CERT_SECRET: &str = "skreg/pki/root-ca-cert";
pub const CRL_KEY: &str = ".well-known/crl.pem";

/// Property of a secret version that must never be rewritten once created.
const SECRET_STRING: &str = "secretString";

pub struct AwsPkiArgs {
    /// Bucket the CRL placeholder is written to.
    pub bucket_name: Output<String>,
    /// Pre-generated key material. A fresh RSA-4096 CA is generated when
    /// absent.
    pub root_ca: Option<RootCa>,
}

impl AwsPkiArgs {
    pub fn new(bucket_name: Output<String>) -> Self {
        Self {
            bucket_name,
            root_ca: None,
        }
    }

    pub fn with_root_ca(mut self, root_ca: RootCa) -> Self {
        self.root_ca = Some(root_ca);
        self
    }
}

/// Root CA generated in process and persisted to the secret store.
///
/// Every declaration computes a fresh key pair. Both secret versions and
/// the CRL object ignore changes after their first creation, so repeated
/// applies keep the original CA.
pub struct AwsPki {
    component: ComponentResource,
    outputs: PkiOutputs,
    root_ca_cert_pem: Output<String>,
}

impl AwsPki {
    pub const TYPE: &'static str = "skreg:aws:Pki";

    pub fn new(ctx: &Context, name: &str, args: AwsPkiArgs) -> Result<Self> {
        debug!(component = name, "declaring pki");
        let root_ca = match args.root_ca {
            Some(root_ca) => root_ca,
            None => {
                info!(component = name, "generating root CA key pair");
                RootCa::generate()?
            }
        };

        let component = ctx.component(Self::TYPE, name, None)?;

        let key_secret = ctx
            .resource(types::SECRET, format!("{name}-ca-key"))
            .parent(&component)
            .input("name", ROOT_CA_KEY_SECRET)
            .register()?;

        ctx.resource(types::SECRET_VERSION, format!("{name}-ca-key-version"))
            .parent(&component)
            .input("secretId", key_secret.id())
            .input("secretString", Output::secret(root_ca.key_pem().to_string()))
            .ignore_changes([SECRET_STRING])
            .register()?;

        let cert_secret = ctx
            .resource(types::SECRET, format!("{name}-ca-cert"))
            .parent(&component)
            .input("name", ROOT_CA_CERT_SECRET)
            .register()?;

        let cert_version = ctx
            .resource(types::SECRET_VERSION, format!("{name}-ca-cert-version"))
            .parent(&component)
            .input("secretId", cert_secret.id())
            .input("secretString", root_ca.cert_pem())
            .ignore_changes([SECRET_STRING])
            .register()?;

        let crl = ctx
            .resource(types::BUCKET_OBJECT, format!("{name}-crl"))
            .parent(&component)
            .input("bucket", &args.bucket_name)
            .input("key", CRL_KEY)
            .input("content", "")
            .input("contentType", "application/x-pem-file")
            .ignore_changes(["content"])
            .register()?;

        let crl_path = args
            .bucket_name
            .zip(&crl.output::<String>("key"))
            .apply(|(bucket, key)| format!("s3://{bucket}/{key}"));

        let outputs = PkiOutputs {
            key_id: key_secret.id(),
            ca_cert_secret: SecretRef::from_resource(&cert_secret),
            crl_path,
            backend: HsmBackend::Software,
        };

        Ok(Self {
            component,
            outputs,
            root_ca_cert_pem: cert_version.output(SECRET_STRING),
        })
    }

    pub fn component(&self) -> &ComponentResource {
        &self.component
    }

    /// The root certificate as stored, i.e. the first one ever generated.
    pub fn root_ca_cert_pem(&self) -> &Output<String> {
        &self.root_ca_cert_pem
    }
}

impl Pki for AwsPki {
    fn outputs(&self) -> &PkiOutputs {
        &self.outputs
    }
}
