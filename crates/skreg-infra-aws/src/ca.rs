//! Software root certificate authority.
//!
//! The root key pair is generated by this program, not by the cloud
//! provider, and then handed to the secret store. Generation happens on
//! every declaration; the secret versions pin the first value.

use rand::RngCore;
use rand::rngs::OsRng;
use rcgen::{
    BasicConstraints, CertificateParams, DistinguishedName, DnType, IsCa, KeyPair,
    KeyUsagePurpose, PKCS_RSA_SHA256, SerialNumber,
};
use rsa::RsaPrivateKey;
use rsa::pkcs8::{EncodePrivateKey, LineEnding};
use skreg_infra_core::{Error, Result};
use std::fmt;
use time::{Duration, OffsetDateTime};
use tracing::debug;

pub const ROOT_CA_KEY_BITS: usize = 4096;
pub const ROOT_CA_VALIDITY_DAYS: i64 = 3650;
pub const ROOT_CA_COMMON_NAME: &str = "skreg Root CA";
pub const ROOT_CA_ORGANIZATION: &str = "skreg";

/// PEM-encoded root CA key and self-signed certificate.
#[derive(Clone)]
pub struct RootCa {
    key_pem: String,
    cert_pem: String,
}

impl RootCa {
    /// Generate an RSA-4096 root CA valid for ten years.
    pub fn generate() -> Result<Self> {
        Self::generate_with_key_size(ROOT_CA_KEY_BITS)
    }

    pub fn generate_with_key_size(bits: usize) -> Result<Self> {
        let private_key = RsaPrivateKey::new(&mut OsRng, bits)
            .map_err(|e| Error::KeyGeneration(e.to_string()))?;
        let key_pem = private_key
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| Error::KeyGeneration(e.to_string()))?;
        let key_pair = KeyPair::from_pem_and_sign_algo(&key_pem, &PKCS_RSA_SHA256)
            .map_err(|e| Error::KeyGeneration(e.to_string()))?;

        let mut params = CertificateParams::default();
        let mut dn = DistinguishedName::new();
        dn.push(DnType::CommonName, ROOT_CA_COMMON_NAME);
        dn.push(DnType::OrganizationName, ROOT_CA_ORGANIZATION);
        params.distinguished_name = dn;
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        params.key_usages = vec![
            KeyUsagePurpose::KeyCertSign,
            KeyUsagePurpose::CrlSign,
            KeyUsagePurpose::DigitalSignature,
        ];

        let now = OffsetDateTime::now_utc();
        params.not_before = now;
        params.not_after = now + Duration::days(ROOT_CA_VALIDITY_DAYS);

        // positive 128-bit serial
        let mut serial = [0u8; 16];
        OsRng.fill_bytes(&mut serial);
        serial[0] &= 0x7f;
        params.serial_number = Some(SerialNumber::from_slice(&serial));

        let cert = params
            .self_signed(&key_pair)
            .map_err(|e| Error::Certificate(e.to_string()))?;

        debug!(bits, "generated root CA");
        Ok(Self {
            key_pem: key_pem.to_string(),
            cert_pem: cert.pem(),
        })
    }

    pub fn key_pem(&self) -> &str {
        &self.key_pem
    }

    pub fn cert_pem(&self) -> &str {
        &self.cert_pem
    }
}

impl fmt::Debug for RootCa {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RootCa")
            .field("cert_pem", &self.cert_pem)
            .finish_non_exhaustive()
    }
}
