//! PKI component contract.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::output::Output;
use crate::secret::SecretRef;
use crate::Error;

/// Where the root CA private key lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HsmBackend {
    /// Hardware security module. Not implemented yet.
    Hsm,
    /// Key generated in process and kept in the secret store.
    Software,
}

impl fmt::Display for HsmBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HsmBackend::Hsm => write!(f, "hsm"),
            HsmBackend::Software => write!(f, "software"),
        }
    }
}

impl FromStr for HsmBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hsm" => Ok(HsmBackend::Hsm),
            "software" => Ok(HsmBackend::Software),
            other => Err(Error::InvalidInput(format!(
                "unknown HSM backend '{other}', expected hsm or software"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PkiOutputs {
    /// Identifier of the secret (or HSM slot) holding the root key.
    pub key_id: Output<String>,
    pub ca_cert_secret: SecretRef,
    /// `s3://` path of the CRL object.
    pub crl_path: Output<String>,
    pub backend: HsmBackend,
}

/// Root certificate authority for package signing.
pub trait Pki {
    fn outputs(&self) -> &PkiOutputs;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_round_trips_through_str() {
        assert_eq!("HSM".parse::<HsmBackend>().unwrap(), HsmBackend::Hsm);
        assert_eq!(" software ".parse::<HsmBackend>().unwrap(), HsmBackend::Software);
        assert_eq!(HsmBackend::Software.to_string(), "software");
        assert!("tpm".parse::<HsmBackend>().is_err());
    }
}
