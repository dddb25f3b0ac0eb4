//! Database component contract.

use crate::output::Output;
use crate::secret::SecretRef;

/// Port the database always listens on.
pub const DATABASE_PORT: u16 = 5432;

/// Name of the database, also used as the master user.
pub const DATABASE_NAME: &str = "skreg";

#[derive(Debug, Clone)]
pub struct DatabaseOutputs {
    /// Secret holding the connection string.
    pub credentials: SecretRef,
    pub host: Output<String>,
    pub port: u16,
    pub database_name: String,
}

/// Managed relational database.
pub trait Database {
    fn outputs(&self) -> &DatabaseOutputs;
}
