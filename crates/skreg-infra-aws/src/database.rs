//! PostgreSQL on RDS.

use serde_json::json;
use skreg_infra_core::database::{DATABASE_NAME, DATABASE_PORT, Database, DatabaseOutputs};
use skreg_infra_core::{ComponentResource, Context, Output, Result, SecretRef};
use tracing::debug;

use crate::network::VPC_CIDR;
use crate::types;

pub const ENGINE: &str = "postgres";
pub const ENGINE_VERSION: &str = "16";
pub const ALLOCATED_STORAGE_GB: u32 = 20;
pub const PASSWORD_LENGTH: u32 = 32;

pub struct AwsDatabaseArgs {
    pub vpc_id: Output<String>,
    pub subnet_ids: Output<Vec<String>>,
    pub instance_class: String,
    /// Passed through to RDS as is.
    pub multi_az: bool,
}

/// Encrypted PostgreSQL instance in the private subnets.
///
/// The generated password only ever reaches the instance and the
/// credentials secret; the outputs carry the secret reference.
pub struct AwsDatabase {
    component: ComponentResource,
    outputs: DatabaseOutputs,
}

impl AwsDatabase {
    pub const TYPE: &'static str = "skreg:aws:Database";

    pub fn new(ctx: &Context, name: &str, args: AwsDatabaseArgs) -> Result<Self> {
        debug!(
            component = name,
            instance_class = %args.instance_class,
            multi_az = args.multi_az,
            "declaring database"
        );
        let component = ctx.component(Self::TYPE, name, None)?;

        let security_group = ctx
            .resource(types::SECURITY_GROUP, format!("{name}-sg"))
            .parent(&component)
            .input("vpcId", &args.vpc_id)
            .input(
                "ingress",
                json!([{
                    "protocol": "tcp",
                    "fromPort": DATABASE_PORT,
                    "toPort": DATABASE_PORT,
                    "cidrBlocks": [VPC_CIDR],
                }]),
            )
            .register()?;

        let subnet_group = ctx
            .resource(types::RDS_SUBNET_GROUP, format!("{name}-subnets"))
            .parent(&component)
            .input("subnetIds", &args.subnet_ids)
            .register()?;

        let password = ctx
            .resource(types::RANDOM_PASSWORD, format!("{name}-db-password-gen"))
            .parent(&component)
            .input("length", PASSWORD_LENGTH)
            .input("special", false)
            .additional_secret_outputs(["result"])
            .register()?;
        let password = password.output::<String>("result");

        let credentials = ctx
            .resource(types::SECRET, format!("{name}-db-password"))
            .parent(&component)
            .register()?;

        let instance = ctx
            .resource(types::RDS_INSTANCE, format!("{name}-rds"))
            .parent(&component)
            .input("engine", ENGINE)
            .input("engineVersion", ENGINE_VERSION)
            .input("instanceClass", args.instance_class.as_str())
            .input("allocatedStorage", ALLOCATED_STORAGE_GB)
            .input("storageEncrypted", true)
            .input("dbName", DATABASE_NAME)
            .input("username", DATABASE_NAME)
            .input("password", &password)
            .input("multiAz", args.multi_az)
            .input("dbSubnetGroupName", subnet_group.output::<String>("name"))
            .input("vpcSecurityGroupIds", vec![security_group.id()])
            .input("skipFinalSnapshot", false)
            .input("finalSnapshotIdentifier", format!("{name}-final"))
            .protect()
            .register()?;
        let host = instance.output::<String>("address");

        let connection_string = password.zip(&host).apply(|(password, host)| {
            format!("postgres://{DATABASE_NAME}:{password}@{host}:{DATABASE_PORT}/{DATABASE_NAME}")
        });

        ctx.resource(types::SECRET_VERSION, format!("{name}-db-password-version"))
            .parent(&component)
            .input("secretId", credentials.id())
            .input("secretString", connection_string)
            .register()?;

        let outputs = DatabaseOutputs {
            credentials: SecretRef::from_resource(&credentials),
            host,
            port: DATABASE_PORT,
            database_name: DATABASE_NAME.to_string(),
        };

        Ok(Self { component, outputs })
    }

    pub fn component(&self) -> &ComponentResource {
        &self.component
    }
}

impl Database for AwsDatabase {
    fn outputs(&self) -> &DatabaseOutputs {
        &self.outputs
    }
}
