//! VPC with public and private subnets across two zones.

use serde_json::json;
use skreg_infra_core::network::{Network, NetworkOutputs};
use skreg_infra_core::{ComponentResource, Context, Resource, Result};
use tracing::debug;

use crate::types;

pub const VPC_CIDR: &str = "10.0.0.0/16";
pub const AVAILABILITY_ZONES: [&str; 2] = ["us-west-2a", "us-west-2b"];
pub const PUBLIC_SUBNET_CIDRS: [&str; 2] = ["10.0.1.0/24", "10.0.2.0/24"];
pub const PRIVATE_SUBNET_CIDRS: [&str; 2] = ["10.0.10.0/24", "10.0.20.0/24"];

const ZONE_SUFFIXES: [&str; 2] = ["a", "b"];

/// VPC, two public and two private subnets, an internet gateway and a
/// single NAT gateway in the first zone.
///
/// Private egress therefore shares the first zone's failure domain.
pub struct AwsNetwork {
    component: ComponentResource,
    outputs: NetworkOutputs,
}

impl AwsNetwork {
    pub const TYPE: &'static str = "skreg:aws:Network";

    pub fn new(ctx: &Context, name: &str) -> Result<Self> {
        debug!(component = name, "declaring network");
        let component = ctx.component(Self::TYPE, name, None)?;

        let vpc = ctx
            .resource(types::VPC, format!("{name}-vpc"))
            .parent(&component)
            .input("cidrBlock", VPC_CIDR)
            .input("enableDnsSupport", true)
            .input("enableDnsHostnames", true)
            .register()?;

        let subnet = |kind: &str, zone: usize, cidr: &str, public: bool| -> Result<Resource> {
            let mut builder = ctx
                .resource(types::SUBNET, format!("{name}-{kind}-{}", ZONE_SUFFIXES[zone]))
                .parent(&component)
                .input("vpcId", vpc.id())
                .input("cidrBlock", cidr)
                .input("availabilityZone", AVAILABILITY_ZONES[zone]);
            if public {
                builder = builder.input("mapPublicIpOnLaunch", true);
            }
            builder.register()
        };

        let public = [
            subnet("pub", 0, PUBLIC_SUBNET_CIDRS[0], true)?,
            subnet("pub", 1, PUBLIC_SUBNET_CIDRS[1], true)?,
        ];
        let private = [
            subnet("priv", 0, PRIVATE_SUBNET_CIDRS[0], false)?,
            subnet("priv", 1, PRIVATE_SUBNET_CIDRS[1], false)?,
        ];

        let igw = ctx
            .resource(types::INTERNET_GATEWAY, format!("{name}-igw"))
            .parent(&component)
            .input("vpcId", vpc.id())
            .register()?;

        let eip = ctx
            .resource(types::EIP, format!("{name}-nat-eip"))
            .parent(&component)
            .input("domain", "vpc")
            .register()?;

        let nat = ctx
            .resource(types::NAT_GATEWAY, format!("{name}-nat"))
            .parent(&component)
            .input("subnetId", public[0].id())
            .input("allocationId", eip.id())
            .depends_on(&igw)
            .register()?;

        let public_rt = ctx
            .resource(types::ROUTE_TABLE, format!("{name}-pub-rt"))
            .parent(&component)
            .input("vpcId", vpc.id())
            .input(
                "routes",
                igw.id()
                    .apply(|id| json!([{"cidrBlock": "0.0.0.0/0", "gatewayId": id}])),
            )
            .register()?;

        let private_rt = ctx
            .resource(types::ROUTE_TABLE, format!("{name}-priv-rt"))
            .parent(&component)
            .input("vpcId", vpc.id())
            .input(
                "routes",
                nat.id()
                    .apply(|id| json!([{"cidrBlock": "0.0.0.0/0", "natGatewayId": id}])),
            )
            .register()?;

        for (kind, subnets, table) in [("pub", &public, &public_rt), ("priv", &private, &private_rt)] {
            for (zone, subnet) in subnets.iter().enumerate() {
                ctx.resource(
                    types::ROUTE_TABLE_ASSOCIATION,
                    format!("{name}-{kind}-rta-{}", ZONE_SUFFIXES[zone]),
                )
                .parent(&component)
                .input("subnetId", subnet.id())
                .input("routeTableId", table.id())
                .register()?;
            }
        }

        let outputs = NetworkOutputs {
            vpc_id: vpc.id(),
            public_subnet_ids: [public[0].id(), public[1].id()],
            private_subnet_ids: [private[0].id(), private[1].id()],
        };

        Ok(Self { component, outputs })
    }

    pub fn component(&self) -> &ComponentResource {
        &self.component
    }
}

impl Network for AwsNetwork {
    fn outputs(&self) -> &NetworkOutputs {
        &self.outputs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulate;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_two_public_and_two_private_subnets() {
        let ctx = Context::new("test", Arc::new(simulate::engine()));
        let network = AwsNetwork::new(&ctx, "skreg-network").unwrap();
        ctx.apply().await.unwrap();

        let outputs = network.outputs();
        let public = outputs.public_subnets().resolve().await.unwrap();
        let private = outputs.private_subnets().resolve().await.unwrap();

        assert_eq!(public.len(), 2);
        assert_eq!(private.len(), 2);
        assert!(public.iter().chain(&private).all(|id| id.starts_with("subnet-")));
        assert_ne!(public[0], public[1]);
        assert!(outputs.vpc_id.resolve().await.unwrap().starts_with("vpc-"));
    }

    #[tokio::test]
    async fn test_subnets_spread_over_zones() {
        let engine = Arc::new(simulate::engine());
        let ctx = Context::new("test", engine.clone());
        AwsNetwork::new(&ctx, "net").unwrap();
        ctx.apply().await.unwrap();

        for (subnet, zone, cidr) in [
            ("net-pub-a", "us-west-2a", "10.0.1.0/24"),
            ("net-pub-b", "us-west-2b", "10.0.2.0/24"),
            ("net-priv-a", "us-west-2a", "10.0.10.0/24"),
            ("net-priv-b", "us-west-2b", "10.0.20.0/24"),
        ] {
            let inputs = engine.stored_inputs(subnet).unwrap().unwrap();
            assert_eq!(inputs["availabilityZone"], json!(zone));
            assert_eq!(inputs["cidrBlock"], json!(cidr));
        }
        let private = engine.stored_inputs("net-priv-a").unwrap().unwrap();
        assert!(!private.contains_key("mapPublicIpOnLaunch"));
    }

    #[test]
    fn test_nat_gateway_follows_internet_gateway() {
        let ctx = Context::new("test", Arc::new(simulate::engine()));
        AwsNetwork::new(&ctx, "net").unwrap();

        let graph = ctx.graph();
        let nat = graph.find("net-nat").unwrap();
        let igw = graph.find("net-igw").unwrap();
        assert!(nat.depends_on.contains(&igw.urn));

        let pub_a = graph.find("net-pub-a").unwrap();
        assert!(nat.dependencies.contains(&pub_a.urn));
    }

    #[tokio::test]
    async fn test_private_routes_go_through_nat() {
        let engine = Arc::new(simulate::engine());
        let ctx = Context::new("test", engine.clone());
        AwsNetwork::new(&ctx, "net").unwrap();
        ctx.apply().await.unwrap();

        let nat_id = engine.stored_outputs("net-nat").unwrap().unwrap()["id"].clone();
        let routes = engine.stored_inputs("net-priv-rt").unwrap().unwrap()["routes"].clone();
        assert_eq!(routes[0]["natGatewayId"], nat_id);
        assert_eq!(routes[0]["cidrBlock"], json!("0.0.0.0/0"));
    }

    #[tokio::test]
    async fn test_subnet_failure_aborts() {
        let engine = Arc::new(simulate::engine());
        engine.fail_on("net-priv-b").unwrap();
        let ctx = Context::new("test", engine);
        AwsNetwork::new(&ctx, "net").unwrap();

        let err = ctx.apply().await.unwrap_err();
        assert!(err.to_string().contains("net-priv-b"));
    }
}
