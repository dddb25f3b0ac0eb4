//! ECS Fargate services behind an application load balancer.

use serde::Deserialize;
use serde_json::{Value, json};
use skreg_infra_core::compute::{CnameRecord, Compute, ComputeOutputs};
use skreg_infra_core::{ComponentResource, Context, Output, Resource, Result, SecretRef};
use tracing::debug;

use crate::policy::{ecs_task_trust_policy, secret_read_policy};
use crate::{REGION, types};

/// Image used until real application images are published.
pub const FALLBACK_IMAGE: &str = "public.ecr.aws/amazonlinux/amazonlinux:2023";

pub const API_PORT: u16 = 8080;
pub const BIND_ADDR: &str = "0.0.0.0:8080";
pub const HEALTH_CHECK_PATH: &str = "/healthz";
pub const LOG_RETENTION_DAYS: u32 = 30;

pub const EXECUTION_ROLE_POLICY_ARN: &str =
    "arn:aws:iam::aws:policy/service-role/AmazonECSTaskExecutionRolePolicy";

/// One of the two container workloads.
struct Workload {
    container: &'static str,
    cpu: &'static str,
    memory: &'static str,
    port: Option<u16>,
}

const API: Workload = Workload {
    container: "skreg-api",
    cpu: "512",
    memory: "1024",
    port: Some(API_PORT),
};

const WORKER: Workload = Workload {
    container: "skreg-worker",
    cpu: "256",
    memory: "512",
    port: None,
};

impl Workload {
    fn log_group(&self) -> String {
        format!("/ecs/{}", self.container)
    }

    fn container_definitions(&self, image: &str, database_secret_arn: &str) -> Value {
        let mut container = json!({
            "name": self.container,
            "image": image,
            "secrets": [{"name": "DATABASE_URL", "valueFrom": database_secret_arn}],
            "logConfiguration": {
                "logDriver": "awslogs",
                "options": {
                    "awslogs-group": self.log_group(),
                    "awslogs-region": REGION,
                    "awslogs-stream-prefix": "ecs",
                }
            }
        });
        if let Some(port) = self.port {
            container["portMappings"] = json!([{"containerPort": port, "protocol": "tcp"}]);
            container["environment"] = json!([{"name": "BIND_ADDR", "value": BIND_ADDR}]);
        }
        json!([container])
    }
}

pub struct AwsComputeArgs {
    pub vpc_id: Output<String>,
    pub public_subnet_ids: Output<Vec<String>>,
    pub private_subnet_ids: Output<Vec<String>>,
    /// Secret injected into both containers as `DATABASE_URL`.
    pub database_secret: SecretRef,
    pub api_image_uri: Option<String>,
    pub worker_image_uri: Option<String>,
    /// Custom domain served over HTTPS.
    pub domain_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DomainValidationOption {
    resource_record_name: String,
    resource_record_value: String,
    resource_record_type: String,
}

/// Registries, cluster, load balancer and the API and worker services.
pub struct AwsCompute {
    component: ComponentResource,
    outputs: ComputeOutputs,
    ecr_api_repo: Output<String>,
    ecr_worker_repo: Output<String>,
}

impl AwsCompute {
    pub const TYPE: &'static str = "skreg:aws:Compute";

    pub fn new(ctx: &Context, name: &str, args: AwsComputeArgs) -> Result<Self> {
        debug!(
            component = name,
            domain = args.domain_name.as_deref().unwrap_or("-"),
            "declaring compute"
        );
        let component = ctx.component(Self::TYPE, name, None)?;
        let api_image = args.api_image_uri.as_deref().unwrap_or(FALLBACK_IMAGE).to_string();
        let worker_image = args
            .worker_image_uri
            .as_deref()
            .unwrap_or(FALLBACK_IMAGE)
            .to_string();

        let repository = |suffix: &str, repo_name: &str| -> Result<Resource> {
            ctx.resource(types::ECR_REPOSITORY, format!("{name}-ecr-{suffix}"))
                .parent(&component)
                .input("name", repo_name)
                .input("imageTagMutability", "MUTABLE")
                .register()
        };
        let api_repo = repository("api", API.container)?;
        let worker_repo = repository("worker", WORKER.container)?;

        let cluster = ctx
            .resource(types::ECS_CLUSTER, format!("{name}-cluster"))
            .parent(&component)
            .register()?;

        let exec_role = ctx
            .resource(types::IAM_ROLE, format!("{name}-exec-role"))
            .parent(&component)
            .input("assumeRolePolicy", ecs_task_trust_policy().to_json()?)
            .register()?;

        ctx.resource(types::IAM_ROLE_POLICY_ATTACHMENT, format!("{name}-exec-policy"))
            .parent(&component)
            .input("role", exec_role.output::<String>("name"))
            .input("policyArn", EXECUTION_ROLE_POLICY_ARN)
            .register()?;

        ctx.resource(types::IAM_ROLE_POLICY, format!("{name}-exec-secrets"))
            .parent(&component)
            .input("role", exec_role.output::<String>("name"))
            .input(
                "policy",
                args.database_secret
                    .arn
                    .try_apply(|arn| secret_read_policy(&arn).to_json()),
            )
            .register()?;

        for (suffix, workload) in [("api", &API), ("worker", &WORKER)] {
            ctx.resource(types::LOG_GROUP, format!("{name}-{suffix}-logs"))
                .parent(&component)
                .input("name", workload.log_group())
                .input("retentionInDays", LOG_RETENTION_DAYS)
                .register()?;
        }

        let alb_sg = ctx
            .resource(types::SECURITY_GROUP, format!("{name}-alb-sg"))
            .parent(&component)
            .input("vpcId", &args.vpc_id)
            .input(
                "ingress",
                json!([
                    {"protocol": "tcp", "fromPort": 80, "toPort": 80, "cidrBlocks": ["0.0.0.0/0"]},
                    {"protocol": "tcp", "fromPort": 443, "toPort": 443, "cidrBlocks": ["0.0.0.0/0"]},
                ]),
            )
            .input("egress", allow_all_egress())
            .register()?;

        let api_sg = ctx
            .resource(types::SECURITY_GROUP, format!("{name}-api-sg"))
            .parent(&component)
            .input("vpcId", &args.vpc_id)
            .input(
                "ingress",
                alb_sg.id().apply(|alb_sg_id| {
                    json!([{
                        "protocol": "tcp",
                        "fromPort": API_PORT,
                        "toPort": API_PORT,
                        "securityGroups": [alb_sg_id],
                    }])
                }),
            )
            .input("egress", allow_all_egress())
            .register()?;

        let worker_sg = ctx
            .resource(types::SECURITY_GROUP, format!("{name}-worker-sg"))
            .parent(&component)
            .input("vpcId", &args.vpc_id)
            .input("egress", allow_all_egress())
            .register()?;

        let alb = ctx
            .resource(types::LOAD_BALANCER, format!("{name}-alb"))
            .parent(&component)
            .input("loadBalancerType", "application")
            .input("internal", false)
            .input("securityGroups", vec![alb_sg.id()])
            .input("subnets", &args.public_subnet_ids)
            .register()?;

        let target_group = ctx
            .resource(types::TARGET_GROUP, format!("{name}-tg"))
            .parent(&component)
            .input("port", API_PORT)
            .input("protocol", "HTTP")
            .input("targetType", "ip")
            .input("vpcId", &args.vpc_id)
            .input("healthCheck", json!({"path": HEALTH_CHECK_PATH}))
            .register()?;
        let target_group_arn = target_group.output::<String>("arn");

        let listener = ctx
            .resource(types::LISTENER, format!("{name}-listener"))
            .parent(&component)
            .input("loadBalancerArn", alb.output::<String>("arn"))
            .input("port", 80u16)
            .input("protocol", "HTTP")
            .input(
                "defaultActions",
                target_group_arn.apply(|arn| json!([{"type": "forward", "targetGroupArn": arn}])),
            )
            .register()?;

        let task_definition = |suffix: &str,
                               workload: &'static Workload,
                               image: String|
         -> Result<Resource> {
            let definitions = args
                .database_secret
                .arn
                .try_apply(move |arn| workload_definitions(workload, &image, &arn));
            ctx.resource(types::ECS_TASK_DEFINITION, format!("{name}-{suffix}-task"))
                .parent(&component)
                .input("family", workload.container)
                .input("cpu", workload.cpu)
                .input("memory", workload.memory)
                .input("networkMode", "awsvpc")
                .input("requiresCompatibilities", ["FARGATE"])
                .input("executionRoleArn", exec_role.output::<String>("arn"))
                .input("containerDefinitions", definitions)
                .register()
        };
        let api_task = task_definition("api", &API, api_image)?;
        let worker_task = task_definition("worker", &WORKER, worker_image)?;

        let network_configuration = |security_group: &Resource| {
            args.private_subnet_ids
                .zip(&security_group.id())
                .apply(|(subnets, sg)| json!({"subnets": subnets, "securityGroups": [sg]}))
        };

        ctx.resource(types::ECS_SERVICE, format!("{name}-api-svc"))
            .parent(&component)
            .input("cluster", cluster.output::<String>("arn"))
            .input("taskDefinition", api_task.output::<String>("arn"))
            .input("launchType", "FARGATE")
            .input("desiredCount", 1u32)
            .input("networkConfiguration", network_configuration(&api_sg))
            .input(
                "loadBalancers",
                target_group_arn.apply(|arn| {
                    json!([{
                        "targetGroupArn": arn,
                        "containerName": API.container,
                        "containerPort": API_PORT,
                    }])
                }),
            )
            .depends_on(&listener)
            .register()?;

        let worker_service = ctx
            .resource(types::ECS_SERVICE, format!("{name}-worker-svc"))
            .parent(&component)
            .input("cluster", cluster.output::<String>("arn"))
            .input("taskDefinition", worker_task.output::<String>("arn"))
            .input("launchType", "FARGATE")
            .input("desiredCount", 1u32)
            .input("networkConfiguration", network_configuration(&worker_sg))
            .register()?;

        let alb_dns_name = alb.output::<String>("dnsName");

        let (service_url, cert_validation_cname) = match args.domain_name.as_deref() {
            Some(domain) => {
                let certificate = ctx
                    .resource(types::ACM_CERTIFICATE, format!("{name}-cert"))
                    .parent(&component)
                    .input("domainName", domain)
                    .input("validationMethod", "DNS")
                    .register()?;
                let cname = certificate
                    .optional_output::<Vec<DomainValidationOption>>("domainValidationOptions")
                    .apply(|options| options.and_then(|o| o.into_iter().next()).map(to_cname));
                (Output::known(format!("https://{domain}")), Some(cname))
            }
            None => (alb_dns_name.apply(|dns| format!("http://{dns}")), None),
        };

        let outputs = ComputeOutputs {
            service_url,
            worker_service_name: worker_service.output("name"),
            alb_dns_name: Some(alb_dns_name),
            cert_validation_cname,
        };

        Ok(Self {
            component,
            outputs,
            ecr_api_repo: api_repo.output("repositoryUrl"),
            ecr_worker_repo: worker_repo.output("repositoryUrl"),
        })
    }

    pub fn component(&self) -> &ComponentResource {
        &self.component
    }

    pub fn ecr_api_repo(&self) -> &Output<String> {
        &self.ecr_api_repo
    }

    pub fn ecr_worker_repo(&self) -> &Output<String> {
        &self.ecr_worker_repo
    }
}

impl Compute for AwsCompute {
    fn outputs(&self) -> &ComputeOutputs {
        &self.outputs
    }
}

fn workload_definitions(workload: &Workload, image: &str, secret_arn: &str) -> Result<String> {
    Ok(serde_json::to_string(
        &workload.container_definitions(image, secret_arn),
    )?)
}

fn allow_all_egress() -> Value {
    json!([{"protocol": "-1", "fromPort": 0, "toPort": 0, "cidrBlocks": ["0.0.0.0/0"]}])
}

fn to_cname(option: DomainValidationOption) -> CnameRecord {
    CnameRecord {
        name: option.resource_record_name,
        value: option.resource_record_value,
        record_type: option.resource_record_type,
    }
}
