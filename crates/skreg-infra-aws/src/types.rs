//! Resource type tokens.

pub const VPC: &str = "aws:ec2/vpc:Vpc";
pub const SUBNET: &str = "aws:ec2/subnet:Subnet";
pub const INTERNET_GATEWAY: &str = "aws:ec2/internetGateway:InternetGateway";
pub const EIP: &str = "aws:ec2/eip:Eip";
pub const NAT_GATEWAY: &str = "aws:ec2/natGateway:NatGateway";
pub const ROUTE_TABLE: &str = "aws:ec2/routeTable:RouteTable";
pub const ROUTE_TABLE_ASSOCIATION: &str = "aws:ec2/routeTableAssociation:RouteTableAssociation";
pub const SECURITY_GROUP: &str = "aws:ec2/securityGroup:SecurityGroup";

pub const BUCKET: &str = "aws:s3/bucket:Bucket";
pub const BUCKET_PUBLIC_ACCESS_BLOCK: &str =
    "aws:s3/bucketPublicAccessBlock:BucketPublicAccessBlock";
pub const BUCKET_OBJECT: &str = "aws:s3/bucketObject:BucketObject";
pub const DISTRIBUTION: &str = "aws:cloudfront/distribution:Distribution";

pub const SECRET: &str = "aws:secretsmanager/secret:Secret";
pub const SECRET_VERSION: &str = "aws:secretsmanager/secretVersion:SecretVersion";

pub const RDS_SUBNET_GROUP: &str = "aws:rds/subnetGroup:SubnetGroup";
pub const RDS_INSTANCE: &str = "aws:rds/instance:Instance";
pub const RANDOM_PASSWORD: &str = "random:index/randomPassword:RandomPassword";

pub const ECR_REPOSITORY: &str = "aws:ecr/repository:Repository";
pub const ECS_CLUSTER: &str = "aws:ecs/cluster:Cluster";
pub const ECS_TASK_DEFINITION: &str = "aws:ecs/taskDefinition:TaskDefinition";
pub const ECS_SERVICE: &str = "aws:ecs/service:Service";
pub const LOG_GROUP: &str = "aws:cloudwatch/logGroup:LogGroup";
pub const LOAD_BALANCER: &str = "aws:lb/loadBalancer:LoadBalancer";
pub const TARGET_GROUP: &str = "aws:lb/targetGroup:TargetGroup";
pub const LISTENER: &str = "aws:lb/listener:Listener";
pub const ACM_CERTIFICATE: &str = "aws:acm/certificate:Certificate";

pub const IAM_ROLE: &str = "aws:iam/role:Role";
pub const IAM_ROLE_POLICY: &str = "aws:iam/rolePolicy:RolePolicy";
pub const IAM_ROLE_POLICY_ATTACHMENT: &str = "aws:iam/rolePolicyAttachment:RolePolicyAttachment";
pub const OIDC_PROVIDER: &str = "aws:iam/openIdConnectProvider:OpenIdConnectProvider";
