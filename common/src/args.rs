use clap::Parser;

#[derive(Parser, Debug, Clone)]
pub struct S3Args {
    #[arg(long, env = "HUB_S3_URL")]
    pub s3_url: String,

    #[arg(long, env = "HUB_S3_ACCESS_KEY")]
    pub s3_access_key: String,

    #[arg(long, env = "HUB_S3_SECRET_KEY")]
    pub s3_secret_key: String,
}

#[derive(Parser, Debug, Clone)]
pub struct BrokerArgs {
    #[arg(long, env = "HUB_RABBIT_HOST")]
    pub rabbit_host: String,

    #[arg(long, env = "HUB_RABBIT_USERNAME")]
    pub rabbit_username: String,

    #[arg(long, env = "HUB_RABBIT_PASSWORD")]
    pub rabbit_password: String,

    #[arg(long, env = "HUB_RABBIT_RESULT_QUEUE")]
    pub rabbit_result_queue: String,
}

impl BrokerArgs {
    pub fn uri(&self) -> String {
        format!(
            "amqp://{}:{}@{}",
            self.rabbit_username, self.rabbit_password, self.rabbit_host
        )
    }
}

#[derive(Parser, Debug, Clone)]
pub struct OperatorArgs {
    #[arg(long, env = "HUB_NAMESPACE", default_value = "hub-system")]
    pub namespace: String,

    #[arg(long, env = "HUB_GIMULATOR_TOKEN")]
    pub gimulator_token: String,

    #[arg(long, env = "METRICS_ADDR", default_value = ":8080")]
    pub metrics_addr: String,

    #[arg(long, env = "ENABLE_LEADER_ELECTION", default_value_t = false)]
    pub enable_leader_election: bool,

    #[clap(flatten)]
    pub s3: S3Args,

    #[clap(flatten)]
    pub broker: BrokerArgs,
}
