use clap::{Parser, Subcommand};
use kube::client::Client;

use hub_common::args::OperatorArgs;

mod client;
mod naming;
mod proto;
mod reporter;
mod room;
mod settings;
mod timer;
mod util;

#[cfg(feature = "metrics")]
mod metrics;

/// The metrics handle threaded from `main` into the controller: a single
/// `ControllerMetrics`, shared between the `/metrics` HTTP server and the
/// reconciler so both observe the same registry. Collapses to `()` when
/// the `metrics` feature is off.
#[cfg(feature = "metrics")]
pub type SharedMetrics = std::sync::Arc<util::metrics::ControllerMetrics>;
#[cfg(not(feature = "metrics"))]
pub type SharedMetrics = ();

/// Top-level CLI configuration for the binary. Any command line
/// flags should go in here.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    args: OperatorArgs,
}

/// List of subcommands for the binary. Clap will convert the
/// name of each enum variant to kebab-case for the CLI.
/// e.g. `ManageConsumers` becomes `manage-consumers`.
#[derive(Subcommand)]
enum Command {
    ManageRooms,
}

/// Secondary entrypoint that runs the appropriate subcommand.
async fn run(client: Client) {
    let cli = Cli::parse();

    #[cfg(feature = "metrics")]
    let metrics: SharedMetrics = {
        let addr = metrics::parse_metrics_addr(&cli.args.metrics_addr).expect("valid --metrics-addr");
        let metrics = std::sync::Arc::new(util::metrics::ControllerMetrics::new("hub_operator"));
        tokio::spawn(metrics::run_server(addr, metrics.clone()));
        metrics
    };
    #[cfg(not(feature = "metrics"))]
    let metrics: SharedMetrics = ();

    match cli.command {
        Command::ManageRooms => room::run(client, cli.args, metrics).await,
    }
    .unwrap();

    panic!("exited unexpectedly");
}

/// Main entrypoint that sets up the environment before running the secondary entrypoint `run`.
#[tokio::main]
async fn main() {
    hub_common::init();

    // Set the panic hook to exit the process with a non-zero exit code
    // when a panic occurs on any thread. This is desired behavior when
    // running in a container, as the metrics server or controller may
    // panic and we always want to restart the container in that case.
    let default_panic = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        default_panic(info);
        std::process::exit(1);
    }));

    // Create a kubernetes client using the default configuration.
    // In-cluster, the kubeconfig will be set by the service account.
    let client: Client = Client::try_default()
        .await
        .expect("Expected a valid KUBECONFIG environment variable.");

    // Run the secondary entrypoint.
    run(client).await;

    // This is an unreachable branch. The controllers and metrics
    // servers should never exit without a panic.
    panic!("exited prematurely");
}
