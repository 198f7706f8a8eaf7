use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Request, Response, Server};
use owo_colors::OwoColorize;
use prometheus::{Encoder, TextEncoder};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::util::metrics::ControllerMetrics;

/// Parses the `--metrics-addr` flag (e.g. `":8080"` or `"0.0.0.0:8080"`)
/// into a bindable [`SocketAddr`].
pub fn parse_metrics_addr(addr: &str) -> Result<SocketAddr, std::net::AddrParseError> {
    if let Some(port) = addr.strip_prefix(':') {
        format!("0.0.0.0:{port}").parse()
    } else {
        addr.parse()
    }
}

async fn handle(req: Request<Body>, metrics: Arc<ControllerMetrics>) -> Result<Response<Body>, Infallible> {
    if req.uri().path() != "/metrics" {
        return Ok(Response::builder()
            .status(404)
            .body(Body::empty())
            .unwrap());
    }

    let encoder = TextEncoder::new();
    let metric_families = metrics.registry.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .expect("encode prometheus metrics");

    Ok(Response::new(Body::from(buffer)))
}

pub async fn run_server(addr: SocketAddr, metrics: Arc<ControllerMetrics>) {
    let make_svc = make_service_fn(move |_conn| {
        let metrics = metrics.clone();
        async move {
            Ok::<_, Infallible>(service_fn(move |req| handle(req, metrics.clone())))
        }
    });

    println!(
        "{}{}",
        "📈 Starting metrics server • addr=".green(),
        addr.to_string().green().dimmed()
    );

    let server = Server::bind(&addr)
        .serve(make_svc)
        .with_graceful_shutdown(hub_common::shutdown::shutdown_signal());

    if let Err(e) = server.await {
        eprintln!("{}", format!("metrics server error: {e}").red());
    }
}
