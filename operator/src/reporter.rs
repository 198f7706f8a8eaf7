//! Reporter (C9, §4.9): translates observed phases into the gimulator
//! RPC, broker messages, and log uploads.

use k8s_openapi::api::core::v1::Pod;
use kube::api::LogParams;
use kube::Api;
use serde::Serialize;
use tonic::transport::Channel;
use tonic::Request;

use hub_common::broker::Broker;
use hub_common::s3::ObjectStore;
use hub_types::{PodPhase, Room};

use crate::naming;
use crate::proto::gimulator_client::GimulatorClient;
use crate::proto::{Report as RpcReport, SetUserStatusResponse, Status as RpcStatus};
use crate::util::messages::{actor_failed_message, timeout_message, GIMULATOR_FAILED};
use crate::util::Error;

#[derive(Serialize)]
struct ResultPayload<'a> {
    id: &'a str,
    status: &'a str,
    msg: String,
}

pub struct ReporterContext<'a> {
    pub pods: Api<Pod>,
    pub store: &'a ObjectStore,
    pub broker: &'a Broker,
    pub gimulator_token: &'a str,
}

/// `Report(ctx, room) -> shouldDelete`, per the decision table in §4.9.
pub async fn report(ctx: &ReporterContext<'_>, room: &Room) -> Result<bool, Error> {
    let status = match &room.status {
        Some(status) => status,
        None => return Ok(false),
    };

    match status.gimulator_status {
        PodPhase::Succeeded => {
            upload_logs(ctx, room).await?;
            Ok(true)
        }
        PodPhase::Running => {
            push_statuses(ctx, room).await?;
            if room.spec.terminate_on_actor_failure {
                if let Some(failed_pod_name) = first_failed_pod_name(room) {
                    let log_tail = tail_log(ctx, &failed_pod_name).await.unwrap_or_default();
                    publish_fail(ctx, room, actor_failed_message(&log_tail)).await?;
                    return Ok(true);
                }
            }
            Ok(false)
        }
        PodPhase::Failed => {
            publish_fail(ctx, room, GIMULATOR_FAILED.to_string()).await?;
            Ok(true)
        }
        PodPhase::Pending | PodPhase::Unknown => Ok(false),
    }
}

/// `ReportTimeout(room, threshold)`: publishes a FAIL result to the broker.
pub async fn report_timeout(ctx: &ReporterContext<'_>, room: &Room, threshold_seconds: u64) -> Result<(), Error> {
    publish_fail(ctx, room, timeout_message(threshold_seconds)).await
}

fn first_failed_pod_name(room: &Room) -> Option<String> {
    if room.status.as_ref().map(|s| s.director_status) == Some(PodPhase::Failed) {
        return Some(naming::director_pod_name(&room.spec.director.name));
    }
    room.spec.actors.iter().find_map(|actor| {
        if room
            .status
            .as_ref()
            .and_then(|s| s.actor_statuses.get(&actor.name))
            == Some(&PodPhase::Failed)
        {
            Some(naming::actor_pod_name(&actor.name))
        } else {
            None
        }
    })
}

async fn push_statuses(ctx: &ReporterContext<'_>, room: &Room) -> Result<(), Error> {
    let mut client = gimulator_client(room).await?;

    let status = room.status.as_ref();
    let director_status = status.map(|s| s.director_status).unwrap_or_default();
    send_status(&mut client, ctx, &room.spec.director.name, director_status).await?;

    for actor in &room.spec.actors {
        let actor_status = status
            .and_then(|s| s.actor_statuses.get(&actor.name))
            .copied()
            .unwrap_or_default();
        send_status(&mut client, ctx, &actor.name, actor_status).await?;
    }

    Ok(())
}

async fn gimulator_client(room: &Room) -> Result<GimulatorClient<Channel>, Error> {
    let endpoint = format!("http://{}", naming::gimulator_host(&room.spec.id));
    let channel = Channel::from_shared(endpoint)?
        .timeout(std::time::Duration::from_secs(5))
        .connect()
        .await?;
    Ok(GimulatorClient::new(channel))
}

async fn send_status(
    client: &mut GimulatorClient<Channel>,
    ctx: &ReporterContext<'_>,
    name: &str,
    phase: PodPhase,
) -> Result<SetUserStatusResponse, Error> {
    let mut request = Request::new(RpcReport {
        name: name.to_string(),
        status: rpc_status(phase) as i32,
    });
    request
        .metadata_mut()
        .insert("token", ctx.gimulator_token.parse().expect("valid token header"));
    let response = client.set_user_status(request).await?;
    Ok(response.into_inner())
}

fn rpc_status(phase: PodPhase) -> RpcStatus {
    match phase {
        PodPhase::Running => RpcStatus::Running,
        PodPhase::Failed => RpcStatus::Failed,
        PodPhase::Succeeded => RpcStatus::Succeeded,
        PodPhase::Pending | PodPhase::Unknown => RpcStatus::Unknown,
    }
}

async fn upload_logs(ctx: &ReporterContext<'_>, room: &Room) -> Result<(), Error> {
    let room_id = &room.spec.id;
    let mut targets = vec![naming::director_pod_name(&room.spec.director.name)];
    targets.extend(room.spec.actors.iter().map(|a| naming::actor_pod_name(&a.name)));

    let mut first_error = None;
    for pod_name in &targets {
        if let Err(e) = upload_one_log(ctx, room_id, pod_name).await {
            first_error.get_or_insert(e);
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

async fn upload_one_log(ctx: &ReporterContext<'_>, room_id: &str, pod_name: &str) -> Result<(), Error> {
    let log = ctx
        .pods
        .logs(pod_name, &LogParams::default())
        .await
        .map_err(|e| Error::ReportDelivery(e.to_string()))?;
    ctx.store
        .put_stream(naming::LOG_BUCKET, &naming::log_object_key(room_id, pod_name), log.into_bytes())
        .await?;
    Ok(())
}

async fn tail_log(ctx: &ReporterContext<'_>, pod_name: &str) -> Result<String, Error> {
    ctx.pods
        .logs(
            pod_name,
            &LogParams {
                tail_lines: Some(200),
                ..Default::default()
            },
        )
        .await
        .map_err(|e| Error::ReportDelivery(e.to_string()))
}

async fn publish_fail(ctx: &ReporterContext<'_>, room: &Room, msg: String) -> Result<(), Error> {
    let payload = ResultPayload {
        id: &room.spec.id,
        status: "FAIL",
        msg,
    };
    let body = serde_json::to_vec(&payload)?;
    ctx.broker.send(body).await?;
    Ok(())
}
