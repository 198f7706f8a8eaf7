//! Top-level Room reconciler (C7, §4.7) and its controller/leader-election
//! host (C12, §4.12), grounded directly on `strims/reconcile.rs`.

use futures::stream::StreamExt;
use k8s_openapi::api::core::v1::Pod;
use kube::{
    Api, Client, ResourceExt,
    runtime::{controller::Action, Controller},
};
use kube_leader_election::{LeaseLock, LeaseLockParams};
use owo_colors::OwoColorize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use hub_common::args::OperatorArgs;
use hub_common::broker::Broker;
use hub_common::cache::TtlCache;
use hub_common::s3::ObjectStore;
use hub_types::{PodPhase, Room, Setting};

use crate::client::ClusterClient;
use crate::reporter::{self, ReporterContext};
use crate::timer::{TimerDeps, TimerRegistry};
use crate::util::{
    colors::{FG1, FG2},
    patch::{patch_status, Object},
    Error, PROBE_INTERVAL,
};

/// Entrypoint for the `Room` controller: acquires leadership (when
/// `--enable-leader-election` is set) and drives the controller loop for
/// as long as leadership is held.
pub async fn run(client: Client, args: OperatorArgs, metrics: crate::SharedMetrics) -> Result<(), Error> {
    println!("{}", "Starting Room controller...".green());

    let context: Arc<ContextData> = Arc::new(ContextData::new(client.clone(), &args, metrics).await?);

    let shutdown = CancellationToken::new();
    let shutdown_signal = shutdown.clone();
    tokio::spawn(async move {
        hub_common::shutdown::shutdown_signal().await;
        shutdown_signal.cancel();
    });
    hub_common::signal_ready();

    if !args.enable_leader_election {
        return run_controller(client, context).await;
    }

    let holder_id = std::env::var("POD_NAME")
        .or_else(|_| std::env::var("HOSTNAME"))
        .unwrap_or_else(|_| format!("hub-operator-{}", Uuid::new_v4()));
    let lease_ttl = Duration::from_secs(15);
    let renew_every = Duration::from_secs(5);
    let leadership = LeaseLock::new(
        client.clone(),
        &args.namespace,
        LeaseLockParams {
            holder_id,
            lease_name: "hub-operator-lock".to_string(),
            lease_ttl,
        },
    );

    println!("{}", "🌱 Starting Room controller (leader election enabled)...".green());

    let mut controller_task: Option<tokio::task::JoinHandle<()>> = None;
    let mut tick = tokio::time::interval(renew_every);
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                if let Some(task) = controller_task.take() {
                    task.abort();
                    task.await.ok();
                }
                break Ok(());
            },
            _ = tick.tick() => {}
        }
        let lease = match leadership.try_acquire_or_renew().await {
            Ok(l) => l,
            Err(e) => {
                eprintln!("leader election renew/acquire failed: {e}");
                if let Some(task) = controller_task.take() {
                    task.abort();
                    eprintln!("aborted controller due to leader election error");
                }
                continue;
            }
        };
        if lease.acquired_lease {
            if controller_task.is_none() {
                println!("acquired leadership; starting controller");
                let client = client.clone();
                let context = context.clone();
                controller_task = Some(tokio::spawn(async move {
                    run_controller(client, context).await.ok();
                }));
            }
        } else if let Some(task) = controller_task.take() {
            eprintln!("lost leadership; stopping controller");
            task.abort();
        }
    }
}

async fn run_controller(client: Client, context: Arc<ContextData>) -> Result<(), Error> {
    let crd_api: Api<Room> = Api::all(client.clone());
    println!("{}", "🚀 Room controller started.".green());
    Controller::new(crd_api, Default::default())
        .owns(Api::<Pod>::all(client), Default::default())
        .run(reconcile, on_error, context)
        .for_each(|_res| async move {})
        .await;
    Ok(())
}

/// Context injected with each `reconcile`/`on_error` invocation.
pub struct ContextData {
    client: Client,
    cluster: Arc<ClusterClient>,
    store: Arc<ObjectStore>,
    broker: Arc<Broker>,
    settings_cache: TtlCache<Setting>,
    rules_cache: TtlCache<String>,
    timers: TimerRegistry,
    gimulator_token: String,
    metrics: crate::SharedMetrics,
}

impl ContextData {
    pub async fn new(client: Client, args: &OperatorArgs, metrics: crate::SharedMetrics) -> Result<Self, Error> {
        let store = ObjectStore::connect(&args.s3).await;
        let broker = Broker::connect(&args.broker)
            .await
            .map_err(|e| Error::Fatal(e.to_string()))?;

        Ok(Self {
            cluster: Arc::new(ClusterClient::new(client.clone(), args.namespace.clone())),
            store: Arc::new(store),
            broker: Arc::new(broker),
            settings_cache: TtlCache::default(),
            rules_cache: TtlCache::default(),
            timers: TimerRegistry::new(),
            gimulator_token: args.gimulator_token.clone(),
            client,
            metrics,
        })
    }
}

async fn reconcile(room: Arc<Room>, ctx: Arc<ContextData>) -> Result<Action, Error> {
    let namespace = room
        .namespace()
        .ok_or_else(|| Error::UserInput("Room resource must be namespaced".to_string()))?;
    let name = room.name_any();

    #[cfg(feature = "metrics")]
    ctx.metrics
        .reconcile_counter
        .with_label_values(&[&name, &namespace])
        .inc();
    #[cfg(feature = "metrics")]
    let start = std::time::Instant::now();

    let result = reconcile_tick(&room, &ctx).await;

    #[cfg(feature = "metrics")]
    ctx.metrics
        .read_histogram
        .with_label_values(&[&name, &namespace, "tick"])
        .observe(start.elapsed().as_secs_f64());

    match result {
        Ok(requeue_after) => Ok(Action::requeue(requeue_after)),
        Err(e) => Err(e),
    }
}

/// A single reconciliation tick over one Room, per §4.7.
async fn reconcile_tick(room: &Room, ctx: &ContextData) -> Result<Duration, Error> {
    let name = room.name_any();

    let mut room = match ctx.cluster.get_room(&name).await? {
        Some(room) => room,
        None => return Ok(PROBE_INTERVAL),
    };

    // 2. Token back-fill.
    let mut minted = false;
    if room.spec.director.token.is_empty() {
        room.spec.director.token = Uuid::new_v4().to_string();
        minted = true;
    }
    for actor in &mut room.spec.actors {
        if actor.token.is_empty() {
            actor.token = Uuid::new_v4().to_string();
            minted = true;
        }
    }
    if minted {
        println!(
            "🔑 {}{}{}{}",
            room.namespace().unwrap_or_default().color(FG2),
            "/".color(FG1),
            name.color(FG2),
            " minted tokens".color(FG1),
        );
        let director_token = room.spec.director.token.clone();
        let actor_tokens: BTreeMap<String, String> = room
            .spec
            .actors
            .iter()
            .map(|a| (a.name.clone(), a.token.clone()))
            .collect();
        room = ctx
            .cluster
            .sync_room(&name, |r| {
                r.spec.director.token = director_token.clone();
                for actor in &mut r.spec.actors {
                    if let Some(token) = actor_tokens.get(&actor.name) {
                        actor.token = token.clone();
                    }
                }
            })
            .await?;
    }

    // 3. FetchSetting.
    crate::settings::fetch(&ctx.store, &ctx.settings_cache, &mut room).await?;

    // 4. Verify shared PVCs exist.
    if let Some(setting) = &room.spec.setting {
        for pvc_name in setting.data_pvc_names.public.iter().chain(setting.data_pvc_names.private.iter()) {
            if ctx.cluster.get_pvc(pvc_name).await?.is_none() {
                return Err(Error::ConfigMissing(format!("shared PVC {pvc_name} does not exist")));
            }
        }
    }

    #[cfg(feature = "metrics")]
    let namespace = room.namespace().unwrap_or_default();

    // 5. Run C4, C5, C6 in order.
    let gimulator_ctx = crate::room::gimulator::GimulatorContext {
        cluster: &ctx.cluster,
        store: &ctx.store,
        rules_cache: &ctx.rules_cache,
        gimulator_token: &ctx.gimulator_token,
    };
    crate::room::gimulator::reconcile(&gimulator_ctx, &room).await?;
    #[cfg(feature = "metrics")]
    ctx.metrics
        .action_counter
        .with_label_values(&[&name, &namespace, "gimulator"])
        .inc();
    let gimulator_phase = observe_gimulator_phase(&ctx.cluster, &room).await?;

    let director_phase = crate::room::director::reconcile(&ctx.cluster, &room).await?;
    #[cfg(feature = "metrics")]
    ctx.metrics
        .action_counter
        .with_label_values(&[&name, &namespace, "director"])
        .inc();

    let mut actor_phases = BTreeMap::new();
    for actor in room.spec.actors.clone() {
        let phase = crate::room::actor::reconcile(&ctx.cluster, &room, &actor).await?;
        actor_phases.insert(actor.name.clone(), phase);
        #[cfg(feature = "metrics")]
        ctx.metrics
            .action_counter
            .with_label_values(&[&name, &namespace, "actor"])
            .inc();
    }

    // 6. Engage timers.
    let timer_deps = Arc::new(TimerDeps {
        pods: Api::namespaced(ctx.client.clone(), &room.namespace().unwrap()),
        cluster: ctx.cluster.clone(),
        store: ctx.store.clone(),
        broker: ctx.broker.clone(),
        gimulator_token: ctx.gimulator_token.clone(),
    });
    ctx.timers.sync(&room, timer_deps).await;

    // 7. Persist Room status.
    #[cfg(feature = "metrics")]
    let write_start = std::time::Instant::now();
    let room = patch_status::<hub_types::RoomStatus, Room>(ctx.client.clone(), &room, |status| {
        status.gimulator_status = gimulator_phase;
        status.director_status = director_phase;
        for (name, phase) in &actor_phases {
            status.actor_statuses.insert(name.clone(), *phase);
        }
    })
    .await?;
    #[cfg(feature = "metrics")]
    ctx.metrics
        .write_histogram
        .with_label_values(&[&name, &namespace, "status_patch"])
        .observe(write_start.elapsed().as_secs_f64());

    // 8. Invoke Reporter.
    let reporter_ctx = ReporterContext {
        pods: Api::namespaced(ctx.client.clone(), &room.namespace().unwrap()),
        store: &ctx.store,
        broker: &ctx.broker,
        gimulator_token: &ctx.gimulator_token,
    };
    let should_delete = reporter::report(&reporter_ctx, &room).await?;
    if should_delete {
        println!(
            "🗑 {}{}{}{}",
            room.namespace().unwrap_or_default().color(FG2),
            "/".color(FG1),
            name.color(FG2),
            " deleting room".color(FG1),
        );
        ctx.timers.unregister_room(&room).await;
        ctx.cluster.delete_room(&name).await?;
        return Ok(PROBE_INTERVAL);
    }

    Ok(PROBE_INTERVAL)
}

async fn observe_gimulator_phase(cluster: &ClusterClient, room: &Room) -> Result<PodPhase, Error> {
    if crate::room::gimulator::effective_image(room).is_empty() {
        return Ok(room.status.as_ref().map(|s| s.gimulator_status).unwrap_or_default());
    }
    let pod_name = crate::naming::gimulator_pod_name(&room.spec.id);
    let phase = cluster
        .get_pod(&pod_name)
        .await?
        .and_then(|pod| pod.status.and_then(|s| s.phase));
    Ok(PodPhase::from_pod_phase(phase.as_deref()))
}

fn on_error(room: Arc<Room>, error: &Error, _context: Arc<ContextData>) -> Action {
    eprintln!(
        "{}",
        format!("Room reconciliation error: {error:?} ({})", room.name_any()).red()
    );
    Action::requeue(Duration::from_secs(5))
}
