//! Timer subsystem (C8, §4.8): one cooperative watcher per actor pod,
//! firing a timeout once and signalling room deletion.

use k8s_openapi::api::core::v1::Pod;
use kube::{Api, ResourceExt};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration, Instant};

use hub_common::broker::Broker;
use hub_common::s3::ObjectStore;
use hub_types::Room;

use crate::client::ClusterClient;
use crate::reporter::{self, ReporterContext};

const START_POLL_INTERVAL: Duration = Duration::from_secs(1);
const START_POLL_BUDGET: Duration = Duration::from_secs(60);
const RUN_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Process-wide map from actor-pod name to its watcher handle. Shared
/// between reconciles (which register) and watchers (which self-remove).
#[derive(Clone, Default)]
pub struct TimerRegistry {
    handles: Arc<Mutex<HashMap<String, JoinHandle<()>>>>,
}

pub struct TimerDeps {
    pub pods: Api<Pod>,
    pub cluster: Arc<ClusterClient>,
    pub store: Arc<ObjectStore>,
    pub broker: Arc<Broker>,
    pub gimulator_token: String,
}

impl TimerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// `Sync(room)`: registers a watcher for every actor pod not already
    /// tracked, when `room.timeout > 0`.
    pub async fn sync(&self, room: &Room, deps: Arc<TimerDeps>) {
        if room.spec.timeout <= 0 {
            return;
        }
        let threshold = Duration::from_secs(room.spec.timeout as u64);

        let mut handles = self.handles.lock().await;
        for actor in &room.spec.actors {
            let pod_name = crate::naming::actor_pod_name(&actor.name);
            if handles.contains_key(&pod_name) {
                continue;
            }
            let registry = self.clone();
            let room = room.clone();
            let pod_name_for_task = pod_name.clone();
            let deps = deps.clone();
            let handle = tokio::spawn(async move {
                watch(registry, deps, room, pod_name_for_task, threshold).await;
            });
            handles.insert(pod_name, handle);
        }
    }

    async fn remove(&self, pod_name: &str) {
        let mut handles = self.handles.lock().await;
        if let Some(handle) = handles.remove(pod_name) {
            handle.abort();
        }
    }

    /// Unregisters every timer belonging to `room` (on timeout fire).
    pub async fn unregister_room(&self, room: &Room) {
        let mut handles = self.handles.lock().await;
        for actor in &room.spec.actors {
            let pod_name = crate::naming::actor_pod_name(&actor.name);
            if let Some(handle) = handles.remove(&pod_name) {
                handle.abort();
            }
        }
    }
}

async fn watch(registry: TimerRegistry, deps: Arc<TimerDeps>, room: Room, pod_name: String, threshold: Duration) {
    let started_at = match wait_for_start(&deps.pods, &pod_name).await {
        Some(t) => t,
        None => {
            registry.remove(&pod_name).await;
            return;
        }
    };

    loop {
        sleep(RUN_POLL_INTERVAL).await;

        // A peer (e.g. the room reconciler tearing down a finished Room)
        // may have removed this entry already; exit without acting.
        if !registry.handles.lock().await.contains_key(&pod_name) {
            return;
        }

        let pod = match deps.pods.get(&pod_name).await {
            Ok(pod) => pod,
            Err(kube::Error::Api(ae)) if ae.code == 404 => {
                registry.remove(&pod_name).await;
                return;
            }
            Err(_) => continue,
        };

        if pod_terminated(&pod) {
            registry.remove(&pod_name).await;
            return;
        }

        if started_at.elapsed() >= threshold {
            fire_timeout(&registry, &deps, &room, threshold).await;
            return;
        }
    }
}

async fn wait_for_start(pods: &Api<Pod>, pod_name: &str) -> Option<Instant> {
    let deadline = Instant::now() + START_POLL_BUDGET;
    while Instant::now() < deadline {
        if let Ok(pod) = pods.get(pod_name).await
            && pod_running_since(&pod).is_some()
        {
            return Some(Instant::now());
        }
        sleep(START_POLL_INTERVAL).await;
    }
    None
}

fn pod_running_since(pod: &Pod) -> Option<()> {
    pod.status
        .as_ref()?
        .container_statuses
        .as_ref()?
        .iter()
        .find_map(|cs| cs.state.as_ref()?.running.as_ref())
        .map(|_| ())
}

fn pod_terminated(pod: &Pod) -> bool {
    pod.status
        .as_ref()
        .and_then(|s| s.container_statuses.as_ref())
        .is_some_and(|statuses| {
            statuses
                .iter()
                .any(|cs| cs.state.as_ref().is_some_and(|s| s.terminated.is_some()))
        })
}

async fn fire_timeout(registry: &TimerRegistry, deps: &TimerDeps, room: &Room, threshold: Duration) {
    let ctx = ReporterContext {
        pods: deps.pods.clone(),
        store: &deps.store,
        broker: &deps.broker,
        gimulator_token: &deps.gimulator_token,
    };
    if let Err(e) = reporter::report_timeout(&ctx, room, threshold.as_secs()).await {
        eprintln!("failed to report timeout for room {}: {e}", room.spec.id);
    }
    registry.unregister_room(room).await;
    if let Err(e) = deps.cluster.delete_room(&room.name_any()).await {
        eprintln!("failed to delete timed-out room {}: {e}", room.spec.id);
    }
}
