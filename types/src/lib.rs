use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::{fmt, str::FromStr};

/// CPU/memory/ephemeral-storage envelope. Quantities are raw Kubernetes
/// quantity strings (e.g. `"500m"`, `"2Gi"`); parsing is the caller's job.
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
pub struct ResourceEnvelope {
    pub cpu: Option<String>,
    pub memory: Option<String>,
    #[serde(rename = "ephemeralStorage")]
    pub ephemeral_storage: Option<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
pub struct EnvVarEntry {
    pub name: String,
    pub value: String,
}

/// One declared actor. `token` is back-filled by the reconciler if empty.
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
pub struct Actor {
    pub name: String,
    pub image: String,
    pub role: String,
    #[serde(default)]
    pub token: String,
    pub resources: Option<ResourceEnvelope>,
    #[serde(default)]
    pub env: Vec<EnvVarEntry>,
}

/// The director. Same shape as [`Actor`] minus `role` (implicitly "director").
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
pub struct Director {
    pub name: String,
    pub image: String,
    #[serde(default)]
    pub token: String,
    pub resources: Option<ResourceEnvelope>,
    #[serde(default)]
    pub env: Vec<EnvVarEntry>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
pub struct GimulatorSpec {
    pub image: String,
    pub resources: Option<ResourceEnvelope>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
pub struct DataPvcNames {
    #[serde(default)]
    pub public: Vec<String>,
    #[serde(default)]
    pub private: Vec<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
pub struct RoleConfig {
    pub resources: Option<ResourceEnvelope>,
}

/// Per-problem document fetched from object storage (bucket `settings`,
/// key `<problemID>.yaml`). Not a Kubernetes object in its own right; it is
/// embedded into `RoomSpec.setting` once resolved.
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
pub struct Setting {
    #[serde(rename = "dataPVCNames", default)]
    pub data_pvc_names: DataPvcNames,
    /// Quantity string. `"0"` means "no output PVC".
    #[serde(rename = "outputVolumeSize", default)]
    pub output_volume_size: String,
    #[serde(rename = "defaultResources")]
    pub default_resources: Option<ResourceEnvelope>,
    #[serde(default)]
    pub roles: BTreeMap<String, RoleConfig>,
    #[serde(rename = "storageClass", default)]
    pub storage_class: String,
    pub gimulator: GimulatorSpec,
}

#[derive(CustomResource, Serialize, Deserialize, Default, Debug, PartialEq, Clone, JsonSchema)]
#[kube(
    group = "hub.roboepics.com",
    version = "v1",
    kind = "Room",
    plural = "rooms",
    derive = "PartialEq",
    status = "RoomStatus",
    namespaced
)]
#[kube(derive = "Default")]
#[kube(
    printcolumn = "{\"jsonPath\": \".status.gimulatorStatus\", \"name\": \"GIMULATOR\", \"type\": \"string\" }"
)]
#[kube(
    printcolumn = "{\"jsonPath\": \".status.directorStatus\", \"name\": \"DIRECTOR\", \"type\": \"string\" }"
)]
pub struct RoomSpec {
    pub id: String,

    #[serde(rename = "problemID")]
    pub problem_id: String,

    /// Populated on first reconcile from the object store; absent on
    /// Room creation.
    pub setting: Option<Setting>,

    pub gimulator: GimulatorSpec,

    #[serde(default)]
    pub actors: Vec<Actor>,

    pub director: Director,

    /// Seconds; `0` disables the per-actor timeout watchdog.
    #[serde(default)]
    pub timeout: i64,

    #[serde(rename = "terminateOnActorFailure", default)]
    pub terminate_on_actor_failure: bool,
}

/// Status object for the [`Room`] resource.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Default, JsonSchema)]
pub struct RoomStatus {
    #[serde(rename = "gimulatorStatus", default)]
    pub gimulator_status: PodPhase,

    #[serde(rename = "directorStatus", default)]
    pub director_status: PodPhase,

    #[serde(rename = "actorStatuses", default)]
    pub actor_statuses: BTreeMap<String, PodPhase>,

    #[serde(rename = "lastUpdated")]
    pub last_updated: Option<String>,
}

/// Observed phase of a child Pod, as tracked in `RoomStatus`.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq, JsonSchema, Default)]
pub enum PodPhase {
    Pending,
    Running,
    Succeeded,
    Failed,
    #[default]
    Unknown,
}

impl FromStr for PodPhase {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(PodPhase::Pending),
            "Running" => Ok(PodPhase::Running),
            "Succeeded" => Ok(PodPhase::Succeeded),
            "Failed" => Ok(PodPhase::Failed),
            "Unknown" => Ok(PodPhase::Unknown),
            _ => Err(()),
        }
    }
}

impl fmt::Display for PodPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PodPhase::Pending => write!(f, "Pending"),
            PodPhase::Running => write!(f, "Running"),
            PodPhase::Succeeded => write!(f, "Succeeded"),
            PodPhase::Failed => write!(f, "Failed"),
            PodPhase::Unknown => write!(f, "Unknown"),
        }
    }
}

impl PodPhase {
    /// Maps a raw `pod.status.phase` string (or its absence) to a [`PodPhase`].
    pub fn from_pod_phase(phase: Option<&str>) -> Self {
        match phase {
            Some("Pending") => PodPhase::Pending,
            Some("Running") => PodPhase::Running,
            Some("Succeeded") => PodPhase::Succeeded,
            Some("Failed") => PodPhase::Failed,
            _ => PodPhase::Unknown,
        }
    }
}
