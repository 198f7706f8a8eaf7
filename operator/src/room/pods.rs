//! Shared Pod-manifest building blocks used by the gimulator/director/
//! actor sub-reconcilers (§4.4–§4.6). Grounded on `strims/actions.rs`'s
//! `ffmpeg_pod` builder style: plain struct literals, no builder crate.

use k8s_openapi::api::core::v1::{
    EnvVar, PodSecurityContext, ResourceRequirements, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use std::collections::BTreeMap;

use hub_types::{EnvVarEntry, ResourceEnvelope};

/// Fixed unprivileged UID/GID used by actor and director Pods, with an
/// on-root-mismatch FS group policy so mounted volumes are writable
/// (§4.6 step 2).
pub fn security_context() -> PodSecurityContext {
    PodSecurityContext {
        run_as_user: Some(2000),
        run_as_group: Some(2000),
        fs_group: Some(2000),
        fs_group_change_policy: Some("OnRootMismatch".to_string()),
        ..Default::default()
    }
}

pub fn env_var(name: impl Into<String>, value: impl Into<String>) -> EnvVar {
    EnvVar {
        name: name.into(),
        value: Some(value.into()),
        ..Default::default()
    }
}

pub fn env_from_entries(entries: &[EnvVarEntry]) -> Vec<EnvVar> {
    entries
        .iter()
        .map(|e| env_var(e.name.clone(), e.value.clone()))
        .collect()
}

/// Builds a `ResourceRequirements` from an envelope, if present. Returns
/// `None` when the envelope itself is `None` — the caller is expected to
/// resolve the priority chain (e.g. `actor.resources` →
/// `setting.roles[role].resources` → `setting.defaultResources`) before
/// calling this.
pub fn resource_requirements(envelope: Option<&ResourceEnvelope>) -> Option<ResourceRequirements> {
    let envelope = envelope?;
    let mut limits = BTreeMap::new();
    if let Some(cpu) = &envelope.cpu {
        limits.insert("cpu".to_string(), Quantity(cpu.clone()));
    }
    if let Some(memory) = &envelope.memory {
        limits.insert("memory".to_string(), Quantity(memory.clone()));
    }
    if let Some(ephemeral) = &envelope.ephemeral_storage {
        limits.insert("ephemeral-storage".to_string(), Quantity(ephemeral.clone()));
    }
    if limits.is_empty() {
        return None;
    }
    Some(ResourceRequirements {
        limits: Some(limits.clone()),
        requests: Some(limits),
        ..Default::default()
    })
}

pub fn read_only_mount(volume_name: &str, pvc_name: &str, mount_path: &str) -> (Volume, VolumeMount) {
    (
        Volume {
            name: volume_name.to_string(),
            persistent_volume_claim: Some(
                k8s_openapi::api::core::v1::PersistentVolumeClaimVolumeSource {
                    claim_name: pvc_name.to_string(),
                    read_only: Some(true),
                },
            ),
            ..Default::default()
        },
        VolumeMount {
            name: volume_name.to_string(),
            mount_path: mount_path.to_string(),
            read_only: Some(true),
            ..Default::default()
        },
    )
}
