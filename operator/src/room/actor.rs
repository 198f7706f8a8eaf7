//! Actor sub-reconciler (C6, §4.6): per-actor output PVC and Pod, gated
//! on the gimulator being observed `Running`.

use k8s_openapi::api::core::v1::{
    Container, LocalObjectReference, PersistentVolumeClaim, PersistentVolumeClaimSpec, Pod,
    PodSpec, VolumeMount, VolumeResourceRequirements as PvcResourceRequirements,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use kube::ResourceExt;
use std::collections::BTreeMap;

use hub_types::{Actor, PodPhase, Room};

use crate::client::ClusterClient;
use crate::naming::{self, Character};
use crate::room::pods::{env_from_entries, env_var, read_only_mount, resource_requirements, security_context};
use crate::util::Error;

pub async fn reconcile(cluster: &ClusterClient, room: &Room, actor: &Actor) -> Result<PodPhase, Error> {
    if room.status.as_ref().map(|s| s.gimulator_status) != Some(PodPhase::Running) {
        // Actor must not race the mediator; leave the previous status entry
        // (initialised to Unknown at token back-fill) for the next tick.
        return Ok(room
            .status
            .as_ref()
            .and_then(|s| s.actor_statuses.get(&actor.name).copied())
            .unwrap_or_default());
    }

    let setting = room
        .spec
        .setting
        .as_ref()
        .ok_or_else(|| Error::ConfigMissing("Room has no Setting resolved yet".to_string()))?;

    let room_id = &room.spec.id;
    let problem_id = &room.spec.problem_id;

    let output_size = setting.output_volume_size.trim();
    let has_output = !output_size.is_empty() && output_size != "0";

    let mut volumes = Vec::new();
    let mut mounts: Vec<VolumeMount> = Vec::new();

    for pvc_name in &setting.data_pvc_names.public {
        let (volume, mount) = read_only_mount(
            &format!("data-public-{pvc_name}"),
            pvc_name,
            &naming::data_mount_path("public", pvc_name),
        );
        volumes.push(volume);
        mounts.push(mount);
    }

    let output_pvc_name = naming::output_pvc_name(&actor.name);
    if has_output {
        let pvc = PersistentVolumeClaim {
            metadata: kube::api::ObjectMeta {
                name: Some(output_pvc_name.clone()),
                namespace: room.namespace(),
                ..Default::default()
            },
            spec: Some(PersistentVolumeClaimSpec {
                access_modes: Some(vec!["ReadWriteOnce".to_string()]),
                storage_class_name: Some(setting.storage_class.clone()),
                resources: Some(PvcResourceRequirements {
                    requests: Some(BTreeMap::from([(
                        "storage".to_string(),
                        Quantity(output_size.to_string()),
                    )])),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            status: None,
        };
        cluster.sync_pvc(pvc, Some(room)).await?;

        volumes.push(k8s_openapi::api::core::v1::Volume {
            name: "output".to_string(),
            persistent_volume_claim: Some(
                k8s_openapi::api::core::v1::PersistentVolumeClaimVolumeSource {
                    claim_name: output_pvc_name.clone(),
                    read_only: Some(false),
                },
            ),
            ..Default::default()
        });
        mounts.push(VolumeMount {
            name: "output".to_string(),
            mount_path: naming::OUTPUT_VOLUME_MOUNT_PATH.to_string(),
            ..Default::default()
        });
    }

    let role_resources = setting.roles.get(&actor.role).and_then(|r| r.resources.as_ref());
    let resources = resource_requirements(
        actor
            .resources
            .as_ref()
            .or(role_resources)
            .or(setting.default_resources.as_ref()),
    );

    let mut env = vec![
        env_var("GIMULATOR_HOST", naming::gimulator_host(room_id)),
        env_var("GIMULATOR_CHARACTER", "actor"),
        env_var("GIMULATOR_ROLE", actor.role.clone()),
        env_var("GIMULATOR_TOKEN", actor.token.clone()),
        env_var("GIMULATOR_NAME", actor.name.clone()),
        env_var("GIMULATOR_ROOM_ID", room_id.clone()),
    ];
    env.extend(env_from_entries(&actor.env));

    let pod_name = naming::actor_pod_name(&actor.name);
    let labels = naming::labels(Character::Actor, &actor.role, room_id, problem_id, &actor.name);

    let pod = Pod {
        metadata: kube::api::ObjectMeta {
            name: Some(pod_name.clone()),
            namespace: room.namespace(),
            labels: Some(labels),
            ..Default::default()
        },
        spec: Some(PodSpec {
            volumes: Some(volumes),
            image_pull_secrets: Some(vec![LocalObjectReference {
                name: "registry-credentials".to_string(),
            }]),
            containers: vec![Container {
                name: "actor".to_string(),
                image: Some(actor.image.clone()),
                env: Some(env),
                volume_mounts: Some(mounts),
                resources,
                ..Default::default()
            }],
            restart_policy: Some("Never".to_string()),
            security_context: Some(security_context()),
            ..Default::default()
        }),
        status: None,
    };

    let observed = cluster.sync_pod(pod, Some(room)).await?;
    let phase = observed.status.as_ref().and_then(|s| s.phase.as_deref());
    Ok(PodPhase::from_pod_phase(phase))
}
