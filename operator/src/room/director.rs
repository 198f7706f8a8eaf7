//! Director sub-reconciler (C5, §4.5): materialise the director Pod,
//! read-mounting every shared data PVC and every actor's output PVC.

use k8s_openapi::api::core::v1::{Container, Pod, PodSpec};
use kube::ResourceExt;

use hub_types::{PodPhase, Room};

use crate::client::ClusterClient;
use crate::naming::{self, Character};
use crate::room::pods::{env_from_entries, env_var, read_only_mount, resource_requirements, security_context};
use crate::util::Error;

pub async fn reconcile(cluster: &ClusterClient, room: &Room) -> Result<PodPhase, Error> {
    let setting = room
        .spec
        .setting
        .as_ref()
        .ok_or_else(|| Error::ConfigMissing("Room has no Setting resolved yet".to_string()))?;

    let room_id = &room.spec.id;
    let problem_id = &room.spec.problem_id;
    let director = &room.spec.director;

    let mut volumes = Vec::new();
    let mut mounts = Vec::new();

    for pvc_name in &setting.data_pvc_names.public {
        let (volume, mount) = read_only_mount(
            &format!("data-public-{pvc_name}"),
            pvc_name,
            &naming::data_mount_path("public", pvc_name),
        );
        volumes.push(volume);
        mounts.push(mount);
    }
    for pvc_name in &setting.data_pvc_names.private {
        let (volume, mount) = read_only_mount(
            &format!("data-private-{pvc_name}"),
            pvc_name,
            &naming::data_mount_path("private", pvc_name),
        );
        volumes.push(volume);
        mounts.push(mount);
    }
    for actor in &room.spec.actors {
        let output_pvc_name = naming::output_pvc_name(&actor.name);
        let (volume, mount) = read_only_mount(
            &format!("actor-output-{}", actor.name),
            &output_pvc_name,
            &naming::actor_output_mount_path_for_director(&actor.name),
        );
        volumes.push(volume);
        mounts.push(mount);
    }

    let mut env = vec![
        env_var("GIMULATOR_HOST", naming::gimulator_host(room_id)),
        env_var("GIMULATOR_CHARACTER", "director"),
        env_var("GIMULATOR_ROLE", "director"),
        env_var("GIMULATOR_TOKEN", director.token.clone()),
        env_var("GIMULATOR_NAME", director.name.clone()),
        env_var("GIMULATOR_ROOM_ID", room_id.clone()),
    ];
    env.extend(env_from_entries(&director.env));

    let pod_name = naming::director_pod_name(&director.name);
    let labels = naming::labels(Character::Director, "director", room_id, problem_id, &director.name);

    let pod = Pod {
        metadata: kube::api::ObjectMeta {
            name: Some(pod_name.clone()),
            namespace: room.namespace(),
            labels: Some(labels),
            ..Default::default()
        },
        spec: Some(PodSpec {
            volumes: Some(volumes),
            containers: vec![Container {
                name: "director".to_string(),
                image: Some(director.image.clone()),
                env: Some(env),
                volume_mounts: Some(mounts),
                resources: resource_requirements(
                    director.resources.as_ref().or(setting.default_resources.as_ref()),
                ),
                ..Default::default()
            }],
            restart_policy: Some("Never".to_string()),
            security_context: Some(security_context()),
            ..Default::default()
        }),
        status: None,
    };

    let observed = cluster.sync_pod(pod, Some(room)).await?;
    let phase = observed
        .status
        .as_ref()
        .and_then(|s| s.phase.as_deref());
    Ok(PodPhase::from_pod_phase(phase))
}
