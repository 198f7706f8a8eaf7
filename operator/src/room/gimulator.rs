//! Gimulator sub-reconciler (C4, §4.4): stand up the arbitration mediator
//! and publish its credentials.

use k8s_openapi::api::core::v1::{
    Container, Pod, PodSpec, Secret, Service, ServicePort, ServiceSpec, Volume, VolumeMount,
};
use kube::{Api, ResourceExt};
use std::collections::BTreeMap;

use hub_common::cache::TtlCache;
use hub_common::s3::ObjectStore;
use hub_types::Room;

use crate::client::ClusterClient;
use crate::naming::{self, Character};
use crate::room::pods::env_var;
use crate::util::Error;

#[derive(serde::Serialize, serde::Deserialize)]
struct CredentialRecord {
    name: String,
    character: String,
    role: String,
    token: String,
}

pub struct GimulatorContext<'a> {
    pub cluster: &'a ClusterClient,
    pub store: &'a ObjectStore,
    pub rules_cache: &'a TtlCache<String>,
    pub gimulator_token: &'a str,
}

/// Returns the effective gimulator image, per the priority `room.spec`
/// → `setting`. Empty means "no gimulator for this room"; callers must
/// skip the rest of this sub-reconciler in that case (§4.4 design note:
/// the whole room simply has no gimulator, downstream must tolerate it).
pub fn effective_image(room: &Room) -> String {
    if !room.spec.gimulator.image.is_empty() {
        return room.spec.gimulator.image.clone();
    }
    room.spec
        .setting
        .as_ref()
        .map(|s| s.gimulator.image.clone())
        .unwrap_or_default()
}

pub async fn reconcile(ctx: &GimulatorContext<'_>, room: &Room) -> Result<(), Error> {
    let image = effective_image(room);
    if image.is_empty() {
        return Ok(());
    }

    let setting = room
        .spec
        .setting
        .as_ref()
        .ok_or_else(|| Error::ConfigMissing("Room has no Setting resolved yet".to_string()))?;

    let room_id = &room.spec.id;
    let problem_id = &room.spec.problem_id;

    // 1. Rules ConfigMap: shared across rooms for the same problem, so
    //    it's synced with owner=None (§9 "cyclic ownership avoided").
    let rules_cm_name = naming::rules_configmap_name(problem_id);
    reconcile_rules_configmap(ctx, room, &rules_cm_name).await?;

    // 2. Credentials ConfigMap, owned by the room.
    let credentials_cm_name = naming::credentials_configmap_name(room_id);
    let mut records = vec![CredentialRecord {
        name: room.spec.director.name.clone(),
        character: "director".to_string(),
        role: "director".to_string(),
        token: room.spec.director.token.clone(),
    }];
    for actor in &room.spec.actors {
        records.push(CredentialRecord {
            name: actor.name.clone(),
            character: "actor".to_string(),
            role: actor.role.clone(),
            token: actor.token.clone(),
        });
    }
    records.push(CredentialRecord {
        name: "hub-manager".to_string(),
        character: "operator".to_string(),
        role: "hub-manager".to_string(),
        token: ctx.gimulator_token.to_string(),
    });
    let credentials_yaml =
        serde_yaml::to_string(&records).map_err(|e| Error::InvariantViolation(e.to_string()))?;
    let mut data = BTreeMap::new();
    data.insert("data".to_string(), credentials_yaml);
    ctx.cluster
        .sync_configmap(&credentials_cm_name, data, Some(room))
        .await?;

    // 3. Headless Service.
    let service_name = naming::gimulator_service_name(room_id);
    let selector = naming::labels(Character::Gimulator, "gimulator", room_id, problem_id, room_id);
    let service = Service {
        metadata: kube::api::ObjectMeta {
            name: Some(service_name.clone()),
            namespace: room.namespace(),
            ..Default::default()
        },
        spec: Some(ServiceSpec {
            cluster_ip: Some("None".to_string()),
            selector: Some(selector),
            ports: Some(vec![ServicePort {
                port: crate::util::GIMULATOR_PORT as i32,
                ..Default::default()
            }]),
            ..Default::default()
        }),
        status: None,
    };
    ctx.cluster.sync_service(service, Some(room)).await?;

    // 4. Gimulator Pod.
    let pod_name = naming::gimulator_pod_name(room_id);
    let labels = naming::labels(Character::Gimulator, "gimulator", room_id, problem_id, room_id);
    let (broker_host, broker_user, broker_pass, broker_queue) =
        read_broker_credentials(ctx, room).await?;

    let mut env = vec![
        env_var("GIMULATOR_HOST", "0.0.0.0:23579"),
        env_var("GIMULATOR_CONFIG_DIR", "/etc/gimulator"),
        env_var("RABBIT_HOST", broker_host),
        env_var("RABBIT_USERNAME", broker_user),
        env_var("RABBIT_PASSWORD", broker_pass),
        env_var("RABBIT_RESULT_QUEUE", broker_queue),
    ];
    env.sort_by(|a, b| a.name.cmp(&b.name));

    let pod = Pod {
        metadata: kube::api::ObjectMeta {
            name: Some(pod_name.clone()),
            namespace: room.namespace(),
            labels: Some(labels),
            ..Default::default()
        },
        spec: Some(PodSpec {
            volumes: Some(vec![
                Volume {
                    name: "rules".to_string(),
                    config_map: Some(k8s_openapi::api::core::v1::ConfigMapVolumeSource {
                        name: rules_cm_name.clone(),
                        items: Some(vec![k8s_openapi::api::core::v1::KeyToPath {
                            key: "data".to_string(),
                            path: "rules.yaml".to_string(),
                            ..Default::default()
                        }]),
                        ..Default::default()
                    }),
                    ..Default::default()
                },
                Volume {
                    name: "credentials".to_string(),
                    config_map: Some(k8s_openapi::api::core::v1::ConfigMapVolumeSource {
                        name: credentials_cm_name.clone(),
                        items: Some(vec![k8s_openapi::api::core::v1::KeyToPath {
                            key: "data".to_string(),
                            path: "credentials.yaml".to_string(),
                            ..Default::default()
                        }]),
                        ..Default::default()
                    }),
                    ..Default::default()
                },
            ]),
            containers: vec![Container {
                name: "gimulator".to_string(),
                image: Some(image),
                env: Some(env),
                volume_mounts: Some(vec![
                    VolumeMount {
                        name: "rules".to_string(),
                        mount_path: "/etc/gimulator/rules.yaml".to_string(),
                        sub_path: Some("rules.yaml".to_string()),
                        ..Default::default()
                    },
                    VolumeMount {
                        name: "credentials".to_string(),
                        mount_path: "/etc/gimulator/credentials.yaml".to_string(),
                        sub_path: Some("credentials.yaml".to_string()),
                        ..Default::default()
                    },
                ]),
                resources: crate::room::pods::resource_requirements(
                    room.spec.gimulator.resources.as_ref().or(setting.gimulator.resources.as_ref()),
                ),
                ..Default::default()
            }],
            restart_policy: Some("Never".to_string()),
            ..Default::default()
        }),
        status: None,
    };

    ctx.cluster.sync_pod(pod, Some(room)).await?;

    Ok(())
}

async fn reconcile_rules_configmap(
    ctx: &GimulatorContext<'_>,
    room: &Room,
    rules_cm_name: &str,
) -> Result<(), Error> {
    let problem_id = &room.spec.problem_id;
    let existing = kube_get_configmap(ctx, rules_cm_name).await?;
    if existing.is_some() {
        return Ok(());
    }
    let cache_key = naming::rules_cache_key(problem_id);
    let rules_yaml = ctx
        .rules_cache
        .get_or_fetch(&cache_key, || async {
            ctx.store
                .get_string(naming::RULES_BUCKET, &naming::rules_object_key(problem_id))
                .await
        })
        .await
        .map_err(|e| Error::ConfigMissing(format!("rules for problem {problem_id}: {e}")))?;
    let mut data = BTreeMap::new();
    data.insert("data".to_string(), rules_yaml);
    // Not owned by any single Room: shared across rooms for the problem.
    ctx.cluster.sync_configmap(rules_cm_name, data, None).await?;
    Ok(())
}

async fn kube_get_configmap(
    ctx: &GimulatorContext<'_>,
    name: &str,
) -> Result<Option<()>, Error> {
    let api: Api<k8s_openapi::api::core::v1::ConfigMap> =
        Api::namespaced(ctx.cluster.client(), ctx.cluster.namespace());
    match api.get(name).await {
        Ok(_) => Ok(Some(())),
        Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(None),
        Err(e) => Err(e.into()),
    }
}

async fn read_broker_credentials(
    ctx: &GimulatorContext<'_>,
    room: &Room,
) -> Result<(String, String, String, String), Error> {
    let api: Api<Secret> = Api::namespaced(ctx.cluster.client(), &room.namespace().unwrap());
    let secret = api.get("rabbit-credentials").await?;
    let data = secret.data.unwrap_or_default();
    let field = |key: &str| -> Result<String, Error> {
        data.get(key)
            .map(|b| String::from_utf8_lossy(&b.0).to_string())
            .ok_or_else(|| Error::ConfigMissing(format!("rabbit-credentials missing key {key}")))
    };
    Ok((
        field("host")?,
        field("username")?,
        field("password")?,
        field("result-queue")?,
    ))
}
