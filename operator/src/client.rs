//! Cluster client façade (§4.3): a narrow, idempotent surface over Pod,
//! PVC, Service, ConfigMap and Room. Create-if-absent-else-leave for
//! ConfigMap/Service/PVC/Pod (Pod specs are never patched, per §9); owner
//! references are attached whenever a `Room` owner is supplied.

use k8s_openapi::api::core::v1::{ConfigMap, PersistentVolumeClaim, Pod, Service};
use kube::{
    Api, Client, Resource, ResourceExt,
    api::{Patch, PatchParams, PostParams},
};
use std::collections::BTreeMap;

use crate::util::{Error, MANAGER_NAME};
use hub_types::Room;

pub struct ClusterClient {
    client: Client,
    namespace: String,
}

impl ClusterClient {
    pub fn new(client: Client, namespace: impl Into<String>) -> Self {
        Self {
            client,
            namespace: namespace.into(),
        }
    }

    pub fn client(&self) -> Client {
        self.client.clone()
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub async fn get_room(&self, name: &str) -> Result<Option<Room>, Error> {
        let api: Api<Room> = Api::namespaced(self.client.clone(), &self.namespace);
        match api.get(name).await {
            Ok(room) => Ok(Some(room)),
            Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Create-or-update with a retry-on-conflict envelope, writing both
    /// Spec and Status deep copies (§4.3). The main endpoint ignores
    /// `.status` once a status subresource is registered, so the status
    /// half is written separately via `replace_status` against the
    /// resource version `replace` just produced. On a 409 conflict at
    /// either step, re-reads and retries — the caller's mutation closure
    /// must be idempotent.
    pub async fn sync_room(
        &self,
        name: &str,
        mutate: impl Fn(&mut Room),
    ) -> Result<Room, Error> {
        let api: Api<Room> = Api::namespaced(self.client.clone(), &self.namespace);
        for _ in 0..5 {
            let mut current = api
                .get(name)
                .await
                .map_err(|e| Error::TransientCluster(e.to_string()))?;
            mutate(&mut current);
            let mut updated = match api
                .replace(name, &PostParams::default(), &current)
                .await
            {
                Ok(room) => room,
                Err(kube::Error::Api(ae)) if ae.code == 409 => continue,
                Err(e) => return Err(e.into()),
            };
            updated.status = current.status;
            let body = serde_json::to_vec(&updated)?;
            match api.replace_status(name, &PostParams::default(), body).await {
                Ok(room) => return Ok(room),
                Err(kube::Error::Api(ae)) if ae.code == 409 => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(Error::TransientCluster(format!(
            "exhausted retries syncing Room {name}"
        )))
    }

    pub async fn delete_room(&self, name: &str) -> Result<(), Error> {
        let api: Api<Room> = Api::namespaced(self.client.clone(), &self.namespace);
        match api.delete(name, &Default::default()).await {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get_pod(&self, name: &str) -> Result<Option<Pod>, Error> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), &self.namespace);
        match api.get(name).await {
            Ok(pod) => Ok(Some(pod)),
            Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get_pvc(&self, name: &str) -> Result<Option<PersistentVolumeClaim>, Error> {
        let api: Api<PersistentVolumeClaim> = Api::namespaced(self.client.clone(), &self.namespace);
        match api.get(name).await {
            Ok(pvc) => Ok(Some(pvc)),
            Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Creates `pod` if absent; Pod specs are never patched once created
    /// (§9 "No mutation of Pod spec").
    pub async fn sync_pod(&self, pod: Pod, owner: Option<&Room>) -> Result<Pod, Error> {
        let name = pod.name_any();
        if let Some(existing) = self.get_pod(&name).await? {
            return Ok(existing);
        }
        let pod = with_owner(pod, owner);
        let api: Api<Pod> = Api::namespaced(self.client.clone(), &self.namespace);
        match api.create(&PostParams::default(), &pod).await {
            Ok(pod) => Ok(pod),
            Err(kube::Error::Api(ae)) if ae.code == 409 => self
                .get_pod(&name)
                .await?
                .ok_or_else(|| Error::TransientCluster(format!("pod {name} vanished after 409"))),
            Err(e) => Err(e.into()),
        }
    }

    /// Creates `pvc` if absent; PVCs are never updated once created.
    pub async fn sync_pvc(
        &self,
        pvc: PersistentVolumeClaim,
        owner: Option<&Room>,
    ) -> Result<PersistentVolumeClaim, Error> {
        let name = pvc.name_any();
        if let Some(existing) = self.get_pvc(&name).await? {
            return Ok(existing);
        }
        let pvc = with_owner(pvc, owner);
        let api: Api<PersistentVolumeClaim> = Api::namespaced(self.client.clone(), &self.namespace);
        match api.create(&PostParams::default(), &pvc).await {
            Ok(pvc) => Ok(pvc),
            Err(kube::Error::Api(ae)) if ae.code == 409 => self
                .get_pvc(&name)
                .await?
                .ok_or_else(|| Error::TransientCluster(format!("pvc {name} vanished after 409"))),
            Err(e) => Err(e.into()),
        }
    }

    /// Create-or-patch a Service's ports+selector.
    pub async fn sync_service(
        &self,
        service: Service,
        owner: Option<&Room>,
    ) -> Result<Service, Error> {
        let name = service.name_any();
        let api: Api<Service> = Api::namespaced(self.client.clone(), &self.namespace);
        match api.get(&name).await {
            Ok(_) => {
                let patch = serde_json::json!({ "spec": service.spec });
                Ok(api
                    .patch(&name, &PatchParams::apply(MANAGER_NAME), &Patch::Merge(&patch))
                    .await?)
            }
            Err(kube::Error::Api(ae)) if ae.code == 404 => {
                let service = with_owner(service, owner);
                Ok(api.create(&PostParams::default(), &service).await?)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Create-or-patch a ConfigMap's data. `owner` is `None` for the
    /// shared, per-problem rules ConfigMap (§9 "cyclic ownership
    /// avoided").
    pub async fn sync_configmap(
        &self,
        name: &str,
        data: BTreeMap<String, String>,
        owner: Option<&Room>,
    ) -> Result<ConfigMap, Error> {
        let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), &self.namespace);
        match api.get(name).await {
            Ok(_) => {
                let patch = serde_json::json!({ "data": data });
                Ok(api
                    .patch(name, &PatchParams::apply(MANAGER_NAME), &Patch::Merge(&patch))
                    .await?)
            }
            Err(kube::Error::Api(ae)) if ae.code == 404 => {
                let cm = ConfigMap {
                    metadata: kube::api::ObjectMeta {
                        name: Some(name.to_string()),
                        namespace: Some(self.namespace.clone()),
                        ..Default::default()
                    },
                    data: Some(data),
                    ..Default::default()
                };
                let cm = with_owner(cm, owner);
                Ok(api.create(&PostParams::default(), &cm).await?)
            }
            Err(e) => Err(e.into()),
        }
    }
}

fn with_owner<T>(mut object: T, owner: Option<&Room>) -> T
where
    T: Resource<DynamicType = ()>,
{
    if let Some(owner) = owner {
        let owner_ref = owner.controller_owner_ref(&()).expect("Room has a uid");
        object.meta_mut().owner_references = Some(vec![owner_ref]);
    }
    object
}
