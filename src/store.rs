//! Cluster store access
//!
//! The locator, executors and status recorder all talk to the cluster
//! through the [`ObjectStore`] capability instead of a shared client value.
//! [`KubeStore`] is the live implementation; [`MemoryStore`] is the
//! in-memory substitute the test suites run against.

use std::collections::HashMap;
use std::fmt::Debug;
use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::batch::v1::CronJob;
use k8s_openapi::api::core::v1::{PersistentVolume, PersistentVolumeClaim, Pod, Service};
use k8s_openapi::api::networking::v1::Ingress;
use k8s_openapi::api::rbac::v1::{ClusterRole, ClusterRoleBinding, Role, RoleBinding};
use k8s_openapi::{ClusterResourceScope, NamespaceResourceScope};
use kube::api::{Patch, PatchParams, PostParams};
use kube::core::ErrorResponse;
use kube::{Api, Client, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::crd::{ResourceModifier, DEFAULT_NAMESPACE};
use crate::error::{Error, Result};
use crate::target::{TargetKind, TargetObject};

/// Selection key for a single point read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectKey {
    pub name: String,
    pub namespace: String,
}

/// Capability surface over the cluster API store.
///
/// Reads and writes are bounded by the implementation's deadline; a deadline
/// expiry surfaces as a transport error, not a distinct cancellation type.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Single point read of the object identified by `kind` and `key`.
    async fn get(&self, kind: TargetKind, key: &ObjectKey) -> Result<TargetObject>;

    /// Persists a mutated target object. Conflicting concurrent writes are
    /// surfaced as ordinary errors for the scheduling loop to retry.
    async fn update(&self, object: &TargetObject) -> Result<()>;

    /// Persists the descriptor's status subresource.
    async fn update_status(&self, modifier: &ResourceModifier) -> Result<()>;
}

/// Live store backed by a Kubernetes client.
pub struct KubeStore {
    client: Client,
    deadline: Duration,
}

impl KubeStore {
    pub fn new(client: Client, deadline: Duration) -> Self {
        Self { client, deadline }
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = std::result::Result<T, kube::Error>>,
    ) -> Result<T> {
        match tokio::time::timeout(self.deadline, call).await {
            Ok(result) => result.map_err(Error::from),
            Err(_) => Err(Error::Timeout(self.deadline)),
        }
    }

    async fn get_namespaced<K>(&self, key: &ObjectKey) -> Result<K>
    where
        K: Resource<Scope = NamespaceResourceScope> + Clone + DeserializeOwned + Debug,
        K::DynamicType: Default,
    {
        let api: Api<K> = Api::namespaced(self.client.clone(), &key.namespace);
        self.bounded(api.get(&key.name)).await
    }

    async fn get_cluster<K>(&self, key: &ObjectKey) -> Result<K>
    where
        K: Resource<Scope = ClusterResourceScope> + Clone + DeserializeOwned + Debug,
        K::DynamicType: Default,
    {
        let api: Api<K> = Api::all(self.client.clone());
        self.bounded(api.get(&key.name)).await
    }

    async fn replace_namespaced<K>(&self, object: &K) -> Result<()>
    where
        K: Resource<Scope = NamespaceResourceScope>
            + Clone
            + DeserializeOwned
            + Serialize
            + Debug,
        K::DynamicType: Default,
    {
        let namespace = object
            .namespace()
            .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string());
        let api: Api<K> = Api::namespaced(self.client.clone(), &namespace);
        self.bounded(api.replace(&object.name_any(), &PostParams::default(), object))
            .await
            .map(|_| ())
    }

    async fn replace_cluster<K>(&self, object: &K) -> Result<()>
    where
        K: Resource<Scope = ClusterResourceScope> + Clone + DeserializeOwned + Serialize + Debug,
        K::DynamicType: Default,
    {
        let api: Api<K> = Api::all(self.client.clone());
        self.bounded(api.replace(&object.name_any(), &PostParams::default(), object))
            .await
            .map(|_| ())
    }
}

#[async_trait]
impl ObjectStore for KubeStore {
    async fn get(&self, kind: TargetKind, key: &ObjectKey) -> Result<TargetObject> {
        let found = match kind {
            TargetKind::Pod => self.get_namespaced::<Pod>(key).await.map(TargetObject::Pod),
            TargetKind::Deployment => self
                .get_namespaced::<Deployment>(key)
                .await
                .map(TargetObject::Deployment),
            TargetKind::CronJob => self
                .get_namespaced::<CronJob>(key)
                .await
                .map(TargetObject::CronJob),
            TargetKind::PersistentVolume => self
                .get_cluster::<PersistentVolume>(key)
                .await
                .map(TargetObject::PersistentVolume),
            TargetKind::PersistentVolumeClaim => self
                .get_namespaced::<PersistentVolumeClaim>(key)
                .await
                .map(TargetObject::PersistentVolumeClaim),
            TargetKind::Service => self
                .get_namespaced::<Service>(key)
                .await
                .map(TargetObject::Service),
            TargetKind::Ingress => self
                .get_namespaced::<Ingress>(key)
                .await
                .map(TargetObject::Ingress),
            TargetKind::Role => self
                .get_namespaced::<Role>(key)
                .await
                .map(TargetObject::Role),
            TargetKind::RoleBinding => self
                .get_namespaced::<RoleBinding>(key)
                .await
                .map(TargetObject::RoleBinding),
            TargetKind::ClusterRole => self
                .get_cluster::<ClusterRole>(key)
                .await
                .map(TargetObject::ClusterRole),
            TargetKind::ClusterRoleBinding => self
                .get_cluster::<ClusterRoleBinding>(key)
                .await
                .map(TargetObject::ClusterRoleBinding),
        };

        found.map_err(|err| match err {
            Error::Kube(kube::Error::Api(ref response)) if response.code == 404 => {
                Error::NotFound {
                    kind,
                    name: key.name.clone(),
                }
            }
            other => other,
        })
    }

    async fn update(&self, object: &TargetObject) -> Result<()> {
        match object {
            TargetObject::Pod(pod) => self.replace_namespaced(pod).await,
            TargetObject::Deployment(deployment) => self.replace_namespaced(deployment).await,
            TargetObject::CronJob(cronjob) => self.replace_namespaced(cronjob).await,
            TargetObject::PersistentVolume(pv) => self.replace_cluster(pv).await,
            TargetObject::PersistentVolumeClaim(pvc) => self.replace_namespaced(pvc).await,
            TargetObject::Service(service) => self.replace_namespaced(service).await,
            TargetObject::Ingress(ingress) => self.replace_namespaced(ingress).await,
            TargetObject::Role(role) => self.replace_namespaced(role).await,
            TargetObject::RoleBinding(binding) => self.replace_namespaced(binding).await,
            TargetObject::ClusterRole(role) => self.replace_cluster(role).await,
            TargetObject::ClusterRoleBinding(binding) => self.replace_cluster(binding).await,
        }
    }

    async fn update_status(&self, modifier: &ResourceModifier) -> Result<()> {
        let namespace = modifier
            .namespace()
            .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string());
        let api: Api<ResourceModifier> = Api::namespaced(self.client.clone(), &namespace);
        let patch = serde_json::json!({ "status": modifier.status });
        self.bounded(api.patch_status(
            &modifier.name_any(),
            &PatchParams::default(),
            &Patch::Merge(&patch),
        ))
        .await
        .map(|_| ())
    }
}

/// In-memory store keyed by (kind, namespace, name), standing in for a live
/// API server in the test suites. Update failures can be injected to
/// exercise write-error paths.
#[derive(Default)]
pub struct MemoryStore {
    objects: Mutex<HashMap<(TargetKind, String, String), TargetObject>>,
    modifiers: Mutex<HashMap<(String, String), ResourceModifier>>,
    pending_update_failures: AtomicU32,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the store with an object, keyed from its metadata.
    pub fn insert(&self, object: TargetObject) {
        let key = Self::object_key(&object);
        self.objects.lock().unwrap().insert(key, object);
    }

    /// Makes the next `count` writes (object updates and status updates)
    /// fail with a synthetic API error.
    pub fn fail_next_updates(&self, count: u32) {
        self.pending_update_failures.store(count, Ordering::SeqCst);
    }

    /// Returns the stored copy of an object, if present.
    pub fn object(&self, kind: TargetKind, namespace: &str, name: &str) -> Option<TargetObject> {
        let namespace = Self::effective_namespace(kind, namespace);
        self.objects
            .lock()
            .unwrap()
            .get(&(kind, namespace, name.to_string()))
            .cloned()
    }

    /// Returns the most recently persisted status of a descriptor.
    pub fn modifier(&self, namespace: &str, name: &str) -> Option<ResourceModifier> {
        self.modifiers
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    fn object_key(object: &TargetObject) -> (TargetKind, String, String) {
        let kind = object.kind();
        let namespace =
            Self::effective_namespace(kind, object.namespace().unwrap_or(DEFAULT_NAMESPACE));
        (kind, namespace, object.name().to_string())
    }

    fn effective_namespace(kind: TargetKind, namespace: &str) -> String {
        if kind.is_namespaced() {
            namespace.to_string()
        } else {
            String::new()
        }
    }

    fn take_injected_failure(&self) -> Option<Error> {
        let decremented = self
            .pending_update_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        decremented.ok().map(|_| injected_update_error())
    }
}

fn injected_update_error() -> Error {
    Error::Kube(kube::Error::Api(ErrorResponse {
        status: "Failure".to_string(),
        message: "error during update".to_string(),
        reason: "InternalError".to_string(),
        code: 500,
    }))
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn get(&self, kind: TargetKind, key: &ObjectKey) -> Result<TargetObject> {
        let namespace = Self::effective_namespace(kind, &key.namespace);
        self.objects
            .lock()
            .unwrap()
            .get(&(kind, namespace, key.name.clone()))
            .cloned()
            .ok_or_else(|| Error::NotFound {
                kind,
                name: key.name.clone(),
            })
    }

    async fn update(&self, object: &TargetObject) -> Result<()> {
        if let Some(err) = self.take_injected_failure() {
            return Err(err);
        }
        let key = Self::object_key(object);
        let mut objects = self.objects.lock().unwrap();
        if !objects.contains_key(&key) {
            return Err(Error::NotFound {
                kind: key.0,
                name: key.2,
            });
        }
        objects.insert(key, object.clone());
        Ok(())
    }

    async fn update_status(&self, modifier: &ResourceModifier) -> Result<()> {
        if let Some(err) = self.take_injected_failure() {
            return Err(err);
        }
        let namespace = modifier
            .namespace()
            .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string());
        self.modifiers
            .lock()
            .unwrap()
            .insert((namespace, modifier.name_any()), modifier.clone());
        Ok(())
    }
}
