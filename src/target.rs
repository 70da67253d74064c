//! Target object handles
//!
//! Registry of supported resource kinds and a uniform capability surface
//! over the concrete object types, so executors and the locator never match
//! on kind names themselves.

use std::collections::BTreeMap;
use std::fmt;

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::batch::v1::CronJob;
use k8s_openapi::api::core::v1::{PersistentVolume, PersistentVolumeClaim, Pod, Service};
use k8s_openapi::api::networking::v1::Ingress;
use k8s_openapi::api::rbac::v1::{ClusterRole, ClusterRoleBinding, Role, RoleBinding};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

use crate::error::{Error, Result};

/// Supported target kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetKind {
    Pod,
    Deployment,
    CronJob,
    PersistentVolume,
    PersistentVolumeClaim,
    Service,
    Ingress,
    Role,
    RoleBinding,
    ClusterRole,
    ClusterRoleBinding,
}

impl TargetKind {
    /// Resolves a descriptor's resource type string, case-insensitively.
    pub fn from_name(resource_type: &str) -> Result<Self> {
        match resource_type.to_lowercase().as_str() {
            "pod" => Ok(Self::Pod),
            "deployment" => Ok(Self::Deployment),
            "cronjob" => Ok(Self::CronJob),
            "pv" => Ok(Self::PersistentVolume),
            "pvc" => Ok(Self::PersistentVolumeClaim),
            "service" => Ok(Self::Service),
            "ingress" => Ok(Self::Ingress),
            "role" => Ok(Self::Role),
            "rb" => Ok(Self::RoleBinding),
            "clusterrole" => Ok(Self::ClusterRole),
            "crb" => Ok(Self::ClusterRoleBinding),
            _ => Err(Error::UnsupportedResourceType(resource_type.to_string())),
        }
    }

    pub fn is_namespaced(&self) -> bool {
        !matches!(
            self,
            Self::PersistentVolume | Self::ClusterRole | Self::ClusterRoleBinding
        )
    }

    /// Only Deployments carry a replica count the scale directive can set.
    pub fn is_scalable(&self) -> bool {
        matches!(self, Self::Deployment)
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pod => "Pod",
            Self::Deployment => "Deployment",
            Self::CronJob => "CronJob",
            Self::PersistentVolume => "PersistentVolume",
            Self::PersistentVolumeClaim => "PersistentVolumeClaim",
            Self::Service => "Service",
            Self::Ingress => "Ingress",
            Self::Role => "Role",
            Self::RoleBinding => "RoleBinding",
            Self::ClusterRole => "ClusterRole",
            Self::ClusterRoleBinding => "ClusterRoleBinding",
        };
        f.write_str(name)
    }
}

/// One live cluster object, held for the duration of a single
/// reconciliation pass. Never cached between passes.
#[derive(Debug, Clone)]
pub enum TargetObject {
    Pod(Pod),
    Deployment(Deployment),
    CronJob(CronJob),
    PersistentVolume(PersistentVolume),
    PersistentVolumeClaim(PersistentVolumeClaim),
    Service(Service),
    Ingress(Ingress),
    Role(Role),
    RoleBinding(RoleBinding),
    ClusterRole(ClusterRole),
    ClusterRoleBinding(ClusterRoleBinding),
}

macro_rules! each_target {
    ($self:expr, $obj:ident => $body:expr) => {
        match $self {
            TargetObject::Pod($obj) => $body,
            TargetObject::Deployment($obj) => $body,
            TargetObject::CronJob($obj) => $body,
            TargetObject::PersistentVolume($obj) => $body,
            TargetObject::PersistentVolumeClaim($obj) => $body,
            TargetObject::Service($obj) => $body,
            TargetObject::Ingress($obj) => $body,
            TargetObject::Role($obj) => $body,
            TargetObject::RoleBinding($obj) => $body,
            TargetObject::ClusterRole($obj) => $body,
            TargetObject::ClusterRoleBinding($obj) => $body,
        }
    };
}

impl TargetObject {
    pub fn kind(&self) -> TargetKind {
        match self {
            Self::Pod(_) => TargetKind::Pod,
            Self::Deployment(_) => TargetKind::Deployment,
            Self::CronJob(_) => TargetKind::CronJob,
            Self::PersistentVolume(_) => TargetKind::PersistentVolume,
            Self::PersistentVolumeClaim(_) => TargetKind::PersistentVolumeClaim,
            Self::Service(_) => TargetKind::Service,
            Self::Ingress(_) => TargetKind::Ingress,
            Self::Role(_) => TargetKind::Role,
            Self::RoleBinding(_) => TargetKind::RoleBinding,
            Self::ClusterRole(_) => TargetKind::ClusterRole,
            Self::ClusterRoleBinding(_) => TargetKind::ClusterRoleBinding,
        }
    }

    pub fn metadata(&self) -> &ObjectMeta {
        each_target!(self, obj => &obj.metadata)
    }

    pub fn metadata_mut(&mut self) -> &mut ObjectMeta {
        each_target!(self, obj => &mut obj.metadata)
    }

    pub fn name(&self) -> &str {
        self.metadata().name.as_deref().unwrap_or_default()
    }

    pub fn namespace(&self) -> Option<&str> {
        self.metadata().namespace.as_deref()
    }

    pub fn finalizers(&self) -> &[String] {
        self.metadata().finalizers.as_deref().unwrap_or_default()
    }

    pub fn clear_finalizers(&mut self) {
        self.metadata_mut().finalizers = None;
    }

    /// Appends a finalizer, preserving the order of existing entries.
    pub fn push_finalizer(&mut self, value: String) {
        self.metadata_mut()
            .finalizers
            .get_or_insert_with(Vec::new)
            .push(value);
    }

    pub fn labels(&self) -> Option<&BTreeMap<String, String>> {
        self.metadata().labels.as_ref()
    }

    pub fn has_label(&self, key: &str) -> bool {
        self.labels().is_some_and(|labels| labels.contains_key(key))
    }

    pub fn insert_label(&mut self, key: String, value: String) {
        self.metadata_mut()
            .labels
            .get_or_insert_with(BTreeMap::new)
            .insert(key, value);
    }

    /// Removes the entry for `key`, reporting whether it was present.
    pub fn remove_label(&mut self, key: &str) -> bool {
        self.metadata_mut()
            .labels
            .as_mut()
            .and_then(|labels| labels.remove(key))
            .is_some()
    }

    pub fn replicas(&self) -> Option<i32> {
        match self {
            Self::Deployment(deployment) => deployment.spec.as_ref().and_then(|s| s.replicas),
            _ => None,
        }
    }

    /// Sets the replica count on scalable kinds; anything else is rejected
    /// without mutation.
    pub fn set_replicas(&mut self, replicas: i32) -> Result<()> {
        match self {
            Self::Deployment(deployment) => {
                deployment.spec.get_or_insert_with(Default::default).replicas = Some(replicas);
                Ok(())
            }
            other => Err(Error::NotScalable(other.kind())),
        }
    }
}
