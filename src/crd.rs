//! ResourceModifier CRD
//!
//! Schema for the descriptor resource: a target selector plus an ordered
//! list of directive strings.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Condition key set when a reconciliation pass applied a directive.
pub const STATUS_SUCCESS: &str = "Success";

/// Condition key set when a reconciliation pass failed.
pub const STATUS_ERROR: &str = "Error";

/// Namespace searched when the descriptor leaves it unset.
pub const DEFAULT_NAMESPACE: &str = "default";

/// Identifies the single cluster object the directives apply to.
///
/// Selection strategies, mutually exclusive:
/// 1. By `resource_type` and `name` (optionally plus `namespace`)
/// 2. By `resource_type` and `namespace` only
/// 3. By `resource_type` and `labels`
///
/// Selection must resolve to exactly one object; zero or multiple matches is
/// an error. Label selection is reserved and currently rejected outright.
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TargetResourceData {
    /// Supported kind name, matched case-insensitively
    pub resource_type: String,

    /// Target object name (metadata.name)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Namespace in which the object is searched
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Label set that would identify the object; reserved path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<BTreeMap<String, String>>,
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

#[derive(CustomResource, Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "modifiers.rmod.dev",
    version = "v1",
    kind = "ResourceModifier",
    plural = "resourcemodifiers",
    shortname = "rmod",
    status = "ResourceModifierStatus",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct ResourceModifierSpec {
    /// Identifies the particular resource to update. Data resolving to more
    /// than one resource results in an error.
    pub resource_data: TargetResourceData,

    /// Ordered directive strings describing how the resource is modified,
    /// e.g. `removeAnyFinalizers` or `scale:3`. Later directives see the
    /// effects of earlier ones on the same resolved object.
    pub annotations: Vec<String>,
}

/// Observed state of a ResourceModifier.
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResourceModifierStatus {
    /// Condition map describing the current state. Holds the most recent
    /// error and/or the most recent successful directive outcome.
    #[serde(default)]
    pub conditions: BTreeMap<String, String>,
}

impl ResourceModifierStatus {
    /// Records a failure reason under the `Error` condition key.
    ///
    /// A prior `Success` entry is left in place.
    pub fn set_error(&mut self, reason: &str) {
        self.conditions
            .insert(STATUS_ERROR.to_string(), reason.to_string());
    }

    /// Records a success reason under the `Success` condition key and clears
    /// any previously recorded error.
    pub fn set_success(&mut self, reason: &str) {
        self.conditions.remove(STATUS_ERROR);
        self.conditions
            .insert(STATUS_SUCCESS.to_string(), reason.to_string());
    }
}
