//! Resource locator
//!
//! Maps a descriptor's target data to exactly one live cluster object.

use std::sync::Arc;

use tracing::debug;

use crate::crd::{TargetResourceData, DEFAULT_NAMESPACE};
use crate::error::{Error, Result};
use crate::store::{ObjectKey, ObjectStore};
use crate::target::{TargetKind, TargetObject};

pub struct ResourceLocator {
    store: Arc<dyn ObjectStore>,
}

impl ResourceLocator {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Resolves the descriptor to a single object handle.
    ///
    /// Selection is by name; the namespace defaults to `"default"` when the
    /// descriptor leaves it unset. Label-based selection is a reserved path
    /// and is rejected rather than partially matched. Not-found and
    /// transport errors from the store propagate unchanged; the caller
    /// decides their disposition.
    pub async fn locate(&self, data: &TargetResourceData) -> Result<TargetObject> {
        let kind = TargetKind::from_name(&data.resource_type)?;

        let name = match data.name.as_deref().filter(|name| !name.is_empty()) {
            Some(name) => name,
            None if data.labels.is_some() => return Err(Error::SelectorNotImplemented),
            None => return Err(Error::MissingSelector),
        };

        let namespace = if data.namespace.is_empty() {
            DEFAULT_NAMESPACE
        } else {
            &data.namespace
        };

        let key = ObjectKey {
            name: name.to_string(),
            namespace: namespace.to_string(),
        };
        debug!(kind = %kind, name = %key.name, namespace = %key.namespace, "resolving target object");

        self.store.get(kind, &key).await
    }
}
