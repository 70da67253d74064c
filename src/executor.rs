//! Directive executors
//!
//! One executor per action kind. Each mutates the in-memory target object
//! and persists it through the store in a single bounded write; a write
//! failure is returned verbatim, never retried here. Executors that find
//! nothing to change succeed without writing.

use std::sync::Arc;

use tracing::debug;

use crate::directive::{Action, Directive};
use crate::error::Result;
use crate::store::ObjectStore;
use crate::target::TargetObject;

/// Success reason recorded after removing finalizers.
pub const REASON_REMOVED_FINALIZERS: &str = "Successfully removed finalizers";

/// Success reason recorded after adding a finalizer.
pub const REASON_ADDED_FINALIZER: &str = "Successfully added finalizer";

/// Success reason recorded after adding a label.
pub const REASON_ADDED_LABEL: &str = "Successfully added label";

/// Success reason recorded after removing a label.
pub const REASON_REMOVED_LABEL: &str = "Successfully removed label";

/// Success reason recorded after scaling.
pub const REASON_SCALED: &str = "Successfully scaled resource";

pub struct DirectiveExecutor {
    store: Arc<dyn ObjectStore>,
}

impl DirectiveExecutor {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Applies one parsed directive to the resolved target, returning the
    /// success reason to record.
    pub async fn apply(
        &self,
        target: &mut TargetObject,
        directive: &Directive,
    ) -> Result<&'static str> {
        match &directive.action {
            Action::RemoveAllFinalizers => self.remove_all_finalizers(target).await,
            Action::AddFinalizer(value) => self.add_finalizer(target, value).await,
            Action::AddLabel { key, value } => self.add_label(target, key, value).await,
            Action::RemoveLabel(key) => self.remove_label(target, key).await,
            Action::Scale(replicas) => self.scale(target, *replicas).await,
        }
    }

    async fn remove_all_finalizers(&self, target: &mut TargetObject) -> Result<&'static str> {
        if target.finalizers().is_empty() {
            debug!(name = target.name(), "no finalizers present, nothing to do");
            return Ok(REASON_REMOVED_FINALIZERS);
        }

        target.clear_finalizers();
        self.store.update(target).await?;
        Ok(REASON_REMOVED_FINALIZERS)
    }

    async fn add_finalizer(&self, target: &mut TargetObject, value: &str) -> Result<&'static str> {
        if target.finalizers().iter().any(|existing| existing == value) {
            debug!(finalizer = value, "finalizer already present, nothing to do");
            return Ok(REASON_ADDED_FINALIZER);
        }

        target.push_finalizer(value.to_string());
        self.store.update(target).await?;
        Ok(REASON_ADDED_FINALIZER)
    }

    /// Adds `key=value` unless `key` already exists; an existing value is
    /// never overwritten.
    async fn add_label(
        &self,
        target: &mut TargetObject,
        key: &str,
        value: &str,
    ) -> Result<&'static str> {
        if target.has_label(key) {
            debug!(label = key, "label already present, nothing to do");
            return Ok(REASON_ADDED_LABEL);
        }

        target.insert_label(key.to_string(), value.to_string());
        self.store.update(target).await?;
        Ok(REASON_ADDED_LABEL)
    }

    async fn remove_label(&self, target: &mut TargetObject, key: &str) -> Result<&'static str> {
        if !target.remove_label(key) {
            debug!(label = key, "label absent, nothing to do");
            return Ok(REASON_REMOVED_LABEL);
        }

        self.store.update(target).await?;
        Ok(REASON_REMOVED_LABEL)
    }

    /// Sets the replica count to exactly `replicas`; negative counts were
    /// already rejected by the parser.
    async fn scale(&self, target: &mut TargetObject, replicas: i32) -> Result<&'static str> {
        target.set_replicas(replicas)?;
        self.store.update(target).await?;
        Ok(REASON_SCALED)
    }
}
