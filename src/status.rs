//! Status recorder
//!
//! Persists reconciliation outcomes to the descriptor's status subresource.

use std::sync::Arc;

use tracing::warn;

use crate::crd::ResourceModifier;
use crate::error::Result;
use crate::store::ObjectStore;

pub struct StatusRecorder {
    store: Arc<dyn ObjectStore>,
}

impl StatusRecorder {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Records a successful directive outcome, clearing any prior error
    /// condition.
    ///
    /// If the status write itself fails, the failure is recorded as an
    /// `Error` condition instead of being dropped; an error is returned only
    /// when that second write fails as well.
    pub async fn record_success(
        &self,
        modifier: &mut ResourceModifier,
        reason: &str,
    ) -> Result<()> {
        modifier
            .status
            .get_or_insert_with(Default::default)
            .set_success(reason);

        match self.store.update_status(modifier).await {
            Ok(()) => Ok(()),
            Err(err) => {
                warn!(error = %err, "status update failed, recording the failure");
                self.record_error(modifier, &err.to_string()).await
            }
        }
    }

    /// Records a failure reason. A prior `Success` condition is left in
    /// place.
    pub async fn record_error(&self, modifier: &mut ResourceModifier, reason: &str) -> Result<()> {
        modifier
            .status
            .get_or_insert_with(Default::default)
            .set_error(reason);

        self.store.update_status(modifier).await
    }
}
