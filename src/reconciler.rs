//! Reconciliation orchestrator
//!
//! Sequences locator → parser → executors → recorder for one change event,
//! and hosts the controller loop that invokes the engine per event.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use kube::runtime::controller::{Action, Controller};
use kube::runtime::watcher::Config as WatcherConfig;
use kube::{Api, Client, ResourceExt};
use tracing::{debug, error, info, warn};

use crate::config::OperatorConfig;
use crate::crd::{ResourceModifier, DEFAULT_NAMESPACE};
use crate::directive::Directive;
use crate::error::{Error, Result};
use crate::executor::DirectiveExecutor;
use crate::locator::ResourceLocator;
use crate::status::StatusRecorder;
use crate::store::{KubeStore, ObjectStore};

/// Context data shared by all reconciliation passes.
pub struct Context {
    pub store: Arc<dyn ObjectStore>,
    pub requeue_interval: Duration,
    pub error_requeue_interval: Duration,
}

impl Context {
    pub fn new(store: Arc<dyn ObjectStore>, config: &OperatorConfig) -> Self {
        Self {
            store,
            requeue_interval: config.requeue_interval(),
            error_requeue_interval: config.error_requeue_interval(),
        }
    }
}

/// Terminal result of one reconciliation pass, for observability. Handled
/// business failures end up here, never in the `Err` channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// All directives applied; holds the reason of the last one, if any ran.
    Success { reason: Option<String> },
    /// The pass halted on a handled error, already recorded in the status.
    Failed { reason: String },
}

/// Runs one full pass for a descriptor: resolve the target, then apply each
/// directive in order, recording every outcome.
///
/// On any failure the remaining directives are skipped; directives already
/// applied are not rolled back. Only transport-level failures surface as
/// `Err` — the scheduling loop owns all retrying.
pub async fn reconcile_once(
    modifier: &ResourceModifier,
    ctx: &Context,
) -> Result<ReconcileOutcome> {
    let mut modifier = modifier.clone();
    if modifier.status.is_none() {
        modifier.status = Some(Default::default());
    }

    let locator = ResourceLocator::new(ctx.store.clone());
    let executor = DirectiveExecutor::new(ctx.store.clone());
    let recorder = StatusRecorder::new(ctx.store.clone());

    let mut target = match locator.locate(&modifier.spec.resource_data).await {
        Ok(target) => target,
        Err(err) => {
            warn!(error = %err, "unable to resolve target object");
            return fail(&recorder, &mut modifier, err).await;
        }
    };

    let annotations = modifier.spec.annotations.clone();
    let mut last_reason = None;

    for raw in &annotations {
        let directive = match Directive::parse(raw) {
            Ok(Some(directive)) => directive,
            Ok(None) => {
                warn!(directive = %raw, "ignoring unrecognized directive");
                continue;
            }
            Err(err) => {
                warn!(directive = %raw, error = %err, "directive failed to parse");
                return fail(&recorder, &mut modifier, err).await;
            }
        };

        match executor.apply(&mut target, &directive).await {
            Ok(reason) => {
                recorder.record_success(&mut modifier, reason).await?;
                last_reason = Some(reason.to_string());
            }
            Err(err) => {
                warn!(directive = %raw, error = %err, "directive execution failed");
                return fail(&recorder, &mut modifier, err).await;
            }
        }
    }

    Ok(ReconcileOutcome::Success {
        reason: last_reason,
    })
}

async fn fail(
    recorder: &StatusRecorder,
    modifier: &mut ResourceModifier,
    err: Error,
) -> Result<ReconcileOutcome> {
    let reason = err.to_string();
    recorder.record_error(modifier, &reason).await?;

    if err.is_transport() {
        return Err(err);
    }
    Ok(ReconcileOutcome::Failed { reason })
}

/// Reconciliation entry point wired into the controller.
pub async fn reconcile(modifier: Arc<ResourceModifier>, ctx: Arc<Context>) -> Result<Action> {
    let ns = modifier
        .namespace()
        .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string());
    let name = modifier.name_any();

    info!("Reconciling ResourceModifier {}/{}", ns, name);

    match reconcile_once(&modifier, &ctx).await? {
        ReconcileOutcome::Success { reason } => {
            info!(
                "Successfully reconciled ResourceModifier {}/{}{}",
                ns,
                name,
                reason.map(|r| format!(": {r}")).unwrap_or_default()
            );
        }
        ReconcileOutcome::Failed { reason } => {
            warn!(
                "ResourceModifier {}/{} halted: {}",
                ns, name, reason
            );
        }
    }

    Ok(Action::requeue(ctx.requeue_interval))
}

/// Error handler for the controller; only transport failures land here.
fn error_policy(_modifier: Arc<ResourceModifier>, error: &Error, ctx: Arc<Context>) -> Action {
    error!("Reconciliation error: {:?}", error);
    Action::requeue(ctx.error_requeue_interval)
}

/// Start the ResourceModifier controller
pub async fn run_controller(client: Client, config: &OperatorConfig) -> Result<()> {
    let modifiers: Api<ResourceModifier> = Api::all(client.clone());
    let store = Arc::new(KubeStore::new(client, config.write_timeout()));
    let ctx = Arc::new(Context::new(store, config));

    info!("Starting ResourceModifier controller");

    Controller::new(modifiers, WatcherConfig::default())
        .run(reconcile, error_policy, ctx)
        .for_each(|res| async move {
            match res {
                Ok((obj, _action)) => {
                    debug!("Reconciled {:?}", obj);
                }
                Err(e) => {
                    warn!("Reconciliation failed: {:?}", e);
                }
            }
        })
        .await;

    Ok(())
}
