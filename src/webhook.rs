//! Admission webhook
//!
//! Validating webhook for ResourceModifier descriptors: rejects unsupported
//! resource types and malformed directive arguments at admission, before
//! they ever reach a reconciliation pass. Unknown directive strings are
//! allowed through; the reconciler skips them.

use axum::routing::post;
use axum::{Json, Router};
use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview};
use kube::core::DynamicObject;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::crd::ResourceModifier;
use crate::directive::Directive;
use crate::error::Result;
use crate::target::TargetKind;

/// Checks a descriptor the way the reconciler will interpret it.
pub fn validate(modifier: &ResourceModifier) -> Result<()> {
    TargetKind::from_name(&modifier.spec.resource_data.resource_type)?;
    for raw in &modifier.spec.annotations {
        Directive::parse(raw)?;
    }
    Ok(())
}

async fn validate_handler(
    Json(review): Json<AdmissionReview<ResourceModifier>>,
) -> Json<AdmissionReview<DynamicObject>> {
    let request: AdmissionRequest<ResourceModifier> = match review.try_into() {
        Ok(request) => request,
        Err(err) => {
            warn!(error = %err, "malformed admission review");
            return Json(AdmissionResponse::invalid(err.to_string()).into_review());
        }
    };

    let mut response = AdmissionResponse::from(&request);
    if let Some(modifier) = &request.object {
        if let Err(err) = validate(modifier) {
            warn!(name = %request.name, error = %err, "denying ResourceModifier");
            response = response.deny(err.to_string());
        }
    }

    Json(response.into_review())
}

pub fn router() -> Router {
    Router::new()
        .route("/validate-resourcemodifier", post(validate_handler))
        .layer(TraceLayer::new_for_http())
}

/// Serves the webhook until the listener fails.
pub async fn serve(bind_addr: &str) -> Result<()> {
    let addr: std::net::SocketAddr = bind_addr
        .parse()
        .map_err(|_| crate::error::Error::Config(format!("invalid webhook address: {bind_addr}")))?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Admission webhook listening on {}", addr);
    axum::serve(listener, router()).await?;

    Ok(())
}
