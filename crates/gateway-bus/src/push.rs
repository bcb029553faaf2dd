//! Push mode: an HTTP endpoint that decodes one bus message per request
//! (§4.7 *Push*).

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use gateway_config::ConfigCatalog;
use gateway_types::bus::BusEnvelope;
use gateway_types::error::GatewayError;
use gateway_types::request::JobExecutionRequest;
use serde::Deserialize;

use crate::decode::decode_request;

/// The shared pipeline collaborator: validate → resolve → admit → create,
/// wired together outside this crate (`gateway-core`). Both push and pull
/// dispatch through the same trait.
#[async_trait::async_trait]
pub trait Pipeline: Send + Sync {
    async fn dispatch(&self, request: JobExecutionRequest) -> Result<(), GatewayError>;
}

struct PushState {
    catalog: Arc<ConfigCatalog>,
    pipeline: Arc<dyn Pipeline>,
}

#[derive(Debug, Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

/// Build the push router. POST `/` is the only route (§6).
pub fn router(catalog: Arc<ConfigCatalog>, pipeline: Arc<dyn Pipeline>) -> Router {
    let state = Arc::new(PushState { catalog, pipeline });
    Router::new().route("/", post(handle_push)).with_state(state)
}

/// True iff the request's token query parameter satisfies the catalog's
/// configured shared secret. No secret configured ⇒ always true (§6,
/// concrete scenario #6).
fn token_satisfies(configured: &Option<String>, supplied: &Option<String>) -> bool {
    match configured {
        None => true,
        Some(expected) => supplied.as_deref() == Some(expected.as_str()),
    }
}

async fn handle_push(
    State(state): State<Arc<PushState>>,
    Query(query): Query<TokenQuery>,
    body: Result<Json<BusEnvelope>, axum::extract::rejection::JsonRejection>,
) -> StatusCode {
    if !token_satisfies(&state.catalog.push_token(), &query.token) {
        return StatusCode::FORBIDDEN;
    }

    let Json(envelope) = match body {
        Ok(json) => json,
        Err(e) => {
            tracing::warn!(error = %e, "malformed push request body");
            return StatusCode::BAD_REQUEST;
        }
    };

    let request = match decode_request(&envelope.message) {
        Ok(request) => request,
        Err(GatewayError::InvalidArgument(_) | GatewayError::UnsupportedEventType(_)) => {
            return StatusCode::BAD_REQUEST;
        }
        Err(e) => {
            tracing::warn!(error = %e, "push decode failed");
            return StatusCode::NOT_MODIFIED;
        }
    };

    match state.pipeline.dispatch(request).await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            // 304 is the source's non-ack signal, not a cache hint: it means
            // "not accepted, bus should redeliver" (§9).
            tracing::warn!(error = %e, "push pipeline rejected the request");
            StatusCode::NOT_MODIFIED
        }
    }
}
