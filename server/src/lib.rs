use axum::{
    body::Bytes,
    extract::State as AxumState,
    http::{header, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use oro_execution::{Reconciler, SyncError};
use oro_store::RecordStore;
use oro_types::api::{LoadResponse, Status, SyncRequest, SYNC_ACTION};
use std::sync::Arc;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

mod config;

pub use config::{Backend, Config, ConfigError, RateLimit, ValidatedConfig};

/// Serves the ledger sheet over HTTP.
pub struct Api<S> {
    reconciler: Arc<Reconciler<S>>,
    rate_limit: RateLimit,
}

impl<S: RecordStore + 'static> Api<S> {
    pub fn new(reconciler: Arc<Reconciler<S>>, rate_limit: RateLimit) -> Self {
        Self {
            reconciler,
            rate_limit,
        }
    }

    pub fn router(&self) -> Router {
        // Configure CORS
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE]);

        // Configure Rate Limiting
        let governor_conf = Arc::new(
            GovernorConfigBuilder::default()
                .per_millisecond(self.rate_limit.period_ms.get())
                .burst_size(self.rate_limit.burst.get())
                .key_extractor(SmartIpKeyExtractor)
                .finish()
                .expect("rate limit period and burst are non-zero"),
        );

        Router::new()
            .route("/load", get(load::<S>))
            .route("/sync", post(sync::<S>))
            .layer(cors)
            .layer(GovernorLayer {
                config: governor_conf,
            })
            .with_state(self.reconciler.clone())
    }
}

async fn load<S: RecordStore>(
    AxumState(reconciler): AxumState<Arc<Reconciler<S>>>,
) -> impl IntoResponse {
    match reconciler.pull().await {
        Ok(contents) => (StatusCode::OK, Json(LoadResponse::ok(contents))),
        Err(e) => {
            warn!(error = %e, "load failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(LoadResponse::failure(e.to_string())),
            )
        }
    }
}

fn bad_request(message: String) -> (StatusCode, Json<Status>) {
    warn!(%message, "rejected sync request");
    (StatusCode::BAD_REQUEST, Json(Status::failure(message)))
}

async fn sync<S: RecordStore>(
    AxumState(reconciler): AxumState<Arc<Reconciler<S>>>,
    body: Bytes,
) -> impl IntoResponse {
    let request: SyncRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => return bad_request(format!("invalid request body: {e}")),
    };
    if request.action != SYNC_ACTION {
        return bad_request(format!("unsupported action: {}", request.action));
    }
    let Some(bank) = request.bank else {
        return bad_request("missing oroBanco".to_string());
    };

    match reconciler.push(&bank, &request.withdrawals).await {
        Ok(()) => {
            info!(withdrawals = request.withdrawals.len(), "synced ledger");
            (
                StatusCode::OK,
                Json(Status::ok(format!(
                    "synced {} withdrawals",
                    request.withdrawals.len()
                ))),
            )
        }
        Err(e @ SyncError::TooManyRows { .. }) => bad_request(e.to_string()),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(Status::failure(e.to_string())),
        ),
    }
}

#[cfg(test)]
mod tests;
