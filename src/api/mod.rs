//! HTTP API Layer
//!
//! Thin axum surface over the core services. Every response uses the
//! `{code, data, msg}` envelope; every `BankError` maps to a stable machine
//! code and HTTP status. Authentication is bearer-token based and delegated
//! to the injected `IdentityVerifier`.

pub mod handlers;

use std::sync::Arc;

use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::Serialize;

use crate::config::AppConfig;
use crate::core_types::UserId;
use crate::error::BankError;
use crate::identity::{IdentityVerifier, bearer_token};
use crate::ledger::store::TransactionalStore;
use crate::standing_order::StandingOrderScheduler;
use crate::transfer::{PeerTransferService, TransferOrchestrator};

/// Shared application state.
pub struct AppState<S> {
    pub store: Arc<S>,
    pub verifier: Arc<dyn IdentityVerifier>,
    pub orchestrator: TransferOrchestrator<S>,
    pub p2p: PeerTransferService<S>,
    pub scheduler: StandingOrderScheduler<S>,
}

impl<S: TransactionalStore> AppState<S> {
    pub fn new(store: Arc<S>, verifier: Arc<dyn IdentityVerifier>, config: &AppConfig) -> Self {
        Self {
            orchestrator: TransferOrchestrator::new(store.clone(), config.tan.clone()),
            p2p: PeerTransferService::new(store.clone()),
            scheduler: StandingOrderScheduler::new(store.clone(), config.scheduler.clone()),
            store,
            verifier,
        }
    }

    /// Resolve the calling user from the Authorization header.
    pub async fn authenticate(&self, headers: &HeaderMap) -> Result<UserId, ApiError> {
        let header = headers
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or(ApiError(BankError::Unauthorized))?;
        let token = bearer_token(header)?;
        Ok(self.verifier.verify(token).await?)
    }
}

/// API wrapper for the standard response format.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            code: "OK",
            data: Some(data),
            msg: None,
        }
    }
}

impl ApiResponse<()> {
    pub fn failure(err: &BankError) -> Self {
        Self {
            code: err.code(),
            data: None,
            msg: Some(err.to_string()),
        }
    }
}

/// Error wrapper implementing `IntoResponse` so handlers can use `?`.
#[derive(Debug)]
pub struct ApiError(pub BankError);

impl From<BankError> for ApiError {
    fn from(err: BankError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(ApiResponse::failure(&self.0))).into_response()
    }
}

/// Build the application router.
pub fn router<S>(state: Arc<AppState<S>>) -> Router
where
    S: TransactionalStore + 'static,
{
    Router::new()
        .route("/api/health", get(handlers::health))
        .route("/api/signup", post(handlers::signup::<S>))
        .route("/api/dashboard", get(handlers::dashboard::<S>))
        .route("/api/transfer/initiate", post(handlers::initiate_transfer::<S>))
        .route("/api/transfer/confirm", post(handlers::confirm_transfer::<S>))
        .route("/api/p2p/transfer", post(handlers::peer_transfer::<S>))
        .route(
            "/api/standing-orders",
            get(handlers::list_standing_orders::<S>).post(handlers::create_standing_order::<S>),
        )
        .route(
            "/api/standing-orders/{order_id}",
            delete(handlers::cancel_standing_order::<S>),
        )
        .with_state(state)
}
