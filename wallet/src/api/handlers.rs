use axum::{extract::State, Json};
use std::sync::Arc;

use super::types::{FaucetResponse, SnapshotResponse};
use crate::error::WalletError;
use crate::sync::SyncManager;

pub type AppState = Arc<SyncManager>;

/// GET /health
pub async fn health_check() -> &'static str {
    "OK"
}

/// GET /api/snapshot
pub async fn snapshot_handler(State(manager): State<AppState>) -> Json<SnapshotResponse> {
    Json(manager.snapshot().into())
}

/// POST /api/faucet
///
/// Responds only after the follow-up refresh cycle has merged, so the
/// returned balance already reflects the grant.
pub async fn faucet_handler(
    State(manager): State<AppState>,
) -> Result<Json<FaucetResponse>, WalletError> {
    manager.request_funds().await?;
    let snapshot = manager.snapshot();
    Ok(Json(FaucetResponse {
        funded: true,
        balance: snapshot.balance.map(|reading| reading.amount.to_string()),
    }))
}
