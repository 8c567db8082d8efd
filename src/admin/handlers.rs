use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::admin::AdminState;
use crate::ledger::{ConsumedTransaction, LedgerError, LedgerSummary};
use crate::subscription::SweepReport;
use crate::types::{UserId, Usdt};

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub uptime_secs: u64,
    pub price: Usdt,
    pub period_days: i64,
}

#[derive(Serialize)]
pub struct AccountView {
    pub user_id: UserId,
    pub balance: Usdt,
    pub expiry: Option<DateTime<Utc>>,
    pub active: bool,
    pub transactions: Vec<ConsumedTransaction>,
}

/// Error body for admin endpoints.
#[derive(Debug)]
pub enum AdminError {
    NotFound,
    Ledger(LedgerError),
}

impl From<LedgerError> for AdminError {
    fn from(e: LedgerError) -> Self {
        AdminError::Ledger(e)
    }
}

impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AdminError::NotFound => (StatusCode::NOT_FOUND, "account not found".to_string()),
            AdminError::Ledger(e) => {
                tracing::error!(error = %e, "Admin request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "ledger unavailable".to_string())
            }
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    let terms = state.service.terms();
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        uptime_secs: state.started_at.elapsed().as_secs(),
        price: terms.price,
        period_days: terms.period.num_days(),
    })
}

pub async fn get_stats(State(state): State<AdminState>) -> Result<Json<LedgerSummary>, AdminError> {
    let now = state.service.clock().now();
    Ok(Json(state.service.ledger().summary(now).await?))
}

pub async fn get_account(
    State(state): State<AdminState>,
    Path(user_id): Path<u64>,
) -> Result<Json<AccountView>, AdminError> {
    let user_id = UserId(user_id);
    let ledger = state.service.ledger();
    let account = ledger.account(user_id).await?.ok_or(AdminError::NotFound)?;
    let transactions = ledger.transactions(user_id).await?;
    let now = state.service.clock().now();

    Ok(Json(AccountView {
        user_id,
        balance: account.balance,
        expiry: account.expiry,
        active: account.is_active(now),
        transactions,
    }))
}

pub async fn trigger_sweep(State(state): State<AdminState>) -> Result<Json<SweepReport>, AdminError> {
    tracing::info!("Manual expiry sweep requested");
    Ok(Json(state.sweeper.sweep_once().await?))
}
