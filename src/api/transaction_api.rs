//! 交易 API：构建广播、列表、状态刷新

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::{
    api::{respond, response::ApiResult},
    app_state::AppState,
    domain::entities::PendingTransaction,
    service::transaction_builder::TransferRequest,
};

/// 金额为人类可读单位，如 "1.5"
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateTransactionReq {
    pub from_address: Option<String>,
    pub to_address: Option<String>,
    /// "ETH" 或 ERC-20 合约地址
    pub asset: Option<String>,
    pub value: Option<String>,
}

impl From<CreateTransactionReq> for TransferRequest {
    fn from(req: CreateTransactionReq) -> Self {
        Self {
            from_address: req.from_address.unwrap_or_default(),
            to_address: req.to_address.unwrap_or_default(),
            asset: req.asset.unwrap_or_default(),
            value: req.value.unwrap_or_default(),
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/transactions",
    request_body = CreateTransactionReq,
    responses(
        (status = 200, description = "Transaction broadcast and recorded", body = PendingTransaction),
        (status = 400, description = "Invalid input or insufficient funds", body = crate::error_body::ErrorBodyDoc),
        (status = 404, description = "Sender is not a managed address", body = crate::error_body::ErrorBodyDoc),
        (status = 502, description = "Broadcast rejected", body = crate::error_body::ErrorBodyDoc),
        (status = 504, description = "Chain gateway timeout", body = crate::error_body::ErrorBodyDoc)
    ),
    tag = "transactions"
)]
pub async fn create_transaction(
    State(st): State<Arc<AppState>>,
    trace_id: Option<Extension<String>>,
    Json(req): Json<CreateTransactionReq>,
) -> ApiResult<PendingTransaction> {
    let request = TransferRequest::from(req);
    respond(
        "create_transaction",
        trace_id,
        st.builder.build(&request).await,
    )
}

#[utoipa::path(
    get,
    path = "/api/transactions",
    responses(
        (status = 200, description = "All transactions created by this service", body = [PendingTransaction])
    ),
    tag = "transactions"
)]
pub async fn list_transactions(
    State(st): State<Arc<AppState>>,
    trace_id: Option<Extension<String>>,
) -> ApiResult<Vec<PendingTransaction>> {
    let result = st
        .repositories
        .pending
        .find_all()
        .await
        .map_err(Into::into);
    respond("list_transactions", trace_id, result)
}

#[utoipa::path(
    patch,
    path = "/api/transactions/{tx_hash}",
    params(
        ("tx_hash" = String, Path, description = "0x-prefixed transaction hash")
    ),
    responses(
        (status = 200, description = "Refreshed transaction", body = PendingTransaction),
        (status = 400, description = "Malformed hash", body = crate::error_body::ErrorBodyDoc),
        (status = 404, description = "Transaction not created by this service", body = crate::error_body::ErrorBodyDoc)
    ),
    tag = "transactions"
)]
pub async fn refresh_transaction(
    State(st): State<Arc<AppState>>,
    trace_id: Option<Extension<String>>,
    Path(tx_hash): Path<String>,
) -> ApiResult<PendingTransaction> {
    respond(
        "refresh_transaction",
        trace_id,
        st.tracker.refresh_status(&tx_hash).await,
    )
}
