//! 入账校验 API

use std::sync::Arc;

use axum::{extract::State, Extension, Json};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::{
    api::{respond, response::ApiResult},
    app_state::AppState,
    domain::{entities::ValidatedTransaction, error::CoreError},
    service::credit_validator::CreditVerdict,
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct ValidateTransactionReq {
    pub tx_hash: Option<String>,
    /// 缺省使用配置中的最低确认数
    pub min_confirmations: Option<u64>,
}

#[utoipa::path(
    post,
    path = "/api/validations",
    request_body = ValidateTransactionReq,
    responses(
        (status = 200, description = "Credit verdict", body = CreditVerdict),
        (status = 400, description = "Malformed hash", body = crate::error_body::ErrorBodyDoc),
        (status = 504, description = "Chain gateway timeout", body = crate::error_body::ErrorBodyDoc)
    ),
    tag = "validations"
)]
pub async fn validate_transaction(
    State(st): State<Arc<AppState>>,
    trace_id: Option<Extension<String>>,
    Json(req): Json<ValidateTransactionReq>,
) -> ApiResult<CreditVerdict> {
    let result = match req.tx_hash.as_deref().map(str::trim) {
        Some(hash) if !hash.is_empty() => {
            st.validator
                .validate_for_book(hash, req.min_confirmations)
                .await
        }
        _ => Err(CoreError::MissingField("tx_hash")),
    };
    respond("validate_transaction", trace_id, result)
}

#[utoipa::path(
    get,
    path = "/api/validations",
    responses(
        (status = 200, description = "Validation audit log", body = [ValidatedTransaction])
    ),
    tag = "validations"
)]
pub async fn list_validations(
    State(st): State<Arc<AppState>>,
    trace_id: Option<Extension<String>>,
) -> ApiResult<Vec<ValidatedTransaction>> {
    respond("list_validations", trace_id, st.validator.list().await)
}
