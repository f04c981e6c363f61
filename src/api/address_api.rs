//! 托管地址 API

use std::sync::Arc;

use axum::{extract::State, Extension, Json};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::{
    api::{respond, response::ApiResult},
    app_state::AppState,
    domain::{entities::ManagedAddress, error::CoreError},
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateAddressesReq {
    /// 1..=1000
    pub count: Option<i64>,
}

#[utoipa::path(
    post,
    path = "/api/addresses",
    request_body = CreateAddressesReq,
    responses(
        (status = 200, description = "Addresses generated", body = [ManagedAddress]),
        (status = 400, description = "Invalid count", body = crate::error_body::ErrorBodyDoc)
    ),
    tag = "addresses"
)]
pub async fn create_addresses(
    State(st): State<Arc<AppState>>,
    trace_id: Option<Extension<String>>,
    Json(req): Json<CreateAddressesReq>,
) -> ApiResult<Vec<ManagedAddress>> {
    let result = match req.count {
        Some(count) => st.address_book.generate(count).await,
        None => Err(CoreError::MissingField("count")),
    };
    respond("create_addresses", trace_id, result)
}

#[utoipa::path(
    get,
    path = "/api/addresses",
    responses(
        (status = 200, description = "All managed addresses", body = [ManagedAddress])
    ),
    tag = "addresses"
)]
pub async fn list_addresses(
    State(st): State<Arc<AppState>>,
    trace_id: Option<Extension<String>>,
) -> ApiResult<Vec<ManagedAddress>> {
    respond("list_addresses", trace_id, st.address_book.list().await)
}
