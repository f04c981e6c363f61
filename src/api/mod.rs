use std::sync::Arc;

use axum::{
    extract::State,
    http::{header::CONTENT_TYPE, HeaderValue, Method},
    middleware::from_fn,
    response::IntoResponse,
    routing::{get, patch, post},
    Extension, Json, Router,
};
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use utoipa::{OpenApi, ToSchema};

use crate::{
    api::{middleware::trace_id_middleware, response::ApiResult},
    app_state::AppState,
    domain::error::CoreError,
    error::AppError,
    infrastructure::log_redact::redact_hex_blobs,
    metrics,
};

pub mod address_api;
pub mod middleware;
pub mod response;
pub mod transaction_api;
pub mod validation_api;

#[derive(OpenApi)]
#[openapi(
    info(title = "ethflow API", description = "Ethereum address and transaction lifecycle"),
    paths(
        address_api::create_addresses,
        address_api::list_addresses,
        transaction_api::create_transaction,
        transaction_api::list_transactions,
        transaction_api::refresh_transaction,
        validation_api::validate_transaction,
        validation_api::list_validations,
        healthz
    ),
    components(
        schemas(
            address_api::CreateAddressesReq,
            transaction_api::CreateTransactionReq,
            validation_api::ValidateTransactionReq,
            crate::domain::entities::ManagedAddress,
            crate::domain::entities::PendingTransaction,
            crate::domain::entities::TransferDetail,
            crate::domain::entities::ValidatedTransaction,
            crate::domain::transaction_status::TransactionStatus,
            crate::service::credit_validator::CreditVerdict,
            crate::service::credit_validator::ChainTxStatus,
            Healthz,
            crate::error_body::ErrorBodyDoc
        )
    ),
    tags(
        (name = "addresses", description = "托管地址"),
        (name = "transactions", description = "交易构建与状态跟踪"),
        (name = "validations", description = "入账校验")
    )
)]
pub struct ApiDoc;

pub fn routes(state: Arc<AppState>) -> Router {
    let monitoring = &state.config.monitoring;

    let mut router = Router::new()
        .route(
            "/api/addresses",
            post(address_api::create_addresses).get(address_api::list_addresses),
        )
        .route(
            "/api/transactions",
            post(transaction_api::create_transaction).get(transaction_api::list_transactions),
        )
        .route(
            "/api/transactions/:tx_hash",
            patch(transaction_api::refresh_transaction),
        )
        .route(
            "/api/validations",
            post(validation_api::validate_transaction).get(validation_api::list_validations),
        )
        .route("/api/openapi.json", get(openapi_json));

    if monitoring.enable_health_check {
        router = router.route("/healthz", get(healthz));
    }
    if monitoring.enable_prometheus {
        router = router.route(
            "/metrics",
            get(|| async {
                (
                    [(CONTENT_TYPE, "text/plain; version=0.0.4")],
                    metrics::render_prometheus(),
                )
                    .into_response()
            }),
        );
    }

    let cors = cors_layer(state.config.server.cors_origin.as_deref());

    router
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(from_fn(trace_id_middleware))
                .layer(cors),
        )
        .with_state(state)
}

fn cors_layer(origin: Option<&str>) -> CorsLayer {
    let allow_origin = match origin.and_then(|o| HeaderValue::from_str(o).ok()) {
        Some(value) => AllowOrigin::exact(value),
        None => AllowOrigin::any(),
    };
    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::PATCH])
        .allow_headers(Any)
}

/// 将服务结果转换为统一响应，并记录接口计数
///
/// 非输入类错误会以告警级别写日志，十六进制长串先脱敏。
pub(crate) fn respond<T: Serialize>(
    endpoint: &'static str,
    trace_id: Option<Extension<String>>,
    result: Result<T, CoreError>,
) -> ApiResult<T> {
    match result {
        Ok(data) => {
            metrics::count_ok(endpoint);
            response::success_response(data)
        }
        Err(e) => {
            metrics::count_err(endpoint);
            let trace_id = trace_id.map(|Extension(id)| id);
            let detail = redact_hex_blobs(&e.to_string());
            if e.is_validation() {
                tracing::debug!(endpoint, trace_id = ?trace_id, error = %detail, "Request rejected");
            } else {
                tracing::warn!(
                    endpoint,
                    trace_id = ?trace_id,
                    error = %detail,
                    retryable = e.is_retryable(),
                    "Request failed"
                );
            }

            let err = AppError::from(e);
            Err(match trace_id {
                Some(id) => err.with_trace_id(id),
                None => err,
            })
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Healthz {
    pub status: String,
    /// 内存后端时为空
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db_ok: Option<bool>,
    pub rpc_ok: bool,
    pub version: String,
}

#[utoipa::path(
    get,
    path = "/healthz",
    responses((status = 200, description = "Service health", body = Healthz))
)]
pub async fn healthz(State(st): State<Arc<AppState>>) -> ApiResult<Healthz> {
    let db_ok = match &st.repositories.pool {
        Some(pool) => Some(crate::infrastructure::db::health_check(pool).await.is_ok()),
        None => None,
    };
    // 上游 RPC 轻探活
    let rpc_ok = st
        .gateway
        .get_block_number()
        .await
        .map(|h| h > 0)
        .unwrap_or(false);

    let status = if db_ok.unwrap_or(true) && rpc_ok {
        "ok"
    } else {
        "degraded"
    };
    response::success_response(Healthz {
        status: status.to_string(),
        db_ok,
        rpc_ok,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
