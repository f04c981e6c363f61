use serde::Serialize;
use utoipa::ToSchema;

/// 错误响应体（仅用于 OpenAPI 文档）
#[derive(Serialize, ToSchema)]
pub struct ErrorBodyDoc {
    /// 稳定错误码，如 `invalid_amount`、`transaction_not_found`
    pub code: String,
    pub message: String,
    pub trace_id: Option<String>,
}
