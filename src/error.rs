use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::domain::error::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppErrorCode {
    // HTTP 基础错误码
    BadRequest,
    NotFound,
    Timeout,
    Internal,

    // 业务错误码
    InvalidAmount,
    InvalidAddress,
    InvalidCount,
    InvalidHash,
    MissingField,
    UnknownSenderKey,
    TransactionNotFound,
    InsufficientBalance,
    UnsupportedToken,
    BroadcastFailed,
    RpcError,
    DatabaseError,
}

impl AppErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppErrorCode::BadRequest => "bad_request",
            AppErrorCode::NotFound => "not_found",
            AppErrorCode::Timeout => "timeout",
            AppErrorCode::Internal => "internal",

            AppErrorCode::InvalidAmount => "invalid_amount",
            AppErrorCode::InvalidAddress => "invalid_address",
            AppErrorCode::InvalidCount => "invalid_count",
            AppErrorCode::InvalidHash => "invalid_hash",
            AppErrorCode::MissingField => "missing_field",
            AppErrorCode::UnknownSenderKey => "unknown_sender_key",
            AppErrorCode::TransactionNotFound => "transaction_not_found",
            AppErrorCode::InsufficientBalance => "insufficient_balance",
            AppErrorCode::UnsupportedToken => "unsupported_token",
            AppErrorCode::BroadcastFailed => "broadcast_failed",
            AppErrorCode::RpcError => "rpc_error",
            AppErrorCode::DatabaseError => "database_error",
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppError {
    pub code: AppErrorCode,
    pub message: String,
    pub status: StatusCode,
    pub trace_id: Option<String>,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    code: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    trace_id: Option<&'a str>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            code: self.code.as_str(),
            message: &self.message,
            trace_id: self.trace_id.as_deref(),
        };
        (self.status, Json(body)).into_response()
    }
}

impl AppError {
    fn new(code: AppErrorCode, status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            code,
            message: msg.into(),
            status,
            trace_id: None,
        }
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(AppErrorCode::BadRequest, StatusCode::BAD_REQUEST, msg)
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(AppErrorCode::NotFound, StatusCode::NOT_FOUND, msg)
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(
            AppErrorCode::Internal,
            StatusCode::INTERNAL_SERVER_ERROR,
            msg,
        )
    }

    /// 设置追踪ID
    pub fn with_trace_id(mut self, trace_id: String) -> Self {
        self.trace_id = Some(trace_id);
        self
    }

    pub fn rpc_error(msg: impl Into<String>) -> Self {
        Self::new(AppErrorCode::RpcError, StatusCode::BAD_GATEWAY, msg)
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::new(AppErrorCode::Timeout, StatusCode::GATEWAY_TIMEOUT, msg)
    }
}

// 从领域错误转换
// 网关与存储错误只返回概括信息，细节留在日志里
impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        use AppErrorCode as C;

        let message = err.to_string();
        match err {
            CoreError::InvalidAmount(_) => {
                Self::new(C::InvalidAmount, StatusCode::BAD_REQUEST, message)
            }
            CoreError::InvalidAddress(_) => {
                Self::new(C::InvalidAddress, StatusCode::BAD_REQUEST, message)
            }
            CoreError::InvalidCount(_) => {
                Self::new(C::InvalidCount, StatusCode::BAD_REQUEST, message)
            }
            CoreError::MissingField(_) => {
                Self::new(C::MissingField, StatusCode::BAD_REQUEST, message)
            }
            CoreError::InvalidHash(_) => {
                Self::new(C::InvalidHash, StatusCode::BAD_REQUEST, message)
            }
            CoreError::UnknownSenderKey(_) => {
                Self::new(C::UnknownSenderKey, StatusCode::NOT_FOUND, message)
            }
            CoreError::TransactionNotFound(_) => {
                Self::new(C::TransactionNotFound, StatusCode::NOT_FOUND, message)
            }
            CoreError::InsufficientFunds(_) => Self::new(
                C::InsufficientBalance,
                StatusCode::BAD_REQUEST,
                "insufficient funds for value and gas",
            ),
            CoreError::UnsupportedToken(_) => {
                Self::new(C::UnsupportedToken, StatusCode::BAD_REQUEST, message)
            }
            CoreError::BroadcastFailure(_) => Self::new(
                C::BroadcastFailed,
                StatusCode::BAD_GATEWAY,
                "the node rejected the transaction",
            ),
            CoreError::GatewayTimeout(op) => {
                Self::timeout(format!("chain gateway timed out during `{}`", op))
            }
            CoreError::Gateway(_) => Self::rpc_error("chain gateway unavailable"),
            CoreError::Signing(_) => Self::internal("transaction signing failed"),
            CoreError::Storage(_) => Self::new(
                C::DatabaseError,
                StatusCode::INTERNAL_SERVER_ERROR,
                "storage unavailable",
            ),
        }
    }
}

// 从 anyhow 错误转换
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        tracing::error!(error = ?err, "Unhandled internal error");
        Self::internal("internal error")
    }
}
