//! 核心领域错误
//!
//! 三类错误：输入校验错误、领域状态错误、链网关错误。
//! HTTP 层通过 `From<CoreError> for AppError` 统一映射。

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    // ============ 输入校验错误 ============
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid count {0}: must be between 1 and {max}", max = crate::service::address_book::MAX_BATCH_SIZE)]
    InvalidCount(i64),

    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error("invalid transaction hash: {0}")]
    InvalidHash(String),

    // ============ 领域状态错误 ============
    #[error("no key material stored for sender {0}")]
    UnknownSenderKey(String),

    #[error("transaction {0} was not created by this service")]
    TransactionNotFound(String),

    #[error("insufficient funds: {0}")]
    InsufficientFunds(String),

    #[error("token contract {0} does not expose decimals()")]
    UnsupportedToken(String),

    // ============ 网关错误 ============
    #[error("broadcast rejected: {0}")]
    BroadcastFailure(String),

    #[error("chain gateway timed out during `{0}`")]
    GatewayTimeout(&'static str),

    #[error("chain gateway error: {0}")]
    Gateway(String),

    // ============ 内部错误 ============
    #[error("signing failed: {0}")]
    Signing(String),

    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl CoreError {
    /// 调用方可以安全重试的错误（仅限读操作语义）
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::GatewayTimeout(_) | Self::Gateway(_))
    }

    /// 客户端输入错误，不产生任何副作用
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidAmount(_)
                | Self::InvalidAddress(_)
                | Self::InvalidCount(_)
                | Self::MissingField(_)
                | Self::InvalidHash(_)
        )
    }
}
