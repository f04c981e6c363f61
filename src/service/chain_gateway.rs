//! 链网关
//!
//! `ChainGateway` 是核心与以太坊节点之间唯一的边界：
//! - `EthersGateway`：基于 ethers `Provider<Http>` 的 JSON-RPC 实现
//! - `BoundedGateway`：为任意实现加上统一的调用超时与上游指标

use std::{future::Future, sync::Arc, time::Duration};

use async_trait::async_trait;
use ethers::{
    providers::{Http, Middleware, Provider, ProviderError},
    types::{
        transaction::eip2718::TypedTransaction, Address, BlockNumber, Bytes, Transaction,
        TransactionReceipt, TransactionRequest, H256, U256,
    },
};
use thiserror::Error;

use crate::{domain::error::CoreError, infrastructure::log_redact::redact_hex_blobs, metrics};

#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("gateway call `{0}` timed out")]
    Timeout(&'static str),

    #[error("insufficient funds: {0}")]
    InsufficientFunds(String),

    #[error("rpc error: {0}")]
    Rpc(String),
}

impl From<GatewayError> for CoreError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Timeout(op) => CoreError::GatewayTimeout(op),
            GatewayError::InsufficientFunds(msg) => CoreError::InsufficientFunds(msg),
            GatewayError::Rpc(msg) => CoreError::Gateway(msg),
        }
    }
}

#[async_trait]
pub trait ChainGateway: Send + Sync {
    /// pending 区块视角下的 nonce
    async fn get_nonce(&self, address: Address) -> Result<U256, GatewayError>;

    async fn estimate_gas(&self, tx: &TypedTransaction) -> Result<U256, GatewayError>;

    /// 单位：wei
    async fn get_gas_price(&self) -> Result<U256, GatewayError>;

    async fn submit_raw(&self, raw: Bytes) -> Result<H256, GatewayError>;

    async fn get_transaction(&self, hash: H256) -> Result<Option<Transaction>, GatewayError>;

    async fn get_receipt(&self, hash: H256) -> Result<Option<TransactionReceipt>, GatewayError>;

    async fn get_block_number(&self) -> Result<u64, GatewayError>;

    /// 只读合约调用（eth_call）
    async fn call(&self, contract: Address, data: Bytes) -> Result<Bytes, GatewayError>;
}

// ============ JSON-RPC 实现 ============

pub struct EthersGateway {
    provider: Provider<Http>,
}

impl EthersGateway {
    pub fn new(rpc_url: &str) -> anyhow::Result<Self> {
        let provider = Provider::<Http>::try_from(rpc_url)
            .map_err(|e| anyhow::anyhow!("Invalid RPC url: {}", e))?;
        Ok(Self { provider })
    }
}

/// 节点拒绝余额不足时的错误文本（geth / erigon / nethermind 均包含此片段）
fn is_insufficient_funds(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("insufficient funds") || lower.contains("insufficient balance")
}

fn classify(operation: &'static str, err: ProviderError) -> GatewayError {
    let message = redact_hex_blobs(&err.to_string());
    tracing::warn!(operation, error = %message, "Chain gateway call failed");
    if is_insufficient_funds(&message) {
        GatewayError::InsufficientFunds(message)
    } else {
        GatewayError::Rpc(message)
    }
}

#[async_trait]
impl ChainGateway for EthersGateway {
    async fn get_nonce(&self, address: Address) -> Result<U256, GatewayError> {
        self.provider
            .get_transaction_count(address, Some(BlockNumber::Pending.into()))
            .await
            .map_err(|e| classify("get_nonce", e))
    }

    async fn estimate_gas(&self, tx: &TypedTransaction) -> Result<U256, GatewayError> {
        self.provider
            .estimate_gas(tx, None)
            .await
            .map_err(|e| classify("estimate_gas", e))
    }

    async fn get_gas_price(&self) -> Result<U256, GatewayError> {
        self.provider
            .get_gas_price()
            .await
            .map_err(|e| classify("get_gas_price", e))
    }

    async fn submit_raw(&self, raw: Bytes) -> Result<H256, GatewayError> {
        let pending = self
            .provider
            .send_raw_transaction(raw)
            .await
            .map_err(|e| classify("submit_raw", e))?;
        Ok(pending.tx_hash())
    }

    async fn get_transaction(&self, hash: H256) -> Result<Option<Transaction>, GatewayError> {
        self.provider
            .get_transaction(hash)
            .await
            .map_err(|e| classify("get_transaction", e))
    }

    async fn get_receipt(&self, hash: H256) -> Result<Option<TransactionReceipt>, GatewayError> {
        self.provider
            .get_transaction_receipt(hash)
            .await
            .map_err(|e| classify("get_receipt", e))
    }

    async fn get_block_number(&self) -> Result<u64, GatewayError> {
        self.provider
            .get_block_number()
            .await
            .map(|n| n.as_u64())
            .map_err(|e| classify("get_block_number", e))
    }

    async fn call(&self, contract: Address, data: Bytes) -> Result<Bytes, GatewayError> {
        let tx: TypedTransaction = TransactionRequest::new().to(contract).data(data).into();
        self.provider
            .call(&tx, None)
            .await
            .map_err(|e| classify("call", e))
    }
}

// ============ 超时包装 ============

/// 为每个网关调用加上统一超时，超时返回可重试的 `GatewayError::Timeout`
pub struct BoundedGateway {
    inner: Arc<dyn ChainGateway>,
    timeout: Duration,
}

impl BoundedGateway {
    pub fn new(inner: Arc<dyn ChainGateway>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    async fn bounded<T, F>(&self, operation: &'static str, fut: F) -> Result<T, GatewayError>
    where
        F: Future<Output = Result<T, GatewayError>> + Send,
    {
        let started = std::time::Instant::now();
        let result = match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    operation,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Chain gateway call timed out"
                );
                Err(GatewayError::Timeout(operation))
            }
        };
        metrics::observe_upstream_latency_ms(started.elapsed().as_millis(), result.is_ok());
        result
    }
}

#[async_trait]
impl ChainGateway for BoundedGateway {
    async fn get_nonce(&self, address: Address) -> Result<U256, GatewayError> {
        self.bounded("get_nonce", self.inner.get_nonce(address)).await
    }

    async fn estimate_gas(&self, tx: &TypedTransaction) -> Result<U256, GatewayError> {
        self.bounded("estimate_gas", self.inner.estimate_gas(tx)).await
    }

    async fn get_gas_price(&self) -> Result<U256, GatewayError> {
        self.bounded("get_gas_price", self.inner.get_gas_price()).await
    }

    async fn submit_raw(&self, raw: Bytes) -> Result<H256, GatewayError> {
        self.bounded("submit_raw", self.inner.submit_raw(raw)).await
    }

    async fn get_transaction(&self, hash: H256) -> Result<Option<Transaction>, GatewayError> {
        self.bounded("get_transaction", self.inner.get_transaction(hash))
            .await
    }

    async fn get_receipt(&self, hash: H256) -> Result<Option<TransactionReceipt>, GatewayError> {
        self.bounded("get_receipt", self.inner.get_receipt(hash)).await
    }

    async fn get_block_number(&self) -> Result<u64, GatewayError> {
        self.bounded("get_block_number", self.inner.get_block_number())
            .await
    }

    async fn call(&self, contract: Address, data: Bytes) -> Result<Bytes, GatewayError> {
        self.bounded("call", self.inner.call(contract, data)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SlowGateway {
        delay: Duration,
    }

    #[async_trait]
    impl ChainGateway for SlowGateway {
        async fn get_nonce(&self, _address: Address) -> Result<U256, GatewayError> {
            tokio::time::sleep(self.delay).await;
            Ok(U256::from(7))
        }

        async fn estimate_gas(&self, _tx: &TypedTransaction) -> Result<U256, GatewayError> {
            Err(GatewayError::Rpc("execution reverted".into()))
        }

        async fn get_gas_price(&self) -> Result<U256, GatewayError> {
            Ok(U256::one())
        }

        async fn submit_raw(&self, _raw: Bytes) -> Result<H256, GatewayError> {
            Err(GatewayError::InsufficientFunds("balance 0".into()))
        }

        async fn get_transaction(&self, _hash: H256) -> Result<Option<Transaction>, GatewayError> {
            Ok(None)
        }

        async fn get_receipt(
            &self,
            _hash: H256,
        ) -> Result<Option<TransactionReceipt>, GatewayError> {
            Ok(None)
        }

        async fn get_block_number(&self) -> Result<u64, GatewayError> {
            tokio::time::sleep(self.delay).await;
            Ok(1)
        }

        async fn call(&self, _contract: Address, _data: Bytes) -> Result<Bytes, GatewayError> {
            Ok(Bytes::default())
        }
    }

    #[tokio::test]
    async fn test_bounded_gateway_times_out() {
        let gateway = BoundedGateway::new(
            Arc::new(SlowGateway {
                delay: Duration::from_millis(500),
            }),
            Duration::from_millis(20),
        );

        let err = gateway.get_block_number().await.unwrap_err();
        assert!(matches!(err, GatewayError::Timeout("get_block_number")));

        let core: CoreError = err.into();
        assert!(core.is_retryable());
    }

    #[tokio::test]
    async fn test_bounded_gateway_passes_through() {
        let gateway = BoundedGateway::new(
            Arc::new(SlowGateway {
                delay: Duration::from_millis(1),
            }),
            Duration::from_secs(1),
        );

        assert_eq!(gateway.get_nonce(Address::zero()).await.unwrap(), U256::from(7));
        assert!(matches!(
            gateway.submit_raw(Bytes::default()).await,
            Err(GatewayError::InsufficientFunds(_))
        ));
    }

    #[test]
    fn test_insufficient_funds_detection() {
        assert!(is_insufficient_funds(
            "(code: -32000, message: insufficient funds for gas * price + value, data: None)"
        ));
        assert!(!is_insufficient_funds("nonce too low"));
    }

    #[test]
    fn test_gateway_error_mapping() {
        assert!(matches!(
            CoreError::from(GatewayError::InsufficientFunds("x".into())),
            CoreError::InsufficientFunds(_)
        ));
        assert!(matches!(
            CoreError::from(GatewayError::Rpc("x".into())),
            CoreError::Gateway(_)
        ));
    }
}
