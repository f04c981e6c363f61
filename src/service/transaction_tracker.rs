//! 交易状态跟踪
//!
//! 同一哈希的刷新串行执行；终态记录直接返回，不再查询链上。

use std::{collections::HashMap, sync::Arc};

use ethers::types::{TransactionReceipt, U256, U64};
use tokio::sync::Mutex;

use crate::{
    domain::{
        entities::{hash_hex, parse_hash, PendingTransaction},
        error::CoreError,
        transaction_status::TransactionStatus,
        units::gwei_to_wei,
    },
    metrics,
    repository::PendingTransactionRepository,
    service::chain_gateway::ChainGateway,
};

pub struct TransactionTracker {
    gateway: Arc<dyn ChainGateway>,
    repo: Arc<dyn PendingTransactionRepository>,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl TransactionTracker {
    pub fn new(
        gateway: Arc<dyn ChainGateway>,
        repo: Arc<dyn PendingTransactionRepository>,
    ) -> Self {
        Self {
            gateway,
            repo,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// 刷新交易状态，返回最新记录
    pub async fn refresh_status(&self, tx_hash: &str) -> Result<PendingTransaction, CoreError> {
        let hash = parse_hash(tx_hash)?;
        let key = hash_hex(&hash);

        let slot = {
            let mut locks = self.locks.lock().await;
            locks.entry(key.clone()).or_default().clone()
        };
        let result = {
            let _serialized = slot.lock().await;
            self.refresh_locked(&key, hash).await
        };

        // 没有其他等待者时回收锁
        let mut locks = self.locks.lock().await;
        if Arc::strong_count(&slot) == 2 {
            locks.remove(&key);
        }

        result
    }

    async fn refresh_locked(
        &self,
        key: &str,
        hash: ethers::types::H256,
    ) -> Result<PendingTransaction, CoreError> {
        let record = self
            .repo
            .find_by_hash(key)
            .await?
            .ok_or_else(|| CoreError::TransactionNotFound(key.to_string()))?;

        if record.status.is_final() {
            return Ok(record);
        }

        let Some(receipt) = self.gateway.get_receipt(hash).await? else {
            tracing::debug!(tx_hash = %key, "No receipt yet, transaction still pending");
            return Ok(record);
        };

        let status = if receipt.status == Some(U64::from(1)) {
            TransactionStatus::Confirmed
        } else {
            TransactionStatus::Failed
        };
        let cost = effective_cost_wei(&receipt, &record);

        let settled = self
            .repo
            .settle(key, status, cost.map(|c| c.to_string()))
            .await?;
        if settled {
            metrics::record_settled(status == TransactionStatus::Confirmed);
            tracing::info!(
                tx_hash = %key,
                status = %status,
                block = ?receipt.block_number,
                "Transaction settled"
            );
        } else {
            tracing::debug!(tx_hash = %key, "Transaction already settled by another writer");
        }

        self.repo
            .find_by_hash(key)
            .await?
            .ok_or_else(|| CoreError::TransactionNotFound(key.to_string()))
    }
}

/// gasUsed × effectiveGasPrice；节点未返回 effectiveGasPrice 时用记录的报价
fn effective_cost_wei(receipt: &TransactionReceipt, record: &PendingTransaction) -> Option<U256> {
    let gas_used = receipt.gas_used?;
    let price = match receipt.effective_gas_price {
        Some(price) => price,
        None => gwei_to_wei(&record.gas_price_gwei).ok()?,
    };
    gas_used.checked_mul(price)
}
