//! 进程内 Repository 实现
//! 用于 `database.backend = "memory"` 及测试

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{
    address_repository::AddressRepository,
    pending_transaction_repository::{PendingCursor, PendingTransactionRepository},
    validated_transaction_repository::ValidatedTransactionRepository,
};
use crate::domain::{
    entities::{ManagedAddress, PendingTransaction, PrivateKey, ValidatedTransaction},
    transaction_status::TransactionStatus,
};

#[derive(Default)]
pub struct MemoryAddressRepository {
    rows: RwLock<Vec<(ManagedAddress, PrivateKey)>>,
}

impl MemoryAddressRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AddressRepository for MemoryAddressRepository {
    async fn save_batch(&self, batch: &[(ManagedAddress, PrivateKey)]) -> Result<()> {
        let mut rows = self.rows.write().await;
        for (i, (address, _)) in batch.iter().enumerate() {
            let duplicate = rows.iter().any(|(a, _)| a.address == address.address)
                || batch[..i].iter().any(|(a, _)| a.address == address.address);
            anyhow::ensure!(!duplicate, "Address {} already exists", address.address);
        }
        rows.extend(batch.iter().cloned());
        Ok(())
    }

    async fn find_all(&self) -> Result<Vec<ManagedAddress>> {
        Ok(self.rows.read().await.iter().map(|(a, _)| a.clone()).collect())
    }

    async fn find_private_key(&self, address: &str) -> Result<Option<PrivateKey>> {
        Ok(self
            .rows
            .read()
            .await
            .iter()
            .find(|(a, _)| a.address == address)
            .map(|(_, key)| key.clone()))
    }
}

#[derive(Default)]
pub struct MemoryPendingTransactionRepository {
    rows: RwLock<Vec<PendingTransaction>>,
}

impl MemoryPendingTransactionRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PendingTransactionRepository for MemoryPendingTransactionRepository {
    async fn save(&self, tx: &PendingTransaction) -> Result<()> {
        let mut rows = self.rows.write().await;
        anyhow::ensure!(
            !rows.iter().any(|r| r.tx_hash == tx.tx_hash),
            "Transaction {} already recorded",
            tx.tx_hash
        );
        rows.push(tx.clone());
        Ok(())
    }

    async fn find_all(&self) -> Result<Vec<PendingTransaction>> {
        Ok(self.rows.read().await.clone())
    }

    async fn find_by_hash(&self, tx_hash: &str) -> Result<Option<PendingTransaction>> {
        Ok(self
            .rows
            .read()
            .await
            .iter()
            .find(|r| r.tx_hash == tx_hash)
            .cloned())
    }

    async fn find_pending(
        &self,
        after: Option<PendingCursor>,
        limit: i64,
    ) -> Result<Vec<PendingTransaction>> {
        let mut pending: Vec<_> = self
            .rows
            .read()
            .await
            .iter()
            .filter(|r| r.status == TransactionStatus::Pending)
            .filter(|r| after.map_or(true, |cursor| (r.created_at, r.id) > cursor))
            .cloned()
            .collect();
        pending.sort_by_key(|r| (r.created_at, r.id));
        pending.truncate(limit.max(0) as usize);
        Ok(pending)
    }

    async fn settle(
        &self,
        tx_hash: &str,
        status: TransactionStatus,
        effective_cost_wei: Option<String>,
    ) -> Result<bool> {
        anyhow::ensure!(
            TransactionStatus::Pending.can_transition_to(&status),
            "Cannot settle {} into non-terminal status {}",
            tx_hash,
            status
        );

        let mut rows = self.rows.write().await;
        match rows
            .iter_mut()
            .find(|r| r.tx_hash == tx_hash && r.status == TransactionStatus::Pending)
        {
            Some(row) => {
                row.status = status;
                row.effective_cost_wei = effective_cost_wei;
                row.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[derive(Default)]
pub struct MemoryValidatedTransactionRepository {
    rows: RwLock<Vec<ValidatedTransaction>>,
}

impl MemoryValidatedTransactionRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ValidatedTransactionRepository for MemoryValidatedTransactionRepository {
    async fn save(&self, record: &ValidatedTransaction) -> Result<()> {
        self.rows.write().await.push(record.clone());
        Ok(())
    }

    async fn find_all(&self) -> Result<Vec<ValidatedTransaction>> {
        Ok(self.rows.read().await.clone())
    }

    async fn find_by_hash(&self, tx_hash: &str) -> Result<Vec<ValidatedTransaction>> {
        Ok(self
            .rows
            .read()
            .await
            .iter()
            .filter(|r| r.tx_hash == tx_hash)
            .cloned()
            .collect())
    }
}
