// 已广播交易数据访问 Repository

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{entities::PendingTransaction, transaction_status::TransactionStatus};

/// pending 分页游标：上一页最后一条记录的 (created_at, id)
pub type PendingCursor = (DateTime<Utc>, Uuid);

// ============ Repository Trait ============

#[async_trait]
pub trait PendingTransactionRepository: Send + Sync {
    /// 创建新交易记录
    async fn save(&self, tx: &PendingTransaction) -> Result<()>;

    /// 按创建时间列出全部交易
    async fn find_all(&self) -> Result<Vec<PendingTransaction>>;

    /// 根据交易哈希查询
    async fn find_by_hash(&self, tx_hash: &str) -> Result<Option<PendingTransaction>>;

    /// 按 (created_at, id) 升序分页列出 pending 交易，`after` 为上一页游标
    async fn find_pending(
        &self,
        after: Option<PendingCursor>,
        limit: i64,
    ) -> Result<Vec<PendingTransaction>>;

    /// 条件更新：仅当当前状态为 pending 时写入终态
    ///
    /// 返回 false 表示记录已被其他写入者终结，本次未修改。
    async fn settle(
        &self,
        tx_hash: &str,
        status: TransactionStatus,
        effective_cost_wei: Option<String>,
    ) -> Result<bool>;
}

// ============ PostgreSQL 实现 ============

pub struct PgPendingTransactionRepository {
    pool: PgPool,
}

impl PgPendingTransactionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct PendingTransactionRow {
    id: Uuid,
    tx_hash: String,
    from_address: String,
    to_address: String,
    asset: String,
    value: String,
    status: String,
    gas_price_gwei: String,
    gas_limit: i64,
    nonce: i64,
    effective_cost_wei: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PendingTransactionRow> for PendingTransaction {
    type Error = anyhow::Error;

    fn try_from(row: PendingTransactionRow) -> Result<Self> {
        Ok(Self {
            id: row.id,
            status: row
                .status
                .parse()
                .with_context(|| format!("Corrupt status for {}", row.tx_hash))?,
            tx_hash: row.tx_hash,
            from_address: row.from_address,
            to_address: row.to_address,
            asset: row.asset,
            value: row.value,
            gas_price_gwei: row.gas_price_gwei,
            gas_limit: u64::try_from(row.gas_limit).context("Negative gas_limit")?,
            nonce: u64::try_from(row.nonce).context("Negative nonce")?,
            effective_cost_wei: row.effective_cost_wei,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const SELECT_COLUMNS: &str = r#"
    SELECT id, tx_hash, from_address, to_address, asset, value, status,
           gas_price_gwei, gas_limit, nonce, effective_cost_wei, created_at, updated_at
    FROM pending_transactions
"#;

#[async_trait]
impl PendingTransactionRepository for PgPendingTransactionRepository {
    async fn save(&self, tx: &PendingTransaction) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO pending_transactions (
                id, tx_hash, from_address, to_address, asset, value, status,
                gas_price_gwei, gas_limit, nonce, effective_cost_wei, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(tx.id)
        .bind(&tx.tx_hash)
        .bind(&tx.from_address)
        .bind(&tx.to_address)
        .bind(&tx.asset)
        .bind(&tx.value)
        .bind(tx.status.to_db_string())
        .bind(&tx.gas_price_gwei)
        .bind(i64::try_from(tx.gas_limit).context("gas_limit out of range")?)
        .bind(i64::try_from(tx.nonce).context("nonce out of range")?)
        .bind(&tx.effective_cost_wei)
        .bind(tx.created_at)
        .bind(tx.updated_at)
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to insert pending transaction {}", tx.tx_hash))?;

        Ok(())
    }

    async fn find_all(&self) -> Result<Vec<PendingTransaction>> {
        let sql = format!("{} ORDER BY created_at ASC, id ASC", SELECT_COLUMNS);
        let rows = sqlx::query_as::<_, PendingTransactionRow>(&sql)
            .fetch_all(&self.pool)
            .await
            .context("Failed to list pending transactions")?;

        rows.into_iter().map(PendingTransaction::try_from).collect()
    }

    async fn find_by_hash(&self, tx_hash: &str) -> Result<Option<PendingTransaction>> {
        let sql = format!("{} WHERE tx_hash = $1", SELECT_COLUMNS);
        let row = sqlx::query_as::<_, PendingTransactionRow>(&sql)
            .bind(tx_hash)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("Failed to query transaction {}", tx_hash))?;

        row.map(PendingTransaction::try_from).transpose()
    }

    async fn find_pending(
        &self,
        after: Option<PendingCursor>,
        limit: i64,
    ) -> Result<Vec<PendingTransaction>> {
        let sql = format!(
            r#"{}
            WHERE status = 'pending'
              AND ($1::timestamptz IS NULL OR (created_at, id) > ($1, $2::uuid))
            ORDER BY created_at ASC, id ASC
            LIMIT $3"#,
            SELECT_COLUMNS
        );
        let rows = sqlx::query_as::<_, PendingTransactionRow>(&sql)
            .bind(after.map(|(created_at, _)| created_at))
            .bind(after.map(|(_, id)| id))
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .context("Failed to query pending transactions")?;

        rows.into_iter().map(PendingTransaction::try_from).collect()
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

        let result = sqlx::query(
            r#"
            UPDATE pending_transactions
            SET status = $2, effective_cost_wei = $3, updated_at = CURRENT_TIMESTAMP
            WHERE tx_hash = $1 AND status = 'pending'
            "#,
        )
        .bind(tx_hash)
        .bind(status.to_db_string())
        .bind(effective_cost_wei)
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to settle transaction {}", tx_hash))?;

        Ok(result.rows_affected() == 1)
    }
}
