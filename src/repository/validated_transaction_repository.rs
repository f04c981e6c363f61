// 入账校验审计记录 Repository（只追加）

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::entities::ValidatedTransaction;

#[async_trait]
pub trait ValidatedTransactionRepository: Send + Sync {
    async fn save(&self, record: &ValidatedTransaction) -> Result<()>;

    async fn find_all(&self) -> Result<Vec<ValidatedTransaction>>;

    /// 同一哈希的全部校验记录，按时间先后
    async fn find_by_hash(&self, tx_hash: &str) -> Result<Vec<ValidatedTransaction>>;
}

pub struct PgValidatedTransactionRepository {
    pool: PgPool,
}

impl PgValidatedTransactionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ValidatedTransactionRow {
    id: Uuid,
    tx_hash: String,
    asset: String,
    to_address: String,
    value: String,
    is_valid: bool,
    confirmations: i64,
    created_at: DateTime<Utc>,
}

impl From<ValidatedTransactionRow> for ValidatedTransaction {
    fn from(row: ValidatedTransactionRow) -> Self {
        Self {
            id: row.id,
            tx_hash: row.tx_hash,
            asset: row.asset,
            to_address: row.to_address,
            value: row.value,
            is_valid: row.is_valid,
            confirmations: row.confirmations.max(0) as u64,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl ValidatedTransactionRepository for PgValidatedTransactionRepository {
    async fn save(&self, record: &ValidatedTransaction) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO validated_transactions (
                id, tx_hash, asset, to_address, value, is_valid, confirmations, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(record.id)
        .bind(&record.tx_hash)
        .bind(&record.asset)
        .bind(&record.to_address)
        .bind(&record.value)
        .bind(record.is_valid)
        .bind(i64::try_from(record.confirmations).unwrap_or(i64::MAX))
        .bind(record.created_at)
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to insert validation of {}", record.tx_hash))?;

        Ok(())
    }

    async fn find_all(&self) -> Result<Vec<ValidatedTransaction>> {
        let rows = sqlx::query_as::<_, ValidatedTransactionRow>(
            r#"
            SELECT id, tx_hash, asset, to_address, value, is_valid, confirmations, created_at
            FROM validated_transactions
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list validated transactions")?;

        Ok(rows.into_iter().map(ValidatedTransaction::from).collect())
    }

    async fn find_by_hash(&self, tx_hash: &str) -> Result<Vec<ValidatedTransaction>> {
        let rows = sqlx::query_as::<_, ValidatedTransactionRow>(
            r#"
            SELECT id, tx_hash, asset, to_address, value, is_valid, confirmations, created_at
            FROM validated_transactions
            WHERE tx_hash = $1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(tx_hash)
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("Failed to query validations of {}", tx_hash))?;

        Ok(rows.into_iter().map(ValidatedTransaction::from).collect())
    }
}
