// 托管地址数据访问 Repository

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::entities::{ManagedAddress, PrivateKey};

// ============ Repository Trait ============

#[async_trait]
pub trait AddressRepository: Send + Sync {
    /// 原子保存一批地址及其私钥：任一条失败则整批不落库
    async fn save_batch(&self, batch: &[(ManagedAddress, PrivateKey)]) -> Result<()>;

    /// 按创建时间列出全部地址（不含私钥）
    async fn find_all(&self) -> Result<Vec<ManagedAddress>>;

    /// 按校验和地址查询私钥，仅供签名路径使用
    async fn find_private_key(&self, address: &str) -> Result<Option<PrivateKey>>;
}

// ============ PostgreSQL 实现 ============

pub struct PgAddressRepository {
    pool: PgPool,
}

impl PgAddressRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct AddressRow {
    id: Uuid,
    address: String,
    created_at: DateTime<Utc>,
}

impl From<AddressRow> for ManagedAddress {
    fn from(row: AddressRow) -> Self {
        Self {
            id: row.id,
            address: row.address,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl AddressRepository for PgAddressRepository {
    async fn save_batch(&self, batch: &[(ManagedAddress, PrivateKey)]) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin address batch transaction")?;

        for (address, private_key) in batch {
            sqlx::query(
                r#"
                INSERT INTO managed_addresses (id, address, private_key, created_at)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(address.id)
            .bind(&address.address)
            .bind(private_key.to_hex())
            .bind(address.created_at)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to insert managed address {}", address.address))?;
        }

        tx.commit()
            .await
            .context("Failed to commit address batch")?;
        Ok(())
    }

    async fn find_all(&self) -> Result<Vec<ManagedAddress>> {
        let rows = sqlx::query_as::<_, AddressRow>(
            r#"
            SELECT id, address, created_at
            FROM managed_addresses
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list managed addresses")?;

        Ok(rows.into_iter().map(ManagedAddress::from).collect())
    }

    async fn find_private_key(&self, address: &str) -> Result<Option<PrivateKey>> {
        let encoded: Option<String> = sqlx::query_scalar(
            "SELECT private_key FROM managed_addresses WHERE address = $1",
        )
        .bind(address)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to query private key")?;

        encoded
            .map(|hex| PrivateKey::from_hex(&hex).map_err(anyhow::Error::from))
            .transpose()
    }
}
