//! 地址簿：生成并登记托管地址
//!
//! 私钥只写入 Repository，返回值与日志中只出现公开地址。

use std::{collections::HashSet, sync::Arc};

use chrono::Utc;
use ethers::types::Address;
use uuid::Uuid;

use crate::{
    domain::{
        derivation::{address_from_public_key, checksum, parse_address},
        entities::{ManagedAddress, PrivateKey},
        error::CoreError,
    },
    repository::AddressRepository,
    service::key_generator::KeyGenerator,
};

/// 单次批量生成上限
pub const MAX_BATCH_SIZE: i64 = 1000;

pub struct AddressBook {
    repo: Arc<dyn AddressRepository>,
    key_generator: Arc<dyn KeyGenerator>,
}

impl AddressBook {
    pub fn new(repo: Arc<dyn AddressRepository>, key_generator: Arc<dyn KeyGenerator>) -> Self {
        Self {
            repo,
            key_generator,
        }
    }

    /// 生成 `count` 个新地址
    pub async fn generate(&self, count: i64) -> Result<Vec<ManagedAddress>, CoreError> {
        if !(1..=MAX_BATCH_SIZE).contains(&count) {
            return Err(CoreError::InvalidCount(count));
        }

        let mut batch = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let pair = self.key_generator.generate_key_pair()?;
            let address = address_from_public_key(&pair.public_key)?;

            let record = ManagedAddress {
                id: Uuid::new_v4(),
                address: checksum(&address),
                created_at: Utc::now(),
            };
            batch.push((record, pair.private_key));
        }

        // 整批落库，失败时不留下部分地址
        self.repo.save_batch(&batch).await?;

        let created: Vec<ManagedAddress> = batch.into_iter().map(|(record, _)| record).collect();
        tracing::info!(count = created.len(), "Generated managed addresses");
        Ok(created)
    }

    pub async fn list(&self) -> Result<Vec<ManagedAddress>, CoreError> {
        Ok(self.repo.find_all().await?)
    }

    /// 全部托管地址（入账校验用）
    pub async fn our_addresses(&self) -> Result<HashSet<Address>, CoreError> {
        self.repo
            .find_all()
            .await?
            .iter()
            .map(|record| parse_address(&record.address))
            .collect()
    }

    /// 签名路径专用：查询发送方私钥
    pub(crate) async fn signing_key(&self, address: &Address) -> Result<Option<PrivateKey>, CoreError> {
        Ok(self.repo.find_private_key(&checksum(address)).await?)
    }
}
