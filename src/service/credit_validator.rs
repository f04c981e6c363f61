//! 入账校验
//!
//! 判断任意交易哈希是否是"可安全入账"的转入：
//! 回执成功、确认数达标、且至少一笔转账的收款方是我们的地址。
//!
//! 结论是校验当时的快照，每次调用都重新读取链上状态并追加一条审计记录。
//! 被重组移除的日志在解码时丢弃；调用方应在真正入账前再次校验，不缓存旧结论。

use std::{collections::HashSet, sync::Arc};

use chrono::Utc;
use ethers::types::{Address, U64};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    domain::{
        derivation::checksum,
        entities::{hash_hex, parse_hash, TransferDetail, ValidatedTransaction, NOT_APPLICABLE},
        error::CoreError,
        transfer_codec::decode_transfers,
        units::from_base_units,
    },
    metrics,
    repository::ValidatedTransactionRepository,
    service::{address_book::AddressBook, chain_gateway::ChainGateway, token_service::TokenService},
};

/// 默认最低确认数
pub const DEFAULT_MIN_CONFIRMATIONS: u64 = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ChainTxStatus {
    Success,
    Failed,
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct CreditVerdict {
    pub tx_hash: String,
    pub is_valid_and_safe_for_credit: bool,
    /// 仅包含收款方属于我们的转账
    pub transfers: Vec<TransferDetail>,
    pub confirmations: u64,
    pub tx_status: ChainTxStatus,
}

pub struct CreditValidator {
    gateway: Arc<dyn ChainGateway>,
    tokens: Arc<TokenService>,
    address_book: Arc<AddressBook>,
    repo: Arc<dyn ValidatedTransactionRepository>,
    default_min_confirmations: u64,
}

impl CreditValidator {
    pub fn new(
        gateway: Arc<dyn ChainGateway>,
        tokens: Arc<TokenService>,
        address_book: Arc<AddressBook>,
        repo: Arc<dyn ValidatedTransactionRepository>,
        default_min_confirmations: u64,
    ) -> Self {
        Self {
            gateway,
            tokens,
            address_book,
            repo,
            default_min_confirmations,
        }
    }

    /// 以地址簿中全部地址为"我们的地址"进行校验
    pub async fn validate_for_book(
        &self,
        tx_hash: &str,
        min_confirmations: Option<u64>,
    ) -> Result<CreditVerdict, CoreError> {
        let ours = self.address_book.our_addresses().await?;
        let min = min_confirmations.unwrap_or(self.default_min_confirmations);
        self.validate(tx_hash, &ours, min).await
    }

    pub async fn validate(
        &self,
        tx_hash: &str,
        ours: &HashSet<Address>,
        min_confirmations: u64,
    ) -> Result<CreditVerdict, CoreError> {
        let hash = parse_hash(tx_hash)?;
        let tx_hash = hash_hex(&hash);

        let tx = self.gateway.get_transaction(hash).await?;
        let receipt = self.gateway.get_receipt(hash).await?;

        let verdict = match (tx, receipt) {
            (Some(tx), Some(receipt)) => {
                let current_block = self.gateway.get_block_number().await?;
                let confirmations = receipt
                    .block_number
                    .map(|b| current_block.saturating_sub(b.as_u64()))
                    .unwrap_or(0);
                let success = receipt.status == Some(U64::from(1));

                let mut transfers = Vec::new();
                for decoded in decode_transfers(&tx, &receipt) {
                    if !ours.contains(&decoded.to) {
                        continue;
                    }
                    // 网关错误直接返回，不留下审计记录
                    let decimals = match self.tokens.decimals(&decoded.asset).await {
                        Ok(d) => d,
                        Err(CoreError::UnsupportedToken(token)) => {
                            tracing::warn!(
                                tx_hash = %tx_hash,
                                token = %token,
                                "Skipping transfer from token without usable decimals"
                            );
                            continue;
                        }
                        Err(e) => return Err(e),
                    };
                    transfers.push(TransferDetail {
                        asset: decoded.asset.to_string(),
                        to_address: checksum(&decoded.to),
                        value: from_base_units(decoded.amount, decimals),
                    });
                }

                CreditVerdict {
                    is_valid_and_safe_for_credit: success
                        && confirmations >= min_confirmations
                        && !transfers.is_empty(),
                    tx_hash: tx_hash.clone(),
                    transfers,
                    confirmations,
                    tx_status: if success {
                        ChainTxStatus::Success
                    } else {
                        ChainTxStatus::Failed
                    },
                }
            }
            _ => CreditVerdict {
                tx_hash: tx_hash.clone(),
                is_valid_and_safe_for_credit: false,
                transfers: Vec::new(),
                confirmations: 0,
                tx_status: ChainTxStatus::NotFound,
            },
        };

        self.record(&verdict).await?;
        metrics::record_validation(verdict.is_valid_and_safe_for_credit);

        tracing::info!(
            tx_hash = %tx_hash,
            valid = verdict.is_valid_and_safe_for_credit,
            confirmations = verdict.confirmations,
            min_confirmations,
            transfers = verdict.transfers.len(),
            status = ?verdict.tx_status,
            "Transaction validated"
        );
        Ok(verdict)
    }

    async fn record(&self, verdict: &CreditVerdict) -> Result<(), CoreError> {
        let (asset, to_address, value) = match verdict.transfers.first() {
            Some(t) => (t.asset.clone(), t.to_address.clone(), t.value.clone()),
            None => (
                NOT_APPLICABLE.to_string(),
                NOT_APPLICABLE.to_string(),
                "0".to_string(),
            ),
        };

        let record = ValidatedTransaction {
            id: Uuid::new_v4(),
            tx_hash: verdict.tx_hash.clone(),
            asset,
            to_address,
            value,
            is_valid: verdict.is_valid_and_safe_for_credit,
            confirmations: verdict.confirmations,
            created_at: Utc::now(),
        };
        self.repo.save(&record).await?;
        Ok(())
    }

    pub async fn list(&self) -> Result<Vec<ValidatedTransaction>, CoreError> {
        Ok(self.repo.find_all().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serialization() {
        assert_eq!(
            serde_json::to_string(&ChainTxStatus::NotFound).unwrap(),
            "\"not_found\""
        );
        assert_eq!(
            serde_json::to_string(&ChainTxStatus::Success).unwrap(),
            "\"success\""
        );
    }
}
