//! 领域实体
//!
//! 地址以 EIP-55 字符串持久化，哈希以 0x 前缀小写十六进制持久化。

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use ethers::types::{Address, H256};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::{
    derivation::{checksum, parse_address},
    error::CoreError,
    transaction_status::TransactionStatus,
};

/// 被管理的地址（对外只暴露公开信息）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ManagedAddress {
    pub id: Uuid,
    pub address: String,
    pub created_at: DateTime<Utc>,
}

/// 私钥（离开作用域自动清零）
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct PrivateKey(Vec<u8>);

impl PrivateKey {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn from_hex(encoded: &str) -> Result<Self, CoreError> {
        let trimmed = encoded.strip_prefix("0x").unwrap_or(encoded);
        let bytes = hex::decode(trimmed)
            .map_err(|e| CoreError::Signing(format!("stored key is not hex: {}", e)))?;
        if bytes.len() != 32 {
            return Err(CoreError::Signing(format!(
                "stored key has {} bytes, expected 32",
                bytes.len()
            )));
        }
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKey([REDACTED])")
    }
}

/// 转账资产
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Asset {
    Eth,
    Erc20(Address),
}

impl Asset {
    pub fn is_native(&self) -> bool {
        matches!(self, Self::Eth)
    }
}

impl FromStr for Asset {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("ETH") {
            return Ok(Self::Eth);
        }
        parse_address(s).map(Self::Erc20)
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Eth => f.write_str("ETH"),
            Self::Erc20(contract) => f.write_str(&checksum(contract)),
        }
    }
}

/// 本系统发起并广播的交易
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PendingTransaction {
    pub id: Uuid,
    pub tx_hash: String,
    pub from_address: String,
    pub to_address: String,
    /// "ETH" 或 ERC-20 合约地址
    pub asset: String,
    /// 人类可读单位
    pub value: String,
    pub status: TransactionStatus,
    pub gas_price_gwei: String,
    pub gas_limit: u64,
    pub nonce: u64,
    /// 回执返回前为空
    pub effective_cost_wei: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 从回执中解码出的一笔转账（人类可读单位）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TransferDetail {
    pub asset: String,
    pub to_address: String,
    pub value: String,
}

/// 一次入账校验的审计记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ValidatedTransaction {
    pub id: Uuid,
    pub tx_hash: String,
    pub asset: String,
    pub to_address: String,
    pub value: String,
    pub is_valid: bool,
    pub confirmations: u64,
    pub created_at: DateTime<Utc>,
}

/// 占位值：校验结果中没有属于我们的转账
pub const NOT_APPLICABLE: &str = "N/A";

/// 统一的交易哈希格式
pub fn hash_hex(hash: &H256) -> String {
    format!("{:#x}", hash)
}

pub fn parse_hash(input: &str) -> Result<H256, CoreError> {
    let hex_part = input
        .strip_prefix("0x")
        .ok_or_else(|| CoreError::InvalidHash(format!("{} is missing 0x prefix", input)))?;
    if hex_part.len() != 64 {
        return Err(CoreError::InvalidHash(format!(
            "{} is not a 32-byte hash",
            input
        )));
    }
    let mut bytes = [0u8; 32];
    hex::decode_to_slice(hex_part, &mut bytes)
        .map_err(|e| CoreError::InvalidHash(format!("{}: {}", input, e)))?;
    Ok(H256::from(bytes))
}
