//! ERC-20 调用编码与 Transfer 事件解码

use ethers::{
    abi::{self, Token},
    types::{Address, Bytes, Log, Transaction, TransactionReceipt, H256, U256},
    utils::keccak256,
};
use once_cell::sync::Lazy;

use super::entities::Asset;

/// `transfer(address,uint256)`
pub const TRANSFER_SELECTOR: [u8; 4] = [0xa9, 0x05, 0x9c, 0xbb];
/// `decimals()`
pub const DECIMALS_SELECTOR: [u8; 4] = [0x31, 0x3c, 0xe5, 0x67];

/// keccak256("Transfer(address,address,uint256)")
pub static TRANSFER_TOPIC: Lazy<H256> =
    Lazy::new(|| H256::from(keccak256("Transfer(address,address,uint256)")));

/// 解码后的转账（最小单位）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedTransfer {
    pub asset: Asset,
    pub from: Address,
    pub to: Address,
    pub amount: U256,
}

/// ERC-20 transfer 调用数据：selector + 地址（左补零至 32 字节）+ 金额（大端 32 字节）
pub fn encode_transfer_call(to: Address, amount: U256) -> Bytes {
    let mut data = TRANSFER_SELECTOR.to_vec();
    data.extend(abi::encode(&[Token::Address(to), Token::Uint(amount)]));
    Bytes::from(data)
}

pub fn encode_decimals_call() -> Bytes {
    Bytes::from(DECIMALS_SELECTOR.to_vec())
}

/// 解析 `decimals()` 返回值，非法返回 None
pub fn decode_decimals(output: &[u8]) -> Option<u8> {
    if output.len() < 32 {
        return None;
    }
    let value = U256::from_big_endian(&output[..32]);
    if value > U256::from(u8::MAX) {
        return None;
    }
    Some(value.low_u32() as u8)
}

/// 从交易与回执中解码全部转账，保持顺序：
/// 原生转账（如有）在前，随后按日志顺序输出 ERC-20 Transfer。
pub fn decode_transfers(tx: &Transaction, receipt: &TransactionReceipt) -> Vec<DecodedTransfer> {
    let mut transfers = Vec::new();

    if !tx.value.is_zero() {
        if let Some(to) = tx.to {
            transfers.push(DecodedTransfer {
                asset: Asset::Eth,
                from: tx.from,
                to,
                amount: tx.value,
            });
        }
    }

    transfers.extend(receipt.logs.iter().filter_map(decode_transfer_log));
    transfers
}

/// 解码单条 Transfer 日志；格式不符的日志直接跳过
pub fn decode_transfer_log(log: &Log) -> Option<DecodedTransfer> {
    // 已被重组移除的日志不可信
    if log.removed == Some(true) {
        return None;
    }
    if log.topics.first() != Some(&*TRANSFER_TOPIC) {
        return None;
    }
    if log.topics.len() != 3 {
        tracing::debug!(
            contract = ?log.address,
            topics = log.topics.len(),
            "Skipping Transfer log with unexpected topic count"
        );
        return None;
    }
    if log.data.len() != 32 {
        tracing::debug!(
            contract = ?log.address,
            data_len = log.data.len(),
            "Skipping Transfer log with unexpected data length"
        );
        return None;
    }

    let from = topic_to_address(&log.topics[1])?;
    let to = topic_to_address(&log.topics[2])?;

    Some(DecodedTransfer {
        asset: Asset::Erc20(log.address),
        from,
        to,
        amount: U256::from_big_endian(&log.data),
    })
}

/// indexed address 参数：前 12 字节必须为 0
fn topic_to_address(topic: &H256) -> Option<Address> {
    let bytes = topic.as_bytes();
    if bytes[..12].iter().any(|b| *b != 0) {
        return None;
    }
    Some(Address::from_slice(&bytes[12..]))
}
