//! Domain 模块
//!
//! 实体、状态机、金额换算与 ERC-20 编解码，不依赖任何 I/O

pub mod derivation;
pub mod entities;
pub mod error;
pub mod transaction_status;
pub mod transfer_codec;
pub mod units;

// 重新导出常用类型
pub use entities::{
    Asset, ManagedAddress, PendingTransaction, PrivateKey, TransferDetail, ValidatedTransaction,
};
pub use error::CoreError;
pub use transaction_status::TransactionStatus;
