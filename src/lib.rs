//! ethflow - 以太坊地址与交易生命周期服务
//!
//! 托管地址生成、ETH / ERC-20 转账构建签名广播、状态跟踪与入账校验。

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod error_body;
pub mod infrastructure;
pub mod metrics;
pub mod repository;
pub mod service;

// 重新导出常用类型
pub use app_state::{AppState, Repositories};
pub use domain::CoreError;
pub use error::{AppError, AppErrorCode};
