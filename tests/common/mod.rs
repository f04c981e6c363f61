//! 测试辅助模块
//! 可编排的链网关 Mock 与基于内存存储的应用状态

#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use ethers::{
    types::{
        transaction::eip2718::TypedTransaction, Address, Bytes, Log, Transaction,
        TransactionReceipt, H256, U256, U64,
    },
    utils::keccak256,
};
use ethflow::{
    config::{Config, StorageBackend},
    domain::{derivation::parse_address, transfer_codec::TRANSFER_TOPIC},
    service::chain_gateway::{ChainGateway, GatewayError},
    AppState, Repositories,
};

pub const GWEI: u64 = 1_000_000_000;

/// Mock 节点的可编排状态
pub struct MockState {
    /// 节点返回的 pending nonce（不会随广播自增，用于模拟节点滞后）
    pub chain_nonce: U256,
    pub gas_price: U256,
    /// None 表示估算失败
    pub estimate: Option<U256>,
    pub submit_error: Option<GatewayError>,
    pub submit_delay: Duration,
    pub block_number: u64,
    pub transactions: HashMap<H256, Transaction>,
    pub receipts: HashMap<H256, TransactionReceipt>,
    pub call_results: HashMap<Address, Bytes>,
    /// 设置后所有 eth_call 都返回该错误
    pub call_error: Option<GatewayError>,
    pub submitted: Vec<Bytes>,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            chain_nonce: U256::zero(),
            gas_price: U256::from(20 * GWEI),
            estimate: None,
            submit_error: None,
            submit_delay: Duration::ZERO,
            block_number: 100,
            transactions: HashMap::new(),
            receipts: HashMap::new(),
            call_results: HashMap::new(),
            call_error: None,
            submitted: Vec::new(),
        }
    }
}

#[derive(Default)]
pub struct MockGateway {
    pub state: Mutex<MockState>,
    pub submit_calls: AtomicUsize,
    pub receipt_calls: AtomicUsize,
    pub estimate_calls: AtomicUsize,
}

impl MockGateway {
    pub fn with<R>(&self, f: impl FnOnce(&mut MockState) -> R) -> R {
        let mut state = self.state.lock().unwrap();
        f(&mut state)
    }

    /// 已广播的原始交易，按广播顺序解码
    pub fn submitted(&self) -> Vec<Transaction> {
        self.with(|s| {
            s.submitted
                .iter()
                .map(|raw| ethers::utils::rlp::decode::<Transaction>(raw).unwrap())
                .collect()
        })
    }

    pub fn set_decimals(&self, token: Address, decimals: u8) {
        let mut word = [0u8; 32];
        word[31] = decimals;
        self.with(|s| s.call_results.insert(token, Bytes::from(word.to_vec())));
    }

    pub fn add_transaction(&self, tx: Transaction, receipt: TransactionReceipt) {
        self.with(|s| {
            s.receipts.insert(tx.hash, receipt);
            s.transactions.insert(tx.hash, tx);
        });
    }

    pub fn receipt_calls(&self) -> usize {
        self.receipt_calls.load(Ordering::SeqCst)
    }

    pub fn submit_calls(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChainGateway for MockGateway {
    async fn get_nonce(&self, _address: Address) -> Result<U256, GatewayError> {
        Ok(self.with(|s| s.chain_nonce))
    }

    async fn estimate_gas(&self, _tx: &TypedTransaction) -> Result<U256, GatewayError> {
        self.estimate_calls.fetch_add(1, Ordering::SeqCst);
        self.with(|s| s.estimate)
            .ok_or_else(|| GatewayError::Rpc("execution reverted".into()))
    }

    async fn get_gas_price(&self) -> Result<U256, GatewayError> {
        Ok(self.with(|s| s.gas_price))
    }

    async fn submit_raw(&self, raw: Bytes) -> Result<H256, GatewayError> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.with(|s| s.submit_delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.with(|s| {
            if let Some(err) = s.submit_error.clone() {
                return Err(err);
            }
            let hash = H256::from(keccak256(&raw));
            s.submitted.push(raw);
            Ok(hash)
        })
    }

    async fn get_transaction(&self, hash: H256) -> Result<Option<Transaction>, GatewayError> {
        Ok(self.with(|s| s.transactions.get(&hash).cloned()))
    }

    async fn get_receipt(&self, hash: H256) -> Result<Option<TransactionReceipt>, GatewayError> {
        self.receipt_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.with(|s| s.receipts.get(&hash).cloned()))
    }

    async fn get_block_number(&self) -> Result<u64, GatewayError> {
        Ok(self.with(|s| s.block_number))
    }

    async fn call(&self, contract: Address, _data: Bytes) -> Result<Bytes, GatewayError> {
        self.with(|s| {
            if let Some(err) = s.call_error.clone() {
                return Err(err);
            }
            s.call_results
                .get(&contract)
                .cloned()
                .ok_or_else(|| GatewayError::Rpc("execution reverted".into()))
        })
    }
}

pub fn test_config() -> Config {
    let mut config = Config::default();
    config.database.backend = StorageBackend::Memory;
    config.blockchain.rpc_url = "http://127.0.0.1:8545".into();
    config.blockchain.chain_id = 11_155_111;
    config.blockchain.request_timeout_secs = 5;
    config.blockchain.min_confirmations = 6;
    config.blockchain.gas_price_margin_percent = 20;
    config.blockchain.erc20_fallback_gas_limit = 100_000;
    config.blockchain.monitor_enabled = false;
    config.monitoring.enable_health_check = true;
    config.monitoring.enable_prometheus = true;
    config
}

/// Mock 网关 + 内存存储组装出的完整服务
pub struct Harness {
    pub gateway: Arc<MockGateway>,
    pub state: Arc<AppState>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: Config) -> Self {
        let gateway = Arc::new(MockGateway::default());
        let state = Arc::new(AppState::new(
            Arc::new(config),
            gateway.clone(),
            Repositories::memory(),
        ));
        Self { gateway, state }
    }

    /// 生成一个托管地址并返回
    pub async fn managed_address(&self) -> Address {
        let created = self.state.address_book.generate(1).await.unwrap();
        parse_address(&created[0].address).unwrap()
    }
}

pub fn addr(byte: u8) -> Address {
    Address::repeat_byte(byte)
}

pub fn hash(byte: u8) -> H256 {
    H256::repeat_byte(byte)
}

pub fn eth_transfer(hash: H256, from: Address, to: Address, value: U256) -> Transaction {
    Transaction {
        hash,
        from,
        to: Some(to),
        value,
        ..Default::default()
    }
}

/// 调用合约（无原生金额）的交易
pub fn contract_call(hash: H256, from: Address, contract: Address) -> Transaction {
    Transaction {
        hash,
        from,
        to: Some(contract),
        value: U256::zero(),
        ..Default::default()
    }
}

pub fn receipt(hash: H256, block: u64, success: bool, logs: Vec<Log>) -> TransactionReceipt {
    TransactionReceipt {
        transaction_hash: hash,
        block_number: Some(U64::from(block)),
        status: Some(U64::from(success as u64)),
        gas_used: Some(U256::from(21_000)),
        effective_gas_price: Some(U256::from(25 * GWEI)),
        logs,
        ..Default::default()
    }
}

fn address_topic(address: Address) -> H256 {
    let mut word = [0u8; 32];
    word[12..].copy_from_slice(address.as_bytes());
    H256::from(word)
}

pub fn transfer_log(token: Address, from: Address, to: Address, amount: U256) -> Log {
    let mut data = [0u8; 32];
    amount.to_big_endian(&mut data);
    Log {
        address: token,
        topics: vec![*TRANSFER_TOPIC, address_topic(from), address_topic(to)],
        data: Bytes::from(data.to_vec()),
        ..Default::default()
    }
}
