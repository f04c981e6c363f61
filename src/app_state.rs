use std::sync::Arc;

use crate::{
    config::Config,
    infrastructure::db::PgPool,
    repository::{
        AddressRepository, MemoryAddressRepository, MemoryPendingTransactionRepository,
        MemoryValidatedTransactionRepository, PendingTransactionRepository, PgAddressRepository,
        PgPendingTransactionRepository, PgValidatedTransactionRepository,
        ValidatedTransactionRepository,
    },
    service::{
        address_book::AddressBook,
        chain_gateway::{BoundedGateway, ChainGateway},
        credit_validator::CreditValidator,
        key_generator::{KeyGenerator, LocalKeyGenerator},
        nonce_manager::NonceManager,
        token_service::TokenService,
        transaction_builder::{GasPolicy, TransactionBuilder},
        transaction_monitor::TransactionMonitor,
        transaction_tracker::TransactionTracker,
    },
};

/// 三类持久化端口
#[derive(Clone)]
pub struct Repositories {
    pub addresses: Arc<dyn AddressRepository>,
    pub pending: Arc<dyn PendingTransactionRepository>,
    pub validated: Arc<dyn ValidatedTransactionRepository>,
    /// 仅 Postgres 后端存在，用于健康检查
    pub pool: Option<PgPool>,
}

impl Repositories {
    pub fn postgres(pool: PgPool) -> Self {
        Self {
            addresses: Arc::new(PgAddressRepository::new(pool.clone())),
            pending: Arc::new(PgPendingTransactionRepository::new(pool.clone())),
            validated: Arc::new(PgValidatedTransactionRepository::new(pool.clone())),
            pool: Some(pool),
        }
    }

    pub fn memory() -> Self {
        Self {
            addresses: Arc::new(MemoryAddressRepository::new()),
            pending: Arc::new(MemoryPendingTransactionRepository::new()),
            validated: Arc::new(MemoryValidatedTransactionRepository::new()),
            pool: None,
        }
    }
}

/// 应用状态
/// 包含所有共享资源
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub repositories: Repositories,
    /// 已带超时包装
    pub gateway: Arc<dyn ChainGateway>,
    pub address_book: Arc<AddressBook>,
    pub builder: Arc<TransactionBuilder>,
    pub tracker: Arc<TransactionTracker>,
    pub validator: Arc<CreditValidator>,
}

impl AppState {
    /// 使用默认的本地密钥生成器组装服务
    pub fn new(config: Arc<Config>, gateway: Arc<dyn ChainGateway>, repos: Repositories) -> Self {
        Self::with_key_generator(config, gateway, repos, Arc::new(LocalKeyGenerator))
    }

    pub fn with_key_generator(
        config: Arc<Config>,
        gateway: Arc<dyn ChainGateway>,
        repos: Repositories,
        key_generator: Arc<dyn KeyGenerator>,
    ) -> Self {
        let chain = &config.blockchain;
        let gateway: Arc<dyn ChainGateway> =
            Arc::new(BoundedGateway::new(gateway, chain.request_timeout()));

        let address_book = Arc::new(AddressBook::new(repos.addresses.clone(), key_generator));
        let tokens = Arc::new(TokenService::new(gateway.clone()));

        let policy = GasPolicy {
            chain_id: chain.chain_id,
            gas_price_margin_percent: chain.gas_price_margin_percent,
            erc20_fallback_gas_limit: chain.erc20_fallback_gas_limit,
        };
        let builder = Arc::new(TransactionBuilder::new(
            gateway.clone(),
            address_book.clone(),
            tokens.clone(),
            Arc::new(NonceManager::new()),
            repos.pending.clone(),
            policy,
        ));

        let tracker = Arc::new(TransactionTracker::new(
            gateway.clone(),
            repos.pending.clone(),
        ));

        let validator = Arc::new(CreditValidator::new(
            gateway.clone(),
            tokens,
            address_book.clone(),
            repos.validated.clone(),
            chain.min_confirmations,
        ));

        Self {
            config,
            repositories: repos,
            gateway,
            address_book,
            builder,
            tracker,
            validator,
        }
    }

    /// 后台 pending 交易监控
    pub fn monitor(&self) -> TransactionMonitor {
        TransactionMonitor::new(
            self.tracker.clone(),
            self.repositories.pending.clone(),
            self.config.blockchain.monitor_interval(),
        )
    }
}
