pub mod address_book;
pub mod chain_gateway;
pub mod credit_validator;
pub mod key_generator;
pub mod nonce_manager;
pub mod token_service;
pub mod transaction_builder;
pub mod transaction_monitor;
pub mod transaction_tracker;

pub use address_book::AddressBook;
pub use chain_gateway::{BoundedGateway, ChainGateway, EthersGateway, GatewayError};
pub use credit_validator::{ChainTxStatus, CreditValidator, CreditVerdict};
pub use key_generator::{KeyGenerator, KeyPair, LocalKeyGenerator};
pub use transaction_builder::{GasPolicy, TransactionBuilder, TransferRequest};
pub use transaction_monitor::TransactionMonitor;
pub use transaction_tracker::TransactionTracker;
