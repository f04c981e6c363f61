pub mod address_repository;
pub mod memory;
pub mod pending_transaction_repository;
pub mod validated_transaction_repository;

pub use address_repository::{AddressRepository, PgAddressRepository};
pub use memory::{
    MemoryAddressRepository, MemoryPendingTransactionRepository,
    MemoryValidatedTransactionRepository,
};
pub use pending_transaction_repository::{
    PendingCursor, PendingTransactionRepository, PgPendingTransactionRepository,
};
pub use validated_transaction_repository::{
    PgValidatedTransactionRepository, ValidatedTransactionRepository,
};
