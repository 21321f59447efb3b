pub mod ledger_repo;
pub use ledger_repo::{DirectoryRepositoryRef, LedgerRepository, LedgerRepositoryRef};
pub mod unit_of_work;
pub use unit_of_work::{StagedWrite, UnitOfWork};
pub mod pg_ledger_repo;
pub use pg_ledger_repo::PgLedgerRepository;
pub mod memory_repo;
pub use memory_repo::InMemoryLedgerRepository;
