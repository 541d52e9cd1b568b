pub mod cli;
pub mod config;
pub mod error;
pub mod fixture;
pub mod kvdb;
pub mod migration;

pub use error::{RepairError, Result, StoreError};
pub use migration::{migrate_payments, MigrationStats};
