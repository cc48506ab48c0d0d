//! tm-core - Core library for Tidemark
//!
//! This crate owns everything that lives on disk: migration units and their
//! snapshot documents, chain resolution over `prevId` pointers, loading the
//! ordered units for the engine, and converting the legacy journal layout.

pub mod chain;
pub mod checksum;
pub mod config;
pub mod error;
pub mod journal;
pub mod reader;
pub mod snapshot;
pub mod store;
pub mod unit;

pub use chain::{resolve_chain, Chain, ChainLink};
pub use checksum::compute_checksum;
pub use config::{LedgerLocation, MigrateConfig, TransactionScope};
pub use error::{CoreError, CoreResult};
pub use journal::{convert, ConvertReport, Journal, JournalEntry};
pub use reader::load_ordered;
pub use snapshot::{SnapshotHeader, ROOT_ID};
pub use store::{Layout, SnapshotStore};
pub use unit::{MigrationUnit, STATEMENT_BREAKPOINT};
