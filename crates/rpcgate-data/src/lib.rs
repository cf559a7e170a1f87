#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::cargo,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Flat configuration record layer for rpcgate: migrations, stored procedures, and stores.
//!
//! Layout: `record.rs` (record model + `RecordRepository`), `postgres.rs` (`PgRecordStore`),
//! `memory.rs` (`MemoryRecordStore`), `interrupt.rs` (cancellation/deadlines), `settings.rs`
//! (pool settings from the environment).

pub mod error;
pub mod interrupt;
pub mod memory;
pub mod postgres;
pub mod record;
pub mod settings;

pub use error::{DataError, ErrorKind, Interrupted, RecordLookup, Result as DataResult};
pub use interrupt::{CancelHandle, CancelToken, Interrupt};
pub use memory::MemoryRecordStore;
pub use postgres::{PgRecordStore, run_migrations};
pub use record::{
    ConfigRecord, MAX_NAME_BYTES, MAX_VALUE_BYTES, RecordId, RecordRepository,
    ensure_within_bounds, parse_counter,
};
pub use settings::StoreSettings;
