//! Concurrent IPv4 CIDR lookup tables.
//!
//! A fixed set of [`MAX_TABLES`](constants::MAX_TABLES) numbered tables, each
//! mapping CIDR prefixes to opaque `u32` values through a Patricia trie and
//! answering longest-prefix-match lookups. Lookups share a per-table read
//! lock; control-plane mutations take it exclusively.

macro_rules! trie_trace {
    ($($arg:tt)*) => {
        #[cfg(feature = "trace")]
        log::trace!($($arg)*);
    };
}
pub(crate) use trie_trace;

pub mod command;
pub mod config;
pub mod constants;
pub mod errors;
pub mod helpers;
pub mod table;
pub mod table_set;
pub mod telemetry;
pub mod trie;
pub mod types;
pub mod walk;

// Public module for C API functions
pub mod public_api;

use once_cell::sync::OnceCell;

pub use command::{Command, Target};
pub use config::TableSetConfig;
pub use errors::{Error, ErrorCode};
pub use table::Table;
pub use table_set::{global, init, init_with, lookup_table, teardown, TableId, TableSet};
pub use trie::PrefixTrie;
pub use types::{Entry, IpfwTableEntry, IpfwTableHeader, TableState};
pub use walk::{Walk, WalkAction};

/// Install `env_logger` once (honours `RUST_LOG`). A logger the host has
/// already set up is left alone.
pub fn ensure_logging() {
    static INIT: OnceCell<()> = OnceCell::new();
    INIT.get_or_init(|| {
        let _ = env_logger::builder()
            .format_timestamp(None)
            .is_test(std::env::var("RUST_TEST_THREADS").is_ok())
            .try_init();
    });
}
