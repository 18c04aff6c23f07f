//! Run-time configuration for a table set

use crate::constants::{DEFAULT_ENTRY_LIMIT, ENTRY_LIMIT_ENV};
use log::warn;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TableSetConfig {
    /// Per-table cap on stored entries; inserts past it fail with
    /// `OutOfMemory`.
    pub entry_limit: usize,
}

impl Default for TableSetConfig {
    fn default() -> Self {
        Self {
            entry_limit: DEFAULT_ENTRY_LIMIT,
        }
    }
}

impl TableSetConfig {
    pub fn with_entry_limit(entry_limit: usize) -> Self {
        Self { entry_limit }
    }

    /// Defaults, overridden by `CIDRTABLE_ENTRY_LIMIT` when it parses.
    pub fn from_env() -> Self {
        Self::from_entry_limit_var(std::env::var(ENTRY_LIMIT_ENV).ok().as_deref())
    }

    fn from_entry_limit_var(raw: Option<&str>) -> Self {
        let mut cfg = Self::default();
        if let Some(raw) = raw {
            match raw.trim().parse::<usize>() {
                Ok(n) if n > 0 => cfg.entry_limit = n,
                _ => warn!("ignoring {ENTRY_LIMIT_ENV}={raw:?}: expected a positive integer"),
            }
        }
        cfg
    }
}
