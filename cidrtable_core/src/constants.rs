//! Constants and configuration for the lookup tables

/// Number of independently addressable tables.
pub const MAX_TABLES: usize = 128;

/// Width of a lookup key in bits (IPv4).
pub const KEY_BITS: u8 = 32;
pub const MAX_MASKLEN: u8 = KEY_BITS;

/// Default per-table entry cap: unlimited.
pub const DEFAULT_ENTRY_LIMIT: usize = usize::MAX;

/// Environment variable read by `TableSetConfig::from_env`.
pub const ENTRY_LIMIT_ENV: &str = "CIDRTABLE_ENTRY_LIMIT";

pub const TABLE_ENTRY_WIRE_SIZE: usize = 16;
pub const TABLE_HEADER_WIRE_SIZE: usize = 12;
