//! The fixed array of numbered tables, and the process-wide instance the
//! firewall and the control interface share.

use crate::config::TableSetConfig;
use crate::constants::MAX_TABLES;
use crate::errors::Error;
use crate::table::Table;
use crate::types::{Entry, IpfwTableEntry, IpfwTableHeader};
use log::info;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::sync::Arc;

/// Table id type as carried on the wire.
pub type TableId = u16;

pub struct TableSet {
    tables: Box<[Table]>,
    config: TableSetConfig,
}

impl Default for TableSet {
    fn default() -> Self {
        Self::new(TableSetConfig::default())
    }
}

impl TableSet {
    pub fn new(config: TableSetConfig) -> Self {
        let tables = (0..MAX_TABLES)
            .map(|id| Table::new(id as TableId, config.entry_limit))
            .collect();
        Self { tables, config }
    }

    pub fn config(&self) -> &TableSetConfig {
        &self.config
    }

    /// Validate `id` and return the addressed table.
    #[inline]
    pub fn table(&self, id: TableId) -> Result<&Table, Error> {
        self.tables
            .get(id as usize)
            .ok_or(Error::InvalidTableId(id as u32))
    }

    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.tables.iter()
    }

    pub fn add(&self, id: TableId, prefix: u32, masklen: u8, value: u32) -> Result<(), Error> {
        self.table(id)?.add(prefix, masklen, value)
    }

    pub fn delete(&self, id: TableId, prefix: u32, masklen: u8) -> Result<u32, Error> {
        self.table(id)?.remove(prefix, masklen)
    }

    pub fn add_entry(&self, ent: &IpfwTableEntry) -> Result<(), Error> {
        self.add(ent.tbl, ent.host_addr(), ent.masklen, ent.value)
    }

    pub fn delete_entry(&self, ent: &IpfwTableEntry) -> Result<u32, Error> {
        self.delete(ent.tbl, ent.host_addr(), ent.masklen)
    }

    pub fn get(&self, id: TableId, prefix: u32, masklen: u8) -> Result<u32, Error> {
        self.table(id)?.get(prefix, masklen)
    }

    /// Validating longest-prefix lookup for the control plane.
    pub fn lookup(&self, id: TableId, addr: u32) -> Result<Option<u32>, Error> {
        Ok(self.table(id)?.lookup(addr))
    }

    /// Packet fast path: an unknown table is simply a miss.
    #[inline]
    pub fn lookup_table(&self, id: TableId, addr: u32) -> Option<u32> {
        self.tables.get(id as usize)?.lookup(addr)
    }

    /// `table(N)` / `table(N,value)` rule check: a hit whose value equals
    /// `expected`, or any hit when there is no expectation.
    #[inline]
    pub fn lookup_matches(&self, id: TableId, addr: u32, expected: Option<u32>) -> bool {
        match (self.lookup_table(id, addr), expected) {
            (Some(v), Some(want)) => v == want,
            (Some(_), None) => true,
            (None, _) => false,
        }
    }

    pub fn flush(&self, id: TableId) -> Result<usize, Error> {
        Ok(self.table(id)?.flush())
    }

    /// Flush every table; returns the total number of entries removed.
    pub fn flush_all(&self) -> usize {
        self.tables.iter().map(Table::flush).sum()
    }

    pub fn count(&self, id: TableId) -> Result<usize, Error> {
        Ok(self.table(id)?.count())
    }

    /// Entry slots a full dump of table `id` needs; the value to put in
    /// `IpfwTableHeader::size`.
    pub fn size(&self, id: TableId) -> Result<u32, Error> {
        let n = self.count(id)?;
        Ok(n.min(u32::MAX as usize) as u32)
    }

    pub fn dump(&self, id: TableId) -> Result<Vec<Entry>, Error> {
        Ok(self.table(id)?.dump())
    }

    /// Fill `out` with table `hdr.tbl`, honouring `hdr.size`.
    pub fn dump_into(&self, hdr: &mut IpfwTableHeader, out: &mut [IpfwTableEntry]) -> Result<u32, Error> {
        Ok(self.table(hdr.tbl)?.dump_into(hdr, out))
    }
}

// ---- process-wide instance ------------------------------------------------

static GLOBAL: Lazy<RwLock<Option<Arc<TableSet>>>> = Lazy::new(|| RwLock::new(None));

/// Create the process-wide table set with defaults taken from the
/// environment. Idempotent: a live instance is returned as is.
pub fn init() -> Arc<TableSet> {
    init_with(TableSetConfig::from_env())
}

pub fn init_with(config: TableSetConfig) -> Arc<TableSet> {
    crate::ensure_logging();
    crate::telemetry::init();
    let mut slot = GLOBAL.write();
    if let Some(set) = slot.as_ref() {
        return Arc::clone(set);
    }
    info!("[INIT] {} tables, entry limit {}", MAX_TABLES, config.entry_limit);
    let set = Arc::new(TableSet::new(config));
    *slot = Some(Arc::clone(&set));
    set
}

/// The live instance, if `init` has run.
pub fn global() -> Result<Arc<TableSet>, Error> {
    GLOBAL.read().clone().ok_or(Error::NotInitialized)
}

/// Flush every table and drop the process-wide instance. Handles still
/// held elsewhere keep a (now empty) set alive until they are dropped.
pub fn teardown() {
    let taken = GLOBAL.write().take();
    if let Some(set) = taken {
        let removed = set.flush_all();
        info!("[TEARDOWN] {} entries flushed", removed);
    }
}

/// Fast-path lookup against the process-wide instance.
#[inline]
pub fn lookup_table(id: TableId, addr: u32) -> Option<u32> {
    GLOBAL.read().as_ref()?.lookup_table(id, addr)
}
