//! A single numbered lookup table: one prefix trie behind one
//! reader/writer lock.
//!
//! Lookups take the shared lock and never block each other; `add`,
//! `remove` and `flush` take the exclusive lock for the trie change only,
//! so a lookup sees either none or all of a mutation (a flush included).
//! Logging and metrics run after the guard is dropped.

use crate::errors::Error;
use crate::helpers::{canonical, format_cidr};
use crate::trie::PrefixTrie;
use crate::types::{Entry, IpfwTableEntry, IpfwTableHeader, TableState};
use log::{debug, info, warn};
use metrics::{counter, gauge};
use parking_lot::RwLock;

pub struct Table {
    id: u16,
    trie: RwLock<PrefixTrie>,
}

impl Table {
    pub fn new(id: u16, entry_limit: usize) -> Self {
        Self {
            id,
            trie: RwLock::new(PrefixTrie::with_entry_limit(entry_limit)),
        }
    }

    #[inline]
    pub fn id(&self) -> u16 {
        self.id
    }

    fn report_len(&self, len: usize) {
        gauge!("cidrtable_entries", "table" => self.id.to_string()).set(len as f64);
    }

    fn note_error(&self, op: &str, e: &Error) {
        counter!("cidrtable_errors_total").increment(1);
        match e {
            Error::OutOfMemory => warn!("[{op}] table {}: {e}", self.id),
            _ => debug!("[{op}] table {}: {e}", self.id),
        }
    }

    pub fn add(&self, prefix: u32, masklen: u8, value: u32) -> Result<(), Error> {
        let result = {
            let mut trie = self.trie.write();
            trie.insert(prefix, masklen, value).map(|()| trie.len())
        };
        // Guard dropped: logging and metrics may block.
        match result {
            Ok(len) => {
                counter!("cidrtable_inserts_total").increment(1);
                info!(
                    "[ADD] table {}: {} -> {}",
                    self.id,
                    format_cidr(canonical(prefix, masklen), masklen),
                    value
                );
                self.report_len(len);
                Ok(())
            }
            Err(e) => {
                self.note_error("ADD", &e);
                Err(e)
            }
        }
    }

    /// Exact-match removal; returns the value that was stored.
    pub fn remove(&self, prefix: u32, masklen: u8) -> Result<u32, Error> {
        let result = {
            let mut trie = self.trie.write();
            trie.delete(prefix, masklen).map(|value| (value, trie.len()))
        };
        match result {
            Ok((value, len)) => {
                counter!("cidrtable_deletes_total").increment(1);
                info!(
                    "[DELETE] table {}: {}",
                    self.id,
                    format_cidr(canonical(prefix, masklen), masklen)
                );
                self.report_len(len);
                Ok(value)
            }
            Err(e) => {
                self.note_error("DELETE", &e);
                Err(e)
            }
        }
    }

    /// Longest-prefix match. Fast path: shared lock only, no logging.
    #[inline]
    pub fn lookup(&self, addr: u32) -> Option<u32> {
        self.trie.read().lookup(addr)
    }

    pub fn lookup_entry(&self, addr: u32) -> Option<Entry> {
        self.trie.read().lookup_entry(addr)
    }

    /// Exact-match read of a stored key.
    pub fn get(&self, prefix: u32, masklen: u8) -> Result<u32, Error> {
        self.trie.read().get(prefix, masklen)
    }

    /// Empty the table under a single exclusive lock; returns how many
    /// entries were dropped.
    pub fn flush(&self) -> usize {
        let removed = self.trie.write().flush();
        counter!("cidrtable_flushes_total").increment(1);
        if removed > 0 {
            info!("[FLUSH] table {}: {} entries removed", self.id, removed);
        }
        self.report_len(0);
        removed
    }

    pub fn count(&self) -> usize {
        self.trie.read().len()
    }

    pub fn state(&self) -> TableState {
        if self.trie.read().is_empty() {
            TableState::Empty
        } else {
            TableState::Populated
        }
    }

    /// Snapshot of every entry in `(prefix, masklen)` order.
    pub fn dump(&self) -> Vec<Entry> {
        self.trie.read().walk().collect()
    }

    /// Fill the caller's fixed buffer: at most `hdr.size` slots (and no more
    /// than `out` holds). Sets `hdr.tbl` and `hdr.cnt`; returns `hdr.cnt`.
    pub fn dump_into(&self, hdr: &mut IpfwTableHeader, out: &mut [IpfwTableEntry]) -> u32 {
        hdr.tbl = self.id;
        hdr.cnt = 0;
        let room = (hdr.size as usize).min(out.len());
        let trie = self.trie.read();
        for (slot, entry) in out[..room].iter_mut().zip(trie.walk()) {
            *slot = entry.to_wire(self.id);
            hdr.cnt += 1;
        }
        hdr.cnt
    }

    /// Run `f` against the trie under the shared lock.
    pub fn with_trie<R>(&self, f: impl FnOnce(&PrefixTrie) -> R) -> R {
        f(&*self.trie.read())
    }
}
