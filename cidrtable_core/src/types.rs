//! Entry type and the C-compatible table structures

use crate::constants::{TABLE_ENTRY_WIRE_SIZE, TABLE_HEADER_WIRE_SIZE};
use crate::errors::Error;
use crate::helpers::{canonical, check_masklen, format_cidr, netmask};
use std::fmt;

/// One stored mapping. `prefix` is host order and always canonical.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Entry {
    pub prefix: u32,
    pub masklen: u8,
    pub value: u32,
}

impl Entry {
    pub fn new(prefix: u32, masklen: u8, value: u32) -> Result<Self, Error> {
        let masklen = check_masklen(masklen as u32)?;
        Ok(Self {
            prefix: canonical(prefix, masklen),
            masklen,
            value,
        })
    }

    #[inline]
    pub fn covers(&self, addr: u32) -> bool {
        addr & netmask(self.masklen) == self.prefix
    }

    pub fn to_wire(&self, tbl: u16) -> IpfwTableEntry {
        IpfwTableEntry {
            tbl,
            addr: self.prefix.to_be(),
            value: self.value,
            masklen: self.masklen,
        }
    }
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", format_cidr(self.prefix, self.masklen), self.value)
    }
}

/// `ipfw_table_entry` as exchanged with the control tool.
/// `addr` is an `in_addr_t`: network byte order.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct IpfwTableEntry {
    pub tbl: u16,
    pub addr: u32,
    pub value: u32,
    pub masklen: u8,
}

impl IpfwTableEntry {
    /// Host-order address.
    #[inline]
    pub fn host_addr(&self) -> u32 {
        u32::from_be(self.addr)
    }

    pub fn to_entry(&self) -> Result<Entry, Error> {
        Entry::new(self.host_addr(), self.masklen, self.value)
    }
}

/// `ipfw_table_header`; `size` entry slots follow it in the caller's buffer.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct IpfwTableHeader {
    pub tbl: u16,
    pub cnt: u32,
    pub size: u32,
}

const _: () = assert!(std::mem::size_of::<IpfwTableEntry>() == TABLE_ENTRY_WIRE_SIZE);
const _: () = assert!(std::mem::size_of::<IpfwTableHeader>() == TABLE_HEADER_WIRE_SIZE);

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TableState {
    Empty,
    Populated,
}
