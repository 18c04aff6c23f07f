//! C ABI over the process-wide table set.
//!
//! Scalar functions take addresses in host byte order; functions taking an
//! [`IpfwTableEntry`] use its network-order `addr`, exactly like the control
//! tool's structures. Every call records its outcome for
//! `cidrtable_last_error` and, on failure, sets `errno`.

use crate::{
    errors::{set_last_error, Error, ErrorCode},
    table_set::{self, TableId, TableSet},
    types::{IpfwTableEntry, IpfwTableHeader},
};
use std::sync::Arc;

// ─── small helper to turn Result<T,ErrorCode> into early-return ──────────
macro_rules! try_c { ($expr:expr) => { match $expr {
    Ok(v)  => v,
    Err(e) => return e,
}}}

#[inline]
fn ok() -> ErrorCode {
    set_last_error(ErrorCode::Success);
    ErrorCode::Success
}

fn fail(e: &Error) -> ErrorCode {
    let code = ErrorCode::from(e);
    errno::set_errno(e.errno());
    set_last_error(code);
    code
}

fn invalid_argument() -> ErrorCode {
    errno::set_errno(errno::Errno(libc::EINVAL));
    set_last_error(ErrorCode::InvalidArgument);
    ErrorCode::InvalidArgument
}

fn finish<T>(r: Result<T, Error>) -> Result<T, ErrorCode> {
    r.map_err(|e| fail(&e))
}

fn live_set() -> Result<Arc<TableSet>, ErrorCode> {
    finish(table_set::global())
}

// ───────────────────────── lifetime ──────────────────────────────────── //

/// Create the process-wide table set (idempotent).
#[no_mangle]
pub extern "C" fn cidrtable_init() -> ErrorCode {
    table_set::init();
    ok()
}

/// Flush all tables and release the process-wide table set.
#[no_mangle]
pub extern "C" fn cidrtable_teardown() {
    table_set::teardown();
}

// ───────────────────────── CRUD ──────────────────────────────────────── //

#[no_mangle]
pub extern "C" fn cidr_table_add(tbl: TableId, addr: u32, masklen: u8, value: u32) -> ErrorCode {
    let set = try_c!(live_set());
    try_c!(finish(set.add(tbl, addr, masklen, value)));
    ok()
}

#[no_mangle]
pub extern "C" fn cidr_table_delete(tbl: TableId, addr: u32, masklen: u8) -> ErrorCode {
    let set = try_c!(live_set());
    try_c!(finish(set.delete(tbl, addr, masklen)));
    ok()
}

/// # Safety
/// `ent` must be null or point to a readable `IpfwTableEntry`.
#[no_mangle]
pub unsafe extern "C" fn cidr_table_add_entry(ent: *const IpfwTableEntry) -> ErrorCode {
    let Some(ent) = ent.as_ref() else {
        return invalid_argument();
    };
    let set = try_c!(live_set());
    try_c!(finish(set.add_entry(ent)));
    ok()
}

/// # Safety
/// `ent` must be null or point to a readable `IpfwTableEntry`.
#[no_mangle]
pub unsafe extern "C" fn cidr_table_delete_entry(ent: *const IpfwTableEntry) -> ErrorCode {
    let Some(ent) = ent.as_ref() else {
        return invalid_argument();
    };
    let set = try_c!(live_set());
    try_c!(finish(set.delete_entry(ent)));
    ok()
}

/// Longest-prefix lookup. A miss is `Success` with `*out_found = false`.
///
/// # Safety
/// `out_value` and `out_found` must be null or writable.
#[no_mangle]
pub unsafe extern "C" fn cidr_table_lookup(
    tbl: TableId,
    addr: u32,
    out_value: *mut u32,
    out_found: *mut bool,
) -> ErrorCode {
    if out_value.is_null() || out_found.is_null() {
        return invalid_argument();
    }
    let set = try_c!(live_set());
    let hit = try_c!(finish(set.lookup(tbl, addr)));
    *out_found = hit.is_some();
    *out_value = hit.unwrap_or(0);
    ok()
}

#[no_mangle]
pub extern "C" fn cidr_table_flush(tbl: TableId) -> ErrorCode {
    let set = try_c!(live_set());
    try_c!(finish(set.flush(tbl)));
    ok()
}

/// # Safety
/// `out` must be null or writable.
#[no_mangle]
pub unsafe extern "C" fn cidr_table_count(tbl: TableId, out: *mut u32) -> ErrorCode {
    if out.is_null() {
        return invalid_argument();
    }
    let set = try_c!(live_set());
    let n = try_c!(finish(set.count(tbl)));
    *out = n.min(u32::MAX as usize) as u32;
    ok()
}

/// Dump table `hdr->tbl` into `entries`, which holds `hdr->size` slots.
/// On return `hdr->cnt` tells how many were filled.
///
/// # Safety
/// `hdr` must be null or point to a writable header; `entries` must be
/// valid for `hdr->size` writes (it may be null when `hdr->size` is 0).
#[no_mangle]
pub unsafe extern "C" fn cidr_table_dump(
    hdr: *mut IpfwTableHeader,
    entries: *mut IpfwTableEntry,
) -> ErrorCode {
    let Some(hdr) = hdr.as_mut() else {
        return invalid_argument();
    };
    let slots: &mut [IpfwTableEntry] = if hdr.size == 0 {
        &mut []
    } else if entries.is_null() {
        return invalid_argument();
    } else {
        std::slice::from_raw_parts_mut(entries, hdr.size as usize)
    };
    let set = try_c!(live_set());
    try_c!(finish(set.dump_into(hdr, slots)));
    ok()
}
