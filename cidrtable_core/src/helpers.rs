//! Bit helpers and CIDR text conversions for the prefix trie

use crate::constants::{KEY_BITS, MAX_MASKLEN};
use crate::errors::Error;
use ipnet::Ipv4Net;
use std::net::Ipv4Addr;

/// Netmask with the top `masklen` bits set. `masklen` must be <= 32.
#[inline]
pub fn netmask(masklen: u8) -> u32 {
    debug_assert!(masklen <= MAX_MASKLEN);
    if masklen == 0 {
        0
    } else {
        !0u32 << (KEY_BITS - masklen)
    }
}

// Canonicalise a key: zero host bits beyond `masklen`.
#[inline(always)]
pub fn canonical(prefix: u32, masklen: u8) -> u32 {
    prefix & netmask(masklen)
}

/// Bit `index` of `key`, most significant first (index 0 = MSB).
#[inline]
pub fn bit_at(key: u32, index: u8) -> u8 {
    debug_assert!(index < KEY_BITS);
    ((key >> (KEY_BITS - 1 - index)) & 1) as u8
}

/// Number of leading bits `a` and `b` share, capped at `max_len`.
pub fn common_prefix_len(a: u32, b: u32, max_len: u8) -> u8 {
    let diff = (a ^ b) & netmask(max_len);
    if diff == 0 {
        return max_len;
    }
    (diff.leading_zeros() as u8).min(max_len)
}

pub fn check_masklen(masklen: u32) -> Result<u8, Error> {
    if masklen > MAX_MASKLEN as u32 {
        return Err(Error::InvalidMask(masklen));
    }
    Ok(masklen as u8)
}

/// Parse `a.b.c.d` or `a.b.c.d/m` into a host-order prefix and mask length.
/// A bare address is a /32. Host bits are kept; the trie canonicalises.
pub fn parse_cidr(s: &str) -> Result<(u32, u8), Error> {
    let (addr_s, len_s) = match s.split_once('/') {
        Some((a, l)) => (a, Some(l)),
        None => (s, None),
    };
    let addr: Ipv4Addr = addr_s
        .trim()
        .parse()
        .map_err(|_| Error::Syntax(format!("bad address `{addr_s}`")))?;
    let masklen = match len_s {
        None => MAX_MASKLEN,
        Some(l) => {
            let raw: u32 = l
                .trim()
                .parse()
                .map_err(|_| Error::Syntax(format!("bad mask length `{l}`")))?;
            check_masklen(raw)?
        }
    };
    let net = Ipv4Net::new(addr, masklen).map_err(|_| Error::InvalidMask(masklen as u32))?;
    Ok((u32::from(net.addr()), net.prefix_len()))
}

pub fn parse_addr(s: &str) -> Result<u32, Error> {
    s.trim()
        .parse::<Ipv4Addr>()
        .map(u32::from)
        .map_err(|_| Error::Syntax(format!("bad address `{s}`")))
}

pub fn format_cidr(prefix: u32, masklen: u8) -> String {
    format!("{}/{}", Ipv4Addr::from(prefix), masklen)
}
