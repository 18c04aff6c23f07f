//! Patricia trie over 32-bit keys.
//!
//! Nodes live in an arena and refer to their children by index, so every
//! node has exactly one owner: the link (root or a parent's child slot)
//! that points at it. A node either carries an entry or is a pure branch
//! node; branch nodes always have two children, entry nodes may have any
//! number. Along any root-to-leaf path mask lengths strictly increase and
//! each child extends its parent's key, so the covering entries of an
//! address are exactly the entry nodes met while following its bits.

use crate::constants::{DEFAULT_ENTRY_LIMIT, KEY_BITS};
use crate::errors::Error;
use crate::helpers::{bit_at, canonical, check_masklen, common_prefix_len, netmask};
use crate::types::Entry;
use crate::walk::{Walk, WalkAction};

pub(crate) type NodeId = u32;

#[derive(Debug, Clone)]
pub(crate) struct Node {
    pub(crate) key: u32,
    pub(crate) masklen: u8,
    pub(crate) value: Option<u32>,
    pub(crate) left: Option<NodeId>,
    pub(crate) right: Option<NodeId>,
}

impl Node {
    fn leaf(key: u32, masklen: u8, value: u32) -> Self {
        Self {
            key,
            masklen,
            value: Some(value),
            left: None,
            right: None,
        }
    }

    fn branch(key: u32, masklen: u8) -> Self {
        Self {
            key,
            masklen,
            value: None,
            left: None,
            right: None,
        }
    }

    #[inline]
    pub(crate) fn child(&self, side: u8) -> Option<NodeId> {
        if side == 0 {
            self.left
        } else {
            self.right
        }
    }

    #[inline]
    fn set_child(&mut self, side: u8, child: Option<NodeId>) {
        if side == 0 {
            self.left = child;
        } else {
            self.right = child;
        }
    }

    fn only_child(&self) -> Option<NodeId> {
        match (self.left, self.right) {
            (Some(c), None) | (None, Some(c)) => Some(c),
            _ => None,
        }
    }
}

/// Where a node hangs: the root slot or one side of a parent.
#[derive(Debug, Copy, Clone)]
enum Link {
    Root,
    Child(NodeId, u8),
}

#[derive(Debug, Clone)]
pub struct PrefixTrie {
    nodes: Vec<Node>,
    free: Vec<NodeId>,
    root: Option<NodeId>,
    len: usize,
    limit: usize,
}

impl Default for PrefixTrie {
    fn default() -> Self {
        Self::new()
    }
}

impl PrefixTrie {
    pub fn new() -> Self {
        Self::with_entry_limit(DEFAULT_ENTRY_LIMIT)
    }

    /// A trie refusing to hold more than `limit` entries (`OutOfMemory`).
    pub fn with_entry_limit(limit: usize) -> Self {
        Self {
            nodes: Vec::new(),
            free: Vec::new(),
            root: None,
            len: 0,
            limit,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn entry_limit(&self) -> usize {
        self.limit
    }

    #[inline]
    pub(crate) fn root(&self) -> Option<NodeId> {
        self.root
    }

    #[inline]
    pub(crate) fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id as usize]
    }

    // ---- arena -----------------------------------------------------------

    /// Make sure the next `n` allocations cannot fail, and that one more
    /// entry fits under the limit. Nothing is linked yet when this fails.
    fn reserve_entry(&mut self, n: usize) -> Result<(), Error> {
        if self.len >= self.limit {
            return Err(Error::OutOfMemory);
        }
        let fresh = n.saturating_sub(self.free.len());
        if fresh > 0 {
            if self.nodes.len() + fresh > NodeId::MAX as usize {
                return Err(Error::OutOfMemory);
            }
            self.nodes
                .try_reserve(fresh)
                .map_err(|_| Error::OutOfMemory)?;
        }
        Ok(())
    }

    fn alloc(&mut self, node: Node) -> NodeId {
        match self.free.pop() {
            Some(id) => {
                self.nodes[id as usize] = node;
                id
            }
            None => {
                self.nodes.push(node);
                (self.nodes.len() - 1) as NodeId
            }
        }
    }

    fn release(&mut self, id: NodeId) {
        let n = &mut self.nodes[id as usize];
        n.value = None;
        n.left = None;
        n.right = None;
        self.free.push(id);
    }

    #[inline]
    fn target(&self, link: Link) -> Option<NodeId> {
        match link {
            Link::Root => self.root,
            Link::Child(parent, side) => self.nodes[parent as usize].child(side),
        }
    }

    #[inline]
    fn set_target(&mut self, link: Link, id: Option<NodeId>) {
        match link {
            Link::Root => self.root = id,
            Link::Child(parent, side) => self.nodes[parent as usize].set_child(side, id),
        }
    }

    // ---- operations ------------------------------------------------------

    /// Insert `prefix/masklen -> value`. An existing identical key is left
    /// untouched and reported as `Duplicate`.
    pub fn insert(&mut self, prefix: u32, masklen: u8, value: u32) -> Result<(), Error> {
        let masklen = check_masklen(masklen as u32)?;
        let key = canonical(prefix, masklen);
        let mut link = Link::Root;

        loop {
            let Some(cur) = self.target(link) else {
                crate::trie_trace!("[INSERT] empty link, new leaf {key:#010x}/{masklen}");
                self.reserve_entry(1)?;
                let leaf = self.alloc(Node::leaf(key, masklen, value));
                self.set_target(link, Some(leaf));
                self.len += 1;
                return Ok(());
            };

            let (cur_key, cur_len, cur_has_value) = {
                let n = &self.nodes[cur as usize];
                (n.key, n.masklen, n.value.is_some())
            };
            let cpl = common_prefix_len(key, cur_key, masklen.min(cur_len));

            // Same key: either a duplicate or a branch node taking the entry.
            if cpl == masklen && masklen == cur_len {
                if cur_has_value {
                    return Err(Error::Duplicate { prefix: key, masklen });
                }
                self.reserve_entry(0)?;
                crate::trie_trace!("[INSERT] branch node {key:#010x}/{masklen} takes entry");
                self.nodes[cur as usize].value = Some(value);
                self.len += 1;
                return Ok(());
            }

            // New key is a shorter prefix of the current node: insert above.
            if cpl == masklen {
                self.reserve_entry(1)?;
                crate::trie_trace!("[INSERT] above {cur_key:#010x}/{cur_len}");
                let mut node = Node::leaf(key, masklen, value);
                node.set_child(bit_at(cur_key, masklen), Some(cur));
                let id = self.alloc(node);
                self.set_target(link, Some(id));
                self.len += 1;
                return Ok(());
            }

            // Keys diverge inside the current node's prefix: split.
            if cpl < cur_len {
                self.reserve_entry(2)?;
                crate::trie_trace!("[INSERT] split at bit {cpl}");
                let leaf = self.alloc(Node::leaf(key, masklen, value));
                let side = bit_at(key, cpl);
                let mut branch = Node::branch(canonical(key, cpl), cpl);
                branch.set_child(side, Some(leaf));
                branch.set_child(side ^ 1, Some(cur));
                let id = self.alloc(branch);
                self.set_target(link, Some(id));
                self.len += 1;
                return Ok(());
            }

            // Current node is a proper prefix of the new key: descend.
            link = Link::Child(cur, bit_at(key, cur_len));
        }
    }

    /// Remove the entry stored under exactly `prefix/masklen`, returning its
    /// value.
    pub fn delete(&mut self, prefix: u32, masklen: u8) -> Result<u32, Error> {
        let masklen = check_masklen(masklen as u32)?;
        let key = canonical(prefix, masklen);
        let not_found = Error::NotFound { prefix: key, masklen };

        let mut above: Option<Link> = None;
        let mut link = Link::Root;
        let id = loop {
            let id = self.target(link).ok_or_else(|| not_found.clone())?;
            let n = &self.nodes[id as usize];
            if n.masklen > masklen || key & netmask(n.masklen) != n.key {
                return Err(not_found);
            }
            if n.masklen == masklen {
                break id;
            }
            above = Some(link);
            link = Link::Child(id, bit_at(key, n.masklen));
        };

        let value = self.nodes[id as usize]
            .value
            .take()
            .ok_or(not_found)?;
        self.len -= 1;

        let node = &self.nodes[id as usize];
        match (node.left, node.right) {
            // Still a valid branch node.
            (Some(_), Some(_)) => {}
            (Some(c), None) | (None, Some(c)) => {
                self.set_target(link, Some(c));
                self.release(id);
            }
            (None, None) => {
                self.set_target(link, None);
                self.release(id);
                // A branch parent is now down to one child: splice it out.
                if let (Link::Child(parent, _), Some(up)) = (link, above) {
                    let p = &self.nodes[parent as usize];
                    if p.value.is_none() {
                        let survivor = p.only_child();
                        self.set_target(up, survivor);
                        self.release(parent);
                    }
                }
            }
        }
        crate::trie_trace!("[DELETE] removed {key:#010x}/{masklen}");
        Ok(value)
    }

    /// Longest-prefix match for `addr`.
    pub fn lookup(&self, addr: u32) -> Option<u32> {
        let mut best = None;
        let mut cur = self.root;
        while let Some(id) = cur {
            let n = &self.nodes[id as usize];
            if addr & netmask(n.masklen) != n.key {
                break;
            }
            if n.value.is_some() {
                best = n.value;
            }
            if n.masklen >= KEY_BITS {
                break;
            }
            cur = n.child(bit_at(addr, n.masklen));
        }
        best
    }

    /// Like [`lookup`](Self::lookup) but also returns the matching entry.
    pub fn lookup_entry(&self, addr: u32) -> Option<Entry> {
        let mut best = None;
        let mut cur = self.root;
        while let Some(id) = cur {
            let n = &self.nodes[id as usize];
            if addr & netmask(n.masklen) != n.key {
                break;
            }
            if let Some(value) = n.value {
                best = Some(Entry {
                    prefix: n.key,
                    masklen: n.masklen,
                    value,
                });
            }
            if n.masklen >= KEY_BITS {
                break;
            }
            cur = n.child(bit_at(addr, n.masklen));
        }
        best
    }

    /// Exact-match lookup of a stored key.
    pub fn get(&self, prefix: u32, masklen: u8) -> Result<u32, Error> {
        let masklen = check_masklen(masklen as u32)?;
        let key = canonical(prefix, masklen);
        let mut cur = self.root;
        while let Some(id) = cur {
            let n = &self.nodes[id as usize];
            if n.masklen > masklen || key & netmask(n.masklen) != n.key {
                break;
            }
            if n.masklen == masklen {
                return n.value.ok_or(Error::NotFound { prefix: key, masklen });
            }
            cur = n.child(bit_at(key, n.masklen));
        }
        Err(Error::NotFound { prefix: key, masklen })
    }

    pub fn contains(&self, prefix: u32, masklen: u8) -> bool {
        self.get(prefix, masklen).is_ok()
    }

    /// In-order (ascending prefix, then mask length) walk over all entries.
    pub fn walk(&self) -> Walk<'_> {
        Walk::new(self)
    }

    /// Post-order walk letting `visitor` drop the entry just visited.
    /// Children are finished before their parent is looked at, so only
    /// already-visited nodes are ever unlinked. Returns how many entries
    /// were removed.
    pub fn walk_and_delete<F>(&mut self, mut visitor: F) -> usize
    where
        F: FnMut(&Entry) -> WalkAction,
    {
        let before = self.len;
        if let Some(root) = self.root {
            self.root = self.sweep(root, &mut visitor);
        }
        if self.root.is_none() {
            self.nodes.clear();
            self.free.clear();
        }
        before - self.len
    }

    /// Remove every entry; returns how many were stored.
    pub fn flush(&mut self) -> usize {
        self.walk_and_delete(|_| WalkAction::Delete)
    }

    // Returns what should now hang where `id` did. Depth is bounded by the
    // key width, so recursion stays shallow.
    fn sweep<F>(&mut self, id: NodeId, visitor: &mut F) -> Option<NodeId>
    where
        F: FnMut(&Entry) -> WalkAction,
    {
        let (left, right) = {
            let n = &self.nodes[id as usize];
            (n.left, n.right)
        };
        let left = left.and_then(|c| self.sweep(c, visitor));
        let right = right.and_then(|c| self.sweep(c, visitor));

        let n = &mut self.nodes[id as usize];
        n.left = left;
        n.right = right;
        if let Some(value) = n.value {
            let entry = Entry {
                prefix: n.key,
                masklen: n.masklen,
                value,
            };
            if visitor(&entry) == WalkAction::Delete {
                n.value = None;
                self.len -= 1;
            }
        }

        let n = &self.nodes[id as usize];
        if n.value.is_some() {
            return Some(id);
        }
        match (left, right) {
            (Some(_), Some(_)) => Some(id),
            (None, None) => {
                self.release(id);
                None
            }
            _ => {
                let survivor = n.only_child();
                self.release(id);
                survivor
            }
        }
    }

    /// Check the structural invariants, describing the first violation.
    #[doc(hidden)]
    pub fn validate(&self) -> Result<(), String> {
        let mut seen = 0usize;
        let mut stack: Vec<(NodeId, Option<(u32, u8, u8)>)> = Vec::new();
        if let Some(root) = self.root {
            stack.push((root, None));
        }
        while let Some((id, parent)) = stack.pop() {
            let n = &self.nodes[id as usize];
            if n.key != canonical(n.key, n.masklen) {
                return Err(format!("node {id} key {:#x}/{} not canonical", n.key, n.masklen));
            }
            if let Some((pkey, plen, side)) = parent {
                if n.masklen <= plen {
                    return Err(format!("node {id} does not extend its parent"));
                }
                if n.key & netmask(plen) != pkey || bit_at(n.key, plen) != side {
                    return Err(format!("node {id} hangs on the wrong side"));
                }
            }
            match n.value {
                Some(_) => seen += 1,
                None if n.left.is_none() || n.right.is_none() => {
                    return Err(format!("branch node {id} has fewer than two children"));
                }
                None => {}
            }
            if let Some(l) = n.left {
                stack.push((l, Some((n.key, n.masklen, 0))));
            }
            if let Some(r) = n.right {
                stack.push((r, Some((n.key, n.masklen, 1))));
            }
        }
        if seen != self.len {
            return Err(format!("len {} but {} entries reachable", self.len, seen));
        }
        Ok(())
    }
}
