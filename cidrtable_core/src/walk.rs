//! Ordered traversal of a [`PrefixTrie`].

use crate::trie::{NodeId, PrefixTrie};
use crate::types::Entry;

/// Visitor verdict for [`PrefixTrie::walk_and_delete`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum WalkAction {
    Keep,
    Delete,
}

/// Lazy pre-order walk, which for a Patricia trie yields entries sorted by
/// `(prefix, masklen)`. Holding a `Walk` borrows the trie, so it cannot be
/// mutated mid-walk.
pub struct Walk<'a> {
    trie: &'a PrefixTrie,
    stack: Vec<NodeId>,
}

impl<'a> Walk<'a> {
    pub(crate) fn new(trie: &'a PrefixTrie) -> Self {
        let mut walk = Self {
            trie,
            stack: Vec::new(),
        };
        walk.rewind();
        walk
    }

    /// Start over from the smallest entry.
    pub fn rewind(&mut self) {
        self.stack.clear();
        if let Some(root) = self.trie.root() {
            self.stack.push(root);
        }
    }
}

impl Iterator for Walk<'_> {
    type Item = Entry;

    fn next(&mut self) -> Option<Entry> {
        while let Some(id) = self.stack.pop() {
            let n = self.trie.node(id);
            if let Some(r) = n.right {
                self.stack.push(r);
            }
            if let Some(l) = n.left {
                self.stack.push(l);
            }
            if let Some(value) = n.value {
                return Some(Entry {
                    prefix: n.key,
                    masklen: n.masklen,
                    value,
                });
            }
        }
        None
    }
}
