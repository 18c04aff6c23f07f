use cidrtable_core::helpers::{canonical, netmask};
use cidrtable_core::{Error, PrefixTrie, WalkAction};
use proptest::collection::vec as pvec;
use proptest::prelude::*;
use rand::Rng;
use std::collections::BTreeMap;

fn ip(a: u8, b: u8, c: u8, d: u8) -> u32 {
    u32::from_be_bytes([a, b, c, d])
}

/// Brute-force reference: every stored key, scanned linearly.
#[derive(Default)]
struct Model {
    entries: BTreeMap<(u32, u8), u32>,
}

impl Model {
    fn insert(&mut self, prefix: u32, masklen: u8, value: u32) -> bool {
        let key = (canonical(prefix, masklen), masklen);
        if self.entries.contains_key(&key) {
            return false;
        }
        self.entries.insert(key, value);
        true
    }

    fn lookup(&self, addr: u32) -> Option<u32> {
        self.entries
            .iter()
            .filter(|((p, m), _)| addr & netmask(*m) == *p)
            .max_by_key(|((_, m), _)| *m)
            .map(|(_, v)| *v)
    }
}

/// Prefixes clustered in a few /8s so that nesting and splits are common.
fn prefix_strategy() -> impl Strategy<Value = (u32, u8)> {
    (0u32..4, any::<u32>(), 0u8..=32).prop_map(|(hi, lo, m)| (((10 + hi) << 24) | (lo >> 8), m))
}

fn sample_addrs(model: &Model, extra: &[u32]) -> Vec<u32> {
    let mut addrs: Vec<u32> = extra.to_vec();
    for &(p, m) in model.entries.keys() {
        addrs.push(p);
        addrs.push(p | !netmask(m));
        addrs.push(p.wrapping_sub(1));
    }
    addrs
}

#[test]
fn concrete_nested_scenario() {
    let mut t = PrefixTrie::new();
    t.insert(ip(10, 0, 0, 0), 8, 100).unwrap();
    t.insert(ip(10, 1, 0, 0), 16, 200).unwrap();
    t.insert(ip(10, 1, 1, 0), 24, 300).unwrap();
    assert_eq!(t.lookup(ip(10, 1, 1, 5)), Some(300));
    assert_eq!(t.lookup(ip(10, 1, 2, 5)), Some(200));
    assert_eq!(t.lookup(ip(10, 2, 0, 0)), Some(100));
    assert_eq!(t.lookup(ip(11, 0, 0, 0)), None);
}

#[test]
fn default_entry_catches_all() {
    let mut t = PrefixTrie::new();
    t.insert(0, 0, 1).unwrap();
    let mut rng = rand::rng();
    for _ in 0..1000 {
        assert_eq!(t.lookup(rng.random()), Some(1));
    }
}

#[test]
fn many_host_routes() {
    let mut t = PrefixTrie::new();
    for i in 0..10_000u32 {
        t.insert(i.wrapping_mul(2_654_435_761), 32, i).unwrap();
    }
    t.validate().unwrap();
    for i in 0..10_000u32 {
        assert_eq!(t.lookup(i.wrapping_mul(2_654_435_761)), Some(i));
    }
    assert_eq!(t.len(), 10_000);
    for i in (0..10_000u32).step_by(2) {
        assert_eq!(t.delete(i.wrapping_mul(2_654_435_761), 32), Ok(i));
    }
    t.validate().unwrap();
    assert_eq!(t.len(), 5_000);
}

#[test]
fn delete_of_missing_key_is_not_found() {
    let mut t = PrefixTrie::new();
    assert_eq!(
        t.delete(ip(10, 0, 0, 0), 8),
        Err(Error::NotFound { prefix: ip(10, 0, 0, 0), masklen: 8 })
    );
    t.insert(ip(10, 0, 0, 0), 8, 1).unwrap();
    assert!(t.delete(ip(10, 0, 0, 0), 16).is_err());
    assert_eq!(t.delete(ip(10, 0, 0, 0), 8), Ok(1));
    assert!(t.delete(ip(10, 0, 0, 0), 8).is_err());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn longest_prefix_match_law(
        keys in pvec(prefix_strategy(), 1..60),
        extra in pvec(any::<u32>(), 0..20),
    ) {
        let mut trie = PrefixTrie::new();
        let mut model = Model::default();
        for (i, &(p, m)) in keys.iter().enumerate() {
            let fresh = model.insert(p, m, i as u32);
            let got = trie.insert(p, m, i as u32);
            prop_assert_eq!(got.is_ok(), fresh);
            if !fresh {
                let is_duplicate = matches!(got, Err(Error::Duplicate { .. }));
                prop_assert!(is_duplicate);
            }
        }
        prop_assert!(trie.validate().is_ok());
        prop_assert_eq!(trie.len(), model.entries.len());
        for addr in sample_addrs(&model, &extra) {
            prop_assert_eq!(trie.lookup(addr), model.lookup(addr), "addr {:#x}", addr);
        }
    }

    #[test]
    fn delete_law(
        keys in pvec(prefix_strategy(), 1..60),
        picks in pvec(any::<prop::sample::Index>(), 1..30),
    ) {
        let mut trie = PrefixTrie::new();
        let mut model = Model::default();
        for (i, &(p, m)) in keys.iter().enumerate() {
            if model.insert(p, m, i as u32) {
                trie.insert(p, m, i as u32).unwrap();
            }
        }
        let stored: Vec<(u32, u8)> = model.entries.keys().copied().collect();
        for pick in picks {
            let (p, m) = *pick.get(&stored);
            let expected = model.entries.remove(&(p, m));
            let got = trie.delete(p, m);
            prop_assert_eq!(got.ok(), expected);
            prop_assert!(trie.validate().is_ok());
        }
        prop_assert_eq!(trie.len(), model.entries.len());
        for addr in sample_addrs(&model, &stored.iter().map(|k| k.0).collect::<Vec<_>>()) {
            prop_assert_eq!(trie.lookup(addr), model.lookup(addr));
        }
    }

    #[test]
    fn duplicate_law(p in any::<u32>(), m in 0u8..=32, v1 in any::<u32>(), v2 in any::<u32>()) {
        let mut trie = PrefixTrie::new();
        trie.insert(p, m, v1).unwrap();
        prop_assert_eq!(
            trie.insert(p, m, v2),
            Err(Error::Duplicate { prefix: canonical(p, m), masklen: m })
        );
        prop_assert_eq!(trie.lookup(p), Some(v1));
        prop_assert_eq!(trie.len(), 1);
    }

    #[test]
    fn walk_round_trip_law(keys in pvec(prefix_strategy(), 0..60), extra in pvec(any::<u32>(), 0..20)) {
        let mut trie = PrefixTrie::new();
        let mut model = Model::default();
        for (i, &(p, m)) in keys.iter().enumerate() {
            if model.insert(p, m, i as u32) {
                trie.insert(p, m, i as u32).unwrap();
            }
        }
        let dumped: Vec<_> = trie.walk().collect();
        let walked: Vec<(u32, u8)> = dumped.iter().map(|e| (e.prefix, e.masklen)).collect();
        let sorted: Vec<(u32, u8)> = model.entries.keys().copied().collect();
        prop_assert_eq!(&walked, &sorted);

        let before: Vec<_> = sample_addrs(&model, &extra).into_iter().map(|a| (a, trie.lookup(a))).collect();
        prop_assert_eq!(trie.flush(), dumped.len());
        prop_assert!(trie.is_empty());
        for e in &dumped {
            trie.insert(e.prefix, e.masklen, e.value).unwrap();
        }
        prop_assert!(trie.validate().is_ok());
        for (a, v) in before {
            prop_assert_eq!(trie.lookup(a), v);
        }
    }

    #[test]
    fn walk_and_delete_matches_filter(keys in pvec(prefix_strategy(), 0..60), modulus in 2u32..5) {
        let mut trie = PrefixTrie::new();
        let mut model = Model::default();
        for (i, &(p, m)) in keys.iter().enumerate() {
            if model.insert(p, m, i as u32) {
                trie.insert(p, m, i as u32).unwrap();
            }
        }
        let removed = trie.walk_and_delete(|e| {
            if e.value % modulus == 0 { WalkAction::Delete } else { WalkAction::Keep }
        });
        let before = model.entries.len();
        model.entries.retain(|_, v| *v % modulus != 0);
        prop_assert_eq!(removed, before - model.entries.len());
        prop_assert!(trie.validate().is_ok());
        for addr in sample_addrs(&model, &[]) {
            prop_assert_eq!(trie.lookup(addr), model.lookup(addr));
        }
    }
}
