use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Barrier,
    },
    thread,
    time::{Duration, Instant},
};

use cidrtable_core::{
    constants::MAX_TABLES, Command, Error, IpfwTableEntry, IpfwTableHeader, TableId, TableSet,
    TableSetConfig,
};
use rand::Rng;

/// Helper to build a host-order IPv4 key from octets.
fn ipv4(a: u8, b: u8, c: u8, d: u8) -> u32 {
    u32::from_be_bytes([a, b, c, d])
}

#[test]
fn tables_are_isolated() {
    let set = TableSet::default();
    set.add(0, ipv4(10, 0, 0, 0), 8, 1).unwrap();
    set.add(1, ipv4(10, 0, 0, 0), 8, 2).unwrap();
    assert_eq!(set.lookup_table(0, ipv4(10, 9, 9, 9)), Some(1));
    assert_eq!(set.lookup_table(1, ipv4(10, 9, 9, 9)), Some(2));
    assert_eq!(set.lookup_table(2, ipv4(10, 9, 9, 9)), None);

    set.flush(0).unwrap();
    assert_eq!(set.lookup_table(0, ipv4(10, 9, 9, 9)), None);
    assert_eq!(set.lookup_table(1, ipv4(10, 9, 9, 9)), Some(2));
}

#[test]
fn every_table_id_is_usable() {
    let set = TableSet::default();
    for id in 0..MAX_TABLES as TableId {
        set.add(id, ipv4(192, 0, 2, 0), 24, id as u32).unwrap();
    }
    for id in 0..MAX_TABLES as TableId {
        assert_eq!(set.lookup(id, ipv4(192, 0, 2, 77)), Ok(Some(id as u32)));
        assert_eq!(set.count(id), Ok(1));
    }
    assert_eq!(set.flush_all(), MAX_TABLES);
    assert_eq!(
        set.lookup(MAX_TABLES as TableId, 0),
        Err(Error::InvalidTableId(MAX_TABLES as u32))
    );
}

#[test]
fn flush_law_leaves_no_matches() {
    let set = TableSet::default();
    let mut rng = rand::rng();
    for _ in 0..500 {
        let _ = set.add(3, rng.random(), rng.random_range(0..=32), rng.random());
    }
    assert!(set.count(3).unwrap() > 0);
    set.flush(3).unwrap();
    assert_eq!(set.count(3), Ok(0));
    for _ in 0..1000 {
        assert_eq!(set.lookup_table(3, rng.random()), None);
    }
    // The table is usable again afterwards.
    set.add(3, 0, 0, 9).unwrap();
    assert_eq!(set.lookup_table(3, rng.random()), Some(9));
}

#[test]
fn wire_entries_round_trip_through_dump() {
    let set = TableSet::default();
    let added = [
        (ipv4(10, 0, 0, 0), 8, 100),
        (ipv4(10, 1, 0, 0), 16, 200),
        (ipv4(10, 1, 1, 0), 24, 300),
        (ipv4(172, 16, 0, 1), 32, 0),
    ];
    for &(addr, masklen, value) in &added {
        let ent = IpfwTableEntry {
            tbl: 9,
            addr: addr.to_be(),
            value,
            masklen,
        };
        set.add_entry(&ent).unwrap();
    }
    assert_eq!(set.size(9), Ok(added.len() as u32));

    let mut hdr = IpfwTableHeader {
        tbl: 9,
        cnt: 0,
        size: set.size(9).unwrap(),
    };
    let mut buf = vec![IpfwTableEntry::default(); added.len()];
    assert_eq!(set.dump_into(&mut hdr, &mut buf), Ok(added.len() as u32));

    // Re-inserting the dump into a fresh set reproduces every answer.
    let copy = TableSet::default();
    for ent in &buf {
        assert_eq!(ent.tbl, 9);
        copy.add_entry(ent).unwrap();
    }
    let mut rng = rand::rng();
    for _ in 0..2000 {
        let a = ipv4(10, rng.random_range(0..3), rng.random(), rng.random());
        assert_eq!(set.lookup_table(9, a), copy.lookup_table(9, a));
    }
    for ent in &buf {
        assert_eq!(copy.delete_entry(ent), Ok(ent.value));
    }
    assert_eq!(copy.count(9), Ok(0));
}

#[test]
fn duplicate_is_rejected_and_value_kept() {
    let set = TableSet::default();
    set.add(0, ipv4(10, 0, 0, 0), 8, 1).unwrap();
    assert_eq!(
        set.add(0, ipv4(10, 200, 0, 0), 8, 2),
        Err(Error::Duplicate {
            prefix: ipv4(10, 0, 0, 0),
            masklen: 8
        })
    );
    assert_eq!(set.get(0, ipv4(10, 0, 0, 0), 8), Ok(1));
}

#[test]
fn entry_limit_surfaces_out_of_memory() {
    let set = TableSet::new(TableSetConfig::with_entry_limit(100));
    for i in 0..100u32 {
        set.add(5, i << 8, 24, i).unwrap();
    }
    assert_eq!(set.add(5, 0xffff_ff00, 24, 1), Err(Error::OutOfMemory));
    assert_eq!(set.count(5), Ok(100));
    // Freeing one slot makes room again.
    set.delete(5, 0, 24).unwrap();
    set.add(5, 0xffff_ff00, 24, 1).unwrap();
}

#[test]
fn command_script_drives_the_set() {
    let set = TableSet::default();
    let script = "\
        table 2 add 10.0.0.0/8 100
        table 2 add 10.1.0.0/16 200
        table 2 add 10.1.1.0/24 300
        table 2 delete 10.1.0.0/16
        table 2 lookup 10.1.2.5";
    let out: String = script
        .lines()
        .map(|l| Command::parse(l).unwrap().execute(&set).unwrap())
        .collect();
    assert_eq!(out, "100\n");
    assert_eq!(set.lookup_table(2, ipv4(10, 1, 1, 5)), Some(300));
}

/// Readers keep hitting a stable prefix while a writer churns unrelated
/// entries; none of them ever sees a miss or a wrong value.
#[test]
fn readers_run_alongside_writer() {
    let set = Arc::new(TableSet::default());
    set.add(0, ipv4(10, 0, 0, 0), 8, 7).unwrap();

    let n_readers = num_cpus::get().clamp(2, 8);
    let barrier = Arc::new(Barrier::new(n_readers + 1));
    let stop = Arc::new(AtomicBool::new(false));

    let mut handles = Vec::new();
    for _ in 0..n_readers {
        let set = Arc::clone(&set);
        let barrier = Arc::clone(&barrier);
        let stop = Arc::clone(&stop);
        handles.push(thread::spawn(move || {
            let mut rng = rand::rng();
            barrier.wait();
            let mut hits = 0u64;
            while !stop.load(Ordering::Relaxed) {
                let a = ipv4(10, 0, rng.random(), rng.random());
                assert_eq!(set.lookup_table(0, a), Some(7));
                hits += 1;
            }
            hits
        }));
    }

    barrier.wait();
    let deadline = Instant::now() + Duration::from_millis(200);
    let mut round = 0u32;
    while Instant::now() < deadline {
        for i in 1..=64u32 {
            set.add(0, ipv4(10, i as u8, round as u8, 0), 24, i).unwrap();
        }
        for i in 1..=64u32 {
            set.delete(0, ipv4(10, i as u8, round as u8, 0), 24).unwrap();
        }
        round += 1;
    }
    stop.store(true, Ordering::Relaxed);

    for h in handles {
        let hits = h.join().expect("reader thread panicked");
        assert!(hits > 0);
    }
    assert_eq!(set.count(0), Ok(1));
}

/// A flush is one exclusive section. Entries go in as `a` then `b`, so a
/// reader may see `{}`, `{a}` or `{a, b}`; `b` without `a` would mean it
/// observed a flush half done.
#[test]
fn flush_is_atomic_for_readers() {
    let set = Arc::new(TableSet::default());
    let a = ipv4(10, 0, 0, 1);
    let b = ipv4(192, 168, 0, 1);
    let stop = Arc::new(AtomicBool::new(false));

    let reader = {
        let set = Arc::clone(&set);
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            while !stop.load(Ordering::Relaxed) {
                let (x, y) = set
                    .table(1)
                    .unwrap()
                    .with_trie(|t| (t.lookup(a), t.lookup(b)));
                assert!(x.is_some() || y.is_none(), "torn flush observed");
            }
        })
    };

    for _ in 0..2000 {
        set.add(1, a, 32, 1).unwrap();
        set.add(1, b, 32, 2).unwrap();
        assert_eq!(set.flush(1), Ok(2));
    }
    stop.store(true, Ordering::Relaxed);
    reader.join().expect("reader thread panicked");
}

#[test]
fn concurrent_writers_on_distinct_tables() {
    let set = Arc::new(TableSet::default());
    let n = num_cpus::get().clamp(2, 8);
    let handles: Vec<_> = (0..n)
        .map(|id| {
            let set = Arc::clone(&set);
            thread::spawn(move || {
                for i in 0..1000u32 {
                    set.add(id as TableId, i << 12, 20, i).unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().expect("writer thread panicked");
    }
    for id in 0..n {
        assert_eq!(set.count(id as TableId), Ok(1000));
        assert_eq!(set.lookup_table(id as TableId, (999 << 12) | 5), Some(999));
    }
}
