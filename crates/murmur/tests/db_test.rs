//! End-to-end write, read and propagation tests against a pinned clock.

use murmur::{AggregationMethod, ManualClock, Murmur, MurmurError};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Creates a `10s:1m, 1m:5m` database (archives: 10s x 6, 60s x 5).
fn create_two_tier(dir: &TempDir, x_files_factor: u8) -> PathBuf {
    let path = dir.path().join("db.mmr");
    Murmur::create(
        &path,
        &["10s:1m", "1m:5m"],
        AggregationMethod::Average,
        x_files_factor,
    )
    .unwrap();
    path
}

fn open_at(path: &Path, now: u64) -> (Murmur, ManualClock) {
    let clock = ManualClock::new(now);
    let db = Murmur::open_with_clock(path, Box::new(clock.clone())).unwrap();
    (db, clock)
}

#[test]
fn test_sanity_roundtrip_and_first_propagation() {
    let dir = TempDir::new().unwrap();
    let path = create_two_tier(&dir, 0);
    let (mut db, _clock) = open_at(&path, 1000);

    db.set(1000, 100.0).unwrap();
    assert_eq!(db.get(1000).unwrap(), 100.0);

    // One written point averaged over the otherwise-empty 6-slot window.
    assert_eq!(db.read_archive(1, 1000).unwrap(), 100.0 / 6.0);
}

#[test]
fn test_filling_one_coarse_bucket() {
    let dir = TempDir::new().unwrap();
    let path = create_two_tier(&dir, 0);

    // Start just before the fine ring's fifth turn so the six writes land on
    // slots 5 down to 0 and the last write sits on a coarse bucket boundary.
    let t0 = 5 * 60 - 10;
    let (mut db, _clock) = open_at(&path, t0);

    let mut at = t0;
    let mut value = 100.0;
    for _ in 0..6 {
        db.set(at, value).unwrap();
        at -= 10;
        value += 100.0;
    }

    // Every fine-grained point reads back exactly.
    let mut at = t0;
    for i in 0..6 {
        assert_eq!(db.get(at).unwrap(), 100.0 + 100.0 * i as f64);
        at -= 10;
    }

    // The coarse bucket covering the window holds the full average.
    assert_eq!(
        db.read_archive(1, t0).unwrap(),
        (100.0 + 200.0 + 300.0 + 400.0 + 500.0 + 600.0) / 6.0
    );
}

#[test]
fn test_value_bits_survive_roundtrip() {
    let dir = TempDir::new().unwrap();
    let path = create_two_tier(&dir, 0);
    let (mut db, _clock) = open_at(&path, 1000);

    for value in [
        0.0,
        1.0,
        100.0 / 6.0,
        f64::MIN_POSITIVE,
        f64::MAX,
        12345.678901234567,
    ] {
        db.set(995, value).unwrap();
        assert_eq!(db.get(995).unwrap().to_bits(), value.to_bits());
    }
}

#[test]
fn test_writes_near_ring_end_do_not_collide_with_start() {
    let dir = TempDir::new().unwrap();
    let path = create_two_tier(&dir, 0);

    let retention = 60;
    let t0 = 5 * retention - 10;
    let (mut db, _clock) = open_at(&path, t0);

    for i in 0..6u64 {
        db.set(t0 - 10 * i, i as f64).unwrap();
    }
    for i in 0..6u64 {
        assert_eq!(db.get(t0 - 10 * i).unwrap(), i as f64);
    }
}

#[test]
fn test_propagation_window_wraps_the_ring() {
    let dir = TempDir::new().unwrap();
    let path = create_two_tier(&dir, 0);
    let (mut db, clock) = open_at(&path, 1000);

    // Slot indexes 4, 5 and (after wrapping) 0 of the fine ring.
    db.set(1000, 1.0).unwrap();
    clock.set(1010);
    db.set(1010, 2.0).unwrap();
    clock.set(1020);
    db.set(1020, 3.0).unwrap();

    // All three points survive in the ring despite the wrap.
    assert_eq!(db.get(1000).unwrap(), 1.0);
    assert_eq!(db.get(1010).unwrap(), 2.0);
    assert_eq!(db.get(1020).unwrap(), 3.0);

    // Window of the 1020 write: slots 0..=5 hold 1020, empty x3, 1000, 1010.
    assert_eq!(db.read_archive(1, 1020).unwrap(), (3.0 + 1.0 + 2.0) / 6.0);
}

#[test]
fn test_propagated_value_matches_aggregate_of_current_window() {
    let dir = TempDir::new().unwrap();
    let path = create_two_tier(&dir, 0);
    let t0 = 5 * 60 - 10;
    let (mut db, _clock) = open_at(&path, t0);

    // Overwrite one bucket mid-sequence; the re-aggregation must see the
    // final contents of the window, not the write history.
    for i in 0..6u64 {
        db.set(t0 - 10 * i, 100.0).unwrap();
    }
    db.set(t0 - 50, 700.0).unwrap();

    assert_eq!(
        db.read_archive(1, t0 - 50).unwrap(),
        (100.0 * 5.0 + 700.0) / 6.0
    );
}

#[test]
fn test_out_of_window_timestamps_are_domain_errors() {
    let dir = TempDir::new().unwrap();
    let path = create_two_tier(&dir, 0);
    let now = 10_000;
    let (mut db, _clock) = open_at(&path, now);
    assert_eq!(db.max_retention(), 300);

    assert!(matches!(
        db.set(now + 1, 1.0),
        Err(MurmurError::NoSuitableArchive(_))
    ));
    assert!(matches!(
        db.set(now - 600, 1.0),
        Err(MurmurError::NoSuitableArchive(_))
    ));
    assert!(matches!(
        db.get(now + 1),
        Err(MurmurError::NoSuitableArchive(_))
    ));
    assert!(matches!(
        db.get(now - 600),
        Err(MurmurError::NoSuitableArchive(_))
    ));
}

#[test]
fn test_write_at_now_is_accepted() {
    let dir = TempDir::new().unwrap();
    let path = create_two_tier(&dir, 0);
    let (mut db, _clock) = open_at(&path, 1000);

    db.set(1000, 42.0).unwrap();
    assert_eq!(db.get(1000).unwrap(), 42.0);
}

#[test]
fn test_sparse_window_skips_propagation() {
    let dir = TempDir::new().unwrap();
    let path = create_two_tier(&dir, 50);
    let t0 = 5 * 60 - 10;
    let (mut db, _clock) = open_at(&path, t0);

    // One known point out of six is below the 50% threshold.
    db.set(t0, 60.0).unwrap();
    assert_eq!(db.read_archive(1, t0).unwrap(), 0.0);

    // Two known points: still below ceil(6 * 50 / 100) = 3.
    db.set(t0 - 10, 120.0).unwrap();
    assert_eq!(db.read_archive(1, t0 - 10).unwrap(), 0.0);

    // The third known point crosses the threshold and propagates.
    db.set(t0 - 20, 180.0).unwrap();
    assert_eq!(
        db.read_archive(1, t0 - 20).unwrap(),
        (60.0 + 120.0 + 180.0) / 6.0
    );
}

#[test]
fn test_direct_write_to_coarser_archive() {
    let dir = TempDir::new().unwrap();
    let path = create_two_tier(&dir, 0);

    // A timestamp older than the fine ring's retention but inside the
    // coarse one selects the coarse archive as primary.
    let now = 1000;
    let (mut db, _clock) = open_at(&path, now);

    let old = now - 120;
    db.set(old, 7.0).unwrap();
    assert_eq!(db.get(old).unwrap(), 7.0);
    assert_eq!(db.read_archive(1, old).unwrap(), 7.0);

    // The fine ring's slot for that phase stays untouched.
    assert!(db
        .dump_archive(0)
        .unwrap()
        .iter()
        .all(|point| point.is_empty()));
}

#[test]
fn test_timestamp_at_the_horizon_uses_the_coarsest_archive() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("horizon.mmr");
    Murmur::create(&path, &["10s:1m"], AggregationMethod::Average, 0).unwrap();

    // diff == max_retention: no archive strictly covers it; the coarsest
    // catches the fall-through.
    let (mut db, _clock) = open_at(&path, 1060);
    db.set(1000, 5.0).unwrap();
    assert_eq!(db.get(1000).unwrap(), 5.0);
}

#[test]
fn test_get_returns_stale_slots_unchecked() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("stale.mmr");
    Murmur::create(&path, &["10s:1m"], AggregationMethod::Average, 0).unwrap();

    let (mut db, clock) = open_at(&path, 1000);
    db.set(1000, 9.0).unwrap();

    // One full retention later the same slot answers for the new phase;
    // the interval is not validated on read.
    clock.set(1060);
    assert_eq!(db.get(1060).unwrap(), 9.0);

    let points = db.dump_archive(0).unwrap();
    let slot = points.iter().find(|p| !p.is_empty()).unwrap();
    assert_eq!(slot.interval, 1000);
}

#[test]
fn test_last_aggregation_follows_the_newest_interval() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("last.mmr");
    Murmur::create(&path, &["10s:1m", "1m:5m"], AggregationMethod::Last, 0).unwrap();

    let t0 = 5 * 60 - 10;
    let (mut db, _clock) = open_at(&path, t0);

    // Written oldest-first; the consolidated value must track the slot with
    // the greatest interval, not the most recent write.
    db.set(t0 - 20, 1.0).unwrap();
    db.set(t0, 3.0).unwrap();
    db.set(t0 - 10, 2.0).unwrap();

    assert_eq!(db.read_archive(1, t0).unwrap(), 3.0);
}

#[test]
fn test_dump_exposes_raw_ring_slots() {
    let dir = TempDir::new().unwrap();
    let path = create_two_tier(&dir, 0);
    let (mut db, _clock) = open_at(&path, 1000);

    db.set(1000, 4.5).unwrap();

    let fine = db.dump_archive(0).unwrap();
    assert_eq!(fine.len(), 6);
    let written: Vec<_> = fine.iter().filter(|p| !p.is_empty()).collect();
    assert_eq!(written.len(), 1);
    assert_eq!(written[0].interval, 1000);
    assert_eq!(written[0].value(), 4.5);

    let coarse = db.dump_archive(1).unwrap();
    assert_eq!(coarse.len(), 5);
    assert_eq!(coarse.iter().filter(|p| !p.is_empty()).count(), 1);
}
