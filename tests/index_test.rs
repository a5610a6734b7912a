use std::collections::BTreeMap;
use std::path::PathBuf;

use quill_index::storage::page::TreePage;
use quill_index::{
    CompOp, IndexConfig, IndexHandle, IndexKey, IndexManager, IndexScan, KeyKind, QuillIndexError,
    RecordId,
};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use strum::IntoEnumIterator;
use tempfile::TempDir;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn setup(config: IndexConfig) -> (TempDir, IndexManager, PathBuf) {
    init_logger();
    let temp_dir = TempDir::new().unwrap();
    let base = temp_dir.path().join("relation");
    (temp_dir, IndexManager::new(config), base)
}

fn int_index(config: IndexConfig) -> (TempDir, IndexManager, IndexHandle) {
    let (temp_dir, manager, base) = setup(config);
    manager.create_index(&base, 0, KeyKind::Int, 4).unwrap();
    let handle = manager.open_index(&base, 0).unwrap();
    (temp_dir, manager, handle)
}

fn int_key(key: i32) -> IndexKey {
    IndexKey::from_i32(key)
}

fn collect(scan: IndexScan) -> Vec<RecordId> {
    scan.map(|rid| rid.unwrap()).collect()
}

fn scan_all(handle: &IndexHandle) -> Vec<RecordId> {
    collect(handle.scan(CompOp::NoOp, None).unwrap())
}

fn root_shape(handle: &IndexHandle) -> (bool, usize) {
    let root = handle.root_page_num();
    let guard = handle.file().fetch_page_read(root).unwrap();
    let node = TreePage::new(guard.data()).unwrap();
    (node.is_leaf(), node.key_count())
}

#[test]
fn scan_returns_entries_in_key_order() {
    let (_temp_dir, _manager, handle) = int_index(IndexConfig::default());
    let mut entries = vec![];
    for key in 0..3000 {
        // three RIDs per key
        entries.push((key % 1000, RecordId::new(key % 1000, key / 1000)));
    }
    entries.shuffle(&mut StdRng::seed_from_u64(42));
    for (key, rid) in &entries {
        handle.insert(int_key(*key).as_bytes(), *rid).unwrap();
    }

    let scanned = scan_all(&handle);
    assert_eq!(scanned.len(), entries.len());
    for pair in scanned.windows(2) {
        assert!(pair[0].page_num <= pair[1].page_num);
    }
    let mut expected: Vec<RecordId> = entries.iter().map(|(_, rid)| *rid).collect();
    expected.sort();
    let mut sorted = scanned.clone();
    sorted.sort();
    assert_eq!(sorted, expected);
}

#[test]
fn rids_of_one_key_come_back_in_insertion_order() {
    let (_temp_dir, _manager, handle) = int_index(IndexConfig::default());
    let rids: Vec<RecordId> = [9, 3, 7, 1, 5]
        .iter()
        .map(|slot| RecordId::new(100, *slot))
        .collect();
    for rid in &rids {
        handle.insert(int_key(1).as_bytes(), *rid).unwrap();
    }
    handle.insert(int_key(0).as_bytes(), RecordId::new(0, 0)).unwrap();

    let key = int_key(1);
    let scanned = collect(handle.scan(CompOp::Eq, Some(key.as_bytes())).unwrap());
    assert_eq!(scanned, rids);
}

#[test]
fn deleted_keys_disappear_from_scans() {
    let (_temp_dir, _manager, handle) = int_index(IndexConfig::default());
    for key in 0..100 {
        for slot in 0..3 {
            handle
                .insert(int_key(key).as_bytes(), RecordId::new(key, slot))
                .unwrap();
        }
    }
    for slot in 0..3 {
        handle
            .delete(int_key(42).as_bytes(), RecordId::new(42, slot))
            .unwrap();
    }

    let key = int_key(42);
    assert!(collect(handle.scan(CompOp::Eq, Some(key.as_bytes())).unwrap()).is_empty());
    let all = scan_all(&handle);
    assert_eq!(all.len(), 297);
    assert!(all.iter().all(|rid| rid.page_num != 42));

    // a RID that was never inserted leaves everything as it was
    assert!(matches!(
        handle.delete(int_key(41).as_bytes(), RecordId::new(41, 3)),
        Err(QuillIndexError::RidNotFound(rid)) if rid == RecordId::new(41, 3)
    ));
    assert!(matches!(
        handle.delete(int_key(1000).as_bytes(), RecordId::new(1000, 0)),
        Err(QuillIndexError::RidNotFound(_))
    ));
    assert!(matches!(
        handle.delete(int_key(42).as_bytes(), RecordId::new(42, 0)),
        Err(QuillIndexError::RidNotFound(_))
    ));
    assert_eq!(scan_all(&handle), all);
}

#[test]
fn duplicate_entry_is_rejected() {
    let (_temp_dir, _manager, handle) = int_index(IndexConfig::default());
    let rid = RecordId::new(3, 4);
    handle.insert(int_key(5).as_bytes(), rid).unwrap();
    assert!(matches!(
        handle.insert(int_key(5).as_bytes(), rid),
        Err(QuillIndexError::DuplicateEntry(dup)) if dup == rid
    ));
    // the same RID under another key is a different entry
    handle.insert(int_key(6).as_bytes(), rid).unwrap();
    assert_eq!(scan_all(&handle), vec![rid, rid]);
}

#[test]
fn root_splits_after_max_keys() {
    let (_temp_dir, manager, handle) = int_index(IndexConfig::default());
    let max_keys = 508;
    for key in 0..max_keys {
        handle
            .insert(int_key(key).as_bytes(), RecordId::new(key, 0))
            .unwrap();
    }
    assert_eq!(root_shape(&handle), (true, max_keys as usize));
    assert_eq!(handle.root_page_num(), 0);

    handle
        .insert(int_key(max_keys).as_bytes(), RecordId::new(max_keys, 0))
        .unwrap();
    assert_ne!(handle.root_page_num(), 0);
    assert_eq!(root_shape(&handle), (false, 1));

    let keys: Vec<i32> = scan_all(&handle).iter().map(|rid| rid.page_num).collect();
    assert_eq!(keys, (0..=max_keys).collect::<Vec<_>>());

    let dot = handle.to_dot().unwrap();
    assert!(dot.starts_with("digraph BPlusTree {"));
    assert!(dot.contains("[style=dashed]"));

    // the grown root is found again after reopening
    let root = handle.root_page_num();
    manager.close_index(&handle).unwrap();
    let handle = manager
        .open_index(handle.file().path().with_extension(""), 0)
        .unwrap();
    assert_eq!(handle.root_page_num(), root);
    assert_eq!(scan_all(&handle).len(), max_keys as usize + 1);
}

#[test]
fn one_key_holds_thousands_of_rids() {
    let (_temp_dir, _manager, handle) = int_index(IndexConfig::default());
    let key = int_key(7);
    for slot in 0..5000 {
        handle.insert(key.as_bytes(), RecordId::new(1, slot)).unwrap();
    }
    assert_eq!(root_shape(&handle), (true, 1));

    let eq = collect(handle.scan(CompOp::Eq, Some(key.as_bytes())).unwrap());
    assert_eq!(eq.len(), 5000);
    let all = scan_all(&handle);
    let slots: Vec<i32> = all.iter().map(|rid| rid.slot_num).collect();
    assert_eq!(slots, (0..5000).collect::<Vec<_>>());

    for slot in (1..5000).step_by(2) {
        handle.delete(key.as_bytes(), RecordId::new(1, slot)).unwrap();
    }
    let remaining = collect(handle.scan(CompOp::Eq, Some(key.as_bytes())).unwrap());
    assert_eq!(remaining.len(), 2500);
    assert!(remaining.iter().all(|rid| rid.slot_num % 2 == 0));
}

#[test]
fn string_keys_compare_every_byte() {
    let (_temp_dir, manager, base) = setup(IndexConfig::default());
    manager.create_index(&base, 2, KeyKind::Str, 8).unwrap();
    let handle = manager.open_index(&base, 2).unwrap();

    handle.insert(b"abcdefgi", RecordId::new(2, 0)).unwrap();
    handle.insert(b"abcdefgh", RecordId::new(1, 0)).unwrap();
    let short = IndexKey::from_str("abc", 8).unwrap();
    handle.insert(short.as_bytes(), RecordId::new(0, 0)).unwrap();

    assert_eq!(
        scan_all(&handle),
        vec![RecordId::new(0, 0), RecordId::new(1, 0), RecordId::new(2, 0)]
    );
    assert_eq!(
        collect(handle.scan(CompOp::Eq, Some(&b"abcdefgh"[..])).unwrap()),
        vec![RecordId::new(1, 0)]
    );
    assert!(matches!(
        handle.insert(b"abc", RecordId::new(3, 0)),
        Err(QuillIndexError::BadArguments(_))
    ));
}

#[test]
fn float_keys_scan_in_numeric_order() {
    let (_temp_dir, manager, base) = setup(IndexConfig::default());
    manager.create_index(&base, 0, KeyKind::Float, 4).unwrap();
    let handle = manager.open_index(&base, 0).unwrap();

    let values = [3.5f32, -2.0, 0.25, 100.0, -0.5, 7.75];
    for (i, value) in values.iter().enumerate() {
        handle
            .insert(IndexKey::from_f32(*value).as_bytes(), RecordId::new(i as i32, 0))
            .unwrap();
    }
    let order: Vec<i32> = scan_all(&handle).iter().map(|rid| rid.page_num).collect();
    assert_eq!(order, vec![1, 4, 2, 0, 5, 3]);

    let zero = IndexKey::from_f32(0.0);
    let negatives = collect(handle.scan(CompOp::Lt, Some(zero.as_bytes())).unwrap());
    assert_eq!(negatives, vec![RecordId::new(1, 0), RecordId::new(4, 0)]);
}

#[test]
fn deep_tree_of_wide_keys_matches_model() {
    let config = IndexConfig::default()
        .with_buffer_pool(IndexConfig::default().buffer_pool.with_buffer_pool_size(32usize));
    let (_temp_dir, manager, base) = setup(config);
    // 18 keys per node, so a few thousand keys build several internal levels
    manager.create_index(&base, 0, KeyKind::Str, 200).unwrap();
    let handle = manager.open_index(&base, 0).unwrap();

    let mut ids: Vec<i32> = (0..3000).collect();
    ids.shuffle(&mut StdRng::seed_from_u64(7));
    let mut model = BTreeMap::new();
    for id in &ids {
        let key = IndexKey::from_str(&format!("key-{:05}", id), 200).unwrap();
        let rid = RecordId::new(*id, id % 13);
        handle.insert(key.as_bytes(), rid).unwrap();
        model.insert(key, rid);
    }

    let expected: Vec<RecordId> = model.values().copied().collect();
    assert_eq!(scan_all(&handle), expected);

    let bound = IndexKey::from_str("key-01500", 200).unwrap();
    let ge = collect(handle.scan(CompOp::Ge, Some(bound.as_bytes())).unwrap());
    let expected_ge: Vec<RecordId> = model.range(bound.clone()..).map(|(_, rid)| *rid).collect();
    assert_eq!(ge, expected_ge);

    for id in ids.iter().filter(|id| *id % 3 == 0) {
        let key = IndexKey::from_str(&format!("key-{:05}", id), 200).unwrap();
        handle.delete(key.as_bytes(), RecordId::new(*id, id % 13)).unwrap();
        model.remove(&key);
    }
    let expected: Vec<RecordId> = model.values().copied().collect();
    assert_eq!(scan_all(&handle), expected);
}

#[test]
fn seek_and_sweep_scans_agree() {
    let seek = IndexConfig::default();
    let sweep = IndexConfig::default().with_scan_seek_enable(false);
    let (_dir_a, _manager_a, seeking) = int_index(seek);
    let (_dir_b, _manager_b, sweeping) = int_index(sweep);

    let mut keys: Vec<i32> = (0..2000).map(|k| k * 2).collect();
    keys.shuffle(&mut StdRng::seed_from_u64(3));
    for key in &keys {
        for slot in 0..2 {
            let rid = RecordId::new(*key, slot);
            seeking.insert(int_key(*key).as_bytes(), rid).unwrap();
            sweeping.insert(int_key(*key).as_bytes(), rid).unwrap();
        }
    }

    for value in [-5, 0, 1, 999, 1000, 2500, 3998, 3999, 5000] {
        let value = int_key(value);
        for op in CompOp::iter() {
            let a = collect(seeking.scan(op, Some(value.as_bytes())).unwrap());
            let b = collect(sweeping.scan(op, Some(value.as_bytes())).unwrap());
            assert_eq!(a, b, "{} {}", op, value);
            assert!(a
                .iter()
                .all(|rid| op.matches(&int_key(rid.page_num).as_key_ref(), &value.as_key_ref())));
        }
    }
}

#[test]
fn delete_while_scanning() {
    let (_temp_dir, _manager, handle) = int_index(IndexConfig::default());
    for key in 0..600 {
        handle
            .insert(int_key(key).as_bytes(), RecordId::new(key, 0))
            .unwrap();
    }

    let mut scan = handle.scan(CompOp::NoOp, None).unwrap();
    let mut seen = vec![];
    loop {
        let rid = scan.next_entry().unwrap();
        if rid.is_end() {
            break;
        }
        seen.push(rid.page_num);
        handle.delete(int_key(rid.page_num).as_bytes(), rid).unwrap();
        // also drop an entry the cursor has not reached yet
        if rid.page_num % 2 == 0 && rid.page_num + 1 < 600 {
            handle
                .delete(
                    int_key(rid.page_num + 1).as_bytes(),
                    RecordId::new(rid.page_num + 1, 0),
                )
                .unwrap();
        }
    }
    assert_eq!(seen, (0..600).step_by(2).collect::<Vec<_>>());
    assert_eq!(scan.next_entry().unwrap(), RecordId::END);
    assert!(scan_all(&handle).is_empty());
}

#[test]
fn scan_arguments_are_checked() {
    let (_temp_dir, _manager, handle) = int_index(IndexConfig::default());
    assert!(matches!(
        handle.scan(CompOp::Eq, None),
        Err(QuillIndexError::BadArguments(_))
    ));
    assert!(matches!(
        handle.scan(CompOp::Ge, Some(&[1u8, 2][..])),
        Err(QuillIndexError::BadArguments(_))
    ));
    assert!(matches!(
        handle.insert(&[0; 8], RecordId::new(0, 0)),
        Err(QuillIndexError::BadArguments(_))
    ));
    assert!(matches!(
        handle.delete(&[], RecordId::new(0, 0)),
        Err(QuillIndexError::BadArguments(_))
    ));

    // no entries at all
    let mut scan = handle.scan(CompOp::NoOp, None).unwrap();
    assert_eq!(scan.next_entry().unwrap(), RecordId::END);
    assert_eq!(scan.next_entry().unwrap(), RecordId::END);

    handle.insert(int_key(1).as_bytes(), RecordId::new(1, 1)).unwrap();
    let mut scan = handle.scan(CompOp::NoOp, None).unwrap();
    scan.close();
    assert_eq!(scan.next_entry().unwrap(), RecordId::END);
}

#[test]
fn closed_index_rejects_operations() {
    let (_temp_dir, manager, handle) = int_index(IndexConfig::default());
    handle.insert(int_key(1).as_bytes(), RecordId::new(1, 1)).unwrap();
    let mut scan = handle.scan(CompOp::NoOp, None).unwrap();
    manager.close_index(&handle).unwrap();

    assert!(matches!(
        handle.insert(int_key(2).as_bytes(), RecordId::new(2, 2)),
        Err(QuillIndexError::FileClosed)
    ));
    assert!(matches!(
        handle.delete(int_key(1).as_bytes(), RecordId::new(1, 1)),
        Err(QuillIndexError::FileClosed)
    ));
    assert!(matches!(
        handle.scan(CompOp::NoOp, None),
        Err(QuillIndexError::FileClosed)
    ));
    assert!(matches!(handle.force_pages(), Err(QuillIndexError::FileClosed)));
    assert!(matches!(scan.next(), Some(Err(QuillIndexError::FileClosed))));
    assert!(scan.next().is_none());
}

#[test]
fn entries_survive_close_and_reopen() {
    let config = IndexConfig::default()
        .with_buffer_pool(IndexConfig::default().buffer_pool.with_buffer_pool_size(16usize));
    let (_temp_dir, manager, base) = setup(config);
    manager.create_index(&base, 5, KeyKind::Int, 4).unwrap();

    let handle = manager.open_index(&base, 5).unwrap();
    for key in (0..1500).rev() {
        handle
            .insert(int_key(key).as_bytes(), RecordId::new(key, key % 4))
            .unwrap();
    }
    handle.force_page(handle.root_page_num()).unwrap();
    handle.force_pages().unwrap();
    let before = scan_all(&handle);
    manager.close_index(&handle).unwrap();
    drop(handle);

    let handle = manager.open_index(&base, 5).unwrap();
    assert_eq!(scan_all(&handle), before);
    assert_eq!(before.len(), 1500);
    manager.close_index(&handle).unwrap();
    manager.destroy_index(&base, 5).unwrap();
}

#[test]
fn negative_rids_are_rejected() {
    let (_temp_dir, _manager, handle) = int_index(IndexConfig::default());
    for rid in [RecordId::END, RecordId::new(-1, 0), RecordId::new(0, -1)] {
        assert!(matches!(
            handle.insert(int_key(1).as_bytes(), rid),
            Err(QuillIndexError::BadArguments(_))
        ));
    }
    assert_eq!(handle.file().num_pages().unwrap(), 1);

    handle.insert(int_key(2).as_bytes(), RecordId::new(5, 5)).unwrap();
    assert_eq!(scan_all(&handle), vec![RecordId::new(5, 5)]);
}

#[test]
fn failed_root_split_leaves_index_usable() {
    // two frames: both go to the pages reserved for the split, so fetching
    // the root afterwards runs out of buffer space
    let tiny = IndexConfig::default()
        .with_buffer_pool(IndexConfig::default().buffer_pool.with_buffer_pool_size(2usize));
    let (_temp_dir, manager, base) = setup(tiny);
    manager.create_index(&base, 0, KeyKind::Int, 4).unwrap();
    let handle = manager.open_index(&base, 0).unwrap();

    let max_keys = 508;
    for key in 0..max_keys {
        handle
            .insert(int_key(key).as_bytes(), RecordId::new(key, 0))
            .unwrap();
    }
    assert!(matches!(
        handle.insert(int_key(max_keys).as_bytes(), RecordId::new(max_keys, 0)),
        Err(QuillIndexError::NoBufferSpace(2))
    ));
    assert!(handle.file().pinned_pages().is_empty());
    assert_eq!(handle.root_page_num(), 0);
    assert_eq!(root_shape(&handle), (true, max_keys as usize));
    assert_eq!(scan_all(&handle).len(), max_keys as usize);
    manager.close_index(&handle).unwrap();
    drop(handle);

    let manager = IndexManager::default();
    let handle = manager.open_index(&base, 0).unwrap();
    assert_eq!(handle.root_page_num(), 0);
    handle
        .insert(int_key(max_keys).as_bytes(), RecordId::new(max_keys, 0))
        .unwrap();
    assert_eq!(root_shape(&handle), (false, 1));
    let pages: Vec<i32> = scan_all(&handle).iter().map(|rid| rid.page_num).collect();
    assert_eq!(pages, (0..=max_keys).collect::<Vec<_>>());
    manager.close_index(&handle).unwrap();
}

#[test]
fn errors_and_open_scans_hold_no_pins() {
    let (_temp_dir, _manager, handle) = int_index(IndexConfig::default());
    for key in 0..1200 {
        handle
            .insert(int_key(key % 600).as_bytes(), RecordId::new(key, 0))
            .unwrap();
    }
    assert!(matches!(
        handle.insert(int_key(7).as_bytes(), RecordId::new(7, 0)),
        Err(QuillIndexError::DuplicateEntry(_))
    ));
    assert!(matches!(
        handle.delete(int_key(5000).as_bytes(), RecordId::new(1, 0)),
        Err(QuillIndexError::RidNotFound(_))
    ));
    assert!(matches!(
        handle.delete(int_key(7).as_bytes(), RecordId::new(8, 0)),
        Err(QuillIndexError::RidNotFound(_))
    ));

    let mut scan = handle.scan(CompOp::Ge, Some(int_key(100).as_bytes())).unwrap();
    assert_eq!(scan.next_entry().unwrap(), RecordId::new(100, 0));
    assert_eq!(scan.next_entry().unwrap(), RecordId::new(700, 0));
    assert!(handle.file().pinned_pages().is_empty());
    assert_eq!(scan.next_entry().unwrap(), RecordId::new(101, 0));
}

#[test]
fn dot_output_escapes_string_keys() {
    let (_temp_dir, manager, base) = setup(IndexConfig::default());
    manager.create_index(&base, 0, KeyKind::Str, 8).unwrap();
    let handle = manager.open_index(&base, 0).unwrap();
    let key = IndexKey::from_str("a|b{c}\"", 8).unwrap();
    handle.insert(key.as_bytes(), RecordId::new(1, 1)).unwrap();

    let dot = handle.to_dot().unwrap();
    assert!(dot.contains(r#"<f0> a\|b\{c\}\" (1)"#), "{}", dot);
}
