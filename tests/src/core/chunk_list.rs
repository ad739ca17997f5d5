use proptest::prelude::*;

use ptl_core::chunk_list::{ChunkList, BB_PTRS_PER_CHUNK};

type List = ChunkList<u32, 4>;

#[test]
fn add_and_iterate() {
    let mut list = List::new();
    assert!(list.is_empty());
    for v in 1..=6 {
        list.add(v);
    }
    assert_eq!(list.len(), 6);
    assert_eq!(list.chunk_count(), 2);
    let mut vals: Vec<u32> = list.iter().map(|(_, v)| v).collect();
    vals.sort();
    assert_eq!(vals, vec![1, 2, 3, 4, 5, 6]);
}

#[test]
fn remove_by_locator() {
    let mut list = List::new();
    let a = list.add(10);
    let b = list.add(20);
    assert_eq!(list.get(a), Some(10));
    assert_eq!(list.remove(a), 10);
    assert_eq!(list.get(a), None);
    assert_eq!(list.get(b), Some(20));
    assert_eq!(list.len(), 1);
}

#[test]
fn empty_chunk_returns_to_pool() {
    let mut list = List::new();
    let locs: Vec<_> = (0..8).map(|v| list.add(v)).collect();
    assert_eq!(list.chunk_count(), 2);
    for &loc in &locs[..4] {
        list.remove(loc);
    }
    assert_eq!(list.chunk_count(), 1);
    assert_eq!(list.free_chunk_count(), 1);

    // The freed chunk is reused before the arena grows.
    for v in 0..4 {
        list.add(100 + v);
    }
    assert_eq!(list.chunk_count(), 2);
    assert_eq!(list.free_chunk_count(), 0);
}

#[test]
fn reuses_holes_in_head_chunk() {
    let mut list = List::new();
    let a = list.add(1);
    list.add(2);
    list.remove(a);
    let c = list.add(3);
    assert_eq!(c, a);
    assert_eq!(list.chunk_count(), 1);
}

#[test]
fn reuses_holes_behind_head() {
    let mut list = List::new();
    let locs: Vec<_> = (0..8).map(|v| list.add(v)).collect();
    assert_eq!(list.chunk_count(), 2);
    // Open one slot in each chunk, oldest first.
    list.remove(locs[1]);
    list.remove(locs[6]);
    let x = list.add(100);
    let y = list.add(101);
    let mut got = vec![x, y];
    got.sort_by_key(|l| (l.chunk, l.slot));
    let mut want = vec![locs[1], locs[6]];
    want.sort_by_key(|l| (l.chunk, l.slot));
    assert_eq!(got, want);
    assert_eq!(list.chunk_count(), 2);

    list.add(102);
    assert_eq!(list.chunk_count(), 3);
}

#[test]
fn single_slot_chunks() {
    let mut list: ChunkList<u32, 1> = ChunkList::new();
    let a = list.add(1);
    let b = list.add(2);
    assert_eq!(list.chunk_count(), 2);
    list.remove(a);
    assert_eq!(list.chunk_count(), 1);
    assert_eq!(list.free_chunk_count(), 1);
    let c = list.add(3);
    assert_eq!(c.chunk, a.chunk);
    assert_eq!(list.get(b), Some(2));
    assert_eq!(list.chunk_count(), 2);
}

#[test]
fn remove_value() {
    let mut list = List::new();
    for v in 0..10 {
        list.add(v);
    }
    assert!(list.remove_value(7));
    assert!(!list.remove_value(7));
    assert_eq!(list.find(3).map(|loc| list.get(loc)), Some(Some(3)));
    assert_eq!(list.len(), 9);
}

#[test]
fn clear() {
    let mut list = List::new();
    let loc = list.add(1);
    for v in 0..9 {
        list.add(v);
    }
    list.clear();
    assert!(list.is_empty());
    assert_eq!(list.chunk_count(), 0);
    assert_eq!(list.get(loc), None);
    assert_eq!(list.iter().count(), 0);
}

#[test]
#[should_panic(expected = "removing empty slot")]
fn double_remove_panics() {
    let mut list = List::new();
    list.add(5);
    let loc = list.add(6);
    list.remove(loc);
    list.remove(loc);
}

#[test]
fn full_width_chunks() {
    let mut list: ChunkList<u64, 64> = ChunkList::new();
    for v in 0..130 {
        list.add(v);
    }
    assert_eq!(list.chunk_count(), 3);
    assert_eq!(list.iter().count(), 130);
}

#[test]
fn backref_chunk_size() {
    let mut list: ChunkList<u32, BB_PTRS_PER_CHUNK> = ChunkList::new();
    for v in 0..BB_PTRS_PER_CHUNK as u32 + 1 {
        list.add(v);
    }
    assert_eq!(list.chunk_count(), 2);
}

#[derive(Debug, Clone)]
enum Step {
    Add(u32),
    Remove(usize),
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        any::<u32>().prop_map(Step::Add),
        any::<usize>().prop_map(Step::Remove),
    ]
}

proptest! {
    #[test]
    fn matches_model(steps in prop::collection::vec(step(), 0..200)) {
        let mut list = List::new();
        let mut model: Vec<(ptl_core::Locator, u32)> = Vec::new();
        let mut high = 0usize;
        for s in steps {
            match s {
                Step::Add(v) => {
                    let loc = list.add(v);
                    prop_assert!(model.iter().all(|&(l, _)| l != loc));
                    model.push((loc, v));
                }
                Step::Remove(i) if !model.is_empty() => {
                    let (loc, v) = model.swap_remove(i % model.len());
                    prop_assert_eq!(list.remove(loc), v);
                }
                Step::Remove(_) => {}
            }
            prop_assert_eq!(list.len(), model.len());
            prop_assert_eq!(list.iter().count(), model.len());
            // No chunk on the list is ever empty.
            prop_assert!(list.chunk_count() <= model.len());
            prop_assert!(list.chunk_count() * 4 >= model.len());
            // Holes are refilled before the arena grows, so the chunk
            // count never exceeds what the high-water mark needed.
            high = high.max(model.len());
            prop_assert!(list.chunk_count() <= high.div_ceil(4));
        }
        let mut got: Vec<u32> = list.iter().map(|(_, v)| v).collect();
        let mut want: Vec<u32> = model.iter().map(|&(_, v)| v).collect();
        got.sort();
        want.sort();
        prop_assert_eq!(got, want);
    }
}
