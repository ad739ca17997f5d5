use ptl_core::bb::{BasicBlock, BbState};
use ptl_core::rip::{RipVirtPhys, BB_HASH_SIZE};

/// Stable reference to a block in a [`BbStore`].
///
/// The generation detects use after the slot has been freed and
/// reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BbHandle {
    idx: u32,
    gen: u32,
}

impl BbHandle {
    pub fn index(&self) -> usize {
        self.idx as usize
    }
}

struct Slot {
    gen: u32,
    block: Option<BasicBlock>,
}

/// Block arena plus the hash index over block keys.
///
/// Buckets chain through `BasicBlock::hash_next` by arena index. The
/// index does not hold a reference: unlinking a block never touches its
/// reference count.
pub struct BbStore {
    slots: Vec<Slot>,
    free: Vec<u32>,
    hash: Vec<Option<u32>>,
    /// Allocated blocks, linked or not.
    allocated: usize,
    /// Blocks currently reachable through `hash`.
    indexed: usize,
}

impl BbStore {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            hash: vec![None; BB_HASH_SIZE],
            allocated: 0,
            indexed: 0,
        }
    }

    /// Allocate an empty block for `key`. It is not visible to
    /// [`lookup`](Self::lookup) until [`insert`](Self::insert).
    pub fn alloc(&mut self, key: RipVirtPhys) -> BbHandle {
        let idx = match self.free.pop() {
            Some(idx) => idx,
            None => {
                self.slots.push(Slot {
                    gen: 0,
                    block: None,
                });
                (self.slots.len() - 1) as u32
            }
        };
        let slot = &mut self.slots[idx as usize];
        slot.block = Some(BasicBlock::new(key));
        self.allocated += 1;
        BbHandle { idx, gen: slot.gen }
    }

    pub fn get(&self, h: BbHandle) -> Option<&BasicBlock> {
        let slot = self.slots.get(h.idx as usize)?;
        if slot.gen != h.gen {
            return None;
        }
        slot.block.as_ref()
    }

    pub fn get_mut(&mut self, h: BbHandle) -> Option<&mut BasicBlock> {
        let slot = self.slots.get_mut(h.idx as usize)?;
        if slot.gen != h.gen {
            return None;
        }
        slot.block.as_mut()
    }

    /// Like [`get_mut`](Self::get_mut), but a stale handle is fatal.
    pub fn block_mut(&mut self, h: BbHandle) -> &mut BasicBlock {
        match self.get_mut(h) {
            Some(bb) => bb,
            None => panic!("bb store: stale handle {h:?}"),
        }
    }

    pub fn block(&self, h: BbHandle) -> &BasicBlock {
        match self.get(h) {
            Some(bb) => bb,
            None => panic!("bb store: stale handle {h:?}"),
        }
    }

    fn handle_at(&self, idx: u32) -> BbHandle {
        BbHandle {
            idx,
            gen: self.slots[idx as usize].gen,
        }
    }

    fn chained(&self, idx: u32) -> &BasicBlock {
        match &self.slots[idx as usize].block {
            Some(bb) => bb,
            None => panic!("bb store: freed block {idx} still chained"),
        }
    }

    fn chained_mut(&mut self, idx: u32) -> &mut BasicBlock {
        match &mut self.slots[idx as usize].block {
            Some(bb) => bb,
            None => panic!("bb store: freed block {idx} still chained"),
        }
    }

    /// Find the block indexed under exactly `key`.
    pub fn lookup(&self, key: &RipVirtPhys) -> Option<BbHandle> {
        let mut cur = self.hash[key.hash()];
        while let Some(idx) = cur {
            let bb = self.chained(idx);
            if bb.rip == *key {
                return Some(self.handle_at(idx));
            }
            cur = bb.hash_next;
        }
        None
    }

    /// Publish a filled block under its key (prepend to the bucket).
    ///
    /// Panics if the block is not freshly allocated or if its key is
    /// already indexed.
    pub fn insert(&mut self, h: BbHandle) {
        let key = {
            let bb = self.block(h);
            assert!(
                bb.state == BbState::Empty,
                "bb store: insert of {} in state {:?}",
                bb.rip,
                bb.state
            );
            bb.rip
        };
        assert!(
            self.lookup(&key).is_none(),
            "bb store: duplicate insert of {key}"
        );
        let bucket = key.hash();
        let head = self.hash[bucket];
        let bb = self.block_mut(h);
        bb.hash_next = head;
        bb.state = BbState::Filled;
        self.hash[bucket] = Some(h.idx);
        self.indexed += 1;
    }

    /// Remove a block from the hash index and mark it evicted. Returns
    /// `false` if it was not indexed.
    pub fn unlink(&mut self, h: BbHandle) -> bool {
        let key = {
            let bb = self.block(h);
            if bb.state != BbState::Filled {
                return false;
            }
            bb.rip
        };
        let bucket = key.hash();
        let mut prev: Option<u32> = None;
        let mut cur = self.hash[bucket];
        while let Some(idx) = cur {
            let next = self.chained(idx).hash_next;
            if idx == h.idx {
                match prev {
                    Some(p) => self.chained_mut(p).hash_next = next,
                    None => self.hash[bucket] = next,
                }
                let bb = self.chained_mut(idx);
                bb.hash_next = None;
                bb.state = BbState::Evicted;
                self.indexed -= 1;
                return true;
            }
            prev = cur;
            cur = next;
        }
        panic!("bb store: filled block {key} missing from its bucket");
    }

    /// Reclaim a block's storage. Panics if it is still indexed or
    /// still referenced.
    pub fn free(&mut self, h: BbHandle) {
        {
            let bb = self.block(h);
            assert!(
                bb.state != BbState::Filled,
                "bb store: freeing indexed block {}",
                bb.rip
            );
            assert!(
                bb.refcount == 0,
                "bb store: freeing block {} with refcount {}",
                bb.rip,
                bb.refcount
            );
        }
        let slot = &mut self.slots[h.idx as usize];
        slot.block = None;
        slot.gen = slot.gen.wrapping_add(1);
        self.free.push(h.idx);
        self.allocated -= 1;
    }

    /// Handles of every indexed block, in arena order.
    pub fn indexed_handles(&self) -> Vec<BbHandle> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, s)| matches!(&s.block, Some(bb) if bb.state == BbState::Filled))
            .map(|(i, s)| BbHandle {
                idx: i as u32,
                gen: s.gen,
            })
            .collect()
    }

    /// Blocks currently indexed.
    pub fn len(&self) -> usize {
        self.indexed
    }

    pub fn is_empty(&self) -> bool {
        self.indexed == 0
    }

    /// Blocks holding storage, including evicted blocks still referenced.
    pub fn allocated(&self) -> usize {
        self.allocated
    }
}

impl Default for BbStore {
    fn default() -> Self {
        Self::new()
    }
}
