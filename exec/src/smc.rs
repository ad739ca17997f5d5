//! Physical-page backref index for self-modifying code.

use std::collections::HashMap;

use ptl_core::bb::Backref;
use ptl_core::chunk_list::{ChunkList, Locator, BB_PTRS_PER_CHUNK};

use crate::bb_store::{BbHandle, BbStore};

pub type BackrefList = ChunkList<BbHandle, BB_PTRS_PER_CHUNK>;

/// Map from machine frame number to every block translated (even in
/// part) from bytes on that frame.
///
/// Entries are not references: registering a block leaves its
/// reference count alone.
#[derive(Default)]
pub struct SmcIndex {
    pages: HashMap<u64, BackrefList>,
}

impl SmcIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// List `h` under frame `mfn`.
    pub fn register(&mut self, mfn: u64, h: BbHandle) -> Locator {
        self.pages.entry(mfn).or_default().add(h)
    }

    /// Drop the entry at a known position.
    pub fn unregister_at(&mut self, backref: Backref) {
        let Some(list) = self.pages.get_mut(&backref.mfn) else {
            panic!("smc: no backref list for mfn {:#x}", backref.mfn);
        };
        list.remove(backref.loc);
        if list.is_empty() {
            self.pages.remove(&backref.mfn);
        }
    }

    /// Drop the entry for `h` under `mfn` without invalidating the
    /// block, clearing the matching backref on the block as well.
    ///
    /// Returns false if `h` is stale or not listed under `mfn`.
    pub fn unregister(&mut self, store: &mut BbStore, mfn: u64, h: BbHandle) -> bool {
        let Some(bb) = store.get_mut(h) else {
            return false;
        };
        let Some(backref) = bb
            .backrefs
            .iter_mut()
            .find(|b| b.is_some_and(|b| b.mfn == mfn))
            .and_then(Option::take)
        else {
            return false;
        };
        self.unregister_at(backref);
        true
    }

    /// Unregister every backref a block holds.
    pub fn unregister_block(&mut self, store: &mut BbStore, h: BbHandle) {
        let backrefs = std::mem::take(&mut store.block_mut(h).backrefs);
        for backref in backrefs.into_iter().flatten() {
            self.unregister_at(backref);
        }
    }

    /// Remove every block listed under `mfn` from this index and from
    /// the block index. Blocks no consumer holds are freed at once; the
    /// rest are freed by their last release.
    ///
    /// Returns the number of blocks invalidated.
    pub fn invalidate_page(&mut self, mfn: u64, store: &mut BbStore) -> usize {
        let Some(list) = self.pages.remove(&mfn) else {
            return 0;
        };
        let mut n = 0;
        for (_, h) in list.iter() {
            // The entry under `mfn` is gone with the list; drop the
            // block's other registration, if any.
            let backrefs = std::mem::take(&mut store.block_mut(h).backrefs);
            for backref in backrefs.into_iter().flatten() {
                if backref.mfn != mfn {
                    self.unregister_at(backref);
                }
            }
            if store.unlink(h) {
                n += 1;
            }
            if store.block(h).refcount == 0 {
                store.free(h);
            }
        }
        log::debug!("smc: invalidated {n} blocks on mfn {mfn:#x}");
        n
    }

    /// Blocks listed under `mfn`.
    pub fn blocks_on(&self, mfn: u64) -> Vec<BbHandle> {
        self.pages
            .get(&mfn)
            .map(|list| list.iter().map(|(_, h)| h).collect())
            .unwrap_or_default()
    }

    pub fn is_registered(&self, mfn: u64) -> bool {
        self.pages.contains_key(&mfn)
    }

    /// Frames with at least one block.
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn clear(&mut self) {
        self.pages.clear();
    }
}
