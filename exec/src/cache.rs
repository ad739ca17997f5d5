use ptl_core::bb::{Backref, BasicBlock, BbState};
use ptl_core::context::{AccessKind, Context};
use ptl_core::mem::PhysMem;
use ptl_core::pte::PageTableWalker;
use ptl_core::rip::RipVirtPhys;
use ptl_core::types::{
    mfn_of, MAX_BB_BYTES, MAX_BB_UOPS, MAX_BB_X86_INSNS, MAX_TRANSOPS_PER_USER_INSN,
    MAX_X86_INSN_BYTES,
};
use ptl_core::uop::TransOp;

use crate::bb_store::{BbHandle, BbStore};
use crate::error::FetchError;
use crate::smc::SmcIndex;
use crate::translate::{translate_block, BlockLimits, Decoder};

/// Default block capacity of a cache.
pub const DEFAULT_MAX_BLOCKS: usize = 65536;

/// Tunables for a [`BasicBlockCache`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CacheConfig {
    /// Indexed blocks before capacity reclaim kicks in.
    pub max_blocks: usize,
    pub max_bb_uops: usize,
    pub max_bb_bytes: usize,
    pub max_bb_insns: usize,
    /// Fraction of `max_blocks` reclaim shrinks the cache down to.
    pub reclaim_ratio: f64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_blocks: DEFAULT_MAX_BLOCKS,
            max_bb_uops: MAX_BB_UOPS,
            max_bb_bytes: MAX_BB_BYTES,
            max_bb_insns: MAX_BB_X86_INSNS,
            reclaim_ratio: 0.75,
        }
    }
}

impl CacheConfig {
    #[must_use]
    pub fn with_max_blocks(mut self, n: usize) -> Self {
        self.max_blocks = n;
        self
    }

    #[must_use]
    pub fn with_max_bb_uops(mut self, n: usize) -> Self {
        self.max_bb_uops = n;
        self
    }

    #[must_use]
    pub fn with_max_bb_bytes(mut self, n: usize) -> Self {
        self.max_bb_bytes = n;
        self
    }

    #[must_use]
    pub fn with_max_bb_insns(mut self, n: usize) -> Self {
        self.max_bb_insns = n;
        self
    }

    #[must_use]
    pub fn with_reclaim_ratio(mut self, ratio: f64) -> Self {
        self.reclaim_ratio = ratio;
        self
    }

    fn validate(&self) {
        assert!(self.max_blocks > 0, "cache config: max_blocks is zero");
        assert!(
            self.max_bb_uops > MAX_TRANSOPS_PER_USER_INSN && self.max_bb_uops <= MAX_BB_UOPS,
            "cache config: max_bb_uops {} outside {}..={MAX_BB_UOPS}",
            self.max_bb_uops,
            MAX_TRANSOPS_PER_USER_INSN + 1
        );
        assert!(
            self.max_bb_bytes >= MAX_X86_INSN_BYTES && self.max_bb_bytes <= MAX_BB_BYTES,
            "cache config: max_bb_bytes {} outside {MAX_X86_INSN_BYTES}..={MAX_BB_BYTES}",
            self.max_bb_bytes
        );
        assert!(
            self.max_bb_insns > 0 && self.max_bb_insns <= MAX_BB_X86_INSNS,
            "cache config: max_bb_insns {} outside 1..={MAX_BB_X86_INSNS}",
            self.max_bb_insns
        );
        assert!(
            (0.0..=1.0).contains(&self.reclaim_ratio),
            "cache config: reclaim_ratio {} outside 0..=1",
            self.reclaim_ratio
        );
    }

    pub fn limits(&self) -> BlockLimits {
        BlockLimits {
            max_uops: self.max_bb_uops,
            max_bytes: self.max_bb_bytes,
            max_insns: self.max_bb_insns,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub translations: u64,
    /// Blocks closed early by a size limit.
    pub splits: u64,
    /// Blocks invalidated through the SMC index.
    pub smc_invalidations: u64,
    /// Blocks evicted by capacity reclaim.
    pub reclaimed: u64,
    /// Blocks evicted explicitly or by `flush`.
    pub evictions: u64,
}

/// Basic-block translation cache: block index, SMC index and the
/// fetch/translate/invalidate protocol tying them together.
///
/// One cache serves every VCPU; callers serialize access (see
/// [`SharedBbCache`](crate::SharedBbCache)).
pub struct BasicBlockCache {
    config: CacheConfig,
    store: BbStore,
    smc: SmcIndex,
    stats: CacheStats,
    /// Fetch counter used as the LRU clock.
    tick: u64,
}

impl Default for BasicBlockCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl BasicBlockCache {
    pub fn new(config: CacheConfig) -> Self {
        config.validate();
        Self {
            config,
            store: BbStore::new(),
            smc: SmcIndex::new(),
            stats: CacheStats::default(),
            tick: 0,
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    pub fn store(&self) -> &BbStore {
        &self.store
    }

    pub fn smc(&self) -> &SmcIndex {
        &self.smc
    }

    /// Indexed blocks.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Return the block for `rip` under `ctx`'s current mode and
    /// mappings, translating it on a miss.
    ///
    /// On a miss the block is translated, indexed and registered under
    /// every page it spans before this returns. The handle carries no
    /// reference; [`acquire`](Self::acquire) it before issuing.
    pub fn fetch_block<G, D>(
        &mut self,
        ctx: &mut Context,
        guest: &mut G,
        decoder: &mut D,
        rip: u64,
    ) -> Result<BbHandle, FetchError>
    where
        G: PageTableWalker + PhysMem,
        D: Decoder + ?Sized,
    {
        ctx.check_and_translate(guest, rip, AccessKind::Exec)?;
        let key = RipVirtPhys::resolve(rip, ctx, guest);
        self.tick += 1;

        if let Some(h) = self.store.lookup(&key) {
            self.stats.hits += 1;
            self.store.block_mut(h).hit(self.tick);
            return Ok(h);
        }
        self.stats.misses += 1;

        if self.store.len() >= self.config.max_blocks {
            self.reclaim();
        }

        let h = self.store.alloc(key);
        let limits = self.config.limits();
        let out = match translate_block(ctx, guest, decoder, self.store.block_mut(h), &limits) {
            Ok(out) => out,
            Err(e) => {
                self.store.free(h);
                log::debug!("translation of {key} failed: {e}");
                return Err(e);
            }
        };
        self.stats.translations += 1;
        if out.split {
            self.stats.splits += 1;
        }

        self.store.insert(h);
        let mut backrefs = [None; 2];
        for (slot, mfn) in backrefs.iter_mut().zip(out.pages.iter().flatten()) {
            let loc = self.smc.register(*mfn, h);
            *slot = Some(Backref { mfn: *mfn, loc });
        }
        let bb = self.store.block_mut(h);
        bb.backrefs = backrefs;
        bb.touch(self.tick);

        log::debug!(
            "bb {}: {} uops, {} bytes, pages {:?}",
            key,
            bb.count(),
            bb.bytes,
            out.pages
        );
        Ok(h)
    }

    pub fn lookup(&self, key: &RipVirtPhys) -> Option<BbHandle> {
        self.store.lookup(key)
    }

    pub fn get(&self, h: BbHandle) -> Option<&BasicBlock> {
        self.store.get(h)
    }

    pub fn get_mut(&mut self, h: BbHandle) -> Option<&mut BasicBlock> {
        self.store.get_mut(h)
    }

    /// Uops of a live block, for issue. Issuing from a block that is not
    /// live is fatal.
    pub fn issue(&self, h: BbHandle) -> &[TransOp] {
        let bb = self.store.block(h);
        assert!(
            bb.is_live(),
            "issue from non-live block {} (state {:?}, refcount {})",
            bb.rip,
            bb.state,
            bb.refcount
        );
        bb.uops()
    }

    pub fn acquire(&mut self, h: BbHandle) {
        self.store.block_mut(h).acquire();
    }

    /// Drop one reference. Frees the block if it was already evicted
    /// and this was the last reference; returns `true` in that case.
    pub fn release(&mut self, h: BbHandle) -> bool {
        let bb = self.store.block_mut(h);
        if bb.release() && bb.state == BbState::Evicted {
            self.store.free(h);
            return true;
        }
        false
    }

    /// Invalidate every block translated from frame `mfn`.
    pub fn invalidate_page(&mut self, mfn: u64) -> usize {
        let n = self.smc.invalidate_page(mfn, &mut self.store);
        self.stats.smc_invalidations += n as u64;
        n
    }

    /// A guest store to `[paddr, paddr + len)` committed: invalidate
    /// every page it touched.
    pub fn notify_store(&mut self, paddr: u64, len: u64) -> usize {
        if len == 0 {
            return 0;
        }
        let first = mfn_of(paddr);
        let last = mfn_of(paddr.saturating_add(len - 1));
        let pages: Vec<u64> = (first..=last)
            .filter(|&mfn| self.smc.is_registered(mfn))
            .collect();
        pages.into_iter().map(|mfn| self.invalidate_page(mfn)).sum()
    }

    /// Evict the block indexed under `key`, if any.
    pub fn invalidate(&mut self, key: &RipVirtPhys) -> bool {
        match self.store.lookup(key) {
            Some(h) => {
                self.evict(h);
                self.stats.evictions += 1;
                true
            }
            None => false,
        }
    }

    /// Remove a block from the block index and the SMC index. Storage
    /// goes once no consumer holds it. Returns `false` if the block
    /// was not indexed.
    fn evict(&mut self, h: BbHandle) -> bool {
        if !self.store.unlink(h) {
            return false;
        }
        self.smc.unregister_block(&mut self.store, h);
        if self.store.block(h).refcount == 0 {
            self.store.free(h);
        }
        true
    }

    /// Evict least-recently-used unreferenced blocks until the cache is
    /// down to `reclaim_ratio` of capacity. Referenced blocks are never
    /// touched.
    pub fn reclaim(&mut self) -> usize {
        let target = (self.config.max_blocks as f64 * self.config.reclaim_ratio) as usize;
        let mut candidates: Vec<(u64, BbHandle)> = self
            .store
            .indexed_handles()
            .into_iter()
            .map(|h| (self.store.block(h), h))
            .filter(|(bb, _)| bb.refcount == 0)
            .map(|(bb, h)| (bb.lastused, h))
            .collect();
        candidates.sort_unstable_by_key(|&(lastused, _)| lastused);

        let mut n = 0;
        for (_, h) in candidates {
            if self.store.len() <= target {
                break;
            }
            if self.evict(h) {
                n += 1;
            }
        }
        self.stats.reclaimed += n as u64;
        if self.store.len() > target {
            log::warn!(
                "reclaim: {} blocks still cached (target {target}); the rest are referenced",
                self.store.len()
            );
        } else {
            log::debug!("reclaim: evicted {n} blocks, {} left", self.store.len());
        }
        n
    }

    /// Evict every block.
    pub fn flush(&mut self) -> usize {
        let mut n = 0;
        for h in self.store.indexed_handles() {
            if self.evict(h) {
                n += 1;
            }
        }
        self.stats.evictions += n as u64;
        log::debug!("flush: evicted {n} blocks");
        n
    }
}
