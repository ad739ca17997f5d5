use std::sync::Arc;

use crate::chunk_list::Locator;
use crate::context::Context;
use crate::rip::RipVirtPhys;
use crate::types::MAX_BB_UOPS;
use crate::uop::TransOp;

/// Host handler synthesized for one uop.
pub type SynthOp = fn(&mut Context, &TransOp) -> u64;

/// Saturation point of the branch-confidence counter.
pub const CONFIDENCE_MAX: u8 = 3;

/// Lifecycle of a cached block.
///
/// `Filled` blocks with a non-zero reference count are live. An
/// `Evicted` block is off every index and is freed by the release that
/// drops its count to zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BbState {
    #[default]
    Empty,
    Filled,
    Evicted,
}

/// One SMC registration: the frame a block is listed under and its
/// position in that frame's backref list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Backref {
    pub mfn: u64,
    pub loc: Locator,
}

/// A translated basic block: a bounded uop sequence plus the successor
/// RIPs and bookkeeping the pipeline needs.
#[derive(Debug, Clone)]
pub struct BasicBlock {
    pub rip: RipVirtPhys,
    pub rip_taken: u64,
    pub rip_not_taken: u64,
    /// x86 bytes covered.
    pub bytes: u16,
    pub user_insn_count: u16,
    pub tagcount: u16,
    pub loadcount: u16,
    pub storecount: u16,
    pub memcount: u16,
    /// Block is a single `rep`-prefixed string instruction.
    pub repblock: bool,
    /// Block ends with an undecodable instruction.
    pub invalidblock: bool,
    /// Architectural registers touched by any uop.
    pub usedregs: u64,
    pub synthops: Option<Arc<[SynthOp]>>,

    pub refcount: u32,
    pub hitcount: u64,
    pub predcount: u64,
    pub confidence: u8,
    pub lastused: u64,

    pub state: BbState,
    /// SMC registrations, one per physical page spanned.
    pub backrefs: [Option<Backref>; 2],
    /// Next block in the same hash bucket, or `None`.
    pub hash_next: Option<u32>,

    transops: Vec<TransOp>,
}

impl BasicBlock {
    pub fn new(rip: RipVirtPhys) -> Self {
        Self {
            rip,
            rip_taken: 0,
            rip_not_taken: 0,
            bytes: 0,
            user_insn_count: 0,
            tagcount: 0,
            loadcount: 0,
            storecount: 0,
            memcount: 0,
            repblock: false,
            invalidblock: false,
            usedregs: 0,
            synthops: None,
            refcount: 0,
            hitcount: 0,
            predcount: 0,
            confidence: 0,
            lastused: 0,
            state: BbState::Empty,
            backrefs: [None; 2],
            hash_next: None,
            transops: Vec::with_capacity(MAX_BB_UOPS),
        }
    }

    /// Clear everything for reuse under a new key. Keeps the uop buffer.
    pub fn reset(&mut self, rip: RipVirtPhys) {
        let mut transops = std::mem::take(&mut self.transops);
        transops.clear();
        *self = Self {
            transops,
            ..Self::new(rip)
        };
    }

    pub fn uops(&self) -> &[TransOp] {
        &self.transops
    }

    pub fn count(&self) -> usize {
        self.transops.len()
    }

    pub fn is_full(&self) -> bool {
        self.transops.len() >= MAX_BB_UOPS
    }

    /// Append one uop. Panics past `MAX_BB_UOPS`; the translator splits
    /// blocks before that can happen.
    pub fn push_uop(&mut self, uop: TransOp) {
        assert!(
            !self.is_full(),
            "basic block {:#x}: more than {MAX_BB_UOPS} uops",
            self.rip.rip
        );
        self.transops.push(uop);
    }

    pub fn extend_uops(&mut self, uops: &[TransOp]) {
        for &uop in uops {
            self.push_uop(uop);
        }
    }

    /// Close the block: mark the first and last uop and derive the
    /// per-block counts from the uop sequence.
    pub fn finalize(&mut self) {
        assert!(
            !self.transops.is_empty(),
            "basic block {:#x}: finalize with no uops",
            self.rip.rip
        );
        let last = self.transops.len() - 1;
        let mut usedregs = 0;
        let mut loads = 0;
        let mut stores = 0;
        for (i, uop) in self.transops.iter_mut().enumerate() {
            uop.set_som(i == 0);
            uop.set_eom(i == last);
            uop.set_index(i as u8);
            usedregs |= uop.arch_regs_used();
            let op = uop.opcode();
            if op.is_load() {
                loads += 1;
            }
            if op.is_store() {
                stores += 1;
            }
        }
        self.usedregs = usedregs;
        self.tagcount = self.transops.len() as u16;
        self.loadcount = loads;
        self.storecount = stores;
        self.memcount = loads + stores;
    }

    pub fn acquire(&mut self) {
        self.refcount += 1;
    }

    /// Drop one reference. Returns `true` when the count reaches zero.
    pub fn release(&mut self) -> bool {
        assert!(
            self.refcount > 0,
            "basic block {:#x}: refcount underflow",
            self.rip.rip
        );
        self.refcount -= 1;
        self.refcount == 0
    }

    pub fn touch(&mut self, counter: u64) {
        self.lastused = counter;
    }

    /// Count one fetch hit at time `counter`.
    pub fn hit(&mut self, counter: u64) {
        self.hitcount += 1;
        self.touch(counter);
    }

    /// Feed one branch outcome into the confidence estimator.
    pub fn record_prediction(&mut self, correct: bool) {
        self.predcount += 1;
        self.confidence = if correct {
            (self.confidence + 1).min(CONFIDENCE_MAX)
        } else {
            self.confidence.saturating_sub(1)
        };
    }

    pub fn is_confident(&self) -> bool {
        self.confidence == CONFIDENCE_MAX
    }

    /// Filled and held by at least one consumer.
    pub fn is_live(&self) -> bool {
        self.state == BbState::Filled && self.refcount > 0
    }

    /// Detached copy: same key, uops and metadata, but unindexed, with no
    /// references and no synthesized handlers.
    pub fn clone_block(&self) -> BasicBlock {
        BasicBlock {
            refcount: 0,
            state: BbState::Empty,
            synthops: None,
            backrefs: [None; 2],
            hash_next: None,
            ..self.clone()
        }
    }

    /// Frames this block is registered under in the SMC index.
    pub fn pages(&self) -> impl Iterator<Item = u64> + '_ {
        self.backrefs.iter().flatten().map(|b| b.mfn)
    }
}
