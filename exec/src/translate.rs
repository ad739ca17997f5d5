//! Translation driver: fetches guest bytes, runs the decoder one x86
//! instruction at a time and closes blocks at the hard limits.

use ptl_core::bb::BasicBlock;
use ptl_core::context::{AccessKind, Context};
use ptl_core::error::PageFault;
use ptl_core::mem::PhysMem;
use ptl_core::opcode::Opcode;
use ptl_core::pte::PageTableWalker;
use ptl_core::regs::{REG_RIP, REG_ZERO};
use ptl_core::rip::RipVirtPhys;
use ptl_core::types::{
    mfn_of, page_offset, MAX_TRANSOPS_PER_USER_INSN, MAX_X86_INSN_BYTES, PAGE_SIZE,
};
use ptl_core::uop::{TransOp, SIZE_QWORD};

use crate::error::{DecodeError, FetchError};

/// How a decoded instruction affects the block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsnEnd {
    /// Falls through; the block may continue.
    Continue,
    /// Conditional branch; ends the block.
    Branch { taken: u64, not_taken: u64 },
    /// Direct unconditional jump; ends the block.
    Jump(u64),
    /// Indirect transfer; target known only at run time.
    Indirect,
    /// Handed to a microcode assist; ends the block.
    Assist,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedInsn {
    /// x86 bytes consumed.
    pub length: usize,
    pub end: InsnEnd,
    /// `rep`-prefixed string instruction; gets a block of its own.
    pub rep: bool,
}

/// x86 decoder collaborator.
///
/// Decodes the single instruction at the start of `bytes` (fetched
/// from `rip`) and appends its uops to `uops`. `bytes` may be shorter
/// than the instruction; the decoder must then report
/// [`DecodeError::NeedMoreBytes`] rather than guess.
pub trait Decoder {
    fn decode(
        &mut self,
        key: &RipVirtPhys,
        rip: u64,
        bytes: &[u8],
        uops: &mut Vec<TransOp>,
    ) -> Result<DecodedInsn, DecodeError>;
}

/// Per-block limits applied while translating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockLimits {
    pub max_uops: usize,
    pub max_bytes: usize,
    pub max_insns: usize,
}

/// What a translation produced besides the block contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Translated {
    /// Frames the block's bytes came from, low page first.
    pub pages: [Option<u64>; 2],
    /// The block was cut short by a size limit.
    pub split: bool,
}

impl Translated {
    fn add_page(&mut self, mfn: u64) {
        if self.pages.contains(&Some(mfn)) {
            return;
        }
        match self.pages.iter_mut().find(|p| p.is_none()) {
            Some(p) => *p = Some(mfn),
            None => panic!("translate: block spans more than two pages"),
        }
    }
}

/// Up to one instruction's worth of bytes starting at some RIP.
struct FetchWindow {
    bytes: [u8; MAX_X86_INSN_BYTES],
    len: usize,
    mfn_lo: u64,
    /// Frame of the second page, if the window crosses one.
    mfn_hi: Option<u64>,
    /// Fault that cut the window short at the page boundary.
    hi_fault: Option<PageFault>,
}

fn fetch_window<G>(
    ctx: &mut Context,
    guest: &mut G,
    rip: u64,
    max: usize,
) -> Result<FetchWindow, PageFault>
where
    G: PageTableWalker + PhysMem,
{
    let lo = ctx.check_and_translate(guest, rip, AccessKind::Exec)?;
    let mut w = FetchWindow {
        bytes: [0; MAX_X86_INSN_BYTES],
        len: 0,
        mfn_lo: mfn_of(lo.paddr),
        mfn_hi: None,
        hi_fault: None,
    };
    let max = max.min(MAX_X86_INSN_BYTES);
    let first = max.min((PAGE_SIZE - page_offset(rip)) as usize);
    guest.read(lo.paddr, &mut w.bytes[..first]);
    w.len = first;

    if first < max {
        let next = rip.wrapping_add(first as u64);
        match ctx.check_and_translate(guest, next, AccessKind::Exec) {
            Ok(hi) => {
                guest.read(hi.paddr, &mut w.bytes[first..max]);
                w.len = max;
                w.mfn_hi = Some(mfn_of(hi.paddr));
            }
            Err(fault) => w.hi_fault = Some(fault),
        }
    }
    Ok(w)
}

fn bru(target: u64) -> TransOp {
    TransOp::new(Opcode::Bru, REG_RIP, REG_ZERO, REG_ZERO, REG_ZERO, SIZE_QWORD)
        .with_targets(target, target)
}

fn brp_invalid(rip: u64) -> TransOp {
    TransOp::new(Opcode::Brp, REG_RIP, REG_ZERO, REG_ZERO, REG_ZERO, SIZE_QWORD)
        .with_targets(rip, rip)
}

/// Translate the block keyed by `bb.rip` into `bb`.
///
/// The block is closed before an instruction that would break a limit
/// (one uop slot stays reserved for the closing branch), before a
/// `rep` instruction that is not first, and before an instruction
/// whose bytes cannot be fetched. A block closed early ends in `bru`
/// to the next RIP, with both successors set to it.
///
/// A fetch fault on the first instruction is returned as a page fault;
/// an invalid first instruction yields a one-uop `invalidblock`.
pub fn translate_block<G, D>(
    ctx: &mut Context,
    guest: &mut G,
    decoder: &mut D,
    bb: &mut BasicBlock,
    limits: &BlockLimits,
) -> Result<Translated, FetchError>
where
    G: PageTableWalker + PhysMem,
    D: Decoder + ?Sized,
{
    let key = bb.rip;
    let mut out = Translated::default();
    let mut scratch: Vec<TransOp> = Vec::with_capacity(MAX_TRANSOPS_PER_USER_INSN);
    let mut uops: Vec<TransOp> = Vec::with_capacity(limits.max_uops);
    let mut rip = key.rip;
    let mut bytes = 0usize;
    let mut insns = 0usize;

    // Successors once the loop ends; `None` means close with `bru`.
    let successors: Option<(u64, u64)> = loop {
        if insns >= limits.max_insns || bytes >= limits.max_bytes {
            out.split = true;
            break None;
        }

        let window = match fetch_window(ctx, guest, rip, limits.max_bytes - bytes) {
            Ok(w) => w,
            Err(fault) if insns == 0 => return Err(fault.into()),
            Err(_) => break None,
        };

        scratch.clear();
        let decoded = decoder.decode(&key, rip, &window.bytes[..window.len], &mut scratch);
        let insn = match decoded {
            Ok(insn) => insn,
            Err(DecodeError::NeedMoreBytes { .. }) => {
                if insns == 0 {
                    if let Some(fault) = window.hi_fault {
                        return Err(fault.into());
                    }
                    return Err(DecodeError::NeedMoreBytes { rip }.into());
                }
                // Either the byte cap or an unfetchable next page.
                out.split = window.hi_fault.is_none();
                break None;
            }
            Err(DecodeError::InvalidOpcode { .. }) if insns == 0 => {
                uops.push(brp_invalid(rip));
                out.add_page(window.mfn_lo);
                bb.invalidblock = true;
                break Some((rip, rip));
            }
            Err(DecodeError::InvalidOpcode { .. }) => break None,
            Err(e) => return Err(e.into()),
        };

        assert!(
            insn.length > 0 && insn.length <= window.len,
            "decoder consumed {} of {} bytes at {rip:#x}",
            insn.length,
            window.len
        );
        assert!(!scratch.is_empty(), "decoder produced no uops at {rip:#x}");
        if scratch.len() > MAX_TRANSOPS_PER_USER_INSN {
            return Err(DecodeError::TooManyUops {
                rip,
                count: scratch.len(),
            }
            .into());
        }
        if insn.rep && insns > 0 {
            break None;
        }
        if uops.len() + scratch.len() + 1 > limits.max_uops {
            out.split = true;
            break None;
        }

        for uop in &scratch {
            uops.push(uop.with_bytes(insn.length as u8));
        }
        out.add_page(window.mfn_lo);
        if page_offset(rip) as usize + insn.length > PAGE_SIZE as usize {
            if let Some(hi) = window.mfn_hi {
                out.add_page(hi);
            }
        }
        bytes += insn.length;
        insns += 1;
        let next = rip.wrapping_add(insn.length as u64);

        if insn.rep {
            bb.repblock = true;
            break Some((next, next));
        }
        match insn.end {
            InsnEnd::Continue => rip = next,
            InsnEnd::Branch { taken, not_taken } => break Some((taken, not_taken)),
            InsnEnd::Jump(target) => break Some((target, target)),
            InsnEnd::Indirect | InsnEnd::Assist => break Some((next, next)),
        }
    };

    let (taken, not_taken) = match successors {
        Some(s) => s,
        None => {
            uops.push(bru(rip));
            (rip, rip)
        }
    };

    bb.extend_uops(&uops);
    bb.rip_taken = taken;
    bb.rip_not_taken = not_taken;
    bb.bytes = bytes as u16;
    bb.user_insn_count = insns as u16;
    bb.finalize();

    log::trace!(
        "translated {}: {} insns, {} uops, {} bytes{}",
        key,
        insns,
        bb.count(),
        bytes,
        if out.split { ", split" } else { "" }
    );
    Ok(out)
}
