//! Translation-cache key: virtual RIP plus the physical pages and mode
//! bits it was decoded under.

use crate::context::Context;
use crate::pte::PageTableWalker;
use crate::types::MAX_BB_BYTES;

/// Number of buckets in the block index.
pub const BB_HASH_SIZE: usize = 1 << 14; // 16384

/// Key of a translated basic block.
///
/// `bits` packs the physical side:
///
/// ```text
/// mfnlo:28 use64:1 kernel:1 padlo:2 mfnhi:28 df:1 padhi:3
/// ```
///
/// `mfnlo` is the frame holding `rip`; `mfnhi` is the frame holding the
/// last byte a block starting at `rip` could cover. Equality compares
/// every bit, so the same RIP under a different mode or mapping is a
/// different key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(C)]
pub struct RipVirtPhys {
    pub rip: u64,
    bits: u64,
}

impl RipVirtPhys {
    /// Frame number sentinel for an unmapped page.
    pub const INVALID: u64 = 0xfff_ffff;

    bit_fields! { bits;
        mfnlo, set_mfnlo, with_mfnlo: 0, 28 => u64;
        mfnhi, set_mfnhi, with_mfnhi: 32, 28 => u64;
    }

    bool_fields! { bits;
        use64, set_use64, with_use64: 28;
        kernel, set_kernel, with_kernel: 29;
        df, set_df, with_df: 60;
    }

    /// Key with both frames marked invalid and all mode bits clear.
    pub fn new(rip: u64) -> Self {
        Self { rip, bits: 0 }
            .with_mfnlo(Self::INVALID)
            .with_mfnhi(Self::INVALID)
    }

    /// Raw packed physical/mode word.
    pub const fn bits(&self) -> u64 {
        self.bits
    }

    pub const fn from_parts(rip: u64, bits: u64) -> Self {
        Self { rip, bits }
    }

    /// Refresh the mode bits and both frame numbers from the context's
    /// current state and page tables.
    pub fn update(
        &mut self,
        ctx: &mut Context,
        walker: &mut (impl PageTableWalker + ?Sized),
    ) -> &mut Self {
        self.set_use64(ctx.use64 != 0);
        self.set_kernel(ctx.kernel_mode != 0);
        self.set_df(ctx.df());

        let lo = ctx.virt_to_pte(walker, self.rip);
        self.set_mfnlo(if lo.p() { lo.mfn() } else { Self::INVALID });

        let last = self.rip.wrapping_add(MAX_BB_BYTES as u64 - 1);
        let hi = ctx.virt_to_pte(walker, last);
        self.set_mfnhi(if hi.p() { hi.mfn() } else { Self::INVALID });
        self
    }

    /// Construct and [`update`](Self::update) in one step.
    pub fn resolve(
        rip: u64,
        ctx: &mut Context,
        walker: &mut (impl PageTableWalker + ?Sized),
    ) -> Self {
        let mut key = Self::new(rip);
        key.update(ctx, walker);
        key
    }

    /// True when the starting page is mapped.
    pub fn is_mapped(&self) -> bool {
        self.mfnlo() != Self::INVALID
    }

    /// Bucket index in the block index. Mixes the RIP with every mode
    /// and frame bit.
    pub fn hash(&self) -> usize {
        let h = (self.rip.wrapping_mul(0x9e37_79b9_7f4a_7c15)
            ^ self.bits.wrapping_mul(0xc2b2_ae3d_27d4_eb4f))
        .wrapping_mul(0x9e37_79b9_7f4a_7c15);
        (h >> (64 - BB_HASH_SIZE.trailing_zeros())) as usize
    }
}
