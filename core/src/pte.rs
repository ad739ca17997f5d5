//! x86-64 page-table entries and the page-table walk contract.
//!
//! Each level is a bit-packed `u64` newtype matching the hardware
//! format. A walk folds the upper levels into the leaf with
//! [`Level1Pte::accum`]: present, writable and user bits are ANDed down
//! the levels, the no-execute bit is ORed up.

use crate::types::{page_offset, PAGE_SHIFT};

pub const PTE_P: u64 = 1 << 0;
pub const PTE_RW: u64 = 1 << 1;
pub const PTE_US: u64 = 1 << 2;
pub const PTE_PWT: u64 = 1 << 3;
pub const PTE_PCD: u64 = 1 << 4;
pub const PTE_A: u64 = 1 << 5;
pub const PTE_D: u64 = 1 << 6;
pub const PTE_PSZ: u64 = 1 << 7;
pub const PTE_G: u64 = 1 << 8;
pub const PTE_NX: u64 = 1 << 63;

/// Bits ANDed down the levels during a walk.
const ACCUM_AND: u64 = PTE_P | PTE_RW | PTE_US;

/// Raw access shared by every level.
pub trait PteBits: Copy {
    fn raw(&self) -> u64;
}

macro_rules! pte_common {
    ($ty:ident) => {
        impl $ty {
            bool_fields! { 0;
                p, set_p, with_p: 0;
                rw, set_rw, with_rw: 1;
                us, set_us, with_us: 2;
                pwt, set_pwt, with_pwt: 3;
                pcd, set_pcd, with_pcd: 4;
                a, set_a, with_a: 5;
                nx, set_nx, with_nx: 63;
            }

            bit_fields! { 0;
                avl, set_avl, with_avl: 9, 3 => u8;
                /// Machine frame number of the next level (or the page).
                mfn, set_mfn, with_mfn: 12, 40 => u64;
            }

            pub const fn from_raw(raw: u64) -> Self {
                Self(raw)
            }
        }

        impl PteBits for $ty {
            #[inline]
            fn raw(&self) -> u64 {
                self.0
            }
        }
    };
}

/// PML4 entry.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct Level4Pte(pub u64);

/// PDPT entry.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct Level3Pte(pub u64);

/// Page directory entry; `psz` maps a 2 MiB page.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct Level2Pte(pub u64);

/// Page table entry (the leaf). A walk returns one of these with the
/// permissions of every level folded in.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct Level1Pte(pub u64);

pte_common!(Level4Pte);
pte_common!(Level3Pte);
pte_common!(Level2Pte);
pte_common!(Level1Pte);

impl Level2Pte {
    bool_fields! { 0;
        d, set_d, with_d: 6;
        psz, set_psz, with_psz: 7;
    }
}

impl Level1Pte {
    bool_fields! { 0;
        d, set_d, with_d: 6;
        pat, set_pat, with_pat: 7;
        g, set_g, with_g: 8;
    }

    /// Identity for [`accum`](Self::accum): present, writable, user, executable.
    pub const ALL_ACCESS: Level1Pte = Level1Pte(ACCUM_AND);

    /// Result of a walk that hit a non-present entry.
    pub const NOT_PRESENT: Level1Pte = Level1Pte(0);

    /// Fold an upper-level entry into this one.
    #[inline]
    pub fn accum<T: PteBits>(&mut self, upper: T) {
        let raw = upper.raw();
        self.0 &= raw | !ACCUM_AND;
        self.0 |= raw & PTE_NX;
    }

    /// Physical address of `virt` through this mapping.
    #[inline]
    pub fn phys_addr(&self, virt: u64) -> u64 {
        (self.mfn() << PAGE_SHIFT) | page_offset(virt)
    }
}

/// Page fault error code pushed for `#PF`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PageFaultErrorCode(u64);

impl PageFaultErrorCode {
    bool_fields! { 0;
        /// Fault was a protection violation (entry present).
        p, set_p, with_p: 0;
        /// Access was a write.
        rw, set_rw, with_rw: 1;
        /// Access came from user mode.
        us, set_us, with_us: 2;
        rsv, set_rsv, with_rsv: 3;
        /// Access was an instruction fetch.
        nx, set_nx, with_nx: 4;
    }

    pub const fn bits(&self) -> u32 {
        self.0 as u32
    }

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits as u64 & 0x1f)
    }
}

/// Accessed/dirty bits to write back to the page tables once the
/// access commits.
///
/// `ptwrite` marks a store to a read-only page-table page that the
/// hypervisor is expected to trap and emulate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PteUpdate(u64);

impl PteUpdate {
    bool_fields! { 0;
        a, set_a, with_a: 0;
        d, set_d, with_d: 1;
        ptwrite, set_ptwrite, with_ptwrite: 2;
    }

    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

/// Index into the table of the given level (4 = PML4 .. 1 = PT).
#[inline]
pub const fn level_index(virt: u64, level: u32) -> u64 {
    (virt >> (PAGE_SHIFT + 9 * (level - 1))) & 0x1ff
}

/// Full multi-level page-table walk.
///
/// Implementations must return a leaf whose present, writable and
/// user bits are the AND over every level traversed and whose NX bit
/// is the OR; a walk that stops at a non-present level returns an
/// entry with `p` clear.
pub trait PageTableWalker {
    fn walk(&mut self, virt: u64, toplevel_mfn: u64) -> Level1Pte;

    /// Write back accessed/dirty bits for a committed access.
    fn update_acc_dirty(&mut self, _virt: u64, _toplevel_mfn: u64, _update: PteUpdate) {}
}
