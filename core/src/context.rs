use crate::error::PageFault;
use crate::pte::{Level1Pte, PageFaultErrorCode, PageTableWalker, PteUpdate};
use crate::regs::{ARCHREG_COUNT, REG_RIP};
use crate::types::flags::FLAG_DF;
use crate::types::{mfn_of, page_floor, Exception, EXCEPTION_X86_PAGE_FAULT, PAGE_SHIFT};

/// Number of slots in the per-context translation mini-cache.
pub const PTE_CACHE_SIZE: usize = 16;

/// Tag of an empty mini-cache slot. Never page aligned, so it cannot
/// match any virtual page.
pub const PTE_CACHE_INVALID: u64 = u64::MAX;

/// Physical address bits of CR3 that hold the top-level table frame.
const CR3_MFN_MASK: u64 = 0x000f_ffff_ffff_f000;

/// Kind of memory access being translated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessKind {
    Read,
    Write,
    Exec,
}

impl AccessKind {
    pub fn fault_exception(self) -> Exception {
        match self {
            AccessKind::Read => Exception::PageFaultOnRead,
            AccessKind::Write => Exception::PageFaultOnWrite,
            AccessKind::Exec => Exception::PageFaultOnExec,
        }
    }
}

/// Result of a successful [`Context::check_and_translate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhysTranslation {
    pub paddr: u64,
    pub pte: Level1Pte,
    /// Accessed/dirty bits to write back once the access commits.
    pub update: PteUpdate,
}

/// Per-VCPU execution context.
///
/// Exactly one page, page aligned, with a fixed `repr(C)` layout: the
/// host saves and restores it as a unit. Each VCPU owns its own
/// context, so the mini-cache is never shared.
#[repr(C, align(4096))]
pub struct Context {
    pub commitarf: [u64; ARCHREG_COUNT],
    pub vcpuid: u32,
    pub internal_eflags: u32,
    pub use32: u8,
    pub use64: u8,
    pub kernel_mode: u8,
    pub running: u8,
    _pad: [u8; 4],
    /// Pending x86 exception vector.
    pub exception: u64,
    pub error_code: u64,
    pub cr2: u64,
    pub cr3: u64,
    pub pte_cache_hits: u64,
    pub pte_cache_misses: u64,
    /// Page-aligned virtual address cached in each slot.
    pub cached_pte_virt: [u64; PTE_CACHE_SIZE],
    pub cached_pte: [Level1Pte; PTE_CACHE_SIZE],
}

const _: () = assert!(std::mem::size_of::<Context>() == 4096);
const _: () = assert!(std::mem::align_of::<Context>() == 4096);

impl Default for Context {
    fn default() -> Self {
        Self::new(0)
    }
}

impl Context {
    pub fn new(vcpuid: u32) -> Self {
        Self {
            commitarf: [0; ARCHREG_COUNT],
            vcpuid,
            internal_eflags: 0,
            use32: 1,
            use64: 1,
            kernel_mode: 0,
            running: 0,
            _pad: [0; 4],
            exception: 0,
            error_code: 0,
            cr2: 0,
            cr3: 0,
            pte_cache_hits: 0,
            pte_cache_misses: 0,
            cached_pte_virt: [PTE_CACHE_INVALID; PTE_CACHE_SIZE],
            cached_pte: [Level1Pte::NOT_PRESENT; PTE_CACHE_SIZE],
        }
    }

    /// Return to the power-on state, keeping the VCPU id.
    pub fn reset(&mut self) {
        *self = Self::new(self.vcpuid);
    }

    #[inline]
    pub fn rip(&self) -> u64 {
        self.commitarf[REG_RIP as usize]
    }

    #[inline]
    pub fn set_rip(&mut self, rip: u64) {
        self.commitarf[REG_RIP as usize] = rip;
    }

    /// Direction flag from the internal EFLAGS copy.
    #[inline]
    pub fn df(&self) -> bool {
        self.internal_eflags & FLAG_DF != 0
    }

    #[inline]
    pub fn toplevel_mfn(&self) -> u64 {
        mfn_of(self.cr3 & CR3_MFN_MASK)
    }

    /// Load a new page-table base. Every cached translation is dropped.
    pub fn write_cr3(&mut self, cr3: u64) {
        self.cr3 = cr3;
        self.flush_tlb();
    }

    #[inline]
    fn pte_slot(virt: u64) -> usize {
        ((virt >> PAGE_SHIFT) as usize) & (PTE_CACHE_SIZE - 1)
    }

    /// Resolve `virt` to its accumulated leaf entry through the
    /// mini-cache.
    ///
    /// A tag mismatch always overwrites the slot with a fresh walk, and
    /// non-present results are cached like any other.
    pub fn virt_to_pte(
        &mut self,
        walker: &mut (impl PageTableWalker + ?Sized),
        virt: u64,
    ) -> Level1Pte {
        let slot = Self::pte_slot(virt);
        let tag = page_floor(virt);
        if self.cached_pte_virt[slot] == tag {
            self.pte_cache_hits += 1;
            return self.cached_pte[slot];
        }
        self.pte_cache_misses += 1;
        let pte = walker.walk(virt, self.toplevel_mfn());
        self.cached_pte_virt[slot] = tag;
        self.cached_pte[slot] = pte;
        pte
    }

    /// Alias of [`virt_to_pte`](Self::virt_to_pte).
    #[inline]
    pub fn resolve(
        &mut self,
        walker: &mut (impl PageTableWalker + ?Sized),
        virt: u64,
    ) -> Level1Pte {
        self.virt_to_pte(walker, virt)
    }

    /// Drop every cached translation.
    pub fn flush_tlb(&mut self) {
        log::trace!("vcpu {}: flush tlb", self.vcpuid);
        self.cached_pte_virt = [PTE_CACHE_INVALID; PTE_CACHE_SIZE];
        self.cached_pte = [Level1Pte::NOT_PRESENT; PTE_CACHE_SIZE];
    }

    /// Drop the cached translation for `virt`'s page, if present.
    pub fn flush_tlb_virt(&mut self, virt: u64) {
        let slot = Self::pte_slot(virt);
        if self.cached_pte_virt[slot] == page_floor(virt) {
            log::trace!("vcpu {}: flush tlb slot {slot} for {virt:#x}", self.vcpuid);
            self.cached_pte_virt[slot] = PTE_CACHE_INVALID;
            self.cached_pte[slot] = Level1Pte::NOT_PRESENT;
        }
    }

    /// Cached `(tag, pte)` of a slot; `None` when the slot is empty.
    pub fn cached_entry(&self, slot: usize) -> Option<(u64, Level1Pte)> {
        let tag = self.cached_pte_virt[slot];
        (tag != PTE_CACHE_INVALID).then(|| (tag, self.cached_pte[slot]))
    }

    /// Translate `virt` for an access of the given kind and check the
    /// accumulated permissions. Write protection is always enforced.
    pub fn check_and_translate(
        &mut self,
        walker: &mut (impl PageTableWalker + ?Sized),
        virt: u64,
        access: AccessKind,
    ) -> Result<PhysTranslation, PageFault> {
        let pte = self.virt_to_pte(walker, virt);
        let write = access == AccessKind::Write;
        let exec = access == AccessKind::Exec;
        let user = self.kernel_mode == 0;

        let fault =
            !pte.p() || (write && !pte.rw()) || (user && !pte.us()) || (exec && pte.nx());
        if fault {
            let error_code = PageFaultErrorCode::default()
                .with_p(pte.p())
                .with_rw(write)
                .with_us(user)
                .with_nx(exec);
            return Err(PageFault {
                virt,
                error_code,
                exception: access.fault_exception(),
            });
        }

        let update = PteUpdate::default()
            .with_a(!pte.a())
            .with_d(write && !pte.d());
        Ok(PhysTranslation {
            paddr: pte.phys_addr(virt),
            pte,
            update,
        })
    }

    /// Load a page fault into the exception slots, ready for injection.
    pub fn propagate_page_fault(&mut self, fault: &PageFault) {
        self.exception = EXCEPTION_X86_PAGE_FAULT as u64;
        self.error_code = fault.error_code.bits() as u64;
        self.cr2 = fault.virt;
    }

    /// Commit accessed/dirty bits for `virt` to the page tables and to
    /// the cached copy.
    pub fn update_pte_acc_dirty(
        &mut self,
        walker: &mut (impl PageTableWalker + ?Sized),
        virt: u64,
        update: PteUpdate,
    ) {
        if update.is_empty() {
            return;
        }
        walker.update_acc_dirty(virt, self.toplevel_mfn(), update);

        let slot = Self::pte_slot(virt);
        if self.cached_pte_virt[slot] == page_floor(virt) {
            let pte = &mut self.cached_pte[slot];
            if update.a() {
                pte.set_a(true);
            }
            if update.d() {
                pte.set_d(true);
            }
        }
    }
}
