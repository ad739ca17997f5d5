use ptl_core::context::*;
use ptl_core::pte::PTE_RW;
use ptl_core::regs::REG_RIP;
use ptl_core::types::{flags::FLAG_DF, Exception, EXCEPTION_X86_PAGE_FAULT};

use crate::common::{PageTableBuilder, USER_RW};

fn setup() -> (Context, ptl_core::X86Walker<ptl_core::SparseMem>) {
    let mut pt = PageTableBuilder::new();
    pt.map(0x1000, 5, USER_RW)
        .map(0x2000, 6, USER_RW)
        .map(0x11000, 7, USER_RW);
    pt.finish()
}

#[test]
fn layout_is_one_page() {
    assert_eq!(std::mem::size_of::<Context>(), 4096);
    assert_eq!(std::mem::align_of::<Context>(), 4096);
    let ctx = Box::new(Context::new(3));
    assert_eq!(&*ctx as *const Context as usize % 4096, 0);
    assert_eq!(ctx.vcpuid, 3);
}

#[test]
fn new_context_has_empty_cache() {
    let ctx = Context::new(0);
    for slot in 0..PTE_CACHE_SIZE {
        assert_eq!(ctx.cached_entry(slot), None);
    }
}

#[test]
fn resolve_twice_walks_once() {
    let (mut ctx, mut walker) = setup();
    let a = ctx.resolve(&mut walker, 0x1234);
    let b = ctx.resolve(&mut walker, 0x1ff8);
    assert_eq!(a, b);
    assert_eq!(a.mfn(), 5);
    assert_eq!(walker.walks(), 1);
    assert_eq!(ctx.pte_cache_misses, 1);
    assert_eq!(ctx.pte_cache_hits, 1);
}

#[test]
fn flush_forces_walk() {
    let (mut ctx, mut walker) = setup();
    ctx.resolve(&mut walker, 0x1000);
    ctx.flush_tlb();
    ctx.resolve(&mut walker, 0x1000);
    assert_eq!(walker.walks(), 2);
}

#[test]
fn conflicting_pages_thrash_one_slot() {
    let (mut ctx, mut walker) = setup();
    // 0x1000 and 0x11000 share slot 1.
    assert_eq!(ctx.resolve(&mut walker, 0x1000).mfn(), 5);
    assert_eq!(ctx.resolve(&mut walker, 0x11000).mfn(), 7);
    assert_eq!(ctx.resolve(&mut walker, 0x1000).mfn(), 5);
    assert_eq!(walker.walks(), 3);
    assert_eq!(ctx.cached_entry(1).map(|(tag, _)| tag), Some(0x1000));
}

#[test]
fn flush_virt_clears_matching_slot_only() {
    let (mut ctx, mut walker) = setup();
    ctx.resolve(&mut walker, 0x1000);
    ctx.resolve(&mut walker, 0x2000);

    // Same slot, different tag: no-op.
    ctx.flush_tlb_virt(0x11000);
    assert!(ctx.cached_entry(1).is_some());

    ctx.flush_tlb_virt(0x1abc);
    assert!(ctx.cached_entry(1).is_none());
    assert!(ctx.cached_entry(2).is_some());

    ctx.resolve(&mut walker, 0x2000);
    assert_eq!(walker.walks(), 2);
    ctx.resolve(&mut walker, 0x1000);
    assert_eq!(walker.walks(), 3);
}

#[test]
fn write_cr3_flushes() {
    let (mut ctx, mut walker) = setup();
    ctx.resolve(&mut walker, 0x1000);
    let cr3 = ctx.cr3;
    ctx.write_cr3(cr3);
    assert!(ctx.cached_entry(1).is_none());
    ctx.resolve(&mut walker, 0x1000);
    assert_eq!(walker.walks(), 2);
}

#[test]
fn non_present_results_are_cached() {
    let (mut ctx, mut walker) = setup();
    assert!(!ctx.resolve(&mut walker, 0x5000).p());
    assert!(!ctx.resolve(&mut walker, 0x5000).p());
    assert_eq!(walker.walks(), 1);
}

#[test]
fn translate_read_sets_accessed_update() {
    let (mut ctx, mut walker) = setup();
    let t = ctx
        .check_and_translate(&mut walker, 0x1234, AccessKind::Read)
        .unwrap();
    assert_eq!(t.paddr, 0x5234);
    assert!(t.update.a());
    assert!(!t.update.d());
}

#[test]
fn translate_write_requests_dirty() {
    let (mut ctx, mut walker) = setup();
    let t = ctx
        .check_and_translate(&mut walker, 0x2008, AccessKind::Write)
        .unwrap();
    assert_eq!(t.paddr, 0x6008);
    assert!(t.update.a() && t.update.d());

    ctx.update_pte_acc_dirty(&mut walker, 0x2008, t.update);
    let (_, cached) = ctx.cached_entry(2).unwrap();
    assert!(cached.a() && cached.d());

    // Both bits now set: nothing more to write back.
    let t = ctx
        .check_and_translate(&mut walker, 0x2010, AccessKind::Write)
        .unwrap();
    assert!(t.update.is_empty());

    // The page tables saw the update too.
    ctx.flush_tlb();
    let pte = ctx.resolve(&mut walker, 0x2000);
    assert!(pte.a() && pte.d());
}

#[test]
fn fault_on_not_present() {
    let (mut ctx, mut walker) = setup();
    let fault = ctx
        .check_and_translate(&mut walker, 0x5008, AccessKind::Read)
        .unwrap_err();
    assert_eq!(fault.virt, 0x5008);
    assert_eq!(fault.exception, Exception::PageFaultOnRead);
    assert!(!fault.error_code.p());
    assert!(!fault.error_code.rw());
    assert!(fault.error_code.us());
    assert!(!fault.error_code.nx());
}

#[test]
fn fault_on_write_to_read_only() {
    let mut pt = PageTableBuilder::new();
    pt.map(0x1000, 5, USER_RW & !PTE_RW);
    let (mut ctx, mut walker) = pt.finish();
    assert!(ctx
        .check_and_translate(&mut walker, 0x1000, AccessKind::Read)
        .is_ok());
    let fault = ctx
        .check_and_translate(&mut walker, 0x1000, AccessKind::Write)
        .unwrap_err();
    assert_eq!(fault.exception, Exception::PageFaultOnWrite);
    assert!(fault.error_code.p() && fault.error_code.rw());
}

#[test]
fn fault_on_user_access_to_kernel_page() {
    let mut pt = PageTableBuilder::new();
    pt.map(0x1000, 5, ptl_core::pte::PTE_P | PTE_RW);
    let (mut ctx, mut walker) = pt.finish();
    assert!(ctx
        .check_and_translate(&mut walker, 0x1000, AccessKind::Read)
        .is_err());
    ctx.kernel_mode = 1;
    assert!(ctx
        .check_and_translate(&mut walker, 0x1000, AccessKind::Read)
        .is_ok());
}

#[test]
fn fault_on_exec_of_nx_page() {
    let mut pt = PageTableBuilder::new();
    pt.map(0x1000, 5, USER_RW | ptl_core::pte::PTE_NX);
    let (mut ctx, mut walker) = pt.finish();
    assert!(ctx
        .check_and_translate(&mut walker, 0x1000, AccessKind::Read)
        .is_ok());
    let fault = ctx
        .check_and_translate(&mut walker, 0x1000, AccessKind::Exec)
        .unwrap_err();
    assert_eq!(fault.exception, Exception::PageFaultOnExec);
    assert!(fault.is_exec());
    assert!(fault.error_code.p() && fault.error_code.nx());
}

#[test]
fn propagate_page_fault_loads_exception_slots() {
    let (mut ctx, mut walker) = setup();
    let fault = ctx
        .check_and_translate(&mut walker, 0x5008, AccessKind::Write)
        .unwrap_err();
    ctx.propagate_page_fault(&fault);
    assert_eq!(ctx.exception, EXCEPTION_X86_PAGE_FAULT as u64);
    assert_eq!(ctx.error_code, fault.error_code.bits() as u64);
    assert_eq!(ctx.cr2, 0x5008);
}

#[test]
fn mode_helpers() {
    let mut ctx = Context::new(1);
    assert!(!ctx.df());
    ctx.internal_eflags |= FLAG_DF;
    assert!(ctx.df());
    ctx.set_rip(0x4000);
    assert_eq!(ctx.rip(), 0x4000);
    assert_eq!(ctx.commitarf[REG_RIP as usize], 0x4000);
    ctx.cr3 = 0x8000_0000_1234_5fff;
    assert_eq!(ctx.toplevel_mfn(), 0x12345);
}

#[test]
fn reset_keeps_vcpuid() {
    let (mut ctx, mut walker) = setup();
    ctx.vcpuid = 7;
    ctx.resolve(&mut walker, 0x1000);
    ctx.reset();
    assert_eq!(ctx.vcpuid, 7);
    assert_eq!(ctx.cr3, 0);
    assert_eq!(ctx.pte_cache_misses, 0);
    assert!(ctx.cached_entry(1).is_none());
}
