use ptl_core::pte::*;

#[test]
fn level1_fields() {
    let pte = Level1Pte::default()
        .with_p(true)
        .with_rw(true)
        .with_mfn(0x12345)
        .with_nx(true)
        .with_d(true);
    assert!(pte.p() && pte.rw() && pte.nx() && pte.d());
    assert!(!pte.us());
    assert_eq!(pte.mfn(), 0x12345);
    assert_eq!(pte.0, PTE_P | PTE_RW | PTE_D | PTE_NX | (0x12345 << 12));
    assert_eq!(pte.phys_addr(0xdead_b123), (0x12345 << 12) | 0x123);
}

#[test]
fn level2_large_page_bit() {
    let pde = Level2Pte::from_raw(PTE_P | PTE_PSZ);
    assert!(pde.psz());
    assert!(!Level2Pte::from_raw(PTE_P).psz());
}

#[test]
fn accum_ands_permissions_and_ors_nx() {
    let upper = [
        Level4Pte(PTE_P | PTE_RW | PTE_US),
        Level4Pte(PTE_P | PTE_US),
        Level4Pte(PTE_P | PTE_RW | PTE_US | PTE_NX),
    ];
    let mut leaf = Level1Pte(PTE_P | PTE_RW | PTE_US | (7 << 12));
    for e in upper {
        leaf.accum(e);
    }
    assert!(leaf.p());
    assert!(!leaf.rw());
    assert!(leaf.us());
    assert!(leaf.nx());
    assert_eq!(leaf.mfn(), 7);
}

#[test]
fn accum_identity() {
    let mut acc = Level1Pte::ALL_ACCESS;
    acc.accum(Level3Pte(PTE_P | PTE_RW | PTE_US | PTE_A));
    assert!(acc.p() && acc.rw() && acc.us());
    assert!(!acc.nx());
    // Non-permission bits of upper levels are not copied down.
    assert!(!acc.a());
}

#[test]
fn accum_not_present_sticks() {
    let mut leaf = Level1Pte(PTE_P | PTE_RW | PTE_US);
    leaf.accum(Level2Pte(PTE_RW | PTE_US));
    assert!(!leaf.p());
}

#[test]
fn level_index_extracts_nine_bits() {
    let virt = (0x1a3u64 << 39) | (0x0f2 << 30) | (0x155 << 21) | (0x0aa << 12) | 0x123;
    assert_eq!(level_index(virt, 4), 0x1a3);
    assert_eq!(level_index(virt, 3), 0x0f2);
    assert_eq!(level_index(virt, 2), 0x155);
    assert_eq!(level_index(virt, 1), 0x0aa);
}

#[test]
fn page_fault_error_code_bits() {
    let pfec = PageFaultErrorCode::default()
        .with_p(true)
        .with_rw(true)
        .with_us(true)
        .with_nx(true);
    assert_eq!(pfec.bits(), 0b10111);
    assert_eq!(PageFaultErrorCode::from_bits(0b10111), pfec);
    assert!(!pfec.rsv());
    assert_eq!(PageFaultErrorCode::from_bits(0xffff_ffff).bits(), 0x1f);
}

#[test]
fn pte_update() {
    assert!(PteUpdate::default().is_empty());
    let u = PteUpdate::default().with_a(true).with_d(true);
    assert!(u.a() && u.d() && !u.ptwrite());
    assert!(!u.is_empty());
}
