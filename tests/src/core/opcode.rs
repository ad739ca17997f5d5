use ptl_core::opcode::*;
use ptl_core::types::LOADLAT;

#[test]
fn table_covers_every_opcode() {
    assert_eq!(OPINFO.len(), Opcode::COUNT);
    for v in 0..Opcode::COUNT as u8 {
        let op = Opcode::from_raw(v).unwrap();
        assert_eq!(op as u8, v);
        assert!(!op.name().is_empty());
        assert!(op.info().latency >= 1);
        assert_ne!(op.info().fu, 0);
    }
}

#[test]
fn from_raw_rejects_out_of_range() {
    assert_eq!(Opcode::from_raw(Opcode::COUNT as u8), None);
    assert_eq!(Opcode::from_raw(0x7f), None);
}

#[test]
fn fits_in_seven_bits() {
    assert!(Opcode::COUNT <= 128);
}

#[test]
fn names() {
    assert_eq!(Opcode::Nop.name(), "nop");
    assert_eq!(Opcode::Add.name(), "add");
    assert_eq!(Opcode::Bru.name(), "bru");
    assert_eq!(Opcode::Ld.name(), "ld");
    assert_eq!(Opcode::CvtfS2dHi.name(), "cvtf.s2d.hi");
}

#[test]
fn classification() {
    assert!(Opcode::Ld.is_load());
    assert!(Opcode::Ldx.is_load());
    assert!(Opcode::Ld.is_mem());
    assert!(!Opcode::Ld.is_store());
    assert!(Opcode::St.is_store());
    assert!(Opcode::St.is_mem());
    assert!(Opcode::LdPre.is_mem());
    assert!(!Opcode::LdPre.is_load());

    assert!(Opcode::Br.is_branch());
    assert!(Opcode::Br.is_cond_branch());
    assert!(Opcode::Bru.is_branch());
    assert!(!Opcode::Bru.is_cond_branch());
    assert!(Opcode::Jmp.is_branch());
    assert!(Opcode::Brp.is_barrier());
    assert!(!Opcode::Add.is_branch());

    assert!(Opcode::Br.uses_cond());
    assert!(Opcode::Sel.uses_cond());
    assert!(Opcode::Chk.uses_cond());
    assert!(!Opcode::Add.uses_cond());
}

#[test]
fn latencies() {
    assert_eq!(Opcode::Add.info().latency, 1);
    assert_eq!(Opcode::Ld.info().latency, LOADLAT);
    assert!(Opcode::MulL.info().latency > Opcode::Add.info().latency);
}

#[test]
fn functional_units() {
    assert_eq!(Opcode::Ld.info().fu & (FU_ALU0 | FU_ALU1), 0);
    assert_ne!(Opcode::Ld.info().fu & FU_LDU0, 0);
    assert_ne!(Opcode::St.info().fu & FU_STU0, 0);
    assert_ne!(Opcode::AddF.info().fu & FU_FPU0, 0);
}

#[test]
fn opclass_ops() {
    let c = OpClass::LOAD.union(OpClass::STORE);
    assert!(c.contains(OpClass::LOAD));
    assert!(c.intersects(OpClass::MEM));
    assert!(!c.contains(OpClass::MEM));
    assert_eq!(OpClass::LOAD.index(), 10);
    assert_eq!(OPCLASS_NAMES[OpClass::LOAD.index() as usize], "ld");
}
