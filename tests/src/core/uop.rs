use ptl_core::opcode::Opcode;
use ptl_core::regs::*;
use ptl_core::types::{Cond, SetFlags};
use ptl_core::uop::*;

fn add() -> TransOp {
    TransOp::new(Opcode::Add, REG_RAX, REG_RBX, REG_RCX, REG_ZERO, SIZE_QWORD)
}

#[test]
fn new_sets_operands() {
    let uop = add();
    assert_eq!(uop.opcode(), Opcode::Add);
    assert_eq!(uop.rd(), REG_RAX);
    assert_eq!(uop.ra(), REG_RBX);
    assert_eq!(uop.rb(), REG_RCX);
    assert_eq!(uop.rc(), REG_ZERO);
    assert_eq!(uop.size(), SIZE_QWORD);
    assert_eq!(uop.size_bytes(), 8);
    assert!(!uop.som());
    assert!(!uop.eom());
}

#[test]
fn fields_do_not_overlap() {
    let uop = add()
        .with_cond(Cond::Nle)
        .with_setflags(SetFlags::ALL)
        .with_som(true)
        .with_eom(true)
        .with_memid(0xff)
        .with_is_x87(true)
        .with_bytes(15)
        .with_tagcount(15)
        .with_cachelevel(3)
        .with_datatype(DATATYPE_VEC_128BIT)
        .with_index(0xff)
        .with_unaligned(true);
    assert_eq!(uop.opcode(), Opcode::Add);
    assert_eq!(uop.rd(), REG_RAX);
    assert_eq!(uop.ra(), REG_RBX);
    assert_eq!(uop.rb(), REG_RCX);
    assert_eq!(uop.rc(), REG_ZERO);
    assert_eq!(uop.size(), SIZE_QWORD);
    assert_eq!(uop.cond(), Cond::Nle);
    assert_eq!(uop.setflags(), SetFlags::ALL);
    assert!(uop.som() && uop.eom() && uop.is_x87() && uop.unaligned());
    assert!(!uop.is_sse());
    assert!(!uop.internal());
    assert_eq!(uop.memid(), 0xff);
    assert_eq!(uop.bytes(), 15);
    assert_eq!(uop.tagcount(), 15);
    assert_eq!(uop.loadcount(), 0);
    assert_eq!(uop.cachelevel(), 3);
    assert_eq!(uop.datatype(), DATATYPE_VEC_128BIT);
    assert_eq!(uop.index(), 0xff);
}

#[test]
fn setter_masks_to_width() {
    let mut uop = add();
    uop.set_rd(0xff);
    assert_eq!(uop.rd(), 0x7f);
    assert_eq!(uop.ra(), REG_RBX);
}

#[test]
fn copies_are_independent() {
    let a = add().with_imm(5, 0);
    let mut b = a;
    b.set_rd(REG_RDX);
    b.rbimm = 7;
    assert_eq!(a.rd(), REG_RAX);
    assert_eq!(a.rbimm, 5);
    assert_ne!(a, b);
    assert_eq!(a, add().with_imm(5, 0));
}

#[test]
fn without_markers() {
    let uop = add().with_som(true).with_eom(true).without_markers();
    assert!(!uop.som());
    assert!(!uop.eom());
}

#[test]
fn immediates() {
    let uop = TransOp::new(Opcode::Add, REG_RAX, REG_RAX, REG_IMM, REG_ZERO, SIZE_DWORD)
        .with_imm(-1, 0);
    assert!(uop.rb_is_imm());
    assert!(!uop.rc_is_imm());
    assert_eq!(uop.rbimm, -1);
}

#[test]
fn arch_regs_used() {
    let uop = add();
    assert_eq!(
        uop.arch_regs_used(),
        (1 << REG_RAX) | (1 << REG_RBX) | (1 << REG_RCX)
    );
    let tmp = TransOp::new(Opcode::Mov, REG_TEMP0, REG_ZERO, REG_IMM, REG_ZERO, SIZE_QWORD);
    assert_eq!(tmp.arch_regs_used(), 0);
    assert!(tmp.writes_reg());
    let st = TransOp::new(Opcode::St, REG_ZERO, REG_RSP, REG_IMM, REG_RAX, SIZE_QWORD);
    assert!(!st.writes_reg());
}

#[test]
fn register_names() {
    assert_eq!(reg_name(REG_RAX), "rax");
    assert_eq!(reg_name(REG_R15), "r15");
    assert_eq!(reg_name(reg_xmml(3)), "xmml3");
    assert_eq!(reg_name(reg_xmmh(15)), "xmmh15");
    assert_eq!(reg_name(REG_RIP), "rip");
    assert_eq!(reg_name(REG_ZERO), "zero");
    assert_eq!(reg_name(REG_IMM), "imm");
    assert_eq!(reg_name(REG_TEMP10), "temp10");
    assert_eq!(reg_name(200), "???");
    assert!(is_arch_reg(REG_ZERO));
    assert!(!is_arch_reg(REG_TEMP0));
}
