use ptl_core::bb::BasicBlock;
use ptl_core::context::Context;
use ptl_core::dump::dump_bb;
use ptl_core::error::PageFault;
use ptl_core::opcode::Opcode;
use ptl_core::pte::{Level1Pte, PageFaultErrorCode, PTE_A, PTE_NX, PTE_P, PTE_RW};
use ptl_core::regs::*;
use ptl_core::rip::RipVirtPhys;
use ptl_core::types::{Cond, Exception, SetFlags};
use ptl_core::uop::{TransOp, SIZE_DWORD, SIZE_QWORD};

#[test]
fn uop_registers() {
    let uop = TransOp::new(Opcode::Add, REG_RAX, REG_RBX, REG_RCX, REG_ZERO, SIZE_QWORD);
    assert_eq!(uop.to_string(), "add.q rax = rbx,rcx");
}

#[test]
fn uop_immediate() {
    let uop = TransOp::new(Opcode::Mov, REG_TEMP0, REG_ZERO, REG_IMM, REG_ZERO, SIZE_DWORD)
        .with_imm(0x10, 0);
    assert_eq!(uop.to_string(), "mov.d temp0 = zero,0x10");
}

#[test]
fn uop_branch() {
    let uop = TransOp::new(Opcode::Br, REG_RIP, REG_ZERO, REG_ZERO, REG_ZERO, SIZE_QWORD)
        .with_cond(Cond::E)
        .with_targets(0x1010, 0x1002);
    assert_eq!(uop.to_string(), "br.e.q rip = zero [taken 0x1010, seq 0x1002]");
}

#[test]
fn uop_flags_and_markers() {
    let uop = TransOp::new(Opcode::Add, REG_RAX, REG_RAX, REG_RBX, REG_ZERO, SIZE_QWORD)
        .with_setflags(SetFlags::ALL)
        .with_som(true)
        .with_eom(true);
    let s = uop.to_string();
    assert!(s.starts_with("add.q rax = rax,rbx ["), "{s}");
    assert!(s.ends_with("[som] [eom]"), "{s}");
}

#[test]
fn key() {
    let key = RipVirtPhys::new(0x1ff0)
        .with_mfnlo(5)
        .with_mfnhi(6)
        .with_use64(true);
    assert_eq!(key.to_string(), "0x1ff0 [mfn 0x5/0x6 64]");

    let key = RipVirtPhys::new(0x1000).with_kernel(true).with_df(true);
    assert_eq!(key.to_string(), "0x1000 [mfn inv/inv 32 kernel df]");
}

#[test]
fn block_listing() {
    let mut bb = BasicBlock::new(RipVirtPhys::new(0x1000).with_mfnlo(5).with_mfnhi(5));
    bb.extend_uops(&[
        TransOp::new(Opcode::Ld, REG_RAX, REG_RSP, REG_IMM, REG_ZERO, SIZE_QWORD),
        TransOp::new(Opcode::Bru, REG_RIP, REG_ZERO, REG_ZERO, REG_ZERO, SIZE_QWORD)
            .with_targets(0x1002, 0x1002),
    ]);
    bb.rip_taken = 0x1002;
    bb.rip_not_taken = 0x1002;
    bb.bytes = 2;
    bb.user_insn_count = 1;
    bb.finalize();

    let mut out = Vec::new();
    dump_bb(&bb, &mut out).unwrap();
    let text = String::from_utf8(out).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 4);
    assert_eq!(
        lines[0],
        "bb 0x1000 [mfn 0x5/0x5 32]: 2 uops, 1 insns, 2 bytes, refcount 0, hits 0"
    );
    assert_eq!(lines[1], "  taken 0x1002, not taken 0x1002, loads 1, stores 0");
    assert!(lines[2].starts_with("   0: ld.q rax = rsp"), "{}", lines[2]);
    assert!(lines[3].starts_with("   1: bru.q rip = zero"), "{}", lines[3]);
    assert!(lines[3].ends_with("[eom]"));
}

#[test]
fn pte() {
    let pte = Level1Pte((5 << 12) | PTE_P | PTE_RW | PTE_A | PTE_NX);
    assert_eq!(pte.to_string(), "mfn 0x5 P RW -- A - - NX");
    assert!(format!("{pte:?}").starts_with("Level1Pte(0x8000000000005023"));
}

#[test]
fn page_fault() {
    let code = PageFaultErrorCode::from_bits(0x14);
    assert_eq!(code.to_string(), "0x14 - -- us --- nx");
    let fault = PageFault {
        virt: 0x5000,
        error_code: code,
        exception: Exception::PageFaultOnExec,
    };
    assert_eq!(
        fault.to_string(),
        "PageFaultOnExec at 0x5000 (error code 0x14 - -- us --- nx)"
    );
}

#[test]
fn context_debug() {
    let mut ctx = Context::new(3);
    ctx.set_rip(0x401000);
    ctx.cr3 = 0x7000;
    let s = format!("{ctx:?}");
    assert!(s.starts_with("Context {"));
    assert!(s.contains("vcpuid: 3"));
    assert!(s.contains("rip: 0x401000"));
    assert!(s.contains("cr3: 0x7000"));
    assert!(s.ends_with(".. }"));
}
