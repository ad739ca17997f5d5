//! Architectural and rename-only register indices.
//!
//! Indices 0..64 are the committed architectural registers held in
//! `Context::commitarf`; 64..80 exist only for renaming inside the core.

/// Number of architectural registers.
pub const ARCHREG_COUNT: usize = 64;
/// Architectural plus rename-only registers.
pub const TRANSREG_COUNT: usize = 64 + 16;

pub const ARCHREG_INT_BASE: u8 = 0;
pub const ARCHREG_SSE_BASE: u8 = 16;

pub const REG_RAX: u8 = 0;
pub const REG_RCX: u8 = 1;
pub const REG_RDX: u8 = 2;
pub const REG_RBX: u8 = 3;
pub const REG_RSP: u8 = 4;
pub const REG_RBP: u8 = 5;
pub const REG_RSI: u8 = 6;
pub const REG_RDI: u8 = 7;
pub const REG_R8: u8 = 8;
pub const REG_R9: u8 = 9;
pub const REG_R10: u8 = 10;
pub const REG_R11: u8 = 11;
pub const REG_R12: u8 = 12;
pub const REG_R13: u8 = 13;
pub const REG_R14: u8 = 14;
pub const REG_R15: u8 = 15;

/// Low half of xmm`n`.
pub const fn reg_xmml(n: u8) -> u8 {
    ARCHREG_SSE_BASE + 2 * n
}

/// High half of xmm`n`.
pub const fn reg_xmmh(n: u8) -> u8 {
    ARCHREG_SSE_BASE + 2 * n + 1
}

pub const REG_FPTOS: u8 = 48;
pub const REG_FPSW: u8 = 49;
pub const REG_FPTAGS: u8 = 50;
pub const REG_FPSTACK: u8 = 51;
pub const REG_TR4: u8 = 52;
pub const REG_TR5: u8 = 53;
pub const REG_TR6: u8 = 54;
pub const REG_CTX: u8 = 55;
pub const REG_RIP: u8 = 56;
pub const REG_FLAGS: u8 = 57;
pub const REG_IFLAGS: u8 = 58;
pub const REG_SELFRIP: u8 = 59;
pub const REG_NEXTRIP: u8 = 60;
pub const REG_AR1: u8 = 61;
pub const REG_AR2: u8 = 62;
pub const REG_ZERO: u8 = 63;

/// Architectural null register: reads as zero, writes are dropped.
pub const ARCHREG_NULL: u8 = REG_ZERO;

// Rename-only.
pub const REG_TEMP0: u8 = 64;
pub const REG_TEMP1: u8 = 65;
pub const REG_TEMP2: u8 = 66;
pub const REG_TEMP3: u8 = 67;
pub const REG_TEMP4: u8 = 68;
pub const REG_TEMP5: u8 = 69;
pub const REG_TEMP6: u8 = 70;
pub const REG_TEMP7: u8 = 71;
pub const REG_ZF: u8 = 72;
pub const REG_CF: u8 = 73;
pub const REG_OF: u8 = 74;
pub const REG_IMM: u8 = 75;
pub const REG_MEM: u8 = 76;
pub const REG_TEMP8: u8 = 77;
pub const REG_TEMP9: u8 = 78;
pub const REG_TEMP10: u8 = 79;

#[rustfmt::skip]
pub static ARCH_REG_NAMES: [&str; TRANSREG_COUNT] = [
    // Integer
    "rax", "rcx", "rdx", "rbx", "rsp", "rbp", "rsi", "rdi",
    "r8", "r9", "r10", "r11", "r12", "r13", "r14", "r15",
    // SSE
    "xmml0", "xmmh0", "xmml1", "xmmh1", "xmml2", "xmmh2", "xmml3", "xmmh3",
    "xmml4", "xmmh4", "xmml5", "xmmh5", "xmml6", "xmmh6", "xmml7", "xmmh7",
    "xmml8", "xmmh8", "xmml9", "xmmh9", "xmml10", "xmmh10", "xmml11", "xmmh11",
    "xmml12", "xmmh12", "xmml13", "xmmh13", "xmml14", "xmmh14", "xmml15", "xmmh15",
    // x87 and special
    "fptos", "fpsw", "fptags", "fpstack", "tr4", "tr5", "tr6", "ctx",
    "rip", "flags", "iflags", "selfrip", "nextrip", "ar1", "ar2", "zero",
    // Rename-only
    "temp0", "temp1", "temp2", "temp3", "temp4", "temp5", "temp6", "temp7",
    "zf", "cf", "of", "imm", "mem", "temp8", "temp9", "temp10",
];

/// Name of register `r`, or `"???"` when out of range.
pub fn reg_name(r: u8) -> &'static str {
    ARCH_REG_NAMES.get(r as usize).copied().unwrap_or("???")
}

/// True for registers that live in `commitarf`.
pub const fn is_arch_reg(r: u8) -> bool {
    (r as usize) < ARCHREG_COUNT
}
