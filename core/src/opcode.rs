//! Micro-op opcodes and the static opcode information table.

use crate::types::LOADLAT;

/// Uop opcodes.
///
/// Fits in the 7-bit `opcode` field of a `TransOp`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum Opcode {
    #[default]
    Nop = 0,
    Mov,
    // -- Logical --
    And,
    AndNot,
    Xor,
    Or,
    Nand,
    OrNot,
    Eqv,
    Nor,
    // -- Mask, insert or extract bytes --
    MaskB,
    // -- Add and subtract --
    Add,
    Sub,
    AddA,
    SubA,
    AddM,
    SubM,
    // -- Condition code logical ops --
    AndCc,
    OrCc,
    XorCc,
    OrNotCc,
    // -- Condition code movement and merging --
    MovCcr,
    MovRcc,
    CollCc,
    // -- Simple shifting (immediate 1..8) --
    Shls,
    Shrs,
    Bswap,
    Sars,
    // -- Bit testing --
    Bt,
    Bts,
    Btr,
    Btc,
    // -- Set and select --
    Set,
    SetSub,
    SetAnd,
    Sel,
    // -- Branches --
    Br,
    BrSub,
    BrAnd,
    Jmp,
    Bru,
    Jmpp,
    Brp,
    // -- Checks --
    Chk,
    ChkSub,
    ChkAnd,
    // -- Loads and stores --
    Ld,
    Ldx,
    LdPre,
    St,
    // -- Shifts, rotates and complex masking --
    Shl,
    Shr,
    Mask,
    Sar,
    RotL,
    RotR,
    RotCl,
    RotCr,
    // -- Multiplication --
    MulL,
    MulH,
    MulHu,
    // -- Bit scans --
    Ctz,
    Clz,
    CtPop,
    PermB,
    // -- Floating point --
    AddF,
    SubF,
    MulF,
    MaddF,
    MsubF,
    DivF,
    SqrtF,
    RcpF,
    RsqrtF,
    MinF,
    MaxF,
    CmpF,
    CmpCcF,
    PermF,
    CvtfI2sIns,
    CvtfI2sP,
    CvtfI2dLo,
    CvtfI2dHi,
    CvtfQ2sIns,
    CvtfQ2d,
    CvtfS2i,
    CvtfS2q,
    CvtfS2iP,
    CvtfD2i,
    CvtfD2q,
    CvtfD2iP,
    CvtfD2sIns,
    CvtfD2sP,
    CvtfS2dLo,
    CvtfS2dHi,

    Count,
}

impl Opcode {
    pub const COUNT: usize = Opcode::Count as usize;

    /// Decode a raw 7-bit opcode field.
    pub fn from_raw(v: u8) -> Option<Opcode> {
        if (v as usize) < Self::COUNT {
            // SAFETY: Opcode is repr(u8), discriminants are dense from 0,
            // and v < Count.
            Some(unsafe { std::mem::transmute::<u8, Opcode>(v) })
        } else {
            None
        }
    }

    #[inline]
    pub fn info(self) -> &'static OpcodeInfo {
        &OPINFO[self as usize]
    }

    #[inline]
    pub fn name(self) -> &'static str {
        self.info().name
    }

    #[inline]
    pub fn is_class(self, class: OpClass) -> bool {
        self.info().opclass.intersects(class)
    }

    pub fn is_load(self) -> bool {
        self.is_class(OpClass::LOAD)
    }

    pub fn is_store(self) -> bool {
        self.is_class(OpClass::STORE)
    }

    pub fn is_mem(self) -> bool {
        self.is_class(OpClass::MEM)
    }

    pub fn is_cond_branch(self) -> bool {
        self.is_class(OpClass::COND_BRANCH.union(OpClass::INDIR_BRANCH))
    }

    pub fn is_branch(self) -> bool {
        self.is_class(OpClass::BRANCH)
    }

    pub fn is_barrier(self) -> bool {
        self.is_class(OpClass::BARRIER)
    }

    /// Uses the `cond` field.
    pub fn uses_cond(self) -> bool {
        self.is_class(OpClass::USECOND)
    }
}

/// Operation class bitmap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct OpClass(u32);

impl OpClass {
    pub const NONE: OpClass = OpClass(0);
    pub const LOGIC: OpClass = OpClass(1 << 0);
    pub const ADDSUB: OpClass = OpClass(1 << 1);
    pub const ADDSUBC: OpClass = OpClass(1 << 2);
    pub const ADDSHIFT: OpClass = OpClass(1 << 3);
    pub const ADD: OpClass = OpClass((1 << 1) | (1 << 2) | (1 << 3));
    pub const SELECT: OpClass = OpClass(1 << 4);
    pub const COMPARE: OpClass = OpClass(1 << 5);
    pub const COND_BRANCH: OpClass = OpClass(1 << 6);
    pub const INDIR_BRANCH: OpClass = OpClass(1 << 7);
    pub const UNCOND_BRANCH: OpClass = OpClass(1 << 8);
    pub const ASSIST: OpClass = OpClass(1 << 9);
    pub const BARRIER: OpClass = OpClass::ASSIST;
    pub const BRANCH: OpClass = OpClass((1 << 6) | (1 << 7) | (1 << 8) | (1 << 9));
    pub const LOAD: OpClass = OpClass(1 << 10);
    pub const STORE: OpClass = OpClass(1 << 11);
    pub const PREFETCH: OpClass = OpClass(1 << 12);
    pub const MEM: OpClass = OpClass((1 << 10) | (1 << 11) | (1 << 12));
    pub const SIMPLE_SHIFT: OpClass = OpClass(1 << 13);
    pub const SHIFTROT: OpClass = OpClass(1 << 14);
    pub const MULTIPLY: OpClass = OpClass(1 << 15);
    pub const BITSCAN: OpClass = OpClass(1 << 16);
    pub const FLAGS: OpClass = OpClass(1 << 17);
    pub const CHECK: OpClass = OpClass(1 << 18);
    pub const CONDITIONAL: OpClass = OpClass((1 << 4) | (1 << 6) | (1 << 18));
    pub const USECOND: OpClass = OpClass((1 << 4) | (1 << 6) | (1 << 18));
    pub const FP_ALU: OpClass = OpClass(1 << 19);
    pub const FP_DIVSQRT: OpClass = OpClass(1 << 20);
    pub const FP_COMPARE: OpClass = OpClass(1 << 21);
    pub const FP_PERMUTE: OpClass = OpClass(1 << 22);
    pub const FP_CONVERTI2F: OpClass = OpClass(1 << 23);
    pub const FP_CONVERTF2I: OpClass = OpClass(1 << 24);
    pub const FP_CONVERTFP: OpClass = OpClass(1 << 25);
    pub const FP: OpClass = OpClass(0x7f << 19);

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: OpClass) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn intersects(self, other: OpClass) -> bool {
        self.0 & other.0 != 0
    }

    pub const fn union(self, other: OpClass) -> Self {
        Self(self.0 | other.0)
    }

    /// Index of the lowest class bit, used as a histogram bucket.
    pub const fn index(self) -> u32 {
        self.0.trailing_zeros()
    }
}

pub const OPCLASS_COUNT: usize = 26;

pub static OPCLASS_NAMES: [&str; OPCLASS_COUNT] = [
    "logic",
    "addsub",
    "addsubc",
    "addshift",
    "sel",
    "cmp",
    "br.cc",
    "jmp",
    "bru",
    "assist",
    "ld",
    "st",
    "ld.pre",
    "shiftsimple",
    "shift",
    "mul",
    "bitscan",
    "flags",
    "chk",
    "fpu",
    "fpu.div-sqrt",
    "fpu.cmp",
    "fpu.permute",
    "fpu.cvt-i2f",
    "fpu.cvt-f2i",
    "fpu.cvt-f2f",
];

// Functional unit masks.
pub const FU_LDU0: u16 = 1 << 0;
pub const FU_STU0: u16 = 1 << 1;
pub const FU_LDU1: u16 = 1 << 2;
pub const FU_STU1: u16 = 1 << 3;
pub const FU_ALU0: u16 = 1 << 4;
pub const FU_FPU0: u16 = 1 << 5;
pub const FU_ALU1: u16 = 1 << 6;
pub const FU_FPU1: u16 = 1 << 7;
pub const FU_COUNT: usize = 8;
pub const LOAD_FU_COUNT: usize = 2;

pub static FU_NAMES: [&str; FU_COUNT] = ["ldu0", "stu0", "ldu1", "stu1", "alu0", "fpu0", "alu1", "fpu1"];

/// Static definition of an opcode.
#[derive(Debug, Clone, Copy)]
pub struct OpcodeInfo {
    pub name: &'static str,
    pub opclass: OpClass,
    pub latency: u8,
    /// Functional units able to execute the opcode.
    pub fu: u16,
}

const fn op(name: &'static str, opclass: OpClass, latency: u8, fu: u16) -> OpcodeInfo {
    OpcodeInfo {
        name,
        opclass,
        latency,
        fu,
    }
}

const A: u16 = FU_ALU0 | FU_ALU1;
const L: u16 = FU_LDU0 | FU_LDU1;
const S: u16 = FU_STU0 | FU_STU1;
const F: u16 = FU_FPU0 | FU_FPU1;
const AF: u16 = A | F;

const LOGIC: OpClass = OpClass::LOGIC;
const ADDSUB: OpClass = OpClass::ADDSUB;
const ADDSHIFT: OpClass = OpClass::ADDSHIFT;
const FLAGS: OpClass = OpClass::FLAGS;
const SSHIFT: OpClass = OpClass::SIMPLE_SHIFT;
const SHIFT: OpClass = OpClass::SHIFTROT;
const SEL: OpClass = OpClass::SELECT;
const BRCC: OpClass = OpClass::COND_BRANCH;
const JMP: OpClass = OpClass::INDIR_BRANCH;
const BRU: OpClass = OpClass::UNCOND_BRANCH;
const ASSIST: OpClass = OpClass::ASSIST;
const CHK: OpClass = OpClass::CHECK;
const LD: OpClass = OpClass::LOAD;
const ST: OpClass = OpClass::STORE;
const PRE: OpClass = OpClass::PREFETCH;
const MUL: OpClass = OpClass::MULTIPLY;
const BSCAN: OpClass = OpClass::BITSCAN;
const FALU: OpClass = OpClass::FP_ALU;
const FDIV: OpClass = OpClass::FP_DIVSQRT;
const FCMP: OpClass = OpClass::FP_COMPARE;
const FPERM: OpClass = OpClass::FP_PERMUTE;
const I2F: OpClass = OpClass::FP_CONVERTI2F;
const F2I: OpClass = OpClass::FP_CONVERTF2I;
const F2F: OpClass = OpClass::FP_CONVERTFP;

/// Static opcode information table, indexed by `Opcode as usize`.
pub static OPINFO: [OpcodeInfo; Opcode::COUNT] = [
    op("nop", LOGIC, 1, A),
    op("mov", LOGIC, 1, AF),
    op("and", LOGIC, 1, AF),
    op("andnot", LOGIC, 1, AF),
    op("xor", LOGIC, 1, AF),
    op("or", LOGIC, 1, AF),
    op("nand", LOGIC, 1, AF),
    op("ornot", LOGIC, 1, AF),
    op("eqv", LOGIC, 1, AF),
    op("nor", LOGIC, 1, AF),
    op("maskb", SSHIFT, 1, A),
    op("add", ADDSUB, 1, A),
    op("sub", ADDSUB, 1, A),
    op("adda", ADDSHIFT, 1, A),
    op("suba", ADDSHIFT, 1, A),
    op("addm", ADDSUB, 1, A),
    op("subm", ADDSUB, 1, A),
    op("andcc", FLAGS, 1, A),
    op("orcc", FLAGS, 1, A),
    op("xorcc", FLAGS, 1, A),
    op("ornotcc", FLAGS, 1, A),
    op("movccr", FLAGS, 1, A),
    op("movrcc", FLAGS, 1, A),
    op("collcc", FLAGS, 1, A),
    op("shls", SSHIFT, 1, A),
    op("shrs", SSHIFT, 1, A),
    op("bswap", LOGIC, 1, A),
    op("sars", SSHIFT, 1, A),
    op("bt", LOGIC, 1, A),
    op("bts", LOGIC, 1, A),
    op("btr", LOGIC, 1, A),
    op("btc", LOGIC, 1, A),
    op("set", SEL, 1, AF),
    op("set.sub", SEL, 1, A),
    op("set.and", SEL, 1, A),
    op("sel", SEL, 1, AF),
    op("br", BRCC, 1, A),
    op("br.sub", BRCC, 1, A),
    op("br.and", BRCC, 1, A),
    op("jmp", JMP, 1, A),
    op("bru", BRU, 1, A),
    op("jmpp", JMP, 1, A),
    op("brp", ASSIST, 1, A),
    op("chk", CHK, 1, A),
    op("chk.sub", CHK, 1, A),
    op("chk.and", CHK, 1, A),
    op("ld", LD, LOADLAT, L),
    op("ldx", LD, LOADLAT, L),
    op("ld.pre", PRE, 1, L),
    op("st", ST, 1, S),
    op("shl", SHIFT, 1, A),
    op("shr", SHIFT, 1, A),
    op("mask", SHIFT, 1, A),
    op("sar", SHIFT, 1, A),
    op("rotl", SHIFT, 1, A),
    op("rotr", SHIFT, 1, A),
    op("rotcl", SHIFT, 1, A),
    op("rotcr", SHIFT, 1, A),
    op("mull", MUL, 4, A),
    op("mulh", MUL, 4, A),
    op("mulhu", MUL, 4, A),
    op("ctz", BSCAN, 3, A),
    op("clz", BSCAN, 3, A),
    op("ctpop", BSCAN, 3, A),
    op("permb", SHIFT, 4, A),
    op("addf", FALU, 6, F),
    op("subf", FALU, 6, F),
    op("mulf", FALU, 6, F),
    op("maddf", FALU, 6, F),
    op("msubf", FALU, 6, F),
    op("divf", FDIV, 6, F),
    op("sqrtf", FDIV, 6, F),
    op("rcpf", FDIV, 6, F),
    op("rsqrtf", FDIV, 6, F),
    op("minf", FCMP, 4, F),
    op("maxf", FCMP, 4, F),
    op("cmpf", FCMP, 4, F),
    op("cmpccf", FCMP, 4, F),
    op("permf", FPERM, 3, F),
    op("cvtf.i2s.ins", I2F, 6, F),
    op("cvtf.i2s.p", I2F, 6, F),
    op("cvtf.i2d.lo", I2F, 6, F),
    op("cvtf.i2d.hi", I2F, 6, F),
    op("cvtf.q2s.ins", I2F, 6, F),
    op("cvtf.q2d", I2F, 6, F),
    op("cvtf.s2i", F2I, 6, F),
    op("cvtf.s2q", F2I, 6, F),
    op("cvtf.s2i.p", F2I, 6, F),
    op("cvtf.d2i", F2I, 6, F),
    op("cvtf.d2q", F2I, 6, F),
    op("cvtf.d2i.p", F2I, 6, F),
    op("cvtf.d2s.ins", F2F, 6, F),
    op("cvtf.d2s.p", F2F, 6, F),
    op("cvtf.s2d.lo", F2F, 6, F),
    op("cvtf.s2d.hi", F2F, 6, F),
];

/// Limit for `shls`, `shrs`, `sars` rb immediate.
pub const SIMPLE_SHIFT_LIMIT: i64 = 8;

// Hint bits carried in the `extshift` field of branches.
pub const BRANCH_HINT_PUSH_RAS: u64 = 1 << 0;
pub const BRANCH_HINT_POP_RAS: u64 = 1 << 1;

