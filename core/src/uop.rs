//! Fixed-width micro-op (`TransOp`) encoding.

use crate::opcode::Opcode;
use crate::regs::{is_arch_reg, REG_IMM, REG_ZERO};
use crate::types::{Cond, SetFlags};

/// Operand size classes for the 2-bit `size` field.
pub const SIZE_BYTE: u8 = 0;
pub const SIZE_WORD: u8 = 1;
pub const SIZE_DWORD: u8 = 2;
pub const SIZE_QWORD: u8 = 3;

pub const SIZE_NAMES: [&str; 4] = ["b", "w", "d", "q"];

/// Data type hints for loads and stores (profiling only).
pub const DATATYPE_INT: u8 = 0;
pub const DATATYPE_FLOAT: u8 = 1;
pub const DATATYPE_VEC_FLOAT: u8 = 2;
pub const DATATYPE_DOUBLE: u8 = 3;
pub const DATATYPE_VEC_DOUBLE: u8 = 4;
pub const DATATYPE_VEC_8BIT: u8 = 5;
pub const DATATYPE_VEC_16BIT: u8 = 6;
pub const DATATYPE_VEC_32BIT: u8 = 7;
pub const DATATYPE_VEC_64BIT: u8 = 8;
pub const DATATYPE_VEC_128BIT: u8 = 9;
pub const DATATYPE_COUNT: usize = 10;

/// One translated micro-op.
///
/// The first two words are bit-packed:
///
/// ```text
/// w0: opcode:7 size:2 cond:4 som:1 eom:1 setflags:3 internal:1 memid:8
///     rd:7 ra:7 rb:7 rc:7 is_sse:1 is_x87:1
/// w1: bytes:4 tagcount:4 loadcount:3 storecount:3 branchcount:1
///     nouserflags:1 extshift:2 cachelevel:2 datatype:4 unaligned:1 index:8
/// ```
///
/// `som`/`eom` mark the first and last uop of the owning basic block.
/// Uops are plain values; copying one duplicates its full semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(C)]
pub struct TransOp {
    w0: u64,
    w1: u64,
    pub rbimm: i64,
    pub rcimm: i64,
    pub riptaken: u64,
    pub ripseq: u64,
}

impl TransOp {
    bit_fields! { w0;
        opcode_bits, set_opcode_bits, with_opcode_bits: 0, 7 => u8;
        /// Operand size class (`SIZE_BYTE` .. `SIZE_QWORD`).
        size, set_size, with_size: 7, 2 => u8;
        cond_bits, set_cond_bits, with_cond_bits: 9, 4 => u8;
        setflags_bits, set_setflags_bits, with_setflags_bits: 15, 3 => u8;
        memid, set_memid, with_memid: 19, 8 => u8;
        rd, set_rd, with_rd: 27, 7 => u8;
        ra, set_ra, with_ra: 34, 7 => u8;
        rb, set_rb, with_rb: 41, 7 => u8;
        rc, set_rc, with_rc: 48, 7 => u8;
    }

    bool_fields! { w0;
        /// Start-of-block marker.
        som, set_som, with_som: 13;
        /// End-of-block marker.
        eom, set_eom, with_eom: 14;
        internal, set_internal, with_internal: 18;
        is_sse, set_is_sse, with_is_sse: 55;
        is_x87, set_is_x87, with_is_x87: 56;
    }

    bit_fields! { w1;
        /// x86 bytes of the instruction this uop belongs to.
        bytes, set_bytes, with_bytes: 0, 4 => u8;
        tagcount, set_tagcount, with_tagcount: 4, 4 => u8;
        loadcount, set_loadcount, with_loadcount: 8, 3 => u8;
        storecount, set_storecount, with_storecount: 11, 3 => u8;
        extshift, set_extshift, with_extshift: 16, 2 => u8;
        /// Cache level hint for loads and stores.
        cachelevel, set_cachelevel, with_cachelevel: 18, 2 => u8;
        datatype, set_datatype, with_datatype: 20, 4 => u8;
        index, set_index, with_index: 25, 8 => u8;
    }

    bool_fields! { w1;
        branchcount, set_branchcount, with_branchcount: 14;
        nouserflags, set_nouserflags, with_nouserflags: 15;
        /// Access may be misaligned.
        unaligned, set_unaligned, with_unaligned: 24;
    }

    /// Create a uop; all bookkeeping fields start cleared.
    pub fn new(opcode: Opcode, rd: u8, ra: u8, rb: u8, rc: u8, size: u8) -> Self {
        Self::default()
            .with_opcode(opcode)
            .with_rd(rd)
            .with_ra(ra)
            .with_rb(rb)
            .with_rc(rc)
            .with_size(size)
    }

    #[inline]
    pub fn opcode(&self) -> Opcode {
        Opcode::from_raw(self.opcode_bits()).unwrap_or(Opcode::Nop)
    }

    #[inline]
    pub fn set_opcode(&mut self, opcode: Opcode) {
        self.set_opcode_bits(opcode as u8);
    }

    #[must_use]
    pub fn with_opcode(mut self, opcode: Opcode) -> Self {
        self.set_opcode(opcode);
        self
    }

    #[inline]
    pub fn cond(&self) -> Cond {
        Cond::from_bits(self.cond_bits() as u64)
    }

    #[must_use]
    pub fn with_cond(self, cond: Cond) -> Self {
        self.with_cond_bits(cond as u8)
    }

    #[inline]
    pub fn setflags(&self) -> SetFlags {
        SetFlags::from_bits(self.setflags_bits())
    }

    #[must_use]
    pub fn with_setflags(self, flags: SetFlags) -> Self {
        self.with_setflags_bits(flags.bits())
    }

    #[must_use]
    pub fn with_imm(mut self, rbimm: i64, rcimm: i64) -> Self {
        self.rbimm = rbimm;
        self.rcimm = rcimm;
        self
    }

    #[must_use]
    pub fn with_targets(mut self, riptaken: u64, ripseq: u64) -> Self {
        self.riptaken = riptaken;
        self.ripseq = ripseq;
        self
    }

    /// Operand width in bytes.
    pub fn size_bytes(&self) -> u32 {
        1 << self.size()
    }

    /// Same uop with the block markers cleared.
    #[must_use]
    pub fn without_markers(self) -> Self {
        self.with_som(false).with_eom(false)
    }

    /// True when `rb` carries the immediate in `rbimm`.
    pub fn rb_is_imm(&self) -> bool {
        self.rb() == REG_IMM
    }

    /// True when `rc` carries the immediate in `rcimm`.
    pub fn rc_is_imm(&self) -> bool {
        self.rc() == REG_IMM
    }

    /// Bitmap of architectural registers read or written.
    pub fn arch_regs_used(&self) -> u64 {
        [self.rd(), self.ra(), self.rb(), self.rc()]
            .into_iter()
            .filter(|&r| is_arch_reg(r) && r != REG_ZERO)
            .fold(0u64, |acc, r| acc | (1u64 << r))
    }

    /// True when the uop writes a register other than the null one.
    pub fn writes_reg(&self) -> bool {
        self.rd() != REG_ZERO
    }
}
