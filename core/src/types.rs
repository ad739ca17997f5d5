//! Hardware constants, x86 flag bits, condition codes and
//! internal exception kinds shared by the translator and the caches.

/// Guest page size in bytes.
pub const PAGE_SIZE: u64 = 4096;
/// log2(PAGE_SIZE).
pub const PAGE_SHIFT: u32 = 12;

/// Maximum x86 bytes covered by a single basic block.
pub const MAX_BB_BYTES: usize = 255;
/// Maximum x86 instructions in a single basic block.
pub const MAX_BB_X86_INSNS: usize = 63;
/// Maximum uops in a single basic block.
pub const MAX_BB_UOPS: usize = 63;
/// Maximum number of basic blocks that may start on one page.
pub const MAX_BB_PER_PAGE: usize = 4096;
/// Upper bound on uops produced for one x86 instruction.
pub const MAX_TRANSOPS_PER_USER_INSN: usize = 16;
/// Longest legal x86 instruction, in bytes.
pub const MAX_X86_INSN_BYTES: usize = 15;

/// Load unit latency, assuming fast bypass.
pub const LOADLAT: u8 = 2;

/// Physical page (machine frame) number of a physical address.
#[inline]
pub const fn mfn_of(paddr: u64) -> u64 {
    paddr >> PAGE_SHIFT
}

/// Page-aligned base of a virtual address.
#[inline]
pub const fn page_floor(addr: u64) -> u64 {
    addr & !(PAGE_SIZE - 1)
}

/// Offset of an address within its page.
#[inline]
pub const fn page_offset(addr: u64) -> u64 {
    addr & (PAGE_SIZE - 1)
}

/// x86 flag bits as seen by uops.
///
/// ```text
/// OF -  - - SF ZF - AF wait PF inv CF
/// 11 10 9 8 7  6    4  3    2  1   0
/// ```
pub mod flags {
    pub const FLAG_CF: u16 = 0x001;
    pub const FLAG_INV: u16 = 0x002;
    pub const FLAG_PF: u16 = 0x004;
    pub const FLAG_WAIT: u16 = 0x008;
    pub const FLAG_AF: u16 = 0x010;
    pub const FLAG_ZF: u16 = 0x040;
    pub const FLAG_SF: u16 = 0x080;
    pub const FLAG_OF: u16 = 0x800;
    pub const FLAG_SF_ZF: u16 = 0x0c0;
    pub const FLAG_ZAPS: u16 = 0x0d4;
    pub const FLAG_NOT_WAIT_INV: u16 = 0x08f5;

    // Flags outside the uop-visible set (EFLAGS bit positions).
    pub const FLAG_TF: u32 = 1 << 8;
    pub const FLAG_IF: u32 = 1 << 9;
    pub const FLAG_DF: u32 = 1 << 10;
    pub const FLAG_IOPL: u32 = (1 << 12) | (1 << 13);
    pub const FLAG_NT: u32 = 1 << 14;
    pub const FLAG_RF: u32 = 1 << 16;
    pub const FLAG_VM: u32 = 1 << 17;
    pub const FLAG_AC: u32 = 1 << 18;
    pub const FLAG_VIF: u32 = 1 << 19;
    pub const FLAG_VIP: u32 = 1 << 20;
    pub const FLAG_ID: u32 = 1 << 21;
}

/// Flag groups a uop may produce (3-bit `setflags` field).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SetFlags(u8);

impl SetFlags {
    pub const NONE: SetFlags = SetFlags(0);
    /// ZF, SF, PF and AF.
    pub const ZF: SetFlags = SetFlags(1 << 0);
    pub const CF: SetFlags = SetFlags(1 << 1);
    pub const OF: SetFlags = SetFlags(1 << 2);
    pub const ALL: SetFlags = SetFlags(0b111);

    pub const fn from_bits(bits: u8) -> Self {
        Self(bits & 0b111)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, other: SetFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn union(self, other: SetFlags) -> Self {
        Self(self.0 | other.0)
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// x86 flag mask written by a uop with these groups.
    pub const fn x86_flags(self) -> u16 {
        SETFLAGS_TO_X86_FLAGS[self.0 as usize]
    }
}

pub const SETFLAG_NAMES: [&str; 3] = ["z", "c", "o"];

static SETFLAGS_TO_X86_FLAGS: [u16; 8] = {
    let mut t = [0u16; 8];
    let mut i = 0;
    while i < 8 {
        let mut m = 0;
        if i & 1 != 0 {
            m |= flags::FLAG_ZAPS;
        }
        if i & 2 != 0 {
            m |= flags::FLAG_CF;
        }
        if i & 4 != 0 {
            m |= flags::FLAG_OF;
        }
        t[i] = m;
        i += 1;
    }
    t
};

/// x86 condition codes, in encoding order.
///
/// The low bit of the encoding inverts the condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum Cond {
    #[default]
    O = 0,
    No,
    C,
    Nc,
    E,
    Ne,
    Be,
    Nbe,
    S,
    Ns,
    P,
    Np,
    L,
    Nl,
    Le,
    Nle,
}

pub const COND_COUNT: usize = 16;

pub const COND_CODE_NAMES: [&str; COND_COUNT] = [
    "o", "no", "c", "nc", "e", "ne", "be", "nbe", "s", "ns", "p", "np", "l", "nl", "le", "nle",
];

impl Cond {
    const ALL: [Cond; COND_COUNT] = [
        Cond::O,
        Cond::No,
        Cond::C,
        Cond::Nc,
        Cond::E,
        Cond::Ne,
        Cond::Be,
        Cond::Nbe,
        Cond::S,
        Cond::Ns,
        Cond::P,
        Cond::Np,
        Cond::L,
        Cond::Nl,
        Cond::Le,
        Cond::Nle,
    ];

    /// Decode the low four bits of `v`.
    pub const fn from_bits(v: u64) -> Cond {
        Self::ALL[(v & 0xf) as usize]
    }

    /// Inverse condition: flipping bit zero is enough for x86.
    pub const fn invert(self) -> Cond {
        Self::from_bits((self as u64) ^ 1)
    }

    pub const fn name(self) -> &'static str {
        COND_CODE_NAMES[self as usize]
    }
}

/// Simulator-internal exceptions (not x86 vectors).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum Exception {
    #[default]
    NoException = 0,
    Propagate,
    BranchMispredict,
    UnalignedAccess,
    PageFaultOnRead,
    PageFaultOnWrite,
    PageFaultOnExec,
    LoadStoreAliasing,
    CheckFailed,
    SkipBlock,
    CacheLocked,
    LfrqFull,
    FloatingPoint,
    FloatingPointNotAvailable,
}

pub const EXCEPTION_COUNT: usize = 14;

pub static EXCEPTION_NAMES: [&str; EXCEPTION_COUNT] = [
    "NoException",
    "Propagate",
    "BranchMispredict",
    "UnalignedAccess",
    "PageFaultOnRead",
    "PageFaultOnWrite",
    "PageFaultOnExec",
    "LoadStoreAliasing",
    "CheckFailed",
    "SkipBlock",
    "CacheLocked",
    "LFRQFull",
    "FloatingPoint",
    "FloatingPointNotAvailable",
];

impl Exception {
    pub const fn name(self) -> &'static str {
        EXCEPTION_NAMES[self as usize]
    }
}

/// Name of a raw exception number, or `"Unknown"` when out of range.
pub fn exception_name(exception: u64) -> &'static str {
    EXCEPTION_NAMES
        .get(exception as usize)
        .copied()
        .unwrap_or("Unknown")
}

/// x86 exception vector raised for guest page faults.
pub const EXCEPTION_X86_PAGE_FAULT: u8 = 14;
