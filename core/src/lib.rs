#[macro_use]
mod bits;

pub mod bb;
pub mod chunk_list;
pub mod context;
pub mod dump;
pub mod error;
pub mod mem;
pub mod opcode;
pub mod pte;
pub mod regs;
pub mod rip;
pub mod snapshot;
pub mod types;
pub mod uop;

pub use bb::{Backref, BasicBlock, BbState, SynthOp};
pub use bits::{ceil, floor, lowbits};
pub use chunk_list::{ChunkList, Locator, BB_PTRS_PER_CHUNK};
pub use context::{AccessKind, Context, PhysTranslation, PTE_CACHE_SIZE};
pub use error::PageFault;
pub use mem::{PhysMem, SparseMem, X86Walker};
pub use opcode::{OpClass, Opcode, OpcodeInfo};
pub use pte::{
    Level1Pte, Level2Pte, Level3Pte, Level4Pte, PageFaultErrorCode, PageTableWalker, PteUpdate,
};
pub use rip::{RipVirtPhys, BB_HASH_SIZE};
pub use types::{
    Cond, Exception, SetFlags, MAX_BB_BYTES, MAX_BB_PER_PAGE, MAX_BB_UOPS, MAX_BB_X86_INSNS,
    MAX_TRANSOPS_PER_USER_INSN, MAX_X86_INSN_BYTES, PAGE_SHIFT, PAGE_SIZE,
};
pub use uop::TransOp;
