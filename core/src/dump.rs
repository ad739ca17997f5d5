//! Human-readable text output for uops, blocks, keys and page-table
//! entries.

use std::fmt;
use std::io::Write;

use crate::bb::BasicBlock;
use crate::context::Context;
use crate::pte::{Level1Pte, Level2Pte, Level3Pte, Level4Pte, PageFaultErrorCode};
use crate::regs::{reg_name, REG_IMM, REG_ZERO};
use crate::rip::RipVirtPhys;
use crate::types::{Exception, SETFLAG_NAMES};
use crate::uop::{TransOp, SIZE_NAMES};

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn fmt_src(f: &mut fmt::Formatter<'_>, reg: u8, imm: i64) -> fmt::Result {
    if reg == REG_IMM {
        write!(f, "{imm:#x}")
    } else {
        f.write_str(reg_name(reg))
    }
}

impl fmt::Display for TransOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = self.opcode();
        f.write_str(op.name())?;
        if op.uses_cond() {
            write!(f, ".{}", self.cond().name())?;
        }
        write!(f, ".{}", SIZE_NAMES[self.size() as usize])?;

        if self.writes_reg() {
            write!(f, " {} =", reg_name(self.rd()))?;
        }
        f.write_str(" ")?;
        f.write_str(reg_name(self.ra()))?;
        if self.rb() != REG_ZERO || self.rb_is_imm() {
            f.write_str(",")?;
            fmt_src(f, self.rb(), self.rbimm)?;
        }
        if self.rc() != REG_ZERO || self.rc_is_imm() {
            f.write_str(",")?;
            fmt_src(f, self.rc(), self.rcimm)?;
        }

        if op.is_branch() {
            write!(f, " [taken {:#x}, seq {:#x}]", self.riptaken, self.ripseq)?;
        }

        let setflags = self.setflags();
        if !setflags.is_empty() {
            f.write_str(" [")?;
            for (i, name) in SETFLAG_NAMES.iter().enumerate() {
                if setflags.bits() & (1 << i) != 0 {
                    f.write_str(name)?;
                }
            }
            f.write_str("]")?;
        }
        if self.som() {
            f.write_str(" [som]")?;
        }
        if self.eom() {
            f.write_str(" [eom]")?;
        }
        Ok(())
    }
}

impl fmt::Display for RipVirtPhys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mfn = |m: u64| {
            if m == RipVirtPhys::INVALID {
                "inv".to_string()
            } else {
                format!("{m:#x}")
            }
        };
        write!(
            f,
            "{:#x} [mfn {}/{}{}{}{}]",
            self.rip,
            mfn(self.mfnlo()),
            mfn(self.mfnhi()),
            if self.use64() { " 64" } else { " 32" },
            if self.kernel() { " kernel" } else { "" },
            if self.df() { " df" } else { "" },
        )
    }
}

impl fmt::Display for BasicBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "bb {}: {} uops, {} insns, {} bytes, refcount {}, hits {}",
            self.rip,
            self.count(),
            self.user_insn_count,
            self.bytes,
            self.refcount,
            self.hitcount,
        )?;
        writeln!(
            f,
            "  taken {:#x}, not taken {:#x}, loads {}, stores {}{}{}",
            self.rip_taken,
            self.rip_not_taken,
            self.loadcount,
            self.storecount,
            if self.repblock { ", rep" } else { "" },
            if self.invalidblock { ", invalid" } else { "" },
        )?;
        for (i, uop) in self.uops().iter().enumerate() {
            writeln!(f, "  {i:2}: {uop}")?;
        }
        Ok(())
    }
}

/// Write a block listing to `w`.
pub fn dump_bb(bb: &BasicBlock, w: &mut impl Write) -> std::io::Result<()> {
    write!(w, "{bb}")
}

fn fmt_pte_flags(f: &mut fmt::Formatter<'_>, flags: &[(bool, &str)]) -> fmt::Result {
    for &(set, name) in flags {
        if set {
            write!(f, " {name}")?;
        } else {
            write!(f, " {}", "-".repeat(name.len()))?;
        }
    }
    Ok(())
}

macro_rules! pte_display {
    ($ty:ident $(, $get:ident => $name:literal)*) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "mfn {:#x}", self.mfn())?;
                let flags = [
                    (self.p(), "P"),
                    (self.rw(), "RW"),
                    (self.us(), "US"),
                    (self.a(), "A"),
                    $((self.$get(), $name),)*
                    (self.nx(), "NX"),
                ];
                fmt_pte_flags(f, &flags)
            }
        }

        impl fmt::Debug for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($ty), "({:#018x}: {})"), self.0, self)
            }
        }
    };
}

pte_display!(Level4Pte);
pte_display!(Level3Pte);
pte_display!(Level2Pte, d => "D", psz => "PSZ");
pte_display!(Level1Pte, d => "D", g => "G");

impl fmt::Display for PageFaultErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.bits())?;
        fmt_pte_flags(
            f,
            &[
                (self.p(), "p"),
                (self.rw(), "rw"),
                (self.us(), "us"),
                (self.rsv(), "rsv"),
                (self.nx(), "nx"),
            ],
        )
    }
}

impl fmt::Debug for PageFaultErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PageFaultErrorCode({self})")
    }
}

// Registers and mini-cache contents are left out; `cached_entry` and
// `commitarf` give direct access to those.
impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("vcpuid", &self.vcpuid)
            .field("rip", &format_args!("{:#x}", self.rip()))
            .field("use64", &self.use64)
            .field("use32", &self.use32)
            .field("kernel_mode", &self.kernel_mode)
            .field("running", &self.running)
            .field("exception", &self.exception)
            .field("error_code", &format_args!("{:#x}", self.error_code))
            .field("cr2", &format_args!("{:#x}", self.cr2))
            .field("cr3", &format_args!("{:#x}", self.cr3))
            .field("pte_cache_hits", &self.pte_cache_hits)
            .field("pte_cache_misses", &self.pte_cache_misses)
            .finish_non_exhaustive()
    }
}
