//! Binary context snapshot (save/restore).
//!
//! Format (little-endian):
//!   HEADER: magic[4] + version[2] + reserved[2]
//!   IDENT:  vcpuid[4] + internal_eflags[4]
//!           + use32[1] + use64[1] + kernel_mode[1] + running[1]
//!   ARF:    commitarf[64 x 8]
//!   SYS:    exception[8] + error_code[8] + cr2[8] + cr3[8]
//!   TLB:    hits[8] + misses[8] + 16 x (tag[8] + pte[8])
//!
//! Only the context is saved. Translated blocks are rebuilt from guest
//! memory after a restore.

use std::io::{self, Read, Write};

use crate::context::{Context, PTE_CACHE_INVALID, PTE_CACHE_SIZE};
use crate::pte::Level1Pte;
use crate::types::{page_floor, PAGE_SHIFT};

const MAGIC: &[u8; 4] = b"PTLC";
const VERSION: u16 = 1;

// -- Write helpers --

fn write_u8(w: &mut impl Write, v: u8) -> io::Result<()> {
    w.write_all(&[v])
}

fn write_u16(w: &mut impl Write, v: u16) -> io::Result<()> {
    w.write_all(&v.to_le_bytes())
}

fn write_u32(w: &mut impl Write, v: u32) -> io::Result<()> {
    w.write_all(&v.to_le_bytes())
}

fn write_u64(w: &mut impl Write, v: u64) -> io::Result<()> {
    w.write_all(&v.to_le_bytes())
}

// -- Read helpers --

fn read_u8(r: &mut impl Read) -> io::Result<u8> {
    let mut buf = [0u8; 1];
    r.read_exact(&mut buf)?;
    Ok(buf[0])
}

fn read_u16(r: &mut impl Read) -> io::Result<u16> {
    let mut buf = [0u8; 2];
    r.read_exact(&mut buf)?;
    Ok(u16::from_le_bytes(buf))
}

fn read_u32(r: &mut impl Read) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u64(r: &mut impl Read) -> io::Result<u64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

fn err(msg: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg)
}

fn read_flag(r: &mut impl Read, what: &str) -> io::Result<u8> {
    match read_u8(r)? {
        v @ (0 | 1) => Ok(v),
        _ => Err(err(what)),
    }
}

/// Write `ctx` to `w`.
pub fn save(ctx: &Context, w: &mut impl Write) -> io::Result<()> {
    w.write_all(MAGIC)?;
    write_u16(w, VERSION)?;
    write_u16(w, 0)?;

    write_u32(w, ctx.vcpuid)?;
    write_u32(w, ctx.internal_eflags)?;
    write_u8(w, ctx.use32)?;
    write_u8(w, ctx.use64)?;
    write_u8(w, ctx.kernel_mode)?;
    write_u8(w, ctx.running)?;

    for &v in &ctx.commitarf {
        write_u64(w, v)?;
    }

    write_u64(w, ctx.exception)?;
    write_u64(w, ctx.error_code)?;
    write_u64(w, ctx.cr2)?;
    write_u64(w, ctx.cr3)?;

    write_u64(w, ctx.pte_cache_hits)?;
    write_u64(w, ctx.pte_cache_misses)?;
    for slot in 0..PTE_CACHE_SIZE {
        write_u64(w, ctx.cached_pte_virt[slot])?;
        write_u64(w, ctx.cached_pte[slot].0)?;
    }
    Ok(())
}

/// Read a context written by [`save`].
pub fn restore(r: &mut impl Read) -> io::Result<Box<Context>> {
    let mut magic = [0u8; 4];
    r.read_exact(&mut magic)?;
    if &magic != MAGIC {
        return Err(err("bad magic"));
    }
    let version = read_u16(r)?;
    if version != VERSION {
        return Err(err("unsupported version"));
    }
    let _reserved = read_u16(r)?;

    let mut ctx = Box::new(Context::new(read_u32(r)?));
    ctx.internal_eflags = read_u32(r)?;
    ctx.use32 = read_flag(r, "bad use32 flag")?;
    ctx.use64 = read_flag(r, "bad use64 flag")?;
    ctx.kernel_mode = read_flag(r, "bad kernel_mode flag")?;
    ctx.running = read_flag(r, "bad running flag")?;

    for v in ctx.commitarf.iter_mut() {
        *v = read_u64(r)?;
    }

    ctx.exception = read_u64(r)?;
    ctx.error_code = read_u64(r)?;
    ctx.cr2 = read_u64(r)?;
    ctx.cr3 = read_u64(r)?;

    ctx.pte_cache_hits = read_u64(r)?;
    ctx.pte_cache_misses = read_u64(r)?;
    for slot in 0..PTE_CACHE_SIZE {
        let tag = read_u64(r)?;
        let pte = read_u64(r)?;
        if tag != PTE_CACHE_INVALID {
            if tag != page_floor(tag) {
                return Err(err("unaligned mini-cache tag"));
            }
            if (tag >> PAGE_SHIFT) as usize & (PTE_CACHE_SIZE - 1) != slot {
                return Err(err("mini-cache tag in wrong slot"));
            }
        }
        ctx.cached_pte_virt[slot] = tag;
        ctx.cached_pte[slot] = Level1Pte(pte);
    }
    Ok(ctx)
}
