//! Guest physical memory and the x86-64 4-level page walker.

use std::collections::HashMap;

use crate::pte::{
    level_index, Level1Pte, Level2Pte, Level3Pte, Level4Pte, PageTableWalker, PteBits, PteUpdate,
    PTE_A, PTE_D,
};
use crate::types::{mfn_of, page_offset, PAGE_SHIFT, PAGE_SIZE};

/// Byte-addressed guest physical memory.
///
/// Reads of unbacked frames return zeros; writes to them are dropped
/// and reported with `false`.
pub trait PhysMem {
    fn read(&self, paddr: u64, buf: &mut [u8]);

    fn write(&mut self, paddr: u64, data: &[u8]) -> bool;

    fn read_u64(&self, paddr: u64) -> u64 {
        let mut buf = [0u8; 8];
        self.read(paddr, &mut buf);
        u64::from_le_bytes(buf)
    }

    fn write_u64(&mut self, paddr: u64, val: u64) -> bool {
        self.write(paddr, &val.to_le_bytes())
    }
}

/// Page-granular sparse physical memory.
#[derive(Default)]
pub struct SparseMem {
    frames: HashMap<u64, Box<[u8; PAGE_SIZE as usize]>>,
}

impl SparseMem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Back frame `mfn` with zeroed memory (no-op if already backed).
    pub fn add_frame(&mut self, mfn: u64) {
        self.frames
            .entry(mfn)
            .or_insert_with(|| Box::new([0u8; PAGE_SIZE as usize]));
    }

    pub fn has_frame(&self, mfn: u64) -> bool {
        self.frames.contains_key(&mfn)
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }
}

impl PhysMem for SparseMem {
    fn read(&self, paddr: u64, buf: &mut [u8]) {
        let mut addr = paddr;
        let mut done = 0;
        while done < buf.len() {
            let off = page_offset(addr) as usize;
            let n = (PAGE_SIZE as usize - off).min(buf.len() - done);
            match self.frames.get(&mfn_of(addr)) {
                Some(frame) => buf[done..done + n].copy_from_slice(&frame[off..off + n]),
                None => buf[done..done + n].fill(0),
            }
            done += n;
            addr = addr.wrapping_add(n as u64);
        }
    }

    fn write(&mut self, paddr: u64, data: &[u8]) -> bool {
        let mut addr = paddr;
        let mut done = 0;
        let mut all_backed = true;
        while done < data.len() {
            let off = page_offset(addr) as usize;
            let n = (PAGE_SIZE as usize - off).min(data.len() - done);
            match self.frames.get_mut(&mfn_of(addr)) {
                Some(frame) => frame[off..off + n].copy_from_slice(&data[done..done + n]),
                None => all_backed = false,
            }
            done += n;
            addr = addr.wrapping_add(n as u64);
        }
        all_backed
    }
}

impl<M: PhysMem + ?Sized> PhysMem for &mut M {
    fn read(&self, paddr: u64, buf: &mut [u8]) {
        (**self).read(paddr, buf)
    }

    fn write(&mut self, paddr: u64, data: &[u8]) -> bool {
        (**self).write(paddr, data)
    }
}

#[inline]
fn entry_addr(table_mfn: u64, virt: u64, level: u32) -> u64 {
    (table_mfn << PAGE_SHIFT) + level_index(virt, level) * 8
}

/// Walk the 4-level tables rooted at `toplevel_mfn`.
///
/// 2 MiB pages (level-2 `psz`) are expanded into the equivalent 4 KiB
/// leaf for `virt`.
pub fn page_table_walk(mem: &(impl PhysMem + ?Sized), virt: u64, toplevel_mfn: u64) -> Level1Pte {
    let mut acc = Level1Pte::ALL_ACCESS;

    let l4 = Level4Pte(mem.read_u64(entry_addr(toplevel_mfn, virt, 4)));
    if !l4.p() {
        return Level1Pte::NOT_PRESENT;
    }
    acc.accum(l4);

    let l3 = Level3Pte(mem.read_u64(entry_addr(l4.mfn(), virt, 3)));
    if !l3.p() {
        return Level1Pte::NOT_PRESENT;
    }
    acc.accum(l3);

    let l2 = Level2Pte(mem.read_u64(entry_addr(l3.mfn(), virt, 2)));
    if !l2.p() {
        return Level1Pte::NOT_PRESENT;
    }
    acc.accum(l2);

    let mut leaf = if l2.psz() {
        // Bit 7 is PAT in a 4 KiB leaf; drop it along with the frame.
        let base = l2.mfn() & !0x1ff;
        Level1Pte(l2.raw())
            .with_pat(false)
            .with_mfn(base + level_index(virt, 1))
    } else {
        let l1 = Level1Pte(mem.read_u64(entry_addr(l2.mfn(), virt, 1)));
        if !l1.p() {
            return Level1Pte::NOT_PRESENT;
        }
        l1
    };
    leaf.accum(acc);
    leaf
}

/// Set the accessed bit on every level and, for `update.d()`, the
/// dirty bit on the leaf mapping `virt`.
pub fn page_table_acc_dirty_update(
    mem: &mut (impl PhysMem + ?Sized),
    virt: u64,
    toplevel_mfn: u64,
    update: PteUpdate,
) {
    if update.is_empty() {
        return;
    }
    let mut table = toplevel_mfn;
    for level in (1..=4).rev() {
        let addr = entry_addr(table, virt, level);
        let raw = mem.read_u64(addr);
        if raw & 1 == 0 {
            return;
        }
        let leaf = level == 1 || (level == 2 && Level2Pte(raw).psz());
        let mut new = raw;
        if update.a() {
            new |= PTE_A;
        }
        if leaf && update.d() {
            new |= PTE_D;
        }
        if new != raw {
            mem.write_u64(addr, new);
        }
        if leaf {
            return;
        }
        table = Level4Pte(raw).mfn();
    }
}

/// Walker over guest physical memory.
///
/// Also forwards `PhysMem`, so one value can serve both page walks
/// and instruction fetch.
pub struct X86Walker<M> {
    mem: M,
    walks: u64,
}

impl<M: PhysMem> X86Walker<M> {
    pub fn new(mem: M) -> Self {
        Self { mem, walks: 0 }
    }

    pub fn mem(&self) -> &M {
        &self.mem
    }

    pub fn mem_mut(&mut self) -> &mut M {
        &mut self.mem
    }

    pub fn into_inner(self) -> M {
        self.mem
    }

    /// Number of full walks performed so far.
    pub fn walks(&self) -> u64 {
        self.walks
    }
}

impl<M: PhysMem> PageTableWalker for X86Walker<M> {
    fn walk(&mut self, virt: u64, toplevel_mfn: u64) -> Level1Pte {
        self.walks += 1;
        page_table_walk(&self.mem, virt, toplevel_mfn)
    }

    fn update_acc_dirty(&mut self, virt: u64, toplevel_mfn: u64, update: PteUpdate) {
        page_table_acc_dirty_update(&mut self.mem, virt, toplevel_mfn, update);
    }
}

impl<M: PhysMem> PhysMem for X86Walker<M> {
    fn read(&self, paddr: u64, buf: &mut [u8]) {
        self.mem.read(paddr, buf)
    }

    fn write(&mut self, paddr: u64, data: &[u8]) -> bool {
        self.mem.write(paddr, data)
    }
}
