//! Chunked append/remove list.
//!
//! Entries live in fixed-size chunks drawn from an arena. Each chunk
//! carries an occupancy bitmap, so removal is O(1) given a [`Locator`]
//! and a chunk that becomes empty goes straight back to the free pool.
//! Chunks with a free slot are also kept on a second list, so holes left
//! by removal are refilled before a new chunk is drawn. Chunks are
//! linked by arena index, never by address.

/// Block references per SMC backref chunk.
pub const BB_PTRS_PER_CHUNK: usize = 60;

/// Position of one entry: arena chunk index plus slot within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Locator {
    pub chunk: u32,
    pub slot: u8,
}

struct Chunk<T, const N: usize> {
    /// Bit `i` set when `data[i]` holds a live entry.
    used: u64,
    next: Option<u32>,
    prev: Option<u32>,
    /// Links on the list of chunks with space.
    next_open: Option<u32>,
    prev_open: Option<u32>,
    data: [T; N],
}

impl<T: Copy + Default, const N: usize> Chunk<T, N> {
    fn new() -> Self {
        Self {
            used: 0,
            next: None,
            prev: None,
            next_open: None,
            prev_open: None,
            data: [T::default(); N],
        }
    }

    fn is_full(&self) -> bool {
        self.used.count_ones() as usize == N
    }

    fn first_free(&self) -> usize {
        (!self.used).trailing_zeros() as usize
    }
}

pub struct ChunkList<T, const N: usize> {
    chunks: Vec<Chunk<T, N>>,
    free_chunks: Vec<u32>,
    head: Option<u32>,
    /// First chunk with at least one free slot.
    open: Option<u32>,
    /// Chunks currently linked into the list.
    nchunks: usize,
    len: usize,
}

impl<T: Copy + PartialEq + Default, const N: usize> Default for ChunkList<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Copy + PartialEq + Default, const N: usize> ChunkList<T, N> {
    const CAPACITY_OK: () = assert!(N > 0 && N <= 64, "chunk occupancy map is one u64");

    pub fn new() -> Self {
        let () = Self::CAPACITY_OK;
        Self {
            chunks: Vec::new(),
            free_chunks: Vec::new(),
            head: None,
            open: None,
            nchunks: 0,
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Chunks currently holding at least one entry.
    pub fn chunk_count(&self) -> usize {
        self.nchunks
    }

    /// Chunks sitting in the free pool.
    pub fn free_chunk_count(&self) -> usize {
        self.free_chunks.len()
    }

    fn alloc_chunk(&mut self) -> u32 {
        let idx = match self.free_chunks.pop() {
            Some(idx) => {
                self.chunks[idx as usize] = Chunk::new();
                idx
            }
            None => {
                self.chunks.push(Chunk::new());
                (self.chunks.len() - 1) as u32
            }
        };
        self.chunks[idx as usize].next = self.head;
        if let Some(old) = self.head {
            self.chunks[old as usize].prev = Some(idx);
        }
        self.head = Some(idx);
        self.link_open(idx);
        self.nchunks += 1;
        idx
    }

    fn link_open(&mut self, idx: u32) {
        let c = &mut self.chunks[idx as usize];
        c.prev_open = None;
        c.next_open = self.open;
        if let Some(old) = self.open {
            self.chunks[old as usize].prev_open = Some(idx);
        }
        self.open = Some(idx);
    }

    fn unlink_open(&mut self, idx: u32) {
        let (prev, next) = {
            let c = &mut self.chunks[idx as usize];
            (c.prev_open.take(), c.next_open.take())
        };
        match prev {
            Some(p) => self.chunks[p as usize].next_open = next,
            None => self.open = next,
        }
        if let Some(n) = next {
            self.chunks[n as usize].prev_open = prev;
        }
    }

    fn free_chunk(&mut self, idx: u32) {
        let (prev, next) = {
            let c = &self.chunks[idx as usize];
            (c.prev, c.next)
        };
        match prev {
            Some(p) => self.chunks[p as usize].next = next,
            None => self.head = next,
        }
        if let Some(n) = next {
            self.chunks[n as usize].prev = prev;
        }
        // An empty chunk always has space, so it is on the open list.
        self.unlink_open(idx);
        self.free_chunks.push(idx);
        self.nchunks -= 1;
    }

    /// Append `value`, returning where it landed.
    pub fn add(&mut self, value: T) -> Locator {
        let chunk = match self.open {
            Some(idx) => idx,
            None => self.alloc_chunk(),
        };
        let c = &mut self.chunks[chunk as usize];
        let slot = c.first_free();
        c.data[slot] = value;
        c.used |= 1u64 << slot;
        let full = c.is_full();
        self.len += 1;
        if full {
            self.unlink_open(chunk);
        }
        Locator {
            chunk,
            slot: slot as u8,
        }
    }

    /// Entry at `loc`, if the slot is live.
    pub fn get(&self, loc: Locator) -> Option<T> {
        let c = self.chunks.get(loc.chunk as usize)?;
        let slot = loc.slot as usize;
        (slot < N && c.used & (1u64 << slot) != 0).then(|| c.data[slot])
    }

    /// Remove the entry at `loc`. Panics if the slot is empty.
    pub fn remove(&mut self, loc: Locator) -> T {
        let slot = loc.slot as usize;
        let c = &mut self.chunks[loc.chunk as usize];
        assert!(
            slot < N && c.used & (1u64 << slot) != 0,
            "chunk list: removing empty slot {loc:?}"
        );
        let was_full = c.is_full();
        c.used &= !(1u64 << slot);
        let value = std::mem::take(&mut c.data[slot]);
        let empty = c.used == 0;
        self.len -= 1;
        if was_full {
            self.link_open(loc.chunk);
        }
        if empty {
            self.free_chunk(loc.chunk);
        }
        value
    }

    /// Remove the first entry equal to `value`. Linear in the list length.
    pub fn remove_value(&mut self, value: T) -> bool {
        match self.find(value) {
            Some(loc) => {
                self.remove(loc);
                true
            }
            None => false,
        }
    }

    pub fn find(&self, value: T) -> Option<Locator> {
        self.iter().find(|&(_, v)| v == value).map(|(loc, _)| loc)
    }

    /// Live entries, chunk by chunk from the head.
    pub fn iter(&self) -> Iter<'_, T, N> {
        Iter {
            list: self,
            chunk: self.head,
            slot: 0,
        }
    }

    /// Drop every entry and return all chunks to the pool.
    pub fn clear(&mut self) {
        let mut cur = self.head;
        while let Some(idx) = cur {
            let c = &mut self.chunks[idx as usize];
            cur = c.next;
            c.used = 0;
            self.free_chunks.push(idx);
        }
        self.head = None;
        self.open = None;
        self.nchunks = 0;
        self.len = 0;
    }
}

pub struct Iter<'a, T, const N: usize> {
    list: &'a ChunkList<T, N>,
    chunk: Option<u32>,
    slot: usize,
}

impl<T: Copy, const N: usize> Iterator for Iter<'_, T, N> {
    type Item = (Locator, T);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(idx) = self.chunk {
            let c = &self.list.chunks[idx as usize];
            // Mask off slots already visited.
            let pending = c.used & (u64::MAX << self.slot.min(63));
            if self.slot < N && pending != 0 {
                let slot = pending.trailing_zeros() as usize;
                self.slot = slot + 1;
                let loc = Locator {
                    chunk: idx,
                    slot: slot as u8,
                };
                return Some((loc, c.data[slot]));
            }
            self.chunk = c.next;
            self.slot = 0;
        }
        None
    }
}
