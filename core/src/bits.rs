//! Shift/mask accessor generators for bit-packed words.
//!
//! Every fixed-layout structure in this crate (`TransOp`, `RipVirtPhys`,
//! page-table entries) stores its fields inside plain `u64` words so the
//! layout is identical regardless of how the compiler would lay out a
//! struct of small integers.

/// Multi-bit unsigned fields: `getter, setter, builder: lo, width => type;`
macro_rules! bit_fields {
    ($word:tt; $($(#[$meta:meta])* $get:ident, $set:ident, $with:ident: $lo:expr, $width:expr => $ty:ty;)*) => {
        $(
            $(#[$meta])*
            #[inline]
            pub const fn $get(&self) -> $ty {
                ((self.$word >> $lo) & ((1u64 << $width) - 1)) as $ty
            }

            #[inline]
            pub fn $set(&mut self, val: $ty) {
                let mask = ((1u64 << $width) - 1) << $lo;
                self.$word = (self.$word & !mask) | (((val as u64) << $lo) & mask);
            }

            #[inline]
            #[must_use]
            pub fn $with(mut self, val: $ty) -> Self {
                self.$set(val);
                self
            }
        )*
    };
}

/// Single-bit boolean fields: `getter, setter, builder: bit;`
macro_rules! bool_fields {
    ($word:tt; $($(#[$meta:meta])* $get:ident, $set:ident, $with:ident: $bit:expr;)*) => {
        $(
            $(#[$meta])*
            #[inline]
            pub const fn $get(&self) -> bool {
                (self.$word >> $bit) & 1 != 0
            }

            #[inline]
            pub fn $set(&mut self, val: bool) {
                self.$word = (self.$word & !(1u64 << $bit)) | ((val as u64) << $bit);
            }

            #[inline]
            #[must_use]
            pub fn $with(mut self, val: bool) -> Self {
                self.$set(val);
                self
            }
        )*
    };
}

/// Round `addr` down to a multiple of `align` (a power of two).
#[inline]
pub const fn floor(addr: u64, align: u64) -> u64 {
    addr & !(align - 1)
}

/// Round `addr` up to a multiple of `align` (a power of two).
#[inline]
pub const fn ceil(addr: u64, align: u64) -> u64 {
    (addr + align - 1) & !(align - 1)
}

/// Low `n` bits of `v`.
#[inline]
pub const fn lowbits(v: u64, n: u32) -> u64 {
    if n >= 64 {
        v
    } else {
        v & ((1u64 << n) - 1)
    }
}
