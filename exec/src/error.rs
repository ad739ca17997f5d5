use ptl_core::error::PageFault;
use thiserror::Error;

/// Failure reported by a [`Decoder`](crate::translate::Decoder).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("invalid opcode at {rip:#x}")]
    InvalidOpcode { rip: u64 },
    /// The instruction continues past the bytes supplied.
    #[error("instruction at {rip:#x} is truncated")]
    NeedMoreBytes { rip: u64 },
    #[error("instruction at {rip:#x} expands to {count} uops")]
    TooManyUops { rip: u64, count: usize },
}

/// Failure of [`BasicBlockCache::fetch_block`](crate::BasicBlockCache::fetch_block).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// Guest-visible; inject into the guest and retry.
    #[error(transparent)]
    PageFault(#[from] PageFault),
    #[error(transparent)]
    Decode(#[from] DecodeError),
}
