//! Basic-block translation cache and SMC invalidation.
//!
//! Drives the fetch → lookup → translate → insert cycle and keeps the
//! cache coherent with guest stores through a physical-page backref
//! index.

pub mod bb_store;
pub mod cache;
pub mod error;
pub mod smc;
pub mod translate;

use std::sync::{Arc, Mutex};

pub use bb_store::{BbHandle, BbStore};
pub use cache::{BasicBlockCache, CacheConfig, CacheStats, DEFAULT_MAX_BLOCKS};
pub use error::{DecodeError, FetchError};
pub use smc::SmcIndex;
pub use translate::{translate_block, BlockLimits, DecodedInsn, Decoder, InsnEnd, Translated};

/// Cache shared by every VCPU. Each VCPU keeps its own `Context` and
/// locks the cache around fetch, release and store notification.
pub type SharedBbCache = Arc<Mutex<BasicBlockCache>>;

pub fn shared_cache(config: CacheConfig) -> SharedBbCache {
    Arc::new(Mutex::new(BasicBlockCache::new(config)))
}
