//! Cache contract and in-memory implementations.
//!
//! The wrapper only ever talks to a cache through [`Cache`]: `get`, `set`,
//! `delete`, `len`. Eviction belongs to the implementation. The ones shipped
//! here never evict; enable the `moka` feature to back a wrapper with a cache
//! that does.

pub mod memory;
#[cfg(feature = "moka")]
pub mod moka_backend;
pub mod traits;

pub use memory::{BoundedCache, SizeFn, UnboundedCache};
pub use traits::{Cache, CacheInfo, CallStats};
