//! Chunked bump allocation for fixed-element-type pools.
//!
//! A [`PoolAllocator<T>`] hands out uninitialised storage for `T` from a
//! chain of fixed-capacity chunks. Handles are shared by reference count:
//! cloning one aliases the same chain, and the chain is freed when the last
//! handle goes away.
//!
//! # Architecture
//!
//! ```text
//! PoolAllocator<T> (handle: ChainId)
//! └── CHAINS (thread-local slot+generation table)
//!     └── Chain { handles, chunk layout }
//!         └── Chunk → Chunk → Chunk (newest first, bump-allocated)
//! ```
//!
//! # Allocation
//!
//! - **First-fit, newest first:** the chain is searched from the most
//!   recently created chunk; if nothing fits, a new chunk is prepended.
//! - **No reuse:** [`PoolAllocator::deallocate`] is a no-op. Storage comes
//!   back only when the whole chain is freed.
//! - **Bounded requests:** a request larger than one chunk fails with
//!   [`AllocError::AllocationTooLarge`] and leaves the chain untouched.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod chunk;
pub mod config;
pub mod pool;
pub mod table;

// Public re-exports for the primary API surface.
pub use chunk::{Chunk, ChunkUsage};
pub use config::PoolConfig;
pub use holdfast_core::AllocError;
pub use pool::{live_chain_count, PoolAllocator};
pub use table::ChainId;
