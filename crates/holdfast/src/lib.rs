//! Holdfast: deterministic, single-threaded memory-lifetime primitives.
//!
//! This is the top-level facade crate that re-exports the public API from all
//! Holdfast sub-crates. For most users, adding `holdfast` as a single
//! dependency is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use holdfast::prelude::*;
//!
//! // A pool of u64 slots, four per chunk.
//! let pool = PoolAllocator::<u64>::with_config(PoolConfig::for_elements::<u64>(4)).unwrap();
//!
//! // Pool-backed shared ownership: the owner keeps the chain alive.
//! let a = holdfast::pooled::shared_in(&pool, 7).unwrap();
//! let w = a.downgrade();
//! let b = w.lock();
//! assert_eq!((*b, a.use_count()), (7, 2));
//!
//! drop((a, b));
//! assert!(w.expired());
//!
//! // Requests larger than a chunk are rejected without touching the pool.
//! assert!(pool.allocate(5).unwrap_err().is_too_large());
//! ```
//!
//! # Modules
//!
//! Each module corresponds to a sub-crate. Use them for types not in the prelude:
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `holdfast-core` | Error types, the `Reclaim` strategy trait |
//! | [`arena`] | `holdfast-arena` | `PoolAllocator`, `PoolConfig`, chunk introspection |
//! | [`ptr`] | `holdfast-ptr` | `ExclusiveOwner`, `SharedOwner`, `WeakObserver` |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

/// Error types and release strategies (`holdfast-core`).
///
/// Implement [`types::Reclaim`] to give owners a custom way of releasing
/// their object.
pub use holdfast_core as types;

/// Chunked pool allocation (`holdfast-arena`).
///
/// [`arena::PoolAllocator`] is also available in the [`prelude`].
pub use holdfast_arena as arena;

/// Owning pointers with explicit reference counts (`holdfast-ptr`).
pub use holdfast_ptr as ptr;

pub mod pooled;

/// Common imports for typical Holdfast usage.
///
/// ```rust
/// use holdfast::prelude::*;
/// ```
pub mod prelude {
    // Allocation
    pub use holdfast_arena::{PoolAllocator, PoolConfig};

    // Pointers
    pub use holdfast_ptr::{ExclusiveOwner, SharedOwner, WeakObserver};

    // Errors and strategies
    pub use holdfast_core::{AccessError, AllocError, BoxReclaim, Error, Reclaim};
}
