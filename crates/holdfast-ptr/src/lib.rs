//! Owning pointers with explicit, single-threaded reference counts.
//!
//! - [`ExclusiveOwner`]: sole ownership; movable, never copied.
//! - [`SharedOwner`]: one strong reference in a group sharing a counts
//!   block; the object dies on the last strong release.
//! - [`WeakObserver`]: one weak reference in such a group; it keeps only
//!   the counts block alive and can be promoted while the object lives.
//!
//! Every pointer releases its object through a [`Reclaim`] strategy:
//! [`BoxReclaim`] by default, or a pool handle for storage that came from a
//! `PoolAllocator`.
//!
//! Counts are plain `Cell<usize>`s. None of these types are `Send` or
//! `Sync`.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

mod counts;
pub mod exclusive;
pub mod shared;
pub mod weak;

pub use exclusive::ExclusiveOwner;
pub use holdfast_core::{AccessError, BoxReclaim, Reclaim};
pub use shared::SharedOwner;
pub use weak::WeakObserver;
