//! Core types and traits for the holdfast memory primitives.
//!
//! This is the leaf crate with zero internal dependencies. It defines the
//! error types shared by the arena and pointer crates, and the [`Reclaim`]
//! trait through which owners give an object's storage back.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod error;
pub mod reclaim;

pub use error::{AccessError, AllocError, Error};
pub use reclaim::{BoxReclaim, Reclaim};
