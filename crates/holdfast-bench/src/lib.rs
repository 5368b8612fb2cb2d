//! Benchmark profiles and utilities for the holdfast memory primitives.
//!
//! - [`PoolProfile`]: chunk sizing presets shared by the pool benchmarks
//! - [`shared_fanout`]: a shared group with a given number of owners and
//!   observers, for measuring count traffic

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use holdfast::prelude::*;

/// Chunk sizing preset for pool benchmarks.
#[derive(Clone, Copy, Debug)]
pub struct PoolProfile {
    /// Short label used in benchmark ids.
    pub name: &'static str,
    /// Elements of `u64` per chunk.
    pub elements_per_chunk: usize,
}

impl PoolProfile {
    /// The default 1 KiB chunk (128 `u64`s).
    pub const DEFAULT: Self = Self {
        name: "1k",
        elements_per_chunk: PoolConfig::DEFAULT_CHUNK_CAPACITY / 8,
    };

    /// Tiny chunks, forcing a new chunk every 8 elements.
    pub const TINY: Self = Self {
        name: "64b",
        elements_per_chunk: 8,
    };

    /// Large chunks that rarely grow.
    pub const LARGE: Self = Self {
        name: "64k",
        elements_per_chunk: 8192,
    };

    /// All presets, smallest chunk first.
    pub const ALL: [Self; 3] = [Self::TINY, Self::DEFAULT, Self::LARGE];

    /// Build a fresh `u64` pool with this profile's chunk size.
    pub fn pool(&self) -> PoolAllocator<u64> {
        PoolAllocator::with_config(PoolConfig::for_elements::<u64>(self.elements_per_chunk))
            .expect("benchmark profiles use valid chunk sizes")
    }
}

/// Build a shared group with `owners` strong and `observers` weak handles.
pub fn shared_fanout(
    owners: usize,
    observers: usize,
) -> (Vec<SharedOwner<u64>>, Vec<WeakObserver<u64>>) {
    let root = SharedOwner::new(0u64);
    let weak = (0..observers).map(|_| root.downgrade()).collect();
    let mut strong: Vec<_> = (1..owners).map(|_| root.clone()).collect();
    if owners > 0 {
        strong.push(root);
    }
    (strong, weak)
}
