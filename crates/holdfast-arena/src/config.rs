//! Pool configuration parameters.

use std::alloc::Layout;
use std::mem;

use holdfast_core::AllocError;

/// Configuration for a [`PoolAllocator`](crate::PoolAllocator).
///
/// Fixed when the first handle of a chain is created; every copy of that
/// handle shares the same chunk capacity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PoolConfig {
    /// Size of every chunk in bytes.
    ///
    /// Default: 1024. A single allocation can never exceed this.
    pub chunk_capacity: usize,
}

impl PoolConfig {
    /// Default chunk capacity in bytes.
    pub const DEFAULT_CHUNK_CAPACITY: usize = 1024;

    /// Create a config with the given chunk capacity in bytes.
    pub fn new(chunk_capacity: usize) -> Self {
        Self { chunk_capacity }
    }

    /// Create a config whose chunks hold exactly `count` elements of `T`.
    ///
    /// Saturates at `usize::MAX`, which [`chunk_layout`](Self::chunk_layout)
    /// then rejects.
    pub fn for_elements<T>(count: usize) -> Self {
        Self::new(count.saturating_mul(mem::size_of::<T>()))
    }

    /// Validate this config for element type `T` and build the chunk layout.
    ///
    /// Chunks are aligned to `T`, so every bump offset (a multiple of
    /// `size_of::<T>()`) is suitably aligned.
    pub fn chunk_layout<T>(&self) -> Result<Layout, AllocError> {
        if self.chunk_capacity == 0 {
            return Err(AllocError::InvalidConfig {
                reason: "chunk capacity must be non-zero".into(),
            });
        }
        Layout::from_size_align(self.chunk_capacity, mem::align_of::<T>()).map_err(|err| {
            AllocError::InvalidConfig {
                reason: format!(
                    "chunk capacity {} with alignment {}: {err}",
                    self.chunk_capacity,
                    mem::align_of::<T>()
                ),
            }
        })
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CHUNK_CAPACITY)
    }
}
