//! Owners whose objects live in a [`PoolAllocator`].
//!
//! Each owner carries its own clone of the pool handle as its release
//! strategy, so the chunk chain outlives every object placed in it.
//!
//! A pool handle is never conjured from nothing: `PoolAllocator` has no
//! `Default`, so the strategy-defaulting constructors are unavailable for
//! pooled owners.
//!
//! ```compile_fail
//! use holdfast::pooled::PooledExclusive;
//!
//! let owner: PooledExclusive<u32> = unsafe { PooledExclusive::from_raw(std::ptr::null_mut()) };
//! ```

use holdfast_arena::PoolAllocator;
use holdfast_core::AllocError;
use holdfast_ptr::{ExclusiveOwner, SharedOwner};

/// An exclusive owner of a pool-allocated object.
pub type PooledExclusive<T> = ExclusiveOwner<T, PoolAllocator<T>>;

/// A shared owner of a pool-allocated object.
pub type PooledShared<T> = SharedOwner<T, PoolAllocator<T>>;

/// Place `value` in `pool` and own it exclusively.
///
/// Fails with [`AllocError::AllocationTooLarge`] if one `T` exceeds the
/// pool's chunk capacity.
pub fn exclusive_in<T>(pool: &PoolAllocator<T>, value: T) -> Result<PooledExclusive<T>, AllocError> {
    let ptr = pool.emplace(value)?;
    // SAFETY: `ptr` is a fresh, initialised slot from `pool`, released
    // through a handle to the same chain.
    Ok(unsafe { ExclusiveOwner::from_raw_in(ptr.as_ptr(), pool.clone()) })
}

/// Place `value` in `pool` and start a shared group owning it.
pub fn shared_in<T>(pool: &PoolAllocator<T>, value: T) -> Result<PooledShared<T>, AllocError> {
    let ptr = pool.emplace(value)?;
    // SAFETY: as in `exclusive_in`.
    Ok(unsafe { SharedOwner::from_raw_in(ptr.as_ptr(), pool.clone()) })
}

#[cfg(test)]
mod tests {
    use holdfast_arena::PoolConfig;

    use super::*;

    #[test]
    fn owners_hold_a_pool_handle() {
        let pool = PoolAllocator::<u32>::new();
        let a = exclusive_in(&pool, 1).unwrap();
        let b = shared_in(&pool, 2).unwrap();
        let c = b.clone();
        assert_eq!(pool.handle_count(), 3);
        assert_eq!((*a, *b, *c), (1, 2, 2));

        drop((a, b, c));
        assert_eq!(pool.handle_count(), 1);
    }

    #[test]
    fn oversized_element_is_rejected() {
        let pool = PoolAllocator::<[u8; 32]>::with_config(PoolConfig::new(16)).unwrap();
        let err = exclusive_in(&pool, [0; 32]).unwrap_err();
        assert!(err.is_too_large());
        assert_eq!(pool.used_bytes(), 0);
    }
}
