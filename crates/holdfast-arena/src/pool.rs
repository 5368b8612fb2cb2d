//! Reference-counted pool allocator handles over a shared chunk chain.
//!
//! A [`PoolAllocator<T>`] is a cheap handle: a [`ChainId`] into this
//! thread's chain table. Cloning a handle aliases the same chain and bumps
//! its live-handle count; the chain (every chunk in it) is freed when the
//! last handle is dropped. Independently constructed handles never share a
//! chain.
//!
//! At thread exit the chain table is destroyed, possibly before other
//! thread-locals holding pooled objects. Chains that still have handles are
//! leaked rather than freed. A handle that outlives the table is detached:
//! its objects stay valid, [`PoolAllocator::allocate`] fails with
//! [`AllocError::ThreadExiting`] and the usage queries report zero.

use std::cell::RefCell;
use std::fmt;
use std::marker::PhantomData;
use std::mem;
use std::ptr::NonNull;

use holdfast_core::{AllocError, Reclaim};
use smallvec::SmallVec;

use crate::chunk::{Chain, ChunkUsage};
use crate::config::PoolConfig;
use crate::table::{ChainId, ChainTable};

thread_local! {
    static CHAINS: RefCell<ChainTable> = const { RefCell::new(ChainTable::new()) };
}

/// Run `f` against the chain behind `id`, or return `None` if this thread's
/// chain table is already gone.
fn with_chain<R>(id: ChainId, f: impl FnOnce(&mut Chain) -> R) -> Option<R> {
    CHAINS
        .try_with(|table| {
            let mut table = table.borrow_mut();
            let chain = table.chain_mut(id);
            debug_assert!(chain.is_some(), "live pool handle on unregistered {id}");
            chain.map(f)
        })
        .ok()
        .flatten()
}

/// Number of chunk chains currently alive on this thread.
///
/// Every independently constructed [`PoolAllocator`] adds one; the chain
/// goes away with the last handle aliasing it.
pub fn live_chain_count() -> usize {
    CHAINS.try_with(|table| table.borrow().len()).unwrap_or(0)
}

/// A bump-allocating pool for elements of type `T`.
///
/// Storage comes from fixed-capacity chunks searched first-fit, newest
/// first. Individual allocations are never reclaimed: [`deallocate`] is a
/// no-op and memory returns to the system only when the last handle to the
/// chain is dropped.
///
/// Handles are `!Send` and `!Sync`; the chain table is per-thread and the
/// handle count is a plain integer.
///
/// Every handle comes from [`new`](Self::new), [`with_config`](Self::with_config)
/// or a clone. There is no `Default`:
///
/// ```compile_fail
/// use holdfast_arena::PoolAllocator;
///
/// let pool: PoolAllocator<u32> = Default::default();
/// ```
///
/// [`deallocate`]: PoolAllocator::deallocate
pub struct PoolAllocator<T> {
    chain: ChainId,
    capacity: usize,
    _marker: PhantomData<*const T>,
}

impl<T> PoolAllocator<T> {
    /// Create a pool with the default chunk capacity.
    ///
    /// # Panics
    ///
    /// Panics if called from a thread-local destructor after this thread's
    /// chain table is gone. Use [`with_config`](Self::with_config) there.
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        match Self::with_config(PoolConfig::default()) {
            Ok(pool) => pool,
            Err(err) => panic!("{err}"),
        }
    }

    /// Create a pool with its own fresh chain, allocating the first chunk.
    ///
    /// Fails with [`AllocError::InvalidConfig`] if the configuration cannot
    /// hold `T`, or [`AllocError::ThreadExiting`] once this thread's chain
    /// table is gone.
    pub fn with_config(config: PoolConfig) -> Result<Self, AllocError> {
        let layout = config.chunk_layout::<T>()?;
        let chain = CHAINS
            .try_with(|table| table.borrow_mut().register(Chain::new(layout)))
            .map_err(|_| AllocError::ThreadExiting)?;
        tracing::debug!(
            %chain,
            capacity = layout.size(),
            element = std::any::type_name::<T>(),
            "created pool chain"
        );
        Ok(Self {
            chain,
            capacity: layout.size(),
            _marker: PhantomData,
        })
    }

    /// Allocate uninitialised storage for `n` contiguous elements.
    ///
    /// Fails with [`AllocError::AllocationTooLarge`] if `n` elements can never
    /// fit in one chunk; the chain is left untouched. A zero-byte request
    /// (`n == 0` or a zero-sized `T`) returns a dangling, aligned pointer
    /// without touching the chain. Fails with [`AllocError::ThreadExiting`]
    /// once the handle is detached.
    pub fn allocate(&self, n: usize) -> Result<NonNull<T>, AllocError> {
        let capacity = self.chunk_capacity();
        let Some(bytes) = n.checked_mul(mem::size_of::<T>()) else {
            return Err(self.too_large(usize::MAX, capacity));
        };
        if bytes > capacity {
            return Err(self.too_large(bytes, capacity));
        }
        if bytes == 0 {
            return Ok(NonNull::dangling());
        }
        with_chain(self.chain, |chain| chain.bump(bytes).cast()).ok_or(AllocError::ThreadExiting)
    }

    fn too_large(&self, requested: usize, capacity: usize) -> AllocError {
        tracing::debug!(
            chain = %self.chain,
            requested,
            capacity,
            "rejected oversized pool allocation"
        );
        AllocError::AllocationTooLarge {
            requested,
            capacity,
        }
    }

    /// Return storage to the pool. Always a no-op: bump storage is only
    /// reclaimed when the whole chain is freed.
    pub fn deallocate(&self, _ptr: NonNull<T>, _n: usize) {}

    /// Move `value` into the storage at `ptr`.
    ///
    /// Chunk bookkeeping is not touched.
    ///
    /// # Safety
    ///
    /// `ptr` must be valid for writes and aligned for `T`, e.g. a slot
    /// returned by [`allocate`](Self::allocate). Any value already there is
    /// overwritten without being dropped.
    pub unsafe fn construct(&self, ptr: NonNull<T>, value: T) {
        // SAFETY: upheld by the caller.
        unsafe { ptr.as_ptr().write(value) };
    }

    /// Run the destructor of the value at `ptr` in place.
    ///
    /// The storage stays allocated; chunk bookkeeping is not touched.
    ///
    /// # Safety
    ///
    /// `ptr` must point to an initialised `T` that is not used again
    /// (other than being reconstructed).
    pub unsafe fn destroy(&self, ptr: NonNull<T>) {
        // SAFETY: upheld by the caller.
        unsafe { ptr.as_ptr().drop_in_place() };
    }

    /// Allocate one slot and move `value` into it.
    pub fn emplace(&self, value: T) -> Result<NonNull<T>, AllocError> {
        let ptr = self.allocate(1)?;
        // SAFETY: `ptr` is a fresh, aligned slot for one `T`.
        unsafe { self.construct(ptr, value) };
        Ok(ptr)
    }

    /// Identifier of the shared chain.
    pub fn chain_id(&self) -> ChainId {
        self.chain
    }

    /// Number of live handles aliasing this chain, including `self`.
    ///
    /// This and the other usage queries report zero on a detached handle.
    pub fn handle_count(&self) -> usize {
        with_chain(self.chain, |chain| chain.handles).unwrap_or(0)
    }

    /// Number of chunks in the chain.
    pub fn chunk_count(&self) -> usize {
        with_chain(self.chain, |chain| chain.chunk_count()).unwrap_or(0)
    }

    /// Fixed capacity of each chunk in bytes.
    pub fn chunk_capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes handed out across all chunks.
    pub fn used_bytes(&self) -> usize {
        with_chain(self.chain, |chain| chain.chunks().map(|c| c.used()).sum()).unwrap_or(0)
    }

    /// Bytes reserved from the system across all chunks.
    pub fn reserved_bytes(&self) -> usize {
        self.chunk_count() * self.capacity
    }

    /// Usage of every chunk, newest first.
    pub fn chunk_usage(&self) -> SmallVec<[ChunkUsage; 4]> {
        with_chain(self.chain, |chain| {
            chain
                .chunks()
                .map(|c| ChunkUsage {
                    capacity: c.capacity(),
                    used: c.used(),
                    remaining: c.remaining(),
                })
                .collect()
        })
        .unwrap_or_default()
    }
}

/// Drop one handle on `id`, freeing the chain on the 1 → 0 transition.
fn release_chain(id: ChainId) {
    // Once the table is gone the chain has been leaked; nothing to release.
    let _ = CHAINS.try_with(|table| {
        let mut table = table.borrow_mut();
        let Some(chain) = table.chain_mut(id) else {
            return;
        };
        chain.handles -= 1;
        if chain.handles == 0 {
            if let Some(chain) = table.unregister(id) {
                tracing::debug!(
                    chain = %id,
                    chunks = chain.chunk_count(),
                    "freed pool chain"
                );
            }
        }
    });
}

impl<T> Clone for PoolAllocator<T> {
    fn clone(&self) -> Self {
        with_chain(self.chain, |chain| chain.handles += 1);
        Self {
            chain: self.chain,
            capacity: self.capacity,
            _marker: PhantomData,
        }
    }

    /// Assignment: release this handle's chain (freeing it if this was the
    /// last handle), then alias `source`'s chain.
    fn clone_from(&mut self, source: &Self) {
        if self.chain == source.chain {
            return;
        }
        with_chain(source.chain, |chain| chain.handles += 1);
        release_chain(self.chain);
        self.chain = source.chain;
        self.capacity = source.capacity;
    }
}

impl<T> Drop for PoolAllocator<T> {
    fn drop(&mut self) {
        release_chain(self.chain);
    }
}

/// Handles are equal iff they alias the same chain, i.e. storage from one
/// can be handed back to the other.
impl<T> PartialEq for PoolAllocator<T> {
    fn eq(&self, other: &Self) -> bool {
        self.chain == other.chain
    }
}

impl<T> Eq for PoolAllocator<T> {}

impl<T> fmt::Debug for PoolAllocator<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolAllocator")
            .field("chain", &self.chain)
            .field("element", &std::any::type_name::<T>())
            .finish()
    }
}

/// Pool-backed owners destroy the object in place and hand the slot back
/// through the no-op [`deallocate`](PoolAllocator::deallocate). The owner's
/// handle keeps the chain alive until then.
impl<T> Reclaim<T> for PoolAllocator<T> {
    unsafe fn reclaim(&self, ptr: NonNull<T>) {
        // SAFETY: the caller guarantees `ptr` is a live object from this
        // pool, reclaimed once.
        unsafe { self.destroy(ptr) };
        self.deallocate(ptr, 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_pool_has_one_chunk_and_one_handle() {
        let pool = PoolAllocator::<u32>::new();
        assert_eq!(pool.chunk_count(), 1);
        assert_eq!(pool.handle_count(), 1);
        assert_eq!(pool.chunk_capacity(), PoolConfig::DEFAULT_CHUNK_CAPACITY);
        assert_eq!(pool.used_bytes(), 0);
    }

    #[test]
    fn sequential_allocations_are_contiguous() {
        let pool = PoolAllocator::<u64>::new();
        let a = pool.allocate(3).unwrap();
        let b = pool.allocate(1).unwrap();
        assert_eq!(b.as_ptr() as usize - a.as_ptr() as usize, 3 * 8);
        assert_eq!(pool.used_bytes(), 32);
    }

    #[test]
    fn allocations_are_aligned() {
        let pool = PoolAllocator::<u128>::with_config(PoolConfig::new(256)).unwrap();
        for _ in 0..40 {
            let ptr = pool.allocate(1).unwrap();
            assert_eq!(ptr.as_ptr() as usize % mem::align_of::<u128>(), 0);
        }
    }

    #[test]
    fn overflow_creates_new_chunk() {
        let pool = PoolAllocator::<u32>::with_config(PoolConfig::new(16)).unwrap();
        pool.allocate(4).unwrap();
        assert_eq!(pool.chunk_count(), 1);
        pool.allocate(1).unwrap();
        assert_eq!(pool.chunk_count(), 2);
        assert_eq!(pool.reserved_bytes(), 32);
    }

    #[test]
    fn oversized_request_leaves_chain_unchanged() {
        let pool = PoolAllocator::<u32>::with_config(PoolConfig::new(16)).unwrap();
        pool.allocate(2).unwrap();
        let before = pool.chunk_usage();

        let err = pool.allocate(5).unwrap_err();
        assert_eq!(
            err,
            AllocError::AllocationTooLarge {
                requested: 20,
                capacity: 16
            }
        );
        assert_eq!(pool.chunk_usage(), before);
    }

    #[test]
    fn overflowing_request_is_too_large() {
        let pool = PoolAllocator::<u64>::new();
        let err = pool.allocate(usize::MAX).unwrap_err();
        assert!(matches!(
            err,
            AllocError::AllocationTooLarge {
                requested: usize::MAX,
                ..
            }
        ));
        assert_eq!(pool.used_bytes(), 0);
    }

    #[test]
    fn exactly_chunk_capacity_succeeds() {
        let pool = PoolAllocator::<u8>::with_config(PoolConfig::new(64)).unwrap();
        assert!(pool.allocate(64).is_ok());
        assert_eq!(pool.chunk_usage()[0].remaining, 0);
    }

    #[test]
    fn zero_byte_requests_do_not_touch_chain() {
        let pool = PoolAllocator::<u32>::new();
        let ptr = pool.allocate(0).unwrap();
        assert_eq!(ptr, NonNull::dangling());
        assert_eq!(pool.used_bytes(), 0);

        let units = PoolAllocator::<()>::new();
        assert!(units.allocate(1_000_000).is_ok());
        assert_eq!(units.used_bytes(), 0);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let err = PoolAllocator::<u32>::with_config(PoolConfig::new(0)).unwrap_err();
        assert!(matches!(err, AllocError::InvalidConfig { .. }));
    }

    #[test]
    fn clone_aliases_chain() {
        let a = PoolAllocator::<u16>::new();
        let b = a.clone();
        assert_eq!(a, b);
        assert_eq!(a.handle_count(), 2);
        b.allocate(4).unwrap();
        assert_eq!(a.used_bytes(), 8);
    }

    #[test]
    fn independent_pools_are_unequal() {
        let a = PoolAllocator::<u16>::new();
        let b = PoolAllocator::<u16>::new();
        assert_ne!(a, b);
        assert_eq!(a.handle_count(), 1);
        assert_eq!(b.handle_count(), 1);
    }

    #[test]
    fn last_handle_frees_chain() {
        let before = live_chain_count();
        let a = PoolAllocator::<u8>::new();
        let b = a.clone();
        assert_eq!(live_chain_count(), before + 1);
        drop(a);
        assert_eq!(live_chain_count(), before + 1);
        assert_eq!(b.handle_count(), 1);
        drop(b);
        assert_eq!(live_chain_count(), before);
    }

    #[test]
    fn clone_from_releases_previous_chain() {
        let before = live_chain_count();
        let source = PoolAllocator::<u8>::new();
        let mut target = PoolAllocator::<u8>::new();
        assert_eq!(live_chain_count(), before + 2);

        target.clone_from(&source);
        assert_eq!(target, source);
        assert_eq!(source.handle_count(), 2);
        assert_eq!(live_chain_count(), before + 1);
    }

    #[test]
    fn clone_from_keeps_shared_previous_chain() {
        let source = PoolAllocator::<u8>::new();
        let old = PoolAllocator::<u8>::new();
        let mut target = old.clone();

        target.clone_from(&source);
        assert_eq!(old.handle_count(), 1);
        assert_eq!(source.handle_count(), 2);
    }

    #[test]
    fn clone_from_same_chain_is_noop() {
        let a = PoolAllocator::<u8>::new();
        let mut b = a.clone();
        b.clone_from(&a);
        assert_eq!(a.handle_count(), 2);
    }

    #[test]
    fn emplace_writes_value() {
        let pool = PoolAllocator::<String>::new();
        let ptr = pool.emplace("kept".to_string()).unwrap();
        assert_eq!(unsafe { ptr.as_ref() }, "kept");
        unsafe { pool.destroy(ptr) };
    }

    #[test]
    fn reclaim_runs_destructor_in_place() {
        use std::rc::Rc;

        let marker = Rc::new(());
        let pool = PoolAllocator::<Rc<()>>::new();
        let ptr = pool.emplace(Rc::clone(&marker)).unwrap();
        assert_eq!(Rc::strong_count(&marker), 2);
        unsafe { pool.reclaim(ptr) };
        assert_eq!(Rc::strong_count(&marker), 1);
        assert_eq!(pool.used_bytes(), mem::size_of::<Rc<()>>());
    }
}
