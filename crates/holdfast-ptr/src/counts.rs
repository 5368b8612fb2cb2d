//! The counts block shared by one [`SharedOwner`]/[`WeakObserver`] group.
//!
//! One heap block per tracked object holds the strong count, the weak count
//! and the release strategy. Only the pointer types in this crate touch the
//! counts, and only through the two release functions below.
//!
//! Lifecycle of a group:
//!
//! ```text
//! Alive     strong > 0              object live, block live
//!   │ last SharedOwner dropped: object destroyed here
//!   ▼
//! Expired   strong == 0, weak > 0   object gone, block live
//!   │ last WeakObserver dropped
//!   ▼
//! Collected strong == 0, weak == 0  block freed
//! ```
//!
//! [`SharedOwner`]: crate::SharedOwner
//! [`WeakObserver`]: crate::WeakObserver

use std::cell::Cell;
use std::process;
use std::ptr::NonNull;

use holdfast_core::Reclaim;

/// Strong and weak counts plus the strategy that destroys the object.
pub(crate) struct Counts<R> {
    strong: Cell<usize>,
    weak: Cell<usize>,
    /// `None` only for blocks born expired, which never see a strong
    /// reference.
    reclaim: Option<R>,
}

impl<R> Counts<R> {
    /// Allocate a block with the given starting counts.
    pub(crate) fn allocate(strong: usize, weak: usize, reclaim: R) -> NonNull<Self> {
        Self::leak(strong, weak, Some(reclaim))
    }

    /// Allocate an already-expired block held by one weak reference.
    pub(crate) fn allocate_expired() -> NonNull<Self> {
        Self::leak(0, 1, None)
    }

    fn leak(strong: usize, weak: usize, reclaim: Option<R>) -> NonNull<Self> {
        let block = Box::new(Self {
            strong: Cell::new(strong),
            weak: Cell::new(weak),
            reclaim,
        });
        NonNull::from(Box::leak(block))
    }

    pub(crate) fn strong(&self) -> usize {
        self.strong.get()
    }

    pub(crate) fn weak(&self) -> usize {
        self.weak.get()
    }

    // Overflow needs leaked handles; abort instead of wrapping.
    pub(crate) fn inc_strong(&self) {
        let next = self.strong.get().checked_add(1).unwrap_or_else(|| process::abort());
        self.strong.set(next);
    }

    pub(crate) fn inc_weak(&self) {
        let next = self.weak.get().checked_add(1).unwrap_or_else(|| process::abort());
        self.weak.set(next);
    }

    fn dec_strong(&self) -> usize {
        let next = self.strong.get() - 1;
        self.strong.set(next);
        next
    }

    fn dec_weak(&self) -> usize {
        let next = self.weak.get() - 1;
        self.weak.set(next);
        next
    }

    /// # Safety
    ///
    /// `block` must come from [`Counts::allocate`], both counts must be zero,
    /// and nothing may use it afterwards.
    unsafe fn free(block: NonNull<Self>) {
        // SAFETY: upheld by the caller.
        let block = unsafe { Box::from_raw(block.as_ptr()) };
        debug_assert_eq!((block.strong(), block.weak()), (0, 0));
        drop(block);
        tracing::trace!("released counts block");
    }
}

/// Give up one strong reference to the object at `ptr`.
///
/// On the 1 → 0 transition the object is destroyed immediately; the block
/// is freed as well if no observers remain. While the object's destructor
/// runs, a temporary weak reference keeps the block alive, so a payload
/// that owns observers of its own group cannot free the block underneath
/// this call.
///
/// # Safety
///
/// The caller must own one strong reference on `block`, and `ptr` must be
/// the group's object. The caller gives that reference up.
pub(crate) unsafe fn release_strong<T, R: Reclaim<T>>(ptr: NonNull<T>, block: NonNull<Counts<R>>) {
    // SAFETY: a strong reference keeps the block alive.
    let counts = unsafe { block.as_ref() };
    if counts.dec_strong() != 0 {
        return;
    }
    counts.inc_weak();
    if let Some(reclaim) = &counts.reclaim {
        // SAFETY: strong just reached zero, so this is the only release of
        // the object.
        unsafe { reclaim.reclaim(ptr) };
    }
    tracing::trace!(object = ?ptr, "destroyed shared object");
    if counts.dec_weak() == 0 {
        // SAFETY: both counts are zero and no handle references the block.
        unsafe { Counts::free(block) };
    }
}

/// Give up one weak reference, freeing the block once both counts are zero.
///
/// Never touches the object.
///
/// # Safety
///
/// The caller must own one weak reference on `block` and gives it up.
pub(crate) unsafe fn release_weak<R>(block: NonNull<Counts<R>>) {
    // SAFETY: a weak reference keeps the block alive.
    let counts = unsafe { block.as_ref() };
    if counts.dec_weak() == 0 && counts.strong() == 0 {
        // SAFETY: both counts are zero and no handle references the block.
        unsafe { Counts::free(block) };
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use holdfast_core::BoxReclaim;

    use super::*;

    fn boxed<T>(value: T) -> NonNull<T> {
        NonNull::from(Box::leak(Box::new(value)))
    }

    #[test]
    fn release_strong_destroys_on_last_reference() {
        let marker = Rc::new(());
        let ptr = boxed(Rc::clone(&marker));
        let block = Counts::allocate(2, 0, BoxReclaim);

        unsafe { release_strong(ptr, block) };
        assert_eq!(Rc::strong_count(&marker), 2);
        assert_eq!(unsafe { block.as_ref() }.strong(), 1);

        unsafe { release_strong(ptr, block) };
        assert_eq!(Rc::strong_count(&marker), 1);
    }

    #[test]
    fn block_outlives_object_while_observed() {
        let marker = Rc::new(());
        let ptr = boxed(Rc::clone(&marker));
        let block = Counts::allocate(1, 1, BoxReclaim);

        unsafe { release_strong(ptr, block) };
        assert_eq!(Rc::strong_count(&marker), 1);
        let counts = unsafe { block.as_ref() };
        assert_eq!((counts.strong(), counts.weak()), (0, 1));

        unsafe { release_weak(block) };
    }

    #[test]
    fn release_weak_keeps_block_while_alive() {
        let ptr = boxed(5u32);
        let block = Counts::allocate(1, 2, BoxReclaim);

        unsafe { release_weak(block) };
        unsafe { release_weak(block) };
        let counts = unsafe { block.as_ref() };
        assert_eq!((counts.strong(), counts.weak()), (1, 0));

        unsafe { release_strong(ptr, block) };
    }

    struct CountingReclaim(Rc<Cell<u32>>);

    impl<T> Reclaim<T> for CountingReclaim {
        unsafe fn reclaim(&self, ptr: NonNull<T>) {
            self.0.set(self.0.get() + 1);
            drop(unsafe { Box::from_raw(ptr.as_ptr()) });
        }
    }

    #[test]
    fn expired_block_starts_with_one_observer() {
        let block = Counts::<CountingReclaim>::allocate_expired();
        let counts = unsafe { block.as_ref() };
        assert_eq!((counts.strong(), counts.weak()), (0, 1));
        assert!(counts.reclaim.is_none());
        unsafe { release_weak(block) };
    }

    #[test]
    fn strategy_runs_exactly_once() {
        let calls = Rc::new(Cell::new(0));
        let ptr = boxed(String::from("payload"));
        let block = Counts::allocate(3, 0, CountingReclaim(Rc::clone(&calls)));

        for _ in 0..3 {
            unsafe { release_strong(ptr, block) };
        }
        assert_eq!(calls.get(), 1);
    }
}
