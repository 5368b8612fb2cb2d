//! Release strategies for owned objects.
//!
//! An owner never frees memory itself. When the last owner of an object goes
//! away it hands the pointer to a [`Reclaim`] implementation, which knows
//! where the storage came from: [`BoxReclaim`] for `Box`-allocated objects,
//! and the pool allocator in `holdfast-arena` for pool-allocated ones.

use std::ptr::NonNull;

/// Gives an object's storage back to wherever it was allocated.
///
/// Implementations run the object's destructor and release (or, for a bump
/// pool, abandon) its storage.
pub trait Reclaim<T> {
    /// Destroy the object at `ptr` and release its storage.
    ///
    /// # Safety
    ///
    /// `ptr` must point to a live, initialised `T` that was allocated in a
    /// way this strategy understands, and nothing may use it afterwards.
    /// Each object must be reclaimed at most once.
    unsafe fn reclaim(&self, ptr: NonNull<T>);
}

/// Release strategy for objects allocated with `Box`.
///
/// Pointers handed to owners using this strategy must come from
/// [`Box::into_raw`] (or [`Box::leak`]).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct BoxReclaim;

impl<T> Reclaim<T> for BoxReclaim {
    unsafe fn reclaim(&self, ptr: NonNull<T>) {
        // SAFETY: the caller guarantees `ptr` came from `Box::into_raw` and
        // is reclaimed only once.
        drop(unsafe { Box::from_raw(ptr.as_ptr()) });
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;

    struct Flag(Rc<Cell<u32>>);

    impl Drop for Flag {
        fn drop(&mut self) {
            self.0.set(self.0.get() + 1);
        }
    }

    #[test]
    fn box_reclaim_runs_destructor_once() {
        let drops = Rc::new(Cell::new(0));
        let raw = Box::into_raw(Box::new(Flag(Rc::clone(&drops))));
        let ptr = NonNull::new(raw).unwrap();
        unsafe { BoxReclaim.reclaim(ptr) };
        assert_eq!(drops.get(), 1);
    }
}
