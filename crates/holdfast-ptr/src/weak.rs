//! Non-owning observer of a shared group.

use std::fmt;
use std::mem;
use std::ptr::NonNull;

use holdfast_core::{BoxReclaim, Reclaim};

use crate::counts::{self, Counts};
use crate::shared::SharedOwner;

struct Link<T, R> {
    ptr: *mut T,
    counts: NonNull<Counts<R>>,
}

impl<T, R> Clone for Link<T, R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T, R> Copy for Link<T, R> {}

/// Observes a [`SharedOwner`] group without keeping its object alive.
///
/// Each bound observer contributes one to the group's weak count, which
/// keeps only the counts block alive. The object can be reached by
/// promoting with [`lock`](Self::lock) while at least one strong reference
/// remains.
pub struct WeakObserver<T, R: Reclaim<T> = BoxReclaim> {
    inner: Option<Link<T, R>>,
}

impl<T, R: Reclaim<T>> WeakObserver<T, R> {
    /// Observe `owner`'s group. An empty owner yields an unbound observer.
    pub fn new(owner: &SharedOwner<T, R>) -> Self {
        let inner = owner.parts().map(|(ptr, counts)| {
            // SAFETY: `owner` holds a strong reference, keeping the block
            // alive.
            unsafe { counts.as_ref() }.inc_weak();
            Link {
                ptr: ptr.as_ptr(),
                counts,
            }
        });
        Self { inner }
    }

    /// An observer bound to nothing. It reports itself expired.
    pub fn empty() -> Self {
        Self { inner: None }
    }

    fn counts(&self) -> Option<&Counts<R>> {
        // SAFETY: a bound observer holds a weak reference, which keeps the
        // block alive.
        self.inner
            .as_ref()
            .map(|link| unsafe { link.counts.as_ref() })
    }

    /// Strong count of the observed group, or 0 if unbound.
    pub fn use_count(&self) -> usize {
        self.counts().map_or(0, Counts::strong)
    }

    /// Weak count of the observed group, or 0 if unbound.
    pub fn weak_count(&self) -> usize {
        self.counts().map_or(0, Counts::weak)
    }

    /// Whether the object is gone (or was never observed).
    pub fn expired(&self) -> bool {
        self.use_count() == 0
    }

    /// Promote to a strong owner.
    ///
    /// Returns an empty owner once the object has been destroyed; an
    /// expired object is never dereferenced.
    pub fn lock(&self) -> SharedOwner<T, R> {
        let Some(link) = self.inner else {
            return SharedOwner::empty();
        };
        // SAFETY: this observer's weak reference keeps the block alive.
        let counts = unsafe { link.counts.as_ref() };
        let Some(ptr) = NonNull::new(link.ptr) else {
            return SharedOwner::empty();
        };
        if counts.strong() == 0 {
            return SharedOwner::empty();
        }
        counts.inc_strong();
        // SAFETY: strong was non-zero, so the object is alive, and the
        // increment above belongs to the new owner.
        unsafe { SharedOwner::from_counted(ptr, link.counts) }
    }

    /// Drop the current binding and rebind to a fresh, unshared counts
    /// block with a weak count of one and a strong count of zero.
    ///
    /// The observer is expired immediately afterwards. `ptr` is recorded
    /// but never dereferenced or released, and no release strategy is
    /// created for it.
    pub fn reset(&mut self, ptr: *mut T) {
        let fresh = Self {
            inner: Some(Link {
                ptr,
                counts: Counts::allocate_expired(),
            }),
        };
        drop(mem::replace(self, fresh));
    }

    /// Exchange bindings with `other`. No count changes.
    pub fn swap(&mut self, other: &mut Self) {
        mem::swap(&mut self.inner, &mut other.inner);
    }

    /// Move this observer's binding out, leaving it unbound.
    pub fn take(&mut self) -> Self {
        Self {
            inner: self.inner.take(),
        }
    }
}

impl<T, R: Reclaim<T>> Clone for WeakObserver<T, R> {
    fn clone(&self) -> Self {
        if let Some(counts) = self.counts() {
            counts.inc_weak();
        }
        Self { inner: self.inner }
    }
}

impl<T, R: Reclaim<T>> Drop for WeakObserver<T, R> {
    fn drop(&mut self) {
        if let Some(link) = self.inner.take() {
            // SAFETY: this observer held one weak reference on the block.
            unsafe { counts::release_weak(link.counts) };
        }
    }
}

impl<T, R: Reclaim<T>> Default for WeakObserver<T, R> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T, R: Reclaim<T>> fmt::Debug for WeakObserver<T, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakObserver")
            .field("use_count", &self.use_count())
            .field("weak_count", &self.weak_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use holdfast_test_utils::Census;

    use super::*;

    #[test]
    fn observer_does_not_extend_lifetime() {
        let census = Census::new();
        let a = SharedOwner::new(census.spawn(1));
        let w = WeakObserver::new(&a);
        assert_eq!((a.use_count(), a.weak_count()), (1, 1));
        assert!(!w.expired());

        drop(a);
        census.assert_all_dropped_once();
        assert!(w.expired());
        assert_eq!(w.use_count(), 0);
        assert_eq!(w.weak_count(), 1);
        assert!(w.lock().is_empty());
    }

    #[test]
    fn lock_adds_one_strong_reference() {
        let a = SharedOwner::new(String::from("x"));
        let w = a.downgrade();
        let before = a.use_count();

        let b = w.lock();
        assert_eq!(b.use_count(), before + 1);
        assert_eq!(b.get(), a.get());
        assert_eq!(&*b, "x");
    }

    #[test]
    fn clone_and_drop_track_weak_count() {
        let a = SharedOwner::new(0u8);
        let w1 = a.downgrade();
        let w2 = w1.clone();
        assert_eq!(a.weak_count(), 2);
        drop(w1);
        assert_eq!(a.weak_count(), 1);
        drop(w2);
        assert_eq!(a.weak_count(), 0);
    }

    #[test]
    fn observer_of_empty_owner_is_unbound() {
        let w = WeakObserver::new(&SharedOwner::<u8>::empty());
        assert!(w.expired());
        assert_eq!(w.weak_count(), 0);
        assert!(w.lock().is_empty());
    }

    #[test]
    fn reset_rebinds_to_fresh_expired_slot() {
        let census = Census::new();
        let a = SharedOwner::new(census.spawn(1));
        let mut w = a.downgrade();
        let mut stray = census.spawn(2);

        w.reset(&mut stray);
        assert_eq!(a.weak_count(), 0);
        assert!(w.expired());
        assert_eq!((w.use_count(), w.weak_count()), (0, 1));
        assert!(w.lock().is_empty());

        drop(w);
        assert!(!census.is_dropped(stray.id()));
        drop(a);
        drop(stray);
        census.assert_all_dropped_once();
    }

    #[test]
    fn swap_exchanges_bindings() {
        let a = SharedOwner::new(1);
        let b = SharedOwner::new(2);
        let mut wa = a.downgrade();
        let mut wb = b.downgrade();

        wa.swap(&mut wb);
        assert_eq!(*wa.lock(), 2);
        assert_eq!(*wb.lock(), 1);
        assert_eq!((a.weak_count(), b.weak_count()), (1, 1));
    }

    #[test]
    fn take_leaves_unbound_observer() {
        let a = SharedOwner::new(1);
        let mut w = a.downgrade();
        let moved = w.take();
        assert!(w.expired());
        assert!(!moved.expired());
        assert_eq!(a.weak_count(), 1);
    }

    #[test]
    fn debug_reports_counts() {
        let a = SharedOwner::new(1);
        let w = a.downgrade();
        assert_eq!(
            format!("{w:?}"),
            "WeakObserver { use_count: 1, weak_count: 1 }"
        );
    }
}
