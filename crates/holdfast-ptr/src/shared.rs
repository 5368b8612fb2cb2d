//! Strong-counted shared ownership.

use std::fmt;
use std::marker::PhantomData;
use std::mem;
use std::ops::Deref;
use std::ptr::{self, NonNull};

use holdfast_core::{AccessError, BoxReclaim, Reclaim};

use crate::counts::{self, Counts};
use crate::exclusive::ExclusiveOwner;
use crate::weak::WeakObserver;

struct Binding<T, R> {
    ptr: NonNull<T>,
    counts: NonNull<Counts<R>>,
}

impl<T, R> Clone for Binding<T, R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T, R> Copy for Binding<T, R> {}

/// One strong reference to a shared object.
///
/// Every live, non-empty `SharedOwner` contributes exactly one to the
/// group's strong count. The object is destroyed when the count drops from
/// one to zero; the counts block itself lives on until the last
/// [`WeakObserver`] is gone as well.
///
/// Cloning aliases the object and bumps the strong count. Only shared
/// access is offered, since other owners may be reading the same object.
///
/// ```
/// use holdfast_ptr::{SharedOwner, WeakObserver};
///
/// let a = SharedOwner::new(String::from("tracked"));
/// let b = a.clone();
/// assert_eq!(a.use_count(), 2);
///
/// let w = WeakObserver::new(&a);
/// drop(a);
/// drop(b);
/// assert!(w.expired());
/// assert!(w.lock().is_empty());
/// ```
pub struct SharedOwner<T, R: Reclaim<T> = BoxReclaim> {
    inner: Option<Binding<T, R>>,
    _owns: PhantomData<T>,
}

impl<T> SharedOwner<T> {
    /// Box `value` and start a new group owning it.
    pub fn new(value: T) -> Self {
        let ptr = NonNull::from(Box::leak(Box::new(value)));
        // SAFETY: `ptr` is a fresh box owned by nothing else.
        unsafe { Self::adopt(ptr, BoxReclaim) }
    }
}

impl<T, R: Reclaim<T>> SharedOwner<T, R> {
    /// An owner holding nothing.
    pub fn empty() -> Self {
        Self {
            inner: None,
            _owns: PhantomData,
        }
    }

    /// Start a new group owning `ptr`, released through `R::default()`.
    ///
    /// A null `ptr` yields an empty owner and allocates no counts. Only
    /// suited to stateless strategies such as [`BoxReclaim`]; pass a
    /// storage-owning strategy to [`from_raw_in`](Self::from_raw_in).
    ///
    /// # Safety
    ///
    /// `ptr` must be null or point to a live `T` that `R::default()` can
    /// release, and no other owner or group may own it. The storage must
    /// stay valid until the group releases it, independently of the fresh
    /// strategy value.
    pub unsafe fn from_raw(ptr: *mut T) -> Self
    where
        R: Default,
    {
        // SAFETY: upheld by the caller.
        unsafe { Self::from_raw_in(ptr, R::default()) }
    }

    /// Start a new group owning `ptr`, released through `reclaim`.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or point to a live `T` that `reclaim` can release,
    /// such as a slot allocated from the same pool, and no other owner or
    /// group may own it. The storage must stay valid for as long as the
    /// group holds `reclaim`.
    pub unsafe fn from_raw_in(ptr: *mut T, reclaim: R) -> Self {
        match NonNull::new(ptr) {
            // SAFETY: upheld by the caller.
            Some(ptr) => unsafe { Self::adopt(ptr, reclaim) },
            None => Self::empty(),
        }
    }

    /// # Safety
    ///
    /// `ptr` is live, releasable through `reclaim`, and otherwise unowned.
    unsafe fn adopt(ptr: NonNull<T>, reclaim: R) -> Self {
        let counts = Counts::allocate(1, 0, reclaim);
        tracing::trace!(object = ?ptr, "started shared group");
        Self {
            inner: Some(Binding { ptr, counts }),
            _owns: PhantomData,
        }
    }

    /// Wrap a strong reference that the caller has already counted.
    ///
    /// # Safety
    ///
    /// `counts` is the live block for `ptr`'s group and one strong
    /// reference on it now belongs to the returned owner.
    pub(crate) unsafe fn from_counted(ptr: NonNull<T>, counts: NonNull<Counts<R>>) -> Self {
        Self {
            inner: Some(Binding { ptr, counts }),
            _owns: PhantomData,
        }
    }

    /// The object pointer and counts block, if bound.
    pub(crate) fn parts(&self) -> Option<(NonNull<T>, NonNull<Counts<R>>)> {
        self.inner.map(|binding| (binding.ptr, binding.counts))
    }

    fn counts(&self) -> Option<&Counts<R>> {
        // SAFETY: a bound owner holds a strong reference, which keeps the
        // block alive.
        self.inner
            .as_ref()
            .map(|binding| unsafe { binding.counts.as_ref() })
    }

    /// Whether this owner holds nothing.
    pub fn is_empty(&self) -> bool {
        self.inner.is_none()
    }

    /// The object pointer, or null if empty. Counts are unchanged.
    pub fn get(&self) -> *mut T {
        self.inner
            .as_ref()
            .map_or(ptr::null_mut(), |binding| binding.ptr.as_ptr())
    }

    /// Shared access to the object.
    pub fn try_ref(&self) -> Result<&T, AccessError> {
        match &self.inner {
            // SAFETY: strong > 0 while this owner lives, so the object has
            // not been destroyed; no owner hands out `&mut T`.
            Some(binding) => Ok(unsafe { binding.ptr.as_ref() }),
            None => Err(AccessError::NullAccess),
        }
    }

    /// Current strong count, or 0 if empty.
    pub fn use_count(&self) -> usize {
        self.counts().map_or(0, Counts::strong)
    }

    /// Current weak count, or 0 if empty.
    pub fn weak_count(&self) -> usize {
        self.counts().map_or(0, Counts::weak)
    }

    /// Whether `a` and `b` belong to the same group. Two empty owners are
    /// equal.
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        match (&a.inner, &b.inner) {
            (Some(x), Some(y)) => x.counts == y.counts,
            (None, None) => true,
            _ => false,
        }
    }

    /// Create a [`WeakObserver`] of this owner's object.
    pub fn downgrade(&self) -> WeakObserver<T, R> {
        WeakObserver::new(self)
    }

    /// Give up this owner's strong reference and become empty.
    ///
    /// The object is destroyed only if this was the last strong reference.
    pub fn reset(&mut self) {
        drop(self.take());
    }

    /// Give up this owner's strong reference and start a new group owning
    /// `ptr`.
    ///
    /// # Safety
    ///
    /// As for [`from_raw`](Self::from_raw).
    pub unsafe fn reset_raw(&mut self, ptr: *mut T)
    where
        R: Default,
    {
        // SAFETY: upheld by the caller.
        unsafe { self.reset_raw_in(ptr, R::default()) }
    }

    /// As [`reset_raw`](Self::reset_raw) with an explicit strategy.
    ///
    /// # Safety
    ///
    /// As for [`from_raw_in`](Self::from_raw_in).
    pub unsafe fn reset_raw_in(&mut self, ptr: *mut T, reclaim: R) {
        // SAFETY: upheld by the caller.
        let replacement = unsafe { Self::from_raw_in(ptr, reclaim) };
        drop(mem::replace(self, replacement));
    }

    /// Exchange bindings with `other`. No count changes.
    pub fn swap(&mut self, other: &mut Self) {
        mem::swap(&mut self.inner, &mut other.inner);
    }

    /// Move this owner's strong reference out, leaving it empty.
    pub fn take(&mut self) -> Self {
        Self {
            inner: self.inner.take(),
            _owns: PhantomData,
        }
    }
}

impl<T, R: Reclaim<T>> Clone for SharedOwner<T, R> {
    fn clone(&self) -> Self {
        if let Some(counts) = self.counts() {
            counts.inc_strong();
        }
        Self {
            inner: self.inner,
            _owns: PhantomData,
        }
    }
}

impl<T, R: Reclaim<T>> Drop for SharedOwner<T, R> {
    fn drop(&mut self) {
        if let Some(binding) = self.inner.take() {
            // SAFETY: this owner held one strong reference on the group.
            unsafe { counts::release_strong(binding.ptr, binding.counts) };
        }
    }
}

impl<T, R: Reclaim<T>> Default for SharedOwner<T, R> {
    fn default() -> Self {
        Self::empty()
    }
}

/// # Panics
///
/// Dereferencing an empty owner panics with [`AccessError::NullAccess`].
impl<T, R: Reclaim<T>> Deref for SharedOwner<T, R> {
    type Target = T;

    fn deref(&self) -> &T {
        match self.try_ref() {
            Ok(value) => value,
            Err(err) => panic!("{err}"),
        }
    }
}

/// Promote a [`WeakObserver`], failing with [`AccessError::Expired`] once
/// the object is gone or if the observer is unbound.
impl<T, R: Reclaim<T>> TryFrom<&WeakObserver<T, R>> for SharedOwner<T, R> {
    type Error = AccessError;

    fn try_from(weak: &WeakObserver<T, R>) -> Result<Self, AccessError> {
        let owner = weak.lock();
        if owner.is_empty() {
            return Err(AccessError::Expired);
        }
        Ok(owner)
    }
}

/// Move the object of an [`ExclusiveOwner`] into a new group, keeping its
/// release strategy. An empty owner converts to an empty `SharedOwner`.
impl<T, R: Reclaim<T>> From<ExclusiveOwner<T, R>> for SharedOwner<T, R> {
    fn from(mut owner: ExclusiveOwner<T, R>) -> Self {
        match owner.release_in() {
            // SAFETY: the exclusive owner gave up sole ownership of `ptr`.
            Some((ptr, reclaim)) => unsafe { Self::adopt(ptr, reclaim) },
            None => Self::empty(),
        }
    }
}

impl<T: fmt::Debug, R: Reclaim<T>> fmt::Debug for SharedOwner<T, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.try_ref() {
            Ok(value) => f
                .debug_struct("SharedOwner")
                .field("value", value)
                .field("use_count", &self.use_count())
                .finish(),
            Err(_) => f.write_str("SharedOwner(<empty>)"),
        }
    }
}
