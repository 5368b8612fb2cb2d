//! Sole-ownership pointer.

use std::fmt;
use std::marker::PhantomData;
use std::mem;
use std::ops::{Deref, DerefMut};
use std::ptr::{self, NonNull};

use holdfast_core::{AccessError, BoxReclaim, Reclaim};

struct Owned<T, R> {
    ptr: NonNull<T>,
    reclaim: R,
}

/// Owns one object exclusively and destroys it when dropped.
///
/// At most one `ExclusiveOwner` refers to a given object. It cannot be
/// copied:
///
/// ```compile_fail
/// use holdfast_ptr::ExclusiveOwner;
///
/// let a = ExclusiveOwner::new(5);
/// let b: ExclusiveOwner<i32> = a.clone();
/// ```
///
/// Moving transfers ownership. [`take`](Self::take) moves out while leaving
/// an observable empty owner behind, and dropping an empty owner frees
/// nothing.
///
/// The object is released through `R` (see [`Reclaim`]): `Box`-allocated by
/// default, or a pool handle for pool-allocated objects.
pub struct ExclusiveOwner<T, R: Reclaim<T> = BoxReclaim> {
    slot: Option<Owned<T, R>>,
    _owns: PhantomData<T>,
}

impl<T> ExclusiveOwner<T> {
    /// Box `value` and take ownership of it.
    pub fn new(value: T) -> Self {
        let ptr = NonNull::from(Box::leak(Box::new(value)));
        Self {
            slot: Some(Owned {
                ptr,
                reclaim: BoxReclaim,
            }),
            _owns: PhantomData,
        }
    }
}

impl<T, R: Reclaim<T>> ExclusiveOwner<T, R> {
    /// An owner holding nothing.
    pub fn empty() -> Self {
        Self {
            slot: None,
            _owns: PhantomData,
        }
    }

    /// Take ownership of `ptr`, releasing it through `R::default()`.
    ///
    /// A null `ptr` yields an empty owner. Only suited to stateless
    /// strategies such as [`BoxReclaim`]; a strategy that owns storage must
    /// be passed to [`from_raw_in`](Self::from_raw_in) instead.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or point to a live `T` that `R::default()` can
    /// release, and nothing else may own it. The storage behind `ptr` must
    /// stay valid until the owner releases it, independently of the fresh
    /// strategy value.
    pub unsafe fn from_raw(ptr: *mut T) -> Self
    where
        R: Default,
    {
        // SAFETY: upheld by the caller.
        unsafe { Self::from_raw_in(ptr, R::default()) }
    }

    /// Take ownership of `ptr`, releasing it through `reclaim`.
    ///
    /// A null `ptr` yields an empty owner and drops `reclaim`.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or point to a live `T` that `reclaim` can release,
    /// such as a slot allocated from the same pool, and nothing else may own
    /// it. The storage must stay valid for as long as the owner holds
    /// `reclaim`.
    pub unsafe fn from_raw_in(ptr: *mut T, reclaim: R) -> Self {
        Self {
            slot: NonNull::new(ptr).map(|ptr| Owned { ptr, reclaim }),
            _owns: PhantomData,
        }
    }

    /// Whether this owner holds nothing.
    pub fn is_empty(&self) -> bool {
        self.slot.is_none()
    }

    /// The owned pointer, or null if empty. Ownership is unchanged.
    pub fn get(&self) -> *mut T {
        self.slot
            .as_ref()
            .map_or(ptr::null_mut(), |owned| owned.ptr.as_ptr())
    }

    /// Shared access to the object.
    pub fn try_ref(&self) -> Result<&T, AccessError> {
        match &self.slot {
            // SAFETY: the owner keeps the object alive and `&self` rules
            // out a live `&mut`.
            Some(owned) => Ok(unsafe { owned.ptr.as_ref() }),
            None => Err(AccessError::NullAccess),
        }
    }

    /// Exclusive access to the object.
    pub fn try_mut(&mut self) -> Result<&mut T, AccessError> {
        match &mut self.slot {
            // SAFETY: sole ownership plus `&mut self` gives unique access.
            Some(owned) => Ok(unsafe { owned.ptr.as_mut() }),
            None => Err(AccessError::NullAccess),
        }
    }

    /// Relinquish ownership without destroying the object.
    ///
    /// Returns the pointer (null if empty) and leaves this owner empty. The
    /// release strategy is dropped with the ownership. For a pool-backed
    /// object that can be the last pool handle, which frees the storage
    /// behind the returned pointer; use [`release_in`](Self::release_in)
    /// to keep the strategy.
    pub fn release(&mut self) -> *mut T {
        self.release_in()
            .map_or(ptr::null_mut(), |(ptr, _reclaim)| ptr.as_ptr())
    }

    /// Relinquish ownership, handing back the pointer together with its
    /// release strategy. `None` if the owner was empty.
    ///
    /// The object is not destroyed. Passing both halves to
    /// [`from_raw_in`](Self::from_raw_in) restores an equivalent owner.
    pub fn release_in(&mut self) -> Option<(NonNull<T>, R)> {
        self.slot.take().map(|owned| (owned.ptr, owned.reclaim))
    }

    /// Destroy the owned object, if any, and become empty.
    pub fn reset(&mut self) {
        drop(self.take());
    }

    /// Take ownership of `ptr`, destroying the previously owned object.
    ///
    /// # Safety
    ///
    /// As for [`from_raw`](Self::from_raw). In particular `ptr` must not be
    /// the object this owner already holds.
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
    /// As for [`from_raw_in`](Self::from_raw_in), and `ptr` must not be the
    /// object this owner already holds.
    pub unsafe fn reset_raw_in(&mut self, ptr: *mut T, reclaim: R) {
        // SAFETY: upheld by the caller.
        let replacement = unsafe { Self::from_raw_in(ptr, reclaim) };
        drop(mem::replace(self, replacement));
    }

    /// Exchange the objects owned by `self` and `other`.
    pub fn swap(&mut self, other: &mut Self) {
        mem::swap(&mut self.slot, &mut other.slot);
    }

    /// Move ownership out, leaving this owner empty.
    pub fn take(&mut self) -> Self {
        Self {
            slot: self.slot.take(),
            _owns: PhantomData,
        }
    }
}

impl<T, R: Reclaim<T>> Drop for ExclusiveOwner<T, R> {
    fn drop(&mut self) {
        if let Some(owned) = self.slot.take() {
            // SAFETY: sole ownership; the slot was taken so this is the
            // only release.
            unsafe { owned.reclaim.reclaim(owned.ptr) };
        }
    }
}

impl<T, R: Reclaim<T>> Default for ExclusiveOwner<T, R> {
    fn default() -> Self {
        Self::empty()
    }
}

/// # Panics
///
/// Dereferencing an empty owner panics with [`AccessError::NullAccess`];
/// use [`ExclusiveOwner::try_ref`] to check first.
impl<T, R: Reclaim<T>> Deref for ExclusiveOwner<T, R> {
    type Target = T;

    fn deref(&self) -> &T {
        match self.try_ref() {
            Ok(value) => value,
            Err(err) => panic!("{err}"),
        }
    }
}

impl<T, R: Reclaim<T>> DerefMut for ExclusiveOwner<T, R> {
    fn deref_mut(&mut self) -> &mut T {
        match self.try_mut() {
            Ok(value) => value,
            Err(err) => panic!("{err}"),
        }
    }
}

impl<T: fmt::Debug, R: Reclaim<T>> fmt::Debug for ExclusiveOwner<T, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.try_ref() {
            Ok(value) => f.debug_tuple("ExclusiveOwner").field(value).finish(),
            Err(_) => f.write_str("ExclusiveOwner(<empty>)"),
        }
    }
}
