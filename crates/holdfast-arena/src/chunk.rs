//! Contiguous raw-storage chunks and the newest-first chunk chain.
//!
//! A [`Chunk`] is one fixed-capacity byte buffer with a bump cursor. A
//! [`Chain`] links chunks newest-first and satisfies requests first-fit,
//! prepending a fresh chunk when none has room. Chunks are never compacted
//! and freed space is never reused; the whole chain is freed at once.

use std::alloc::{self, Layout};
use std::ptr::NonNull;

/// A single contiguous storage segment with bump allocation.
///
/// Invariant: `cursor() + remaining() == capacity()`.
pub struct Chunk {
    base: NonNull<u8>,
    layout: Layout,
    /// Bump pointer: offset of the first free byte.
    cursor: usize,
    remaining: usize,
    /// Next older chunk in the chain.
    next: Option<Box<Chunk>>,
}

impl Chunk {
    /// Allocate a chunk with the given layout from the system allocator.
    ///
    /// The contents are uninitialised.
    ///
    /// # Panics
    ///
    /// Panics if `layout` has zero size. Aborts through
    /// [`alloc::handle_alloc_error`] if the system allocator fails.
    pub fn new(layout: Layout) -> Self {
        assert!(layout.size() > 0, "chunk layout must have non-zero size");
        // SAFETY: `layout` has non-zero size (checked above).
        let raw = unsafe { alloc::alloc(layout) };
        let Some(base) = NonNull::new(raw) else {
            alloc::handle_alloc_error(layout);
        };
        Self {
            base,
            layout,
            cursor: 0,
            remaining: layout.size(),
            next: None,
        }
    }

    /// Bump-allocate `bytes` from this chunk.
    ///
    /// Returns the address of the old cursor, or `None` without touching
    /// any bookkeeping if fewer than `bytes` remain.
    pub fn try_bump(&mut self, bytes: usize) -> Option<NonNull<u8>> {
        if bytes > self.remaining {
            return None;
        }
        // SAFETY: `cursor + bytes <= capacity`, so the offset stays inside
        // (or one past the end of) the allocation.
        let ptr = unsafe { NonNull::new_unchecked(self.base.as_ptr().add(self.cursor)) };
        self.cursor += bytes;
        self.remaining -= bytes;
        debug_assert_eq!(self.cursor + self.remaining, self.layout.size());
        Some(ptr)
    }

    /// Whether `ptr` lies inside this chunk's buffer.
    pub fn contains(&self, ptr: *const u8) -> bool {
        let start = self.base.as_ptr() as usize;
        let addr = ptr as usize;
        addr >= start && addr < start + self.layout.size()
    }

    /// Offset of the first free byte.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Free bytes left.
    pub fn remaining(&self) -> usize {
        self.remaining
    }

    /// Bytes handed out so far.
    pub fn used(&self) -> usize {
        self.cursor
    }

    /// Fixed capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.layout.size()
    }

    /// The next older chunk, if any.
    pub fn next(&self) -> Option<&Chunk> {
        self.next.as_deref()
    }
}

impl Drop for Chunk {
    fn drop(&mut self) {
        // SAFETY: `base` was returned by `alloc::alloc(self.layout)`.
        unsafe { alloc::dealloc(self.base.as_ptr(), self.layout) };
    }
}

/// Per-chunk usage figures, newest chunk first.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChunkUsage {
    /// Fixed capacity in bytes.
    pub capacity: usize,
    /// Bytes handed out.
    pub used: usize,
    /// Bytes still free.
    pub remaining: usize,
}

/// A newest-first linked chain of chunks plus the count of pool handles
/// sharing it.
pub(crate) struct Chain {
    head: Option<Box<Chunk>>,
    layout: Layout,
    chunk_count: usize,
    /// Live pool handles aliasing this chain.
    pub(crate) handles: usize,
}

impl Chain {
    /// Create a chain holding one fresh chunk and one handle.
    pub(crate) fn new(layout: Layout) -> Self {
        Self {
            head: Some(Box::new(Chunk::new(layout))),
            layout,
            chunk_count: 1,
            handles: 1,
        }
    }

    /// Capacity of every chunk in bytes.
    pub(crate) fn chunk_capacity(&self) -> usize {
        self.layout.size()
    }

    /// Bump-allocate `bytes`, first-fit from the newest chunk, prepending a
    /// new chunk if nothing fits.
    ///
    /// The caller guarantees `0 < bytes <= chunk_capacity()`.
    pub(crate) fn bump(&mut self, bytes: usize) -> NonNull<u8> {
        debug_assert!(bytes > 0 && bytes <= self.chunk_capacity());

        let mut cursor = self.head.as_deref_mut();
        while let Some(chunk) = cursor {
            if let Some(ptr) = chunk.try_bump(bytes) {
                return ptr;
            }
            cursor = chunk.next.as_deref_mut();
        }

        let mut chunk = Box::new(Chunk::new(self.layout));
        let ptr = chunk
            .try_bump(bytes)
            .expect("bytes <= chunk capacity, so a fresh chunk always fits");
        chunk.next = self.head.take();
        self.head = Some(chunk);
        self.chunk_count += 1;
        tracing::debug!(
            chunks = self.chunk_count,
            capacity = self.chunk_capacity(),
            "prepended chunk to pool chain"
        );
        ptr
    }

    /// Iterate chunks newest first.
    pub(crate) fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        std::iter::successors(self.head.as_deref(), |chunk| chunk.next())
    }

    pub(crate) fn chunk_count(&self) -> usize {
        self.chunk_count
    }
}

impl Drop for Chain {
    fn drop(&mut self) {
        // Unlink iteratively; a recursive drop of a long chain could
        // exhaust the stack.
        let mut next = self.head.take();
        while let Some(mut chunk) = next {
            next = chunk.next.take();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout(size: usize) -> Layout {
        Layout::from_size_align(size, 8).unwrap()
    }

    #[test]
    fn chunk_sequential_bumps() {
        let mut chunk = Chunk::new(layout(64));
        let a = chunk.try_bump(16).unwrap();
        let b = chunk.try_bump(8).unwrap();
        assert_eq!(b.as_ptr() as usize - a.as_ptr() as usize, 16);
        assert_eq!(chunk.cursor(), 24);
        assert_eq!(chunk.remaining(), 40);
        assert_eq!(chunk.cursor() + chunk.remaining(), chunk.capacity());
    }

    #[test]
    fn chunk_fails_when_full_without_moving_cursor() {
        let mut chunk = Chunk::new(layout(32));
        assert!(chunk.try_bump(32).is_some());
        assert!(chunk.try_bump(1).is_none());
        assert_eq!(chunk.cursor(), 32);
        assert_eq!(chunk.remaining(), 0);
    }

    #[test]
    fn chunk_base_is_aligned() {
        let mut chunk = Chunk::new(Layout::from_size_align(128, 64).unwrap());
        let ptr = chunk.try_bump(8).unwrap();
        assert_eq!(ptr.as_ptr() as usize % 64, 0);
    }

    #[test]
    fn chunk_contains_only_its_own_bytes() {
        let mut chunk = Chunk::new(layout(16));
        let ptr = chunk.try_bump(16).unwrap();
        assert!(chunk.contains(ptr.as_ptr()));
        assert!(!chunk.contains(ptr.as_ptr().wrapping_add(16)));
    }

    #[test]
    #[should_panic(expected = "non-zero size")]
    fn chunk_rejects_zero_size() {
        Chunk::new(layout(0));
    }

    #[test]
    fn chain_prepends_when_full() {
        let mut chain = Chain::new(layout(32));
        let first = chain.bump(24);
        let second = chain.bump(16);
        assert_eq!(chain.chunk_count(), 2);
        let newest = chain.chunks().next().unwrap();
        assert!(newest.contains(second.as_ptr()));
        assert!(!newest.contains(first.as_ptr()));
    }

    #[test]
    fn chain_first_fit_reaches_older_chunks() {
        let mut chain = Chain::new(layout(32));
        chain.bump(24); // oldest: 8 free
        chain.bump(30); // newest: 2 free
        let third = chain.bump(8);
        assert_eq!(chain.chunk_count(), 2);
        let oldest = chain.chunks().nth(1).unwrap();
        assert!(oldest.contains(third.as_ptr()));
        assert_eq!(oldest.remaining(), 0);
    }

    #[test]
    fn chain_prefers_newest_chunk() {
        let mut chain = Chain::new(layout(32));
        chain.bump(16); // oldest: 16 free
        chain.bump(20); // doesn't fit, new chunk: 12 free
        let ptr = chain.bump(4);
        let newest = chain.chunks().next().unwrap();
        assert!(newest.contains(ptr.as_ptr()));
    }

    #[test]
    fn long_chain_drops_iteratively() {
        let mut chain = Chain::new(layout(1));
        for _ in 0..2_000 {
            chain.bump(1);
        }
        assert_eq!(chain.chunk_count(), 2_000);
        drop(chain);
    }
}
