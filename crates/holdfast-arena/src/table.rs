//! Per-thread registry of chunk chains.
//!
//! Pool handles name their chain by a [`ChainId`] instead of pointing at it.
//! Unregistering a chain advances its entry's generation, so an id minted
//! before that resolves to nothing even after the entry hosts a newer chain.
//!
//! The registry lives in a thread-local and is destroyed at thread exit,
//! possibly before other thread-locals that still hold pooled objects. Its
//! destructor therefore leaks every chain that still has handles: those
//! handles' objects sit inside the chunks and may be dropped later.

use std::fmt;
use std::mem;

use crate::chunk::Chain;

/// Identifier of one chunk chain: upper 32 bits entry index, lower 32 bits
/// generation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChainId(u64);

impl ChainId {
    fn pack(index: u32, generation: u32) -> Self {
        Self((u64::from(index) << 32) | u64::from(generation))
    }

    fn index(self) -> usize {
        (self.0 >> 32) as usize
    }

    fn generation(self) -> u32 {
        self.0 as u32
    }

    /// Raw packed value.
    pub fn to_raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "chain#{}.{}", self.index(), self.generation())
    }
}

struct Entry {
    generation: u32,
    chain: Option<Chain>,
}

/// Chains registered on this thread, keyed by [`ChainId`].
///
/// Vacated entries are recycled under a new generation. An entry whose
/// generation would wrap to 0 is never recycled.
pub(crate) struct ChainTable {
    entries: Vec<Entry>,
    vacant: Vec<u32>,
    live: usize,
}

impl ChainTable {
    pub(crate) const fn new() -> Self {
        Self {
            entries: Vec::new(),
            vacant: Vec::new(),
            live: 0,
        }
    }

    /// Take ownership of `chain` and mint its id.
    pub(crate) fn register(&mut self, chain: Chain) -> ChainId {
        self.live += 1;
        match self.vacant.pop() {
            Some(index) => {
                let entry = &mut self.entries[index as usize];
                entry.chain = Some(chain);
                ChainId::pack(index, entry.generation)
            }
            None => {
                let index = self.entries.len() as u32;
                self.entries.push(Entry {
                    generation: 0,
                    chain: Some(chain),
                });
                ChainId::pack(index, 0)
            }
        }
    }

    fn entry_for(&mut self, id: ChainId) -> Option<&mut Entry> {
        self.entries
            .get_mut(id.index())
            .filter(|entry| entry.generation == id.generation())
    }

    /// The chain behind `id`, or `None` once it has been unregistered.
    pub(crate) fn chain_mut(&mut self, id: ChainId) -> Option<&mut Chain> {
        self.entry_for(id)?.chain.as_mut()
    }

    /// Hand the chain behind `id` back to the caller and retire `id`.
    pub(crate) fn unregister(&mut self, id: ChainId) -> Option<Chain> {
        let entry = self.entry_for(id)?;
        let chain = entry.chain.take()?;
        entry.generation = entry.generation.wrapping_add(1);
        if entry.generation != 0 {
            self.vacant.push(id.index() as u32);
        }
        self.live -= 1;
        Some(chain)
    }

    /// Number of registered chains.
    pub(crate) fn len(&self) -> usize {
        self.live
    }
}

impl Drop for ChainTable {
    fn drop(&mut self) {
        for (index, entry) in self.entries.drain(..).enumerate() {
            let Some(chain) = entry.chain else { continue };
            if chain.handles == 0 {
                continue;
            }
            tracing::debug!(
                chain = %ChainId::pack(index as u32, entry.generation),
                handles = chain.handles,
                chunks = chain.chunk_count(),
                "leaked live pool chain at thread exit"
            );
            mem::forget(chain);
        }
    }
}
