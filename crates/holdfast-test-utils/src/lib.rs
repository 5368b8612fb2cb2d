//! Test utilities for holdfast development.
//!
//! Provides an instrumented payload, [`Tracked`], whose constructions and
//! destructions are recorded in a shared [`Census`]. Lifetime tests hand
//! `Tracked` values to pools and owners, then assert that every value was
//! dropped exactly once and at the right moment.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

/// Lifecycle record for one tracked payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Record {
    /// The value the payload was created with.
    pub value: i64,
    /// How many times its destructor has run.
    pub drops: u32,
}

#[derive(Default)]
struct Ledger {
    /// Insertion-ordered so failure messages list payloads in creation order.
    records: IndexMap<u64, Record>,
    next_id: u64,
}

/// Shared ledger of every [`Tracked`] payload spawned from it.
///
/// Cloning a `Census` shares the ledger.
#[derive(Clone, Default)]
pub struct Census {
    ledger: Rc<RefCell<Ledger>>,
}

impl Census {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new tracked payload carrying `value`.
    pub fn spawn(&self, value: i64) -> Tracked {
        let mut ledger = self.ledger.borrow_mut();
        let id = ledger.next_id;
        ledger.next_id += 1;
        ledger.records.insert(id, Record { value, drops: 0 });
        Tracked {
            id,
            value,
            census: self.clone(),
        }
    }

    /// Number of payloads spawned so far.
    pub fn constructed(&self) -> usize {
        self.ledger.borrow().records.len()
    }

    /// Total destructor runs across all payloads.
    pub fn dropped(&self) -> usize {
        self.ledger
            .borrow()
            .records
            .values()
            .map(|r| r.drops as usize)
            .sum()
    }

    /// Payloads whose destructor has not run yet.
    pub fn live(&self) -> usize {
        self.ledger
            .borrow()
            .records
            .values()
            .filter(|r| r.drops == 0)
            .count()
    }

    /// Destructor runs recorded for the payload with `id`.
    pub fn drops_of(&self, id: u64) -> u32 {
        self.record(id).map_or(0, |r| r.drops)
    }

    /// Lifecycle record for `id`, if it was spawned from this census.
    pub fn record(&self, id: u64) -> Option<Record> {
        self.ledger.borrow().records.get(&id).copied()
    }

    /// Whether the payload with `id` has been dropped.
    pub fn is_dropped(&self, id: u64) -> bool {
        self.drops_of(id) > 0
    }

    /// Assert that no payload was ever dropped more than once.
    ///
    /// # Panics
    ///
    /// Panics listing every double-dropped payload.
    pub fn assert_no_double_drop(&self) {
        let ledger = self.ledger.borrow();
        let doubled: Vec<_> = ledger
            .records
            .iter()
            .filter(|(_, r)| r.drops > 1)
            .map(|(id, r)| (*id, *r))
            .collect();
        assert!(doubled.is_empty(), "payloads dropped more than once: {doubled:?}");
    }

    /// Assert that every payload was dropped exactly once.
    ///
    /// # Panics
    ///
    /// Panics listing every leaked or double-dropped payload.
    pub fn assert_all_dropped_once(&self) {
        let ledger = self.ledger.borrow();
        let wrong: Vec<_> = ledger
            .records
            .iter()
            .filter(|(_, r)| r.drops != 1)
            .map(|(id, r)| (*id, *r))
            .collect();
        assert!(
            wrong.is_empty(),
            "payloads not dropped exactly once (id, record): {wrong:?}"
        );
    }
}

impl fmt::Debug for Census {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Census")
            .field("constructed", &self.constructed())
            .field("dropped", &self.dropped())
            .finish()
    }
}

/// An instrumented payload that records its destruction in a [`Census`].
pub struct Tracked {
    id: u64,
    value: i64,
    census: Census,
}

impl Tracked {
    /// Ledger id of this payload.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn value(&self) -> i64 {
        self.value
    }

    pub fn set_value(&mut self, value: i64) {
        self.value = value;
    }
}

impl fmt::Debug for Tracked {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tracked")
            .field("id", &self.id)
            .field("value", &self.value)
            .finish()
    }
}

impl Drop for Tracked {
    fn drop(&mut self) {
        let mut ledger = self.census.ledger.borrow_mut();
        if let Some(record) = ledger.records.get_mut(&self.id) {
            record.drops += 1;
        }
    }
}
