//! Reusable fixtures for ordering-sensitive lifetime tests.
//!
//! - [`drop_in_order`] drops a batch of values following a permutation.
//! - [`arb_permutation`] is the proptest strategy that generates one.

use proptest::prelude::*;

/// Drop every value in `items`, in the order given by `order`.
///
/// `order` must be a permutation of `0..items.len()`.
///
/// # Panics
///
/// Panics if `order` is not such a permutation.
pub fn drop_in_order<T>(items: Vec<T>, order: &[usize]) {
    assert_eq!(order.len(), items.len(), "order must cover every item");
    let mut slots: Vec<Option<T>> = items.into_iter().map(Some).collect();
    for &index in order {
        let item = slots[index]
            .take()
            .unwrap_or_else(|| panic!("index {index} appears twice in drop order"));
        drop(item);
    }
}

/// Strategy producing a random permutation of `0..len`.
pub fn arb_permutation(len: usize) -> impl Strategy<Value = Vec<usize>> {
    Just((0..len).collect::<Vec<_>>()).prop_shuffle()
}
