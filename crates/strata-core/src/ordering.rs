//! Deterministic name ordering for topics and channels.
//!
//! Registries are hash maps with no defined iteration order, so every level
//! that is reported by name is sorted ascending by the raw bytes of the name
//! before traversal. Clients are reported in connection order and are never
//! passed through here.

use std::sync::Arc;

/// An entity addressed by a name that is unique among its siblings.
pub trait Named {
    fn name(&self) -> &str;
}

/// Sort ascending by byte-wise name comparison.
pub fn sort_by_name<T: Named + ?Sized>(items: &mut [Arc<T>]) {
    items.sort_unstable_by(|a, b| a.name().as_bytes().cmp(b.name().as_bytes()));
}

/// Copy references out of a registry and sort them.
pub(crate) fn sorted_by_name<'a, T, I>(items: I) -> Vec<Arc<T>>
where
    T: Named + 'a,
    I: IntoIterator<Item = &'a Arc<T>>,
{
    let mut copied: Vec<Arc<T>> = items.into_iter().cloned().collect();
    sort_by_name(&mut copied);
    copied
}
