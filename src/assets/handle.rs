//! Shared, reference-counted asset handles
//!
//! Materials and textures are created once at load time and then shared by
//! every part and instance that uses them. A handle is a cheap clone of an
//! `Arc` plus a process-unique id the GPU side uses as a cache key.

use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Global counter for generating unique asset IDs
static NEXT_ASSET_ID: AtomicU64 = AtomicU64::new(1);

fn next_id() -> u64 {
    NEXT_ASSET_ID.fetch_add(1, Ordering::Relaxed)
}

/// An immutable, shared asset of type `T`
#[derive(Debug)]
pub struct Handle<T> {
    id: u64,
    inner: Arc<T>,
}

impl<T> Handle<T> {
    /// Wrap a value in a new handle with a fresh id
    #[must_use]
    pub fn new(value: T) -> Self {
        Self {
            id: next_id(),
            inner: Arc::new(value),
        }
    }

    /// Unique id of this asset
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Number of live handles to this asset
    #[must_use]
    pub fn share_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for Handle<T> {}

impl<T> Hash for Handle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl<T> std::ops::Deref for Handle<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_identity() {
        let handle = Handle::new(7_u32);
        let other = handle.clone();

        assert_eq!(handle, other);
        assert_eq!(*other, 7);
        assert_eq!(handle.share_count(), 2);
    }

    #[test]
    fn test_equal_values_are_distinct_assets() {
        let a = Handle::new("white");
        let b = Handle::new("white");
        assert_ne!(a, b);
        assert_ne!(a.id(), b.id());
    }
}
