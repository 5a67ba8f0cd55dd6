use std::sync::{Arc, PoisonError, RwLock};

/// Values that carry a monotonically increasing sequence number.
pub trait Sequenced {
    fn sequence(&self) -> u64;
}

/// Single-value mailbox holding the most recently published item.
///
/// Publishing swaps an `Arc` under a short write lock; reading clones the
/// `Arc` under a read lock. Neither side holds the lock while doing any other
/// work, so readers always observe a fully built value and a slow reader
/// never stalls the producer beyond one pointer swap.
///
/// The slot only moves forward: a value whose sequence is not strictly newer
/// than the current one is rejected, so every reader sees values in
/// production order and never goes back in time.
pub struct LatestSlot<T> {
    current: RwLock<Option<Arc<T>>>,
}

impl<T: Sequenced> LatestSlot<T> {
    pub fn new() -> Self {
        Self {
            current: RwLock::new(None),
        }
    }

    /// Publishes `value` if it is newer than the current one.
    ///
    /// Returns the shared handle when accepted, `None` when the value was
    /// stale and dropped.
    pub fn publish(&self, value: T) -> Option<Arc<T>> {
        self.publish_arc(Arc::new(value))
    }

    pub fn publish_arc(&self, value: Arc<T>) -> Option<Arc<T>> {
        // A poisoned slot still holds a complete value: publication is a
        // single assignment, so recover the guard instead of propagating.
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = guard.as_ref() {
            if value.sequence() <= existing.sequence() {
                return None;
            }
        }
        *guard = Some(value.clone());
        Some(value)
    }

    /// The latest published value, or `None` before the first publish.
    pub fn latest(&self) -> Option<Arc<T>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn latest_sequence(&self) -> Option<u64> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|v| v.sequence())
    }
}

impl<T: Sequenced> Default for LatestSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}
