use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use uuid::Uuid;

/// Per-key execution lock. At most one holder per key; contenders are refused
/// rather than queued.
#[derive(Debug, Clone, Default)]
pub(crate) struct RunLocks {
    held: Arc<Mutex<HashSet<Uuid>>>,
}

impl RunLocks {
    /// Take the lock for `key`, or `None` if a run for it is in flight.
    pub(crate) fn try_acquire(&self, key: Uuid) -> Option<RunGuard> {
        let inserted = self
            .held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key);
        inserted.then(|| RunGuard {
            locks: self.clone(),
            key,
        })
    }

    #[cfg(test)]
    pub(crate) fn is_held(&self, key: Uuid) -> bool {
        self.held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&key)
    }
}

/// Releases its key on drop, including when the owning future is cancelled.
#[derive(Debug)]
pub(crate) struct RunGuard {
    locks: RunLocks,
    key: Uuid,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.locks
            .held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_is_refused_until_release() {
        let locks = RunLocks::default();
        let key = Uuid::new_v4();

        let guard = locks.try_acquire(key).expect("first acquire");
        assert!(locks.try_acquire(key).is_none());
        assert!(locks.is_held(key));

        drop(guard);
        assert!(!locks.is_held(key));
        assert!(locks.try_acquire(key).is_some());
    }

    #[test]
    fn keys_are_independent() {
        let locks = RunLocks::default();
        let _a = locks.try_acquire(Uuid::new_v4()).expect("a");
        assert!(locks.try_acquire(Uuid::new_v4()).is_some());
    }
}
