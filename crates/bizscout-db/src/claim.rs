//! Cross-process run claims.
//!
//! A task run holds a [`RunClaim`] keyed by the task's `correlation_id` for as
//! long as it executes, so a CLI run, a scheduled firing and an API run-now of
//! the same task never overlap even when they live in different processes.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::DbError;

/// Exclusive right to execute one task. Released on drop.
pub struct RunClaim {
    correlation_id: Uuid,
    held: Option<Held>,
}

enum Held {
    /// Open transaction holding `pg_try_advisory_xact_lock`; ending it frees the lock.
    Postgres(Transaction<'static, Postgres>),
    Memory(Arc<Mutex<HashSet<Uuid>>>),
}

impl std::fmt::Debug for RunClaim {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let backend = match self.held {
            Some(Held::Postgres(_)) => "postgres",
            Some(Held::Memory(_)) => "memory",
            None => "released",
        };
        f.debug_struct("RunClaim")
            .field("correlation_id", &self.correlation_id)
            .field("backend", &backend)
            .finish()
    }
}

impl RunClaim {
    #[must_use]
    pub fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    /// Release the claim now instead of waiting for the pooled connection to
    /// flush the rollback queued by drop.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlx`] if the rollback fails. The lock is released
    /// with the connection either way.
    pub async fn release(mut self) -> Result<(), DbError> {
        match self.held.take() {
            Some(Held::Postgres(tx)) => tx.rollback().await.map_err(DbError::from),
            Some(Held::Memory(claims)) => {
                forget(&claims, self.correlation_id);
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// Claim `correlation_id` in an in-process set shared by one store.
    pub(crate) fn in_memory(
        claims: &Arc<Mutex<HashSet<Uuid>>>,
        correlation_id: Uuid,
    ) -> Option<Self> {
        let inserted = claims
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(correlation_id);
        inserted.then(|| Self {
            correlation_id,
            held: Some(Held::Memory(Arc::clone(claims))),
        })
    }
}

impl Drop for RunClaim {
    fn drop(&mut self) {
        // Postgres claims end with their transaction.
        if let Some(Held::Memory(claims)) = &self.held {
            forget(claims, self.correlation_id);
        }
    }
}

fn forget(claims: &Mutex<HashSet<Uuid>>, correlation_id: Uuid) {
    claims
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .remove(&correlation_id);
}

/// Advisory lock key for a task: the two halves of the UUID folded together.
#[must_use]
pub fn advisory_key(correlation_id: Uuid) -> i64 {
    let (high, low) = correlation_id.as_u64_pair();
    i64::from_be_bytes((high ^ low).to_be_bytes())
}

/// Try to take the run claim for `correlation_id` without waiting.
///
/// Returns `Ok(None)` when another session already holds it. The returned
/// claim keeps one pooled connection checked out until it is released.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if a connection cannot be acquired or the lock
/// query fails.
pub async fn try_claim_run(
    pool: &PgPool,
    correlation_id: Uuid,
) -> Result<Option<RunClaim>, DbError> {
    let mut tx = pool.begin().await?;
    let acquired: bool = sqlx::query_scalar("SELECT pg_try_advisory_xact_lock($1)")
        .bind(advisory_key(correlation_id))
        .fetch_one(&mut *tx)
        .await?;

    if !acquired {
        tx.rollback().await?;
        return Ok(None);
    }
    Ok(Some(RunClaim {
        correlation_id,
        held: Some(Held::Postgres(tx)),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advisory_key_is_stable_per_task() {
        let id = Uuid::from_u128(0x0000_0000_0000_0001_0000_0000_0000_0003);
        assert_eq!(advisory_key(id), 2);
        assert_eq!(advisory_key(id), advisory_key(id));
        assert_ne!(advisory_key(id), advisory_key(Uuid::from_u128(7)));
    }

    #[test]
    fn memory_claim_is_exclusive_until_dropped() {
        let claims = Arc::new(Mutex::new(HashSet::new()));
        let id = Uuid::new_v4();

        let first = RunClaim::in_memory(&claims, id).expect("first claim");
        assert!(RunClaim::in_memory(&claims, id).is_none());
        assert!(RunClaim::in_memory(&claims, Uuid::new_v4()).is_some());

        drop(first);
        assert!(RunClaim::in_memory(&claims, id).is_some());
    }

    #[tokio::test]
    async fn memory_claim_release_frees_the_key() {
        let claims = Arc::new(Mutex::new(HashSet::new()));
        let id = Uuid::new_v4();

        let claim = RunClaim::in_memory(&claims, id).expect("claim");
        assert_eq!(claim.correlation_id(), id);
        claim.release().await.expect("release");
        assert!(claims.lock().unwrap().is_empty());
    }
}
