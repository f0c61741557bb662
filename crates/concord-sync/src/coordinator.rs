//! The optimistic mutation coordinator.
//!
//! One protocol for every cache-first write:
//!
//! 1. **Claim** the touched entries (a second mutation against a claimed
//!    entry is rejected with [`Error::MutationInFlight`], so two mutations
//!    can never interleave snapshot/rollback on the same entry).
//! 2. **Snapshot** the touched entries.
//! 3. **Optimistic apply** — synchronous, before any suspension.
//! 4. **Dispatch** to the server (the only await).
//! 5. **Reconcile** the authoritative response, then mark only the
//!    non-safety-critical read models stale.
//! 6. On any failure, **rollback**: restore every snapshotted entry
//!    verbatim, then re-surface the error. Never a partial rollback, never
//!    a silent retry.

use tracing::{debug, warn};

use crate::cache::CacheStore;
use crate::error::{Error, Result};
use crate::intent::MutationIntent;
use crate::source::{DataSource, MutationResponse};

/// Apply one mutation through the cache-first protocol.
///
/// On success the cache holds the reconciled, authoritative state; on any
/// error it holds exactly the pre-mutation state and the error is returned
/// for the caller's user-facing handling.
pub async fn apply_mutation<D: DataSource>(
    source: &mut D,
    cache: &mut CacheStore,
    intent: &MutationIntent,
    now_ms: u64,
) -> Result<MutationResponse> {
    let keys = intent.touched_keys();
    cache
        .claim(&keys)
        .map_err(|key| Error::MutationInFlight { key })?;

    let snapshot = cache.snapshot(&keys);

    if let Err(err) = intent.apply_optimistic(cache, now_ms) {
        // An application error after partial optimistic writes rolls back
        // every touched entry, not just the ones written so far.
        cache.restore(snapshot);
        cache.release(&keys);
        return Err(err);
    }

    debug!(endpoint = ?intent.endpoint(), session = %intent.session_id(), "dispatching mutation");
    let outcome = source.send_mutation(intent.endpoint(), intent.payload()).await;

    let result = match outcome {
        Ok(response) => {
            // Re-reads the live entries; nothing captured before the await
            // is written back blindly.
            intent.reconcile(cache, &response);
            for key in intent.stale_keys() {
                cache.mark_stale(&key);
            }
            Ok(response)
        }
        Err(err) => {
            warn!(
                endpoint = ?intent.endpoint(),
                session = %intent.session_id(),
                error = %err,
                "mutation failed, rolling back optimistic writes"
            );
            cache.restore(snapshot);
            Err(err.into())
        }
    };

    cache.release(&keys);
    result
}
