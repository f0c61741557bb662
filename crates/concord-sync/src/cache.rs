//! Keyed, versioned cache of server-derived read models.
//!
//! The cache is the one shared mutable resource in the engine. It is
//! single-writer by construction (the facade owns it and takes `&mut
//! self`), so there are no locks; what it does enforce is the optimistic
//! mutation discipline: snapshot/restore for rollback, and a per-key
//! in-flight claim so two mutations can never interleave snapshot and
//! rollback on the same entry.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use concord_timeline::ChatItem;

use crate::models::{Invitation, Session, SessionId};

/// Key of one cached read model.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CacheKey {
    /// The session aggregate.
    Session(SessionId),
    /// The invitation read model.
    Invitation(SessionId),
    /// One raw timeline page. Index 0 is the live head page; history pages
    /// take increasing indices as they are fetched backwards.
    TimelinePage { session: SessionId, index: u32 },
}

impl CacheKey {
    /// The session this entry belongs to.
    #[must_use]
    pub fn session_id(&self) -> &SessionId {
        match self {
            Self::Session(id) | Self::Invitation(id) => id,
            Self::TimelinePage { session, .. } => session,
        }
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Session(id) => write!(f, "session:{id}"),
            Self::Invitation(id) => write!(f, "invitation:{id}"),
            Self::TimelinePage { session, index } => write!(f, "timeline:{session}:{index}"),
        }
    }
}

/// Value of one cached read model. Matched exhaustively at every consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheValue {
    Session(Session),
    Invitation(Invitation),
    Timeline(Vec<ChatItem>),
}

impl CacheValue {
    /// The session aggregate, if this is a session entry.
    #[must_use]
    pub fn as_session(&self) -> Option<&Session> {
        match self {
            Self::Session(session) => Some(session),
            Self::Invitation(_) | Self::Timeline(_) => None,
        }
    }

    /// The invitation, if this is an invitation entry.
    #[must_use]
    pub fn as_invitation(&self) -> Option<&Invitation> {
        match self {
            Self::Invitation(invitation) => Some(invitation),
            Self::Session(_) | Self::Timeline(_) => None,
        }
    }

    /// The page items, if this is a timeline entry.
    #[must_use]
    pub fn as_timeline(&self) -> Option<&[ChatItem]> {
        match self {
            Self::Timeline(items) => Some(items),
            Self::Session(_) | Self::Invitation(_) => None,
        }
    }
}

/// A cached entry: the value plus its bookkeeping.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The current (possibly speculative) value.
    pub value: CacheValue,
    /// Bumped on every write; diagnostic only.
    pub version: u64,
    /// Marked after a mutation whose server effects may have outrun this
    /// read model; the facade refetches stale entries lazily.
    pub stale: bool,
}

/// Restorable copy of the touched entries, taken before an optimistic apply.
///
/// `None` records that the key was absent, so rollback also removes entries
/// the optimistic apply created.
#[derive(Debug, Clone)]
pub struct CacheSnapshot {
    entries: Vec<(CacheKey, Option<(CacheValue, u64, bool)>)>,
}

/// The keyed cache store.
#[derive(Debug, Default)]
pub struct CacheStore {
    entries: HashMap<CacheKey, CacheEntry>,
    /// Keys held by an in-flight optimistic mutation. Tracked apart from
    /// the entries: a claim outlives entry creation and removal, so a key
    /// the optimistic apply has yet to create is held just as firmly.
    in_flight: HashSet<CacheKey>,
}

impl CacheStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get an entry.
    #[must_use]
    pub fn get(&self, key: &CacheKey) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    /// Get just the value of an entry.
    #[must_use]
    pub fn value(&self, key: &CacheKey) -> Option<&CacheValue> {
        self.entries.get(key).map(|e| &e.value)
    }

    /// Write a value, bumping the version and clearing staleness.
    pub fn insert(&mut self, key: CacheKey, value: CacheValue) {
        match self.entries.get_mut(&key) {
            Some(entry) => {
                entry.value = value;
                entry.version += 1;
                entry.stale = false;
            }
            None => {
                self.entries.insert(
                    key,
                    CacheEntry {
                        value,
                        version: 1,
                        stale: false,
                    },
                );
            }
        }
    }

    /// Mutate a value in place. Returns false when the key is absent.
    pub fn update(&mut self, key: &CacheKey, f: impl FnOnce(&mut CacheValue)) -> bool {
        match self.entries.get_mut(key) {
            Some(entry) => {
                f(&mut entry.value);
                entry.version += 1;
                entry.stale = false;
                true
            }
            None => false,
        }
    }

    /// Mark an entry as needing a background refetch.
    pub fn mark_stale(&mut self, key: &CacheKey) {
        if let Some(entry) = self.entries.get_mut(key) {
            entry.stale = true;
        }
    }

    /// Whether the entry exists and is stale.
    #[must_use]
    pub fn is_stale(&self, key: &CacheKey) -> bool {
        self.entries.get(key).is_some_and(|e| e.stale)
    }

    /// Remove every entry belonging to a session.
    pub fn evict_session(&mut self, session: &SessionId) {
        self.entries.retain(|key, _| key.session_id() != session);
    }

    /// Claim the given keys for one optimistic mutation.
    ///
    /// All-or-nothing: if any key is already claimed, nothing is claimed
    /// and the offending key is returned. A key absent from the entry map
    /// is held too — the optimistic apply may be about to create it, and a
    /// second mutation must not slip in behind that creation.
    pub fn claim(&mut self, keys: &[CacheKey]) -> std::result::Result<(), CacheKey> {
        for key in keys {
            if self.in_flight.contains(key) {
                return Err(key.clone());
            }
        }
        for key in keys {
            self.in_flight.insert(key.clone());
        }
        Ok(())
    }

    /// Release a claim taken with [`claim`](Self::claim).
    pub fn release(&mut self, keys: &[CacheKey]) {
        for key in keys {
            self.in_flight.remove(key);
        }
    }

    /// Snapshot the given keys for rollback.
    #[must_use]
    pub fn snapshot(&self, keys: &[CacheKey]) -> CacheSnapshot {
        CacheSnapshot {
            entries: keys
                .iter()
                .map(|key| {
                    let copy = self
                        .entries
                        .get(key)
                        .map(|e| (e.value.clone(), e.version, e.stale));
                    (key.clone(), copy)
                })
                .collect(),
        }
    }

    /// Restore every snapshotted entry verbatim, field for field.
    ///
    /// Keys that were absent at snapshot time are removed again, so an
    /// entry the optimistic apply created disappears on rollback. Claims
    /// live outside the entry map and are untouched here; the coordinator
    /// releases them separately.
    pub fn restore(&mut self, snapshot: CacheSnapshot) {
        for (key, copy) in snapshot.entries {
            match copy {
                Some((value, version, stale)) => {
                    self.entries.insert(
                        key,
                        CacheEntry {
                            value,
                            version,
                            stale,
                        },
                    );
                }
                None => {
                    self.entries.remove(&key);
                }
            }
        }
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
