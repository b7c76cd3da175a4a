//! Dedup and ordering of identity-bearing records across runs.
//!
//! Each run hands [`reconcile`] the current upstream batch together with the
//! state persisted by the previous run. Records whose key is not yet known
//! are stamped and folded in; the returned [`Reconciliation`] carries the
//! updated state, the ordered keys to publish and whether anything changed.
//!
//! `known` is never pruned. With [`Policy::RecencyBounded`] a separate
//! `recent` list holds the newest discoveries, most recent first, and the
//! published order is that list. With [`Policy::Unbounded`] everything in
//! `known` is published, newest observation first.
//!
//! Published entries are rebuilt from stored fields, so a record that drops
//! out of the upstream listing keeps appearing until it is evicted.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Cap on the recency list unless a source asks for another size.
pub const DEFAULT_RECENT_CAPACITY: usize = 20;

/// A source record with a stable identity.
pub trait TrackedRecord: Clone + fmt::Debug + Serialize + DeserializeOwned {
    type Key: Ord + Clone + fmt::Debug + fmt::Display + Serialize + DeserializeOwned;

    fn key(&self) -> Self::Key;

    /// A disclosure time supplied by the source. When `None` the record is
    /// stamped with the run's wall-clock time.
    fn disclosed_at(&self) -> Option<OffsetDateTime> {
        None
    }

    /// Secondary ordering for records observed at the same instant. Larger
    /// values are published first.
    fn tie_break(&self, _other: &Self) -> Ordering {
        Ordering::Equal
    }
}

/// A stored record and the time it was first observed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnownEntry<R> {
    pub record: R,
    #[serde(with = "time::serde::rfc3339")]
    pub observed: OffsetDateTime,
}

/// Persisted reconciliation state for one source.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct ReconciliationState<R: TrackedRecord> {
    #[serde(default)]
    pub known: BTreeMap<R::Key, KnownEntry<R>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recent: Vec<R::Key>,
}

impl<R: TrackedRecord> Default for ReconciliationState<R> {
    fn default() -> Self {
        Self { known: BTreeMap::new(), recent: Vec::new() }
    }
}

impl<R: TrackedRecord> ReconciliationState<R> {
    pub fn is_known(&self, key: &R::Key) -> bool {
        self.known.contains_key(key)
    }

    pub fn get(&self, key: &R::Key) -> Option<&KnownEntry<R>> {
        self.known.get(key)
    }

    /// Drops `recent` keys that are missing from `known` or repeated, then
    /// applies `capacity`. Returns the number of keys removed.
    pub fn repair(&mut self, capacity: Option<usize>) -> usize {
        let before = self.recent.len();
        let mut seen = Vec::with_capacity(before);
        let known = &self.known;

        self.recent.retain(|key| {
            if !known.contains_key(key) || seen.contains(key) {
                return false;
            }
            seen.push(key.clone());
            true
        });
        if let Some(cap) = capacity {
            self.recent.truncate(cap);
        }

        let removed = before - self.recent.len();
        if removed > 0 {
            tracing::warn!(removed, "dropped stale identities from recency list");
        }
        removed
    }
}

/// How discovered records are folded in and published.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    /// Publish the `capacity` most recently discovered records.
    RecencyBounded { capacity: usize },
    /// Publish every known record, newest observation first.
    Unbounded,
}

impl Policy {
    pub fn recency() -> Self {
        Policy::RecencyBounded { capacity: DEFAULT_RECENT_CAPACITY }
    }
}

/// Outcome of one [`reconcile`] call.
#[derive(Debug, Clone)]
pub struct Reconciliation<R: TrackedRecord> {
    pub state: ReconciliationState<R>,
    /// Keys to publish, in order.
    pub ordered: Vec<R::Key>,
    /// Keys inserted by this call, in batch order.
    pub discovered: Vec<R::Key>,
    /// True iff at least one key was inserted.
    pub changed: bool,
}

impl<R: TrackedRecord> Reconciliation<R> {
    /// The published entries in order.
    pub fn entries(&self) -> impl Iterator<Item = &KnownEntry<R>> + '_ {
        self.ordered.iter().filter_map(|key| self.state.known.get(key))
    }
}

/// Folds `batch` into `state` under `policy`.
///
/// New records are stamped with their [`TrackedRecord::disclosed_at`] time or
/// with `now`. Records already known keep their stored fields and time;
/// repeated keys inside one batch count once.
pub fn reconcile<R, I>(batch: I, mut state: ReconciliationState<R>, policy: Policy, now: OffsetDateTime) -> Reconciliation<R>
where
    R: TrackedRecord,
    I: IntoIterator<Item = R>,
{
    let capacity = match policy {
        Policy::RecencyBounded { capacity } => Some(capacity),
        Policy::Unbounded => None,
    };
    state.repair(capacity);

    let mut discovered = Vec::new();
    for record in batch {
        let key = record.key();
        if state.known.contains_key(&key) {
            continue;
        }

        let observed = record.disclosed_at().unwrap_or(now);
        tracing::info!(key = %key, "discovered new record");
        state.known.insert(key.clone(), KnownEntry { record, observed });

        if let Some(cap) = capacity {
            state.recent.insert(0, key.clone());
            state.recent.truncate(cap);
        }
        discovered.push(key);
    }

    let ordered = match policy {
        Policy::RecencyBounded { .. } => state.recent.clone(),
        Policy::Unbounded => newest_first(&state),
    };
    let changed = !discovered.is_empty();

    Reconciliation { state, ordered, discovered, changed }
}

fn newest_first<R: TrackedRecord>(state: &ReconciliationState<R>) -> Vec<R::Key> {
    let mut entries: Vec<(&R::Key, &KnownEntry<R>)> = state.known.iter().collect();
    entries.sort_by(|(ka, a), (kb, b)| {
        b.observed.cmp(&a.observed).then_with(|| b.record.tie_break(&a.record)).then_with(|| kb.cmp(ka))
    });
    entries.into_iter().map(|(key, _)| key.clone()).collect()
}
