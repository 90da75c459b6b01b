//! Multi-space reconciliation.
//!
//! Several spaces may hold an object with the same id (mirrors, caches).
//! [`SpaceReconciler`] picks exactly one authoritative space per id:
//!
//! 1. every space lists its ids concurrently;
//! 2. ids claimed by a single space are assigned without further I/O;
//! 3. for ids claimed by several spaces, each claimant's record is read
//!    concurrently and the greatest `persisted` timestamp wins, ties going
//!    to the claimant listed first;
//! 4. both sets merge into one [`SpaceMap`].
//!
//! A space that fails to list (or is unknown to its backend) contributes
//! nothing: its ids are left out and the space is recorded as a gap.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use futures_util::future::join_all;
use tracing::{debug, warn};

use crate::persistence::{PersistedRecord, PersistenceService};

/// A named space and the backend that serves it.
#[derive(Clone)]
pub struct Space {
    pub name: String,
    pub service: Arc<dyn PersistenceService>,
}

impl Space {
    pub fn new(name: impl Into<String>, service: Arc<dyn PersistenceService>) -> Self {
        Space {
            name: name.into(),
            service,
        }
    }
}

impl fmt::Debug for Space {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Space").field("name", &self.name).finish()
    }
}

/// The authoritative id → space table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpaceMap {
    spaces: Vec<String>,
    assignments: HashMap<String, String>,
    conflicts: usize,
    gaps: Vec<String>,
}

impl SpaceMap {
    pub fn get(&self, id: &str) -> Option<&str> {
        self.assignments.get(id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.assignments
            .iter()
            .map(|(id, space)| (id.as_str(), space.as_str()))
    }

    /// Spaces that took part, in the order given.
    pub fn spaces(&self) -> &[String] {
        &self.spaces
    }

    /// Number of ids that were claimed by more than one space.
    pub fn conflicts(&self) -> usize {
        self.conflicts
    }

    /// Spaces whose listing failed and whose ids are therefore absent.
    pub fn gaps(&self) -> &[String] {
        &self.gaps
    }
}

pub struct SpaceReconciler {
    spaces: Vec<Space>,
}

impl SpaceReconciler {
    pub fn new(spaces: Vec<Space>) -> Self {
        SpaceReconciler { spaces }
    }

    pub async fn reconcile(&self) -> SpaceMap {
        let mut map = SpaceMap {
            spaces: self.spaces.iter().map(|space| space.name.clone()).collect(),
            ..SpaceMap::default()
        };

        // id -> indices of claiming spaces, in space order
        let mut claims: HashMap<String, Vec<usize>> = HashMap::new();
        let mut first_seen: Vec<String> = Vec::new();

        let listings = join_all(
            self.spaces
                .iter()
                .map(|space| space.service.list_objects(&space.name)),
        )
        .await;

        for (index, (space, listing)) in self.spaces.iter().zip(listings).enumerate() {
            let ids = match listing {
                Ok(Some(ids)) => ids,
                Ok(None) => {
                    warn!(space = %space.name, "space unknown to its backend; its objects are not reconciled");
                    map.gaps.push(space.name.clone());
                    continue;
                }
                Err(err) => {
                    warn!(space = %space.name, error = %err, "listing failed; its objects are not reconciled");
                    map.gaps.push(space.name.clone());
                    continue;
                }
            };
            for id in ids {
                let claimants = claims.entry(id.clone()).or_insert_with(|| {
                    first_seen.push(id);
                    Vec::new()
                });
                claimants.push(index);
            }
        }

        let mut conflicting = Vec::new();
        for id in first_seen {
            let claimants = claims.remove(&id).unwrap_or_default();
            match claimants.as_slice() {
                [only] => {
                    map.assignments.insert(id, self.spaces[*only].name.clone());
                }
                _ => conflicting.push((id, claimants)),
            }
        }

        map.conflicts = conflicting.len();
        let resolved = join_all(
            conflicting
                .iter()
                .map(|(id, claimants)| self.resolve_conflict(id, claimants)),
        )
        .await;

        for ((id, _), winner) in conflicting.into_iter().zip(resolved) {
            match winner {
                Some(index) => {
                    let space = self.spaces[index].name.clone();
                    debug!(%id, %space, "conflict resolved");
                    map.assignments.insert(id, space);
                }
                None => warn!(%id, "no claiming space could produce a record; id left unmapped"),
            }
        }

        map
    }

    /// Index of the claimant whose record has the greatest `persisted`.
    async fn resolve_conflict(&self, id: &str, claimants: &[usize]) -> Option<usize> {
        let records = join_all(claimants.iter().map(|&index| {
            let space = &self.spaces[index];
            space.service.read_record(&space.name, id)
        }))
        .await;

        let mut best: Option<(usize, Option<i64>)> = None;
        for (&index, record) in claimants.iter().zip(records) {
            let persisted = match record {
                Ok(Some(PersistedRecord { persisted, .. })) => persisted,
                Ok(None) => continue,
                Err(err) => {
                    warn!(%id, space = %self.spaces[index].name, error = %err, "could not read conflicting record");
                    continue;
                }
            };
            // Strictly greater: on a tie the earlier claimant keeps the id.
            if best.map_or(true, |(_, current)| persisted > current) {
                best = Some((index, persisted));
            }
        }
        best.map(|(index, _)| index)
    }
}
