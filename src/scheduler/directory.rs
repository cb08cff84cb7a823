//! The per-scheduler actor directory.
//!
//! Maps resident boxes to their actors, and departed boxes to the address
//! the actor migrated to. Residents are taken out of the map for the
//! duration of their dispatch, which gives the handler exclusive access to
//! the actor while the scheduler stays borrowable for the service calls
//! the handler makes.
//!
//! Forwarding entries persist for the scheduler's lifetime; that keeps the
//! recipient-moved guarantee intact for any number of stale address
//! holders at the cost of one map entry per departed actor.

use std::collections::HashMap;

use crate::actor::Actor;
use crate::addr::{Addr, BoxId};

/// Resident actors plus forwarding addresses for departed ones.
#[derive(Default)]
pub struct Directory {
    residents: HashMap<BoxId, Box<dyn Actor>>,
    forwards: HashMap<BoxId, Addr>,
}

impl Directory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs an actor under its box.
    pub fn insert(&mut self, box_id: BoxId, actor: Box<dyn Actor>) {
        self.residents.insert(box_id, actor);
    }

    /// Takes an actor out for dispatch or migration.
    pub fn take(&mut self, box_id: BoxId) -> Option<Box<dyn Actor>> {
        self.residents.remove(&box_id)
    }

    /// Returns true if the box is resident.
    #[must_use]
    pub fn contains(&self, box_id: BoxId) -> bool {
        self.residents.contains_key(&box_id)
    }

    /// Number of resident actors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.residents.len()
    }

    /// Returns true if no actors are resident.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.residents.is_empty()
    }

    /// The resident boxes, snapshotted.
    #[must_use]
    pub fn boxes(&self) -> Vec<BoxId> {
        self.residents.keys().copied().collect()
    }

    /// Iterates over resident actors.
    pub fn actors(&self) -> impl Iterator<Item = (BoxId, &dyn Actor)> {
        self.residents
            .iter()
            .map(|(box_id, actor)| (*box_id, actor.as_ref()))
    }

    /// Records where a departed box's actor lives now.
    pub fn add_forward(&mut self, box_id: BoxId, to: Addr) {
        self.forwards.insert(box_id, to);
    }

    /// Drops a forwarding entry (migration abort).
    pub fn remove_forward(&mut self, box_id: BoxId) {
        self.forwards.remove(&box_id);
    }

    /// Looks up the forwarding address for a departed box.
    #[must_use]
    pub fn forward_for(&self, box_id: BoxId) -> Option<&Addr> {
        self.forwards.get(&box_id)
    }
}

impl core::fmt::Debug for Directory {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Directory")
            .field("residents", &self.residents.len())
            .field("forwards", &self.forwards.len())
            .finish()
    }
}
