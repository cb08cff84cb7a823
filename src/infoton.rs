//! Force packets and the default spatial balancing policy.
//!
//! An infoton is a small force applied to an actor's position. Positive
//! energy attracts the actor toward the source, negative energy repels it.
//! The default scheduler policy emits one infoton after every dispatched
//! message: under-loaded schedulers pull their actors in, over-loaded ones
//! push them out. Once an actor has drifted far enough from its scheduler,
//! the migration check hands it to the nearest closer peer.

use serde::{Deserialize, Serialize};

use crate::addr::PostCode;
use crate::space::Pos;

/// Attraction radius: a positive-energy infoton closer than this is a
/// no-op, so actors settle near their targets instead of oscillating.
pub const TARGET_DISTANCE: f32 = 4.0;

/// Energy per actor of load imbalance in the default scheduler policy.
pub const LOAD_ENERGY_QUANTUM: f32 = 2e-3;

/// A force packet: a source position and a signed energy.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Infoton {
    /// Where the force originates.
    pub source: Pos,
    /// Signed magnitude; positive attracts toward `source`, negative repels.
    pub energy: f32,
}

impl Infoton {
    /// Creates a force packet.
    #[must_use]
    pub const fn new(source: Pos, energy: f32) -> Self {
        Self { source, energy }
    }
}

/// Applies a force packet to a position.
///
/// No-op when the distance to the source is zero (the direction is
/// undefined) and when a positive-energy packet is already inside
/// [`TARGET_DISTANCE`].
pub fn apply(pos: &mut Pos, infoton: &Infoton) {
    let diff = infoton.source - *pos;
    let difflen = diff.norm();
    if difflen == 0.0 {
        return;
    }
    if infoton.energy > 0.0 && difflen < TARGET_DISTANCE {
        return;
    }
    *pos += diff / difflen * infoton.energy;
}

/// The default per-dispatch scheduler energy: proportional to how far the
/// scheduler is under (positive) or over (negative) its actor target.
#[must_use]
pub fn scheduler_energy(actor_target: usize, actor_count: usize) -> f32 {
    (actor_target as f32 - actor_count as f32) * LOAD_ENERGY_QUANTUM
}

/// The peer schedulers an actor may migrate to, with their positions.
///
/// Built once at host startup from the full scheduler list; each scheduler
/// keeps its own copy with itself excluded.
#[derive(Debug, Clone, Default)]
pub struct MigrationAlternatives {
    peers: Vec<(PostCode, Pos)>,
}

impl MigrationAlternatives {
    /// Creates the alternative set from peer postcodes and positions.
    #[must_use]
    pub fn new(peers: Vec<(PostCode, Pos)>) -> Self {
        Self { peers }
    }

    /// Returns true if there is nowhere to migrate.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// The nearest peer strictly closer to `pos` than `current_dist`.
    #[must_use]
    pub fn nearest_better(&self, pos: Pos, current_dist: f32) -> Option<&PostCode> {
        let mut best: Option<(&PostCode, f32)> = None;
        for (postcode, peer_pos) in &self.peers {
            let d = pos.dist(*peer_pos);
            if d < current_dist && best.map_or(true, |(_, bd)| d < bd) {
                best = Some((postcode, d));
            }
        }
        best.map(|(postcode, _)| postcode)
    }
}
