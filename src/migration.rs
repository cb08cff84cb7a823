//! Moving actors between schedulers.
//!
//! Migration is a four-step protocol between a source scheduler S and a
//! destination D:
//!
//! 1. S removes the actor from its directory and installs a forwarding
//!    entry from the old box to the actor's address on D (the box is
//!    globally unique, so it survives the move).
//! 2. S wraps the actor in a [`MigrationEnvelope`] and routes it to D as a
//!    scheduler control message over the ordinary cross-thread path.
//! 3. D installs the actor under its own postcode on drain and re-runs the
//!    `on_schedule` hooks.
//! 4. Messages reaching S for the departed box earn the sender a
//!    `RecipientMoved` notification carrying the original message; the
//!    default handler resends it to the new address.
//!
//! If routing to D fails, S reinserts the actor and removes the forwarding
//! entry; the migration never becomes observable.

use core::fmt;

use crate::actor::Actor;
use crate::addr::Addr;

/// A migrating actor in transit between two schedulers.
///
/// Carries the boxed actor state itself; source and destination share one
/// process, so no packaging beyond the move is needed.
pub struct MigrationEnvelope {
    actor: Box<dyn Actor>,
    to: Addr,
}

impl MigrationEnvelope {
    /// Wraps an actor for transfer; `to` is its address on the destination.
    #[must_use]
    pub fn new(actor: Box<dyn Actor>, to: Addr) -> Self {
        Self { actor, to }
    }

    /// The address the actor will occupy on the destination scheduler.
    #[must_use]
    pub const fn to(&self) -> &Addr {
        &self.to
    }

    /// Unwraps the envelope for installation.
    #[must_use]
    pub fn into_parts(self) -> (Box<dyn Actor>, Addr) {
        (self.actor, self.to)
    }
}

impl fmt::Debug for MigrationEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MigrationEnvelope")
            .field("to", &self.to)
            .field("pos", &self.actor.core().pos())
            .finish_non_exhaustive()
    }
}
