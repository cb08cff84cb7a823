//! The actor contract.
//!
//! A user actor is a state struct that embeds an [`ActorCore`] (runtime
//! bookkeeping, opaque to user logic) and implements [`Actor`]. Handlers
//! run to completion on the owning scheduler's thread; no two handlers for
//! actors on the same scheduler ever run concurrently, so actor state
//! needs no synchronization.
//!
//! Actors never hold a reference to their scheduler. Every hook receives a
//! [`Service`] parameter for spawning, sending, and migration requests,
//! which keeps ownership acyclic: the scheduler owns the actors, full stop.

use crate::addr::Addr;
use crate::infoton::{Infoton, MigrationAlternatives};
use crate::msg::{Msg, UserBody};
use crate::scheduler::Service;
use crate::space::Pos;

/// Runtime bookkeeping carried by every actor: its address and position.
///
/// Embed one in the actor struct and return it from [`Actor::core`] /
/// [`Actor::core_mut`]. The scheduler fills it in at spawn and rewrites the
/// address on migration; user code treats the address as read-only.
#[derive(Debug, Clone)]
pub struct ActorCore {
    addr: Addr,
    pos: Pos,
}

impl ActorCore {
    /// The actor's current address. Valid from the `on_schedule` hook on.
    #[must_use]
    pub const fn addr(&self) -> &Addr {
        &self.addr
    }

    /// The actor's position in the balancing space.
    #[must_use]
    pub const fn pos(&self) -> Pos {
        self.pos
    }

    /// Mutable access to the position, for custom infoton policies.
    pub fn pos_mut(&mut self) -> &mut Pos {
        &mut self.pos
    }

    pub(crate) fn set_addr(&mut self, addr: Addr) {
        self.addr = addr;
    }

    pub(crate) fn set_pos(&mut self, pos: Pos) {
        self.pos = pos;
    }
}

impl Default for ActorCore {
    fn default() -> Self {
        Self {
            addr: Addr::null(),
            pos: Pos::ORIGIN,
        }
    }
}

/// A state-holding, message-driven entity resident on exactly one
/// scheduler at a time.
///
/// Only [`core`](Self::core), [`core_mut`](Self::core_mut) and
/// [`on_message`](Self::on_message) are mandatory. The remaining hooks
/// have defaults implementing the standard runtime policies and may be
/// overridden per actor type.
pub trait Actor: Send + 'static {
    /// Borrows the runtime core slot.
    fn core(&self) -> &ActorCore;

    /// Mutably borrows the runtime core slot.
    fn core_mut(&mut self) -> &mut ActorCore;

    /// Handles one user message. Runs to completion; panics are caught,
    /// logged, and swallowed by the scheduler (the actor stays resident,
    /// its state is the user's responsibility).
    fn on_message(&mut self, msg: Box<dyn UserBody>, svc: &mut Service<'_>);

    /// Called once the actor is installed on a scheduler: after spawn and
    /// after every migration.
    fn on_schedule(&mut self, _svc: &mut Service<'_>) {}

    /// Rewrites stored peer addresses after a recipient moved.
    ///
    /// The default recipient-moved handling calls this before resending;
    /// actors that keep addresses in their state override it and patch any
    /// field equal to `old`.
    fn update_peer(&mut self, _old: &Addr, _new: &Addr) {}

    /// Handles a recipient-moved notification.
    ///
    /// The default updates stored peers via
    /// [`update_peer`](Self::update_peer) and resends the original message
    /// to the new address. A null `new` address means routing failed
    /// outright and there is nowhere to resend.
    fn on_recipient_moved(&mut self, old: &Addr, new: &Addr, original: Msg, svc: &mut Service<'_>) {
        self.update_peer(old, new);
        if !new.is_null() {
            svc.resend(new.clone(), original);
        }
    }

    /// Applies a force packet to this actor's position.
    fn apply_infoton(&mut self, infoton: &Infoton) {
        crate::infoton::apply(self.core_mut().pos_mut(), infoton);
    }

    /// Decides whether to migrate after an infoton application.
    ///
    /// The default migrates once the actor sits further than the
    /// configured migration distance from its scheduler, toward the
    /// nearest strictly closer alternative.
    fn check_migration(&mut self, alternatives: &MigrationAlternatives, svc: &mut Service<'_>) {
        let pos = self.core().pos();
        let box_id = self.core().addr().box_id();
        let dist = pos.dist(svc.scheduler_pos());
        if dist > svc.migration_distance() {
            if let Some(postcode) = alternatives.nearest_better(pos, dist) {
                svc.request_migration(box_id, postcode.clone());
            }
        }
    }

    /// Extra state exposed to monitoring tooling.
    fn monitor_extra(&self) -> Option<serde_json::Value> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_defaults_to_null_identity() {
        let core = ActorCore::default();
        assert!(core.addr().is_null());
        assert_eq!(core.pos(), Pos::ORIGIN);
    }

    #[test]
    fn position_is_writable_for_custom_policies() {
        let mut core = ActorCore::default();
        *core.pos_mut() = Pos::new(1.0, 2.0, 3.0);
        assert_eq!(core.pos(), Pos::new(1.0, 2.0, 3.0));
    }
}
