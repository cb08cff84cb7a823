//! The service handle passed to actor hooks.
//!
//! There is no ambient "current scheduler": every hook receives a
//! [`Service`] explicitly and all effects an actor can have on the runtime
//! go through it. The handle borrows the scheduler for the duration of one
//! hook invocation, while the actor itself is checked out of the
//! directory, so no aliasing is possible.

use crate::actor::{Actor, ActorCore};
use crate::addr::{Addr, BoxId, PostCode};
use crate::error::Result;
use crate::infoton::Infoton;
use crate::msg::{Body, Msg, UserBody};
use crate::scheduler::Scheduler;
use crate::space::Pos;

/// Capability handle for one hook invocation on one scheduler.
#[derive(Debug)]
pub struct Service<'a> {
    pub(crate) sched: &'a mut Scheduler,
}

impl Service<'_> {
    /// Spawns an actor on this scheduler and returns its address.
    ///
    /// Fails with [`Error::ShuttingDown`](crate::Error::ShuttingDown) once
    /// shutdown has been signalled.
    pub fn spawn(&mut self, actor: Box<dyn Actor>) -> Result<Addr> {
        self.sched.spawn(actor)
    }

    /// Sends a user message from `me` to `target`.
    pub fn send(&mut self, me: &ActorCore, target: Addr, body: impl UserBody) {
        let msg = Msg::new(me.addr().clone(), target, Body::user(body));
        self.sched.deliver(msg);
    }

    /// Sends a user message and follows it with a force packet of the
    /// given energy from the sender's position.
    ///
    /// Per-link FIFO means the force is applied to the target right after
    /// the payload is dispatched: positive energy draws communication
    /// partners together, negative pushes them apart.
    pub fn send_with_energy(
        &mut self,
        me: &ActorCore,
        target: Addr,
        body: impl UserBody,
        energy: f32,
    ) {
        let sender = me.addr().clone();
        let infoton = Infoton::new(me.pos(), energy);
        self.sched
            .deliver(Msg::new(sender.clone(), target.clone(), Body::user(body)));
        self.sched
            .deliver(Msg::new(sender, target, Body::Infoton(infoton)));
    }

    /// Terminates the actor owning `me`.
    ///
    /// Enqueued as an ordinary `Die` message, so anything already sitting
    /// in the mailbox for the actor is still dispatched first; messages
    /// arriving after the despawn are dropped.
    pub fn die(&mut self, me: &ActorCore) {
        let addr = me.addr().clone();
        self.sched.deliver(Msg::new(addr.clone(), addr, Body::Die));
    }

    /// Re-targets an undeliverable original message and sends it again.
    ///
    /// Used by the default recipient-moved handling; the original sender
    /// is preserved.
    pub fn resend(&mut self, target: Addr, mut original: Msg) {
        original.target = target;
        self.sched.deliver(original);
    }

    /// Delivers a pre-built envelope as-is.
    pub fn deliver(&mut self, msg: Msg) {
        self.sched.deliver(msg);
    }

    /// The position of the scheduler this hook runs on.
    #[must_use]
    pub fn scheduler_pos(&self) -> Pos {
        self.sched.pos()
    }

    /// The postcode of the scheduler this hook runs on.
    #[must_use]
    pub fn postcode(&self) -> &PostCode {
        self.sched.postcode()
    }

    /// The distance from the scheduler past which the default policy
    /// migrates an actor.
    #[must_use]
    pub fn migration_distance(&self) -> f32 {
        self.sched.migration_distance()
    }

    /// Requests migration of the actor owning `box_id` to `to`.
    ///
    /// Honored after the current dispatch completes; a request for a
    /// non-resident box is ignored.
    pub fn request_migration(&mut self, box_id: BoxId, to: PostCode) {
        self.sched.request_migration(box_id, to);
    }

    /// Migrates `me` to the alternative scheduler nearest to its position,
    /// if one is strictly nearer than the current scheduler.
    ///
    /// Returns true if a migration was requested.
    pub fn migrate_to_nearest(&mut self, me: &ActorCore) -> bool {
        let pos = me.pos();
        let current = pos.dist(self.sched.pos());
        let Some(postcode) = self.sched.alternatives().nearest_better(pos, current) else {
            return false;
        };
        let postcode = postcode.clone();
        self.request_migration(me.addr().box_id(), postcode);
        true
    }
}
