//! The per-thread cooperative scheduler.
//!
//! A scheduler owns a set of actors and runs their message handlers
//! sequentially on one OS thread. The loop alternates between popping one
//! mailbox message, dispatching it, applying the post-dispatch infoton and
//! migration check, and draining a bounded batch from the cross-thread
//! inbound queue.
//!
//! During a dispatch the target actor is checked out of the directory, so
//! the handler holds the only reference to it while the scheduler remains
//! free to serve the [`Service`] calls the handler makes. Everything the
//! loop touches is thread-local except the inbound queue, which the post
//! office guards.
//!
//! - [`directory`]: resident actors and forwarding entries
//! - [`service`]: the capability handle passed to actor hooks

pub mod directory;
pub mod service;

use std::mem;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use serde_json::json;

use crate::actor::{Actor, ActorCore};
use crate::addr::{Addr, BoxId, PostCode};
use crate::error::{Error, Result};
use crate::infoton::{self, Infoton, MigrationAlternatives};
use crate::mailbox::Mailbox;
use crate::migration::MigrationEnvelope;
use crate::msg::{Body, Msg};
use crate::plugin::{PluginStack, SchedulerInfo, SchedulerPlugin};
use crate::positioning::{Positioner, DEFAULT_VIEW_SIZE};
use crate::postoffice::{Inbound, PostOffice, DEFAULT_INBOUND_CAPACITY};
use crate::space::Pos;
use crate::tracing_compat::{debug, info, warn};
use crate::util::DetRng;

pub use directory::Directory;
pub use service::Service;

/// How many loop iterations pass between forced inbound drains while the
/// mailbox stays busy. An empty mailbox always triggers a drain.
const DRAIN_CHECK_INTERVAL: u64 = 10;

/// Idle iterations before an `exit_when_done` loop concludes no more work
/// is coming.
const IDLE_EXIT_STREAK: u32 = 64;

/// Idle iterations spent yielding before falling back to short sleeps.
const SPIN_YIELDS: u32 = 64;

/// Sleep length once spinning has not produced work.
const IDLE_SLEEP: Duration = Duration::from_micros(100);

/// Default actor count a scheduler attracts toward.
pub const DEFAULT_ACTOR_TARGET: usize = 100;

/// Default distance from the scheduler past which actors migrate.
pub const DEFAULT_MIGRATION_DISTANCE: f32 = 700.0;

/// Tunables shared by every scheduler of a host.
#[derive(Debug, Clone)]
pub struct SchedulerOptions {
    /// Actor count the default infoton policy steers toward.
    pub actor_target: usize,
    /// Edge length of the view cube used by the positioner.
    pub view_size: f32,
    /// Distance from the scheduler past which the default policy migrates.
    pub migration_distance: f32,
    /// Coupling constant scaling every scheduler-emitted infoton energy.
    pub coupling: f32,
    /// Capacity of the cross-thread inbound queue.
    pub inbound_capacity: usize,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            actor_target: DEFAULT_ACTOR_TARGET,
            view_size: DEFAULT_VIEW_SIZE,
            migration_distance: DEFAULT_MIGRATION_DISTANCE,
            coupling: 1.0,
            inbound_capacity: DEFAULT_INBOUND_CAPACITY,
        }
    }
}

/// A peer scheduler as seen during host wiring.
#[derive(Debug, Clone)]
pub struct PeerInfo {
    /// The peer's postcode.
    pub postcode: PostCode,
    /// Handle to the peer's inbound queue.
    pub inbound: Arc<Inbound>,
    /// The peer's position, for migration alternatives.
    pub pos: Pos,
}

/// Counters exposed for monitoring and tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct SchedulerStats {
    /// Messages dispatched from the mailbox.
    pub dispatched: u64,
    /// Actors spawned here.
    pub spawned: u64,
    /// Actors despawned by `Die`.
    pub died: u64,
    /// Actors received through migration.
    pub migrations_in: u64,
    /// Actors handed away through migration.
    pub migrations_out: u64,
    /// User handlers that panicked and were swallowed.
    pub handler_panics: u64,
    /// Messages dropped for want of a recipient or a reply path.
    pub dropped: u64,
}

/// A single-threaded executor owning a set of actors.
#[derive(Debug)]
pub struct Scheduler {
    postcode: PostCode,
    pos: Pos,
    mailbox: Mailbox,
    directory: Directory,
    post: PostOffice,
    plugins: PluginStack,
    alternatives: MigrationAlternatives,
    positioner: Positioner,
    actor_target: usize,
    migration_distance: f32,
    coupling: f32,
    is_zygote: bool,
    roots: Vec<PostCode>,
    rng: DetRng,
    next_seq: u64,
    shutdown: Arc<AtomicBool>,
    shutting_down: bool,
    pending_migration: Option<(BoxId, PostCode)>,
    scratch: Vec<Msg>,
    stats: SchedulerStats,
}

impl Scheduler {
    /// Creates a scheduler at the given postcode and position.
    ///
    /// The zygote is the designated root scheduler of the host; it anchors
    /// the space and receives the initial root actors.
    #[must_use]
    pub fn new(
        postcode: PostCode,
        pos: Pos,
        plugins: Vec<Box<dyn SchedulerPlugin>>,
        options: &SchedulerOptions,
        is_zygote: bool,
    ) -> Self {
        let seed = crate::positioning::str_seed(postcode.host()) ^ u64::from(postcode.port());
        let post = PostOffice::new(postcode.clone(), options.inbound_capacity);
        let mut plugins = PluginStack::new(plugins);
        plugins.setup(&SchedulerInfo {
            postcode: &postcode,
            pos,
            actor_count: 0,
            actor_target: options.actor_target,
        });
        Self {
            postcode,
            pos,
            mailbox: Mailbox::new(),
            directory: Directory::new(),
            post,
            plugins,
            alternatives: MigrationAlternatives::default(),
            positioner: Positioner::new(options.view_size),
            actor_target: options.actor_target,
            migration_distance: options.migration_distance,
            coupling: options.coupling,
            is_zygote,
            roots: Vec::new(),
            rng: DetRng::new(seed),
            next_seq: 0,
            shutdown: Arc::new(AtomicBool::new(false)),
            shutting_down: false,
            pending_migration: None,
            scratch: Vec::new(),
            stats: SchedulerStats::default(),
        }
    }

    /// The scheduler's postcode.
    #[must_use]
    pub const fn postcode(&self) -> &PostCode {
        &self.postcode
    }

    /// The scheduler's position.
    #[must_use]
    pub const fn pos(&self) -> Pos {
        self.pos
    }

    /// Number of resident actors.
    #[must_use]
    pub fn actor_count(&self) -> usize {
        self.directory.len()
    }

    /// Counter snapshot.
    #[must_use]
    pub const fn stats(&self) -> SchedulerStats {
        self.stats
    }

    /// True if this is the host's designated root scheduler.
    #[must_use]
    pub const fn is_zygote(&self) -> bool {
        self.is_zygote
    }

    /// The configured migration distance.
    #[must_use]
    pub const fn migration_distance(&self) -> f32 {
        self.migration_distance
    }

    /// The migration alternatives wired at startup.
    #[must_use]
    pub const fn alternatives(&self) -> &MigrationAlternatives {
        &self.alternatives
    }

    /// Handle to the cross-thread inbound queue, for peers and the host.
    #[must_use]
    pub fn inbound(&self) -> Arc<Inbound> {
        self.post.inbound()
    }

    /// The flag a controller sets to stop this scheduler.
    #[must_use]
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Wires the peer schedulers of the host.
    ///
    /// Idempotent; the own postcode is skipped. If this scheduler is not
    /// the zygote and knows no cluster root yet, the first peer is
    /// declared root via a self-addressed control message.
    pub fn add_peers(&mut self, peers: &[PeerInfo]) {
        self.post.add_peers(
            peers
                .iter()
                .map(|peer| (peer.postcode.clone(), Arc::clone(&peer.inbound))),
        );
        self.alternatives = MigrationAlternatives::new(
            peers
                .iter()
                .filter(|peer| peer.postcode != self.postcode)
                .map(|peer| (peer.postcode.clone(), peer.pos))
                .collect(),
        );
        if !self.is_zygote && self.roots.is_empty() {
            if let Some(first) = peers.iter().find(|peer| peer.postcode != self.postcode) {
                let root = first.postcode.clone();
                self.deliver(Msg::control(
                    self.postcode.clone(),
                    Body::ForceAddRoot(root),
                ));
            }
        }
    }

    /// Spawns an actor on this scheduler and returns its address.
    pub fn spawn(&mut self, mut actor: Box<dyn Actor>) -> Result<Addr> {
        if self.shutting_down || self.shutdown.load(Ordering::Relaxed) {
            return Err(Error::ShuttingDown);
        }
        self.next_seq += 1;
        let box_id = BoxId::allocate(self.postcode.port(), self.next_seq);
        let addr = Addr::new(self.postcode.clone(), box_id);
        actor.core_mut().set_addr(addr.clone());

        let mut plugins = mem::take(&mut self.plugins);
        let mut pos = Pos::ORIGIN;
        let claimed = plugins.spawn_pos(
            &SchedulerInfo {
                postcode: &self.postcode,
                pos: self.pos,
                actor_count: self.directory.len(),
                actor_target: self.actor_target,
            },
            &mut self.rng,
            &mut pos,
        );
        if !claimed {
            pos = self.positioner.spawn_pos(self.pos, &mut self.rng);
        }
        actor.core_mut().set_pos(pos);

        {
            let mut svc = Service { sched: &mut *self };
            plugins.on_schedule(actor.as_mut(), &mut svc);
            actor.on_schedule(&mut svc);
        }
        self.plugins = plugins;

        self.directory.insert(box_id, actor);
        self.stats.spawned += 1;
        Ok(addr)
    }

    /// Enqueues a message: locally into the mailbox, or across threads
    /// through the post office.
    pub fn deliver(&mut self, msg: Msg) {
        if msg.target.postcode() == &self.postcode {
            self.mailbox.push(msg);
        } else {
            self.route_out(msg);
        }
    }

    /// Pops and dispatches one mailbox message. Returns false when the
    /// mailbox is empty.
    pub fn step(&mut self) -> bool {
        let Some(msg) = self.mailbox.pop() else {
            return false;
        };
        self.dispatch(msg);
        true
    }

    /// Drains up to one batch from the inbound queue into local delivery.
    ///
    /// Two-phase: the batch is popped under the inbound lock, the lock is
    /// released, and only then is each message delivered, so delivery can
    /// re-enter routing without any lock held.
    pub fn drain_inbound(&mut self) -> usize {
        let mut buf = mem::take(&mut self.scratch);
        let n = self.post.drain_into(&mut buf);
        for msg in buf.drain(..) {
            self.deliver(msg);
        }
        self.scratch = buf;
        n
    }

    /// Runs the cooperative loop until shutdown, or until idle if
    /// `exit_when_done` is set.
    pub fn run(&mut self, exit_when_done: bool) {
        info!(postcode = %self.postcode, zygote = self.is_zygote, "scheduler loop starting");
        let mut iter: u64 = 0;
        let mut idle: u32 = 0;
        loop {
            iter = iter.wrapping_add(1);
            if self.shutdown.load(Ordering::Relaxed) {
                self.shutting_down = true;
            }
            if self.shutting_down {
                self.drain_for_exit();
                break;
            }

            let mut worked = self.step();
            if !worked || iter % DRAIN_CHECK_INTERVAL == 0 {
                worked |= self.drain_inbound() > 0;
            }
            if worked {
                idle = 0;
                continue;
            }

            idle = idle.saturating_add(1);
            if exit_when_done
                && idle >= IDLE_EXIT_STREAK
                && self.mailbox.is_empty()
                && self.post.inbound_is_empty()
            {
                break;
            }
            if idle < SPIN_YIELDS {
                thread::yield_now();
            } else {
                thread::sleep(IDLE_SLEEP);
            }
        }
        info!(postcode = %self.postcode, stats = ?self.stats, "scheduler loop exited");
    }

    /// A monitoring snapshot of this scheduler, including any state its
    /// actors expose through `monitor_extra`.
    #[must_use]
    pub fn monitor(&self) -> serde_json::Value {
        let extras: Vec<serde_json::Value> = self
            .directory
            .actors()
            .filter_map(|(box_id, actor)| {
                actor.monitor_extra().map(|extra| {
                    json!({ "box": box_id.to_string(), "extra": extra })
                })
            })
            .collect();
        json!({
            "postcode": self.postcode.to_string(),
            "pos": [self.pos.x, self.pos.y, self.pos.z],
            "actors": self.directory.len(),
            "dispatched": self.stats.dispatched,
            "migrations_in": self.stats.migrations_in,
            "migrations_out": self.stats.migrations_out,
            "actor_extras": extras,
        })
    }

    pub(crate) fn request_migration(&mut self, box_id: BoxId, to: PostCode) {
        self.pending_migration = Some((box_id, to));
    }

    fn dispatch(&mut self, msg: Msg) {
        self.stats.dispatched += 1;
        if msg.target.postcode() != &self.postcode {
            self.route_out(msg);
            return;
        }
        if msg.is_control() {
            self.control(msg);
        } else {
            self.dispatch_to_actor(msg);
        }
        if let Some((box_id, to)) = self.pending_migration.take() {
            self.migrate_out(box_id, to);
        }
    }

    fn dispatch_to_actor(&mut self, msg: Msg) {
        let box_id = msg.target.box_id();
        if let Some(mut actor) = self.directory.take(box_id) {
            let Msg {
                sender: _,
                target: _target,
                body,
            } = msg;
            match body {
                Body::Die => {
                    drop(actor);
                    self.stats.died += 1;
                }
                Body::Infoton(packet) => {
                    actor.apply_infoton(&packet);
                    self.directory.insert(box_id, actor);
                }
                Body::User(payload) => {
                    self.invoke_guarded(&mut actor, |actor, svc| actor.on_message(payload, svc));
                    self.after_dispatch(box_id, actor);
                }
                Body::RecipientMoved { old, new, original } => {
                    self.invoke_guarded(&mut actor, |actor, svc| {
                        actor.on_recipient_moved(&old, &new, *original, svc);
                    });
                    self.after_dispatch(box_id, actor);
                }
                _unhandled => {
                    warn!(kind = _unhandled.kind(), target = %_target, "control body addressed to an actor; dropping");
                    self.stats.dropped += 1;
                    self.directory.insert(box_id, actor);
                }
            }
        } else if let Some(new_addr) = self.directory.forward_for(box_id) {
            let new_addr = new_addr.clone();
            if msg.sender.is_null() {
                // No reply path; forward in place so the message survives.
                let mut forwarded = msg;
                forwarded.target = new_addr;
                self.deliver(forwarded);
            } else {
                let sender = msg.sender.clone();
                let old = msg.target.clone();
                debug!(old = %old, new = %new_addr, "recipient moved; notifying sender");
                let notice = Msg::new(
                    Addr::null(),
                    sender,
                    Body::RecipientMoved {
                        old,
                        new: new_addr,
                        original: Box::new(msg),
                    },
                );
                self.deliver(notice);
            }
        } else {
            warn!(target = %msg.target, kind = msg.body.kind(), "no such actor; dropping message");
            self.stats.dropped += 1;
        }
    }

    fn control(&mut self, msg: Msg) {
        match msg.body {
            Body::Migrate(envelope) => self.migrate_in(envelope),
            Body::Spawn(actor) => {
                if let Err(_err) = self.spawn(actor) {
                    warn!(err = %_err, "spawn control message rejected");
                }
            }
            Body::ForceAddRoot(postcode) => {
                if !self.roots.contains(&postcode) {
                    debug!(root = %postcode, "recorded cluster root");
                    self.roots.push(postcode);
                }
            }
            Body::Die => {
                self.shutting_down = true;
            }
            _unhandled => {
                warn!(kind = _unhandled.kind(), "unhandled control message");
                self.stats.dropped += 1;
            }
        }
    }

    fn invoke_guarded<F>(&mut self, actor: &mut Box<dyn Actor>, f: F)
    where
        F: FnOnce(&mut dyn Actor, &mut Service<'_>),
    {
        let outcome = {
            let sched = &mut *self;
            let target = &mut **actor;
            catch_unwind(AssertUnwindSafe(move || {
                let mut svc = Service { sched };
                f(target, &mut svc);
            }))
        };
        if outcome.is_err() {
            warn!(actor = %actor.core().addr(), "message handler panicked; actor stays resident");
            self.stats.handler_panics += 1;
        }
    }

    /// Post-dispatch bookkeeping: scheduler infoton, migration check,
    /// reinsertion.
    fn after_dispatch(&mut self, box_id: BoxId, mut actor: Box<dyn Actor>) {
        let packet = self.next_scheduler_infoton(actor.core());
        actor.apply_infoton(&packet);

        let alternatives = mem::take(&mut self.alternatives);
        {
            let mut svc = Service { sched: &mut *self };
            actor.check_migration(&alternatives, &mut svc);
        }
        self.alternatives = alternatives;

        self.directory.insert(box_id, actor);
    }

    fn next_scheduler_infoton(&mut self, core: &ActorCore) -> Infoton {
        // The dispatched actor is checked out, so it is not in the count.
        let count = self.directory.len() + 1;
        let mut plugins = mem::take(&mut self.plugins);
        let packet = plugins
            .scheduler_infoton(
                &SchedulerInfo {
                    postcode: &self.postcode,
                    pos: self.pos,
                    actor_count: count,
                    actor_target: self.actor_target,
                },
                core,
            )
            .unwrap_or_else(|| {
                Infoton::new(
                    self.pos,
                    infoton::scheduler_energy(self.actor_target, count) * self.coupling,
                )
            });
        self.plugins = plugins;
        packet
    }

    fn migrate_out(&mut self, box_id: BoxId, to: PostCode) {
        if to == self.postcode {
            return;
        }
        let Some(actor) = self.directory.take(box_id) else {
            return;
        };
        let new_addr = actor.core().addr().relocated(to.clone());
        let envelope = MigrationEnvelope::new(actor, new_addr.clone());
        let msg = Msg::control(to, Body::Migrate(envelope));
        match self.post.route_remote(msg) {
            Ok(()) => {
                debug!(box_id = %box_id, to = %new_addr, "actor migrated out");
                self.directory.add_forward(box_id, new_addr);
                self.stats.migrations_out += 1;
            }
            Err((_failure, msg)) => {
                warn!(failure = %_failure, box_id = %box_id, "migration aborted; actor reinserted");
                if let Body::Migrate(envelope) = msg.body {
                    let (actor, _) = envelope.into_parts();
                    self.directory.insert(box_id, actor);
                }
            }
        }
    }

    fn migrate_in(&mut self, envelope: MigrationEnvelope) {
        if envelope.to().postcode() != &self.postcode {
            // Misrouted; send it onwards rather than strand the actor.
            warn!(to = %envelope.to(), here = %self.postcode, "misrouted migration envelope");
            let dest = envelope.to().postcode().clone();
            self.route_out(Msg::control(dest, Body::Migrate(envelope)));
            return;
        }
        let (mut actor, addr) = envelope.into_parts();
        let box_id = addr.box_id();
        actor.core_mut().set_addr(addr);

        let mut plugins = mem::take(&mut self.plugins);
        {
            let mut svc = Service { sched: &mut *self };
            plugins.on_schedule(actor.as_mut(), &mut svc);
            actor.on_schedule(&mut svc);
        }
        self.plugins = plugins;

        self.directory.insert(box_id, actor);
        self.stats.migrations_in += 1;
    }

    fn route_out(&mut self, msg: Msg) {
        match self.post.route_remote(msg) {
            Ok(()) => {}
            Err((_failure, msg)) => {
                warn!(failure = %_failure, target = %msg.target, "routing failed");
                if msg.sender.is_null() {
                    self.stats.dropped += 1;
                    return;
                }
                let sender = msg.sender.clone();
                let old = msg.target.clone();
                let notice = Msg::new(
                    Addr::null(),
                    sender,
                    Body::RecipientMoved {
                        old,
                        new: Addr::null(),
                        original: Box::new(msg),
                    },
                );
                if notice.target.postcode() == &self.postcode {
                    self.mailbox.push(notice);
                } else if let Err((_, notice)) = self.post.route_remote(notice) {
                    // One attempt only; a failing failure notice is dropped.
                    warn!(target = %notice.target, "failure notice undeliverable");
                    self.stats.dropped += 1;
                }
            }
        }
    }

    /// Shutdown path: every resident actor receives a synthetic `Die`, in
    /// arbitrary order, then whatever is still queued is discarded.
    fn drain_for_exit(&mut self) {
        for box_id in self.directory.boxes() {
            let target = Addr::new(self.postcode.clone(), box_id);
            self.dispatch(Msg::new(Addr::null(), target, Body::Die));
        }
        while self.mailbox.pop().is_some() {
            self.stats.dropped += 1;
        }
        let mut buf = mem::take(&mut self.scratch);
        loop {
            buf.clear();
            let n = self.post.drain_into(&mut buf);
            if n == 0 {
                break;
            }
            self.stats.dropped += n as u64;
        }
        buf.clear();
        self.scratch = buf;
        debug!(postcode = %self.postcode, stats = ?self.stats, "scheduler drained for exit");
    }
}
