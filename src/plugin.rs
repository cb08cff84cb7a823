//! Scheduler lifecycle hooks.
//!
//! A plugin is an ordered stack member invoked by its scheduler at fixed
//! points: once at startup, when an actor is installed, when a spawn needs
//! an initial position, and when the post-dispatch infoton is computed.
//! Hooks run in registration order; for position and infoton the first
//! plugin that answers wins and the built-in policy is the fallback.
//!
//! Plugins hold their own state. They are owned by one scheduler and run
//! on its thread only, so no synchronization is involved.

use crate::actor::{Actor, ActorCore};
use crate::addr::PostCode;
use crate::infoton::Infoton;
use crate::scheduler::Service;
use crate::space::Pos;
use crate::util::DetRng;

/// A read-only snapshot of the invoking scheduler, handed to hooks that
/// must not reach back into it.
#[derive(Debug, Clone, Copy)]
pub struct SchedulerInfo<'a> {
    /// The scheduler's postcode.
    pub postcode: &'a PostCode,
    /// The scheduler's position.
    pub pos: Pos,
    /// Resident actor count.
    pub actor_count: usize,
    /// Configured actor target.
    pub actor_target: usize,
}

/// A scheduler extension with optional hooks.
#[allow(unused_variables)]
pub trait SchedulerPlugin: Send {
    /// Called once when the scheduler starts, before any dispatch.
    fn setup(&mut self, info: &SchedulerInfo<'_>) {}

    /// Called when an actor is installed: after spawn and after
    /// migration-in, before the actor's own `on_schedule`.
    fn on_schedule(&mut self, actor: &mut dyn Actor, svc: &mut Service<'_>) {}

    /// Supplies an initial position for a spawning actor.
    ///
    /// Return `true` after writing `out` to claim the spawn; the first
    /// claiming plugin wins.
    fn spawn_pos(
        &mut self,
        info: &SchedulerInfo<'_>,
        rng: &mut DetRng,
        out: &mut Pos,
    ) -> bool {
        false
    }

    /// Supplies the post-dispatch infoton for an actor.
    ///
    /// The first plugin returning `Some` wins; with no takers the built-in
    /// load-balancing policy applies.
    fn scheduler_infoton(
        &mut self,
        info: &SchedulerInfo<'_>,
        actor: &ActorCore,
    ) -> Option<Infoton> {
        None
    }
}

/// The ordered plugin stack owned by a scheduler.
#[derive(Default)]
pub struct PluginStack {
    plugins: Vec<Box<dyn SchedulerPlugin>>,
}

impl PluginStack {
    /// Builds a stack from plugins in invocation order.
    #[must_use]
    pub fn new(plugins: Vec<Box<dyn SchedulerPlugin>>) -> Self {
        Self { plugins }
    }

    /// Number of registered plugins.
    #[must_use]
    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    /// Returns true if no plugins are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Runs every `setup` hook in order.
    pub fn setup(&mut self, info: &SchedulerInfo<'_>) {
        for plugin in &mut self.plugins {
            plugin.setup(info);
        }
    }

    /// Runs every `on_schedule` hook in order.
    pub fn on_schedule(&mut self, actor: &mut dyn Actor, svc: &mut Service<'_>) {
        for plugin in &mut self.plugins {
            plugin.on_schedule(actor, svc);
        }
    }

    /// Asks plugins for a spawn position; first claim wins.
    pub fn spawn_pos(
        &mut self,
        info: &SchedulerInfo<'_>,
        rng: &mut DetRng,
        out: &mut Pos,
    ) -> bool {
        self.plugins
            .iter_mut()
            .any(|plugin| plugin.spawn_pos(info, rng, out))
    }

    /// Asks plugins for the post-dispatch infoton; first answer wins.
    pub fn scheduler_infoton(
        &mut self,
        info: &SchedulerInfo<'_>,
        actor: &ActorCore,
    ) -> Option<Infoton> {
        self.plugins
            .iter_mut()
            .find_map(|plugin| plugin.scheduler_infoton(info, actor))
    }
}

impl core::fmt::Debug for PluginStack {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PluginStack")
            .field("len", &self.plugins.len())
            .finish()
    }
}
