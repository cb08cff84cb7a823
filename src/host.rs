//! The process-level driver owning all schedulers.
//!
//! A host builds N schedulers, wires them as peers, pins each to its own
//! OS thread, and runs them to completion. The first scheduler is the
//! zygote: it anchors the balancing space at the origin and receives the
//! initial root actors.
//!
//! Startup is race-free by construction: every scheduler thread
//! rendezvouses on a barrier before entering its loop, so no peer can
//! observe a half-wired host.
//!
//! # Defaults
//!
//! | Field | Default |
//! |-------|---------|
//! | `schedulers` | available CPU parallelism |
//! | `host_name` | `"localhost"` |
//! | `actor_target` | 100 |
//! | `view_size` | 1000.0 |
//! | `migration_distance` | 700.0 |
//! | `coupling` | 1.0 |
//! | `inbound_capacity` | 100 000 |
//! | `thread_name_prefix` | `"swarmhost-sched"` |

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use crate::actor::Actor;
use crate::addr::{Addr, PostCode, SCHEDULER_PORT_BASE};
use crate::error::{Error, Result};
use crate::msg::Msg;
use crate::plugin::SchedulerPlugin;
use crate::positioning::{Positioner, DEFAULT_VIEW_SIZE};
use crate::postoffice::{Inbound, DEFAULT_INBOUND_CAPACITY};
use crate::scheduler::{
    PeerInfo, Scheduler, SchedulerOptions, DEFAULT_ACTOR_TARGET, DEFAULT_MIGRATION_DISTANCE,
};
use crate::tracing_compat::{error, info};

/// Host configuration.
#[derive(Debug, Clone)]
pub struct HostConfig {
    /// Number of schedulers, one OS thread each.
    pub schedulers: usize,
    /// The network-host part of every scheduler postcode.
    pub host_name: String,
    /// Actor count each scheduler steers toward.
    pub actor_target: usize,
    /// Edge length of the view cube.
    pub view_size: f32,
    /// Distance from a scheduler past which its actors migrate.
    pub migration_distance: f32,
    /// Coupling constant scaling scheduler infoton energies.
    pub coupling: f32,
    /// Capacity of each cross-thread inbound queue.
    pub inbound_capacity: usize,
    /// Name prefix for scheduler threads.
    pub thread_name_prefix: String,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            schedulers: thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get),
            host_name: "localhost".to_owned(),
            actor_target: DEFAULT_ACTOR_TARGET,
            view_size: DEFAULT_VIEW_SIZE,
            migration_distance: DEFAULT_MIGRATION_DISTANCE,
            coupling: 1.0,
            inbound_capacity: DEFAULT_INBOUND_CAPACITY,
            thread_name_prefix: "swarmhost-sched".to_owned(),
        }
    }
}

impl HostConfig {
    /// Sets the scheduler count.
    #[must_use]
    pub fn with_schedulers(mut self, schedulers: usize) -> Self {
        self.schedulers = schedulers;
        self
    }

    /// Sets the host name used in postcodes.
    #[must_use]
    pub fn with_host_name(mut self, host_name: impl Into<String>) -> Self {
        self.host_name = host_name.into();
        self
    }

    /// Sets the per-scheduler actor target.
    #[must_use]
    pub const fn with_actor_target(mut self, actor_target: usize) -> Self {
        self.actor_target = actor_target;
        self
    }

    /// Sets the view size.
    #[must_use]
    pub const fn with_view_size(mut self, view_size: f32) -> Self {
        self.view_size = view_size;
        self
    }

    /// Sets the migration distance.
    #[must_use]
    pub const fn with_migration_distance(mut self, migration_distance: f32) -> Self {
        self.migration_distance = migration_distance;
        self
    }

    /// Sets the inbound queue capacity.
    #[must_use]
    pub const fn with_inbound_capacity(mut self, inbound_capacity: usize) -> Self {
        self.inbound_capacity = inbound_capacity;
        self
    }

    fn scheduler_options(&self) -> SchedulerOptions {
        SchedulerOptions {
            actor_target: self.actor_target,
            view_size: self.view_size,
            migration_distance: self.migration_distance,
            coupling: self.coupling,
            inbound_capacity: self.inbound_capacity,
        }
    }
}

/// A clonable handle for talking to a running host from outside.
#[derive(Debug, Clone)]
pub struct HostController {
    entry: Arc<Inbound>,
    flags: Arc<Vec<Arc<AtomicBool>>>,
}

impl HostController {
    /// Injects a message into the host through the zygote's inbound queue.
    ///
    /// Returns false if the queue is at capacity.
    pub fn deliver(&self, msg: Msg) -> bool {
        self.entry.push(msg).is_ok()
    }

    /// Signals every scheduler to drain and exit.
    pub fn shutdown(&self) {
        for flag in self.flags.iter() {
            flag.store(true, Ordering::Relaxed);
        }
    }
}

/// The top-level coordinator: N schedulers, wired and ready to run.
#[derive(Debug)]
pub struct Host {
    schedulers: Vec<Scheduler>,
    controller: HostController,
    thread_name_prefix: String,
}

impl Host {
    /// Builds a host with no plugins.
    pub fn new(config: HostConfig) -> Result<Self> {
        Self::with_plugins(config, |_| Vec::new())
    }

    /// Builds a host, asking `plugin_factory` for each scheduler's plugin
    /// stack (called with the scheduler index, zygote first).
    pub fn with_plugins<F>(config: HostConfig, mut plugin_factory: F) -> Result<Self>
    where
        F: FnMut(usize) -> Vec<Box<dyn SchedulerPlugin>>,
    {
        if config.schedulers == 0 {
            return Err(Error::NoSchedulers);
        }
        let options = config.scheduler_options();
        let positioner = Positioner::new(config.view_size);

        let mut schedulers = Vec::with_capacity(config.schedulers);
        for index in 0..config.schedulers {
            let port = SCHEDULER_PORT_BASE + u16::try_from(index).unwrap_or(u16::MAX);
            let postcode = PostCode::new(config.host_name.as_str(), port);
            let is_zygote = index == 0;
            let pos = positioner.scheduler_pos(&postcode, is_zygote);
            schedulers.push(Scheduler::new(
                postcode,
                pos,
                plugin_factory(index),
                &options,
                is_zygote,
            ));
        }

        let peers: Vec<PeerInfo> = schedulers
            .iter()
            .map(|sched| PeerInfo {
                postcode: sched.postcode().clone(),
                inbound: sched.inbound(),
                pos: sched.pos(),
            })
            .collect();
        for sched in &mut schedulers {
            sched.add_peers(&peers);
        }

        let controller = HostController {
            entry: schedulers[0].inbound(),
            flags: Arc::new(schedulers.iter().map(Scheduler::shutdown_handle).collect()),
        };
        info!(
            schedulers = schedulers.len(),
            host = %config.host_name,
            "host wired"
        );
        Ok(Self {
            schedulers,
            controller,
            thread_name_prefix: config.thread_name_prefix,
        })
    }

    /// Spawns a root actor on the zygote. Must be called before
    /// [`run`](Self::run).
    pub fn spawn_root(&mut self, actor: Box<dyn Actor>) -> Result<Addr> {
        self.schedulers[0].spawn(actor)
    }

    /// A handle for delivering messages and requesting shutdown while the
    /// host runs.
    #[must_use]
    pub fn controller(&self) -> HostController {
        self.controller.clone()
    }

    /// Forwards a message to the entry scheduler (the zygote).
    pub fn deliver(&self, msg: Msg) -> bool {
        self.controller.deliver(msg)
    }

    /// Signals every scheduler to drain and exit.
    pub fn shutdown(&self) {
        self.controller.shutdown();
    }

    /// Runs every scheduler on its own OS thread and blocks until all of
    /// them complete.
    ///
    /// With `exit_when_done`, each scheduler exits once its mailbox and
    /// inbound queue stay empty; otherwise they run until
    /// [`HostController::shutdown`].
    pub fn run(self, exit_when_done: bool) -> Result<()> {
        let Self {
            schedulers,
            controller,
            thread_name_prefix,
        } = self;

        // All schedulers become visible to their peers before any loop
        // starts; the barrier stands in for startup staggering.
        let barrier = Arc::new(Barrier::new(schedulers.len()));
        let mut handles = Vec::with_capacity(schedulers.len());
        for (index, mut sched) in schedulers.into_iter().enumerate() {
            let barrier = Arc::clone(&barrier);
            let spawned = thread::Builder::new()
                .name(format!("{thread_name_prefix}-{index}"))
                .spawn(move || {
                    barrier.wait();
                    sched.run(exit_when_done);
                });
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(source) => {
                    // Fatal. Threads spawned so far are parked at the
                    // barrier, which can no longer trip; detach them
                    // rather than deadlock on a join.
                    controller.shutdown();
                    drop(handles);
                    return Err(Error::ThreadSpawn { source });
                }
            }
        }

        for handle in handles {
            if handle.join().is_err() {
                error!("scheduler thread panicked");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_schedulers_is_an_error() {
        let config = HostConfig::default().with_schedulers(0);
        assert!(matches!(Host::new(config), Err(Error::NoSchedulers)));
    }

    #[test]
    fn wiring_assigns_sequential_ports_and_zygote_origin() {
        let config = HostConfig::default().with_schedulers(3).with_host_name("test");
        let host = Host::new(config).unwrap();
        let ports: Vec<u16> = host
            .schedulers
            .iter()
            .map(|sched| sched.postcode().port())
            .collect();
        assert_eq!(
            ports,
            vec![
                SCHEDULER_PORT_BASE,
                SCHEDULER_PORT_BASE + 1,
                SCHEDULER_PORT_BASE + 2
            ]
        );
        assert!(host.schedulers[0].is_zygote());
        assert_eq!(host.schedulers[0].pos(), crate::space::Pos::ORIGIN);
        assert!(!host.schedulers[1].is_zygote());
    }

    #[test]
    fn empty_host_exits_when_done() {
        let config = HostConfig::default().with_schedulers(2);
        let host = Host::new(config).unwrap();
        host.run(true).unwrap();
    }
}
