//! Swarmhost: an in-process distributed actor runtime with spatial load
//! balancing.
//!
//! # Overview
//!
//! Swarmhost runs lightweight actors on a set of cooperating per-thread
//! schedulers. Actors hold state, communicate exclusively by asynchronous
//! messages, and are bound to exactly one scheduler at a time. Each actor
//! also has a position in an abstract 3-D space; message traffic and
//! scheduler load exert forces ("infotons") on that position, and an actor
//! that drifts close enough to another scheduler migrates there. Load
//! balancing falls out of the geometry instead of a central planner.
//!
//! # Core Guarantees
//!
//! - **Single-threaded actors**: no two message handlers for actors on the
//!   same scheduler ever run concurrently; handlers run to completion.
//! - **Mailbox FIFO**: messages dispatched by one scheduler are dispatched
//!   in mailbox order; pushes from one peer into another's inbound queue
//!   arrive in push order.
//! - **One lock at a time**: cross-thread delivery holds at most one peer
//!   inbound lock, never across another delivery or routing call.
//! - **Migration transparency**: messages sent to a departed actor's old
//!   address come back as a `RecipientMoved` notification carrying the
//!   original, so one indirection per stale holder suffices.
//!
//! # Module Structure
//!
//! - [`addr`]: actor and scheduler identity (`PostCode`, `BoxId`, `Addr`)
//! - [`space`]: 3-D positions (`Pos`)
//! - [`msg`]: message envelope and body variants
//! - [`actor`]: the `Actor` trait and its runtime core slot
//! - [`mailbox`]: the scheduler-local message queue
//! - [`postoffice`]: cross-thread routing and inbound queues
//! - [`scheduler`]: the per-thread cooperative scheduler
//! - [`positioning`]: initial placement of schedulers and actors
//! - [`infoton`]: force packets and the default balancing policy
//! - [`migration`]: moving actors between schedulers
//! - [`plugin`]: scheduler lifecycle hooks
//! - [`host`]: the process-level driver that owns all schedulers
//! - [`error`]: error types
//!
//! # Example
//!
//! ```no_run
//! use swarmhost::{Actor, ActorCore, Addr, Body, Host, HostConfig, Msg, Service, UserBody};
//!
//! struct Greeter {
//!     core: ActorCore,
//! }
//!
//! #[derive(Debug)]
//! struct Hello;
//!
//! impl Actor for Greeter {
//!     fn core(&self) -> &ActorCore {
//!         &self.core
//!     }
//!     fn core_mut(&mut self) -> &mut ActorCore {
//!         &mut self.core
//!     }
//!     fn on_message(&mut self, msg: Box<dyn UserBody>, _svc: &mut Service<'_>) {
//!         if msg.is::<Hello>() {
//!             println!("hello from {}", self.core.addr());
//!         }
//!     }
//! }
//!
//! let mut host = Host::new(HostConfig::default()).unwrap();
//! let addr = host.spawn_root(Box::new(Greeter { core: ActorCore::default() })).unwrap();
//! let controller = host.controller();
//! controller.deliver(Msg::new(Addr::null(), addr, Body::user(Hello)));
//! controller.shutdown();
//! host.run(false).unwrap();
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_precision_loss)]

pub mod actor;
pub mod addr;
pub mod error;
pub mod host;
pub mod infoton;
pub mod mailbox;
pub mod migration;
pub mod msg;
pub mod plugin;
pub mod positioning;
pub mod postoffice;
pub mod scheduler;
pub mod space;
pub mod tracing_compat;
pub mod util;

// Re-exports for convenient access to core types
pub use actor::{Actor, ActorCore};
pub use addr::{Addr, BoxId, PostCode};
pub use error::{Error, Result, RouteFailure};
pub use host::{Host, HostConfig, HostController};
pub use infoton::{Infoton, MigrationAlternatives};
pub use msg::{Body, Msg, UserBody};
pub use plugin::{SchedulerInfo, SchedulerPlugin};
pub use scheduler::{Scheduler, Service};
pub use space::Pos;
