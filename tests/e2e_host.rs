//! Threaded host end-to-end scenarios.
//!
//! Each test builds a real multi-threaded host and observes actor behavior
//! from the outside through channels and shared counters. Deterministic
//! single-threaded coverage lives in `ordering_conformance`.
//!
//! Run with: `cargo test --test e2e_host`

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use swarmhost::addr::SCHEDULER_PORT_BASE;
use swarmhost::{
    Actor, ActorCore, Addr, Body, Host, HostConfig, Msg, PostCode, Service, UserBody,
};

mod common {
    pub fn init_test_logging() {
        // Initialize tracing for tests if not already done
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_test_writer()
            .try_init();
    }
}

// ---------------------------------------------------------------------------
// Cross-thread ping-pong
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Ping {
    reply_to: Addr,
}

#[derive(Debug)]
struct Pong;

struct Pinger {
    core: ActorCore,
    events: mpsc::Sender<&'static str>,
}

impl Actor for Pinger {
    fn core(&self) -> &ActorCore {
        &self.core
    }
    fn core_mut(&mut self) -> &mut ActorCore {
        &mut self.core
    }
    fn on_message(&mut self, msg: Box<dyn UserBody>, _svc: &mut Service<'_>) {
        if msg.is::<Pong>() {
            let _ = self.events.send("pong");
        }
    }
}

struct Ponger {
    core: ActorCore,
    ready: mpsc::Sender<Addr>,
    events: mpsc::Sender<&'static str>,
}

impl Actor for Ponger {
    fn core(&self) -> &ActorCore {
        &self.core
    }
    fn core_mut(&mut self) -> &mut ActorCore {
        &mut self.core
    }
    fn on_schedule(&mut self, _svc: &mut Service<'_>) {
        let _ = self.ready.send(self.core.addr().clone());
    }
    fn on_message(&mut self, msg: Box<dyn UserBody>, svc: &mut Service<'_>) {
        if let Some(ping) = msg.downcast_ref::<Ping>() {
            let _ = self.events.send("ping");
            svc.send(&self.core, ping.reply_to.clone(), Pong);
        }
    }
}

#[test]
fn cross_thread_ping_pong() {
    common::init_test_logging();
    let config = HostConfig::default()
        .with_schedulers(2)
        .with_host_name("e2e-ping");
    let mut host = Host::new(config).unwrap();

    let (event_tx, event_rx) = mpsc::channel();
    let (ready_tx, ready_rx) = mpsc::channel();

    let pinger_addr = host
        .spawn_root(Box::new(Pinger {
            core: ActorCore::default(),
            events: event_tx.clone(),
        }))
        .unwrap();

    let controller = host.controller();
    let runner = thread::spawn(move || host.run(false));

    // Install the ponger on the second scheduler via a control message.
    let second = PostCode::new("e2e-ping", SCHEDULER_PORT_BASE + 1);
    assert!(controller.deliver(Msg::control(
        second,
        Body::Spawn(Box::new(Ponger {
            core: ActorCore::default(),
            ready: ready_tx,
            events: event_tx,
        })),
    )));

    let ponger_addr = ready_rx.recv_timeout(Duration::from_secs(10)).unwrap();
    assert_eq!(ponger_addr.postcode().port(), SCHEDULER_PORT_BASE + 1);

    assert!(controller.deliver(Msg::new(
        Addr::null(),
        ponger_addr,
        Body::user(Ping {
            reply_to: pinger_addr,
        }),
    )));

    assert_eq!(event_rx.recv_timeout(Duration::from_secs(10)).unwrap(), "ping");
    assert_eq!(event_rx.recv_timeout(Duration::from_secs(10)).unwrap(), "pong");
    assert!(event_rx.try_recv().is_err());

    controller.shutdown();
    runner.join().unwrap().unwrap();
}

// ---------------------------------------------------------------------------
// Actor tree growth
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Grow {
    rounds: u32,
}

struct TreeActor {
    core: ActorCore,
    nodes: Arc<AtomicU64>,
    counted: bool,
}

impl TreeActor {
    fn boxed(nodes: Arc<AtomicU64>) -> Box<Self> {
        Box::new(Self {
            core: ActorCore::default(),
            nodes,
            counted: false,
        })
    }
}

impl Actor for TreeActor {
    fn core(&self) -> &ActorCore {
        &self.core
    }
    fn core_mut(&mut self) -> &mut ActorCore {
        &mut self.core
    }
    fn on_schedule(&mut self, _svc: &mut Service<'_>) {
        // Re-scheduling after migration must not count the node twice.
        if !self.counted {
            self.counted = true;
            self.nodes.fetch_add(1, Ordering::Relaxed);
        }
    }
    fn on_message(&mut self, msg: Box<dyn UserBody>, svc: &mut Service<'_>) {
        let Some(grow) = msg.downcast_ref::<Grow>() else {
            return;
        };
        if grow.rounds == 0 {
            return;
        }
        for _ in 0..2 {
            let Ok(child) = svc.spawn(TreeActor::boxed(Arc::clone(&self.nodes))) else {
                return;
            };
            svc.send(&self.core, child, Grow {
                rounds: grow.rounds - 1,
            });
        }
    }
}

fn grow_tree(rounds: u32) -> u64 {
    let config = HostConfig::default()
        .with_schedulers(4)
        .with_host_name("e2e-tree")
        .with_actor_target(50);
    let mut host = Host::new(config).unwrap();

    let nodes = Arc::new(AtomicU64::new(0));
    let root = host.spawn_root(TreeActor::boxed(Arc::clone(&nodes))).unwrap();

    let controller = host.controller();
    let runner = thread::spawn(move || host.run(false));

    assert!(controller.deliver(Msg::new(Addr::null(), root, Body::user(Grow { rounds }))));

    let expected = (1u64 << (rounds + 1)) - 1;
    let deadline = Instant::now() + Duration::from_secs(120);
    while nodes.load(Ordering::Relaxed) < expected {
        assert!(
            Instant::now() < deadline,
            "tree stalled at {} of {expected} nodes",
            nodes.load(Ordering::Relaxed)
        );
        thread::sleep(Duration::from_millis(10));
    }

    controller.shutdown();
    runner.join().unwrap().unwrap();
    nodes.load(Ordering::Relaxed)
}

#[test]
fn tree_growth_counts_every_node() {
    common::init_test_logging();
    assert_eq!(grow_tree(12), (1 << 13) - 1);
}

#[test]
#[ignore = "full-size tree: 262143 actors"]
fn tree_growth_full_size() {
    common::init_test_logging();
    assert_eq!(grow_tree(17), (1 << 18) - 1);
}

// ---------------------------------------------------------------------------
// Shutdown drains cleanly
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Tick;

struct CountingSink {
    core: ActorCore,
    hits: Arc<AtomicU64>,
}

impl Actor for CountingSink {
    fn core(&self) -> &ActorCore {
        &self.core
    }
    fn core_mut(&mut self) -> &mut ActorCore {
        &mut self.core
    }
    fn on_message(&mut self, msg: Box<dyn UserBody>, _svc: &mut Service<'_>) {
        if msg.is::<Tick>() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        }
    }
}

#[test]
fn exit_when_done_processes_everything_first() {
    common::init_test_logging();
    let config = HostConfig::default()
        .with_schedulers(1)
        .with_host_name("e2e-drain");
    let mut host = Host::new(config).unwrap();

    let hits = Arc::new(AtomicU64::new(0));
    let sink = host
        .spawn_root(Box::new(CountingSink {
            core: ActorCore::default(),
            hits: Arc::clone(&hits),
        }))
        .unwrap();

    for _ in 0..100 {
        assert!(host.deliver(Msg::new(Addr::null(), sink.clone(), Body::user(Tick))));
    }

    // Blocks until the scheduler has dispatched all 100 and gone idle.
    host.run(true).unwrap();
    assert_eq!(hits.load(Ordering::Relaxed), 100);
}

// ---------------------------------------------------------------------------
// Migration under load
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Link(Addr);

#[derive(Debug)]
struct Token;

struct Drifter {
    core: ActorCore,
    next: Option<Addr>,
    residency: Arc<Mutex<HashMap<u64, u16>>>,
}

impl Drifter {
    fn boxed(residency: Arc<Mutex<HashMap<u64, u16>>>) -> Box<Self> {
        Box::new(Self {
            core: ActorCore::default(),
            next: None,
            residency,
        })
    }
}

impl Actor for Drifter {
    fn core(&self) -> &ActorCore {
        &self.core
    }
    fn core_mut(&mut self) -> &mut ActorCore {
        &mut self.core
    }
    fn on_schedule(&mut self, _svc: &mut Service<'_>) {
        // Reruns after every migration, so the map tracks current residency.
        let addr = self.core.addr();
        self.residency
            .lock()
            .unwrap()
            .insert(addr.box_id().raw(), addr.postcode().port());
    }
    fn on_message(&mut self, msg: Box<dyn UserBody>, svc: &mut Service<'_>) {
        if let Some(Link(next)) = msg.downcast_ref::<Link>() {
            self.next = Some(next.clone());
        } else if msg.is::<Token>() {
            // Keep the token circulating; the attached energy pulls the
            // neighbor toward this actor, so ring segments travel together.
            if let Some(next) = self.next.clone() {
                svc.send_with_energy(&self.core, next, Token, 2.0);
            }
        }
        // Any other dispatch still drives the infoton and migration
        // machinery on its own.
    }
    fn update_peer(&mut self, old: &Addr, new: &Addr) {
        if self.next.as_ref() == Some(old) {
            self.next = Some(new.clone());
        }
    }
}

fn residency_counts(residency: &Mutex<HashMap<u64, u16>>, ports: &[u16]) -> Vec<usize> {
    let map = residency.lock().unwrap();
    ports
        .iter()
        .map(|port| map.values().filter(|p| **p == *port).count())
        .collect()
}

fn balance_config(schedulers: usize, target: usize) -> HostConfig {
    // A small view keeps the schedulers close together so the drift the
    // repulsion has to cover stays short.
    let mut config = HostConfig::default()
        .with_schedulers(schedulers)
        .with_host_name("e2e-balance")
        .with_actor_target(target)
        .with_view_size(200.0)
        .with_migration_distance(150.0);
    config.coupling = 20.0;
    config
}

#[test]
fn migration_redistributes_load() {
    common::init_test_logging();
    const SCHEDULERS: usize = 4;
    const TARGET: usize = 50;
    const ACTORS: usize = SCHEDULERS * TARGET;

    let mut host = Host::new(balance_config(SCHEDULERS, TARGET)).unwrap();

    let residency = Arc::new(Mutex::new(HashMap::new()));
    let mut addrs = Vec::with_capacity(ACTORS);
    for _ in 0..ACTORS {
        addrs.push(
            host.spawn_root(Drifter::boxed(Arc::clone(&residency)))
                .unwrap(),
        );
    }

    let ports: Vec<u16> = (0..SCHEDULERS)
        .map(|i| SCHEDULER_PORT_BASE + u16::try_from(i).unwrap())
        .collect();
    assert_eq!(
        residency_counts(&residency, &ports)[0],
        ACTORS,
        "everything starts on the zygote"
    );

    let controller = host.controller();
    let runner = thread::spawn(move || host.run(false));

    // Nudge every actor until the overloaded zygote has shed a large part
    // of its population and every peer has picked actors up.
    let deadline = Instant::now() + Duration::from_secs(60);
    let counts = loop {
        for addr in &addrs {
            controller.deliver(Msg::new(Addr::null(), addr.clone(), Body::user(Tick)));
        }
        thread::sleep(Duration::from_millis(20));

        let counts = residency_counts(&residency, &ports);
        let spread_out = counts[0] <= ACTORS * 13 / 20 && counts[1..].iter().all(|&c| c >= 3);
        if spread_out {
            break counts;
        }
        assert!(
            Instant::now() < deadline,
            "load never spread; counts: {counts:?}"
        );
    };

    controller.shutdown();
    runner.join().unwrap().unwrap();

    let total: usize = counts.iter().sum();
    assert_eq!(total, ACTORS, "no actor lost in migration");
}

#[test]
#[ignore = "long-running steady-state load scenario"]
fn migration_balances_to_target_under_ring_traffic() {
    common::init_test_logging();
    const SCHEDULERS: usize = 4;
    const TARGET: usize = 50;
    const ACTORS: usize = SCHEDULERS * TARGET;
    const TOLERANCE: usize = TARGET / 5;

    let mut host = Host::new(balance_config(SCHEDULERS, TARGET)).unwrap();

    let residency = Arc::new(Mutex::new(HashMap::new()));
    let mut addrs = Vec::with_capacity(ACTORS);
    for _ in 0..ACTORS {
        addrs.push(
            host.spawn_root(Drifter::boxed(Arc::clone(&residency)))
                .unwrap(),
        );
    }

    // Close the ring, then set a handful of tokens circulating: the
    // resulting actor-to-actor traffic is what lets load drain in every
    // direction instead of only toward the peers' half-space.
    for (i, addr) in addrs.iter().enumerate() {
        let next = addrs[(i + 1) % ACTORS].clone();
        host.deliver(Msg::new(Addr::null(), addr.clone(), Body::user(Link(next))));
    }
    for addr in addrs.iter().step_by(10) {
        host.deliver(Msg::new(Addr::null(), addr.clone(), Body::user(Token)));
    }

    let ports: Vec<u16> = (0..SCHEDULERS)
        .map(|i| SCHEDULER_PORT_BASE + u16::try_from(i).unwrap())
        .collect();
    let controller = host.controller();
    let runner = thread::spawn(move || host.run(false));

    let deadline = Instant::now() + Duration::from_secs(300);
    loop {
        thread::sleep(Duration::from_millis(100));
        let counts = residency_counts(&residency, &ports);
        if counts
            .iter()
            .all(|&count| count.abs_diff(TARGET) <= TOLERANCE)
        {
            break;
        }
        assert!(
            Instant::now() < deadline,
            "load never balanced; counts: {counts:?}"
        );
    }

    controller.shutdown();
    runner.join().unwrap().unwrap();
}
