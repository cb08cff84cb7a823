//! Initial placement of schedulers and actors in the balancing space.
//!
//! Placement is deterministic: a scheduler's position is a pure function
//! of its postcode, so every scheduler of a host computes the same peer
//! geometry without coordination. The root scheduler anchors the space at
//! the origin; the first six scheduler ports fan out along the axes one
//! view-size apart, and any further schedulers land on port-seeded random
//! offsets around the host base.

use crate::addr::{PostCode, SCHEDULER_PORT_BASE};
use crate::space::Pos;
use crate::util::DetRng;

/// Default edge length of the view cube.
pub const DEFAULT_VIEW_SIZE: f32 = 1000.0;

/// Assigns initial positions to schedulers and spawned actors.
#[derive(Debug, Clone)]
pub struct Positioner {
    view_size: f32,
}

impl Positioner {
    /// Creates a positioner for the given view size.
    #[must_use]
    pub const fn new(view_size: f32) -> Self {
        Self { view_size }
    }

    /// The view size this positioner was built with.
    #[must_use]
    pub const fn view_size(&self) -> f32 {
        self.view_size
    }

    /// Computes a scheduler's position from its postcode.
    ///
    /// The root sits at the origin. Everyone else starts from a host base
    /// position drawn from the host-name seed (scaled five views out) plus
    /// a scheduler offset: the six well-known ports map to the axis
    /// directions, other ports to a port-seeded random offset.
    #[must_use]
    pub fn scheduler_pos(&self, postcode: &PostCode, is_root: bool) -> Pos {
        if is_root {
            return Pos::ORIGIN;
        }
        let mut host_rng = DetRng::new(str_seed(postcode.host()));
        let base = self.random_in_view(&mut host_rng) * 5.0;
        base + self.scheduler_offset(postcode.port())
    }

    /// Computes an initial position for an actor spawned on a scheduler at
    /// `scheduler_pos`: the scheduler position plus uniform noise within
    /// one view cube.
    #[must_use]
    pub fn spawn_pos(&self, scheduler_pos: Pos, rng: &mut DetRng) -> Pos {
        scheduler_pos + self.random_in_view(rng)
    }

    fn scheduler_offset(&self, port: u16) -> Pos {
        let v = self.view_size;
        match port {
            p if p == SCHEDULER_PORT_BASE => Pos::new(v, 0.0, 0.0),
            p if p == SCHEDULER_PORT_BASE + 1 => Pos::new(-v, 0.0, 0.0),
            p if p == SCHEDULER_PORT_BASE + 2 => Pos::new(0.0, v, 0.0),
            p if p == SCHEDULER_PORT_BASE + 3 => Pos::new(0.0, -v, 0.0),
            p if p == SCHEDULER_PORT_BASE + 4 => Pos::new(0.0, 0.0, v),
            p if p == SCHEDULER_PORT_BASE + 5 => Pos::new(0.0, 0.0, -v),
            p => self.random_in_view(&mut DetRng::new(u64::from(p))),
        }
    }

    fn random_in_view(&self, rng: &mut DetRng) -> Pos {
        let half = self.view_size / 2.0;
        Pos::new(
            rng.next_f32_centered(half),
            rng.next_f32_centered(half),
            rng.next_f32_centered(half),
        )
    }
}

impl Default for Positioner {
    fn default() -> Self {
        Self::new(DEFAULT_VIEW_SIZE)
    }
}

/// FNV-1a over the host name, so placement is reproducible per host.
pub(crate) fn str_seed(s: &str) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in s.bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_sits_at_origin() {
        let positioner = Positioner::default();
        let pc = PostCode::new("local", SCHEDULER_PORT_BASE);
        assert_eq!(positioner.scheduler_pos(&pc, true), Pos::ORIGIN);
    }

    #[test]
    fn placement_is_deterministic() {
        let positioner = Positioner::default();
        let pc = PostCode::new("local", SCHEDULER_PORT_BASE + 2);
        assert_eq!(
            positioner.scheduler_pos(&pc, false),
            positioner.scheduler_pos(&pc, false)
        );
    }

    #[test]
    fn well_known_ports_fan_out_along_axes() {
        let positioner = Positioner::default();
        let a = PostCode::new("local", SCHEDULER_PORT_BASE + 1);
        let b = PostCode::new("local", SCHEDULER_PORT_BASE + 2);
        let pos_a = positioner.scheduler_pos(&a, false);
        let pos_b = positioner.scheduler_pos(&b, false);

        // Same host base; the offsets differ by two axis steps.
        let diff = pos_a - pos_b;
        let expected = Pos::new(-DEFAULT_VIEW_SIZE, 0.0, 0.0) - Pos::new(0.0, DEFAULT_VIEW_SIZE, 0.0);
        assert!((diff - expected).norm() < 1e-3);
    }

    #[test]
    fn spawn_noise_stays_within_one_view() {
        let positioner = Positioner::default();
        let sched = Pos::new(100.0, -50.0, 25.0);
        let mut rng = DetRng::new(9);
        for _ in 0..100 {
            let pos = positioner.spawn_pos(sched, &mut rng);
            let noise = pos - sched;
            assert!(noise.x.abs() <= DEFAULT_VIEW_SIZE / 2.0);
            assert!(noise.y.abs() <= DEFAULT_VIEW_SIZE / 2.0);
            assert!(noise.z.abs() <= DEFAULT_VIEW_SIZE / 2.0);
        }
    }

    #[test]
    fn different_hosts_get_different_bases() {
        let positioner = Positioner::default();
        let a = PostCode::new("alpha", SCHEDULER_PORT_BASE + 1);
        let b = PostCode::new("beta", SCHEDULER_PORT_BASE + 1);
        assert_ne!(
            positioner.scheduler_pos(&a, false),
            positioner.scheduler_pos(&b, false)
        );
    }
}
