//! Rope physics

use serde::{Deserialize, Serialize};

use super::tuning::MatchTuning;
use super::Side;

/// Rope position and velocity.
///
/// Negative displacement is toward the left side, positive toward the right.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RopeState {
    pub displacement: f64,
    pub velocity: f64,
}

/// Physics system for advancing the rope
pub struct PhysicsSystem;

impl PhysicsSystem {
    /// Advance the rope by one discrete step.
    ///
    /// Each call is a single step regardless of wall-clock interval.
    pub fn step(
        rope: RopeState,
        left_strength: f64,
        right_strength: f64,
        tuning: &MatchTuning,
    ) -> RopeState {
        let left_force = left_strength * tuning.pull_force_multiplier;
        let right_force = right_strength * tuning.pull_force_multiplier;

        // Positive pulls toward the right
        let net_force = right_force - left_force;
        let acceleration = net_force / tuning.mass;

        // Damping applies every tick, not only when idle
        let velocity = (rope.velocity + acceleration) * tuning.friction;

        RopeState {
            displacement: rope.displacement + velocity,
            velocity,
        }
    }

    /// Side that has pulled the rope past the threshold, if any.
    ///
    /// Left is checked first so a single large jump resolves deterministically.
    pub fn winning_side(displacement: f64, threshold: f64) -> Option<Side> {
        if displacement <= -threshold {
            Some(Side::Left)
        } else if displacement >= threshold {
            Some(Side::Right)
        } else {
            None
        }
    }

    /// Rope advantage in [-1, 1] from `side`'s point of view
    pub fn advantage(displacement: f64, threshold: f64, side: Side) -> f64 {
        let normalized = (displacement / threshold).clamp(-1.0, 1.0);
        match side {
            Side::Left => -normalized,
            Side::Right => normalized,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tuning(mass: f64, friction: f64, pull: f64) -> MatchTuning {
        MatchTuning {
            mass,
            friction,
            pull_force_multiplier: pull,
            ..MatchTuning::default()
        }
    }

    #[test]
    fn balanced_strength_keeps_rope_still() {
        let t = tuning(5.0, 0.95, 0.01);
        let rope = PhysicsSystem::step(RopeState::default(), 3.0, 3.0, &t);
        assert_eq!(rope.velocity, 0.0);
        assert_eq!(rope.displacement, 0.0);
    }

    #[test]
    fn step_matches_closed_form() {
        let t = tuning(5.0, 0.95, 0.01);
        let start = RopeState {
            displacement: 1.5,
            velocity: -0.2,
        };
        let rope = PhysicsSystem::step(start, 2.0, 6.0, &t);

        let expected_v = (-0.2 + (6.0 * 0.01 - 2.0 * 0.01) / 5.0) * 0.95;
        assert!((rope.velocity - expected_v).abs() < 1e-12);
        assert!((rope.displacement - (1.5 + expected_v)).abs() < 1e-12);
    }

    #[test]
    fn stronger_left_pulls_negative() {
        let t = MatchTuning::default();
        let rope = PhysicsSystem::step(RopeState::default(), 5.0, 1.0, &t);
        assert!(rope.velocity < 0.0);
        assert!(rope.displacement < 0.0);
    }

    #[test]
    fn velocity_decays_under_equal_strength() {
        let t = tuning(5.0, 0.9, 0.01);
        let mut rope = RopeState {
            displacement: 0.0,
            velocity: 1.0,
        };
        for _ in 0..200 {
            rope = PhysicsSystem::step(rope, 2.0, 2.0, &t);
        }
        assert!(rope.velocity.abs() < 1e-6);
        // Total drift is bounded by the geometric series v * f / (1 - f)
        assert!(rope.displacement <= 9.0 + 1e-9);
    }

    #[test]
    fn win_side_respects_threshold_and_tie_break() {
        assert_eq!(PhysicsSystem::winning_side(-50.0, 50.0), Some(Side::Left));
        assert_eq!(PhysicsSystem::winning_side(50.1, 50.0), Some(Side::Right));
        assert_eq!(PhysicsSystem::winning_side(49.9, 50.0), None);
        // Degenerate zero threshold satisfies both; left is evaluated first
        assert_eq!(PhysicsSystem::winning_side(0.0, 0.0), Some(Side::Left));
    }

    #[test]
    fn advantage_is_mirrored_per_side() {
        assert_eq!(PhysicsSystem::advantage(25.0, 50.0, Side::Right), 0.5);
        assert_eq!(PhysicsSystem::advantage(25.0, 50.0, Side::Left), -0.5);
        assert_eq!(PhysicsSystem::advantage(-80.0, 50.0, Side::Left), 1.0);
    }
}
