//! Match tuning values and their validation

use serde::{Deserialize, Serialize};

/// Process-wide match tunables.
///
/// Loaded once at match setup and immutable while the match runs. A new
/// match may use different values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchTuning {
    /// Rope distance magnitude that ends the match
    pub winning_threshold: f64,
    /// Seconds per round
    pub round_duration: u32,
    /// Simulated rope mass
    pub mass: f64,
    /// Multiplicative damping applied to velocity every tick, in (0, 1]
    pub friction: f64,
    /// Pull force per unit of crew strength
    pub pull_force_multiplier: f64,
}

impl Default for MatchTuning {
    fn default() -> Self {
        Self {
            winning_threshold: 50.0,
            round_duration: 30,
            mass: 5.0,
            friction: 0.95,
            pull_force_multiplier: 0.01,
        }
    }
}

impl MatchTuning {
    /// Reject values the simulation cannot run with.
    pub fn validate(&self) -> Result<(), TuningError> {
        if !self.winning_threshold.is_finite() || self.winning_threshold <= 0.0 {
            return Err(TuningError::Threshold(self.winning_threshold));
        }
        if self.round_duration == 0 {
            return Err(TuningError::RoundDuration);
        }
        if !self.mass.is_finite() || self.mass <= 0.0 {
            return Err(TuningError::Mass(self.mass));
        }
        if !(self.friction > 0.0 && self.friction <= 1.0) {
            return Err(TuningError::Friction(self.friction));
        }
        if !self.pull_force_multiplier.is_finite() || self.pull_force_multiplier < 0.0 {
            return Err(TuningError::PullForce(self.pull_force_multiplier));
        }
        Ok(())
    }

    /// Validate and return self, for builder-style call sites.
    pub fn validated(self) -> Result<Self, TuningError> {
        self.validate()?;
        Ok(self)
    }
}

/// Tuning validation errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TuningError {
    #[error("Winning threshold must be positive, got {0}")]
    Threshold(f64),

    #[error("Round duration must be at least one second")]
    RoundDuration,

    #[error("Mass must be positive, got {0}")]
    Mass(f64),

    #[error("Friction must be in (0, 1], got {0}")]
    Friction(f64),

    #[error("Pull force multiplier must be non-negative, got {0}")]
    PullForce(f64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_tuning_is_valid() {
        assert!(MatchTuning::default().validate().is_ok());
    }

    #[test]
    fn rejects_non_positive_mass() {
        let tuning = MatchTuning {
            mass: 0.0,
            ..MatchTuning::default()
        };
        assert_eq!(tuning.validate(), Err(TuningError::Mass(0.0)));

        let tuning = MatchTuning {
            mass: -2.0,
            ..MatchTuning::default()
        };
        assert!(matches!(tuning.validate(), Err(TuningError::Mass(_))));
    }

    #[test]
    fn friction_must_lie_in_half_open_unit_interval() {
        for bad in [0.0, -0.1, 1.01, f64::NAN] {
            let tuning = MatchTuning {
                friction: bad,
                ..MatchTuning::default()
            };
            assert!(matches!(tuning.validate(), Err(TuningError::Friction(_))));
        }

        let no_damping = MatchTuning {
            friction: 1.0,
            ..MatchTuning::default()
        };
        assert!(no_damping.validate().is_ok());
    }

    #[test]
    fn rejects_zero_round_duration_and_threshold() {
        let tuning = MatchTuning {
            round_duration: 0,
            ..MatchTuning::default()
        };
        assert_eq!(tuning.validate(), Err(TuningError::RoundDuration));

        let tuning = MatchTuning {
            winning_threshold: 0.0,
            ..MatchTuning::default()
        };
        assert!(matches!(tuning.validate(), Err(TuningError::Threshold(_))));
    }
}
