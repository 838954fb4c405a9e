//! Benchmark parameters and the Goodhart evolution rule.
//!
//! A benchmark is the measurement instrument of the ecosystem. Two
//! orthogonal knobs describe how it can fail:
//!
//! - `validity` (inverse noise): low validity widens score variance.
//! - `exploitability` (gaming leverage): directed evaluation-engineering
//!   investment shifts the score mean above true capability.
//!
//! Sustained gaming pressure degrades validity and grows exploitability:
//! the instrument wears out exactly as fast as it is gamed.

use serde::{Deserialize, Serialize};

/// Validity never decays below this floor.
pub const MIN_VALIDITY: f64 = 0.2;

/// Exploitability never grows past this cap.
pub const MAX_EXPLOITABILITY: f64 = 0.95;

/// Fresh benchmarks start as good instruments: high validity, low leverage.
pub const FRESH_VALIDITY: f64 = 0.85;
pub const FRESH_EXPLOITABILITY: f64 = 0.15;

/// A single benchmark. Once introduced it persists for the rest of the run;
/// there is no retirement, only decay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Benchmark {
    pub name: String,

    /// Inverse measurement noise, in [0, 1].
    pub validity: f64,

    /// Gaming leverage, in [0, 1].
    pub exploitability: f64,

    /// Base standard deviation of the score draw (scaled by validity).
    pub noise_level: f64,

    /// Weight in the composite score (normalized across benchmarks).
    pub weight: f64,

    /// Per-unit-pressure multiplicative validity decay.
    pub validity_decay_rate: f64,

    /// Per-unit-pressure multiplicative exploitability growth.
    pub exploitability_growth_rate: f64,
}

impl Benchmark {
    pub fn new(name: impl Into<String>, validity: f64, exploitability: f64, noise_level: f64) -> Self {
        Self {
            name: name.into(),
            validity: validity.clamp(0.0, 1.0),
            exploitability: exploitability.clamp(0.0, 1.0),
            noise_level: noise_level.max(0.0),
            weight: 1.0,
            validity_decay_rate: 0.0,
            exploitability_growth_rate: 0.0,
        }
    }

    /// Sets the evolution rates.
    pub fn with_evolution(mut self, decay_rate: f64, growth_rate: f64) -> Self {
        self.validity_decay_rate = decay_rate.max(0.0);
        self.exploitability_growth_rate = growth_rate.max(0.0);
        self
    }

    /// Sets the composite weight.
    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight.max(0.0);
        self
    }

    /// A freshly introduced benchmark: high validity, low exploitability,
    /// inheriting the evolution rates of `template` (by convention the
    /// first benchmark of the run).
    pub fn fresh(name: impl Into<String>, template: &Benchmark) -> Self {
        Self {
            name: name.into(),
            validity: FRESH_VALIDITY,
            exploitability: FRESH_EXPLOITABILITY,
            noise_level: template.noise_level,
            weight: template.weight,
            validity_decay_rate: template.validity_decay_rate,
            exploitability_growth_rate: template.exploitability_growth_rate,
        }
    }

    /// The Goodhart feedback step: one round of aggregate gaming pressure.
    ///
    /// Validity decays multiplicatively (floored at [`MIN_VALIDITY`]),
    /// exploitability grows multiplicatively (capped at
    /// [`MAX_EXPLOITABILITY`]).
    pub fn apply_gaming_pressure(&mut self, pressure: f64) {
        let decay = 1.0 - self.validity_decay_rate * pressure;
        self.validity = (self.validity * decay.max(0.0)).max(MIN_VALIDITY);

        let growth = 1.0 + self.exploitability_growth_rate * pressure;
        self.exploitability = (self.exploitability * growth).min(MAX_EXPLOITABILITY);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_pressure_decays_validity_and_grows_exploitability() {
        let mut b = Benchmark::new("mmlu_like", 1.0, 0.5, 0.05).with_evolution(0.1, 0.1);
        b.apply_gaming_pressure(1.0);

        assert_relative_eq!(b.validity, 0.9);
        assert_relative_eq!(b.exploitability, 0.55);
    }

    #[test]
    fn test_validity_floor_and_exploitability_cap() {
        let mut b = Benchmark::new("worn_out", 0.25, 0.9, 0.05).with_evolution(0.5, 0.5);
        for _ in 0..20 {
            b.apply_gaming_pressure(2.0);
        }
        assert_eq!(b.validity, MIN_VALIDITY);
        assert_eq!(b.exploitability, MAX_EXPLOITABILITY);
    }

    #[test]
    fn test_fresh_inherits_template_rates() {
        let template = Benchmark::new("first", 0.3, 0.8, 0.07).with_evolution(0.02, 0.03);
        let fresh = Benchmark::fresh("second", &template);

        assert_eq!(fresh.validity, FRESH_VALIDITY);
        assert_eq!(fresh.exploitability, FRESH_EXPLOITABILITY);
        assert_eq!(fresh.noise_level, 0.07);
        assert_eq!(fresh.validity_decay_rate, 0.02);
        assert_eq!(fresh.exploitability_growth_rate, 0.03);
    }
}
