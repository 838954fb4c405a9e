//! Actor-observable state: the public and private tiers of the visibility
//! model.
//!
//! Ground truth is the third tier and deliberately does not appear in this
//! crate. It lives in the orchestrator's store (`goodhart_sim`), so no actor
//! type here can even name it, and leakage into actor reasoning is
//! impossible by construction. Actors see only their own private beliefs
//! plus the public score record below.

use serde::{Deserialize, Serialize};

/// A single published score observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScorePoint {
    pub round: u64,
    pub value: f64,
}

/// Public state: readable by every actor and the Evaluator.
///
/// The published score series is append-only and ordered by round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicState {
    pub name: String,
    pub current_round: u64,
    published_scores: Vec<ScorePoint>,
}

impl PublicState {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            current_round: 0,
            published_scores: Vec::new(),
        }
    }

    /// Appends a published score. Out-of-order rounds are ignored; the
    /// series stays monotonic by round.
    pub fn publish(&mut self, round: u64, value: f64) {
        if let Some(last) = self.published_scores.last() {
            if round <= last.round {
                return;
            }
        }
        self.current_round = round;
        self.published_scores.push(ScorePoint { round, value });
    }

    /// Full published series, oldest first.
    pub fn published_scores(&self) -> &[ScorePoint] {
        &self.published_scores
    }

    /// Most recent published score, if any.
    pub fn latest_score(&self) -> Option<f64> {
        self.published_scores.last().map(|p| p.value)
    }
}

/// An investment portfolio over the four effort categories.
///
/// Fractions always sum to 1.0 after [`Portfolio::normalized`]; the even
/// split is the neutral default used whenever normalization degenerates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Portfolio {
    pub fundamental_research: f64,
    pub training_optimization: f64,
    pub evaluation_engineering: f64,
    pub safety_alignment: f64,
}

impl Portfolio {
    /// 25% in every category.
    pub const EVEN: Portfolio = Portfolio {
        fundamental_research: 0.25,
        training_optimization: 0.25,
        evaluation_engineering: 0.25,
        safety_alignment: 0.25,
    };

    pub fn total(&self) -> f64 {
        self.fundamental_research
            + self.training_optimization
            + self.evaluation_engineering
            + self.safety_alignment
    }

    /// Returns a copy rescaled to sum 1.0. Negative or non-finite entries
    /// are clamped to zero first; a zero total degrades to the even split.
    pub fn normalized(&self) -> Portfolio {
        let mut fractions = [
            self.fundamental_research,
            self.training_optimization,
            self.evaluation_engineering,
            self.safety_alignment,
        ];
        crate::stats::normalize_weights(&mut fractions);
        Portfolio {
            fundamental_research: fractions[0],
            training_optimization: fractions[1],
            evaluation_engineering: fractions[2],
            safety_alignment: fractions[3],
        }
    }

    /// True when the fractions sum to 1.0 within floating tolerance.
    pub fn is_normalized(&self) -> bool {
        (self.total() - 1.0).abs() < 1e-6
    }
}

impl Default for Portfolio {
    fn default() -> Self {
        Self::EVEN
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_publish_append_only_by_round() {
        let mut public = PublicState::new("alpha");
        public.publish(1, 0.4);
        public.publish(2, 0.5);
        public.publish(2, 0.9); // ignored, round not advancing
        public.publish(1, 0.1); // ignored, stale

        assert_eq!(public.published_scores().len(), 2);
        assert_eq!(public.latest_score(), Some(0.5));
        assert_eq!(public.current_round, 2);
    }

    #[test]
    fn test_portfolio_normalization() {
        let p = Portfolio {
            fundamental_research: 2.0,
            training_optimization: 1.0,
            evaluation_engineering: 1.0,
            safety_alignment: 0.0,
        }
        .normalized();

        assert!(p.is_normalized());
        assert_relative_eq!(p.fundamental_research, 0.5);
        assert_relative_eq!(p.safety_alignment, 0.0);
    }

    #[test]
    fn test_portfolio_zero_total_degrades_to_even() {
        let p = Portfolio {
            fundamental_research: 0.0,
            training_optimization: 0.0,
            evaluation_engineering: 0.0,
            safety_alignment: 0.0,
        }
        .normalized();
        assert_eq!(p, Portfolio::EVEN);
    }

    #[test]
    fn test_public_state_round_trip() {
        let mut public = PublicState::new("alpha");
        public.publish(1, 0.42);

        let json = serde_json::to_string(&public).unwrap();
        let back: PublicState = serde_json::from_str(&json).unwrap();
        assert_eq!(back.name, "alpha");
        assert_eq!(back.latest_score(), Some(0.42));
    }
}
