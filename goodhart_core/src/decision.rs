//! Portfolio decision engines.
//!
//! Every provider decision flows through the [`DecisionEngine`] trait. The
//! deterministic [`HeuristicEngine`] is the mandatory default; an external
//! reasoner (an LLM, a learned policy) can be plugged in behind the same
//! interface, and any failure it reports is recovered by re-deciding with
//! the heuristic. The Orchestrator therefore always holds a concrete,
//! non-optional engine per provider.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::ReasonerError;
use crate::provider::StrategyArchetype;
use crate::state::Portfolio;

/// One row of a provider's bounded decision history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub round: u64,
    pub score: f64,
    pub portfolio: Portfolio,
}

/// Optional ecosystem signals a provider may condition on.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EcosystemContext {
    pub own_satisfaction: Option<f64>,
    pub own_market_share: Option<f64>,
    pub active_regulations: Vec<String>,
}

/// Everything a decision engine is allowed to see: the provider's beliefs
/// and public history, nothing more. This is the serialized form of
/// `get_context()` for providers; ground truth cannot appear here because
/// this crate cannot name it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionContext {
    pub provider: String,
    pub archetype: StrategyArchetype,
    pub believed_capability: f64,

    /// The provider's estimate of how gameable the current benchmarks are.
    pub believed_exploitability: f64,

    pub competitor_beliefs: BTreeMap<String, f64>,
    pub recent_history: Vec<HistoryEntry>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ecosystem: Option<EcosystemContext>,
}

/// The output of a decision: a portfolio plus an optional free-text
/// rationale (kept for logging, never parsed).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioDecision {
    pub portfolio: Portfolio,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
}

impl PortfolioDecision {
    /// Rejects non-finite or negative fractions, then normalizes.
    ///
    /// External reasoners return arbitrary numbers; this is the only gate
    /// between their output and the simulation.
    pub fn sanitized(self) -> Result<PortfolioDecision, ReasonerError> {
        let p = self.portfolio;
        for fraction in [
            p.fundamental_research,
            p.training_optimization,
            p.evaluation_engineering,
            p.safety_alignment,
        ] {
            if !fraction.is_finite() || fraction < 0.0 {
                return Err(ReasonerError::NonNumeric(fraction));
            }
        }
        Ok(PortfolioDecision {
            portfolio: p.normalized(),
            rationale: self.rationale,
        })
    }
}

/// A pluggable portfolio decision strategy.
pub trait DecisionEngine {
    fn name(&self) -> &str;

    /// Decides a portfolio for the given context. May fail; the caller
    /// always has the heuristic fallback.
    fn decide(&mut self, ctx: &DecisionContext) -> Result<PortfolioDecision, ReasonerError>;
}

// Heuristic tuning.
const GAP_SENSITIVITY: f64 = 0.3;
const MAX_GAP_SHIFT: f64 = 0.15;
const ARCHETYPE_SHIFT: f64 = 0.05;

/// Computes the deterministic heuristic portfolio for a context.
///
/// Start even; shift between research and evaluation engineering in
/// proportion to the gap versus the strongest known competitor (behind →
/// chase the leaderboard, ahead → invest in fundamentals); then apply the
/// archetype's fixed tilt; finally renormalize.
pub fn heuristic_portfolio(ctx: &DecisionContext) -> Portfolio {
    let mut p = Portfolio::EVEN;

    let strongest = ctx
        .competitor_beliefs
        .values()
        .copied()
        .fold(f64::NEG_INFINITY, f64::max);
    let gap = if strongest.is_finite() {
        strongest - ctx.believed_capability
    } else {
        0.0
    };
    let shift = (gap * GAP_SENSITIVITY).clamp(-MAX_GAP_SHIFT, MAX_GAP_SHIFT);
    p.evaluation_engineering += shift;
    p.fundamental_research -= shift;

    match ctx.archetype {
        StrategyArchetype::Aggressive => {
            p.evaluation_engineering += ARCHETYPE_SHIFT;
            p.safety_alignment -= ARCHETYPE_SHIFT;
        }
        StrategyArchetype::QualityFocused => {
            p.fundamental_research += ARCHETYPE_SHIFT;
            p.evaluation_engineering -= ARCHETYPE_SHIFT;
        }
        StrategyArchetype::RiskAverse => {
            p.safety_alignment += ARCHETYPE_SHIFT;
            p.evaluation_engineering -= ARCHETYPE_SHIFT;
        }
        StrategyArchetype::Balanced => {}
    }

    p.normalized()
}

/// The mandatory default engine: deterministic, infallible, no external
/// calls.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicEngine;

impl DecisionEngine for HeuristicEngine {
    fn name(&self) -> &str {
        "heuristic"
    }

    fn decide(&mut self, ctx: &DecisionContext) -> Result<PortfolioDecision, ReasonerError> {
        Ok(PortfolioDecision {
            portfolio: heuristic_portfolio(ctx),
            rationale: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn ctx(archetype: StrategyArchetype, own: f64, competitors: &[(&str, f64)]) -> DecisionContext {
        DecisionContext {
            provider: "alpha".to_string(),
            archetype,
            believed_capability: own,
            believed_exploitability: 0.3,
            competitor_beliefs: competitors
                .iter()
                .map(|(n, v)| (n.to_string(), *v))
                .collect(),
            recent_history: Vec::new(),
            ecosystem: None,
        }
    }

    #[test]
    fn test_heuristic_sums_to_one() {
        for archetype in [
            StrategyArchetype::Aggressive,
            StrategyArchetype::QualityFocused,
            StrategyArchetype::RiskAverse,
            StrategyArchetype::Balanced,
        ] {
            let p = heuristic_portfolio(&ctx(archetype, 0.3, &[("beta", 0.9)]));
            assert!(p.is_normalized(), "{archetype:?}: total {}", p.total());
        }
    }

    #[test]
    fn test_behind_shifts_toward_evaluation_engineering() {
        let behind = heuristic_portfolio(&ctx(StrategyArchetype::Balanced, 0.2, &[("beta", 0.9)]));
        let ahead = heuristic_portfolio(&ctx(StrategyArchetype::Balanced, 0.9, &[("beta", 0.2)]));

        assert!(behind.evaluation_engineering > ahead.evaluation_engineering);
        assert!(ahead.fundamental_research > behind.fundamental_research);
    }

    #[test]
    fn test_gap_shift_is_clamped() {
        // A huge gap still shifts at most 15 points before normalization.
        let p = heuristic_portfolio(&ctx(StrategyArchetype::Balanced, 0.0, &[("beta", 10.0)]));
        assert_relative_eq!(p.evaluation_engineering, 0.40, epsilon = 1e-9);
        assert_relative_eq!(p.fundamental_research, 0.10, epsilon = 1e-9);
    }

    #[test]
    fn test_no_competitors_is_even_split() {
        let p = heuristic_portfolio(&ctx(StrategyArchetype::Balanced, 0.5, &[]));
        assert_eq!(p, Portfolio::EVEN);
    }

    #[test]
    fn test_archetype_tilts() {
        let aggressive = heuristic_portfolio(&ctx(StrategyArchetype::Aggressive, 0.5, &[("b", 0.5)]));
        let cautious = heuristic_portfolio(&ctx(StrategyArchetype::RiskAverse, 0.5, &[("b", 0.5)]));

        assert!(aggressive.evaluation_engineering > cautious.evaluation_engineering);
        assert!(cautious.safety_alignment > aggressive.safety_alignment);
    }

    #[test]
    fn test_sanitize_rejects_non_numeric() {
        let bad = PortfolioDecision {
            portfolio: Portfolio {
                fundamental_research: f64::NAN,
                training_optimization: 0.3,
                evaluation_engineering: 0.3,
                safety_alignment: 0.4,
            },
            rationale: None,
        };
        assert!(matches!(bad.sanitized(), Err(ReasonerError::NonNumeric(_))));

        let negative = PortfolioDecision {
            portfolio: Portfolio {
                fundamental_research: -0.1,
                training_optimization: 0.4,
                evaluation_engineering: 0.4,
                safety_alignment: 0.3,
            },
            rationale: None,
        };
        assert!(negative.sanitized().is_err());
    }

    #[test]
    fn test_sanitize_normalizes() {
        let unnormalized = PortfolioDecision {
            portfolio: Portfolio {
                fundamental_research: 2.0,
                training_optimization: 1.0,
                evaluation_engineering: 1.0,
                safety_alignment: 0.0,
            },
            rationale: Some("double down on research".to_string()),
        };
        let clean = unnormalized.sanitized().unwrap();
        assert!(clean.portfolio.is_normalized());
        assert_relative_eq!(clean.portfolio.fundamental_research, 0.5);
    }
}
