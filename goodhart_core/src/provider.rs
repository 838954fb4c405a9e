//! Providers: the actors being measured.
//!
//! A provider holds only public and private state. It never learns its true
//! capability; its belief is smoothed toward whatever the leaderboard says
//! about it, which is exactly what makes benchmark gaming self-deceiving.
//! The portfolio it plans is converted into a capability delta by the
//! Orchestrator, not here.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

use crate::decision::{
    heuristic_portfolio, DecisionContext, DecisionEngine, EcosystemContext, HistoryEntry,
    PortfolioDecision,
};
use crate::error::ReasonerError;
use crate::state::{Portfolio, PublicState};
use crate::stats::Window;

/// Smoothing rate of own-capability belief toward the published score.
const BELIEF_LEARNING_RATE: f64 = 0.3;

/// Smoothing rate of the gaming-risk belief toward observed inflation.
const GAMING_RISK_LEARNING_RATE: f64 = 0.2;

/// Competitor beliefs average the last this-many observed scores.
const COMPETITOR_WINDOW: usize = 3;

/// Bounded decision-history depth handed to decision engines.
const HISTORY_WINDOW: usize = 8;

/// Strategy archetypes with fixed portfolio tilts.
///
/// The archetype is the behavioral tag; the free-text profile on the
/// provider is a display label only and never branched on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyArchetype {
    /// Chases the leaderboard: extra evaluation engineering, less safety.
    Aggressive,
    /// Plays the long game: extra research, less evaluation engineering.
    QualityFocused,
    /// Hedges: extra safety alignment, less evaluation engineering.
    RiskAverse,
    /// No tilt.
    Balanced,
}

impl Default for StrategyArchetype {
    fn default() -> Self {
        StrategyArchetype::Balanced
    }
}

/// Private beliefs: visible to the provider itself and to logging, nobody
/// else.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderBeliefs {
    /// Estimated own capability, smoothed toward published scores.
    pub own_capability: f64,

    /// Estimated gameability of the current benchmark suite.
    pub gaming_risk: f64,

    /// Rolling-window mean per competitor.
    pub competitors: BTreeMap<String, f64>,

    competitor_windows: BTreeMap<String, Window<f64>>,
}

impl ProviderBeliefs {
    fn new(initial_capability_belief: f64) -> Self {
        Self {
            own_capability: initial_capability_belief.clamp(0.0, 1.0),
            gaming_risk: 0.0,
            competitors: BTreeMap::new(),
            competitor_windows: BTreeMap::new(),
        }
    }
}

/// Outcome of planning one round's portfolio.
#[derive(Debug, Clone)]
pub struct PlanOutcome {
    pub decision: PortfolioDecision,

    /// Set when the configured engine failed and the heuristic answered
    /// instead. Recorded on the round record, never propagated.
    pub fallback_from: Option<ReasonerError>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provider {
    public: PublicState,
    beliefs: ProviderBeliefs,
    archetype: StrategyArchetype,

    /// Display label only (e.g. "scrappy aggressive startup").
    pub profile: String,

    portfolio: Portfolio,
    history: Window<HistoryEntry>,
}

impl Provider {
    pub fn new(
        name: impl Into<String>,
        archetype: StrategyArchetype,
        profile: impl Into<String>,
        initial_capability_belief: f64,
    ) -> Self {
        Self {
            public: PublicState::new(name),
            beliefs: ProviderBeliefs::new(initial_capability_belief),
            archetype,
            profile: profile.into(),
            portfolio: Portfolio::EVEN,
            history: Window::new(HISTORY_WINDOW),
        }
    }

    /// Sets the starting portfolio (the even split otherwise).
    pub fn with_portfolio(mut self, portfolio: Portfolio) -> Self {
        self.portfolio = portfolio.normalized();
        self
    }

    pub fn name(&self) -> &str {
        &self.public.name
    }

    pub fn public(&self) -> &PublicState {
        &self.public
    }

    pub fn beliefs(&self) -> &ProviderBeliefs {
        &self.beliefs
    }

    pub fn archetype(&self) -> StrategyArchetype {
        self.archetype
    }

    pub fn portfolio(&self) -> Portfolio {
        self.portfolio
    }

    /// Ingests this round's published composite score.
    ///
    /// The positive residual between the score and the prior belief feeds
    /// the gaming-risk estimate (scores persistently above what the
    /// provider thought it was worth look like an exploitable instrument),
    /// then the belief itself is smoothed toward the score.
    pub fn record_published(&mut self, round: u64, composite: f64) {
        let residual = (composite - self.beliefs.own_capability).clamp(0.0, 1.0);
        self.beliefs.gaming_risk +=
            GAMING_RISK_LEARNING_RATE * (residual - self.beliefs.gaming_risk);

        self.beliefs.own_capability +=
            BELIEF_LEARNING_RATE * (composite - self.beliefs.own_capability);

        self.public.publish(round, composite);
        self.history.push(HistoryEntry {
            round,
            score: composite,
            portfolio: self.portfolio,
        });
    }

    /// Ingests a competitor's published score; belief is the mean of the
    /// last [`COMPETITOR_WINDOW`] observations.
    pub fn observe_competitor(&mut self, competitor: &str, score: f64) {
        let window = self
            .beliefs
            .competitor_windows
            .entry(competitor.to_string())
            .or_insert_with(|| Window::new(COMPETITOR_WINDOW));
        window.push(score);
        if let Some(mean) = window.mean() {
            self.beliefs.competitors.insert(competitor.to_string(), mean);
        }
    }

    /// Builds the decision context: public + private state only.
    pub fn decision_context(&self, ecosystem: Option<EcosystemContext>) -> DecisionContext {
        DecisionContext {
            provider: self.public.name.clone(),
            archetype: self.archetype,
            believed_capability: self.beliefs.own_capability,
            believed_exploitability: self.beliefs.gaming_risk,
            competitor_beliefs: self.beliefs.competitors.clone(),
            recent_history: self.history.iter().cloned().collect(),
            ecosystem,
        }
    }

    /// Serialized public+private summary for logging or an external
    /// reasoner prompt.
    pub fn get_context(&self) -> serde_json::Value {
        serde_json::json!({
            "name": self.public.name,
            "profile": self.profile,
            "archetype": self.archetype,
            "current_round": self.public.current_round,
            "published_scores": self.public.published_scores(),
            "beliefs": self.beliefs,
            "portfolio": self.portfolio,
        })
    }

    /// Plans this round's portfolio through the given engine.
    ///
    /// Engine failure is recovered on the spot with the heuristic; the
    /// error rides along in the outcome for the round record.
    pub fn plan(
        &mut self,
        engine: &mut dyn DecisionEngine,
        ecosystem: Option<EcosystemContext>,
    ) -> PlanOutcome {
        let ctx = self.decision_context(ecosystem);

        let (decision, fallback_from) = match engine.decide(&ctx).and_then(PortfolioDecision::sanitized) {
            Ok(decision) => (decision, None),
            Err(error) => {
                warn!(
                    provider = %self.public.name,
                    engine = engine.name(),
                    %error,
                    "decision engine failed; using heuristic"
                );
                let decision = PortfolioDecision {
                    portfolio: heuristic_portfolio(&ctx),
                    rationale: None,
                };
                (decision, Some(error))
            }
        };

        self.portfolio = decision.portfolio;
        PlanOutcome { decision, fallback_from }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::HeuristicEngine;
    use approx::assert_relative_eq;

    struct FailingEngine;

    impl DecisionEngine for FailingEngine {
        fn name(&self) -> &str {
            "failing"
        }
        fn decide(&mut self, _ctx: &DecisionContext) -> Result<PortfolioDecision, ReasonerError> {
            Err(ReasonerError::Timeout(500))
        }
    }

    struct MalformedEngine;

    impl DecisionEngine for MalformedEngine {
        fn name(&self) -> &str {
            "malformed"
        }
        fn decide(&mut self, _ctx: &DecisionContext) -> Result<PortfolioDecision, ReasonerError> {
            Ok(PortfolioDecision {
                portfolio: Portfolio {
                    fundamental_research: f64::INFINITY,
                    training_optimization: 0.0,
                    evaluation_engineering: 0.0,
                    safety_alignment: 0.0,
                },
                rationale: None,
            })
        }
    }

    #[test]
    fn test_belief_smoothing() {
        let mut provider = Provider::new("alpha", StrategyArchetype::Balanced, "test", 0.5);
        provider.record_published(1, 0.8);
        // 0.5 + 0.3 * (0.8 - 0.5)
        assert_relative_eq!(provider.beliefs().own_capability, 0.59);
    }

    #[test]
    fn test_gaming_risk_tracks_positive_residual() {
        let mut provider = Provider::new("alpha", StrategyArchetype::Balanced, "test", 0.3);
        provider.record_published(1, 0.8);
        // Residual 0.5 observed once at learning rate 0.2.
        assert_relative_eq!(provider.beliefs().gaming_risk, 0.1);

        // Scores below belief never push gaming risk up.
        let mut honest = Provider::new("beta", StrategyArchetype::Balanced, "test", 0.9);
        honest.record_published(1, 0.5);
        assert_eq!(honest.beliefs().gaming_risk, 0.0);
    }

    #[test]
    fn test_competitor_rolling_window() {
        let mut provider = Provider::new("alpha", StrategyArchetype::Balanced, "test", 0.5);
        for score in [0.2, 0.4, 0.6, 0.8] {
            provider.observe_competitor("beta", score);
        }
        // Mean of the last 3: (0.4 + 0.6 + 0.8) / 3
        assert_relative_eq!(provider.beliefs().competitors["beta"], 0.6);
    }

    #[test]
    fn test_plan_normalizes_and_stores_portfolio() {
        let mut provider = Provider::new("alpha", StrategyArchetype::Aggressive, "test", 0.4);
        provider.observe_competitor("beta", 0.9);

        let outcome = provider.plan(&mut HeuristicEngine, None);
        assert!(outcome.fallback_from.is_none());
        assert!(outcome.decision.portfolio.is_normalized());
        assert_eq!(provider.portfolio(), outcome.decision.portfolio);
    }

    #[test]
    fn test_engine_failure_falls_back_to_heuristic() {
        let mut provider = Provider::new("alpha", StrategyArchetype::Balanced, "test", 0.5);
        let outcome = provider.plan(&mut FailingEngine, None);

        assert!(matches!(outcome.fallback_from, Some(ReasonerError::Timeout(_))));
        assert!(provider.portfolio().is_normalized());
        assert_eq!(provider.portfolio(), Portfolio::EVEN);
    }

    #[test]
    fn test_malformed_output_falls_back() {
        let mut provider = Provider::new("alpha", StrategyArchetype::Balanced, "test", 0.5);
        let outcome = provider.plan(&mut MalformedEngine, None);

        assert!(outcome.fallback_from.is_some());
        assert!(provider.portfolio().is_normalized());
    }

    #[test]
    fn test_context_excludes_nothing_it_should_have_and_round_trips() {
        let mut provider = Provider::new("alpha", StrategyArchetype::RiskAverse, "careful lab", 0.5);
        provider.record_published(1, 0.6);

        let value = provider.get_context();
        assert_eq!(value["name"], "alpha");
        assert!(value.get("true_capability").is_none());

        let json = serde_json::to_string(&provider).unwrap();
        let back: Provider = serde_json::from_str(&json).unwrap();
        assert_eq!(back.name(), "alpha");
        assert_relative_eq!(back.beliefs().own_capability, provider.beliefs().own_capability);
    }
}
