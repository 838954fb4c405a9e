//! The Orchestrator: owns ground truth and drives the round state machine.
//!
//! Setup -> rounds -> done. Round 0 is a baseline measurement (evaluate and
//! publish only); every later round runs the full cycle in a fixed order:
//!
//! 1. provider planning + capability dynamics (prior round's funding
//!    multipliers apply here)
//! 2. evaluation + benchmark evolution + introduction check
//! 3. publication + belief updates
//! 4. media coverage
//! 5. consumer market (consumes the *previous* round's coverage)
//! 6. policymaker observation and intervention
//! 7. funder allocation (becomes next round's multipliers)
//! 8. round-record assembly
//!
//! The Orchestrator and the Evaluator are the only components that read the
//! ground-truth store, and everything they pass onward is a plain number.

use rand::Rng;
use std::collections::BTreeMap;
use tracing::{debug, info};

use goodhart_core::config::SimulationConfig;
use goodhart_core::decision::{DecisionEngine, EcosystemContext, HeuristicEngine};
use goodhart_core::error::ConfigError;
use goodhart_core::evaluator::{EvaluationInput, Evaluator, RoundScores};
use goodhart_core::funder::{Funder, FunderObservation};
use goodhart_core::market::{ConsumerMarket, MarketReport, Segment};
use goodhart_core::media::{MediaOutlet, MediaReport};
use goodhart_core::policymaker::{Policymaker, PolicySignals};
use goodhart_core::provider::Provider;
use goodhart_core::record::{
    BenchmarkSnapshot, FundingRecord, PolicyRecord, ReasonerFailureRecord, RegulationSummary,
    RoundRecord,
};
use goodhart_core::state::Portfolio;

use crate::ground_truth::GroundTruthStore;

/// Capability payoff per unit of investment, by category. Evaluation
/// engineering buys scores, not capability.
const RESEARCH_MULTIPLIER: f64 = 1.5;
const TRAINING_MULTIPLIER: f64 = 1.0;
const SAFETY_MULTIPLIER: f64 = 0.1;
const EVAL_ENG_MULTIPLIER: f64 = 0.0;

pub struct Orchestrator {
    config: SimulationConfig,
    truth: GroundTruthStore,

    evaluator: Evaluator,
    providers: Vec<Provider>,
    engines: BTreeMap<String, Box<dyn DecisionEngine>>,
    market: ConsumerMarket,
    policymakers: Vec<Policymaker>,
    funders: Vec<Funder>,
    media: Option<MediaOutlet>,

    /// Last round's coverage; the market reads it one round late.
    previous_media: Option<MediaReport>,

    /// Last round's market report; providers and funders condition on it.
    previous_market: Option<MarketReport>,

    /// provider -> capability multiplier from last round's funding, in
    /// [1, 2]. Applied during planning/dynamics of the *next* round.
    funding_multipliers: BTreeMap<String, f64>,

    round: u64,
    history: Vec<RoundRecord>,
}

impl Orchestrator {
    /// Validates the config and builds the whole ecosystem.
    pub fn new(config: SimulationConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let benchmarks = config
            .benchmarks
            .iter()
            .map(|b| b.build(config.evolution))
            .collect();
        let evaluator = Evaluator::new(benchmarks, config.seed)
            .with_introduction(config.introduction.cooldown, config.introduction.max_benchmarks);

        let mut truth = GroundTruthStore::new();
        let mut providers = Vec::new();
        let mut engines: BTreeMap<String, Box<dyn DecisionEngine>> = BTreeMap::new();
        for pc in &config.providers {
            truth.insert_provider(&pc.name, pc.initial_capability);
            let belief = pc.initial_belief.unwrap_or(pc.initial_capability);
            let mut provider = Provider::new(&pc.name, pc.archetype, &pc.profile, belief);
            if let Some(portfolio) = pc.initial_portfolio {
                provider = provider.with_portfolio(portfolio);
            }
            providers.push(provider);
            engines.insert(pc.name.clone(), Box::new(HeuristicEngine));
        }

        let provider_names: Vec<String> = providers.iter().map(|p| p.name().to_string()).collect();
        let mut segments = Vec::new();
        for sc in &config.segments {
            let segment = Segment::new(
                &sc.archetype,
                &sc.use_case,
                sc.size,
                sc.leaderboard_trust,
                &provider_names,
            )
            .with_benchmark_weights(sc.benchmark_weights.clone());
            truth.insert_segment(segment.name(), sc.quality_sensitivity);
            segments.push(segment);
        }
        let market = ConsumerMarket::new(segments).with_switch_rate_cap(config.switch_rate_cap);

        let mut policymakers = Vec::new();
        for pm in &config.policymakers {
            truth.insert_policymaker(&pm.name, pm.risk_tolerance, pm.intervention_effectiveness);
            policymakers.push(Policymaker::new(&pm.name, pm.intervention_threshold));
        }

        let mut funders = Vec::new();
        for fc in &config.funders {
            truth.insert_funder(&fc.name, fc.true_roi, fc.funding_efficiency);
            funders.push(
                Funder::new(&fc.name, fc.profile, fc.capital_per_round)
                    .with_cooldown(fc.cooldown)
                    .with_max_fraction(fc.max_fraction_per_provider),
            );
        }

        let media = config
            .media
            .as_ref()
            .map(|mc| MediaOutlet::new(&mc.name, mc.newsworthy_delta));

        info!(
            seed = config.seed,
            providers = providers.len(),
            segments = market.segments().len(),
            "ecosystem assembled"
        );

        Ok(Self {
            config,
            truth,
            evaluator,
            providers,
            engines,
            market,
            policymakers,
            funders,
            media,
            previous_media: None,
            previous_market: None,
            funding_multipliers: BTreeMap::new(),
            round: 0,
            history: Vec::new(),
        })
    }

    /// Replaces a provider's decision engine (the heuristic is the default).
    /// No-op for unknown providers.
    pub fn set_engine(&mut self, provider: &str, engine: Box<dyn DecisionEngine>) {
        if self.engines.contains_key(provider) {
            self.engines.insert(provider.to_string(), engine);
        }
    }

    pub fn round(&self) -> u64 {
        self.round
    }

    pub fn history(&self) -> &[RoundRecord] {
        &self.history
    }

    pub fn evaluator(&self) -> &Evaluator {
        &self.evaluator
    }

    pub fn providers(&self) -> &[Provider] {
        &self.providers
    }

    pub fn truth(&self) -> &GroundTruthStore {
        &self.truth
    }

    pub fn funders(&self) -> &[Funder] {
        &self.funders
    }

    /// True once the baseline and every configured round have run.
    pub fn finished(&self) -> bool {
        self.round > self.config.rounds
    }

    /// Runs round 0 plus `config.rounds` full rounds, returning the history.
    pub fn run(&mut self) -> &[RoundRecord] {
        while !self.finished() {
            self.step();
        }
        &self.history
    }

    /// Advances the simulation one round and returns its finalized record.
    pub fn step(&mut self) -> RoundRecord {
        let round = self.round;
        debug!(round, "round start");

        let mut reasoner_failures = Vec::new();
        if round > 0 {
            reasoner_failures = self.plan_portfolios();
            self.apply_capability_dynamics();
        }

        // Evaluation and benchmark evolution. The baseline round measures
        // with zero gaming investment (no provider has planned yet), and
        // the feedback loop starts at round 1.
        let inputs: Vec<EvaluationInput> = self
            .providers
            .iter()
            .map(|p| EvaluationInput {
                name: p.name().to_string(),
                true_capability: self.truth.provider_capability(p.name()).unwrap_or(0.0),
                evaluation_engineering: if round == 0 {
                    0.0
                } else {
                    p.portfolio().evaluation_engineering
                },
            })
            .collect();
        let scores = self.evaluator.evaluate_all(&inputs, round);

        if round > 0 {
            let aggregate_gaming: f64 = inputs.iter().map(|i| i.evaluation_engineering).sum();
            self.evaluator.update_benchmarks(aggregate_gaming);
            self.evaluator.consider_new_benchmark(round);
        }

        // Publication and belief updates.
        for index in 0..self.providers.len() {
            let name = self.providers[index].name().to_string();
            if let Some(composite) = scores.score(&name) {
                self.providers[index].record_published(round, composite);
            }
            for (other, other_score) in &scores.composite {
                if *other != name {
                    self.providers[index].observe_competitor(other, *other_score);
                }
            }
        }

        let media_report = self.media.as_mut().map(|outlet| outlet.cover(&scores));

        let (market_report, policy_record, funding_record) = if round > 0 {
            let market_report = self.run_market(round, &scores);
            let policy_record = self.run_policymakers(round, &market_report);
            let funding_record = self.run_funders(round, &scores, market_report.as_ref());
            (market_report, policy_record, funding_record)
        } else {
            (None, None, None)
        };

        let record = self.assemble_record(
            round,
            &scores,
            market_report.clone(),
            policy_record,
            funding_record,
            media_report.clone(),
            reasoner_failures,
        );

        self.previous_media = media_report;
        if market_report.is_some() {
            self.previous_market = market_report;
        }
        self.round += 1;
        self.history.push(record.clone());
        record
    }

    /// Step 1a: every provider plans its portfolio through its engine.
    fn plan_portfolios(&mut self) -> Vec<ReasonerFailureRecord> {
        let active_regulations: Vec<String> = self
            .evaluator
            .regulations()
            .iter()
            .filter(|r| r.active)
            .map(|r| r.name.clone())
            .collect();

        let mut failures = Vec::new();
        for provider in &mut self.providers {
            let ecosystem = EcosystemContext {
                own_satisfaction: self
                    .previous_market
                    .as_ref()
                    .and_then(|m| m.provider_satisfaction.get(provider.name()).copied()),
                own_market_share: self
                    .previous_market
                    .as_ref()
                    .map(|m| m.share(provider.name())),
                active_regulations: active_regulations.clone(),
            };

            if let Some(engine) = self.engines.get_mut(provider.name()) {
                let outcome = provider.plan(engine.as_mut(), Some(ecosystem));
                if let Some(error) = outcome.fallback_from {
                    failures.push(ReasonerFailureRecord {
                        provider: provider.name().to_string(),
                        error: error.to_string(),
                    });
                }
            }
        }
        failures
    }

    /// Step 1b: portfolios become capability deltas.
    ///
    /// gain = base_efficiency x funding multiplier x category-weighted
    /// portfolio x headroom^(1/diminishing_rate), plus an occasional
    /// breakthrough rolled with probability p x research fraction.
    fn apply_capability_dynamics(&mut self) {
        let dynamics = self.config.capability;
        for provider in &self.providers {
            let name = provider.name();
            let Some(capability) = self.truth.provider_capability(name) else {
                continue;
            };
            let portfolio = provider.portfolio();
            let multiplier = self.funding_multipliers.get(name).copied().unwrap_or(1.0);

            let weighted = RESEARCH_MULTIPLIER * portfolio.fundamental_research
                + TRAINING_MULTIPLIER * portfolio.training_optimization
                + SAFETY_MULTIPLIER * portfolio.safety_alignment
                + EVAL_ENG_MULTIPLIER * portfolio.evaluation_engineering;

            let headroom = (dynamics.ceiling - capability).max(0.0);
            let diminishing = headroom.powf(1.0 / dynamics.diminishing_rate);
            let mut next = capability + dynamics.base_efficiency * multiplier * weighted * diminishing;

            // The breakthrough draws on the round's starting headroom, not
            // what is left after the incremental gain.
            let breakthrough_p =
                (dynamics.breakthrough_probability * portfolio.fundamental_research).clamp(0.0, 1.0);
            if breakthrough_p > 0.0 && self.evaluator.rng_mut().gen_bool(breakthrough_p) {
                next += dynamics.breakthrough_magnitude * headroom;
                info!(provider = %name, capability = next, "research breakthrough");
            }

            self.truth
                .set_provider_capability(name, next.min(dynamics.ceiling));
        }
    }

    /// Step 5: consumer market, fed ground truth as plain numbers and last
    /// round's media coverage.
    fn run_market(&mut self, round: u64, scores: &RoundScores) -> Option<MarketReport> {
        if self.market.segments().is_empty() {
            return None;
        }

        let true_capabilities = self.truth.provider_capabilities();
        let sensitivities = self.truth.segment_sensitivities();
        let portfolios: BTreeMap<String, Portfolio> = self
            .providers
            .iter()
            .map(|p| (p.name().to_string(), p.portfolio()))
            .collect();

        let report = self.market.update(
            round,
            scores,
            &true_capabilities,
            &sensitivities,
            &portfolios,
            self.previous_media.as_ref(),
            self.evaluator.rng_mut(),
        );

        for (segment, satisfaction) in &report.segment_satisfaction {
            self.truth.record_segment_satisfaction(segment, *satisfaction);
        }
        Some(report)
    }

    /// Step 6: policymakers observe public signals and may intervene.
    fn run_policymakers(&mut self, round: u64, market: &Option<MarketReport>) -> Option<PolicyRecord> {
        if self.policymakers.is_empty() {
            return None;
        }

        let signals = PolicySignals {
            validity_correlation: self.evaluator.validity_correlation(),
            avg_satisfaction: market.as_ref().map(|m| m.avg_satisfaction),
        };
        let least_satisfying = market.as_ref().and_then(|m| {
            m.provider_satisfaction
                .iter()
                .min_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
                .map(|(name, _)| name.clone())
        });

        let mut record = PolicyRecord::default();
        for pm in &mut self.policymakers {
            pm.observe(signals);
            if let Some(planned) = pm.plan(round, signals, least_satisfying.as_deref()) {
                record.regulations.push(RegulationSummary {
                    name: planned.regulation.name.clone(),
                    kind: planned.regulation.kind,
                    target: planned.regulation.target.clone(),
                });
                record.statements.push(planned.statement.clone());
                pm.execute(round, planned, &mut self.evaluator);
            }
            record.risk_beliefs.insert(pm.name.clone(), pm.beliefs());
        }
        Some(record)
    }

    /// Step 7: funders observe and allocate; allocations become next round's
    /// capability multipliers.
    fn run_funders(
        &mut self,
        round: u64,
        scores: &RoundScores,
        market: Option<&MarketReport>,
    ) -> Option<FundingRecord> {
        if self.funders.is_empty() {
            self.funding_multipliers.clear();
            return None;
        }

        // Diversification signal: how concentrated the *other* funders
        // already are on each provider, from their standing allocations.
        let provider_names: Vec<String> =
            self.providers.iter().map(|p| p.name().to_string()).collect();
        let mut observations_per_funder: Vec<BTreeMap<String, FunderObservation>> = Vec::new();
        for index in 0..self.funders.len() {
            let mut observations = BTreeMap::new();
            for name in &provider_names {
                let mut other_allocated = 0.0;
                let mut other_pool = 0.0;
                for (other_index, other) in self.funders.iter().enumerate() {
                    if other_index == index {
                        continue;
                    }
                    other_allocated += other.allocations().get(name).copied().unwrap_or(0.0);
                    other_pool += other.capital_per_round();
                }
                observations.insert(
                    name.clone(),
                    FunderObservation {
                        believed_quality: scores.score(name).unwrap_or(0.0),
                        market_share: market.map(|m| m.share(name)).unwrap_or(0.0),
                        under_regulation: self.evaluator.provider_under_regulation(name),
                        other_funder_share: if other_pool > f64::EPSILON {
                            (other_allocated / other_pool).clamp(0.0, 1.0)
                        } else {
                            0.0
                        },
                    },
                );
            }
            observations_per_funder.push(observations);
        }

        let mut record = FundingRecord::default();
        let mut effective_capital: BTreeMap<String, f64> = BTreeMap::new();
        let mut total_pool = 0.0;
        for (funder, observations) in self.funders.iter_mut().zip(&observations_per_funder) {
            funder.observe(observations);
            let allocations = funder.allocate(round, observations).clone();

            let efficiency = self
                .truth
                .funder(&funder.name)
                .map(|t| t.funding_efficiency)
                .unwrap_or(1.0);
            for (provider, amount) in &allocations {
                *effective_capital.entry(provider.clone()).or_insert(0.0) += amount * efficiency;
            }
            total_pool += funder.capital_per_round();
            record.allocations.insert(funder.name.clone(), allocations);
        }

        self.funding_multipliers.clear();
        for name in &provider_names {
            let capital = effective_capital.get(name).copied().unwrap_or(0.0);
            let share = if total_pool > f64::EPSILON {
                (capital / total_pool).clamp(0.0, 1.0)
            } else {
                0.0
            };
            self.funding_multipliers.insert(name.clone(), 1.0 + share);
        }
        record.multipliers = self.funding_multipliers.clone();
        Some(record)
    }

    #[allow(clippy::too_many_arguments)]
    fn assemble_record(
        &self,
        round: u64,
        scores: &RoundScores,
        consumer: Option<MarketReport>,
        policy: Option<PolicyRecord>,
        funding: Option<FundingRecord>,
        media: Option<MediaReport>,
        reasoner_failures: Vec<ReasonerFailureRecord>,
    ) -> RoundRecord {
        let benchmarks = self
            .evaluator
            .benchmarks()
            .iter()
            .map(|b| BenchmarkSnapshot {
                name: b.name.clone(),
                validity: b.validity,
                exploitability: b.exploitability,
                noise_level: b.noise_level,
                weight: b.weight,
            })
            .collect();

        RoundRecord {
            round,
            scores: scores.composite.clone(),
            benchmark_scores: scores.per_benchmark.clone(),
            true_capabilities: self.truth.provider_capabilities(),
            believed_capabilities: self
                .providers
                .iter()
                .map(|p| (p.name().to_string(), p.beliefs().own_capability))
                .collect(),
            portfolios: self
                .providers
                .iter()
                .map(|p| (p.name().to_string(), p.portfolio()))
                .collect(),
            benchmarks,
            validity_correlation: self.evaluator.validity_correlation(),
            consumer,
            policy,
            funding,
            media,
            reasoner_failures,
        }
        .finalize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use goodhart_core::config::{ProviderConfig, SegmentConfig, SimulationConfig};
    use goodhart_core::provider::StrategyArchetype;

    fn two_provider_config() -> SimulationConfig {
        let mut config = SimulationConfig::single_benchmark("bench", 1.0, 0.0, 0.0);
        config.rounds = 5;
        config.providers = vec![
            ProviderConfig {
                name: "alpha".to_string(),
                archetype: StrategyArchetype::QualityFocused,
                initial_capability: 0.6,
                ..ProviderConfig::default()
            },
            ProviderConfig {
                name: "beta".to_string(),
                archetype: StrategyArchetype::Balanced,
                initial_capability: 0.4,
                ..ProviderConfig::default()
            },
        ];
        config
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = SimulationConfig::default(); // no providers
        assert!(Orchestrator::new(config).is_err());
    }

    #[test]
    fn test_round_zero_is_baseline_only() {
        let mut orch = Orchestrator::new(two_provider_config()).unwrap();
        let record = orch.step();

        assert_eq!(record.round, 0);
        assert!(record.consumer.is_none());
        assert!(record.policy.is_none());
        assert!(record.funding.is_none());
        // Inert benchmark: scores equal true capability.
        assert_eq!(record.scores["alpha"], 0.6);
        // Capabilities untouched in the baseline round.
        assert_eq!(orch.truth().provider_capability("alpha"), Some(0.6));
    }

    #[test]
    fn test_round_zero_leaves_benchmarks_untouched() {
        let mut config = two_provider_config();
        config.benchmarks[0].validity = 0.8;
        config.benchmarks[0].exploitability = 0.9;
        config.benchmarks[0].validity_decay_rate = Some(0.2);
        let mut orch = Orchestrator::new(config).unwrap();
        let record = orch.step();

        // No gaming pressure before any provider has planned: validity is
        // exactly where the config put it and nothing fresh was introduced.
        let benchmark = &orch.evaluator().benchmarks()[0];
        assert_eq!(benchmark.validity, 0.8);
        assert_eq!(orch.evaluator().benchmarks().len(), 1);
        // The baseline measures capability with zero investment, so a 0.9
        // exploitability benchmark still reads the truth.
        assert_eq!(record.scores["alpha"], 0.6);
    }

    #[test]
    fn test_initial_portfolio_applied_normalized() {
        let mut config = two_provider_config();
        config.providers[0].initial_portfolio = Some(Portfolio {
            fundamental_research: 3.0,
            training_optimization: 1.0,
            evaluation_engineering: 0.0,
            safety_alignment: 0.0,
        });
        let orch = Orchestrator::new(config).unwrap();

        let portfolio = orch.providers()[0].portfolio();
        assert!(portfolio.is_normalized());
        assert_eq!(portfolio.fundamental_research, 0.75);
        assert_eq!(orch.providers()[1].portfolio(), Portfolio::EVEN);
    }

    #[test]
    fn test_breakthrough_draws_on_starting_headroom() {
        let mut config = two_provider_config();
        config.rounds = 1;
        config.capability.base_efficiency = 0.1;
        config.capability.diminishing_rate = 1.0;
        config.capability.breakthrough_probability = 1.0;
        config.capability.breakthrough_magnitude = 0.5;
        let mut orch = Orchestrator::new(config).unwrap();
        orch.set_engine(
            "alpha",
            Box::new(crate::runner::FixedPortfolioEngine::new(Portfolio {
                fundamental_research: 1.0,
                training_optimization: 0.0,
                evaluation_engineering: 0.0,
                safety_alignment: 0.0,
            })),
        );
        orch.run();

        // Starting capability 0.6, headroom 0.4: incremental gain
        // 0.1 * 1.5 * 0.4 = 0.06, breakthrough 0.5 * 0.4 = 0.2.
        let capability = orch.truth().provider_capability("alpha").unwrap();
        assert_relative_eq!(capability, 0.86, epsilon = 1e-12);
    }

    #[test]
    fn test_run_produces_baseline_plus_rounds() {
        let mut orch = Orchestrator::new(two_provider_config()).unwrap();
        let history = orch.run();
        assert_eq!(history.len(), 6); // round 0 + 5 full rounds
        assert_eq!(history.last().unwrap().round, 5);
    }

    #[test]
    fn test_capability_grows_and_respects_ceiling() {
        let mut config = two_provider_config();
        config.rounds = 40;
        let mut orch = Orchestrator::new(config).unwrap();
        orch.run();

        let capability = orch.truth().provider_capability("alpha").unwrap();
        assert!(capability > 0.6, "research investment should grow capability");
        assert!(capability <= 1.0);
    }

    #[test]
    fn test_same_seed_same_history() {
        let run = || {
            let mut config = two_provider_config();
            config.benchmarks[0].noise_level = 0.05;
            config.benchmarks[0].validity = 0.7;
            config.segments = vec![SegmentConfig::default()];
            let mut orch = Orchestrator::new(config).unwrap();
            orch.run();
            serde_json::to_string(orch.history()).unwrap()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_different_seed_different_history() {
        let run = |seed: u64| {
            let mut config = two_provider_config();
            config.seed = seed;
            config.benchmarks[0].noise_level = 0.1;
            config.benchmarks[0].validity = 0.6;
            let mut orch = Orchestrator::new(config).unwrap();
            orch.run();
            serde_json::to_string(orch.history()).unwrap()
        };
        assert_ne!(run(1), run(2));
    }

    #[test]
    fn test_funding_multipliers_bounded() {
        let mut config = two_provider_config();
        config.rounds = 8;
        config.funders = vec![goodhart_core::config::FunderConfig {
            name: "vc".to_string(),
            ..goodhart_core::config::FunderConfig::default()
        }];
        let mut orch = Orchestrator::new(config).unwrap();
        for record in orch.run() {
            if let Some(funding) = &record.funding {
                for multiplier in funding.multipliers.values() {
                    assert!((1.0..=2.0).contains(multiplier), "multiplier {multiplier}");
                }
            }
        }
    }

    #[test]
    fn test_believed_capability_never_reads_truth_directly() {
        // A provider whose belief starts far from the truth converges toward
        // the published score, not toward the hidden capability.
        let mut config = two_provider_config();
        config.providers[0].initial_belief = Some(0.1);
        config.rounds = 1;
        let mut orch = Orchestrator::new(config).unwrap();
        orch.run();

        let belief = orch.history()[0].believed_capabilities["alpha"];
        // One smoothing step from 0.1 toward the published 0.6.
        assert!(belief > 0.1 && belief < 0.6);
    }
}
