//! Scenario runner - builds an ecosystem per scenario and asserts its
//! property.

use std::path::{Path, PathBuf};
use tracing::info;

use goodhart_core::config::{
    BenchmarkConfig, EvolutionRates, FunderConfig, IntroductionPolicy, MediaConfig,
    PolicymakerConfig, ProviderConfig, SegmentConfig, SimulationConfig,
};
use goodhart_core::decision::{DecisionContext, DecisionEngine, PortfolioDecision};
use goodhart_core::error::ReasonerError;
use goodhart_core::funder::FunderProfile;
use goodhart_core::policymaker::RegulationKind;
use goodhart_core::provider::StrategyArchetype;
use goodhart_core::record::RoundRecord;
use goodhart_core::state::Portfolio;

use crate::exporter::RoundLogWriter;
use crate::orchestrator::Orchestrator;
use crate::scenarios::ScenarioId;

/// Results from running a scenario.
#[derive(Debug, Clone)]
pub struct ScenarioResult {
    /// Scenario that was run
    pub scenario: ScenarioId,

    /// Seed used
    pub seed: u64,

    /// Whether the scenario's property held
    pub passed: bool,

    /// Full rounds executed (excluding the round-0 baseline)
    pub rounds: u64,

    /// Failure message if any
    pub failure_reason: Option<String>,

    /// Metrics collected during the run
    pub metrics: ScenarioMetrics,
}

/// Metrics collected during scenario execution.
#[derive(Debug, Clone, Default)]
pub struct ScenarioMetrics {
    /// Final score-vs-capability correlation
    pub validity_correlation: Option<f64>,

    /// Lowest benchmark validity at end of run
    pub min_validity: f64,

    /// Benchmarks active at end of run
    pub benchmark_count: usize,

    /// Benchmark mandates issued across the run
    pub mandates_issued: u64,

    /// Final aggregate consumer satisfaction, when a market is configured
    pub avg_satisfaction: Option<f64>,
}

/// An engine that always returns the same portfolio. Scenario tooling for
/// actors with a scripted strategy (the dedicated gamer, the stagnant
/// incumbent).
#[derive(Debug, Clone, Copy)]
pub struct FixedPortfolioEngine {
    portfolio: Portfolio,
}

impl FixedPortfolioEngine {
    pub fn new(portfolio: Portfolio) -> Self {
        Self {
            portfolio: portfolio.normalized(),
        }
    }
}

impl DecisionEngine for FixedPortfolioEngine {
    fn name(&self) -> &str {
        "fixed"
    }

    fn decide(&mut self, _ctx: &DecisionContext) -> Result<PortfolioDecision, ReasonerError> {
        Ok(PortfolioDecision {
            portfolio: self.portfolio,
            rationale: None,
        })
    }
}

/// Runs ecosystem scenarios.
pub struct ScenarioRunner {
    seed: u64,

    /// Overrides the scenario's default round count when set.
    rounds: Option<u64>,

    /// When set, every round record is appended to this JSON-lines log as
    /// soon as the round completes, so an interrupted run keeps everything
    /// but the round in progress.
    round_log: Option<PathBuf>,
}

impl ScenarioRunner {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            rounds: None,
            round_log: None,
        }
    }

    pub fn with_rounds(mut self, rounds: u64) -> Self {
        self.rounds = Some(rounds);
        self
    }

    pub fn with_round_log(mut self, path: impl AsRef<Path>) -> Self {
        self.round_log = Some(path.as_ref().to_path_buf());
        self
    }

    /// Runs a scenario and returns the result.
    pub fn run(&self, scenario: ScenarioId) -> ScenarioResult {
        self.run_collecting(scenario).0
    }

    /// Runs a scenario and also returns the full round history, for export.
    pub fn run_collecting(&self, scenario: ScenarioId) -> (ScenarioResult, Vec<RoundRecord>) {
        info!("Starting scenario: {} (seed={})", scenario.name(), self.seed);

        let mut orchestrator = self.build(scenario);
        match &self.round_log {
            Some(path) => {
                let mut log = RoundLogWriter::open(path);
                while !orchestrator.finished() {
                    let record = orchestrator.step();
                    log.append(&record);
                }
            }
            None => {
                orchestrator.run();
            }
        }

        let (passed, failure_reason) = Self::assess(scenario, &orchestrator);
        let metrics = Self::collect_metrics(&orchestrator);
        let result = ScenarioResult {
            scenario,
            seed: self.seed,
            passed,
            rounds: orchestrator.round().saturating_sub(1),
            failure_reason,
            metrics,
        };
        (result, orchestrator.history().to_vec())
    }

    fn build(&self, scenario: ScenarioId) -> Orchestrator {
        let mut config = match scenario {
            ScenarioId::StableDuopoly => Self::stable_duopoly_config(),
            ScenarioId::GamingSpiral => Self::gaming_spiral_config(),
            ScenarioId::RegulatorResponse => Self::regulator_response_config(),
            ScenarioId::VcMomentum => Self::vc_momentum_config(),
            ScenarioId::FullEcosystem => Self::full_ecosystem_config(),
        };
        config.seed = self.seed;
        if let Some(rounds) = self.rounds {
            config.rounds = rounds;
        }

        // new() only fails on an invalid config, and the scenario configs
        // are fixed above; treat a failure as a scenario-definition bug.
        let mut orchestrator = match Orchestrator::new(config) {
            Ok(orchestrator) => orchestrator,
            Err(error) => panic!("scenario {} has an invalid config: {error}", scenario.name()),
        };

        match scenario {
            ScenarioId::GamingSpiral | ScenarioId::RegulatorResponse => {
                orchestrator.set_engine(
                    "gamer",
                    Box::new(FixedPortfolioEngine::new(Portfolio {
                        fundamental_research: 0.05,
                        training_optimization: 0.05,
                        evaluation_engineering: 0.9,
                        safety_alignment: 0.0,
                    })),
                );
            }
            ScenarioId::VcMomentum => {
                orchestrator.set_engine(
                    "rising",
                    Box::new(FixedPortfolioEngine::new(Portfolio {
                        fundamental_research: 0.9,
                        training_optimization: 0.05,
                        evaluation_engineering: 0.0,
                        safety_alignment: 0.05,
                    })),
                );
                orchestrator.set_engine(
                    "incumbent",
                    Box::new(FixedPortfolioEngine::new(Portfolio {
                        fundamental_research: 0.0,
                        training_optimization: 0.0,
                        evaluation_engineering: 0.0,
                        safety_alignment: 1.0,
                    })),
                );
            }
            _ => {}
        }
        orchestrator
    }

    fn stable_duopoly_config() -> SimulationConfig {
        let mut config = SimulationConfig::single_benchmark("capability_eval", 1.0, 0.0, 0.0);
        config.rounds = 10;
        config.evolution = EvolutionRates {
            validity_decay_rate: 0.0,
            exploitability_growth_rate: 0.0,
        };
        // The baseline scenario keeps its perfect instrument for the whole
        // run; no scheduled introductions.
        config.introduction = IntroductionPolicy {
            cooldown: 7,
            max_benchmarks: 1,
        };
        config.providers = vec![
            ProviderConfig {
                name: "alpha".to_string(),
                archetype: StrategyArchetype::QualityFocused,
                profile: "established frontier lab".to_string(),
                initial_capability: 0.7,
                ..ProviderConfig::default()
            },
            ProviderConfig {
                name: "beta".to_string(),
                archetype: StrategyArchetype::Balanced,
                profile: "steady challenger".to_string(),
                initial_capability: 0.5,
                ..ProviderConfig::default()
            },
        ];
        config
    }

    fn gaming_spiral_config() -> SimulationConfig {
        let mut config = SimulationConfig::default();
        config.rounds = 12;
        config.benchmarks = vec![BenchmarkConfig {
            name: "gameable_eval".to_string(),
            validity: 0.8,
            exploitability: 0.9,
            noise_level: 0.05,
            validity_decay_rate: Some(0.15),
            ..BenchmarkConfig::default()
        }];
        config.providers = vec![
            ProviderConfig {
                name: "gamer".to_string(),
                archetype: StrategyArchetype::Aggressive,
                profile: "leaderboard-chasing startup".to_string(),
                initial_capability: 0.4,
                ..ProviderConfig::default()
            },
            ProviderConfig {
                name: "honest".to_string(),
                archetype: StrategyArchetype::QualityFocused,
                profile: "research-first lab".to_string(),
                initial_capability: 0.6,
                ..ProviderConfig::default()
            },
        ];
        config
    }

    fn regulator_response_config() -> SimulationConfig {
        let mut config = SimulationConfig::default();
        config.rounds = 10;
        config.benchmarks = vec![BenchmarkConfig {
            name: "gameable_eval".to_string(),
            validity: 0.8,
            exploitability: 0.9,
            noise_level: 0.05,
            ..BenchmarkConfig::default()
        }];
        config.providers = vec![
            ProviderConfig {
                name: "gamer".to_string(),
                archetype: StrategyArchetype::Aggressive,
                profile: "benchmark specialist".to_string(),
                initial_capability: 0.35,
                ..ProviderConfig::default()
            },
            ProviderConfig {
                name: "honest".to_string(),
                archetype: StrategyArchetype::QualityFocused,
                profile: "capability-first lab".to_string(),
                initial_capability: 0.75,
                ..ProviderConfig::default()
            },
        ];
        config.policymakers = vec![PolicymakerConfig {
            name: "evaluation_authority".to_string(),
            intervention_threshold: 0.5,
            ..PolicymakerConfig::default()
        }];
        config
    }

    fn vc_momentum_config() -> SimulationConfig {
        let mut config = SimulationConfig::single_benchmark("capability_eval", 1.0, 0.0, 0.0);
        config.rounds = 12;
        config.evolution = EvolutionRates {
            validity_decay_rate: 0.0,
            exploitability_growth_rate: 0.0,
        };
        config.providers = vec![
            ProviderConfig {
                name: "rising".to_string(),
                archetype: StrategyArchetype::QualityFocused,
                profile: "fast-improving newcomer".to_string(),
                initial_capability: 0.35,
                ..ProviderConfig::default()
            },
            ProviderConfig {
                name: "incumbent".to_string(),
                archetype: StrategyArchetype::RiskAverse,
                profile: "coasting incumbent".to_string(),
                initial_capability: 0.6,
                ..ProviderConfig::default()
            },
        ];
        config.funders = vec![FunderConfig {
            name: "growth_fund".to_string(),
            profile: FunderProfile::Vc,
            capital_per_round: 100.0,
            cooldown: 6,
            ..FunderConfig::default()
        }];
        config
    }

    fn full_ecosystem_config() -> SimulationConfig {
        let mut config = SimulationConfig::default();
        config.rounds = 20;
        config.benchmarks = vec![
            BenchmarkConfig {
                name: "general_eval".to_string(),
                validity: 0.8,
                exploitability: 0.2,
                noise_level: 0.05,
                ..BenchmarkConfig::default()
            },
            BenchmarkConfig {
                name: "reasoning_eval".to_string(),
                validity: 0.75,
                exploitability: 0.3,
                noise_level: 0.05,
                ..BenchmarkConfig::default()
            },
        ];
        config.providers = vec![
            ProviderConfig {
                name: "atlas".to_string(),
                archetype: StrategyArchetype::Aggressive,
                profile: "scrappy aggressive startup".to_string(),
                initial_capability: 0.55,
                ..ProviderConfig::default()
            },
            ProviderConfig {
                name: "beacon".to_string(),
                archetype: StrategyArchetype::QualityFocused,
                profile: "research-heavy incumbent".to_string(),
                initial_capability: 0.6,
                ..ProviderConfig::default()
            },
            ProviderConfig {
                name: "corvid".to_string(),
                archetype: StrategyArchetype::Balanced,
                profile: "generalist mid-size lab".to_string(),
                initial_capability: 0.45,
                ..ProviderConfig::default()
            },
        ];
        config.segments = vec![
            SegmentConfig {
                archetype: "enterprise".to_string(),
                use_case: "coding".to_string(),
                size: 2.0,
                leaderboard_trust: 0.8,
                quality_sensitivity: 1.2,
                ..SegmentConfig::default()
            },
            SegmentConfig {
                archetype: "hobbyist".to_string(),
                use_case: "chat".to_string(),
                size: 1.0,
                leaderboard_trust: 0.4,
                quality_sensitivity: 0.6,
                ..SegmentConfig::default()
            },
            SegmentConfig {
                archetype: "startup".to_string(),
                use_case: "agents".to_string(),
                size: 1.0,
                leaderboard_trust: 0.6,
                quality_sensitivity: 1.0,
                benchmark_weights: [("reasoning_eval".to_string(), 1.0)].into_iter().collect(),
                ..SegmentConfig::default()
            },
        ];
        config.policymakers = vec![PolicymakerConfig {
            name: "evaluation_authority".to_string(),
            intervention_threshold: 0.6,
            ..PolicymakerConfig::default()
        }];
        config.funders = vec![
            FunderConfig {
                name: "growth_fund".to_string(),
                profile: FunderProfile::Vc,
                capital_per_round: 100.0,
                cooldown: 2,
                ..FunderConfig::default()
            },
            FunderConfig {
                name: "science_agency".to_string(),
                profile: FunderProfile::Gov,
                capital_per_round: 80.0,
                cooldown: 3,
                ..FunderConfig::default()
            },
        ];
        config.media = Some(MediaConfig::default());
        config
    }

    fn assess(scenario: ScenarioId, orchestrator: &Orchestrator) -> (bool, Option<String>) {
        let failure = match scenario {
            ScenarioId::StableDuopoly => Self::assess_stable_duopoly(orchestrator),
            ScenarioId::GamingSpiral => Self::assess_gaming_spiral(orchestrator),
            ScenarioId::RegulatorResponse => Self::assess_regulator_response(orchestrator),
            ScenarioId::VcMomentum => Self::assess_vc_momentum(orchestrator),
            ScenarioId::FullEcosystem => Self::assess_full_ecosystem(orchestrator),
        };
        (failure.is_none(), failure)
    }

    /// With a perfect instrument the leaderboard must mirror true
    /// capability in every round.
    fn assess_stable_duopoly(orchestrator: &Orchestrator) -> Option<String> {
        for record in orchestrator.history() {
            let score_order = record.scores["alpha"] > record.scores["beta"];
            let truth_order = record.true_capabilities["alpha"] > record.true_capabilities["beta"];
            if score_order != truth_order {
                return Some(format!(
                    "round {}: leaderboard order diverged from capability order",
                    record.round
                ));
            }
        }
        match orchestrator.evaluator().validity_correlation() {
            Some(correlation) if correlation > 0.95 => None,
            other => Some(format!("expected near-perfect correlation, got {other:?}")),
        }
    }

    /// Heavy gaming must collapse validity past the introduction trigger
    /// and visibly inflate the gamer's score.
    fn assess_gaming_spiral(orchestrator: &Orchestrator) -> Option<String> {
        let original = &orchestrator.evaluator().benchmarks()[0];
        if original.validity >= 0.4 {
            return Some(format!(
                "validity only degraded to {:.3}, expected < 0.4",
                original.validity
            ));
        }
        if orchestrator.evaluator().benchmarks().len() < 2 {
            return Some("no fresh benchmark was introduced".to_string());
        }

        let Some(last) = orchestrator.history().last() else {
            return Some("no rounds were recorded".to_string());
        };
        let inflation = last.scores["gamer"] - last.true_capabilities["gamer"];
        if inflation < 0.2 {
            return Some(format!(
                "gamer inflation only {inflation:.3}, expected >= 0.2"
            ));
        }
        None
    }

    /// Degraded correlation must draw exactly one benchmark mandate.
    fn assess_regulator_response(orchestrator: &Orchestrator) -> Option<String> {
        let mandates: u64 = orchestrator
            .history()
            .iter()
            .filter_map(|r| r.policy.as_ref())
            .flat_map(|p| p.regulations.iter())
            .filter(|r| r.kind == RegulationKind::MandateBenchmark)
            .count() as u64;
        if mandates != 1 {
            return Some(format!("expected exactly 1 mandate, saw {mandates}"));
        }

        match orchestrator.evaluator().validity_correlation() {
            Some(correlation) if correlation < 0.4 => None,
            other => Some(format!(
                "expected correlation below the mandate gate, got {other:?}"
            )),
        }
    }

    /// The VC's standing allocation must end up with the provider whose
    /// scores are moving, not the one that started ahead.
    fn assess_vc_momentum(orchestrator: &Orchestrator) -> Option<String> {
        let Some(fund) = orchestrator.funders().iter().find(|f| f.name == "growth_fund") else {
            return Some("growth_fund missing from the run".to_string());
        };
        let rising = fund.allocations().get("rising").copied().unwrap_or(0.0);
        let incumbent = fund.allocations().get("incumbent").copied().unwrap_or(0.0);
        if rising <= incumbent {
            return Some(format!(
                "VC still backs the incumbent ({incumbent:.1} vs {rising:.1})"
            ));
        }

        let Some(last) = orchestrator.history().last() else {
            return Some("no rounds were recorded".to_string());
        };
        if last.true_capabilities["rising"] <= 0.35 {
            return Some("rising provider never actually improved".to_string());
        }
        None
    }

    /// No targeted outcome; every structural invariant must hold in every
    /// round with all actors active.
    fn assess_full_ecosystem(orchestrator: &Orchestrator) -> Option<String> {
        for record in orchestrator.history() {
            for (provider, score) in &record.scores {
                if !(0.0..=1.0).contains(score) {
                    return Some(format!(
                        "round {}: score {score} for {provider} out of range",
                        record.round
                    ));
                }
            }
            for (provider, capability) in &record.true_capabilities {
                if !(0.0..=1.0).contains(capability) {
                    return Some(format!(
                        "round {}: capability {capability} for {provider} out of range",
                        record.round
                    ));
                }
            }
            for (provider, portfolio) in &record.portfolios {
                // Stored portfolios are rounded to 4 decimals.
                if (portfolio.total() - 1.0).abs() > 1e-3 {
                    return Some(format!(
                        "round {}: portfolio for {provider} sums to {:.4}",
                        record.round,
                        portfolio.total()
                    ));
                }
            }
            if let Some(consumer) = &record.consumer {
                let total: f64 = consumer.market_shares.values().sum();
                if (total - 1.0).abs() > 1e-3 {
                    return Some(format!(
                        "round {}: market shares sum to {total:.4}",
                        record.round
                    ));
                }
            }
            if let Some(funding) = &record.funding {
                for (provider, multiplier) in &funding.multipliers {
                    if !(1.0..=2.0).contains(multiplier) {
                        return Some(format!(
                            "round {}: funding multiplier {multiplier} for {provider} out of range",
                            record.round
                        ));
                    }
                }
            }
        }
        None
    }

    fn collect_metrics(orchestrator: &Orchestrator) -> ScenarioMetrics {
        let min_validity = orchestrator
            .evaluator()
            .benchmarks()
            .iter()
            .map(|b| b.validity)
            .fold(f64::INFINITY, f64::min);
        let mandates_issued = orchestrator
            .history()
            .iter()
            .filter_map(|r| r.policy.as_ref())
            .flat_map(|p| p.regulations.iter())
            .filter(|r| r.kind == RegulationKind::MandateBenchmark)
            .count() as u64;
        let avg_satisfaction = orchestrator
            .history()
            .iter()
            .rev()
            .find_map(|r| r.consumer.as_ref())
            .map(|c| c.avg_satisfaction);

        ScenarioMetrics {
            validity_correlation: orchestrator.evaluator().validity_correlation(),
            min_validity: if min_validity.is_finite() { min_validity } else { 0.0 },
            benchmark_count: orchestrator.evaluator().benchmarks().len(),
            mandates_issued,
            avg_satisfaction,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(scenario: ScenarioId) -> ScenarioResult {
        ScenarioRunner::new(42).run(scenario)
    }

    #[test]
    fn test_stable_duopoly_passes() {
        let result = run(ScenarioId::StableDuopoly);
        assert!(result.passed, "{:?}", result.failure_reason);
        assert_eq!(result.metrics.benchmark_count, 1);
    }

    #[test]
    fn test_gaming_spiral_passes() {
        let result = run(ScenarioId::GamingSpiral);
        assert!(result.passed, "{:?}", result.failure_reason);
        assert!(result.metrics.min_validity < 0.4);
        assert!(result.metrics.benchmark_count >= 2);
    }

    #[test]
    fn test_regulator_response_passes() {
        let result = run(ScenarioId::RegulatorResponse);
        assert!(result.passed, "{:?}", result.failure_reason);
        assert_eq!(result.metrics.mandates_issued, 1);
    }

    #[test]
    fn test_vc_momentum_passes() {
        let result = run(ScenarioId::VcMomentum);
        assert!(result.passed, "{:?}", result.failure_reason);
    }

    #[test]
    fn test_full_ecosystem_passes() {
        let result = run(ScenarioId::FullEcosystem);
        assert!(result.passed, "{:?}", result.failure_reason);
        assert!(result.metrics.avg_satisfaction.is_some());
    }

    #[test]
    fn test_scenarios_pass_across_seeds() {
        for seed in [1, 7, 1234] {
            for scenario in [ScenarioId::StableDuopoly, ScenarioId::FullEcosystem] {
                let result = ScenarioRunner::new(seed).run(scenario);
                assert!(
                    result.passed,
                    "{} seed {seed}: {:?}",
                    scenario.name(),
                    result.failure_reason
                );
            }
        }
    }

    #[test]
    fn test_run_collecting_returns_history() {
        let (result, history) = ScenarioRunner::new(42).run_collecting(ScenarioId::StableDuopoly);
        assert_eq!(history.len() as u64, result.rounds + 1);
    }

    #[test]
    fn test_round_log_written_as_rounds_complete() {
        let dir = std::env::temp_dir().join(format!("goodhart_runner_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("rounds.jsonl");
        let _ = std::fs::remove_file(&path);

        let (result, history) = ScenarioRunner::new(42)
            .with_round_log(&path)
            .run_collecting(ScenarioId::StableDuopoly);

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), history.len());
        assert_eq!(lines.len() as u64, result.rounds + 1);

        // Each line is a complete record; the log and the in-memory history
        // agree round for round.
        for (line, record) in lines.iter().zip(&history) {
            let logged: RoundRecord = serde_json::from_str(line).unwrap();
            assert_eq!(logged.round, record.round);
            assert_eq!(logged.scores, record.scores);
        }

        std::fs::remove_file(&path).unwrap();
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(8))]

            // Structural invariants hold no matter what the seed draws.
            #[test]
            fn prop_full_ecosystem_invariants_for_any_seed(seed in any::<u64>()) {
                let result = ScenarioRunner::new(seed)
                    .with_rounds(6)
                    .run(ScenarioId::FullEcosystem);
                prop_assert!(result.passed, "{:?}", result.failure_reason);
            }

            // A seed fully determines a run.
            #[test]
            fn prop_same_seed_reproduces_history(seed in any::<u64>()) {
                let run = || {
                    let (_, history) = ScenarioRunner::new(seed)
                        .with_rounds(4)
                        .run_collecting(ScenarioId::FullEcosystem);
                    serde_json::to_string(&history).unwrap()
                };
                prop_assert_eq!(run(), run());
            }
        }
    }
}
