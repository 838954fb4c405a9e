//! The Evaluator: benchmark scoring, score publication, and benchmark
//! evolution.
//!
//! The Evaluator owns the simulation's single RNG. Every stochastic draw in
//! a run (measurement noise here, breakthrough rolls and market
//! perturbation elsewhere) comes from this one generator, so a run is
//! fully determined by its seed.
//!
//! The Evaluator is one of the two components allowed to see true
//! capability (the other is the Orchestrator). It receives it as a plain
//! number per evaluation and never stores a reference to any ground-truth
//! object.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

use crate::benchmark::Benchmark;
use crate::policymaker::{Regulation, RegulationKind};
use crate::state::ScorePoint;
use crate::stats::pearson;

/// Default rounds between scheduled benchmark introductions, and the hard
/// cooldown after any introduction.
pub const DEFAULT_INTRODUCTION_COOLDOWN: u64 = 7;

/// Default cap on how many benchmarks a run can accumulate.
pub const DEFAULT_MAX_BENCHMARKS: usize = 5;

/// Any active benchmark dropping below this validity triggers the
/// introduction check.
const VALIDITY_DEGRADATION_TRIGGER: f64 = 0.4;

/// Per-provider evaluation input for one round.
#[derive(Debug, Clone)]
pub struct EvaluationInput {
    pub name: String,
    pub true_capability: f64,
    /// Fraction of the provider's portfolio in evaluation engineering.
    pub evaluation_engineering: f64,
}

/// Published scores for one round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundScores {
    pub round: u64,

    /// Weighted composite per provider.
    pub composite: BTreeMap<String, f64>,

    /// provider -> benchmark -> published score.
    pub per_benchmark: BTreeMap<String, BTreeMap<String, f64>>,
}

impl RoundScores {
    /// Providers ranked by composite, best first. Ties break by name so the
    /// leaderboard is stable under equal scores.
    pub fn leaderboard(&self) -> Vec<(String, f64)> {
        let mut entries: Vec<(String, f64)> = self
            .composite
            .iter()
            .map(|(name, score)| (name.clone(), *score))
            .collect();
        entries.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal).then(a.0.cmp(&b.0)));
        entries
    }

    pub fn score(&self, provider: &str) -> Option<f64> {
        self.composite.get(provider).copied()
    }

    /// Zero-based leaderboard rank.
    pub fn rank(&self, provider: &str) -> Option<usize> {
        self.leaderboard().iter().position(|(name, _)| name == provider)
    }
}

/// The benchmark engine.
pub struct Evaluator {
    benchmarks: Vec<Benchmark>,

    /// The run's only RNG. Borrowed by the Orchestrator and Market for
    /// their draws.
    rng: ChaCha8Rng,

    /// provider -> benchmark -> best score ever published (monotonic floor:
    /// a rational provider never discloses a regression).
    best_scores: HashMap<String, HashMap<String, f64>>,

    /// provider -> composite score history.
    composite_history: HashMap<String, Vec<ScorePoint>>,

    /// All historical (composite score, true capability) pairs, the basis
    /// of the validity-correlation signal.
    correlation_points: Vec<(f64, f64)>,

    regulations: Vec<Regulation>,

    introduction_cooldown: u64,
    max_benchmarks: usize,
    last_introduction: Option<u64>,
}

impl Evaluator {
    pub fn new(benchmarks: Vec<Benchmark>, seed: u64) -> Self {
        Self {
            benchmarks,
            rng: ChaCha8Rng::seed_from_u64(seed),
            best_scores: HashMap::new(),
            composite_history: HashMap::new(),
            correlation_points: Vec::new(),
            regulations: Vec::new(),
            introduction_cooldown: DEFAULT_INTRODUCTION_COOLDOWN,
            max_benchmarks: DEFAULT_MAX_BENCHMARKS,
            last_introduction: None,
        }
    }

    /// Configures the benchmark-introduction policy.
    pub fn with_introduction(mut self, cooldown: u64, max_benchmarks: usize) -> Self {
        self.introduction_cooldown = cooldown.max(1);
        self.max_benchmarks = max_benchmarks.max(1);
        self
    }

    pub fn benchmarks(&self) -> &[Benchmark] {
        &self.benchmarks
    }

    /// Mutable borrow of the run RNG for non-evaluation draws.
    pub fn rng_mut(&mut self) -> &mut ChaCha8Rng {
        &mut self.rng
    }

    /// Draws one noisy score.
    ///
    /// Gaming investment shifts the mean by `investment * exploitability`;
    /// low validity widens the standard deviation. The two knobs never mix.
    fn draw(rng: &mut ChaCha8Rng, benchmark: &Benchmark, true_capability: f64, investment: f64) -> f64 {
        let mean = true_capability + investment * benchmark.exploitability;
        let std = benchmark.noise_level / benchmark.validity.max(0.05).sqrt();

        let sample = match Normal::new(mean, std) {
            Ok(dist) => dist.sample(rng),
            Err(_) => mean,
        };
        sample.clamp(0.0, 1.0)
    }

    /// Evaluates one capability on one benchmark (by index). No publication
    /// floor is applied; this is the raw instrument reading.
    pub fn evaluate(&mut self, true_capability: f64, investment: f64, benchmark_index: usize) -> f64 {
        let Self { benchmarks, rng, .. } = self;
        Self::draw(rng, &benchmarks[benchmark_index], true_capability, investment)
    }

    /// Evaluates every provider on every benchmark and publishes the round's
    /// scores.
    ///
    /// Publication is monotonic per (provider, benchmark): a new reading
    /// below the provider's previous best on that benchmark is withheld and
    /// the previous best republished.
    pub fn evaluate_all(&mut self, inputs: &[EvaluationInput], round: u64) -> RoundScores {
        let mut weights: Vec<f64> = self.benchmarks.iter().map(|b| b.weight).collect();
        crate::stats::normalize_weights(&mut weights);

        let mut composite = BTreeMap::new();
        let mut per_benchmark = BTreeMap::new();

        for input in inputs {
            let mut provider_scores = BTreeMap::new();
            let mut weighted_sum = 0.0;

            for (index, weight) in weights.iter().enumerate() {
                let raw = {
                    let Self { benchmarks, rng, .. } = &mut *self;
                    Self::draw(rng, &benchmarks[index], input.true_capability, input.evaluation_engineering)
                };
                let benchmark_name = self.benchmarks[index].name.clone();

                let best = self
                    .best_scores
                    .entry(input.name.clone())
                    .or_default()
                    .entry(benchmark_name.clone())
                    .or_insert(0.0);
                let published = raw.max(*best);
                *best = published;

                weighted_sum += weight * published;
                provider_scores.insert(benchmark_name, published);
            }

            debug!(provider = %input.name, round, composite = weighted_sum, "scored provider");

            self.composite_history
                .entry(input.name.clone())
                .or_default()
                .push(ScorePoint { round, value: weighted_sum });
            self.correlation_points.push((weighted_sum, input.true_capability));

            composite.insert(input.name.clone(), weighted_sum);
            per_benchmark.insert(input.name.clone(), provider_scores);
        }

        RoundScores { round, composite, per_benchmark }
    }

    /// The Goodhart feedback step: aggregate gaming investment this round
    /// degrades every benchmark.
    pub fn update_benchmarks(&mut self, aggregate_gaming_investment: f64) {
        let pressure = aggregate_gaming_investment.max(0.1);
        for benchmark in &mut self.benchmarks {
            benchmark.apply_gaming_pressure(pressure);
        }
    }

    /// Considers introducing a fresh benchmark this round.
    ///
    /// Fires when any active benchmark has degraded below the validity
    /// trigger, or on the fixed introduction schedule, but never within the
    /// cooldown of the previous introduction and never past the benchmark
    /// cap. Returns the new benchmark's name when one is introduced.
    pub fn consider_new_benchmark(&mut self, round: u64) -> Option<String> {
        if self.benchmarks.len() >= self.max_benchmarks {
            return None;
        }
        if let Some(last) = self.last_introduction {
            if round.saturating_sub(last) < self.introduction_cooldown {
                return None;
            }
        }

        let degraded = self.benchmarks.iter().any(|b| b.validity < VALIDITY_DEGRADATION_TRIGGER);
        let scheduled = round > 0 && round % self.introduction_cooldown == 0;
        if !degraded && !scheduled {
            return None;
        }

        let template = self.benchmarks[0].clone();
        let name = format!("benchmark_v{}", self.benchmarks.len() + 1);
        self.benchmarks.push(Benchmark::fresh(name.clone(), &template));
        self.last_introduction = Some(round);

        info!(benchmark = %name, round, degraded, "introduced fresh benchmark");
        Some(name)
    }

    /// Pearson correlation between every historical published composite and
    /// the true capability behind it. `None` until two points exist. This
    /// is the ecosystem's primary "are scores still meaningful" signal.
    pub fn validity_correlation(&self) -> Option<f64> {
        pearson(&self.correlation_points)
    }

    /// Applies and records a regulation.
    ///
    /// `MandateBenchmark` mutates benchmark parameters immediately:
    /// `min_validity` raises the validity floor, `exploitability_factor`
    /// scales exploitability down. A benchmark-name target restricts the
    /// mutation to that benchmark. `SetThreshold` and `RequireDisclosure`
    /// are recorded without parameter changes; they are deliberate
    /// placeholders for future policy levers, not missing wiring.
    pub fn add_regulation(&mut self, regulation: Regulation) {
        if regulation.kind == RegulationKind::MandateBenchmark {
            let min_validity = regulation.details.get("min_validity").copied();
            let exploitability_factor = regulation.details.get("exploitability_factor").copied();

            for benchmark in &mut self.benchmarks {
                if let Some(target) = &regulation.target {
                    if target != &benchmark.name {
                        continue;
                    }
                }
                if let Some(floor) = min_validity {
                    benchmark.validity = benchmark.validity.max(floor.clamp(0.0, 1.0));
                }
                if let Some(factor) = exploitability_factor {
                    benchmark.exploitability = (benchmark.exploitability * factor.max(0.0)).clamp(0.0, 1.0);
                }
            }
        }

        info!(regulation = %regulation.name, kind = ?regulation.kind, "regulation applied");
        self.regulations.push(regulation);
    }

    /// Removes a regulation by name; returns whether one was removed.
    pub fn remove_regulation(&mut self, name: &str) -> bool {
        let before = self.regulations.len();
        self.regulations.retain(|r| r.name != name);
        self.regulations.len() != before
    }

    pub fn regulations(&self) -> &[Regulation] {
        &self.regulations
    }

    /// True when any active regulation names this provider.
    pub fn provider_under_regulation(&self, provider: &str) -> bool {
        self.regulations
            .iter()
            .any(|r| r.active && r.target.as_deref() == Some(provider))
    }

    /// Composite score history for one provider.
    pub fn composite_history(&self, provider: &str) -> &[ScorePoint] {
        self.composite_history.get(provider).map(Vec::as_slice).unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::collections::HashMap as StdHashMap;

    fn inert_evaluator() -> Evaluator {
        // noise 0 + exploitability 0: the instrument reads true capability.
        Evaluator::new(vec![Benchmark::new("inert", 1.0, 0.0, 0.0)], 7)
    }

    fn inputs(entries: &[(&str, f64, f64)]) -> Vec<EvaluationInput> {
        entries
            .iter()
            .map(|(name, cap, inv)| EvaluationInput {
                name: name.to_string(),
                true_capability: *cap,
                evaluation_engineering: *inv,
            })
            .collect()
    }

    #[test]
    fn test_inert_benchmark_reads_true_capability() {
        let mut evaluator = inert_evaluator();
        for investment in [0.0, 0.5, 0.9] {
            let score = evaluator.evaluate(0.6, investment, 0);
            assert_relative_eq!(score, 0.6);
        }
    }

    #[test]
    fn test_gaming_inflates_mean() {
        let mut evaluator = Evaluator::new(vec![Benchmark::new("gameable", 1.0, 0.8, 0.0)], 7);
        let score = evaluator.evaluate(0.5, 0.5, 0);
        assert_relative_eq!(score, 0.9); // 0.5 + 0.5 * 0.8
        assert!(score > 0.5);
    }

    #[test]
    fn test_scores_clamped_to_unit_interval() {
        let mut evaluator = Evaluator::new(vec![Benchmark::new("gameable", 1.0, 0.9, 0.0)], 7);
        let score = evaluator.evaluate(0.9, 1.0, 0);
        assert_eq!(score, 1.0);
    }

    #[test]
    fn test_publication_monotonicity() {
        let mut evaluator = Evaluator::new(vec![Benchmark::new("noisy", 0.5, 0.0, 0.2)], 99);

        let mut previous = 0.0;
        for round in 0..30 {
            let scores = evaluator.evaluate_all(&inputs(&[("alpha", 0.5, 0.0)]), round);
            let published = scores.per_benchmark["alpha"]["noisy"];
            assert!(published >= previous, "round {round}: {published} < {previous}");
            previous = published;
        }
    }

    #[test]
    fn test_composite_weights() {
        let benchmarks = vec![
            Benchmark::new("a", 1.0, 0.0, 0.0).with_weight(3.0),
            Benchmark::new("b", 1.0, 0.0, 0.0).with_weight(1.0),
        ];
        let mut evaluator = Evaluator::new(benchmarks, 7);
        let scores = evaluator.evaluate_all(&inputs(&[("alpha", 0.4, 0.0)]), 0);
        // Both benchmarks read 0.4 exactly, so any weighting gives 0.4.
        assert_relative_eq!(scores.composite["alpha"], 0.4);
    }

    #[test]
    fn test_validity_correlation_needs_two_points() {
        let mut evaluator = inert_evaluator();
        assert!(evaluator.validity_correlation().is_none());

        evaluator.evaluate_all(&inputs(&[("alpha", 0.5, 0.0)]), 0);
        assert!(evaluator.validity_correlation().is_none());

        evaluator.evaluate_all(&inputs(&[("alpha", 0.6, 0.0)]), 1);
        let corr = evaluator.validity_correlation().unwrap();
        assert!((-1.0..=1.0).contains(&corr));
        // Inert benchmark: scores track capability exactly.
        assert_relative_eq!(corr, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_introduction_cooldown_and_cap() {
        let benchmarks = vec![Benchmark::new("degraded", 0.3, 0.5, 0.05)];
        let mut evaluator = Evaluator::new(benchmarks, 7).with_introduction(5, 3);

        // Degradation trigger fires immediately.
        assert!(evaluator.consider_new_benchmark(1).is_some());

        // Hard cooldown: nothing for the next 4 rounds even though the
        // first benchmark is still degraded.
        for round in 2..6 {
            assert!(evaluator.consider_new_benchmark(round).is_none(), "round {round}");
        }

        assert!(evaluator.consider_new_benchmark(6).is_some());
        assert_eq!(evaluator.benchmarks().len(), 3);

        // Cap reached: no further introductions ever.
        for round in 7..40 {
            assert!(evaluator.consider_new_benchmark(round).is_none());
        }
        assert_eq!(evaluator.benchmarks().len(), 3);
    }

    #[test]
    fn test_scheduled_introduction() {
        let benchmarks = vec![Benchmark::new("healthy", 0.9, 0.1, 0.05)];
        let mut evaluator = Evaluator::new(benchmarks, 7).with_introduction(7, 5);

        for round in 1..7 {
            assert!(evaluator.consider_new_benchmark(round).is_none());
        }
        assert!(evaluator.consider_new_benchmark(7).is_some());
    }

    #[test]
    fn test_mandate_regulation_mutates_benchmarks() {
        let mut evaluator = Evaluator::new(vec![Benchmark::new("gameable", 0.4, 0.8, 0.05)], 7);

        let mut details = StdHashMap::new();
        details.insert("min_validity".to_string(), 0.5);
        details.insert("exploitability_factor".to_string(), 0.5);
        evaluator.add_regulation(Regulation::new(
            "tighten_gameable",
            RegulationKind::MandateBenchmark,
            details,
            3,
        ));

        let benchmark = &evaluator.benchmarks()[0];
        assert_relative_eq!(benchmark.validity, 0.5);
        assert_relative_eq!(benchmark.exploitability, 0.4);
        assert_eq!(evaluator.regulations().len(), 1);

        assert!(evaluator.remove_regulation("tighten_gameable"));
        assert!(evaluator.regulations().is_empty());
    }

    #[test]
    fn test_same_seed_same_scores() {
        let build = || Evaluator::new(vec![Benchmark::new("noisy", 0.7, 0.3, 0.1)], 1234);
        let mut a = build();
        let mut b = build();

        let batch = inputs(&[("alpha", 0.5, 0.2), ("beta", 0.7, 0.1)]);
        let sa = a.evaluate_all(&batch, 0);
        let sb = b.evaluate_all(&batch, 0);
        assert_eq!(sa.composite, sb.composite);
    }
}
