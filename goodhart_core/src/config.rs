//! Simulation configuration: consumed once at setup, validated fail-fast,
//! never re-validated mid-run.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use crate::benchmark::Benchmark;
use crate::error::ConfigError;
use crate::funder::FunderProfile;
use crate::media::DEFAULT_NEWSWORTHY_DELTA;
use crate::provider::StrategyArchetype;
use crate::state::Portfolio;

/// Default evolution rates applied to benchmarks that do not override them.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct EvolutionRates {
    pub validity_decay_rate: f64,
    pub exploitability_growth_rate: f64,
}

impl Default for EvolutionRates {
    fn default() -> Self {
        Self {
            validity_decay_rate: 0.02,
            exploitability_growth_rate: 0.03,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchmarkConfig {
    pub name: String,
    pub validity: f64,
    pub exploitability: f64,
    pub noise_level: f64,
    pub weight: f64,
    /// Overrides [`EvolutionRates::validity_decay_rate`] when set.
    pub validity_decay_rate: Option<f64>,
    /// Overrides [`EvolutionRates::exploitability_growth_rate`] when set.
    pub exploitability_growth_rate: Option<f64>,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            name: "benchmark_v1".to_string(),
            validity: 0.8,
            exploitability: 0.2,
            noise_level: 0.05,
            weight: 1.0,
            validity_decay_rate: None,
            exploitability_growth_rate: None,
        }
    }
}

impl BenchmarkConfig {
    pub fn build(&self, defaults: EvolutionRates) -> Benchmark {
        Benchmark::new(&self.name, self.validity, self.exploitability, self.noise_level)
            .with_weight(self.weight)
            .with_evolution(
                self.validity_decay_rate.unwrap_or(defaults.validity_decay_rate),
                self.exploitability_growth_rate
                    .unwrap_or(defaults.exploitability_growth_rate),
            )
    }
}

/// Constants of the portfolio -> capability conversion.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct CapabilityDynamics {
    /// Hard capability ceiling; headroom shrinks toward it.
    pub ceiling: f64,
    /// Diminishing-returns exponent: gain scales with headroom^(1/rate).
    pub diminishing_rate: f64,
    pub breakthrough_probability: f64,
    /// Breakthrough adds this fraction of remaining headroom.
    pub breakthrough_magnitude: f64,
    pub base_efficiency: f64,
}

impl Default for CapabilityDynamics {
    fn default() -> Self {
        Self {
            ceiling: 1.0,
            diminishing_rate: 2.0,
            breakthrough_probability: 0.05,
            breakthrough_magnitude: 0.2,
            base_efficiency: 0.05,
        }
    }
}

/// Benchmark-introduction policy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct IntroductionPolicy {
    pub cooldown: u64,
    pub max_benchmarks: usize,
}

impl Default for IntroductionPolicy {
    fn default() -> Self {
        Self {
            cooldown: 7,
            max_benchmarks: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub name: String,
    pub archetype: StrategyArchetype,
    /// Display label only.
    pub profile: String,
    /// Seeds the provider's GroundTruth capability (orchestrator-owned).
    pub initial_capability: f64,
    /// Initial self-belief; defaults to the true initial capability, as if
    /// the provider once knew where it stood.
    pub initial_belief: Option<f64>,
    /// Starting investment strategy; the even split when absent. Normalized
    /// at build.
    pub initial_portfolio: Option<Portfolio>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            archetype: StrategyArchetype::Balanced,
            profile: String::new(),
            initial_capability: 0.5,
            initial_belief: None,
            initial_portfolio: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentConfig {
    pub archetype: String,
    pub use_case: String,
    pub size: f64,
    pub leaderboard_trust: f64,
    /// Seeds the segment's GroundTruth quality sensitivity.
    pub quality_sensitivity: f64,
    pub benchmark_weights: BTreeMap<String, f64>,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            archetype: "general".to_string(),
            use_case: "general".to_string(),
            size: 1.0,
            leaderboard_trust: 0.5,
            quality_sensitivity: 1.0,
            benchmark_weights: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicymakerConfig {
    pub name: String,
    pub intervention_threshold: f64,
    /// Seeds GroundTruth.
    pub risk_tolerance: f64,
    pub intervention_effectiveness: f64,
}

impl Default for PolicymakerConfig {
    fn default() -> Self {
        Self {
            name: "regulator".to_string(),
            intervention_threshold: 0.5,
            risk_tolerance: 0.5,
            intervention_effectiveness: 0.7,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FunderConfig {
    pub name: String,
    pub profile: FunderProfile,
    pub capital_per_round: f64,
    pub max_fraction_per_provider: f64,
    pub cooldown: u64,
    /// Seeds GroundTruth.
    pub true_roi: f64,
    pub funding_efficiency: f64,
}

impl Default for FunderConfig {
    fn default() -> Self {
        Self {
            name: "fund".to_string(),
            profile: FunderProfile::Vc,
            capital_per_round: 100.0,
            max_fraction_per_provider: 0.6,
            cooldown: 2,
            true_roi: 0.5,
            funding_efficiency: 0.7,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    pub name: String,
    pub newsworthy_delta: f64,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            name: "wire".to_string(),
            newsworthy_delta: DEFAULT_NEWSWORTHY_DELTA,
        }
    }
}

/// The full setup surface of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub seed: u64,
    pub rounds: u64,
    pub benchmarks: Vec<BenchmarkConfig>,
    pub evolution: EvolutionRates,
    pub capability: CapabilityDynamics,
    pub introduction: IntroductionPolicy,
    pub switch_rate_cap: f64,
    pub providers: Vec<ProviderConfig>,
    pub segments: Vec<SegmentConfig>,
    pub policymakers: Vec<PolicymakerConfig>,
    pub funders: Vec<FunderConfig>,
    pub media: Option<MediaConfig>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            rounds: 20,
            benchmarks: vec![BenchmarkConfig::default()],
            evolution: EvolutionRates::default(),
            capability: CapabilityDynamics::default(),
            introduction: IntroductionPolicy::default(),
            switch_rate_cap: crate::market::DEFAULT_SWITCH_RATE_CAP,
            providers: Vec::new(),
            segments: Vec::new(),
            policymakers: Vec::new(),
            funders: Vec::new(),
            media: None,
        }
    }
}

fn check_unit(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&value) || !value.is_finite() {
        return Err(ConfigError::InvalidValue {
            field,
            value,
            reason: "must be in [0, 1]",
        });
    }
    Ok(())
}

fn check_non_negative(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ConfigError::InvalidValue {
            field,
            value,
            reason: "must be finite and >= 0",
        });
    }
    Ok(())
}

impl SimulationConfig {
    /// Single-benchmark shorthand.
    pub fn single_benchmark(
        name: impl Into<String>,
        validity: f64,
        exploitability: f64,
        noise_level: f64,
    ) -> Self {
        Self {
            benchmarks: vec![BenchmarkConfig {
                name: name.into(),
                validity,
                exploitability,
                noise_level,
                ..BenchmarkConfig::default()
            }],
            ..Self::default()
        }
    }

    /// Fail-fast setup validation. Nothing is defaulted past this point.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.providers.is_empty() {
            return Err(ConfigError::NoProviders);
        }
        if self.benchmarks.is_empty() {
            return Err(ConfigError::NoBenchmarks);
        }

        let mut names = HashSet::new();
        for provider in &self.providers {
            if !names.insert(provider.name.clone()) {
                return Err(ConfigError::DuplicateName(provider.name.clone()));
            }
            check_unit("provider.initial_capability", provider.initial_capability)?;
            if let Some(belief) = provider.initial_belief {
                check_unit("provider.initial_belief", belief)?;
            }
            if let Some(portfolio) = &provider.initial_portfolio {
                for (field, value) in [
                    ("provider.initial_portfolio.fundamental_research", portfolio.fundamental_research),
                    ("provider.initial_portfolio.training_optimization", portfolio.training_optimization),
                    ("provider.initial_portfolio.evaluation_engineering", portfolio.evaluation_engineering),
                    ("provider.initial_portfolio.safety_alignment", portfolio.safety_alignment),
                ] {
                    check_non_negative(field, value)?;
                }
            }
        }

        let mut benchmark_names = HashSet::new();
        for benchmark in &self.benchmarks {
            if !benchmark_names.insert(benchmark.name.clone()) {
                return Err(ConfigError::DuplicateName(benchmark.name.clone()));
            }
            check_unit("benchmark.validity", benchmark.validity)?;
            check_unit("benchmark.exploitability", benchmark.exploitability)?;
            check_non_negative("benchmark.noise_level", benchmark.noise_level)?;
            check_non_negative("benchmark.weight", benchmark.weight)?;
        }

        for segment in &self.segments {
            check_unit("segment.leaderboard_trust", segment.leaderboard_trust)?;
            check_non_negative("segment.size", segment.size)?;
            check_non_negative("segment.quality_sensitivity", segment.quality_sensitivity)?;
            for name in segment.benchmark_weights.keys() {
                if !benchmark_names.contains(name) {
                    return Err(ConfigError::UnknownBenchmark(name.clone()));
                }
            }
        }

        let mut actor_names = HashSet::new();
        for policymaker in &self.policymakers {
            if !actor_names.insert(policymaker.name.clone()) {
                return Err(ConfigError::DuplicateName(policymaker.name.clone()));
            }
            check_unit("policymaker.intervention_threshold", policymaker.intervention_threshold)?;
        }
        for funder in &self.funders {
            if !actor_names.insert(funder.name.clone()) {
                return Err(ConfigError::DuplicateName(funder.name.clone()));
            }
            check_non_negative("funder.capital_per_round", funder.capital_per_round)?;
            check_unit("funder.max_fraction_per_provider", funder.max_fraction_per_provider)?;
        }

        if !self.capability.ceiling.is_finite() || self.capability.ceiling <= 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "capability.ceiling",
                value: self.capability.ceiling,
                reason: "must be finite and > 0",
            });
        }
        if !self.capability.diminishing_rate.is_finite() || self.capability.diminishing_rate <= 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "capability.diminishing_rate",
                value: self.capability.diminishing_rate,
                reason: "must be finite and > 0",
            });
        }
        check_unit("capability.breakthrough_probability", self.capability.breakthrough_probability)?;
        check_non_negative("capability.breakthrough_magnitude", self.capability.breakthrough_magnitude)?;
        check_non_negative("capability.base_efficiency", self.capability.base_efficiency)?;
        check_unit("switch_rate_cap", self.switch_rate_cap)?;

        Ok(())
    }
}
