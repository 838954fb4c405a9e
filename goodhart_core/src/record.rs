//! The round record: the sole data contract between the simulation core
//! and all reporting tooling.
//!
//! One structured value per round. Numeric fields are rounded to 4 decimal
//! places at assembly so stored logs diff cleanly across platforms.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::market::MarketReport;
use crate::media::MediaReport;
use crate::policymaker::{RegulationKind, RiskBeliefs};
use crate::state::Portfolio;
use crate::stats::round4;

/// Benchmark parameters as of the end of a round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkSnapshot {
    pub name: String,
    pub validity: f64,
    pub exploitability: f64,
    pub noise_level: f64,
    pub weight: f64,
}

/// A regulation issued this round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegulationSummary {
    pub name: String,
    pub kind: RegulationKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

/// Policymaker activity for the round.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyRecord {
    pub statements: Vec<String>,
    pub regulations: Vec<RegulationSummary>,
    pub risk_beliefs: BTreeMap<String, RiskBeliefs>,
}

/// Funding activity for the round.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FundingRecord {
    /// funder -> provider -> capital.
    pub allocations: BTreeMap<String, BTreeMap<String, f64>>,

    /// provider -> next-round capability multiplier in [1, 2].
    pub multipliers: BTreeMap<String, f64>,
}

/// A recovered decision-engine failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasonerFailureRecord {
    pub provider: String,
    pub error: String,
}

/// Everything that happened in one round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundRecord {
    pub round: u64,

    /// Published composite per provider.
    pub scores: BTreeMap<String, f64>,

    /// provider -> benchmark -> published score.
    pub benchmark_scores: BTreeMap<String, BTreeMap<String, f64>>,

    pub true_capabilities: BTreeMap<String, f64>,
    pub believed_capabilities: BTreeMap<String, f64>,
    pub portfolios: BTreeMap<String, Portfolio>,
    pub benchmarks: Vec<BenchmarkSnapshot>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub validity_correlation: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub consumer: Option<MarketReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy: Option<PolicyRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub funding: Option<FundingRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media: Option<MediaReport>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reasoner_failures: Vec<ReasonerFailureRecord>,
}

fn round_map(map: &mut BTreeMap<String, f64>) {
    for value in map.values_mut() {
        *value = round4(*value);
    }
}

fn round_portfolio(p: &mut Portfolio) {
    p.fundamental_research = round4(p.fundamental_research);
    p.training_optimization = round4(p.training_optimization);
    p.evaluation_engineering = round4(p.evaluation_engineering);
    p.safety_alignment = round4(p.safety_alignment);
}

impl RoundRecord {
    /// Rounds every numeric field to storage precision.
    pub fn finalize(mut self) -> Self {
        round_map(&mut self.scores);
        for scores in self.benchmark_scores.values_mut() {
            round_map(scores);
        }
        round_map(&mut self.true_capabilities);
        round_map(&mut self.believed_capabilities);
        for portfolio in self.portfolios.values_mut() {
            round_portfolio(portfolio);
        }
        for snapshot in &mut self.benchmarks {
            snapshot.validity = round4(snapshot.validity);
            snapshot.exploitability = round4(snapshot.exploitability);
            snapshot.noise_level = round4(snapshot.noise_level);
            snapshot.weight = round4(snapshot.weight);
        }
        self.validity_correlation = self.validity_correlation.map(round4);

        if let Some(consumer) = &mut self.consumer {
            round_map(&mut consumer.market_shares);
            round_map(&mut consumer.provider_satisfaction);
            round_map(&mut consumer.segment_satisfaction);
            consumer.avg_satisfaction = round4(consumer.avg_satisfaction);
            consumer.switching_rate = round4(consumer.switching_rate);
        }
        if let Some(funding) = &mut self.funding {
            for allocations in funding.allocations.values_mut() {
                round_map(allocations);
            }
            round_map(&mut funding.multipliers);
        }

        self
    }
}
