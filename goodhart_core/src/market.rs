//! The segmented consumer market.
//!
//! Segments (archetype × use case) are the unit of consumer modeling; there
//! are no individual consumers. Each segment tracks a believed quality per
//! provider (score-driven, trust-weighted) and a market-share distribution
//! that moves probabilistically toward the most satisfying provider under a
//! per-round rate cap.
//!
//! Satisfaction is computed from true capability handed in by the
//! Orchestrator as plain numbers, never from published scores. The gap
//! between score-driven belief and capability-driven satisfaction is the
//! signal through which the rest of the ecosystem eventually notices
//! gaming.

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::evaluator::RoundScores;
use crate::media::MediaReport;
use crate::state::Portfolio;

/// How fast beliefs chase the (trust-weighted) published signal.
const BELIEF_LEARNING_RATE: f64 = 0.25;

/// How strongly media coverage moves beliefs.
const MEDIA_BELIEF_WEIGHT: f64 = 0.1;

/// Satisfaction bonus per unit of safety-alignment investment.
const SAFETY_SATISFACTION_BONUS: f64 = 0.1;

/// How strongly media coverage colors satisfaction.
const MEDIA_SATISFACTION_WEIGHT: f64 = 0.05;

/// Weight of satisfaction vs trust-weighted belief in the switching blend.
const SATISFACTION_BLEND: f64 = 0.6;

/// Default per-round cap on the share fraction a segment can move.
pub const DEFAULT_SWITCH_RATE_CAP: f64 = 0.2;

/// Standard deviation of the per-round share perturbation.
const SHARE_PERTURBATION_STD: f64 = 0.005;

/// One consumer segment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    pub archetype: String,
    pub use_case: String,

    /// Relative size; aggregate outputs weight segments by this.
    pub size: f64,

    /// How much this segment believes the leaderboard, in [0, 1].
    pub leaderboard_trust: f64,

    /// provider -> believed quality.
    beliefs: BTreeMap<String, f64>,

    /// provider -> share fraction; sums to 1.
    shares: BTreeMap<String, f64>,

    /// benchmark name -> preference weight for this use case. Empty means
    /// the segment reads the composite.
    benchmark_weights: BTreeMap<String, f64>,
}

impl Segment {
    pub fn new(
        archetype: impl Into<String>,
        use_case: impl Into<String>,
        size: f64,
        leaderboard_trust: f64,
        providers: &[String],
    ) -> Self {
        let even = 1.0 / providers.len().max(1) as f64;
        Self {
            archetype: archetype.into(),
            use_case: use_case.into(),
            size: size.max(0.0),
            leaderboard_trust: leaderboard_trust.clamp(0.0, 1.0),
            beliefs: providers.iter().map(|p| (p.clone(), 0.5)).collect(),
            shares: providers.iter().map(|p| (p.clone(), even)).collect(),
            benchmark_weights: BTreeMap::new(),
        }
    }

    pub fn with_benchmark_weights(mut self, weights: BTreeMap<String, f64>) -> Self {
        self.benchmark_weights = weights;
        self
    }

    /// `archetype:use_case` identity.
    pub fn name(&self) -> String {
        format!("{}:{}", self.archetype, self.use_case)
    }

    pub fn shares(&self) -> &BTreeMap<String, f64> {
        &self.shares
    }

    pub fn beliefs(&self) -> &BTreeMap<String, f64> {
        &self.beliefs
    }

    /// Structured summary of this segment's observable state.
    pub fn get_context(&self) -> serde_json::Value {
        serde_json::json!({
            "segment": self.name(),
            "size": self.size,
            "leaderboard_trust": self.leaderboard_trust,
            "beliefs": self.beliefs,
            "market_shares": self.shares,
        })
    }

    /// The score signal this segment reads for a provider: its use-case
    /// benchmark mix when configured, the composite otherwise.
    fn score_signal(&self, scores: &RoundScores, provider: &str) -> Option<f64> {
        if !self.benchmark_weights.is_empty() {
            if let Some(per_benchmark) = scores.per_benchmark.get(provider) {
                let mut weighted = 0.0;
                let mut total = 0.0;
                for (benchmark, weight) in &self.benchmark_weights {
                    if let Some(score) = per_benchmark.get(benchmark) {
                        weighted += weight * score;
                        total += weight;
                    }
                }
                if total > f64::EPSILON {
                    return Some(weighted / total);
                }
            }
        }
        scores.score(provider)
    }

    /// Belief update from the leaderboard and (lagged) media coverage.
    fn observe(&mut self, scores: &RoundScores, media: Option<&MediaReport>) {
        let signals: Vec<(String, Option<f64>)> = self
            .beliefs
            .keys()
            .map(|p| (p.clone(), self.score_signal(scores, p)))
            .collect();

        for (provider, signal) in signals {
            let belief = self.beliefs.entry(provider.clone()).or_insert(0.5);
            if let Some(signal) = signal {
                *belief += BELIEF_LEARNING_RATE * self.leaderboard_trust * (signal - *belief);
            }
            if let Some(media) = media {
                *belief += MEDIA_BELIEF_WEIGHT * media.sentiment(&provider) * media.attention(&provider);
            }
            *belief = belief.clamp(0.0, 1.0);
        }
    }

    /// Moves share toward the provider with the best blend of satisfaction
    /// and trust-weighted belief. Returns the fraction of share moved.
    fn switch(
        &mut self,
        satisfaction: &BTreeMap<String, f64>,
        rate_cap: f64,
        rng: &mut ChaCha8Rng,
    ) -> f64 {
        if self.shares.len() < 2 {
            return 0.0;
        }

        let blend: BTreeMap<String, f64> = self
            .shares
            .keys()
            .map(|p| {
                let sat = satisfaction.get(p).copied().unwrap_or(0.5);
                let belief = self.beliefs.get(p).copied().unwrap_or(0.5);
                let value = SATISFACTION_BLEND * sat
                    + (1.0 - SATISFACTION_BLEND) * self.leaderboard_trust * belief;
                (p.clone(), value)
            })
            .collect();

        let (target, target_blend) = match blend
            .iter()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
        {
            Some((p, v)) => (p.clone(), *v),
            None => return 0.0,
        };

        let mut moved_total = 0.0;
        for (provider, share) in self.shares.iter_mut() {
            if *provider == target {
                continue;
            }
            let pull = (target_blend - blend[provider]).clamp(0.0, 1.0);
            let moved = *share * rate_cap * pull;
            *share -= moved;
            moved_total += moved;
        }
        if let Some(share) = self.shares.get_mut(&target) {
            *share += moved_total;
        }

        // Small seeded perturbation so ties do not freeze the market.
        for share in self.shares.values_mut() {
            let jitter: f64 = rng.gen_range(-SHARE_PERTURBATION_STD..=SHARE_PERTURBATION_STD);
            *share = (*share + jitter).max(0.0);
        }
        let total: f64 = self.shares.values().sum();
        if total > f64::EPSILON {
            for share in self.shares.values_mut() {
                *share /= total;
            }
        } else {
            let even = 1.0 / self.shares.len() as f64;
            for share in self.shares.values_mut() {
                *share = even;
            }
        }

        moved_total
    }
}

/// Aggregate market output for one round. This is what funders,
/// policymakers, and the round record see.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketReport {
    pub round: u64,

    /// Size-weighted mean share per provider.
    pub market_shares: BTreeMap<String, f64>,

    pub avg_satisfaction: f64,
    pub provider_satisfaction: BTreeMap<String, f64>,

    /// Fraction of total (size-weighted) share that moved this round.
    pub switching_rate: f64,

    /// Share-weighted true satisfaction per segment, for the ground-truth
    /// store write-back.
    pub segment_satisfaction: BTreeMap<String, f64>,
}

impl MarketReport {
    pub fn share(&self, provider: &str) -> f64 {
        self.market_shares.get(provider).copied().unwrap_or(0.0)
    }
}

/// The whole consumer side: a collection of segments updated in lockstep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumerMarket {
    segments: Vec<Segment>,
    switch_rate_cap: f64,
}

impl ConsumerMarket {
    pub fn new(segments: Vec<Segment>) -> Self {
        Self {
            segments,
            switch_rate_cap: DEFAULT_SWITCH_RATE_CAP,
        }
    }

    pub fn with_switch_rate_cap(mut self, cap: f64) -> Self {
        self.switch_rate_cap = cap.clamp(0.0, 1.0);
        self
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// True satisfaction of one segment with one provider.
    ///
    /// Derived from true capability scaled by the segment's quality
    /// sensitivity, raised by safety investment, colored by media. It is
    /// deliberately blind to evaluation engineering, which buys scores,
    /// not satisfaction.
    fn satisfaction(
        quality_sensitivity: f64,
        true_capability: f64,
        portfolio: Option<&Portfolio>,
        media_sentiment: f64,
    ) -> f64 {
        let safety = portfolio.map(|p| p.safety_alignment).unwrap_or(0.25);
        let base = 0.5 + quality_sensitivity * (true_capability - 0.5);
        (base + SAFETY_SATISFACTION_BONUS * safety + MEDIA_SATISFACTION_WEIGHT * media_sentiment)
            .clamp(0.0, 1.0)
    }

    /// Runs one full market round: observe, compute satisfaction, switch.
    ///
    /// `true_capabilities` and `quality_sensitivities` are ground-truth
    /// values passed by the Orchestrator as plain numbers; `media` is the
    /// previous round's coverage (publication lag).
    #[allow(clippy::too_many_arguments)]
    pub fn update(
        &mut self,
        round: u64,
        scores: &RoundScores,
        true_capabilities: &BTreeMap<String, f64>,
        quality_sensitivities: &BTreeMap<String, f64>,
        portfolios: &BTreeMap<String, Portfolio>,
        media: Option<&MediaReport>,
        rng: &mut ChaCha8Rng,
    ) -> MarketReport {
        let mut market_shares: BTreeMap<String, f64> = BTreeMap::new();
        let mut provider_sat_weighted: BTreeMap<String, f64> = BTreeMap::new();
        let mut segment_satisfaction = BTreeMap::new();
        let mut switched_weighted = 0.0;
        let mut satisfaction_weighted = 0.0;
        let total_size: f64 = self.segments.iter().map(|s| s.size).sum();

        for segment in &mut self.segments {
            segment.observe(scores, media);

            let sensitivity = quality_sensitivities
                .get(&segment.name())
                .copied()
                .unwrap_or(1.0);
            let satisfaction: BTreeMap<String, f64> = true_capabilities
                .iter()
                .map(|(provider, capability)| {
                    let sentiment = media.map(|m| m.sentiment(provider)).unwrap_or(0.0);
                    let value = Self::satisfaction(
                        sensitivity,
                        *capability,
                        portfolios.get(provider),
                        sentiment,
                    );
                    (provider.clone(), value)
                })
                .collect();

            let moved = segment.switch(&satisfaction, self.switch_rate_cap, rng);
            switched_weighted += moved * segment.size;

            // Share-weighted satisfaction is what this segment truly feels.
            let felt: f64 = segment
                .shares()
                .iter()
                .map(|(p, share)| share * satisfaction.get(p).copied().unwrap_or(0.5))
                .sum();
            segment_satisfaction.insert(segment.name(), felt);
            satisfaction_weighted += felt * segment.size;

            for (provider, share) in segment.shares() {
                *market_shares.entry(provider.clone()).or_insert(0.0) += share * segment.size;
            }
            for (provider, sat) in &satisfaction {
                *provider_sat_weighted.entry(provider.clone()).or_insert(0.0) += sat * segment.size;
            }

            debug!(segment = %segment.name(), moved, felt, "segment updated");
        }

        let norm = if total_size > f64::EPSILON { total_size } else { 1.0 };
        for share in market_shares.values_mut() {
            *share /= norm;
        }
        for sat in provider_sat_weighted.values_mut() {
            *sat /= norm;
        }

        MarketReport {
            round,
            market_shares,
            avg_satisfaction: satisfaction_weighted / norm,
            provider_satisfaction: provider_sat_weighted,
            switching_rate: switched_weighted / norm,
            segment_satisfaction,
        }
    }
}
