//! Funders: capital allocators reacting to public and market signals.
//!
//! Each profile scores providers with its own weight vector over believed
//! quality, score momentum, market-share level and momentum, and a
//! diversification term, then turns scores into allocations in a
//! profile-specific way. Allocated capital feeds back into provider
//! capability through the Orchestrator's funding multiplier on the *next*
//! round.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::stats::Window;

/// Momentum windows hold this many levels (three deltas).
const MOMENTUM_WINDOW: usize = 4;

/// Scales per-round deltas into the same range as level signals.
const MOMENTUM_GAIN: f64 = 10.0;

/// Attractiveness penalty factor for providers under active regulation
/// (gov profile only).
const REGULATION_PENALTY: f64 = 0.5;

/// Foundation bonus per unit of believed-quality shortfall.
const UNDERDOG_BONUS: f64 = 0.3;

/// VC concentration split: top, runner-up, trickle for the rest.
const VC_TOP_FRACTION: f64 = 0.6;
const VC_SECOND_FRACTION: f64 = 0.3;
const VC_TRICKLE_FRACTION: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FunderProfile {
    Vc,
    Gov,
    Foundation,
}

/// Per-profile weights over the attractiveness components.
#[derive(Debug, Clone, Copy)]
struct ProfileWeights {
    quality: f64,
    score_momentum: f64,
    share_level: f64,
    share_momentum: f64,
    diversification: f64,
}

impl FunderProfile {
    fn weights(self) -> ProfileWeights {
        match self {
            // Momentum chasers: what moved recently matters most.
            FunderProfile::Vc => ProfileWeights {
                quality: 0.3,
                score_momentum: 0.3,
                share_level: 0.1,
                share_momentum: 0.25,
                diversification: 0.05,
            },
            // Steady, quality- and coverage-oriented.
            FunderProfile::Gov => ProfileWeights {
                quality: 0.4,
                score_momentum: 0.1,
                share_level: 0.2,
                share_momentum: 0.1,
                diversification: 0.2,
            },
            // Fills gaps others leave.
            FunderProfile::Foundation => ProfileWeights {
                quality: 0.2,
                score_momentum: 0.1,
                share_level: 0.1,
                share_momentum: 0.1,
                diversification: 0.5,
            },
        }
    }
}

/// What a funder can observe about one provider this round. All public or
/// market-derived; no ground truth.
#[derive(Debug, Clone, Copy, Default)]
pub struct FunderObservation {
    /// Published composite score (the funder's quality proxy).
    pub believed_quality: f64,
    pub market_share: f64,
    pub under_regulation: bool,
    /// How concentrated *other* funders already are on this provider, in
    /// [0, 1].
    pub other_funder_share: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Funder {
    pub name: String,
    profile: FunderProfile,

    /// Capital pool deployed per decision round.
    capital_per_round: f64,

    /// Per-provider cap as a fraction of the round pool.
    max_fraction_per_provider: f64,

    /// Rounds between allocation decisions; allocations persist in between.
    cooldown: u64,
    last_decision_round: Option<u64>,

    allocations: BTreeMap<String, f64>,

    score_windows: BTreeMap<String, Window<f64>>,
    share_windows: BTreeMap<String, Window<f64>>,
}

impl Funder {
    pub fn new(name: impl Into<String>, profile: FunderProfile, capital_per_round: f64) -> Self {
        Self {
            name: name.into(),
            profile,
            capital_per_round: capital_per_round.max(0.0),
            max_fraction_per_provider: VC_TOP_FRACTION,
            cooldown: 2,
            last_decision_round: None,
            allocations: BTreeMap::new(),
            score_windows: BTreeMap::new(),
            share_windows: BTreeMap::new(),
        }
    }

    pub fn with_cooldown(mut self, cooldown: u64) -> Self {
        self.cooldown = cooldown;
        self
    }

    pub fn with_max_fraction(mut self, fraction: f64) -> Self {
        self.max_fraction_per_provider = fraction.clamp(0.0, 1.0);
        self
    }

    pub fn profile(&self) -> FunderProfile {
        self.profile
    }

    pub fn capital_per_round(&self) -> f64 {
        self.capital_per_round
    }

    pub fn allocations(&self) -> &BTreeMap<String, f64> {
        &self.allocations
    }

    /// Structured summary of this funder's observable state.
    pub fn get_context(&self) -> serde_json::Value {
        serde_json::json!({
            "name": self.name,
            "profile": self.profile,
            "capital_per_round": self.capital_per_round,
            "allocations": self.allocations,
        })
    }

    /// Feeds the round's observations into the momentum windows. Called
    /// every round, including cooldown rounds, so momentum never skips.
    pub fn observe(&mut self, observations: &BTreeMap<String, FunderObservation>) {
        for (provider, obs) in observations {
            self.score_windows
                .entry(provider.clone())
                .or_insert_with(|| Window::new(MOMENTUM_WINDOW))
                .push(obs.believed_quality);
            self.share_windows
                .entry(provider.clone())
                .or_insert_with(|| Window::new(MOMENTUM_WINDOW))
                .push(obs.market_share);
        }
    }

    fn attractiveness(&self, provider: &str, obs: &FunderObservation) -> f64 {
        let w = self.profile.weights();
        let score_momentum = self
            .score_windows
            .get(provider)
            .map(Window::mean_delta)
            .unwrap_or(0.0);
        let share_momentum = self
            .share_windows
            .get(provider)
            .map(Window::mean_delta)
            .unwrap_or(0.0);

        w.quality * obs.believed_quality
            + w.score_momentum * score_momentum * MOMENTUM_GAIN
            + w.share_level * obs.market_share
            + w.share_momentum * share_momentum * MOMENTUM_GAIN
            + w.diversification * (1.0 - obs.other_funder_share)
    }

    /// Decides (or holds) this round's allocations.
    ///
    /// Inside the cooldown window the previous allocations are returned
    /// unchanged. Every allocation is capped at the per-provider fraction
    /// of the round pool; capped-off remainder stays undeployed.
    pub fn allocate(
        &mut self,
        round: u64,
        observations: &BTreeMap<String, FunderObservation>,
    ) -> &BTreeMap<String, f64> {
        if let Some(last) = self.last_decision_round {
            if round.saturating_sub(last) < self.cooldown {
                return &self.allocations;
            }
        }

        let mut scored: Vec<(String, f64, &FunderObservation)> = observations
            .iter()
            .map(|(p, obs)| (p.clone(), self.attractiveness(p, obs), obs))
            .collect();

        let mut allocations: BTreeMap<String, f64> = BTreeMap::new();
        let pool = self.capital_per_round;

        match self.profile {
            FunderProfile::Vc => {
                scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
                let trickle_count = scored.len().saturating_sub(2);
                for (index, (provider, _, _)) in scored.iter().enumerate() {
                    let amount = match index {
                        0 => VC_TOP_FRACTION * pool,
                        1 => VC_SECOND_FRACTION * pool,
                        _ => VC_TRICKLE_FRACTION * pool / trickle_count.max(1) as f64,
                    };
                    allocations.insert(provider.clone(), amount);
                }
            }
            FunderProfile::Gov => {
                let mut weights: Vec<f64> = scored
                    .iter()
                    .map(|(_, a, obs)| {
                        let penalty = if obs.under_regulation { 1.0 - REGULATION_PENALTY } else { 1.0 };
                        a.max(0.0) * penalty
                    })
                    .collect();
                crate::stats::normalize_weights(&mut weights);
                for ((provider, _, _), weight) in scored.iter().zip(weights) {
                    allocations.insert(provider.clone(), weight * pool);
                }
            }
            FunderProfile::Foundation => {
                let mut weights: Vec<f64> = scored
                    .iter()
                    .map(|(_, a, obs)| {
                        a.max(0.0) + UNDERDOG_BONUS * (1.0 - obs.believed_quality).clamp(0.0, 1.0)
                    })
                    .collect();
                crate::stats::normalize_weights(&mut weights);
                for ((provider, _, _), weight) in scored.iter().zip(weights) {
                    allocations.insert(provider.clone(), weight * pool);
                }
            }
        }

        let cap = self.max_fraction_per_provider * pool;
        for amount in allocations.values_mut() {
            *amount = amount.min(cap);
        }

        debug!(funder = %self.name, round, ?allocations, "allocation decision");
        self.allocations = allocations;
        self.last_decision_round = Some(round);
        &self.allocations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn obs(quality: f64, share: f64) -> FunderObservation {
        FunderObservation {
            believed_quality: quality,
            market_share: share,
            under_regulation: false,
            other_funder_share: 0.0,
        }
    }

    fn observations(entries: &[(&str, FunderObservation)]) -> BTreeMap<String, FunderObservation> {
        entries.iter().map(|(n, o)| (n.to_string(), *o)).collect()
    }

    #[test]
    fn test_vc_follows_share_momentum() {
        let mut vc = Funder::new("sequoia_like", FunderProfile::Vc, 100.0).with_cooldown(1);

        // Equal believed quality, diverging market-share trajectories.
        let rising = [0.30, 0.35, 0.40, 0.45];
        let falling = [0.45, 0.40, 0.35, 0.30];
        for i in 0..4 {
            vc.observe(&observations(&[
                ("alpha", obs(0.6, rising[i])),
                ("beta", obs(0.6, falling[i])),
            ]));
        }

        let allocations = vc.allocate(
            4,
            &observations(&[("alpha", obs(0.6, 0.45)), ("beta", obs(0.6, 0.30))]),
        );
        assert!(allocations["alpha"] > allocations["beta"]);
        assert_relative_eq!(allocations["alpha"], 60.0);
        assert_relative_eq!(allocations["beta"], 30.0);
    }

    #[test]
    fn test_vc_concentrates_with_trickle() {
        let mut vc = Funder::new("vc", FunderProfile::Vc, 100.0).with_cooldown(1);
        let batch = observations(&[
            ("alpha", obs(0.9, 0.5)),
            ("beta", obs(0.6, 0.3)),
            ("gamma", obs(0.3, 0.1)),
            ("delta", obs(0.2, 0.1)),
        ]);
        vc.observe(&batch);
        let allocations = vc.allocate(1, &batch);

        assert_relative_eq!(allocations["alpha"], 60.0);
        assert_relative_eq!(allocations["beta"], 30.0);
        assert_relative_eq!(allocations["gamma"], 5.0);
        assert_relative_eq!(allocations["delta"], 5.0);
    }

    #[test]
    fn test_gov_penalizes_regulated_providers() {
        let mut gov = Funder::new("nsf_like", FunderProfile::Gov, 100.0).with_cooldown(1);
        let regulated = FunderObservation {
            believed_quality: 0.6,
            market_share: 0.5,
            under_regulation: true,
            other_funder_share: 0.0,
        };
        let batch = observations(&[("alpha", obs(0.6, 0.5)), ("beta", regulated)]);
        gov.observe(&batch);
        let allocations = gov.allocate(1, &batch);

        assert!(allocations["alpha"] > allocations["beta"]);
        // Gov deploys the whole pool across providers (before caps).
        let total: f64 = allocations.values().sum();
        assert!(total <= 100.0 + 1e-9);
    }

    #[test]
    fn test_foundation_favors_underdogs() {
        let mut foundation = Funder::new("ford_like", FunderProfile::Foundation, 100.0).with_cooldown(1);
        // Same share and momentum; only believed quality differs.
        let batch = observations(&[("leader", obs(0.9, 0.5)), ("underdog", obs(0.2, 0.5))]);
        foundation.observe(&batch);
        let allocations = foundation.allocate(1, &batch);

        assert!(allocations["underdog"] > allocations["leader"] * 0.5);
    }

    #[test]
    fn test_cooldown_freezes_allocations() {
        let mut vc = Funder::new("vc", FunderProfile::Vc, 100.0).with_cooldown(3);
        let batch_a = observations(&[("alpha", obs(0.9, 0.5)), ("beta", obs(0.2, 0.1))]);
        vc.observe(&batch_a);
        let first = vc.allocate(1, &batch_a).clone();

        // A reversal during cooldown changes nothing.
        let batch_b = observations(&[("alpha", obs(0.1, 0.1)), ("beta", obs(0.9, 0.9))]);
        vc.observe(&batch_b);
        let held = vc.allocate(2, &batch_b).clone();
        assert_eq!(first, held);

        // After the cooldown the decision refreshes.
        vc.observe(&batch_b);
        let refreshed = vc.allocate(4, &batch_b).clone();
        assert!(refreshed["beta"] > refreshed["alpha"]);
    }

    #[test]
    fn test_per_provider_cap() {
        let mut vc = Funder::new("vc", FunderProfile::Vc, 100.0)
            .with_cooldown(1)
            .with_max_fraction(0.4);
        let batch = observations(&[("alpha", obs(0.9, 0.5)), ("beta", obs(0.2, 0.1))]);
        vc.observe(&batch);
        let allocations = vc.allocate(1, &batch);
        assert!(allocations.values().all(|a| *a <= 40.0 + 1e-9));
    }
}
