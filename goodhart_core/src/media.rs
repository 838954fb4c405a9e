//! Media: an optional outlet that turns score movement into coverage.
//!
//! Coverage is derived purely from public scores (delta and rank change),
//! emitted as per-provider sentiment and attention, and consumed by the
//! consumer market with a one-round publication lag.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::evaluator::RoundScores;

/// One piece of coverage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaItem {
    pub provider: String,
    /// Tone of coverage in [-1, 1].
    pub sentiment: f64,
    /// Volume of coverage in [0, 1].
    pub attention: f64,
    pub headline: String,
}

/// The coverage emitted for one round.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MediaReport {
    pub round: u64,
    pub items: Vec<MediaItem>,
}

impl MediaReport {
    pub fn sentiment(&self, provider: &str) -> f64 {
        self.items
            .iter()
            .find(|i| i.provider == provider)
            .map(|i| i.sentiment)
            .unwrap_or(0.0)
    }

    pub fn attention(&self, provider: &str) -> f64 {
        self.items
            .iter()
            .find(|i| i.provider == provider)
            .map(|i| i.attention)
            .unwrap_or(0.0)
    }
}

/// Score deltas at or above this are newsworthy by default.
pub const DEFAULT_NEWSWORTHY_DELTA: f64 = 0.03;

/// Scales a score delta into attention.
const ATTENTION_GAIN: f64 = 8.0;

/// Scales a rank change into sentiment.
const RANK_SENTIMENT: f64 = 0.4;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaOutlet {
    pub name: String,
    newsworthy_delta: f64,
    previous_composite: BTreeMap<String, f64>,
    previous_rank: BTreeMap<String, usize>,
}

impl MediaOutlet {
    pub fn new(name: impl Into<String>, newsworthy_delta: f64) -> Self {
        Self {
            name: name.into(),
            newsworthy_delta: newsworthy_delta.max(0.0),
            previous_composite: BTreeMap::new(),
            previous_rank: BTreeMap::new(),
        }
    }

    /// Scans the round's leaderboard for newsworthy movement.
    pub fn cover(&mut self, scores: &RoundScores) -> MediaReport {
        let leaderboard = scores.leaderboard();
        let mut items = Vec::new();

        for (rank, (provider, composite)) in leaderboard.iter().enumerate() {
            let delta = self
                .previous_composite
                .get(provider)
                .map(|prev| composite - prev)
                .unwrap_or(0.0);
            let rank_change = self
                .previous_rank
                .get(provider)
                .map(|prev| *prev as i64 - rank as i64) // positive = climbed
                .unwrap_or(0);

            if delta.abs() >= self.newsworthy_delta || rank_change != 0 {
                let sentiment = (delta * 10.0 + rank_change as f64 * RANK_SENTIMENT).clamp(-1.0, 1.0);
                let attention = (delta.abs() * ATTENTION_GAIN + rank_change.unsigned_abs() as f64 * 0.2)
                    .clamp(0.0, 1.0);
                let headline = if rank_change > 0 {
                    format!("{provider} climbs to #{} on the leaderboard", rank + 1)
                } else if rank_change < 0 {
                    format!("{provider} slips to #{}", rank + 1)
                } else {
                    format!("{provider} posts a {delta:+.2} score jump")
                };

                debug!(outlet = %self.name, provider = %provider, sentiment, attention, "coverage");
                items.push(MediaItem {
                    provider: provider.clone(),
                    sentiment,
                    attention,
                    headline,
                });
            }

            self.previous_composite.insert(provider.clone(), *composite);
            self.previous_rank.insert(provider.clone(), rank);
        }

        MediaReport { round: scores.round, items }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn round_scores(round: u64, entries: &[(&str, f64)]) -> RoundScores {
        RoundScores {
            round,
            composite: entries.iter().map(|(n, v)| (n.to_string(), *v)).collect(),
            per_benchmark: BTreeMap::new(),
        }
    }

    #[test]
    fn test_first_round_is_quiet() {
        let mut outlet = MediaOutlet::new("wire", DEFAULT_NEWSWORTHY_DELTA);
        let report = outlet.cover(&round_scores(0, &[("alpha", 0.5), ("beta", 0.4)]));
        assert!(report.items.is_empty());
    }

    #[test]
    fn test_big_delta_is_covered() {
        let mut outlet = MediaOutlet::new("wire", 0.03);
        outlet.cover(&round_scores(0, &[("alpha", 0.5), ("beta", 0.4)]));
        let report = outlet.cover(&round_scores(1, &[("alpha", 0.6), ("beta", 0.4)]));

        assert_eq!(report.items.len(), 1);
        let item = &report.items[0];
        assert_eq!(item.provider, "alpha");
        assert!(item.sentiment > 0.0);
        assert!(item.attention > 0.0);
    }

    #[test]
    fn test_rank_change_is_covered_for_both() {
        let mut outlet = MediaOutlet::new("wire", 0.5); // delta alone won't trigger
        outlet.cover(&round_scores(0, &[("alpha", 0.5), ("beta", 0.4)]));
        let report = outlet.cover(&round_scores(1, &[("alpha", 0.5), ("beta", 0.55)]));

        assert_eq!(report.items.len(), 2);
        assert!(report.sentiment("beta") > 0.0);
        assert!(report.sentiment("alpha") < 0.0);
    }

    #[test]
    fn test_quiet_round_after_coverage() {
        let mut outlet = MediaOutlet::new("wire", 0.03);
        outlet.cover(&round_scores(0, &[("alpha", 0.5)]));
        outlet.cover(&round_scores(1, &[("alpha", 0.6)]));
        let report = outlet.cover(&round_scores(2, &[("alpha", 0.6)]));
        assert!(report.items.is_empty());
    }
}
