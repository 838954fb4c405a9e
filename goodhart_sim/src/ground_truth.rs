//! The ground-truth store: the top tier of the visibility model.
//!
//! Every objective quantity in the ecosystem lives here, keyed by actor
//! name and owned exclusively by the Orchestrator. Actor types in
//! `goodhart_core` cannot name these structs, so the only way ground truth
//! reaches an actor is as a plain number the Orchestrator chooses to hand
//! over (true capability to the Evaluator and the market satisfaction
//! function, nothing to anyone else).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What is objectively true about a provider.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ProviderTruth {
    /// Actual model capability in [0, 1]. Moves only through the
    /// Orchestrator's capability dynamics, never through scores.
    pub true_capability: f64,
}

/// What is objectively true about a consumer segment.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SegmentTruth {
    /// Realized satisfaction, written back each round from the market step.
    pub true_satisfaction: f64,

    /// How strongly real capability drives this segment's satisfaction.
    pub true_quality_sensitivity: f64,
}

/// What is objectively true about a policymaker.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PolicymakerTruth {
    pub true_risk_tolerance: f64,
    pub true_intervention_effectiveness: f64,
}

/// What is objectively true about a funder.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FunderTruth {
    pub true_roi: f64,
    pub funding_efficiency: f64,
}

/// The Orchestrator's private record of objective reality.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GroundTruthStore {
    providers: BTreeMap<String, ProviderTruth>,
    segments: BTreeMap<String, SegmentTruth>,
    policymakers: BTreeMap<String, PolicymakerTruth>,
    funders: BTreeMap<String, FunderTruth>,
}

impl GroundTruthStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_provider(&mut self, name: impl Into<String>, true_capability: f64) {
        self.providers.insert(
            name.into(),
            ProviderTruth {
                true_capability: true_capability.clamp(0.0, 1.0),
            },
        );
    }

    pub fn insert_segment(&mut self, name: impl Into<String>, quality_sensitivity: f64) {
        self.segments.insert(
            name.into(),
            SegmentTruth {
                true_satisfaction: 0.5,
                true_quality_sensitivity: quality_sensitivity.max(0.0),
            },
        );
    }

    pub fn insert_policymaker(
        &mut self,
        name: impl Into<String>,
        risk_tolerance: f64,
        intervention_effectiveness: f64,
    ) {
        self.policymakers.insert(
            name.into(),
            PolicymakerTruth {
                true_risk_tolerance: risk_tolerance.clamp(0.0, 1.0),
                true_intervention_effectiveness: intervention_effectiveness.clamp(0.0, 1.0),
            },
        );
    }

    pub fn insert_funder(&mut self, name: impl Into<String>, true_roi: f64, funding_efficiency: f64) {
        self.funders.insert(
            name.into(),
            FunderTruth {
                true_roi,
                funding_efficiency: funding_efficiency.clamp(0.0, 1.0),
            },
        );
    }

    pub fn provider_capability(&self, name: &str) -> Option<f64> {
        self.providers.get(name).map(|t| t.true_capability)
    }

    /// All provider capabilities, the shape the Evaluator and market steps
    /// consume.
    pub fn provider_capabilities(&self) -> BTreeMap<String, f64> {
        self.providers
            .iter()
            .map(|(name, truth)| (name.clone(), truth.true_capability))
            .collect()
    }

    pub fn set_provider_capability(&mut self, name: &str, capability: f64) {
        if let Some(truth) = self.providers.get_mut(name) {
            truth.true_capability = capability.clamp(0.0, 1.0);
        }
    }

    /// Segment quality sensitivities keyed by segment name.
    pub fn segment_sensitivities(&self) -> BTreeMap<String, f64> {
        self.segments
            .iter()
            .map(|(name, truth)| (name.clone(), truth.true_quality_sensitivity))
            .collect()
    }

    /// Writes back a segment's realized satisfaction for the round.
    pub fn record_segment_satisfaction(&mut self, name: &str, satisfaction: f64) {
        if let Some(truth) = self.segments.get_mut(name) {
            truth.true_satisfaction = satisfaction.clamp(0.0, 1.0);
        }
    }

    pub fn segment(&self, name: &str) -> Option<&SegmentTruth> {
        self.segments.get(name)
    }

    pub fn policymaker(&self, name: &str) -> Option<&PolicymakerTruth> {
        self.policymakers.get(name)
    }

    pub fn funder(&self, name: &str) -> Option<&FunderTruth> {
        self.funders.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_capability_clamped_on_write() {
        let mut store = GroundTruthStore::new();
        store.insert_provider("alpha", 1.7);
        assert_eq!(store.provider_capability("alpha"), Some(1.0));

        store.set_provider_capability("alpha", -0.3);
        assert_eq!(store.provider_capability("alpha"), Some(0.0));
    }

    #[test]
    fn test_satisfaction_write_back() {
        let mut store = GroundTruthStore::new();
        store.insert_segment("enterprise:coding", 1.2);
        assert_relative_eq!(store.segment("enterprise:coding").unwrap().true_satisfaction, 0.5);

        store.record_segment_satisfaction("enterprise:coding", 0.31);
        assert_relative_eq!(store.segment("enterprise:coding").unwrap().true_satisfaction, 0.31);
        // Unknown segments are ignored, not created.
        store.record_segment_satisfaction("no_such_segment", 0.9);
        assert!(store.segment("no_such_segment").is_none());
    }

    #[test]
    fn test_store_round_trip() {
        let mut store = GroundTruthStore::new();
        store.insert_provider("alpha", 0.62);
        store.insert_segment("hobbyist:chat", 0.8);
        store.insert_policymaker("fda", 0.4, 0.7);
        store.insert_funder("vc", 0.5, 0.9);

        let json = serde_json::to_string(&store).unwrap();
        let back: GroundTruthStore = serde_json::from_str(&json).unwrap();

        assert_eq!(back.provider_capability("alpha"), Some(0.62));
        assert_relative_eq!(back.segment("hobbyist:chat").unwrap().true_quality_sensitivity, 0.8);
        assert_relative_eq!(back.policymaker("fda").unwrap().true_risk_tolerance, 0.4);
        assert_relative_eq!(back.funder("vc").unwrap().funding_efficiency, 0.9);
    }
}
