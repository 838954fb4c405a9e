//! Policymakers: reactive agents that watch public signals and intervene.
//!
//! A policymaker never sees ground truth. It reads the validity-correlation
//! signal and aggregate consumer satisfaction, maintains bounded risk
//! beliefs per category, and when a belief crosses its intervention
//! threshold it issues a regulation to the Evaluator.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;

use crate::evaluator::Evaluator;

/// Regulation categories the ecosystem understands.
///
/// Only `MandateBenchmark` changes Evaluator parameters today; the other
/// two are recorded as placeholders for future policy levers. The source
/// system's investigation and compliance-audit interventions are out of
/// scope here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegulationKind {
    MandateBenchmark,
    SetThreshold,
    RequireDisclosure,
}

/// A regulation issued by a policymaker and applied by the Evaluator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Regulation {
    pub name: String,
    pub kind: RegulationKind,

    /// Parameter payload, interpreted per kind (`min_validity`,
    /// `exploitability_factor`, ...).
    pub details: HashMap<String, f64>,

    pub issued_round: u64,
    pub active: bool,

    /// Benchmark name for mandates, provider name for disclosures.
    pub target: Option<String>,
}

impl Regulation {
    pub fn new(
        name: impl Into<String>,
        kind: RegulationKind,
        details: HashMap<String, f64>,
        issued_round: u64,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            details,
            issued_round,
            active: true,
            target: None,
        }
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }
}

/// Risk-belief vector, each component in [0, 1].
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RiskBeliefs {
    pub gaming: f64,
    pub consumer_harm: f64,
    pub validity_degradation: f64,
}

impl RiskBeliefs {
    fn nudge(value: f64, delta: f64) -> f64 {
        (value + delta).clamp(0.0, 1.0)
    }

    /// Highest category with its value.
    pub fn dominant(&self) -> (RiskCategory, f64) {
        let mut best = (RiskCategory::Gaming, self.gaming);
        if self.consumer_harm > best.1 {
            best = (RiskCategory::ConsumerHarm, self.consumer_harm);
        }
        if self.validity_degradation > best.1 {
            best = (RiskCategory::ValidityDegradation, self.validity_degradation);
        }
        best
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskCategory {
    Gaming,
    ConsumerHarm,
    ValidityDegradation,
}

/// A public statement recorded alongside each executed intervention.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicStatement {
    pub round: u64,
    pub text: String,
}

/// Public signals a policymaker reacts to each round.
#[derive(Debug, Clone, Copy)]
pub struct PolicySignals {
    pub validity_correlation: Option<f64>,
    pub avg_satisfaction: Option<f64>,
}

/// The planned intervention for a round, not yet executed.
#[derive(Debug, Clone)]
pub struct PlannedIntervention {
    pub regulation: Regulation,
    pub statement: String,
}

// Belief-update step sizes and trigger cutoffs.
const RISK_INCREMENT: f64 = 0.1;
const RISK_DECREMENT: f64 = 0.05;
const SIGNAL_CUTOFF: f64 = 0.5;
const MANDATE_CORRELATION_GATE: f64 = 0.4;
const DISCLOSURE_SATISFACTION_GATE: f64 = 0.4;

/// Rounds to sit out after an executed intervention.
const INTERVENTION_COOLDOWN: u64 = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Policymaker {
    pub name: String,
    beliefs: RiskBeliefs,
    intervention_threshold: f64,
    statements: Vec<PublicStatement>,
    issued: u64,
    last_intervention_round: Option<u64>,
}

impl Policymaker {
    pub fn new(name: impl Into<String>, intervention_threshold: f64) -> Self {
        Self {
            name: name.into(),
            beliefs: RiskBeliefs::default(),
            intervention_threshold: intervention_threshold.clamp(0.0, 1.0),
            statements: Vec::new(),
            issued: 0,
            last_intervention_round: None,
        }
    }

    pub fn beliefs(&self) -> RiskBeliefs {
        self.beliefs
    }

    pub fn statements(&self) -> &[PublicStatement] {
        &self.statements
    }

    /// Structured summary of this policymaker's public+private state.
    pub fn get_context(&self) -> serde_json::Value {
        serde_json::json!({
            "name": self.name,
            "risk_beliefs": self.beliefs,
            "intervention_threshold": self.intervention_threshold,
            "interventions_issued": self.issued,
        })
    }

    /// Bounded belief update from the round's public signals.
    pub fn observe(&mut self, signals: PolicySignals) {
        if let Some(correlation) = signals.validity_correlation {
            if correlation < SIGNAL_CUTOFF {
                self.beliefs.validity_degradation =
                    RiskBeliefs::nudge(self.beliefs.validity_degradation, RISK_INCREMENT);
                self.beliefs.gaming = RiskBeliefs::nudge(self.beliefs.gaming, RISK_INCREMENT / 2.0);
            } else {
                self.beliefs.validity_degradation =
                    RiskBeliefs::nudge(self.beliefs.validity_degradation, -RISK_DECREMENT);
            }
        }
        if let Some(satisfaction) = signals.avg_satisfaction {
            if satisfaction < SIGNAL_CUTOFF {
                self.beliefs.consumer_harm = RiskBeliefs::nudge(self.beliefs.consumer_harm, RISK_INCREMENT);
            } else {
                self.beliefs.consumer_harm = RiskBeliefs::nudge(self.beliefs.consumer_harm, -RISK_DECREMENT);
            }
        }
    }

    /// Plans an intervention for this round, if any.
    ///
    /// No action unless the dominant risk belief exceeds the intervention
    /// threshold, the cooldown has elapsed, and the underlying signal is
    /// severe enough for that category's lever.
    pub fn plan(
        &self,
        round: u64,
        signals: PolicySignals,
        least_satisfying_provider: Option<&str>,
    ) -> Option<PlannedIntervention> {
        let (category, level) = self.beliefs.dominant();
        if level <= self.intervention_threshold {
            return None;
        }
        if let Some(last) = self.last_intervention_round {
            if round.saturating_sub(last) < INTERVENTION_COOLDOWN {
                return None;
            }
        }

        match category {
            RiskCategory::ValidityDegradation => {
                let correlation = signals.validity_correlation?;
                if correlation >= MANDATE_CORRELATION_GATE {
                    return None;
                }
                let mut details = HashMap::new();
                details.insert("min_validity".to_string(), 0.5);
                details.insert("exploitability_factor".to_string(), 0.7);
                Some(PlannedIntervention {
                    regulation: Regulation::new(
                        format!("{}_mandate_{}", self.name, round),
                        RegulationKind::MandateBenchmark,
                        details,
                        round,
                    ),
                    statement: format!(
                        "score-capability correlation has fallen to {correlation:.2}; mandating benchmark standards"
                    ),
                })
            }
            RiskCategory::Gaming => {
                let correlation = signals.validity_correlation?;
                if correlation >= MANDATE_CORRELATION_GATE {
                    return None;
                }
                let mut details = HashMap::new();
                details.insert("exploitability_factor".to_string(), 0.6);
                Some(PlannedIntervention {
                    regulation: Regulation::new(
                        format!("{}_antigaming_{}", self.name, round),
                        RegulationKind::MandateBenchmark,
                        details,
                        round,
                    ),
                    statement: "benchmark gaming suspected; mandating harder-to-game evaluation".to_string(),
                })
            }
            RiskCategory::ConsumerHarm => {
                let satisfaction = signals.avg_satisfaction?;
                if satisfaction >= DISCLOSURE_SATISFACTION_GATE {
                    return None;
                }
                let regulation = Regulation::new(
                    format!("{}_disclosure_{}", self.name, round),
                    RegulationKind::RequireDisclosure,
                    HashMap::new(),
                    round,
                );
                let regulation = match least_satisfying_provider {
                    Some(provider) => regulation.with_target(provider),
                    None => regulation,
                };
                Some(PlannedIntervention {
                    regulation,
                    statement: format!(
                        "consumer satisfaction at {satisfaction:.2}; requiring capability disclosure"
                    ),
                })
            }
        }
    }

    /// Applies a planned intervention to the Evaluator and records the
    /// public statement. Cools the acted-on belief so one degraded signal
    /// produces one intervention, not a volley.
    pub fn execute(&mut self, round: u64, planned: PlannedIntervention, evaluator: &mut Evaluator) {
        info!(policymaker = %self.name, regulation = %planned.regulation.name, "executing intervention");

        match planned.regulation.kind {
            RegulationKind::MandateBenchmark => {
                self.beliefs.validity_degradation /= 2.0;
                self.beliefs.gaming /= 2.0;
            }
            RegulationKind::RequireDisclosure | RegulationKind::SetThreshold => {
                self.beliefs.consumer_harm /= 2.0;
            }
        }

        evaluator.add_regulation(planned.regulation);
        self.statements.push(PublicStatement { round, text: planned.statement });
        self.issued += 1;
        self.last_intervention_round = Some(round);
    }
}
