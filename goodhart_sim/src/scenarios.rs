//! Canned ecosystem scenarios with pass/fail assertions.

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioId {
    /// Honest baseline: inert benchmark, leaderboard mirrors capability
    StableDuopoly,

    /// Heavy gaming collapses validity and forces a fresh benchmark
    GamingSpiral,

    /// Degraded correlation draws exactly one benchmark mandate
    RegulatorResponse,

    /// VC capital chases score momentum, not level
    VcMomentum,

    /// Every actor on at once; invariants must hold throughout
    FullEcosystem,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::StableDuopoly,
            ScenarioId::GamingSpiral,
            ScenarioId::RegulatorResponse,
            ScenarioId::VcMomentum,
            ScenarioId::FullEcosystem,
        ]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::StableDuopoly => "stable_duopoly",
            ScenarioId::GamingSpiral => "gaming_spiral",
            ScenarioId::RegulatorResponse => "regulator_response",
            ScenarioId::VcMomentum => "vc_momentum",
            ScenarioId::FullEcosystem => "full_ecosystem",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::StableDuopoly => {
                "Two honest providers, perfect benchmark; scores track capability"
            }
            ScenarioId::GamingSpiral => {
                "0.9-exploitability benchmark plus a 90% eval-engineering gamer; validity collapses"
            }
            ScenarioId::RegulatorResponse => {
                "Gamed leaderboard pushes correlation below 0.4; one mandate fires"
            }
            ScenarioId::VcMomentum => {
                "Rising underdog vs stagnant incumbent; VC follows the momentum"
            }
            ScenarioId::FullEcosystem => {
                "Providers, segments, media, policymaker, and funders all active"
            }
        }
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "stable_duopoly" | "stableduopoly" | "duopoly" => Ok(ScenarioId::StableDuopoly),
            "gaming_spiral" | "gamingspiral" | "spiral" => Ok(ScenarioId::GamingSpiral),
            "regulator_response" | "regulatorresponse" | "regulator" => {
                Ok(ScenarioId::RegulatorResponse)
            }
            "vc_momentum" | "vcmomentum" | "momentum" => Ok(ScenarioId::VcMomentum),
            "full_ecosystem" | "fullecosystem" | "full" => Ok(ScenarioId::FullEcosystem),
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}
