//! Goodhart ecosystem simulation harness.
//!
//! This crate wraps the actors in `goodhart_core` with the two components
//! allowed to know what is objectively true:
//!
//! - the [`GroundTruthStore`], the orchestrator-private record of real
//!   capability, real satisfaction, and real funder efficiency;
//! - the [`Orchestrator`], which owns the store, drives the fixed round
//!   order, and hands ground truth to the Evaluator and the market as
//!   plain numbers.
//!
//! On top sit canned [`scenarios`] with pass/fail assertions, a
//! [`ScenarioRunner`], and JSON exporters for offline analysis. A run is
//! fully determined by its seed: the Evaluator owns the single RNG and
//! every stochastic draw (measurement noise, breakthrough rolls, market
//! perturbation) flows through it.
//!
//! # Usage
//!
//! ```ignore
//! use goodhart_sim::{ScenarioRunner, scenarios::ScenarioId};
//!
//! let result = ScenarioRunner::new(42).run(ScenarioId::GamingSpiral);
//! assert!(result.passed);
//! ```

mod exporter;
mod ground_truth;
mod orchestrator;
mod runner;
pub mod scenarios;

pub use exporter::{RoundLogWriter, RunExport};
pub use ground_truth::{
    FunderTruth, GroundTruthStore, PolicymakerTruth, ProviderTruth, SegmentTruth,
};
pub use orchestrator::Orchestrator;
pub use runner::{FixedPortfolioEngine, ScenarioMetrics, ScenarioResult, ScenarioRunner};
