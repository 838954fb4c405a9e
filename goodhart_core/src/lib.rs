//! Goodhart ecosystem core: actors, benchmarks, and market dynamics.
//!
//! This crate models the actor side of a multi-actor AI-evaluation
//! ecosystem built to study Goodhart's-Law dynamics: how benchmark
//! gaming, regulation, capital allocation, and consumer switching interact
//! over repeated rounds.
//!
//! # The three-tier visibility model
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │ GroundTruth      true capability, true satisfaction, ...    │
//! │                  (lives in goodhart_sim, orchestrator-owned,│
//! │                   not representable in this crate)          │
//! ├─────────────────────────────────────────────────────────────┤
//! │ PrivateState     beliefs, portfolios, histories             │
//! │                  (owned by each actor, visible to logging)  │
//! ├─────────────────────────────────────────────────────────────┤
//! │ PublicState      names, rounds, published scores            │
//! │                  (visible to everyone)                      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Actors reason only from the bottom two tiers. The Evaluator and the
//! Orchestrator are the only components that touch ground truth, and they
//! receive it as plain values, never as references an actor could hold.
//!
//! # The Goodhart loop
//!
//! Evaluation-engineering investment inflates published scores
//! ([`evaluator::Evaluator::evaluate_all`]); aggregate gaming pressure then
//! degrades benchmark validity and grows exploitability
//! ([`benchmark::Benchmark::apply_gaming_pressure`]), which makes gaming
//! cheaper and scores noisier next round. Consumers eventually feel the
//! gap between score-driven belief and capability-driven satisfaction
//! ([`market::ConsumerMarket`]), and policymakers and funders react to the
//! fallout.

pub mod benchmark;
pub mod config;
pub mod decision;
pub mod error;
pub mod evaluator;
pub mod funder;
pub mod market;
pub mod media;
pub mod policymaker;
pub mod provider;
pub mod record;
pub mod state;
pub mod stats;

pub use benchmark::Benchmark;
pub use config::SimulationConfig;
pub use decision::{DecisionContext, DecisionEngine, HeuristicEngine, PortfolioDecision};
pub use error::{ConfigError, ReasonerError};
pub use evaluator::{EvaluationInput, Evaluator, RoundScores};
pub use funder::{Funder, FunderObservation, FunderProfile};
pub use market::{ConsumerMarket, MarketReport, Segment};
pub use media::{MediaOutlet, MediaReport};
pub use policymaker::{Policymaker, PolicySignals, Regulation, RegulationKind};
pub use provider::{Provider, StrategyArchetype};
pub use record::RoundRecord;
pub use state::{Portfolio, PublicState};
