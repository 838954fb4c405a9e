//! Error types for the Goodhart ecosystem core.

use thiserror::Error;

/// Setup-time configuration errors. These fail fast before round 0; nothing
/// is silently defaulted past validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// At least one provider is required.
    #[error("no providers configured")]
    NoProviders,

    /// At least one benchmark is required.
    #[error("no benchmarks configured")]
    NoBenchmarks,

    /// A segment or regulation referenced a benchmark that does not exist.
    #[error("unknown benchmark referenced: {0}")]
    UnknownBenchmark(String),

    /// Two actors share a name; names key every per-actor map.
    #[error("duplicate actor name: {0}")]
    DuplicateName(String),

    /// A numeric field is outside its documented range.
    #[error("invalid value for {field}: {value} ({reason})")]
    InvalidValue {
        field: &'static str,
        value: f64,
        reason: &'static str,
    },
}

/// Failures of an external decision reasoner.
///
/// These are always recovered locally by falling back to the deterministic
/// heuristic for that actor's decision this round; they are recorded on the
/// round record, never propagated.
#[derive(Debug, Clone, Error)]
pub enum ReasonerError {
    /// The external call did not return in time.
    #[error("reasoner timed out after {0}ms")]
    Timeout(u64),

    /// Output could not be parsed into a portfolio.
    #[error("malformed reasoner output: {0}")]
    Malformed(String),

    /// A returned fraction was NaN, infinite, or negative.
    #[error("non-numeric portfolio fraction: {0}")]
    NonNumeric(f64),

    /// The reasoner backend is unreachable.
    #[error("reasoner unavailable: {0}")]
    Unavailable(String),
}
