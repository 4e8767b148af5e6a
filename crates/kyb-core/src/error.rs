//! Error types for KYB runs.
//!
//! Business outcomes (inactive company, sanctions hit) are never errors. These types cover the
//! cases where no decision could be produced at all.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// The collaborator a fetch failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    BusinessVerifier,
    DirectorRetriever,
    SanctionsScreener,
    RiskScorer,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::BusinessVerifier => "business verifier",
            Provider::DirectorRetriever => "director retriever",
            Provider::SanctionsScreener => "sanctions screener",
            Provider::RiskScorer => "risk scorer",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A provider could not produce its record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchFailure {
    #[error("{provider} unreachable: {reason}")]
    Unreachable { provider: Provider, reason: String },

    #[error("{provider} timed out after {after_ms} ms")]
    Timeout { provider: Provider, after_ms: u64 },

    #[error("{provider} returned malformed data: {reason}")]
    Malformed { provider: Provider, reason: String },

    #[error("{provider} rejected the request: {reason}")]
    Rejected { provider: Provider, reason: String },
}

impl FetchFailure {
    pub fn provider(&self) -> Provider {
        match self {
            FetchFailure::Unreachable { provider, .. }
            | FetchFailure::Timeout { provider, .. }
            | FetchFailure::Malformed { provider, .. }
            | FetchFailure::Rejected { provider, .. } => *provider,
        }
    }

    pub fn malformed(provider: Provider, reason: impl Into<String>) -> Self {
        FetchFailure::Malformed {
            provider,
            reason: reason.into(),
        }
    }

    pub fn unreachable(provider: Provider, reason: impl Into<String>) -> Self {
        FetchFailure::Unreachable {
            provider,
            reason: reason.into(),
        }
    }
}

/// Run-level failure: the orchestrator could not produce a DecisionRecord.
#[derive(Debug, Error)]
pub enum KybError {
    #[error("registration number is required")]
    EmptyRegistrationNumber,

    #[error("provider fetch failed: {0}")]
    Provider(#[from] FetchFailure),

    #[error("no terminal state reached within {steps} scheduler steps")]
    StepBudgetExhausted { steps: usize },

    #[error("run did not finish within {budget_ms} ms")]
    RunTimedOut { budget_ms: u64 },
}

impl KybError {
    /// Stable identifier for the failure class, used in gateway responses and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            KybError::EmptyRegistrationNumber => "invalid_request",
            KybError::Provider(_) => "provider_fetch_failure",
            KybError::StepBudgetExhausted { .. } => "step_budget_exhausted",
            KybError::RunTimedOut { .. } => "run_timed_out",
        }
    }

    /// True for failures that point at the orchestration itself rather than a collaborator.
    pub fn is_orchestration_failure(&self) -> bool {
        matches!(
            self,
            KybError::StepBudgetExhausted { .. } | KybError::RunTimedOut { .. }
        )
    }
}

/// Failure reported by a scheduler while choosing the next step.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    /// The driver answered, but not with a step choice we can read.
    #[error("scheduler output could not be parsed")]
    Unparseable { raw: String },

    /// The driver could not be consulted (transport, auth, upstream status).
    #[error("scheduler unavailable: {0}")]
    Unavailable(String),
}
