//! KYB decision orchestrator.
//! Sequences business verification, director retrieval, sanctions screening and risk scoring into
//! one auditable decision record.

pub mod assembler;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod providers;
pub mod records;
pub mod store;

pub use assembler::PolicyAssembler;
pub use config::{KybConfig, ProviderMode, SchedulerMode};
pub use error::{FetchFailure, KybError, Provider, SchedulerError};
pub use orchestrator::{
    FixedScheduler, KybOrchestrator, LlmScheduler, RunContext, RunLimits, RunState, Scheduler,
    StepChoice,
};
pub use providers::{
    BusinessVerifier, DecisionAssembler, DirectorRetriever, FixtureRegistry, HttpProviders,
    ProviderSet, RiskScorer, SanctionsScreener,
};
pub use records::{
    AssemblyInputs, BusinessRecord, BusinessStatus, DecisionRecord, Director, DirectorListing,
    DirectorSet, KybDecision, RiskAssessment, RiskFactor, RiskRating, SanctionsHit,
    SanctionsResult, Severity, SignificantControl,
};
pub use store::{DecisionStore, StoreError};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
