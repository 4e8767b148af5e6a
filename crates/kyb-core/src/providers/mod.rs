//! Check providers and the decision assembler, as seen by the orchestrator.
//!
//! Each provider is an independent collaborator: deterministic for identical input, no shared state,
//! and either a well-formed record or a [`FetchFailure`]. Two implementations ship with the crate:
//! [`FixtureRegistry`] (in-process sample data) and [`HttpProviders`] (JSON over HTTP).

mod fixture;
mod http;
pub mod normalize;

pub use fixture::FixtureRegistry;
pub use http::HttpProviders;

use crate::error::FetchFailure;
use crate::records::{
    AssemblyInputs, BusinessRecord, DecisionRecord, DirectorListing, DirectorSet, RiskAssessment,
    SanctionsResult,
};
use std::sync::Arc;

#[async_trait::async_trait]
pub trait BusinessVerifier: Send + Sync {
    async fn verify(&self, registration_number: &str) -> Result<BusinessRecord, FetchFailure>;
}

#[async_trait::async_trait]
pub trait DirectorRetriever: Send + Sync {
    async fn get_directors(&self, registration_number: &str)
        -> Result<DirectorListing, FetchFailure>;
}

#[async_trait::async_trait]
pub trait SanctionsScreener: Send + Sync {
    /// Screen the business name and the director names (in the order given).
    async fn screen(
        &self,
        business_name: &str,
        director_names: &[String],
    ) -> Result<SanctionsResult, FetchFailure>;
}

#[async_trait::async_trait]
pub trait RiskScorer: Send + Sync {
    async fn score(
        &self,
        business: &BusinessRecord,
        directors: &DirectorSet,
        sanctions: &SanctionsResult,
    ) -> Result<RiskAssessment, FetchFailure>;
}

/// Turns the four records into a decision. Infallible: it is only ever called with a complete input set.
pub trait DecisionAssembler: Send + Sync {
    fn decide(&self, inputs: &AssemblyInputs) -> DecisionRecord;
}

/// The four providers a run needs, injected as trait objects.
#[derive(Clone)]
pub struct ProviderSet {
    pub verifier: Arc<dyn BusinessVerifier>,
    pub directors: Arc<dyn DirectorRetriever>,
    pub screener: Arc<dyn SanctionsScreener>,
    pub scorer: Arc<dyn RiskScorer>,
}

impl ProviderSet {
    /// Use one value for all four roles (both shipped implementations cover every role).
    pub fn from_single<P>(provider: Arc<P>) -> Self
    where
        P: BusinessVerifier + DirectorRetriever + SanctionsScreener + RiskScorer + 'static,
    {
        Self {
            verifier: provider.clone(),
            directors: provider.clone(),
            screener: provider.clone(),
            scorer: provider,
        }
    }
}
