//! Scripted collaborators for orchestrator tests: providers that record every call and schedulers
//! that replay a fixed list of answers.

#![allow(dead_code)]

use kyb_core::{
    BusinessRecord, BusinessStatus, BusinessVerifier, Director, DirectorListing, DirectorRetriever,
    DirectorSet, FetchFailure, KybOrchestrator, PolicyAssembler, ProviderSet, RiskAssessment,
    RiskFactor, RiskRating, RiskScorer, RunContext, SanctionsHit, SanctionsResult,
    SanctionsScreener, Scheduler, SchedulerError, Severity, SignificantControl, StepChoice,
};
use std::collections::{BTreeSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Verify(String),
    Directors(String),
    Screen { business: String, directors: Vec<String> },
    Score,
}

pub struct ScriptedProviders {
    pub business: BusinessRecord,
    pub directors: Result<DirectorListing, FetchFailure>,
    pub sanctions: SanctionsResult,
    pub risk: RiskAssessment,
    pub verify_delay: Option<Duration>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedProviders {
    /// Active, two directors, one PSC, no hits, LOW risk.
    pub fn clean() -> Self {
        Self {
            business: business("00445790", "HARBOUR LANE SUPPLIES LIMITED", BusinessStatus::Active),
            directors: Ok(directors(&["Ada Quill", "Tomas Brennan"], &["Ada Quill"])),
            sanctions: SanctionsResult::from_hits(Vec::new(), vec!["OFAC SDN".to_string()]),
            risk: risk(RiskRating::Low, 12),
            verify_delay: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn log(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

pub fn business(number: &str, name: &str, status: BusinessStatus) -> BusinessRecord {
    BusinessRecord {
        registration_number: number.to_string(),
        legal_name: name.to_string(),
        status,
        incorporation_date: None,
        sic_codes: BTreeSet::new(),
        registered_address: Some("1 Harbour Lane".to_string()),
    }
}

pub fn directors(names: &[&str], pscs: &[&str]) -> DirectorListing {
    DirectorListing {
        directors: names
            .iter()
            .map(|n| Director {
                full_name: n.to_string(),
                role: "director".to_string(),
            })
            .collect(),
        persons_with_significant_control: pscs
            .iter()
            .map(|n| SignificantControl {
                name: n.to_string(),
                natures_of_control: Vec::new(),
            })
            .collect(),
    }
}

pub fn risk(rating: RiskRating, score: u8) -> RiskAssessment {
    RiskAssessment {
        rating,
        score,
        factors: vec![RiskFactor {
            description: "Scripted factor".to_string(),
            severity: Severity::Low,
            weight: u32::from(score),
        }],
        synthetic: false,
    }
}

pub fn hit(name: &str) -> SanctionsResult {
    SanctionsResult::from_hits(
        vec![SanctionsHit {
            matched_name: name.to_string(),
            list_name: "HM Treasury OFSI".to_string(),
            confidence: 1.0,
        }],
        vec!["HM Treasury OFSI".to_string()],
    )
}

#[async_trait::async_trait]
impl BusinessVerifier for ScriptedProviders {
    async fn verify(&self, registration_number: &str) -> Result<BusinessRecord, FetchFailure> {
        self.log(Call::Verify(registration_number.to_string()));
        if let Some(delay) = self.verify_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.business.clone())
    }
}

#[async_trait::async_trait]
impl DirectorRetriever for ScriptedProviders {
    async fn get_directors(
        &self,
        registration_number: &str,
    ) -> Result<DirectorListing, FetchFailure> {
        self.log(Call::Directors(registration_number.to_string()));
        self.directors.clone()
    }
}

#[async_trait::async_trait]
impl SanctionsScreener for ScriptedProviders {
    async fn screen(
        &self,
        business_name: &str,
        director_names: &[String],
    ) -> Result<SanctionsResult, FetchFailure> {
        self.log(Call::Screen {
            business: business_name.to_string(),
            directors: director_names.to_vec(),
        });
        Ok(self.sanctions.clone())
    }
}

#[async_trait::async_trait]
impl RiskScorer for ScriptedProviders {
    async fn score(
        &self,
        _business: &BusinessRecord,
        _directors: &DirectorSet,
        _sanctions: &SanctionsResult,
    ) -> Result<RiskAssessment, FetchFailure> {
        self.log(Call::Score);
        Ok(self.risk.clone())
    }
}

/// Replays queued answers, then proposes the legal step for whatever state it is shown.
pub struct ScriptedScheduler {
    replies: Mutex<VecDeque<Result<StepChoice, SchedulerError>>>,
    consultations: Mutex<usize>,
}

impl ScriptedScheduler {
    pub fn new(replies: Vec<Result<StepChoice, SchedulerError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            consultations: Mutex::new(0),
        }
    }

    pub fn consultations(&self) -> usize {
        *self.consultations.lock().unwrap()
    }
}

#[async_trait::async_trait]
impl Scheduler for ScriptedScheduler {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn decide_next_step(&self, ctx: &RunContext<'_>) -> Result<StepChoice, SchedulerError> {
        *self.consultations.lock().unwrap() += 1;
        let queued = self.replies.lock().unwrap().pop_front();
        match queued {
            Some(reply) => reply,
            None => ctx
                .state
                .expected_step()
                .ok_or_else(|| SchedulerError::Unavailable("finalized".to_string())),
        }
    }
}

/// Always proposes the same step.
pub struct StuckScheduler(pub StepChoice);

#[async_trait::async_trait]
impl Scheduler for StuckScheduler {
    fn name(&self) -> &str {
        "stuck"
    }

    async fn decide_next_step(&self, _ctx: &RunContext<'_>) -> Result<StepChoice, SchedulerError> {
        Ok(self.0)
    }
}

/// Takes `delay` to answer, then proposes the legal step.
pub struct SlowScheduler {
    pub delay: Duration,
}

#[async_trait::async_trait]
impl Scheduler for SlowScheduler {
    fn name(&self) -> &str {
        "slow"
    }

    async fn decide_next_step(&self, ctx: &RunContext<'_>) -> Result<StepChoice, SchedulerError> {
        tokio::time::sleep(self.delay).await;
        ctx.state
            .expected_step()
            .ok_or_else(|| SchedulerError::Unavailable("finalized".to_string()))
    }
}

pub fn orchestrator(providers: &Arc<ScriptedProviders>) -> KybOrchestrator {
    KybOrchestrator::new(
        ProviderSet::from_single(providers.clone()),
        Arc::new(PolicyAssembler),
    )
}
