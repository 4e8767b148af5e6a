//! KYB orchestrator: drives one run from a registration number to a [`DecisionRecord`].
//!
//! The scheduler proposes, the orchestrator disposes. Each state has exactly one legal step; a
//! proposal that does not match it is never executed and costs one unit of the step budget.
//! Business outcomes (inactive company, sanctions hit) finalize through the assembler with
//! substituted records. Provider failures abort the run.

pub mod llm_scheduler;
pub mod scheduler;
pub mod state;
pub mod trace;

pub use llm_scheduler::{parse_step_reply, LlmScheduler};
pub use scheduler::{FixedScheduler, Scheduler};
pub use state::{RunContext, RunState, StepChoice};
pub use trace::{ReasoningLog, TraceEntry, TraceKind};

use crate::error::{FetchFailure, KybError, Provider, SchedulerError};
use crate::providers::{normalize, DecisionAssembler, ProviderSet};
use crate::records::{
    AssemblyInputs, DecisionRecord, DirectorSet, KybDecision, RiskAssessment, SanctionsResult,
};
use crate::store::DecisionStore;
use chrono::Utc;
use state::{Progress, Run};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::Instrument;

/// Bounds applied to every run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunLimits {
    pub provider_timeout: Duration,
    /// Per scheduler consultation. Elapsing counts as an unavailable scheduler.
    pub scheduler_timeout: Duration,
    pub run_timeout: Duration,
    /// Scheduler consultations per run. A clean run needs five.
    pub max_steps: usize,
}

impl Default for RunLimits {
    fn default() -> Self {
        Self {
            provider_timeout: Duration::from_secs(10),
            scheduler_timeout: Duration::from_secs(15),
            run_timeout: Duration::from_secs(60),
            max_steps: 10,
        }
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

pub struct KybOrchestrator {
    providers: ProviderSet,
    assembler: Arc<dyn DecisionAssembler>,
    scheduler: Arc<dyn Scheduler>,
    limits: RunLimits,
    store: Option<Arc<DecisionStore>>,
}

impl KybOrchestrator {
    /// Orchestrator with the fixed scheduler, default limits and no decision store.
    pub fn new(providers: ProviderSet, assembler: Arc<dyn DecisionAssembler>) -> Self {
        Self {
            providers,
            assembler,
            scheduler: Arc::new(FixedScheduler),
            limits: RunLimits::default(),
            store: None,
        }
    }

    pub fn with_scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.scheduler = scheduler;
        self
    }

    pub fn with_limits(mut self, limits: RunLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_store(mut self, store: Arc<DecisionStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn scheduler_name(&self) -> &str {
        self.scheduler.name()
    }

    pub fn limits(&self) -> RunLimits {
        self.limits
    }

    pub fn store(&self) -> Option<&Arc<DecisionStore>> {
        self.store.as_ref()
    }

    /// Run KYB for one registration number.
    ///
    /// `Ok` for every business outcome, including REJECT and the REFER fallback on unreadable
    /// scheduler output. `Err` only when no decision could be produced.
    pub async fn run(&self, registration_number: &str) -> Result<DecisionRecord, KybError> {
        let number = registration_number.trim();
        if number.is_empty() {
            return Err(KybError::EmptyRegistrationNumber);
        }

        let run_id = uuid::Uuid::new_v4();
        let span = tracing::info_span!(
            target: "kyb::orchestrator",
            "kyb_run",
            %run_id,
            registration_number = %number
        );

        async {
            tracing::info!(target: "kyb::orchestrator", scheduler = self.scheduler.name(), "run started");
            let result = match tokio::time::timeout(self.limits.run_timeout, self.drive(number)).await
            {
                Ok(result) => result,
                Err(_) => Err(KybError::RunTimedOut {
                    budget_ms: millis(self.limits.run_timeout),
                }),
            };
            match &result {
                Ok(record) => {
                    tracing::info!(
                        target: "kyb::orchestrator",
                        decision = record.kyb_decision.as_str(),
                        risk_rating = record.risk_rating.map(|r| r.as_str()).unwrap_or("none"),
                        requires_human_review = record.requires_human_review,
                        "run finalized"
                    );
                    self.persist(record).await;
                }
                Err(e) => {
                    tracing::warn!(target: "kyb::orchestrator", kind = e.kind(), error = %e, "run failed");
                }
            }
            result
        }
        .instrument(span)
        .await
    }

    /// sled writes can block on disk, so the insert runs on the blocking pool.
    async fn persist(&self, record: &DecisionRecord) {
        let Some(store) = self.store.clone() else {
            return;
        };
        let record = record.clone();
        match tokio::task::spawn_blocking(move || store.record(&record)).await {
            Ok(Ok(key)) => tracing::debug!(target: "kyb::store", %key, "decision persisted"),
            Ok(Err(e)) => {
                tracing::warn!(target: "kyb::store", error = %e, "decision not persisted")
            }
            Err(e) => {
                tracing::warn!(target: "kyb::store", error = %e, "decision store task failed")
            }
        }
    }

    async fn drive(&self, number: &str) -> Result<DecisionRecord, KybError> {
        let mut run = Run::new(number);
        let reference = FixedScheduler;
        let mut scheduler: &dyn Scheduler = self.scheduler.as_ref();

        for consultation in 1..=self.limits.max_steps {
            let Some(expected) = run.state().expected_step() else {
                break;
            };

            let decided = {
                let ctx = run.context();
                match tokio::time::timeout(
                    self.limits.scheduler_timeout,
                    scheduler.decide_next_step(&ctx),
                )
                .await
                {
                    Ok(decided) => decided,
                    Err(_) => Err(SchedulerError::Unavailable(format!(
                        "no answer within {} ms",
                        millis(self.limits.scheduler_timeout)
                    ))),
                }
            };
            let proposal = match decided {
                Ok(step) => step,
                // Every check is settled, so the decision no longer depends on the scheduler.
                Err(SchedulerError::Unparseable { raw }) if expected == StepChoice::Finalize => {
                    tracing::warn!(
                        target: "kyb::scheduler",
                        scheduler = scheduler.name(),
                        state = ?run.state(),
                        raw = %raw.trim(),
                        "scheduler output unparseable after all checks, finalizing"
                    );
                    expected
                }
                Err(SchedulerError::Unparseable { raw }) => {
                    tracing::warn!(
                        target: "kyb::scheduler",
                        scheduler = scheduler.name(),
                        state = ?run.state(),
                        "scheduler output unparseable, referring run for human review"
                    );
                    return Ok(self.driver_fallback(run, &raw));
                }
                Err(SchedulerError::Unavailable(reason)) => {
                    tracing::warn!(
                        target: "kyb::scheduler",
                        scheduler = scheduler.name(),
                        reason = %reason,
                        "scheduler unavailable, continuing with the fixed scheduler"
                    );
                    scheduler = &reference;
                    // The fixed scheduler always proposes the expected step.
                    expected
                }
            };

            if proposal != expected {
                tracing::warn!(
                    target: "kyb::scheduler",
                    scheduler = scheduler.name(),
                    state = ?run.state(),
                    proposed = %proposal,
                    expected = %expected,
                    consultation,
                    "illegal step proposal rejected"
                );
                run.rejected.push(proposal);
                continue;
            }

            tracing::debug!(target: "kyb::orchestrator", step = %proposal, consultation, "executing step");
            run.executed.push(proposal);
            if let Some(record) = self.execute(&mut run).await? {
                return Ok(record);
            }
        }

        Err(KybError::StepBudgetExhausted {
            steps: self.limits.max_steps,
        })
    }

    /// Call one provider under the per-call timeout and validate what it returned.
    async fn fetch<T, F>(
        &self,
        provider: Provider,
        call: F,
        validate: fn(&T) -> Result<(), FetchFailure>,
    ) -> Result<T, FetchFailure>
    where
        F: Future<Output = Result<T, FetchFailure>>,
    {
        let started = Instant::now();
        let outcome = match tokio::time::timeout(self.limits.provider_timeout, call).await {
            Ok(result) => result.and_then(|record| validate(&record).map(|()| record)),
            Err(_) => Err(FetchFailure::Timeout {
                provider,
                after_ms: millis(self.limits.provider_timeout),
            }),
        };
        let elapsed_ms = millis(started.elapsed());
        match &outcome {
            Ok(_) => tracing::debug!(target: "kyb::providers", provider = %provider, elapsed_ms, "provider call completed"),
            Err(e) => tracing::warn!(target: "kyb::providers", provider = %provider, elapsed_ms, error = %e, "provider call failed"),
        }
        outcome
    }

    /// Execute the single legal step for the current state. Returns the record once finalized.
    async fn execute(&self, run: &mut Run) -> Result<Option<DecisionRecord>, KybError> {
        match run.take_progress() {
            Progress::Start => {
                run.log.reason("Starting KYB. Must verify business first.");
                let business = self
                    .fetch(
                        Provider::BusinessVerifier,
                        self.providers.verifier.verify(&run.registration_number),
                        normalize::validate_business,
                    )
                    .await?;
                if business.legal_name.trim().is_empty() {
                    run.log.observe(format!("Business status = {}", business.status));
                } else {
                    run.log.observe(format!(
                        "Business status = {}, legal name = {}",
                        business.status, business.legal_name
                    ));
                }

                if business.is_active() {
                    run.progress = Progress::BusinessVerified { business };
                } else {
                    run.log
                        .reason("Business is not active. Early REJECT, no further checks needed.");
                    let risk = RiskAssessment::business_inactive();
                    run.log.observe(format!(
                        "Directors skipped, sanctions not screened, risk = {} / {} (Business is not active)",
                        risk.rating, risk.score
                    ));
                    run.progress = Progress::ReadyToFinalize {
                        inputs: AssemblyInputs {
                            business,
                            directors: DirectorSet::skipped("business is not active"),
                            sanctions: SanctionsResult::not_screened(),
                            risk,
                        },
                        state: RunState::RejectedInactive,
                    };
                }
                Ok(None)
            }

            Progress::BusinessVerified { business } => {
                run.log.reason("Business is active. Retrieving directors.");
                let directors = self
                    .fetch(
                        Provider::DirectorRetriever,
                        self.providers
                            .directors
                            .get_directors(&business.registration_number),
                        normalize::validate_directors,
                    )
                    .await?;
                run.log.observe(format!(
                    "Found {} director(s), {} person(s) with significant control.",
                    directors.directors.len(),
                    directors.persons_with_significant_control.len()
                ));
                run.progress = Progress::DirectorsFetched { business, directors };
                Ok(None)
            }

            Progress::DirectorsFetched { business, directors } => {
                run.log
                    .reason("Screening business and directors against sanctions lists.");
                let names = directors.names();
                let sanctions = self
                    .fetch(
                        Provider::SanctionsScreener,
                        self.providers.screener.screen(&business.legal_name, &names),
                        normalize::validate_sanctions,
                    )
                    .await?;
                run.log.observe(format!(
                    "Sanctions hits = {} ({} list(s) checked)",
                    sanctions.hit_count,
                    sanctions.lists_checked.len()
                ));

                if sanctions.clear {
                    run.progress = Progress::SanctionsScreened {
                        business,
                        directors,
                        sanctions,
                    };
                } else {
                    run.log
                        .reason("Sanctions hit found. Early REJECT, no further checks needed.");
                    let matched: Vec<&str> =
                        sanctions.hits.iter().map(|h| h.matched_name.as_str()).collect();
                    let risk = RiskAssessment::sanctions_hit();
                    run.log.observe(format!(
                        "Matched {}. Risk scoring skipped, risk = {} / {} (Sanctions hit detected)",
                        matched.join(", "),
                        risk.rating,
                        risk.score
                    ));
                    run.progress = Progress::ReadyToFinalize {
                        inputs: AssemblyInputs {
                            business,
                            directors: DirectorSet::Retrieved(directors),
                            sanctions,
                            risk,
                        },
                        state: RunState::RejectedSanctions,
                    };
                }
                Ok(None)
            }

            Progress::SanctionsScreened {
                business,
                directors,
                sanctions,
            } => {
                run.log.reason("Sanctions clear. Calculating risk score.");
                let directors = DirectorSet::Retrieved(directors);
                let risk = self
                    .fetch(
                        Provider::RiskScorer,
                        self.providers.scorer.score(&business, &directors, &sanctions),
                        normalize::validate_risk,
                    )
                    .await?;
                run.log.observe(format!(
                    "Risk rating = {}, score = {}",
                    risk.rating, risk.score
                ));
                run.progress = Progress::ReadyToFinalize {
                    inputs: AssemblyInputs {
                        business,
                        directors,
                        sanctions,
                        risk,
                    },
                    state: RunState::RiskScored,
                };
                Ok(None)
            }

            Progress::ReadyToFinalize { inputs, state } => {
                if state.is_rejection() {
                    run.log.reason("Early exit reached. Making final decision.");
                } else {
                    run.log.reason("All checks complete. Making final decision.");
                }
                let mut record = self.assembler.decide(&inputs);
                run.log.observe(format!(
                    "Decision = {}, risk rating = {}",
                    record.kyb_decision, inputs.risk.rating
                ));
                record.reasoning_log = run.log.render();
                Ok(Some(record))
            }

            Progress::Finalized => Ok(None),
        }
    }

    /// REFER record for a run whose scheduler answered with something unreadable.
    fn driver_fallback(&self, mut run: Run, raw: &str) -> DecisionRecord {
        run.log.reason(
            "Scheduler output could not be parsed. Falling back to REFER for human review.",
        );
        run.log.observe(format!("Raw scheduler output: {}", raw.trim()));

        let (business, directors, sanctions, risk) = run.take_progress().into_partial();
        let registration_number = business
            .as_ref()
            .map(|b| b.registration_number.clone())
            .unwrap_or_else(|| run.registration_number.clone());
        DecisionRecord {
            registration_number,
            kyb_decision: KybDecision::Refer,
            risk_rating: risk.as_ref().map(|r| r.rating),
            business,
            directors,
            sanctions,
            risk,
            next_actions: vec![
                "Manual review required: the automated run ended before a decision was assembled"
                    .to_string(),
                "Complete the outstanding KYB checks by hand".to_string(),
            ],
            requires_human_review: true,
            timestamp: Utc::now(),
            reasoning_log: run.log.render(),
        }
    }
}
