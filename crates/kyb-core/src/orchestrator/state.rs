//! Run state machine.
//!
//! `Progress` carries the records gathered so far, so each state holds exactly the records its
//! successors need. Transitions move records forward by value; there is no "maybe populated" slot.

use crate::orchestrator::trace::ReasoningLog;
use crate::records::{
    AssemblyInputs, BusinessRecord, BusinessStatus, DirectorListing, DirectorSet, RiskAssessment,
    RiskRating, SanctionsResult,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A step a scheduler may ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepChoice {
    VerifyBusiness,
    FetchDirectors,
    ScreenSanctions,
    ScoreRisk,
    Finalize,
}

impl StepChoice {
    pub const ALL: [StepChoice; 5] = [
        StepChoice::VerifyBusiness,
        StepChoice::FetchDirectors,
        StepChoice::ScreenSanctions,
        StepChoice::ScoreRisk,
        StepChoice::Finalize,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StepChoice::VerifyBusiness => "verify_business",
            StepChoice::FetchDirectors => "fetch_directors",
            StepChoice::ScreenSanctions => "screen_sanctions",
            StepChoice::ScoreRisk => "score_risk",
            StepChoice::Finalize => "finalize",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let key = name.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|s| s.as_str() == key)
    }
}

impl fmt::Display for StepChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunState {
    Start,
    BusinessVerified,
    DirectorsFetched,
    SanctionsScreened,
    RejectedInactive,
    RejectedSanctions,
    RiskScored,
    Finalized,
}

impl RunState {
    /// The only step that may run from this state. `None` once finalized.
    pub fn expected_step(self) -> Option<StepChoice> {
        match self {
            RunState::Start => Some(StepChoice::VerifyBusiness),
            RunState::BusinessVerified => Some(StepChoice::FetchDirectors),
            RunState::DirectorsFetched => Some(StepChoice::ScreenSanctions),
            RunState::SanctionsScreened => Some(StepChoice::ScoreRisk),
            RunState::RejectedInactive | RunState::RejectedSanctions | RunState::RiskScored => {
                Some(StepChoice::Finalize)
            }
            RunState::Finalized => None,
        }
    }

    pub fn is_rejection(self) -> bool {
        matches!(self, RunState::RejectedInactive | RunState::RejectedSanctions)
    }
}

pub(crate) enum Progress {
    Start,
    BusinessVerified {
        business: BusinessRecord,
    },
    DirectorsFetched {
        business: BusinessRecord,
        directors: DirectorListing,
    },
    SanctionsScreened {
        business: BusinessRecord,
        directors: DirectorListing,
        sanctions: SanctionsResult,
    },
    /// All four records are in hand; `state` is the path that got here.
    ReadyToFinalize {
        inputs: AssemblyInputs,
        state: RunState,
    },
    Finalized,
}

impl Progress {
    pub(crate) fn state(&self) -> RunState {
        match self {
            Progress::Start => RunState::Start,
            Progress::BusinessVerified { .. } => RunState::BusinessVerified,
            Progress::DirectorsFetched { .. } => RunState::DirectorsFetched,
            Progress::SanctionsScreened { .. } => RunState::SanctionsScreened,
            Progress::ReadyToFinalize { state, .. } => *state,
            Progress::Finalized => RunState::Finalized,
        }
    }

    pub(crate) fn business(&self) -> Option<&BusinessRecord> {
        match self {
            Progress::Start | Progress::Finalized => None,
            Progress::BusinessVerified { business }
            | Progress::DirectorsFetched { business, .. }
            | Progress::SanctionsScreened { business, .. } => Some(business),
            Progress::ReadyToFinalize { inputs, .. } => Some(&inputs.business),
        }
    }

    fn director_count(&self) -> Option<usize> {
        match self {
            Progress::DirectorsFetched { directors, .. }
            | Progress::SanctionsScreened { directors, .. } => Some(directors.directors.len()),
            Progress::ReadyToFinalize { inputs, .. } => inputs.directors.listing().map(|l| l.directors.len()),
            _ => None,
        }
    }

    fn sanctions(&self) -> Option<&SanctionsResult> {
        match self {
            Progress::SanctionsScreened { sanctions, .. } => Some(sanctions),
            Progress::ReadyToFinalize { inputs, .. } if !inputs.sanctions.synthetic => {
                Some(&inputs.sanctions)
            }
            _ => None,
        }
    }

    fn risk(&self) -> Option<&RiskAssessment> {
        match self {
            Progress::ReadyToFinalize { inputs, .. } => Some(&inputs.risk),
            _ => None,
        }
    }

    /// Whatever records exist, for the driver-fallback record.
    pub(crate) fn into_partial(
        self,
    ) -> (
        Option<BusinessRecord>,
        Option<DirectorSet>,
        Option<SanctionsResult>,
        Option<RiskAssessment>,
    ) {
        match self {
            Progress::Start | Progress::Finalized => (None, None, None, None),
            Progress::BusinessVerified { business } => (Some(business), None, None, None),
            Progress::DirectorsFetched { business, directors } => {
                (Some(business), Some(DirectorSet::Retrieved(directors)), None, None)
            }
            Progress::SanctionsScreened {
                business,
                directors,
                sanctions,
            } => (
                Some(business),
                Some(DirectorSet::Retrieved(directors)),
                Some(sanctions),
                None,
            ),
            Progress::ReadyToFinalize { inputs, .. } => (
                Some(inputs.business),
                Some(inputs.directors),
                Some(inputs.sanctions),
                Some(inputs.risk),
            ),
        }
    }
}

/// Read-only view of a run handed to schedulers. Serializes to the JSON an LLM driver sees.
#[derive(Debug, Clone, Serialize)]
pub struct RunContext<'a> {
    pub registration_number: &'a str,
    pub state: RunState,
    pub business_status: Option<BusinessStatus>,
    pub legal_name: Option<&'a str>,
    pub director_count: Option<usize>,
    pub sanctions_hit_count: Option<u32>,
    pub risk_rating: Option<RiskRating>,
    pub steps_executed: &'a [StepChoice],
    pub rejected_proposals: &'a [StepChoice],
}

/// Mutable state of one orchestration run. Never shared between runs.
pub(crate) struct Run {
    pub(crate) registration_number: String,
    pub(crate) progress: Progress,
    pub(crate) log: ReasoningLog,
    pub(crate) executed: Vec<StepChoice>,
    pub(crate) rejected: Vec<StepChoice>,
}

impl Run {
    pub(crate) fn new(registration_number: &str) -> Self {
        Self {
            registration_number: registration_number.to_string(),
            progress: Progress::Start,
            log: ReasoningLog::new(),
            executed: Vec::new(),
            rejected: Vec::new(),
        }
    }

    pub(crate) fn state(&self) -> RunState {
        self.progress.state()
    }

    pub(crate) fn take_progress(&mut self) -> Progress {
        std::mem::replace(&mut self.progress, Progress::Finalized)
    }

    pub(crate) fn context(&self) -> RunContext<'_> {
        let business = self.progress.business();
        RunContext {
            registration_number: &self.registration_number,
            state: self.state(),
            business_status: business.map(|b| b.status),
            legal_name: business.map(|b| b.legal_name.as_str()).filter(|n| !n.is_empty()),
            director_count: self.progress.director_count(),
            sanctions_hit_count: self.progress.sanctions().map(|s| s.hit_count),
            risk_rating: self.progress.risk().map(|r| r.rating),
            steps_executed: &self.executed,
            rejected_proposals: &self.rejected,
        }
    }
}
