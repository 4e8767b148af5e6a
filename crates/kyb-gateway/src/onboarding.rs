//! Onboarding-channel view of a decision.

use chrono::{DateTime, Utc};
use kyb_core::{DecisionRecord, KybDecision, RiskRating};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OnboardingStatus {
    Proceed,
    OnHold,
    Declined,
}

impl OnboardingStatus {
    pub fn message(&self) -> &'static str {
        match self {
            OnboardingStatus::Proceed => {
                "KYB checks passed. You may proceed with the onboarding journey."
            }
            OnboardingStatus::OnHold => {
                "Your application is under review. A member of our team will be in touch."
            }
            OnboardingStatus::Declined => "We are unable to proceed with your application at this time.",
        }
    }
}

impl From<KybDecision> for OnboardingStatus {
    fn from(decision: KybDecision) -> Self {
        match decision {
            KybDecision::Approve => OnboardingStatus::Proceed,
            KybDecision::Refer => OnboardingStatus::OnHold,
            KybDecision::Reject => OnboardingStatus::Declined,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OnboardingResponse {
    pub onboarding_status: OnboardingStatus,
    pub message: &'static str,
    pub kyb_decision: KybDecision,
    pub risk_rating: Option<RiskRating>,
    pub business_name: Option<String>,
    pub registration_number: String,
    pub requires_human_review: bool,
    pub next_actions: Vec<String>,
    pub reasoning_log: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

impl From<&DecisionRecord> for OnboardingResponse {
    fn from(record: &DecisionRecord) -> Self {
        let status = OnboardingStatus::from(record.kyb_decision);
        Self {
            onboarding_status: status,
            message: status.message(),
            kyb_decision: record.kyb_decision,
            risk_rating: record.risk_rating,
            business_name: record.business_name().map(str::to_string),
            registration_number: record.registration_number.clone(),
            requires_human_review: record.requires_human_review,
            next_actions: record.next_actions.clone(),
            reasoning_log: record.reasoning_log.clone(),
            timestamp: record.timestamp,
        }
    }
}
