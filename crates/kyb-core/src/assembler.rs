//! Default decision policy.
//!
//! | Condition            | Decision | Human review |
//! |----------------------|----------|--------------|
//! | business not active  | REJECT   | yes          |
//! | sanctions hit        | REJECT   | yes          |
//! | risk HIGH            | REFER    | yes          |
//! | risk MEDIUM          | APPROVE  | no           |
//! | risk LOW             | APPROVE  | no           |

use crate::providers::DecisionAssembler;
use crate::records::{AssemblyInputs, DecisionRecord, KybDecision, RiskRating};

#[derive(Debug, Clone, Copy, Default)]
pub struct PolicyAssembler;

impl PolicyAssembler {
    pub fn new() -> Self {
        Self
    }

    fn disposition(inputs: &AssemblyInputs) -> (KybDecision, bool, Vec<String>) {
        if !inputs.business.is_active() {
            return (
                KybDecision::Reject,
                true,
                vec![
                    format!(
                        "Confirm registry status '{}' for {} and notify the applicant",
                        inputs.business.status, inputs.business.registration_number
                    ),
                    "Record the rejection rationale in the onboarding audit trail".to_string(),
                ],
            );
        }

        if !inputs.sanctions.clear {
            let mut actions: Vec<String> = inputs
                .sanctions
                .hits
                .iter()
                .map(|h| {
                    format!(
                        "Review sanctions match '{}' on {} (confidence {:.2})",
                        h.matched_name, h.list_name, h.confidence
                    )
                })
                .collect();
            actions.push("Escalate to the MLRO for a suspicious activity assessment".to_string());
            actions.push("Do not onboard while the match is unresolved".to_string());
            return (KybDecision::Reject, true, actions);
        }

        let mut actions = Vec::new();
        let decision = match inputs.risk.rating {
            RiskRating::High => {
                actions.push("Perform enhanced due diligence".to_string());
                actions.extend(
                    inputs
                        .risk
                        .factors
                        .iter()
                        .map(|f| format!("Review risk factor: {}", f.description)),
                );
                KybDecision::Refer
            }
            RiskRating::Medium => {
                actions.push("Schedule a periodic KYB review in 12 months".to_string());
                KybDecision::Approve
            }
            RiskRating::Low => KybDecision::Approve,
        };

        if let Some(listing) = inputs.directors.listing() {
            if listing.persons_with_significant_control.is_empty() {
                actions.push("Confirm beneficial ownership with the applicant".to_string());
            }
            if listing.directors.is_empty() {
                actions.push("Confirm who is authorised to act for the business".to_string());
            }
        }

        (decision, decision == KybDecision::Refer, actions)
    }
}

impl DecisionAssembler for PolicyAssembler {
    fn decide(&self, inputs: &AssemblyInputs) -> DecisionRecord {
        let (decision, review, actions) = Self::disposition(inputs);
        DecisionRecord::from_inputs(inputs, decision, actions, review)
    }
}
