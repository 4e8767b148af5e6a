//! KYB records exchanged between providers, the orchestrator, and the decision assembler.
//!
//! Every record is an immutable snapshot: produced once by exactly one component and passed
//! by value to the next. Ordered collections (`BTreeSet`, `Vec`) keep serialization stable so two
//! runs over identical provider responses serialize identically apart from the timestamp.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Registry status of a company.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BusinessStatus {
    #[serde(alias = "active")]
    Active,
    #[serde(alias = "dissolved")]
    Dissolved,
    #[serde(alias = "not_found")]
    NotFound,
    #[serde(alias = "other")]
    Other,
}

impl BusinessStatus {
    /// Maps a registry status string (Companies House vocabulary or plain words) onto the four states.
    /// Only "active" counts as active; liquidation, administration and the like are `Other`.
    pub fn from_registry(s: &str) -> Self {
        let key: String = s
            .trim()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match key.as_str() {
            "active" => BusinessStatus::Active,
            "dissolved" | "closed" | "convertedclosed" | "removed" => BusinessStatus::Dissolved,
            "notfound" | "unknown" | "" => BusinessStatus::NotFound,
            _ => BusinessStatus::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BusinessStatus::Active => "ACTIVE",
            BusinessStatus::Dissolved => "DISSOLVED",
            BusinessStatus::NotFound => "NOT_FOUND",
            BusinessStatus::Other => "OTHER",
        }
    }
}

impl fmt::Display for BusinessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Business Verifier output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusinessRecord {
    /// Canonical registry identifier as returned by the registry.
    pub registration_number: String,
    pub legal_name: String,
    pub status: BusinessStatus,
    #[serde(default)]
    pub incorporation_date: Option<NaiveDate>,
    #[serde(default)]
    pub sic_codes: BTreeSet<String>,
    #[serde(default)]
    pub registered_address: Option<String>,
}

impl BusinessRecord {
    /// Record for a registration number the registry does not know.
    pub fn not_found(registration_number: &str) -> Self {
        Self {
            registration_number: registration_number.to_string(),
            legal_name: String::new(),
            status: BusinessStatus::NotFound,
            incorporation_date: None,
            sic_codes: BTreeSet::new(),
            registered_address: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == BusinessStatus::Active
    }
}

/// An officer of the company.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Director {
    pub full_name: String,
    pub role: String,
}

/// Person (or corporate entity) with significant control.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignificantControl {
    pub name: String,
    #[serde(default)]
    pub natures_of_control: Vec<String>,
}

/// What the Director Retriever returns: active officers plus PSC entries. Either list may be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectorListing {
    #[serde(default)]
    pub directors: Vec<Director>,
    #[serde(default)]
    pub persons_with_significant_control: Vec<SignificantControl>,
}

impl DirectorListing {
    /// Director full names in retrieval order.
    pub fn names(&self) -> Vec<String> {
        self.directors.iter().map(|d| d.full_name.clone()).collect()
    }
}

/// Controlling persons as seen by the decision: retrieved (possibly empty) or skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DirectorSet {
    Retrieved(DirectorListing),
    /// Not retrieved because an earlier step made it unnecessary.
    Skipped { reason: String },
}

impl DirectorSet {
    pub fn skipped(reason: impl Into<String>) -> Self {
        DirectorSet::Skipped {
            reason: reason.into(),
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, DirectorSet::Skipped { .. })
    }

    pub fn listing(&self) -> Option<&DirectorListing> {
        match self {
            DirectorSet::Retrieved(listing) => Some(listing),
            DirectorSet::Skipped { .. } => None,
        }
    }

    pub fn director_names(&self) -> Vec<String> {
        self.listing().map(DirectorListing::names).unwrap_or_default()
    }

    pub fn director_count(&self) -> usize {
        self.listing().map(|l| l.directors.len()).unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SanctionsHit {
    pub matched_name: String,
    pub list_name: String,
    /// Match confidence in `0.0..=1.0`.
    pub confidence: f64,
}

/// Sanctions Screener output. `clear == (hit_count == 0)` always.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SanctionsResult {
    pub hit_count: u32,
    pub clear: bool,
    #[serde(default)]
    pub hits: Vec<SanctionsHit>,
    #[serde(default)]
    pub lists_checked: Vec<String>,
    /// Set only on results the orchestrator substitutes when screening was short-circuited.
    #[serde(default)]
    pub synthetic: bool,
}

impl SanctionsResult {
    pub fn from_hits(hits: Vec<SanctionsHit>, lists_checked: Vec<String>) -> Self {
        let hit_count = hits.len() as u32;
        Self {
            hit_count,
            clear: hit_count == 0,
            hits,
            lists_checked,
            synthetic: false,
        }
    }

    /// Placeholder for runs that never reached screening (inactive business).
    pub fn not_screened() -> Self {
        Self {
            hit_count: 0,
            clear: true,
            hits: Vec::new(),
            lists_checked: Vec::new(),
            synthetic: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskRating {
    Low,
    Medium,
    High,
}

impl RiskRating {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskRating::Low => "LOW",
            RiskRating::Medium => "MEDIUM",
            RiskRating::High => "HIGH",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LOW" => Some(RiskRating::Low),
            "MEDIUM" | "MED" => Some(RiskRating::Medium),
            "HIGH" => Some(RiskRating::High),
            _ => None,
        }
    }
}

impl fmt::Display for RiskRating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LOW" => Some(Severity::Low),
            "MEDIUM" | "MED" => Some(Severity::Medium),
            "HIGH" => Some(Severity::High),
            "CRITICAL" => Some(Severity::Critical),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskFactor {
    pub description: String,
    pub severity: Severity,
    pub weight: u32,
}

/// Risk Scorer output, or the orchestrator's HIGH/100 substitute on a short-circuit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub rating: RiskRating,
    /// 0..=100
    pub score: u8,
    #[serde(default)]
    pub factors: Vec<RiskFactor>,
    #[serde(default)]
    pub synthetic: bool,
}

impl RiskAssessment {
    fn short_circuit(description: &str, severity: Severity) -> Self {
        Self {
            rating: RiskRating::High,
            score: 100,
            factors: vec![RiskFactor {
                description: description.to_string(),
                severity,
                weight: 100,
            }],
            synthetic: true,
        }
    }

    /// Substituted when the business is not active.
    pub fn business_inactive() -> Self {
        Self::short_circuit("Business is not active", Severity::High)
    }

    /// Substituted when screening found at least one hit.
    pub fn sanctions_hit() -> Self {
        Self::short_circuit("Sanctions hit detected", Severity::Critical)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum KybDecision {
    Approve,
    Refer,
    Reject,
}

impl KybDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            KybDecision::Approve => "APPROVE",
            KybDecision::Refer => "REFER",
            KybDecision::Reject => "REJECT",
        }
    }
}

impl fmt::Display for KybDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The four records handed to the Decision Assembler. All present by construction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssemblyInputs {
    pub business: BusinessRecord,
    pub directors: DirectorSet,
    pub sanctions: SanctionsResult,
    pub risk: RiskAssessment,
}

impl AssemblyInputs {
    /// True when none of the four inputs was substituted by the orchestrator.
    pub fn all_provider_sourced(&self) -> bool {
        !self.directors.is_skipped() && !self.sanctions.synthetic && !self.risk.synthetic
    }
}

/// Terminal artifact of a run.
///
/// Upstream records are always present on the normal and short-circuit paths. They are `None`
/// only on the driver-fallback path, for steps the run never reached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub registration_number: String,
    pub kyb_decision: KybDecision,
    pub risk_rating: Option<RiskRating>,
    pub business: Option<BusinessRecord>,
    pub directors: Option<DirectorSet>,
    pub sanctions: Option<SanctionsResult>,
    pub risk: Option<RiskAssessment>,
    pub next_actions: Vec<String>,
    pub requires_human_review: bool,
    pub timestamp: DateTime<Utc>,
    pub reasoning_log: Vec<String>,
}

impl DecisionRecord {
    /// Build a record from fully populated inputs. The reasoning log is attached by the orchestrator.
    pub fn from_inputs(
        inputs: &AssemblyInputs,
        kyb_decision: KybDecision,
        next_actions: Vec<String>,
        requires_human_review: bool,
    ) -> Self {
        Self {
            registration_number: inputs.business.registration_number.clone(),
            kyb_decision,
            risk_rating: Some(inputs.risk.rating),
            business: Some(inputs.business.clone()),
            directors: Some(inputs.directors.clone()),
            sanctions: Some(inputs.sanctions.clone()),
            risk: Some(inputs.risk.clone()),
            next_actions,
            requires_human_review,
            timestamp: Utc::now(),
            reasoning_log: Vec::new(),
        }
    }

    pub fn business_name(&self) -> Option<&str> {
        self.business
            .as_ref()
            .map(|b| b.legal_name.as_str())
            .filter(|n| !n.is_empty())
    }
}
