//! Provider-result normalization: JSON payloads into typed records, and shape checks on records.
//!
//! Every provider result passes through a `validate_*` function before the orchestrator acts on it.
//! A shape violation is a [`FetchFailure::Malformed`], never silently repaired into default data.

use crate::error::{FetchFailure, Provider};
use crate::records::{
    BusinessRecord, BusinessStatus, Director, DirectorListing, RiskAssessment, RiskFactor,
    RiskRating, SanctionsHit, SanctionsResult, Severity, SignificantControl,
};
use chrono::NaiveDate;
use serde_json::{Map, Value};
use std::collections::BTreeSet;

// ---------------------------------------------------------------------------
// Record validation
// ---------------------------------------------------------------------------

pub fn validate_business(record: &BusinessRecord) -> Result<(), FetchFailure> {
    let p = Provider::BusinessVerifier;
    if record.registration_number.trim().is_empty() {
        return Err(FetchFailure::malformed(p, "registration number is empty"));
    }
    if record.is_active() && record.legal_name.trim().is_empty() {
        return Err(FetchFailure::malformed(p, "active business has no legal name"));
    }
    Ok(())
}

pub fn validate_directors(listing: &DirectorListing) -> Result<(), FetchFailure> {
    let p = Provider::DirectorRetriever;
    if let Some(i) = listing
        .directors
        .iter()
        .position(|d| d.full_name.trim().is_empty())
    {
        return Err(FetchFailure::malformed(p, format!("director #{} has no name", i + 1)));
    }
    if let Some(i) = listing
        .persons_with_significant_control
        .iter()
        .position(|c| c.name.trim().is_empty())
    {
        return Err(FetchFailure::malformed(p, format!("PSC entry #{} has no name", i + 1)));
    }
    Ok(())
}

pub fn validate_sanctions(result: &SanctionsResult) -> Result<(), FetchFailure> {
    let p = Provider::SanctionsScreener;
    if result.synthetic {
        return Err(FetchFailure::malformed(p, "provider result marked synthetic"));
    }
    if result.clear != (result.hit_count == 0) {
        return Err(FetchFailure::malformed(
            p,
            format!("clear={} contradicts hit_count={}", result.clear, result.hit_count),
        ));
    }
    if result.hits.len() != result.hit_count as usize {
        return Err(FetchFailure::malformed(
            p,
            format!("hit_count={} but {} hits listed", result.hit_count, result.hits.len()),
        ));
    }
    for hit in &result.hits {
        if !(0.0..=1.0).contains(&hit.confidence) {
            return Err(FetchFailure::malformed(
                p,
                format!("confidence {} for '{}' outside 0..=1", hit.confidence, hit.matched_name),
            ));
        }
        if hit.list_name.trim().is_empty() {
            return Err(FetchFailure::malformed(p, "hit without list name"));
        }
    }
    Ok(())
}

pub fn validate_risk(assessment: &RiskAssessment) -> Result<(), FetchFailure> {
    let p = Provider::RiskScorer;
    if assessment.synthetic {
        return Err(FetchFailure::malformed(p, "provider result marked synthetic"));
    }
    if assessment.score > 100 {
        return Err(FetchFailure::malformed(
            p,
            format!("score {} outside 0..=100", assessment.score),
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// JSON payloads
// ---------------------------------------------------------------------------

fn as_object(v: &Value, p: Provider) -> Result<&Map<String, Value>, FetchFailure> {
    v.as_object()
        .ok_or_else(|| FetchFailure::malformed(p, "expected a JSON object"))
}

/// First present string among `keys`, trimmed.
fn str_field<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .find_map(|k| obj.get(*k).and_then(Value::as_str))
        .map(str::trim)
}

fn array_field<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Vec<Value>> {
    keys.iter().find_map(|k| obj.get(*k).and_then(Value::as_array))
}

fn string_list(values: &[Value]) -> Vec<String> {
    values
        .iter()
        .filter_map(|v| match v {
            Value::String(s) => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .filter(|s| !s.is_empty())
        .collect()
}

/// Companies House style address object, or a plain string.
fn address(obj: &Map<String, Value>) -> Option<String> {
    if let Some(s) = str_field(obj, &["registered_address", "address"]) {
        return Some(s.to_string()).filter(|s| !s.is_empty());
    }
    let parts = obj.get("registered_office_address")?.as_object()?;
    let lines: Vec<&str> = [
        "premises",
        "address_line_1",
        "address_line_2",
        "locality",
        "region",
        "postal_code",
        "country",
    ]
    .iter()
    .filter_map(|k| parts.get(*k).and_then(Value::as_str))
    .map(str::trim)
    .filter(|s| !s.is_empty())
    .collect();
    if lines.is_empty() {
        None
    } else {
        Some(lines.join(", "))
    }
}

/// Business Verifier payload. `requested` fills in the registration number when the payload omits it.
pub fn business_from_value(v: &Value, requested: &str) -> Result<BusinessRecord, FetchFailure> {
    let p = Provider::BusinessVerifier;
    let obj = as_object(v, p)?;

    let status = str_field(obj, &["status", "company_status"])
        .map(BusinessStatus::from_registry)
        .ok_or_else(|| FetchFailure::malformed(p, "missing status"))?;

    let incorporation_date = match str_field(obj, &["incorporation_date", "date_of_creation"]) {
        Some(s) if !s.is_empty() => Some(
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .map_err(|e| FetchFailure::malformed(p, format!("incorporation date '{s}': {e}")))?,
        ),
        _ => None,
    };

    let sic_codes: BTreeSet<String> = array_field(obj, &["sic_codes"])
        .map(|a| string_list(a).into_iter().collect())
        .unwrap_or_default();

    let record = BusinessRecord {
        registration_number: str_field(obj, &["registration_number", "company_number"])
            .filter(|s| !s.is_empty())
            .unwrap_or(requested)
            .to_string(),
        legal_name: str_field(obj, &["legal_name", "name", "company_name"])
            .unwrap_or_default()
            .to_string(),
        status,
        incorporation_date,
        sic_codes,
        registered_address: address(obj),
    };
    validate_business(&record)?;
    Ok(record)
}

/// Director Retriever payload. Resigned officers and ceased PSCs are dropped.
pub fn directors_from_value(v: &Value) -> Result<DirectorListing, FetchFailure> {
    let p = Provider::DirectorRetriever;
    let obj = as_object(v, p)?;

    let officers = array_field(obj, &["directors", "officers", "items"])
        .ok_or_else(|| FetchFailure::malformed(p, "missing directors list"))?;

    let mut directors = Vec::with_capacity(officers.len());
    for (i, entry) in officers.iter().enumerate() {
        let o = entry
            .as_object()
            .ok_or_else(|| FetchFailure::malformed(p, format!("director #{} is not an object", i + 1)))?;
        if o.get("resigned_on").is_some_and(|r| !r.is_null()) {
            continue;
        }
        directors.push(Director {
            full_name: str_field(o, &["full_name", "name"]).unwrap_or_default().to_string(),
            role: str_field(o, &["role", "officer_role"])
                .filter(|s| !s.is_empty())
                .unwrap_or("director")
                .to_string(),
        });
    }

    let mut persons_with_significant_control = Vec::new();
    if let Some(pscs) = array_field(obj, &["persons_with_significant_control", "psc"]) {
        for (i, entry) in pscs.iter().enumerate() {
            let o = entry
                .as_object()
                .ok_or_else(|| FetchFailure::malformed(p, format!("PSC #{} is not an object", i + 1)))?;
            if o.get("ceased_on").is_some_and(|c| !c.is_null()) {
                continue;
            }
            persons_with_significant_control.push(SignificantControl {
                name: str_field(o, &["name", "full_name"]).unwrap_or_default().to_string(),
                natures_of_control: array_field(o, &["natures_of_control"])
                    .map(|a| string_list(a))
                    .unwrap_or_default(),
            });
        }
    }

    let listing = DirectorListing {
        directors,
        persons_with_significant_control,
    };
    validate_directors(&listing)?;
    Ok(listing)
}

/// Sanctions Screener payload. `hit_count` and `clear` are derived from `hits` when absent,
/// and rejected when present but inconsistent.
pub fn sanctions_from_value(v: &Value) -> Result<SanctionsResult, FetchFailure> {
    let p = Provider::SanctionsScreener;
    let obj = as_object(v, p)?;

    let mut hits = Vec::new();
    if let Some(raw_hits) = array_field(obj, &["hits", "matches"]) {
        for (i, entry) in raw_hits.iter().enumerate() {
            let h = entry
                .as_object()
                .ok_or_else(|| FetchFailure::malformed(p, format!("hit #{} is not an object", i + 1)))?;
            let confidence = ["confidence", "match_confidence", "score"]
                .iter()
                .find_map(|k| h.get(*k).and_then(Value::as_f64))
                .ok_or_else(|| FetchFailure::malformed(p, format!("hit #{} has no confidence", i + 1)))?;
            hits.push(SanctionsHit {
                matched_name: str_field(h, &["matched_name", "name"]).unwrap_or_default().to_string(),
                list_name: str_field(h, &["list_name", "list"]).unwrap_or_default().to_string(),
                confidence,
            });
        }
    }

    let hit_count = match obj.get("hit_count") {
        None | Some(Value::Null) => hits.len() as u32,
        Some(n) => n
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| FetchFailure::malformed(p, "hit_count is not a non-negative integer"))?,
    };
    let clear = match obj.get("clear") {
        None | Some(Value::Null) => hit_count == 0,
        Some(b) => b
            .as_bool()
            .ok_or_else(|| FetchFailure::malformed(p, "clear is not a boolean"))?,
    };

    let result = SanctionsResult {
        hit_count,
        clear,
        hits,
        lists_checked: array_field(obj, &["lists_checked"])
            .map(|a| string_list(a))
            .unwrap_or_default(),
        synthetic: false,
    };
    validate_sanctions(&result)?;
    Ok(result)
}

/// Risk Scorer payload.
pub fn risk_from_value(v: &Value) -> Result<RiskAssessment, FetchFailure> {
    let p = Provider::RiskScorer;
    let obj = as_object(v, p)?;

    let rating = str_field(obj, &["rating", "risk_rating"])
        .and_then(RiskRating::parse)
        .ok_or_else(|| FetchFailure::malformed(p, "missing or unknown rating"))?;
    let score = obj
        .get("score")
        .and_then(Value::as_f64)
        .filter(|s| (0.0..=100.0).contains(s))
        .ok_or_else(|| FetchFailure::malformed(p, "score missing or outside 0..=100"))?
        .round() as u8;

    let mut factors = Vec::new();
    if let Some(raw) = array_field(obj, &["factors"]) {
        for (i, entry) in raw.iter().enumerate() {
            let f = entry
                .as_object()
                .ok_or_else(|| FetchFailure::malformed(p, format!("factor #{} is not an object", i + 1)))?;
            let description = str_field(f, &["description", "factor"])
                .filter(|s| !s.is_empty())
                .ok_or_else(|| FetchFailure::malformed(p, format!("factor #{} has no description", i + 1)))?;
            let severity = str_field(f, &["severity"])
                .and_then(Severity::parse)
                .ok_or_else(|| FetchFailure::malformed(p, format!("factor #{} has unknown severity", i + 1)))?;
            let weight = f
                .get("weight")
                .and_then(Value::as_f64)
                .map(|w| w.max(0.0).round() as u32)
                .unwrap_or(0);
            factors.push(RiskFactor {
                description: description.to_string(),
                severity,
                weight,
            });
        }
    }

    let assessment = RiskAssessment {
        rating,
        score,
        factors,
        synthetic: false,
    };
    validate_risk(&assessment)?;
    Ok(assessment)
}
