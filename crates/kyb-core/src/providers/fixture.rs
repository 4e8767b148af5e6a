//! In-process fixture registry: sample UK companies, a small watchlist, and an additive risk table.
//!
//! Serves all four provider roles so the gateway runs without any external service. Everything is a
//! pure function of the stored fixtures and the fixed `as_of` date.

use super::{BusinessVerifier, DirectorRetriever, RiskScorer, SanctionsScreener};
use crate::error::{FetchFailure, Provider};
use crate::records::{
    BusinessRecord, BusinessStatus, Director, DirectorListing, DirectorSet, RiskAssessment,
    RiskFactor, RiskRating, SanctionsHit, SanctionsResult, Severity, SignificantControl,
};
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};

const LISTS: [&str; 4] = ["OFAC SDN", "UN Consolidated", "EU Consolidated", "HM Treasury OFSI"];

/// SIC codes the scoring table treats as high risk.
const HIGH_RISK_SIC: [&str; 6] = ["64999", "66120", "92000", "46720", "47770", "68100"];

#[derive(Debug, Clone)]
struct WatchlistEntry {
    name: String,
    list_name: String,
}

#[derive(Debug, Clone)]
pub struct FixtureRegistry {
    companies: BTreeMap<String, (BusinessRecord, DirectorListing)>,
    watchlist: Vec<WatchlistEntry>,
    as_of: NaiveDate,
}

/// Canonical registry form: uppercase, no whitespace, numeric numbers left-padded to eight digits.
fn canonical_number(raw: &str) -> String {
    let s: String = raw
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_uppercase();
    if !s.is_empty() && s.len() < 8 && s.chars().all(|c| c.is_ascii_digit()) {
        format!("{:0>8}", s)
    } else {
        s
    }
}

/// Uppercase alphanumeric tokens, for name matching.
fn name_tokens(name: &str) -> Vec<String> {
    name.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_uppercase)
        .collect()
}

fn date(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(y, m, d)
}

fn company(
    number: &str,
    name: &str,
    status: BusinessStatus,
    incorporated: Option<NaiveDate>,
    sic: &[&str],
    address: &str,
) -> BusinessRecord {
    BusinessRecord {
        registration_number: number.to_string(),
        legal_name: name.to_string(),
        status,
        incorporation_date: incorporated,
        sic_codes: sic.iter().map(|s| s.to_string()).collect::<BTreeSet<_>>(),
        registered_address: Some(address.to_string()).filter(|a| !a.is_empty()),
    }
}

fn listing(directors: &[&str], pscs: &[&str]) -> DirectorListing {
    DirectorListing {
        directors: directors
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
                natures_of_control: vec!["ownership-of-shares-75-to-100-percent".to_string()],
            })
            .collect(),
    }
}

impl FixtureRegistry {
    /// No companies, no watchlist entries. Scoring is evaluated as of `as_of`.
    pub fn empty(as_of: NaiveDate) -> Self {
        Self {
            companies: BTreeMap::new(),
            watchlist: Vec::new(),
            as_of,
        }
    }

    pub fn with_company(mut self, business: BusinessRecord, listing: DirectorListing) -> Self {
        let key = canonical_number(&business.registration_number);
        self.companies.insert(key, (business, listing));
        self
    }

    pub fn with_watchlist_entry(mut self, name: &str, list_name: &str) -> Self {
        self.watchlist.push(WatchlistEntry {
            name: name.to_string(),
            list_name: list_name.to_string(),
        });
        self
    }

    /// The sample data set served by the gateway in `fixture` mode.
    pub fn sample() -> Self {
        let as_of = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap_or(NaiveDate::MIN);
        Self::empty(as_of)
            .with_company(
                company(
                    "00445790",
                    "HARBOUR LANE SUPPLIES LIMITED",
                    BusinessStatus::Active,
                    date(1947, 11, 27),
                    &["47110"],
                    "1 Harbour Lane, Welwyn Garden City, AL7 1GA",
                ),
                listing(&["Ada Quill", "Tomas Brennan"], &["Ada Quill"]),
            )
            .with_company(
                company(
                    "01234567",
                    "OLD MILL TRADING LTD",
                    BusinessStatus::Dissolved,
                    date(2001, 3, 14),
                    &["56101"],
                    "Unit 4 Old Mill Yard, Leeds, LS10 1AB",
                ),
                listing(&["Graham Pike"], &["Graham Pike"]),
            )
            .with_company(
                company(
                    "SC654321",
                    "NORTHGATE EXPORTS LTD",
                    BusinessStatus::Active,
                    date(2015, 6, 1),
                    &["46900"],
                    "22 Northgate, Aberdeen, AB11 5QN",
                ),
                listing(&["Morag Innes", "Viktor Orlov"], &["Viktor Orlov"]),
            )
            .with_company(
                company(
                    "09876543",
                    "QUIETWATER HOLDINGS LTD",
                    BusinessStatus::Active,
                    date(2010, 2, 2),
                    &["70100"],
                    "3 Quietwater Row, Bristol, BS1 4DJ",
                ),
                listing(&[], &["Quietwater Group PLC"]),
            )
            .with_company(
                company(
                    "11223344",
                    "BRIGHTCOIN EXCHANGE LTD",
                    BusinessStatus::Active,
                    date(2025, 6, 10),
                    &["64999", "66120"],
                    "Floor 2, 10 Finsbury Square, London, EC2A 1AF",
                ),
                listing(&["Lena Marsh"], &["Lena Marsh"]),
            )
            .with_company(
                company(
                    "07654321",
                    "FENWAY CONSULTING LTD",
                    BusinessStatus::Active,
                    date(2024, 9, 1),
                    &["70229"],
                    "8 Fenway Court, Manchester, M1 2HF",
                ),
                listing(&["Priya Shah"], &[]),
            )
            .with_company(
                company(
                    "05555555",
                    "TIDEWAY MARINE LTD",
                    BusinessStatus::Other,
                    date(2005, 5, 5),
                    &["50200"],
                    "Tideway Wharf, Southampton, SO14 3TJ",
                ),
                listing(&["Ellis Crane"], &["Ellis Crane"]),
            )
            .with_watchlist_entry("Viktor Orlov", "HM Treasury OFSI")
            .with_watchlist_entry("Northern Star Shipping LLC", "OFAC SDN")
            .with_watchlist_entry("Anton Krell", "UN Consolidated")
            .with_watchlist_entry("Meridian Arms Trading", "EU Consolidated")
    }

    /// Exact token match scores 1.0; every watchlist token present in a longer name scores 0.9.
    fn match_confidence(candidate: &[String], entry: &[String]) -> Option<f64> {
        if entry.is_empty() || candidate.is_empty() {
            return None;
        }
        if candidate == entry {
            return Some(1.0);
        }
        if entry.len() >= 2 && entry.iter().all(|t| candidate.contains(t)) {
            return Some(0.9);
        }
        None
    }

    fn assess(&self, business: &BusinessRecord, directors: &DirectorSet) -> RiskAssessment {
        let mut factors = vec![RiskFactor {
            description: "Baseline onboarding risk".to_string(),
            severity: Severity::Low,
            weight: 5,
        }];
        for code in &business.sic_codes {
            if HIGH_RISK_SIC.contains(&code.as_str()) {
                factors.push(RiskFactor {
                    description: format!("High-risk SIC code {code}"),
                    severity: Severity::High,
                    weight: 35,
                });
            }
        }
        if let Some(incorporated) = business.incorporation_date {
            if (self.as_of - incorporated).num_days() < 730 {
                factors.push(RiskFactor {
                    description: "Company incorporated less than two years ago".to_string(),
                    severity: Severity::Medium,
                    weight: 25,
                });
            }
        }
        if let Some(listing) = directors.listing() {
            if listing.directors.is_empty() {
                factors.push(RiskFactor {
                    description: "No active directors on record".to_string(),
                    severity: Severity::Medium,
                    weight: 15,
                });
            }
            if listing.persons_with_significant_control.is_empty() {
                factors.push(RiskFactor {
                    description: "No persons with significant control registered".to_string(),
                    severity: Severity::Medium,
                    weight: 15,
                });
            }
        }
        if business.registered_address.is_none() {
            factors.push(RiskFactor {
                description: "No registered office address".to_string(),
                severity: Severity::Low,
                weight: 10,
            });
        }

        let score = factors.iter().map(|f| f.weight).sum::<u32>().min(100) as u8;
        let rating = if score >= 60 {
            RiskRating::High
        } else if score >= 30 {
            RiskRating::Medium
        } else {
            RiskRating::Low
        };
        RiskAssessment {
            rating,
            score,
            factors,
            synthetic: false,
        }
    }
}

impl Default for FixtureRegistry {
    fn default() -> Self {
        Self::sample()
    }
}

#[async_trait::async_trait]
impl BusinessVerifier for FixtureRegistry {
    async fn verify(&self, registration_number: &str) -> Result<BusinessRecord, FetchFailure> {
        let key = canonical_number(registration_number);
        Ok(match self.companies.get(&key) {
            Some((business, _)) => business.clone(),
            None => BusinessRecord::not_found(&key),
        })
    }
}

#[async_trait::async_trait]
impl DirectorRetriever for FixtureRegistry {
    async fn get_directors(
        &self,
        registration_number: &str,
    ) -> Result<DirectorListing, FetchFailure> {
        let key = canonical_number(registration_number);
        self.companies
            .get(&key)
            .map(|(_, listing)| listing.clone())
            .ok_or_else(|| FetchFailure::Rejected {
                provider: Provider::DirectorRetriever,
                reason: format!("unknown registration number {key}"),
            })
    }
}

#[async_trait::async_trait]
impl SanctionsScreener for FixtureRegistry {
    async fn screen(
        &self,
        business_name: &str,
        director_names: &[String],
    ) -> Result<SanctionsResult, FetchFailure> {
        let mut hits = Vec::new();
        let candidates = std::iter::once(business_name).chain(director_names.iter().map(String::as_str));
        for candidate in candidates {
            let tokens = name_tokens(candidate);
            for entry in &self.watchlist {
                if let Some(confidence) = Self::match_confidence(&tokens, &name_tokens(&entry.name)) {
                    hits.push(SanctionsHit {
                        matched_name: candidate.to_string(),
                        list_name: entry.list_name.clone(),
                        confidence,
                    });
                }
            }
        }
        Ok(SanctionsResult::from_hits(
            hits,
            LISTS.iter().map(|l| l.to_string()).collect(),
        ))
    }
}

#[async_trait::async_trait]
impl RiskScorer for FixtureRegistry {
    async fn score(
        &self,
        business: &BusinessRecord,
        directors: &DirectorSet,
        _sanctions: &SanctionsResult,
    ) -> Result<RiskAssessment, FetchFailure> {
        Ok(self.assess(business, directors))
    }
}
