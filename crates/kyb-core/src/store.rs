//! Decision ledger: sled-backed, append-only history of finalized decisions.
//!
//! Keys: `decision/{registration_number}/{timestamp_millis:020}/{seq:020}`. Zero padding keeps
//! lexicographic order chronological; the sled-generated sequence keeps two decisions written in the
//! same millisecond apart.

use crate::records::DecisionRecord;
use std::path::Path;
use thiserror::Error;

pub const DEFAULT_STORE_PATH: &str = "./data/kyb_decisions";

const PREFIX: &str = "decision/";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("decision store: {0}")]
    Sled(#[from] sled::Error),

    #[error("decision encoding: {0}")]
    Codec(#[from] serde_json::Error),
}

pub struct DecisionStore {
    db: sled::Db,
}

impl DecisionStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db = sled::open(path.as_ref())?;
        tracing::info!(target: "kyb::store", path = %path.as_ref().display(), "decision store opened");
        Ok(Self { db })
    }

    /// In-memory store removed on drop. Used by tests and ephemeral deployments.
    pub fn open_temporary() -> Result<Self, StoreError> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Self { db })
    }

    fn number_prefix(registration_number: &str) -> String {
        format!("{}{}/", PREFIX, registration_number.trim().to_ascii_uppercase())
    }

    /// Append a decision. Returns the key it was stored under.
    pub fn record(&self, decision: &DecisionRecord) -> Result<String, StoreError> {
        let seq = self.db.generate_id()?;
        let key = format!(
            "{}{:020}/{:020}",
            Self::number_prefix(&decision.registration_number),
            decision.timestamp.timestamp_millis().max(0),
            seq
        );
        let payload = serde_json::to_vec(decision)?;
        self.db.insert(key.as_bytes(), payload)?;
        tracing::debug!(target: "kyb::store", key = %key, "decision recorded");
        Ok(key)
    }

    /// Most recent decision for a registration number.
    pub fn latest(&self, registration_number: &str) -> Result<Option<DecisionRecord>, StoreError> {
        let prefix = Self::number_prefix(registration_number);
        match self.db.scan_prefix(prefix.as_bytes()).next_back() {
            Some(entry) => {
                let (_, value) = entry?;
                Ok(Some(serde_json::from_slice(&value)?))
            }
            None => Ok(None),
        }
    }

    /// Decisions for a registration number, newest first, at most `limit`.
    pub fn history(
        &self,
        registration_number: &str,
        limit: usize,
    ) -> Result<Vec<DecisionRecord>, StoreError> {
        let prefix = Self::number_prefix(registration_number);
        self.db
            .scan_prefix(prefix.as_bytes())
            .rev()
            .take(limit)
            .map(|entry| -> Result<DecisionRecord, StoreError> {
                let (_, value) = entry?;
                Ok(serde_json::from_slice(&value)?)
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.db.scan_prefix(PREFIX.as_bytes()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
