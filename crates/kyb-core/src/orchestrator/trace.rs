//! Reasoning log: the ordered REASON/OBSERVE trail human reviewers read.

use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TraceKind {
    Reason,
    Observe,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraceEntry {
    pub kind: TraceKind,
    pub text: String,
}

impl fmt::Display for TraceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self.kind {
            TraceKind::Reason => "REASON",
            TraceKind::Observe => "OBSERVE",
        };
        write!(f, "{}: {}", label, self.text)
    }
}

/// Append-only. Each entry is mirrored to tracing as it is written.
#[derive(Debug, Clone, Default)]
pub struct ReasoningLog {
    entries: Vec<TraceEntry>,
}

impl ReasoningLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, kind: TraceKind, text: String) {
        let entry = TraceEntry { kind, text };
        tracing::info!(target: "kyb::orchestrator", "{}", entry);
        self.entries.push(entry);
    }

    pub fn reason(&mut self, text: impl Into<String>) {
        self.push(TraceKind::Reason, text.into());
    }

    pub fn observe(&mut self, text: impl Into<String>) {
        self.push(TraceKind::Observe, text.into());
    }

    pub fn entries(&self) -> &[TraceEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Rendered `"REASON: ..."` / `"OBSERVE: ..."` lines, in order.
    pub fn render(&self) -> Vec<String> {
        self.entries.iter().map(ToString::to_string).collect()
    }
}
