// 6.2 health.rs: non-fatal conditions the operator should see, e.g. an asset configured for an
// exchange nobody registered an adapter for. one open issue per (kind, subject).

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

use crate::types::Timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum HealthIssueKind {
    MissingExchangeAdapter,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthIssue {
    pub kind: HealthIssueKind,
    pub subject: String,
    pub message: String,
    pub raised_at: Timestamp,
}

#[derive(Default)]
pub struct HealthMonitor {
    issues: RwLock<BTreeMap<(HealthIssueKind, String), HealthIssue>>,
}

impl HealthMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self, kind: HealthIssueKind, subject: impl Into<String>, message: impl Into<String>) {
        let subject = subject.into();
        let mut issues = self.issues.write();

        // keep the first occurrence, only log when it is new
        if issues.contains_key(&(kind, subject.clone())) {
            return;
        }

        let issue = HealthIssue {
            kind,
            subject: subject.clone(),
            message: message.into(),
            raised_at: Timestamp::now(),
        };
        warn!(kind = ?issue.kind, subject = %issue.subject, message = %issue.message, "health issue raised");
        issues.insert((kind, subject), issue);
    }

    pub fn clear(&self, kind: HealthIssueKind, subject: &str) {
        self.issues.write().remove(&(kind, subject.to_string()));
    }

    pub fn issues(&self) -> Vec<HealthIssue> {
        self.issues.read().values().cloned().collect()
    }

    pub fn is_healthy(&self) -> bool {
        self.issues.read().is_empty()
    }
}
