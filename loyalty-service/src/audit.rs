//! Audit logging for processed events: a builder-style log entry plus a
//! logger that dispatches to structured tracing spans.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use loyalty_core::EventType;

/// What happened while processing one `EventInput`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditOutcome {
    Committed,
    Rejected,
    TimedOut,
}

/// One audit record per processed event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub timestamp: DateTime<Utc>,
    pub event_id: String,
    pub consumer_id: String,
    pub event_type: EventType,
    pub outcome: AuditOutcome,
    pub total_points_awarded: i64,
    pub matched_rule_count: usize,
    pub soft_error_count: usize,
    pub failure_reason: Option<String>,
}

impl AuditLogEntry {
    pub fn new(event_id: &str, consumer_id: &str, event_type: EventType, now: DateTime<Utc>) -> Self {
        Self {
            timestamp: now,
            event_id: event_id.to_string(),
            consumer_id: consumer_id.to_string(),
            event_type,
            outcome: AuditOutcome::Committed,
            total_points_awarded: 0,
            matched_rule_count: 0,
            soft_error_count: 0,
            failure_reason: None,
        }
    }

    pub fn with_result(mut self, total_points_awarded: i64, matched_rule_count: usize, soft_error_count: usize) -> Self {
        self.total_points_awarded = total_points_awarded;
        self.matched_rule_count = matched_rule_count;
        self.soft_error_count = soft_error_count;
        self
    }

    pub fn with_outcome(mut self, outcome: AuditOutcome, failure_reason: Option<String>) -> Self {
        self.outcome = outcome;
        self.failure_reason = failure_reason;
        self
    }
}

/// Emits one structured log line per processed event. Kept as a thin,
/// swappable seam: production deployments can replace this with a sink that
/// ships to a log aggregator without the processor knowing the difference.
#[derive(Debug, Default)]
pub struct AuditLogger;

impl AuditLogger {
    pub fn new() -> Self {
        Self
    }

    pub fn log(&self, entry: &AuditLogEntry) {
        match entry.outcome {
            AuditOutcome::Committed => tracing::info!(
                event_id = entry.event_id,
                consumer_id = entry.consumer_id,
                event_type = ?entry.event_type,
                total_points_awarded = entry.total_points_awarded,
                matched_rule_count = entry.matched_rule_count,
                soft_error_count = entry.soft_error_count,
                "event processed"
            ),
            AuditOutcome::Rejected => tracing::warn!(
                event_id = entry.event_id,
                consumer_id = entry.consumer_id,
                event_type = ?entry.event_type,
                reason = entry.failure_reason,
                "event rejected"
            ),
            AuditOutcome::TimedOut => tracing::warn!(
                event_id = entry.event_id,
                consumer_id = entry.consumer_id,
                event_type = ?entry.event_type,
                "event processing timed out"
            ),
        }
    }
}
