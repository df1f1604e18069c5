//! The event processor: the orchestration pipeline that ties together
//! `loyalty-core`'s pure facts/rules/calculator stages with the store, lock
//! registry, rule loader, and audit logger in this crate.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use loyalty_core::{EventInput, EventResponse, FactsEngine, RewardCalculator, RuleEngine};

use crate::audit::{AuditLogEntry, AuditLogger, AuditOutcome};
use crate::error::{Error, Result};
use crate::lock_registry::ConsumerLockRegistry;
use crate::rule_loader::RuleLoader;
use crate::store::ConsumerStore;

/// How long a single `process_event` call is allowed to run before steps
/// 3–9 (lock acquisition through balance computation) are abandoned. The
/// commit itself is never raced against this deadline once it has begun.
const DEFAULT_DEADLINE: Duration = Duration::from_secs(5);

fn validate(input: &EventInput, now: chrono::DateTime<Utc>) -> Result<()> {
    if input.event_id.trim().is_empty() {
        return Err(Error::Validation("eventId must not be empty".to_string()));
    }
    if input.consumer_id.is_empty() || input.consumer_id.len() > 100 {
        return Err(Error::Validation("consumerId must be 1..100 characters".to_string()));
    }
    if input.timestamp > now + chrono::Duration::hours(24) {
        return Err(Error::Validation("timestamp must not be more than 24h in the future".to_string()));
    }
    Ok(())
}

/// Accrual adds the full delta to both `total` and `available`; redemption
/// moves up to `available` into `used` without touching `total`, per the
/// clamp-both over-redemption policy documented in `DESIGN.md`.
fn apply_delta(balance: &mut loyalty_core::Balance, delta: i64) {
    if delta >= 0 {
        balance.total += delta;
        balance.available += delta;
    } else {
        let r = -delta;
        balance.available = (balance.available - r).max(0);
        balance.used += r;
    }
    balance.transaction_count += 1;
    balance.account_version += 1;
}

/// Ties together the store, lock registry, rule loader, and audit logger
/// behind the single `process_event` entry point.
pub struct EventProcessor {
    store: Arc<dyn ConsumerStore>,
    rule_loader: Arc<dyn RuleLoader>,
    locks: Arc<ConsumerLockRegistry>,
    audit_logger: Arc<AuditLogger>,
    deadline: Duration,
}

impl EventProcessor {
    pub fn new(store: Arc<dyn ConsumerStore>, rule_loader: Arc<dyn RuleLoader>, locks: Arc<ConsumerLockRegistry>, audit_logger: Arc<AuditLogger>) -> Self {
        Self { store, rule_loader, locks, audit_logger, deadline: DEFAULT_DEADLINE }
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub async fn process_event(&self, input: EventInput) -> Result<EventResponse> {
        let now = Utc::now();
        validate(&input, now)?;

        if self.store.has_event(&input.event_id).await? {
            let entry = AuditLogEntry::new(&input.event_id, &input.consumer_id, input.event_type, now)
                .with_outcome(AuditOutcome::Rejected, Some("duplicate eventId".to_string()));
            self.audit_logger.log(&entry);
            return Err(Error::DuplicateEvent(input.event_id.clone()));
        }

        let guard = self.locks.lock(&input.consumer_id).await;

        let precommit = tokio::time::timeout(self.deadline, self.compute(&input)).await;
        let outcome = match precommit {
            Ok(result) => result,
            Err(_) => {
                drop(guard);
                let entry = AuditLogEntry::new(&input.event_id, &input.consumer_id, input.event_type, now)
                    .with_outcome(AuditOutcome::TimedOut, None);
                self.audit_logger.log(&entry);
                return Err(Error::Timeout);
            }
        };

        let (response, history_event) = outcome?;

        // Step 10: persist. Not raced against the deadline (once the balance
        // has been computed, the commit always runs to completion). History
        // is written first: it is append-only, so a failure here touches no
        // existing state and needs no rollback. Only once that record exists
        // do we replace the balance, so a store failure never leaves points
        // awarded without a history entry to account for them.
        self.store.append_history(history_event).await?;
        self.store.update_balance(&input.consumer_id, response.resulting_balance).await?;

        drop(guard); // Step 11.

        let audit_entry = AuditLogEntry::new(&input.event_id, &input.consumer_id, input.event_type, now)
            .with_result(response.total_points_awarded, response.point_breakdown.len(), response.errors.len())
            .with_outcome(AuditOutcome::Committed, None);
        self.audit_logger.log(&audit_entry);
        tracing::info!(
            consumer_id = input.consumer_id,
            event_id = input.event_id,
            total_points_awarded = response.total_points_awarded,
            total = response.resulting_balance.total,
            available = response.resulting_balance.available,
            used = response.resulting_balance.used,
            "processed event"
        );

        Ok(response)
    }

    /// Steps 4–9: read the pre-mutation snapshot, evaluate rules, calculate
    /// rewards, and compute the new balance. Performs no writes.
    async fn compute(&self, input: &EventInput) -> Result<(EventResponse, loyalty_core::HistoryEvent)> {
        let snapshot = self.store.snapshot(&input.consumer_id, input.market).await?;
        let rules = self.rule_loader.rules();

        let facts = FactsEngine::new(input, &snapshot);
        let (matched, mut errors) = RuleEngine::run(&rules, input, &facts);

        let mut breakdown = Vec::with_capacity(matched.len());
        let mut total_points_awarded: i64 = 0;
        for rule_event in &matched {
            let (entry, err) = RewardCalculator::calculate(rule_event, input);
            total_points_awarded += entry.points;
            breakdown.push(entry);
            if let Some(message) = err {
                errors.push(message);
            }
        }

        let mut balance = snapshot.consumer.balance;
        apply_delta(&mut balance, total_points_awarded);

        let history_event = loyalty_core::HistoryEvent {
            consumer_id: input.consumer_id.clone(),
            event_id: input.event_id.clone(),
            event_type: input.event_type,
            timestamp: input.timestamp,
            market: input.market,
            channel: input.channel.clone(),
            product_line: input.product_line.clone(),
            total_points_awarded,
            point_breakdown: breakdown.clone(),
            resulting_balance: balance,
        };

        let response = EventResponse {
            consumer_id: input.consumer_id.clone(),
            event_id: input.event_id.clone(),
            event_type: input.event_type,
            total_points_awarded,
            point_breakdown: breakdown,
            errors,
            resulting_balance: balance,
        };

        Ok((response, history_event))
    }
}
