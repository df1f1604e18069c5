//! Loyalty Rules Engine Service
//!
//! Orchestrates `loyalty-core`'s pure rule-matching and reward-calculation
//! logic into a single `EventProcessor::process_event` entry point: per-
//! consumer locking, pluggable consumer storage, hot-reloadable rule
//! loading, and structured audit logging. No transport (HTTP/gRPC/CLI)
//! lives here; that is the concern of whatever embeds this crate.

pub mod audit;
pub mod error;
pub mod lock_registry;
pub mod processor;
pub mod rule_loader;
pub mod store;

pub use audit::{AuditLogEntry, AuditLogger, AuditOutcome};
pub use error::{Error, Result};
pub use lock_registry::{ConsumerLockGuard, ConsumerLockRegistry};
pub use processor::EventProcessor;
pub use rule_loader::{InMemoryRuleLoader, RuleLoader};
pub use store::{ConsumerStore, InMemoryConsumerStore};
