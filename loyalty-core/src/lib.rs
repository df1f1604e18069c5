//! Loyalty Rules Engine Core
//!
//! The pure, I/O-free domain logic behind the loyalty rules engine: the
//! facts catalog, the rule condition matcher, and the reward calculator.
//! Nothing in this crate touches a lock, a clock other than the event's own
//! timestamp, or a persistence layer (that orchestration lives in
//! `loyalty-service`).

pub mod calculator;
pub mod error;
pub mod facts;
pub mod model;
pub mod rules;

pub use calculator::RewardCalculator;
pub use error::{Error, Result};
pub use facts::FactsEngine;
pub use model::{
    Balance, BreakdownEntry, ComputationTrace, Consumer, ConsumerSnapshot, EventInput, EventResponse,
    EventType, FactMap, FactValue, HistoryEvent, Market, RewardCategory,
};
pub use rules::{parse_rule_file, Condition, MatchedRuleEvent, Operator, Rule, RuleEngine, RuleEventTemplate};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
