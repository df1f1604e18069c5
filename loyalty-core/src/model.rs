//! Shared data model: events, facts, consumers, and the reward breakdown.

use std::collections::HashMap;

use chrono::{DateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// The six business events the engine ingests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    Purchase,
    Registration,
    Recycle,
    Consultation,
    Adjustment,
    Redemption,
}

/// The three markets the engine operates in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Market {
    Jp,
    Hk,
    Tw,
}

/// A single named value produced by the facts engine or carried in a rule's
/// `event.params`. Resolvers and operators share this one representation
/// instead of passing around loosely-typed JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FactValue {
    Number(Decimal),
    Str(String),
    Bool(bool),
    Date(DateTime<Utc>),
    List(Vec<FactValue>),
    Map(HashMap<String, FactValue>),
    Null,
}

impl FactValue {
    pub fn as_number(&self) -> Option<Decimal> {
        match self {
            FactValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FactValue::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FactValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<DateTime<Utc>> {
        match self {
            FactValue::Date(d) => Some(*d),
            FactValue::Str(s) => DateTime::parse_from_rfc3339(s).ok().map(|d| d.with_timezone(&Utc)),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[FactValue]> {
        match self {
            FactValue::List(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FactValue::Null)
    }

    pub fn from_i64(n: i64) -> Self {
        FactValue::Number(Decimal::from(n))
    }
}

impl From<&str> for FactValue {
    fn from(s: &str) -> Self {
        FactValue::Str(s.to_string())
    }
}

impl From<String> for FactValue {
    fn from(s: String) -> Self {
        FactValue::Str(s)
    }
}

impl From<bool> for FactValue {
    fn from(b: bool) -> Self {
        FactValue::Bool(b)
    }
}

impl From<Decimal> for FactValue {
    fn from(d: Decimal) -> Self {
        FactValue::Number(d)
    }
}

/// Opaque `context`/`attributes` maps carried on an `EventInput`.
pub type FactMap = HashMap<String, FactValue>;

/// External input submitted to the processor for one business event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventInput {
    pub event_id: String,
    pub event_type: EventType,
    pub timestamp: DateTime<Utc>,
    pub market: Market,
    pub channel: String,
    pub product_line: String,
    pub consumer_id: String,
    #[serde(default)]
    pub context: FactMap,
    #[serde(default)]
    pub attributes: FactMap,
}

/// Per-consumer point ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub total: i64,
    pub available: i64,
    pub used: i64,
    pub account_version: u64,
    pub transaction_count: u64,
}

impl Default for Balance {
    fn default() -> Self {
        Self {
            total: 0,
            available: 0,
            used: 0,
            account_version: 0,
            transaction_count: 0,
        }
    }
}

/// A consumer profile as read from the store, plus facts derived from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Consumer {
    pub consumer_id: String,
    pub market: Market,
    pub birth_date: Option<DateTime<Utc>>,
    pub birth_time: Option<NaiveTime>,
    pub is_vip: bool,
    pub tags: Vec<String>,
    pub balance: Balance,
}

impl Consumer {
    pub fn fresh(consumer_id: &str, market: Market) -> Self {
        Self {
            consumer_id: consumer_id.to_string(),
            market,
            birth_date: None,
            birth_time: None,
            is_vip: false,
            tags: Vec::new(),
            balance: Balance::default(),
        }
    }
}

/// A consumer profile plus the history-derived facts computed by the store
/// before the current event is evaluated (`purchaseCount`,
/// `daysSinceFirstPurchase`, `firstPurchaseAt`). Kept separate from
/// `Consumer` so the facts engine itself never needs to reach back into the
/// store mid-evaluation: resolvers never acquire new locks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumerSnapshot {
    pub consumer: Consumer,
    pub purchase_count: u64,
    pub first_purchase_at: Option<DateTime<Utc>>,
}

impl ConsumerSnapshot {
    pub fn fresh(consumer_id: &str, market: Market) -> Self {
        Self {
            consumer: Consumer::fresh(consumer_id, market),
            purchase_count: 0,
            first_purchase_at: None,
        }
    }
}

/// The immutable record appended per processed input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEvent {
    pub consumer_id: String,
    pub event_id: String,
    pub event_type: EventType,
    pub timestamp: DateTime<Utc>,
    pub market: Market,
    pub channel: String,
    pub product_line: String,
    pub total_points_awarded: i64,
    pub point_breakdown: Vec<BreakdownEntry>,
    pub resulting_balance: Balance,
}

/// A fixed reward category, used purely for reporting/grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RewardCategory {
    BasePurchase,
    SpendingThreshold,
    Registration,
    Recycling,
    Consultation,
    ManualAdjustment,
    Redemption,
    CampaignBonus,
    TierOrProductBonus,
    Other,
}

/// The human-readable trace of how a `BreakdownEntry.points` was derived.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationTrace {
    pub calculation_type: String,
    pub formula: String,
    pub inputs: FactMap,
    pub result: i64,
}

/// A per-matched-rule record contributing signed points to the total.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakdownEntry {
    pub rule_name: String,
    pub priority: i64,
    pub r#type: String,
    pub category: RewardCategory,
    pub points: i64,
    pub description: String,
    pub computation: ComputationTrace,
}

/// Response returned from `process_event`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventResponse {
    pub consumer_id: String,
    pub event_id: String,
    pub event_type: EventType,
    pub total_points_awarded: i64,
    pub point_breakdown: Vec<BreakdownEntry>,
    pub errors: Vec<String>,
    pub resulting_balance: Balance,
}
