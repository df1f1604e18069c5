//! Declarative rule conditions and the rule matcher.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::facts::FactsEngine;
use crate::model::{EventInput, FactMap, FactValue};

/// The eleven leaf comparison operators a condition can use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = "equal")]
    Equal,
    #[serde(rename = "notEqual")]
    NotEqual,
    #[serde(rename = "contains")]
    Contains,
    #[serde(rename = "doesNotContain")]
    DoesNotContain,
    #[serde(rename = "in")]
    In,
    #[serde(rename = "notIn")]
    NotIn,
    #[serde(rename = "greaterThan")]
    GreaterThan,
    #[serde(rename = "greaterThanInclusive")]
    GreaterThanInclusive,
    #[serde(rename = "lessThan")]
    LessThan,
    #[serde(rename = "lessThanInclusive")]
    LessThanInclusive,
    #[serde(rename = "regex")]
    Regex,
}

/// A boolean tree of rule conditions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Condition {
    All { all: Vec<Condition> },
    Any { any: Vec<Condition> },
    Leaf {
        fact: String,
        operator: Operator,
        value: FactValue,
    },
}

impl Condition {
    /// Evaluate this condition against one event's facts. A malformed leaf
    /// (unknown fact/operator) surfaces as `Err`; the caller marks the
    /// owning rule inapplicable and continues the run.
    pub fn evaluate(&self, facts: &FactsEngine) -> Result<bool> {
        match self {
            Condition::All { all } => {
                for c in all {
                    if !c.evaluate(facts)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Condition::Any { any } => {
                for c in any {
                    if c.evaluate(facts)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Condition::Leaf { fact, operator, value } => {
                let resolved = facts.resolve(fact)?;
                apply_operator(*operator, &resolved, value)
            }
        }
    }
}

fn apply_operator(operator: Operator, fact: &FactValue, value: &FactValue) -> Result<bool> {
    match operator {
        Operator::Equal => Ok(values_equal(fact, value)),
        Operator::NotEqual => Ok(!values_equal(fact, value)),
        Operator::Contains => Ok(contains(fact, value)),
        Operator::DoesNotContain => Ok(!contains(fact, value)),
        Operator::In => Ok(is_in(fact, value)),
        Operator::NotIn => Ok(!is_in(fact, value)),
        Operator::GreaterThan => compare_ordering(fact, value).map(|o| o == std::cmp::Ordering::Greater),
        Operator::GreaterThanInclusive => {
            compare_ordering(fact, value).map(|o| o != std::cmp::Ordering::Less)
        }
        Operator::LessThan => compare_ordering(fact, value).map(|o| o == std::cmp::Ordering::Less),
        Operator::LessThanInclusive => {
            compare_ordering(fact, value).map(|o| o != std::cmp::Ordering::Greater)
        }
        Operator::Regex => {
            let text = fact.as_str().ok_or_else(|| {
                Error::Calculation("regex operator requires a string fact".to_string())
            })?;
            let pattern = value
                .as_str()
                .ok_or_else(|| Error::Calculation("regex operator requires a string pattern".to_string()))?;
            let re = regex::Regex::new(pattern)
                .map_err(|e| Error::InvalidRuleFile(format!("invalid regex `{pattern}`: {e}")))?;
            Ok(re.is_match(text))
        }
    }
}

/// Null is equal only to an explicit null comparison; otherwise it compares
/// unequal to everything, so an absent optional path never accidentally matches.
fn values_equal(fact: &FactValue, value: &FactValue) -> bool {
    if fact.is_null() || value.is_null() {
        return fact.is_null() && value.is_null();
    }
    if let (Some(fd), Some(vd)) = (fact.as_date(), value.as_date()) {
        return fd == vd;
    }
    fact == value
}

fn contains(fact: &FactValue, value: &FactValue) -> bool {
    match fact {
        FactValue::List(items) => items.iter().any(|i| values_equal(i, value)),
        FactValue::Str(s) => value.as_str().map(|v| s.contains(v)).unwrap_or(false),
        _ => false,
    }
}

fn is_in(fact: &FactValue, value: &FactValue) -> bool {
    match value {
        FactValue::List(items) => items.iter().any(|i| values_equal(i, fact)),
        _ => false,
    }
}

fn compare_ordering(fact: &FactValue, value: &FactValue) -> Result<std::cmp::Ordering> {
    if let (Some(fd), Some(vd)) = (fact.as_date(), value.as_date()) {
        return Ok(fd.cmp(&vd));
    }
    match (fact.as_number(), value.as_number()) {
        (Some(f), Some(v)) => Ok(f.cmp(&v)),
        _ => match (fact.as_str(), value.as_str()) {
            (Some(f), Some(v)) => Ok(f.cmp(v)),
            _ => Err(Error::Calculation(
                "comparison operator requires two numbers, two dates, or two strings".to_string(),
            )),
        },
    }
}

/// A single declarative rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    pub name: String,
    #[serde(default = "default_priority")]
    pub priority: i64,
    #[serde(default = "default_active")]
    pub active: bool,
    pub conditions: Condition,
    pub event: RuleEventTemplate,
    #[serde(default)]
    pub markets: Option<Vec<String>>,
    #[serde(default)]
    pub channels: Option<Vec<String>>,
    #[serde(default)]
    pub product_lines: Option<Vec<String>>,
}

fn default_priority() -> i64 {
    100
}

fn default_active() -> bool {
    true
}

/// The `{type, params}` a rule emits when its conditions match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleEventTemplate {
    pub r#type: String,
    #[serde(default)]
    pub params: FactMap,
}

/// One matched rule's emitted event, ready for the reward calculator.
#[derive(Debug, Clone)]
pub struct MatchedRuleEvent {
    pub rule_name: String,
    pub priority: i64,
    pub event_type: String,
    pub params: FactMap,
}

/// Top-level rule file shape: either `{"rules": [...]}` or a bare array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RuleFile {
    Wrapped { rules: Vec<Rule> },
    Bare(Vec<Rule>),
}

/// Parse a rule file's JSON text into the list of `Rule`s it contains.
/// Loading the file itself is the external loader's job.
pub fn parse_rule_file(text: &str) -> Result<Vec<Rule>> {
    let file: RuleFile =
        serde_json::from_str(text).map_err(|e| Error::InvalidRuleFile(e.to_string()))?;
    Ok(match file {
        RuleFile::Wrapped { rules } => rules,
        RuleFile::Bare(rules) => rules,
    })
}

fn scope_matches(scope: &Option<Vec<String>>, value: &str) -> bool {
    match scope {
        None => true,
        Some(values) => values.iter().any(|v| v.eq_ignore_ascii_case(value)),
    }
}

/// Scans, scopes, and evaluates a rule catalog against one event, returning
/// matched rule events sorted by ascending `(priority, name)` and any soft
/// per-rule evaluation errors.
pub struct RuleEngine;

impl RuleEngine {
    pub fn run(rules: &[Rule], event: &EventInput, facts: &FactsEngine) -> (Vec<MatchedRuleEvent>, Vec<String>) {
        let market = format!("{:?}", event.market).to_uppercase();
        let mut matched = Vec::new();
        let mut errors = Vec::new();

        for rule in rules {
            if !rule.active {
                continue;
            }
            if !scope_matches(&rule.markets, &market)
                || !scope_matches(&rule.channels, &event.channel)
                || !scope_matches(&rule.product_lines, &event.product_line)
            {
                continue;
            }

            match rule.conditions.evaluate(facts) {
                Ok(true) => matched.push(MatchedRuleEvent {
                    rule_name: rule.name.clone(),
                    priority: rule.priority,
                    event_type: rule.event.r#type.clone(),
                    params: rule.event.params.clone(),
                }),
                Ok(false) => {}
                Err(e) => errors.push(format!("rule `{}` skipped: {e}", rule.name)),
            }
        }

        matched.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.rule_name.cmp(&b.rule_name)));
        (matched, errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ConsumerSnapshot, EventType, Market};
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;
    use std::collections::HashMap;

    fn sample_event(amount: i64) -> EventInput {
        let mut attributes = HashMap::new();
        attributes.insert("amount".to_string(), FactValue::Number(Decimal::from(amount)));
        EventInput {
            event_id: "evt-1".to_string(),
            event_type: EventType::Purchase,
            timestamp: Utc.with_ymd_and_hms(2026, 3, 15, 10, 0, 0).unwrap(),
            market: Market::Hk,
            channel: "ONLINE".to_string(),
            product_line: "SKINCARE".to_string(),
            consumer_id: "cons-1".to_string(),
            context: HashMap::new(),
            attributes,
        }
    }

    #[test]
    fn parses_wrapped_and_bare_rule_files() {
        let wrapped = r#"{"rules": [{"name": "r1", "conditions": {"fact": "market", "operator": "equal", "value": "HK"}, "event": {"type": "ORDER_BASE_POINT", "params": {}}}]}"#;
        let bare = r#"[{"name": "r1", "conditions": {"fact": "market", "operator": "equal", "value": "HK"}, "event": {"type": "ORDER_BASE_POINT", "params": {}}}]"#;
        assert_eq!(parse_rule_file(wrapped).unwrap().len(), 1);
        assert_eq!(parse_rule_file(bare).unwrap().len(), 1);
    }

    #[test]
    fn defaults_priority_and_active() {
        let rules = parse_rule_file(
            r#"[{"name": "r1", "conditions": {"fact": "market", "operator": "equal", "value": "HK"}, "event": {"type": "X", "params": {}}}]"#,
        )
        .unwrap();
        assert_eq!(rules[0].priority, 100);
        assert!(rules[0].active);
    }

    #[test]
    fn matches_and_orders_by_priority_then_name() {
        let rules = parse_rule_file(
            r#"[
                {"name": "zeta", "priority": 10, "conditions": {"fact": "market", "operator": "equal", "value": "HK"}, "event": {"type": "A", "params": {}}},
                {"name": "alpha", "priority": 10, "conditions": {"fact": "market", "operator": "equal", "value": "HK"}, "event": {"type": "B", "params": {}}},
                {"name": "early", "priority": 1, "conditions": {"fact": "market", "operator": "equal", "value": "HK"}, "event": {"type": "C", "params": {}}}
            ]"#,
        )
        .unwrap();
        let event = sample_event(1000);
        let snapshot = ConsumerSnapshot::fresh("cons-1", Market::Hk);
        let facts = FactsEngine::new(&event, &snapshot);
        let (matched, errors) = RuleEngine::run(&rules, &event, &facts);
        assert!(errors.is_empty());
        let names: Vec<_> = matched.iter().map(|m| m.rule_name.as_str()).collect();
        assert_eq!(names, vec!["early", "alpha", "zeta"]);
    }

    #[test]
    fn inactive_and_out_of_scope_rules_do_not_match() {
        let rules = parse_rule_file(
            r#"[
                {"name": "inactive", "active": false, "conditions": {"fact": "market", "operator": "equal", "value": "HK"}, "event": {"type": "A", "params": {}}},
                {"name": "wrong-market", "markets": ["JP"], "conditions": {"fact": "market", "operator": "equal", "value": "HK"}, "event": {"type": "B", "params": {}}}
            ]"#,
        )
        .unwrap();
        let event = sample_event(1000);
        let snapshot = ConsumerSnapshot::fresh("cons-1", Market::Hk);
        let facts = FactsEngine::new(&event, &snapshot);
        let (matched, errors) = RuleEngine::run(&rules, &event, &facts);
        assert!(matched.is_empty());
        assert!(errors.is_empty());
    }

    #[test]
    fn unknown_fact_in_leaf_is_a_soft_error() {
        let rules = parse_rule_file(
            r#"[{"name": "bad", "conditions": {"fact": "notAFact", "operator": "equal", "value": "x"}, "event": {"type": "A", "params": {}}}]"#,
        )
        .unwrap();
        let event = sample_event(1000);
        let snapshot = ConsumerSnapshot::fresh("cons-1", Market::Hk);
        let facts = FactsEngine::new(&event, &snapshot);
        let (matched, errors) = RuleEngine::run(&rules, &event, &facts);
        assert!(matched.is_empty());
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn greater_than_inclusive_threshold() {
        let rules = parse_rule_file(
            r#"[{"name": "basket", "conditions": {"fact": "attributes.amount", "operator": "greaterThanInclusive", "value": 5000}, "event": {"type": "FLEXIBLE_BASKET_AMOUNT", "params": {"threshold": 5000, "bonus": 300}}}]"#,
        )
        .unwrap();
        let snapshot = ConsumerSnapshot::fresh("cons-1", Market::Hk);

        let event_hit = sample_event(5500);
        let facts_hit = FactsEngine::new(&event_hit, &snapshot);
        let (matched_hit, _) = RuleEngine::run(&rules, &event_hit, &facts_hit);
        assert_eq!(matched_hit.len(), 1);

        let event_miss = sample_event(4999);
        let facts_miss = FactsEngine::new(&event_miss, &snapshot);
        let (matched_miss, _) = RuleEngine::run(&rules, &event_miss, &facts_miss);
        assert!(matched_miss.is_empty());
    }
}
