//! The facts engine: a registry of named, lazily-evaluated resolvers over
//! one event + consumer snapshot.

use std::cell::RefCell;
use std::collections::HashMap;

use chrono::Datelike;
use rust_decimal::Decimal;

use crate::error::{Error, Result};
use crate::model::{ConsumerSnapshot, EventInput, FactValue};

/// Resolves named facts against one `EventInput` + `ConsumerSnapshot`,
/// memoizing each fact the first time it is asked for. Scoped to a single
/// rule run; never shared across events.
pub struct FactsEngine<'a> {
    event: &'a EventInput,
    snapshot: &'a ConsumerSnapshot,
    cache: RefCell<HashMap<String, FactValue>>,
}

impl<'a> FactsEngine<'a> {
    pub fn new(event: &'a EventInput, snapshot: &'a ConsumerSnapshot) -> Self {
        Self {
            event,
            snapshot,
            cache: RefCell::new(HashMap::new()),
        }
    }

    /// Resolve a fact by name, memoizing the result. Returns
    /// `Error::UnknownFact` for any name not in the catalog below; a known
    /// fact whose optional source path is absent resolves to `FactValue::Null`.
    pub fn resolve(&self, fact: &str) -> Result<FactValue> {
        if let Some(cached) = self.cache.borrow().get(fact) {
            return Ok(cached.clone());
        }
        let value = self.compute(fact)?;
        self.cache.borrow_mut().insert(fact.to_string(), value.clone());
        Ok(value)
    }

    fn compute(&self, fact: &str) -> Result<FactValue> {
        match fact {
            "eventType" => Ok(FactValue::Str(format!("{:?}", self.event.event_type).to_uppercase())),
            "market" => Ok(FactValue::Str(format!("{:?}", self.event.market).to_uppercase())),
            "channel" => Ok(FactValue::Str(self.event.channel.clone())),
            "productLine" => Ok(FactValue::Str(self.event.product_line.clone())),
            "timestamp" => Ok(FactValue::Date(self.event.timestamp)),
            "consumerId" => Ok(FactValue::Str(self.event.consumer_id.clone())),

            "context" => Ok(FactValue::Map(self.event.context.clone())),
            "attributes" => Ok(FactValue::Map(self.event.attributes.clone())),

            "attributes.amount" => Ok(lookup(&self.event.attributes, "amount")),
            "attributes.srpAmount" => Ok(lookup(&self.event.attributes, "srpAmount")),
            "attributes.skuList" => Ok(lookup(&self.event.attributes, "skuList")),
            "attributes.recycledCount" => Ok(lookup(&self.event.attributes, "recycledCount")),
            "attributes.skinTestDate" => Ok(lookup(&self.event.attributes, "skinTestDate")),
            "attributes.comboTag" => Ok(lookup(&self.event.attributes, "comboTag")),
            "attributes.adjustedPoints" => Ok(lookup(&self.event.attributes, "adjustedPoints")),

            "context.externalId" => Ok(lookup(&self.event.context, "externalId")),
            "context.storeId" => Ok(lookup(&self.event.context, "storeId")),
            "context.campaignCode" => Ok(lookup(&self.event.context, "campaignCode")),

            "eventDate" => Ok(FactValue::Date(self.event.timestamp)),
            "eventMonth" => Ok(FactValue::Number(Decimal::from(self.event.timestamp.month()))),

            "consumer" => Ok(consumer_as_map(self.snapshot)),

            "purchaseCount" => Ok(FactValue::Number(Decimal::from(self.snapshot.purchase_count))),
            "isFirstPurchase" => Ok(FactValue::Bool(self.snapshot.purchase_count == 0)),

            "daysSinceFirstPurchase" => {
                let days = match self.snapshot.first_purchase_at {
                    Some(first) => (self.event.timestamp - first).num_days().max(0),
                    None => 0,
                };
                Ok(FactValue::Number(Decimal::from(days)))
            }

            "isVIP" => Ok(FactValue::Bool(self.snapshot.consumer.is_vip)),

            "birthMonth" => Ok(match self.snapshot.consumer.birth_date {
                Some(d) => FactValue::Number(Decimal::from(d.month())),
                None => FactValue::Null,
            }),

            "isBirthMonth" => {
                let birth_month = self.resolve("birthMonth")?;
                let event_month = self.resolve("eventMonth")?;
                match (birth_month.as_number(), event_month.as_number()) {
                    (Some(b), Some(e)) => Ok(FactValue::Bool(b == e)),
                    _ => Ok(FactValue::Bool(false)),
                }
            }

            "storeType" => {
                let store_id = lookup(&self.event.context, "storeId");
                let is_vip = store_id
                    .as_str()
                    .map(|s| s.to_uppercase().contains("VIP"))
                    .unwrap_or(false);
                Ok(FactValue::Str(if is_vip { "VIP".to_string() } else { "STANDARD".to_string() }))
            }

            "redemptionPoints" => Ok(lookup(&self.event.attributes, "redemptionPoints")),

            "transactionAmount" => {
                let amount = lookup(&self.event.attributes, "amount");
                if !amount.is_null() {
                    Ok(amount)
                } else {
                    Ok(lookup(&self.event.attributes, "srpAmount"))
                }
            }

            "tags" => Ok(FactValue::List(
                self.snapshot
                    .consumer
                    .tags
                    .iter()
                    .map(|t| FactValue::Str(t.clone()))
                    .collect(),
            )),

            other => Err(Error::UnknownFact(other.to_string())),
        }
    }
}

fn lookup(map: &HashMap<String, FactValue>, key: &str) -> FactValue {
    map.get(key).cloned().unwrap_or(FactValue::Null)
}

fn consumer_as_map(snapshot: &ConsumerSnapshot) -> FactValue {
    let mut map = HashMap::new();
    map.insert("consumerId".to_string(), FactValue::Str(snapshot.consumer.consumer_id.clone()));
    map.insert("isVIP".to_string(), FactValue::Bool(snapshot.consumer.is_vip));
    map.insert(
        "tags".to_string(),
        FactValue::List(snapshot.consumer.tags.iter().map(|t| FactValue::Str(t.clone())).collect()),
    );
    FactValue::Map(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Consumer, EventType, Market};
    use chrono::{TimeZone, Utc};

    fn sample_event() -> EventInput {
        let mut attributes = HashMap::new();
        attributes.insert("amount".to_string(), FactValue::Number(Decimal::from(2000)));
        let mut context = HashMap::new();
        context.insert("storeId".to_string(), FactValue::Str("HK-VIP-01".to_string()));
        EventInput {
            event_id: "evt-1".to_string(),
            event_type: EventType::Purchase,
            timestamp: Utc.with_ymd_and_hms(2026, 3, 15, 10, 0, 0).unwrap(),
            market: Market::Hk,
            channel: "ONLINE".to_string(),
            product_line: "SKINCARE".to_string(),
            consumer_id: "cons-1".to_string(),
            context,
            attributes,
        }
    }

    #[test]
    fn resolves_direct_fields() {
        let event = sample_event();
        let snapshot = ConsumerSnapshot::fresh("cons-1", Market::Hk);
        let engine = FactsEngine::new(&event, &snapshot);
        assert_eq!(engine.resolve("market").unwrap(), FactValue::Str("HK".to_string()));
        assert_eq!(engine.resolve("attributes.amount").unwrap().as_number(), Some(Decimal::from(2000)));
    }

    #[test]
    fn store_type_detects_vip_substring() {
        let event = sample_event();
        let snapshot = ConsumerSnapshot::fresh("cons-1", Market::Hk);
        let engine = FactsEngine::new(&event, &snapshot);
        assert_eq!(engine.resolve("storeType").unwrap(), FactValue::Str("VIP".to_string()));
    }

    #[test]
    fn missing_optional_path_is_null() {
        let event = sample_event();
        let snapshot = ConsumerSnapshot::fresh("cons-1", Market::Hk);
        let engine = FactsEngine::new(&event, &snapshot);
        assert_eq!(engine.resolve("context.campaignCode").unwrap(), FactValue::Null);
    }

    #[test]
    fn unknown_fact_errors() {
        let event = sample_event();
        let snapshot = ConsumerSnapshot::fresh("cons-1", Market::Hk);
        let engine = FactsEngine::new(&event, &snapshot);
        assert!(matches!(engine.resolve("notARealFact"), Err(Error::UnknownFact(_))));
    }

    #[test]
    fn birth_month_match() {
        let event = sample_event();
        let mut snapshot = ConsumerSnapshot::fresh("cons-1", Market::Hk);
        snapshot.consumer.birth_date = Some(Utc.with_ymd_and_hms(1990, 3, 1, 0, 0, 0).unwrap());
        let engine = FactsEngine::new(&event, &snapshot);
        assert_eq!(engine.resolve("isBirthMonth").unwrap(), FactValue::Bool(true));
    }

    #[test]
    fn days_since_first_purchase_floors_to_whole_days() {
        let mut event = sample_event();
        event.timestamp = Utc.with_ymd_and_hms(2026, 3, 15, 10, 0, 0).unwrap();
        let mut snapshot = ConsumerSnapshot::fresh("cons-1", Market::Hk);
        snapshot.first_purchase_at = Some(Utc.with_ymd_and_hms(2026, 2, 11, 23, 0, 0).unwrap());
        let engine = FactsEngine::new(&event, &snapshot);
        assert_eq!(engine.resolve("daysSinceFirstPurchase").unwrap().as_number(), Some(Decimal::from(32)));
        let _ = Consumer::fresh("x", Market::Jp);
    }
}
