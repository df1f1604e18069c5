//! The `ConsumerStore` capability trait and its in-memory implementation,
//! pluggable so tests and production can swap implementations.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use loyalty_core::{Balance, Consumer, ConsumerSnapshot, EventType, HistoryEvent, Market};

use crate::error::{Error, Result};

/// Persists consumers, balances, and event history; serializes all
/// operations on one consumer via the caller-held per-consumer lock
/// rather than locking internally.
#[async_trait]
pub trait ConsumerStore: Send + Sync {
    async fn get_consumer(&self, consumer_id: &str) -> Result<Option<Consumer>>;

    /// Creates a zeroed balance lazily on first read.
    async fn get_balance(&self, consumer_id: &str) -> Result<Balance>;

    /// Atomic replace of the balance record.
    async fn update_balance(&self, consumer_id: &str, balance: Balance) -> Result<()>;

    /// Append-only; writes to an unknown consumer implicitly create it.
    async fn append_history(&self, event: HistoryEvent) -> Result<()>;

    async fn has_event(&self, event_id: &str) -> Result<bool>;

    async fn query_history(&self, consumer_id: &str) -> Result<Vec<HistoryEvent>>;

    /// Count of prior PURCHASE history for `consumerId`.
    async fn purchase_count(&self, consumer_id: &str) -> Result<u64> {
        let history = self.query_history(consumer_id).await?;
        Ok(history.iter().filter(|e| e.event_type == EventType::Purchase).count() as u64)
    }

    async fn first_purchase_ts(&self, consumer_id: &str) -> Result<Option<DateTime<Utc>>> {
        let history = self.query_history(consumer_id).await?;
        Ok(history
            .iter()
            .filter(|e| e.event_type == EventType::Purchase)
            .map(|e| e.timestamp)
            .min())
    }

    async fn days_since_first_purchase(&self, consumer_id: &str, as_of: DateTime<Utc>) -> Result<i64> {
        match self.first_purchase_ts(consumer_id).await? {
            Some(first) => Ok((as_of - first).num_days().max(0)),
            None => Ok(0),
        }
    }

    /// The `ConsumerSnapshot` the facts engine evaluates against: consumer
    /// profile plus history-derived facts, read once before mutation begins.
    async fn snapshot(&self, consumer_id: &str, market: Market) -> Result<ConsumerSnapshot> {
        let consumer = self
            .get_consumer(consumer_id)
            .await?
            .unwrap_or_else(|| Consumer::fresh(consumer_id, market));
        let purchase_count = self.purchase_count(consumer_id).await?;
        let first_purchase_at = self.first_purchase_ts(consumer_id).await?;
        Ok(ConsumerSnapshot { consumer, purchase_count, first_purchase_at })
    }
}

/// In-memory implementation for development and testing.
#[derive(Debug, Default)]
pub struct InMemoryConsumerStore {
    consumers: RwLock<HashMap<String, Consumer>>,
    history: RwLock<HashMap<String, Vec<HistoryEvent>>>,
    event_ids: RwLock<std::collections::HashSet<String>>,
}

impl InMemoryConsumerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a consumer profile ahead of processing (birth date, VIP flag,
    /// tags). Tests and bootstrapping use this; the engine never needs it.
    pub fn seed_consumer(&self, consumer: Consumer) {
        self.consumers.write().unwrap().insert(consumer.consumer_id.clone(), consumer);
    }
}

#[async_trait]
impl ConsumerStore for InMemoryConsumerStore {
    async fn get_consumer(&self, consumer_id: &str) -> Result<Option<Consumer>> {
        Ok(self.consumers.read().unwrap().get(consumer_id).cloned())
    }

    async fn get_balance(&self, consumer_id: &str) -> Result<Balance> {
        if let Some(consumer) = self.consumers.read().unwrap().get(consumer_id) {
            return Ok(consumer.balance);
        }
        let mut consumers = self.consumers.write().unwrap();
        let consumer = consumers
            .entry(consumer_id.to_string())
            .or_insert_with(|| Consumer::fresh(consumer_id, Market::Hk));
        Ok(consumer.balance)
    }

    async fn update_balance(&self, consumer_id: &str, balance: Balance) -> Result<()> {
        let mut consumers = self.consumers.write().unwrap();
        let consumer = consumers
            .entry(consumer_id.to_string())
            .or_insert_with(|| Consumer::fresh(consumer_id, Market::Hk));
        consumer.balance = balance;
        Ok(())
    }

    async fn append_history(&self, event: HistoryEvent) -> Result<()> {
        let mut event_ids = self.event_ids.write().unwrap();
        if !event_ids.insert(event.event_id.clone()) {
            return Err(Error::Store(format!("event `{}` already recorded", event.event_id)));
        }
        drop(event_ids);

        self.consumers
            .write()
            .unwrap()
            .entry(event.consumer_id.clone())
            .or_insert_with(|| Consumer::fresh(&event.consumer_id, event.market));

        self.history
            .write()
            .unwrap()
            .entry(event.consumer_id.clone())
            .or_default()
            .push(event);
        Ok(())
    }

    async fn has_event(&self, event_id: &str) -> Result<bool> {
        Ok(self.event_ids.read().unwrap().contains(event_id))
    }

    async fn query_history(&self, consumer_id: &str) -> Result<Vec<HistoryEvent>> {
        Ok(self.history.read().unwrap().get(consumer_id).cloned().unwrap_or_default())
    }
}
