//! Hot-reloadable rule catalog: the active catalog is swapped atomically
//! under a pointer, never mutated in place.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use loyalty_core::{parse_rule_file, Rule};

use crate::error::{Error, Result};

/// Source of the active rule catalog. `reload` takes already-parsed rules so
/// callers can source them from a file, a config-management push, or a test
/// fixture without this trait caring which. Loading rules from disk or a
/// config-management push is an external collaborator's job, not this
/// crate's concern.
#[async_trait]
pub trait RuleLoader: Send + Sync {
    fn rules(&self) -> Arc<Vec<Rule>>;

    async fn reload(&self, rules: Vec<Rule>) -> Result<()>;
}

/// Holds the active catalog behind an `RwLock<Arc<_>>`: readers clone the
/// `Arc` under a brief read lock and evaluate against a stable snapshot,
/// while a reload swaps the pointer under a brief write lock. In-flight
/// evaluations keep running against whichever catalog they already cloned.
#[derive(Debug)]
pub struct InMemoryRuleLoader {
    rules: RwLock<Arc<Vec<Rule>>>,
}

impl InMemoryRuleLoader {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules: RwLock::new(Arc::new(rules)) }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Parse and install a rule file's contents in one step.
    pub fn load_from_str(text: &str) -> Result<Self> {
        let rules = parse_rule_file(text).map_err(|e| Error::Validation(e.to_string()))?;
        Ok(Self::new(rules))
    }
}

#[async_trait]
impl RuleLoader for InMemoryRuleLoader {
    fn rules(&self) -> Arc<Vec<Rule>> {
        self.rules.read().unwrap().clone()
    }

    async fn reload(&self, rules: Vec<Rule>) -> Result<()> {
        *self.rules.write().unwrap() = Arc::new(rules);
        Ok(())
    }
}
