// crates/policy-store-core/src/memory.rs
// ============================================================================
// Module: In-Memory Policy Adapter
// Description: Simple in-memory policy adapter for tests and examples.
// Purpose: Provide a deterministic adapter implementation without a database.
// Dependencies: crate::{interfaces, model, record}, tracing
// ============================================================================

//! ## Overview
//! This module provides an in-memory implementation of [`PolicyAdapter`] that
//! mirrors the relational table's constraints: the derived id is the primary
//! key and the six fields are unique regardless of rule type. It is not
//! intended for production use.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use tracing::debug;

use crate::interfaces::AdapterError;
use crate::interfaces::PolicyAdapter;
use crate::model::PERSISTED_SECTIONS;
use crate::model::PolicyModel;
use crate::model::load_policy_line;
use crate::record::RuleRecord;

// ============================================================================
// SECTION: In-Memory Adapter
// ============================================================================

/// Rows keyed by derived rule id.
type RuleTable = BTreeMap<String, RuleRecord>;

/// In-memory policy adapter for tests and examples.
#[derive(Debug, Default, Clone)]
pub struct InMemoryPolicyAdapter {
    /// Rule rows protected by a mutex.
    rows: Arc<Mutex<RuleTable>>,
    /// Whether the last load was filtered.
    filtered: Arc<AtomicBool>,
}

impl InMemoryPolicyAdapter {
    /// Creates an empty in-memory adapter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of the stored rows ordered by id.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Db`] when the row mutex is poisoned.
    pub fn records(&self) -> Result<Vec<RuleRecord>, AdapterError> {
        Ok(self.lock()?.values().cloned().collect())
    }

    /// Locks the row table.
    fn lock(&self) -> Result<MutexGuard<'_, RuleTable>, AdapterError> {
        self.rows
            .lock()
            .map_err(|_| AdapterError::Db("policy adapter mutex poisoned".to_string()))
    }
}

impl PolicyAdapter for InMemoryPolicyAdapter {
    fn load_policy(&self, model: &mut PolicyModel) -> Result<(), AdapterError> {
        for record in self.records()? {
            load_policy_line(&record.policy_line(), model)?;
        }
        self.filtered.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn save_policy(&self, model: &PolicyModel) -> Result<(), AdapterError> {
        let mut staged = RuleTable::new();
        for sec in PERSISTED_SECTIONS {
            for (ptype, rules) in model.section(sec) {
                for rule in rules {
                    insert_strict(&mut staged, RuleRecord::from_rule(ptype, rule)?)?;
                }
            }
        }
        debug!(rules = staged.len(), "replaced in-memory policy rules");
        *self.lock()? = staged;
        Ok(())
    }

    fn add_policy(&self, sec: &str, ptype: &str, rule: &[String]) -> Result<(), AdapterError> {
        self.add_policies(sec, ptype, &[rule.to_vec()])
    }

    fn add_policies(
        &self,
        _sec: &str,
        ptype: &str,
        rules: &[Vec<String>],
    ) -> Result<(), AdapterError> {
        let records =
            rules.iter().map(|rule| RuleRecord::from_rule(ptype, rule)).collect::<Result<Vec<_>, _>>()?;
        let mut guard = self.lock()?;
        for record in records {
            if !conflicts(&guard, &record) {
                guard.insert(record.id.clone(), record);
            }
        }
        drop(guard);
        Ok(())
    }

    fn remove_policy(&self, sec: &str, ptype: &str, rule: &[String]) -> Result<(), AdapterError> {
        self.remove_policies(sec, ptype, &[rule.to_vec()])
    }

    fn remove_policies(
        &self,
        _sec: &str,
        ptype: &str,
        rules: &[Vec<String>],
    ) -> Result<(), AdapterError> {
        let ids = rules
            .iter()
            .map(|rule| RuleRecord::from_rule(ptype, rule).map(|record| record.id))
            .collect::<Result<Vec<_>, _>>()?;
        let mut guard = self.lock()?;
        for id in ids {
            guard.remove(&id);
        }
        drop(guard);
        Ok(())
    }

    fn remove_filtered_policy(
        &self,
        _sec: &str,
        _ptype: &str,
        _field_index: usize,
        _field_values: &[String],
    ) -> Result<(), AdapterError> {
        Err(AdapterError::Unsupported("remove filtered policy".to_string()))
    }

    fn is_filtered(&self) -> bool {
        self.filtered.load(Ordering::SeqCst)
    }
}

/// Returns `true` when `record` collides with a stored id or field tuple.
fn conflicts(table: &RuleTable, record: &RuleRecord) -> bool {
    table.contains_key(&record.id) || table.values().any(|row| row.fields == record.fields)
}

/// Inserts a row, failing on any uniqueness violation.
fn insert_strict(table: &mut RuleTable, record: RuleRecord) -> Result<(), AdapterError> {
    if conflicts(table, &record) {
        return Err(AdapterError::Db(format!(
            "duplicate key violates unique constraint for rule {}",
            record.policy_line()
        )));
    }
    table.insert(record.id.clone(), record);
    Ok(())
}
