// crates/policy-store-core/src/interfaces.rs
// ============================================================================
// Module: Policy Store Interfaces
// Description: Backend-agnostic adapter contract consumed by decision engines.
// Purpose: Define the persistence surface for policy rules.
// Dependencies: crate::model
// ============================================================================

//! ## Overview
//! [`PolicyAdapter`] is the storage contract a decision engine calls into:
//! wholesale load and save, plus incremental add and remove for live policy
//! changes. Every write is all-or-nothing; backends never partially commit.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use thiserror::Error;

use crate::model::PolicyModel;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Policy adapter errors.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// Backend reported an error while querying or writing.
    #[error("policy adapter db error: {0}")]
    Db(String),
    /// Stored data could not be reconstructed into a rule.
    #[error("policy adapter corrupt data: {0}")]
    Corrupt(String),
    /// Caller supplied a rule the adapter cannot represent.
    #[error("policy adapter invalid rule: {0}")]
    Invalid(String),
    /// Operation is not supported by this adapter.
    #[error("not implemented: {0}")]
    Unsupported(String),
}

// ============================================================================
// SECTION: Adapter
// ============================================================================

/// Persistence backend for an engine's policy rules.
pub trait PolicyAdapter {
    /// Loads every stored rule into `model` through the policy-line parser.
    ///
    /// A full load supersedes any earlier filtered load. On failure the model
    /// may be partially populated.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError`] on the first query or reconstruction failure.
    fn load_policy(&self, model: &mut PolicyModel) -> Result<(), AdapterError>;

    /// Replaces all stored rules with the `p` and `g` sections of `model`.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError`] when any step fails; stored rules are left as
    /// they were.
    fn save_policy(&self, model: &PolicyModel) -> Result<(), AdapterError>;

    /// Adds one rule. Adding an existing rule is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError`] when the rule is invalid or the write fails.
    fn add_policy(&self, sec: &str, ptype: &str, rule: &[String]) -> Result<(), AdapterError>;

    /// Adds a batch of rules, skipping those that already exist.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError`] when any rule is invalid or the write fails.
    fn add_policies(
        &self,
        sec: &str,
        ptype: &str,
        rules: &[Vec<String>],
    ) -> Result<(), AdapterError>;

    /// Removes one rule. Removing a missing rule is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError`] when the rule is invalid or the delete fails.
    fn remove_policy(&self, sec: &str, ptype: &str, rule: &[String]) -> Result<(), AdapterError>;

    /// Removes a batch of rules.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError`] when any rule is invalid or the delete fails.
    fn remove_policies(
        &self,
        sec: &str,
        ptype: &str,
        rules: &[Vec<String>],
    ) -> Result<(), AdapterError>;

    /// Removes rules matching a partial field pattern.
    ///
    /// # Errors
    ///
    /// Adapters that cannot filter return [`AdapterError::Unsupported`].
    fn remove_filtered_policy(
        &self,
        sec: &str,
        ptype: &str,
        field_index: usize,
        field_values: &[String],
    ) -> Result<(), AdapterError>;

    /// Reports whether the last load was filtered.
    fn is_filtered(&self) -> bool;
}

// ============================================================================
// SECTION: Shared Adapter Wrapper
// ============================================================================

/// Shared policy adapter backed by an `Arc` trait object.
#[derive(Clone)]
pub struct SharedPolicyAdapter {
    /// Inner adapter implementation.
    inner: Arc<dyn PolicyAdapter + Send + Sync>,
}

impl SharedPolicyAdapter {
    /// Wraps an adapter in a shared, clonable wrapper.
    #[must_use]
    pub fn from_adapter(adapter: impl PolicyAdapter + Send + Sync + 'static) -> Self {
        Self {
            inner: Arc::new(adapter),
        }
    }

    /// Wraps an existing shared adapter.
    #[must_use]
    pub const fn new(adapter: Arc<dyn PolicyAdapter + Send + Sync>) -> Self {
        Self {
            inner: adapter,
        }
    }
}

impl PolicyAdapter for SharedPolicyAdapter {
    fn load_policy(&self, model: &mut PolicyModel) -> Result<(), AdapterError> {
        self.inner.load_policy(model)
    }

    fn save_policy(&self, model: &PolicyModel) -> Result<(), AdapterError> {
        self.inner.save_policy(model)
    }

    fn add_policy(&self, sec: &str, ptype: &str, rule: &[String]) -> Result<(), AdapterError> {
        self.inner.add_policy(sec, ptype, rule)
    }

    fn add_policies(
        &self,
        sec: &str,
        ptype: &str,
        rules: &[Vec<String>],
    ) -> Result<(), AdapterError> {
        self.inner.add_policies(sec, ptype, rules)
    }

    fn remove_policy(&self, sec: &str, ptype: &str, rule: &[String]) -> Result<(), AdapterError> {
        self.inner.remove_policy(sec, ptype, rule)
    }

    fn remove_policies(
        &self,
        sec: &str,
        ptype: &str,
        rules: &[Vec<String>],
    ) -> Result<(), AdapterError> {
        self.inner.remove_policies(sec, ptype, rules)
    }

    fn remove_filtered_policy(
        &self,
        sec: &str,
        ptype: &str,
        field_index: usize,
        field_values: &[String],
    ) -> Result<(), AdapterError> {
        self.inner.remove_filtered_policy(sec, ptype, field_index, field_values)
    }

    fn is_filtered(&self) -> bool {
        self.inner.is_filtered()
    }
}
