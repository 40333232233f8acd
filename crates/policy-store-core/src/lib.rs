// crates/policy-store-core/src/lib.rs
// ============================================================================
// Module: Policy Store Core Library
// Description: Public API surface for the policy store core.
// Purpose: Expose rule records, the policy model, and the adapter contract.
// Dependencies: crate::{record, model, interfaces, memory}
// ============================================================================

//! ## Overview
//! Policy store core defines how authorization rules are represented when they
//! leave an access-control engine's in-memory model and land in durable
//! storage. Rules are addressed by a deterministic content-derived identifier
//! so repeated writes converge instead of duplicating. Storage backends
//! implement [`PolicyAdapter`]; [`InMemoryPolicyAdapter`] is provided for tests
//! and local demos.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod interfaces;
pub mod memory;
pub mod model;
pub mod record;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use interfaces::AdapterError;
pub use interfaces::PolicyAdapter;
pub use interfaces::SharedPolicyAdapter;
pub use memory::InMemoryPolicyAdapter;
pub use model::PERSISTED_SECTIONS;
pub use model::PolicyModel;
pub use model::load_policy_line;
pub use record::FIELD_COUNT;
pub use record::RuleFields;
pub use record::RuleRecord;
pub use record::rule_id;
