// crates/policy-store-postgres/src/lib.rs
// ============================================================================
// Module: Policy Store Postgres
// Description: Postgres persistence backend for policy rules.
// Purpose: Implement the policy adapter contract over one relational table.
// Dependencies: postgres, r2d2, r2d2_postgres, policy-store-core
// ============================================================================

//! ## Overview
//! Stores engine policy rules in a single Postgres table keyed by a
//! content-derived rule id. Bulk writes are expressed as interpolated
//! multi-row inserts so duplicate rules can be skipped in one round trip.
//!
//! ```no_run
//! use policy_store_core::PolicyAdapter;
//! use policy_store_core::PolicyModel;
//! use policy_store_postgres::PostgresAdapterConfig;
//! use policy_store_postgres::PostgresPolicyStore;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = PostgresPolicyStore::new(&PostgresAdapterConfig::default())?;
//! store.add_policy("p", "p", &["alice".to_string(), "data1".to_string(), "read".to_string()])?;
//! let mut model = PolicyModel::new();
//! store.load_policy(&mut model)?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod bulk;
pub mod config;
pub mod schema;
pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use bulk::BulkExecutor;
pub use bulk::BulkInsertError;
pub use bulk::Dialect;
pub use bulk::InsertStatement;
pub use bulk::ON_CONFLICT_DO_NOTHING;
pub use bulk::Postgres;
pub use bulk::StatementRunner;
pub use config::ConfigError;
pub use config::PostgresAdapterConfig;
pub use store::PostgresAdapterError;
pub use store::PostgresPolicyStore;
pub use store::shared_postgres_adapter;
