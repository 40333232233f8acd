// crates/policy-store-postgres/src/store.rs
// ============================================================================
// Module: Postgres Policy Store
// Description: Postgres-backed PolicyAdapter over a single rules table.
// Purpose: Persist engine policy rules durably with all-or-nothing writes.
// Dependencies: postgres, r2d2, r2d2_postgres, tracing, policy-store-core
// ============================================================================

//! ## Overview
//! [`PostgresPolicyStore`] borrows one pooled session per call. Every write
//! runs inside its own transaction; a transaction that is dropped without an
//! explicit commit rolls back, so early returns leave the table unchanged.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::time::Duration;

use policy_store_core::AdapterError;
use policy_store_core::PERSISTED_SECTIONS;
use policy_store_core::PolicyAdapter;
use policy_store_core::PolicyModel;
use policy_store_core::RuleFields;
use policy_store_core::RuleRecord;
use policy_store_core::SharedPolicyAdapter;
use policy_store_core::load_policy_line;
use postgres::NoTls;
use postgres::Row;
use postgres::error::SqlState;
use r2d2::Pool;
use r2d2::PooledConnection;
use r2d2_postgres::PostgresConnectionManager;
use thiserror::Error;
use tracing::debug;
use tracing::info;

use crate::bulk::BulkExecutor;
use crate::bulk::BulkInsertError;
use crate::bulk::InsertStatement;
use crate::bulk::ON_CONFLICT_DO_NOTHING;
use crate::bulk::Postgres;
use crate::config::PostgresAdapterConfig;
use crate::schema::RULE_COLUMNS;
use crate::schema::RuleStatements;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Pooled Postgres connection manager.
type Manager = PostgresConnectionManager<NoTls>;

/// Postgres adapter errors raised while constructing the store.
#[derive(Debug, Error)]
pub enum PostgresAdapterError {
    /// Postgres or pool error.
    #[error("postgres adapter error: {0}")]
    Postgres(String),
    /// Invalid configuration.
    #[error("postgres adapter invalid config: {0}")]
    Invalid(String),
}

impl From<PostgresAdapterError> for AdapterError {
    fn from(error: PostgresAdapterError) -> Self {
        match error {
            PostgresAdapterError::Postgres(message) => Self::Db(message),
            PostgresAdapterError::Invalid(message) => Self::Invalid(message),
        }
    }
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// Postgres-backed policy adapter.
pub struct PostgresPolicyStore {
    /// Connection pool for Postgres access.
    pool: Option<Pool<Manager>>,
    /// Statements bound to the configured rules table.
    statements: RuleStatements,
    /// Whether the last load was filtered.
    filtered: AtomicBool,
}

impl Drop for PostgresPolicyStore {
    fn drop(&mut self) {
        if let Some(pool) = self.pool.take() {
            let _ = std::thread::spawn(move || drop(pool));
        }
    }
}

impl PostgresPolicyStore {
    /// Connects to Postgres and ensures the rules table exists.
    ///
    /// # Errors
    ///
    /// Returns [`PostgresAdapterError`] when the config is invalid, the pool
    /// cannot connect, or the table cannot be created.
    pub fn new(config: &PostgresAdapterConfig) -> Result<Self, PostgresAdapterError> {
        config.validate().map_err(|err| PostgresAdapterError::Invalid(err.to_string()))?;
        let manager = PostgresConnectionManager::new(pg_config(config)?, NoTls);
        let pool = Pool::builder()
            .max_size(config.max_connections)
            .connection_timeout(Duration::from_millis(config.connect_timeout_ms))
            .build(manager)
            .map_err(|err| PostgresAdapterError::Postgres(err.to_string()))?;
        let store = Self::from_pool(pool, config);
        store.bootstrap()?;
        Ok(store)
    }

    /// Wraps an existing pool without touching the database.
    fn from_pool(pool: Pool<Manager>, config: &PostgresAdapterConfig) -> Self {
        Self {
            pool: Some(pool),
            statements: RuleStatements::new(&Postgres, &config.schema, &config.table),
            filtered: AtomicBool::new(false),
        }
    }

    /// Returns the fully qualified rules table name.
    #[must_use]
    pub fn table_name(&self) -> String {
        format!("{}.{}", self.statements.schema, self.statements.table)
    }

    /// Creates the rules table, treating an existing table as success.
    fn bootstrap(&self) -> Result<(), PostgresAdapterError> {
        let mut conn = self
            .pool
            .as_ref()
            .ok_or_else(|| PostgresAdapterError::Postgres("postgres adapter closed".to_string()))?
            .get()
            .map_err(|err| PostgresAdapterError::Postgres(err.to_string()))?;
        match conn.batch_execute(&self.statements.create_table) {
            Ok(()) => {
                info!(table = %self.table_name(), "created policy rules table");
                Ok(())
            }
            Err(err) if err.code() == Some(&SqlState::DUPLICATE_TABLE) => {
                debug!(table = %self.table_name(), "policy rules table already exists");
                Ok(())
            }
            Err(err) => Err(PostgresAdapterError::Postgres(err.to_string())),
        }
    }

    /// Borrows a pooled session.
    fn connection(&self) -> Result<PooledConnection<Manager>, AdapterError> {
        self.pool
            .as_ref()
            .ok_or_else(|| AdapterError::Db("postgres adapter closed".to_string()))?
            .get()
            .map_err(|err| AdapterError::Db(err.to_string()))
    }

    /// Builds one multi-row insert covering `records`.
    fn insert_statement(
        &self,
        records: &[RuleRecord],
    ) -> Result<InsertStatement<Postgres>, BulkInsertError> {
        let mut stmt = InsertStatement::new(
            Postgres,
            &self.statements.schema,
            &self.statements.table,
            &RULE_COLUMNS,
        );
        for record in records {
            stmt.record(record)?;
        }
        Ok(stmt)
    }
}

impl PolicyAdapter for PostgresPolicyStore {
    fn load_policy(&self, model: &mut PolicyModel) -> Result<(), AdapterError> {
        let mut conn = self.connection()?;
        let rows = conn.query(self.statements.select_all.as_str(), &[]).map_err(db_error)?;
        for row in &rows {
            let record = record_from_row(row)?;
            load_policy_line(&record.policy_line(), model)?;
        }
        self.filtered.store(false, Ordering::SeqCst);
        debug!(rules = rows.len(), table = %self.table_name(), "loaded policy rules");
        Ok(())
    }

    fn save_policy(&self, model: &PolicyModel) -> Result<(), AdapterError> {
        let mut records = Vec::with_capacity(model.rule_count());
        for sec in PERSISTED_SECTIONS {
            for (ptype, rules) in model.section(sec) {
                for rule in rules {
                    records.push(RuleRecord::from_rule(ptype, rule)?);
                }
            }
        }
        let stmt = if records.is_empty() { None } else { Some(self.insert_statement(&records)?) };

        let mut conn = self.connection()?;
        let mut tx = conn.transaction().map_err(db_error)?;
        let removed = tx.execute(self.statements.delete_all.as_str(), &[]).map_err(db_error)?;
        if let Some(stmt) = &stmt {
            BulkExecutor::new(&mut tx).insert(stmt)?;
        }
        tx.commit().map_err(commit_error)?;
        info!(removed, saved = records.len(), table = %self.table_name(), "replaced policy rules");
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
        if rules.is_empty() {
            return Ok(());
        }
        let records = rules
            .iter()
            .map(|rule| RuleRecord::from_rule(ptype, rule))
            .collect::<Result<Vec<_>, _>>()?;
        let stmt = self.insert_statement(&records)?;

        let mut conn = self.connection()?;
        let mut tx = conn.transaction().map_err(db_error)?;
        let inserted =
            BulkExecutor::new(&mut tx).insert_with_suffix(&stmt, ON_CONFLICT_DO_NOTHING)?;
        tx.commit().map_err(commit_error)?;
        debug!(ptype, requested = records.len(), inserted, "added policy rules");
        Ok(())
    }

    fn remove_policy(&self, _sec: &str, ptype: &str, rule: &[String]) -> Result<(), AdapterError> {
        let record = RuleRecord::from_rule(ptype, rule)?;

        let mut conn = self.connection()?;
        let mut tx = conn.transaction().map_err(db_error)?;
        let removed =
            tx.execute(self.statements.delete_by_id.as_str(), &[&record.id]).map_err(db_error)?;
        tx.commit().map_err(commit_error)?;
        debug!(ptype, removed, "removed policy rule");
        Ok(())
    }

    fn remove_policies(
        &self,
        _sec: &str,
        ptype: &str,
        rules: &[Vec<String>],
    ) -> Result<(), AdapterError> {
        if rules.is_empty() {
            return Ok(());
        }
        let ids = rules
            .iter()
            .map(|rule| RuleRecord::from_rule(ptype, rule).map(|record| record.id))
            .collect::<Result<Vec<_>, _>>()?;

        let mut conn = self.connection()?;
        let mut tx = conn.transaction().map_err(db_error)?;
        let removed =
            tx.execute(self.statements.delete_by_ids.as_str(), &[&ids]).map_err(db_error)?;
        tx.commit().map_err(commit_error)?;
        debug!(ptype, requested = ids.len(), removed, "removed policy rules");
        Ok(())
    }

    fn remove_filtered_policy(
        &self,
        _sec: &str,
        ptype: &str,
        field_index: usize,
        _field_values: &[String],
    ) -> Result<(), AdapterError> {
        debug!(ptype, field_index, "filtered policy removal is not supported");
        Err(AdapterError::Unsupported("remove filtered policy".to_string()))
    }

    fn is_filtered(&self) -> bool {
        self.filtered.load(Ordering::SeqCst)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Builds the driver configuration with connect and statement timeouts.
fn pg_config(config: &PostgresAdapterConfig) -> Result<postgres::Config, PostgresAdapterError> {
    let mut pg_config = config
        .connection
        .parse::<postgres::Config>()
        .map_err(|err| PostgresAdapterError::Postgres(err.to_string()))?;
    pg_config.connect_timeout(Duration::from_millis(config.connect_timeout_ms));
    let options = format!("-c statement_timeout={}", config.statement_timeout_ms);
    pg_config.options(&options);
    Ok(pg_config)
}

/// Rebuilds a rule record from a selected row.
fn record_from_row(row: &Row) -> Result<RuleRecord, AdapterError> {
    let column = |idx: usize| {
        row.try_get::<_, String>(idx).map_err(|err| {
            AdapterError::Corrupt(format!("rules column {}: {err}", RULE_COLUMNS[idx]))
        })
    };
    let id = column(0)?;
    let ptype = column(1)?;
    let mut fields = RuleFields::default();
    for (offset, slot) in fields.iter_mut().enumerate() {
        *slot = column(offset + 2)?;
    }
    Ok(RuleRecord::from_row(id, ptype, fields))
}

/// Maps a driver error to an adapter error.
fn db_error(err: postgres::Error) -> AdapterError {
    AdapterError::Db(err.to_string())
}

/// Maps a commit failure, naming the step.
fn commit_error(err: postgres::Error) -> AdapterError {
    AdapterError::Db(format!("commit transaction: {err}"))
}

/// Builds a shared policy adapter backed by Postgres.
///
/// # Errors
///
/// Returns [`PostgresAdapterError`] when initialization fails.
pub fn shared_postgres_adapter(
    config: &PostgresAdapterConfig,
) -> Result<SharedPolicyAdapter, PostgresAdapterError> {
    let store = Arc::new(PostgresPolicyStore::new(config)?);
    Ok(SharedPolicyAdapter::new(store))
}
