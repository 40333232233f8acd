// crates/policy-store-postgres/src/bulk.rs
// ============================================================================
// Module: Bulk Statement Executor
// Description: Multi-row inserts with a trailing conflict clause.
// Purpose: Express idempotent batch inserts as one interpolated statement.
// Dependencies: postgres, policy-store-core
// ============================================================================

//! ## Overview
//! Bound parameters cannot be followed by clauses the driver does not know
//! about, and large batches would exceed the bind parameter limit, so inserts
//! are interpolated into literal SQL first and the suffix (for example
//! [`ON_CONFLICT_DO_NOTHING`]) is appended to the final text. Execution goes
//! through [`StatementRunner`], implemented by both transactions and plain
//! clients.
//!
//! Invariants:
//! - Values are only ever emitted through [`Dialect::encode_string`].
//! - Errors are returned unchanged; nothing is retried.

// ============================================================================
// SECTION: Imports
// ============================================================================

use policy_store_core::AdapterError;
use policy_store_core::RuleRecord;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Suffix skipping rows that violate any unique constraint.
pub const ON_CONFLICT_DO_NOTHING: &str = "ON CONFLICT DO NOTHING";
/// Placeholder emitted while building, replaced during interpolation.
const PLACEHOLDER: char = '?';

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Bulk insert errors.
#[derive(Debug, Error)]
pub enum BulkInsertError {
    /// Statement could not be built or interpolated.
    #[error("bulk insert interpolation error: {0}")]
    Interpolate(String),
    /// Database rejected the statement.
    #[error("bulk insert execution error: {0}")]
    Execute(#[from] postgres::Error),
}

impl From<BulkInsertError> for AdapterError {
    fn from(error: BulkInsertError) -> Self {
        match error {
            BulkInsertError::Interpolate(message) => Self::Invalid(message),
            BulkInsertError::Execute(err) => Self::Db(err.to_string()),
        }
    }
}

// ============================================================================
// SECTION: Dialect
// ============================================================================

/// SQL dialect rules for quoting identifiers and encoding literals.
pub trait Dialect {
    /// Quotes an identifier.
    fn quote_ident(&self, ident: &str) -> String;

    /// Encodes a string as a SQL literal.
    ///
    /// # Errors
    ///
    /// Returns [`BulkInsertError::Interpolate`] when the value cannot be
    /// represented as a literal.
    fn encode_string(&self, value: &str) -> Result<String, BulkInsertError>;
}

/// Postgres dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct Postgres;

impl Dialect for Postgres {
    fn quote_ident(&self, ident: &str) -> String {
        format!("\"{}\"", ident.replace('"', "\"\""))
    }

    fn encode_string(&self, value: &str) -> Result<String, BulkInsertError> {
        if value.contains('\0') {
            return Err(BulkInsertError::Interpolate(
                "string literal contains a NUL byte".to_string(),
            ));
        }
        let escaped = value.replace('\'', "''");
        // E'' form keeps backslashes literal whatever standard_conforming_strings says.
        if escaped.contains('\\') {
            Ok(format!("E'{}'", escaped.replace('\\', "\\\\")))
        } else {
            Ok(format!("'{escaped}'"))
        }
    }
}

// ============================================================================
// SECTION: Insert Statement
// ============================================================================

/// Multi-row insert into one table.
#[derive(Debug, Clone)]
pub struct InsertStatement<D> {
    /// Dialect used to build and interpolate the statement.
    dialect: D,
    /// Target schema.
    schema: String,
    /// Target table.
    table: String,
    /// Column list.
    columns: Vec<String>,
    /// Value rows, each as wide as `columns`.
    rows: Vec<Vec<String>>,
}

impl<D: Dialect> InsertStatement<D> {
    /// Starts an insert into `schema.table` with the given columns.
    #[must_use]
    pub fn new(dialect: D, schema: &str, table: &str, columns: &[&str]) -> Self {
        Self {
            dialect,
            schema: schema.to_string(),
            table: table.to_string(),
            columns: columns.iter().map(ToString::to_string).collect(),
            rows: Vec::new(),
        }
    }

    /// Appends a value row.
    ///
    /// # Errors
    ///
    /// Returns [`BulkInsertError::Interpolate`] when the row width does not
    /// match the column list.
    pub fn values(&mut self, row: Vec<String>) -> Result<&mut Self, BulkInsertError> {
        if row.len() != self.columns.len() {
            return Err(BulkInsertError::Interpolate(format!(
                "insert row has {} values for {} columns",
                row.len(),
                self.columns.len()
            )));
        }
        self.rows.push(row);
        Ok(self)
    }

    /// Appends a rule record in `id, ptype, v0..v5` order.
    ///
    /// # Errors
    ///
    /// Returns [`BulkInsertError::Interpolate`] when the statement was not
    /// started with the rule columns.
    pub fn record(&mut self, record: &RuleRecord) -> Result<&mut Self, BulkInsertError> {
        self.values(record.column_values().into_iter().map(str::to_string).collect())
    }

    /// Returns the number of value rows.
    #[must_use]
    pub const fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Writes the statement with placeholders into `buf`.
    ///
    /// # Errors
    ///
    /// Returns [`BulkInsertError::Interpolate`] when there are no columns or
    /// no rows.
    pub fn build(&self, buf: &mut StatementBuffer) -> Result<(), BulkInsertError> {
        if self.columns.is_empty() {
            return Err(BulkInsertError::Interpolate("insert has no columns".to_string()));
        }
        if self.rows.is_empty() {
            return Err(BulkInsertError::Interpolate("insert has no values".to_string()));
        }
        let columns = self
            .columns
            .iter()
            .map(|column| self.dialect.quote_ident(column))
            .collect::<Vec<_>>()
            .join(", ");
        let tuple = format!("({})", vec![PLACEHOLDER.to_string(); self.columns.len()].join(", "));
        buf.sql.push_str(&format!(
            "INSERT INTO {}.{} ({columns}) VALUES ",
            self.dialect.quote_ident(&self.schema),
            self.dialect.quote_ident(&self.table)
        ));
        for (idx, row) in self.rows.iter().enumerate() {
            if idx > 0 {
                buf.sql.push_str(", ");
            }
            buf.sql.push_str(&tuple);
            buf.values.extend(row.iter().cloned());
        }
        Ok(())
    }
}

/// SQL text with `?` placeholders plus the values bound to them.
#[derive(Debug, Clone, Default)]
pub struct StatementBuffer {
    /// Statement text.
    pub sql: String,
    /// Placeholder values in order of appearance.
    pub values: Vec<String>,
}

// ============================================================================
// SECTION: Interpolation
// ============================================================================

/// Builds `stmt` and substitutes every placeholder with a literal.
///
/// # Errors
///
/// Returns [`BulkInsertError::Interpolate`] when building or encoding fails.
pub fn interpolate<D: Dialect>(stmt: &InsertStatement<D>) -> Result<String, BulkInsertError> {
    let mut buf = StatementBuffer::default();
    stmt.build(&mut buf)?;
    interpolate_for_dialect(&buf.sql, &buf.values, &stmt.dialect)
}

/// Replaces `?` placeholders outside quoted sections with encoded values.
///
/// # Errors
///
/// Returns [`BulkInsertError::Interpolate`] when placeholder and value
/// counts differ or a value cannot be encoded.
pub fn interpolate_for_dialect(
    query: &str,
    values: &[String],
    dialect: &impl Dialect,
) -> Result<String, BulkInsertError> {
    let mut out = String::with_capacity(query.len() + values.iter().map(|v| v.len() + 2).sum::<usize>());
    let mut remaining = values.iter();
    let mut quote: Option<char> = None;
    for ch in query.chars() {
        match (quote, ch) {
            (None, PLACEHOLDER) => {
                let value = remaining.next().ok_or_else(|| {
                    BulkInsertError::Interpolate("more placeholders than values".to_string())
                })?;
                out.push_str(&dialect.encode_string(value)?);
                continue;
            }
            (None, '\'' | '"') => quote = Some(ch),
            (Some(open), _) if ch == open => quote = None,
            _ => {}
        }
        out.push(ch);
    }
    if remaining.next().is_some() {
        return Err(BulkInsertError::Interpolate("more values than placeholders".to_string()));
    }
    Ok(out)
}

// ============================================================================
// SECTION: Runner
// ============================================================================

/// Anything that can execute a raw SQL statement.
pub trait StatementRunner {
    /// Executes `sql` and returns the affected row count.
    ///
    /// # Errors
    ///
    /// Returns the driver error unchanged.
    fn execute_raw(&mut self, sql: &str) -> Result<u64, postgres::Error>;
}

impl StatementRunner for postgres::Transaction<'_> {
    fn execute_raw(&mut self, sql: &str) -> Result<u64, postgres::Error> {
        self.execute(sql, &[])
    }
}

impl StatementRunner for postgres::Client {
    fn execute_raw(&mut self, sql: &str) -> Result<u64, postgres::Error> {
        self.execute(sql, &[])
    }
}

// ============================================================================
// SECTION: Executor
// ============================================================================

/// Executes interpolated inserts through the active runner.
pub struct BulkExecutor<'r> {
    /// Transaction or session the statements run on.
    runner: &'r mut dyn StatementRunner,
}

impl<'r> BulkExecutor<'r> {
    /// Wraps the active transaction or session.
    #[must_use]
    pub const fn new(runner: &'r mut dyn StatementRunner) -> Self {
        Self {
            runner,
        }
    }

    /// Executes `stmt` as-is.
    ///
    /// # Errors
    ///
    /// Returns the first interpolation or execution error.
    pub fn insert<D: Dialect>(&mut self, stmt: &InsertStatement<D>) -> Result<u64, BulkInsertError> {
        let raw = interpolate(stmt)?;
        Ok(self.runner.execute_raw(&raw)?)
    }

    /// Executes `stmt` with `suffix` appended after interpolation.
    ///
    /// # Errors
    ///
    /// Returns the first interpolation or execution error.
    pub fn insert_with_suffix<D: Dialect>(
        &mut self,
        stmt: &InsertStatement<D>,
        suffix: &str,
    ) -> Result<u64, BulkInsertError> {
        let raw = interpolate(stmt)?;
        Ok(self.runner.execute_raw(&format!("{raw} {suffix}"))?)
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used, reason = "Unit tests use expect for setup clarity.")]

    use policy_store_core::RuleRecord;

    use super::BulkExecutor;
    use super::BulkInsertError;
    use super::Dialect;
    use super::InsertStatement;
    use super::ON_CONFLICT_DO_NOTHING;
    use super::Postgres;
    use super::StatementRunner;
    use super::interpolate;
    use super::interpolate_for_dialect;
    use crate::schema::RULE_COLUMNS;

    /// Runner that records statements instead of executing them.
    #[derive(Default)]
    struct RecordingRunner {
        /// Statements received in order.
        statements: Vec<String>,
    }

    impl StatementRunner for RecordingRunner {
        fn execute_raw(&mut self, sql: &str) -> Result<u64, postgres::Error> {
            self.statements.push(sql.to_string());
            Ok(1)
        }
    }

    /// Owned values from string slices.
    fn owned(values: &[&str]) -> Vec<String> {
        values.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn postgres_encodes_quotes_and_backslashes() {
        assert_eq!(Postgres.encode_string("alice").expect("plain"), "'alice'");
        assert_eq!(Postgres.encode_string("o'brien").expect("quote"), "'o''brien'");
        assert_eq!(Postgres.encode_string("a\\b").expect("backslash"), "E'a\\\\b'");
        assert!(matches!(Postgres.encode_string("a\0b"), Err(BulkInsertError::Interpolate(_))));
    }

    #[test]
    fn postgres_quotes_identifiers() {
        assert_eq!(Postgres.quote_ident("v0"), "\"v0\"");
        assert_eq!(Postgres.quote_ident("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn interpolate_renders_multi_row_insert() {
        let mut stmt = InsertStatement::new(Postgres, "public", "t", &["a", "b"]);
        stmt.values(owned(&["1", "x'y"])).expect("row 1");
        stmt.values(owned(&["2", ""])).expect("row 2");
        let sql = interpolate(&stmt).expect("interpolate");
        assert_eq!(
            sql,
            "INSERT INTO \"public\".\"t\" (\"a\", \"b\") VALUES ('1', 'x''y'), ('2', '')"
        );
    }

    #[test]
    fn interpolate_leaves_question_marks_inside_values_alone() {
        let mut stmt = InsertStatement::new(Postgres, "public", "t", &["a"]);
        stmt.values(owned(&["why?"])).expect("row");
        let sql = interpolate(&stmt).expect("interpolate");
        assert!(sql.ends_with("VALUES ('why?')"));
    }

    #[test]
    fn interpolate_for_dialect_rejects_count_mismatch() {
        let too_few = interpolate_for_dialect("(?, ?)", &owned(&["a"]), &Postgres);
        assert!(matches!(too_few, Err(BulkInsertError::Interpolate(_))));
        let too_many = interpolate_for_dialect("(?)", &owned(&["a", "b"]), &Postgres);
        assert!(matches!(too_many, Err(BulkInsertError::Interpolate(_))));
    }

    #[test]
    fn interpolate_for_dialect_skips_quoted_placeholders() {
        let sql = interpolate_for_dialect("SELECT '?', \"?\", ?", &owned(&["x"]), &Postgres)
            .expect("interpolate");
        assert_eq!(sql, "SELECT '?', \"?\", 'x'");
    }

    #[test]
    fn build_rejects_empty_insert_and_wrong_width() {
        let mut stmt = InsertStatement::new(Postgres, "public", "t", &["a", "b"]);
        assert!(matches!(interpolate(&stmt), Err(BulkInsertError::Interpolate(_))));
        assert!(matches!(stmt.values(owned(&["only"])), Err(BulkInsertError::Interpolate(_))));
        assert_eq!(stmt.row_count(), 0);
    }

    #[test]
    fn executor_appends_suffix_after_interpolation() {
        let record = RuleRecord::from_rule("p", &["alice", "data1", "read"]).expect("record");
        let mut stmt = InsertStatement::new(Postgres, "public", "casbin_rules", &RULE_COLUMNS);
        stmt.record(&record).expect("record row");

        let mut runner = RecordingRunner::default();
        let affected = BulkExecutor::new(&mut runner)
            .insert_with_suffix(&stmt, ON_CONFLICT_DO_NOTHING)
            .expect("execute");
        assert_eq!(affected, 1);
        assert_eq!(runner.statements.len(), 1);
        let sql = &runner.statements[0];
        assert!(sql.ends_with(") ON CONFLICT DO NOTHING"));
        assert!(sql.contains(&format!("('{}', 'p', 'alice', 'data1', 'read', '', '', '')", record.id)));
    }

    #[test]
    fn executor_does_not_run_statements_that_fail_to_build() {
        let stmt = InsertStatement::new(Postgres, "public", "casbin_rules", &RULE_COLUMNS);
        let mut runner = RecordingRunner::default();
        let result = BulkExecutor::new(&mut runner).insert(&stmt);
        assert!(matches!(result, Err(BulkInsertError::Interpolate(_))));
        assert!(runner.statements.is_empty());
    }
}
