// crates/policy-store-postgres/src/schema.rs
// ============================================================================
// Module: Rules Table Schema
// Description: Table layout and SQL text for the policy rules table.
// Purpose: Keep every statement the store issues derived from one layout.
// Dependencies: crate::bulk
// ============================================================================

//! ## Overview
//! The rules table keys rows by derived rule id and additionally enforces
//! uniqueness over the six field columns regardless of rule type. That second
//! constraint is kept for compatibility with tables created by earlier
//! adapters; it means a `p` rule and a `g` rule with identical fields cannot
//! coexist.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::bulk::Dialect;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default schema holding the rules table.
pub const DEFAULT_SCHEMA: &str = "public";
/// Default rules table name.
pub const DEFAULT_TABLE: &str = "casbin_rules";
/// Primary key column.
pub const COL_ID: &str = "id";
/// Rules table columns in insert/select order.
pub const RULE_COLUMNS: [&str; 8] = ["id", "ptype", "v0", "v1", "v2", "v3", "v4", "v5"];
/// Postgres identifier length limit in bytes.
const MAX_IDENTIFIER_LENGTH: usize = 63;

// ============================================================================
// SECTION: Identifiers
// ============================================================================

/// Returns `true` for plain lowercase identifiers (`[a-z_][a-z0-9_]*`).
#[must_use]
pub fn is_valid_identifier(value: &str) -> bool {
    let mut chars = value.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    value.len() <= MAX_IDENTIFIER_LENGTH
        && (first.is_ascii_lowercase() || first == '_')
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

// ============================================================================
// SECTION: Statements
// ============================================================================

/// SQL text for every statement the store issues against one rules table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleStatements {
    /// Schema holding the table (unquoted).
    pub schema: String,
    /// Table name (unquoted).
    pub table: String,
    /// Idempotent bootstrap statement.
    pub create_table: String,
    /// Full-table select in column order.
    pub select_all: String,
    /// Full-table delete.
    pub delete_all: String,
    /// Single-row delete by id (`$1`).
    pub delete_by_id: String,
    /// Multi-row delete by id array (`$1`).
    pub delete_by_ids: String,
}

impl RuleStatements {
    /// Renders the statements for `schema.table` using `dialect` quoting.
    #[must_use]
    pub fn new(dialect: &impl Dialect, schema: &str, table: &str) -> Self {
        let target = format!("{}.{}", dialect.quote_ident(schema), dialect.quote_ident(table));
        let columns =
            RULE_COLUMNS.iter().map(|column| dialect.quote_ident(column)).collect::<Vec<_>>();
        let id = dialect.quote_ident(COL_ID);
        let field_columns = columns[2 ..].join(", ");
        let column_defs = columns
            .iter()
            .map(|column| format!("{column} varchar NOT NULL DEFAULT ''"))
            .collect::<Vec<_>>()
            .join(", ");
        let create_table = format!(
            "CREATE TABLE {target} ({column_defs}, CONSTRAINT {pk} PRIMARY KEY ({id}), \
             CONSTRAINT {un} UNIQUE ({field_columns}))",
            pk = dialect.quote_ident(&format!("{table}_pk")),
            un = dialect.quote_ident(&format!("{table}_un")),
        );
        Self {
            schema: schema.to_string(),
            table: table.to_string(),
            create_table,
            select_all: format!("SELECT {} FROM {target}", columns.join(", ")),
            delete_all: format!("DELETE FROM {target}"),
            delete_by_id: format!("DELETE FROM {target} WHERE {id} = $1"),
            delete_by_ids: format!("DELETE FROM {target} WHERE {id} = ANY($1)"),
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
