// crates/policy-store-core/src/record.rs
// ============================================================================
// Module: Rule Records
// Description: Persisted rule representation and deterministic identifiers.
// Purpose: Map engine rule tuples to fixed-arity rows addressed by content.
// Dependencies: twox-hash
// ============================================================================

//! ## Overview
//! A [`RuleRecord`] is the row shape of one policy rule: a rule-type label plus
//! six positional fields. Its identifier is derived from content alone, so the
//! same rule always lands on the same primary key and repeated inserts can be
//! skipped by the storage layer.
//!
//! Invariants:
//! - Identity hashing always covers all six slots, padded with empty strings.
//! - Field order is significant.

// ============================================================================
// SECTION: Imports
// ============================================================================

use twox_hash::xxh3;

use crate::interfaces::AdapterError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Number of positional fields a rule row carries (`v0..v5`).
pub const FIELD_COUNT: usize = 6;
/// Separator joining rule-type label and fields before hashing.
const ID_SEPARATOR: char = ',';
/// Separator between tokens of a rendered policy line.
const LINE_SEPARATOR: &str = ", ";
/// Leading character that turns a policy line into a comment.
const COMMENT_PREFIX: char = '#';

/// Fixed-arity positional field vector of a rule.
pub type RuleFields = [String; FIELD_COUNT];

// ============================================================================
// SECTION: Identity
// ============================================================================

/// Derives the stable identifier of a rule.
///
/// The rule-type label and the six padded fields are joined with `,` and
/// hashed with XXH3-128. The digest renders as 32 lowercase hex characters.
/// This is a content address for deduplication, not a security primitive.
#[must_use]
pub fn rule_id(ptype: &str, fields: &RuleFields) -> String {
    let capacity = ptype.len() + fields.iter().map(String::len).sum::<usize>() + FIELD_COUNT;
    let mut data = String::with_capacity(capacity);
    data.push_str(ptype);
    for field in fields {
        data.push(ID_SEPARATOR);
        data.push_str(field);
    }
    format!("{:032x}", xxh3::hash128(data.as_bytes()))
}

/// Pads a variable-length rule into the fixed six-slot field vector.
///
/// # Errors
///
/// Returns [`AdapterError::Invalid`] when the rule has more than six fields.
pub fn pad_fields<S: AsRef<str>>(rule: &[S]) -> Result<RuleFields, AdapterError> {
    if rule.len() > FIELD_COUNT {
        return Err(AdapterError::Invalid(format!(
            "rule has {} fields (max {FIELD_COUNT})",
            rule.len()
        )));
    }
    let mut fields = RuleFields::default();
    for (slot, value) in fields.iter_mut().zip(rule) {
        value.as_ref().clone_into(slot);
    }
    Ok(fields)
}

/// Checks that a rule-type label renders as the first token of a policy line.
///
/// # Errors
///
/// Returns [`AdapterError::Invalid`] for empty labels, labels containing `,`
/// or `"`, labels starting with `#`, and labels with edge whitespace.
pub fn validate_ptype(ptype: &str) -> Result<(), AdapterError> {
    let reason = if ptype.is_empty() {
        "is empty"
    } else if ptype.contains([ID_SEPARATOR, '"']) {
        "contains a comma or quote"
    } else if ptype.starts_with(COMMENT_PREFIX) {
        "starts with a comment marker"
    } else if ptype.starts_with(char::is_whitespace) || ptype.ends_with(char::is_whitespace) {
        "has leading or trailing whitespace"
    } else {
        return Ok(());
    };
    Err(AdapterError::Invalid(format!("rule type '{ptype}' {reason}")))
}

// ============================================================================
// SECTION: Rule Record
// ============================================================================

/// Persisted representation of one policy rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleRecord {
    /// Content-derived identifier (primary key).
    pub id: String,
    /// Rule-type label, e.g. `p` or `g`.
    pub ptype: String,
    /// Positional fields `v0..v5`.
    pub fields: RuleFields,
}

impl RuleRecord {
    /// Builds a record from an engine rule tuple, deriving its identifier.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Invalid`] when the rule type cannot be written
    /// as a policy line or the rule has more than six fields.
    pub fn from_rule<S: AsRef<str>>(ptype: &str, rule: &[S]) -> Result<Self, AdapterError> {
        validate_ptype(ptype)?;
        let fields = pad_fields(rule)?;
        Ok(Self {
            id: rule_id(ptype, &fields),
            ptype: ptype.to_string(),
            fields,
        })
    }

    /// Rebuilds a record from stored column values without re-deriving the id.
    #[must_use]
    pub const fn from_row(id: String, ptype: String, fields: RuleFields) -> Self {
        Self {
            id,
            ptype,
            fields,
        }
    }

    /// Returns the rule tuple with trailing empty fields dropped.
    #[must_use]
    pub fn rule(&self) -> Vec<String> {
        let len = self.fields.iter().rposition(|field| !field.is_empty()).map_or(0, |idx| idx + 1);
        self.fields[.. len].to_vec()
    }

    /// Renders the record as a policy line: `ptype, v0, v1, ...`.
    ///
    /// Trailing empty fields are omitted. Fields that would not survive
    /// tokenizing (commas, quotes, edge whitespace) are double-quoted.
    #[must_use]
    pub fn policy_line(&self) -> String {
        let rule = self.rule();
        let mut line = String::with_capacity(
            self.ptype.len() + rule.iter().map(|field| field.len() + LINE_SEPARATOR.len()).sum::<usize>(),
        );
        line.push_str(&self.ptype);
        for field in &rule {
            line.push_str(LINE_SEPARATOR);
            push_token(&mut line, field);
        }
        line
    }

    /// Returns the column values in `id, ptype, v0..v5` order.
    #[must_use]
    pub fn column_values(&self) -> Vec<&str> {
        let mut values = Vec::with_capacity(FIELD_COUNT + 2);
        values.push(self.id.as_str());
        values.push(self.ptype.as_str());
        values.extend(self.fields.iter().map(String::as_str));
        values
    }
}

/// Appends a line token, quoting it when plain rendering would be lossy.
fn push_token(line: &mut String, token: &str) {
    let needs_quotes = token.contains([',', '"'])
        || token.starts_with(char::is_whitespace)
        || token.ends_with(char::is_whitespace);
    if needs_quotes {
        line.push('"');
        line.push_str(&token.replace('"', "\"\""));
        line.push('"');
    } else {
        line.push_str(token);
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
