// crates/policy-store-core/src/model.rs
// ============================================================================
// Module: Policy Model
// Description: Engine-side rule container and the policy-line parser.
// Purpose: Give adapters a section/type keyed view of an engine's rules.
// Dependencies: crate::interfaces
// ============================================================================

//! ## Overview
//! [`PolicyModel`] is the slice of a decision engine's model that adapters
//! touch: per section label (`p`, `g`), a mapping from rule-type label to an
//! ordered list of rule tuples. [`load_policy_line`] is the line-parser
//! callback adapters feed reconstructed rows through during a load.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use crate::interfaces::AdapterError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Sections whose rules are persisted by a full save.
pub const PERSISTED_SECTIONS: [&str; 2] = ["p", "g"];
/// Prefix marking a comment line.
const COMMENT_PREFIX: char = '#';

// ============================================================================
// SECTION: Model
// ============================================================================

/// Rules grouped by section label, then by rule-type label.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyModel {
    /// Section label -> rule-type label -> rules in insertion order.
    sections: BTreeMap<String, BTreeMap<String, Vec<Vec<String>>>>,
}

impl PolicyModel {
    /// Creates an empty model.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a rule unless an identical one is already present.
    ///
    /// Returns `true` when the rule was inserted.
    pub fn add_rule(&mut self, sec: &str, ptype: &str, rule: Vec<String>) -> bool {
        let rules = self
            .sections
            .entry(sec.to_string())
            .or_default()
            .entry(ptype.to_string())
            .or_default();
        if rules.contains(&rule) {
            return false;
        }
        rules.push(rule);
        true
    }

    /// Returns `true` when the rule is present.
    #[must_use]
    pub fn has_rule(&self, sec: &str, ptype: &str, rule: &[String]) -> bool {
        self.rules(sec, ptype).iter().any(|existing| existing.as_slice() == rule)
    }

    /// Returns the rules stored under a section and rule type.
    #[must_use]
    pub fn rules(&self, sec: &str, ptype: &str) -> &[Vec<String>] {
        self.sections
            .get(sec)
            .and_then(|types| types.get(ptype))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Iterates `(ptype, rules)` pairs of a section.
    pub fn section<'a>(
        &'a self,
        sec: &str,
    ) -> impl Iterator<Item = (&'a str, &'a [Vec<String>])> {
        self.sections
            .get(sec)
            .into_iter()
            .flat_map(|types| types.iter().map(|(ptype, rules)| (ptype.as_str(), rules.as_slice())))
    }

    /// Returns the total number of rules across all sections.
    #[must_use]
    pub fn rule_count(&self) -> usize {
        self.sections.values().flat_map(BTreeMap::values).map(Vec::len).sum()
    }

    /// Drops every rule while keeping the model usable.
    pub fn clear_policy(&mut self) {
        self.sections.clear();
    }
}

// ============================================================================
// SECTION: Line Parser
// ============================================================================

/// Parses a policy line (`ptype, v0, v1, ...`) into `model`.
///
/// The section is the first character of the rule-type label, so `p2` rules
/// land in section `p`. Blank lines and `#` comments are ignored.
///
/// # Errors
///
/// Returns [`AdapterError::Corrupt`] when the line cannot be tokenized.
pub fn load_policy_line(line: &str, model: &mut PolicyModel) -> Result<(), AdapterError> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with(COMMENT_PREFIX) {
        return Ok(());
    }
    let mut tokens = split_line(trimmed)?.into_iter();
    let ptype = tokens
        .next()
        .filter(|ptype| !ptype.is_empty())
        .ok_or_else(|| AdapterError::Corrupt(format!("policy line missing rule type: {trimmed}")))?;
    let sec: String = ptype.chars().take(1).collect();
    model.add_rule(&sec, &ptype, tokens.collect());
    Ok(())
}

/// Splits a line on commas, honoring double-quoted tokens.
fn split_line(line: &str) -> Result<Vec<String>, AdapterError> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut chars = line.chars().peekable();
    let mut in_quotes = false;
    let mut was_quoted = false;
    while let Some(ch) = chars.next() {
        if in_quotes {
            if ch != '"' {
                current.push(ch);
            } else if chars.peek() == Some(&'"') {
                chars.next();
                current.push('"');
            } else {
                in_quotes = false;
            }
            continue;
        }
        match ch {
            ',' => {
                tokens.push(finish_token(&mut current, was_quoted));
                was_quoted = false;
            }
            '"' if !was_quoted && current.trim().is_empty() => {
                current.clear();
                in_quotes = true;
                was_quoted = true;
            }
            _ if was_quoted => {
                if !ch.is_whitespace() {
                    return Err(AdapterError::Corrupt(format!(
                        "unexpected character after quoted token: {line}"
                    )));
                }
            }
            _ => current.push(ch),
        }
    }
    if in_quotes {
        return Err(AdapterError::Corrupt(format!("unterminated quote in policy line: {line}")));
    }
    tokens.push(finish_token(&mut current, was_quoted));
    Ok(tokens)
}

/// Takes the buffered token, trimming it unless it was quoted.
fn finish_token(current: &mut String, was_quoted: bool) -> String {
    let token = std::mem::take(current);
    if was_quoted { token } else { token.trim().to_string() }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
