// crates/policy-store-core/tests/memory_adapter.rs
// ============================================================================
// Module: In-Memory Adapter Tests
// Description: Validate adapter semantics against the in-memory backend.
// Purpose: Pin the CRUD contract without a live database.
// Dependencies: policy-store-core
// ============================================================================

//! ## Overview
//! Conformance tests for the in-memory policy adapter: round trips,
//! idempotent adds, exact deletes, and all-or-nothing saves.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    reason = "Test-only assertions and helpers are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use policy_store_core::AdapterError;
use policy_store_core::InMemoryPolicyAdapter;
use policy_store_core::PolicyAdapter;
use policy_store_core::PolicyModel;
use policy_store_core::RuleRecord;
use policy_store_core::SharedPolicyAdapter;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn rule(values: &[&str]) -> Vec<String> {
    values.iter().map(ToString::to_string).collect()
}

fn rule_set(model: &PolicyModel, sec: &str, ptype: &str) -> BTreeSet<Vec<String>> {
    model.rules(sec, ptype).iter().cloned().collect()
}

fn sample_model() -> PolicyModel {
    let mut model = PolicyModel::new();
    model.add_rule("p", "p", rule(&["alice", "data1", "read"]));
    model.add_rule("p", "p", rule(&["bob", "data2", "write"]));
    model.add_rule("g", "g", rule(&["alice", "admin"]));
    model.add_rule("g", "g2", rule(&["data1", "group1"]));
    model
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[test]
fn save_then_load_round_trips_rule_sets() {
    let adapter = InMemoryPolicyAdapter::new();
    let original = sample_model();
    adapter.save_policy(&original).expect("save");

    let mut loaded = PolicyModel::new();
    adapter.load_policy(&mut loaded).expect("load");

    for (sec, ptype) in [("p", "p"), ("g", "g"), ("g", "g2")] {
        assert_eq!(rule_set(&loaded, sec, ptype), rule_set(&original, sec, ptype));
    }
    assert_eq!(loaded.rule_count(), original.rule_count());
}

#[test]
fn save_of_empty_model_clears_storage() {
    let adapter = InMemoryPolicyAdapter::new();
    adapter.save_policy(&sample_model()).expect("seed");
    adapter.save_policy(&PolicyModel::new()).expect("save empty");

    let mut loaded = PolicyModel::new();
    adapter.load_policy(&mut loaded).expect("load");
    assert_eq!(loaded.rule_count(), 0);
}

#[test]
fn save_ignores_sections_other_than_p_and_g() {
    let adapter = InMemoryPolicyAdapter::new();
    let mut model = sample_model();
    model.add_rule("e", "e", rule(&["some(where (p.eft == allow))"]));
    adapter.save_policy(&model).expect("save");
    assert_eq!(adapter.records().expect("records").len(), 4);
}

#[test]
fn add_policy_twice_keeps_one_row() {
    let adapter = InMemoryPolicyAdapter::new();
    let alice = rule(&["alice", "data1", "read"]);
    adapter.add_policy("p", "p", &alice).expect("first add");
    adapter.add_policy("p", "p", &alice).expect("second add");

    let records = adapter.records().expect("records");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0], RuleRecord::from_rule("p", &alice).expect("record"));
}

#[test]
fn add_policies_skips_duplicates_within_batch_and_storage() {
    let adapter = InMemoryPolicyAdapter::new();
    adapter.add_policy("p", "p", &rule(&["alice", "data1", "read"])).expect("seed");
    adapter
        .add_policies(
            "p",
            "p",
            &[
                rule(&["alice", "data1", "read"]),
                rule(&["bob", "data2", "write"]),
                rule(&["bob", "data2", "write"]),
            ],
        )
        .expect("batch add");
    assert_eq!(adapter.records().expect("records").len(), 2);
}

#[test]
fn remove_policy_deletes_only_the_matching_row() {
    let adapter = InMemoryPolicyAdapter::new();
    adapter.save_policy(&sample_model()).expect("seed");
    adapter.remove_policy("p", "p", &rule(&["alice", "data1", "read"])).expect("remove");

    let mut loaded = PolicyModel::new();
    adapter.load_policy(&mut loaded).expect("load");
    assert!(!loaded.has_rule("p", "p", &rule(&["alice", "data1", "read"])));
    assert!(loaded.has_rule("p", "p", &rule(&["bob", "data2", "write"])));
    assert_eq!(loaded.rule_count(), 3);
}

#[test]
fn remove_missing_rule_is_a_no_op() {
    let adapter = InMemoryPolicyAdapter::new();
    adapter.save_policy(&sample_model()).expect("seed");
    adapter.remove_policy("p", "p", &rule(&["carol", "data3", "read"])).expect("remove");
    assert_eq!(adapter.records().expect("records").len(), 4);
}

#[test]
fn remove_policies_deletes_every_listed_rule() {
    let adapter = InMemoryPolicyAdapter::new();
    adapter.save_policy(&sample_model()).expect("seed");
    adapter
        .remove_policies(
            "p",
            "p",
            &[rule(&["alice", "data1", "read"]), rule(&["bob", "data2", "write"])],
        )
        .expect("remove");
    let mut loaded = PolicyModel::new();
    adapter.load_policy(&mut loaded).expect("load");
    assert!(loaded.rules("p", "p").is_empty());
    assert_eq!(loaded.rule_count(), 2);
}

#[test]
fn failed_save_keeps_previous_rules() {
    let adapter = InMemoryPolicyAdapter::new();
    adapter.save_policy(&sample_model()).expect("seed");

    let mut clashing = PolicyModel::new();
    clashing.add_rule("p", "p", rule(&["alice", "admin"]));
    clashing.add_rule("g", "g", rule(&["alice", "admin"]));
    let result = adapter.save_policy(&clashing);
    assert!(matches!(result, Err(AdapterError::Db(_))));

    let mut loaded = PolicyModel::new();
    adapter.load_policy(&mut loaded).expect("load");
    assert_eq!(loaded.rule_count(), 4);
}

#[test]
fn remove_filtered_policy_is_unsupported() {
    let adapter = InMemoryPolicyAdapter::new();
    adapter.save_policy(&sample_model()).expect("seed");
    let result = adapter.remove_filtered_policy("p", "p", 0, &rule(&["alice"]));
    assert!(matches!(result, Err(AdapterError::Unsupported(_))));
    assert_eq!(adapter.records().expect("records").len(), 4);
}

#[test]
fn unrepresentable_rule_types_are_rejected_and_never_stored() {
    let adapter = InMemoryPolicyAdapter::new();
    adapter.add_policy("p", "p", &rule(&["alice", "data1"])).expect("seed");
    for ptype in ["#p", "p,x", " p", ""] {
        let result = adapter.add_policy("p", ptype, &rule(&["bob", "data2"]));
        assert!(matches!(result, Err(AdapterError::Invalid(_))), "accepted '{ptype}'");

        let mut model = PolicyModel::new();
        model.add_rule("p", ptype, rule(&["bob", "data2"]));
        assert!(matches!(adapter.save_policy(&model), Err(AdapterError::Invalid(_))));
    }

    let mut loaded = PolicyModel::new();
    adapter.load_policy(&mut loaded).expect("load stays readable");
    assert_eq!(loaded.rule_count(), 1);
    assert!(loaded.has_rule("p", "p", &rule(&["alice", "data1"])));
}

#[test]
fn shared_adapter_delegates_and_reports_unfiltered_loads() {
    let shared = SharedPolicyAdapter::from_adapter(InMemoryPolicyAdapter::new());
    shared.add_policy("p", "p", &rule(&["alice", "data1", "read"])).expect("add alice");
    shared.add_policy("p", "p", &rule(&["bob", "data2", "write"])).expect("add bob");

    let mut loaded = PolicyModel::new();
    shared.load_policy(&mut loaded).expect("load");
    assert!(!shared.is_filtered());
    assert_eq!(
        rule_set(&loaded, "p", "p"),
        BTreeSet::from([rule(&["alice", "data1", "read"]), rule(&["bob", "data2", "write"])])
    );
}
