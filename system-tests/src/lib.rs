// system-tests/src/lib.rs
// ============================================================================
// Module: Policy Store System Tests Library
// Description: Shared settings for live-database system tests.
// Purpose: Keep fixture settings in one place for every system-test binary.
// Dependencies: std
// ============================================================================

//! ## Overview
//! System tests run against a real Postgres server. Set
//! [`PG_URL_ENV`] to reuse an existing server; otherwise a disposable
//! container is started through Docker.

// ============================================================================
// SECTION: Settings
// ============================================================================

/// Environment variable naming an externally managed Postgres server.
pub const PG_URL_ENV: &str = "POLICY_STORE_PG_URL";
/// Container image used when no external server is configured.
pub const POSTGRES_IMAGE: (&str, &str) = ("postgres", "15-alpine");
/// Database credentials used inside the disposable container.
pub const POSTGRES_CREDENTIALS: (&str, &str, &str) = ("policy", "policy", "policy_store");
/// Postgres listen port inside the container.
pub const POSTGRES_PORT: u16 = 5432;

/// Returns a per-test table name so tests sharing a server stay isolated.
#[must_use]
pub fn isolated_table(test_name: &str) -> String {
    format!("rules_{test_name}")
}
