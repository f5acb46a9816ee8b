//! Data models: database rows, stored ephemeral records and API bodies.

/// API key records, listings and usage reports
pub mod api_key;
/// Email scoring results
pub mod validation;
/// Pending email verifications
pub mod verification;
