//! Email-verified API key issuance and quota-gated access.
//!
//! A requester proves an email address, redeems the emailed token for a
//! time-limited key, and every call made with that key is checked for
//! activity, expiry and hourly quota before it reaches the email scoring
//! endpoints.
//!
//! # Architecture
//!
//! - **Web Framework**: Axum
//! - **Durable store**: PostgreSQL with sqlx
//! - **Ephemeral store**: Redis, or an in-process moka cache
//! - **Credentials**: `ev_` keys stored as SHA-256 hashes

pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
pub mod store;
