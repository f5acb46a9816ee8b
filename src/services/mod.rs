//! Business logic services.
//!
//! Services hold the credential lifecycle and the admission logic, separated
//! from HTTP handlers. They talk to storage only through the `store` traits.

pub mod access_gate;
pub mod credentials;
pub mod key_admin_service;
pub mod notifier;
pub mod scorer;
pub mod validation_service;
pub mod verification_service;
