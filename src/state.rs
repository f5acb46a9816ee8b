//! Shared application state handed to every handler and middleware.

use std::sync::Arc;

use crate::services::access_gate::AccessGate;
use crate::services::key_admin_service::KeyAdmin;
use crate::services::validation_service::EmailValidator;
use crate::services::verification_service::VerificationFlow;
use crate::store::KeyStore;

/// Everything a request may need, cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub keys: Arc<dyn KeyStore>,
    pub gate: AccessGate,
    pub verification: Arc<VerificationFlow>,
    pub admin: KeyAdmin,
    pub validator: EmailValidator,
}
