//! Email validation request and result types.

use serde::{Deserialize, Serialize};

/// Individual checks performed by an [`EmailScorer`](crate::services::scorer::EmailScorer).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmailChecks {
    pub syntax: bool,
    pub mx_records: bool,
    pub disposable: bool,
    pub role_account: bool,
    pub free_provider: bool,
}

/// Scoring result for one address.
///
/// # JSON Example
///
/// ```json
/// {
///   "email": "a@x.com",
///   "is_valid": true,
///   "score": 0.6,
///   "checks": {
///     "syntax": true,
///     "mx_records": false,
///     "disposable": false,
///     "role_account": false,
///     "free_provider": false
///   }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailScore {
    pub email: String,
    pub is_valid: bool,
    /// Confidence in [0, 1]
    pub score: f64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub suggested_correction: Option<String>,
    pub checks: EmailChecks,
}

/// Query string for `GET /api/validate`.
#[derive(Debug, Deserialize)]
pub struct ValidateQuery {
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct ValidateResponse {
    pub result: EmailScore,
}

/// Request body for `POST /api/validate/bulk`.
#[derive(Debug, Deserialize)]
pub struct BulkValidateRequest {
    pub emails: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct BulkValidateResponse {
    pub results: Vec<EmailScore>,
}
