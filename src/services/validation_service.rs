//! Email scoring with a shared result cache.
//!
//! Scores are cached for 24 hours under `email_result:{email}`. The cache is
//! an optimization only: read and write failures fall through to the scorer.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::config::EMAIL_RESULT_TTL_SECS;
use crate::models::validation::EmailScore;
use crate::services::scorer::{EmailScorer, sanitize_email};
use crate::store::EphemeralStore;

fn result_key(email: &str) -> String {
    format!("email_result:{}", email)
}

/// Runs the scorer behind the result cache.
#[derive(Clone)]
pub struct EmailValidator {
    scorer: Arc<dyn EmailScorer>,
    cache: Arc<dyn EphemeralStore>,
}

impl EmailValidator {
    pub fn new(scorer: Arc<dyn EmailScorer>, cache: Arc<dyn EphemeralStore>) -> Self {
        Self { scorer, cache }
    }

    /// Score one address after sanitizing it.
    pub async fn validate_one(&self, email: &str) -> EmailScore {
        let email = sanitize_email(email);

        if let Some(cached) = self.cached(&email).await {
            return cached;
        }

        let result = self.scorer.score(&email).await;
        self.remember(&email, &result).await;
        result
    }

    /// Score a batch, scoring each distinct address once.
    ///
    /// Results come back in submission order, one per submitted entry.
    pub async fn validate_many(&self, emails: &[String]) -> Vec<EmailScore> {
        let mut seen: HashMap<String, EmailScore> = HashMap::new();
        let mut results = Vec::with_capacity(emails.len());

        for raw in emails {
            let email = sanitize_email(raw);
            let result = match seen.get(&email) {
                Some(result) => result.clone(),
                None => {
                    let result = self.validate_one(&email).await;
                    seen.insert(email, result.clone());
                    result
                }
            };
            results.push(result);
        }

        results
    }

    async fn cached(&self, email: &str) -> Option<EmailScore> {
        match self.cache.get(&result_key(email)).await {
            Ok(Some(data)) => serde_json::from_str(&data)
                .inspect_err(|e| tracing::warn!(error = %e, "discarding corrupt cached result"))
                .ok(),
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(error = %e, "result cache read failed");
                None
            }
        }
    }

    async fn remember(&self, email: &str, result: &EmailScore) {
        let Ok(data) = serde_json::to_string(result) else {
            return;
        };

        if let Err(e) = self
            .cache
            .put_with_ttl(
                &result_key(email),
                &data,
                Duration::from_secs(EMAIL_RESULT_TTL_SECS),
            )
            .await
        {
            tracing::warn!(error = %e, "result cache write failed");
        }
    }
}
