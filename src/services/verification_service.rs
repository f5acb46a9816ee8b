//! Email verification flow: request a key, then redeem the emailed token.
//!
//! # States
//!
//! ```text
//! request ──> Pending (30 min TTL) ──redeem──> Issued
//!                  │
//!                  └── TTL runs out ──> gone
//! ```
//!
//! A token is redeemable only while `Pending`. The key row is inserted before
//! the pending entry is deleted, so a failed insert leaves the token usable for
//! a retry, and the unique `issued_from` column stops a retry from creating a
//! second key when only the delete failed.

use std::sync::Arc;

use chrono::{Duration, Utc};
use url::Url;

use crate::config::{IssuancePolicy, VERIFICATION_TTL_SECS};
use crate::error::AppError;
use crate::models::api_key::{IssuedKey, NewKeyRecord};
use crate::models::verification::{PendingVerification, RequestKeyRequest, RequestKeyResponse};
use crate::services::credentials::{
    generate_key_value, generate_verification_token, hash_secret, mask_key,
};
use crate::services::notifier::{EmailMessage, Notifier};
use crate::services::scorer::{is_valid_syntax, sanitize_email};
use crate::store::{KeyStore, VerificationStore};

const MAX_NAME_LEN: usize = 100;
const MAX_PURPOSE_LEN: usize = 500;

/// Issues and redeems single-use verification tokens.
pub struct VerificationFlow {
    keys: Arc<dyn KeyStore>,
    pending: VerificationStore,
    notifier: Arc<dyn Notifier>,
    policy: IssuancePolicy,
    base_url: Url,
}

impl VerificationFlow {
    pub fn new(
        keys: Arc<dyn KeyStore>,
        pending: VerificationStore,
        notifier: Arc<dyn Notifier>,
        policy: IssuancePolicy,
        base_url: Url,
    ) -> Self {
        Self {
            keys,
            pending,
            notifier,
            policy,
            base_url,
        }
    }

    /// Start a key request for an email address.
    ///
    /// # Process
    ///
    /// 1. Validate name, purpose and email syntax
    /// 2. Refuse if the address already holds `key_limit` active keys
    /// 3. Store a pending verification under a fresh token (30 min TTL)
    /// 4. Email the redemption link
    ///
    /// # Errors
    ///
    /// - `InvalidRequest`: bad name, purpose or email
    /// - `QuotaExceeded`: too many active keys for this address
    /// - `Database` / `Cache`: a store is unavailable
    ///
    /// A failed email send is not an error: the pending entry is already
    /// stored, and the response reports `email_sent = false`.
    pub async fn request(
        &self,
        request: RequestKeyRequest,
    ) -> Result<RequestKeyResponse, AppError> {
        let email = sanitize_email(&request.email);
        if !is_valid_syntax(&email) {
            return Err(AppError::InvalidRequest(
                "Please provide a valid email address".to_string(),
            ));
        }

        let name = request.name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::InvalidRequest("Name cannot be empty".to_string()));
        }
        if name.chars().count() > MAX_NAME_LEN {
            return Err(AppError::InvalidRequest(
                "Name must be 100 characters or less".to_string(),
            ));
        }

        let purpose = request
            .purpose
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty());
        if purpose
            .as_ref()
            .is_some_and(|p| p.chars().count() > MAX_PURPOSE_LEN)
        {
            return Err(AppError::InvalidRequest(
                "Purpose must be 500 characters or less".to_string(),
            ));
        }

        let active_keys = self.keys.count_active_for_owner(&email).await?;
        if active_keys >= self.policy.key_limit {
            return Err(AppError::QuotaExceeded { active_keys });
        }

        let token = generate_verification_token();
        let pending = PendingVerification {
            email: email.clone(),
            name,
            purpose,
            expires_at: Utc::now() + Duration::seconds(VERIFICATION_TTL_SECS as i64),
        };
        self.pending.put(&token, &pending).await?;

        let url = self.verification_url(&token);
        let email_sent = match self
            .notifier
            .send(EmailMessage::verification(&email, url.as_str()))
            .await
        {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(owner_email = %email, error = %e, "verification email not delivered");
                false
            }
        };

        tracing::info!(owner_email = %email, email_sent, "api key requested");

        let message = if email_sent {
            "Verification email sent. Please check your inbox and click the verification \
             link to generate your API key."
        } else {
            "Your request was recorded, but the verification email could not be sent. \
             Please try again later."
        };

        Ok(RequestKeyResponse {
            message: message.to_string(),
            email,
            email_sent,
        })
    }

    /// Redeem a verification token for a new key.
    ///
    /// # Errors
    ///
    /// - `InvalidOrExpiredToken`: the token never existed, expired, or was
    ///   already redeemed
    /// - `Database` / `Cache`: a store is unavailable; the token stays
    ///   redeemable until its TTL, so the caller may retry
    pub async fn redeem(&self, token: &str) -> Result<IssuedKey, AppError> {
        let pending = self
            .pending
            .get(token)
            .await?
            .ok_or(AppError::InvalidOrExpiredToken)?;

        self.issue(token, pending).await
    }

    /// The one-way `Pending -> Issued` transition.
    ///
    /// Takes the pending entry by value: once it has been turned into a key
    /// attempt it cannot be reused.
    async fn issue(
        &self,
        token: &str,
        pending: PendingVerification,
    ) -> Result<IssuedKey, AppError> {
        let now = Utc::now();
        if now > pending.expires_at {
            // The store TTL is authoritative but may lag behind the clock.
            self.discard(token).await;
            return Err(AppError::InvalidOrExpiredToken);
        }

        let key_value = generate_key_value();
        let new_key = NewKeyRecord {
            key_hash: hash_secret(&key_value),
            key_hint: mask_key(&key_value),
            owner_email: pending.email.clone(),
            display_name: pending.name.clone(),
            purpose: pending.purpose.clone(),
            rate_limit: self.policy.rate_limit,
            created_at: now,
            expires_at: Some(now + self.policy.validity),
            issued_from: Some(hash_secret(token)),
        };

        let Some(record) = self.keys.insert(new_key).await? else {
            tracing::warn!(
                owner_email = %pending.email,
                "verification token already produced a key, discarding it"
            );
            self.discard(token).await;
            return Err(AppError::InvalidOrExpiredToken);
        };

        self.discard(token).await;

        tracing::info!(key_id = %record.id, owner_email = %record.owner_email, "api key issued");

        Ok(IssuedKey {
            id: record.id,
            key_value,
            rate_limit: record.rate_limit,
            expires_at: record.expires_at,
        })
    }

    /// Delete a pending entry, tolerating store failures.
    async fn discard(&self, token: &str) {
        if let Err(e) = self.pending.delete(token).await {
            tracing::warn!(error = %e, "failed to delete pending verification");
        }
    }

    fn verification_url(&self, token: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(["api", "keys", "verify", token]);
        }
        url
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::notifier::{MockNotifier, NotifyError};
    use crate::store::{InMemoryKeyStore, MemoryStore};
    use std::sync::Mutex;

    struct Harness {
        keys: Arc<InMemoryKeyStore>,
        ephemeral: Arc<MemoryStore>,
        flow: VerificationFlow,
        sent: Arc<Mutex<Vec<EmailMessage>>>,
    }

    fn harness_with(notifier_fails: bool, policy: IssuancePolicy) -> Harness {
        let keys = Arc::new(InMemoryKeyStore::new());
        let ephemeral = Arc::new(MemoryStore::new());
        let sent = Arc::new(Mutex::new(Vec::new()));

        let mut notifier = MockNotifier::new();
        let log = sent.clone();
        notifier.expect_send().returning(move |message| {
            log.lock().unwrap().push(message);
            if notifier_fails {
                Err(NotifyError::Transport("smtp down".to_string()))
            } else {
                Ok(())
            }
        });

        let flow = VerificationFlow::new(
            keys.clone(),
            VerificationStore::new(ephemeral.clone()),
            Arc::new(notifier),
            policy,
            Url::parse("https://api.example.com").unwrap(),
        );

        Harness {
            keys,
            ephemeral,
            flow,
            sent,
        }
    }

    fn harness() -> Harness {
        harness_with(false, IssuancePolicy::default())
    }

    fn key_request(email: &str) -> RequestKeyRequest {
        RequestKeyRequest {
            email: email.to_string(),
            name: "test".to_string(),
            purpose: Some("ci".to_string()),
        }
    }

    fn token_from(message: &EmailMessage) -> String {
        let marker = "/api/keys/verify/";
        let start = message.text.find(marker).unwrap() + marker.len();
        message.text[start..start + 64].to_string()
    }

    async fn request_token(h: &Harness, email: &str) -> String {
        h.flow.request(key_request(email)).await.unwrap();
        let sent = h.sent.lock().unwrap();
        token_from(sent.last().unwrap())
    }

    #[tokio::test]
    async fn request_sends_link_with_token() {
        let h = harness();

        let outcome = h.flow.request(key_request(" A@X.com ")).await.unwrap();

        assert!(outcome.email_sent);
        assert_eq!(outcome.email, "a@x.com");
        let sent = h.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "a@x.com");
        assert!(
            sent[0]
                .text
                .contains("https://api.example.com/api/keys/verify/")
        );
    }

    #[tokio::test]
    async fn redeem_issues_exactly_once() {
        let h = harness();
        let token = request_token(&h, "a@x.com").await;

        let issued = h.flow.redeem(&token).await.unwrap();
        assert!(issued.key_value.starts_with("ev_"));
        assert_eq!(issued.rate_limit, 100);
        assert!(issued.expires_at.is_some());

        let record = h
            .keys
            .find_by_hash(&hash_secret(&issued.key_value))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.total_requests, 0);
        assert!(record.is_active);
        assert_eq!(record.owner_email, "a@x.com");
        assert_eq!(record.purpose.as_deref(), Some("ci"));

        let second = h.flow.redeem(&token).await;
        assert!(matches!(second, Err(AppError::InvalidOrExpiredToken)));
        assert_eq!(h.keys.count_active_for_owner("a@x.com").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn unknown_token_is_rejected() {
        let h = harness();
        let result = h.flow.redeem("does-not-exist").await;
        assert!(matches!(result, Err(AppError::InvalidOrExpiredToken)));
    }

    #[tokio::test]
    async fn failed_insert_keeps_token_for_retry() {
        let h = harness();
        let token = request_token(&h, "a@x.com").await;

        h.keys.set_unavailable(true);
        let failed = h.flow.redeem(&token).await;
        assert!(matches!(failed, Err(ref e) if e.is_store_unavailable()));

        h.keys.set_unavailable(false);
        let issued = h.flow.redeem(&token).await.unwrap();
        assert!(issued.key_value.starts_with("ev_"));
        assert_eq!(h.keys.count_active_for_owner("a@x.com").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn leftover_token_cannot_issue_a_second_key() {
        let h = harness();
        let token = request_token(&h, "a@x.com").await;
        let pending = VerificationStore::new(h.ephemeral.clone());
        let saved = pending.get(&token).await.unwrap().unwrap();

        h.flow.redeem(&token).await.unwrap();

        // Simulate a delete that never reached the store.
        pending.put(&token, &saved).await.unwrap();

        let retry = h.flow.redeem(&token).await;
        assert!(matches!(retry, Err(AppError::InvalidOrExpiredToken)));
        assert_eq!(h.keys.count_active_for_owner("a@x.com").await.unwrap(), 1);
        assert!(pending.get(&token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn active_key_cap_rejects_new_requests() {
        let policy = IssuancePolicy {
            key_limit: 1,
            ..IssuancePolicy::default()
        };
        let h = harness_with(false, policy);

        let token = request_token(&h, "a@x.com").await;
        h.flow.redeem(&token).await.unwrap();

        let result = h.flow.request(key_request("a@x.com")).await;
        assert!(matches!(
            result,
            Err(AppError::QuotaExceeded { active_keys: 1 })
        ));
    }

    #[tokio::test]
    async fn delivery_failure_keeps_request_redeemable() {
        let h = harness_with(true, IssuancePolicy::default());

        let outcome = h.flow.request(key_request("a@x.com")).await.unwrap();
        assert!(!outcome.email_sent);

        let token = token_from(h.sent.lock().unwrap().last().unwrap());
        assert!(h.flow.redeem(&token).await.is_ok());
    }

    #[tokio::test]
    async fn expired_pending_entry_is_rejected() {
        let h = harness();
        let pending = VerificationStore::new(h.ephemeral.clone());
        let stale = PendingVerification {
            email: "a@x.com".to_string(),
            name: "test".to_string(),
            purpose: None,
            expires_at: Utc::now() - Duration::seconds(1),
        };
        pending.put("stale", &stale).await.unwrap();

        let result = h.flow.redeem("stale").await;
        assert!(matches!(result, Err(AppError::InvalidOrExpiredToken)));
        assert_eq!(h.keys.count_active_for_owner("a@x.com").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn request_validation() {
        let h = harness();

        let bad_email = h.flow.request(key_request("not-an-email")).await;
        assert!(matches!(bad_email, Err(AppError::InvalidRequest(_))));

        let mut empty_name = key_request("a@x.com");
        empty_name.name = "   ".to_string();
        assert!(matches!(
            h.flow.request(empty_name).await,
            Err(AppError::InvalidRequest(_))
        ));

        let mut long_name = key_request("a@x.com");
        long_name.name = "n".repeat(101);
        assert!(matches!(
            h.flow.request(long_name).await,
            Err(AppError::InvalidRequest(_))
        ));

        let mut long_purpose = key_request("a@x.com");
        long_purpose.purpose = Some("p".repeat(501));
        assert!(matches!(
            h.flow.request(long_purpose).await,
            Err(AppError::InvalidRequest(_))
        ));

        assert!(h.sent.lock().unwrap().is_empty());
    }
}
