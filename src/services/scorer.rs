//! Email scoring capability protected by the access gate.
//!
//! Scoring is pure and idempotent, which is what allows results to be cached.
//! The bundled scorer checks syntax only; MX, disposable-domain and role
//! heuristics belong to richer `EmailScorer` implementations.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;

use crate::models::validation::{EmailChecks, EmailScore};

static EMAIL_SYNTAX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"^(([^<>()\[\]\\.,;:\s@"]+(\.[^<>()\[\]\\.,;:\s@"]+)*)|(".+"))@((\[[0-9]{1,3}\.[0-9]{1,3}\.[0-9]{1,3}\.[0-9]{1,3}\])|(([a-zA-Z\-0-9]+\.)+[a-zA-Z]{2,}))$"#,
    )
    .expect("email syntax pattern is valid")
});

static UNSAFE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[<>&"'`]"#).expect("unsafe char pattern is valid"));

static NON_EMAIL_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w.@+-]").expect("email char pattern is valid"));

/// Whether `email` is a syntactically valid address.
pub fn is_valid_syntax(email: &str) -> bool {
    email.len() <= 254 && EMAIL_SYNTAX.is_match(&email.to_lowercase())
}

/// Lowercase, trim and strip characters that cannot appear in an address.
pub fn sanitize_email(email: &str) -> String {
    let lowered = email.trim().to_lowercase();
    let stripped = UNSAFE_CHARS.replace_all(&lowered, "");
    NON_EMAIL_CHARS.replace_all(stripped.trim(), "").into_owned()
}

/// Combine check outcomes into a score in [0, 1], rounded to two decimals.
pub fn score_checks(checks: &EmailChecks) -> f64 {
    if !checks.syntax {
        return 0.0;
    }

    let mut score: f64 = 0.4;
    if checks.mx_records {
        score += 0.4;
    }
    if !checks.disposable {
        score += 0.1;
    }
    if !checks.role_account {
        score += 0.1;
    }
    if !checks.free_provider {
        score += 0.05;
    }

    (score.min(1.0) * 100.0_f64).round() / 100.0
}

/// Scores a single email address.
#[async_trait]
pub trait EmailScorer: Send + Sync {
    async fn score(&self, email: &str) -> EmailScore;
}

/// Scorer that only checks address syntax.
#[derive(Debug, Clone, Default)]
pub struct SyntaxScorer;

#[async_trait]
impl EmailScorer for SyntaxScorer {
    async fn score(&self, email: &str) -> EmailScore {
        let email = email.trim().to_lowercase();
        let checks = EmailChecks {
            syntax: is_valid_syntax(&email),
            ..EmailChecks::default()
        };

        EmailScore {
            is_valid: checks.syntax,
            score: score_checks(&checks),
            suggested_correction: None,
            checks,
            email,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn syntax() {
        assert!(is_valid_syntax("a@x.com"));
        assert!(is_valid_syntax("first.last+tag@mail.example.org"));
        assert!(!is_valid_syntax("no-at-sign.com"));
        assert!(!is_valid_syntax("a@b"));
        assert!(!is_valid_syntax("a..b@x.com"));
        assert!(!is_valid_syntax("a b@x.com"));
    }

    #[test]
    fn sanitize_strips_markup_and_whitespace() {
        assert_eq!(sanitize_email("  A@X.COM "), "a@x.com");
        assert_eq!(sanitize_email("<a>@x.com"), "a@x.com");
        assert_eq!(sanitize_email("a'b@x.com"), "ab@x.com");
    }

    #[test]
    fn score_weights() {
        let none = EmailChecks::default();
        assert_eq!(score_checks(&none), 0.0);

        let syntax_only = EmailChecks {
            syntax: true,
            ..EmailChecks::default()
        };
        assert_eq!(score_checks(&syntax_only), 0.65);

        let best = EmailChecks {
            syntax: true,
            mx_records: true,
            ..EmailChecks::default()
        };
        assert_eq!(score_checks(&best), 1.0);
    }

    #[tokio::test]
    async fn syntax_scorer_normalizes_input() {
        let result = SyntaxScorer.score(" A@X.com ").await;

        assert_eq!(result.email, "a@x.com");
        assert!(result.is_valid);
        assert!(result.checks.syntax);
        assert!(!result.checks.mx_records);
    }
}
