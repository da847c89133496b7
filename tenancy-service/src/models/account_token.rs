//! One-time account tokens for password reset and email verification.

use chrono::{DateTime, Duration, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use crate::utils::token::{generate_token, hash_token};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenPurpose {
    PasswordReset,
    EmailVerification,
}

impl TokenPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenPurpose::PasswordReset => "password_reset",
            TokenPurpose::EmailVerification => "email_verification",
        }
    }

    pub fn lifetime(&self) -> Duration {
        match self {
            TokenPurpose::PasswordReset => Duration::hours(1),
            TokenPurpose::EmailVerification => Duration::hours(24),
        }
    }
}

/// Stored token; only the SHA-256 digest of the secret is kept.
#[derive(Debug, Clone, FromRow)]
pub struct AccountToken {
    pub token_id: Uuid,
    pub account_id: Uuid,
    pub purpose_code: String,
    pub token_hash: String,
    pub expiry_utc: DateTime<Utc>,
    pub created_utc: DateTime<Utc>,
}

impl AccountToken {
    /// Returns the row to store and the raw secret to mail out.
    pub fn issue(account_id: Uuid, purpose: TokenPurpose) -> (Self, String) {
        let raw = generate_token();
        let now = Utc::now();
        let token = Self {
            token_id: Uuid::new_v4(),
            account_id,
            purpose_code: purpose.as_str().to_string(),
            token_hash: hash_token(&raw),
            expiry_utc: now + purpose.lifetime(),
            created_utc: now,
        };
        (token, raw)
    }

    pub fn is_for(&self, purpose: TokenPurpose) -> bool {
        self.purpose_code == purpose.as_str()
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expiry_utc
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_token_stores_only_the_digest() {
        let (token, raw) = AccountToken::issue(Uuid::new_v4(), TokenPurpose::PasswordReset);
        assert_ne!(token.token_hash, raw);
        assert_eq!(token.token_hash, hash_token(&raw));
        assert!(token.is_for(TokenPurpose::PasswordReset));
        assert!(!token.is_expired());
    }

    #[test]
    fn reset_tokens_expire_sooner_than_verification_tokens() {
        assert!(TokenPurpose::PasswordReset.lifetime() < TokenPurpose::EmailVerification.lifetime());
    }
}
