use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::config::JwtConfig;

/// Issues and validates session tokens.
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_token_expiry_minutes: i64,
}

/// Claims of a session token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    /// Account id
    pub sub: String,
    pub exp: i64,
    pub iat: i64,
    /// Token id, the key of the revocation list
    pub jti: String,
}

impl AccessTokenClaims {
    pub fn account_id(&self) -> Result<Uuid, anyhow::Error> {
        Uuid::parse_str(&self.sub).map_err(|e| anyhow::anyhow!("Invalid subject claim: {}", e))
    }

    /// Seconds until expiry, at least 1.
    pub fn remaining_seconds(&self) -> i64 {
        (self.exp - Utc::now().timestamp()).max(1)
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

impl JwtService {
    pub fn new(config: &JwtConfig) -> Self {
        tracing::info!("JWT service initialized with HS256 secret");

        Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            access_token_expiry_minutes: config.access_token_expiry_minutes,
        }
    }

    pub fn generate_access_token(&self, account_id: Uuid) -> Result<String, anyhow::Error> {
        let now = Utc::now();
        let exp = now + Duration::minutes(self.access_token_expiry_minutes);

        let claims = AccessTokenClaims {
            sub: account_id.to_string(),
            exp: exp.timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| anyhow::anyhow!("Failed to encode access token: {}", e))
    }

    /// Signs a session for `account_id` and wraps it for the client.
    pub fn issue_session(&self, account_id: Uuid) -> Result<TokenResponse, anyhow::Error> {
        Ok(TokenResponse {
            access_token: self.generate_access_token(account_id)?,
            token_type: "Bearer".to_string(),
            expires_in: self.access_token_expiry_seconds(),
        })
    }

    pub fn validate_access_token(&self, token: &str) -> Result<AccessTokenClaims, anyhow::Error> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;

        let token_data = decode::<AccessTokenClaims>(token, &self.decoding_key, &validation)
            .map_err(|e| anyhow::anyhow!("Invalid access token: {}", e))?;

        Ok(token_data.claims)
    }

    pub fn access_token_expiry_seconds(&self) -> i64 {
        self.access_token_expiry_minutes * 60
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> JwtService {
        JwtService::new(&JwtConfig {
            secret: "test-secret-that-is-long-enough-for-hs256".to_string(),
            access_token_expiry_minutes: 15,
        })
    }

    #[test]
    fn test_access_token_generation_and_validation() -> Result<(), anyhow::Error> {
        let service = service();
        let account_id = Uuid::new_v4();

        let token = service.generate_access_token(account_id)?;
        let claims = service.validate_access_token(&token)?;

        assert_eq!(claims.account_id()?, account_id);
        assert!(claims.remaining_seconds() > 0);
        Ok(())
    }

    #[test]
    fn tokens_get_distinct_ids() -> Result<(), anyhow::Error> {
        let service = service();
        let account_id = Uuid::new_v4();
        let first = service.validate_access_token(&service.generate_access_token(account_id)?)?;
        let second = service.validate_access_token(&service.generate_access_token(account_id)?)?;
        assert_ne!(first.jti, second.jti);
        Ok(())
    }

    #[test]
    fn token_signed_with_another_secret_is_rejected() -> Result<(), anyhow::Error> {
        let other = JwtService::new(&JwtConfig {
            secret: "another-secret-that-is-long-enough-too".to_string(),
            access_token_expiry_minutes: 15,
        });
        let token = other.generate_access_token(Uuid::new_v4())?;
        assert!(service().validate_access_token(&token).is_err());
        Ok(())
    }

    #[test]
    fn session_reports_expiry_in_seconds() -> Result<(), anyhow::Error> {
        let session = service().issue_session(Uuid::new_v4())?;
        assert_eq!(session.token_type, "Bearer");
        assert_eq!(session.expires_in, 900);
        Ok(())
    }
}
