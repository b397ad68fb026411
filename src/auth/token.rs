use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::auth::{AuthError, Result};
use crate::models::UserAccount;

/// JWT claims carried by a session token
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionClaims {
    /// User id
    pub sub: String,
    pub email: String,
    pub username: String,
    /// Issued at (unix seconds)
    pub iat: i64,
    /// Expires at (unix seconds)
    pub exp: i64,
}

/// Identity recovered from a verified session token
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionIdentity {
    pub user_id: String,
    pub email: String,
    pub username: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Issued session token together with its expiry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionToken {
    pub token: String,
    pub token_type: String,
    pub expires_at: DateTime<Utc>,
}

/// HS256 signer for stateless session tokens.
///
/// Expiry is checked against the caller-supplied time rather than the
/// library's wall clock, so the service clock stays authoritative.
#[derive(Clone)]
pub struct SessionSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl std::fmt::Debug for SessionSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionSigner").field("ttl", &self.ttl).finish_non_exhaustive()
    }
}

impl SessionSigner {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl,
        }
    }

    /// Sign a token for the account, valid from `now` for the configured ttl
    pub fn issue(&self, account: &UserAccount, now: DateTime<Utc>) -> Result<SessionToken> {
        let expires_at = now + self.ttl;
        let claims = SessionClaims {
            sub: account.id.clone(),
            email: account.email.clone(),
            username: account.username.clone(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::Internal(format!("Failed to sign session token: {}", e)))?;

        Ok(SessionToken {
            token,
            token_type: "Bearer".to_string(),
            expires_at,
        })
    }

    /// Verify signature and expiry, returning the embedded identity
    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<SessionIdentity> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.required_spec_claims.clear();
        validation.required_spec_claims.insert("exp".to_string());
        validation.required_spec_claims.insert("sub".to_string());

        let data = decode::<SessionClaims>(token.trim(), &self.decoding, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::InvalidSignature => AuthError::TokenInvalid("signature mismatch".to_string()),
                _ => AuthError::TokenInvalid(e.to_string()),
            }
        })?;
        let claims = data.claims;

        if now.timestamp() >= claims.exp {
            return Err(AuthError::TokenExpired);
        }

        let issued_at = timestamp_to_datetime(claims.iat)?;
        let expires_at = timestamp_to_datetime(claims.exp)?;

        Ok(SessionIdentity {
            user_id: claims.sub,
            email: claims.email,
            username: claims.username,
            issued_at,
            expires_at,
        })
    }
}

fn timestamp_to_datetime(secs: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .ok_or_else(|| AuthError::TokenInvalid(format!("timestamp out of range: {}", secs)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account() -> UserAccount {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        UserAccount {
            id: "c0ffee".to_string(),
            username: "jdoe".to_string(),
            email: "jdoe@pd15.org".to_string(),
            password_hash: String::new(),
            salt: String::new(),
            verified: true,
            created_at: now,
            last_login: None,
        }
    }

    fn signer(secret: &str) -> SessionSigner {
        SessionSigner::new(secret.as_bytes(), Duration::hours(24))
    }

    #[test]
    fn issued_token_verifies_until_expiry() {
        let issued = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        let signer = signer("0123456789abcdef0123456789abcdef");
        let token = signer.issue(&account(), issued).unwrap();
        assert_eq!(token.expires_at, issued + Duration::hours(24));

        let identity = signer.verify(&token.token, issued + Duration::hours(23)).unwrap();
        assert_eq!(identity.user_id, "c0ffee");
        assert_eq!(identity.email, "jdoe@pd15.org");
        assert_eq!(identity.issued_at, issued);

        let err = signer.verify(&token.token, issued + Duration::hours(24)).unwrap_err();
        assert_eq!(err, AuthError::TokenExpired);
    }

    #[test]
    fn token_signed_with_other_secret_is_invalid() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        let token = signer("0123456789abcdef0123456789abcdef")
            .issue(&account(), now)
            .unwrap();

        let err = signer("ffffffffffffffffffffffffffffffff")
            .verify(&token.token, now)
            .unwrap_err();
        assert!(matches!(err, AuthError::TokenInvalid(_)));
    }

    #[test]
    fn garbage_token_is_invalid() {
        let now = Utc::now();
        let err = signer("0123456789abcdef0123456789abcdef")
            .verify("not.a.jwt", now)
            .unwrap_err();
        assert!(matches!(err, AuthError::TokenInvalid(_)));
    }
}
