use std::collections::HashSet;

use jsonwebtoken::{
    decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use crate::config::JwtConfig;

/// JWT payload. `exp` is absent when tokens are configured not to expire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub iat: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<u64>,
    pub iss: String,
    pub aud: String,
}

/// Why a presented token was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("Missing Authorization header")]
    Missing,
    #[error("Malformed token")]
    Malformed,
    #[error("Invalid token signature")]
    BadSignature,
    #[error("Token expired")]
    Expired,
    #[error("Token issuer or audience mismatch")]
    InvalidClaims,
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        match e.kind() {
            ErrorKind::InvalidSignature => TokenError::BadSignature,
            ErrorKind::ExpiredSignature => TokenError::Expired,
            ErrorKind::InvalidIssuer | ErrorKind::InvalidAudience | ErrorKind::InvalidSubject => {
                TokenError::InvalidClaims
            }
            _ => TokenError::Malformed,
        }
    }
}

/// Signing and verification keys, built once from config at startup.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    audience: String,
    ttl: Option<TimeDuration>,
}

impl JwtKeys {
    pub fn new(cfg: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            ttl: cfg.ttl_minutes.map(TimeDuration::minutes),
        }
    }

    pub fn issue(&self, user_id: Uuid) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let claims = Claims {
            sub: user_id,
            iat: now.unix_timestamp() as u64,
            exp: self.ttl.map(|ttl| (now + ttl).unix_timestamp() as u64),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(user_id = %user_id, "jwt signed");
        Ok(token)
    }

    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        if token.trim().is_empty() {
            return Err(TokenError::Missing);
        }
        let data = decode::<Claims>(token, &self.decoding, &self.validation())?;
        debug!(user_id = %data.claims.sub, "jwt verified");
        Ok(data.claims)
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::default();
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        let mut required: HashSet<String> = ["sub", "iss", "aud"].map(String::from).into();
        if self.ttl.is_some() {
            required.insert("exp".into());
        }
        validation.required_spec_claims = required;
        validation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(secret: &str, issuer: &str, audience: &str, ttl_minutes: Option<i64>) -> JwtConfig {
        JwtConfig {
            secret: secret.into(),
            issuer: issuer.into(),
            audience: audience.into(),
            ttl_minutes,
        }
    }

    fn make_keys(secret: &str) -> JwtKeys {
        JwtKeys::new(&cfg(secret, "test-issuer", "test-aud", Some(5)))
    }

    #[test]
    fn issue_and_verify_roundtrip() {
        let keys = make_keys("dev-secret");
        let user_id = Uuid::new_v4();
        let token = keys.issue(user_id).expect("issue");
        let claims = keys.verify(&token).expect("verify token");
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.iss, "test-issuer");
        assert_eq!(claims.aud, "test-aud");
        assert!(claims.exp.is_some());
    }

    #[test]
    fn non_expiring_tokens_carry_no_exp() {
        let keys = JwtKeys::new(&cfg("dev-secret", "iss", "aud", None));
        let user_id = Uuid::new_v4();
        let token = keys.issue(user_id).unwrap();
        let claims = keys.verify(&token).unwrap();
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.exp, None);
    }

    #[test]
    fn tampered_signature_is_rejected() {
        let keys = make_keys("dev-secret");
        let token = keys.issue(Uuid::new_v4()).unwrap();
        let (head, sig) = token.rsplit_once('.').unwrap();
        let mut sig: Vec<char> = sig.chars().collect();
        sig[5] = if sig[5] == 'A' { 'B' } else { 'A' };
        let tampered = format!("{head}.{}", sig.into_iter().collect::<String>());
        assert_eq!(keys.verify(&tampered).unwrap_err(), TokenError::BadSignature);
    }

    #[test]
    fn token_from_other_secret_is_rejected() {
        let token = make_keys("secret-a").issue(Uuid::new_v4()).unwrap();
        assert_eq!(
            make_keys("secret-b").verify(&token).unwrap_err(),
            TokenError::BadSignature
        );
    }

    #[test]
    fn expired_token_is_rejected() {
        let keys = make_keys("dev-secret");
        let now = OffsetDateTime::now_utc().unix_timestamp() as u64;
        let claims = Claims {
            sub: Uuid::new_v4(),
            iat: now - 7200,
            exp: Some(now - 3600),
            iss: "test-issuer".into(),
            aud: "test-aud".into(),
        };
        let token = encode(&Header::default(), &claims, &keys.encoding).unwrap();
        assert_eq!(keys.verify(&token).unwrap_err(), TokenError::Expired);
    }

    #[test]
    fn wrong_issuer_or_audience_is_rejected() {
        let token = JwtKeys::new(&cfg("same", "good-iss", "good-aud", Some(5)))
            .issue(Uuid::new_v4())
            .unwrap();
        let err = JwtKeys::new(&cfg("same", "bad-iss", "bad-aud", Some(5)))
            .verify(&token)
            .unwrap_err();
        assert_eq!(err, TokenError::InvalidClaims);
    }

    #[test]
    fn garbage_and_empty_tokens_are_rejected() {
        let keys = make_keys("dev-secret");
        assert_eq!(keys.verify("not.a.jwt").unwrap_err(), TokenError::Malformed);
        assert_eq!(keys.verify("garbage").unwrap_err(), TokenError::Malformed);
        assert_eq!(keys.verify("").unwrap_err(), TokenError::Missing);
    }
}
