use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use tracing::warn;
use uuid::Uuid;

use super::jwt::{JwtKeys, TokenError};
use crate::error::AppError;

/// Identity of a request that passed the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser(pub Uuid);

/// Pulls the token out of `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, TokenError> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or(TokenError::Missing)?
        .to_str()
        .map_err(|_| TokenError::Malformed)?;
    let (scheme, token) = value.trim().split_once(' ').ok_or(TokenError::Malformed)?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(TokenError::Malformed);
    }
    let token = token.trim();
    if token.is_empty() {
        return Err(TokenError::Missing);
    }
    Ok(token)
}

pub fn authenticate(headers: &HeaderMap, keys: &JwtKeys) -> Result<AuthUser, TokenError> {
    let token = bearer_token(headers)?;
    let claims = keys.verify(token).map_err(|e| {
        warn!(reason = %e, "rejected bearer token");
        e
    })?;
    Ok(AuthUser(claims.sub))
}

/// Gateway layer for protected routers. On failure the inner handler never runs.
pub async fn require_auth(
    State(keys): State<JwtKeys>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let user = authenticate(req.headers(), &keys)?;
    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthUser>() {
            return Ok(*user);
        }
        let keys = JwtKeys::from_ref(state);
        Ok(authenticate(&parts.headers, &keys)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JwtConfig;
    use axum::http::HeaderValue;

    fn keys(secret: &str) -> JwtKeys {
        JwtKeys::new(&JwtConfig {
            secret: secret.into(),
            issuer: "iss".into(),
            audience: "aud".into(),
            ttl_minutes: Some(5),
        })
    }

    fn headers(value: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        h
    }

    #[test]
    fn bearer_token_parsing() {
        assert_eq!(bearer_token(&headers("Bearer abc")).unwrap(), "abc");
        assert_eq!(bearer_token(&headers("bearer abc")).unwrap(), "abc");
        assert_eq!(bearer_token(&HeaderMap::new()).unwrap_err(), TokenError::Missing);
        assert_eq!(bearer_token(&headers("Basic abc")).unwrap_err(), TokenError::Malformed);
        assert_eq!(bearer_token(&headers("abc")).unwrap_err(), TokenError::Malformed);
    }

    #[test]
    fn authenticate_accepts_valid_and_rejects_foreign_tokens() {
        let k = keys("secret");
        let id = Uuid::new_v4();
        let token = k.issue(id).unwrap();
        let ok = authenticate(&headers(&format!("Bearer {token}")), &k).unwrap();
        assert_eq!(ok, AuthUser(id));

        let err = authenticate(&headers(&format!("Bearer {token}")), &keys("other")).unwrap_err();
        assert_eq!(err, TokenError::BadSignature);
    }
}
