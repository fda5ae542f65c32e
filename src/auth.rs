use std::convert::Infallible;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, HeaderValue, header, request::Parts},
};
use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    config::{AppConfig, Env},
    error::{AppError, Result},
    models::Role,
    repository::RepositoryState,
};

/// Name of the cookie carrying the session JWT for browser clients.
pub const SESSION_COOKIE: &str = "session_token";

/// Claims
///
/// Payload of a session token. Only the subject is trusted; the role is always
/// reloaded from the database so promotions and demotions apply immediately.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): the user's id.
    pub sub: Uuid,
    /// Expiration Time (exp), seconds since the epoch.
    pub exp: usize,
    /// Issued At (iat), seconds since the epoch.
    pub iat: usize,
}

/// issue_token
///
/// Signs an HS256 session token for `user_id`, valid for the configured TTL.
pub fn issue_token(user_id: Uuid, config: &AppConfig) -> Result<String> {
    let now = Utc::now().timestamp() as usize;
    let claims = Claims {
        sub: user_id,
        iat: now,
        exp: now + config.session_ttl_secs as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("failed to sign session token: {e}")))
}

/// Validates signature and expiry, returning the subject.
fn decode_subject(token: &str, secret: &str) -> Option<Uuid> {
    let mut validation = Validation::default();
    validation.validate_exp = true;

    match decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation) {
        Ok(data) => Some(data.claims.sub),
        Err(e) => {
            tracing::debug!(error = %e, "rejected session token");
            None
        }
    }
}

/// Bearer header first, then the session cookie.
fn token_from_headers(headers: &HeaderMap) -> Option<&str> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    bearer.or_else(|| {
        headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(';'))
            .find_map(|pair| {
                let (name, value) = pair.trim().split_once('=')?;
                // RFC 6265 allows the value in double quotes.
                let value = value
                    .strip_prefix('"')
                    .and_then(|v| v.strip_suffix('"'))
                    .unwrap_or(value);
                (name == SESSION_COOKIE && !value.is_empty()).then_some(value)
            })
    })
}

/// session_cookie
///
/// `Set-Cookie` value that stores the token. `Secure` is only added in
/// production so local HTTP development keeps working.
pub fn session_cookie(token: &str, config: &AppConfig) -> Result<HeaderValue> {
    let mut cookie = format!(
        "{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        config.session_ttl_secs
    );
    if config.env == Env::Production {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie).map_err(|e| AppError::Internal(e.to_string()))
}

/// `Set-Cookie` value that expires the session cookie.
pub fn clear_session_cookie() -> HeaderValue {
    HeaderValue::from_static("session_token=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}

/// hash_password
///
/// Argon2id with a random salt. Runs on the blocking pool since hashing is
/// deliberately slow.
pub async fn hash_password(password: String) -> Result<String> {
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AppError::Internal(format!("password hashing failed: {e}")))
    })
    .await
    .map_err(|e| AppError::Internal(e.to_string()))?
}

/// verify_password
///
/// A malformed stored hash counts as a mismatch.
pub async fn verify_password(password: String, hash: String) -> Result<bool> {
    tokio::task::spawn_blocking(move || {
        let Ok(parsed) = PasswordHash::new(&hash) else {
            return false;
        };
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    })
    .await
    .map_err(|e| AppError::Internal(e.to_string()))
}

/// AuthUser Extractor Result
///
/// The resolved identity of an authenticated request: the user's id and the
/// role currently stored in the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser {
    pub id: Uuid,
    pub role: Role,
}

impl AuthUser {
    /// Ok for ADMIN and SUPER_ADMIN, 403 otherwise.
    pub fn require_staff(&self) -> Result<()> {
        if self.role.is_staff() {
            Ok(())
        } else {
            Err(AppError::Forbidden("Forbidden".to_string()))
        }
    }

    pub fn require_super_admin(&self) -> Result<()> {
        if self.role.is_super_admin() {
            Ok(())
        } else {
            Err(AppError::Forbidden("Forbidden".to_string()))
        }
    }
}

/// resolve_session
///
/// Shared by both extractors:
/// 1. Local bypass: an `x-user-id` header naming an existing user (Env::Local only).
/// 2. Token from the Bearer header or the session cookie.
/// 3. Database lookup, so deleted users are rejected and roles are fresh.
async fn resolve_session(
    parts: &Parts,
    repo: &RepositoryState,
    config: &AppConfig,
) -> Result<Option<AuthUser>> {
    if config.env == Env::Local {
        let bypass = parts
            .headers
            .get("x-user-id")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| Uuid::parse_str(value).ok());

        if let Some(user_id) = bypass {
            if let Some(user) = repo.get_user(user_id).await? {
                return Ok(Some(AuthUser {
                    id: user.id,
                    role: user.role,
                }));
            }
        }
    }

    let Some(token) = token_from_headers(&parts.headers) else {
        return Ok(None);
    };
    let Some(user_id) = decode_subject(token, &config.jwt_secret) else {
        return Ok(None);
    };

    Ok(repo.get_user(user_id).await?.map(|user| AuthUser {
        id: user.id,
        role: user.role,
    }))
}

/// AuthUser Extractor Implementation
///
/// Rejects with 401 `{"error": "Unauthorized"}` when there is no valid session.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self> {
        let repo = RepositoryState::from_ref(state);
        let config = AppConfig::from_ref(state);

        resolve_session(parts, &repo, &config)
            .await?
            .ok_or_else(|| AppError::Unauthorized("Unauthorized".to_string()))
    }
}

/// MaybeUser
///
/// Optional identity for public endpoints that personalise their output
/// (`likedByUser`, staff-only filters). Never rejects.
#[derive(Debug, Clone, Copy, Default)]
pub struct MaybeUser(pub Option<AuthUser>);

impl MaybeUser {
    pub fn id(&self) -> Option<Uuid> {
        self.0.map(|user| user.id)
    }

    pub fn is_staff(&self) -> bool {
        self.0.is_some_and(|user| user.role.is_staff())
    }
}

impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> std::result::Result<Self, Infallible> {
        let repo = RepositoryState::from_ref(state);
        let config = AppConfig::from_ref(state);

        match resolve_session(parts, &repo, &config).await {
            Ok(user) => Ok(MaybeUser(user)),
            Err(e) => {
                tracing::warn!(error = %e, "session lookup failed; treating request as anonymous");
                Ok(MaybeUser(None))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_round_trips_through_decode() {
        let config = AppConfig::default();
        let id = Uuid::new_v4();
        let token = issue_token(id, &config).unwrap();
        assert_eq!(decode_subject(&token, &config.jwt_secret), Some(id));
        assert_eq!(decode_subject(&token, "another-secret"), None);
    }

    #[test]
    fn cookie_is_used_when_no_bearer_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; session_token=abc.def.ghi"),
        );
        assert_eq!(token_from_headers(&headers), Some("abc.def.ghi"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer xyz"));
        assert_eq!(token_from_headers(&headers), Some("xyz"));
    }

    #[test]
    fn quoted_cookie_value_is_unquoted() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("session_token=\"abc.def.ghi\"; theme=dark"),
        );
        assert_eq!(token_from_headers(&headers), Some("abc.def.ghi"));

        headers.insert(header::COOKIE, HeaderValue::from_static("session_token=\"\""));
        assert_eq!(token_from_headers(&headers), None);
    }

    #[test]
    fn secure_flag_only_in_production() {
        let local = AppConfig::default();
        let cookie = session_cookie("t", &local).unwrap();
        assert!(!cookie.to_str().unwrap().contains("Secure"));

        let production = AppConfig {
            env: Env::Production,
            ..AppConfig::default()
        };
        let cookie = session_cookie("t", &production).unwrap();
        assert!(cookie.to_str().unwrap().contains("; Secure"));
    }

    #[tokio::test]
    async fn password_hash_verifies() {
        let hash = hash_password("hunter22".into()).await.unwrap();
        assert!(verify_password("hunter22".into(), hash.clone()).await.unwrap());
        assert!(!verify_password("hunter23".into(), hash).await.unwrap());
        assert!(!verify_password("x".into(), "not-a-hash".into()).await.unwrap());
    }
}
