use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{entities::user, errors::ServiceError, AppState};

/// Claim structure for session tokens minted after a LINE sign-in
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    pub line_user_id: String,
    pub name: String,
    pub is_admin: bool,
    /// Issued at time
    pub iat: i64,
    /// Expiration time
    pub exp: i64,
}

/// Authenticated user data extracted from the session token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub line_user_id: String,
    pub name: String,
    pub is_admin: bool,
}

/// Authenticated user that passed the admin gate
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthUser);

/// Issues and validates HS256 session tokens.
#[derive(Clone)]
pub struct AuthService {
    jwt_secret: String,
    token_lifetime: Duration,
}

impl AuthService {
    pub fn new(jwt_secret: String, token_lifetime_secs: usize) -> Self {
        Self {
            jwt_secret,
            token_lifetime: Duration::seconds(token_lifetime_secs as i64),
        }
    }

    /// Mint a session token for a signed-in user.
    pub fn issue_token(&self, user: &user::Model) -> Result<String, ServiceError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id.to_string(),
            line_user_id: user.line_user_id.clone(),
            name: user.display_name.clone(),
            is_admin: user.is_admin,
            iat: now.timestamp(),
            exp: (now + self.token_lifetime).timestamp(),
        };

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
        .map_err(|e| ServiceError::InternalError(format!("token creation failed: {}", e)))
    }

    /// Validate a session token and extract the authenticated user.
    pub fn validate_token(&self, token: &str) -> Result<AuthUser, ServiceError> {
        let claims = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &Validation::new(Algorithm::HS256),
        )
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                ServiceError::Unauthorized("session expired".to_string())
            }
            _ => ServiceError::Unauthorized("invalid session token".to_string()),
        })?
        .claims;

        let user_id = Uuid::parse_str(&claims.sub)
            .map_err(|_| ServiceError::Unauthorized("invalid session token".to_string()))?;

        Ok(AuthUser {
            user_id,
            line_user_id: claims.line_user_id,
            name: claims.name,
            is_admin: claims.is_admin,
        })
    }

    pub fn token_lifetime_secs(&self) -> i64 {
        self.token_lifetime.num_seconds()
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
}

#[async_trait::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ServiceError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .ok_or_else(|| ServiceError::Unauthorized("missing bearer token".to_string()))?;
        state.auth.validate_token(token)
    }
}

#[async_trait::async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ServiceError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if !user.is_admin {
            return Err(ServiceError::Forbidden(
                "admin privileges required".to_string(),
            ));
        }
        Ok(AdminUser(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_user(is_admin: bool) -> user::Model {
        user::Model {
            id: Uuid::new_v4(),
            line_user_id: "U1234567890".into(),
            display_name: "Somchai".into(),
            picture_url: None,
            email: None,
            is_admin,
            last_login_at: None,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    #[test]
    fn token_round_trip() {
        let service = AuthService::new("a-secret-that-is-only-used-in-unit-tests".into(), 3600);
        let user = test_user(true);

        let token = service.issue_token(&user).expect("token");
        let auth = service.validate_token(&token).expect("claims");

        assert_eq!(auth.user_id, user.id);
        assert_eq!(auth.line_user_id, user.line_user_id);
        assert!(auth.is_admin);
    }

    #[test]
    fn tampered_token_is_rejected() {
        let service = AuthService::new("a-secret-that-is-only-used-in-unit-tests".into(), 3600);
        let other = AuthService::new("a-different-secret-entirely-for-testing".into(), 3600);
        let token = service.issue_token(&test_user(false)).expect("token");

        assert!(other.validate_token(&token).is_err());
        assert!(service.validate_token("garbage.token.here").is_err());
    }
}
