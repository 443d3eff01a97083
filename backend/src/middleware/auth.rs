//! Authentication middleware
//!
//! Bearer token verification and permission checks. Tokens are issued by the
//! identity service; this server only verifies them with the shared secret.

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, errors::ErrorKind, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use shared::{permission_claim, Action, Resource};

use crate::error::AppError;
use crate::AppState;

/// Authenticated user information extracted from JWT
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub user_id: String,
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
}

impl AuthUser {
    /// Check if user has a specific permission
    pub fn has_permission(&self, resource: Resource, action: Action) -> bool {
        let permission = permission_claim(resource, action);
        self.permissions.contains(&permission)
    }
}

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub permissions: Vec<String>,
    pub exp: i64,
}

/// Validates the bearer token and stores the [`AuthUser`] in request extensions
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::Unauthorized("Missing or invalid Authorization header".to_string()))?;

    let claims = decode_jwt(token, &state.config.jwt.secret)?;

    let auth_user = AuthUser {
        user_id: claims.sub,
        roles: claims.roles,
        permissions: claims.permissions,
    };
    tracing::debug!(user_id = %auth_user.user_id, "Authenticated request");

    request.extensions_mut().insert(auth_user);
    Ok(next.run(request).await)
}

/// Decode and validate JWT token
pub fn decode_jwt(token: &str, secret: &str) -> Result<Claims, AppError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => AppError::TokenExpired,
        _ => AppError::InvalidToken,
    })
}

/// Extractor for authenticated user
/// Use this in handlers to get the current user
#[derive(Clone, Debug)]
pub struct CurrentUser(pub AuthUser);

#[axum::async_trait]
impl<S> axum::extract::FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .map(CurrentUser)
            .ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()))
    }
}

/// Permission guard for use in handlers
pub fn check_permission(user: &AuthUser, resource: Resource, action: Action) -> Result<(), AppError> {
    if user.has_permission(resource, action) {
        Ok(())
    } else {
        Err(AppError::InsufficientPermissions(permission_claim(resource, action)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    const SECRET: &str = "test-secret";

    fn token(exp_offset_secs: i64, permissions: &[&str]) -> String {
        let claims = Claims {
            sub: "user-1".to_string(),
            roles: vec!["pharmacist".to_string()],
            permissions: permissions.iter().map(|p| p.to_string()).collect(),
            exp: chrono::Utc::now().timestamp() + exp_offset_secs,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn test_decode_valid_token() {
        let claims = decode_jwt(&token(3600, &["sale:create"]), SECRET).unwrap();
        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.permissions, vec!["sale:create".to_string()]);
    }

    #[test]
    fn test_expired_token() {
        let result = decode_jwt(&token(-3600, &[]), SECRET);
        assert!(matches!(result, Err(AppError::TokenExpired)));
    }

    #[test]
    fn test_wrong_secret() {
        let result = decode_jwt(&token(3600, &[]), "other-secret");
        assert!(matches!(result, Err(AppError::InvalidToken)));
    }

    #[test]
    fn test_check_permission() {
        let user = AuthUser {
            user_id: "user-1".to_string(),
            roles: vec![],
            permissions: vec!["sale:read".to_string(), "sale:create".to_string()],
        };
        assert!(check_permission(&user, Resource::Sale, Action::Create).is_ok());
        assert!(matches!(
            check_permission(&user, Resource::Sale, Action::Delete),
            Err(AppError::InsufficientPermissions(ref claim)) if claim == "sale:delete"
        ));
        assert!(!user.has_permission(Resource::Stock, Action::Update));
    }
}
