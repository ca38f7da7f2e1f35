//! Authentication middleware for Axum

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use planledger_billing::Caller;
use serde_json::json;
use sqlx::{FromRow, SqlitePool};

use super::jwt::{JwtError, JwtManager};

/// Database row type for the authenticated user lookup
#[derive(Debug, FromRow)]
struct UserRow {
    id: i64,
    email: String,
    is_admin: bool,
}

/// Authenticated user attached to the request by [`require_auth`]
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: i64,
    pub email: String,
    pub is_admin: bool,
}

impl AuthUser {
    /// Identity handed to the billing core
    pub fn caller(&self) -> Caller {
        Caller {
            user_id: self.user_id,
            is_admin: self.is_admin,
        }
    }
}

/// State needed for authentication
#[derive(Clone)]
pub struct AuthState {
    pub jwt_manager: JwtManager,
    pub pool: SqlitePool,
}

/// Extract bearer token from the Authorization header
fn extract_bearer_token(request: &Request) -> Result<Option<String>, AuthError> {
    let Some(header) = request.headers().get(AUTHORIZATION) else {
        return Ok(None);
    };
    let header = header.to_str().map_err(|_| AuthError::InvalidAuthFormat)?;
    header
        .strip_prefix("Bearer ")
        .map(|token| Some(token.trim().to_string()))
        .ok_or(AuthError::InvalidAuthFormat)
}

/// Middleware that requires authentication
pub async fn require_auth(
    State(auth_state): State<AuthState>,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();

    let auth_result = match extract_bearer_token(&request) {
        Ok(Some(token)) => authenticate_jwt(&auth_state, &token).await,
        Ok(None) => Err(AuthError::MissingAuth),
        Err(err) => Err(err),
    };

    match auth_result {
        Ok(auth_user) => {
            tracing::debug!(
                path = %path,
                user_id = auth_user.user_id,
                is_admin = auth_user.is_admin,
                "require_auth: authentication successful"
            );
            request.extensions_mut().insert(auth_user);
            next.run(request).await
        }
        Err(err) => {
            tracing::warn!(path = %path, error = ?err, "require_auth: authentication failed");
            err.into_response()
        }
    }
}

/// Middleware that requires an admin; must run after [`require_auth`]
pub async fn require_admin(request: Request, next: Next) -> Response {
    let (user_id, is_admin) = match request.extensions().get::<AuthUser>() {
        Some(auth_user) => (auth_user.user_id, auth_user.is_admin),
        None => return AuthError::MissingAuth.into_response(),
    };

    if !is_admin {
        tracing::warn!(
            path = %request.uri().path(),
            user_id,
            "require_admin: non-admin rejected"
        );
        return AuthError::InsufficientPermissions.into_response();
    }

    next.run(request).await
}

async fn authenticate_jwt(auth_state: &AuthState, token: &str) -> Result<AuthUser, AuthError> {
    let claims = auth_state
        .jwt_manager
        .validate_access_token(token)
        .map_err(|e| match e {
            JwtError::Expired => AuthError::ExpiredToken,
            _ => AuthError::InvalidToken,
        })?;

    let user_id = claims.user_id().ok_or(AuthError::InvalidToken)?;

    let user: Option<UserRow> =
        sqlx::query_as("SELECT id, email, is_admin FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&auth_state.pool)
            .await
            .map_err(|e| {
                tracing::error!(error = ?e, user_id, "Failed to load authenticated user");
                AuthError::DatabaseError
            })?;

    // A valid signature for a user that no longer exists is still rejected
    let user = user.ok_or(AuthError::InvalidToken)?;

    Ok(AuthUser {
        user_id: user.id,
        email: user.email,
        is_admin: user.is_admin,
    })
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Missing authentication")]
    MissingAuth,
    #[error("Invalid authentication format")]
    InvalidAuthFormat,
    #[error("Invalid token")]
    InvalidToken,
    #[error("Expired token")]
    ExpiredToken,
    #[error("Insufficient permissions")]
    InsufficientPermissions,
    #[error("Database error")]
    DatabaseError,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthError::MissingAuth => (StatusCode::UNAUTHORIZED, "Authentication required"),
            AuthError::InvalidAuthFormat => {
                (StatusCode::UNAUTHORIZED, "Invalid authentication format")
            }
            AuthError::InvalidToken | AuthError::ExpiredToken => {
                (StatusCode::UNAUTHORIZED, "Invalid or expired token")
            }
            AuthError::InsufficientPermissions => {
                (StatusCode::FORBIDDEN, "Insufficient permissions")
            }
            AuthError::DatabaseError => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };

        let body = Json(json!({
            "error": message,
            "code": status.as_u16()
        }));

        (status, body).into_response()
    }
}
