use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::Response,
};
use service_core::error::AppError;
use uuid::Uuid;

use crate::{services::AccessTokenClaims, AppState};

/// Requires a valid, unrevoked session.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(&req)
        .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("Missing or invalid Authorization header")))?
        .to_string();

    let claims = authenticate(&state, &token).await?;
    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}

/// Attaches the session when one is presented. A presented but invalid
/// token is still rejected.
pub async fn optional_auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    if let Some(token) = bearer_token(&req).map(str::to_string) {
        let claims = authenticate(&state, &token).await?;
        req.extensions_mut().insert(claims);
    }

    Ok(next.run(req).await)
}

fn bearer_token(req: &Request) -> Option<&str> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
}

async fn authenticate(state: &AppState, token: &str) -> Result<AccessTokenClaims, AppError> {
    let claims = state
        .jwt
        .validate_access_token(token)
        .map_err(|_| AppError::Unauthorized(anyhow::anyhow!("Invalid or expired token")))?;

    // Fail closed when the revocation list is unreachable.
    let is_blacklisted = state.blacklist.is_blacklisted(&claims.jti).await.map_err(|e| {
        tracing::error!(error = %e, "Failed to check session revocation");
        AppError::InternalError(e)
    })?;

    if is_blacklisted {
        return Err(AppError::Unauthorized(anyhow::anyhow!("Token has been revoked")));
    }

    Ok(claims)
}

/// The signed-in account of a session-protected route.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub account_id: Uuid,
    pub claims: AccessTokenClaims,
}

impl AuthUser {
    fn from_claims(claims: &AccessTokenClaims) -> Result<Self, AppError> {
        let account_id = claims
            .account_id()
            .map_err(AppError::Unauthorized)?;
        Ok(Self {
            account_id,
            claims: claims.clone(),
        })
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let claims = parts.extensions.get::<AccessTokenClaims>().ok_or_else(|| {
            AppError::InternalError(anyhow::anyhow!("Auth claims missing from request extensions"))
        })?;
        AuthUser::from_claims(claims)
    }
}

/// The signed-in account, if any, behind [`optional_auth_middleware`].
#[derive(Debug, Clone)]
pub struct MaybeAuthUser(pub Option<AuthUser>);

#[axum::async_trait]
impl<S> FromRequestParts<S> for MaybeAuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AccessTokenClaims>()
            .map(AuthUser::from_claims)
            .transpose()
            .map(MaybeAuthUser)
    }
}
