use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::Response;
use jsonwebtoken::{DecodingKey, Validation, decode};

use inspirt_types::models::Claims;

use crate::error::{ApiError, join_blocking};
use crate::state::AppState;

/// Extract and validate the JWT from the Authorization header, then stash
/// the claims in request extensions for handlers downstream.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(ApiError::Auth("Missing authorization header"))?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(ApiError::Auth("Malformed authorization header"))?;

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(state.jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| ApiError::Auth("Invalid or expired token"))?;

    req.extensions_mut().insert(token_data.claims);
    Ok(next.run(req).await)
}

/// Admin gate, layered after `require_auth`. The token's `is_admin` claim
/// alone is not trusted: the live account row is re-read so a revoked flag
/// takes effect before the token expires.
pub async fn require_admin(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let claims = req
        .extensions()
        .get::<Claims>()
        .cloned()
        .ok_or(ApiError::Auth("Missing authorization header"))?;

    if !claims.is_admin {
        return Err(ApiError::Forbidden);
    }

    let db = state.clone();
    let account_id = claims.sub.to_string();
    let row = join_blocking(
        tokio::task::spawn_blocking(move || {
            db.db.get_account_by_id(&account_id).map_err(ApiError::from)
        })
        .await,
    )?;

    match row {
        Some(account) if account.is_admin => Ok(next.run(req).await),
        _ => Err(ApiError::Forbidden),
    }
}
