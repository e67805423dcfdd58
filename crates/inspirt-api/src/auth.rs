use argon2::password_hash::{SaltString, rand_core::OsRng};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use uuid::Uuid;

use inspirt_types::api::{
    AuthResponse, LoginRequest, RegisterRequest, ValidateCodeRequest, ValidateCodeResponse,
};
use inspirt_types::models::Claims;

use crate::error::ApiError;
use crate::state::AppState;

/// POST /auth/validate-code — the access gate. A used or unknown code is a
/// 400, and any lookup failure is treated as invalid rather than a 500.
pub async fn validate_code(
    State(state): State<AppState>,
    Json(req): Json<ValidateCodeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.code.is_empty() {
        return Err(ApiError::Validation("Access code is required".into()));
    }

    let valid = state.db.validate_access_code(&req.code).unwrap_or(false);
    if valid {
        Ok(Json(ValidateCodeResponse { valid: true }))
    } else {
        Err(ApiError::Validation(
            "Invalid or already used access code".into(),
        ))
    }
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if !req.email.contains('@') {
        return Err(ApiError::Validation("Invalid email address".into()));
    }
    if req.password.len() < 8 {
        return Err(ApiError::Validation(
            "Password must be at least 8 characters".into(),
        ));
    }
    if req.access_code.is_empty() {
        return Err(ApiError::Validation("Access code is required".into()));
    }

    if !state.db.validate_access_code(&req.access_code).unwrap_or(false) {
        return Err(ApiError::Validation(
            "Invalid or already used access code".into(),
        ));
    }

    if state.db.get_account_by_email(&req.email)?.is_some() {
        return Err(ApiError::Validation("User already exists".into()));
    }

    // Hash password with Argon2id
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Password hashing failed: {}", e))?
        .to_string();

    let account_id = Uuid::new_v4();
    let row = state
        .db
        .create_account(&account_id.to_string(), &req.email, &password_hash, false)?;

    // No compensating action if this fails after the account write — the
    // code simply stays unconsumed.
    state
        .db
        .mark_access_code_used(&req.access_code, &account_id.to_string())?;

    let account = row.into_account();
    let token = create_token(&state.jwt_secret, &account)?;

    Ok((StatusCode::CREATED, Json(AuthResponse { account, token })))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let row = state
        .db
        .get_account_by_email(&req.email)?
        .ok_or(ApiError::Auth("Invalid credentials"))?;

    let parsed_hash = PasswordHash::new(&row.password)
        .map_err(|e| anyhow::anyhow!("Stored hash unparseable: {}", e))?;

    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| ApiError::Auth("Invalid credentials"))?;

    let account = row.into_account();
    let token = create_token(&state.jwt_secret, &account)?;

    Ok(Json(AuthResponse { account, token }))
}

fn create_token(
    secret: &str,
    account: &inspirt_types::models::Account,
) -> anyhow::Result<String> {
    let claims = Claims {
        sub: account.id,
        email: account.email.clone(),
        is_admin: account.is_admin,
        exp: (chrono::Utc::now() + chrono::Duration::days(30)).timestamp() as usize,
    };

    let token = jsonwebtoken::encode(
        &jsonwebtoken::Header::default(),
        &claims,
        &jsonwebtoken::EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::test_state;

    #[tokio::test]
    async fn register_consumes_the_access_code() {
        let state = test_state();
        state.db.create_access_code("ac1", "EARLY-BIRD").unwrap();

        let req = RegisterRequest {
            email: "june@example.com".into(),
            password: "correct horse".into(),
            access_code: "EARLY-BIRD".into(),
        };
        register(State(state.clone()), Json(req)).await.unwrap();

        // the same code can never gate a second registration
        let req = RegisterRequest {
            email: "other@example.com".into(),
            password: "correct horse".into(),
            access_code: "EARLY-BIRD".into(),
        };
        let err = register(State(state.clone()), Json(req))
            .await
            .map(|_| ())
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));

        let row = state.db.get_access_code("EARLY-BIRD").unwrap().unwrap();
        assert!(row.is_used);
        assert!(row.used_by.is_some());
    }

    #[tokio::test]
    async fn login_round_trip_and_bad_password() {
        let state = test_state();
        state.db.create_access_code("ac1", "CODE").unwrap();
        register(
            State(state.clone()),
            Json(RegisterRequest {
                email: "june@example.com".into(),
                password: "correct horse".into(),
                access_code: "CODE".into(),
            }),
        )
        .await
        .unwrap();

        login(
            State(state.clone()),
            Json(LoginRequest {
                email: "june@example.com".into(),
                password: "correct horse".into(),
            }),
        )
        .await
        .unwrap();

        let err = login(
            State(state.clone()),
            Json(LoginRequest {
                email: "june@example.com".into(),
                password: "wrong".into(),
            }),
        )
        .await
        .map(|_| ())
        .unwrap_err();
        assert!(matches!(err, ApiError::Auth(_)));
    }

    #[tokio::test]
    async fn register_rejects_duplicate_email() {
        let state = test_state();
        state.db.create_access_code("ac1", "CODE-1").unwrap();
        state.db.create_access_code("ac2", "CODE-2").unwrap();

        let make = |code: &str| RegisterRequest {
            email: "june@example.com".into(),
            password: "correct horse".into(),
            access_code: code.into(),
        };
        register(State(state.clone()), Json(make("CODE-1"))).await.unwrap();
        let err = register(State(state.clone()), Json(make("CODE-2")))
            .await
            .map(|_| ())
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }
}
