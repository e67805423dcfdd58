//! Operator dashboard endpoints. All routes here sit behind the admin
//! middleware; handlers can assume an authenticated admin caller.

use axum::extract::{Path, State};
use axum::{Extension, Json};
use rand::Rng;
use rand::distr::Alphanumeric;
use tracing::{info, warn};
use uuid::Uuid;

use inspirt_db::models::ChatMessageJoinedRow;
use inspirt_db::models::parse_sqlite_datetime;
use inspirt_providers::voice::CLONED_CATEGORY;
use inspirt_types::api::{
    AdminChatMessage, AdminReplica, AdminStats, CleanupVoicesResponse, CreateAccessCodeRequest,
    CreateAccessCodeResponse, RecentActivity, UpdateCreditsRequest,
};
use inspirt_types::models::Claims;

use crate::error::ApiError;
use crate::state::AppState;

pub async fn list_accounts(
    State(state): State<AppState>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let rows = state.db.list_accounts()?;
    let accounts: Vec<_> = rows.into_iter().map(|r| r.into_account()).collect();
    Ok(Json(accounts))
}

pub async fn update_credits(
    State(state): State<AppState>,
    Path(account_id): Path<Uuid>,
    Json(req): Json<UpdateCreditsRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    if req.credits < 0 {
        return Err(ApiError::Validation("Invalid credits amount".into()));
    }

    let updated = state
        .db
        .set_account_credits(&account_id.to_string(), req.credits)?
        .ok_or(ApiError::NotFound("Account"))?;
    Ok(Json(updated.into_account()))
}

pub async fn delete_account(
    State(state): State<AppState>,
    Path(account_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    if claims.sub == account_id {
        return Err(ApiError::Validation(
            "Admins cannot delete their own account".into(),
        ));
    }

    state
        .db
        .get_account_by_id(&account_id.to_string())?
        .ok_or(ApiError::NotFound("Account"))?;

    state.db.delete_account(&account_id.to_string())?;
    info!("Account {} deleted by admin {}", account_id, claims.sub);
    Ok(Json(serde_json::json!({ "message": "Account deleted" })))
}

pub async fn list_chats(
    State(state): State<AppState>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let rows = state.db.list_messages_with_names()?;
    let chats: Vec<AdminChatMessage> = rows.into_iter().map(joined_to_admin_message).collect();
    Ok(Json(chats))
}

pub async fn list_replicas(
    State(state): State<AppState>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let rows = state.db.list_replicas_with_owner()?;
    let replicas: Vec<AdminReplica> = rows
        .into_iter()
        .map(|(row, email)| AdminReplica {
            replica: row.into_replica(),
            account_email: email,
        })
        .collect();
    Ok(Json(replicas))
}

pub async fn stats(
    State(state): State<AppState>,
) -> Result<Json<AdminStats>, ApiError> {
    let counts = state.db.dashboard_counts()?;
    let recent = state.db.recent_messages_with_names(10)?;

    let recent_activity = recent
        .into_iter()
        .map(|row| RecentActivity {
            content: truncate_preview(&row.message.content),
            role: row.message.role(),
            account_email: row.account_email,
            replica_name: row.replica_name,
            created_at: parse_sqlite_datetime(&row.message.created_at, "recent activity"),
        })
        .collect();

    Ok(Json(AdminStats {
        total_accounts: counts.total_accounts,
        total_replicas: counts.total_replicas,
        total_messages: counts.total_messages,
        total_credits_used: counts.total_credits_used,
        avg_messages_per_account: counts.avg_messages_per_account,
        recent_activity,
    }))
}

pub async fn create_access_code(
    State(state): State<AppState>,
    Json(req): Json<CreateAccessCodeRequest>,
) -> Result<(axum::http::StatusCode, Json<CreateAccessCodeResponse>), ApiError> {
    let code = match req.code {
        Some(code) if !code.trim().is_empty() => code.trim().to_string(),
        _ => mint_code(),
    };

    state
        .db
        .create_access_code(&Uuid::new_v4().to_string(), &code)
        .map_err(|_| ApiError::Validation("Access code already exists".into()))?;

    Ok((
        axum::http::StatusCode::CREATED,
        Json(CreateAccessCodeResponse { code }),
    ))
}

/// Delete every cloned voice at the provider. Used to reclaim the voice
/// slots the provider caps; premade voices are left alone.
pub async fn cleanup_voices(
    State(state): State<AppState>,
) -> Result<Json<CleanupVoicesResponse>, ApiError> {
    let voices = state.speech.list_voices().await?;
    let cloned: Vec<_> = voices
        .into_iter()
        .filter(|v| v.category == CLONED_CATEGORY)
        .collect();
    let total = cloned.len();

    let mut deleted = 0usize;
    let mut errors = 0usize;
    for voice in cloned {
        match state.speech.delete_voice(&voice.voice_id).await {
            Ok(()) => deleted += 1,
            Err(e) => {
                warn!("Failed to delete voice {}: {}", voice.voice_id, e);
                errors += 1;
            }
        }
    }

    info!("Voice cleanup completed: {}/{} deleted", deleted, total);
    Ok(Json(CleanupVoicesResponse {
        message: "Voice cleanup completed".into(),
        deleted,
        errors,
        total,
    }))
}

fn joined_to_admin_message(row: ChatMessageJoinedRow) -> AdminChatMessage {
    let role = row.message.role();
    let created_at = parse_sqlite_datetime(&row.message.created_at, "admin chat message");
    AdminChatMessage {
        id: row.message.id.parse().unwrap_or_default(),
        replica_id: row.message.replica_id.parse().unwrap_or_default(),
        role,
        content: row.message.content,
        audio_url: row.message.audio_url,
        feedback: row.message.feedback,
        created_at,
        replica_name: row.replica_name,
        account_email: row.account_email,
    }
}

/// First 50 characters of a message for the activity feed.
fn truncate_preview(content: &str) -> String {
    let truncated: String = content.chars().take(50).collect();
    if truncated.len() < content.len() {
        format!("{}...", truncated)
    } else {
        truncated
    }
}

fn mint_code() -> String {
    let suffix: String = rand::rng()
        .sample_iter(Alphanumeric)
        .take(8)
        .map(char::from)
        .collect();
    format!("INSPIRT-{}", suffix.to_uppercase())
}
