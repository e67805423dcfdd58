use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Account, MessageRole, PersonalityTraits, Replica};

// -- Access gate --

#[derive(Debug, Deserialize)]
pub struct ValidateCodeRequest {
    pub code: String,
}

#[derive(Debug, Serialize)]
pub struct ValidateCodeResponse {
    pub valid: bool,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub access_code: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Returned by both register and login: the sanitized account plus a
/// bearer token for subsequent requests.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub account: Account,
    pub token: String,
}

// -- Replicas --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReplicaRequest {
    pub name: String,
    pub personality_description: Option<String>,
    pub personality_traits: Option<PersonalityTraits>,
    #[serde(default)]
    pub photos: Vec<String>,
}

/// PATCH body — every field optional; absent fields are left untouched.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateReplicaRequest {
    pub name: Option<String>,
    pub voice_id: Option<String>,
    pub personality_description: Option<String>,
    pub personality_traits: Option<PersonalityTraits>,
    pub photos: Option<Vec<String>>,
    pub is_generated: Option<bool>,
}

// -- Chat --

#[derive(Debug, Deserialize)]
pub struct ChatTurnRequest {
    pub content: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessagePayload {
    pub id: Uuid,
    pub role: MessageRole,
    pub content: String,
    pub audio_url: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatTurnResponse {
    pub user_message: ChatMessagePayload,
    pub ai_message: ChatMessagePayload,
    pub credits_remaining: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackRequest {
    pub feedback: String,
    pub feedback_text: Option<String>,
}

// -- Voice provisioning --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateVoiceRequest {
    /// Base64-encoded audio sample, with or without a `data:` URL prefix.
    pub audio_file: String,
    pub name: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateVoiceResponse {
    pub voice_id: String,
}

// -- Admin --

#[derive(Debug, Deserialize)]
pub struct UpdateCreditsRequest {
    pub credits: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateAccessCodeRequest {
    /// Omit to have the server mint a random code.
    pub code: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateAccessCodeResponse {
    pub code: String,
}

#[derive(Debug, Serialize)]
pub struct CleanupVoicesResponse {
    pub message: String,
    pub deleted: usize,
    pub errors: usize,
    pub total: usize,
}

/// A replica row joined with its owner's email, for the operator dashboard.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminReplica {
    #[serde(flatten)]
    pub replica: Replica,
    pub account_email: String,
}

/// A chat message joined with replica name and owner email.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminChatMessage {
    pub id: Uuid,
    pub replica_id: Uuid,
    pub role: MessageRole,
    pub content: String,
    pub audio_url: Option<String>,
    pub feedback: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub replica_name: String,
    pub account_email: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentActivity {
    pub content: String,
    pub role: MessageRole,
    pub account_email: String,
    pub replica_name: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminStats {
    pub total_accounts: i64,
    pub total_replicas: i64,
    pub total_messages: i64,
    pub total_credits_used: i64,
    pub avg_messages_per_account: f64,
    pub recent_activity: Vec<RecentActivity>,
}
