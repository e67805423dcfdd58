use axum::Json;
use axum::extract::State;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use tracing::info;

use inspirt_providers::validate_sample;
use inspirt_types::api::{CreateVoiceRequest, CreateVoiceResponse};

use crate::error::ApiError;
use crate::state::AppState;

/// POST /voice/create — upload a sample and clone a voice. Size, format and
/// duration are all checked before the provider sees a byte.
pub async fn create_voice(
    State(state): State<AppState>,
    Json(req): Json<CreateVoiceRequest>,
) -> Result<Json<CreateVoiceResponse>, ApiError> {
    if req.audio_file.is_empty() {
        return Err(ApiError::Validation("Audio file required".into()));
    }

    // Accept both raw base64 and data: URLs.
    let base64_data = req
        .audio_file
        .split_once(',')
        .map(|(_, data)| data)
        .unwrap_or(&req.audio_file);

    let audio_bytes = B64
        .decode(base64_data)
        .map_err(|_| ApiError::Validation("Audio file is not valid base64".into()))?;

    let sample =
        validate_sample(audio_bytes).map_err(|e| ApiError::Validation(e.to_string()))?;

    let name = req.name.as_deref().unwrap_or("Voice Clone");
    let voice_id = state.speech.create_voice(name, sample).await?;
    info!("Voice created: {}", voice_id);

    Ok(Json(CreateVoiceResponse { voice_id }))
}
