use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Extension, Json};
use uuid::Uuid;

use inspirt_db::models::ReplicaRow;
use inspirt_db::queries::ReplicaChanges;
use inspirt_types::api::{CreateReplicaRequest, FeedbackRequest, UpdateReplicaRequest};
use inspirt_types::models::{Claims, PersonalityTraits};

use crate::error::ApiError;
use crate::state::AppState;

fn validate_traits(traits: &PersonalityTraits) -> Result<(), ApiError> {
    let values = [
        traits.warmth,
        traits.humor,
        traits.thoughtfulness,
        traits.empathy,
        traits.assertiveness,
        traits.energy,
    ];
    if values.iter().any(|v| !(1..=10).contains(v)) {
        return Err(ApiError::Validation(
            "Personality traits must be between 1 and 10".into(),
        ));
    }
    Ok(())
}

/// Load a replica and enforce ownership. Foreign replicas read as absent.
fn owned_replica(
    state: &AppState,
    replica_id: Uuid,
    claims: &Claims,
) -> Result<ReplicaRow, ApiError> {
    let replica = state
        .db
        .get_replica(&replica_id.to_string())?
        .ok_or(ApiError::NotFound("Replica"))?;
    if !claims.is_admin && replica.account_id != claims.sub.to_string() {
        return Err(ApiError::NotFound("Replica"));
    }
    Ok(replica)
}

pub async fn create_replica(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateReplicaRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.name.trim().is_empty() {
        return Err(ApiError::Validation("Replica name is required".into()));
    }
    if let Some(traits) = &req.personality_traits {
        validate_traits(traits)?;
    }

    let traits_json = req
        .personality_traits
        .map(|t| serde_json::to_string(&t))
        .transpose()
        .map_err(|e| anyhow::anyhow!("Trait serialization failed: {}", e))?;
    let photos_json = if req.photos.is_empty() {
        None
    } else {
        Some(
            serde_json::to_string(&req.photos)
                .map_err(|e| anyhow::anyhow!("Photo serialization failed: {}", e))?,
        )
    };

    let replica_id = Uuid::new_v4();
    let row = state.db.create_replica(
        &replica_id.to_string(),
        &claims.sub.to_string(),
        req.name.trim(),
        req.personality_description.as_deref(),
        traits_json.as_deref(),
        photos_json.as_deref(),
    )?;

    Ok((StatusCode::CREATED, Json(row.into_replica())))
}

pub async fn list_replicas(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let rows = state
        .db
        .list_replicas_for_account(&claims.sub.to_string())?;
    let replicas: Vec<_> = rows.into_iter().map(|r| r.into_replica()).collect();
    Ok(Json(replicas))
}

pub async fn update_replica(
    State(state): State<AppState>,
    Path(replica_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateReplicaRequest>,
) -> Result<impl IntoResponse, ApiError> {
    owned_replica(&state, replica_id, &claims)?;

    if let Some(traits) = &req.personality_traits {
        validate_traits(traits)?;
    }

    let changes = ReplicaChanges {
        name: req.name,
        voice_id: req.voice_id,
        personality_description: req.personality_description,
        personality_traits: req
            .personality_traits
            .map(|t| serde_json::to_string(&t))
            .transpose()
            .map_err(|e| anyhow::anyhow!("Trait serialization failed: {}", e))?,
        photos: req
            .photos
            .map(|p| serde_json::to_string(&p))
            .transpose()
            .map_err(|e| anyhow::anyhow!("Photo serialization failed: {}", e))?,
        is_generated: req.is_generated,
    };

    let updated = state
        .db
        .update_replica(&replica_id.to_string(), changes)?
        .ok_or(ApiError::NotFound("Replica"))?;
    Ok(Json(updated.into_replica()))
}

pub async fn get_messages(
    State(state): State<AppState>,
    Path(replica_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    owned_replica(&state, replica_id, &claims)?;

    let rows = state.db.list_replica_messages(&replica_id.to_string())?;
    let messages: Vec<_> = rows.into_iter().map(|m| m.into_message()).collect();
    Ok(Json(messages))
}

/// Attach feedback to one message — the only mutation the history permits.
pub async fn message_feedback(
    State(state): State<AppState>,
    Path((replica_id, message_id)): Path<(Uuid, Uuid)>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<FeedbackRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if !matches!(req.feedback.as_str(), "positive" | "negative") {
        return Err(ApiError::Validation(
            "Feedback must be 'positive' or 'negative'".into(),
        ));
    }

    owned_replica(&state, replica_id, &claims)?;

    let message = state
        .db
        .get_chat_message(&message_id.to_string())?
        .ok_or(ApiError::NotFound("Message"))?;
    if message.replica_id != replica_id.to_string() {
        return Err(ApiError::NotFound("Message"));
    }

    state.db.set_message_feedback(
        &message_id.to_string(),
        &req.feedback,
        req.feedback_text.as_deref(),
    )?;

    Ok(Json(serde_json::json!({ "ok": true })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::test_state;

    fn claims_for(account_id: &str, is_admin: bool) -> Claims {
        Claims {
            sub: account_id.parse().unwrap(),
            email: "owner@example.com".into(),
            is_admin,
            exp: usize::MAX,
        }
    }

    fn seed_account(state: &AppState) -> String {
        let id = Uuid::new_v4().to_string();
        state
            .db
            .create_account(&id, "owner@example.com", "hash", false)
            .unwrap();
        id
    }

    #[tokio::test]
    async fn create_rejects_out_of_range_traits() {
        let state = test_state();
        let account = seed_account(&state);
        let req = CreateReplicaRequest {
            name: "June".into(),
            personality_description: None,
            personality_traits: Some(PersonalityTraits {
                warmth: 11,
                ..Default::default()
            }),
            photos: vec![],
        };
        let err = create_replica(State(state), Extension(claims_for(&account, false)), Json(req))
            .await
            .map(|_| ())
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[tokio::test]
    async fn patch_attaches_voice_without_clearing_profile() {
        let state = test_state();
        let account = seed_account(&state);
        let claims = claims_for(&account, false);

        let replica_id = Uuid::new_v4();
        state
            .db
            .create_replica(
                &replica_id.to_string(),
                &account,
                "June",
                Some("warm retired teacher"),
                None,
                None,
            )
            .unwrap();

        update_replica(
            State(state.clone()),
            Path(replica_id),
            Extension(claims),
            Json(UpdateReplicaRequest {
                voice_id: Some("voice-9".into()),
                is_generated: Some(true),
                ..Default::default()
            }),
        )
        .await
        .map(|_| ())
        .unwrap();

        let row = state.db.get_replica(&replica_id.to_string()).unwrap().unwrap();
        assert_eq!(row.voice_id.as_deref(), Some("voice-9"));
        assert_eq!(
            row.personality_description.as_deref(),
            Some("warm retired teacher")
        );
        assert!(row.is_generated);
    }

    #[tokio::test]
    async fn feedback_requires_matching_replica() {
        let state = test_state();
        let account = seed_account(&state);
        let claims = claims_for(&account, false);

        let replica_a = Uuid::new_v4();
        let replica_b = Uuid::new_v4();
        for id in [replica_a, replica_b] {
            state
                .db
                .create_replica(&id.to_string(), &account, "R", None, None, None)
                .unwrap();
        }
        let message_id = Uuid::new_v4();
        state
            .db
            .insert_chat_message(&message_id.to_string(), &replica_a.to_string(), "assistant", "hi", None)
            .unwrap();

        // right replica: accepted
        message_feedback(
            State(state.clone()),
            Path((replica_a, message_id)),
            Extension(claims.clone()),
            Json(FeedbackRequest {
                feedback: "positive".into(),
                feedback_text: Some("spot on".into()),
            }),
        )
        .await
        .map(|_| ())
        .unwrap();

        // wrong replica: the message reads as absent
        let err = message_feedback(
            State(state.clone()),
            Path((replica_b, message_id)),
            Extension(claims),
            Json(FeedbackRequest {
                feedback: "negative".into(),
                feedback_text: None,
            }),
        )
        .await
        .map(|_| ())
        .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }
}
