//! The chat turn orchestrator: quota gate, personality-conditioned text
//! generation, best-effort voice synthesis, then persistence and the
//! conditional credit decrement.

use axum::extract::{Path, State};
use axum::{Extension, Json};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use tracing::warn;
use uuid::Uuid;

use inspirt_db::models::{AccountRow, ReplicaRow};
use inspirt_types::api::{ChatMessagePayload, ChatTurnRequest, ChatTurnResponse};
use inspirt_types::models::{Claims, MessageRole, PersonalityTraits};

use crate::error::{ApiError, join_blocking};
use crate::state::{AppState, AppStateInner};

/// POST /replicas/{id}/chat
pub async fn chat_turn(
    State(state): State<AppState>,
    Path(replica_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<ChatTurnRequest>,
) -> Result<Json<ChatTurnResponse>, ApiError> {
    if req.content.trim().is_empty() {
        return Err(ApiError::Validation("Message content required".into()));
    }
    let response = execute_turn(state, replica_id, &claims, req.content).await?;
    Ok(Json(response))
}

pub(crate) async fn execute_turn(
    state: AppState,
    replica_id: Uuid,
    claims: &Claims,
    content: String,
) -> Result<ChatTurnResponse, ApiError> {
    // 1. Resolve the replica and its owning account.
    let (replica, account) =
        load_replica_and_owner(&state, replica_id, claims.sub, claims.is_admin).await?;

    // 2. Quota gate. Nothing below runs for an exhausted account.
    if account.credits <= 0 {
        return Err(ApiError::QuotaExceeded);
    }

    // 3. Text generation — fatal on failure, nothing persisted.
    let traits = parse_traits(&replica);
    let system_prompt =
        build_system_prompt(replica.personality_description.as_deref(), &traits);
    let ai_text = state.text.generate(&system_prompt, &content).await?;

    // 4. Voice synthesis — best-effort. Text is the primary value; a lost
    //    voice track degrades the turn instead of failing it.
    let audio_url = match &replica.voice_id {
        Some(voice_id) => match state.speech.synthesize(voice_id, &ai_text).await {
            Ok(audio) => Some(format!("data:audio/mpeg;base64,{}", B64.encode(audio))),
            Err(e) => {
                warn!("Speech synthesis failed for replica {}: {}", replica.id, e);
                None
            }
        },
        None => None,
    };

    // 5–6. Persist both halves of the turn, then the conditional decrement.
    let db = state.clone();
    let replica_key = replica.id.clone();
    let account_key = account.id.clone();
    let user_id = Uuid::new_v4();
    let assistant_id = Uuid::new_v4();
    let user_content = content.clone();
    let assistant_content = ai_text.clone();
    let assistant_audio = audio_url.clone();

    let credits_remaining = join_blocking(
        tokio::task::spawn_blocking(move || {
            persist_turn(
                &db,
                &replica_key,
                &account_key,
                &user_id.to_string(),
                &assistant_id.to_string(),
                &user_content,
                &assistant_content,
                assistant_audio.as_deref(),
            )
        })
        .await,
    )?;

    Ok(ChatTurnResponse {
        user_message: ChatMessagePayload {
            id: user_id,
            role: MessageRole::User,
            content,
            audio_url: None,
        },
        ai_message: ChatMessagePayload {
            id: assistant_id,
            role: MessageRole::Assistant,
            content: ai_text,
            audio_url,
        },
        credits_remaining,
    })
}

async fn load_replica_and_owner(
    state: &AppState,
    replica_id: Uuid,
    caller: Uuid,
    caller_is_admin: bool,
) -> Result<(ReplicaRow, AccountRow), ApiError> {
    let db = state.clone();
    let key = replica_id.to_string();
    join_blocking(
        tokio::task::spawn_blocking(move || {
            let replica = db
                .db
                .get_replica(&key)?
                .ok_or(ApiError::NotFound("Replica"))?;

            // Foreign replicas are indistinguishable from absent ones.
            if !caller_is_admin && replica.account_id != caller.to_string() {
                return Err(ApiError::NotFound("Replica"));
            }

            let account = db
                .db
                .get_account_by_id(&replica.account_id)?
                .ok_or(ApiError::NotFound("Replica owner"))?;
            Ok((replica, account))
        })
        .await,
    )
}

#[allow(clippy::too_many_arguments)]
fn persist_turn(
    state: &AppStateInner,
    replica_id: &str,
    account_id: &str,
    user_id: &str,
    assistant_id: &str,
    user_content: &str,
    assistant_content: &str,
    assistant_audio: Option<&str>,
) -> Result<i64, ApiError> {
    // User message first — history must never show an answer without its
    // question.
    state
        .db
        .insert_chat_message(user_id, replica_id, "user", user_content, None)?;
    state.db.insert_chat_message(
        assistant_id,
        replica_id,
        "assistant",
        assistant_content,
        assistant_audio,
    )?;

    match state.db.decrement_credits_checked(account_id)? {
        Some(remaining) => Ok(remaining),
        // A concurrent turn spent the last credit between our gate check
        // and now. The work is already done; report the floor.
        None => {
            let remaining = state
                .db
                .get_account_by_id(account_id)?
                .map(|a| a.credits)
                .unwrap_or(0);
            Ok(remaining.max(0))
        }
    }
}

fn parse_traits(replica: &ReplicaRow) -> PersonalityTraits {
    replica
        .personality_traits
        .as_deref()
        .and_then(|raw| serde_json::from_str(raw).ok())
        .unwrap_or_default()
}

/// Deterministic personality conditioning. Each trait renders as
/// `Name: value/10`, which downstream tests and prompt audits rely on.
pub fn build_system_prompt(description: Option<&str>, traits: &PersonalityTraits) -> String {
    format!(
        "You are a digital replica with the following personality:\n\
         {}\n\
         \n\
         Personality traits (1-10 scale):\n\
         - Warmth: {}/10\n\
         - Humor: {}/10\n\
         - Thoughtfulness: {}/10\n\
         - Empathy: {}/10\n\
         - Assertiveness: {}/10\n\
         - Energy: {}/10\n\
         \n\
         Respond naturally as this person would, incorporating these traits \
         into your communication style. Keep responses conversational and \
         under 100 words.",
        description.unwrap_or("You are a helpful and engaging AI assistant."),
        traits.warmth,
        traits.humor,
        traits.thoughtfulness,
        traits.empathy,
        traits.assertiveness,
        traits.energy,
    )
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::testing::{FakeSpeech, FakeText, state_with, test_state};

    fn claims_for(account_id: &str) -> Claims {
        Claims {
            sub: account_id.parse().unwrap(),
            email: "owner@example.com".into(),
            is_admin: false,
            exp: usize::MAX,
        }
    }

    fn seed(state: &AppState, voice: Option<&str>) -> (String, Uuid) {
        let account_id = Uuid::new_v4().to_string();
        state
            .db
            .create_account(&account_id, "owner@example.com", "hash", false)
            .unwrap();
        let replica_id = Uuid::new_v4();
        state
            .db
            .create_replica(
                &replica_id.to_string(),
                &account_id,
                "Grandma June",
                Some("warm retired teacher"),
                Some(r#"{"warmth":9,"humor":3,"thoughtfulness":8,"empathy":9,"assertiveness":2,"energy":4}"#),
                None,
            )
            .unwrap();
        if let Some(v) = voice {
            state
                .db
                .update_replica(
                    &replica_id.to_string(),
                    inspirt_db::queries::ReplicaChanges {
                        voice_id: Some(v.into()),
                        ..Default::default()
                    },
                )
                .unwrap();
        }
        (account_id, replica_id)
    }

    #[test]
    fn prompt_contains_all_six_trait_values_verbatim() {
        let traits = PersonalityTraits {
            warmth: 9,
            humor: 3,
            thoughtfulness: 8,
            empathy: 9,
            assertiveness: 2,
            energy: 4,
        };
        let prompt = build_system_prompt(Some("warm retired teacher"), &traits);

        assert!(prompt.contains("warm retired teacher"));
        assert!(prompt.contains("Warmth: 9/10"));
        assert!(prompt.contains("Humor: 3/10"));
        assert!(prompt.contains("Thoughtfulness: 8/10"));
        assert!(prompt.contains("Empathy: 9/10"));
        assert!(prompt.contains("Assertiveness: 2/10"));
        assert!(prompt.contains("Energy: 4/10"));
    }

    #[tokio::test]
    async fn last_credit_then_quota_exceeded() {
        let state = test_state();
        let (account_id, replica_id) = seed(&state, None);
        state.db.set_account_credits(&account_id, 1).unwrap();
        let claims = claims_for(&account_id);

        let response = execute_turn(state.clone(), replica_id, &claims, "How was your day?".into())
            .await
            .unwrap();
        assert_eq!(response.credits_remaining, 0);
        assert_eq!(response.user_message.content, "How was your day?");
        assert!(response.ai_message.audio_url.is_none());

        let err = execute_turn(state.clone(), replica_id, &claims, "Still there?".into())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::QuotaExceeded));

        // credits stay at the floor and the rejected turn wrote nothing
        let account = state.db.get_account_by_id(&account_id).unwrap().unwrap();
        assert_eq!(account.credits, 0);
        assert_eq!(
            state
                .db
                .count_replica_messages(&replica_id.to_string())
                .unwrap(),
            2
        );
    }

    #[tokio::test]
    async fn quota_decrements_by_exactly_one_per_turn() {
        let state = test_state();
        let (account_id, replica_id) = seed(&state, None);
        let claims = claims_for(&account_id);

        for expected in (7..10).rev() {
            let response =
                execute_turn(state.clone(), replica_id, &claims, "hi".into())
                    .await
                    .unwrap();
            assert_eq!(response.credits_remaining, expected);
        }
    }

    #[tokio::test]
    async fn text_failure_is_fatal_and_writes_nothing() {
        let state = state_with(
            Arc::new(FakeText { reply: None }),
            Arc::new(FakeSpeech::default()),
        );
        let (account_id, replica_id) = seed(&state, Some("voice-1"));
        let claims = claims_for(&account_id);

        let err = execute_turn(state.clone(), replica_id, &claims, "hi".into())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Upstream(_)));

        assert_eq!(
            state
                .db
                .count_replica_messages(&replica_id.to_string())
                .unwrap(),
            0
        );
        let account = state.db.get_account_by_id(&account_id).unwrap().unwrap();
        assert_eq!(account.credits, 10);
    }

    #[tokio::test]
    async fn synthesis_failure_degrades_but_completes_the_turn() {
        let state = state_with(
            Arc::new(FakeText {
                reply: Some("Lovely to hear from you.".into()),
            }),
            Arc::new(FakeSpeech {
                audio: None,
                ..Default::default()
            }),
        );
        let (account_id, replica_id) = seed(&state, Some("voice-1"));
        let claims = claims_for(&account_id);

        let response = execute_turn(state.clone(), replica_id, &claims, "hi".into())
            .await
            .unwrap();

        assert!(response.ai_message.audio_url.is_none());
        assert_eq!(response.credits_remaining, 9);

        let messages = state
            .db
            .list_replica_messages(&replica_id.to_string())
            .unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].role, "assistant");
        assert!(messages[1].audio_url.is_none());
    }

    #[tokio::test]
    async fn synthesis_success_embeds_audio_data_url() {
        let state = test_state();
        let (account_id, replica_id) = seed(&state, Some("voice-1"));
        let claims = claims_for(&account_id);

        let response = execute_turn(state.clone(), replica_id, &claims, "hi".into())
            .await
            .unwrap();

        let audio_url = response.ai_message.audio_url.unwrap();
        assert!(audio_url.starts_with("data:audio/mpeg;base64,"));

        let messages = state
            .db
            .list_replica_messages(&replica_id.to_string())
            .unwrap();
        assert_eq!(messages[1].audio_url.as_deref(), Some(audio_url.as_str()));
        // the user half never carries audio
        assert!(messages[0].audio_url.is_none());
    }

    #[tokio::test]
    async fn foreign_replica_reads_as_not_found() {
        let state = test_state();
        let (_owner, replica_id) = seed(&state, None);

        let stranger = Uuid::new_v4().to_string();
        state
            .db
            .create_account(&stranger, "stranger@example.com", "hash", false)
            .unwrap();

        let err = execute_turn(state.clone(), replica_id, &claims_for(&stranger), "hi".into())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn missing_replica_is_not_found() {
        let state = test_state();
        let (account_id, _) = seed(&state, None);
        let err = execute_turn(
            state.clone(),
            Uuid::new_v4(),
            &claims_for(&account_id),
            "hi".into(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }
}
