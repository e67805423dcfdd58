//! Shared fakes for handler tests: an in-memory store and canned providers.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use inspirt_db::Database;
use inspirt_providers::audio::AudioSample;
use inspirt_providers::{ProviderError, SpeechSynthesizer, TextGenerator, VoiceInfo};

use crate::state::{AppState, AppStateInner};

pub struct FakeText {
    /// `None` simulates a fatal provider failure.
    pub reply: Option<String>,
}

#[async_trait]
impl TextGenerator for FakeText {
    async fn generate(&self, _system: &str, _user: &str) -> Result<String, ProviderError> {
        self.reply.clone().ok_or(ProviderError::Api {
            provider: "text generation",
            status: 500,
            message: "fake text outage".into(),
        })
    }
}

pub struct FakeSpeech {
    /// `None` simulates a synthesis failure (the degradable kind).
    pub audio: Option<Vec<u8>>,
    pub voices: Vec<VoiceInfo>,
    pub deleted: Mutex<Vec<String>>,
    /// Voice ids whose deletion should fail.
    pub failing_deletes: Vec<String>,
}

impl Default for FakeSpeech {
    fn default() -> Self {
        Self {
            audio: Some(b"fake-mp3".to_vec()),
            voices: Vec::new(),
            deleted: Mutex::new(Vec::new()),
            failing_deletes: Vec::new(),
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for FakeSpeech {
    async fn synthesize(&self, _voice_id: &str, _text: &str) -> Result<Vec<u8>, ProviderError> {
        self.audio.clone().ok_or(ProviderError::Api {
            provider: "speech synthesis",
            status: 503,
            message: "fake synthesis outage".into(),
        })
    }

    async fn create_voice(
        &self,
        _name: &str,
        _sample: AudioSample,
    ) -> Result<String, ProviderError> {
        Ok("fake-voice-id".into())
    }

    async fn list_voices(&self) -> Result<Vec<VoiceInfo>, ProviderError> {
        Ok(self.voices.clone())
    }

    async fn delete_voice(&self, voice_id: &str) -> Result<(), ProviderError> {
        if self.failing_deletes.iter().any(|v| v == voice_id) {
            return Err(ProviderError::Api {
                provider: "speech synthesis",
                status: 500,
                message: "fake delete failure".into(),
            });
        }
        self.deleted.lock().unwrap().push(voice_id.to_string());
        Ok(())
    }
}

pub fn state_with(
    text: Arc<dyn TextGenerator>,
    speech: Arc<dyn SpeechSynthesizer>,
) -> AppState {
    Arc::new(AppStateInner {
        db: Database::open_in_memory().unwrap(),
        jwt_secret: "test-secret".into(),
        text,
        speech,
    })
}

pub fn test_state() -> AppState {
    state_with(
        Arc::new(FakeText {
            reply: Some("Hello from the replica".into()),
        }),
        Arc::new(FakeSpeech::default()),
    )
}
