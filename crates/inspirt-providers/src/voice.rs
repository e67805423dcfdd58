//! Speech-synthesis provider client (ElevenLabs-compatible). Covers voice
//! cloning, synthesis, and the voice-listing/deletion pair used by the
//! administrative cleanup operation.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::audio::AudioSample;
use crate::error::ProviderError;

const DEFAULT_BASE_URL: &str = "https://api.elevenlabs.io";
const SYNTHESIS_MODEL: &str = "eleven_monolingual_v1";

/// Fixed synthesis parameters for replica voices.
const STABILITY: f64 = 0.5;
const SIMILARITY_BOOST: f64 = 0.5;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Voices the provider tags as cloned from user samples — the ones the
/// cleanup operation removes.
pub const CLONED_CATEGORY: &str = "cloned";

/// Seam between the application and the speech provider. One trait for all
/// four operations because they are one provider surface: synthesis plus
/// the voice management the admin cleanup depends on.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Render `text` in the cloned voice. Returns encoded audio (MP3).
    async fn synthesize(&self, voice_id: &str, text: &str) -> Result<Vec<u8>, ProviderError>;

    /// Upload a validated sample and clone a voice from it.
    async fn create_voice(
        &self,
        name: &str,
        sample: AudioSample,
    ) -> Result<String, ProviderError>;

    async fn list_voices(&self) -> Result<Vec<VoiceInfo>, ProviderError>;

    async fn delete_voice(&self, voice_id: &str) -> Result<(), ProviderError>;
}

#[derive(Debug, Clone, Deserialize)]
pub struct VoiceInfo {
    pub voice_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub category: String,
}

pub struct ElevenLabs {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl ElevenLabs {
    pub fn new(api_key: impl Into<String>) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
        })
    }

    /// Point the client at a different endpoint (tests, proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn check_status(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, ProviderError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let text = response.text().await.unwrap_or_default();
        Err(ProviderError::Api {
            provider: "speech synthesis",
            status: status.as_u16(),
            message: extract_error_message(&text),
        })
    }
}

#[derive(Deserialize)]
struct AddVoiceResponse {
    voice_id: String,
}

#[derive(Deserialize)]
struct ListVoicesResponse {
    voices: Vec<VoiceInfo>,
}

#[async_trait]
impl SpeechSynthesizer for ElevenLabs {
    async fn synthesize(&self, voice_id: &str, text: &str) -> Result<Vec<u8>, ProviderError> {
        let body = json!({
            "text": text,
            "model_id": SYNTHESIS_MODEL,
            "voice_settings": {
                "stability": STABILITY,
                "similarity_boost": SIMILARITY_BOOST,
            },
        });

        let response = self
            .client
            .post(format!(
                "{}/v1/text-to-speech/{}/stream",
                self.base_url, voice_id
            ))
            .header("xi-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let response = Self::check_status(response).await?;
        let audio = response.bytes().await?.to_vec();
        tracing::debug!("Synthesized {} bytes for voice {}", audio.len(), voice_id);
        Ok(audio)
    }

    async fn create_voice(
        &self,
        name: &str,
        sample: AudioSample,
    ) -> Result<String, ProviderError> {
        let file_part = reqwest::multipart::Part::bytes(sample.bytes)
            .file_name(sample.format.file_name())
            .mime_str(sample.format.mime())
            .map_err(|e| ProviderError::InvalidResponse {
                provider: "speech synthesis",
                detail: format!("bad sample mime type: {}", e),
            })?;

        let form = reqwest::multipart::Form::new()
            .part("files", file_part)
            .text("name", name.to_string())
            .text("description", format!("Voice clone created for {}", name));

        let response = self
            .client
            .post(format!("{}/v1/voices/add", self.base_url))
            .header("xi-api-key", &self.api_key)
            .multipart(form)
            .send()
            .await?;

        let response = Self::check_status(response).await?;
        let parsed: AddVoiceResponse = response.json().await?;
        Ok(parsed.voice_id)
    }

    async fn list_voices(&self) -> Result<Vec<VoiceInfo>, ProviderError> {
        let response = self
            .client
            .get(format!("{}/v1/voices", self.base_url))
            .header("xi-api-key", &self.api_key)
            .send()
            .await?;

        let response = Self::check_status(response).await?;
        let parsed: ListVoicesResponse = response.json().await?;
        Ok(parsed.voices)
    }

    async fn delete_voice(&self, voice_id: &str) -> Result<(), ProviderError> {
        let response = self
            .client
            .delete(format!("{}/v1/voices/{}", self.base_url, voice_id))
            .header("xi-api-key", &self.api_key)
            .send()
            .await?;

        Self::check_status(response).await?;
        Ok(())
    }
}

/// ElevenLabs nests its message under `detail`; some endpoints use a flat
/// `message`. Fall back to the raw body.
fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/detail/message")
                .or_else(|| v.pointer("/message"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| {
            if body.is_empty() {
                "no error body".to_string()
            } else {
                body.to_string()
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::AudioFormat;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> ElevenLabs {
        ElevenLabs::new("xi-test-key")
            .unwrap()
            .with_base_url(server.uri())
    }

    #[tokio::test]
    async fn synthesize_returns_audio_bytes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/text-to-speech/voice-1/stream"))
            .and(header("xi-api-key", "xi-test-key"))
            .and(body_partial_json(json!({
                "model_id": "eleven_monolingual_v1",
                "voice_settings": {"stability": 0.5, "similarity_boost": 0.5},
            })))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"mp3data".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let audio = client(&server)
            .synthesize("voice-1", "Hello")
            .await
            .unwrap();
        assert_eq!(audio, b"mp3data");
    }

    #[tokio::test]
    async fn create_voice_parses_voice_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/voices/add"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"voice_id": "v-123"})),
            )
            .mount(&server)
            .await;

        let sample = AudioSample {
            bytes: vec![0u8; 64],
            format: AudioFormat::Wav,
        };
        let voice_id = client(&server).create_voice("June", sample).await.unwrap();
        assert_eq!(voice_id, "v-123");
    }

    #[tokio::test]
    async fn passes_through_nested_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/voices/add"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "detail": {"status": "invalid_sample", "message": "Sample too noisy"}
            })))
            .mount(&server)
            .await;

        let sample = AudioSample {
            bytes: vec![0u8; 64],
            format: AudioFormat::Wav,
        };
        let err = client(&server).create_voice("June", sample).await.unwrap_err();
        match err {
            ProviderError::Api { status, message, .. } => {
                assert_eq!(status, 400);
                assert_eq!(message, "Sample too noisy");
            }
            other => panic!("expected Api error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn lists_and_deletes_voices() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/voices"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "voices": [
                    {"voice_id": "v-1", "name": "Rachel", "category": "premade"},
                    {"voice_id": "v-2", "name": "June", "category": "cloned"},
                ]
            })))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/v1/voices/v-2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
            .expect(1)
            .mount(&server)
            .await;

        let c = client(&server);
        let voices = c.list_voices().await.unwrap();
        assert_eq!(voices.len(), 2);
        let cloned: Vec<_> = voices
            .iter()
            .filter(|v| v.category == CLONED_CATEGORY)
            .collect();
        assert_eq!(cloned.len(), 1);
        c.delete_voice(&cloned[0].voice_id).await.unwrap();
    }
}
