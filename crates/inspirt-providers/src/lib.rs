pub mod audio;
pub mod chat;
pub mod error;
pub mod voice;

pub use audio::{AudioFormat, AudioSample, AudioValidationError, validate_sample};
pub use chat::{OpenAiChat, TextGenerator};
pub use error::ProviderError;
pub use voice::{ElevenLabs, SpeechSynthesizer, VoiceInfo};
