use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Credits granted to every new account. The admin "credits used" figure is
/// derived against this same allowance.
pub const INITIAL_CREDITS: i64 = 10;

/// An account as exposed over the API — the password hash never leaves the
/// server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: Uuid,
    pub email: String,
    pub credits: i64,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

/// The six 1–10 trait scores attached to every replica. Defaults to a
/// neutral 5 across the board when a replica was created without scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonalityTraits {
    pub warmth: u8,
    pub humor: u8,
    pub thoughtfulness: u8,
    pub empathy: u8,
    pub assertiveness: u8,
    pub energy: u8,
}

impl Default for PersonalityTraits {
    fn default() -> Self {
        Self {
            warmth: 5,
            humor: 5,
            thoughtfulness: 5,
            empathy: 5,
            assertiveness: 5,
            energy: 5,
        }
    }
}

/// A stored voice + personality profile owned by one account.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Replica {
    pub id: Uuid,
    pub account_id: Uuid,
    pub name: String,
    pub voice_id: Option<String>,
    pub personality_description: Option<String>,
    pub personality_traits: PersonalityTraits,
    pub photos: Vec<String>,
    pub is_generated: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// One turn half in a replica's chat history. Append-only: the only
/// permitted mutation after insert is attaching feedback.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: Uuid,
    pub replica_id: Uuid,
    pub role: MessageRole,
    pub content: String,
    pub audio_url: Option<String>,
    pub feedback: Option<String>,
    pub feedback_text: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// JWT claims shared by the REST middleware and the admin layer. Canonical
/// definition lives here in inspirt-types to eliminate duplication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub is_admin: bool,
    pub exp: usize,
}
