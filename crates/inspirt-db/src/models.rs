//! Database row types — these map directly to SQLite rows.
//! Distinct from the inspirt-types API models to keep the DB layer
//! independent; conversions live here because they know the column quirks.

use chrono::{DateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use inspirt_types::models::{
    Account, ChatMessage, MessageRole, PersonalityTraits, Replica,
};

pub struct AccountRow {
    pub id: String,
    pub email: String,
    pub password: String,
    pub credits: i64,
    pub is_admin: bool,
    pub created_at: String,
}

pub struct AccessCodeRow {
    pub id: String,
    pub code: String,
    pub is_used: bool,
    pub used_by: Option<String>,
    pub used_at: Option<String>,
}

pub struct ReplicaRow {
    pub id: String,
    pub account_id: String,
    pub name: String,
    pub voice_id: Option<String>,
    pub personality_description: Option<String>,
    pub personality_traits: Option<String>,
    pub photos: Option<String>,
    pub is_generated: bool,
    pub created_at: String,
}

pub struct ChatMessageRow {
    pub id: String,
    pub replica_id: String,
    pub role: String,
    pub content: String,
    pub audio_url: Option<String>,
    pub feedback: Option<String>,
    pub feedback_text: Option<String>,
    pub created_at: String,
}

/// Chat message joined with replica name and owner email (admin views).
pub struct ChatMessageJoinedRow {
    pub message: ChatMessageRow,
    pub replica_name: String,
    pub account_email: String,
}

/// SQLite stores timestamps as "YYYY-MM-DD HH:MM:SS" without timezone.
/// Parse as naive UTC and convert; fall back to the epoch on corrupt rows.
pub fn parse_sqlite_datetime(raw: &str, context: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt created_at '{}' on {}: {}", raw, context, e);
            DateTime::default()
        })
}

fn parse_uuid(raw: &str, context: &str) -> Uuid {
    raw.parse().unwrap_or_else(|e| {
        warn!("Corrupt id '{}' on {}: {}", raw, context, e);
        Uuid::default()
    })
}

impl AccountRow {
    pub fn into_account(self) -> Account {
        let created_at = parse_sqlite_datetime(&self.created_at, "account");
        Account {
            id: parse_uuid(&self.id, "account"),
            email: self.email,
            credits: self.credits,
            is_admin: self.is_admin,
            created_at,
        }
    }
}

impl ReplicaRow {
    pub fn into_replica(self) -> Replica {
        let traits = self
            .personality_traits
            .as_deref()
            .map(|raw| {
                serde_json::from_str::<PersonalityTraits>(raw).unwrap_or_else(|e| {
                    warn!("Corrupt personality_traits on replica '{}': {}", self.id, e);
                    PersonalityTraits::default()
                })
            })
            .unwrap_or_default();

        let photos = self
            .photos
            .as_deref()
            .map(|raw| {
                serde_json::from_str::<Vec<String>>(raw).unwrap_or_else(|e| {
                    warn!("Corrupt photos on replica '{}': {}", self.id, e);
                    Vec::new()
                })
            })
            .unwrap_or_default();

        let created_at = parse_sqlite_datetime(&self.created_at, "replica");
        Replica {
            id: parse_uuid(&self.id, "replica"),
            account_id: parse_uuid(&self.account_id, "replica owner"),
            name: self.name,
            voice_id: self.voice_id,
            personality_description: self.personality_description,
            personality_traits: traits,
            photos,
            is_generated: self.is_generated,
            created_at,
        }
    }
}

impl ChatMessageRow {
    pub fn role(&self) -> MessageRole {
        match self.role.as_str() {
            "assistant" => MessageRole::Assistant,
            _ => MessageRole::User,
        }
    }

    pub fn into_message(self) -> ChatMessage {
        let role = self.role();
        let created_at = parse_sqlite_datetime(&self.created_at, "chat message");
        ChatMessage {
            id: parse_uuid(&self.id, "chat message"),
            replica_id: parse_uuid(&self.replica_id, "chat message replica"),
            role,
            content: self.content,
            audio_url: self.audio_url,
            feedback: self.feedback,
            feedback_text: self.feedback_text,
            created_at,
        }
    }
}
