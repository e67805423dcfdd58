use anyhow::Result;
use rusqlite::Connection;

use crate::Database;
use crate::models::{AccessCodeRow, AccountRow, ChatMessageRow, ReplicaRow};

/// Partial replica update — `None` fields are left untouched.
#[derive(Debug, Default)]
pub struct ReplicaChanges {
    pub name: Option<String>,
    pub voice_id: Option<String>,
    pub personality_description: Option<String>,
    pub personality_traits: Option<String>,
    pub photos: Option<String>,
    pub is_generated: Option<bool>,
}

impl Database {
    // -- Accounts --

    pub fn create_account(
        &self,
        id: &str,
        email: &str,
        password_hash: &str,
        is_admin: bool,
    ) -> Result<AccountRow> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO accounts (id, email, password, is_admin) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![id, email, password_hash, is_admin],
            )?;
            query_account(conn, "id", id)?
                .ok_or_else(|| anyhow::anyhow!("Account vanished after insert: {}", id))
        })
    }

    pub fn get_account_by_email(&self, email: &str) -> Result<Option<AccountRow>> {
        self.with_conn(|conn| query_account(conn, "email", email))
    }

    pub fn get_account_by_id(&self, id: &str) -> Result<Option<AccountRow>> {
        self.with_conn(|conn| query_account(conn, "id", id))
    }

    pub fn list_accounts(&self) -> Result<Vec<AccountRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, email, password, credits, is_admin, created_at
                 FROM accounts ORDER BY created_at",
            )?;
            let rows = stmt
                .query_map([], account_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn set_account_credits(&self, id: &str, credits: i64) -> Result<Option<AccountRow>> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE accounts SET credits = ?1 WHERE id = ?2",
                rusqlite::params![credits, id],
            )?;
            if changed == 0 {
                return Ok(None);
            }
            query_account(conn, "id", id)
        })
    }

    /// Conditional decrement: only succeeds while credits remain, so two
    /// concurrent turns can never drive the balance negative.
    /// Returns the new balance, or `None` if the account was missing or
    /// already exhausted.
    pub fn decrement_credits_checked(&self, id: &str) -> Result<Option<i64>> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE accounts SET credits = credits - 1 WHERE id = ?1 AND credits > 0",
                [id],
            )?;
            if changed == 0 {
                return Ok(None);
            }
            let credits =
                conn.query_row("SELECT credits FROM accounts WHERE id = ?1", [id], |row| {
                    row.get(0)
                })?;
            Ok(Some(credits))
        })
    }

    /// Cascading delete: messages, then replicas, then the account itself.
    pub fn delete_account(&self, id: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "DELETE FROM chat_messages WHERE replica_id IN
                     (SELECT id FROM replicas WHERE account_id = ?1)",
                [id],
            )?;
            conn.execute("DELETE FROM replicas WHERE account_id = ?1", [id])?;
            conn.execute("UPDATE access_codes SET used_by = NULL WHERE used_by = ?1", [id])?;
            conn.execute("DELETE FROM accounts WHERE id = ?1", [id])?;
            Ok(())
        })
    }

    // -- Access codes --

    pub fn create_access_code(&self, id: &str, code: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO access_codes (id, code) VALUES (?1, ?2)",
                rusqlite::params![id, code],
            )?;
            Ok(())
        })
    }

    /// True iff the code exists and has not been consumed.
    pub fn validate_access_code(&self, code: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let row: Option<bool> = conn
                .query_row(
                    "SELECT is_used FROM access_codes WHERE code = ?1",
                    [code],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(matches!(row, Some(false)))
        })
    }

    pub fn mark_access_code_used(&self, code: &str, account_id: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "UPDATE access_codes
                 SET is_used = 1, used_by = ?2, used_at = datetime('now')
                 WHERE code = ?1",
                rusqlite::params![code, account_id],
            )?;
            Ok(())
        })
    }

    pub fn get_access_code(&self, code: &str) -> Result<Option<AccessCodeRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT id, code, is_used, used_by, used_at FROM access_codes WHERE code = ?1",
                    [code],
                    |row| {
                        Ok(AccessCodeRow {
                            id: row.get(0)?,
                            code: row.get(1)?,
                            is_used: row.get(2)?,
                            used_by: row.get(3)?,
                            used_at: row.get(4)?,
                        })
                    },
                )
                .optional()?;
            Ok(row)
        })
    }

    // -- Replicas --

    pub fn create_replica(
        &self,
        id: &str,
        account_id: &str,
        name: &str,
        personality_description: Option<&str>,
        personality_traits: Option<&str>,
        photos: Option<&str>,
    ) -> Result<ReplicaRow> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO replicas
                     (id, account_id, name, personality_description, personality_traits, photos)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    id,
                    account_id,
                    name,
                    personality_description,
                    personality_traits,
                    photos
                ],
            )?;
            query_replica(conn, id)?
                .ok_or_else(|| anyhow::anyhow!("Replica vanished after insert: {}", id))
        })
    }

    pub fn get_replica(&self, id: &str) -> Result<Option<ReplicaRow>> {
        self.with_conn(|conn| query_replica(conn, id))
    }

    pub fn list_replicas_for_account(&self, account_id: &str) -> Result<Vec<ReplicaRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, account_id, name, voice_id, personality_description,
                        personality_traits, photos, is_generated, created_at
                 FROM replicas WHERE account_id = ?1 ORDER BY created_at",
            )?;
            let rows = stmt
                .query_map([account_id], replica_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// All replicas joined with their owner's email, for the admin view.
    pub fn list_replicas_with_owner(&self) -> Result<Vec<(ReplicaRow, String)>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT r.id, r.account_id, r.name, r.voice_id, r.personality_description,
                        r.personality_traits, r.photos, r.is_generated, r.created_at,
                        a.email
                 FROM replicas r
                 INNER JOIN accounts a ON r.account_id = a.id
                 ORDER BY r.created_at",
            )?;
            let rows = stmt
                .query_map([], |row| {
                    let replica = replica_from_row(row)?;
                    let email: String = row.get(9)?;
                    Ok((replica, email))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Merge the non-`None` changes onto the stored row. Returns the
    /// updated row, or `None` if the replica does not exist.
    pub fn update_replica(&self, id: &str, changes: ReplicaChanges) -> Result<Option<ReplicaRow>> {
        self.with_conn_mut(|conn| {
            let Some(existing) = query_replica(conn, id)? else {
                return Ok(None);
            };

            let name = changes.name.unwrap_or(existing.name);
            let voice_id = changes.voice_id.or(existing.voice_id);
            let description = changes
                .personality_description
                .or(existing.personality_description);
            let traits = changes.personality_traits.or(existing.personality_traits);
            let photos = changes.photos.or(existing.photos);
            let is_generated = changes.is_generated.unwrap_or(existing.is_generated);

            conn.execute(
                "UPDATE replicas
                 SET name = ?1, voice_id = ?2, personality_description = ?3,
                     personality_traits = ?4, photos = ?5, is_generated = ?6
                 WHERE id = ?7",
                rusqlite::params![name, voice_id, description, traits, photos, is_generated, id],
            )?;
            query_replica(conn, id)
        })
    }

    // -- Chat messages --

    pub fn insert_chat_message(
        &self,
        id: &str,
        replica_id: &str,
        role: &str,
        content: &str,
        audio_url: Option<&str>,
    ) -> Result<ChatMessageRow> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO chat_messages (id, replica_id, role, content, audio_url)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![id, replica_id, role, content, audio_url],
            )?;
            query_message(conn, id)?
                .ok_or_else(|| anyhow::anyhow!("Message vanished after insert: {}", id))
        })
    }

    pub fn get_chat_message(&self, id: &str) -> Result<Option<ChatMessageRow>> {
        self.with_conn(|conn| query_message(conn, id))
    }

    /// Chat history for a replica, oldest first. `rowid` breaks ties within
    /// a turn so the user half always precedes the assistant half.
    pub fn list_replica_messages(&self, replica_id: &str) -> Result<Vec<ChatMessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, replica_id, role, content, audio_url, feedback, feedback_text, created_at
                 FROM chat_messages WHERE replica_id = ?1 ORDER BY created_at, rowid",
            )?;
            let rows = stmt
                .query_map([replica_id], message_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn count_replica_messages(&self, replica_id: &str) -> Result<i64> {
        self.with_conn(|conn| {
            let count = conn.query_row(
                "SELECT COUNT(*) FROM chat_messages WHERE replica_id = ?1",
                [replica_id],
                |row| row.get(0),
            )?;
            Ok(count)
        })
    }

    /// Attach feedback to a message. The only mutation chat messages ever
    /// see after insert. Returns false if the message does not exist.
    pub fn set_message_feedback(
        &self,
        id: &str,
        feedback: &str,
        feedback_text: Option<&str>,
    ) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE chat_messages SET feedback = ?1, feedback_text = ?2 WHERE id = ?3",
                rusqlite::params![feedback, feedback_text, id],
            )?;
            Ok(changed > 0)
        })
    }
}

fn query_account(conn: &Connection, column: &str, value: &str) -> Result<Option<AccountRow>> {
    // `column` is always a literal from this module, never caller input
    let sql = format!(
        "SELECT id, email, password, credits, is_admin, created_at FROM accounts WHERE {} = ?1",
        column
    );
    let row = conn
        .query_row(&sql, [value], account_from_row)
        .optional()?;
    Ok(row)
}

fn account_from_row(row: &rusqlite::Row<'_>) -> std::result::Result<AccountRow, rusqlite::Error> {
    Ok(AccountRow {
        id: row.get(0)?,
        email: row.get(1)?,
        password: row.get(2)?,
        credits: row.get(3)?,
        is_admin: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn query_replica(conn: &Connection, id: &str) -> Result<Option<ReplicaRow>> {
    let row = conn
        .query_row(
            "SELECT id, account_id, name, voice_id, personality_description,
                    personality_traits, photos, is_generated, created_at
             FROM replicas WHERE id = ?1",
            [id],
            replica_from_row,
        )
        .optional()?;
    Ok(row)
}

fn replica_from_row(row: &rusqlite::Row<'_>) -> std::result::Result<ReplicaRow, rusqlite::Error> {
    Ok(ReplicaRow {
        id: row.get(0)?,
        account_id: row.get(1)?,
        name: row.get(2)?,
        voice_id: row.get(3)?,
        personality_description: row.get(4)?,
        personality_traits: row.get(5)?,
        photos: row.get(6)?,
        is_generated: row.get(7)?,
        created_at: row.get(8)?,
    })
}

fn query_message(conn: &Connection, id: &str) -> Result<Option<ChatMessageRow>> {
    let row = conn
        .query_row(
            "SELECT id, replica_id, role, content, audio_url, feedback, feedback_text, created_at
             FROM chat_messages WHERE id = ?1",
            [id],
            message_from_row,
        )
        .optional()?;
    Ok(row)
}

fn message_from_row(
    row: &rusqlite::Row<'_>,
) -> std::result::Result<ChatMessageRow, rusqlite::Error> {
    Ok(ChatMessageRow {
        id: row.get(0)?,
        replica_id: row.get(1)?,
        role: row.get(2)?,
        content: row.get(3)?,
        audio_url: row.get(4)?,
        feedback: row.get(5)?,
        feedback_text: row.get(6)?,
        created_at: row.get(7)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn seed_account(db: &Database, email: &str) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        db.create_account(&id, email, "hash", false).unwrap();
        id
    }

    fn seed_replica(db: &Database, account_id: &str) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        db.create_replica(&id, account_id, "Test Replica", None, None, None)
            .unwrap();
        id
    }

    #[test]
    fn access_code_validates_at_most_once() {
        let db = test_db();
        db.create_access_code("ac1", "WELCOME-1").unwrap();
        assert!(db.validate_access_code("WELCOME-1").unwrap());

        let account = seed_account(&db, "a@example.com");
        db.mark_access_code_used("WELCOME-1", &account).unwrap();

        assert!(!db.validate_access_code("WELCOME-1").unwrap());
        // and it stays invalid
        assert!(!db.validate_access_code("WELCOME-1").unwrap());

        let row = db.get_access_code("WELCOME-1").unwrap().unwrap();
        assert!(row.is_used);
        assert_eq!(row.used_by.as_deref(), Some(account.as_str()));
        assert!(row.used_at.is_some());
    }

    #[test]
    fn unknown_access_code_is_invalid() {
        let db = test_db();
        assert!(!db.validate_access_code("nope").unwrap());
    }

    #[test]
    fn decrement_stops_at_zero() {
        let db = test_db();
        let account = seed_account(&db, "a@example.com");

        // schema default is 10 credits
        for expected in (0..10).rev() {
            assert_eq!(db.decrement_credits_checked(&account).unwrap(), Some(expected));
        }
        // exhausted: conditional update matches no row
        assert_eq!(db.decrement_credits_checked(&account).unwrap(), None);

        let row = db.get_account_by_id(&account).unwrap().unwrap();
        assert_eq!(row.credits, 0);
    }

    #[test]
    fn decrement_missing_account_is_none() {
        let db = test_db();
        assert_eq!(db.decrement_credits_checked("ghost").unwrap(), None);
    }

    #[test]
    fn duplicate_email_rejected() {
        let db = test_db();
        seed_account(&db, "dup@example.com");
        let res = db.create_account("other-id", "dup@example.com", "hash", false);
        assert!(res.is_err());
    }

    #[test]
    fn messages_keep_turn_order() {
        let db = test_db();
        let account = seed_account(&db, "a@example.com");
        let replica = seed_replica(&db, &account);

        // Both halves of a turn land within the same datetime('now') second;
        // rowid must keep user before assistant.
        db.insert_chat_message("m1", &replica, "user", "How was your day?", None)
            .unwrap();
        db.insert_chat_message("m2", &replica, "assistant", "Lovely, thank you.", None)
            .unwrap();

        let messages = db.list_replica_messages(&replica).unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "user");
        assert_eq!(messages[1].role, "assistant");
    }

    #[test]
    fn feedback_is_the_only_mutation() {
        let db = test_db();
        let account = seed_account(&db, "a@example.com");
        let replica = seed_replica(&db, &account);
        db.insert_chat_message("m1", &replica, "assistant", "Hello", None)
            .unwrap();

        assert!(db
            .set_message_feedback("m1", "positive", Some("sounded just like her"))
            .unwrap());
        let messages = db.list_replica_messages(&replica).unwrap();
        assert_eq!(messages[0].feedback.as_deref(), Some("positive"));
        assert_eq!(messages[0].content, "Hello");

        assert!(!db.set_message_feedback("missing", "negative", None).unwrap());
    }

    #[test]
    fn update_replica_merges_partial_changes() {
        let db = test_db();
        let account = seed_account(&db, "a@example.com");
        let replica = seed_replica(&db, &account);

        let updated = db
            .update_replica(
                &replica,
                ReplicaChanges {
                    voice_id: Some("voice-abc".into()),
                    is_generated: Some(true),
                    ..Default::default()
                },
            )
            .unwrap()
            .unwrap();

        assert_eq!(updated.name, "Test Replica");
        assert_eq!(updated.voice_id.as_deref(), Some("voice-abc"));
        assert!(updated.is_generated);

        assert!(db
            .update_replica("missing", ReplicaChanges::default())
            .unwrap()
            .is_none());
    }

    #[test]
    fn delete_account_cascades() {
        let db = test_db();
        let account = seed_account(&db, "a@example.com");
        let replica = seed_replica(&db, &account);
        db.insert_chat_message("m1", &replica, "user", "hi", None)
            .unwrap();
        db.create_access_code("ac1", "CODE-1").unwrap();
        db.mark_access_code_used("CODE-1", &account).unwrap();

        db.delete_account(&account).unwrap();

        assert!(db.get_account_by_id(&account).unwrap().is_none());
        assert!(db.get_replica(&replica).unwrap().is_none());
        assert_eq!(db.count_replica_messages(&replica).unwrap(), 0);
        // the consumed code survives, minus its back-reference
        let code = db.get_access_code("CODE-1").unwrap().unwrap();
        assert!(code.is_used);
        assert!(code.used_by.is_none());
    }
}
