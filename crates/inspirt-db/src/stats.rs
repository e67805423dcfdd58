//! Read-side aggregation for the operator dashboard. No caching, no
//! incremental maintenance — every call recomputes from the live tables.

use anyhow::Result;

use crate::Database;
use crate::models::{ChatMessageJoinedRow, ChatMessageRow};
use inspirt_types::models::INITIAL_CREDITS;

/// Raw dashboard figures. The HTTP layer shapes these into the response.
pub struct DashboardCounts {
    pub total_accounts: i64,
    pub total_replicas: i64,
    pub total_messages: i64,
    pub total_credits_used: i64,
    pub avg_messages_per_account: f64,
}

impl Database {
    pub fn dashboard_counts(&self) -> Result<DashboardCounts> {
        self.with_conn(|conn| {
            let total_accounts: i64 =
                conn.query_row("SELECT COUNT(*) FROM accounts", [], |r| r.get(0))?;
            let total_replicas: i64 =
                conn.query_row("SELECT COUNT(*) FROM replicas", [], |r| r.get(0))?;
            let total_messages: i64 =
                conn.query_row("SELECT COUNT(*) FROM chat_messages", [], |r| r.get(0))?;
            let credits_remaining: i64 = conn.query_row(
                "SELECT COALESCE(SUM(credits), 0) FROM accounts",
                [],
                |r| r.get(0),
            )?;

            let total_credits_used = total_accounts * INITIAL_CREDITS - credits_remaining;
            let avg_messages_per_account = if total_accounts > 0 {
                (total_messages as f64 / total_accounts as f64 * 100.0).round() / 100.0
            } else {
                0.0
            };

            Ok(DashboardCounts {
                total_accounts,
                total_replicas,
                total_messages,
                total_credits_used,
                avg_messages_per_account,
            })
        })
    }

    /// Every message joined with replica name and owner email, oldest first.
    pub fn list_messages_with_names(&self) -> Result<Vec<ChatMessageJoinedRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT m.id, m.replica_id, m.role, m.content, m.audio_url,
                        m.feedback, m.feedback_text, m.created_at,
                        r.name, a.email
                 FROM chat_messages m
                 INNER JOIN replicas r ON m.replica_id = r.id
                 INNER JOIN accounts a ON r.account_id = a.id
                 ORDER BY m.created_at, m.rowid",
            )?;
            let rows = stmt
                .query_map([], joined_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// The most recent messages with display names, newest first.
    pub fn recent_messages_with_names(&self, limit: u32) -> Result<Vec<ChatMessageJoinedRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT m.id, m.replica_id, m.role, m.content, m.audio_url,
                        m.feedback, m.feedback_text, m.created_at,
                        r.name, a.email
                 FROM chat_messages m
                 INNER JOIN replicas r ON m.replica_id = r.id
                 INNER JOIN accounts a ON r.account_id = a.id
                 ORDER BY m.created_at DESC, m.rowid DESC
                 LIMIT ?1",
            )?;
            let rows = stmt
                .query_map([limit], joined_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

fn joined_from_row(
    row: &rusqlite::Row<'_>,
) -> std::result::Result<ChatMessageJoinedRow, rusqlite::Error> {
    Ok(ChatMessageJoinedRow {
        message: ChatMessageRow {
            id: row.get(0)?,
            replica_id: row.get(1)?,
            role: row.get(2)?,
            content: row.get(3)?,
            audio_url: row.get(4)?,
            feedback: row.get(5)?,
            feedback_text: row.get(6)?,
            created_at: row.get(7)?,
        },
        replica_name: row.get(8)?,
        account_email: row.get(9)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_on_empty_store() {
        let db = Database::open_in_memory().unwrap();
        let counts = db.dashboard_counts().unwrap();
        assert_eq!(counts.total_accounts, 0);
        assert_eq!(counts.total_credits_used, 0);
        assert_eq!(counts.avg_messages_per_account, 0.0);
    }

    #[test]
    fn credits_used_derives_from_initial_allowance() {
        let db = Database::open_in_memory().unwrap();
        db.create_account("a1", "one@example.com", "hash", false).unwrap();
        db.create_account("a2", "two@example.com", "hash", false).unwrap();

        // a1 spends 3 turns
        for _ in 0..3 {
            db.decrement_credits_checked("a1").unwrap();
        }

        let counts = db.dashboard_counts().unwrap();
        assert_eq!(counts.total_accounts, 2);
        // 2 accounts * 10 initial - (7 + 10) remaining
        assert_eq!(counts.total_credits_used, 3);
    }

    #[test]
    fn recent_messages_newest_first_with_names() {
        let db = Database::open_in_memory().unwrap();
        db.create_account("a1", "owner@example.com", "hash", false).unwrap();
        db.create_replica("r1", "a1", "Grandma June", None, None, None).unwrap();

        for i in 0..12 {
            db.insert_chat_message(&format!("m{}", i), "r1", "user", &format!("msg {}", i), None)
                .unwrap();
        }

        let recent = db.recent_messages_with_names(10).unwrap();
        assert_eq!(recent.len(), 10);
        assert_eq!(recent[0].message.content, "msg 11");
        assert_eq!(recent[0].replica_name, "Grandma June");
        assert_eq!(recent[0].account_email, "owner@example.com");
        assert_eq!(recent[9].message.content, "msg 2");

        let counts = db.dashboard_counts().unwrap();
        assert_eq!(counts.total_messages, 12);
        assert_eq!(counts.avg_messages_per_account, 12.0);
    }
}
