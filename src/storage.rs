use crate::api::models::Conversation;
use crate::error::Result;
use directories::ProjectDirs;
use rusqlite::{params, Connection};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

fn db_path() -> Option<PathBuf> {
    let proj = ProjectDirs::from("com", "example", "StorefrontAdmin")?;
    Some(proj.data_dir().join("cache.sqlite"))
}

// Conversation list cache so the sidebar renders before the backend
// answers. Rows are keyed by the operator they were loaded for.
pub struct Cache {
    conn: Connection,
    owner: String,
}

impl Cache {
    pub fn open_default(owner: &str) -> Result<Self> {
        let path = db_path().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, "no data dir")
        })?;
        Self::open(&path, owner)
    }

    pub fn open(path: &Path, owner: &str) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            CREATE TABLE IF NOT EXISTS cached_conversations (
                owner TEXT NOT NULL,
                id TEXT NOT NULL,
                position INTEGER NOT NULL,
                last_message_at TEXT,
                updated_at INTEGER NOT NULL,
                raw_json TEXT NOT NULL,
                PRIMARY KEY (owner, id)
            );
            "#,
        )?;
        Ok(Self { conn, owner: owner.to_string() })
    }

    /// Replaces the cached list; the sidebar is always rebuilt wholesale.
    pub fn replace_conversations(&mut self, conversations: &[Conversation]) -> Result<()> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or_default();
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM cached_conversations WHERE owner = ?1", params![self.owner])?;
        for (idx, c) in conversations.iter().enumerate() {
            let raw = serde_json::to_string(c)?;
            tx.execute(
                r#"
                INSERT INTO cached_conversations (owner, id, position, last_message_at, updated_at, raw_json)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                ON CONFLICT(owner, id) DO NOTHING
                "#,
                params![self.owner, c.id, idx as i64, c.last_message_at.map(|t| t.to_rfc3339()), now, raw],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Cached conversations in the order the backend last returned them.
    pub fn conversations(&self) -> Result<Vec<Conversation>> {
        let mut stmt = self.conn.prepare(
            "SELECT raw_json FROM cached_conversations WHERE owner = ?1 ORDER BY position ASC",
        )?;
        let rows = stmt.query_map(params![self.owner], |row| row.get::<_, String>(0))?;
        let mut out = Vec::new();
        for raw in rows {
            match serde_json::from_str(&raw?) {
                Ok(c) => out.push(c),
                Err(e) => log::warn!("skipping unreadable cached conversation: {e}"),
            }
        }
        Ok(out)
    }

    /// Drops this operator's rows; called on logout and session expiry.
    pub fn clear(&mut self) -> Result<()> {
        self.conn
            .execute("DELETE FROM cached_conversations WHERE owner = ?1", params![self.owner])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::Participant;

    fn conversation(id: &str) -> Conversation {
        Conversation {
            id: id.into(),
            participants: vec![Participant {
                id: "u1".into(),
                name: "Ops".into(),
                email: "ops@example.com".into(),
                role: "admin".into(),
            }],
            last_message_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn replace_keeps_backend_order_and_drops_old_rows() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = Cache::open(&dir.path().join("cache.sqlite"), "u1").unwrap();
        cache.replace_conversations(&[conversation("a"), conversation("b")]).unwrap();
        cache.replace_conversations(&[conversation("c"), conversation("a")]).unwrap();

        let ids: Vec<_> = cache.conversations().unwrap().into_iter().map(|c| c.id).collect();
        assert_eq!(ids, ["c", "a"]);
    }

    #[test]
    fn reopening_reads_the_same_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("cache.sqlite");
        Cache::open(&path, "u1").unwrap().replace_conversations(&[conversation("x")]).unwrap();
        let cached = Cache::open(&path, "u1").unwrap().conversations().unwrap();
        assert_eq!(cached, vec![conversation("x")]);
    }

    #[test]
    fn operators_do_not_see_each_others_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.sqlite");
        let mut first = Cache::open(&path, "u1").unwrap();
        let mut second = Cache::open(&path, "u2").unwrap();
        first.replace_conversations(&[conversation("a")]).unwrap();
        second.replace_conversations(&[conversation("b")]).unwrap();

        assert_eq!(first.conversations().unwrap(), vec![conversation("a")]);
        first.clear().unwrap();
        assert!(first.conversations().unwrap().is_empty());
        assert_eq!(second.conversations().unwrap(), vec![conversation("b")]);
    }
}
