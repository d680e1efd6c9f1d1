use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};

#[derive(Debug, Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

#[derive(Debug, Default, Clone)]
pub struct Options {
    pub path: Option<PathBuf>,
}

impl Store {
    pub fn open(opts: Options) -> Result<Self> {
        let path = if let Some(path) = opts.path {
            path
        } else {
            default_path().context("storage: resolve default path")?
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("storage: create directory {}", parent.display()))?;
        }

        let conn = Connection::open(&path)
            .with_context(|| format!("storage: open database at {}", path.display()))?;
        conn.pragma_update(None, "journal_mode", &"WAL")
            .context("storage: set WAL")?;
        conn.pragma_update(None, "foreign_keys", &"ON")
            .context("storage: enable foreign keys")?;
        conn.pragma_update(None, "busy_timeout", &5000)
            .context("storage: set busy timeout")?;
        migrate(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn close(self) -> Result<()> {
        let conn = Arc::try_unwrap(self.conn)
            .map_err(|_| anyhow!("storage: connection still in use"))?
            .into_inner();
        conn.close()
            .map_err(|(_, err)| err)
            .context("storage: close connection")
    }

    pub fn load_vote_flags(&self) -> Result<HashSet<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT target_id FROM vote_flags")?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<HashSet<_>>>()?;
        Ok(rows)
    }

    pub fn set_vote_flag(&self, target_id: &str, voted: bool) -> Result<()> {
        if target_id.is_empty() {
            bail!("storage: vote target id required");
        }
        let conn = self.conn.lock();
        if voted {
            conn.execute(
                r#"
INSERT INTO vote_flags (target_id, voted_at)
VALUES (?1, ?2)
ON CONFLICT(target_id) DO UPDATE SET voted_at = excluded.voted_at
"#,
                params![target_id, Utc::now().timestamp()],
            )?;
        } else {
            conn.execute(
                "DELETE FROM vote_flags WHERE target_id = ?1",
                params![target_id],
            )?;
        }
        Ok(())
    }

    pub fn get_identity(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT value FROM identity WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()
        .context("storage: query identity value")
    }

    pub fn set_identity(&self, key: &str, value: &str) -> Result<()> {
        if key.is_empty() {
            bail!("storage: identity key required");
        }
        let conn = self.conn.lock();
        conn.execute(
            r#"
INSERT INTO identity (key, value, updated_at)
VALUES (?1, ?2, ?3)
ON CONFLICT(key) DO UPDATE SET
  value = excluded.value,
  updated_at = excluded.updated_at
"#,
            params![key, value, Utc::now().timestamp()],
        )?;
        Ok(())
    }

    pub fn clear_identity(&self, key: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute("DELETE FROM identity WHERE key = ?1", params![key])?;
        Ok(())
    }
}

fn migrate(conn: &Connection) -> Result<()> {
    conn.execute(
        r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
  version INTEGER PRIMARY KEY,
  applied_at INTEGER NOT NULL
)
"#,
        [],
    )?;

    let current: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    let migrations = migrations();
    for (idx, sql) in migrations.iter().enumerate() {
        let version = (idx + 1) as i64;
        if version <= current {
            continue;
        }
        conn.execute_batch(sql)?;
        conn.execute(
            "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
            params![version, Utc::now().timestamp()],
        )?;
    }
    Ok(())
}

fn migrations() -> Vec<&'static str> {
    vec![
        r#"
CREATE TABLE IF NOT EXISTS vote_flags (
  target_id TEXT PRIMARY KEY,
  voted_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS identity (
  key TEXT PRIMARY KEY,
  value TEXT NOT NULL,
  updated_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_vote_flags_voted_at ON vote_flags(voted_at);
"#,
    ]
}

pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("an-tui").join("state.db"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn open_creates_database() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.db");
        let store = Store::open(Options {
            path: Some(path.clone()),
        })
        .unwrap();
        assert!(path.exists());
        store.close().unwrap();
    }

    #[test]
    fn vote_flags_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.db");
        let store = Store::open(Options {
            path: Some(path.clone()),
        })
        .unwrap();

        store.set_vote_flag("paper/2401.00001", true).unwrap();
        store.set_vote_flag("comment/9", true).unwrap();
        store.set_vote_flag("comment/9", false).unwrap();

        let flags = store.load_vote_flags().unwrap();
        assert!(flags.contains("paper/2401.00001"));
        assert!(!flags.contains("comment/9"));
        store.close().unwrap();

        // flags survive a reopen
        let reopened = Store::open(Options { path: Some(path) }).unwrap();
        let flags = reopened.load_vote_flags().unwrap();
        assert!(flags.contains("paper/2401.00001"));
        reopened.close().unwrap();
    }

    #[test]
    fn identity_round_trip() {
        let dir = tempdir().unwrap();
        let store = Store::open(Options {
            path: Some(dir.path().join("state.db")),
        })
        .unwrap();

        assert!(store.get_identity("actor_token").unwrap().is_none());
        store.set_identity("actor_token", "user_abc123def").unwrap();
        assert_eq!(
            store.get_identity("actor_token").unwrap().as_deref(),
            Some("user_abc123def")
        );
        store.clear_identity("actor_token").unwrap();
        assert!(store.get_identity("actor_token").unwrap().is_none());
        store.close().unwrap();
    }
}
