use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::models::GuestSession;

/// Named collections mirroring the remote schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Sessions,
    Boards,
    Projects,
    Columns,
    Tasks,
}

impl Collection {
    pub fn table(self) -> &'static str {
        match self {
            Collection::Sessions => "sessions",
            Collection::Boards => "boards",
            Collection::Projects => "projects",
            Collection::Columns => "columns",
            Collection::Tasks => "tasks",
        }
    }
}

/// Secondary-index lookup keys for `get_all`.
#[derive(Debug, Clone, Copy)]
pub enum IndexKey<'a> {
    Board(&'a str),
    User(&'a str),
    BoardUser(&'a str, &'a str),
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS sessions (id TEXT PRIMARY KEY, body TEXT NOT NULL);
CREATE TABLE IF NOT EXISTS boards   (id TEXT PRIMARY KEY, body TEXT NOT NULL);
CREATE TABLE IF NOT EXISTS projects (id TEXT PRIMARY KEY, body TEXT NOT NULL);
CREATE TABLE IF NOT EXISTS columns  (id TEXT PRIMARY KEY, body TEXT NOT NULL);
CREATE TABLE IF NOT EXISTS tasks    (id TEXT PRIMARY KEY, body TEXT NOT NULL);

CREATE INDEX IF NOT EXISTS idx_tasks_board
    ON tasks (json_extract(body, '$.board'));
CREATE INDEX IF NOT EXISTS idx_tasks_user
    ON tasks (json_extract(body, '$.user'));
CREATE INDEX IF NOT EXISTS idx_tasks_board_user
    ON tasks (json_extract(body, '$.board'), json_extract(body, '$.user'));

CREATE TABLE IF NOT EXISTS settings (
    key        TEXT PRIMARY KEY,
    value      TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
";

/// Embedded store backing guest sessions: one table per collection, records
/// stored as JSON bodies keyed by id.
pub struct LocalStore {
    conn: Mutex<Connection>,
}

impl LocalStore {
    /// Open (creating if absent) the store at `~/.taskdeck.db`. The returned
    /// flag is true when schema creation just ran (first launch).
    pub fn open_default() -> Result<(Self, bool)> {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        Self::open(Path::new(&home).join(".taskdeck.db"))
    }

    pub fn open(path: impl AsRef<Path>) -> Result<(Self, bool)> {
        let conn = Connection::open(path).map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<(Self, bool)> {
        let conn =
            Connection::open_in_memory().map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<(Self, bool)> {
        let version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
        let created = version == 0;
        if created {
            log::info!("creating local store schema");
            conn.execute_batch(SCHEMA)?;
            conn.pragma_update(None, "user_version", 1)?;
        }
        Ok((
            Self {
                conn: Mutex::new(conn),
            },
            created,
        ))
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn get<T: DeserializeOwned>(&self, collection: Collection, id: &str) -> Result<T> {
        let sql = format!("SELECT body FROM {} WHERE id = ?1", collection.table());
        let body: Option<String> = self
            .conn()
            .query_row(&sql, [id], |row| row.get(0))
            .optional()?;
        match body {
            Some(body) => Ok(serde_json::from_str(&body)?),
            None => Err(StoreError::NotFound {
                collection: collection.table(),
                id: id.to_string(),
            }),
        }
    }

    /// All records in a collection, optionally narrowed by a secondary-index
    /// key. Order is unspecified; an empty collection yields an empty vec.
    pub fn get_all<T: DeserializeOwned>(
        &self,
        collection: Collection,
        index: Option<IndexKey<'_>>,
    ) -> Result<Vec<T>> {
        let table = collection.table();
        let conn = self.conn();
        let (sql, keys): (String, Vec<&str>) = match index {
            None => (format!("SELECT body FROM {table}"), vec![]),
            Some(IndexKey::Board(board)) => (
                format!("SELECT body FROM {table} WHERE json_extract(body, '$.board') = ?1"),
                vec![board],
            ),
            Some(IndexKey::User(user)) => (
                format!("SELECT body FROM {table} WHERE json_extract(body, '$.user') = ?1"),
                vec![user],
            ),
            Some(IndexKey::BoardUser(board, user)) => (
                format!(
                    "SELECT body FROM {table} \
                     WHERE json_extract(body, '$.board') = ?1 \
                       AND json_extract(body, '$.user') = ?2"
                ),
                vec![board, user],
            ),
        };
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(keys), |row| {
            row.get::<_, String>(0)
        })?;

        let mut records = Vec::new();
        for row in rows {
            records.push(serde_json::from_str(&row?)?);
        }
        Ok(records)
    }

    /// Insert a record, generating an id when the record carries none.
    /// Returns the id under which the record was stored.
    pub fn add(&self, collection: Collection, record: &impl Serialize) -> Result<String> {
        let mut value = serde_json::to_value(record)?;
        let obj = value
            .as_object_mut()
            .ok_or_else(|| StoreError::InvalidRecord("record must be a JSON object".into()))?;

        let id = match obj.get("id").and_then(Value::as_str) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => {
                let id = Uuid::new_v4().to_string();
                obj.insert("id".into(), Value::String(id.clone()));
                id
            }
        };

        let sql = format!(
            "INSERT INTO {} (id, body) VALUES (?1, ?2)",
            collection.table()
        );
        match self.conn().execute(&sql, params![id, value.to_string()]) {
            Ok(_) => Ok(id),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(StoreError::DuplicateId {
                    collection: collection.table(),
                    id,
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Shallow-merge `partial` into the record named by `partial.id`. A
    /// missing record aborts the whole operation; nothing partial persists.
    pub fn update(&self, collection: Collection, partial: &Value) -> Result<()> {
        let id = partial
            .get("id")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| StoreError::InvalidRecord("update requires an id".into()))?
            .to_string();
        let patch = partial
            .as_object()
            .ok_or_else(|| StoreError::InvalidRecord("update body must be a JSON object".into()))?;

        let table = collection.table();
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let sql = format!("SELECT body FROM {table} WHERE id = ?1");
        let body: Option<String> = tx.query_row(&sql, [&id], |row| row.get(0)).optional()?;
        let Some(body) = body else {
            return Err(StoreError::NotFound {
                collection: table,
                id,
            });
        };

        let mut doc: Value = serde_json::from_str(&body)?;
        if let Some(doc_obj) = doc.as_object_mut() {
            for (key, value) in patch {
                doc_obj.insert(key.clone(), value.clone());
            }
        }

        let sql = format!("UPDATE {table} SET body = ?1 WHERE id = ?2");
        tx.execute(&sql, params![doc.to_string(), id])?;
        tx.commit()?;
        Ok(())
    }

    /// Delete by id. Deleting an id that does not exist is not an error.
    pub fn delete(&self, collection: Collection, id: &str) -> Result<()> {
        let sql = format!("DELETE FROM {} WHERE id = ?1", collection.table());
        self.conn().execute(&sql, [id])?;
        Ok(())
    }

    /// The single session for this store, created lazily on first use.
    pub fn guest_session(&self) -> Result<GuestSession> {
        let mut sessions: Vec<GuestSession> = self.get_all(Collection::Sessions, None)?;
        if let Some(session) = sessions.drain(..).next() {
            return Ok(session);
        }

        let session = GuestSession {
            id: Uuid::new_v4().to_string(),
            is_guest: true,
            is_offline: false,
            created: Some(chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string()),
        };
        log::info!("creating guest session {}", session.id);
        self.add(Collection::Sessions, &session)?;
        Ok(session)
    }

    /// Seed the default board, global columns, and starter project for guest
    /// mode. Safe to call again over existing data; nothing is duplicated.
    pub fn seed_guest_defaults(&self) -> Result<()> {
        log::info!("seeding guest defaults");
        let conn = self.conn();
        let defaults: [(Collection, Value); 6] = [
            (
                Collection::Boards,
                json!({"id": "board-default", "name": "My Board"}),
            ),
            (
                Collection::Projects,
                json!({"id": "project-default", "title": "General"}),
            ),
            (
                Collection::Columns,
                json!({"id": "todo", "title": "To Do", "board": ""}),
            ),
            (
                Collection::Columns,
                json!({"id": "in_progress", "title": "In Progress", "board": ""}),
            ),
            (
                Collection::Columns,
                json!({"id": "done", "title": "Done", "board": ""}),
            ),
            (
                Collection::Boards,
                json!({"id": "board-backlog", "name": "Backlog"}),
            ),
        ];
        for (collection, body) in &defaults {
            let sql = format!(
                "INSERT OR IGNORE INTO {} (id, body) VALUES (?1, ?2)",
                collection.table()
            );
            conn.execute(&sql, params![body["id"].as_str(), body.to_string()])?;
        }
        Ok(())
    }

    /// Drop all guest data and re-seed, keeping settings intact.
    pub fn reset_guest_data(&self) -> Result<()> {
        {
            let conn = self.conn();
            for collection in [
                Collection::Sessions,
                Collection::Boards,
                Collection::Projects,
                Collection::Columns,
                Collection::Tasks,
            ] {
                conn.execute(&format!("DELETE FROM {}", collection.table()), [])?;
            }
        }
        self.seed_guest_defaults()
    }

    pub fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        let now = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string();
        self.conn().execute(
            "INSERT INTO settings (key, value, updated_at) VALUES (?1, ?2, ?3) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, now],
        )?;
        Ok(())
    }

    pub fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn()
            .query_row("SELECT value FROM settings WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    pub fn list_settings(&self) -> Result<Vec<(String, String)>> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT key, value FROM settings ORDER BY key")?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;

        let mut settings = Vec::new();
        for row in rows {
            settings.push(row?);
        }
        Ok(settings)
    }

    pub fn unset_setting(&self, key: &str) -> Result<()> {
        self.conn()
            .execute("DELETE FROM settings WHERE key = ?1", [key])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Board, Task};

    fn store() -> LocalStore {
        let (store, created) = LocalStore::open_in_memory().expect("in-memory store opens");
        assert!(created);
        store
    }

    fn task(id: &str, title: &str, column: &str, board: &str, user: &str) -> Task {
        Task {
            id: id.to_string(),
            title: title.to_string(),
            column: column.to_string(),
            board: board.to_string(),
            user: user.to_string(),
            project: None,
        }
    }

    #[test]
    fn get_all_on_empty_collection_returns_empty() {
        let store = store();
        let tasks: Vec<Task> = store.get_all(Collection::Tasks, None).unwrap();
        assert!(tasks.is_empty());
    }

    #[test]
    fn add_then_get_roundtrips() {
        let store = store();
        let board = Board {
            id: "b1".into(),
            name: "Work".into(),
        };
        store.add(Collection::Boards, &board).unwrap();

        let fetched: Board = store.get(Collection::Boards, "b1").unwrap();
        assert_eq!(fetched.name, "Work");
    }

    #[test]
    fn add_generates_id_when_absent() {
        let store = store();
        let id = store
            .add(Collection::Boards, &serde_json::json!({"name": "Ad hoc"}))
            .unwrap();
        assert!(!id.is_empty());

        let fetched: Board = store.get(Collection::Boards, &id).unwrap();
        assert_eq!(fetched.id, id);
    }

    #[test]
    fn add_duplicate_id_fails() {
        let store = store();
        let board = Board {
            id: "b1".into(),
            name: "Work".into(),
        };
        store.add(Collection::Boards, &board).unwrap();
        let err = store.add(Collection::Boards, &board).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateId { .. }));
    }

    #[test]
    fn get_missing_record_is_not_found() {
        let store = store();
        let err = store.get::<Board>(Collection::Boards, "nope").unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[test]
    fn update_merges_partial_fields() {
        let store = store();
        store
            .add(Collection::Tasks, &task("t1", "Write docs", "todo", "b1", "u1"))
            .unwrap();

        store
            .update(
                Collection::Tasks,
                &serde_json::json!({"id": "t1", "column": "done"}),
            )
            .unwrap();

        let updated: Task = store.get(Collection::Tasks, "t1").unwrap();
        assert_eq!(updated.column, "done");
        assert_eq!(updated.title, "Write docs");
        assert_eq!(updated.board, "b1");
    }

    #[test]
    fn update_missing_id_fails_and_leaves_store_unchanged() {
        let store = store();
        store
            .add(Collection::Tasks, &task("t1", "Only task", "todo", "b1", "u1"))
            .unwrap();

        let err = store
            .update(
                Collection::Tasks,
                &serde_json::json!({"id": "ghost", "column": "done"}),
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));

        let tasks: Vec<Task> = store.get_all(Collection::Tasks, None).unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].column, "todo");
    }

    #[test]
    fn update_without_id_is_rejected() {
        let store = store();
        let err = store
            .update(Collection::Tasks, &serde_json::json!({"column": "done"}))
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidRecord(_)));
    }

    #[test]
    fn delete_is_idempotent() {
        let store = store();
        store
            .add(Collection::Tasks, &task("t1", "Gone soon", "todo", "b1", "u1"))
            .unwrap();

        store.delete(Collection::Tasks, "t1").unwrap();
        store.delete(Collection::Tasks, "t1").unwrap();
        store.delete(Collection::Tasks, "never-existed").unwrap();

        let tasks: Vec<Task> = store.get_all(Collection::Tasks, None).unwrap();
        assert!(tasks.is_empty());
    }

    #[test]
    fn index_lookups_filter_by_board_user_and_both() {
        let store = store();
        store
            .add(Collection::Tasks, &task("t1", "A", "todo", "b1", "u1"))
            .unwrap();
        store
            .add(Collection::Tasks, &task("t2", "B", "todo", "b1", "u2"))
            .unwrap();
        store
            .add(Collection::Tasks, &task("t3", "C", "todo", "b2", "u1"))
            .unwrap();

        let by_board: Vec<Task> = store
            .get_all(Collection::Tasks, Some(IndexKey::Board("b1")))
            .unwrap();
        assert_eq!(by_board.len(), 2);

        let by_user: Vec<Task> = store
            .get_all(Collection::Tasks, Some(IndexKey::User("u1")))
            .unwrap();
        assert_eq!(by_user.len(), 2);

        let by_both: Vec<Task> = store
            .get_all(Collection::Tasks, Some(IndexKey::BoardUser("b1", "u1")))
            .unwrap();
        assert_eq!(by_both.len(), 1);
        assert_eq!(by_both[0].id, "t1");
    }

    #[test]
    fn seeding_twice_does_not_duplicate_defaults() {
        let store = store();
        store.seed_guest_defaults().unwrap();
        store.seed_guest_defaults().unwrap();

        let boards: Vec<Board> = store.get_all(Collection::Boards, None).unwrap();
        assert_eq!(boards.len(), 2);

        let columns: Vec<crate::models::BoardColumn> =
            store.get_all(Collection::Columns, None).unwrap();
        assert_eq!(columns.len(), 3);
        assert!(columns.iter().all(|c| c.board.is_empty()));
    }

    #[test]
    fn guest_session_is_created_once() {
        let store = store();
        let first = store.guest_session().unwrap();
        let second = store.guest_session().unwrap();
        assert_eq!(first.id, second.id);
        assert!(first.is_guest);

        let sessions: Vec<GuestSession> = store.get_all(Collection::Sessions, None).unwrap();
        assert_eq!(sessions.len(), 1);
    }

    #[test]
    fn reset_clears_tasks_and_reseeds() {
        let store = store();
        store.seed_guest_defaults().unwrap();
        store
            .add(
                Collection::Tasks,
                &task("t1", "Stale", "todo", "board-default", "u1"),
            )
            .unwrap();

        store.reset_guest_data().unwrap();

        let tasks: Vec<Task> = store.get_all(Collection::Tasks, None).unwrap();
        assert!(tasks.is_empty());
        let boards: Vec<Board> = store.get_all(Collection::Boards, None).unwrap();
        assert_eq!(boards.len(), 2);
    }

    #[test]
    fn settings_roundtrip_and_unset() {
        let store = store();
        assert_eq!(store.get_setting("remote_url").unwrap(), None);

        store.set_setting("remote_url", "http://localhost:8090").unwrap();
        store.set_setting("remote_url", "http://example.test").unwrap();
        assert_eq!(
            store.get_setting("remote_url").unwrap().as_deref(),
            Some("http://example.test")
        );
        assert_eq!(store.list_settings().unwrap().len(), 1);

        store.unset_setting("remote_url").unwrap();
        assert_eq!(store.get_setting("remote_url").unwrap(), None);
    }
}
