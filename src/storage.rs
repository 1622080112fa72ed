use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{anyhow, Context, Result};
use parking_lot::Mutex;
use rusqlite::{params, Connection};
use serde_json::{Map, Value};

/// A flat JSON object stored in one of the named collections.
pub type Document = Map<String, Value>;

/// Conjunction of field equality tests used to address documents.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    fields: Vec<(String, Value)>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq<K: Into<String>, V: Into<Value>>(mut self, field: K, value: V) -> Self {
        self.fields.push((field.into(), value.into()));
        self
    }

    pub fn matches(&self, doc: &Document) -> bool {
        self.fields
            .iter()
            .all(|(field, value)| doc.get(field) == Some(value))
    }
}

/// Access pattern shared by the cursor and saved-post collections.
pub trait DocumentStore: Send + Sync {
    fn get(&self, collection: &str, query: &Query) -> Result<Option<Document>>;
    fn search(&self, collection: &str, query: &Query) -> Result<Vec<Document>>;
    /// Replaces every document matching `query` with `doc`, or inserts `doc`
    /// when nothing matches. Returns the number of documents written.
    fn upsert(&self, collection: &str, doc: Document, query: &Query) -> Result<usize>;
    /// Returns the number of documents removed.
    fn remove(&self, collection: &str, query: &Query) -> Result<usize>;
}

#[derive(Debug, Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

#[derive(Debug, Default, Clone)]
pub struct Options {
    pub path: Option<PathBuf>,
}

impl SqliteStore {
    pub fn open(opts: Options) -> Result<Self> {
        let path = if let Some(path) = opts.path {
            path
        } else {
            default_path().context("storage: resolve default path")?
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("storage: create directory {}", parent.display())
                })?;
            }
        }

        let conn = Connection::open(&path)
            .with_context(|| format!("storage: open database at {}", path.display()))?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .context("storage: set WAL")?;
        conn.pragma_update(None, "busy_timeout", 5000)
            .context("storage: set busy timeout")?;
        migrate(&conn)?;
        tracing::debug!(path = %path.display(), "storage opened");

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("storage: open in-memory database")?;
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
}

impl DocumentStore for SqliteStore {
    fn get(&self, collection: &str, query: &Query) -> Result<Option<Document>> {
        let conn = self.conn.lock();
        let docs = matching(&conn, collection, query)?;
        Ok(docs.into_iter().next().map(|(_, doc)| doc))
    }

    fn search(&self, collection: &str, query: &Query) -> Result<Vec<Document>> {
        let conn = self.conn.lock();
        let docs = matching(&conn, collection, query)?;
        Ok(docs.into_iter().map(|(_, doc)| doc).collect())
    }

    fn upsert(&self, collection: &str, doc: Document, query: &Query) -> Result<usize> {
        let body = serde_json::to_string(&doc).context("storage: encode document")?;
        let mut conn = self.conn.lock();
        let tx = conn.transaction().context("storage: begin upsert")?;
        let ids: Vec<i64> = matching(&tx, collection, query)?
            .into_iter()
            .map(|(id, _)| id)
            .collect();

        let written = if ids.is_empty() {
            tx.execute(
                "INSERT INTO documents (collection, body) VALUES (?1, ?2)",
                params![collection, body],
            )
            .with_context(|| format!("storage: insert into {collection}"))?
        } else {
            let mut count = 0;
            for id in &ids {
                count += tx
                    .execute(
                        "UPDATE documents SET body = ?1 WHERE id = ?2",
                        params![body, id],
                    )
                    .with_context(|| format!("storage: update {collection} document {id}"))?;
            }
            count
        };
        tx.commit().context("storage: commit upsert")?;
        Ok(written)
    }

    fn remove(&self, collection: &str, query: &Query) -> Result<usize> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction().context("storage: begin remove")?;
        let ids: Vec<i64> = matching(&tx, collection, query)?
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        let mut removed = 0;
        for id in &ids {
            removed += tx
                .execute("DELETE FROM documents WHERE id = ?1", params![id])
                .with_context(|| format!("storage: delete {collection} document {id}"))?;
        }
        tx.commit().context("storage: commit remove")?;
        Ok(removed)
    }
}

fn matching(conn: &Connection, collection: &str, query: &Query) -> Result<Vec<(i64, Document)>> {
    let mut stmt = conn.prepare(
        r#"
SELECT id, body
FROM documents
WHERE collection = ?1
ORDER BY id ASC
"#,
    )?;
    let rows = stmt
        .query_map(params![collection], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()
        .with_context(|| format!("storage: query {collection}"))?;

    let mut docs = Vec::new();
    for (id, body) in rows {
        let doc: Document = serde_json::from_str(&body)
            .with_context(|| format!("storage: malformed {collection} document {id}"))?;
        if query.matches(&doc) {
            docs.push((id, doc));
        }
    }
    Ok(docs)
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
    )
    .context("storage: create schema_migrations")?;

    let current: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .context("storage: read schema version")?;

    for (idx, sql) in migrations().iter().enumerate() {
        let version = (idx + 1) as i64;
        if version <= current {
            continue;
        }
        conn.execute_batch(sql)
            .with_context(|| format!("storage: apply migration {version}"))?;
        conn.execute(
            "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
            params![
                version,
                SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .unwrap_or(Duration::from_secs(0))
                    .as_secs() as i64,
            ],
        )?;
    }
    Ok(())
}

fn migrations() -> Vec<&'static str> {
    vec![
        r#"
CREATE TABLE IF NOT EXISTS documents (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  collection TEXT NOT NULL,
  body TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents(collection);
"#,
    ]
}

pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("post-roulette").join("state.db"))
}
