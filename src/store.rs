// Copyright 2026 Modelshelf Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::params;
use rusqlite::params_from_iter;
use rusqlite::types::Value as SqlValue;
use time::OffsetDateTime;

use crate::clock::format_timestamp;
use crate::error;
use crate::model::CatalogEntry;

const SCHEMA_VERSION: i64 = 1;
const FTS_VERSION: &str = "fts5-v1";

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS meta (
  key TEXT PRIMARY KEY,
  value TEXT
);

CREATE TABLE IF NOT EXISTS models (
  id INTEGER PRIMARY KEY,
  filename TEXT NOT NULL,
  format TEXT,
  file_path TEXT NOT NULL UNIQUE,
  file_size INTEGER,
  date_added TEXT,
  last_viewed TEXT
);

CREATE TABLE IF NOT EXISTS model_metadata (
  model_id INTEGER PRIMARY KEY REFERENCES models(id) ON DELETE CASCADE,
  title TEXT,
  description TEXT,
  keywords TEXT,
  category TEXT,
  source TEXT,
  rating INTEGER
);

CREATE TABLE IF NOT EXISTS projects (
  id INTEGER PRIMARY KEY,
  name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS project_models (
  project_id INTEGER NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
  model_id INTEGER NOT NULL REFERENCES models(id) ON DELETE CASCADE,
  PRIMARY KEY (project_id, model_id)
);

CREATE INDEX IF NOT EXISTS idx_models_format ON models(format);
CREATE INDEX IF NOT EXISTS idx_models_last_viewed ON models(last_viewed);
CREATE INDEX IF NOT EXISTS idx_metadata_category ON model_metadata(category);
CREATE INDEX IF NOT EXISTS idx_project_models_model ON project_models(model_id);

CREATE VIRTUAL TABLE IF NOT EXISTS models_fts USING fts5(
  filename, format, file_path,
  content='models', content_rowid='id'
);

CREATE VIRTUAL TABLE IF NOT EXISTS metadata_fts USING fts5(
  title, description, keywords, category, source,
  content='model_metadata', content_rowid='model_id'
);

CREATE TRIGGER IF NOT EXISTS models_ai AFTER INSERT ON models BEGIN
  INSERT INTO models_fts(rowid, filename, format, file_path)
  VALUES (new.id, new.filename, new.format, new.file_path);
END;

CREATE TRIGGER IF NOT EXISTS models_ad AFTER DELETE ON models BEGIN
  INSERT INTO models_fts(models_fts, rowid, filename, format, file_path)
  VALUES ('delete', old.id, old.filename, old.format, old.file_path);
END;

CREATE TRIGGER IF NOT EXISTS models_au AFTER UPDATE ON models BEGIN
  INSERT INTO models_fts(models_fts, rowid, filename, format, file_path)
  VALUES ('delete', old.id, old.filename, old.format, old.file_path);
  INSERT INTO models_fts(rowid, filename, format, file_path)
  VALUES (new.id, new.filename, new.format, new.file_path);
END;

CREATE TRIGGER IF NOT EXISTS model_metadata_ai AFTER INSERT ON model_metadata BEGIN
  INSERT INTO metadata_fts(rowid, title, description, keywords, category, source)
  VALUES (new.model_id, new.title, new.description, new.keywords, new.category, new.source);
END;

CREATE TRIGGER IF NOT EXISTS model_metadata_ad AFTER DELETE ON model_metadata BEGIN
  INSERT INTO metadata_fts(metadata_fts, rowid, title, description, keywords, category, source)
  VALUES ('delete', old.model_id, old.title, old.description, old.keywords, old.category, old.source);
END;

CREATE TRIGGER IF NOT EXISTS model_metadata_au AFTER UPDATE ON model_metadata BEGIN
  INSERT INTO metadata_fts(metadata_fts, rowid, title, description, keywords, category, source)
  VALUES ('delete', old.model_id, old.title, old.description, old.keywords, old.category, old.source);
  INSERT INTO metadata_fts(rowid, title, description, keywords, category, source)
  VALUES (new.model_id, new.title, new.description, new.keywords, new.category, new.source);
END;

CREATE TABLE IF NOT EXISTS search_history (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  query TEXT NOT NULL,
  filters TEXT NOT NULL,
  result_count INTEGER NOT NULL,
  created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_search_history_created ON search_history(created_at);

CREATE TABLE IF NOT EXISTS saved_searches (
  id INTEGER PRIMARY KEY,
  name TEXT NOT NULL UNIQUE,
  query TEXT NOT NULL,
  filters TEXT NOT NULL,
  created_at TEXT NOT NULL
);";

#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    columns: Vec<String>,
    values: Vec<SqlValue>,
}

impl Record {
    pub fn new(columns: Vec<String>, values: Vec<SqlValue>) -> Self {
        Self { columns, values }
    }

    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        let idx = self.columns.iter().position(|c| c == column)?;
        self.values.get(idx)
    }

    pub fn text(&self, column: &str) -> Option<String> {
        match self.get(column)? {
            SqlValue::Text(s) => Some(s.clone()),
            SqlValue::Integer(i) => Some(i.to_string()),
            SqlValue::Real(r) => Some(r.to_string()),
            SqlValue::Null | SqlValue::Blob(_) => None,
        }
    }

    pub fn int(&self, column: &str) -> Option<i64> {
        match self.get(column)? {
            SqlValue::Integer(i) => Some(*i),
            SqlValue::Real(r) => Some(*r as i64),
            SqlValue::Text(s) => s.trim().parse().ok(),
            SqlValue::Null | SqlValue::Blob(_) => None,
        }
    }

    pub fn real(&self, column: &str) -> Option<f64> {
        match self.get(column)? {
            SqlValue::Real(r) => Some(*r),
            SqlValue::Integer(i) => Some(*i as f64),
            SqlValue::Text(s) => s.trim().parse().ok(),
            SqlValue::Null | SqlValue::Blob(_) => None,
        }
    }
}

/// The storage surface the search engine runs against.
pub trait Backend {
    fn query_rows(&self, sql: &str, params: &[SqlValue]) -> error::Result<Vec<Record>>;
    fn execute(&self, sql: &str, params: &[SqlValue]) -> error::Result<usize>;
    fn execute_batch(&self, sql: &str) -> error::Result<()>;
}

pub struct Store {
    pub conn: Connection,
    pub path: PathBuf,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct StoreStats {
    pub model_count: i64,
    pub metadata_count: i64,
    pub project_count: i64,
    pub project_link_count: i64,
    pub history_count: i64,
    pub saved_search_count: i64,
    pub db_size_bytes: u64,
}

#[derive(Debug)]
pub struct IntegrityReport {
    pub status: String,
    pub stats: StoreStats,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ConsistencyReport {
    pub model_count: i64,
    pub models_fts_count: i64,
    pub metadata_count: i64,
    pub metadata_fts_count: i64,
}

impl ConsistencyReport {
    pub fn models_fts_ok(&self) -> bool {
        self.model_count == self.models_fts_count
    }

    pub fn metadata_fts_ok(&self) -> bool {
        self.metadata_count == self.metadata_fts_count
    }
}

impl Store {
    pub fn init(path: &Path) -> anyhow::Result<()> {
        if path.exists() {
            anyhow::bail!("store already exists at {}", path.display());
        }
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create {}", parent.display()))?;
        }
        let conn = Self::open_connection(path, true)?;
        Self::prepare(&conn)?;
        Ok(())
    }

    pub fn open(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            anyhow::bail!(
                "no store at {}; run `modelshelf init` first",
                path.display()
            );
        }
        let conn = Self::open_connection(path, false)?;
        Self::prepare(&conn)?;
        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }

    pub fn open_in_memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory store")?;
        Self::prepare(&conn)?;
        Ok(Self {
            conn,
            path: PathBuf::from(":memory:"),
        })
    }

    fn open_connection(path: &Path, create: bool) -> anyhow::Result<Connection> {
        let mut flags = OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        if create {
            flags |= OpenFlags::SQLITE_OPEN_CREATE;
        }
        let conn = Connection::open_with_flags(path, flags)
            .with_context(|| format!("open {}", path.display()))?;
        conn.busy_timeout(Duration::from_millis(5000))
            .context("set busy timeout")?;
        Ok(conn)
    }

    fn prepare(conn: &Connection) -> anyhow::Result<()> {
        conn.execute_batch("PRAGMA foreign_keys=ON;\nPRAGMA synchronous=NORMAL;")
            .context("apply pragmas")?;
        Self::migrate(conn)
    }

    fn create_schema(conn: &Connection) -> anyhow::Result<()> {
        conn.execute_batch(SCHEMA).context("create schema")?;
        Ok(())
    }

    fn set_meta(conn: &Connection, key: &str, value: &str) -> anyhow::Result<()> {
        conn.execute(
            "INSERT OR REPLACE INTO meta (key, value) VALUES (?1, ?2)",
            params![key, value],
        )
        .context("set meta")?;
        Ok(())
    }

    fn table_exists(conn: &Connection, name: &str) -> anyhow::Result<bool> {
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                params![name],
                |row| row.get(0),
            )
            .context("check table")?;
        Ok(count > 0)
    }

    fn schema_version(conn: &Connection) -> anyhow::Result<i64> {
        if !Self::table_exists(conn, "meta")? {
            return Ok(0);
        }
        let value: Option<String> = conn
            .query_row(
                "SELECT value FROM meta WHERE key='schema_version'",
                [],
                |row| row.get(0),
            )
            .optional()
            .context("read schema_version")?;
        Ok(value.and_then(|v| v.parse::<i64>().ok()).unwrap_or(0))
    }

    fn migrate(conn: &Connection) -> anyhow::Result<()> {
        let version = Self::schema_version(conn)?;
        if version > SCHEMA_VERSION {
            anyhow::bail!(
                "store schema version {} is newer than supported {}",
                version,
                SCHEMA_VERSION
            );
        }
        if version == SCHEMA_VERSION {
            return Ok(());
        }
        Self::create_schema(conn)?;
        Self::set_meta(conn, "schema_version", &SCHEMA_VERSION.to_string())?;
        Self::set_meta(conn, "fts_version", FTS_VERSION)?;
        tracing::info!(version = SCHEMA_VERSION, "store schema created");
        Ok(())
    }

    fn count(&self, sql: &str) -> anyhow::Result<i64> {
        self.conn
            .query_row(sql, [], |row| row.get(0))
            .with_context(|| format!("count: {sql}"))
    }

    pub fn stats(&self) -> anyhow::Result<StoreStats> {
        let db_size_bytes = std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0);
        Ok(StoreStats {
            model_count: self.count("SELECT COUNT(*) FROM models")?,
            metadata_count: self.count("SELECT COUNT(*) FROM model_metadata")?,
            project_count: self.count("SELECT COUNT(*) FROM projects")?,
            project_link_count: self.count("SELECT COUNT(*) FROM project_models")?,
            history_count: self.count("SELECT COUNT(*) FROM search_history")?,
            saved_search_count: self.count("SELECT COUNT(*) FROM saved_searches")?,
            db_size_bytes,
        })
    }

    pub fn integrity_check(&self) -> anyhow::Result<IntegrityReport> {
        let status: String = self
            .conn
            .query_row("PRAGMA integrity_check", [], |row| row.get(0))
            .context("integrity_check")?;
        let stats = self.stats()?;
        Ok(IntegrityReport { status, stats })
    }

    pub fn consistency_report(&self) -> anyhow::Result<ConsistencyReport> {
        Ok(ConsistencyReport {
            model_count: self.count("SELECT COUNT(*) FROM models")?,
            models_fts_count: self.count("SELECT COUNT(*) FROM models_fts_docsize")?,
            metadata_count: self.count("SELECT COUNT(*) FROM model_metadata")?,
            metadata_fts_count: self.count("SELECT COUNT(*) FROM metadata_fts_docsize")?,
        })
    }

    /// Inserts or updates one catalog entry keyed by file path and returns
    /// the model id. Metadata is written only when the entry carries some.
    pub fn upsert_model(&self, entry: &CatalogEntry, now: OffsetDateTime) -> anyhow::Result<i64> {
        let date_added = entry
            .date_added
            .clone()
            .unwrap_or_else(|| format_timestamp(now));
        self.conn
            .execute(
                "INSERT INTO models (filename, format, file_path, file_size, date_added, last_viewed)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(file_path) DO UPDATE SET
                   filename = excluded.filename,
                   format = excluded.format,
                   file_size = excluded.file_size,
                   date_added = COALESCE(?7, models.date_added),
                   last_viewed = COALESCE(excluded.last_viewed, models.last_viewed)",
                params![
                    entry.filename,
                    entry.format,
                    entry.file_path,
                    entry.file_size,
                    date_added,
                    entry.last_viewed,
                    entry.date_added,
                ],
            )
            .with_context(|| format!("upsert model {}", entry.file_path))?;
        let id: i64 = self
            .conn
            .query_row(
                "SELECT id FROM models WHERE file_path = ?1",
                params![entry.file_path],
                |row| row.get(0),
            )
            .context("read model id")?;

        if entry.has_metadata() {
            self.conn
                .execute(
                    "INSERT INTO model_metadata (model_id, title, description, keywords, category, source, rating)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                     ON CONFLICT(model_id) DO UPDATE SET
                       title = excluded.title,
                       description = excluded.description,
                       keywords = excluded.keywords,
                       category = excluded.category,
                       source = excluded.source,
                       rating = excluded.rating",
                    params![
                        id,
                        entry.title,
                        entry.description,
                        entry.keywords,
                        entry.category,
                        entry.source,
                        entry.rating,
                    ],
                )
                .context("upsert model metadata")?;
        }

        for project in &entry.projects {
            self.conn
                .execute(
                    "INSERT OR IGNORE INTO projects (name) VALUES (?1)",
                    params![project],
                )
                .context("insert project")?;
            self.conn
                .execute(
                    "INSERT OR IGNORE INTO project_models (project_id, model_id)
                     SELECT id, ?2 FROM projects WHERE name = ?1",
                    params![project, id],
                )
                .context("link project")?;
        }
        Ok(id)
    }

    /// Stamps `last_viewed` on a model addressed by id or file path.
    pub fn mark_viewed(&self, target: &str, now: OffsetDateTime) -> anyhow::Result<usize> {
        let stamp = format_timestamp(now);
        let updated = match target.parse::<i64>() {
            Ok(id) => self
                .conn
                .execute(
                    "UPDATE models SET last_viewed = ?1 WHERE id = ?2",
                    params![stamp, id],
                )
                .context("mark viewed by id")?,
            Err(_) => self
                .conn
                .execute(
                    "UPDATE models SET last_viewed = ?1 WHERE file_path = ?2",
                    params![stamp, target],
                )
                .context("mark viewed by path")?,
        };
        Ok(updated)
    }

    pub fn list_entries(&self) -> anyhow::Result<Vec<CatalogEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT models.id, models.filename, models.format, models.file_path, models.file_size,
                    models.date_added, models.last_viewed, model_metadata.title,
                    model_metadata.description, model_metadata.keywords, model_metadata.category,
                    model_metadata.source, model_metadata.rating
             FROM models
             LEFT JOIN model_metadata ON model_metadata.model_id = models.id
             ORDER BY models.id ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            let id: i64 = row.get(0)?;
            let entry = CatalogEntry {
                filename: row.get(1)?,
                format: row.get(2)?,
                file_path: row.get(3)?,
                file_size: row.get(4)?,
                date_added: row.get(5)?,
                last_viewed: row.get(6)?,
                title: row.get(7)?,
                description: row.get(8)?,
                keywords: row.get(9)?,
                category: row.get(10)?,
                source: row.get(11)?,
                rating: row.get(12)?,
                projects: Vec::new(),
            };
            Ok((id, entry))
        })?;
        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }

        let mut stmt = self.conn.prepare(
            "SELECT project_models.model_id, projects.name
             FROM project_models
             JOIN projects ON projects.id = project_models.project_id
             ORDER BY project_models.model_id ASC, projects.name ASC",
        )?;
        let links = stmt.query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)))?;
        for link in links {
            let (model_id, name) = link?;
            if let Ok(idx) = entries.binary_search_by_key(&model_id, |(id, _)| *id) {
                entries[idx].1.projects.push(name);
            }
        }
        Ok(entries.into_iter().map(|(_, entry)| entry).collect())
    }
}

impl Backend for Store {
    fn query_rows(&self, sql: &str, params: &[SqlValue]) -> error::Result<Vec<Record>> {
        let mut stmt = self.conn.prepare(sql)?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(str::to_string).collect();
        let mut rows = stmt.query(params_from_iter(params.iter()))?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(columns.len());
            for idx in 0..columns.len() {
                values.push(row.get::<_, SqlValue>(idx)?);
            }
            out.push(Record::new(columns.clone(), values));
        }
        Ok(out)
    }

    fn execute(&self, sql: &str, params: &[SqlValue]) -> error::Result<usize> {
        Ok(self.conn.execute(sql, params_from_iter(params.iter()))?)
    }

    fn execute_batch(&self, sql: &str) -> error::Result<()> {
        Ok(self.conn.execute_batch(sql)?)
    }
}
