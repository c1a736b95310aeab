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

//! JSONL catalog transfer. Each line is a `model` or `saved_search` object
//! tagged by its `type` field.

use std::io::BufRead;
use std::io::BufReader;
use std::io::Write;
use std::path::Path;

use anyhow::Context;
use anyhow::Result;
use serde::Deserialize;
use serde::Serialize;
use tempfile::NamedTempFile;
use time::OffsetDateTime;

use crate::filters::FilterSet;
use crate::history;
use crate::model::CatalogEntry;
use crate::store::Store;

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum ExportLine<'a> {
    #[serde(rename = "model")]
    Model(&'a CatalogEntry),
    #[serde(rename = "saved_search")]
    SavedSearch {
        name: &'a str,
        query: &'a str,
        filters: &'a FilterSet,
    },
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ImportLine {
    #[serde(rename = "model")]
    Model(CatalogEntry),
    #[serde(rename = "saved_search")]
    SavedSearch {
        name: String,
        query: String,
        #[serde(default)]
        filters: FilterSet,
    },
}

#[derive(Debug, Default, Serialize)]
pub struct TransferStats {
    pub models: usize,
    pub saved_searches: usize,
}

pub fn export_store(store: &Store, mut writer: impl Write) -> Result<TransferStats> {
    let mut stats = TransferStats::default();
    for entry in store.list_entries()? {
        let line = serde_json::to_string(&ExportLine::Model(&entry))?;
        writeln!(writer, "{}", line)?;
        stats.models += 1;
    }
    for saved in history::saved(store)? {
        let line = serde_json::to_string(&ExportLine::SavedSearch {
            name: &saved.name,
            query: &saved.query,
            filters: &saved.filters,
        })?;
        writeln!(writer, "{}", line)?;
        stats.saved_searches += 1;
    }
    writer.flush()?;
    Ok(stats)
}

/// Writes the export next to `path` and renames it into place, so a failed
/// export never leaves a truncated file behind.
pub fn export_to_path(store: &Store, path: &Path) -> Result<TransferStats> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)
        .with_context(|| format!("create temp file in {}", dir.display()))?;
    let stats = export_store(store, &mut tmp)?;
    tmp.persist(path)
        .with_context(|| format!("write {}", path.display()))?;
    Ok(stats)
}

pub fn import_store(
    store: &Store,
    reader: impl std::io::Read,
    now: OffsetDateTime,
) -> Result<TransferStats> {
    let mut stats = TransferStats::default();
    let mut buf = BufReader::new(reader);

    store.conn.execute_batch("BEGIN IMMEDIATE")?;
    let res = (|| -> Result<()> {
        let mut line = String::new();
        let mut line_no = 0usize;
        loop {
            line.clear();
            let bytes = buf.read_line(&mut line)?;
            if bytes == 0 {
                break;
            }
            line_no += 1;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let parsed: ImportLine = serde_json::from_str(trimmed)
                .with_context(|| format!("parse import line {line_no}: {trimmed}"))?;
            match parsed {
                ImportLine::Model(entry) => {
                    store.upsert_model(&entry, now)?;
                    stats.models += 1;
                }
                ImportLine::SavedSearch {
                    name,
                    query,
                    filters,
                } => {
                    history::save(store, &name, &query, &filters, now)?;
                    stats.saved_searches += 1;
                }
            }
        }
        Ok(())
    })();

    if res.is_err() {
        store.conn.execute_batch("ROLLBACK")?;
        return res.map(|_| stats);
    }

    store.conn.execute_batch("COMMIT")?;
    tracing::info!(
        models = stats.models,
        saved_searches = stats.saved_searches,
        "import finished"
    );
    Ok(stats)
}
