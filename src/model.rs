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

//! Shared domain types used across storage, search and output.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;
use serde::Serializer;

use crate::filters::FilterSet;
use crate::store::Record;

/// One model as it travels through import and export.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub filename: String,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(rename = "path")]
    pub file_path: String,
    #[serde(rename = "size", default)]
    pub file_size: Option<i64>,
    #[serde(default)]
    pub date_added: Option<String>,
    #[serde(default)]
    pub last_viewed: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub keywords: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub rating: Option<i64>,
    #[serde(default)]
    pub projects: Vec<String>,
}

impl CatalogEntry {
    pub fn has_metadata(&self) -> bool {
        self.title.is_some()
            || self.description.is_some()
            || self.keywords.is_some()
            || self.category.is_some()
            || self.source.is_some()
            || self.rating.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResultItem {
    pub id: i64,
    pub filename: String,
    pub format: Option<String>,
    pub file_path: String,
    pub file_size: Option<i64>,
    pub date_added: Option<String>,
    pub last_viewed: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub keywords: Option<String>,
    pub category: Option<String>,
    pub source: Option<String>,
    pub rating: Option<i64>,
    pub rank: f64,
    pub highlights: BTreeMap<String, String>,
}

impl SearchResultItem {
    pub fn from_record(record: &Record) -> Self {
        Self {
            id: record.int("id").unwrap_or_default(),
            filename: record.text("filename").unwrap_or_default(),
            format: record.text("format"),
            file_path: record.text("file_path").unwrap_or_default(),
            file_size: record.int("file_size"),
            date_added: record.text("date_added"),
            last_viewed: record.text("last_viewed"),
            title: record.text("title"),
            description: record.text("description"),
            keywords: record.text("keywords"),
            category: record.text("category"),
            source: record.text("source"),
            rating: record.int("rating"),
            rank: record.real("rank").unwrap_or(0.0),
            highlights: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResultEnvelope {
    pub results: Vec<SearchResultItem>,
    pub total_count: u64,
    pub query: String,
    pub free_text: String,
    pub filters: FilterSet,
    #[serde(rename = "execution_time_ms", serialize_with = "as_millis")]
    pub execution_time: Duration,
    pub limit: usize,
    pub offset: usize,
    pub warnings: Vec<String>,
}

impl SearchResultEnvelope {
    pub fn empty(query: &str, filters: FilterSet, limit: usize, offset: usize) -> Self {
        Self {
            results: Vec::new(),
            total_count: 0,
            query: query.to_string(),
            free_text: String::new(),
            filters,
            execution_time: Duration::ZERO,
            limit,
            offset,
            warnings: Vec::new(),
        }
    }

    /// Offset of the next page, if any results remain past this one.
    pub fn next_offset(&self) -> Option<usize> {
        let next = self.offset + self.results.len();
        (!self.results.is_empty() && (next as u64) < self.total_count).then_some(next)
    }
}

fn as_millis<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(value.as_millis() as u64)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryRecord {
    pub id: i64,
    pub query: String,
    pub filters: FilterSet,
    pub result_count: u64,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SavedSearch {
    pub id: i64,
    pub name: String,
    pub query: String,
    pub filters: FilterSet,
    pub created_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_offset_only_when_more_remain() {
        let mut envelope = SearchResultEnvelope::empty("gear", FilterSet::default(), 2, 0);
        assert_eq!(envelope.next_offset(), None);

        let item = SearchResultItem {
            id: 1,
            filename: "gear.stl".into(),
            format: None,
            file_path: "/gear.stl".into(),
            file_size: None,
            date_added: None,
            last_viewed: None,
            title: None,
            description: None,
            keywords: None,
            category: None,
            source: None,
            rating: None,
            rank: 0.0,
            highlights: BTreeMap::new(),
        };
        envelope.results = vec![item.clone(), item];
        envelope.total_count = 3;
        assert_eq!(envelope.next_offset(), Some(2));
        envelope.offset = 1;
        assert_eq!(envelope.next_offset(), None);
    }

    #[test]
    fn catalog_entry_uses_short_wire_names() {
        let entry: CatalogEntry =
            serde_json::from_str(r#"{"filename":"a.stl","path":"/a.stl","size":5}"#).unwrap();
        assert_eq!(entry.file_size, Some(5));
        assert!(!entry.has_metadata());
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["path"], "/a.stl");
    }
}
