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

//! Search history and saved searches. Filters are stored as JSON text.

use rusqlite::types::Value as SqlValue;
use time::OffsetDateTime;

use crate::clock::days_before;
use crate::clock::format_timestamp;
use crate::error::Result;
use crate::error::SearchError;
use crate::filters::FilterSet;
use crate::model::HistoryRecord;
use crate::model::SavedSearch;
use crate::store::Backend;
use crate::store::Record;

pub fn record_search<B: Backend>(
    backend: &B,
    query: &str,
    filters: &FilterSet,
    result_count: u64,
    now: OffsetDateTime,
) -> Result<()> {
    backend.execute(
        "INSERT INTO search_history (query, filters, result_count, created_at) VALUES (?, ?, ?, ?)",
        &[
            SqlValue::Text(query.to_string()),
            SqlValue::Text(serde_json::to_string(filters)?),
            SqlValue::Integer(result_count as i64),
            SqlValue::Text(format_timestamp(now)),
        ],
    )?;
    Ok(())
}

/// Newest first.
pub fn recent<B: Backend>(backend: &B, limit: usize) -> Result<Vec<HistoryRecord>> {
    backend
        .query_rows(
            "SELECT id, query, filters, result_count, created_at FROM search_history
             ORDER BY created_at DESC, id DESC LIMIT ?",
            &[SqlValue::Integer(limit as i64)],
        )?
        .iter()
        .map(|row| {
            Ok(HistoryRecord {
                id: row.int("id").unwrap_or_default(),
                query: row.text("query").unwrap_or_default(),
                filters: filters_of(row)?,
                result_count: row.int("result_count").unwrap_or_default().max(0) as u64,
                created_at: row.text("created_at").unwrap_or_default(),
            })
        })
        .collect()
}

/// Deletes entries created more than `older_than_days` days before `now`.
pub fn clear<B: Backend>(backend: &B, older_than_days: u32, now: OffsetDateTime) -> Result<usize> {
    let cutoff = format_timestamp(days_before(now, older_than_days));
    backend.execute(
        "DELETE FROM search_history WHERE julianday(created_at) < julianday(?)",
        &[SqlValue::Text(cutoff)],
    )
}

/// Inserts or replaces the saved search called `name`; returns its id.
pub fn save<B: Backend>(
    backend: &B,
    name: &str,
    query: &str,
    filters: &FilterSet,
    now: OffsetDateTime,
) -> Result<i64> {
    backend.execute(
        "INSERT INTO saved_searches (name, query, filters, created_at) VALUES (?, ?, ?, ?)
         ON CONFLICT(name) DO UPDATE SET
           query = excluded.query,
           filters = excluded.filters,
           created_at = excluded.created_at",
        &[
            SqlValue::Text(name.to_string()),
            SqlValue::Text(query.to_string()),
            SqlValue::Text(serde_json::to_string(filters)?),
            SqlValue::Text(format_timestamp(now)),
        ],
    )?;
    backend
        .query_rows(
            "SELECT id FROM saved_searches WHERE name = ?",
            &[SqlValue::Text(name.to_string())],
        )?
        .first()
        .and_then(|row| row.int("id"))
        .ok_or_else(|| SearchError::SavedSearchNotFound(name.to_string()))
}

/// Ordered by name.
pub fn saved<B: Backend>(backend: &B) -> Result<Vec<SavedSearch>> {
    backend
        .query_rows(
            "SELECT id, name, query, filters, created_at FROM saved_searches ORDER BY name ASC, id ASC",
            &[],
        )?
        .iter()
        .map(saved_from_row)
        .collect()
}

pub fn saved_by_name<B: Backend>(backend: &B, name: &str) -> Result<SavedSearch> {
    let rows = backend.query_rows(
        "SELECT id, name, query, filters, created_at FROM saved_searches WHERE name = ?",
        &[SqlValue::Text(name.to_string())],
    )?;
    match rows.first() {
        Some(row) => saved_from_row(row),
        None => Err(SearchError::SavedSearchNotFound(name.to_string())),
    }
}

/// `false` when no saved search has that id.
pub fn delete_saved<B: Backend>(backend: &B, id: i64) -> Result<bool> {
    let removed = backend.execute(
        "DELETE FROM saved_searches WHERE id = ?",
        &[SqlValue::Integer(id)],
    )?;
    Ok(removed > 0)
}

fn saved_from_row(row: &Record) -> Result<SavedSearch> {
    Ok(SavedSearch {
        id: row.int("id").unwrap_or_default(),
        name: row.text("name").unwrap_or_default(),
        query: row.text("query").unwrap_or_default(),
        filters: filters_of(row)?,
        created_at: row.text("created_at").unwrap_or_default(),
    })
}

fn filters_of(row: &Record) -> Result<FilterSet> {
    match row.text("filters") {
        Some(json) if !json.trim().is_empty() => Ok(serde_json::from_str(&json)?),
        _ => Ok(FilterSet::default()),
    }
}

#[cfg(test)]
mod tests {
    use time::Duration;

    use super::*;
    use crate::filters::FilterKind;
    use crate::store::Store;
    use crate::store::test_support::fixed_now;

    #[test]
    fn history_is_newest_first_and_bounded() {
        let store = Store::open_in_memory().unwrap();
        let filters = FilterSet::from_kinds([FilterKind::InProject(true)]);
        record_search(&store, "gear", &filters, 3, fixed_now()).unwrap();
        record_search(&store, "bolt", &FilterSet::default(), 0, fixed_now()).unwrap();
        record_search(&store, "vase", &FilterSet::default(), 1, fixed_now() + Duration::hours(1))
            .unwrap();

        let records = recent(&store, 2).unwrap();
        assert_eq!(
            records.iter().map(|r| r.query.as_str()).collect::<Vec<_>>(),
            vec!["vase", "bolt"]
        );
        let all = recent(&store, 10).unwrap();
        assert_eq!(all[2].filters, filters);
        assert_eq!(all[2].result_count, 3);
    }

    #[test]
    fn clear_removes_only_old_entries() {
        let store = Store::open_in_memory().unwrap();
        record_search(&store, "old", &FilterSet::default(), 0, fixed_now() - Duration::days(40))
            .unwrap();
        record_search(&store, "new", &FilterSet::default(), 0, fixed_now() - Duration::days(2))
            .unwrap();
        assert_eq!(clear(&store, 30, fixed_now()).unwrap(), 1);
        assert_eq!(clear(&store, 30, fixed_now()).unwrap(), 0);
        assert_eq!(recent(&store, 10).unwrap()[0].query, "new");
        assert_eq!(clear(&store, 0, fixed_now()).unwrap(), 1);
    }

    #[test]
    fn save_overwrites_by_name() {
        let store = Store::open_in_memory().unwrap();
        let id = save(&store, "stale", "LAT>=30", &FilterSet::default(), fixed_now()).unwrap();
        let filters = FilterSet::from_kinds([FilterKind::MinRating(4)]);
        let again = save(&store, "stale", "LAT>=60", &filters, fixed_now()).unwrap();
        assert_eq!(id, again);

        let all = saved(&store).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].query, "LAT>=60");
        assert_eq!(all[0].filters, filters);
        assert_eq!(saved_by_name(&store, "stale").unwrap().id, id);
        assert!(matches!(
            saved_by_name(&store, "fresh"),
            Err(SearchError::SavedSearchNotFound(_))
        ));
    }

    #[test]
    fn delete_is_idempotent() {
        let store = Store::open_in_memory().unwrap();
        let id = save(&store, "gears", "gear", &FilterSet::default(), fixed_now()).unwrap();
        assert!(delete_saved(&store, id).unwrap());
        assert!(!delete_saved(&store, id).unwrap());
        assert!(!delete_saved(&store, 999).unwrap());
    }
}
