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

use std::collections::BTreeSet;

use rusqlite::types::Value as SqlValue;
use tracing::warn;

use crate::error::Result;
use crate::store::Backend;

const MIN_PARTIAL_CHARS: usize = 2;

/// Prefix completions drawn from filenames, titles and keyword lists.
/// Failures are logged and produce an empty list.
pub fn suggest<B: Backend>(backend: &B, partial: &str, limit: usize) -> Vec<String> {
    let partial = partial.trim();
    if partial.chars().count() < MIN_PARTIAL_CHARS || limit == 0 {
        return Vec::new();
    }
    match collect(backend, partial) {
        Ok(found) => rank(found, partial, limit),
        Err(err) => {
            warn!(error = %err, partial, "suggestion lookup failed");
            Vec::new()
        }
    }
}

fn collect<B: Backend>(backend: &B, partial: &str) -> Result<BTreeSet<String>> {
    let escaped = escape_like(partial);
    let prefix = SqlValue::Text(format!("{escaped}%"));
    let anywhere = SqlValue::Text(format!("%{escaped}%"));
    let lowered = partial.to_lowercase();

    let mut found = BTreeSet::new();
    for row in backend.query_rows(
        "SELECT DISTINCT filename FROM models WHERE filename LIKE ? ESCAPE '\\'",
        std::slice::from_ref(&prefix),
    )? {
        if let Some(name) = row.text("filename") {
            found.insert(name);
        }
    }
    for row in backend.query_rows(
        "SELECT DISTINCT title FROM model_metadata WHERE title LIKE ? ESCAPE '\\'",
        std::slice::from_ref(&prefix),
    )? {
        if let Some(title) = row.text("title") {
            found.insert(title);
        }
    }
    for row in backend.query_rows(
        "SELECT DISTINCT keywords FROM model_metadata WHERE keywords LIKE ? ESCAPE '\\'",
        std::slice::from_ref(&anywhere),
    )? {
        let Some(keywords) = row.text("keywords") else {
            continue;
        };
        for keyword in keywords.split(',').map(str::trim) {
            if !keyword.is_empty() && keyword.to_lowercase().starts_with(&lowered) {
                found.insert(keyword.to_string());
            }
        }
    }
    Ok(found)
}

/// Exact-case prefix matches first, then case-insensitive alphabetical.
fn rank(found: BTreeSet<String>, partial: &str, limit: usize) -> Vec<String> {
    let mut out: Vec<String> = found.into_iter().collect();
    out.sort_by_cached_key(|s| (!s.starts_with(partial), s.to_lowercase(), s.clone()));
    out.truncate(limit);
    out
}

fn escape_like(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SearchError;
    use crate::store::Record;
    use crate::store::test_support::seeded_store;

    struct Broken;

    impl Backend for Broken {
        fn query_rows(&self, _sql: &str, _params: &[SqlValue]) -> Result<Vec<Record>> {
            Err(SearchError::Io(std::io::Error::other("offline")))
        }

        fn execute(&self, _sql: &str, _params: &[SqlValue]) -> Result<usize> {
            Ok(0)
        }

        fn execute_batch(&self, _sql: &str) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn short_partials_return_nothing() {
        let store = seeded_store();
        assert!(suggest(&store, "s", 10).is_empty());
        assert!(suggest(&store, " s ", 10).is_empty());
    }

    #[test]
    fn exact_case_prefixes_come_first() {
        let store = seeded_store();
        assert_eq!(
            suggest(&store, "sp", 10),
            vec!["spiral_vase.stl", "spur_gear.stl", "Spiral vase", "Spur gear"]
        );
        assert_eq!(suggest(&store, "sp", 2), vec!["spiral_vase.stl", "spur_gear.stl"]);
    }

    #[test]
    fn keywords_are_split_and_deduplicated() {
        let store = seeded_store();
        assert_eq!(suggest(&store, "ha", 10), vec!["hardware"]);
        assert_eq!(suggest(&store, "la", 10), vec!["Lathe Parts"]);
    }

    #[test]
    fn like_wildcards_are_literal() {
        let store = seeded_store();
        assert!(suggest(&store, "%_", 10).is_empty());
    }

    #[test]
    fn repeated_calls_are_identical() {
        let store = seeded_store();
        assert_eq!(suggest(&store, "co", 10), suggest(&store, "co", 10));
        assert_eq!(suggest(&store, "co", 10), vec!["coat_hook.stl", "Coat hook"]);
    }

    #[test]
    fn storage_failure_yields_empty() {
        assert!(suggest(&Broken, "gear", 10).is_empty());
    }
}
