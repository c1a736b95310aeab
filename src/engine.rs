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

//! The search engine handle.
//!
//! One engine owns one storage backend and the configuration it searches
//! with. The composition root builds it and passes it where it is needed;
//! there is no process-wide instance.

use std::time::Instant;

use time::OffsetDateTime;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::clock::Clock;
use crate::config::Config;
use crate::error::Result;
use crate::filters::FilterSet;
use crate::highlight::Highlighter;
use crate::history;
use crate::minilang;
use crate::model::HistoryRecord;
use crate::model::SavedSearch;
use crate::model::SearchResultEnvelope;
use crate::query;
use crate::store::Backend;
use crate::suggest;

pub struct SearchEngine<B> {
    backend: B,
    config: Config,
    clock: Clock,
}

impl<B: Backend> SearchEngine<B> {
    pub fn new(backend: B, config: Config) -> Self {
        Self {
            backend,
            config,
            clock: Clock::System,
        }
    }

    /// Pins "now" for recency predicates and record timestamps.
    pub fn with_fixed_time(mut self, now: OffsetDateTime) -> Self {
        self.clock = Clock::Fixed(now);
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Parses `query`, merges its predicates over `filters` and runs one
    /// ranked page. With no free text and no filters nothing is executed
    /// and nothing is recorded.
    pub fn search(
        &self,
        query: &str,
        filters: Option<&FilterSet>,
        limit: Option<usize>,
        offset: usize,
    ) -> Result<SearchResultEnvelope> {
        let started = Instant::now();
        let limit = self.config.clamp_limit(limit);
        let caller = filters.cloned().unwrap_or_default();
        let parsed = minilang::parse(query);
        let merged = caller.merged_with(&parsed.predicates);

        if parsed.free_text.is_empty() && merged.is_empty() {
            debug!(query, "no search intent; skipping storage");
            return Ok(SearchResultEnvelope::empty(query, merged, limit, offset));
        }

        let now = self.clock.now();
        let page = query::execute(&self.backend, &parsed, &caller, limit, offset, now)?;
        let highlighter = Highlighter::new(
            &parsed.free_text,
            &self.config.highlight_open,
            &self.config.highlight_close,
        );
        let results = page
            .items
            .into_iter()
            .map(|mut item| {
                item.highlights = highlighter.highlights(&item);
                item
            })
            .collect();

        let envelope = SearchResultEnvelope {
            results,
            total_count: page.total_count,
            query: query.to_string(),
            free_text: parsed.free_text,
            filters: merged,
            execution_time: started.elapsed(),
            limit,
            offset,
            warnings: page.warnings,
        };
        debug!(
            query,
            total = envelope.total_count,
            returned = envelope.results.len(),
            took_ms = envelope.execution_time.as_millis() as u64,
            "search finished"
        );

        if self.config.record_history
            && let Err(err) =
                history::record_search(&self.backend, query, &caller, envelope.total_count, now)
        {
            warn!(error = %err, query, "failed to record search history");
        }
        Ok(envelope)
    }

    /// Runs the saved search called `name` with its stored filters.
    pub fn run_saved(
        &self,
        name: &str,
        limit: Option<usize>,
        offset: usize,
    ) -> Result<SearchResultEnvelope> {
        let saved = history::saved_by_name(&self.backend, name)?;
        self.search(&saved.query, Some(&saved.filters), limit, offset)
    }

    pub fn get_search_suggestions(&self, partial: &str, limit: Option<usize>) -> Vec<String> {
        let limit = limit.unwrap_or(self.config.suggestion_limit);
        suggest::suggest(&self.backend, partial, limit)
    }

    pub fn save_search(&self, name: &str, query: &str, filters: &FilterSet) -> Result<i64> {
        let id = history::save(&self.backend, name, query, filters, self.clock.now())?;
        info!(name, id, "saved search");
        Ok(id)
    }

    pub fn get_saved_searches(&self) -> Result<Vec<SavedSearch>> {
        history::saved(&self.backend)
    }

    pub fn delete_saved_search(&self, id: i64) -> Result<bool> {
        history::delete_saved(&self.backend, id)
    }

    pub fn get_search_history(&self, limit: Option<usize>) -> Result<Vec<HistoryRecord>> {
        let limit = limit.unwrap_or(self.config.history_limit);
        history::recent(&self.backend, limit)
    }

    pub fn clear_search_history(&self, older_than_days: u32) -> Result<usize> {
        let removed = history::clear(&self.backend, older_than_days, self.clock.now())?;
        info!(removed, older_than_days, "cleared search history");
        Ok(removed)
    }

    /// Repopulates both text indexes from their source tables.
    pub fn rebuild_text_indexes(&self) -> Result<()> {
        self.backend.execute_batch(
            "INSERT INTO models_fts(models_fts) VALUES('rebuild');
             INSERT INTO metadata_fts(metadata_fts) VALUES('rebuild');",
        )?;
        info!("rebuilt text indexes");
        Ok(())
    }
}
