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

use anyhow::Result;
use serde::Serialize;
use serde_json::Value;

use crate::filters::FilterSet;
use crate::model::SearchResultEnvelope;

pub const SCHEMA_VERSION: &str = "1";

#[derive(Debug, Clone, Serialize, Default)]
pub struct StatsOut {
    pub took_ms: u64,
    pub total_count: u64,
    pub returned: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db_size_bytes: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryOut {
    pub text: String,
    pub free_text: String,
    pub filters: FilterSet,
    pub limit: usize,
    pub offset: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saved: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorOut {
    pub code: String,
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct JsonResponse {
    pub ok: bool,
    pub schema_version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<QueryOut>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<StatsOut>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actions: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_offset: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorOut>,
}

impl JsonResponse {
    pub fn ok() -> Self {
        Self {
            ok: true,
            schema_version: SCHEMA_VERSION.to_string(),
            ..Default::default()
        }
    }

    pub fn error(code: &str, message: &str) -> Self {
        Self {
            ok: false,
            schema_version: SCHEMA_VERSION.to_string(),
            error: Some(ErrorOut {
                code: code.to_string(),
                message: message.to_string(),
                hint: None,
            }),
            ..Default::default()
        }
    }

    pub fn with_hint(mut self, hint: &str) -> Self {
        if let Some(error) = &mut self.error {
            error.hint = Some(hint.to_string());
        }
        self
    }

    /// The response for one search: query echo, results, stats, warnings
    /// and the next page offset.
    pub fn from_envelope(envelope: &SearchResultEnvelope, saved: Option<&str>) -> Result<Self> {
        let results = envelope
            .results
            .iter()
            .map(serde_json::to_value)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let mut resp = Self::ok()
            .with_results(results)
            .with_stats(StatsOut {
                took_ms: envelope.execution_time.as_millis() as u64,
                total_count: envelope.total_count,
                returned: envelope.results.len(),
                ..StatsOut::default()
            })
            .with_warnings(envelope.warnings.clone());
        resp.query = Some(QueryOut {
            text: envelope.query.clone(),
            free_text: envelope.free_text.clone(),
            filters: envelope.filters.clone(),
            limit: envelope.limit,
            offset: envelope.offset,
            saved: saved.map(str::to_string),
        });
        resp.next_offset = envelope.next_offset();
        Ok(resp)
    }

    pub fn with_results(mut self, results: Vec<Value>) -> Self {
        self.results = Some(results);
        self
    }

    pub fn with_stats(mut self, stats: StatsOut) -> Self {
        self.stats = Some(stats);
        self
    }

    pub fn with_diagnostics(mut self, diagnostics: Value) -> Self {
        self.diagnostics = Some(diagnostics);
        self
    }

    pub fn with_actions(mut self, actions: Vec<String>) -> Self {
        if actions.is_empty() {
            return self;
        }
        self.actions = Some(actions);
        self
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings = warnings;
        self
    }
}

pub fn print_json(resp: &JsonResponse) -> Result<()> {
    let text = serde_json::to_string_pretty(resp)?;
    println!("{text}");
    Ok(())
}

pub fn print_table(envelope: &SearchResultEnvelope) {
    println!("{:>6} {:>8}  {:<32} title", "id", "rank", "file");
    for item in &envelope.results {
        let title = item
            .highlights
            .get("title")
            .or(item.title.as_ref())
            .map(String::as_str)
            .unwrap_or("-");
        println!(
            "{:>6} {:>8.3}  {:<32} {}",
            item.id, item.rank, item.file_path, title
        );
    }
    for warning in &envelope.warnings {
        eprintln!("warning: {warning}");
    }
    let shown = envelope.results.len();
    println!(
        "{} of {} result(s), offset {}, {} ms",
        shown,
        envelope.total_count,
        envelope.offset,
        envelope.execution_time.as_millis()
    );
}
