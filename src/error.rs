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

//! Error types for the search engine.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unknown filter: {0}")]
    UnknownFilter(String),

    #[error("invalid value for filter {key}: {value}")]
    InvalidFilterValue { key: String, value: String },

    #[error("saved search not found: {0}")]
    SavedSearchNotFound(String),
}

impl SearchError {
    /// Stable short code used in JSON error envelopes.
    pub fn code(&self) -> &'static str {
        match self {
            SearchError::Storage(_) => "storage",
            SearchError::Serialization(_) => "serialization",
            SearchError::Io(_) => "io",
            SearchError::UnknownFilter(_) => "unknown_filter",
            SearchError::InvalidFilterValue { .. } => "invalid_filter",
            SearchError::SavedSearchNotFound(_) => "not_found",
        }
    }

    pub(crate) fn is_fts_syntax(&self) -> bool {
        match self {
            SearchError::Storage(err) => {
                let msg = err.to_string();
                msg.contains("fts5: syntax error") || msg.contains("unterminated string")
            }
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, SearchError>;
