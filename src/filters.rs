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

//! Structured filters, either typed by the caller or extracted from the
//! query mini-language.

use serde::Deserialize;
use serde::Serialize;

use crate::clock;
use crate::error::Result;
use crate::error::SearchError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    pub fn parse(value: &str) -> Self {
        if value.contains(',') {
            OneOrMany::Many(
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .map(str::to_string)
                    .collect(),
            )
        } else {
            OneOrMany::One(value.trim().to_string())
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            OneOrMany::One(v) => v.is_empty(),
            OneOrMany::Many(vs) => vs.is_empty(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterKind {
    TagsInclude(Vec<String>),
    TagsExclude(Vec<String>),
    InProject(bool),
    LatDays(u32),
    Category(OneOrMany),
    Format(OneOrMany),
    MinRating(i64),
    DateAddedStart(String),
    DateAddedEnd(String),
    LastViewedStart(String),
    LastViewedEnd(String),
    MinFileSize(i64),
    MaxFileSize(i64),
}

impl FilterKind {
    pub fn parse(key: &str, value: &str) -> Result<Self> {
        let value = value.trim();
        let kind = match key.trim().to_ascii_lowercase().as_str() {
            "tags_include" | "tag" => FilterKind::TagsInclude(split_list(value)),
            "tags_exclude" => FilterKind::TagsExclude(split_list(value)),
            "in_project" => FilterKind::InProject(parse_bool(key, value)?),
            "lat_days" => FilterKind::LatDays(parse_num(key, value)?),
            "category" => FilterKind::Category(OneOrMany::parse(value)),
            "format" => FilterKind::Format(OneOrMany::parse(value)),
            "min_rating" => FilterKind::MinRating(parse_num(key, value)?),
            "date_added_start" => FilterKind::DateAddedStart(parse_date(key, value)?),
            "date_added_end" => FilterKind::DateAddedEnd(parse_date(key, value)?),
            "last_viewed_start" => FilterKind::LastViewedStart(parse_date(key, value)?),
            "last_viewed_end" => FilterKind::LastViewedEnd(parse_date(key, value)?),
            "min_file_size" => FilterKind::MinFileSize(parse_num(key, value)?),
            "max_file_size" => FilterKind::MaxFileSize(parse_num(key, value)?),
            other => return Err(SearchError::UnknownFilter(other.to_string())),
        };
        Ok(kind)
    }

    pub fn parse_pair(pair: &str) -> Result<Self> {
        let Some((key, value)) = pair.split_once('=') else {
            return Err(SearchError::InvalidFilterValue {
                key: pair.to_string(),
                value: String::new(),
            });
        };
        Self::parse(key, value)
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Ok(true),
        "false" | "no" | "0" => Ok(false),
        _ => Err(invalid(key, value)),
    }
}

fn parse_num<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value.parse::<T>().map_err(|_| invalid(key, value))
}

// Empty means "no bound" and is dropped on insert.
fn parse_date(key: &str, value: &str) -> Result<String> {
    if value.is_empty() || clock::is_timestamp(value) {
        Ok(value.to_string())
    } else {
        Err(invalid(key, value))
    }
}

fn invalid(key: &str, value: &str) -> SearchError {
    SearchError::InvalidFilterValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}

/// A kind holding an empty collection is treated as absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSet {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags_include: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags_exclude: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_project: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lat_days: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<OneOrMany>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<OneOrMany>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_rating: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_added_start: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_added_end: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_viewed_start: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_viewed_end: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_file_size: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_file_size: Option<i64>,
}

impl FilterSet {
    pub fn from_kinds(kinds: impl IntoIterator<Item = FilterKind>) -> Self {
        let mut set = FilterSet::default();
        for kind in kinds {
            set.insert(kind);
        }
        set
    }

    pub fn from_pairs<S: AsRef<str>>(pairs: &[S]) -> Result<Self> {
        let kinds = pairs
            .iter()
            .map(|p| FilterKind::parse_pair(p.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::from_kinds(kinds))
    }

    pub fn insert(&mut self, kind: FilterKind) {
        match kind {
            FilterKind::TagsInclude(tags) => {
                for tag in tags {
                    push_tag(&mut self.tags_include, tag);
                }
            }
            FilterKind::TagsExclude(tags) => {
                for tag in tags {
                    push_tag(&mut self.tags_exclude, tag);
                }
            }
            FilterKind::InProject(v) => self.in_project = Some(v),
            FilterKind::LatDays(v) => self.lat_days = Some(v),
            FilterKind::Category(v) => self.category = non_empty(v),
            FilterKind::Format(v) => self.format = non_empty(v),
            FilterKind::MinRating(v) => self.min_rating = Some(v),
            FilterKind::DateAddedStart(v) => self.date_added_start = non_blank(v),
            FilterKind::DateAddedEnd(v) => self.date_added_end = non_blank(v),
            FilterKind::LastViewedStart(v) => self.last_viewed_start = non_blank(v),
            FilterKind::LastViewedEnd(v) => self.last_viewed_end = non_blank(v),
            FilterKind::MinFileSize(v) => self.min_file_size = Some(v),
            FilterKind::MaxFileSize(v) => self.max_file_size = Some(v),
        }
    }

    /// Merges mini-language predicates over caller filters. Tag lists are
    /// unioned; scalar kinds present in `parsed` replace the caller's value.
    pub fn merged_with(&self, parsed: &FilterSet) -> FilterSet {
        let mut out = self.clone();
        for tag in &parsed.tags_include {
            push_tag(&mut out.tags_include, tag.clone());
        }
        for tag in &parsed.tags_exclude {
            push_tag(&mut out.tags_exclude, tag.clone());
        }
        if parsed.in_project.is_some() {
            out.in_project = parsed.in_project;
        }
        if parsed.lat_days.is_some() {
            out.lat_days = parsed.lat_days;
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        self.tags_include.is_empty()
            && self.tags_exclude.is_empty()
            && self.in_project.is_none()
            && self.lat_days.is_none()
            && self.category.as_ref().is_none_or(OneOrMany::is_empty)
            && self.format.as_ref().is_none_or(OneOrMany::is_empty)
            && self.min_rating.is_none()
            && self.date_added_start.is_none()
            && self.date_added_end.is_none()
            && self.last_viewed_start.is_none()
            && self.last_viewed_end.is_none()
            && self.min_file_size.is_none()
            && self.max_file_size.is_none()
    }
}

// Case-insensitive dedup.
pub(crate) fn push_tag(tags: &mut Vec<String>, tag: String) {
    let tag = tag.trim().to_string();
    if tag.is_empty() {
        return;
    }
    let lowered = tag.to_lowercase();
    if !tags.iter().any(|t| t.to_lowercase() == lowered) {
        tags.push(tag);
    }
}

fn non_empty(v: OneOrMany) -> Option<OneOrMany> {
    (!v.is_empty()).then_some(v)
}

fn non_blank(v: String) -> Option<String> {
    let v = v.trim().to_string();
    (!v.is_empty()).then_some(v)
}
