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

//! The query mini-language: `tag=`, `tag!=`, `inProject`, `!inProject` and
//! `LAT>=N` predicates mixed with free text and boolean connectors.
//!
//! Parsing never fails. Anything that does not look like a predicate is
//! kept as free text.

use std::collections::BTreeSet;

use crate::filters::FilterSet;
use crate::filters::push_tag;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParsedQuery {
    pub free_text: String,
    pub predicates: FilterSet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connector {
    And,
    Or,
    Not,
}

impl Connector {
    pub fn parse(token: &str) -> Option<Self> {
        if token.eq_ignore_ascii_case("and") {
            Some(Connector::And)
        } else if token.eq_ignore_ascii_case("or") {
            Some(Connector::Or)
        } else if token.eq_ignore_ascii_case("not") {
            Some(Connector::Not)
        } else {
            None
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Connector::And => "AND",
            Connector::Or => "OR",
            Connector::Not => "NOT",
        }
    }
}

pub fn is_connector(token: &str) -> bool {
    Connector::parse(token).is_some()
}

#[derive(Debug, Clone, PartialEq)]
enum Predicate {
    InProject(bool),
    LatDays(u32),
    TagExclude(Option<String>),
    TagInclude(Option<String>),
}

/// Splits on whitespace, keeping double-quoted runs (quotes included) inside
/// a single token. A quote left open at the end is treated as plain text, so
/// predicates after it are still recognized.
pub fn tokenize(input: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut buf = String::new();
    let mut in_quote = false;
    for ch in input.chars() {
        if ch == '"' {
            in_quote = !in_quote;
            buf.push(ch);
            continue;
        }
        if ch.is_whitespace() && !in_quote {
            if !buf.is_empty() {
                tokens.push(std::mem::take(&mut buf));
            }
            continue;
        }
        buf.push(ch);
    }
    if in_quote {
        tokens.extend(buf.split_whitespace().map(str::to_string));
    } else if !buf.is_empty() {
        tokens.push(buf);
    }
    tokens
}

pub fn parse(raw: &str) -> ParsedQuery {
    let tokens = tokenize(raw);
    let mut predicates = FilterSet::default();
    let mut consumed = BTreeSet::new();

    for (idx, token) in tokens.iter().enumerate() {
        let Some(pred) = classify(token) else {
            continue;
        };
        consumed.insert(idx);
        match pred {
            Predicate::InProject(v) => predicates.in_project = Some(v),
            Predicate::LatDays(days) => predicates.lat_days = Some(days),
            Predicate::TagExclude(Some(tag)) => push_tag(&mut predicates.tags_exclude, tag),
            Predicate::TagInclude(Some(tag)) => push_tag(&mut predicates.tags_include, tag),
            Predicate::TagExclude(None) | Predicate::TagInclude(None) => {}
        }
    }

    let free_text = rebuild_free_text(&tokens, &consumed);
    ParsedQuery {
        free_text,
        predicates,
    }
}

fn classify(token: &str) -> Option<Predicate> {
    if token.eq_ignore_ascii_case("inproject") {
        return Some(Predicate::InProject(true));
    }
    if token.eq_ignore_ascii_case("!inproject") {
        return Some(Predicate::InProject(false));
    }
    if let Some(rest) = strip_prefix_ignore_case(token, "lat>=")
        && !rest.is_empty()
        && rest.bytes().all(|b| b.is_ascii_digit())
        && let Ok(days) = rest.parse::<u32>()
    {
        return Some(Predicate::LatDays(days));
    }
    // `tag!=` first so it is never read as `tag=` with a `!`-prefixed value.
    if let Some(rest) = strip_prefix_ignore_case(token, "tag!=") {
        return Some(Predicate::TagExclude(tag_value(rest)));
    }
    if let Some(rest) = strip_prefix_ignore_case(token, "tag=") {
        return Some(Predicate::TagInclude(tag_value(rest)));
    }
    None
}

fn strip_prefix_ignore_case<'a>(token: &'a str, prefix: &str) -> Option<&'a str> {
    let head = token.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        token.get(prefix.len()..)
    } else {
        None
    }
}

fn tag_value(raw: &str) -> Option<String> {
    let value = raw.trim().trim_matches(|c| c == '"' || c == '\'').trim();
    (!value.is_empty()).then(|| value.to_string())
}

fn rebuild_free_text(tokens: &[String], consumed: &BTreeSet<usize>) -> String {
    let plain_at = |idx: usize| -> bool {
        tokens
            .get(idx)
            .is_some_and(|t| !consumed.contains(&idx) && !is_connector(t))
    };

    let mut kept: Vec<&str> = Vec::new();
    for (idx, token) in tokens.iter().enumerate() {
        if consumed.contains(&idx) {
            continue;
        }
        if is_connector(token) {
            let has_left = idx > 0 && plain_at(idx - 1);
            let has_right = plain_at(idx + 1);
            if !(has_left && has_right) {
                continue;
            }
        }
        kept.push(token);
    }

    if kept.iter().all(|t| is_connector(t)) {
        return String::new();
    }
    kept.join(" ")
}
