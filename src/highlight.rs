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

//! Marks free-text terms inside result fields.
//!
//! Terms are the words of the free text, lowercased and deduplicated.
//! Connectors, quotes and grouping characters are not terms. A trailing
//! `*` makes a prefix term, which may end mid-word.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use crate::minilang::is_connector;
use crate::model::SearchResultItem;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Term {
    chars: Vec<char>,
    prefix: bool,
}

#[derive(Debug, Clone)]
pub struct Highlighter {
    terms: Vec<Term>,
    open: String,
    close: String,
}

impl Highlighter {
    pub fn new(free_text: &str, open: &str, close: &str) -> Self {
        Self {
            terms: derive_terms(free_text),
            open: open.to_string(),
            close: close.to_string(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Highlights for every present, non-empty field of `item`. Empty when
    /// there are no terms.
    pub fn highlights(&self, item: &SearchResultItem) -> BTreeMap<String, String> {
        let mut out = BTreeMap::new();
        if self.is_empty() {
            return out;
        }
        let fields = [
            ("title", item.title.as_deref()),
            ("description", item.description.as_deref()),
            ("keywords", item.keywords.as_deref()),
            ("filename", Some(item.filename.as_str())),
        ];
        for (name, value) in fields {
            if let Some(value) = value
                && !value.is_empty()
            {
                out.insert(name.to_string(), self.mark(value));
            }
        }
        out
    }

    pub fn mark(&self, text: &str) -> String {
        let chars: Vec<char> = text.chars().collect();
        let mut out = String::with_capacity(text.len());
        let mut idx = 0;
        while idx < chars.len() {
            let at_boundary = idx == 0 || !is_word_char(chars[idx - 1]);
            let matched = if at_boundary {
                self.terms.iter().find_map(|term| match_len(&chars, idx, term))
            } else {
                None
            };
            match matched {
                Some(len) => {
                    out.push_str(&self.open);
                    out.extend(&chars[idx..idx + len]);
                    out.push_str(&self.close);
                    idx += len;
                }
                None => {
                    out.push(chars[idx]);
                    idx += 1;
                }
            }
        }
        out
    }
}

fn is_word_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_'
}

fn chars_eq_ignore_case(a: char, b: char) -> bool {
    a == b || a.to_lowercase().eq(b.to_lowercase())
}

fn match_len(chars: &[char], start: usize, term: &Term) -> Option<usize> {
    let end = start + term.chars.len();
    if end > chars.len() {
        return None;
    }
    let same = chars[start..end]
        .iter()
        .zip(&term.chars)
        .all(|(a, b)| chars_eq_ignore_case(*a, *b));
    if !same {
        return None;
    }
    if term.prefix {
        let mut stop = end;
        while stop < chars.len() && is_word_char(chars[stop]) {
            stop += 1;
        }
        return Some(stop - start);
    }
    let at_boundary = chars.get(end).is_none_or(|c| !is_word_char(*c));
    at_boundary.then_some(term.chars.len())
}

/// Longest terms first so `gearbox` wins over `gear` at the same offset.
fn derive_terms(free_text: &str) -> Vec<Term> {
    let mut seen = BTreeSet::new();
    for token in free_text.split_whitespace() {
        if is_connector(token) {
            continue;
        }
        let mut word = String::new();
        let mut chars = token.chars().peekable();
        while let Some(ch) = chars.next() {
            if is_word_char(ch) {
                word.push(ch);
                continue;
            }
            let prefix = ch == '*' && chars.peek().is_none_or(|c| !is_word_char(*c));
            push_term(&mut seen, &mut word, prefix);
        }
        push_term(&mut seen, &mut word, false);
    }
    let mut terms: Vec<Term> = seen
        .into_iter()
        .map(|(text, prefix)| Term {
            chars: text.chars().collect(),
            prefix,
        })
        .collect();
    terms.sort_by(|a, b| {
        b.chars
            .len()
            .cmp(&a.chars.len())
            .then_with(|| a.prefix.cmp(&b.prefix))
            .then_with(|| a.chars.cmp(&b.chars))
    });
    terms
}

fn push_term(seen: &mut BTreeSet<(String, bool)>, word: &mut String, prefix: bool) {
    if word.is_empty() {
        return;
    }
    let text = std::mem::take(word).to_lowercase();
    if !is_connector(&text) {
        seen.insert((text, prefix));
    }
}
