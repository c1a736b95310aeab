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

//! Compiles free text into an FTS5 MATCH expression.

use crate::minilang::Connector;

/// A compiled FTS5 query. Empty means "no text clause".
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TextQuery(String);

impl TextQuery {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Piece {
    Term(String),
    Phrase(String),
    Op(Connector),
    Open,
    Close,
}

impl Piece {
    fn render(&self) -> String {
        match self {
            Piece::Term(t) => render_term(t),
            Piece::Phrase(p) => p.clone(),
            Piece::Op(c) => c.as_str().to_string(),
            Piece::Open => "(".to_string(),
            Piece::Close => ")".to_string(),
        }
    }
}

pub fn compile(free_text: &str) -> TextQuery {
    let pieces = split_pieces(free_text);
    if pieces.is_empty() {
        return TextQuery::default();
    }

    let explicit = pieces.iter().any(|p| matches!(p, Piece::Op(_)));
    let mut out: Vec<String> = Vec::with_capacity(pieces.len() * 2);
    let mut prev: Option<&Piece> = None;
    for piece in &pieces {
        if !explicit
            && let Some(before) = prev
            && !matches!(before, Piece::Open)
            && !matches!(piece, Piece::Close)
        {
            out.push(Connector::And.as_str().to_string());
        }
        out.push(piece.render());
        prev = Some(piece);
    }
    TextQuery(out.join(" "))
}

/// Degraded form used when FTS5 rejects a compiled query: punctuation and
/// connectors are dropped and every remaining word becomes a quoted term.
pub fn fallback(free_text: &str) -> TextQuery {
    let cleaned = sanitize(free_text);
    let words: Vec<String> = cleaned
        .split_whitespace()
        .filter(|w| Connector::parse(w).is_none())
        .map(|w| format!("\"{w}\""))
        .collect();
    TextQuery(words.join(" AND "))
}

fn sanitize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last_space = true;
    for ch in text.chars() {
        if ch.is_alphanumeric() || ch == '_' {
            out.push(ch);
            last_space = false;
        } else if !last_space {
            out.push(' ');
            last_space = true;
        }
    }
    out.trim().to_string()
}

fn split_pieces(input: &str) -> Vec<Piece> {
    let mut pieces = Vec::new();
    let mut chars = input.chars();
    let mut buf = String::new();

    let flush = |buf: &mut String, pieces: &mut Vec<Piece>| {
        if buf.is_empty() {
            return;
        }
        let word = std::mem::take(buf);
        match Connector::parse(&word) {
            Some(op) => pieces.push(Piece::Op(op)),
            None => pieces.push(Piece::Term(word)),
        }
    };

    while let Some(ch) = chars.next() {
        match ch {
            '"' => {
                flush(&mut buf, &mut pieces);
                let mut phrase = String::from('"');
                let mut closed = false;
                for c in chars.by_ref() {
                    phrase.push(c);
                    if c == '"' {
                        closed = true;
                        break;
                    }
                }
                if !closed {
                    phrase.push('"');
                }
                if phrase.len() > 2 {
                    pieces.push(Piece::Phrase(phrase));
                }
            }
            '(' => {
                flush(&mut buf, &mut pieces);
                pieces.push(Piece::Open);
            }
            ')' => {
                flush(&mut buf, &mut pieces);
                pieces.push(Piece::Close);
            }
            c if c.is_whitespace() => flush(&mut buf, &mut pieces),
            c => buf.push(c),
        }
    }
    flush(&mut buf, &mut pieces);
    pieces
}

fn is_bareword(term: &str) -> bool {
    let body = term.strip_suffix('*').unwrap_or(term);
    !body.is_empty()
        && body
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || !c.is_ascii())
}

fn render_term(term: &str) -> String {
    if is_bareword(term) {
        term.to_string()
    } else {
        format!("\"{}\"", term.replace('"', "\"\""))
    }
}
