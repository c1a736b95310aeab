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

//! Search compilation: joins the model table, its metadata and both text
//! indexes into one ranked, filtered, paged query plus a matching count.

use rusqlite::types::Value as SqlValue;
use time::OffsetDateTime;
use tracing::debug;

use crate::error::Result;
use crate::filters::FilterSet;
use crate::fts;
use crate::fts::TextQuery;
use crate::minilang::ParsedQuery;
use crate::model::SearchResultItem;
use crate::predicate;
use crate::sql::SqlColumn;
use crate::sql::SqlExpr;
use crate::sql::SqlFragment;
use crate::sql::SqlJoin;
use crate::sql::SqlOrderBy;
use crate::sql::SqlSelectBuilder;
use crate::sql::SqlSelectItem;
use crate::sql::SqlTable;
use crate::store::Backend;

const PROJECTED: [SqlColumn; 13] = [
    SqlColumn::ModelId,
    SqlColumn::ModelFilename,
    SqlColumn::ModelFormat,
    SqlColumn::ModelFilePath,
    SqlColumn::ModelFileSize,
    SqlColumn::ModelDateAdded,
    SqlColumn::ModelLastViewed,
    SqlColumn::MetaTitle,
    SqlColumn::MetaDescription,
    SqlColumn::MetaKeywords,
    SqlColumn::MetaCategory,
    SqlColumn::MetaSource,
    SqlColumn::MetaRating,
];

const COMBINED_RANK: &str = "COALESCE(model_hits.score, 0.0) + COALESCE(metadata_hits.score, 0.0)";
const NEUTRAL_RANK: &str = "0.0";
const ANY_TEXT_HIT: &str = "model_hits.rowid IS NOT NULL OR metadata_hits.rowid IS NOT NULL";

#[derive(Debug, Clone, PartialEq)]
pub struct CompiledSearch {
    pub count: SqlFragment,
    pub page: SqlFragment,
}

/// Compiles a parsed query merged with caller filters.
pub fn build(
    parsed: &ParsedQuery,
    extra_filters: &FilterSet,
    limit: usize,
    offset: usize,
    now: OffsetDateTime,
) -> CompiledSearch {
    let filters = extra_filters.merged_with(&parsed.predicates);
    let text = fts::compile(&parsed.free_text);
    build_with(&text, &filters, limit, offset, now)
}

/// Compiles an already-compiled text query and a merged filter set. An
/// empty text query drops the index joins and ranks every row neutrally.
pub fn build_with(
    text: &TextQuery,
    filters: &FilterSet,
    limit: usize,
    offset: usize,
    now: OffsetDateTime,
) -> CompiledSearch {
    let mut items: Vec<SqlSelectItem> = PROJECTED
        .iter()
        .map(|column| SqlSelectItem::new(SqlExpr::column(*column)).alias(column.name()))
        .collect();

    let mut builder = SqlSelectBuilder::new(SqlTable::Models).join(SqlJoin::left(
        SqlTable::ModelMetadata,
        SqlColumn::MetaModelId,
        SqlColumn::ModelId,
    ));

    let mut clauses = Vec::new();
    if text.is_empty() {
        items.push(SqlSelectItem::new(SqlExpr::raw(NEUTRAL_RANK)).alias("rank"));
    } else {
        items.push(SqlSelectItem::new(SqlExpr::raw(COMBINED_RANK)).alias("rank"));
        builder = builder
            .join(SqlJoin::left_subquery(
                index_hits("models_fts", text),
                "model_hits",
                SqlColumn::ModelHitsRowid,
                SqlColumn::ModelId,
            ))
            .join(SqlJoin::left_subquery(
                index_hits("metadata_fts", text),
                "metadata_hits",
                SqlColumn::MetadataHitsRowid,
                SqlColumn::ModelId,
            ));
        clauses.push(SqlFragment::raw(ANY_TEXT_HIT));
    }
    clauses.extend(predicate::compile(filters, now));

    builder = builder.select(items);
    if let Some(clause) = SqlFragment::all(clauses) {
        builder = builder.where_clause(clause);
    }
    builder = builder
        .order_by(SqlOrderBy::desc(SqlExpr::alias("rank")))
        .order_by(SqlOrderBy::desc(SqlExpr::column(SqlColumn::ModelLastViewed)))
        .order_by(SqlOrderBy::asc(SqlExpr::column(SqlColumn::ModelId)))
        .limit(limit)
        .offset(offset);

    CompiledSearch {
        count: builder.build_count(),
        page: builder.build(),
    }
}

fn index_hits(index: &str, text: &TextQuery) -> SqlFragment {
    SqlFragment::raw_with_params(
        format!("SELECT rowid, -bm25({index}) AS score FROM {index} WHERE {index} MATCH ?"),
        vec![SqlValue::Text(text.as_str().to_string())],
    )
}

#[derive(Debug, Clone, Default)]
pub struct SearchPage {
    pub total_count: u64,
    pub items: Vec<SearchResultItem>,
    pub warnings: Vec<String>,
}

fn run<B: Backend>(backend: &B, compiled: &CompiledSearch) -> Result<SearchPage> {
    debug!(sql = %compiled.page.sql, params = compiled.page.params.len(), "compiled search");
    let total_count = backend
        .query_rows(&compiled.count.sql, &compiled.count.params)?
        .first()
        .and_then(|row| row.int("total"))
        .unwrap_or(0)
        .max(0) as u64;
    let items = backend
        .query_rows(&compiled.page.sql, &compiled.page.params)?
        .iter()
        .map(SearchResultItem::from_record)
        .collect();
    Ok(SearchPage {
        total_count,
        items,
        warnings: Vec::new(),
    })
}

/// Runs a parsed search merged with caller filters. A text query the
/// index rejects is retried once in its quoted-words form; if nothing
/// survives that, the text search is skipped.
pub fn execute<B: Backend>(
    backend: &B,
    parsed: &ParsedQuery,
    extra_filters: &FilterSet,
    limit: usize,
    offset: usize,
    now: OffsetDateTime,
) -> Result<SearchPage> {
    let compiled = build(parsed, extra_filters, limit, offset, now);
    match run(backend, &compiled) {
        Ok(page) => Ok(page),
        Err(err) if err.is_fts_syntax() && !parsed.free_text.trim().is_empty() => {
            let safe = fts::fallback(&parsed.free_text);
            debug!(free_text = %parsed.free_text, fallback = safe.as_str(), "text query rejected");
            if safe.is_empty() {
                return Ok(SearchPage {
                    warnings: vec![
                        "text query sanitized to empty; skipping text search".to_string(),
                    ],
                    ..SearchPage::default()
                });
            }
            let filters = extra_filters.merged_with(&parsed.predicates);
            let compiled = build_with(&safe, &filters, limit, offset, now);
            let mut page = run(backend, &compiled)?;
            page.warnings.push(format!(
                "text query rejected by the index; searched for {} instead",
                safe.as_str()
            ));
            Ok(page)
        }
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use insta::assert_snapshot;

    use super::*;
    use crate::filters::FilterKind;
    use crate::filters::OneOrMany;
    use crate::minilang;
    use crate::store::test_support::fixed_now;
    use crate::store::test_support::seeded_store;
    use crate::store::Store;

    fn run_text(store: &Store, free_text: &str, filters: &FilterSet) -> SearchPage {
        let parsed = ParsedQuery {
            free_text: free_text.to_string(),
            predicates: FilterSet::default(),
        };
        execute(store, &parsed, filters, 10, 0, fixed_now()).unwrap()
    }

    #[test]
    fn page_sql_with_text_and_filters() {
        let parsed = minilang::parse("gear inProject");
        let extra = FilterSet::from_kinds([FilterKind::Format(OneOrMany::One("stl".into()))]);
        let compiled = build(&parsed, &extra, 5, 10, fixed_now());
        assert_snapshot!(compiled.page.sql);
        assert_eq!(
            compiled.page.params,
            vec![
                SqlValue::Text("gear".into()),
                SqlValue::Text("gear".into()),
                SqlValue::Text("stl".into()),
                SqlValue::Integer(5),
                SqlValue::Integer(10),
            ]
        );
    }

    #[test]
    fn count_wraps_page_without_order_or_paging() {
        let parsed = minilang::parse("gear tag=brass");
        let compiled = build(&parsed, &FilterSet::default(), 5, 0, fixed_now());
        assert!(compiled.count.sql.starts_with("SELECT COUNT(*) AS total FROM (SELECT "));
        assert!(!compiled.count.sql.contains("ORDER BY"));
        assert!(!compiled.count.sql.contains("LIMIT"));
        assert_eq!(compiled.count.params.len(), compiled.page.params.len() - 2);
    }

    #[test]
    fn empty_text_skips_index_joins() {
        let parsed = minilang::parse("inProject");
        let compiled = build(&parsed, &FilterSet::default(), 5, 0, fixed_now());
        assert!(!compiled.page.sql.contains("MATCH"));
        assert!(compiled.page.sql.contains("0.0 AS rank"));
        assert!(compiled.page.sql.contains("WHERE EXISTS"));
    }

    #[test]
    fn matches_in_both_indexes_rank_first() {
        let store = seeded_store();
        let page = run_text(&store, "gear", &FilterSet::default());
        assert_eq!(page.total_count, 3);
        let ids: Vec<i64> = page.items.iter().map(|i| i.id).collect();
        assert_eq!(ids[0], 1);
        assert!(ids.contains(&2));
        assert!(ids.contains(&3));
        assert!(page.items.windows(2).all(|w| w[0].rank >= w[1].rank));
        assert!(page.items.iter().all(|i| i.rank > 0.0));

        let bare = page.items.iter().find(|i| i.id == 3).unwrap();
        assert_eq!(bare.title, None);
        assert_eq!(bare.filename, "gear_box.3mf");
    }

    #[test]
    fn implicit_and_narrows() {
        let store = seeded_store();
        let page = run_text(&store, "brass gear", &FilterSet::default());
        assert_eq!(page.total_count, 1);
        assert_eq!(page.items[0].id, 1);

        let page = run_text(&store, "brass OR knob", &FilterSet::default());
        assert_eq!(page.total_count, 2);
    }

    #[test]
    fn tag_filters_respect_boundaries() {
        let store = seeded_store();
        let include = FilterSet::from_kinds([FilterKind::TagsInclude(vec!["Lathe Parts".into()])]);
        let page = run_text(&store, "", &include);
        assert_eq!(page.items.iter().map(|i| i.id).collect::<Vec<_>>(), vec![1]);

        let partial = FilterSet::from_kinds([FilterKind::TagsInclude(vec!["hard".into()])]);
        assert_eq!(run_text(&store, "", &partial).total_count, 0);

        let exclude = FilterSet::from_kinds([FilterKind::TagsExclude(vec!["HARDWARE".into()])]);
        let mut ids: Vec<i64> = run_text(&store, "", &exclude)
            .items
            .iter()
            .map(|i| i.id)
            .collect();
        ids.sort();
        assert_eq!(ids, vec![1, 3, 4, 6]);
    }

    #[test]
    fn scalar_and_range_filters() {
        let store = seeded_store();
        let filters = FilterSet::from_pairs(&[
            "format=stl,step",
            "min_rating=2",
            "max_file_size=1000",
            "date_added_start=2024-03-06",
        ])
        .unwrap();
        let page = run_text(&store, "", &filters);
        let mut ids: Vec<i64> = page.items.iter().map(|i| i.id).collect();
        ids.sort();
        assert_eq!(ids, vec![5]);
    }

    #[test]
    fn range_bounds_are_inclusive() {
        let store = seeded_store();
        let ids_for = |pair: &str| {
            let filters = FilterSet::from_pairs(&[pair]).unwrap();
            let mut ids: Vec<i64> = run_text(&store, "", &filters)
                .items
                .iter()
                .map(|i| i.id)
                .collect();
            ids.sort();
            ids
        };
        assert_eq!(ids_for("max_file_size=900"), vec![2, 4, 5, 6]);
        assert_eq!(ids_for("min_file_size=4096"), vec![3]);
        assert_eq!(ids_for("last_viewed_end=2023-09-01T00:00:00Z"), vec![3]);
        assert_eq!(ids_for("last_viewed_start=2023-11-13T22:13:20Z"), vec![2]);
        assert_eq!(ids_for("date_added_end=2023-12-01"), vec![3]);
        assert_eq!(ids_for("date_added_start=2024-03-07"), vec![6]);
        assert_eq!(ids_for("category=Hardware"), vec![2, 5]);
    }

    #[test]
    fn rejected_text_falls_back_with_warning() {
        let store = seeded_store();
        let page = run_text(&store, "gear AND", &FilterSet::default());
        assert_eq!(page.total_count, 3);
        assert_eq!(page.warnings.len(), 1);

        let page = run_text(&store, "AND", &FilterSet::default());
        assert_eq!(page.total_count, 0);
        assert_eq!(
            page.warnings,
            vec!["text query sanitized to empty; skipping text search".to_string()]
        );
    }
}
