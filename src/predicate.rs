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

//! Compiles a [`FilterSet`] into parameterized WHERE fragments.
//!
//! Fragments come out in a fixed order (the field order of `FilterSet`) so
//! identical filters always compile to identical SQL.

use rusqlite::types::Value as SqlValue;
use time::OffsetDateTime;

use crate::clock::days_before;
use crate::clock::format_timestamp;
use crate::filters::FilterSet;
use crate::filters::OneOrMany;
use crate::sql::SqlColumn;
use crate::sql::SqlExpr;
use crate::sql::SqlFragment;

/// Keywords lower-cased, blanks removed, wrapped in commas so `,tag,`
/// cannot match across tag boundaries.
const CANONICAL_KEYWORDS: &str = "(',' || REPLACE(REPLACE(REPLACE(LOWER(COALESCE(model_metadata.keywords, '')), ' ', ''), char(9), ''), char(10), '') || ',')";

const PROJECT_MEMBERSHIP: &str =
    "SELECT 1 FROM project_models WHERE project_models.model_id = models.id";

pub fn compile(filters: &FilterSet, now: OffsetDateTime) -> Vec<SqlFragment> {
    let mut out = Vec::new();

    for tag in &filters.tags_include {
        out.push(SqlFragment::raw_with_params(
            format!("model_metadata.keywords IS NOT NULL AND instr({CANONICAL_KEYWORDS}, ?) > 0"),
            vec![tag_needle(tag)],
        ));
    }
    for tag in &filters.tags_exclude {
        out.push(SqlFragment::raw_with_params(
            format!("(model_metadata.keywords IS NULL OR instr({CANONICAL_KEYWORDS}, ?) = 0)"),
            vec![tag_needle(tag)],
        ));
    }

    match filters.in_project {
        Some(true) => out.push(SqlFragment::raw(format!("EXISTS ({PROJECT_MEMBERSHIP})"))),
        Some(false) => out.push(SqlFragment::raw(format!("NOT EXISTS ({PROJECT_MEMBERSHIP})"))),
        None => {}
    }

    if let Some(days) = filters.lat_days {
        let cutoff = format_timestamp(days_before(now, days));
        out.push(SqlFragment::raw_with_params(
            "(models.last_viewed IS NULL OR models.last_viewed = '' OR julianday(models.last_viewed) <= julianday(?))",
            vec![SqlValue::Text(cutoff)],
        ));
    }

    if let Some(category) = &filters.category {
        out.extend(one_or_many(SqlColumn::MetaCategory, category));
    }
    if let Some(format) = &filters.format {
        out.extend(one_or_many(SqlColumn::ModelFormat, format));
    }
    if let Some(rating) = filters.min_rating {
        out.push(SqlFragment::cmp(
            SqlExpr::column(SqlColumn::MetaRating),
            ">=",
            SqlValue::Integer(rating),
        ));
    }

    let date_bounds = [
        (SqlColumn::ModelDateAdded, ">=", &filters.date_added_start),
        (SqlColumn::ModelDateAdded, "<=", &filters.date_added_end),
        (SqlColumn::ModelLastViewed, ">=", &filters.last_viewed_start),
        (SqlColumn::ModelLastViewed, "<=", &filters.last_viewed_end),
    ];
    for (column, op, bound) in date_bounds {
        if let Some(bound) = bound {
            out.push(SqlFragment::raw_with_params(
                format!("julianday({}) {op} julianday(?)", column.sql()),
                vec![SqlValue::Text(bound.clone())],
            ));
        }
    }

    if let Some(size) = filters.min_file_size {
        out.push(SqlFragment::cmp(
            SqlExpr::column(SqlColumn::ModelFileSize),
            ">=",
            SqlValue::Integer(size),
        ));
    }
    if let Some(size) = filters.max_file_size {
        out.push(SqlFragment::cmp(
            SqlExpr::column(SqlColumn::ModelFileSize),
            "<=",
            SqlValue::Integer(size),
        ));
    }

    out
}

fn tag_needle(tag: &str) -> SqlValue {
    let canonical: String = tag
        .to_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    SqlValue::Text(format!(",{canonical},"))
}

fn one_or_many(column: SqlColumn, value: &OneOrMany) -> Option<SqlFragment> {
    match value {
        OneOrMany::One(v) if v.is_empty() => None,
        OneOrMany::One(v) => Some(SqlFragment::cmp(
            SqlExpr::column(column),
            "=",
            SqlValue::Text(v.clone()),
        )),
        OneOrMany::Many(vs) => SqlFragment::in_list(
            SqlExpr::column(column),
            vs.iter().cloned().map(SqlValue::Text).collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::FilterKind;

    fn fixed_now() -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap()
    }

    fn placeholders(fragment: &SqlFragment) -> usize {
        fragment.sql.matches('?').count()
    }

    #[test]
    fn empty_filters_compile_to_nothing() {
        assert!(compile(&FilterSet::default(), fixed_now()).is_empty());
    }

    #[test]
    fn every_param_has_a_placeholder() {
        let filters = FilterSet::from_pairs(&[
            "tag=Hand Tools",
            "tags_exclude=old",
            "in_project=false",
            "lat_days=30",
            "category=Jigs",
            "format=stl,obj,3mf",
            "min_rating=3",
            "date_added_start=2024-01-01",
            "last_viewed_end=2024-06-01",
            "min_file_size=10",
            "max_file_size=2048",
        ])
        .unwrap();
        let fragments = compile(&filters, fixed_now());
        assert_eq!(fragments.len(), 11);
        for fragment in &fragments {
            assert_eq!(placeholders(fragment), fragment.params.len(), "{}", fragment.sql);
        }
        assert_eq!(fragments[0].params, vec![SqlValue::Text(",handtools,".into())]);
        assert_eq!(fragments[5].sql, "models.format IN (?, ?, ?)");
    }

    #[test]
    fn order_is_deterministic() {
        let a = FilterSet::from_kinds([
            FilterKind::MaxFileSize(5),
            FilterKind::Category(OneOrMany::One("Jigs".into())),
            FilterKind::InProject(true),
        ]);
        let b = FilterSet::from_kinds([
            FilterKind::InProject(true),
            FilterKind::MaxFileSize(5),
            FilterKind::Category(OneOrMany::One("Jigs".into())),
        ]);
        assert_eq!(compile(&a, fixed_now()), compile(&b, fixed_now()));
        let sql: Vec<String> = compile(&a, fixed_now()).into_iter().map(|f| f.sql).collect();
        assert!(sql[0].starts_with("EXISTS"));
        assert_eq!(sql[1], "model_metadata.category = ?");
        assert_eq!(sql[2], "models.file_size <= ?");
    }

    #[test]
    fn lat_cutoff_is_relative_to_now() {
        let filters = FilterSet::from_kinds([FilterKind::LatDays(30)]);
        let fragments = compile(&filters, fixed_now());
        assert_eq!(
            fragments[0].params,
            vec![SqlValue::Text("2023-10-15T22:13:20Z".into())]
        );
        assert!(fragments[0].sql.contains("models.last_viewed IS NULL"));
    }
}
