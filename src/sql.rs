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

use rusqlite::types::Value as SqlValue;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SqlTable {
    Models,
    ModelMetadata,
}

impl SqlTable {
    pub fn as_str(self) -> &'static str {
        match self {
            SqlTable::Models => "models",
            SqlTable::ModelMetadata => "model_metadata",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SqlColumn {
    ModelId,
    ModelFilename,
    ModelFormat,
    ModelFilePath,
    ModelFileSize,
    ModelDateAdded,
    ModelLastViewed,
    MetaModelId,
    MetaTitle,
    MetaDescription,
    MetaKeywords,
    MetaCategory,
    MetaSource,
    MetaRating,
    ModelHitsRowid,
    MetadataHitsRowid,
}

impl SqlColumn {
    pub fn sql(self) -> &'static str {
        match self {
            SqlColumn::ModelId => "models.id",
            SqlColumn::ModelFilename => "models.filename",
            SqlColumn::ModelFormat => "models.format",
            SqlColumn::ModelFilePath => "models.file_path",
            SqlColumn::ModelFileSize => "models.file_size",
            SqlColumn::ModelDateAdded => "models.date_added",
            SqlColumn::ModelLastViewed => "models.last_viewed",
            SqlColumn::MetaModelId => "model_metadata.model_id",
            SqlColumn::MetaTitle => "model_metadata.title",
            SqlColumn::MetaDescription => "model_metadata.description",
            SqlColumn::MetaKeywords => "model_metadata.keywords",
            SqlColumn::MetaCategory => "model_metadata.category",
            SqlColumn::MetaSource => "model_metadata.source",
            SqlColumn::MetaRating => "model_metadata.rating",
            SqlColumn::ModelHitsRowid => "model_hits.rowid",
            SqlColumn::MetadataHitsRowid => "metadata_hits.rowid",
        }
    }

    pub fn name(self) -> &'static str {
        let sql = self.sql();
        sql.rsplit_once('.').map(|(_, name)| name).unwrap_or(sql)
    }
}

#[derive(Clone, Debug)]
pub enum SqlExpr {
    Column(SqlColumn),
    Raw(&'static str),
    Alias(&'static str),
}

impl SqlExpr {
    pub fn column(column: SqlColumn) -> Self {
        Self::Column(column)
    }

    pub fn raw(sql: &'static str) -> Self {
        Self::Raw(sql)
    }

    pub fn alias(alias: &'static str) -> Self {
        Self::Alias(alias)
    }

    pub fn to_sql(&self) -> String {
        match self {
            SqlExpr::Column(column) => column.sql().to_string(),
            SqlExpr::Raw(sql) => (*sql).to_string(),
            SqlExpr::Alias(alias) => (*alias).to_string(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct SqlSelectItem {
    expr: SqlExpr,
    alias: Option<&'static str>,
}

impl SqlSelectItem {
    pub fn new(expr: SqlExpr) -> Self {
        Self { expr, alias: None }
    }

    pub fn alias(mut self, alias: &'static str) -> Self {
        self.alias = Some(alias);
        self
    }

    fn to_sql(&self) -> String {
        let expr = self.expr.to_sql();
        if let Some(alias) = self.alias {
            format!("{} AS {}", expr, alias)
        } else {
            expr
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SqlOrderDir {
    Asc,
    Desc,
}

impl SqlOrderDir {
    fn as_str(self) -> &'static str {
        match self {
            SqlOrderDir::Asc => "ASC",
            SqlOrderDir::Desc => "DESC",
        }
    }
}

#[derive(Clone, Debug)]
pub struct SqlOrderBy {
    expr: SqlExpr,
    dir: SqlOrderDir,
}

impl SqlOrderBy {
    pub fn new(expr: SqlExpr, dir: SqlOrderDir) -> Self {
        Self { expr, dir }
    }

    pub fn asc(expr: SqlExpr) -> Self {
        Self::new(expr, SqlOrderDir::Asc)
    }

    pub fn desc(expr: SqlExpr) -> Self {
        Self::new(expr, SqlOrderDir::Desc)
    }

    fn to_sql(&self) -> String {
        format!("{} {}", self.expr.to_sql(), self.dir.as_str())
    }
}

/// A piece of SQL together with the values bound to its placeholders, in
/// placeholder order. Combinators keep the two aligned.
#[derive(Clone, Debug, PartialEq)]
pub struct SqlFragment {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

impl SqlFragment {
    pub fn raw(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    /// `sql` must contain exactly one `?` per entry in `params`.
    pub fn raw_with_params(sql: impl Into<String>, params: Vec<SqlValue>) -> Self {
        let sql = sql.into();
        debug_assert_eq!(sql.matches('?').count(), params.len());
        Self { sql, params }
    }

    pub fn cmp(expr: SqlExpr, op: &str, value: SqlValue) -> Self {
        let sql = format!("{} {} ?", expr.to_sql(), op);
        Self {
            sql,
            params: vec![value],
        }
    }

    pub fn in_list(expr: SqlExpr, values: Vec<SqlValue>) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let placeholders = vec!["?"; values.len()].join(", ");
        let sql = format!("{} IN ({})", expr.to_sql(), placeholders);
        Some(Self {
            sql,
            params: values,
        })
    }

    pub fn and(self, other: SqlFragment) -> SqlFragment {
        let sql = format!("({}) AND ({})", self.sql, other.sql);
        let mut params = self.params;
        params.extend(other.params);
        SqlFragment { sql, params }
    }

    pub fn all(fragments: impl IntoIterator<Item = SqlFragment>) -> Option<SqlFragment> {
        fragments.into_iter().reduce(SqlFragment::and)
    }
}

#[derive(Clone, Debug)]
enum SqlJoinSource {
    Table(SqlTable),
    Subquery {
        query: SqlFragment,
        alias: &'static str,
    },
}

/// Always a LEFT JOIN: a join never drops a `models` row.
#[derive(Clone, Debug)]
pub struct SqlJoin {
    source: SqlJoinSource,
    left: SqlColumn,
    right: SqlColumn,
}

impl SqlJoin {
    pub fn left(table: SqlTable, left: SqlColumn, right: SqlColumn) -> Self {
        Self {
            source: SqlJoinSource::Table(table),
            left,
            right,
        }
    }

    pub fn left_subquery(
        query: SqlFragment,
        alias: &'static str,
        left: SqlColumn,
        right: SqlColumn,
    ) -> Self {
        Self {
            source: SqlJoinSource::Subquery { query, alias },
            left,
            right,
        }
    }

    fn to_fragment(&self) -> SqlFragment {
        let (source, params) = match &self.source {
            SqlJoinSource::Table(table) => (table.as_str().to_string(), Vec::new()),
            SqlJoinSource::Subquery { query, alias } => {
                (format!("({}) AS {}", query.sql, alias), query.params.clone())
            }
        };
        SqlFragment {
            sql: format!(
                "LEFT JOIN {} ON {} = {}",
                source,
                self.left.sql(),
                self.right.sql()
            ),
            params,
        }
    }
}

#[derive(Clone, Debug)]
pub struct SqlSelectBuilder {
    select: Vec<SqlSelectItem>,
    from: SqlTable,
    joins: Vec<SqlJoin>,
    where_clause: Option<SqlFragment>,
    order_by: Vec<SqlOrderBy>,
    limit: Option<usize>,
    offset: Option<usize>,
}

impl SqlSelectBuilder {
    pub fn new(from: SqlTable) -> Self {
        Self {
            select: Vec::new(),
            from,
            joins: Vec::new(),
            where_clause: None,
            order_by: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    pub fn select<I>(mut self, items: I) -> Self
    where
        I: IntoIterator<Item = SqlSelectItem>,
    {
        self.select.extend(items);
        self
    }

    pub fn join(mut self, join: SqlJoin) -> Self {
        self.joins.push(join);
        self
    }

    pub fn where_clause(mut self, clause: SqlFragment) -> Self {
        self.where_clause = Some(clause);
        self
    }

    pub fn order_by(mut self, order: SqlOrderBy) -> Self {
        self.order_by.push(order);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn build_count(&self) -> SqlFragment {
        let mut inner = self.clone();
        inner.order_by.clear();
        inner.limit = None;
        inner.offset = None;
        let inner = inner.build();
        SqlFragment {
            sql: format!("SELECT COUNT(*) AS total FROM ({})", inner.sql),
            params: inner.params,
        }
    }

    pub fn build(self) -> SqlFragment {
        let mut sql = String::new();
        sql.push_str("SELECT ");
        if self.select.is_empty() {
            sql.push('*');
        } else {
            let mut first = true;
            for item in &self.select {
                if !first {
                    sql.push_str(", ");
                }
                first = false;
                sql.push_str(&item.to_sql());
            }
        }
        sql.push_str(" FROM ");
        sql.push_str(self.from.as_str());

        let mut params = Vec::new();
        for join in &self.joins {
            let join = join.to_fragment();
            sql.push(' ');
            sql.push_str(&join.sql);
            params.extend(join.params);
        }
        if let Some(where_clause) = self.where_clause {
            sql.push_str(" WHERE ");
            sql.push_str(&where_clause.sql);
            params.extend(where_clause.params);
        }
        if !self.order_by.is_empty() {
            sql.push_str(" ORDER BY ");
            let mut first = true;
            for order in &self.order_by {
                if !first {
                    sql.push_str(", ");
                }
                first = false;
                sql.push_str(&order.to_sql());
            }
        }
        if let Some(limit) = self.limit {
            sql.push_str(" LIMIT ?");
            params.push(SqlValue::from(limit as i64));
        }
        if let Some(offset) = self.offset {
            sql.push_str(" OFFSET ?");
            params.push(SqlValue::from(offset as i64));
        }

        SqlFragment { sql, params }
    }
}
