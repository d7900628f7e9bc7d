//! SELECT building and the paginated search protocol.
//!
//! [`SelectQuery`] assembles clauses in a fixed order and compiles predicate
//! groups through the shared accumulator, so `build()` is a pure function of
//! its inputs. [`SelectQuery::search`] layers the two-step count protocol on
//! top: fetch the page, then re-select the same query as a subquery with a
//! window count to recover the total match count and page count.

use crate::clause::{Direction, Join, OrderBy, Pagination};
use crate::client::GenericClient;
use crate::error::{SiftError, SiftResult};
use crate::param::ParamList;
use crate::predicate::{Predicate, compile_predicates};
use crate::row::{FromRow, RowExt};

/// One page of search results plus the counts recovered alongside it.
#[derive(Clone, Debug)]
pub struct SearchPage<T> {
    /// Hydrated rows of the requested page.
    pub items: Vec<T>,
    /// Number of rows in this page.
    pub count: i64,
    /// Total number of rows matching the filters, across all pages.
    pub total_count: i64,
    /// Number of pages at the current page size. Always 1 when the query is
    /// unlimited and rows exist.
    pub page_count: i64,
}

impl<T> SearchPage<T> {
    fn empty() -> Self {
        Self {
            items: Vec::new(),
            count: 0,
            total_count: 0,
            page_count: 0,
        }
    }
}

/// Scan target for the count query.
struct CountRow {
    count: i64,
    total_count: i64,
    page_count: i32,
}

impl FromRow for CountRow {
    fn from_row(row: &tokio_postgres::Row) -> SiftResult<Self> {
        Ok(Self {
            count: row.try_get_column("count")?,
            total_count: row.try_get_column("total_count")?,
            page_count: row.try_get_column("page_count")?,
        })
    }
}

/// A composable SELECT statement.
#[derive(Clone, Debug, Default)]
pub struct SelectQuery {
    fields: Vec<String>,
    from: String,
    joins: Vec<Join>,
    predicates: Vec<Vec<Predicate>>,
    group_by: Vec<String>,
    order_by: Vec<OrderBy>,
    pagination: Option<Pagination>,
}

impl SelectQuery {
    /// Create a query selecting from the given table or FROM expression.
    pub fn new(from: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            ..Self::default()
        }
    }

    /// Set the selected fields. Defaults to `*` when none are given.
    pub fn fields(mut self, fields: &[&str]) -> Self {
        self.fields = fields.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Append one selected field.
    pub fn field(mut self, field: &str) -> Self {
        self.fields.push(field.to_string());
        self
    }

    /// Append a join, in input order.
    pub fn join(mut self, join: Join) -> Self {
        self.joins.push(join);
        self
    }

    /// Append an INNER JOIN.
    pub fn inner_join(self, table: &str, on: &str) -> Self {
        self.join(Join::new(table, on))
    }

    /// Append a LEFT JOIN.
    pub fn left_join(self, table: &str, on: &str) -> Self {
        self.join(Join::left(table, on))
    }

    /// Append a RIGHT JOIN.
    pub fn right_join(self, table: &str, on: &str) -> Self {
        self.join(Join::right(table, on))
    }

    /// Append an AND group whose members are OR-combined.
    pub fn and_where(mut self, group: Vec<Predicate>) -> Self {
        self.predicates.push(group);
        self
    }

    /// Append a single predicate as its own AND group.
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.predicates.push(vec![predicate]);
        self
    }

    /// Set GROUP BY fields.
    pub fn group_by(mut self, fields: &[&str]) -> Self {
        self.group_by = fields.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Append an ORDER BY entry.
    pub fn order_by(mut self, field: &str, direction: Direction) -> Self {
        self.order_by.push(OrderBy::new(field, direction));
        self
    }

    /// Append ORDER BY field ASC.
    pub fn order_by_asc(self, field: &str) -> Self {
        self.order_by(field, Direction::Asc)
    }

    /// Append ORDER BY field DESC.
    pub fn order_by_desc(self, field: &str) -> Self {
        self.order_by(field, Direction::Desc)
    }

    /// Set pagination from a row offset and a limit (0 means unlimited).
    pub fn paginate(mut self, start: u64, limit: u64) -> Self {
        self.pagination = Some(Pagination::new(start, limit));
        self
    }

    /// Set pagination from a descriptor.
    pub fn pagination(mut self, pagination: Pagination) -> Self {
        self.pagination = Some(pagination);
        self
    }

    fn select_list(&self) -> String {
        if self.fields.is_empty() {
            "*".to_string()
        } else {
            self.fields.join(", ")
        }
    }

    /// Render the statement. `paged` controls the ORDER BY / LIMIT / OFFSET
    /// tail, which the count subquery keeps and single-row fetches drop.
    fn render(
        &self,
        select_list: &str,
        paged: bool,
        params: &mut ParamList,
    ) -> SiftResult<String> {
        let mut sql = format!("SELECT {} FROM {}", select_list, self.from);

        for join in &self.joins {
            sql.push(' ');
            sql.push_str(&join.to_sql());
        }

        let clauses = compile_predicates(&self.predicates, params)?;
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }

        if !self.group_by.is_empty() {
            sql.push_str(" GROUP BY ");
            sql.push_str(&self.group_by.join(", "));
        }

        if paged {
            if !self.order_by.is_empty() {
                let entries: Vec<String> = self.order_by.iter().map(OrderBy::to_sql).collect();
                sql.push_str(" ORDER BY ");
                sql.push_str(&entries.join(", "));
            }

            if let Some(p) = &self.pagination {
                if p.limit != 0 {
                    sql.push_str(&format!(" LIMIT {}", p.limit));
                }
                sql.push_str(&format!(" OFFSET {}", p.start));
            }
        }

        Ok(sql)
    }

    /// Build the SELECT text and its positional arguments.
    ///
    /// Pure; never touches the database. A malformed predicate aborts the
    /// build with the arity error.
    pub fn build(&self) -> SiftResult<(String, ParamList)> {
        let mut params = ParamList::new();
        let sql = self.render(&self.select_list(), true, &mut params)?;
        Ok((sql, params))
    }

    /// Build the count query: the base query re-selected as a subquery with
    /// a window count, aggregated into page/total counts.
    pub fn build_count(&self) -> SiftResult<(String, ParamList)> {
        let mut params = ParamList::new();
        let inner = self.render("count(*) over () as total_count", true, &mut params)?;
        let sql = format!(
            "SELECT count(*) as count, total_count, \
             ceil(total_count::decimal / count(*))::integer as page_count \
             FROM ({inner}) AS results GROUP BY total_count"
        );
        Ok((sql, params))
    }

    fn build_single(&self) -> SiftResult<(String, ParamList)> {
        let mut params = ParamList::new();
        let sql = self.render(&self.select_list(), false, &mut params)?;
        Ok((sql, params))
    }

    /// The built SQL string, for debugging and tests.
    pub fn to_sql(&self) -> SiftResult<String> {
        Ok(self.build()?.0)
    }

    /// The built count SQL string, for debugging and tests.
    pub fn to_count_sql(&self) -> SiftResult<String> {
        Ok(self.build_count()?.0)
    }

    /// Execute the query and map all rows.
    pub async fn fetch_all<T: FromRow>(&self, conn: &impl GenericClient) -> SiftResult<Vec<T>> {
        let (sql, params) = self.build()?;
        tracing::debug!(target: "pgsift.sql", sql = %sql, params = params.len(), "select");
        let rows = conn.query(&sql, &params.as_refs()).await?;
        rows.iter().map(T::from_row).collect()
    }

    /// Run the paginated search protocol.
    ///
    /// Fetches the page first; when it comes back empty the count query is
    /// skipped entirely and an empty page with zero counts is returned.
    /// Otherwise a second query recovers the page count, total match count
    /// and page-count ceiling in one aggregate row. A missing aggregate row
    /// is not an error and also yields zero counts.
    pub async fn search<T: FromRow>(&self, conn: &impl GenericClient) -> SiftResult<SearchPage<T>> {
        let items: Vec<T> = self.fetch_all(conn).await?;
        if items.is_empty() {
            return Ok(SearchPage::empty());
        }

        let (sql, params) = self.build_count()?;
        tracing::debug!(target: "pgsift.sql", sql = %sql, params = params.len(), "count");
        match conn.query_opt(&sql, &params.as_refs()).await? {
            Some(row) => {
                let counts = CountRow::from_row(&row)?;
                Ok(SearchPage {
                    items,
                    count: counts.count,
                    total_count: counts.total_count,
                    page_count: counts.page_count as i64,
                })
            }
            None => Ok(SearchPage {
                items,
                ..SearchPage::empty()
            }),
        }
    }

    /// Fetch exactly one row, ignoring ordering and pagination.
    ///
    /// Zero matching rows is [`SiftError::NotFound`], not a defaulted record.
    pub async fn get<T: FromRow>(&self, conn: &impl GenericClient) -> SiftResult<T> {
        let (sql, params) = self.build_single()?;
        tracing::debug!(target: "pgsift.sql", sql = %sql, params = params.len(), "get");
        match conn.query_opt(&sql, &params.as_refs()).await? {
            Some(row) => T::from_row(&row),
            None => Err(SiftError::not_found(format!(
                "no row matched in {}",
                self.from
            ))),
        }
    }
}

/// Create a SELECT query for the given table.
pub fn select(from: impl Into<String>) -> SelectQuery {
    SelectQuery::new(from)
}
