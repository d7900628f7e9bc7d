//! Transactional mutation session.
//!
//! A [`TransactionSession`] owns one live transaction from `begin` until
//! `commit` or `rollback`. Every mutation runs inside it; the first execution
//! failure rolls the whole transaction back and surfaces the cause (together
//! with the rollback failure, if rolling back failed too). After that the
//! session is terminal and any further operation reports a
//! transaction-state error.
//!
//! Column lists come from [`FieldMap`], whose lexicographic iteration keeps
//! SQL text and positional arguments aligned.

use crate::client::{PgTransaction, TxClient};
use crate::error::{SiftError, SiftResult};
use crate::param::ParamList;
use crate::predicate::{Predicate, compile_predicates};
use crate::value::{FieldMap, Value};
use tokio_postgres::types::FromSql;

/// A row creation: field values to insert.
#[derive(Clone, Debug, Default)]
pub struct Creation {
    pub set: FieldMap,
}

impl Creation {
    pub fn new(set: FieldMap) -> Self {
        Self { set }
    }
}

/// A row mutation: field assignments plus the predicates targeting the rows.
#[derive(Clone, Debug, Default)]
pub struct Mutation {
    pub set: FieldMap,
    pub predicates: Vec<Vec<Predicate>>,
}

impl Mutation {
    pub fn new(set: FieldMap, predicates: Vec<Vec<Predicate>>) -> Self {
        Self { set, predicates }
    }
}

/// A row deletion: the predicates targeting the rows.
#[derive(Clone, Debug, Default)]
pub struct Deletion {
    pub predicates: Vec<Vec<Predicate>>,
}

impl Deletion {
    pub fn new(predicates: Vec<Vec<Predicate>>) -> Self {
        Self { predicates }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TxState {
    Open,
    Committed,
    RolledBack,
}

/// A mutation session bound to one open transaction.
///
/// Not meant to be shared across concurrent callers; the underlying
/// transaction handle is a single-owner resource.
pub struct TransactionSession<C: TxClient> {
    client: C,
    state: TxState,
}

impl<'a> TransactionSession<PgTransaction<'a>> {
    /// Begin a transaction on the client and wrap it in a session.
    pub async fn begin(client: &'a mut tokio_postgres::Client) -> SiftResult<Self> {
        Ok(Self::new(PgTransaction::begin(client).await?))
    }
}

impl<C: TxClient> TransactionSession<C> {
    /// Wrap an already-begun transaction client.
    pub fn new(client: C) -> Self {
        Self {
            client,
            state: TxState::Open,
        }
    }

    /// Whether the session can still run operations.
    pub fn is_open(&self) -> bool {
        self.state == TxState::Open
    }

    fn ensure_open(&self) -> SiftResult<()> {
        match self.state {
            TxState::Open => Ok(()),
            TxState::Committed => Err(SiftError::TransactionState("committed")),
            TxState::RolledBack => Err(SiftError::TransactionState("rolled back")),
        }
    }

    /// Roll back after a failed operation and combine errors if the rollback
    /// itself fails.
    async fn abort(&mut self, cause: SiftError) -> SiftError {
        let rolled_back = self.client.rollback().await;
        self.state = TxState::RolledBack;
        match rolled_back {
            Ok(()) => cause,
            Err(rollback_error) => SiftError::RollbackFailed {
                source: Box::new(cause),
                rollback_error: Box::new(rollback_error),
            },
        }
    }

    /// Insert one row. Returns the affected row count.
    pub async fn insert(&mut self, table: &str, values: &FieldMap) -> SiftResult<u64> {
        self.ensure_open()?;
        let (sql, params) = insert_sql(table, values, None)?;
        tracing::debug!(target: "pgsift.sql", sql = %sql, params = params.len(), "insert");
        match self.client.execute(&sql, &params.as_refs()).await {
            Ok(n) => Ok(n),
            Err(e) => Err(self.abort(e).await),
        }
    }

    /// Insert one row and scan the single scalar named by `returning`.
    pub async fn insert_returning<R>(
        &mut self,
        table: &str,
        values: &FieldMap,
        returning: &str,
    ) -> SiftResult<R>
    where
        R: for<'b> FromSql<'b>,
    {
        self.ensure_open()?;
        let (sql, params) = insert_sql(table, values, Some(returning))?;
        tracing::debug!(target: "pgsift.sql", sql = %sql, params = params.len(), "insert");
        let row = match self.client.query_one(&sql, &params.as_refs()).await {
            Ok(row) => row,
            Err(e) => return Err(self.abort(e).await),
        };
        match row.try_get(0) {
            Ok(v) => Ok(v),
            Err(e) => Err(self.abort(SiftError::decode(returning, e.to_string())).await),
        }
    }

    /// Insert several rows through one prepared statement, in input order.
    ///
    /// The first failing row aborts the remaining rows and rolls back the
    /// whole transaction, so earlier rows are never partially committed.
    pub async fn insert_multiple(
        &mut self,
        table: &str,
        fields: &[&str],
        rows: &[Vec<Value>],
    ) -> SiftResult<()> {
        self.ensure_open()?;
        check_row_shapes(fields, rows)?;
        let sql = multi_insert_sql(table, fields, None);
        tracing::debug!(target: "pgsift.sql", sql = %sql, rows = rows.len(), "insert multiple");
        let stmt = match self.client.prepare(&sql).await {
            Ok(stmt) => stmt,
            Err(e) => return Err(self.abort(e).await),
        };
        for row in rows {
            let params: ParamList = row.iter().cloned().collect();
            if let Err(e) = self.client.execute_prepared(&stmt, &params.as_refs()).await {
                return Err(self.abort(e).await);
            }
        }
        Ok(())
    }

    /// Like [`TransactionSession::insert_multiple`], collecting one returned
    /// scalar per row, preserving row order.
    pub async fn insert_multiple_returning<R>(
        &mut self,
        table: &str,
        fields: &[&str],
        rows: &[Vec<Value>],
        returning: &str,
    ) -> SiftResult<Vec<R>>
    where
        R: for<'b> FromSql<'b>,
    {
        self.ensure_open()?;
        check_row_shapes(fields, rows)?;
        let sql = multi_insert_sql(table, fields, Some(returning));
        tracing::debug!(target: "pgsift.sql", sql = %sql, rows = rows.len(), "insert multiple");
        let stmt = match self.client.prepare(&sql).await {
            Ok(stmt) => stmt,
            Err(e) => return Err(self.abort(e).await),
        };
        let mut returned = Vec::with_capacity(rows.len());
        for row in rows {
            let params: ParamList = row.iter().cloned().collect();
            let result = match self.client.query_one_prepared(&stmt, &params.as_refs()).await {
                Ok(row) => row,
                Err(e) => return Err(self.abort(e).await),
            };
            match result.try_get(0) {
                Ok(v) => returned.push(v),
                Err(e) => {
                    return Err(self.abort(SiftError::decode(returning, e.to_string())).await);
                }
            }
        }
        Ok(returned)
    }

    /// Insert-or-update on a uniqueness conflict.
    ///
    /// The INSERT columns and the DO UPDATE assignments derive from the same
    /// ordered map, so their argument lists always pair up; a mismatch is a
    /// construction error raised before anything reaches the database.
    pub async fn upsert(
        &mut self,
        table: &str,
        conflict_columns: &[&str],
        values: &FieldMap,
    ) -> SiftResult<u64> {
        self.ensure_open()?;
        let (sql, params) = upsert_sql(table, conflict_columns, values, values, None)?;
        tracing::debug!(target: "pgsift.sql", sql = %sql, params = params.len(), "upsert");
        match self.client.execute(&sql, &params.as_refs()).await {
            Ok(n) => Ok(n),
            Err(e) => Err(self.abort(e).await),
        }
    }

    /// Upsert and scan the single scalar named by `returning`.
    pub async fn upsert_returning<R>(
        &mut self,
        table: &str,
        conflict_columns: &[&str],
        values: &FieldMap,
        returning: &str,
    ) -> SiftResult<R>
    where
        R: for<'b> FromSql<'b>,
    {
        self.ensure_open()?;
        let (sql, params) = upsert_sql(table, conflict_columns, values, values, Some(returning))?;
        tracing::debug!(target: "pgsift.sql", sql = %sql, params = params.len(), "upsert");
        let row = match self.client.query_one(&sql, &params.as_refs()).await {
            Ok(row) => row,
            Err(e) => return Err(self.abort(e).await),
        };
        match row.try_get(0) {
            Ok(v) => Ok(v),
            Err(e) => Err(self.abort(SiftError::decode(returning, e.to_string())).await),
        }
    }

    /// Update rows matched by the predicate groups.
    ///
    /// Empty predicate groups mean an unconditional update of every row in
    /// the table. Nothing guards against it; pass predicates unless you mean
    /// exactly that.
    pub async fn update(
        &mut self,
        table: &str,
        set: &FieldMap,
        predicates: &[Vec<Predicate>],
    ) -> SiftResult<u64> {
        self.ensure_open()?;
        let (sql, params) = update_sql(table, set, predicates)?;
        tracing::debug!(target: "pgsift.sql", sql = %sql, params = params.len(), "update");
        match self.client.execute(&sql, &params.as_refs()).await {
            Ok(n) => Ok(n),
            Err(e) => Err(self.abort(e).await),
        }
    }

    /// Delete rows matched by the predicate groups.
    ///
    /// As with [`TransactionSession::update`], empty predicate groups delete
    /// every row.
    pub async fn delete(
        &mut self,
        table: &str,
        predicates: &[Vec<Predicate>],
    ) -> SiftResult<u64> {
        self.ensure_open()?;
        let (sql, params) = delete_sql(table, predicates)?;
        tracing::debug!(target: "pgsift.sql", sql = %sql, params = params.len(), "delete");
        match self.client.execute(&sql, &params.as_refs()).await {
            Ok(n) => Ok(n),
            Err(e) => Err(self.abort(e).await),
        }
    }

    /// Insert the rows described by a [`Creation`].
    pub async fn create(&mut self, table: &str, creation: &Creation) -> SiftResult<u64> {
        self.insert(table, &creation.set).await
    }

    /// Apply a [`Mutation`] descriptor.
    pub async fn apply(&mut self, table: &str, mutation: &Mutation) -> SiftResult<u64> {
        self.update(table, &mutation.set, &mutation.predicates).await
    }

    /// Apply a [`Deletion`] descriptor.
    pub async fn remove(&mut self, table: &str, deletion: &Deletion) -> SiftResult<u64> {
        self.delete(table, &deletion.predicates).await
    }

    /// Commit the transaction and end the session.
    pub async fn commit(mut self) -> SiftResult<()> {
        self.ensure_open()?;
        self.client.commit().await?;
        self.state = TxState::Committed;
        Ok(())
    }

    /// Roll the transaction back and end the session.
    pub async fn rollback(mut self) -> SiftResult<()> {
        self.ensure_open()?;
        self.client.rollback().await?;
        self.state = TxState::RolledBack;
        Ok(())
    }
}

fn insert_sql(
    table: &str,
    values: &FieldMap,
    returning: Option<&str>,
) -> SiftResult<(String, ParamList)> {
    if values.is_empty() {
        return Err(SiftError::validation(format!(
            "insert into {table} requires at least one column"
        )));
    }

    let mut params = ParamList::new();
    let mut columns = Vec::with_capacity(values.len());
    let mut placeholders = Vec::with_capacity(values.len());
    for (column, value) in values {
        let idx = params.push(value.clone());
        columns.push(column.as_str());
        placeholders.push(format!("${idx}"));
    }

    let mut sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table,
        columns.join(", "),
        placeholders.join(", ")
    );
    if let Some(column) = returning {
        sql.push_str(" RETURNING ");
        sql.push_str(column);
    }
    Ok((sql, params))
}

fn check_row_shapes(fields: &[&str], rows: &[Vec<Value>]) -> SiftResult<()> {
    if fields.is_empty() {
        return Err(SiftError::validation(
            "insert multiple requires at least one field",
        ));
    }
    for (i, row) in rows.iter().enumerate() {
        if row.len() != fields.len() {
            return Err(SiftError::validation(format!(
                "row {} has {} value(s) for {} field(s)",
                i,
                row.len(),
                fields.len()
            )));
        }
    }
    Ok(())
}

fn multi_insert_sql(table: &str, fields: &[&str], returning: Option<&str>) -> String {
    let placeholders: Vec<String> = (1..=fields.len()).map(|i| format!("${i}")).collect();
    let mut sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table,
        fields.join(", "),
        placeholders.join(", ")
    );
    if let Some(column) = returning {
        sql.push_str(" RETURNING ");
        sql.push_str(column);
    }
    sql
}

/// Build the upsert statement from its two halves.
///
/// Both halves are normally the same map; they stay separate parameters so
/// the pairing invariant is checked where it is enforced.
fn upsert_sql(
    table: &str,
    conflict_columns: &[&str],
    insert_values: &FieldMap,
    update_values: &FieldMap,
    returning: Option<&str>,
) -> SiftResult<(String, ParamList)> {
    if insert_values.is_empty() {
        return Err(SiftError::validation(format!(
            "upsert into {table} requires at least one column"
        )));
    }
    if conflict_columns.is_empty() {
        return Err(SiftError::validation(format!(
            "upsert into {table} requires at least one conflict column"
        )));
    }

    let mut params = ParamList::new();
    let mut columns = Vec::with_capacity(insert_values.len());
    let mut placeholders = Vec::with_capacity(insert_values.len());
    for (column, value) in insert_values {
        let idx = params.push(value.clone());
        columns.push(column.as_str());
        placeholders.push(format!("${idx}"));
    }

    let mut assignments = Vec::with_capacity(update_values.len());
    for (column, value) in update_values {
        let idx = params.push(value.clone());
        assignments.push(format!("{column} = ${idx}"));
    }

    if placeholders.len() != assignments.len() {
        return Err(SiftError::validation(format!(
            "upsert into {} built {} insert value(s) but {} update assignment(s)",
            table,
            placeholders.len(),
            assignments.len()
        )));
    }

    let mut sql = format!(
        "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT ({}) DO UPDATE SET {}",
        table,
        columns.join(", "),
        placeholders.join(", "),
        conflict_columns.join(", "),
        assignments.join(", ")
    );
    if let Some(column) = returning {
        sql.push_str(" RETURNING ");
        sql.push_str(column);
    }
    Ok((sql, params))
}

fn update_sql(
    table: &str,
    set: &FieldMap,
    predicates: &[Vec<Predicate>],
) -> SiftResult<(String, ParamList)> {
    if set.is_empty() {
        return Err(SiftError::validation(format!(
            "update of {table} requires at least one assignment"
        )));
    }

    let mut params = ParamList::new();
    let mut assignments = Vec::with_capacity(set.len());
    for (column, value) in set {
        let idx = params.push(value.clone());
        assignments.push(format!("{column} = ${idx}"));
    }

    let mut sql = format!("UPDATE {} SET {}", table, assignments.join(", "));
    let clauses = compile_predicates(predicates, &mut params)?;
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    Ok((sql, params))
}

fn delete_sql(table: &str, predicates: &[Vec<Predicate>]) -> SiftResult<(String, ParamList)> {
    let mut params = ParamList::new();
    let mut sql = format!("DELETE FROM {table}");
    let clauses = compile_predicates(predicates, &mut params)?;
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    Ok((sql, params))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site_values() -> FieldMap {
        FieldMap::from([
            ("url".to_string(), Value::from("https://example.com")),
            ("id".to_string(), Value::Int(1)),
            ("image".to_string(), Value::Null),
        ])
    }

    #[test]
    fn insert_orders_columns_lexicographically() {
        let (sql, params) = insert_sql("site", &site_values(), None).unwrap();
        assert_eq!(sql, "INSERT INTO site (id, image, url) VALUES ($1, $2, $3)");
        assert_eq!(
            params.values(),
            &[
                Value::Int(1),
                Value::Null,
                Value::Text("https://example.com".into()),
            ]
        );
    }

    #[test]
    fn insert_appends_returning() {
        let (sql, _) = insert_sql("site", &site_values(), Some("id")).unwrap();
        assert_eq!(
            sql,
            "INSERT INTO site (id, image, url) VALUES ($1, $2, $3) RETURNING id"
        );
    }

    #[test]
    fn insert_rejects_empty_map() {
        let err = insert_sql("site", &FieldMap::new(), None).unwrap_err();
        assert!(matches!(err, SiftError::Validation(_)));
    }

    #[test]
    fn multi_insert_numbers_fields_once() {
        let sql = multi_insert_sql("site", &["url", "image"], None);
        assert_eq!(sql, "INSERT INTO site (url, image) VALUES ($1, $2)");

        let sql = multi_insert_sql("site", &["url"], Some("id"));
        assert_eq!(sql, "INSERT INTO site (url) VALUES ($1) RETURNING id");
    }

    #[test]
    fn row_shape_mismatch_is_reported_with_index() {
        let rows = vec![
            vec![Value::from("a"), Value::from("b")],
            vec![Value::from("a")],
        ];
        let err = check_row_shapes(&["url", "image"], &rows).unwrap_err();
        assert!(err.to_string().contains("row 1"));
    }

    #[test]
    fn upsert_pairs_insert_and_update_halves() {
        let values = FieldMap::from([
            ("name".to_string(), Value::from("Greg")),
            ("phones".to_string(), Value::from("123")),
        ]);
        let (sql, params) = upsert_sql("contact", &["ref"], &values, &values, None).unwrap();
        assert_eq!(
            sql,
            "INSERT INTO contact (name, phones) VALUES ($1, $2) \
             ON CONFLICT (ref) DO UPDATE SET name = $3, phones = $4"
        );
        assert_eq!(params.len(), 4);
    }

    #[test]
    fn upsert_mismatched_halves_fail_fast() {
        let insert_half = FieldMap::from([
            ("name".to_string(), Value::from("Greg")),
            ("phones".to_string(), Value::from("123")),
        ]);
        let update_half = FieldMap::from([("name".to_string(), Value::from("Greg"))]);
        let err = upsert_sql("contact", &["ref"], &insert_half, &update_half, None).unwrap_err();
        assert!(matches!(err, SiftError::Validation(_)));
    }

    #[test]
    fn update_continues_numbering_into_where() {
        let set = FieldMap::from([("image".to_string(), Value::from("new.png"))]);
        let predicates = vec![vec![Predicate::equals("site.id", 1)]];
        let (sql, params) = update_sql("site", &set, &predicates).unwrap();
        assert_eq!(sql, "UPDATE site SET image = $1 WHERE (site.id = $2)");
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn update_without_predicates_is_unconditional() {
        let set = FieldMap::from([("image".to_string(), Value::Null)]);
        let (sql, _) = update_sql("site", &set, &[]).unwrap();
        assert_eq!(sql, "UPDATE site SET image = $1");
    }

    #[test]
    fn update_requires_assignments() {
        let err = update_sql("site", &FieldMap::new(), &[]).unwrap_err();
        assert!(matches!(err, SiftError::Validation(_)));
    }

    #[test]
    fn delete_renders_predicate_groups() {
        let predicates = vec![vec![Predicate::in_list("site.id", [1, 2])]];
        let (sql, params) = delete_sql("site", &predicates).unwrap();
        assert_eq!(sql, "DELETE FROM site WHERE (site.id IN ($1, $2))");
        assert_eq!(params.len(), 2);

        let (sql, _) = delete_sql("site", &[]).unwrap();
        assert_eq!(sql, "DELETE FROM site");
    }
}
