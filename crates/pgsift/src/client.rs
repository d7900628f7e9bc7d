//! Execution seam between the builders and the database.
//!
//! [`GenericClient`] abstracts statement execution so the select and session
//! layers never talk to the driver directly. The prepared-statement surface
//! goes through an associated type, which keeps the seam implementable by
//! test doubles that have no real connection behind them.

use crate::error::{SiftError, SiftResult};
use tokio_postgres::types::ToSql;
use tokio_postgres::{Row, Statement};

/// Statement execution against a PostgreSQL backend.
pub trait GenericClient: Send + Sync {
    /// Handle to a prepared statement on this client.
    type Prepared: Send + Sync;

    /// Execute a query and return all rows.
    fn query(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> impl std::future::Future<Output = SiftResult<Vec<Row>>> + Send;

    /// Execute a query and return the first row, if any.
    fn query_opt(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> impl std::future::Future<Output = SiftResult<Option<Row>>> + Send {
        async move { Ok(self.query(sql, params).await?.into_iter().next()) }
    }

    /// Execute a query and return the first row.
    ///
    /// Zero rows is [`SiftError::NotFound`], distinct from driver failures.
    fn query_one(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> impl std::future::Future<Output = SiftResult<Row>> + Send {
        async move {
            self.query(sql, params)
                .await?
                .into_iter()
                .next()
                .ok_or_else(|| SiftError::not_found("expected one row, got none"))
        }
    }

    /// Execute a statement and return the number of affected rows.
    fn execute(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> impl std::future::Future<Output = SiftResult<u64>> + Send;

    /// Prepare a statement for repeated execution on this client.
    fn prepare(
        &self,
        sql: &str,
    ) -> impl std::future::Future<Output = SiftResult<Self::Prepared>> + Send;

    /// Execute a prepared statement and return all rows.
    fn query_prepared(
        &self,
        stmt: &Self::Prepared,
        params: &[&(dyn ToSql + Sync)],
    ) -> impl std::future::Future<Output = SiftResult<Vec<Row>>> + Send;

    /// Execute a prepared statement and return the first row.
    ///
    /// Semantics match [`GenericClient::query_one`].
    fn query_one_prepared(
        &self,
        stmt: &Self::Prepared,
        params: &[&(dyn ToSql + Sync)],
    ) -> impl std::future::Future<Output = SiftResult<Row>> + Send {
        async move {
            self.query_prepared(stmt, params)
                .await?
                .into_iter()
                .next()
                .ok_or_else(|| SiftError::not_found("expected one row, got none"))
        }
    }

    /// Execute a prepared statement and return affected row count.
    fn execute_prepared(
        &self,
        stmt: &Self::Prepared,
        params: &[&(dyn ToSql + Sync)],
    ) -> impl std::future::Future<Output = SiftResult<u64>> + Send;
}

impl GenericClient for tokio_postgres::Client {
    type Prepared = Statement;

    async fn query(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> SiftResult<Vec<Row>> {
        tokio_postgres::Client::query(self, sql, params)
            .await
            .map_err(SiftError::from_db_error)
    }

    async fn execute(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> SiftResult<u64> {
        tokio_postgres::Client::execute(self, sql, params)
            .await
            .map_err(SiftError::from_db_error)
    }

    async fn prepare(&self, sql: &str) -> SiftResult<Statement> {
        tokio_postgres::Client::prepare(self, sql)
            .await
            .map_err(SiftError::from_db_error)
    }

    async fn query_prepared(
        &self,
        stmt: &Statement,
        params: &[&(dyn ToSql + Sync)],
    ) -> SiftResult<Vec<Row>> {
        tokio_postgres::Client::query(self, stmt, params)
            .await
            .map_err(SiftError::from_db_error)
    }

    async fn execute_prepared(
        &self,
        stmt: &Statement,
        params: &[&(dyn ToSql + Sync)],
    ) -> SiftResult<u64> {
        tokio_postgres::Client::execute(self, stmt, params)
            .await
            .map_err(SiftError::from_db_error)
    }
}

/// A client that owns a live transaction and can end it.
pub trait TxClient: GenericClient {
    /// Commit the transaction.
    fn commit(&mut self) -> impl std::future::Future<Output = SiftResult<()>> + Send;

    /// Roll the transaction back.
    fn rollback(&mut self) -> impl std::future::Future<Output = SiftResult<()>> + Send;
}

/// A begun `tokio_postgres` transaction.
///
/// The inner transaction is held in an `Option` so commit and rollback can
/// consume it through `&mut self`; once ended, any further use reports a
/// terminal-transaction error instead of touching the connection.
pub struct PgTransaction<'a> {
    inner: Option<tokio_postgres::Transaction<'a>>,
}

impl<'a> PgTransaction<'a> {
    /// Begin a transaction on the given client.
    pub async fn begin(client: &'a mut tokio_postgres::Client) -> SiftResult<PgTransaction<'a>> {
        let tx = client
            .transaction()
            .await
            .map_err(SiftError::from_db_error)?;
        Ok(Self { inner: Some(tx) })
    }

    fn tx(&self) -> SiftResult<&tokio_postgres::Transaction<'a>> {
        self.inner
            .as_ref()
            .ok_or(SiftError::TransactionState("ended"))
    }
}

impl GenericClient for PgTransaction<'_> {
    type Prepared = Statement;

    async fn query(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> SiftResult<Vec<Row>> {
        self.tx()?
            .query(sql, params)
            .await
            .map_err(SiftError::from_db_error)
    }

    async fn execute(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> SiftResult<u64> {
        self.tx()?
            .execute(sql, params)
            .await
            .map_err(SiftError::from_db_error)
    }

    async fn prepare(&self, sql: &str) -> SiftResult<Statement> {
        self.tx()?
            .prepare(sql)
            .await
            .map_err(SiftError::from_db_error)
    }

    async fn query_prepared(
        &self,
        stmt: &Statement,
        params: &[&(dyn ToSql + Sync)],
    ) -> SiftResult<Vec<Row>> {
        self.tx()?
            .query(stmt, params)
            .await
            .map_err(SiftError::from_db_error)
    }

    async fn execute_prepared(
        &self,
        stmt: &Statement,
        params: &[&(dyn ToSql + Sync)],
    ) -> SiftResult<u64> {
        self.tx()?
            .execute(stmt, params)
            .await
            .map_err(SiftError::from_db_error)
    }
}

impl TxClient for PgTransaction<'_> {
    async fn commit(&mut self) -> SiftResult<()> {
        match self.inner.take() {
            Some(tx) => tx.commit().await.map_err(SiftError::from_db_error),
            None => Err(SiftError::TransactionState("ended")),
        }
    }

    async fn rollback(&mut self) -> SiftResult<()> {
        match self.inner.take() {
            Some(tx) => tx.rollback().await.map_err(SiftError::from_db_error),
            None => Err(SiftError::TransactionState("ended")),
        }
    }
}
