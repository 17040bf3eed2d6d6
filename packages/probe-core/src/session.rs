//! Client session with driver-style transaction handling.
//!
//! In autocommit mode every statement is its own transaction. With
//! autocommit off, a `BEGIN` (with the configured isolation level, if any)
//! is sent lazily before the first statement following connect, commit or
//! rollback, so a session always has an open transaction once it starts
//! doing work. After a failed statement the
//! server keeps that transaction aborted until `rollback`.

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::task::JoinHandle;
use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, Connection, NoTls, SimpleQueryMessage, Statement};

use crate::config::ProbeConfig;
use crate::error::{ProbeError, Result};
use crate::result::ResultSet;
use crate::tls;

/// Owned statement parameter, used where parameter sets are stored.
pub type Param = Box<dyn ToSql + Sync + Send>;

/// A server-side prepared statement and its text.
#[derive(Debug, Clone)]
pub struct Prepared {
    statement: Statement,
    sql: String,
}

impl Prepared {
    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn column_count(&self) -> usize {
        self.statement.columns().len()
    }
}

/// One client connection.
pub struct Session {
    client: Client,
    connection: JoinHandle<()>,
    autocommit: bool,
    in_transaction: bool,
    begin: String,
    target: String,
}

impl Session {
    /// Connects using `config`; TLS is negotiated per `config.ssl_mode`.
    pub async fn connect(config: &ProbeConfig) -> Result<Self> {
        let target = config.target();
        let pg = config.pg_config();

        let (client, connection) = match tls::connector(config)? {
            Some(connector) => {
                let (client, conn) = pg.connect(connector).await.map_err(|source| {
                    ProbeError::Connect {
                        target: target.clone(),
                        source,
                    }
                })?;
                (client, spawn_connection(conn, target.clone()))
            }
            None => {
                let (client, conn) =
                    pg.connect(NoTls)
                        .await
                        .map_err(|source| ProbeError::Connect {
                            target: target.clone(),
                            source,
                        })?;
                (client, spawn_connection(conn, target.clone()))
            }
        };

        tracing::debug!("Connected to {}", target);
        Ok(Self {
            client,
            connection,
            autocommit: true,
            in_transaction: false,
            begin: config.begin_statement(),
            target,
        })
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn is_autocommit(&self) -> bool {
        self.autocommit
    }

    /// True while an explicit transaction is open on the server.
    pub fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    pub fn is_closed(&self) -> bool {
        self.client.is_closed()
    }

    /// Switches transaction mode. Turning autocommit on commits any open
    /// transaction first.
    pub async fn set_autocommit(&mut self, autocommit: bool) -> Result<()> {
        if autocommit && self.in_transaction {
            self.commit().await?;
        }
        self.autocommit = autocommit;
        Ok(())
    }

    /// Runs `sql` over the simple query protocol.
    ///
    /// `sql` may hold several `;`-separated statements, including empty
    /// ones. Returns the total number of rows affected.
    pub async fn execute(&mut self, sql: &str) -> Result<u64> {
        self.begin_if_needed().await?;
        tracing::debug!("execute: {}", sql);
        let messages = self
            .client
            .simple_query(sql)
            .await
            .map_err(|e| ProbeError::sql(sql, &e))?;

        let mut affected = 0;
        for message in messages {
            if let SimpleQueryMessage::CommandComplete(rows) = message {
                affected += rows;
            }
        }
        Ok(affected)
    }

    /// Runs one parameterized statement and returns the rows affected.
    pub async fn execute_params(
        &mut self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<u64> {
        self.begin_if_needed().await?;
        tracing::debug!("execute_params: {}", sql);
        self.client
            .execute(sql, params)
            .await
            .map_err(|e| ProbeError::sql(sql, &e))
    }

    /// Runs a query and fetches its whole result set.
    pub async fn query(&mut self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> Result<ResultSet> {
        let prepared = self.prepare(sql).await?;
        self.query_prepared(&prepared, params).await
    }

    /// Runs a query expected to yield exactly one integer.
    pub async fn query_i64(&mut self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> Result<i64> {
        let rs = self.query(sql, params).await?;
        if rs.row_count() != 1 {
            return Err(ProbeError::assertion(format!(
                "`{}` returned {} rows, expected 1",
                sql,
                rs.row_count()
            )));
        }
        rs.int_at(0, 0)
    }

    /// Prepares `sql` on the server.
    pub async fn prepare(&mut self, sql: &str) -> Result<Prepared> {
        self.begin_if_needed().await?;
        let statement = self
            .client
            .prepare(sql)
            .await
            .map_err(|e| ProbeError::sql(sql, &e))?;
        Ok(Prepared {
            statement,
            sql: sql.to_string(),
        })
    }

    pub async fn execute_prepared(
        &mut self,
        prepared: &Prepared,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<u64> {
        self.begin_if_needed().await?;
        tracing::debug!("execute_prepared: {}", prepared.sql);
        self.client
            .execute(&prepared.statement, params)
            .await
            .map_err(|e| ProbeError::sql(&prepared.sql, &e))
    }

    pub async fn query_prepared(
        &mut self,
        prepared: &Prepared,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<ResultSet> {
        self.begin_if_needed().await?;
        tracing::debug!("query_prepared: {}", prepared.sql);
        let rows = self
            .client
            .query(&prepared.statement, params)
            .await
            .map_err(|e| ProbeError::sql(&prepared.sql, &e))?;
        ResultSet::from_rows(prepared.statement.columns(), &rows)
    }

    /// Executes `prepared` once per parameter set, in order.
    ///
    /// Returns the per-entry affected row counts. The first failing entry
    /// aborts the batch; its index is part of the error's statement text.
    pub async fn execute_batch(&mut self, prepared: &Prepared, batch: &[Vec<Param>]) -> Result<Vec<u64>> {
        let mut counts = Vec::with_capacity(batch.len());
        for (i, params) in batch.iter().enumerate() {
            let refs: Vec<&(dyn ToSql + Sync)> = params
                .iter()
                .map(|p| p.as_ref() as &(dyn ToSql + Sync))
                .collect();
            self.begin_if_needed().await?;
            let count = self
                .client
                .execute(&prepared.statement, &refs)
                .await
                .map_err(|e| ProbeError::sql(format!("{} [batch entry {}]", prepared.sql, i + 1), &e))?;
            counts.push(count);
        }
        tracing::debug!("execute_batch: {} entries of {}", counts.len(), prepared.sql);
        Ok(counts)
    }

    /// Commits the open transaction, if any.
    pub async fn commit(&mut self) -> Result<()> {
        if !self.in_transaction {
            return Ok(());
        }
        self.in_transaction = false;
        self.client
            .batch_execute("COMMIT")
            .await
            .map_err(|e| ProbeError::sql("COMMIT", &e))
    }

    /// Rolls back the open transaction, if any.
    pub async fn rollback(&mut self) -> Result<()> {
        if !self.in_transaction {
            return Ok(());
        }
        self.in_transaction = false;
        self.client
            .batch_execute("ROLLBACK")
            .await
            .map_err(|e| ProbeError::sql("ROLLBACK", &e))
    }

    /// Closes the connection and waits for its driver task to finish.
    pub async fn close(self) -> Result<()> {
        let Session {
            client,
            connection,
            target,
            ..
        } = self;
        drop(client);
        connection
            .await
            .map_err(|e| ProbeError::Task(format!("connection task for {}: {}", target, e)))?;
        tracing::debug!("Closed connection to {}", target);
        Ok(())
    }

    async fn begin_if_needed(&mut self) -> Result<()> {
        if self.autocommit || self.in_transaction {
            return Ok(());
        }
        self.client
            .batch_execute(&self.begin)
            .await
            .map_err(|e| ProbeError::sql(&self.begin, &e))?;
        self.in_transaction = true;
        Ok(())
    }
}

fn spawn_connection<S, T>(connection: Connection<S, T>, target: String) -> JoinHandle<()>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            tracing::error!("Connection to {} ended with error: {}", target, e);
        }
    })
}
