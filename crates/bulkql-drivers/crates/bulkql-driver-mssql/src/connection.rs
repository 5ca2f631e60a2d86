//! MS SQL Server connection implementation using tiberius

use crate::prepared::MssqlPrepared;
use crate::transaction::MssqlTransaction;
use crate::types::{TiberiusParam, column_data_to_value, parameter_declarations, values_to_params};
use async_trait::async_trait;
use bulkql_core::{
    BulkqlError, ColumnMeta, Connection, ConnectionConfig, DEFAULT_MSSQL_CONNECT_TIMEOUT_MS,
    DEFAULT_MSSQL_PORT, DEFAULT_MSSQL_REQUEST_TIMEOUT_MS, Dialect, ParamBinding,
    PreparedStatement, QueryResult, Result, Row, SqlType, StatementResult, StatementScope,
    Transaction, Value,
};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tiberius::{AuthMethod, Client, Config, EncryptionLevel, Row as TiberiusRow, ToSql};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};

/// Values one `sp_execute` call can carry.
///
/// tiberius sends parameterised SQL through `sp_executesql`, whose statement
/// and declaration arguments take two of the 2100 RPC parameter slots.
pub const MSSQL_EXECUTE_PARAM_LIMIT: usize = 2098;

/// MS SQL Server connection errors
#[derive(Debug, thiserror::Error)]
pub enum MssqlConnectionError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Connection is closed")]
    ConnectionClosed,

    #[error("Tiberius error: {0}")]
    Tiberius(#[from] tiberius::error::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<MssqlConnectionError> for BulkqlError {
    fn from(err: MssqlConnectionError) -> Self {
        match err {
            MssqlConnectionError::ConnectionFailed(_)
            | MssqlConnectionError::ConnectionClosed
            | MssqlConnectionError::Io(_)
            | MssqlConnectionError::Tiberius(tiberius::error::Error::Io { .. }) => {
                BulkqlError::Connection(err.to_string())
            }
            MssqlConnectionError::Timeout(_) => BulkqlError::Timeout(err.to_string()),
            other => BulkqlError::Driver(other.to_string()),
        }
    }
}

type TdsClient = Client<Compat<TcpStream>>;

/// One TDS session, shared by a connection and the transactions and
/// prepared statements opened on it.
#[derive(Clone)]
pub(crate) struct MssqlSession {
    client: Arc<Mutex<TdsClient>>,
    closed: Arc<AtomicBool>,
    request_timeout: Duration,
}

impl MssqlSession {
    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> std::result::Result<(), MssqlConnectionError> {
        if self.is_closed() {
            return Err(MssqlConnectionError::ConnectionClosed);
        }
        Ok(())
    }

    /// Run `request` under the request timeout. A timed-out request leaves
    /// the TDS stream mid-response, so the session is marked closed.
    async fn timed<T, F>(&self, request: F) -> std::result::Result<T, MssqlConnectionError>
    where
        F: Future<Output = std::result::Result<T, MssqlConnectionError>>,
    {
        self.ensure_open()?;
        match tokio::time::timeout(self.request_timeout, request).await {
            Ok(result) => result,
            Err(_) => {
                self.closed.store(true, Ordering::SeqCst);
                tracing::error!(
                    timeout_ms = self.request_timeout.as_millis() as u64,
                    "request timed out, closing session"
                );
                Err(MssqlConnectionError::Timeout(self.request_timeout))
            }
        }
    }

    pub(crate) async fn execute(&self, sql: &str, params: &[TiberiusParam]) -> Result<u64> {
        let affected = self
            .timed(async {
                let mut client = self.client.lock().await;
                let refs: Vec<&dyn ToSql> = params.iter().map(|p| p as &dyn ToSql).collect();
                let result = client.execute(sql, &refs[..]).await?;
                Ok::<_, MssqlConnectionError>(result.rows_affected().iter().sum::<u64>())
            })
            .await?;
        Ok(affected)
    }

    /// Every result set the batch produced
    pub(crate) async fn query_all(
        &self,
        sql: &str,
        params: &[TiberiusParam],
    ) -> Result<Vec<QueryResult>> {
        let start = Instant::now();
        let sets = self
            .timed(async {
                let mut client = self.client.lock().await;
                let refs: Vec<&dyn ToSql> = params.iter().map(|p| p as &dyn ToSql).collect();
                let stream = client.query(sql, &refs[..]).await?;
                Ok::<_, MssqlConnectionError>(stream.into_results().await?)
            })
            .await?;

        let execution_time_ms = start.elapsed().as_millis() as u64;
        sets.into_iter()
            .map(|rows| rows_to_result(rows, execution_time_ms))
            .collect()
    }

    /// Send `sql` as a plain batch without parameters
    pub(crate) async fn simple(&self, sql: &str) -> Result<()> {
        self.timed(async {
            let mut client = self.client.lock().await;
            client.simple_query(sql).await?.into_results().await?;
            Ok::<_, MssqlConnectionError>(())
        })
        .await?;
        Ok(())
    }

    /// `sp_prepare` the statement and return its server handle
    pub(crate) async fn prepare_handle(&self, sql: &str, bindings: &[ParamBinding]) -> Result<i32> {
        let declarations = if bindings.is_empty() {
            TiberiusParam::Null(SqlType::NVarChar(None))
        } else {
            TiberiusParam::String(parameter_declarations(bindings))
        };
        let params = [declarations, TiberiusParam::String(sql.to_string())];

        let sets = self
            .query_all(
                "DECLARE @handle INT; EXEC sp_prepare @handle OUTPUT, @P1, @P2; SELECT @handle AS handle;",
                &params,
            )
            .await?;

        sets.iter()
            .rev()
            .flat_map(|set| set.rows.iter())
            .find_map(|row| row.get_by_name("handle").and_then(Value::as_i64))
            .map(|handle| handle as i32)
            .ok_or_else(|| BulkqlError::Driver("sp_prepare returned no handle".into()))
    }

    pub(crate) async fn query_values(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        let params = values_to_params(params)?;
        let mut sets = self.query_all(sql, &params).await?;
        Ok(if sets.is_empty() {
            QueryResult::empty()
        } else {
            sets.swap_remove(0)
        })
    }

    pub(crate) async fn execute_values(&self, sql: &str, params: &[Value]) -> Result<StatementResult> {
        let start = Instant::now();
        let params = values_to_params(params)?;
        let affected_rows = self.execute(sql, &params).await?;
        tracing::debug!(
            affected_rows,
            duration_ms = start.elapsed().as_millis() as u64,
            "execute completed"
        );
        Ok(StatementResult { affected_rows })
    }

    pub(crate) async fn prepare_statement(
        &self,
        sql: &str,
        bindings: &[ParamBinding],
    ) -> Result<Box<dyn PreparedStatement>> {
        let handle = self.prepare_handle(sql, bindings).await?;
        tracing::debug!(handle, params = bindings.len(), "statement prepared");
        Ok(Box::new(MssqlPrepared::new(self.clone(), handle, bindings.len())))
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

fn rows_to_result(rows: Vec<TiberiusRow>, execution_time_ms: u64) -> Result<QueryResult> {
    let columns: Vec<ColumnMeta> = rows
        .first()
        .map(|first| {
            first
                .columns()
                .iter()
                .enumerate()
                .map(|(ordinal, col)| ColumnMeta {
                    name: col.name().to_string(),
                    data_type: format!("{:?}", col.column_type()),
                    ordinal,
                })
                .collect()
        })
        .unwrap_or_default();
    let column_names: Vec<String> = columns.iter().map(|c| c.name.clone()).collect();

    let rows = rows
        .into_iter()
        .map(|row| {
            let values = row
                .into_iter()
                .map(column_data_to_value)
                .collect::<Result<Vec<_>>>()?;
            Ok(Row::new(column_names.clone(), values))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(QueryResult {
        columns,
        rows,
        affected_rows: 0,
        execution_time_ms,
    })
}

/// MS SQL Server connection using tiberius
pub struct MssqlConnection {
    session: MssqlSession,
    database: Option<String>,
}

impl MssqlConnection {
    /// Open a connection.
    ///
    /// `encrypt = false` negotiates an unencrypted session; `trust_cert`
    /// skips certificate validation when encryption is on.
    #[tracing::instrument(skip(password))]
    #[allow(clippy::too_many_arguments)]
    pub async fn connect(
        host: &str,
        port: u16,
        database: Option<&str>,
        username: Option<&str>,
        password: Option<&str>,
        encrypt: bool,
        trust_cert: bool,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> std::result::Result<Self, MssqlConnectionError> {
        tracing::debug!("connecting to MS SQL Server at {}:{}", host, port);

        let mut config = Config::new();
        config.host(host);
        config.port(port);

        if let Some(db) = database {
            config.database(db);
        }

        if trust_cert {
            config.trust_cert();
        }

        config.encryption(if encrypt {
            EncryptionLevel::Required
        } else {
            EncryptionLevel::NotSupported
        });

        match (username, password) {
            (Some(user), pass) => {
                config.authentication(AuthMethod::sql_server(user, pass.unwrap_or("")));
            }
            (None, _) => {
                return Err(MssqlConnectionError::AuthenticationFailed(
                    "SQL Server authentication requires a username".to_string(),
                ));
            }
        }

        let client = tokio::time::timeout(connect_timeout, async {
            let tcp = TcpStream::connect(config.get_addr())
                .await
                .map_err(|e| MssqlConnectionError::ConnectionFailed(e.to_string()))?;
            tcp.set_nodelay(true)?;

            Client::connect(config, tcp.compat_write())
                .await
                .map_err(|e| MssqlConnectionError::ConnectionFailed(e.to_string()))
        })
        .await
        .map_err(|_| MssqlConnectionError::Timeout(connect_timeout))??;

        tracing::debug!("successfully connected to MS SQL Server");

        Ok(Self {
            session: MssqlSession {
                client: Arc::new(Mutex::new(client)),
                closed: Arc::new(AtomicBool::new(false)),
                request_timeout,
            },
            database: database.map(String::from),
        })
    }

    /// Create connection from config
    pub async fn from_config(
        config: &ConnectionConfig,
    ) -> std::result::Result<Self, MssqlConnectionError> {
        let host = if config.host.is_empty() {
            "localhost"
        } else {
            config.host.as_str()
        };
        let port = if config.port > 0 {
            config.port
        } else {
            DEFAULT_MSSQL_PORT
        };
        let connect_timeout = Duration::from_millis(
            config
                .get_u64("connect_timeout_ms")
                .unwrap_or(DEFAULT_MSSQL_CONNECT_TIMEOUT_MS),
        );
        let request_timeout = Duration::from_millis(
            config
                .get_u64("request_timeout_ms")
                .unwrap_or(DEFAULT_MSSQL_REQUEST_TIMEOUT_MS),
        );

        Self::connect(
            host,
            port,
            config.database.as_deref(),
            config.username.as_deref(),
            config.password.as_deref(),
            config.get_bool("encrypt").unwrap_or(false),
            config.get_bool("trust_cert").unwrap_or(false),
            connect_timeout,
            request_timeout,
        )
        .await
    }
}

#[async_trait]
impl StatementScope for MssqlConnection {
    fn dialect(&self) -> Dialect {
        Dialect::Mssql
    }

    fn param_limit(&self) -> Option<usize> {
        Some(MSSQL_EXECUTE_PARAM_LIMIT)
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<StatementResult> {
        self.session.execute_values(sql, params).await
    }

    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        self.session.query_values(sql, params).await
    }

    async fn prepare(
        &self,
        sql: &str,
        bindings: &[ParamBinding],
    ) -> Result<Box<dyn PreparedStatement>> {
        self.session.prepare_statement(sql, bindings).await
    }
}

#[async_trait]
impl Connection for MssqlConnection {
    fn driver_name(&self) -> &str {
        "mssql"
    }

    async fn begin_transaction(&self) -> Result<Box<dyn Transaction>> {
        self.session.simple("BEGIN TRANSACTION").await?;
        tracing::debug!("transaction started");
        Ok(Box::new(MssqlTransaction::new(self.session.clone())))
    }

    async fn close(&self) -> Result<()> {
        self.session.close();
        tracing::debug!("MS SQL Server connection closed");
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.session.is_closed()
    }
}

impl std::fmt::Debug for MssqlConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MssqlConnection")
            .field("database", &self.database)
            .field("closed", &self.session.is_closed())
            .finish()
    }
}
