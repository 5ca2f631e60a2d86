//! PostgreSQL connection implementation

use crate::prepared::PgPrepared;
use crate::tls::{SslMode, build_connector};
use crate::transaction::PostgresTransaction;
use crate::types::{pg_type, postgres_to_value, values_to_params};
use async_trait::async_trait;
use bulkql_core::{
    BulkqlError, ColumnMeta, Connection, ConnectionConfig, DEFAULT_POSTGRES_PORT, Dialect,
    ParamBinding, PreparedStatement, QueryResult, Result, Row, StatementResult, StatementScope,
    Transaction, Value,
};
use postgres_types::{ToSql, Type};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio_postgres::tls::{MakeTlsConnect, TlsConnect};
use tokio_postgres::{Client, NoTls, Row as PgRow, Socket, Statement};

pub(crate) fn format_postgres_error(error: &tokio_postgres::Error) -> String {
    let Some(db_error) = error.as_db_error() else {
        return error.to_string();
    };

    let code = db_error.code();
    let mut message = db_error.message().to_string();

    if let Some(detail) = db_error.detail().filter(|d| !d.trim().is_empty()) {
        message.push_str(&format!(" (detail: {})", detail));
    }
    if let Some(hint) = db_error.hint().filter(|h| !h.trim().is_empty()) {
        message.push_str(&format!(" (hint: {})", hint));
    }
    if let Some(column) = db_error.column().filter(|c| !c.trim().is_empty()) {
        message.push_str(&format!(" (column: {})", column));
    }

    match code.code() {
        "23505" => format!("duplicate value violates unique constraint: {}", message),
        "23503" => format!("foreign key violation: {}", message),
        "23502" => format!("null value violates not-null constraint: {}", message),
        "22007" => format!("invalid datetime format: {}", message),
        "22P02" => format!("invalid input syntax: {}", message),
        other => format!("{} (code: {})", message, other),
    }
}

/// Map a client error, treating a dropped socket as a connection failure
pub(crate) fn pg_error(context: &str, error: tokio_postgres::Error) -> BulkqlError {
    if error.is_closed() {
        return BulkqlError::Connection(format!("{}: {}", context, error));
    }
    if error.as_db_error().is_none() {
        return BulkqlError::Connection(format!("{}: {}", context, error));
    }
    BulkqlError::Query(format!("{}: {}", context, format_postgres_error(&error)))
}

/// One client session shared by a connection, its transactions and its
/// prepared statements
#[derive(Clone)]
pub(crate) struct PgSession {
    client: Arc<Mutex<Client>>,
    closed: Arc<AtomicBool>,
}

impl PgSession {
    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(BulkqlError::Connection("Connection is closed".into()));
        }
        Ok(())
    }

    pub(crate) async fn simple(&self, sql: &str) -> Result<()> {
        self.ensure_open()?;
        let client = self.client.lock().await;
        client
            .batch_execute(sql)
            .await
            .map_err(|e| pg_error("Failed to execute statement", e))
    }

    pub(crate) async fn execute(&self, sql: &str, params: &[Value]) -> Result<StatementResult> {
        self.ensure_open()?;
        let client = self.client.lock().await;
        let statement = client
            .prepare(sql)
            .await
            .map_err(|e| pg_error("Failed to prepare statement", e))?;

        let pg_params = values_to_params(params, statement.params())?;
        let param_refs = pg_params
            .iter()
            .map(|p| p as &(dyn ToSql + Sync))
            .collect::<Vec<_>>();

        let affected_rows = client
            .execute(&statement, &param_refs)
            .await
            .map_err(|e| pg_error("Failed to execute statement", e))?;

        tracing::debug!(affected_rows, "statement executed");
        Ok(StatementResult { affected_rows })
    }

    pub(crate) async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        self.ensure_open()?;
        let client = self.client.lock().await;
        let statement = client
            .prepare(sql)
            .await
            .map_err(|e| pg_error("Failed to prepare query", e))?;
        drop(client);

        self.query_statement(&statement, params).await
    }

    pub(crate) async fn prepare_typed(&self, sql: &str, types: &[Type]) -> Result<Statement> {
        self.ensure_open()?;
        let client = self.client.lock().await;
        client
            .prepare_typed(sql, types)
            .await
            .map_err(|e| pg_error("Failed to prepare statement", e))
    }

    /// Run a prepared statement, binding values against its parameter types
    pub(crate) async fn query_statement(
        &self,
        statement: &Statement,
        params: &[Value],
    ) -> Result<QueryResult> {
        self.ensure_open()?;
        let start_time = Instant::now();

        let pg_params = values_to_params(params, statement.params())?;
        let param_refs = pg_params
            .iter()
            .map(|p| p as &(dyn ToSql + Sync))
            .collect::<Vec<_>>();

        let client = self.client.lock().await;
        let pg_rows = client
            .query(statement, &param_refs)
            .await
            .map_err(|e| pg_error("Failed to execute query", e))?;
        drop(client);

        let result = rows_to_result(statement, &pg_rows, start_time.elapsed())?;
        tracing::debug!(
            row_count = result.rows.len(),
            execution_time_ms = result.execution_time_ms,
            "query executed"
        );
        Ok(result)
    }

    pub(crate) async fn prepare_statement(
        &self,
        sql: &str,
        bindings: &[ParamBinding],
    ) -> Result<Box<dyn PreparedStatement>> {
        let types = bindings
            .iter()
            .map(|binding| pg_type(binding.sql_type))
            .collect::<Vec<_>>();
        let statement = self.prepare_typed(sql, &types).await?;
        tracing::debug!(params = types.len(), "statement prepared");
        Ok(Box::new(PgPrepared::new(self.clone(), statement)))
    }
}

fn rows_to_result(
    statement: &Statement,
    pg_rows: &[PgRow],
    elapsed: Duration,
) -> Result<QueryResult> {
    // Column metadata comes from the statement so empty result sets keep it
    let columns = statement
        .columns()
        .iter()
        .enumerate()
        .map(|(ordinal, col)| ColumnMeta {
            name: col.name().to_string(),
            data_type: col.type_().name().to_string(),
            ordinal,
        })
        .collect::<Vec<_>>();
    let column_names = columns.iter().map(|c| c.name.clone()).collect::<Vec<_>>();

    let rows = pg_rows
        .iter()
        .map(|pg_row| {
            let values = (0..columns.len())
                .map(|idx| postgres_to_value(pg_row, idx))
                .collect::<Result<Vec<_>>>()?;
            Ok(Row::new(column_names.clone(), values))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(QueryResult {
        affected_rows: rows.len() as u64,
        columns,
        rows,
        execution_time_ms: elapsed.as_millis() as u64,
    })
}

async fn spawn_client<T>(config: &tokio_postgres::Config, tls: T) -> Result<PgSession>
where
    T: MakeTlsConnect<Socket> + Send + 'static,
    T::Stream: Send + 'static,
    T::TlsConnect: Send,
    <T::TlsConnect as TlsConnect<Socket>>::Future: Send,
{
    let (client, connection) = config
        .connect(tls)
        .await
        .map_err(|e| BulkqlError::Connection(format!("Failed to connect to PostgreSQL: {}", e)))?;

    let closed = Arc::new(AtomicBool::new(false));
    let closed_flag = closed.clone();
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            tracing::error!(error = %e, "PostgreSQL connection error");
        }
        closed_flag.store(true, Ordering::Release);
    });

    Ok(PgSession {
        client: Arc::new(Mutex::new(client)),
        closed,
    })
}

/// PostgreSQL connection wrapper
pub struct PostgresConnection {
    session: PgSession,
    database: String,
}

impl PostgresConnection {
    /// Connect to a PostgreSQL database
    #[tracing::instrument(skip(password, ca_cert))]
    #[allow(clippy::too_many_arguments)]
    pub async fn connect(
        host: &str,
        port: u16,
        database: &str,
        user: Option<&str>,
        password: Option<&str>,
        ssl_mode: SslMode,
        ca_cert: Option<&Path>,
        connect_timeout: Option<Duration>,
    ) -> Result<Self> {
        tracing::info!("connecting to PostgreSQL database");

        let mut config = tokio_postgres::Config::new();
        config.host(host).port(port).dbname(database);
        if let Some(u) = user {
            config.user(u);
        }
        if let Some(p) = password {
            config.password(p);
        }
        if let Some(timeout) = connect_timeout {
            config.connect_timeout(timeout);
        }
        config.ssl_mode(ssl_mode.to_postgres());

        let session = if ssl_mode.uses_tls() {
            let tls = build_connector(ssl_mode, ca_cert)
                .map_err(|e| BulkqlError::Connection(e.to_string()))?;
            spawn_client(&config, tls).await?
        } else {
            spawn_client(&config, NoTls).await?
        };

        tracing::info!("PostgreSQL connection established");
        Ok(Self {
            session,
            database: database.to_string(),
        })
    }

    /// Create connection from config
    pub async fn from_config(config: &ConnectionConfig) -> Result<Self> {
        let host = if config.host.is_empty() {
            "localhost"
        } else {
            config.host.as_str()
        };
        let port = if config.port > 0 {
            config.port
        } else {
            DEFAULT_POSTGRES_PORT
        };
        let ssl_mode = config
            .get_param("sslmode")
            .unwrap_or("prefer")
            .parse::<SslMode>()
            .map_err(|e| BulkqlError::Configuration(e.to_string()))?;

        Self::connect(
            host,
            port,
            config.database.as_deref().unwrap_or("postgres"),
            config.username.as_deref(),
            config.password.as_deref(),
            ssl_mode,
            config.get_param("sslrootcert").map(Path::new),
            config.get_u64("connect_timeout_ms").map(Duration::from_millis),
        )
        .await
    }
}

#[async_trait]
impl StatementScope for PostgresConnection {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    #[tracing::instrument(skip(self, sql, params), fields(sql_preview = %sql.chars().take(100).collect::<String>()))]
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<StatementResult> {
        self.session.execute(sql, params).await
    }

    #[tracing::instrument(skip(self, sql, params), fields(sql_preview = %sql.chars().take(100).collect::<String>()))]
    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        self.session.query(sql, params).await
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
impl Connection for PostgresConnection {
    fn driver_name(&self) -> &str {
        "postgresql"
    }

    async fn begin_transaction(&self) -> Result<Box<dyn Transaction>> {
        self.session.simple("BEGIN").await?;
        tracing::debug!("PostgreSQL transaction begun");
        Ok(Box::new(PostgresTransaction::new(self.session.clone())))
    }

    async fn close(&self) -> Result<()> {
        tracing::info!(database = %self.database, "closing PostgreSQL connection");
        // The connection task ends once every client handle is dropped
        self.session.closed.store(true, Ordering::Release);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.session.is_closed()
    }
}

impl std::fmt::Debug for PostgresConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresConnection")
            .field("database", &self.database)
            .field("closed", &self.session.is_closed())
            .finish()
    }
}
