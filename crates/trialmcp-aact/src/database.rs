use std::fmt;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde_json::{Map, Value};
use sqlx::postgres::{PgConnectOptions, PgConnection, PgRow};
use sqlx::{Column, Connection, Row as _, TypeInfo, ValueRef};
use tokio::runtime::{Builder, Runtime};
use tracing::{debug, error, warn};

use trialmcp_core::{Row, SqlBackend, TrialError, TrialResult};

/// Public AACT instance hosted by CTTI.
pub const DEFAULT_HOST: &str = "aact-db.ctti-clinicaltrials.org";
pub const DEFAULT_PORT: u16 = 5432;
pub const DEFAULT_DATABASE: &str = "aact";
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Where and as whom to connect.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionSettings {
    pub host: String,
    pub port: u16,
    pub user: Option<String>,
    pub password: Option<String>,
    pub database: String,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.into(),
            port: DEFAULT_PORT,
            user: None,
            password: None,
            database: DEFAULT_DATABASE.into(),
        }
    }
}

impl ConnectionSettings {
    /// Connect options for a read-only session.
    pub fn connect_options(&self) -> PgConnectOptions {
        let mut options = PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .database(&self.database)
            .application_name("trialmcp")
            .options([("default_transaction_read_only", "on")]);
        if let Some(user) = &self.user {
            options = options.username(user);
        }
        if let Some(password) = &self.password {
            options = options.password(password);
        }
        options
    }
}

// Password stays out of logs.
impl fmt::Debug for ConnectionSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("database", &self.database)
            .finish_non_exhaustive()
    }
}

/// Read-only access to the AACT Postgres database.
///
/// Every call opens its own connection and closes it before returning, on success and on
/// failure alike. There is no pooling.
#[derive(Debug)]
pub struct AactDatabase {
    settings: ConnectionSettings,
    connect_timeout: Duration,
    runtime: Runtime,
}

impl AactDatabase {
    pub fn new(settings: ConnectionSettings) -> TrialResult<Self> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| TrialError::Config(format!("cannot start database runtime: {e}")))?;
        Ok(Self {
            settings,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            runtime,
        })
    }

    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    pub fn settings(&self) -> &ConnectionSettings {
        &self.settings
    }

    async fn connect(&self) -> TrialResult<PgConnection> {
        let options = self.settings.connect_options();
        match tokio::time::timeout(self.connect_timeout, PgConnection::connect_with(&options)).await
        {
            Ok(Ok(conn)) => Ok(conn),
            Ok(Err(e)) => Err(TrialError::Query(e.to_string())),
            Err(_) => Err(TrialError::Query(format!(
                "connection to {}:{} timed out after {:?}",
                self.settings.host, self.settings.port, self.connect_timeout
            ))),
        }
    }

    async fn run(&self, sql: &str, params: &[&str]) -> TrialResult<Vec<Row>> {
        let mut conn = self.connect().await?;

        let mut query = sqlx::query(sql);
        for param in params {
            query = query.bind(*param);
        }
        let fetched = query.fetch_all(&mut conn).await;

        if let Err(e) = conn.close().await {
            warn!("closing connection: {e}");
        }

        let rows = fetched.map_err(|e| TrialError::Query(e.to_string()))?;
        Ok(rows.iter().map(to_record).collect())
    }
}

impl SqlBackend for AactDatabase {
    fn execute(&self, sql: &str, params: &[&str]) -> TrialResult<Vec<Row>> {
        debug!("executing on {}/{}: {sql}", self.settings.host, self.settings.database);
        match self.runtime.block_on(self.run(sql, params)) {
            Ok(rows) => {
                debug!("fetched {} rows", rows.len());
                Ok(rows)
            }
            Err(e) => {
                error!("query failed: {e}");
                Err(e)
            }
        }
    }
}

fn to_record(row: &PgRow) -> Row {
    let mut record = Map::with_capacity(row.columns().len());
    for column in row.columns() {
        record.insert(column.name().to_string(), to_json(row, column.ordinal()));
    }
    record
}

/// Decode one column by its Postgres type. Types without a JSON mapping are read as text.
fn to_json(row: &PgRow, idx: usize) -> Value {
    let type_name = match row.try_get_raw(idx) {
        Ok(raw) if raw.is_null() => return Value::Null,
        Ok(raw) => raw.type_info().name().to_string(),
        Err(_) => return Value::Null,
    };

    let decoded = match type_name.as_str() {
        "BOOL" => row.try_get::<bool, _>(idx).map(Value::from),
        "INT2" => row.try_get::<i16, _>(idx).map(Value::from),
        "INT4" => row.try_get::<i32, _>(idx).map(Value::from),
        "INT8" => row.try_get::<i64, _>(idx).map(Value::from),
        "FLOAT4" => row.try_get::<f32, _>(idx).map(Value::from),
        "FLOAT8" => row.try_get::<f64, _>(idx).map(Value::from),
        "JSON" | "JSONB" => row.try_get::<Value, _>(idx),
        "DATE" => row
            .try_get::<NaiveDate, _>(idx)
            .map(|d| Value::String(d.to_string())),
        "TIME" => row
            .try_get::<NaiveTime, _>(idx)
            .map(|t| Value::String(t.to_string())),
        "TIMESTAMP" => row
            .try_get::<NaiveDateTime, _>(idx)
            .map(|t| Value::String(t.to_string())),
        "TIMESTAMPTZ" => row
            .try_get::<DateTime<Utc>, _>(idx)
            .map(|t| Value::String(t.to_rfc3339())),
        "TEXT[]" | "VARCHAR[]" => row.try_get::<Vec<String>, _>(idx).map(Value::from),
        "INT4[]" => row.try_get::<Vec<i32>, _>(idx).map(Value::from),
        _ => row.try_get_unchecked::<String, _>(idx).map(Value::String),
    };

    decoded.unwrap_or_else(|e| {
        debug!("column {idx} of type {type_name} not decodable: {e}");
        Value::String(format!("<{}>", type_name.to_lowercase()))
    })
}
