//! Connection configuration.

use crate::error::{SiftError, SiftResult};
use tokio_postgres::NoTls;

/// PostgreSQL connection settings.
#[derive(Debug, Clone)]
pub struct PgConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub dbname: String,
    /// Extra libpq-style options appended verbatim, e.g. `sslmode=disable`.
    pub options: Option<String>,
}

impl PgConfig {
    /// Create a configuration with the default port and no password.
    pub fn new(
        host: impl Into<String>,
        user: impl Into<String>,
        dbname: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port: 5432,
            user: user.into(),
            password: String::new(),
            dbname: dbname.into(),
            options: None,
        }
    }

    /// Set the port.
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the password.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    /// Set extra connection options.
    pub fn options(mut self, options: impl Into<String>) -> Self {
        self.options = Some(options.into());
        self
    }

    /// Read the configuration from `PG_HOST`, `PG_PORT`, `PG_USER`, `PG_PWD`,
    /// `PG_DB_NAME` and `PG_OPTIONS`.
    ///
    /// Host, user and database name are required; the port defaults to 5432
    /// and the password to empty.
    pub fn from_env() -> SiftResult<Self> {
        let required = |name: &str| {
            std::env::var(name).map_err(|_| SiftError::Connection(format!("{name} is not set")))
        };

        let mut config = Self::new(
            required("PG_HOST")?,
            required("PG_USER")?,
            required("PG_DB_NAME")?,
        );
        if let Ok(port) = std::env::var("PG_PORT") {
            config.port = port
                .parse()
                .map_err(|_| SiftError::Connection(format!("invalid PG_PORT: {port}")))?;
        }
        if let Ok(password) = std::env::var("PG_PWD") {
            config.password = password;
        }
        if let Ok(options) = std::env::var("PG_OPTIONS") {
            config.options = Some(options);
        }
        Ok(config)
    }

    /// Assemble the libpq-style connection string.
    pub fn connection_string(&self) -> String {
        let mut s = format!(
            "host={} port={} user={} dbname={}",
            self.host, self.port, self.user, self.dbname
        );
        if !self.password.is_empty() {
            s.push_str(&format!(" password={}", self.password));
        }
        if let Some(options) = &self.options {
            s.push(' ');
            s.push_str(options);
        }
        s
    }
}

/// Open a connection and spawn its driver task.
///
/// The returned client is ready for queries; the connection future runs in
/// the background until the client is dropped.
pub async fn connect(config: &PgConfig) -> SiftResult<tokio_postgres::Client> {
    let (client, connection) = tokio_postgres::connect(&config.connection_string(), NoTls)
        .await
        .map_err(SiftError::from_db_error)?;

    tokio::spawn(async move {
        if let Err(e) = connection.await {
            tracing::error!(target: "pgsift", error = %e, "connection task ended");
        }
    });

    Ok(client)
}
