//! Connection settings read from a consumer configuration block.

use std::fmt;

use geosink_core::ConfigDict;

use crate::PostgisError;

/// Configuration keys understood by the PostGIS consumer.
pub mod keys {
    /// Consumer name.
    pub const NAME: &str = "name";
    /// Database host.
    pub const HOST: &str = "host";
    /// Database name.
    pub const DATABASE: &str = "database";
    /// Login role.
    pub const USER: &str = "user";
    /// Login password.
    pub const PASSWORD: &str = "password";
    /// Database port.
    pub const PORT: &str = "port";
    /// Upper bound on pooled connections.
    pub const MAX_CONNECTIONS: &str = "max_connections";
    /// Default coordinate reference id for layers.
    pub const SRID: &str = "srid";
    /// Layer list.
    pub const LAYERS: &str = "layers";
}

/// Port used when the block does not set one.
pub const DEFAULT_PORT: u16 = 5432;
/// Pool size used when the block does not set one.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 100;
/// Layer SRID used when neither the block nor the layer sets one.
pub const DEFAULT_SRID: u64 = 3857;
/// `application_name` reported to the server.
pub const APPLICATION_NAME: &str = "geosink";

/// Everything needed to open a connection pool.
///
/// `Debug` output redacts the password.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionParams {
    /// Database host.
    pub host: String,
    /// Database name.
    pub database: String,
    /// Login role.
    pub user: String,
    /// Login password.
    pub password: String,
    /// Database port.
    pub port: u16,
    /// Upper bound on pooled connections.
    pub max_connections: u32,
    /// Default coordinate reference id for layers.
    pub srid: u64,
    /// `application_name` reported to the server.
    pub application_name: String,
}

impl fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("host", &self.host)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("port", &self.port)
            .field("max_connections", &self.max_connections)
            .field("srid", &self.srid)
            .field("application_name", &self.application_name)
            .finish()
    }
}

impl ConnectionParams {
    /// Read connection settings from `config`.
    ///
    /// `host`, `database`, `user` and `password` are required strings;
    /// `port`, `max_connections` and `srid` are optional integers.
    ///
    /// # Examples
    ///
    /// ```
    /// use geosink_core::ConfigDict;
    /// use geosink_postgis::ConnectionParams;
    ///
    /// let config = ConfigDict::new()
    ///     .with("host", "localhost")
    ///     .with("database", "gis")
    ///     .with("user", "writer")
    ///     .with("password", "secret");
    /// let params = ConnectionParams::from_config(&config).unwrap();
    /// assert_eq!(params.port, 5432);
    /// assert!(!format!("{params:?}").contains("secret"));
    /// ```
    pub fn from_config(config: &ConfigDict) -> Result<Self, PostgisError> {
        Ok(Self {
            host: config.string(keys::HOST)?.to_owned(),
            database: config.string(keys::DATABASE)?.to_owned(),
            user: config.string(keys::USER)?.to_owned(),
            password: config.string(keys::PASSWORD)?.to_owned(),
            port: bounded(config, keys::PORT, DEFAULT_PORT)?,
            max_connections: bounded(config, keys::MAX_CONNECTIONS, DEFAULT_MAX_CONNECTIONS)?,
            srid: config.u64_or(keys::SRID, DEFAULT_SRID)?,
            application_name: APPLICATION_NAME.to_owned(),
        })
    }
}

/// Read an optional integer that must fit `T`.
fn bounded<T>(config: &ConfigDict, key: &'static str, default: T) -> Result<T, PostgisError>
where
    T: Into<u64> + TryFrom<u64>,
{
    let value = config.u64_or(key, default.into())?;
    T::try_from(value).map_err(|_| PostgisError::IntegerOutOfRange { key, value })
}
