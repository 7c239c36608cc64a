//! MongoDB connection management with pool configuration and health checking

use bson::{doc, Document as BsonDocument};
use codeweb_common::{CodewebError, Result};
use mongodb::{options::ClientOptions, Client, Collection, Database};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument};

/// Connection pool configuration
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum number of connections in the pool (default: 10)
    pub max_pool_size: u32,
    /// Minimum number of connections in the pool (default: 1)
    pub min_pool_size: u32,
    /// Maximum time a connection can remain idle before being closed (default: 30s)
    pub max_idle_time: Duration,
    /// Server selection timeout (default: 5s)
    pub server_selection_timeout: Duration,
    /// Connection timeout (default: 5s)
    pub connect_timeout: Duration,
    /// Deadline for a single operation's network round trips (default: 5s)
    pub socket_timeout: Duration,
    /// Application name for server logs
    pub app_name: Option<String>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_pool_size: 10,
            min_pool_size: 1,
            max_idle_time: Duration::from_secs(30),
            server_selection_timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(5),
            socket_timeout: Duration::from_secs(5),
            app_name: Some("codeweb".to_string()),
        }
    }
}

impl PoolConfig {
    /// Copy the pool settings onto parsed driver options.
    ///
    /// Driver-level retries are switched off; failures surface to the caller.
    pub fn apply(&self, options: &mut ClientOptions) {
        options.max_pool_size = Some(self.max_pool_size);
        options.min_pool_size = Some(self.min_pool_size);
        options.max_idle_time = Some(self.max_idle_time);
        options.server_selection_timeout = Some(self.server_selection_timeout);
        options.connect_timeout = Some(self.connect_timeout);
        options.retry_reads = Some(false);
        options.retry_writes = Some(false);
        if let Some(app) = &self.app_name {
            options.app_name = Some(app.clone());
        }
    }
}

/// Pooled MongoDB connection shared by all requests.
///
/// Cloning is cheap; clones share the same pool and closed flag.
#[derive(Clone)]
pub struct Connection {
    client: Client,
    config: PoolConfig,
    closed: Arc<AtomicBool>,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("max_pool_size", &self.config.max_pool_size)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Connection {
    /// Connect with default pool settings
    pub async fn connect(url: &str) -> Result<Self> {
        Self::with_config(url, PoolConfig::default()).await
    }

    /// Connect with custom pool configuration.
    ///
    /// The server is pinged before returning, so an unreachable store fails
    /// here (within the server selection timeout) with a connection error.
    #[instrument(skip(url, config), fields(
        max_pool_size = config.max_pool_size,
        min_pool_size = config.min_pool_size
    ))]
    pub async fn with_config(url: &str, config: PoolConfig) -> Result<Self> {
        if url.is_empty() {
            return Err(CodewebError::Connection(
                "Connection string cannot be empty".to_string(),
            ));
        }

        let mut client_options = ClientOptions::parse(url)
            .await
            .map_err(|e| CodewebError::Connection(format!("Invalid connection string: {}", e)))?;
        config.apply(&mut client_options);

        let client = Client::with_options(client_options)
            .map_err(|e| CodewebError::Connection(format!("Failed to connect to MongoDB: {}", e)))?;

        let connection = Self {
            client,
            config,
            closed: Arc::new(AtomicBool::new(false)),
        };
        connection.ping().await?;

        info!("MongoDB connection established");
        Ok(connection)
    }

    /// Get a database handle
    pub fn database(&self, name: &str) -> Database {
        self.client.database(name)
    }

    /// Resolve a collection. No I/O happens here.
    pub fn get_collection(&self, database: &str, collection: &str) -> Collection<BsonDocument> {
        self.client.database(database).collection(collection)
    }

    /// Get a reference to the client
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Get the pool configuration this connection was built with
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Check that the server answers
    pub async fn ping(&self) -> Result<()> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await
            .map(|_| ())
            .map_err(|e| CodewebError::Connection(format!("Failed to connect to MongoDB: {}", e)))
    }

    /// Returns true once [`Connection::close`] has run
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Release every pooled connection. Calling it again is a no-op.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.client.clone().shutdown().await;
        info!("MongoDB connection closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_pool_config() {
        let config = PoolConfig::default();
        assert_eq!(config.max_pool_size, 10);
        assert_eq!(config.min_pool_size, 1);
        assert_eq!(config.max_idle_time, Duration::from_secs(30));
        assert_eq!(config.server_selection_timeout, Duration::from_secs(5));
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.socket_timeout, Duration::from_secs(5));
        assert_eq!(config.app_name, Some("codeweb".to_string()));
    }

    #[test]
    fn test_apply_pool_config() {
        let config = PoolConfig {
            max_pool_size: 50,
            min_pool_size: 5,
            max_idle_time: Duration::from_secs(300),
            app_name: None,
            ..PoolConfig::default()
        };
        let mut options = ClientOptions::default();
        config.apply(&mut options);

        assert_eq!(options.max_pool_size, Some(50));
        assert_eq!(options.min_pool_size, Some(5));
        assert_eq!(options.max_idle_time, Some(Duration::from_secs(300)));
        assert_eq!(options.server_selection_timeout, Some(Duration::from_secs(5)));
        assert_eq!(options.connect_timeout, Some(Duration::from_secs(5)));
        assert_eq!(options.retry_reads, Some(false));
        assert_eq!(options.retry_writes, Some(false));
        assert!(options.app_name.is_none());
    }

    #[tokio::test]
    async fn test_empty_url_is_connection_error() {
        let err = Connection::connect("").await.unwrap_err();
        assert!(err.is_connection());
    }

    #[tokio::test]
    async fn test_malformed_url_is_connection_error() {
        let err = Connection::connect("not-a-mongodb-url").await.unwrap_err();
        assert!(err.is_connection());
    }
}
