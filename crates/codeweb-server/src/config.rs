use std::env;
use std::fmt;

use codeweb_common::{CodewebError, Result};
use codeweb_mongodb::PoolConfig;
use rand::RngCore;

/// Server configuration
#[derive(Clone)]
pub struct Config {
    /// Server host address
    pub host: String,
    /// Server port
    pub port: u16,
    /// MongoDB connection string
    pub mongodb_url: String,
    /// Token signing key
    pub token_secret: Vec<u8>,
    /// Connection pool settings
    pub pool: PoolConfig,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}

impl Config {
    /// Load configuration from `.env` and environment variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mongodb_url = lookup("MONGODB_URL")
            .filter(|url| !url.is_empty())
            .ok_or_else(|| CodewebError::Config("MONGODB_URL must be set".to_string()))?;

        let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = parse_var(&lookup, "PORT")?.unwrap_or(8000);

        let token_secret = match lookup("TOKEN_SECRET") {
            Some(secret) => hex::decode(secret.trim()).map_err(|e| {
                CodewebError::Config(format!("TOKEN_SECRET must be hex: {}", e))
            })?,
            None => {
                let mut secret = vec![0u8; 32];
                rand::thread_rng().fill_bytes(&mut secret);
                secret
            }
        };

        let mut pool = PoolConfig::default();
        if let Some(max) = parse_var(&lookup, "MONGODB_MAX_POOL_SIZE")? {
            pool.max_pool_size = max;
        }
        if let Some(min) = parse_var(&lookup, "MONGODB_MIN_POOL_SIZE")? {
            pool.min_pool_size = min;
        }
        if pool.min_pool_size > pool.max_pool_size {
            return Err(CodewebError::Config(format!(
                "MONGODB_MIN_POOL_SIZE ({}) exceeds MONGODB_MAX_POOL_SIZE ({})",
                pool.min_pool_size, pool.max_pool_size
            )));
        }

        Ok(Self {
            host,
            port,
            mongodb_url,
            token_secret,
            pool,
        })
    }

    /// Address the listener binds to
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_var<F, T>(lookup: &F, key: &str) -> Result<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse()
                .map_err(|e| CodewebError::Config(format!("invalid {}: {}", key, e)))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("MONGODB_URL", "mongodb://localhost:27017")]).unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8000);
        assert_eq!(config.bind_address(), "0.0.0.0:8000");
        assert_eq!(config.token_secret.len(), 32);
        assert_eq!(config.pool.max_pool_size, 10);
    }

    #[test]
    fn test_missing_url() {
        let err = load(&[]).unwrap_err();
        assert!(matches!(err, CodewebError::Config(_)));
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("MONGODB_URL", "mongodb://db:27017"),
            ("HOST", "127.0.0.1"),
            ("PORT", "9000"),
            ("TOKEN_SECRET", "00ff"),
            ("MONGODB_MAX_POOL_SIZE", "20"),
            ("MONGODB_MIN_POOL_SIZE", "2"),
        ])
        .unwrap();
        assert_eq!(config.bind_address(), "127.0.0.1:9000");
        assert_eq!(config.token_secret, vec![0x00, 0xff]);
        assert_eq!(config.pool.max_pool_size, 20);
        assert_eq!(config.pool.min_pool_size, 2);
    }

    #[test]
    fn test_invalid_values() {
        let url = ("MONGODB_URL", "mongodb://db:27017");
        assert!(load(&[url, ("PORT", "http")]).is_err());
        assert!(load(&[url, ("TOKEN_SECRET", "not-hex")]).is_err());
        assert!(load(&[url, ("MONGODB_MIN_POOL_SIZE", "50")]).is_err());
    }

    #[test]
    fn test_debug_hides_secrets() {
        let config = load(&[("MONGODB_URL", "mongodb://user:pw@db:27017")]).unwrap();
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("pw@db"));
        assert!(!rendered.contains("token_secret"));
    }
}
