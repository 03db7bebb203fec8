/// Configuration management for the API server
///
/// Configuration is read from environment variables (and a `.env` file when
/// present) through the `config` crate, with defaults for everything except
/// the Redis URL and the token secret.
///
/// # Environment Variables
///
/// - `API_HOST`: Host to bind to (default: 0.0.0.0)
/// - `API_PORT`: Port to bind to (default: 3000)
/// - `CORS_ORIGINS`: Comma-separated allowed origins, `*` for any (default: *)
/// - `REDIS_URL`: Redis connection string (required)
/// - `REDIS_CONNECTION_TIMEOUT_SECS`: default 5
/// - `REDIS_COMMAND_TIMEOUT_SECS`: default 10
/// - `JWT_SECRET`: Secret key for token signing, at least 32 characters (required)
/// - `TOKEN_TTL_SECS`: Token and cookie lifetime (default: 7200)
/// - `COOKIE_SECURE`: Mark the token cookie `Secure` (default: false)
/// - `RUST_LOG`: Log filter (default: crewboard_api=debug,tower_http=debug)
///
/// # Example
///
/// ```no_run
/// use crewboard_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use crewboard_shared::store::RedisConfig;
use serde::Deserialize;

/// Minimum accepted length of `JWT_SECRET`
pub const MIN_SECRET_LEN: usize = 32;

/// Complete application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// API server configuration
    pub api: ApiConfig,

    /// Redis store configuration
    pub redis: RedisConfig,

    /// Token and cookie configuration
    pub auth: AuthConfig,
}

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,

    /// Allowed CORS origins; `*` allows any origin
    pub cors_origins: Vec<String>,
}

/// Token and cookie configuration
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Secret key for token signing
    ///
    /// Generate with: `openssl rand -hex 32`
    pub jwt_secret: String,

    /// Lifetime of issued tokens and of the token cookie
    pub token_ttl_secs: i64,

    /// Whether the token cookie carries the `Secure` attribute
    pub cookie_secure: bool,
}

/// Flat view of the environment, as deserialized by the `config` crate
#[derive(Debug, Deserialize)]
struct Settings {
    api_host: String,
    api_port: u16,
    cors_origins: String,
    redis_url: Option<String>,
    redis_connection_timeout_secs: u64,
    redis_command_timeout_secs: u64,
    jwt_secret: Option<String>,
    token_ttl_secs: i64,
    cookie_secure: bool,
}

impl Config {
    /// Loads configuration from the process environment
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `REDIS_URL` or `JWT_SECRET` is missing
    /// - `JWT_SECRET` is shorter than 32 characters
    /// - A variable has an invalid value
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if present (for development)
        dotenvy::dotenv().ok();

        Self::from_source(config::Environment::default())
    }

    /// Loads configuration from an explicit environment source
    pub fn from_source(source: config::Environment) -> anyhow::Result<Self> {
        let settings: Settings = config::Config::builder()
            .set_default("api_host", "0.0.0.0")?
            .set_default("api_port", 3000)?
            .set_default("cors_origins", "*")?
            .set_default("redis_connection_timeout_secs", 5)?
            .set_default("redis_command_timeout_secs", 10)?
            .set_default("token_ttl_secs", 7200)?
            .set_default("cookie_secure", false)?
            .add_source(source.try_parsing(true))
            .build()?
            .try_deserialize()?;

        let redis_url = settings
            .redis_url
            .ok_or_else(|| anyhow::anyhow!("REDIS_URL environment variable is required"))?;

        let jwt_secret = settings
            .jwt_secret
            .ok_or_else(|| anyhow::anyhow!("JWT_SECRET environment variable is required"))?;

        if jwt_secret.len() < MIN_SECRET_LEN {
            anyhow::bail!("JWT_SECRET must be at least {} characters long", MIN_SECRET_LEN);
        }

        if settings.token_ttl_secs <= 0 {
            anyhow::bail!("TOKEN_TTL_SECS must be positive");
        }

        Ok(Self {
            api: ApiConfig {
                host: settings.api_host,
                port: settings.api_port,
                cors_origins: settings
                    .cors_origins
                    .split(',')
                    .map(str::trim)
                    .filter(|origin| !origin.is_empty())
                    .map(String::from)
                    .collect(),
            },
            redis: RedisConfig {
                url: redis_url,
                connection_timeout_secs: settings.redis_connection_timeout_secs,
                command_timeout_secs: settings.redis_command_timeout_secs,
            },
            auth: AuthConfig {
                jwt_secret,
                token_ttl_secs: settings.token_ttl_secs,
                cookie_secure: settings.cookie_secure,
            },
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const SECRET: &str = "test-secret-key-at-least-32-bytes-long";

    fn source(vars: &[(&str, &str)]) -> config::Environment {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        config::Environment::default().source(Some(map))
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_source(source(&[
            ("REDIS_URL", "redis://localhost:6379"),
            ("JWT_SECRET", SECRET),
        ]))
        .unwrap();

        assert_eq!(config.bind_address(), "0.0.0.0:3000");
        assert_eq!(config.redis.url, "redis://localhost:6379");
        assert_eq!(config.redis.connection_timeout_secs, 5);
        assert_eq!(config.redis.command_timeout_secs, 10);
        assert_eq!(config.auth.token_ttl_secs, 7200);
        assert!(!config.auth.cookie_secure);
        assert_eq!(config.api.cors_origins, vec!["*".to_string()]);
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_source(source(&[
            ("API_HOST", "127.0.0.1"),
            ("API_PORT", "8080"),
            ("REDIS_URL", "redis://cache:6379"),
            ("JWT_SECRET", SECRET),
            ("TOKEN_TTL_SECS", "60"),
            ("COOKIE_SECURE", "true"),
            ("CORS_ORIGINS", "https://app.example.com, https://admin.example.com"),
        ]))
        .unwrap();

        assert_eq!(config.bind_address(), "127.0.0.1:8080");
        assert_eq!(config.auth.token_ttl_secs, 60);
        assert!(config.auth.cookie_secure);
        assert_eq!(
            config.api.cors_origins,
            vec![
                "https://app.example.com".to_string(),
                "https://admin.example.com".to_string()
            ]
        );
    }

    #[test]
    fn test_required_variables() {
        let err = Config::from_source(source(&[("JWT_SECRET", SECRET)])).unwrap_err();
        assert!(err.to_string().contains("REDIS_URL"));

        let err = Config::from_source(source(&[("REDIS_URL", "redis://localhost")])).unwrap_err();
        assert!(err.to_string().contains("JWT_SECRET"));
    }

    #[test]
    fn test_short_secret_rejected() {
        let err = Config::from_source(source(&[
            ("REDIS_URL", "redis://localhost"),
            ("JWT_SECRET", "short"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("at least 32"));
    }
}
