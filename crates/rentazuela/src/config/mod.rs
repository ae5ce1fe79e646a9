use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

use crate::workflows::messaging::MessagingPolicy;
use crate::workflows::publishing::ImagePolicy;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub marketplace: MarketplaceConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let defaults = MarketplaceConfig::default();
        let marketplace = MarketplaceConfig {
            max_message_chars: read_count(
                "MARKETPLACE_MAX_MESSAGE_CHARS",
                defaults.max_message_chars,
            )?,
            max_listing_images: read_count("MARKETPLACE_MAX_IMAGES", defaults.max_listing_images)?,
            max_image_bytes: read_limit("MARKETPLACE_MAX_IMAGE_BYTES", defaults.max_image_bytes)?,
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            marketplace,
        })
    }
}

fn read_count(key: &'static str, default: usize) -> Result<usize, ConfigError> {
    let default = u64::try_from(default).map_err(|_| ConfigError::InvalidLimit { key })?;
    usize::try_from(read_limit(key, default)?).map_err(|_| ConfigError::InvalidLimit { key })
}

fn read_limit(key: &'static str, default: u64) -> Result<u64, ConfigError> {
    match env::var(key) {
        Ok(raw) => match raw.trim().parse::<u64>() {
            Ok(value) if value > 0 => Ok(value),
            _ => Err(ConfigError::InvalidLimit { key }),
        },
        Err(_) => Ok(default),
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Marketplace limits shared by the messaging and publication workflows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarketplaceConfig {
    pub max_message_chars: usize,
    pub max_listing_images: usize,
    pub max_image_bytes: u64,
}

impl Default for MarketplaceConfig {
    fn default() -> Self {
        Self {
            max_message_chars: 5000,
            max_listing_images: 10,
            max_image_bytes: 5 * 1024 * 1024,
        }
    }
}

impl MarketplaceConfig {
    pub fn messaging_policy(&self) -> MessagingPolicy {
        MessagingPolicy {
            max_message_chars: self.max_message_chars,
        }
    }

    pub fn image_policy(&self) -> ImagePolicy {
        ImagePolicy {
            max_images: self.max_listing_images,
            max_image_bytes: self.max_image_bytes,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidLimit { key: &'static str },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidLimit { key } => {
                write!(f, "{key} must be a positive integer")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort | ConfigError::InvalidLimit { .. } => None,
            ConfigError::InvalidHost { source } => Some(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        env::remove_var("APP_ENV");
        env::remove_var("APP_HOST");
        env::remove_var("APP_PORT");
        env::remove_var("APP_LOG_LEVEL");
        env::remove_var("MARKETPLACE_MAX_MESSAGE_CHARS");
        env::remove_var("MARKETPLACE_MAX_IMAGES");
        env::remove_var("MARKETPLACE_MAX_IMAGE_BYTES");
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.telemetry.log_level, "info");
        assert_eq!(config.marketplace, MarketplaceConfig::default());
        assert_eq!(config.marketplace.messaging_policy().max_message_chars, 5000);
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 3000));
        reset_env();
    }

    #[test]
    fn marketplace_limits_are_read_from_env() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("MARKETPLACE_MAX_MESSAGE_CHARS", "280");
        env::set_var("MARKETPLACE_MAX_IMAGES", "4");
        let config = AppConfig::load().expect("config loads");
        assert_eq!(config.marketplace.max_message_chars, 280);
        assert_eq!(config.marketplace.image_policy().max_images, 4);
        reset_env();
    }

    #[test]
    fn rejects_zero_limits() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("MARKETPLACE_MAX_IMAGES", "0");
        match AppConfig::load() {
            Err(ConfigError::InvalidLimit { key }) => assert_eq!(key, "MARKETPLACE_MAX_IMAGES"),
            other => panic!("expected invalid limit, got {other:?}"),
        }
        reset_env();
    }

    #[test]
    fn counts_keep_values_past_u32() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("MARKETPLACE_MAX_MESSAGE_CHARS", "4294967296");
        let loaded = AppConfig::load();
        reset_env();
        #[cfg(target_pointer_width = "64")]
        assert_eq!(
            loaded.expect("fits in usize").marketplace.max_message_chars,
            4_294_967_296
        );
        #[cfg(not(target_pointer_width = "64"))]
        assert!(matches!(
            loaded,
            Err(ConfigError::InvalidLimit {
                key: "MARKETPLACE_MAX_MESSAGE_CHARS"
            })
        ));
    }
}
