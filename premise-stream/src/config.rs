//! Configuration types for the premise-stream crate
//!
//! `ServerConfig` carries everything the engine needs to reach one Premise
//! server: address, credentials, transport security and protocol timing.

use std::time::Duration;

use crate::error::{Result, ServerError};

/// Configuration for a [`PremiseServer`](crate::PremiseServer)
#[derive(Clone)]
pub struct ServerConfig {
    /// Server host name or address
    /// Default: "localhost"
    pub host: String,

    /// Server port
    /// Default: 86
    pub port: u16,

    /// HTTP Basic user name
    /// Default: empty
    pub username: String,

    /// HTTP Basic password
    /// Default: empty
    pub password: String,

    /// Use TLS for the subscription socket and one-shot calls
    /// Default: false
    pub ssl: bool,

    /// Request fast mode framing on every connect
    /// Default: false
    pub fast_mode: bool,

    /// How long a one-shot set waits for a response before abandoning it
    /// Default: 100 milliseconds
    pub set_response_timeout: Duration,

    /// Timeout for one-shot get and invoke calls
    /// Default: 10 seconds
    pub request_timeout: Duration,

    /// Delay before reconnecting right after a stop
    /// Default: 1 second
    pub reconnect_grace: Duration,

    /// `User-Agent` header sent with every request
    /// Default: "Premise SDK Rust Client"
    pub user_agent: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 86,
            username: String::new(),
            password: String::new(),
            ssl: false,
            fast_mode: false,
            set_response_timeout: Duration::from_millis(100),
            request_timeout: Duration::from_secs(10),
            reconnect_grace: Duration::from_secs(1),
            user_agent: "Premise SDK Rust Client".to_string(),
        }
    }
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"********")
            .field("ssl", &self.ssl)
            .field("fast_mode", &self.fast_mode)
            .field("set_response_timeout", &self.set_response_timeout)
            .field("request_timeout", &self.request_timeout)
            .field("reconnect_grace", &self.reconnect_grace)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

impl ServerConfig {
    /// Create a ServerConfig with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a ServerConfig for a host and port, other fields defaulted
    pub fn for_host(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    /// Create a ServerConfig from `PREMISE_*` environment variables
    ///
    /// Reads `PREMISE_HOST`, `PREMISE_PORT`, `PREMISE_USERNAME`,
    /// `PREMISE_PASSWORD`, `PREMISE_SSL` and `PREMISE_FAST_MODE`. Unset
    /// variables keep their defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(host) = lookup("PREMISE_HOST") {
            config.host = host;
        }
        if let Some(port) = lookup("PREMISE_PORT") {
            config.port = port.trim().parse().map_err(|_| {
                ServerError::Configuration(format!("Invalid PREMISE_PORT: {}", port))
            })?;
        }
        if let Some(username) = lookup("PREMISE_USERNAME") {
            config.username = username;
        }
        if let Some(password) = lookup("PREMISE_PASSWORD") {
            config.password = password;
        }
        if let Some(ssl) = lookup("PREMISE_SSL") {
            config.ssl = parse_flag("PREMISE_SSL", &ssl)?;
        }
        if let Some(fast_mode) = lookup("PREMISE_FAST_MODE") {
            config.fast_mode = parse_flag("PREMISE_FAST_MODE", &fast_mode)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration and return any issues
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(ServerError::Configuration(
                "Host must not be empty".to_string(),
            ));
        }

        if self.port == 0 {
            return Err(ServerError::Configuration(
                "Port must be greater than 0".to_string(),
            ));
        }

        if self.set_response_timeout == Duration::ZERO {
            return Err(ServerError::Configuration(
                "Set response timeout must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Builder pattern methods for fluent configuration

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    pub fn with_ssl(mut self, ssl: bool) -> Self {
        self.ssl = ssl;
        self
    }

    pub fn with_fast_mode(mut self, fast_mode: bool) -> Self {
        self.fast_mode = fast_mode;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_set_response_timeout(mut self, timeout: Duration) -> Self {
        self.set_response_timeout = timeout;
        self
    }

    pub fn with_reconnect_grace(mut self, grace: Duration) -> Self {
        self.reconnect_grace = grace;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Scheme and authority used for `/sys/` URLs
    pub(crate) fn base_url(&self) -> String {
        let scheme = if self.ssl { "https" } else { "http" };
        format!("{}://{}:{}", scheme, self.host, self.port)
    }
}

fn parse_flag(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ServerError::Configuration(format!(
            "Invalid {}: {}",
            name, value
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 86);
        assert!(!config.ssl);
        assert!(!config.fast_mode);
        assert_eq!(config.set_response_timeout, Duration::from_millis(100));
        assert_eq!(config.reconnect_grace, Duration::from_secs(1));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let invalid_host = ServerConfig::for_host("  ", 86);
        assert!(invalid_host.validate().is_err());

        let invalid_port = ServerConfig::for_host("home", 0);
        assert!(invalid_port.validate().is_err());

        let invalid_timeout = ServerConfig::new().with_set_response_timeout(Duration::ZERO);
        assert!(invalid_timeout.validate().is_err());
    }

    #[test]
    fn test_builder_pattern() {
        let config = ServerConfig::for_host("premise.local", 8086)
            .with_credentials("admin", "secret")
            .with_ssl(true)
            .with_fast_mode(true)
            .with_request_timeout(Duration::from_secs(3))
            .with_user_agent("test-agent");

        assert_eq!(config.host, "premise.local");
        assert_eq!(config.port, 8086);
        assert_eq!(config.username, "admin");
        assert!(config.ssl);
        assert!(config.fast_mode);
        assert_eq!(config.request_timeout, Duration::from_secs(3));
        assert_eq!(config.user_agent, "test-agent");
        assert_eq!(config.base_url(), "https://premise.local:8086");
    }

    #[test]
    fn test_debug_masks_password() {
        let config = ServerConfig::new().with_credentials("admin", "hunter2");
        let debug = format!("{:?}", config);
        assert!(debug.contains("admin"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_from_env_lookup() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("PREMISE_HOST", "192.168.1.10"),
            ("PREMISE_PORT", "8086"),
            ("PREMISE_USERNAME", "admin"),
            ("PREMISE_PASSWORD", "secret"),
            ("PREMISE_SSL", "true"),
            ("PREMISE_FAST_MODE", "1"),
        ]))
        .unwrap();

        assert_eq!(config.host, "192.168.1.10");
        assert_eq!(config.port, 8086);
        assert_eq!(config.password, "secret");
        assert!(config.ssl);
        assert!(config.fast_mode);
    }

    #[test]
    fn test_from_env_defaults_and_errors() {
        let config = ServerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.host, "localhost");

        let err = ServerConfig::from_lookup(lookup(&[("PREMISE_PORT", "eighty")])).unwrap_err();
        assert!(matches!(err, ServerError::Configuration(_)));

        let err = ServerConfig::from_lookup(lookup(&[("PREMISE_SSL", "maybe")])).unwrap_err();
        assert!(err.to_string().contains("PREMISE_SSL"));
    }
}
