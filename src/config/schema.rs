//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the echo
//! server. All types derive Serde traits for deserialization from config files;
//! every field has a default so a minimal (or absent) file is valid.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the echo server.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct EchoConfig {
    /// Listener configuration (address, port, TLS).
    pub listener: ListenerConfig,

    /// Connection-level timeouts.
    pub timeouts: TimeoutConfig,

    /// Startup defaults for the response pipeline.
    pub response: ResponseConfig,

    /// Upstream proxy settings.
    pub proxy: ProxyConfig,

    /// Console request/response dump settings.
    pub console: ConsoleConfig,

    /// Log settings.
    pub observability: ObservabilityConfig,

    /// Reload response defaults when the config file changes.
    pub watch: bool,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ListenerConfig {
    /// Address to bind (e.g., "127.0.0.1").
    pub address: String,

    /// TCP port to bind.
    pub port: u16,

    /// Optional TLS configuration. Plaintext when absent.
    pub tls: Option<TlsConfig>,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,
}

impl ListenerConfig {
    /// The `address:port` pair handed to the socket layer.
    pub fn bind_address(&self) -> String {
        if self.address.contains(':') && !self.address.starts_with('[') {
            format!("[{}]:{}", self.address, self.port)
        } else {
            format!("{}:{}", self.address, self.port)
        }
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".to_string(),
            port: 8000,
            tls: None,
            max_connections: 10_000,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Timeout configuration, all values in milliseconds.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Limit on reading request headers and the request body.
    pub read_ms: u64,

    /// Limit on producing and writing a response.
    pub write_ms: u64,

    /// Limit on a keep-alive connection waiting for its next request.
    pub idle_ms: u64,

    /// Limit on one upstream proxy exchange.
    pub proxy_ms: u64,
}

impl TimeoutConfig {
    pub fn read(&self) -> Duration {
        Duration::from_millis(self.read_ms)
    }

    pub fn write(&self) -> Duration {
        Duration::from_millis(self.write_ms)
    }

    pub fn idle(&self) -> Duration {
        Duration::from_millis(self.idle_ms)
    }

    pub fn proxy(&self) -> Duration {
        Duration::from_millis(self.proxy_ms)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            read_ms: 5_000,
            write_ms: 10_000,
            idle_ms: 15_000,
            proxy_ms: 30_000,
        }
    }
}

/// How query-string overrides interact with the shared response settings.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OverrideMode {
    /// Overrides are written back to the shared settings and become the new
    /// baseline for every later request (last writer wins).
    #[default]
    Sticky,
    /// Overrides apply to the current request only.
    Request,
}

/// Startup defaults for the response pipeline.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ResponseConfig {
    /// Fixed delay before responding, in milliseconds.
    pub delay_ms: u64,

    /// Maximum random jitter added to the delay, in milliseconds.
    pub jitter_ms: u64,

    /// Default status code, or `random`/`r` to draw from `codes`.
    pub code: String,

    /// Candidate codes for random selection.
    pub codes: Vec<i64>,

    /// Custom headers as a flat `key,value,key,value` list.
    pub headers: Vec<String>,

    /// File whose contents replace the default status-text body.
    pub body_file: Option<String>,

    /// Whether query overrides persist across requests.
    pub override_mode: OverrideMode,

    /// Maximum accepted request body size in bytes.
    pub max_body_bytes: usize,
}

impl Default for ResponseConfig {
    fn default() -> Self {
        Self {
            delay_ms: 0,
            jitter_ms: 0,
            code: "200".to_string(),
            codes: vec![200, 500],
            headers: Vec::new(),
            body_file: None,
            override_mode: OverrideMode::Sticky,
            max_body_bytes: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// Upstream proxy configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ProxyConfig {
    /// Upstream URL every request is forwarded to.
    pub target: Option<String>,

    /// Honor the `proxy` query parameter.
    pub allow_query_override: bool,

    /// Idle connections kept per upstream host.
    pub max_idle_per_host: usize,

    /// Idle connection eviction, in seconds.
    pub idle_timeout_secs: u64,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            target: None,
            allow_query_override: false,
            max_idle_per_host: 10,
            idle_timeout_secs: 30,
        }
    }
}

/// Console dump configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ConsoleConfig {
    pub print_request: bool,
    pub print_response: bool,
    pub print_body: bool,
    /// Dump upstream responses when proxying.
    pub print_proxy: bool,
    pub colour: bool,
    pub timestamp: bool,
    /// Bytes printed from each end of a long request body; 0 prints it whole.
    pub short_body: usize,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            print_request: true,
            print_response: true,
            print_body: true,
            print_proxy: false,
            colour: true,
            timestamp: true,
            short_body: 0,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Shorthand for `log_level = "debug"`.
    pub debug: bool,
}

impl ObservabilityConfig {
    /// The level actually applied to the crate's log filter.
    pub fn effective_level(&self) -> &str {
        if self.debug {
            "debug"
        } else {
            &self.log_level
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            debug: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_file_uses_defaults() {
        let config: EchoConfig = toml::from_str("").unwrap();
        assert_eq!(config, EchoConfig::default());
        assert_eq!(config.listener.bind_address(), "127.0.0.1:8000");
        assert_eq!(config.response.codes, vec![200, 500]);
        assert_eq!(config.timeouts.idle(), Duration::from_secs(15));
    }

    #[test]
    fn partial_sections_merge_with_defaults() {
        let config: EchoConfig = toml::from_str(
            r#"
            [response]
            delay_ms = 250
            override_mode = "request"

            [proxy]
            target = "http://127.0.0.1:9000/"
            "#,
        )
        .unwrap();

        assert_eq!(config.response.delay_ms, 250);
        assert_eq!(config.response.override_mode, OverrideMode::Request);
        assert_eq!(config.response.code, "200");
        assert_eq!(config.proxy.max_idle_per_host, 10);
        assert_eq!(config.proxy.target.as_deref(), Some("http://127.0.0.1:9000/"));
    }

    #[test]
    fn ipv6_bind_address_is_bracketed() {
        let listener = ListenerConfig {
            address: "::1".into(),
            port: 8080,
            ..ListenerConfig::default()
        };
        assert_eq!(listener.bind_address(), "[::1]:8080");
    }
}
