//! Command-line flags.
//!
//! Every flag is optional; a flag only replaces the value loaded from the
//! defaults or the config file when it is given.

use std::path::PathBuf;

use clap::Parser;

use crate::config::schema::{EchoConfig, OverrideMode, TlsConfig};

#[derive(Parser, Debug, Clone, Default)]
#[command(name = "http-echo")]
#[command(
    about = "Configurable HTTP echo endpoint for exercising clients, proxies and load balancers",
    long_about = None
)]
pub struct Cli {
    /// TOML config file loaded before the flags are applied
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Reload response defaults when the config file changes
    #[arg(long)]
    pub watch: bool,

    /// Show debug output
    #[arg(long)]
    pub debug: bool,

    /// The TCP address to listen on
    #[arg(long)]
    pub address: Option<String>,

    /// The TCP port to listen on
    #[arg(short, long)]
    pub port: Option<u16>,

    /// TLS certificate (PEM); requires --key
    #[arg(long, requires = "key")]
    pub cert: Option<String>,

    /// TLS private key (PEM); requires --cert
    #[arg(long, requires = "cert")]
    pub key: Option<String>,

    /// Maximum concurrent connections
    #[arg(long)]
    pub max_connections: Option<usize>,

    /// The time to wait (in milliseconds) before sending a response
    #[arg(long)]
    pub delay: Option<u64>,

    /// The maximum amount of jitter (in milliseconds) to add to the response
    #[arg(long)]
    pub jitter: Option<u64>,

    /// Default status code, or `random`/`r`
    #[arg(long)]
    pub code: Option<String>,

    /// Comma-separated pool of codes for random selection
    #[arg(long, value_delimiter = ',')]
    pub codes: Option<Vec<i64>>,

    /// Comma-separated custom headers as key,value pairs
    #[arg(long, value_delimiter = ',')]
    pub headers: Option<Vec<String>>,

    /// File whose contents are sent as the response body
    #[arg(long)]
    pub body_file: Option<String>,

    /// Whether query overrides persist across requests
    #[arg(long, value_enum)]
    pub override_mode: Option<OverrideMode>,

    /// A remote address to proxy the connection to
    #[arg(long)]
    pub proxy: Option<String>,

    /// Honor the `proxy` query parameter
    #[arg(long)]
    pub enable_proxy_override: bool,

    /// The idle timeout value (in milliseconds)
    #[arg(long)]
    pub idle_timeout: Option<u64>,

    /// The read timeout value (in milliseconds)
    #[arg(long)]
    pub read_timeout: Option<u64>,

    /// The write timeout value (in milliseconds)
    #[arg(long)]
    pub write_timeout: Option<u64>,

    /// Print the request
    #[arg(long, value_name = "BOOL")]
    pub print_request: Option<bool>,

    /// Print the response
    #[arg(long, value_name = "BOOL")]
    pub print_response: Option<bool>,

    /// Print the HTTP request body
    #[arg(long, value_name = "BOOL")]
    pub print_body: Option<bool>,

    /// Print upstream responses when proxying
    #[arg(long, value_name = "BOOL")]
    pub print_proxy: Option<bool>,

    /// Show coloured output
    #[arg(long, value_name = "BOOL")]
    pub colour: Option<bool>,

    /// Show the request/response timestamp
    #[arg(long, value_name = "BOOL")]
    pub timestamp: Option<bool>,

    /// Bytes to print of the request body start and end, 0 prints the whole body
    #[arg(long)]
    pub short_body: Option<usize>,
}

impl Cli {
    /// Overlay the flags that were given onto `config`.
    pub fn apply(&self, config: &mut EchoConfig) {
        if self.watch {
            config.watch = true;
        }
        if self.debug {
            config.observability.debug = true;
        }

        let listener = &mut config.listener;
        set(&mut listener.address, self.address.clone());
        set(&mut listener.port, self.port);
        set(&mut listener.max_connections, self.max_connections);
        if let (Some(cert_path), Some(key_path)) = (&self.cert, &self.key) {
            listener.tls = Some(TlsConfig {
                cert_path: cert_path.clone(),
                key_path: key_path.clone(),
            });
        }

        let timeouts = &mut config.timeouts;
        set(&mut timeouts.idle_ms, self.idle_timeout);
        set(&mut timeouts.read_ms, self.read_timeout);
        set(&mut timeouts.write_ms, self.write_timeout);

        let response = &mut config.response;
        set(&mut response.delay_ms, self.delay);
        set(&mut response.jitter_ms, self.jitter);
        set(&mut response.code, self.code.clone());
        set(&mut response.codes, self.codes.clone());
        set(&mut response.headers, self.headers.clone());
        set(&mut response.override_mode, self.override_mode);
        if self.body_file.is_some() {
            response.body_file = self.body_file.clone();
        }

        if self.proxy.is_some() {
            config.proxy.target = self.proxy.clone();
        }
        if self.enable_proxy_override {
            config.proxy.allow_query_override = true;
        }

        let console = &mut config.console;
        set(&mut console.print_request, self.print_request);
        set(&mut console.print_response, self.print_response);
        set(&mut console.print_body, self.print_body);
        set(&mut console.print_proxy, self.print_proxy);
        set(&mut console.colour, self.colour);
        set(&mut console.timestamp, self.timestamp);
        set(&mut console.short_body, self.short_body);
    }
}

fn set<T>(slot: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *slot = value;
    }
}
