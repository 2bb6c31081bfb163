//! Console traffic dump.
//!
//! # Responsibilities
//! - Print each request (line, headers, body) as it arrives
//! - Print each response, coloured by status class
//! - Optionally print upstream responses and raw replacement output
//!
//! Only reads finalized data; nothing here changes what is sent.
//!
//! # Colour Table
//! | codes | colour |
//! |---|---|
//! | 100-199 | cyan |
//! | 200-299 | blue |
//! | 300-399 | green |
//! | 400-499 (not 418) | yellow |
//! | 418 | purple |
//! | 500-599 | red |

use std::io::Write;

use axum::http::{request, HeaderMap};

use crate::config::schema::ConsoleConfig;
use crate::echo::descriptor::ResponseDescriptor;
use crate::http::proxy::Upstream;

const RESET: &str = "\x1b[0m";

/// ANSI colour escape for a status code, if its class has one.
pub fn colour_code(code: i64) -> Option<&'static str> {
    match code {
        418 => Some("\x1b[35m"),
        100..=199 => Some("\x1b[36m"),
        200..=299 => Some("\x1b[34m"),
        300..=399 => Some("\x1b[32m"),
        400..=499 => Some("\x1b[33m"),
        500..=599 => Some("\x1b[31m"),
        _ => None,
    }
}

/// Writes human-readable traffic dumps to stdout.
#[derive(Debug, Clone)]
pub struct Console {
    config: ConsoleConfig,
}

impl Console {
    pub fn new(config: ConsoleConfig) -> Self {
        Self { config }
    }

    pub fn request(&self, parts: &request::Parts, body: &[u8]) {
        if self.config.print_request {
            emit(&self.format_request(parts, body));
        }
    }

    pub fn response(&self, descriptor: &ResponseDescriptor) {
        if self.config.print_response {
            emit(&self.format_response(
                "Response",
                descriptor.status,
                &descriptor.headers,
                &descriptor.body_bytes(),
            ));
        }
    }

    pub fn upstream(&self, upstream: &Upstream) {
        if self.config.print_proxy {
            emit(&self.format_response(
                "Upstream",
                i64::from(upstream.status.as_u16()),
                &upstream.headers,
                &upstream.body,
            ));
        }
    }

    /// Dump bytes written over a taken-over connection.
    pub fn raw(&self, bytes: &[u8]) {
        if self.config.print_response {
            let mut out = self.banner("Raw response");
            if self.config.print_body {
                out.push_str(&String::from_utf8_lossy(bytes));
            }
            emit(&out);
        }
    }

    pub fn format_request(&self, parts: &request::Parts, body: &[u8]) -> String {
        let mut out = self.banner("Request");
        out.push_str(&format!("> {} {} {:?}\n", parts.method, parts.uri, parts.version));
        for (name, value) in parts.headers.iter() {
            out.push_str(&format!("> {}: {}\n", name, String::from_utf8_lossy(value.as_bytes())));
        }

        if self.config.print_body && !body.is_empty() {
            let short = self.config.short_body;
            if short == 0 || body.len() <= short * 2 {
                out.push_str(&format!("{}\n", String::from_utf8_lossy(body)));
            } else {
                out.push_str(&format!("{}\n", String::from_utf8_lossy(&body[..short])));
                out.push_str("...\n");
                let tail = &body[body.len() - short..];
                out.push_str(&format!("{}\n", String::from_utf8_lossy(tail)));
            }
        }
        out
    }

    pub fn format_response(
        &self,
        label: &str,
        status: i64,
        headers: &HeaderMap,
        body: &[u8],
    ) -> String {
        let mut out = self.banner(label);
        let colour = if self.config.colour { colour_code(status) } else { None };
        if let Some(colour) = colour {
            out.push_str(colour);
        }

        out.push_str(&format!("< {}\n", status));
        for (name, value) in headers.iter() {
            out.push_str(&format!("< {}: {}\n", name, String::from_utf8_lossy(value.as_bytes())));
        }
        if self.config.print_body && !body.is_empty() {
            out.push_str(&String::from_utf8_lossy(body));
            if !body.ends_with(b"\n") {
                out.push('\n');
            }
        }

        if colour.is_some() {
            out.push_str(RESET);
        }
        out
    }

    fn banner(&self, label: &str) -> String {
        if self.config.timestamp {
            format!(
                "\n---------- {}: {} ----------\n",
                label,
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f %z")
            )
        } else {
            String::new()
        }
    }
}

fn emit(text: &str) {
    let mut out = std::io::stdout().lock();
    let _ = out.write_all(text.as_bytes());
    let _ = out.flush();
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderValue, Request};

    fn plain() -> Console {
        Console::new(ConsoleConfig {
            colour: false,
            timestamp: false,
            ..ConsoleConfig::default()
        })
    }

    #[test]
    fn colour_table() {
        assert_eq!(colour_code(101), Some("\x1b[36m"));
        assert_eq!(colour_code(204), Some("\x1b[34m"));
        assert_eq!(colour_code(302), Some("\x1b[32m"));
        assert_eq!(colour_code(404), Some("\x1b[33m"));
        assert_eq!(colour_code(418), Some("\x1b[35m"));
        assert_eq!(colour_code(503), Some("\x1b[31m"));
        assert_eq!(colour_code(99), None);
        assert_eq!(colour_code(700), None);
        assert_eq!(colour_code(-1), None);
    }

    #[test]
    fn request_dump() {
        let (parts, ()) = Request::post("/echo?code=201")
            .header("x-trace", "1")
            .body(())
            .unwrap()
            .into_parts();

        let out = plain().format_request(&parts, b"payload");
        assert_eq!(out, "> POST /echo?code=201 HTTP/1.1\n> x-trace: 1\npayload\n");
    }

    #[test]
    fn long_bodies_are_shortened() {
        let console = Console::new(ConsoleConfig {
            colour: false,
            timestamp: false,
            short_body: 3,
            ..ConsoleConfig::default()
        });
        let (parts, ()) = Request::put("/").body(()).unwrap().into_parts();

        let out = console.format_request(&parts, b"abcdefghij");
        assert!(out.ends_with("abc\n...\nhij\n"), "got {out:?}");

        let out = console.format_request(&parts, b"abcdef");
        assert!(out.ends_with("abcdef\n"));
    }

    #[test]
    fn response_dump_is_coloured_and_reset() {
        let console = Console::new(ConsoleConfig {
            timestamp: false,
            ..ConsoleConfig::default()
        });
        let mut headers = HeaderMap::new();
        headers.insert("server", HeaderValue::from_static("http-echo"));

        let out = console.format_response("Response", 500, &headers, b"Internal Server Error\n");
        assert_eq!(
            out,
            "\x1b[31m< 500\n< server: http-echo\nInternal Server Error\n\x1b[0m"
        );
    }

    #[test]
    fn timestamp_banner() {
        let console = Console::new(ConsoleConfig::default());
        let out = console.format_response("Response", 200, &HeaderMap::new(), b"");
        assert!(out.starts_with("\n---------- Response: "));
    }
}
