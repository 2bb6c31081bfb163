//! Process-wide response settings and the parameter resolver.
//!
//! # Data Flow
//! ```text
//! EchoConfig (defaults + file + flags)
//!     → ResponseSettings::from_config
//!         ├── defaults (ArcSwap, replaced on reload)
//!         └── shared   (Mutex, written by query overrides)
//!
//! per request:
//!     QueryOverrides + ResponseSettings → resolve() → Resolved
//! ```
//!
//! In `sticky` mode an override is written into `shared` under the lock and
//! stays in force for every later request until overridden again; concurrent
//! requests see whichever write landed last. In `request` mode the override is
//! applied to a private copy and `shared` is never written.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use arc_swap::ArcSwap;
use axum::body::Bytes;
use axum::http::{header, HeaderMap, Uri};

use crate::config::schema::{EchoConfig, OverrideMode};
use crate::echo::codes::{pick_random, CodeSpec};
use crate::echo::descriptor::ResponseDescriptor;
use crate::echo::params::{parse_header_list, parse_proxy_target, ParamError, QueryOverrides};

/// The subset of settings a request may override.
#[derive(Debug, Clone, PartialEq)]
pub struct Overridable {
    pub delay_ms: u64,
    pub jitter_ms: u64,
    pub codes: Vec<i64>,
    pub proxy_target: Option<Uri>,
    pub headers: HeaderMap,
}

impl Overridable {
    pub fn from_config(config: &EchoConfig) -> Result<Self, ParamError> {
        let proxy_target = config
            .proxy
            .target
            .as_deref()
            .map(parse_proxy_target)
            .transpose()?;

        Ok(Self {
            delay_ms: config.response.delay_ms,
            jitter_ms: config.response.jitter_ms,
            codes: config.response.codes.clone(),
            proxy_target,
            headers: parse_header_list(config.response.headers.iter().map(String::as_str))?,
        })
    }

    fn apply(&mut self, overrides: &QueryOverrides, allow_proxy: bool) {
        if let Some(delay) = overrides.delay_ms {
            self.delay_ms = delay;
        }
        if let Some(jitter) = overrides.jitter_ms {
            self.jitter_ms = jitter;
        }
        if let Some(codes) = &overrides.codes {
            self.codes = codes.clone();
        }
        for (name, value) in &overrides.headers {
            self.headers.insert(name.clone(), value.clone());
        }
        if let Some(target) = &overrides.proxy {
            if allow_proxy {
                tracing::info!(upstream = %target, "Proxy target set from query");
                self.proxy_target = Some(target.clone());
            } else {
                tracing::warn!(
                    upstream = %target,
                    "Ignoring proxy parameter: query override disabled"
                );
            }
        }
    }
}

/// Settings that only change on config reload.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseDefaults {
    pub code: CodeSpec,
    pub body: Option<Bytes>,
    pub allow_proxy_override: bool,
    pub mode: OverrideMode,
}

/// Effective values for one request.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub descriptor: ResponseDescriptor,
    pub delay_ms: u64,
    pub jitter_ms: u64,
    pub proxy_target: Option<Uri>,
}

/// Shared, process-wide response configuration.
#[derive(Debug)]
pub struct ResponseSettings {
    defaults: ArcSwap<ResponseDefaults>,
    shared: Mutex<Overridable>,
}

impl ResponseSettings {
    /// Build settings from a validated config and the pre-loaded body file.
    pub fn from_config(config: &EchoConfig, body: Option<Bytes>) -> Result<Self, ParamError> {
        let (defaults, shared) = Self::parts(config, body)?;
        Ok(Self {
            defaults: ArcSwap::from_pointee(defaults),
            shared: Mutex::new(shared),
        })
    }

    fn parts(
        config: &EchoConfig,
        body: Option<Bytes>,
    ) -> Result<(ResponseDefaults, Overridable), ParamError> {
        let defaults = ResponseDefaults {
            code: config.response.code.parse()?,
            body,
            allow_proxy_override: config.proxy.allow_query_override,
            mode: config.response.override_mode,
        };
        Ok((defaults, Overridable::from_config(config)?))
    }

    /// Replace both the defaults and the shared overridable values, dropping
    /// any sticky overrides.
    pub fn reload(&self, config: &EchoConfig, body: Option<Bytes>) -> Result<(), ParamError> {
        let (defaults, shared) = Self::parts(config, body)?;
        *self.lock() = shared;
        self.defaults.store(Arc::new(defaults));
        tracing::info!(mode = ?config.response.override_mode, "Response settings reloaded");
        Ok(())
    }

    /// Current shared overridable values.
    pub fn snapshot(&self) -> Overridable {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, Overridable> {
        // A panic while holding the lock cannot leave the plain-data fields torn.
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Merge a request's overrides with the current settings into the
    /// effective values for that request.
    pub fn resolve(&self, overrides: &QueryOverrides) -> Resolved {
        let defaults = self.defaults.load();

        let effective = match defaults.mode {
            OverrideMode::Sticky => {
                let mut shared = self.lock();
                shared.apply(overrides, defaults.allow_proxy_override);
                shared.clone()
            }
            OverrideMode::Request => {
                let mut local = self.snapshot();
                local.apply(overrides, defaults.allow_proxy_override);
                local
            }
        };

        let status = match overrides.code.unwrap_or(defaults.code) {
            CodeSpec::Fixed(code) => code,
            CodeSpec::Random => pick_random(&effective.codes).unwrap_or_else(|| {
                tracing::warn!("Random code requested with an empty pool, using 200");
                200
            }),
        };

        let mut descriptor = ResponseDescriptor::new(status);
        for (name, value) in &effective.headers {
            descriptor.headers.insert(name.clone(), value.clone());
        }
        if let Some(location) = &overrides.location {
            descriptor.headers.insert(header::LOCATION, location.clone());
        }
        descriptor.body = defaults.body.clone();
        descriptor.empty = overrides.empty;
        descriptor.replace = overrides.replace;

        Resolved {
            descriptor,
            delay_ms: effective.delay_ms,
            jitter_ms: effective.jitter_ms,
            proxy_target: effective.proxy_target,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(mode: OverrideMode) -> ResponseSettings {
        let mut config = EchoConfig::default();
        config.response.override_mode = mode;
        ResponseSettings::from_config(&config, None).unwrap()
    }

    fn query(q: &str) -> QueryOverrides {
        QueryOverrides::parse(Some(q)).unwrap()
    }

    #[test]
    fn defaults_without_overrides() {
        let resolved = settings(OverrideMode::Sticky).resolve(&QueryOverrides::default());
        assert_eq!(resolved.descriptor.status, 200);
        assert_eq!(resolved.descriptor.body_bytes(), "OK\n");
        assert_eq!(resolved.delay_ms, 0);
        assert_eq!(resolved.proxy_target, None);
        assert!(!resolved.descriptor.empty && !resolved.descriptor.replace);
    }

    #[test]
    fn sticky_overrides_persist() {
        let settings = settings(OverrideMode::Sticky);

        let first = settings.resolve(&query("delay=500&headers=X-Test,1"));
        assert_eq!(first.delay_ms, 500);

        let second = settings.resolve(&QueryOverrides::default());
        assert_eq!(second.delay_ms, 500);
        assert_eq!(second.descriptor.headers["x-test"], "1");
        assert_eq!(settings.snapshot().delay_ms, 500);
    }

    #[test]
    fn request_mode_overrides_do_not_persist() {
        let settings = settings(OverrideMode::Request);

        let first = settings.resolve(&query("delay=500&codes=418"));
        assert_eq!(first.delay_ms, 500);

        let second = settings.resolve(&QueryOverrides::default());
        assert_eq!(second.delay_ms, 0);
        assert_eq!(settings.snapshot().codes, vec![200, 500]);
    }

    #[test]
    fn one_shot_flags_never_leak() {
        let settings = settings(OverrideMode::Sticky);
        assert!(settings.resolve(&query("empty=true")).descriptor.empty);
        assert!(!settings.resolve(&QueryOverrides::default()).descriptor.empty);
    }

    #[test]
    fn explicit_code_and_location() {
        let resolved = settings(OverrideMode::Sticky).resolve(&query("code=301&location=/moved"));
        assert_eq!(resolved.descriptor.status, 301);
        assert_eq!(resolved.descriptor.headers[header::LOCATION], "/moved");
        assert_eq!(resolved.descriptor.body_bytes(), "Moved Permanently\n");
    }

    #[test]
    fn random_code_uses_overridden_pool() {
        let settings = settings(OverrideMode::Sticky);
        for _ in 0..20 {
            let status = settings.resolve(&query("codes=418&code=random")).descriptor.status;
            assert_eq!(status, 418);
        }
    }

    #[test]
    fn random_default_code() {
        let mut config = EchoConfig::default();
        config.response.code = "r".into();
        config.response.codes = vec![202];
        let settings = ResponseSettings::from_config(&config, None).unwrap();
        assert_eq!(settings.resolve(&QueryOverrides::default()).descriptor.status, 202);
        assert_eq!(settings.resolve(&query("code=204")).descriptor.status, 204);
    }

    #[test]
    fn proxy_override_requires_opt_in() {
        let target = "proxy=http%3A%2F%2F127.0.0.1%3A9%2F";

        let closed = settings(OverrideMode::Sticky);
        assert_eq!(closed.resolve(&query(target)).proxy_target, None);

        let mut config = EchoConfig::default();
        config.proxy.allow_query_override = true;
        let open = ResponseSettings::from_config(&config, None).unwrap();
        assert_eq!(open.resolve(&query(target)).proxy_target.unwrap(), "http://127.0.0.1:9/");
        // Sticky: subsequent requests keep proxying.
        assert!(open.resolve(&QueryOverrides::default()).proxy_target.is_some());
    }

    #[test]
    fn file_body_replaces_status_text() {
        let body = Some(Bytes::from_static(b"from file"));
        let settings = ResponseSettings::from_config(&EchoConfig::default(), body).unwrap();
        assert_eq!(settings.resolve(&query("code=500")).descriptor.body_bytes(), "from file");
    }

    #[test]
    fn reload_drops_sticky_overrides() {
        let settings = settings(OverrideMode::Sticky);
        settings.resolve(&query("delay=900"));

        let mut config = EchoConfig::default();
        config.response.jitter_ms = 7;
        settings.reload(&config, None).unwrap();

        let snapshot = settings.snapshot();
        assert_eq!(snapshot.delay_ms, 0);
        assert_eq!(snapshot.jitter_ms, 7);
    }
}
