//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! built-in defaults
//!     → config file (TOML, optional)
//!     → cli.rs (flags override file values)
//!     → validation.rs (semantic checks)
//!     → EchoConfig (validated)
//!
//! With --watch:
//!     watcher.rs detects change
//!     → loader.rs re-runs the full load
//!     → ResponseSettings::reload swaps the response defaults
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Listener and timeout changes need a restart; response settings reload live

pub mod cli;
pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use cli::Cli;
pub use loader::ConfigError;
pub use schema::EchoConfig;
pub use schema::ListenerConfig;
