//! Response construction subsystem.
//!
//! # Data Flow
//! ```text
//! query string
//!     → params.rs (parse & validate overrides)
//!     → settings.rs (merge with shared settings → ResponseDescriptor)
//!     → latency.rs (delay + jitter)
//!     → [proxy / connection control / emit] (http layer)
//! ```

pub mod codes;
pub mod descriptor;
pub mod latency;
pub mod params;
pub mod settings;

pub use codes::CodeSpec;
pub use descriptor::ResponseDescriptor;
pub use params::{ParamError, QueryOverrides};
pub use settings::{Resolved, ResponseSettings};
