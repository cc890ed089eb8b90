//! Layered runtime configuration.
//!
//! Resolution order, lowest to highest precedence:
//! 1. **Defaults** - the [`DefaultRegistry`] table
//! 2. **File** - an optional strict YAML file
//! 3. **Environment** - `XG2G_*` variables
//!
//! [`ConfigLoader`] runs the pipeline once and returns a validated
//! [`ResolvedConfig`]. [`ConfigHolder`] publishes it as an immutable
//! [`Snapshot`], reloads on demand or on file changes, and notifies
//! listeners after each successful swap.

pub mod alias;
pub mod auth_mode;
pub mod coerce;
pub mod defaults;
pub mod deprecation;
pub mod discovery;
pub mod env;
pub mod file;
pub mod holder;
pub mod loader;
pub mod redact;
pub mod snapshot;
pub mod types;
pub mod validation;
pub mod watcher;

pub use defaults::{ConfigEntry, DefaultRegistry, Profile, Status, Value};
pub use deprecation::{DeprecationEntry, DeprecationRegistry};
pub use discovery::SlotDiscovery;
pub use env::{EnvSource, MapEnv, ProcessEnv};
pub use file::FileConfig;
pub use holder::ConfigHolder;
pub use loader::ConfigLoader;
pub use redact::{mask_secrets, masked_string};
pub use snapshot::{RuntimeEnvFacts, Snapshot};
pub use types::*;
pub use watcher::WatcherConfig;
