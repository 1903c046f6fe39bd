#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Connection settings for the remote backend, loaded from the environment.
//!
//! Layout: `env.rs` (env-file parsing and layering), `settings.rs` (typed
//! `BackendSettings` + validation), `secret.rs` (redacted credential newtype),
//! `error.rs` (`ConfigError`).

pub mod env;
pub mod error;
pub mod secret;
pub mod settings;

pub use env::{EnvMap, load_env_file, parse_env_file};
pub use error::{ConfigError, ConfigResult};
pub use secret::Secret;
pub use settings::{
    BackendSettings, DEFAULT_TENANT_COLUMN, DEFAULT_TIMEOUT_SECS, SettingsOverrides, keys,
};
