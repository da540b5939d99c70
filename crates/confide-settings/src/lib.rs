//! # confide-settings
//!
//! Configuration management with layered sources for the Confide relay.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`ConfideSettings::default()`]
//! 2. **User file**: `~/.confide/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `PORT` and `CONFIDE_*` overrides
//!
//! The binary applies command-line flags on top of the result.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    apply_env_overrides, apply_overrides, deep_merge, load_settings, load_settings_from_path,
    settings_path,
};
pub use types::*;
