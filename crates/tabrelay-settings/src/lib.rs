//! # tabrelay-settings
//!
//! Layered configuration for the relay.
//!
//! Settings are resolved from three layers (in priority order):
//! 1. **Compiled defaults**: [`RelaySettings::default()`]
//! 2. **User file**: `~/.tabrelay/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `TABRELAY_*` overrides (highest priority)
//!
//! There is no global instance: the binary loads settings once and passes
//! them down to whatever needs them.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path, validate};
pub use types::{LoggingSettings, RelaySettings, ServerSettings, TimingSettings};
