//! Configuration for the voxnote service.
//!
//! Three layers, lowest priority first:
//! 1. compiled defaults ([`VoxnoteSettings::default()`])
//! 2. `~/.voxnote/settings.json` or an explicit path, deep-merged over defaults
//! 3. `VOXNOTE_*` environment variables
//!
//! Credentials are only ever read from the file or the environment and are
//! never written back out when settings are serialized.

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    apply_overrides, deep_merge, load_settings, load_settings_from_path, settings_path,
    TOKEN_ENV_VARS,
};
pub use types::*;
