pub mod env;
mod loader;

pub use env::{
    AppConfig, ConfigError, DetectorConfig, DirectoryConfig, ObserverOptions, Profile, RevealMode,
};
pub use loader::{load_config, parse_margin};
