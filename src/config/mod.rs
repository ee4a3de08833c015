//! Configuration loaded from `hostvault.toml`.

pub mod settings;

pub use settings::Settings;
