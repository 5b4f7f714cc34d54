//! Data models for the deskwork engine.
//!
//! - [`EngineConfig`]: runtime, logging and demo settings loaded from `Engine Config.yaml`
//!   by [`ConfigManager`](crate::config::ConfigManager)

pub mod config;

pub use config::{DemoSettings, EngineConfig, LogSettings, RuntimeSettings};
