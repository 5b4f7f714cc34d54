use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Engine configuration from `Engine Config.yaml`
///
/// Every field has a default, so partial files load.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(rename = "Runtime", default)]
    pub runtime: RuntimeSettings,

    #[serde(rename = "Logging", default)]
    pub logging: LogSettings,

    #[serde(rename = "Demo", default)]
    pub demo: DemoSettings,
}

/// Thread pools on which work bodies execute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeSettings {
    #[serde(rename = "Worker Threads", default = "default_worker_threads")]
    pub worker_threads: usize,

    #[serde(rename = "Max Blocking Threads", default = "default_max_blocking_threads")]
    pub max_blocking_threads: usize,

    #[serde(rename = "Thread Name", default = "default_thread_name")]
    pub thread_name: String,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            worker_threads: default_worker_threads(),
            max_blocking_threads: default_max_blocking_threads(),
            thread_name: default_thread_name(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogSettings {
    #[serde(rename = "Directory", default = "default_log_directory")]
    pub directory: String,

    #[serde(rename = "Prefix", default = "default_log_prefix")]
    pub prefix: String,

    #[serde(rename = "Debug Mode", default)]
    pub debug_mode: bool,

    #[serde(rename = "Console Output", default = "default_true")]
    pub console_output: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            directory: default_log_directory(),
            prefix: default_log_prefix(),
            debug_mode: false,
            console_output: true,
        }
    }
}

/// Parameters of the job run by the demo binary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemoSettings {
    #[serde(rename = "Items", default = "default_demo_items")]
    pub items: i64,

    #[serde(rename = "Item Delay Ms", default = "default_item_delay_ms")]
    pub item_delay_ms: u64,
}

impl Default for DemoSettings {
    fn default() -> Self {
        Self {
            items: default_demo_items(),
            item_delay_ms: default_item_delay_ms(),
        }
    }
}

fn default_worker_threads() -> usize {
    2
}

fn default_max_blocking_threads() -> usize {
    16
}

fn default_thread_name() -> String {
    "deskwork-worker".to_string()
}

fn default_log_directory() -> String {
    "logs".to_string()
}

fn default_log_prefix() -> String {
    "deskwork".to_string()
}

fn default_true() -> bool {
    true
}

fn default_demo_items() -> i64 {
    20
}

fn default_item_delay_ms() -> u64 {
    100
}

impl EngineConfig {
    /// Build the multi-thread runtime that executes work bodies.
    ///
    /// Thread counts below one are raised to one.
    pub fn build_runtime(&self) -> Result<tokio::runtime::Runtime> {
        let settings = &self.runtime;
        tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .worker_threads(settings.worker_threads.max(1))
            .max_blocking_threads(settings.max_blocking_threads.max(1))
            .thread_name(settings.thread_name.clone())
            .build()
            .context("Failed to build tokio runtime")
    }
}
