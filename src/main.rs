//! deskwork - console demo of the background work engine
//!
//! Runs one progress-reporting job on the tokio blocking pool while the main
//! thread acts as the issuing thread, drawing a progress bar on stderr.
//!
//! # Execution Flow
//!
//! 1. Load `deskwork Data/Engine Config.yaml` (defaults if missing)
//! 2. Initialize logging → `<Directory>/<Prefix>.<date>`
//! 3. Build the tokio runtime from the `Runtime` section
//! 4. Start the demo job through a `ProgressWorkManager`
//! 5. Run the event loop on the main thread until the job reports back
//! 6. Log the metrics summary and shut down the runtime
//!
//! Ctrl-C cancels the running job.

use anyhow::Result;
use deskwork::ui::ConsoleLoadingView;
use deskwork::{APP_NAME, ConfigManager, EventLoop, FnCallback, ProgressWorkManager, VERSION};
use std::sync::Arc;
use std::time::Duration;

fn main() -> Result<()> {
    let config_manager = ConfigManager::new("deskwork Data")?;
    let config = config_manager.load_engine_config()?;

    let _log_guard = deskwork::logging::setup_from_settings(&config.logging)?;
    tracing::info!("Starting {} v{}", APP_NAME, VERSION);

    let runtime = config.build_runtime()?;
    tracing::info!(
        "Tokio runtime initialized with {} worker threads",
        config.runtime.worker_threads
    );

    // The main thread is the issuing thread from here on.
    let mut event_loop = EventLoop::new(runtime.handle().clone());
    let events = event_loop.handle();

    let on_finished = events.clone();
    let on_failed = events.clone();
    let on_cancelled = events.clone();
    let callback = FnCallback::new(move |processed: i64| {
        tracing::info!("Demo job finished after {} items", processed);
        on_finished.quit();
    })
    .on_failed(move |error| {
        tracing::error!("Demo job failed: {}", error);
        on_failed.quit();
    })
    .on_cancelled(move || {
        tracing::warn!("Demo job cancelled");
        on_cancelled.quit();
    });

    let items = config.demo.items;
    let delay = Duration::from_millis(config.demo.item_delay_ms);
    let manager: ProgressWorkManager<i64> = ProgressWorkManager::with_size(
        &events,
        Arc::new(ConsoleLoadingView::stderr()),
        Some(Box::new(callback)),
        items,
    );

    manager.execute(move |progress| {
        for _ in 0..items {
            if progress.is_cancelled() {
                break;
            }
            std::thread::sleep(delay);
            progress.advance(1)?;
        }
        Ok(progress.progress().processed())
    })?;

    let worker = manager.worker().clone();
    runtime.spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() && worker.cancel() {
            tracing::info!("Ctrl-C received, cancelling demo job");
        }
    });

    event_loop.run();

    events.metrics().log_summary();

    runtime.shutdown_timeout(Duration::from_secs(5));
    tracing::info!("Shutdown complete");

    Ok(())
}
