//! Integration tests for AppWorker
//!
//! These tests verify that AppWorker:
//! - Ends the loading view before the single terminal notification
//! - Delivers updates in order and never after the terminal notification
//! - Rejects a second execution
//! - Resolves cancellation races to exactly one outcome

use deskwork::work::{WorkState, WorkerError};
use deskwork::{
    AppWorker, EventLoop, LoadingView, WorkCallback, WorkContext, WorkError,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq)]
enum Event {
    Start,
    End,
    Batch(Vec<u32>),
    Finished(String),
    Failed(String),
    Cancelled,
}

type Log = Arc<Mutex<Vec<Event>>>;

struct RecordingView {
    running: AtomicBool,
    log: Log,
}

impl LoadingView for RecordingView {
    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn start(&self) {
        self.running.store(true, Ordering::SeqCst);
        self.log.lock().unwrap().push(Event::Start);
    }

    fn end(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.log.lock().unwrap().push(Event::End);
    }
}

struct RecordingCallback {
    log: Log,
}

impl WorkCallback<String> for RecordingCallback {
    fn work_finished(&mut self, result: String) {
        self.log.lock().unwrap().push(Event::Finished(result));
    }

    fn work_failed(&mut self, error: WorkError) {
        self.log.lock().unwrap().push(Event::Failed(error.to_string()));
    }

    fn work_cancelled(&mut self) {
        self.log.lock().unwrap().push(Event::Cancelled);
    }
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .unwrap()
}

fn recording_worker(event_loop: &EventLoop) -> (AppWorker<String, u32>, Log) {
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let view = Arc::new(RecordingView {
        running: AtomicBool::new(false),
        log: log.clone(),
    });

    let batches = log.clone();
    let worker = AppWorker::builder(&event_loop.handle(), view)
        .callback(RecordingCallback { log: log.clone() })
        .listener(move |batch: Vec<u32>| batches.lock().unwrap().push(Event::Batch(batch)))
        .build();
    (worker, log)
}

fn terminal_count(log: &Log) -> usize {
    log.lock()
        .unwrap()
        .iter()
        .filter(|e| matches!(e, Event::Finished(_) | Event::Failed(_) | Event::Cancelled))
        .count()
}

fn delivered_updates(log: &Log) -> Vec<u32> {
    log.lock()
        .unwrap()
        .iter()
        .filter_map(|e| match e {
            Event::Batch(batch) => Some(batch.clone()),
            _ => None,
        })
        .flatten()
        .collect()
}

#[test]
fn test_finished_is_delivered_after_end() {
    let rt = runtime();
    let mut event_loop = EventLoop::new(rt.handle().clone());
    let (worker, log) = recording_worker(&event_loop);

    worker
        .execute(|_ctx: &WorkContext<u32>| {
            thread::sleep(Duration::from_millis(50));
            Ok("ok".to_string())
        })
        .unwrap();

    assert_eq!(*log.lock().unwrap(), vec![Event::Start]);
    assert!(event_loop.run_until(|| worker.is_completed(), WAIT));

    assert_eq!(
        *log.lock().unwrap(),
        vec![Event::Start, Event::End, Event::Finished("ok".to_string())]
    );
    assert_eq!(worker.state(), WorkState::Completed);
    assert!(!worker.is_cancelled());
}

#[test]
fn test_error_is_delivered_as_failure() {
    let rt = runtime();
    let mut event_loop = EventLoop::new(rt.handle().clone());
    let (worker, log) = recording_worker(&event_loop);

    worker
        .execute(|_ctx: &WorkContext<u32>| -> anyhow::Result<String> { anyhow::bail!("boom") })
        .unwrap();

    assert!(event_loop.run_until(|| worker.is_completed(), WAIT));
    assert_eq!(
        *log.lock().unwrap(),
        vec![Event::Start, Event::End, Event::Failed("boom".to_string())]
    );
    assert_eq!(worker.state(), WorkState::Failed);
}

#[test]
fn test_cancel_of_blocking_body_reports_cancelled() {
    let rt = runtime();
    let mut event_loop = EventLoop::new(rt.handle().clone());
    let (worker, log) = recording_worker(&event_loop);

    worker
        .execute(|_ctx: &WorkContext<u32>| {
            thread::sleep(Duration::from_secs(5));
            Ok("too late".to_string())
        })
        .unwrap();
    assert!(worker.cancel());

    assert!(event_loop.run_until(|| worker.is_completed(), WAIT));
    assert_eq!(
        *log.lock().unwrap(),
        vec![Event::Start, Event::End, Event::Cancelled]
    );
    assert!(worker.is_cancelled());

    // The sleeping body is abandoned.
    rt.shutdown_background();
}

#[test]
fn test_late_result_of_cooperative_body_is_discarded() {
    let rt = runtime();
    let mut event_loop = EventLoop::new(rt.handle().clone());
    let metrics = event_loop.handle().metrics().clone();
    let (worker, log) = recording_worker(&event_loop);

    worker
        .execute(|ctx: &WorkContext<u32>| {
            while !ctx.is_cancelled() {
                thread::sleep(Duration::from_millis(1));
            }
            Ok("ignored".to_string())
        })
        .unwrap();

    assert!(worker.cancel());
    assert!(event_loop.run_until(
        || metrics.results_discarded.load(Ordering::Relaxed) == 1,
        WAIT
    ));
    event_loop.run_pending();

    assert_eq!(terminal_count(&log), 1);
    assert_eq!(log.lock().unwrap().last(), Some(&Event::Cancelled));
    assert_eq!(metrics.executions_cancelled.load(Ordering::Relaxed), 1);
    assert_eq!(metrics.executions_finished.load(Ordering::Relaxed), 0);
}

#[test]
fn test_second_execute_is_rejected() {
    let rt = runtime();
    let mut event_loop = EventLoop::new(rt.handle().clone());
    let (worker, log) = recording_worker(&event_loop);
    let runs = Arc::new(AtomicUsize::new(0));

    let first = runs.clone();
    worker
        .execute(move |_ctx: &WorkContext<u32>| {
            first.fetch_add(1, Ordering::SeqCst);
            Ok("first".to_string())
        })
        .unwrap();

    let second = runs.clone();
    let result = worker.execute(move |_ctx: &WorkContext<u32>| {
        second.fetch_add(1, Ordering::SeqCst);
        Ok("second".to_string())
    });
    assert_eq!(result, Err(WorkerError::AlreadyExecuted));

    assert!(event_loop.run_until(|| worker.is_completed(), WAIT));
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert_eq!(terminal_count(&log), 1);

    // Still rejected after completion.
    let third = worker.execute(|_ctx: &WorkContext<u32>| Ok(String::new()));
    assert_eq!(third, Err(WorkerError::AlreadyExecuted));
}

#[test]
fn test_cancel_is_idempotent_until_termination() {
    let rt = runtime();
    let mut event_loop = EventLoop::new(rt.handle().clone());
    let (worker, log) = recording_worker(&event_loop);

    assert!(!worker.cancel(), "nothing to cancel before execute");

    worker
        .execute(|ctx: &WorkContext<u32>| {
            while !ctx.is_cancelled() {
                thread::sleep(Duration::from_millis(1));
            }
            Ok(String::new())
        })
        .unwrap();

    for _ in 0..5 {
        assert!(worker.cancel());
    }

    assert!(event_loop.run_until(|| worker.is_completed(), WAIT));
    for _ in 0..5 {
        assert!(!worker.cancel());
    }
    assert_eq!(terminal_count(&log), 1);
}

#[test]
fn test_cancel_after_natural_completion_returns_false() {
    let rt = runtime();
    let mut event_loop = EventLoop::new(rt.handle().clone());
    let (worker, log) = recording_worker(&event_loop);

    worker
        .execute(|_ctx: &WorkContext<u32>| Ok("done".to_string()))
        .unwrap();

    // Wait until the result is stored but do not dispatch it yet.
    let deadline = std::time::Instant::now() + WAIT;
    while worker.state() == WorkState::Running && std::time::Instant::now() < deadline {
        thread::sleep(Duration::from_millis(1));
    }
    assert_eq!(worker.state(), WorkState::Completed);
    assert!(!worker.is_completed());
    assert!(!worker.cancel());

    assert!(event_loop.run_until(|| worker.is_completed(), WAIT));
    assert_eq!(log.lock().unwrap().last(), Some(&Event::Finished("done".to_string())));
}

#[test]
fn test_updates_arrive_in_order_before_terminal() {
    let rt = runtime();
    let mut event_loop = EventLoop::new(rt.handle().clone());
    let (worker, log) = recording_worker(&event_loop);

    worker
        .execute(|ctx: &WorkContext<u32>| {
            for i in 0..500 {
                ctx.update(i)?;
                if i % 50 == 0 {
                    thread::sleep(Duration::from_millis(1));
                }
            }
            Ok("counted".to_string())
        })
        .unwrap();

    assert!(event_loop.run_until(|| worker.is_completed(), WAIT));

    assert_eq!(delivered_updates(&log), (0..500).collect::<Vec<_>>());

    let events = log.lock().unwrap();
    let end = events.iter().position(|e| *e == Event::End).unwrap();
    assert!(events[end + 1..].iter().all(|e| !matches!(e, Event::Batch(_))));
    assert_eq!(events.last(), Some(&Event::Finished("counted".to_string())));
}

#[test]
fn test_updates_after_cancel_are_never_delivered() {
    let rt = runtime();
    let mut event_loop = EventLoop::new(rt.handle().clone());
    let metrics = event_loop.handle().metrics().clone();
    let (worker, log) = recording_worker(&event_loop);
    let (started_tx, started_rx) = std::sync::mpsc::channel();

    worker
        .execute(move |ctx: &WorkContext<u32>| {
            ctx.update(1)?;
            started_tx.send(()).unwrap();
            while !ctx.is_cancelled() {
                thread::sleep(Duration::from_millis(1));
            }
            for i in 100..110 {
                ctx.update(i)?;
            }
            Ok("ignored".to_string())
        })
        .unwrap();

    started_rx.recv_timeout(WAIT).unwrap();
    assert!(worker.cancel());
    assert!(event_loop.run_until(
        || metrics.results_discarded.load(Ordering::Relaxed) == 1,
        WAIT
    ));
    event_loop.run_pending();

    let events = log.lock().unwrap();
    assert_eq!(events.last(), Some(&Event::Cancelled));
    assert!(events.iter().all(|e| match e {
        Event::Batch(batch) => batch.iter().all(|&v| v < 100),
        _ => true,
    }));
    assert_eq!(metrics.updates_dropped.load(Ordering::Relaxed), 10);
}

#[test]
fn test_worker_without_callback_still_ends_view() {
    let rt = runtime();
    let mut event_loop = EventLoop::new(rt.handle().clone());
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let view = Arc::new(RecordingView {
        running: AtomicBool::new(false),
        log: log.clone(),
    });

    let worker: AppWorker<()> = AppWorker::new(&event_loop.handle(), view.clone());
    worker
        .execute(|_ctx: &WorkContext<()>| -> anyhow::Result<()> { anyhow::bail!("unobserved") })
        .unwrap();

    assert!(event_loop.run_until(|| worker.is_completed(), WAIT));
    assert_eq!(*log.lock().unwrap(), vec![Event::Start, Event::End]);
    assert!(!view.is_running());
    assert_eq!(
        event_loop.handle().metrics().executions_failed.load(Ordering::Relaxed),
        1
    );
}

#[test]
fn test_async_body_finishes() {
    let rt = runtime();
    let mut event_loop = EventLoop::new(rt.handle().clone());
    let (worker, log) = recording_worker(&event_loop);

    worker
        .execute_async(|ctx: WorkContext<u32>| async move {
            for i in 0..3 {
                tokio::time::sleep(Duration::from_millis(5)).await;
                ctx.update(i)?;
            }
            Ok::<_, anyhow::Error>("async".to_string())
        })
        .unwrap();

    assert!(event_loop.run_until(|| worker.is_completed(), WAIT));
    assert_eq!(delivered_updates(&log), vec![0, 1, 2]);
    assert_eq!(log.lock().unwrap().last(), Some(&Event::Finished("async".to_string())));
}

#[test]
fn test_async_body_is_aborted_on_cancel() {
    let rt = runtime();
    let mut event_loop = EventLoop::new(rt.handle().clone());
    let (worker, log) = recording_worker(&event_loop);
    let reached_end = Arc::new(AtomicBool::new(false));

    let flag = reached_end.clone();
    worker
        .execute_async(move |_ctx: WorkContext<u32>| async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            flag.store(true, Ordering::SeqCst);
            Ok::<_, anyhow::Error>("never".to_string())
        })
        .unwrap();
    assert!(worker.cancel());

    assert!(event_loop.run_until(|| worker.is_completed(), WAIT));
    assert_eq!(
        *log.lock().unwrap(),
        vec![Event::Start, Event::End, Event::Cancelled]
    );
    assert!(!reached_end.load(Ordering::SeqCst));
}

#[test]
fn test_panicking_async_factory_reports_failure() {
    let rt = runtime();
    let mut event_loop = EventLoop::new(rt.handle().clone());
    let (worker, log) = recording_worker(&event_loop);

    worker
        .execute_async(|_ctx: WorkContext<u32>| -> std::future::Ready<anyhow::Result<String>> {
            panic!("factory")
        })
        .unwrap();

    assert!(event_loop.run_until(|| worker.is_completed(), WAIT));
    assert_eq!(
        *log.lock().unwrap(),
        vec![Event::Start, Event::End, Event::Failed("work panicked: factory".to_string())]
    );
    assert_eq!(worker.state(), WorkState::Failed);
}

#[test]
fn test_panicking_async_body_reports_failure() {
    let rt = runtime();
    let mut event_loop = EventLoop::new(rt.handle().clone());
    let (worker, log) = recording_worker(&event_loop);

    worker
        .execute_async(|_ctx: WorkContext<u32>| async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            if true {
                panic!("async body");
            }
            Ok::<_, anyhow::Error>(String::new())
        })
        .unwrap();

    assert!(event_loop.run_until(|| worker.is_completed(), WAIT));
    assert_eq!(
        *log.lock().unwrap(),
        vec![Event::Start, Event::End, Event::Failed("work panicked: async body".to_string())]
    );
    assert_eq!(worker.state(), WorkState::Failed);
}

#[test]
fn test_racing_cancel_delivers_exactly_one_outcome() {
    let rt = runtime();
    let mut event_loop = EventLoop::new(rt.handle().clone());

    for round in 0..50 {
        let (worker, log) = recording_worker(&event_loop);
        worker
            .execute(|_ctx: &WorkContext<u32>| Ok("raced".to_string()))
            .unwrap();

        if round % 2 == 0 {
            thread::yield_now();
        }
        let cancelled = worker.cancel();

        assert!(event_loop.run_until(|| worker.is_completed(), WAIT));
        event_loop.run_pending();

        assert_eq!(terminal_count(&log), 1);
        let last = log.lock().unwrap().last().cloned();
        if cancelled {
            assert_eq!(last, Some(Event::Cancelled));
            assert!(worker.is_cancelled());
        } else {
            assert_eq!(last, Some(Event::Finished("raced".to_string())));
            assert!(!worker.is_cancelled());
        }
    }
}
