// UI module - issuing-thread side of background work
//
// This module contains:
// - EventLoop: the mailbox that runs engine callbacks on the issuing thread
// - CancelableTask: cancel arbitration for task dialogs
// - ConsoleLoadingView: terminal progress bar used by the binary

pub mod bridge;
pub mod console;
pub mod task;

pub use bridge::{EventLoop, EventLoopHandle};
pub use console::ConsoleLoadingView;
pub use task::{AllowCancel, CancelPolicy, CancelableTask, DenyCancel};
