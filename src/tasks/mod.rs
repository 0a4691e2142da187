//! Background Tasks Module
//!
//! Contains the deferred task dispatcher that runs eviction callbacks and
//! post-write purges off the caller's stack.

mod dispatcher;

pub use dispatcher::{channel, spawn_dispatcher, DeferredTask, Dispatcher, TaskQueue};
