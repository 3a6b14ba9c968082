//! Per-document keystroke and net-character counters with a cycling
//! status indicator.
//!
//! The [`Tracker`] reacts to host events (focus changes, edits, and the
//! `cycleMode` / `resetStats` commands) and pushes one line of text to
//! the host's status indicator.

pub mod config;
pub mod counter;
pub mod error;
pub mod format;
pub mod host;
pub mod mode;
pub mod state;
pub mod tracker;

pub use counter::{CounterPair, CounterStore, DocumentKey, DurableCounters, MemoryCounters};
pub use error::{Error, Result};
pub use host::{Command, ContentChange, DisplaySink, DocumentChange, Feed, Host, HostEvent, Subscription};
pub use mode::DisplayMode;
pub use state::{KeyValueStore, MemoryState, StateFile};
pub use tracker::Tracker;
