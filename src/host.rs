//! The boundary between the tracker and the editor hosting it.
//!
//! A host delivers document and focus events, dispatches commands, and
//! owns the status indicator widget. Everything the tracker acquires from
//! a host comes back as a guard that releases it when dropped.

use std::fmt;

use crate::counter::DocumentKey;

/// One edit within a document-change notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentChange {
    /// Text inserted by the edit.
    pub text: String,
    /// Number of characters the edit replaced or removed.
    pub range_length: usize,
}

impl ContentChange {
    pub fn insert(text: impl Into<String>) -> Self {
        ContentChange {
            text: text.into(),
            range_length: 0,
        }
    }

    pub fn delete(range_length: usize) -> Self {
        ContentChange {
            text: String::new(),
            range_length,
        }
    }

    /// Signed net character delta of this change.
    pub fn net_chars(&self) -> i64 {
        let inserted = i64::try_from(self.text.chars().count()).unwrap_or(i64::MAX);
        let removed = i64::try_from(self.range_length).unwrap_or(i64::MAX);
        inserted.saturating_sub(removed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentChange {
    pub document: DocumentKey,
    pub changes: Vec<ContentChange>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Command {
    CycleMode,
    ResetStats,
}

impl Command {
    pub const ALL: [Command; 2] = [Command::CycleMode, Command::ResetStats];

    pub fn id(self) -> &'static str {
        match self {
            Command::CycleMode => "keytally.cycleMode",
            Command::ResetStats => "keytally.resetStats",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Event streams a host can deliver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Feed {
    ActiveEditor,
    DocumentChanges,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    ActiveEditorChanged(Option<DocumentKey>),
    DocumentChanged(DocumentChange),
    Command(Command),
}

impl HostEvent {
    /// The registration a host needs before it may deliver this event.
    pub fn requires(&self) -> Registration {
        match self {
            HostEvent::ActiveEditorChanged(_) => Registration::Feed(Feed::ActiveEditor),
            HostEvent::DocumentChanged(_) => Registration::Feed(Feed::DocumentChanges),
            HostEvent::Command(command) => Registration::Command(*command),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Registration {
    Feed(Feed),
    Command(Command),
}

/// Creation-time settings of the right-aligned status indicator. Fixed for
/// its lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusItem {
    pub command: Option<Command>,
    pub tooltip: Option<String>,
}

impl Default for StatusItem {
    fn default() -> Self {
        StatusItem {
            command: Some(Command::CycleMode),
            tooltip: Some("Click to cycle through stats".to_string()),
        }
    }
}

/// A single-line, always-visible indicator. Dropping it removes it.
pub trait DisplaySink {
    fn set_text(&mut self, text: &str);
}

/// Releases a host registration when dropped.
#[must_use = "dropping a Subscription releases it immediately"]
pub struct Subscription {
    release: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub fn new(release: impl FnOnce() + 'static) -> Self {
        Subscription {
            release: Some(Box::new(release)),
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.release.is_some())
            .finish()
    }
}

/// Services an editor provides to the tracker.
pub trait Host {
    type Sink: DisplaySink;

    fn active_document(&self) -> Option<DocumentKey>;

    fn create_status_item(&mut self, item: StatusItem) -> Self::Sink;

    fn register_command(&mut self, command: Command) -> Subscription;

    fn subscribe(&mut self, feed: Feed) -> Subscription;
}
