use tracing::{debug, trace};

use crate::counter::{CounterPair, CounterStore, DocumentKey};
use crate::error::Result;
use crate::format;
use crate::host::{Command, DisplaySink, DocumentChange, Feed, Host, HostEvent, StatusItem, Subscription};
use crate::mode::{DisplayMode, ModeCycle};

/// Binds the counters, formatter and mode cycle to a host.
///
/// Only one tracker should exist per host session. Everything it acquired
/// from the host is released when it is deactivated or dropped.
pub struct Tracker<S: DisplaySink> {
    // Field order is drop order: subscriptions go before the sink.
    subscriptions: Vec<Subscription>,
    sink: S,
    counters: Box<dyn CounterStore>,
    modes: ModeCycle,
    active_document: Option<DocumentKey>,
}

impl<S: DisplaySink> Tracker<S> {
    /// Creates the status item, registers both commands and both feeds,
    /// picks up the host's current document, and renders once.
    pub fn activate<H>(host: &mut H, counters: Box<dyn CounterStore>) -> Self
    where
        H: Host<Sink = S>,
    {
        let sink = host.create_status_item(StatusItem::default());

        let mut subscriptions = Vec::with_capacity(Command::ALL.len() + 2);
        for command in Command::ALL {
            subscriptions.push(host.register_command(command));
        }
        subscriptions.push(host.subscribe(Feed::ActiveEditor));
        subscriptions.push(host.subscribe(Feed::DocumentChanges));

        let active_document = host.active_document();
        debug!(active = ?active_document.as_ref().map(DocumentKey::as_str), "tracker activated");

        let mut tracker = Tracker {
            subscriptions,
            sink,
            counters,
            modes: ModeCycle::new(),
            active_document,
        };
        tracker.render();
        tracker
    }

    pub fn handle(&mut self, event: HostEvent) {
        match event {
            HostEvent::ActiveEditorChanged(document) => self.on_active_document_changed(document),
            HostEvent::DocumentChanged(change) => {
                self.on_document_edited(&change);
            }
            HostEvent::Command(Command::CycleMode) => {
                self.on_cycle_command();
            }
            HostEvent::Command(Command::ResetStats) => {
                self.on_reset_command();
            }
        }
    }

    pub fn on_active_document_changed(&mut self, document: Option<DocumentKey>) {
        debug!(active = ?document.as_ref().map(DocumentKey::as_str), "active document changed");
        self.active_document = document;
        self.render();
    }

    /// Counts one keystroke for the active document. Returns the updated
    /// counters, or `None` when the notification was ignored: it targets
    /// another document or carries no content changes.
    pub fn on_document_edited(&mut self, change: &DocumentChange) -> Option<CounterPair> {
        if self.active_document.as_ref() != Some(&change.document) {
            return None;
        }
        let first = change.changes.first()?;

        let pair = self.counters.get(&change.document).record(first.net_chars());
        self.counters.set(&change.document, pair);
        trace!(
            document = change.document.as_str(),
            key_count = pair.key_count,
            char_count = pair.char_count,
            "edit counted"
        );

        self.render();
        Some(pair)
    }

    pub fn on_cycle_command(&mut self) -> DisplayMode {
        let mode = self.modes.next();
        debug!(?mode, "display mode cycled");
        self.render();
        mode
    }

    /// Zeroes the active document's counters. Returns the document that was
    /// reset, or `None` when nothing is active.
    pub fn on_reset_command(&mut self) -> Option<DocumentKey> {
        let document = self.active_document.clone()?;
        self.counters.reset(&document);
        debug!(document = document.as_str(), "stats reset");
        self.render();
        Some(document)
    }

    pub fn active_document(&self) -> Option<&DocumentKey> {
        self.active_document.as_ref()
    }

    pub fn active_counters(&self) -> Option<CounterPair> {
        self.active_document
            .as_ref()
            .map(|document| self.counters.get(document))
    }

    pub fn counters_for(&self, document: &DocumentKey) -> CounterPair {
        self.counters.get(document)
    }

    pub fn mode(&self) -> DisplayMode {
        self.modes.current()
    }

    /// What the indicator shows: empty with no active document.
    pub fn display_text(&self) -> String {
        match self.active_counters() {
            Some(pair) => format::render(self.modes.current(), pair),
            None => String::new(),
        }
    }

    pub fn render(&mut self) {
        let text = self.display_text();
        self.sink.set_text(&text);
    }

    /// Persists counters without tearing anything down.
    pub fn flush(&mut self) -> Result<()> {
        self.counters.flush()
    }

    /// Releases every subscription and the status item, then persists.
    pub fn deactivate(self) -> Result<()> {
        let Tracker {
            subscriptions,
            sink,
            mut counters,
            ..
        } = self;
        drop(subscriptions);
        drop(sink);
        debug!("tracker deactivated");
        counters.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counter::MemoryCounters;
    use crate::host::ContentChange;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct Shared {
        text: Option<String>,
        registrations: usize,
    }

    struct Sink(Rc<RefCell<Shared>>);

    impl DisplaySink for Sink {
        fn set_text(&mut self, text: &str) {
            self.0.borrow_mut().text = Some(text.to_string());
        }
    }

    impl Drop for Sink {
        fn drop(&mut self) {
            self.0.borrow_mut().text = None;
        }
    }

    struct TestHost {
        shared: Rc<RefCell<Shared>>,
        active: Option<DocumentKey>,
    }

    impl TestHost {
        fn registration(&self) -> Subscription {
            self.shared.borrow_mut().registrations += 1;
            let shared = Rc::clone(&self.shared);
            Subscription::new(move || shared.borrow_mut().registrations -= 1)
        }
    }

    impl Host for TestHost {
        type Sink = Sink;

        fn active_document(&self) -> Option<DocumentKey> {
            self.active.clone()
        }

        fn create_status_item(&mut self, _item: StatusItem) -> Sink {
            Sink(Rc::clone(&self.shared))
        }

        fn register_command(&mut self, _command: Command) -> Subscription {
            self.registration()
        }

        fn subscribe(&mut self, _feed: Feed) -> Subscription {
            self.registration()
        }
    }

    fn host(active: Option<&str>) -> TestHost {
        TestHost {
            shared: Rc::new(RefCell::new(Shared::default())),
            active: active.map(DocumentKey::new),
        }
    }

    fn typed(document: &str, text: &str) -> DocumentChange {
        DocumentChange {
            document: DocumentKey::new(document),
            changes: vec![ContentChange::insert(text)],
        }
    }

    #[test]
    fn activation_renders_current_document() {
        let mut host = host(Some("a"));
        let tracker = Tracker::activate(&mut host, Box::new(MemoryCounters::new()));
        assert_eq!(host.shared.borrow().text.as_deref(), Some("-- coding boost"));
        assert_eq!(host.shared.borrow().registrations, 4);
        assert_eq!(tracker.active_document(), Some(&DocumentKey::new("a")));
    }

    #[test]
    fn no_active_document_shows_empty_text() {
        let mut host = host(None);
        let tracker = Tracker::activate(&mut host, Box::new(MemoryCounters::new()));
        assert_eq!(host.shared.borrow().text.as_deref(), Some(""));
        assert_eq!(tracker.active_counters(), None);
    }

    #[test]
    fn only_first_change_is_counted() {
        let mut host = host(Some("a"));
        let mut tracker = Tracker::activate(&mut host, Box::new(MemoryCounters::new()));
        let change = DocumentChange {
            document: DocumentKey::new("a"),
            changes: vec![ContentChange::insert("abc"), ContentChange::insert("zzzz")],
        };
        assert_eq!(tracker.on_document_edited(&change), Some(CounterPair::new(1, 3)));
    }

    #[test]
    fn reset_without_active_document_is_noop() {
        let mut host = host(None);
        let mut tracker = Tracker::activate(&mut host, Box::new(MemoryCounters::new()));
        assert_eq!(tracker.on_reset_command(), None);
    }

    #[test]
    fn cycle_rerenders_in_new_mode() {
        let mut host = host(Some("a"));
        let mut tracker = Tracker::activate(&mut host, Box::new(MemoryCounters::new()));
        tracker.on_document_edited(&typed("a", "x"));
        assert_eq!(tracker.on_cycle_command(), DisplayMode::TypingReduction);
        assert_eq!(host.shared.borrow().text.as_deref(), Some("0% reduction"));
    }

    #[test]
    fn deactivate_releases_everything() {
        let mut host = host(Some("a"));
        let tracker = Tracker::activate(&mut host, Box::new(MemoryCounters::new()));
        tracker.deactivate().unwrap();
        assert_eq!(host.shared.borrow().registrations, 0);
        assert_eq!(host.shared.borrow().text, None);
    }

    #[test]
    fn dropping_tracker_also_releases() {
        let mut host = host(Some("a"));
        {
            let _tracker = Tracker::activate(&mut host, Box::new(MemoryCounters::new()));
        }
        assert_eq!(host.shared.borrow().registrations, 0);
    }
}
