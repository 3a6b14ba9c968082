// Terminal host for the keytally tracker: a small multi-document editor
// that feeds edits and focus changes to the tracker and draws its status
// indicator on the bottom bar.
use crossterm::{
    cursor::{Hide, MoveTo, Show},
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
        KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
    },
    execute,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal::{
        self, Clear, ClearType, DisableLineWrap, EnableLineWrap, EnterAlternateScreen,
        LeaveAlternateScreen,
    },
};
use std::cell::RefCell;
use std::collections::{BTreeSet, VecDeque};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::Local;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use keytally::config::{Config, Storage};
use keytally::counter::documents_in;
use keytally::host::{Registration, StatusItem};
use keytally::{
    format, Command, ContentChange, CounterStore, DisplayMode, DisplaySink, DocumentChange,
    DocumentKey, DurableCounters, Feed, Host, HostEvent, MemoryCounters, StateFile,
    Subscription, Tracker,
};

// One open buffer. Lines are stored as Vec<char> so cursor columns are
// character indices.
struct Document {
    key: DocumentKey,
    buffer: Vec<Vec<char>>,
    cursor_x: usize,
    cursor_y: usize,
    offset_y: usize,
    offset_x: usize,
    filename: Option<PathBuf>,
    modified: bool,
}

impl Document {
    fn untitled(n: usize) -> Self {
        Document {
            key: DocumentKey::untitled(n),
            buffer: vec![Vec::new()],
            cursor_x: 0,
            cursor_y: 0,
            offset_y: 0,
            offset_x: 0,
            filename: None,
            modified: false,
        }
    }

    fn load(path: &Path) -> io::Result<Self> {
        // A path that does not exist yet opens as an empty buffer.
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e),
        };

        let mut buffer: Vec<Vec<char>> = content.lines().map(|line| line.chars().collect()).collect();
        if buffer.is_empty() {
            buffer.push(Vec::new());
        }

        // Position cursor at end of file
        let cursor_y = buffer.len() - 1;
        let cursor_x = buffer[cursor_y].len();

        Ok(Document {
            key: DocumentKey::from_path(path),
            buffer,
            cursor_x,
            cursor_y,
            offset_y: 0,
            offset_x: 0,
            filename: Some(path.to_path_buf()),
            modified: false,
        })
    }

    fn title(&self) -> String {
        match &self.filename {
            Some(path) => path
                .file_name()
                .map(|name| name.to_string_lossy().to_string())
                .unwrap_or_else(|| path.to_string_lossy().to_string()),
            None => self.key.to_string(),
        }
    }

    fn current_line(&self) -> &Vec<char> {
        &self.buffer[self.cursor_y]
    }

    fn save(&mut self) -> io::Result<()> {
        if let Some(filename) = &self.filename {
            let content: String = self
                .buffer
                .iter()
                .map(|line| line.iter().collect::<String>())
                .collect::<Vec<String>>()
                .join("\n");
            fs::write(filename, content)?;
            self.modified = false;
        }
        Ok(())
    }

    // Editing methods return the change they made, or None when the key
    // had nothing to act on (backspace at the start of the buffer).

    fn insert_text(&mut self, text: &str) -> Option<ContentChange> {
        for c in text.chars() {
            self.buffer[self.cursor_y].insert(self.cursor_x, c);
            self.cursor_x += 1;
        }
        self.modified = true;
        Some(ContentChange::insert(text))
    }

    fn insert_newline(&mut self) -> Option<ContentChange> {
        let new_line: Vec<char> = self.buffer[self.cursor_y].drain(self.cursor_x..).collect();
        self.buffer.insert(self.cursor_y + 1, new_line);
        self.cursor_y += 1;
        self.cursor_x = 0;
        self.modified = true;
        Some(ContentChange::insert("\n"))
    }

    fn backspace(&mut self) -> Option<ContentChange> {
        if self.cursor_x > 0 {
            self.buffer[self.cursor_y].remove(self.cursor_x - 1);
            self.cursor_x -= 1;
        } else if self.cursor_y > 0 {
            let current_line = self.buffer.remove(self.cursor_y);
            self.cursor_y -= 1;
            self.cursor_x = self.buffer[self.cursor_y].len();
            self.buffer[self.cursor_y].extend(current_line);
        } else {
            return None;
        }
        self.modified = true;
        Some(ContentChange::delete(1))
    }

    fn delete(&mut self) -> Option<ContentChange> {
        let line_len = self.current_line().len();
        if self.cursor_x < line_len {
            self.buffer[self.cursor_y].remove(self.cursor_x);
        } else if self.cursor_y < self.buffer.len() - 1 {
            let next_line = self.buffer.remove(self.cursor_y + 1);
            self.buffer[self.cursor_y].extend(next_line);
        } else {
            return None;
        }
        self.modified = true;
        Some(ContentChange::delete(1))
    }

    fn move_left(&mut self) {
        if self.cursor_x > 0 {
            self.cursor_x -= 1;
        } else if self.cursor_y > 0 {
            self.cursor_y -= 1;
            self.cursor_x = self.current_line().len();
        }
    }

    fn move_right(&mut self) {
        if self.cursor_x < self.current_line().len() {
            self.cursor_x += 1;
        } else if self.cursor_y < self.buffer.len() - 1 {
            self.cursor_y += 1;
            self.cursor_x = 0;
        }
    }

    fn move_up(&mut self) {
        if self.cursor_y > 0 {
            self.cursor_y -= 1;
            self.cursor_x = self.cursor_x.min(self.current_line().len());
        }
    }

    fn move_down(&mut self) {
        if self.cursor_y < self.buffer.len() - 1 {
            self.cursor_y += 1;
            self.cursor_x = self.cursor_x.min(self.current_line().len());
        }
    }

    fn move_home(&mut self) {
        self.cursor_x = 0;
    }

    fn move_end(&mut self) {
        self.cursor_x = self.current_line().len();
    }

    fn update_offset(&mut self, visible_width: usize, visible_height: usize) {
        // Vertical scrolling
        if self.cursor_y < self.offset_y {
            self.offset_y = self.cursor_y;
        } else if self.cursor_y >= self.offset_y + visible_height {
            self.offset_y = self.cursor_y - visible_height + 1;
        }

        // Horizontal scrolling
        if self.cursor_x < self.offset_x {
            self.offset_x = self.cursor_x;
        } else if self.cursor_x >= self.offset_x + visible_width {
            self.offset_x = self.cursor_x - visible_width + 1;
        }
    }
}

// The status indicator as the host sees it.
struct StatusSlot {
    item: StatusItem,
    text: String,
}

// State shared between the workbench and the guards it hands out. Rc
// because everything runs on the one UI thread.
#[derive(Default)]
struct HostState {
    registrations: BTreeSet<Registration>,
    status: Option<StatusSlot>,
    dirty: bool,
}

struct TerminalStatusItem {
    state: Rc<RefCell<HostState>>,
}

impl DisplaySink for TerminalStatusItem {
    fn set_text(&mut self, text: &str) {
        let state = &mut *self.state.borrow_mut();
        if let Some(slot) = state.status.as_mut() {
            if slot.text != text {
                slot.text = text.to_string();
                state.dirty = true;
            }
        }
    }
}

impl Drop for TerminalStatusItem {
    fn drop(&mut self) {
        let mut state = self.state.borrow_mut();
        state.status = None;
        state.dirty = true;
    }
}

// The editor window: open documents, focus, and the event queue the
// tracker drains.
struct Workbench {
    documents: Vec<Document>,
    active: Option<usize>,
    untitled_count: usize,
    state: Rc<RefCell<HostState>>,
    pending: VecDeque<HostEvent>,
    terminal_width: u16,
    terminal_height: u16,
    tab_size: usize,
    message: Option<String>,
    dirty: bool,
}

impl Workbench {
    fn new(config: &Config) -> io::Result<Self> {
        let (width, height) = terminal::size()?;
        Ok(Self::with_size(config, width, height))
    }

    fn with_size(config: &Config, width: u16, height: u16) -> Self {
        Workbench {
            documents: Vec::new(),
            active: None,
            untitled_count: 0,
            state: Rc::new(RefCell::new(HostState::default())),
            pending: VecDeque::new(),
            terminal_width: width,
            terminal_height: height,
            tab_size: config.tab_size,
            message: None,
            dirty: true,
        }
    }

    fn open(&mut self, path: &Path) -> io::Result<()> {
        let document = Document::load(path)?;
        info!(document = document.key.as_str(), "opened");
        self.documents.push(document);
        self.focus(Some(self.documents.len() - 1));
        Ok(())
    }

    fn open_untitled(&mut self) {
        self.untitled_count += 1;
        self.documents.push(Document::untitled(self.untitled_count));
        self.focus(Some(self.documents.len() - 1));
    }

    fn active_doc_mut(&mut self) -> Option<&mut Document> {
        let index = self.active?;
        self.documents.get_mut(index)
    }

    fn active_doc(&self) -> Option<&Document> {
        self.documents.get(self.active?)
    }

    // Queues an event for the tracker if it registered for it.
    fn emit(&mut self, event: HostEvent) {
        if self.state.borrow().registrations.contains(&event.requires()) {
            self.pending.push_back(event);
        }
    }

    fn take_events(&mut self) -> Vec<HostEvent> {
        self.pending.drain(..).collect()
    }

    fn focus(&mut self, index: Option<usize>) {
        if index == self.active {
            return;
        }
        self.active = index;
        let key = self.active_doc().map(|doc| doc.key.clone());
        self.emit(HostEvent::ActiveEditorChanged(key));
        self.dirty = true;
    }

    fn cycle_focus(&mut self, forward: bool) {
        let count = self.documents.len();
        if count == 0 {
            return;
        }
        let current = self.active.unwrap_or(0);
        let next = if forward {
            (current + 1) % count
        } else {
            (current + count - 1) % count
        };
        self.focus(Some(next));
    }

    fn close_active(&mut self) {
        let Some(index) = self.active else {
            return;
        };
        let closed = self.documents.remove(index);
        info!(document = closed.key.as_str(), "closed");

        // Clear first so the focus change below is always emitted.
        self.active = None;
        let next = if self.documents.is_empty() {
            None
        } else {
            Some(index.min(self.documents.len() - 1))
        };
        if next.is_none() {
            self.emit(HostEvent::ActiveEditorChanged(None));
            self.dirty = true;
        } else {
            self.focus(next);
        }
    }

    // Applies one edit to the active document and reports it.
    fn edit(&mut self, apply: impl FnOnce(&mut Document) -> Option<ContentChange>) {
        let Some(doc) = self.active_doc_mut() else {
            return;
        };
        let Some(change) = apply(doc) else {
            return;
        };
        let document = doc.key.clone();
        self.emit(HostEvent::DocumentChanged(DocumentChange {
            document,
            changes: vec![change],
        }));
        self.dirty = true;
    }

    fn navigate(&mut self, motion: impl FnOnce(&mut Document)) {
        if let Some(doc) = self.active_doc_mut() {
            motion(doc);
            self.dirty = true;
        }
    }

    fn invoke(&mut self, command: Command) {
        self.emit(HostEvent::Command(command));
    }

    fn save_active(&mut self) {
        let Some(doc) = self.active_doc_mut() else {
            return;
        };
        let message = if doc.filename.is_none() {
            "Untitled buffers are not saved".to_string()
        } else {
            match doc.save() {
                Ok(()) => format!("Saved {}", doc.title()),
                Err(e) => {
                    warn!(error = %e, "save failed");
                    format!("Save failed: {}", e)
                }
            }
        };
        self.message = Some(message);
        self.dirty = true;
    }

    // Returns true when the editor should exit.
    fn handle_key_event(&mut self, key_event: KeyEvent) -> bool {
        // Some terminals (Windows) also report releases and repeats.
        if key_event.kind != KeyEventKind::Press {
            return false;
        }
        let ctrl = key_event.modifiers.contains(KeyModifiers::CONTROL);
        self.message = None;

        match key_event.code {
            KeyCode::Char('q') if ctrl => return true,
            KeyCode::Char('s') if ctrl => self.save_active(),
            KeyCode::Char('n') if ctrl => self.cycle_focus(true),
            KeyCode::Char('p') if ctrl => self.cycle_focus(false),
            KeyCode::Char('w') if ctrl => self.close_active(),
            KeyCode::Char('t') if ctrl => self.invoke(Command::CycleMode),
            KeyCode::Char('r') if ctrl => self.invoke(Command::ResetStats),
            KeyCode::Left => self.navigate(Document::move_left),
            KeyCode::Right => self.navigate(Document::move_right),
            KeyCode::Up => self.navigate(Document::move_up),
            KeyCode::Down => self.navigate(Document::move_down),
            KeyCode::Home => self.navigate(Document::move_home),
            KeyCode::End => self.navigate(Document::move_end),
            KeyCode::Backspace => self.edit(Document::backspace),
            KeyCode::Delete => self.edit(Document::delete),
            KeyCode::Enter => self.edit(Document::insert_newline),
            KeyCode::Tab => {
                // One keystroke, several characters.
                let spaces = " ".repeat(self.tab_size);
                self.edit(|doc| doc.insert_text(&spaces));
            }
            KeyCode::Char(c) => {
                if !key_event
                    .modifiers
                    .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT)
                {
                    self.edit(|doc| doc.insert_text(&c.to_string()));
                }
            }
            _ => {}
        }
        false
    }

    fn handle_mouse_event(&mut self, mouse_event: MouseEvent) {
        let over_indicator = self.indicator_span().is_some_and(|(start, end)| {
            mouse_event.row == self.status_row() && (start..end).contains(&mouse_event.column)
        });

        match mouse_event.kind {
            MouseEventKind::Down(MouseButton::Left) if over_indicator => {
                let command = self
                    .state
                    .borrow()
                    .status
                    .as_ref()
                    .and_then(|slot| slot.item.command);
                if let Some(command) = command {
                    self.invoke(command);
                }
            }
            MouseEventKind::Moved => {
                let tooltip = self
                    .state
                    .borrow()
                    .status
                    .as_ref()
                    .and_then(|slot| slot.item.tooltip.clone());
                let showing = tooltip.is_some() && self.message == tooltip;
                if over_indicator && !showing {
                    self.message = tooltip;
                    self.dirty = true;
                } else if !over_indicator && showing {
                    // Leave other messages alone, only hide the tooltip.
                    self.message = None;
                    self.dirty = true;
                }
            }
            _ => {}
        }
    }

    fn status_row(&self) -> u16 {
        self.terminal_height.saturating_sub(2)
    }

    // Screen columns [start, end) the indicator text occupies.
    fn indicator_span(&self) -> Option<(u16, u16)> {
        let state = self.state.borrow();
        let slot = state.status.as_ref()?;
        let width = slot.text.chars().count() as u16;
        if width == 0 {
            return None;
        }
        let start = self.terminal_width.saturating_sub(width + 1);
        Some((start, start + width))
    }

    fn render(&mut self) -> io::Result<()> {
        let host_dirty = std::mem::take(&mut self.state.borrow_mut().dirty);
        if !self.dirty && !host_dirty {
            return Ok(());
        }

        let mut stdout = io::stdout();
        let visible_height = self.terminal_height.saturating_sub(2) as usize;
        let visible_width = self.terminal_width as usize;

        execute!(stdout, Hide)?;

        if let Some(doc) = self.active_doc_mut() {
            doc.update_offset(visible_width, visible_height);
        }

        for y in 0..visible_height {
            execute!(stdout, MoveTo(0, y as u16), Clear(ClearType::CurrentLine))?;

            let line = self.active_doc().and_then(|doc| {
                let line = doc.buffer.get(y + doc.offset_y)?;
                // Apply horizontal scrolling
                let visible_start = doc.offset_x.min(line.len());
                let visible_end = (visible_start + visible_width).min(line.len());
                Some(line[visible_start..visible_end].iter().collect::<String>())
            });

            match line {
                Some(text) => execute!(stdout, Print(&text))?,
                None => execute!(
                    stdout,
                    SetForegroundColor(Color::DarkGrey),
                    Print("~"),
                    ResetColor
                )?,
            }
        }

        self.render_status_bar()?;

        match self.active_doc() {
            Some(doc) => {
                let screen_y = doc.cursor_y.saturating_sub(doc.offset_y);
                let screen_x = doc.cursor_x.saturating_sub(doc.offset_x);
                execute!(stdout, MoveTo(screen_x as u16, screen_y as u16), Show)?;
            }
            None => execute!(stdout, MoveTo(0, 0))?,
        }

        stdout.flush()?;
        self.dirty = false;
        Ok(())
    }

    fn render_status_bar(&self) -> io::Result<()> {
        let mut stdout = io::stdout();
        let y = self.status_row();

        execute!(
            stdout,
            MoveTo(0, y),
            Clear(ClearType::CurrentLine),
            MoveTo(0, y + 1),
            Clear(ClearType::CurrentLine)
        )?;

        let left = match self.active_doc() {
            Some(doc) => format!(
                " [{}/{}] {}{}",
                self.active.map_or(0, |i| i + 1),
                self.documents.len(),
                doc.title(),
                if doc.modified { " +" } else { "" }
            ),
            None => " No open documents (Ctrl-Q quits)".to_string(),
        };
        execute!(stdout, MoveTo(0, y), Print(&left))?;

        if let Some((start, _)) = self.indicator_span() {
            let state = self.state.borrow();
            if let Some(slot) = state.status.as_ref() {
                let color = if slot.text.starts_with('⚠') {
                    Color::Yellow
                } else {
                    Color::Cyan
                };
                execute!(
                    stdout,
                    MoveTo(start, y),
                    SetForegroundColor(color),
                    Print(&slot.text),
                    ResetColor
                )?;
            }
        }

        let hint = self.message.clone().unwrap_or_else(|| {
            "^T cycle stats  ^R reset  ^N/^P switch  ^W close  ^S save  ^Q quit".to_string()
        });
        execute!(
            stdout,
            MoveTo(0, y + 1),
            SetForegroundColor(Color::DarkGrey),
            Print(&hint),
            ResetColor
        )?;

        Ok(())
    }
}

impl Host for Workbench {
    type Sink = TerminalStatusItem;

    fn active_document(&self) -> Option<DocumentKey> {
        self.active_doc().map(|doc| doc.key.clone())
    }

    fn create_status_item(&mut self, item: StatusItem) -> TerminalStatusItem {
        let mut state = self.state.borrow_mut();
        state.status = Some(StatusSlot {
            item,
            text: String::new(),
        });
        state.dirty = true;
        TerminalStatusItem {
            state: Rc::clone(&self.state),
        }
    }

    fn register_command(&mut self, command: Command) -> Subscription {
        self.register(Registration::Command(command))
    }

    fn subscribe(&mut self, feed: Feed) -> Subscription {
        self.register(Registration::Feed(feed))
    }
}

impl Workbench {
    fn register(&mut self, registration: Registration) -> Subscription {
        self.state.borrow_mut().registrations.insert(registration);
        let state = Rc::clone(&self.state);
        Subscription::new(move || {
            state.borrow_mut().registrations.remove(&registration);
        })
    }
}

fn enter_raw_mode() -> io::Result<()> {
    terminal::enable_raw_mode()?;
    execute!(
        io::stdout(),
        EnterAlternateScreen,
        EnableMouseCapture,
        DisableLineWrap,
        Hide,
        Clear(ClearType::All)
    )?;
    Ok(())
}

fn leave_raw_mode() -> io::Result<()> {
    execute!(
        io::stdout(),
        Show,
        EnableLineWrap,
        DisableMouseCapture,
        LeaveAlternateScreen
    )?;
    terminal::disable_raw_mode()?;
    Ok(())
}

fn run(
    workbench: &mut Workbench,
    tracker: &mut Tracker<TerminalStatusItem>,
    config: &Config,
) -> io::Result<()> {
    let autosave_interval = Duration::from_secs(config.autosave_seconds);
    let mut last_flush = Instant::now();

    loop {
        // Events are applied in the order the host produced them.
        for event in workbench.take_events() {
            tracker.handle(event);
        }

        workbench.render()?;

        if last_flush.elapsed() >= autosave_interval {
            if let Err(e) = tracker.flush() {
                warn!(error = %e, "could not save stats");
            }
            last_flush = Instant::now();
        }

        // Poll with a 16ms timeout (roughly 60 FPS)
        if event::poll(Duration::from_millis(16))? {
            match event::read()? {
                Event::Key(key_event) => {
                    if workbench.handle_key_event(key_event) {
                        break;
                    }
                }
                Event::Mouse(mouse_event) => workbench.handle_mouse_event(mouse_event),
                Event::Resize(width, height) => {
                    workbench.terminal_width = width;
                    workbench.terminal_height = height;
                    workbench.dirty = true;
                }
                _ => {}
            }
        }
    }

    Ok(())
}

fn open_counters(config: &Config) -> Box<dyn CounterStore> {
    match config.storage {
        Storage::Memory => Box::new(MemoryCounters::new()),
        Storage::Durable => match StateFile::open(config.state_path()) {
            Ok(state) => Box::new(DurableCounters::new(state)),
            Err(e) => {
                // Keep the editor usable; the state file is left untouched.
                warn!(error = %e, path = %config.state_file, "state file unreadable, counting in memory");
                eprintln!("Could not read {}: {}", config.state_file, e);
                Box::new(MemoryCounters::new())
            }
        },
    }
}

fn init_logging(config: &Config) -> Result<WorkerGuard> {
    let log_path = config.log_path();
    let log_dir = log_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    fs::create_dir_all(&log_dir)
        .with_context(|| format!("creating log directory {}", log_dir.display()))?;
    let file_name = log_path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_else(|| "keytally.log".into());

    let file_appender = tracing_appender::rolling::never(&log_dir, file_name);
    let (writer, guard) = tracing_appender::non_blocking(file_appender);
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    // A subscriber may already be installed; logging then goes there.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .try_init();

    Ok(guard)
}

// Prints everything the state file knows, one block per document.
fn show_stats(config: &Config) -> Result<()> {
    let state = StateFile::open(config.state_path())
        .with_context(|| format!("reading {}", config.state_file))?;
    let documents = documents_in(&state);

    println!("keytally stats ({})", state.path().display());
    if let Some(saved_at) = state.saved_at() {
        println!(
            "last saved {}",
            saved_at.with_timezone(&Local).format("%Y-%m-%d %H:%M")
        );
    }
    println!();

    if documents.is_empty() {
        println!("No documents tracked yet.");
        return Ok(());
    }

    let counters = DurableCounters::new(state);
    for document in documents {
        let pair = counters.get(&document);
        println!("{}", document);
        for mode in DisplayMode::ALL {
            println!("  {:<17} {}", mode.label(), format::render(mode, pair));
        }
    }
    Ok(())
}

// What the command line asks for.
#[derive(Debug, PartialEq)]
enum Invocation {
    Stats,
    Edit(Vec<PathBuf>),
}

// The first item is the program name; an empty argv is treated as no
// arguments.
fn parse_args(args: impl IntoIterator<Item = String>) -> Invocation {
    let args: Vec<String> = args.into_iter().skip(1).collect();
    if args.first().is_some_and(|arg| arg == "--stats") {
        Invocation::Stats
    } else {
        Invocation::Edit(args.into_iter().map(PathBuf::from).collect())
    }
}

fn main() -> Result<()> {
    let invocation = parse_args(std::env::args());
    let config = Config::load();
    let _log_guard = init_logging(&config)?;

    let paths = match invocation {
        Invocation::Stats => return show_stats(&config),
        Invocation::Edit(paths) => paths,
    };

    let mut workbench = Workbench::new(&config).context("reading terminal size")?;
    for path in &paths {
        workbench
            .open(path)
            .with_context(|| format!("opening {}", path.display()))?;
    }
    if workbench.documents.is_empty() {
        workbench.open_untitled();
    }

    let counters = open_counters(&config);
    let mut tracker = Tracker::activate(&mut workbench, counters);

    enter_raw_mode().context("entering raw mode")?;
    let result = run(&mut workbench, &mut tracker, &config);
    // Restore the terminal whether or not the loop failed.
    let restored = leave_raw_mode();

    let teardown = tracker.deactivate();
    result.context("editor loop")?;
    restored.context("restoring terminal")?;
    teardown.context("saving stats")?;
    Ok(())
}
