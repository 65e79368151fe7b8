// Plain lines reach receivers of their own event only; ERROR and WARNING lines also reach
// receivers of every coarser event.

use std::fs::{create_dir_all, File};
use std::io::{self, Write};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Granularity of a log line, finest first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogEvent {
    /// One row per settled arrival (attribute, bids, clicks, costs)
    Auction,
    /// Per-timestep summaries
    Timestep,
    /// Feedback handed to policies and time spent learning
    Feedback,
    /// Run-level messages (schedule loaded, run finished)
    Run,
    /// Invariant checks and their results
    Validation,
}

const EVENT_ORDER: [LogEvent; 5] = [
    LogEvent::Auction,
    LogEvent::Timestep,
    LogEvent::Feedback,
    LogEvent::Run,
    LogEvent::Validation,
];

impl LogEvent {
    /// `self` and everything after it in `EVENT_ORDER`
    fn with_coarser(self) -> &'static [LogEvent] {
        let start = EVENT_ORDER.iter().position(|&e| e == self).unwrap_or(0);
        &EVENT_ORDER[start..]
    }
}

/// Destination for log lines
pub trait LogReceiver {
    fn should_log(&self, event: LogEvent) -> bool;

    fn write(&mut self, s: &str) -> io::Result<()>;

    fn flush(&mut self) -> io::Result<()>;
}

/// Set of events a receiver subscribed to
struct Subscription(Vec<LogEvent>);

impl Subscription {
    fn covers(&self, event: LogEvent) -> bool {
        self.0.contains(&event)
    }
}

/// Prints to stdout
pub struct ConsoleReceiver {
    subscription: Subscription,
}

impl ConsoleReceiver {
    pub fn new(events: Vec<LogEvent>) -> Box<dyn LogReceiver> {
        Box::new(ConsoleReceiver { subscription: Subscription(events) })
    }
}

impl LogReceiver for ConsoleReceiver {
    fn should_log(&self, event: LogEvent) -> bool {
        self.subscription.covers(event)
    }

    fn write(&mut self, s: &str) -> io::Result<()> {
        let mut out = io::stdout().lock();
        out.write_all(s.as_bytes())?;
        out.flush()
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stdout().flush()
    }
}

/// Appends to a file that is truncated on creation
pub struct FileReceiver {
    file: File,
    subscription: Subscription,
}

impl FileReceiver {
    /// Open `path` for writing, creating missing parent directories
    ///
    /// # Arguments
    /// * `path` - Output file, truncated if it exists
    /// * `events` - Events this receiver writes
    pub fn new(path: &Path, events: Vec<LogEvent>) -> io::Result<Box<dyn LogReceiver>> {
        if let Some(dir) = path.parent() {
            create_dir_all(dir)?;
        }
        let file = File::create(path)?;
        Ok(Box::new(FileReceiver { file, subscription: Subscription(events) }))
    }
}

impl LogReceiver for FileReceiver {
    fn should_log(&self, event: LogEvent) -> bool {
        self.subscription.covers(event)
    }

    fn write(&mut self, s: &str) -> io::Result<()> {
        self.file.write_all(s.as_bytes())?;
        self.file.flush()
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

/// In-memory receiver; the returned handle reads back everything written
pub struct MemoryReceiver {
    buffer: Arc<Mutex<String>>,
    subscription: Subscription,
}

/// Read handle for a `MemoryReceiver`
#[derive(Clone)]
pub struct MemoryHandle {
    buffer: Arc<Mutex<String>>,
}

impl MemoryHandle {
    pub fn contents(&self) -> String {
        match self.buffer.lock() {
            Ok(buffer) => buffer.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl MemoryReceiver {
    pub fn new(events: Vec<LogEvent>) -> (Box<dyn LogReceiver>, MemoryHandle) {
        let buffer = Arc::new(Mutex::new(String::new()));
        let handle = MemoryHandle { buffer: Arc::clone(&buffer) };
        (Box::new(MemoryReceiver { buffer, subscription: Subscription(events) }), handle)
    }
}

impl LogReceiver for MemoryReceiver {
    fn should_log(&self, event: LogEvent) -> bool {
        self.subscription.covers(event)
    }

    fn write(&mut self, s: &str) -> io::Result<()> {
        match self.buffer.lock() {
            Ok(mut buffer) => buffer.push_str(s),
            Err(poisoned) => poisoned.into_inner().push_str(s),
        }
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Handle returned by `Logger::add_receiver`
pub type ReceiverId = usize;

static NEXT_RECEIVER_ID: AtomicUsize = AtomicUsize::new(1);

/// Fans log lines out to its receivers
#[derive(Default)]
pub struct Logger {
    receivers: Vec<(ReceiverId, Box<dyn LogReceiver>)>,
}

impl Logger {
    pub fn new() -> Self {
        Logger::default()
    }

    pub fn add_receiver(&mut self, receiver: Box<dyn LogReceiver>) -> ReceiverId {
        let id = NEXT_RECEIVER_ID.fetch_add(1, Ordering::Relaxed);
        self.receivers.push((id, receiver));
        id
    }

    pub fn remove_receiver(&mut self, id: ReceiverId) {
        self.receivers.retain(|(existing, _)| *existing != id);
    }

    /// True when at least one receiver listens to the event
    pub fn is_enabled(&self, event: LogEvent) -> bool {
        self.receivers.iter().any(|(_, r)| r.should_log(event))
    }

    /// Write `text` as is to every receiver of `event`
    pub fn log(&mut self, event: LogEvent, text: &str) -> io::Result<()> {
        self.write_matching(text, |r| r.should_log(event))
    }

    pub fn logln(&mut self, event: LogEvent, text: &str) -> io::Result<()> {
        let line = format!("{text}\n");
        self.log(event, &line)
    }

    pub fn errln(&mut self, event: LogEvent, text: &str) -> io::Result<()> {
        self.log_flagged(event, "ERROR", text)
    }

    pub fn warnln(&mut self, event: LogEvent, text: &str) -> io::Result<()> {
        self.log_flagged(event, "WARNING", text)
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.receivers.iter_mut().try_for_each(|(_, r)| r.flush())
    }

    /// A receiver listening to several of the reached events still gets the line once
    fn log_flagged(&mut self, event: LogEvent, flag: &str, text: &str) -> io::Result<()> {
        let reached = event.with_coarser();
        let line = format!("{flag} {text}\n");
        self.write_matching(&line, |r| reached.iter().any(|&e| r.should_log(e)))
    }

    fn write_matching<F>(&mut self, text: &str, wants: F) -> io::Result<()>
    where
        F: Fn(&dyn LogReceiver) -> bool,
    {
        for (_, receiver) in self.receivers.iter_mut() {
            if wants(receiver.as_ref()) {
                receiver.write(text)?;
            }
        }
        Ok(())
    }
}

/// Replace characters that are not safe in file names with `_`
pub fn sanitize_filename(name: &str) -> String {
    const UNSAFE: &[char] = &[' ', '/', '\\', ':', '*', '?', '"', '<', '>', '|'];
    name.chars().map(|c| if UNSAFE.contains(&c) { '_' } else { c }).collect()
}

/// `println!`-style line on a logger; write errors are ignored
#[macro_export]
macro_rules! logln {
    ($logger:expr, $event:expr, $($arg:tt)*) => {{
        let _ = $logger.logln($event, &format!($($arg)*));
    }};
}

/// `ERROR` line on the event and every coarser one
#[macro_export]
macro_rules! errln {
    ($logger:expr, $event:expr, $($arg:tt)*) => {{
        let _ = $logger.errln($event, &format!($($arg)*));
    }};
}

/// `WARNING` line on the event and every coarser one
#[macro_export]
macro_rules! warnln {
    ($logger:expr, $event:expr, $($arg:tt)*) => {{
        let _ = $logger.warnln($event, &format!($($arg)*));
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("expected revenue"), "expected_revenue");
        assert_eq!(sanitize_filename("a/b:c"), "a_b_c");
        assert_eq!(sanitize_filename("plain"), "plain");
    }

    #[test]
    fn test_logln_routes_only_to_enabled_event() {
        let mut logger = Logger::new();
        let (receiver, handle) = MemoryReceiver::new(vec![LogEvent::Timestep]);
        logger.add_receiver(receiver);

        logln!(&mut logger, LogEvent::Timestep, "step {}", 1);
        logln!(&mut logger, LogEvent::Auction, "auction row");

        assert_eq!(handle.contents(), "step 1\n");
    }

    #[test]
    fn test_warnln_reaches_coarser_receivers_once() {
        let mut logger = Logger::new();
        let (receiver, handle) = MemoryReceiver::new(vec![LogEvent::Run, LogEvent::Validation]);
        logger.add_receiver(receiver);

        warnln!(&mut logger, LogEvent::Timestep, "slots reduced");
        errln!(&mut logger, LogEvent::Validation, "profit mismatch");
        logln!(&mut logger, LogEvent::Timestep, "plain lines do not propagate");

        assert_eq!(handle.contents(), "WARNING slots reduced\nERROR profit mismatch\n");
    }

    #[test]
    fn test_remove_receiver() {
        let mut logger = Logger::new();
        let (receiver, handle) = MemoryReceiver::new(vec![LogEvent::Run]);
        let id = logger.add_receiver(receiver);
        assert!(logger.is_enabled(LogEvent::Run));

        logger.remove_receiver(id);
        logln!(&mut logger, LogEvent::Run, "dropped");

        assert!(!logger.is_enabled(LogEvent::Run));
        assert_eq!(handle.contents(), "");
    }
}
