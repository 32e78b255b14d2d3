use std::sync::{LazyLock, Mutex, Once};
use std::thread::{self, ThreadId};

use log::{Level, LevelFilter, Log, Metadata, Record};

/// A log line captured by the test logger, tagged with the thread that emitted it.
#[derive(Clone, Debug)]
pub struct CapturedRecord {
    pub thread: ThreadId,
    pub level: Level,
    pub target: String,
    pub message: String,
}

struct CaptureLogger {
    records: Mutex<Vec<CapturedRecord>>,
}

impl Log for CaptureLogger {
    fn enabled(&self, _metadata: &Metadata<'_>) -> bool {
        true
    }

    fn log(&self, record: &Record<'_>) {
        self.records.lock().unwrap().push(CapturedRecord {
            thread: thread::current().id(),
            level: record.level(),
            target: record.target().to_string(),
            message: record.args().to_string(),
        });
    }

    fn flush(&self) {}
}

static LOGGER: LazyLock<CaptureLogger> = LazyLock::new(|| CaptureLogger {
    records: Mutex::new(Vec::new()),
});

/// Installs the capturing logger as the global `log` backend. Safe to call from every test.
pub fn install_capture_logger() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let logger: &'static CaptureLogger = &LOGGER;
        if log::set_logger(logger).is_ok() {
            log::set_max_level(LevelFilter::Trace);
        }
    });
}

/// Records emitted so far by the calling thread. Tests run on separate threads, so this keeps
/// concurrently running tests from seeing each other's output.
pub fn captured_for_current_thread() -> Vec<CapturedRecord> {
    let current = thread::current().id();
    LOGGER
        .records
        .lock()
        .unwrap()
        .iter()
        .filter(|record| record.thread == current)
        .cloned()
        .collect()
}
