use log::{Level, LevelFilter, Log, Metadata, Record};

/// Line logger for the `log` facade: `[INFO] message`.
/// Info and below go to stdout, warnings and errors to stderr.
pub struct Logger {
    level: LevelFilter,
}

static LOGGER: std::sync::OnceLock<Logger> = std::sync::OnceLock::new();

impl Logger {
    /// Installs the logger once per process. Later calls only adjust the level.
    pub fn init(level: LevelFilter) {
        let logger = LOGGER.get_or_init(|| Logger { level });
        // Another logger (e.g. a test harness) may already be installed.
        let _ = log::set_logger(logger);
        log::set_max_level(level);
    }

    fn format(record: &Record) -> String {
        format!("[{}] {}", record.level(), record.args())
    }
}

impl Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        match record.level() {
            Level::Error | Level::Warn => eprintln!("{}", Self::format(record)),
            _ => println!("{}", Self::format(record)),
        }
    }

    fn flush(&self) {}
}
