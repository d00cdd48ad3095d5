use blog_core::{LogLevel, LogRecord, LogSink, SharedLogSink};
use log::{Level, LevelFilter, Log, Metadata, Record};

/// Routes `log` macros from the adapters into the CLI's log sink.
struct SinkLogger {
    sink: SharedLogSink,
    max_level: LevelFilter,
}

impl Log for SinkLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= self.max_level
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        self.sink.log(LogRecord::new(
            to_log_level(record.level()),
            record.args().to_string(),
        ));
    }

    fn flush(&self) {}
}

pub fn install(sink: SharedLogSink, level: LogLevel) {
    let max_level = to_level_filter(level);
    let logger = SinkLogger { sink, max_level };
    if log::set_boxed_logger(Box::new(logger)).is_ok() {
        log::set_max_level(max_level);
    }
}

fn to_log_level(level: Level) -> LogLevel {
    match level {
        Level::Error => LogLevel::Error,
        Level::Warn => LogLevel::Warn,
        Level::Info => LogLevel::Info,
        Level::Debug => LogLevel::Debug,
        Level::Trace => LogLevel::Trace,
    }
}

fn to_level_filter(level: LogLevel) -> LevelFilter {
    match level {
        LogLevel::Error => LevelFilter::Error,
        LogLevel::Warn => LevelFilter::Warn,
        LogLevel::Info => LevelFilter::Info,
        LogLevel::Debug => LevelFilter::Debug,
        LogLevel::Trace => LevelFilter::Trace,
    }
}
