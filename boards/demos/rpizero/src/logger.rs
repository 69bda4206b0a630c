use log::{Level, LevelFilter, Metadata, Record, SetLoggerError};

use bitwave_hal::info;

struct Logger;

impl log::Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= Level::Debug
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            info!("\x1b[93m[{}]\x1b[0m  {}", record.level(), record.args());
        }
    }

    fn flush(&self) {}
}

static LOGGER: Logger = Logger;

pub fn init() -> Result<(), SetLoggerError> {
    unsafe { log::set_logger_racy(&LOGGER).map(|()| log::set_max_level(LevelFilter::Debug)) }
}
