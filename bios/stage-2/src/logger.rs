use crate::teletype::Teletype;
use conquer_once::spin::OnceCell;
use core::fmt::Write;
use kernel_loader_config::LevelFilter;
use spinning_top::Spinlock;

/// The global logger instance used for the `log` crate.
pub static LOGGER: OnceCell<LockedLogger> = OnceCell::uninit();

/// A logger that prints through the BIOS teletype service.
pub struct LockedLogger {
    teletype: Spinlock<Teletype>,
}

impl LockedLogger {
    pub fn new() -> Self {
        Self {
            teletype: Spinlock::new(Teletype),
        }
    }
}

impl log::Log for LockedLogger {
    fn enabled(&self, _metadata: &log::Metadata) -> bool {
        true
    }

    fn log(&self, record: &log::Record) {
        let mut teletype = self.teletype.lock();
        let _ = writeln!(teletype, "{:5}: {}", record.level(), record.args());
    }

    fn flush(&self) {}
}

/// Installs the teletype logger with the given maximum level.
pub fn init(level: LevelFilter) {
    let logger = LOGGER.get_or_init(LockedLogger::new);
    if log::set_logger(logger).is_ok() {
        log::set_max_level(level.into());
    }
}
