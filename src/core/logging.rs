use log::{LevelFilter, SetLoggerError};
use simplelog::{ColorChoice, ConfigBuilder, TermLogger, TerminalMode};

use crate::core::Settings;

/// Install a terminal logger for frontends that don't bring their own.
///
/// Logs at `Debug` level when [Settings::debug] is set and at `Info` otherwise.
/// Fails if a logger has already been installed.
pub fn init_logger(settings: &Settings) -> Result<(), SetLoggerError> {
    let level = if settings.debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let config = ConfigBuilder::new()
        .set_thread_level(LevelFilter::Debug)
        .build();
    TermLogger::init(level, config, TerminalMode::Mixed, ColorChoice::Auto)
}
