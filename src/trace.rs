use std::io::Write;

use log::LevelFilter;

/// Verbosity chosen on the command line, 0 (quiet) to 5 (every weight change).
///
/// Set once at start-up and handed to whatever wants to decide on optional
/// output; the `log` backend is configured from it with [`Trace::init_logger`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Trace(u8);

impl Trace {
    pub const MAX: u8 = 5;

    pub fn new(level: u8) -> Self {
        Self(level.min(Self::MAX))
    }

    pub fn level(self) -> u8 { self.0 }

    #[inline(always)]
    pub fn at_level(self, level: u8) -> bool { self.0 >= level }

    pub fn level_filter(self) -> LevelFilter {
        match self.0 {
            0 => LevelFilter::Warn,
            1..=3 => LevelFilter::Info,
            4 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }

    /// Plain messages on stdout, so they interleave with the program's tables.
    pub fn init_logger(self) {
        env_logger::Builder::new()
            .filter_level(self.level_filter())
            .target(env_logger::Target::Stdout)
            .format(|buf, record| match record.level() {
                log::Level::Error | log::Level::Warn => writeln!(buf, "{}: {}", record.level().as_str().to_lowercase(), record.args()),
                _ => writeln!(buf, "{}", record.args()),
            })
            .init();
    }
}
