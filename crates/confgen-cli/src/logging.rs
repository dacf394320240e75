use crate::error::{CliError, Result};
use indicatif::MultiProgress;
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;
use tracing::Subscriber;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{filter::LevelFilter, fmt, prelude::*};

/// Least detail a log file records, whatever the terminal verbosity.
const FILE_MIN_LEVEL: LevelFilter = LevelFilter::DEBUG;

fn terminal_level(verbosity: u8, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::OFF;
    }
    match verbosity {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

fn file_level(verbosity: u8) -> LevelFilter {
    terminal_level(verbosity, false).max(FILE_MIN_LEVEL)
}

/// Stderr writer that hides the progress bars while a log line is printed.
#[derive(Clone)]
struct BarAwareStderr {
    bars: MultiProgress,
}

impl Write for BarAwareStderr {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.bars.suspend(|| io::stderr().write(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()
    }
}

impl<'a> MakeWriter<'a> for BarAwareStderr {
    type Writer = Self;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

fn build_subscriber(
    verbosity: u8,
    quiet: bool,
    log_file: Option<&Path>,
    bars: &MultiProgress,
) -> Result<impl Subscriber + Send + Sync + 'static> {
    let terminal = fmt::layer()
        .with_writer(BarAwareStderr { bars: bars.clone() })
        .with_target(false)
        .compact()
        .with_filter(terminal_level(verbosity, quiet));

    let file = match log_file {
        Some(path) => {
            let file = File::create(path)?;
            Some(
                fmt::layer()
                    .with_writer(file)
                    .with_ansi(false)
                    .with_thread_ids(true)
                    .with_filter(file_level(verbosity)),
            )
        }
        None => None,
    };

    Ok(tracing_subscriber::registry().with(terminal).with(file))
}

/// Installs the global logger: compact lines on stderr at `-v` verbosity, and a plain-text
/// file with at least debug detail when `log_file` is given.
pub fn setup_logging(
    verbosity: u8,
    quiet: bool,
    log_file: Option<&Path>,
    bars: &MultiProgress,
) -> Result<()> {
    build_subscriber(verbosity, quiet, log_file, bars)?
        .try_init()
        .map_err(|e| CliError::Other(anyhow::anyhow!("Failed to install the logger: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use indicatif::ProgressDrawTarget;
    use serial_test::serial;
    use tracing::{debug, info, trace, warn};

    fn hidden_bars() -> MultiProgress {
        MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
    }

    #[test]
    fn verbosity_maps_to_terminal_levels() {
        assert_eq!(terminal_level(0, false), LevelFilter::WARN);
        assert_eq!(terminal_level(1, false), LevelFilter::INFO);
        assert_eq!(terminal_level(2, false), LevelFilter::DEBUG);
        assert_eq!(terminal_level(7, false), LevelFilter::TRACE);
        assert_eq!(terminal_level(3, true), LevelFilter::OFF);
    }

    #[test]
    fn log_file_never_records_less_than_debug() {
        assert_eq!(file_level(0), LevelFilter::DEBUG);
        assert_eq!(file_level(2), LevelFilter::DEBUG);
        assert_eq!(file_level(3), LevelFilter::TRACE);
    }

    #[test]
    fn quiet_terminal_still_fills_the_log_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("confgen.log");
        let subscriber = build_subscriber(0, true, Some(&path), &hidden_bars()).unwrap();

        tracing::subscriber::with_default(subscriber, || {
            debug!(molecule = "pentane", "Retrying embedding with random coordinates");
            trace!("Seed expanded");
        });

        let content = std::fs::read_to_string(path).unwrap();
        assert!(content.contains("Retrying embedding with random coordinates"));
        assert!(content.contains("molecule=\"pentane\""));
        assert!(content.contains("ThreadId"));
        assert!(!content.contains("Seed expanded"));
    }

    #[test]
    fn stderr_writer_reports_every_byte_written() {
        let mut writer = BarAwareStderr { bars: hidden_bars() };
        assert_eq!(writer.write(b"").unwrap(), 0);
        writer.flush().unwrap();
    }

    #[test]
    #[serial]
    fn global_logger_installs_once() {
        let bars = hidden_bars();
        let _ = setup_logging(3, false, None, &bars);
        warn!(molecule = "pentane", "Skipping molecule");
        info!(unique = 4, "Force-field ensemble filtered");
        assert!(setup_logging(0, false, None, &bars).is_err());
    }

    #[test]
    fn log_file_in_a_missing_directory_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("confgen.log");
        let result = build_subscriber(0, false, Some(&path), &hidden_bars());
        assert!(matches!(result, Err(CliError::Io(_))));
    }
}
