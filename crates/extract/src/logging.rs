//! Log output with configurable per-level colors.

use std::fmt;
use std::io::IsTerminal;

use chrono::Local;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::EnvFilter;

use acme_extract_config::{AnsiColor, ColorScheme, ExtractConfig};

/// Timestamp prefix of every line
pub const LOG_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M.%S";

/// Formats each event as one colored line: `<timestamp>: <LEVEL> <message> <fields>`.
///
/// The whole line is wrapped in the level's color, so field formatting itself
/// runs without ANSI styling.
#[derive(Debug, Clone)]
pub struct ColoredFormat {
    colors: ColorScheme,
    ansi: bool,
}

impl ColoredFormat {
    pub fn new(colors: ColorScheme, ansi: bool) -> Self {
        Self { colors, ansi }
    }

    fn color(&self, level: Level) -> &AnsiColor {
        match level {
            Level::ERROR => &self.colors.error,
            Level::WARN => &self.colors.warn,
            Level::INFO => &self.colors.success,
            _ => &self.colors.info,
        }
    }
}

impl<S, N> FormatEvent<S, N> for ColoredFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let level = *event.metadata().level();

        if self.ansi {
            write!(writer, "{}", self.color(level))?;
        }
        write!(
            writer,
            "{}: {:>5} ",
            Local::now().format(LOG_TIMESTAMP_FORMAT),
            level
        )?;
        ctx.format_fields(writer.by_ref(), event)?;
        if self.ansi {
            write!(writer, "{}", AnsiColor::RESET)?;
        }
        writeln!(writer)
    }
}

/// Install the global subscriber.
///
/// `RUST_LOG` takes precedence; otherwise `debug` when enabled, else `info`.
pub fn init(config: &ExtractConfig) {
    let level = if config.debug { "debug" } else { "info" };
    let ansi = std::io::stderr().is_terminal();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .event_format(ColoredFormat::new(config.colors.clone(), ansi))
        .init();
}
