use std::fmt::{self as stdfmt, Write as _};
use std::path::{Path, PathBuf};

use anyhow::Result;
use hl_config::{LogFormat, LoggingConfig};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_appender::non_blocking::NonBlocking;
pub use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::format::DefaultFields;
use tracing_subscriber::fmt::time::{FormatTime, SystemTime};
use tracing_subscriber::fmt::{self, FmtContext, FormatEvent, FormattedFields};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

// ---------------------------------------------------------------------------
// FileFields
// ---------------------------------------------------------------------------

/// Field formatter for the file layer. A distinct type keeps the file
/// layer's cached span fields apart from the stderr layer's, which would
/// otherwise share (and ANSI-colour) the same `FormattedFields` slot.
#[derive(Default)]
pub struct FileFields(DefaultFields);

impl<'writer> fmt::FormatFields<'writer> for FileFields {
    fn format_fields<R: tracing_subscriber::field::RecordFields>(
        &self,
        writer: fmt::format::Writer<'writer>,
        fields: R,
    ) -> stdfmt::Result {
        self.0.format_fields(writer, fields)
    }
}

// ---------------------------------------------------------------------------
// DomainFormat
// ---------------------------------------------------------------------------

/// Plain-text event format that lifts the `domain` field into a prefix:
///
/// ```text
/// 2026-10-19T08:12:44Z  INFO [store] history loaded visits=120 bookmarks=8
/// ```
///
/// Events without a domain (for example records bridged from the `log`
/// facade) are printed without one.
pub struct DomainFormat {
    timer: SystemTime,
}

impl DomainFormat {
    pub fn new() -> Self {
        Self { timer: SystemTime }
    }
}

impl Default for DomainFormat {
    fn default() -> Self {
        Self::new()
    }
}

fn paint(
    writer: &mut fmt::format::Writer<'_>,
    ansi: bool,
    code: &str,
    text: impl stdfmt::Display,
) -> stdfmt::Result {
    if ansi {
        write!(writer, "\x1b[{code}m{text}\x1b[0m")
    } else {
        write!(writer, "{text}")
    }
}

fn level_colour(level: Level) -> &'static str {
    match level {
        Level::ERROR => "31",
        Level::WARN => "33",
        Level::INFO => "32",
        Level::DEBUG => "34",
        Level::TRACE => "35",
    }
}

impl<S, N> FormatEvent<S, N> for DomainFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'writer> fmt::FormatFields<'writer> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: fmt::format::Writer<'_>,
        event: &Event<'_>,
    ) -> stdfmt::Result {
        let ansi = writer.has_ansi_escapes();

        let mut stamp = String::new();
        if self
            .timer
            .format_time(&mut fmt::format::Writer::new(&mut stamp))
            .is_err()
        {
            stamp.push_str("<unknown time>");
        }
        paint(&mut writer, ansi, "2", &stamp)?;

        let level = *event.metadata().level();
        write!(writer, " ")?;
        paint(&mut writer, ansi, level_colour(level), format_args!("{level:>5}"))?;
        write!(writer, " ")?;

        let mut fields = DomainExtractor::default();
        event.record(&mut fields);

        if let Some(domain) = &fields.domain {
            paint(&mut writer, ansi, "1;36", format_args!("[{domain}]"))?;
            write!(writer, " ")?;
        }

        if let Some(scope) = ctx.event_scope() {
            for span in scope.from_root() {
                paint(&mut writer, ansi, "1", span.name())?;
                let ext = span.extensions();
                match ext.get::<FormattedFields<N>>() {
                    Some(span_fields) if !span_fields.is_empty() => {
                        write!(writer, "{{{span_fields}}}: ")?
                    }
                    _ => write!(writer, ": ")?,
                }
            }
        }

        write!(writer, "{}", fields.message)?;
        if !fields.rest.is_empty() {
            write!(writer, " ")?;
            paint(&mut writer, ansi, "3", &fields.rest)?;
        }
        writeln!(writer)
    }
}

// ---------------------------------------------------------------------------
// DomainExtractor
// ---------------------------------------------------------------------------

/// Splits an event into its domain, its message, and `key=value` text for
/// everything else.
#[derive(Default)]
struct DomainExtractor {
    domain: Option<String>,
    message: String,
    rest: String,
}

impl DomainExtractor {
    fn push_field(&mut self, name: &str, value: stdfmt::Arguments<'_>) {
        if !self.rest.is_empty() {
            self.rest.push(' ');
        }
        write!(&mut self.rest, "{name}={value}").ok();
    }
}

impl Visit for DomainExtractor {
    fn record_str(&mut self, field: &Field, value: &str) {
        match field.name() {
            "domain" => self.domain = Some(value.to_string()),
            "message" => self.message = value.to_string(),
            name => self.push_field(name, format_args!("{value:?}")),
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn stdfmt::Debug) {
        match field.name() {
            "domain" => {
                let raw = format!("{value:?}");
                self.domain = Some(raw.trim_matches('"').to_string());
            }
            "message" => {
                write!(&mut self.message, "{value:?}").ok();
            }
            name => self.push_field(name, format_args!("{value:?}")),
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.push_field(field.name(), format_args!("{value}"));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.push_field(field.name(), format_args!("{value}"));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.push_field(field.name(), format_args!("{value}"));
    }
}

// ---------------------------------------------------------------------------
// Layer construction
// ---------------------------------------------------------------------------

/// `RUST_LOG` when set, otherwise the level and module overrides from
/// `[logging]`.
fn build_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    if std::env::var("RUST_LOG").is_ok() {
        return Ok(EnvFilter::from_default_env());
    }
    parse_directives(&config.directives())
}

fn parse_directives(directives: &str) -> Result<EnvFilter> {
    EnvFilter::try_new(directives)
        .map_err(|e| anyhow::anyhow!("invalid log filter '{directives}': {e}"))
}

fn stderr_layer(format: LogFormat, filter: EnvFilter) -> BoxedLayer {
    match format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_target(false)
            .with_writer(std::io::stderr)
            .with_filter(filter)
            .boxed(),
        LogFormat::Plain => fmt::layer()
            .event_format(DomainFormat::new())
            .with_writer(std::io::stderr)
            .with_filter(filter)
            .boxed(),
    }
}

fn file_layer(format: LogFormat, writer: NonBlocking, filter: EnvFilter) -> BoxedLayer {
    match format {
        LogFormat::Json => fmt::layer()
            .json()
            .fmt_fields(FileFields::default())
            .with_target(false)
            .with_ansi(false)
            .with_writer(writer)
            .with_filter(filter)
            .boxed(),
        LogFormat::Plain => fmt::layer()
            .event_format(DomainFormat::new())
            .fmt_fields(FileFields::default())
            .with_ansi(false)
            .with_writer(writer)
            .with_filter(filter)
            .boxed(),
    }
}

fn resolve_log_path(file: &Path, base_dir: &Path) -> PathBuf {
    if file.is_relative() {
        base_dir.join(file)
    } else {
        file.to_path_buf()
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Install the global `tracing` subscriber described by `[logging]`.
///
/// Output always goes to stderr; `logging.file` adds a non-blocking file
/// writer, resolved against `base_dir` when relative. Keep the returned
/// guard alive until exit or buffered file output is lost.
///
/// Records emitted through the `log` facade (as `hl-core` does) are bridged
/// into the same subscriber.
pub fn init_tracing(config: &LoggingConfig, base_dir: &Path) -> Result<Option<WorkerGuard>> {
    let mut layers: Vec<BoxedLayer> = vec![stderr_layer(config.format, build_filter(config)?)];
    let mut guard = None;

    if let Some(file) = &config.file {
        let path = resolve_log_path(file, base_dir);
        let dir = path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("log file path has no parent directory"))?;
        let file_name = path
            .file_name()
            .ok_or_else(|| anyhow::anyhow!("log file path has no file name"))?;
        std::fs::create_dir_all(dir)?;

        let (writer, file_guard) =
            tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file_name));
        layers.push(file_layer(config.format, writer, build_filter(config)?));
        guard = Some(file_guard);
    }

    tracing_subscriber::registry()
        .with(layers)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))?;
    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Captured {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    fn capture(f: impl FnOnce()) -> String {
        let out = Captured::default();
        let sink = out.clone();
        let subscriber = tracing_subscriber::registry().with(
            fmt::layer()
                .event_format(DomainFormat::new())
                .with_ansi(false)
                .with_writer(move || sink.clone()),
        );
        tracing::subscriber::with_default(subscriber, f);
        out.text()
    }

    #[test]
    fn domain_becomes_prefix() {
        let text = capture(|| {
            tracing::info!(domain = "store", visits = 3_i64, "history loaded");
        });
        assert!(text.contains(" INFO [store] history loaded visits=3"), "{text}");
    }

    #[test]
    fn events_without_domain_have_no_prefix() {
        let text = capture(|| {
            tracing::warn!(pages = 2_u64, "plain event");
        });
        assert!(text.contains(" WARN plain event pages=2"), "{text}");
        assert!(!text.contains('['), "{text}");
    }

    #[test]
    fn span_names_precede_message() {
        let text = capture(|| {
            let span = tracing::info_span!("query.page", limit = 5_u64);
            let _enter = span.enter();
            tracing::debug!(domain = "query", "sliced");
        });
        assert!(text.contains("[query] query.page{limit=5}: sliced"), "{text}");
    }

    #[test]
    fn bootstrap_reports_under_sys_domain() {
        use crate::service::HistoryService;
        use hl_config::LookbackConfig;

        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("history.jsonl"),
            "{\"kind\":\"visit\",\"time\":1,\"page\":\"a\"}\n",
        )
        .unwrap();
        let config: LookbackConfig = "[store]\nhistory = \"history.jsonl\"\n".parse().unwrap();
        let text = capture(|| {
            assert!(HistoryService::from_config(&config, dir.path()).is_ok());
        });
        assert!(text.contains(" INFO [sys] "), "{text}");
        assert!(text.contains("history service ready"), "{text}");

        let missing: LookbackConfig = "[store]\nhistory = \"absent.jsonl\"\n".parse().unwrap();
        let text = capture(|| {
            assert!(HistoryService::from_config(&missing, dir.path()).is_err());
        });
        assert!(text.contains("ERROR [sys] "), "{text}");
        assert!(text.contains("bootstrap failed"), "{text}");
    }

    #[test]
    fn directives_are_validated() {
        assert!(parse_directives("info,hl_core::aggregate=debug").is_ok());
        assert!(parse_directives("info,hl_core=loud").is_err());
    }

    #[test]
    fn relative_log_file_resolves_against_config_dir() {
        let base = Path::new("/etc/lookback");
        assert_eq!(
            resolve_log_path(Path::new("logs/hl.log"), base),
            PathBuf::from("/etc/lookback/logs/hl.log")
        );
        assert_eq!(
            resolve_log_path(Path::new("/var/log/hl.log"), base),
            PathBuf::from("/var/log/hl.log")
        );
    }
}
