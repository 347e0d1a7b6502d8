use chrono::Local;
use colored::*;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::FormattedFields;

pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Initializes the global logging system with colorized output and environment-based level filtering.
///
/// The `RUST_LOG` environment variable controls the level (default: info).
/// Logs go to stderr so they do not interleave with streamed answers on stdout.
/// Returns `false` if a global subscriber was already installed.
/// Example: `RUST_LOG=gemini_agent_sdk_rs=debug cargo run -p gemini-agent-guide-rs`
pub fn init_logging() -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .event_format(CustomFormatter)
        .try_init()
        .is_ok()
}

struct CustomFormatter;

impl<S, N> tracing_subscriber::fmt::FormatEvent<S, N> for CustomFormatter
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
    N: for<'a> tracing_subscriber::fmt::FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &tracing_subscriber::fmt::FmtContext<'_, S, N>,
        mut writer: tracing_subscriber::fmt::format::Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let now = Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z").to_string();
        let level = *event.metadata().level();

        let level_str = match level {
            tracing::Level::ERROR => "ERROR".red().bold().to_string(),
            tracing::Level::WARN => "WARN".yellow().bold().to_string(),
            tracing::Level::INFO => "INFO".green().bold().to_string(),
            tracing::Level::DEBUG => "DEBUG".blue().bold().to_string(),
            tracing::Level::TRACE => "TRACE".magenta().bold().to_string(),
        };

        write!(writer, "{} {} ", now.dimmed(), level_str)?;

        if let Some(scope) = ctx.event_scope() {
            for span in scope.from_root() {
                let extensions = span.extensions();
                if let Some(fields) = extensions.get::<FormattedFields<N>>() {
                    if !fields.is_empty() {
                        write!(writer, "{} ", format!("[{}{{{}}}]", span.name(), fields).cyan())?;
                    }
                }
            }
        }

        let mut message = String::new();
        event.record(&mut MessageVisitor {
            message: &mut message,
        });

        writeln!(writer, "{}", message)
    }
}

/// Writes the message unescaped, followed by `name=value` for other fields.
struct MessageVisitor<'a> {
    message: &'a mut String,
}

impl MessageVisitor<'_> {
    fn push(&mut self, field: &tracing::field::Field, value: std::fmt::Arguments<'_>) {
        use std::fmt::Write;
        if field.name() == "message" {
            let _ = write!(self.message, "{}", value);
        } else {
            let _ = write!(self.message, " {}={}", field.name(), value);
        }
    }
}

impl tracing::field::Visit for MessageVisitor<'_> {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        self.push(field, format_args!("{:?}", value));
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        self.push(field, format_args!("{}", value));
    }
}
