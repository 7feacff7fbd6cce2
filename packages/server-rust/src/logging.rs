//! Unified logging pipeline for the tarot backend.
//!
//! Every log line in the process goes through one formatter and one sink,
//! whether it originates from application code (`tracing` macros), from
//! server internals, or from dependencies that still emit through the `log`
//! crate. Known-chatty HTTP transport targets are capped at WARN so
//! dependency noise cannot drown application signal.

use std::fmt;

use chrono::Local;
use tracing::{Event, Level, Metadata, Subscriber};
use tracing_log::{LogTracer, NormalizeEvent};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Targets whose DEBUG/INFO chatter is forced down to WARN regardless of the
/// configured level. These are the HTTP transport internals underneath axum
/// and any outbound HTTP clients.
const NOISY_TARGETS: &[&str] = &["hyper", "hyper_util", "h2", "reqwest", "rustls"];

/// Installs the process-wide logging pipeline.
///
/// This wires three things together:
/// 1. a [`LogTracer`] that re-emits `log`-crate records as `tracing` events,
///    preserving the original target, severity, module, and line (levels are
///    mapped numerically, so every record lands on a valid severity);
/// 2. an [`EnvFilter`] built from `level` plus the [`NOISY_TARGETS`] caps;
/// 3. a fmt layer using [`LineFormat`], so all output shares one line shape.
///
/// A panic hook is installed last so panic messages and their backtraces are
/// logged through the same sink instead of raw stderr.
///
/// # Errors
///
/// Returns an error if a global logger or subscriber is already installed.
/// The sink is built fresh here and registered exactly once per process;
/// re-configuration is not supported once the process is logging.
pub fn init(level: &str) -> anyhow::Result<()> {
    LogTracer::init()?;

    let filter = build_filter(parse_level(level));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().event_format(LineFormat))
        .try_init()?;

    install_panic_hook();
    Ok(())
}

/// Maps a configured level name to a `tracing` level.
///
/// `WARNING` is accepted as an alias for `WARN`; unknown names fall back to
/// `INFO`.
fn parse_level(level: &str) -> Level {
    match level.to_uppercase().as_str() {
        "TRACE" => Level::TRACE,
        "DEBUG" => Level::DEBUG,
        "WARNING" | "WARN" => Level::WARN,
        "ERROR" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Builds the global filter: the configured level as the default directive,
/// with each noisy target capped at WARN. Target-specific directives take
/// precedence over the default, so the caps hold even at DEBUG.
fn build_filter(level: Level) -> EnvFilter {
    let mut filter = EnvFilter::from_default_env().add_directive(level.into());
    for target in NOISY_TARGETS {
        filter = filter.add_directive(
            format!("{target}=warn")
                .parse()
                .expect("static filter directive must parse"),
        );
    }
    filter
}

/// Routes panic output through the unified sink.
///
/// The hook runs at the panic site, before unwinding, so the captured
/// backtrace points at the panicking frame. This is the single stack-trace
/// log for a panic; the HTTP layer only produces the response envelope.
fn install_panic_hook() {
    std::panic::set_hook(Box::new(|panic_info| {
        let backtrace = std::backtrace::Backtrace::force_capture();
        tracing::error!(target: "panic", backtrace = %backtrace, "{panic_info}");
    }));
}

/// Event formatter producing the unified line shape:
///
/// ```text
/// 2025-01-01 12:00:00.000 | INFO     | target:scope:line - message
/// ```
///
/// The level is left-aligned and padded to 8 characters. For records bridged
/// from the `log` crate the original callsite metadata is recovered, so
/// dependency output is indistinguishable in shape from application output.
pub struct LineFormat;

impl<S, N> FormatEvent<S, N> for LineFormat
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
        // Bridged `log` records carry their real callsite in normalized
        // metadata; native events use their own.
        let normalized = event.normalized_metadata();
        let meta = normalized.as_ref().unwrap_or_else(|| event.metadata());

        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S%.3f").to_string();
        write!(
            writer,
            "{}",
            record_prefix(
                &timestamp,
                meta.level(),
                meta.target(),
                scope_of(meta),
                meta.line().unwrap_or(0),
            )
        )?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Renders everything up to and including the ` - ` separator.
///
/// Kept separate from [`LineFormat`] so the exact line shape is testable
/// without driving a subscriber.
fn record_prefix(timestamp: &str, level: &Level, target: &str, scope: &str, line: u32) -> String {
    format!("{timestamp} | {level:<8} | {target}:{scope}:{line} - ")
}

/// The innermost module segment of a callsite, standing in for the enclosing
/// function (which `tracing` does not expose). `-` when the record carries no
/// module path at all.
fn scope_of<'a>(meta: &'a Metadata<'a>) -> &'a str {
    meta.module_path().map_or("-", module_scope)
}

fn module_scope(path: &str) -> &str {
    path.rsplit("::").next().unwrap_or(path)
}
