use chrono::Local;
use nu_ansi_term::{Color, Style};
use std::fmt;
use std::time::Duration;
use tracing::{Event, Subscriber};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{format::Writer, FmtContext, FormatEvent, FormatFields},
    prelude::*,
    registry::LookupSpan,
    Layer,
};

/// Target used for per-task result lines. Always printed to the terminal.
pub const TASK_RESULT_TARGET: &str = "task_result";

/// Installs the global subscriber: hourly-rolling file under `log_dir`
/// plus a terminal layer. `verbose` lowers the terminal default level
/// from WARN to INFO.
pub fn setup_logger(log_dir: &str, file_prefix: &str, verbose: bool) -> Option<WorkerGuard> {
    std::fs::create_dir_all(log_dir).ok();

    let file_appender = tracing_appender::rolling::hourly(log_dir, file_prefix);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_filter = tracing_subscriber::filter::Targets::new()
        .with_target(TASK_RESULT_TARGET, tracing::Level::INFO)
        .with_default(tracing::Level::INFO);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .event_format(FileFormatter)
        .with_filter(file_filter);

    let console_default = if verbose {
        tracing::Level::INFO
    } else {
        tracing::Level::WARN
    };
    let console_filter = tracing_subscriber::filter::Targets::new()
        .with_target(TASK_RESULT_TARGET, tracing::Level::INFO)
        .with_default(console_default);

    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .with_ansi(true)
        .event_format(TerminalFormatter)
        .with_filter(console_filter);

    // try_init so tests and repeated setup do not panic
    if tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .is_err()
    {
        return None;
    }

    Some(guard)
}

/// `[WL:003][P:001] Success [bean] swapped 0.05 MON (B: 1.2345) in 2.1s`
///
/// `proxy_idx` is `None` for wallets running without a proxy.
pub fn format_task_line(
    wallet_idx: usize,
    proxy_idx: Option<usize>,
    success: bool,
    task: &str,
    message: &str,
    balance: Option<f64>,
    elapsed: Duration,
) -> String {
    let proxy = proxy_idx
        .map(|p| format!("{:03}", p))
        .unwrap_or_else(|| "---".to_string());
    let status = if success { "Success" } else { "Failed" };
    let balance = balance
        .map(|b| format!("{:.4}", b))
        .unwrap_or_else(|| "?".to_string());

    format!(
        "[WL:{:03}][P:{}] {} [{}] {} (B: {}) in {:.1}s",
        wallet_idx,
        proxy,
        status,
        task,
        message,
        balance,
        elapsed.as_secs_f64()
    )
}

struct MessageVisitor {
    message: String,
}

impl tracing::field::Visit for MessageVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        }
    }
    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        }
    }
}

fn colorize(msg: String) -> String {
    let paint = |msg: String, words: [&str; 2], color: Color| {
        let style = Style::new().fg(color).bold();
        words.iter().fold(msg, |acc, w| {
            acc.replace(w, &format!("{}", style.paint(*w)))
        })
    };

    if msg.contains("SUCCESS") || msg.contains("Success") {
        paint(msg, ["SUCCESS", "Success"], Color::LightGreen)
    } else if msg.contains("FAILED") || msg.contains("Failed") {
        paint(msg, ["FAILED", "Failed"], Color::LightRed)
    } else if msg.contains("SKIPPED") || msg.contains("Skipped") {
        paint(msg, ["SKIPPED", "Skipped"], Color::LightYellow)
    } else {
        msg
    }
}

pub struct TerminalFormatter;

impl<S, N> FormatEvent<S, N> for TerminalFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let mut msg_visitor = MessageVisitor {
            message: String::new(),
        };
        event.record(&mut msg_visitor);

        let level = *event.metadata().level();
        if level <= tracing::Level::WARN && event.metadata().target() != TASK_RESULT_TARGET {
            let style = if level == tracing::Level::ERROR {
                Style::new().fg(Color::Red)
            } else {
                Style::new().fg(Color::Yellow)
            };
            write!(writer, "{} ", style.paint(format!("[{}]", level)))?;
        }

        write!(writer, "{}", colorize(msg_visitor.message))?;
        writeln!(writer)
    }
}

pub struct FileFormatter;

impl<S, N> FormatEvent<S, N> for FileFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
        let level = event.metadata().level();

        write!(writer, "{} [{}] ", timestamp, level)?;

        let mut msg_visitor = MessageVisitor {
            message: String::new(),
        };
        event.record(&mut msg_visitor);
        writeln!(writer, "{}", strip_ansi(&msg_visitor.message))
    }
}

/// Removes CSI escape sequences (`ESC [ ... final byte`) so colored
/// messages land in log files as plain text.
fn strip_ansi(msg: &str) -> String {
    let mut out = String::with_capacity(msg.len());
    let mut chars = msg.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\u{1b}' && chars.peek() == Some(&'[') {
            chars.next();
            for c in chars.by_ref() {
                if ('@'..='~').contains(&c) {
                    break;
                }
            }
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_task_line() {
        let line = format_task_line(
            3,
            Some(1),
            true,
            "bean",
            "swapped",
            Some(1.23456),
            Duration::from_millis(2100),
        );
        assert_eq!(line, "[WL:003][P:001] Success [bean] swapped (B: 1.2346) in 2.1s");
    }

    #[test]
    fn test_format_task_line_without_proxy() {
        let line = format_task_line(12, None, false, "nft", "reverted", None, Duration::ZERO);
        assert_eq!(line, "[WL:012][P:---] Failed [nft] reverted (B: ?) in 0.0s");
    }

    #[test]
    fn test_colorize_leaves_plain_text() {
        assert_eq!(colorize("hello".to_string()), "hello");
        assert_ne!(colorize("Success".to_string()), "Success");
    }

    #[test]
    fn test_strip_ansi_restores_plain_text() {
        let painted = colorize("[WL:001][P:---] Success [bean] sent 0.5 MON".to_string());
        assert_eq!(strip_ansi(&painted), "[WL:001][P:---] Success [bean] sent 0.5 MON");
        assert_eq!(
            strip_ansi("\u{1b}[38;2;255;165;0m0xabc\u{1b}[0m ok"),
            "0xabc ok"
        );
        assert_eq!(strip_ansi("no escapes"), "no escapes");
    }
}
