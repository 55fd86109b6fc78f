use crate::{
    term::{style, ColorMode, OutputOptions, OwoColorize, Style, TAG_WIDTH},
    Result,
};
use heck::TitleCase;
use std::fmt;
use tracing::{field::Field, Event, Level, Subscriber};
use tracing_subscriber::{
    field::Visit,
    fmt::{format::Writer, FmtContext, FormatEvent, FormatFields, FormattedFields},
    registry::LookupSpan,
};

impl OutputOptions {
    pub fn trace_init(&self) -> Result<()> {
        use tracing_subscriber::prelude::*;
        let fmt = tracing_subscriber::fmt::layer()
            .event_format(TagFormatter {
                styles: Styles::new(self.color),
            })
            .with_writer(std::io::stderr);

        tracing_subscriber::registry()
            .with(fmt)
            .with(tracing_error::ErrorLayer::default())
            .with(self.log.clone())
            .try_init()?;
        Ok(())
    }
}

/// Formats `INFO` events whose message starts with a short word, like
/// `"finished run 3"`, as a right-aligned tag followed by the rest of the
/// message and then the event's fields. Everything else gets a level
/// prefix.
#[derive(Debug)]
struct TagFormatter {
    styles: Styles,
}

struct Visitor<'styles, 'writer> {
    level: Level,
    writer: Writer<'writer>,
    is_empty: bool,
    styles: &'styles Styles,
    tagged: bool,
    separator: &'static str,
}

#[derive(Debug)]
struct Styles {
    error: Style,
    warn: Style,
    info: Style,
    debug: Style,
    trace: Style,
    pipes: Style,
    bold: Style,
}

impl<S, N> FormatEvent<S, N> for TagFormatter
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

        let tagged = {
            let mut visitor = Visitor {
                level,
                writer: writer.by_ref(),
                is_empty: true,
                styles: &self.styles,
                tagged: false,
                separator: ", ",
            };
            event.record(&mut visitor);
            visitor.tagged
        };

        // Tagged status lines stand alone; everything else gets its span
        // context on the same line, as in `| run{count=10} iteration{iteration=0}`.
        if !tagged {
            if let Some(scope) = ctx.event_scope() {
                let mut first = true;
                for span in scope.from_root() {
                    if first {
                        write!(writer, " {}", "|".style(self.styles.pipes))?;
                        first = false;
                    }
                    let exts = span.extensions();
                    let fields = exts
                        .get::<FormattedFields<N>>()
                        .map(|f| f.fields.as_str())
                        .unwrap_or("");
                    write!(writer, " {}", span.name().style(self.styles.bold))?;
                    if !fields.is_empty() {
                        write!(writer, "{{{fields}}}")?;
                    }
                }
            }
        }

        writer.write_char('\n')
    }
}

// === impl Visitor ===

impl Visitor<'_, '_> {
    const MESSAGE: &'static str = "message";

    fn write_level(&mut self) {
        let (name, style) = match self.level {
            Level::ERROR => ("error", self.styles.error),
            Level::WARN => ("warning", self.styles.warn),
            Level::INFO => ("info", self.styles.info),
            Level::DEBUG => ("debug", self.styles.debug),
            Level::TRACE => ("trace", self.styles.trace),
        };
        let _ = write!(
            self.writer,
            "{}{} ",
            name.style(style),
            ":".style(self.styles.bold)
        );
    }
}

impl Visit for Visitor<'_, '_> {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if self.is_empty {
            self.is_empty = false;
            if self.level == Level::INFO && field.name() == Self::MESSAGE {
                let message = format!("{value:?}");
                let (tag, rest) = message.split_once(' ').unwrap_or((message.as_str(), ""));
                if tag.len() <= TAG_WIDTH {
                    let _ = write!(
                        self.writer,
                        "{:>width$}",
                        tag.to_title_case().style(self.styles.info),
                        width = TAG_WIDTH,
                    );
                    if !rest.is_empty() {
                        let _ = write!(self.writer, " {rest}");
                    }
                    self.tagged = true;
                    // The first field follows the tagged message directly.
                    self.separator = " ";
                    return;
                }
            }
            self.write_level();
        } else {
            let _ = self.writer.write_str(self.separator);
            self.separator = ", ";
        }

        if field.name() == Self::MESSAGE {
            let _ = write!(self.writer, "{:?}", value.style(self.styles.bold));
        } else {
            let _ = write!(
                self.writer,
                "{}{} {:?}",
                field.name().style(self.styles.bold),
                ":".style(self.styles.bold),
                value
            );
        }
    }
}

// === impl Styles ===

impl Styles {
    fn new(colors: ColorMode) -> Self {
        Self {
            error: colors.if_color(style().red().bold()),
            warn: colors.if_color(style().yellow().bold()),
            info: colors.if_color(style().green().bold()),
            debug: colors.if_color(style().blue().bold()),
            trace: colors.if_color(style().purple().bold()),
            bold: colors.if_color(style().bold()),
            pipes: colors.if_color(style().blue().bold()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        io,
        sync::{Arc, Mutex},
    };
    use tracing_subscriber::{fmt::MakeWriter, prelude::*};

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

    impl<'a> MakeWriter<'a> for Captured {
        type Writer = Self;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    fn capture(f: impl FnOnce()) -> String {
        let out = Captured::default();
        let subscriber = tracing_subscriber::registry().with(
            tracing_subscriber::fmt::layer()
                .event_format(TagFormatter {
                    styles: Styles::new(ColorMode::Never),
                })
                .with_writer(out.clone()),
        );
        tracing::subscriber::with_default(subscriber, f);
        let bytes = out.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn info_messages_are_tagged_with_fields() {
        let out = capture(|| {
            tracing::info!(qpkt = 8u64, hold = 3u64, "finished run");
        });
        assert_eq!(out, "    Finished run qpkt: 8, hold: 3\n");
    }

    #[test]
    fn single_word_info_messages_are_tagged() {
        let out = capture(|| {
            tracing::info!(qpkt = 8u64, "finished");
        });
        assert_eq!(out, "    Finished qpkt: 8\n");
    }

    #[test]
    fn other_levels_get_a_prefix() {
        let out = capture(|| {
            tracing::warn!(task = 3, "no transition for task state");
        });
        assert_eq!(out, "warning: no transition for task state, task: 3\n");
    }

    #[test]
    fn library_run_logs_a_tagged_status_line() {
        let out = capture(|| {
            richards::bench::run(&richards::Config::with_count(1)).unwrap();
        });
        assert!(
            out.lines()
                .any(|line| line == "    Finished run qpkt: 8, hold: 3"),
            "{out}"
        );
    }
}
