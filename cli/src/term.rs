use clap::{ArgGroup, Args};
use std::fmt;

pub use owo_colors::{style, OwoColorize, Style};

/// Width of the right-aligned tag column in log output.
pub const TAG_WIDTH: usize = 12;
const ARG_GROUP: &str = "output-opts";

#[derive(Debug, Args)]
#[command(
    next_help_heading = "Output Options",
    group = ArgGroup::new(ARG_GROUP).multiple(true),
)]
pub struct OutputOptions {
    /// Whether to emit colors in output.
    #[clap(
        long,
        env = "CARGO_TERM_COLORS",
        default_value_t = ColorMode::Auto,
        global = true,
        group = ARG_GROUP,
    )]
    pub color: ColorMode,

    /// Configures logging.
    #[clap(
        short,
        long,
        env = "RUST_LOG",
        default_value = "richards=info,richards_cli=info,warn",
        global = true,
        group = ARG_GROUP,
    )]
    pub log: tracing_subscriber::filter::Targets,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, clap::ValueEnum)]
#[clap(rename_all = "lower")]
pub enum ColorMode {
    /// Determine whether to color output based on whether or not the output
    /// stream is a TTY.
    Auto,
    /// Always color output.
    Always,
    /// Never color output.
    Never,
}

// === impl OutputOptions ===

impl OutputOptions {
    pub fn init(&self) -> color_eyre::Result<()> {
        self.trace_init()
    }

    /// Styles the verdict line printed at the end of each run.
    pub fn verdict_style(&self, correct: bool) -> Style {
        let style = if correct {
            style().green().bold()
        } else {
            style().red().bold()
        };
        if self.color.should_color(atty::Stream::Stdout) {
            style
        } else {
            owo_colors::style()
        }
    }
}

// === impl ColorMode ===

impl fmt::Display for ColorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl ColorMode {
    /// Returns `style` if log output on stderr should be colored, or a plain
    /// style otherwise.
    pub fn if_color(self, style: Style) -> Style {
        if self.should_color(atty::Stream::Stderr) {
            style
        } else {
            owo_colors::style()
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ColorMode::Auto => "auto",
            ColorMode::Always => "always",
            ColorMode::Never => "never",
        }
    }

    pub fn should_color(self, stream: atty::Stream) -> bool {
        match self {
            ColorMode::Auto => atty::is(stream),
            ColorMode::Always => true,
            ColorMode::Never => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Options;
    use clap::Parser;

    #[test]
    fn color_defaults_to_auto() {
        let opts = Options::try_parse_from(["richards"]).unwrap();
        if std::env::var_os("CARGO_TERM_COLORS").is_none() {
            assert_eq!(opts.output.color, ColorMode::Auto);
        }
    }

    #[test]
    fn never_is_plain() {
        let opts = Options::try_parse_from(["richards", "--color", "never"]).unwrap();
        assert_eq!(opts.output.color, ColorMode::Never);

        let tagged = "tag".style(opts.output.color.if_color(style().red().bold()));
        assert_eq!(tagged.to_string(), "tag");
        let verdict = "correct".style(opts.output.verdict_style(true));
        assert_eq!(verdict.to_string(), "correct");
    }

    #[test]
    fn always_colors_both_streams() {
        assert!(ColorMode::Always.should_color(atty::Stream::Stdout));
        assert!(ColorMode::Always.should_color(atty::Stream::Stderr));
        assert!(!ColorMode::Never.should_color(atty::Stream::Stdout));
    }
}
