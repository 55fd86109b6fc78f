use core::fmt;

/// A record of task activations.
///
/// When tracing is enabled, the scheduler records the character `'0' + id`
/// each time it dispatches task `id`, and each device task records the
/// character it was sent. Output is broken into lines of [`Trace::WIDTH`]
/// characters, and begins with a line break.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Trace {
    out: String,
    /// Characters remaining on the current line.
    layout: usize,
}

impl Trace {
    pub const WIDTH: usize = 50;

    #[must_use]
    pub const fn new() -> Self {
        Self {
            out: String::new(),
            layout: 0,
        }
    }

    pub(crate) fn record(&mut self, ch: u8) {
        self.layout = self.layout.saturating_sub(1);
        if self.layout == 0 {
            self.out.push('\n');
            self.layout = Self::WIDTH;
        }
        self.out.push(char::from(ch));
    }

    /// Returns the trace as it would be printed, including line breaks.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.out
    }

    /// Returns the recorded characters, without line breaks.
    pub fn activations(&self) -> impl Iterator<Item = char> + '_ {
        self.out.chars().filter(|&ch| ch != '\n')
    }
}

impl fmt::Display for Trace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.out)
    }
}
