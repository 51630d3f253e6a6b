//! Progress reporting.
//!
//! The server embeds a textual percentage in each response when progress
//! was requested. Reporting is best effort: tokens that do not parse, fall
//! outside `0..=100`, or go backwards are dropped without complaint.

use crate::output::OutputSink;

/// Width of the rendered bar in characters.
const BAR_WIDTH: usize = 50;

/// Receives one progress token per round.
pub trait ProgressReporter {
    fn report(&mut self, token: &str);
}

/// Reporter used when progress was not requested.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&mut self, _token: &str) {}
}

/// Renders a percentage bar to a sink.
///
/// The displayed value only ever moves forward. Each advance emits one
/// line, e.g. `[#########################.........................]  50%`.
pub struct PercentProgress<S: OutputSink> {
    sink: S,
    shown: u8,
}

impl<S: OutputSink> PercentProgress<S> {
    pub fn new(sink: S) -> Self {
        Self { sink, shown: 0 }
    }

    /// Last value displayed.
    pub fn shown(&self) -> u8 {
        self.shown
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    fn render(&self) -> String {
        let filled = BAR_WIDTH * usize::from(self.shown) / 100;
        format!(
            "[{}{}] {:>3}%",
            "#".repeat(filled),
            ".".repeat(BAR_WIDTH - filled),
            self.shown
        )
    }
}

impl<S: OutputSink> ProgressReporter for PercentProgress<S> {
    fn report(&mut self, token: &str) {
        let Some(value) = parse_percent(token) else {
            tracing::debug!("Ignoring progress token {:?}", token);
            return;
        };

        if value <= self.shown {
            if value < self.shown {
                tracing::debug!("Ignoring progress regression {} -> {}", self.shown, value);
            }
            return;
        }

        self.shown = value;
        let line = self.render();
        self.sink.accept(&line);
    }
}

/// Parse `"40"`, `" 40 "` or `"40%"` into a percentage.
fn parse_percent(token: &str) -> Option<u8> {
    let trimmed = token.trim();
    let digits = trimmed.strip_suffix('%').unwrap_or(trimmed).trim_end();
    digits.parse::<u8>().ok().filter(|v| *v <= 100)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::BufferSink;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_percent() {
        assert_eq!(parse_percent("40"), Some(40));
        assert_eq!(parse_percent(" 7 "), Some(7));
        assert_eq!(parse_percent("100%"), Some(100));
        assert_eq!(parse_percent("0"), Some(0));
        assert_eq!(parse_percent("101"), None);
        assert_eq!(parse_percent("-5"), None);
        assert_eq!(parse_percent("half"), None);
        assert_eq!(parse_percent(""), None);
    }

    #[test]
    fn test_progress_never_decreases() {
        let mut progress = PercentProgress::new(BufferSink::new());
        let mut displayed = Vec::new();

        for token in ["10", "5", "40"] {
            progress.report(token);
            displayed.push(progress.shown());
        }

        assert_eq!(displayed, vec![10, 10, 40]);
        assert_eq!(progress.sink().lines().len(), 2);
    }

    #[test]
    fn test_garbage_and_repeats_emit_nothing() {
        let mut progress = PercentProgress::new(BufferSink::new());
        progress.report("50");
        progress.report("fifty");
        progress.report("50");
        progress.report("250");

        assert_eq!(progress.shown(), 50);
        assert_eq!(progress.sink().lines().len(), 1);
    }

    #[test]
    fn test_bar_rendering() {
        let mut progress = PercentProgress::new(BufferSink::new());
        progress.report("50");
        progress.report("100");

        let lines = progress.into_sink().lines().to_vec();
        assert_eq!(lines[0], format!("[{}{}]  50%", "#".repeat(25), ".".repeat(25)));
        assert_eq!(lines[1], format!("[{}] 100%", "#".repeat(50)));
    }

    #[test]
    fn test_no_progress_is_silent() {
        let mut progress = NoProgress;
        progress.report("50");
        progress.report("junk");
    }
}
