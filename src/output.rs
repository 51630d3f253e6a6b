//! Output sinks and result formatting.
//!
//! Everything the query command prints goes through an [`OutputSink`], so
//! the engine can be exercised against an in-memory buffer instead of the
//! console.
//!
//! Rows are rendered either as pretty-printed JSON (4-space indent) or via
//! a user template. Templates use positional `%1%`, `%2%`, ... directives
//! or sequential `%s` / `%d` directives (not both), and `%%` for a literal
//! percent sign. A template that cannot be applied to a row produces a
//! one-line diagnostic instead of the row.

use std::io::Write;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Something that accepts lines of text.
pub trait OutputSink {
    /// Accept one line of output. The sink supplies the line terminator.
    fn accept(&mut self, text: &str);
}

impl<S: OutputSink + ?Sized> OutputSink for &mut S {
    fn accept(&mut self, text: &str) {
        (**self).accept(text);
    }
}

/// Writes to standard output.
#[derive(Debug, Default)]
pub struct ConsoleSink;

impl OutputSink for ConsoleSink {
    fn accept(&mut self, text: &str) {
        let mut out = std::io::stdout().lock();
        if let Err(e) = writeln!(out, "{}", text) {
            tracing::debug!("stdout write failed: {}", e);
        }
    }
}

/// Writes to standard error. Used for progress so stdout stays clean.
#[derive(Debug, Default)]
pub struct StderrSink;

impl OutputSink for StderrSink {
    fn accept(&mut self, text: &str) {
        let mut err = std::io::stderr().lock();
        if let Err(e) = writeln!(err, "{}", text) {
            tracing::debug!("stderr write failed: {}", e);
        }
    }
}

/// Collects lines in memory.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BufferSink {
    lines: Vec<String>,
}

impl BufferSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// All accepted lines joined with newlines.
    pub fn contents(&self) -> String {
        self.lines.join("\n")
    }
}

impl OutputSink for BufferSink {
    fn accept(&mut self, text: &str) {
        self.lines.push(text.to_string());
    }
}

/// Template application failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("bad format string: {0}")]
    BadFormatString(String),

    #[error("format string expects {expected} values but the row has {supplied}")]
    TooFewArgs { expected: usize, supplied: usize },

    #[error("format string expects {expected} values but the row has {supplied}")]
    TooManyArgs { expected: usize, supplied: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Piece {
    Literal(String),
    /// Zero-based argument index.
    Positional(usize),
    Next,
}

/// A parsed row template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    pieces: Vec<Piece>,
    arity: usize,
}

impl Template {
    /// Parse a template string.
    ///
    /// # Errors
    ///
    /// `BadFormatString` for a dangling `%`, an unknown directive, `%0%`,
    /// or a mix of positional and sequential directives.
    pub fn parse(source: &str) -> Result<Self, FormatError> {
        let mut pieces = Vec::new();
        let mut literal = String::new();
        let mut chars = source.chars().peekable();
        let (mut positional, mut sequential) = (0usize, 0usize);

        while let Some(c) = chars.next() {
            if c != '%' {
                literal.push(c);
                continue;
            }

            let directive = match chars.next() {
                Some('%') => {
                    literal.push('%');
                    continue;
                }
                Some('s') | Some('d') => {
                    sequential += 1;
                    Piece::Next
                }
                Some(d) if d.is_ascii_digit() => {
                    let mut digits = String::from(d);
                    while let Some(next) = chars.next_if(char::is_ascii_digit) {
                        digits.push(next);
                    }
                    if chars.next() != Some('%') {
                        return Err(FormatError::BadFormatString(format!(
                            "unterminated directive %{}",
                            digits
                        )));
                    }
                    let n: usize = digits.parse().map_err(|_| {
                        FormatError::BadFormatString(format!("argument number {} too large", digits))
                    })?;
                    if n == 0 {
                        return Err(FormatError::BadFormatString(
                            "argument numbers start at 1".to_string(),
                        ));
                    }
                    positional = positional.max(n);
                    Piece::Positional(n - 1)
                }
                Some(other) => {
                    return Err(FormatError::BadFormatString(format!(
                        "unknown directive %{}",
                        other
                    )))
                }
                None => {
                    return Err(FormatError::BadFormatString(
                        "trailing % at end of format string".to_string(),
                    ))
                }
            };

            if !literal.is_empty() {
                pieces.push(Piece::Literal(std::mem::take(&mut literal)));
            }
            pieces.push(directive);
        }

        if !literal.is_empty() {
            pieces.push(Piece::Literal(literal));
        }

        if positional > 0 && sequential > 0 {
            return Err(FormatError::BadFormatString(
                "positional and sequential directives cannot be mixed".to_string(),
            ));
        }

        Ok(Self {
            pieces,
            arity: positional.max(sequential),
        })
    }

    /// Number of values a row must supply.
    pub fn arity(&self) -> usize {
        self.arity
    }

    /// Apply the template to one row.
    pub fn apply(&self, row: &[Value]) -> Result<String, FormatError> {
        if row.len() < self.arity {
            return Err(FormatError::TooFewArgs {
                expected: self.arity,
                supplied: row.len(),
            });
        }
        if row.len() > self.arity {
            return Err(FormatError::TooManyArgs {
                expected: self.arity,
                supplied: row.len(),
            });
        }

        let mut out = String::new();
        let mut next = 0;
        for piece in &self.pieces {
            match piece {
                Piece::Literal(text) => out.push_str(text),
                Piece::Positional(i) => out.push_str(&scalar_text(&row[*i])),
                Piece::Next => {
                    out.push_str(&scalar_text(&row[next]));
                    next += 1;
                }
            }
        }
        Ok(out)
    }
}

/// Strings are shown bare, everything else as compact JSON.
pub fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Counts from one call to [`ResultFormatter::render`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RenderSummary {
    pub rows: usize,
    pub failures: usize,
}

/// Renders result batches to a sink.
#[derive(Debug, Clone)]
pub struct ResultFormatter {
    template: Option<Result<Template, FormatError>>,
}

impl ResultFormatter {
    /// Pretty-printed JSON output.
    pub fn raw() -> Self {
        Self { template: None }
    }

    /// Templated output. A malformed template is kept and reported on
    /// every row it is asked to render.
    pub fn with_template(source: &str) -> Self {
        Self {
            template: Some(Template::parse(source)),
        }
    }

    /// Raw output for `None` or an empty string, templated otherwise.
    pub fn from_option(template: Option<&str>) -> Self {
        match template {
            Some(source) if !source.is_empty() => Self::with_template(source),
            _ => Self::raw(),
        }
    }

    /// Render one round's rows. Never fails: problems become diagnostic
    /// lines on the sink.
    pub fn render(&self, rows: &[Value], sink: &mut dyn OutputSink) -> RenderSummary {
        let mut summary = RenderSummary {
            rows: rows.len(),
            failures: 0,
        };

        let template = match &self.template {
            None => {
                match pretty_json(rows) {
                    Ok(text) => sink.accept(&text),
                    Err(e) => {
                        summary.failures += 1;
                        sink.accept(&format!("failed to render results: {}", e));
                    }
                }
                return summary;
            }
            Some(template) => template,
        };

        for row in rows {
            let outcome = template.as_ref().map_err(Clone::clone).and_then(|t| match row {
                Value::Array(values) => t.apply(values),
                single => t.apply(std::slice::from_ref(single)),
            });

            match outcome {
                Ok(line) => sink.accept(&line),
                Err(e) => {
                    tracing::debug!("Template failed on row {}: {}", row, e);
                    summary.failures += 1;
                    sink.accept(&e.to_string());
                }
            }
        }

        summary
    }

    /// Render a `results` field of any shape.
    ///
    /// Arrays go through [`render`](Self::render). Anything else is logged
    /// and rendered as a batch of one.
    pub fn render_value(&self, results: &Value, sink: &mut dyn OutputSink) -> RenderSummary {
        match results {
            Value::Array(rows) => self.render(rows, sink),
            other => {
                tracing::warn!("results field is not an array: {}", other);
                if self.template.is_some() {
                    return self.render(std::slice::from_ref(other), sink);
                }
                let mut summary = RenderSummary {
                    rows: 1,
                    failures: 0,
                };
                match pretty_json(other) {
                    Ok(text) => sink.accept(&text),
                    Err(e) => {
                        summary.failures += 1;
                        sink.accept(&format!("failed to render results: {}", e));
                    }
                }
                summary
            }
        }
    }
}

fn pretty_json<T: Serialize + ?Sized>(value: &T) -> serde_json::Result<String> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut serializer)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}
