use std::fmt;

/// A character range in the template source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn dummy() -> Self {
        Self { start: 0, end: 0 }
    }

    pub fn merge(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

/// A label pointing at a span in the template source.
#[derive(Debug, Clone)]
pub struct Label {
    pub span: Span,
    pub message: String,
}

impl Label {
    pub fn primary(span: Span, message: impl Into<String>) -> Self {
        Self {
            span,
            message: message.into(),
        }
    }
}

/// A renderable error or warning with optional source labels and notes.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: Option<String>,
    pub message: String,
    pub labels: Vec<Label>,
    pub notes: Vec<String>,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            code: None,
            message: message.into(),
            labels: Vec::new(),
            notes: Vec::new(),
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_label(mut self, label: Label) -> Self {
        self.labels.push(label);
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.notes.push(format!("help: {}", help.into()));
        self
    }
}

/// Computes a 1-based line and column from a character offset.
pub fn line_col(source: &str, offset: usize) -> (usize, usize) {
    let mut line = 1;
    let mut col = 1;
    for (i, ch) in source.chars().enumerate() {
        if i >= offset {
            break;
        }
        if ch == '\n' {
            line += 1;
            col = 1;
        } else {
            col += 1;
        }
    }
    (line, col)
}

fn line_content(source: &str, line_num: usize) -> Option<&str> {
    source.split('\n').nth(line_num - 1)
}

/// Renders diagnostics in a rustc-like layout against the template source.
pub struct DiagnosticRenderer<'a> {
    source: &'a str,
    file_name: &'a str,
    use_color: bool,
}

impl<'a> DiagnosticRenderer<'a> {
    pub fn new(source: &'a str, file_name: &'a str, use_color: bool) -> Self {
        Self {
            source,
            file_name,
            use_color,
        }
    }

    pub fn render(&self, diagnostic: &Diagnostic) -> String {
        let mut out = String::new();

        let severity = match diagnostic.severity {
            Severity::Error => self.paint("error", "1;31"),
            Severity::Warning => self.paint("warning", "1;33"),
        };
        match &diagnostic.code {
            Some(code) => out.push_str(&format!(
                "{}[{}]: {}\n",
                severity,
                code,
                self.paint(&diagnostic.message, "1")
            )),
            None => out.push_str(&format!(
                "{}: {}\n",
                severity,
                self.paint(&diagnostic.message, "1")
            )),
        }

        if let Some(label) = diagnostic.labels.first() {
            let (line, col) = line_col(self.source, label.span.start);
            out.push_str(&format!(
                "  {} {}:{}:{}\n",
                self.paint("-->", "34"),
                self.file_name,
                line,
                col
            ));
            if let Some(content) = line_content(self.source, line) {
                let gutter = " ".repeat(line.to_string().len() + 1);
                let bar = self.paint("|", "34");
                out.push_str(&format!("{}{}\n", gutter, bar));
                out.push_str(&format!(
                    "{} {} {}\n",
                    self.paint(&line.to_string(), "34"),
                    bar,
                    content
                ));

                let width = (label.span.end.saturating_sub(label.span.start)).max(1);
                let carets = format!("{}{}", " ".repeat(col.saturating_sub(1)), "^".repeat(width));
                let mut underline = self.paint(&carets, "31");
                if !label.message.is_empty() {
                    underline.push(' ');
                    underline.push_str(&self.paint(&label.message, "31"));
                }
                out.push_str(&format!("{}{} {}\n", gutter, bar, underline));
            }
        }

        for note in &diagnostic.notes {
            out.push_str(&format!("  {} {}\n", self.paint("=", "34"), note));
        }

        out
    }

    fn paint(&self, text: &str, style: &str) -> String {
        if self.use_color {
            format!("\x1b[{}m{}\x1b[0m", style, text)
        } else {
            text.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_col_counts_newlines() {
        let source = "{{ a }}\n{{ b }}";
        assert_eq!(line_col(source, 0), (1, 1));
        assert_eq!(line_col(source, 3), (1, 4));
        assert_eq!(line_col(source, 8), (2, 1));
        assert_eq!(line_col(source, 11), (2, 4));
    }

    #[test]
    fn span_merge_covers_both() {
        let merged = Span::new(5, 10).merge(Span::new(8, 15));
        assert_eq!(merged, Span::new(5, 15));
    }

    #[test]
    fn renders_header_location_and_underline() {
        let source = "{{ name | }}\n";
        let diagnostic = Diagnostic::error("expected identifier for the filter")
            .with_code("E0105")
            .with_label(Label::primary(Span::new(10, 12), "expected a filter name"))
            .with_help("filters are applied as `value | name`");

        let renderer = DiagnosticRenderer::new(source, "template", false);
        let output = renderer.render(&diagnostic);

        assert!(output.contains("error[E0105]"));
        assert!(output.contains("template:1:11"));
        assert!(output.contains("^^"));
        assert!(output.contains("help:"));
    }
}
