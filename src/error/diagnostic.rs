//! Diagnostic rendering
//!
//! Turns a [`VibeError`] into the text the CLI prints: a colored header,
//! a gutter-framed source excerpt with a caret when the error carries a
//! location, and a guidance footer for the kinds where the right next step
//! is not obvious from the message alone (in particular, a model call that
//! never produced a payload versus one whose payload failed coercion).

use super::{SourceLocation, VibeError};
use colored::Colorize;

/// Diagnostic information for displaying errors with context
pub struct Diagnostic {
    error: VibeError,
    source: Option<String>,
}

impl Diagnostic {
    /// Create a new diagnostic from an error
    pub fn new(error: VibeError) -> Self {
        Self {
            error,
            source: None,
        }
    }

    /// Create a diagnostic with source code context
    pub fn with_source(error: VibeError, source: &str) -> Self {
        Self {
            error,
            source: Some(source.to_string()),
        }
    }

    /// Format the diagnostic with color, excerpt, and guidance
    pub fn format(&self) -> String {
        let mut output = format!(
            "{}: {}\n",
            self.error.kind().red().bold(),
            self.error.message()
        );

        if let Some(location) = self.error.location() {
            output.push_str(&format!("  {} {}\n", "-->".blue().bold(), location));
            if let Some(ref source) = self.source {
                output.push_str(&excerpt(source, location));
            }
        }

        if let Some(help) = self.guidance() {
            output.push_str(&format!("  {} {}\n", "help:".cyan().bold(), help));
        }

        output
    }

    /// A next-step hint for the kinds where the message alone is ambiguous
    fn guidance(&self) -> Option<&'static str> {
        match &self.error {
            VibeError::ModelConnection { .. } => Some(
                "the model service was never reached; check the provider, API key, \
                 and network before retrying the call",
            ),
            VibeError::Runtime { message, .. } if message.contains("model response") => Some(
                "the model responded but the text did not fit the declared return type; \
                 tighten the prompt or widen the return type",
            ),
            VibeError::Codegen { .. } => {
                Some("this indicates a compiler bug rather than a problem in the program")
            }
            _ => None,
        }
    }
}

/// Renders the offending line in a gutter frame with a caret under the column
fn excerpt(source: &str, location: &SourceLocation) -> String {
    let Some(line) = source.lines().nth(location.line.saturating_sub(1)) else {
        return String::new();
    };

    let number = location.line.to_string();
    let gutter = " ".repeat(number.len());
    let caret_pad = " ".repeat(location.column.saturating_sub(1));

    format!(
        "  {} {}\n  {} {} {}\n  {} {} {}{}\n",
        gutter,
        "|".blue().bold(),
        number.blue().bold(),
        "|".blue().bold(),
        line,
        gutter,
        "|".blue().bold(),
        caret_pad,
        "^".red().bold(),
    )
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.format())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_without_source() {
        let loc = SourceLocation::at(1, 1);
        let err = VibeError::parser("unexpected character", loc);
        let formatted = Diagnostic::new(err).format();
        assert!(formatted.contains("Parser Error"));
        assert!(formatted.contains("unexpected character"));
    }

    #[test]
    fn test_diagnostic_excerpt_marks_the_line() {
        let source = "let x = 42;\nlet y = @;\nlet z = 10;";
        let loc = SourceLocation::at(2, 9);
        let err = VibeError::parser("unexpected character '@'", loc);
        let formatted = Diagnostic::with_source(err, source).format();
        assert!(formatted.contains("let y = @;"));
        assert!(formatted.contains('^'));
        // Only the offending line is excerpted.
        assert!(!formatted.contains("let z = 10;"));
    }

    #[test]
    fn test_connection_and_coercion_guidance_differ() {
        let conn = Diagnostic::new(VibeError::model_connection("request timed out")).format();
        assert!(conn.contains("never reached"));

        let coercion = Diagnostic::new(VibeError::runtime(
            "model response 'maybe' cannot be read as Bool",
            None,
        ))
        .format();
        assert!(coercion.contains("did not fit the declared return type"));
    }

    #[test]
    fn test_out_of_range_location_renders_header_only() {
        let err = VibeError::parser("boom", SourceLocation::at(99, 1));
        let formatted = Diagnostic::with_source(err, "one line").format();
        assert!(formatted.contains("Parser Error"));
        assert!(!formatted.contains('^'));
    }
}
