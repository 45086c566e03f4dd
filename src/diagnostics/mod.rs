// Copyright 2025 STARGA Inc.
// Licensed under the Apache License, Version 2.0 (the “License”);
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at:
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an “AS IS” BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// Part of the Frechet project (directional derivatives as nested closures).

//! Source-anchored error messages with a caret line.
//!
//! The parser reports positions as character indices. A [`Diagnostic`]
//! stores the equivalent byte range so it can slice the source directly,
//! while [`Location`] columns count characters.

use std::ops::Range;

/// Byte range into the source text.
pub type Span = Range<usize>;

/// 1-based line and character column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub line: usize,
    pub col: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub message: String,
    /// Byte range of the offending text.
    pub span: Span,
    pub start: Location,
    pub end: Location,
}

impl Diagnostic {
    /// Build a diagnostic from a character-indexed range, as produced by the
    /// parser and carried by syntax-tree spans.
    pub fn new(src: &str, message: impl Into<String>, chars: Range<usize>) -> Self {
        let span = byte_offset(src, chars.start)..byte_offset(src, chars.end);
        Diagnostic {
            message: message.into(),
            start: location(src, span.start),
            end: location(src, span.end),
            span,
        }
    }

    pub fn from_chumsky(src: &str, e: chumsky::error::Simple<char>) -> Self {
        Diagnostic::new(src, e.to_string(), e.span())
    }
}

/// Byte offset of the character at index `chars`, clamped to the source end.
fn byte_offset(src: &str, chars: usize) -> usize {
    src.char_indices()
        .nth(chars)
        .map(|(offset, _)| offset)
        .unwrap_or(src.len())
}

fn location(src: &str, offset: usize) -> Location {
    let before = &src[..offset];
    let line_start = before.rfind('\n').map(|i| i + 1).unwrap_or(0);
    Location {
        line: before.matches('\n').count() + 1,
        col: before[line_start..].chars().count() + 1,
    }
}

/// Render `error: message`, the position, the offending line and a caret
/// under the span (clipped to that line).
pub fn render(src: &str, diag: &Diagnostic) -> String {
    let start = diag.span.start.min(src.len());
    let line_start = src[..start].rfind('\n').map(|i| i + 1).unwrap_or(0);
    let line_end = src[start..]
        .find('\n')
        .map(|i| start + i)
        .unwrap_or(src.len());
    let line = &src[line_start..line_end];

    let end = diag.span.end.clamp(start, line_end);
    let indent = src[line_start..start].chars().count();
    let width = src[start..end].chars().count().max(1);

    format!(
        "error: {}\n--> line {}, col {}\n{}\n{}{}",
        diag.message,
        diag.start.line,
        diag.start.col,
        line,
        " ".repeat(indent),
        "^".repeat(width)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_points_at_the_span() {
        let src = "fn f(x) =\n  x + y";
        let diag = Diagnostic::new(src, "unknown variable 'y'", 16..17);
        assert_eq!(diag.start, Location { line: 2, col: 7 });
        let rendered = render(src, &diag);
        assert!(rendered.ends_with("  x + y\n      ^"), "{rendered}");
    }

    #[test]
    fn character_spans_map_to_bytes() {
        let src = "fn f(é) = é + y";
        let diag = Diagnostic::new(src, "unknown variable 'y'", 14..15);
        assert_eq!(&src[diag.span.clone()], "y");
        assert_eq!(diag.start, Location { line: 1, col: 15 });
        let rendered = render(src, &diag);
        assert!(rendered.ends_with(&format!("{src}\n{}^", " ".repeat(14))), "{rendered}");
    }

    #[test]
    fn span_at_end_of_input_is_clamped() {
        let src = "fn f(x) = x +";
        let diag = Diagnostic::new(src, "unexpected end of input", 13..14);
        assert_eq!(diag.span, 13..13);
        assert!(render(src, &diag).ends_with(&format!("{}^", " ".repeat(13))));
    }
}
