//! Source location tracking for error reporting.
//!
//! Every token, AST node, and emitted instruction carries a [`Position`],
//! so an error raised at any stage of the pipeline can point back at the
//! template source that produced it.

use serde::{Deserialize, Serialize};

/// A location in the template source.
///
/// `offset` is the byte offset from the start of the source, `line` is
/// 1-based, `column` is 0-based. The tokenizer advances `offset` and
/// `column` together for every consumed byte and resets `column` on
/// newlines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Position {
    /// Byte offset from the start of the source.
    pub offset: usize,
    /// 1-based line number.
    pub line: u32,
    /// 0-based column. Transiently -1 right after a newline, so that
    /// advancing over the next byte lands on column 0.
    pub column: i32,
}

impl Position {
    /// Position of the first byte of a source text.
    pub fn start() -> Self {
        Position {
            offset: 0,
            line: 1,
            column: 0,
        }
    }

    /// Advance over `n` bytes on the current line.
    pub fn advance(&mut self, n: usize) {
        self.offset += n;
        self.column += n as i32;
    }

    /// Record a newline: the next byte is column 0 of the next line.
    pub fn newline(&mut self) {
        self.line += 1;
        self.column = -1;
    }
}
