//! Lexical statement-stacking detection.
//!
//! The gateway never parses SQL grammar. Instead a single left-to-right
//! pass recognizes the regions in which a `;` is inert (comments, string
//! literals, quoted identifiers) and reports whether a separator outside
//! those regions is followed by more input.
//!
//! Region rules follow MySQL lexing:
//!
//! | Region            | Opens      | Closes            | Escapes               |
//! |-------------------|------------|-------------------|-----------------------|
//! | line comment      | `--`, `#`  | newline or EOF    | none                  |
//! | block comment     | `/*`       | `*/` or EOF       | none                  |
//! | single-quoted     | `'`        | `'`               | `''`, backslash       |
//! | double-quoted     | `"`        | `"`               | `""`, backslash       |
//! | quoted identifier | `` ` ``    | `` ` ``           | doubled backtick      |
//!
//! Versioned comments (`/*! ... */`, `/*!50000 ... */`) use the plain block
//! comment rule.

use crate::error::{DbError, DbResult};
use tracing::debug;

/// Region the scan cursor is currently inside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Region {
    Code,
    LineComment,
    BlockComment,
    /// String literal delimited by the given quote byte (`'` or `"`).
    Quoted(u8),
    Identifier,
}

/// Scan cursor over one SQL string. Never outlives a single classification.
struct Scanner<'a> {
    bytes: &'a [u8],
    pos: usize,
    region: Region,
}

impl<'a> Scanner<'a> {
    fn new(sql: &'a str) -> Self {
        Self {
            bytes: sql.as_bytes(),
            pos: 0,
            region: Region::Code,
        }
    }

    fn peek(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    /// Advance to the next `;` that lies outside every region and return its
    /// byte offset. The cursor is left just past the separator.
    fn next_separator(&mut self) -> Option<usize> {
        while self.pos < self.bytes.len() {
            let b = self.bytes[self.pos];
            match self.region {
                Region::Code => match b {
                    b';' => {
                        let at = self.pos;
                        self.pos += 1;
                        return Some(at);
                    }
                    b'\'' | b'"' => {
                        self.region = Region::Quoted(b);
                        self.pos += 1;
                    }
                    b'`' => {
                        self.region = Region::Identifier;
                        self.pos += 1;
                    }
                    b'#' => {
                        self.region = Region::LineComment;
                        self.pos += 1;
                    }
                    b'-' if self.peek(1) == Some(b'-') => {
                        self.region = Region::LineComment;
                        self.pos += 2;
                    }
                    b'/' if self.peek(1) == Some(b'*') => {
                        self.region = Region::BlockComment;
                        self.pos += 2;
                    }
                    _ => self.pos += 1,
                },
                Region::LineComment => {
                    if b == b'\n' {
                        self.region = Region::Code;
                    }
                    self.pos += 1;
                }
                Region::BlockComment => {
                    if b == b'*' && self.peek(1) == Some(b'/') {
                        self.region = Region::Code;
                        self.pos += 2;
                    } else {
                        self.pos += 1;
                    }
                }
                Region::Quoted(quote) => {
                    if b == b'\\' {
                        // Backslash swallows the next byte, whatever it is.
                        self.pos += 2;
                    } else if b == quote && self.peek(1) == Some(quote) {
                        self.pos += 2;
                    } else {
                        if b == quote {
                            self.region = Region::Code;
                        }
                        self.pos += 1;
                    }
                }
                Region::Identifier => {
                    if b == b'`' && self.peek(1) == Some(b'`') {
                        self.pos += 2;
                    } else {
                        if b == b'`' {
                            self.region = Region::Code;
                        }
                        self.pos += 1;
                    }
                }
            }
        }
        // Unterminated regions are closed by end of input.
        None
    }
}

/// Returns `true` when `sql` holds at most one statement.
///
/// A `;` outside every comment, string and quoted identifier disqualifies
/// the input as soon as anything other than whitespace follows it. A single
/// trailing `;` is accepted; `";;"` is not, because the second separator is
/// content after the first.
///
/// # Examples
///
/// ```
/// use mysql_gateway_mcp::tools::sql_validator::is_single_statement;
///
/// assert!(is_single_statement("SELECT 1;   "));
/// assert!(is_single_statement("SELECT 'a;b' FROM t -- ;c"));
/// assert!(!is_single_statement("SELECT 1; DROP TABLE users"));
/// assert!(!is_single_statement(";;"));
/// ```
pub fn is_single_statement(sql: &str) -> bool {
    let mut scanner = Scanner::new(sql);
    while let Some(at) = scanner.next_separator() {
        // `;` is ASCII, so at + 1 is always a char boundary.
        if !sql[at + 1..].trim().is_empty() {
            return false;
        }
    }
    true
}

/// Reject statement stacking before any connection is acquired.
pub fn ensure_single_statement(sql: &str) -> DbResult<()> {
    if is_single_statement(sql) {
        Ok(())
    } else {
        debug!(sql_len = sql.len(), "Rejected multi-statement query");
        Err(DbError::MultiStatementRejected)
    }
}

/// Strip leading whitespace and leading comments, returning the text that
/// starts at the first real token. Uses the same comment rules as the
/// separator scan; an unterminated comment consumes the rest of the input.
pub(crate) fn skip_leading_trivia(sql: &str) -> &str {
    let mut rest = sql;
    loop {
        rest = rest.trim_start();
        if let Some(after) = rest.strip_prefix("--").or_else(|| rest.strip_prefix('#')) {
            rest = match after.find('\n') {
                Some(nl) => &after[nl + 1..],
                None => "",
            };
        } else if let Some(after) = rest.strip_prefix("/*") {
            rest = match after.find("*/") {
                Some(end) => &after[end + 2..],
                None => "",
            };
        } else {
            return rest;
        }
    }
}
