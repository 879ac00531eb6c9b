use thiserror::Error;

/// Zero-based source line a statement came from. Attached to errors after the
/// fact so expression code does not have to thread positions around.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Location {
    pub line: usize,
}

impl Location {
    pub fn new(line: usize) -> Self {
        Self { line }
    }
}

// ─── Compile-time errors ──────────────────────────────────────────────────────

/// Malformed source: unmatched bracket or quote, operator in an invalid
/// position, missing block terminator, invalid command shape.
/// Always fatal to the compile step that produced it.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ParseError {
    pub message: String,
    pub line: Option<usize>,
}

impl ParseError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into(), line: None }
    }

    pub fn at(message: impl Into<String>, line: usize) -> Self {
        Self { message: message.into(), line: Some(line) }
    }

    /// Attach a line number unless one is already present. The raw lexer
    /// reports without a location; the block compiler fills it in.
    pub fn with_line(mut self, line: usize) -> Self {
        self.line.get_or_insert(line);
        self
    }
}

// ─── Run-time errors ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeErrorKind {
    /// Operator unsupported for the operand kind(s), e.g. comparing arrays or
    /// mutating a constant.
    InvalidOperation,
    /// Unsupported or unparseable conversion, e.g. a non-numeric string to int.
    InvalidTypecast,
    /// Unknown variable, unknown subroutine name+arity, index out of bounds.
    LookupFailure,
}

/// Fatal to the current run; there is no retry path anywhere.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct RuntimeError {
    pub kind: RuntimeErrorKind,
    pub message: String,
    pub line: Option<usize>,
}

impl RuntimeError {
    pub fn new(kind: RuntimeErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into(), line: None }
    }

    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::new(RuntimeErrorKind::InvalidOperation, message)
    }

    pub fn invalid_typecast(message: impl Into<String>) -> Self {
        Self::new(RuntimeErrorKind::InvalidTypecast, message)
    }

    pub fn lookup(message: impl Into<String>) -> Self {
        Self::new(RuntimeErrorKind::LookupFailure, message)
    }

    /// Annotate with the owning statement's location, keeping the innermost
    /// location if one was set deeper down.
    pub fn at(mut self, loc: Location) -> Self {
        self.line.get_or_insert(loc.line);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_attaches_once() {
        let e = RuntimeError::lookup("variable x not found.")
            .at(Location::new(3))
            .at(Location::new(9));
        assert_eq!(e.line, Some(3));
    }

    #[test]
    fn parse_error_keeps_first_line() {
        let e = ParseError::new("unmatched bracket").with_line(4).with_line(7);
        assert_eq!(e.line, Some(4));
        assert_eq!(e.to_string(), "unmatched bracket");
    }
}
