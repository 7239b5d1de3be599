use std::error::Error as StdError;
use std::fmt;
use std::io;
use std::result;

/// A type alias for `Result<T, flatfile::Error>`.
pub type Result<T> = result::Result<T, Error>;

/// Longest raw-text slice reproduced in an error message.
const SNIPPET_LEN: usize = 64;

/// An error that can occur when processing flat-file data.
///
/// This error can happen when reading or writing delimited or fixed-width
/// records. Errors raised while a record is being processed can usually be
/// intercepted through the reader's or writer's column- and record-error
/// handlers; an error that reaches the caller has already put the stream
/// into its errored state and the stream cannot be used further.
#[derive(Debug)]
pub struct Error(Box<ErrorKind>);

impl Error {
    /// A crate private constructor for `Error`.
    pub(crate) fn new(kind: ErrorKind) -> Error {
        Error(Box::new(kind))
    }

    /// A crate private constructor for state violations.
    pub(crate) fn state(message: &'static str) -> Error {
        Error::new(ErrorKind::State { message })
    }

    /// Return the specific type of this error.
    pub fn kind(&self) -> &ErrorKind {
        &self.0
    }

    /// Unwrap this error into its underlying type.
    pub fn into_kind(self) -> ErrorKind {
        *self.0
    }

    /// True for errors that can never be intercepted by an event handler:
    /// source I/O failures and state violations.
    pub(crate) fn is_fatal(&self) -> bool {
        matches!(*self.0, ErrorKind::Io(_) | ErrorKind::State { .. })
    }
}

/// The specific type of an error.
#[derive(Debug)]
#[non_exhaustive]
pub enum ErrorKind {
    /// An I/O error raised by the underlying character source or sink.
    Io(io::Error),
    /// The tokenizer could not make sense of a raw record, for example an
    /// unterminated quoted value or a fixed-width record cut short of its
    /// column windows when the options reject that.
    Syntax {
        /// Physical number of the offending record.
        record: u64,
        /// What the tokenizer choked on.
        message: String,
    },
    /// A column codec could not convert between raw text and a typed value.
    ColumnConversion {
        /// Physical number of the offending record.
        record: u64,
        /// Name of the offending column.
        column: String,
        /// The raw text that failed to convert, truncated for display.
        raw: String,
        /// The underlying cause.
        message: String,
    },
    /// A record had a different number of fields than its schema requires.
    RecordShape {
        /// Physical number of the offending record.
        record: u64,
        /// The number of fields the schema requires.
        expected: usize,
        /// The number of fields actually present.
        actual: usize,
    },
    /// No selector predicate matched a record and no default schema was
    /// configured.
    SchemaSelection {
        /// Physical number of the offending record.
        record: u64,
    },
    /// A reader or writer was used in a way its current state forbids,
    /// for example reading after a previous unhandled error.
    State {
        /// What was attempted.
        message: &'static str,
    },
    /// A schema or option set was invalid at construction time, for
    /// example a duplicate column name or an empty separator.
    Schema {
        /// What was rejected.
        message: String,
    },
}

/// Truncate raw record text for inclusion in an error message.
pub(crate) fn snippet(raw: &str) -> String {
    if raw.chars().count() <= SNIPPET_LEN {
        raw.to_string()
    } else {
        let mut s: String = raw.chars().take(SNIPPET_LEN).collect();
        s.push('…');
        s
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::new(ErrorKind::Io(err))
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match *self.0 {
            ErrorKind::Io(ref err) => Some(err),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self.0 {
            ErrorKind::Io(ref err) => write!(f, "I/O error: {}", err),
            ErrorKind::Syntax { record, ref message } => {
                write!(f, "syntax error in record {}: {}", record, message)
            }
            ErrorKind::ColumnConversion {
                record,
                ref column,
                ref raw,
                ref message,
            } => {
                write!(
                    f,
                    "cannot convert {:?} for column '{}' in record {}: {}",
                    raw, column, record, message
                )
            }
            ErrorKind::RecordShape {
                record,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "record {} has {} fields, but the schema requires {}",
                    record, actual, expected
                )
            }
            ErrorKind::SchemaSelection { record } => {
                write!(f, "no schema matched record {}", record)
            }
            ErrorKind::State { message } => {
                write!(f, "invalid operation: {}", message)
            }
            ErrorKind::Schema { ref message } => {
                write!(f, "invalid schema: {}", message)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snippet_truncates_long_text() {
        let long: String = "x".repeat(200);
        let s = snippet(&long);
        assert_eq!(s.chars().count(), SNIPPET_LEN + 1);
        assert!(s.ends_with('…'));
    }

    #[test]
    fn snippet_keeps_short_text() {
        assert_eq!(snippet("a,b,c"), "a,b,c");
    }

    #[test]
    fn display_includes_record_number() {
        let err = Error::new(ErrorKind::RecordShape {
            record: 7,
            expected: 3,
            actual: 2,
        });
        assert_eq!(
            err.to_string(),
            "record 7 has 2 fields, but the schema requires 3"
        );
    }

    #[test]
    fn io_errors_expose_a_source() {
        let err = Error::from(io::Error::new(io::ErrorKind::Other, "boom"));
        assert!(StdError::source(&err).is_some());
    }
}
