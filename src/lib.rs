/*!
Schema-driven reading and writing of flat files.

Records live in one of two textual layouts: delimited, where a separator
string splits the fields, and fixed-width, where each column owns a window
of character positions. A [`Schema`] names, orders and types the columns;
a [`Reader`] drives a tokenizer and the schema's codecs to turn raw text
into [`Value`]s, and a [`Writer`] mirrors the trip back.

# Example

```
use flatfile::{Column, DelimitedOptions, Reader, Schema, Value};

fn example() -> Result<(), flatfile::Error> {
    let mut schema = Schema::new();
    schema
        .add_column(Column::string("name"))?
        .add_column(Column::int32("age"))?;

    let mut opts = DelimitedOptions::default();
    opts.is_first_record_schema(true);

    let data = "name,age\nada,36\ngrace,45\n";
    let mut reader = Reader::delimited_with_schema(data.chars(), schema, &opts)?;

    let mut names = Vec::new();
    while reader.read()? {
        let values = reader.get_values()?;
        if let Some(Value::String(name)) = values.first() {
            names.push(name.clone());
        }
    }
    assert_eq!(names, ["ada", "grace"]);
    Ok(())
}
# fn main() { example().unwrap(); }
```

Parse failures surface as events before they condemn a record, so a
stream with a few bad rows can keep going: register handlers with
[`Reader::on_column_error`] and [`Reader::on_record_error`].
*/

mod column;
mod context;
mod delimited;
mod error;
mod events;
mod fixed;
mod reader;
mod retry;
mod schema;
mod selector;
mod source;
mod value;
mod writer;

pub use column::{Column, CustomFormatFn, CustomParseFn, FormatDefaults};
pub use context::RecordContext;
pub use delimited::DelimitedOptions;
pub use error::{Error, ErrorKind, Result};
pub use events::{
    ColumnErrorEvent, ColumnOutcome, ReadAction, RecordErrorEvent, RecordOutcome,
    RecordParsedEvent, RecordReadEvent, RecordWriteEvent,
};
pub use fixed::{FixedOptions, Window};
pub use reader::{Reader, Records};
pub use retry::RetryReader;
pub use schema::Schema;
pub use selector::{FixedSchemaSelector, SchemaInjector, SchemaSelector};
pub use source::{CharSink, CharSource, IoSink, IoSource};
pub use value::Value;
pub use writer::Writer;

/// Where content sits inside a fixed-width window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Alignment {
    /// Content starts at the left edge; fill pads the right. This is the
    /// default.
    LeftAligned,
    /// Content ends at the right edge; fill pads the left.
    RightAligned,
}

impl Default for Alignment {
    fn default() -> Alignment {
        Alignment::LeftAligned
    }
}

/// Which side of overlong content is dropped to fit its window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Truncation {
    /// Drop leading characters, keeping the tail.
    TruncateLeading,
    /// Drop trailing characters, keeping the head. This is the default.
    TruncateTrailing,
}

impl Default for Truncation {
    fn default() -> Truncation {
        Truncation::TruncateTrailing
    }
}

/// A record separator.
///
/// The default recognizes `\r`, `\n` or `\r\n` as a single record
/// separator on read, and writes `\n`.
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum RecordSeparator {
    /// Recognizes `\r`, `\n` or `\r\n` on read; writes `\n`.
    Auto,
    /// An explicit separator string, possibly longer than one character.
    Literal(String),
}

impl RecordSeparator {
    /// The text written between records.
    pub(crate) fn write_text(&self) -> &str {
        match self {
            RecordSeparator::Auto => "\n",
            RecordSeparator::Literal(sep) => sep,
        }
    }
}

impl Default for RecordSeparator {
    fn default() -> RecordSeparator {
        RecordSeparator::Auto
    }
}

/// The quoting policy used when writing delimited values.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuoteBehavior {
    /// Quote only values that would otherwise not survive tokenization:
    /// embedded separators, quotes, line endings, or surrounding
    /// whitespace. This is the default.
    WhenNeeded,
    /// Quote every value.
    Always,
    /// Never quote, even if it sacrifices the integrity of the data.
    Never,
}

impl Default for QuoteBehavior {
    fn default() -> QuoteBehavior {
        QuoteBehavior::WhenNeeded
    }
}
