use crate::column::FormatDefaults;
use crate::error::{Error, ErrorKind, Result};
use crate::retry::RetryReader;
use crate::source::CharSource;
use crate::{Alignment, RecordSeparator, Truncation};

/// A fixed-width column descriptor: how many characters the column spans
/// and how its content sits inside them.
///
/// Alignment, fill and truncation fall back to the stream options when
/// not set on the window:
///
/// ```
/// use flatfile::{Alignment, Window};
///
/// let window = Window::new(8).alignment(Alignment::RightAligned).fill('0');
/// assert_eq!(window.width(), 8);
/// ```
#[derive(Debug, Clone)]
pub struct Window {
    width: usize,
    alignment: Option<Alignment>,
    fill: Option<char>,
    truncation: Option<Truncation>,
}

impl Window {
    /// A window spanning `width` characters.
    pub fn new(width: usize) -> Window {
        Window {
            width,
            alignment: None,
            fill: None,
            truncation: None,
        }
    }

    /// Where the content sits inside the window.
    pub fn alignment(mut self, alignment: Alignment) -> Window {
        self.alignment = Some(alignment);
        self
    }

    /// The character padding the window out.
    pub fn fill(mut self, fill: char) -> Window {
        self.fill = Some(fill);
        self
    }

    /// Which side is dropped when formatted content overflows the window.
    pub fn truncation(mut self, truncation: Truncation) -> Window {
        self.truncation = Some(truncation);
        self
    }

    /// The number of characters the window spans.
    pub fn width(&self) -> usize {
        self.width
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.width == 0 {
            return Err(Error::new(ErrorKind::Schema {
                message: "a window must span at least one character".to_string(),
            }));
        }
        Ok(())
    }
}

/// Configuration for fixed-width records.
#[derive(Debug, Clone)]
pub struct FixedOptions {
    pub(crate) alignment: Alignment,
    pub(crate) fill_character: char,
    pub(crate) truncation: Truncation,
    pub(crate) has_record_separator: bool,
    pub(crate) record_separator: RecordSeparator,
    pub(crate) is_first_record_header: bool,
    pub(crate) error_on_short_record: bool,
    pub(crate) format: FormatDefaults,
}

impl Default for FixedOptions {
    fn default() -> FixedOptions {
        FixedOptions {
            alignment: Alignment::default(),
            fill_character: ' ',
            truncation: Truncation::default(),
            has_record_separator: true,
            record_separator: RecordSeparator::default(),
            is_first_record_header: false,
            error_on_short_record: false,
            format: FormatDefaults::default(),
        }
    }
}

impl FixedOptions {
    /// Default alignment for windows that set none. The default is
    /// left-aligned.
    pub fn alignment(&mut self, alignment: Alignment) -> &mut FixedOptions {
        self.alignment = alignment;
        self
    }

    /// Default fill character for windows that set none. The default is
    /// a space.
    pub fn fill_character(&mut self, fill: char) -> &mut FixedOptions {
        self.fill_character = fill;
        self
    }

    /// Default truncation policy for windows that set none. The default
    /// drops trailing characters.
    pub fn truncation(&mut self, truncation: Truncation) -> &mut FixedOptions {
        self.truncation = truncation;
        self
    }

    /// Whether records end with a separator. When disabled, records are
    /// partitioned purely by the sum of window widths.
    pub fn has_record_separator(&mut self, yes: bool) -> &mut FixedOptions {
        self.has_record_separator = yes;
        self
    }

    /// The record separator. The default recognizes `\r`, `\n` or `\r\n`
    /// on read and writes `\n`.
    pub fn record_separator(&mut self, separator: RecordSeparator) -> &mut FixedOptions {
        self.record_separator = separator;
        self
    }

    /// Whether the first record is a header to discard. Fixed-width
    /// schemas cannot be inferred, so the header is never used to build
    /// one.
    pub fn is_first_record_header(&mut self, yes: bool) -> &mut FixedOptions {
        self.is_first_record_header = yes;
        self
    }

    /// Raise a syntax error for records shorter than the window sum
    /// instead of reading the missing windows as empty fields.
    pub fn error_on_short_record(&mut self, yes: bool) -> &mut FixedOptions {
        self.error_on_short_record = yes;
        self
    }

    /// Stream-wide fallback format strings for columns without a hint.
    pub fn format_defaults(&mut self, format: FormatDefaults) -> &mut FixedOptions {
        self.format = format;
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if let RecordSeparator::Literal(sep) = &self.record_separator {
            if sep.is_empty() {
                return Err(Error::new(ErrorKind::Schema {
                    message: "the record separator must not be empty".to_string(),
                }));
            }
        }
        Ok(())
    }
}

/// A window with every policy resolved against the stream options.
#[derive(Debug, Clone)]
pub(crate) struct ResolvedWindow {
    pub(crate) width: usize,
    pub(crate) alignment: Alignment,
    pub(crate) fill: char,
    pub(crate) truncation: Truncation,
}

/// Partitions fixed-width records into raw fields by column windows.
#[derive(Debug)]
pub(crate) struct FixedWindowTokenizer {
    alignment: Alignment,
    fill_character: char,
    truncation: Truncation,
    has_record_separator: bool,
    record_separator: RecordSeparator,
    error_on_short_record: bool,
}

impl FixedWindowTokenizer {
    pub(crate) fn new(options: &FixedOptions) -> Result<FixedWindowTokenizer> {
        options.validate()?;
        Ok(FixedWindowTokenizer {
            alignment: options.alignment,
            fill_character: options.fill_character,
            truncation: options.truncation,
            has_record_separator: options.has_record_separator,
            record_separator: options.record_separator.clone(),
            error_on_short_record: options.error_on_short_record,
        })
    }

    pub(crate) fn resolve(&self, window: &Window) -> ResolvedWindow {
        ResolvedWindow {
            width: window.width,
            alignment: window.alignment.unwrap_or(self.alignment),
            fill: window.fill.unwrap_or(self.fill_character),
            truncation: window.truncation.unwrap_or(self.truncation),
        }
    }

    /// Pull the raw text of the next record, or `None` at end of input.
    /// `total` is the window sum when a single schema fixes it up front.
    pub(crate) fn read_record<R: CharSource>(
        &self,
        rdr: &mut RetryReader<R>,
        total: Option<usize>,
        record: u64,
    ) -> Result<Option<String>> {
        if rdr.at_eof()? {
            return Ok(None);
        }
        let mut line = String::new();
        if self.has_record_separator {
            loop {
                if self.consume_record_separator(rdr)? {
                    break;
                }
                match rdr.next_char()? {
                    Some(ch) => line.push(ch),
                    None => break,
                }
            }
        } else {
            let total = total.ok_or_else(|| {
                Error::state("fixed-width records without a separator need a single schema")
            })?;
            for _ in 0..total {
                match rdr.next_char()? {
                    Some(ch) => line.push(ch),
                    None => break,
                }
            }
        }
        if let Some(total) = total {
            self.check_length(&line, total, record)?;
        }
        Ok(Some(line))
    }

    /// Enforce the short-record policy once the schema is known. Content
    /// past the window sum is ignored by the slicing, so long records
    /// pass untouched.
    pub(crate) fn check_length(&self, line: &str, total: usize, record: u64) -> Result<()> {
        let len = line.chars().count();
        if len < total && self.error_on_short_record {
            return Err(Error::new(ErrorKind::Syntax {
                record,
                message: format!("record spans {} characters, the windows need {}", len, total),
            }));
        }
        Ok(())
    }

    /// Slice a record into raw fields and strip each window's fill.
    pub(crate) fn partition(&self, line: &str, windows: &[ResolvedWindow]) -> Vec<String> {
        let chars: Vec<char> = line.chars().collect();
        let mut fields = Vec::with_capacity(windows.len());
        let mut start = 0;
        for window in windows {
            let end = (start + window.width).min(chars.len());
            let slice: String = chars[start.min(chars.len())..end].iter().collect();
            fields.push(strip_fill(&slice, window));
            start += window.width;
        }
        fields
    }

    fn consume_record_separator<R: CharSource>(&self, rdr: &mut RetryReader<R>) -> Result<bool> {
        match &self.record_separator {
            RecordSeparator::Auto => {
                Ok(rdr.consume("\r\n")? || rdr.consume("\r")? || rdr.consume("\n")?)
            }
            RecordSeparator::Literal(sep) => rdr.consume(sep),
        }
    }
}

/// Left-aligned content is padded on the right, so trailing fill goes;
/// right-aligned content is padded on the left, so leading fill goes.
fn strip_fill(slice: &str, window: &ResolvedWindow) -> String {
    match window.alignment {
        Alignment::LeftAligned => slice.trim_end_matches(window.fill).to_string(),
        Alignment::RightAligned => slice.trim_start_matches(window.fill).to_string(),
    }
}

/// Resolve the windows of every token-backed column in a schema, in
/// order. Fails when a column that needs a window has none.
pub(crate) fn resolved_windows(
    tokenizer: &FixedWindowTokenizer,
    schema: &crate::schema::Schema,
) -> Result<Vec<ResolvedWindow>> {
    let mut windows = Vec::new();
    for (index, column) in schema.columns().iter().enumerate() {
        if column.is_metadata() {
            continue;
        }
        match schema.window(index) {
            Some(window) => windows.push(tokenizer.resolve(window)),
            None => {
                return Err(Error::new(ErrorKind::Schema {
                    message: format!(
                        "column '{}' needs a window to join a fixed-width schema",
                        column.name()
                    ),
                }))
            }
        }
    }
    Ok(windows)
}

/// Fit formatted content into its window: pad per alignment, or drop the
/// overflow per the truncation policy.
pub(crate) fn pad_field(value: &str, window: &ResolvedWindow) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() > window.width {
        return match window.truncation {
            Truncation::TruncateTrailing => chars[..window.width].iter().collect(),
            Truncation::TruncateLeading => chars[chars.len() - window.width..].iter().collect(),
        };
    }
    let fill: String = std::iter::repeat(window.fill)
        .take(window.width - chars.len())
        .collect();
    match window.alignment {
        Alignment::LeftAligned => format!("{}{}", value, fill),
        Alignment::RightAligned => format!("{}{}", fill, value),
    }
}
