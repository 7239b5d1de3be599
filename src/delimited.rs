use crate::column::FormatDefaults;
use crate::error::{Error, ErrorKind, Result};
use crate::retry::RetryReader;
use crate::source::CharSource;
use crate::{QuoteBehavior, RecordSeparator};

/// Configuration for delimited records.
///
/// The builder methods mirror the option set:
///
/// ```
/// use flatfile::DelimitedOptions;
///
/// let mut opts = DelimitedOptions::default();
/// opts.separator("|").is_first_record_schema(true);
/// ```
#[derive(Debug, Clone)]
pub struct DelimitedOptions {
    pub(crate) separator: String,
    pub(crate) record_separator: RecordSeparator,
    pub(crate) quote: char,
    pub(crate) is_first_record_schema: bool,
    pub(crate) preserve_whitespace: bool,
    pub(crate) partitioned: bool,
    pub(crate) allow_embedded_line_endings: bool,
    pub(crate) quote_behavior: QuoteBehavior,
    pub(crate) format: FormatDefaults,
}

impl Default for DelimitedOptions {
    fn default() -> DelimitedOptions {
        DelimitedOptions {
            separator: ",".to_string(),
            record_separator: RecordSeparator::default(),
            quote: '"',
            is_first_record_schema: false,
            preserve_whitespace: false,
            partitioned: false,
            allow_embedded_line_endings: true,
            quote_behavior: QuoteBehavior::default(),
            format: FormatDefaults::default(),
        }
    }
}

impl DelimitedOptions {
    /// The field separator. May be longer than one character; matched by
    /// longest prefix against the record separator. The default is `,`.
    pub fn separator(&mut self, separator: &str) -> &mut DelimitedOptions {
        self.separator = separator.to_string();
        self
    }

    /// The record separator. The default recognizes `\r`, `\n` or `\r\n`
    /// on read and writes `\n`.
    pub fn record_separator(&mut self, separator: RecordSeparator) -> &mut DelimitedOptions {
        self.record_separator = separator;
        self
    }

    /// The quote character. The default is `"`.
    pub fn quote(&mut self, quote: char) -> &mut DelimitedOptions {
        self.quote = quote;
        self
    }

    /// Whether the first record names the columns. With no schema
    /// configured the reader builds one of untyped string columns from
    /// the first record; with a schema the first record is checked
    /// against the column names and discarded.
    pub fn is_first_record_schema(&mut self, yes: bool) -> &mut DelimitedOptions {
        self.is_first_record_schema = yes;
        self
    }

    /// Keep whitespace around unquoted values and quoted markers instead
    /// of stripping it while tokenizing.
    pub fn preserve_whitespace(&mut self, yes: bool) -> &mut DelimitedOptions {
        self.preserve_whitespace = yes;
        self
    }

    /// Treat quote characters as ordinary content: nothing is quoted on
    /// read or write.
    pub fn partitioned(&mut self, yes: bool) -> &mut DelimitedOptions {
        self.partitioned = yes;
        self
    }

    /// Whether quoted values may contain line endings. When disabled, a
    /// line ending inside quotes is a syntax error.
    pub fn allow_embedded_line_endings(&mut self, yes: bool) -> &mut DelimitedOptions {
        self.allow_embedded_line_endings = yes;
        self
    }

    /// The quoting policy used when writing. The default quotes only
    /// values that would otherwise not survive tokenization.
    pub fn quote_behavior(&mut self, behavior: QuoteBehavior) -> &mut DelimitedOptions {
        self.quote_behavior = behavior;
        self
    }

    /// Stream-wide fallback format strings for columns without a hint.
    pub fn format_defaults(&mut self, format: FormatDefaults) -> &mut DelimitedOptions {
        self.format = format;
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.separator.is_empty() {
            return Err(Error::new(ErrorKind::Schema {
                message: "the field separator must not be empty".to_string(),
            }));
        }
        if let RecordSeparator::Literal(sep) = &self.record_separator {
            if sep.is_empty() {
                return Err(Error::new(ErrorKind::Schema {
                    message: "the record separator must not be empty".to_string(),
                }));
            }
        }
        if self.separator.contains(self.quote) {
            return Err(Error::new(ErrorKind::Schema {
                message: "the field separator must not contain the quote character".to_string(),
            }));
        }
        Ok(())
    }
}

/// One raw record: its tokens and the exact unparsed span, without the
/// terminator.
#[derive(Debug, Clone)]
pub(crate) struct RawRecord {
    pub(crate) fields: Vec<String>,
    pub(crate) text: String,
}

/// Which boundary was consumed after a field.
enum Boundary {
    Field,
    Record,
}

/// Splits delimited records into raw fields.
#[derive(Debug)]
pub(crate) struct DelimitedTokenizer {
    separator: String,
    record_separator: RecordSeparator,
    quote: char,
    preserve_whitespace: bool,
    partitioned: bool,
    allow_embedded_line_endings: bool,
}

impl DelimitedTokenizer {
    pub(crate) fn new(options: &DelimitedOptions) -> Result<DelimitedTokenizer> {
        options.validate()?;
        Ok(DelimitedTokenizer {
            separator: options.separator.clone(),
            record_separator: options.record_separator.clone(),
            quote: options.quote,
            preserve_whitespace: options.preserve_whitespace,
            partitioned: options.partitioned,
            allow_embedded_line_endings: options.allow_embedded_line_endings,
        })
    }

    /// Tokenize the next record, or `None` at end of input. On a syntax
    /// error the remainder of the offending record is discarded so the
    /// stream can continue past a handled record error.
    pub(crate) fn tokenize<R: CharSource>(
        &self,
        rdr: &mut RetryReader<R>,
        record: u64,
    ) -> Result<Option<RawRecord>> {
        if rdr.at_eof()? {
            return Ok(None);
        }
        let mut fields = Vec::new();
        let mut text = String::new();
        loop {
            let field = match self.read_field(rdr, &mut text, record) {
                Ok(field) => field,
                Err(e) => return self.fail(rdr, e),
            };
            fields.push(field);
            match self.consume_boundary(rdr, &mut text)? {
                Some(Boundary::Field) => continue,
                Some(Boundary::Record) => break,
                None => {
                    if rdr.at_eof()? {
                        break;
                    }
                    let e = syntax(record, "expected a separator after a quoted value");
                    return self.fail(rdr, e);
                }
            }
        }
        Ok(Some(RawRecord { fields, text }))
    }

    /// Discard input through the next record boundary, then report.
    fn fail<R: CharSource, T>(&self, rdr: &mut RetryReader<R>, e: Error) -> Result<T> {
        if matches!(e.kind(), ErrorKind::Syntax { .. }) {
            loop {
                if self.consume_record_separator(rdr)? || rdr.next_char()?.is_none() {
                    break;
                }
            }
        }
        Err(e)
    }

    fn read_field<R: CharSource>(
        &self,
        rdr: &mut RetryReader<R>,
        text: &mut String,
        record: u64,
    ) -> Result<String> {
        if !self.preserve_whitespace {
            self.skip_whitespace(rdr, text)?;
        }
        if !self.partitioned && rdr.consume_char(self.quote)? {
            text.push(self.quote);
            self.read_quoted(rdr, text, record)
        } else {
            self.read_unquoted(rdr, text)
        }
    }

    fn read_unquoted<R: CharSource>(
        &self,
        rdr: &mut RetryReader<R>,
        text: &mut String,
    ) -> Result<String> {
        let mut value = String::new();
        loop {
            if self.at_boundary(rdr)? {
                break;
            }
            match rdr.next_char()? {
                Some(ch) => {
                    value.push(ch);
                    text.push(ch);
                }
                None => break,
            }
        }
        if !self.preserve_whitespace {
            value.truncate(value.trim_end().len());
        }
        Ok(value)
    }

    fn read_quoted<R: CharSource>(
        &self,
        rdr: &mut RetryReader<R>,
        text: &mut String,
        record: u64,
    ) -> Result<String> {
        let mut value = String::new();
        loop {
            match rdr.next_char()? {
                None => return Err(syntax(record, "a quoted value was never terminated")),
                Some(ch) if ch == self.quote => {
                    text.push(ch);
                    if rdr.consume_char(self.quote)? {
                        // A doubled quote is one literal quote.
                        value.push(self.quote);
                        text.push(self.quote);
                        continue;
                    }
                    if !self.preserve_whitespace {
                        self.skip_whitespace(rdr, text)?;
                    }
                    return Ok(value);
                }
                Some(ch) => {
                    if (ch == '\r' || ch == '\n') && !self.allow_embedded_line_endings {
                        return Err(syntax(record, "a line ending inside a quoted value"));
                    }
                    value.push(ch);
                    text.push(ch);
                }
            }
        }
    }

    /// Consume whitespace that does not begin a field or record boundary.
    fn skip_whitespace<R: CharSource>(
        &self,
        rdr: &mut RetryReader<R>,
        text: &mut String,
    ) -> Result<()> {
        loop {
            if self.at_boundary(rdr)? {
                return Ok(());
            }
            match rdr.peek_char()? {
                Some(ch) if ch.is_whitespace() => {
                    rdr.next_char()?;
                    text.push(ch);
                }
                _ => return Ok(()),
            }
        }
    }

    fn at_boundary<R: CharSource>(&self, rdr: &mut RetryReader<R>) -> Result<bool> {
        if rdr.matches(&self.separator)? {
            return Ok(true);
        }
        self.record_separator_matches(rdr)
    }

    fn record_separator_matches<R: CharSource>(&self, rdr: &mut RetryReader<R>) -> Result<bool> {
        match &self.record_separator {
            RecordSeparator::Auto => Ok(matches!(rdr.peek_char()?, Some('\r') | Some('\n'))),
            RecordSeparator::Literal(sep) => rdr.matches(sep),
        }
    }

    fn consume_record_separator<R: CharSource>(&self, rdr: &mut RetryReader<R>) -> Result<bool> {
        match &self.record_separator {
            RecordSeparator::Auto => {
                Ok(rdr.consume("\r\n")? || rdr.consume("\r")? || rdr.consume("\n")?)
            }
            RecordSeparator::Literal(sep) => rdr.consume(sep),
        }
    }

    /// Consume the longer of the two separators when both could start
    /// here.
    fn consume_boundary<R: CharSource>(
        &self,
        rdr: &mut RetryReader<R>,
        text: &mut String,
    ) -> Result<Option<Boundary>> {
        let field_len = self.separator.chars().count();
        let record_len = match &self.record_separator {
            RecordSeparator::Auto => 2,
            RecordSeparator::Literal(sep) => sep.chars().count(),
        };
        if field_len >= record_len {
            if rdr.consume(&self.separator)? {
                text.push_str(&self.separator);
                return Ok(Some(Boundary::Field));
            }
            if self.consume_record_separator(rdr)? {
                return Ok(Some(Boundary::Record));
            }
        } else {
            if self.consume_record_separator(rdr)? {
                return Ok(Some(Boundary::Record));
            }
            if rdr.consume(&self.separator)? {
                text.push_str(&self.separator);
                return Ok(Some(Boundary::Field));
            }
        }
        Ok(None)
    }
}

fn syntax(record: u64, message: &str) -> Error {
    Error::new(ErrorKind::Syntax {
        record,
        message: message.to_string(),
    })
}

/// Joins raw fields back into delimited record text.
#[derive(Debug)]
pub(crate) struct DelimitedEncoder {
    separator: String,
    terminator: String,
    quote: char,
    quote_behavior: QuoteBehavior,
    partitioned: bool,
}

impl DelimitedEncoder {
    pub(crate) fn new(options: &DelimitedOptions) -> Result<DelimitedEncoder> {
        options.validate()?;
        Ok(DelimitedEncoder {
            separator: options.separator.clone(),
            terminator: options.record_separator.write_text().to_string(),
            quote: options.quote,
            quote_behavior: options.quote_behavior,
            partitioned: options.partitioned,
        })
    }

    /// Join one record, without its terminator.
    pub(crate) fn encode_record(&self, fields: &[String]) -> String {
        let mut out = String::new();
        for (i, field) in fields.iter().enumerate() {
            if i > 0 {
                out.push_str(&self.separator);
            }
            self.encode_field(field, &mut out);
        }
        out
    }

    /// The text written between records.
    pub(crate) fn terminator(&self) -> &str {
        &self.terminator
    }

    fn encode_field(&self, value: &str, out: &mut String) {
        let quoting = !self.partitioned
            && match self.quote_behavior {
                QuoteBehavior::Always => true,
                QuoteBehavior::Never => false,
                QuoteBehavior::WhenNeeded => self.needs_quotes(value),
            };
        if !quoting {
            out.push_str(value);
            return;
        }
        out.push(self.quote);
        for ch in value.chars() {
            if ch == self.quote {
                out.push(self.quote);
            }
            out.push(ch);
        }
        out.push(self.quote);
    }

    /// A value needs quotes when tokenizing it back would not reproduce
    /// it: embedded separators, quotes, line endings, or surrounding
    /// whitespace.
    fn needs_quotes(&self, value: &str) -> bool {
        if value.is_empty() {
            return false;
        }
        value.contains(&self.separator)
            || value.contains(self.quote)
            || value.contains('\r')
            || value.contains('\n')
            || value.contains(&self.terminator)
            || value.starts_with(char::is_whitespace)
            || value.ends_with(char::is_whitespace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokenize_all(text: &str, options: &DelimitedOptions) -> Vec<Vec<String>> {
        let tokenizer = DelimitedTokenizer::new(options).unwrap();
        let mut rdr = RetryReader::new(text.chars());
        let mut records = Vec::new();
        while let Some(raw) = tokenizer.tokenize(&mut rdr, 1).unwrap() {
            records.push(raw.fields);
        }
        records
    }

    fn fields(text: &str) -> Vec<String> {
        let mut all = tokenize_all(text, &DelimitedOptions::default());
        assert_eq!(all.len(), 1, "expected one record in {:?}", text);
        all.pop().unwrap()
    }

    #[test]
    fn plain_fields() {
        assert_eq!(fields("a,b,c\n"), ["a", "b", "c"]);
        assert_eq!(fields("a,b,c"), ["a", "b", "c"]);
    }

    #[test]
    fn empty_fields_survive() {
        assert_eq!(fields("a,,c\n"), ["a", "", "c"]);
        assert_eq!(fields(",\n"), ["", ""]);
    }

    #[test]
    fn doubled_quote_is_one_quote() {
        assert_eq!(fields("\"a\"\"b\",c\n"), ["a\"b", "c"]);
    }

    #[test]
    fn quoted_values_may_hold_separators() {
        assert_eq!(fields("\"a,b\",c\n"), ["a,b", "c"]);
        assert_eq!(fields("\"line one\nline two\",x\n"), ["line one\nline two", "x"]);
    }

    #[test]
    fn embedded_line_endings_can_be_forbidden() {
        let mut opts = DelimitedOptions::default();
        opts.allow_embedded_line_endings(false);
        let tokenizer = DelimitedTokenizer::new(&opts).unwrap();
        let mut rdr = RetryReader::new("\"a\nb\",c\n".chars());
        let err = tokenizer.tokenize(&mut rdr, 1).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Syntax { .. }));
    }

    #[test]
    fn unterminated_quote_is_a_syntax_error() {
        let tokenizer = DelimitedTokenizer::new(&DelimitedOptions::default()).unwrap();
        let mut rdr = RetryReader::new("\"oops,b\n".chars());
        let err = tokenizer.tokenize(&mut rdr, 3).unwrap_err();
        match err.kind() {
            ErrorKind::Syntax { record, .. } => assert_eq!(*record, 3),
            other => panic!("unexpected kind {:?}", other),
        }
    }

    #[test]
    fn syntax_errors_resync_to_the_next_record() {
        let mut opts = DelimitedOptions::default();
        opts.allow_embedded_line_endings(false);
        let tokenizer = DelimitedTokenizer::new(&opts).unwrap();
        let mut rdr = RetryReader::new("\"a\nb\",c\nd,e\n".chars());
        assert!(tokenizer.tokenize(&mut rdr, 1).is_err());
        let next = tokenizer.tokenize(&mut rdr, 2).unwrap().unwrap();
        assert_eq!(next.fields, ["d", "e"]);
    }

    #[test]
    fn multi_character_separators() {
        let mut opts = DelimitedOptions::default();
        opts.separator("||");
        let tokenizer = DelimitedTokenizer::new(&opts).unwrap();
        let mut rdr = RetryReader::new("a||b|c||d\n".chars());
        let raw = tokenizer.tokenize(&mut rdr, 1).unwrap().unwrap();
        assert_eq!(raw.fields, ["a", "b|c", "d"]);
    }

    #[test]
    fn longest_boundary_wins() {
        let mut opts = DelimitedOptions::default();
        opts.separator("-")
            .record_separator(RecordSeparator::Literal("--".to_string()));
        let records = tokenize_all("a-b--c-d--", &opts);
        assert_eq!(records, vec![vec!["a", "b"], vec!["c", "d"]]);
    }

    #[test]
    fn whitespace_is_stripped_by_default() {
        assert_eq!(fields("  a , \"b\" ,c \n"), ["a", "b", "c"]);
    }

    #[test]
    fn preserved_whitespace_keeps_everything() {
        let mut opts = DelimitedOptions::default();
        opts.preserve_whitespace(true);
        let tokenizer = DelimitedTokenizer::new(&opts).unwrap();
        let mut rdr = RetryReader::new(" a ,b \n".chars());
        let raw = tokenizer.tokenize(&mut rdr, 1).unwrap().unwrap();
        assert_eq!(raw.fields, [" a ", "b "]);
    }

    #[test]
    fn a_quote_after_leading_whitespace_is_content_when_preserving() {
        let mut opts = DelimitedOptions::default();
        opts.preserve_whitespace(true);
        let tokenizer = DelimitedTokenizer::new(&opts).unwrap();
        let mut rdr = RetryReader::new(" \"a\",b\n".chars());
        let raw = tokenizer.tokenize(&mut rdr, 1).unwrap().unwrap();
        assert_eq!(raw.fields, [" \"a\"", "b"]);
    }

    #[test]
    fn partitioned_mode_never_interprets_quotes() {
        let mut opts = DelimitedOptions::default();
        opts.partitioned(true);
        let tokenizer = DelimitedTokenizer::new(&opts).unwrap();
        let mut rdr = RetryReader::new("\"a,b\",c\n".chars());
        let raw = tokenizer.tokenize(&mut rdr, 1).unwrap().unwrap();
        assert_eq!(raw.fields, ["\"a", "b\"", "c"]);
    }

    #[test]
    fn an_empty_line_is_one_empty_field() {
        let records = tokenize_all("a,b\n\nc,d\n", &DelimitedOptions::default());
        assert_eq!(
            records,
            vec![vec!["a", "b"], vec![""], vec!["c", "d"]]
        );
    }

    #[test]
    fn crlf_and_lf_both_terminate() {
        let records = tokenize_all("a,b\r\nc,d\ne,f\r", &DelimitedOptions::default());
        assert_eq!(records.len(), 3);
    }

    #[test]
    fn raw_span_excludes_the_terminator() {
        let tokenizer = DelimitedTokenizer::new(&DelimitedOptions::default()).unwrap();
        let mut rdr = RetryReader::new("a,\"b,c\"\r\nx\n".chars());
        let raw = tokenizer.tokenize(&mut rdr, 1).unwrap().unwrap();
        assert_eq!(raw.text, "a,\"b,c\"");
    }

    #[test]
    fn empty_separator_is_rejected() {
        let mut opts = DelimitedOptions::default();
        opts.separator("");
        assert!(DelimitedTokenizer::new(&opts).is_err());
    }

    #[test]
    fn encoder_quotes_only_when_needed() {
        let encoder = DelimitedEncoder::new(&DelimitedOptions::default()).unwrap();
        let record = encoder.encode_record(&[
            "plain".to_string(),
            "with,comma".to_string(),
            "with\"quote".to_string(),
            " padded ".to_string(),
        ]);
        assert_eq!(record, "plain,\"with,comma\",\"with\"\"quote\",\" padded \"");
    }

    #[test]
    fn encoder_round_trips_through_the_tokenizer() {
        let opts = DelimitedOptions::default();
        let encoder = DelimitedEncoder::new(&opts).unwrap();
        let original = vec!["a\"b".to_string(), "c,d\ne".to_string(), "".to_string()];
        let mut encoded = encoder.encode_record(&original);
        encoded.push_str(encoder.terminator());
        let tokenizer = DelimitedTokenizer::new(&opts).unwrap();
        let mut rdr = RetryReader::new(encoded.chars());
        let raw = tokenizer.tokenize(&mut rdr, 1).unwrap().unwrap();
        assert_eq!(raw.fields, original);
    }

    #[test]
    fn always_quote() {
        let mut opts = DelimitedOptions::default();
        opts.quote_behavior(QuoteBehavior::Always);
        let encoder = DelimitedEncoder::new(&opts).unwrap();
        assert_eq!(encoder.encode_record(&["a".to_string()]), "\"a\"");
    }
}
