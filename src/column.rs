use std::error::Error as StdError;
use std::fmt;
use std::fmt::Write as _;
use std::result;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::context::RecordContext;
use crate::value::Value;

/// Outcome of a single codec conversion; the schema layer wraps it into a
/// full column-conversion error with record and column coordinates.
pub(crate) type Convert<T> = result::Result<T, String>;

/// A user-supplied text-to-value conversion for custom columns.
pub type CustomParseFn =
    dyn Fn(&str, &RecordContext) -> result::Result<Value, Box<dyn StdError + Send + Sync>>
        + Send
        + Sync;

/// A user-supplied value-to-text conversion for custom columns.
pub type CustomFormatFn =
    dyn Fn(&Value, &RecordContext) -> result::Result<String, Box<dyn StdError + Send + Sync>>
        + Send
        + Sync;

/// How a metadata column derives its value from the record context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MetadataKind {
    PhysicalRecordNumber,
    LogicalRecordNumber,
}

/// The closed set of logical column kinds.
pub(crate) enum ColumnKind {
    Bool,
    Byte,
    Short,
    Int32,
    Int64,
    Single,
    Double,
    Decimal,
    Char,
    String,
    Guid,
    DateTime,
    DateTimeOffset,
    TimeSpan,
    Enum(Vec<String>),
    ByteArray,
    CharArray,
    Ignored,
    Metadata(MetadataKind),
    Custom {
        parse: Box<CustomParseFn>,
        format: Box<CustomFormatFn>,
    },
}

impl ColumnKind {
    fn name(&self) -> &'static str {
        match self {
            ColumnKind::Bool => "bool",
            ColumnKind::Byte => "byte",
            ColumnKind::Short => "short",
            ColumnKind::Int32 => "int32",
            ColumnKind::Int64 => "int64",
            ColumnKind::Single => "single",
            ColumnKind::Double => "double",
            ColumnKind::Decimal => "decimal",
            ColumnKind::Char => "char",
            ColumnKind::String => "string",
            ColumnKind::Guid => "guid",
            ColumnKind::DateTime => "date-time",
            ColumnKind::DateTimeOffset => "date-time-offset",
            ColumnKind::TimeSpan => "time-span",
            ColumnKind::Enum(_) => "enum",
            ColumnKind::ByteArray => "byte-array",
            ColumnKind::CharArray => "char-array",
            ColumnKind::Ignored => "ignored",
            ColumnKind::Metadata(_) => "metadata",
            ColumnKind::Custom { .. } => "custom",
        }
    }
}

/// How an absent value is spelled on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum NullHandling {
    /// The empty string reads and writes as null.
    Empty,
    /// A literal sentinel reads and writes as null; the empty string is
    /// ordinary codec input.
    Sentinel(String),
}

/// Stream-wide fallback format strings, applied when a column carries no
/// format hint of its own.
#[derive(Debug, Clone, Default)]
pub struct FormatDefaults {
    pub(crate) date_time: Option<String>,
    pub(crate) date_time_offset: Option<String>,
}

impl FormatDefaults {
    /// Default strftime pattern for date-time columns.
    pub fn date_time(mut self, pattern: &str) -> FormatDefaults {
        self.date_time = Some(pattern.to_string());
        self
    }

    /// Default strftime pattern for date-time-offset columns.
    pub fn date_time_offset(mut self, pattern: &str) -> FormatDefaults {
        self.date_time_offset = Some(pattern.to_string());
        self
    }
}

/// One column of a schema: a unique name, a logical kind, and the
/// policies the codec applies around conversion.
///
/// Constructors exist per kind and the policy methods chain:
///
/// ```
/// use flatfile::Column;
///
/// let col = Column::decimal("price").null_sentinel("n/a");
/// assert_eq!(col.name(), "price");
/// ```
pub struct Column {
    name: String,
    kind: ColumnKind,
    null: NullHandling,
    preserve_whitespace: bool,
    format: Option<String>,
}

impl fmt::Debug for Column {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Column")
            .field("name", &self.name)
            .field("kind", &self.kind.name())
            .finish()
    }
}

impl Column {
    fn with_kind(name: &str, kind: ColumnKind) -> Column {
        Column {
            name: name.to_string(),
            kind,
            null: NullHandling::Empty,
            preserve_whitespace: false,
            format: None,
        }
    }

    /// A boolean column accepting `true`/`false` case-insensitively.
    pub fn boolean(name: &str) -> Column {
        Column::with_kind(name, ColumnKind::Bool)
    }

    /// An unsigned 8-bit integer column.
    pub fn byte(name: &str) -> Column {
        Column::with_kind(name, ColumnKind::Byte)
    }

    /// A signed 16-bit integer column.
    pub fn short(name: &str) -> Column {
        Column::with_kind(name, ColumnKind::Short)
    }

    /// A signed 32-bit integer column.
    pub fn int32(name: &str) -> Column {
        Column::with_kind(name, ColumnKind::Int32)
    }

    /// A signed 64-bit integer column.
    pub fn int64(name: &str) -> Column {
        Column::with_kind(name, ColumnKind::Int64)
    }

    /// A 32-bit float column.
    pub fn single(name: &str) -> Column {
        Column::with_kind(name, ColumnKind::Single)
    }

    /// A 64-bit float column.
    pub fn double(name: &str) -> Column {
        Column::with_kind(name, ColumnKind::Double)
    }

    /// An exact decimal column.
    pub fn decimal(name: &str) -> Column {
        Column::with_kind(name, ColumnKind::Decimal)
    }

    /// A single-character column.
    pub fn character(name: &str) -> Column {
        Column::with_kind(name, ColumnKind::Char)
    }

    /// An untyped string column.
    pub fn string(name: &str) -> Column {
        Column::with_kind(name, ColumnKind::String)
    }

    /// A GUID column. The format hint selects the written form:
    /// `hyphenated` (default), `simple`, `braced` or `urn`.
    pub fn guid(name: &str) -> Column {
        Column::with_kind(name, ColumnKind::Guid)
    }

    /// A date-time column without offset. The format hint is a strftime
    /// pattern; a date-only pattern reads as midnight.
    pub fn date_time(name: &str) -> Column {
        Column::with_kind(name, ColumnKind::DateTime)
    }

    /// A date-time column with a fixed offset from UTC. Defaults to
    /// RFC 3339 when no format hint is given.
    pub fn date_time_offset(name: &str) -> Column {
        Column::with_kind(name, ColumnKind::DateTimeOffset)
    }

    /// A time-span column using the `[-][d.]hh:mm:ss[.frac]` form.
    pub fn time_span(name: &str) -> Column {
        Column::with_kind(name, ColumnKind::TimeSpan)
    }

    /// An enumeration column matching one of `variants`
    /// case-insensitively and surfacing the canonical spelling.
    pub fn enumeration(name: &str, variants: &[&str]) -> Column {
        let variants = variants.iter().map(|v| v.to_string()).collect();
        Column::with_kind(name, ColumnKind::Enum(variants))
    }

    /// A column holding the raw field's UTF-8 bytes.
    pub fn byte_array(name: &str) -> Column {
        Column::with_kind(name, ColumnKind::ByteArray)
    }

    /// A column holding the raw field's characters.
    pub fn char_array(name: &str) -> Column {
        Column::with_kind(name, ColumnKind::CharArray)
    }

    /// A column that consumes a token on read without surfacing a value,
    /// and writes an empty token.
    pub fn ignored(name: &str) -> Column {
        Column::with_kind(name, ColumnKind::Ignored)
    }

    /// A metadata column surfacing the physical record number. It is
    /// backed by no token: nothing is consumed on read and nothing is
    /// written.
    pub fn physical_record_number(name: &str) -> Column {
        Column::with_kind(name, ColumnKind::Metadata(MetadataKind::PhysicalRecordNumber))
    }

    /// A metadata column surfacing the logical record number.
    pub fn logical_record_number(name: &str) -> Column {
        Column::with_kind(name, ColumnKind::Metadata(MetadataKind::LogicalRecordNumber))
    }

    /// A column converting through a pair of user-supplied functions.
    pub fn custom<P, F>(name: &str, parse: P, format: F) -> Column
    where
        P: Fn(&str, &RecordContext) -> result::Result<Value, Box<dyn StdError + Send + Sync>>
            + Send
            + Sync
            + 'static,
        F: Fn(&Value, &RecordContext) -> result::Result<String, Box<dyn StdError + Send + Sync>>
            + Send
            + Sync
            + 'static,
    {
        Column::with_kind(
            name,
            ColumnKind::Custom {
                parse: Box::new(parse),
                format: Box::new(format),
            },
        )
    }

    /// Treat the given literal, rather than the empty string, as null.
    pub fn null_sentinel(mut self, sentinel: &str) -> Column {
        self.null = NullHandling::Sentinel(sentinel.to_string());
        self
    }

    /// Keep surrounding whitespace instead of stripping it before
    /// conversion.
    pub fn preserve_whitespace(mut self, yes: bool) -> Column {
        self.preserve_whitespace = yes;
        self
    }

    /// A format hint for the codec, e.g. a strftime pattern for the
    /// temporal kinds.
    pub fn with_format(mut self, format: &str) -> Column {
        self.format = Some(format.to_string());
        self
    }

    /// The column's name. Names compare case-insensitively within a
    /// schema.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The name of the column's logical kind.
    pub fn kind_name(&self) -> &'static str {
        self.kind.name()
    }

    pub(crate) fn is_ignored(&self) -> bool {
        matches!(self.kind, ColumnKind::Ignored)
    }

    pub(crate) fn is_metadata(&self) -> bool {
        matches!(self.kind, ColumnKind::Metadata(_))
    }

    pub(crate) fn metadata_value(&self, ctx: &RecordContext) -> Value {
        match self.kind {
            ColumnKind::Metadata(MetadataKind::PhysicalRecordNumber) => {
                Value::Int64(ctx.physical as i64)
            }
            ColumnKind::Metadata(MetadataKind::LogicalRecordNumber) => {
                Value::Int64(ctx.logical as i64)
            }
            _ => Value::Null,
        }
    }

    /// Convert one raw token into a typed value.
    pub(crate) fn parse(
        &self,
        raw: &str,
        ctx: &RecordContext,
        defaults: &FormatDefaults,
    ) -> Convert<Value> {
        let text = if self.preserve_whitespace {
            raw
        } else {
            raw.trim()
        };
        match &self.null {
            NullHandling::Empty if text.is_empty() => return Ok(Value::Null),
            NullHandling::Sentinel(s) if text == s => return Ok(Value::Null),
            _ => {}
        }
        let hint = self.format.as_deref();
        match &self.kind {
            ColumnKind::Bool => {
                if text.eq_ignore_ascii_case("true") {
                    Ok(Value::Bool(true))
                } else if text.eq_ignore_ascii_case("false") {
                    Ok(Value::Bool(false))
                } else {
                    Err("expected 'true' or 'false'".to_string())
                }
            }
            ColumnKind::Byte => text
                .parse::<u8>()
                .map(Value::Byte)
                .map_err(|e| e.to_string()),
            ColumnKind::Short => text
                .parse::<i16>()
                .map(Value::Short)
                .map_err(|e| e.to_string()),
            ColumnKind::Int32 => text
                .parse::<i32>()
                .map(Value::Int32)
                .map_err(|e| e.to_string()),
            ColumnKind::Int64 => text
                .parse::<i64>()
                .map(Value::Int64)
                .map_err(|e| e.to_string()),
            ColumnKind::Single => text
                .parse::<f32>()
                .map(Value::Single)
                .map_err(|e| e.to_string()),
            ColumnKind::Double => text
                .parse::<f64>()
                .map(Value::Double)
                .map_err(|e| e.to_string()),
            ColumnKind::Decimal => text
                .parse::<Decimal>()
                .map(Value::Decimal)
                .map_err(|e| e.to_string()),
            ColumnKind::Char => {
                let mut chars = text.chars();
                match (chars.next(), chars.next()) {
                    (Some(ch), None) => Ok(Value::Char(ch)),
                    _ => Err("expected exactly one character".to_string()),
                }
            }
            ColumnKind::String => Ok(Value::String(text.to_string())),
            ColumnKind::Guid => Uuid::parse_str(text)
                .map(Value::Guid)
                .map_err(|e| e.to_string()),
            ColumnKind::DateTime => {
                parse_date_time(text, hint.or(defaults.date_time.as_deref())).map(Value::DateTime)
            }
            ColumnKind::DateTimeOffset => {
                let hint = hint.or(defaults.date_time_offset.as_deref());
                match hint {
                    Some(f) => DateTime::parse_from_str(text, f)
                        .map(Value::DateTimeOffset)
                        .map_err(|e| e.to_string()),
                    None => DateTime::parse_from_rfc3339(text)
                        .map(Value::DateTimeOffset)
                        .map_err(|e| e.to_string()),
                }
            }
            ColumnKind::TimeSpan => parse_time_span(text).map(Value::TimeSpan),
            ColumnKind::Enum(variants) => variants
                .iter()
                .find(|v| v.eq_ignore_ascii_case(text))
                .map(|v| Value::String(v.clone()))
                .ok_or_else(|| format!("'{}' is not a known variant", text)),
            ColumnKind::ByteArray => Ok(Value::ByteArray(text.as_bytes().to_vec())),
            ColumnKind::CharArray => Ok(Value::CharArray(text.chars().collect())),
            ColumnKind::Ignored => Ok(Value::Null),
            ColumnKind::Metadata(_) => Ok(self.metadata_value(ctx)),
            ColumnKind::Custom { parse, .. } => parse(text, ctx).map_err(|e| e.to_string()),
        }
    }

    /// Convert one typed value into its raw token, unpadded.
    pub(crate) fn format(
        &self,
        value: &Value,
        ctx: &RecordContext,
        defaults: &FormatDefaults,
    ) -> Convert<String> {
        if value.is_null() {
            return Ok(match &self.null {
                NullHandling::Empty => String::new(),
                NullHandling::Sentinel(s) => s.clone(),
            });
        }
        let hint = self.format.as_deref();
        match (&self.kind, value) {
            (ColumnKind::Bool, Value::Bool(v)) => {
                Ok(if *v { "true" } else { "false" }.to_string())
            }
            (ColumnKind::Byte, Value::Byte(v)) => Ok(itoa::Buffer::new().format(*v).to_string()),
            (ColumnKind::Short, Value::Short(v)) => Ok(itoa::Buffer::new().format(*v).to_string()),
            (ColumnKind::Int32, Value::Int32(v)) => Ok(itoa::Buffer::new().format(*v).to_string()),
            (ColumnKind::Int64, Value::Int64(v)) => Ok(itoa::Buffer::new().format(*v).to_string()),
            (ColumnKind::Single, Value::Single(v)) => Ok(ryu::Buffer::new().format(*v).to_string()),
            (ColumnKind::Double, Value::Double(v)) => Ok(ryu::Buffer::new().format(*v).to_string()),
            (ColumnKind::Decimal, Value::Decimal(v)) => Ok(v.to_string()),
            (ColumnKind::Char, Value::Char(v)) => Ok(v.to_string()),
            (ColumnKind::String, Value::String(v)) => Ok(v.clone()),
            (ColumnKind::Guid, Value::Guid(v)) => Ok(match hint {
                Some("simple") => v.simple().to_string(),
                Some("braced") => v.braced().to_string(),
                Some("urn") => v.urn().to_string(),
                _ => v.hyphenated().to_string(),
            }),
            (ColumnKind::DateTime, Value::DateTime(v)) => {
                let pattern = hint
                    .or(defaults.date_time.as_deref())
                    .unwrap_or("%Y-%m-%dT%H:%M:%S");
                let mut out = String::new();
                write!(out, "{}", v.format(pattern)).map_err(|_| bad_pattern(pattern))?;
                Ok(out)
            }
            (ColumnKind::DateTimeOffset, Value::DateTimeOffset(v)) => {
                match hint.or(defaults.date_time_offset.as_deref()) {
                    Some(pattern) => {
                        let mut out = String::new();
                        write!(out, "{}", v.format(pattern)).map_err(|_| bad_pattern(pattern))?;
                        Ok(out)
                    }
                    None => Ok(v.to_rfc3339()),
                }
            }
            (ColumnKind::TimeSpan, Value::TimeSpan(v)) => Ok(format_time_span(*v)),
            (ColumnKind::Enum(variants), Value::String(v)) => variants
                .iter()
                .find(|c| c.eq_ignore_ascii_case(v))
                .cloned()
                .ok_or_else(|| format!("'{}' is not a known variant", v)),
            (ColumnKind::ByteArray, Value::ByteArray(v)) => String::from_utf8(v.clone())
                .map_err(|_| "byte buffer is not valid UTF-8".to_string()),
            (ColumnKind::CharArray, Value::CharArray(v)) => Ok(v.iter().collect()),
            (ColumnKind::Ignored, _) => Ok(String::new()),
            (ColumnKind::Custom { format, .. }, v) => format(v, ctx).map_err(|e| e.to_string()),
            (kind, value) => Err(format!(
                "expected a {} value, got {}",
                kind.name(),
                value.type_name()
            )),
        }
    }
}

fn bad_pattern(pattern: &str) -> String {
    format!("invalid format pattern '{}'", pattern)
}

fn parse_date_time(text: &str, hint: Option<&str>) -> Convert<NaiveDateTime> {
    let from_pattern = |pattern: &str| {
        NaiveDateTime::parse_from_str(text, pattern).or_else(|e| {
            NaiveDate::parse_from_str(text, pattern)
                .map(|d| d.and_time(NaiveTime::MIN))
                .map_err(|_| e.to_string())
        })
    };
    match hint {
        Some(pattern) => from_pattern(pattern),
        None => ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d"]
            .into_iter()
            .find_map(|p| from_pattern(p).ok())
            .ok_or_else(|| "unrecognized date-time".to_string()),
    }
}

/// Parse the `[-][d.]hh:mm:ss[.frac]` time-span form.
fn parse_time_span(text: &str) -> Convert<Duration> {
    let err = || "expected a time span like '1.02:30:00' or '-00:05:00'".to_string();
    let (negative, rest) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let (rest, frac_nanos) = match rest.rsplit_once('.') {
        // A '.' can also separate days from hours, so only treat the
        // suffix as fractional when it follows the seconds part.
        Some((head, frac)) if head.contains(':') => {
            if frac.is_empty() || frac.len() > 9 || !frac.bytes().all(|b| b.is_ascii_digit()) {
                return Err(err());
            }
            let scale = 10u64.pow(9 - frac.len() as u32);
            let nanos = frac.parse::<u64>().map_err(|_| err())? * scale;
            (head, nanos as i64)
        }
        _ => (rest, 0),
    };
    let (days, clock) = match rest.split_once('.') {
        Some((d, clock)) => (d.parse::<i64>().map_err(|_| err())?, clock),
        None => (0, rest),
    };
    let mut parts = clock.split(':');
    let (h, m, s) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(h), Some(m), Some(s), None) => (h, m, s),
        _ => return Err(err()),
    };
    let hours = h.parse::<i64>().map_err(|_| err())?;
    let minutes = m.parse::<i64>().map_err(|_| err())?;
    let seconds = s.parse::<i64>().map_err(|_| err())?;
    if !(0..60).contains(&minutes) || !(0..60).contains(&seconds) || hours < 0 || days < 0 {
        return Err(err());
    }
    let total = days
        .checked_mul(24)
        .and_then(|v| v.checked_add(hours))
        .and_then(|v| v.checked_mul(60))
        .and_then(|v| v.checked_add(minutes))
        .and_then(|v| v.checked_mul(60))
        .and_then(|v| v.checked_add(seconds))
        .ok_or_else(err)?;
    let span = Duration::try_seconds(total)
        .and_then(|s| s.checked_add(&Duration::nanoseconds(frac_nanos)))
        .ok_or_else(err)?;
    Ok(if negative { -span } else { span })
}

fn format_time_span(span: Duration) -> String {
    let negative = span < Duration::zero();
    let span = if negative { -span } else { span };
    let total = span.num_seconds();
    let (days, rem) = (total / 86_400, total % 86_400);
    let (hours, minutes, seconds) = (rem / 3600, rem % 3600 / 60, rem % 60);
    let mut out = String::new();
    if negative {
        out.push('-');
    }
    if days > 0 {
        let _ = write!(out, "{}.", days);
    }
    let _ = write!(out, "{:02}:{:02}:{:02}", hours, minutes, seconds);
    let nanos = span.subsec_nanos();
    if nanos > 0 {
        let frac = format!("{:09}", nanos);
        let _ = write!(out, ".{}", frac.trim_end_matches('0'));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ctx() -> RecordContext {
        RecordContext::default()
    }

    fn defaults() -> FormatDefaults {
        FormatDefaults::default()
    }

    fn parse(col: &Column, raw: &str) -> Convert<Value> {
        col.parse(raw, &ctx(), &defaults())
    }

    fn format(col: &Column, value: &Value) -> Convert<String> {
        col.format(value, &ctx(), &defaults())
    }

    #[test]
    fn empty_is_null_by_default() {
        let col = Column::int32("n");
        assert_eq!(parse(&col, "").unwrap(), Value::Null);
        assert_eq!(parse(&col, "   ").unwrap(), Value::Null);
        assert_eq!(format(&col, &Value::Null).unwrap(), "");
    }

    #[test]
    fn sentinel_replaces_empty_null() {
        let col = Column::double("n").null_sentinel("----");
        assert_eq!(parse(&col, "----").unwrap(), Value::Null);
        assert_eq!(format(&col, &Value::Null).unwrap(), "----");
        // With a sentinel configured the empty string is codec input.
        assert!(parse(&col, "").is_err());
    }

    #[test]
    fn trim_is_the_default() {
        let col = Column::int32("n");
        assert_eq!(parse(&col, "  185").unwrap(), Value::Int32(185));
        let keep = Column::string("s").preserve_whitespace(true);
        assert_eq!(parse(&keep, " x ").unwrap(), Value::String(" x ".into()));
    }

    #[test]
    fn numeric_round_trips() {
        let col = Column::double("d");
        assert_eq!(parse(&col, "5.12").unwrap(), Value::Double(5.12));
        assert_eq!(format(&col, &Value::Double(5.12)).unwrap(), "5.12");

        let col = Column::int64("i");
        assert_eq!(
            format(&col, &Value::Int64(-1234567890123)).unwrap(),
            "-1234567890123"
        );
    }

    #[test]
    fn decimal_is_exact() {
        let col = Column::decimal("d");
        let v = parse(&col, "0.300").unwrap();
        assert_eq!(format(&col, &v).unwrap(), "0.300");
    }

    #[test]
    fn boolean_is_case_insensitive() {
        let col = Column::boolean("b");
        assert_eq!(parse(&col, "TRUE").unwrap(), Value::Bool(true));
        assert_eq!(parse(&col, "False").unwrap(), Value::Bool(false));
        assert!(parse(&col, "yes").is_err());
    }

    #[test]
    fn char_requires_exactly_one() {
        let col = Column::character("c");
        assert_eq!(parse(&col, "x").unwrap(), Value::Char('x'));
        assert!(parse(&col, "xy").is_err());
    }

    #[test]
    fn date_only_pattern_reads_as_midnight() {
        let col = Column::date_time("birth").with_format("%Y%m%d");
        let expected = NaiveDate::from_ymd_opt(2012, 1, 23)
            .unwrap()
            .and_time(NaiveTime::MIN);
        assert_eq!(parse(&col, "20120123").unwrap(), Value::DateTime(expected));
    }

    #[test]
    fn date_time_without_hint_accepts_common_forms() {
        let col = Column::date_time("ts");
        assert!(parse(&col, "2023-07-01T10:30:00").is_ok());
        assert!(parse(&col, "2023-07-01 10:30:00").is_ok());
        assert!(parse(&col, "2023-07-01").is_ok());
        assert!(parse(&col, "not a date").is_err());
    }

    #[test]
    fn date_time_offset_defaults_to_rfc3339() {
        let col = Column::date_time_offset("ts");
        let v = parse(&col, "2023-07-01T10:30:00+02:00").unwrap();
        assert_eq!(format(&col, &v).unwrap(), "2023-07-01T10:30:00+02:00");
    }

    #[test]
    fn guid_formats() {
        let col = Column::guid("id");
        let raw = "67e55044-10b1-426f-9247-bb680e5fe0c8";
        let v = parse(&col, raw).unwrap();
        assert_eq!(format(&col, &v).unwrap(), raw);
        let simple = Column::guid("id").with_format("simple");
        assert_eq!(
            format(&simple, &v).unwrap(),
            "67e5504410b1426f9247bb680e5fe0c8"
        );
    }

    #[test]
    fn time_span_round_trips() {
        let col = Column::time_span("t");
        for raw in ["02:30:00", "1.02:30:00", "-00:05:00", "00:00:01.5"] {
            let v = parse(&col, raw).unwrap();
            assert_eq!(format(&col, &v).unwrap(), raw, "for {}", raw);
        }
        assert!(parse(&col, "02:61:00").is_err());
        assert!(parse(&col, "oops").is_err());
    }

    #[test]
    fn enumeration_surfaces_canonical_spelling() {
        let col = Column::enumeration("color", &["Red", "Green"]);
        assert_eq!(parse(&col, "red").unwrap(), Value::String("Red".into()));
        assert!(parse(&col, "blue").is_err());
    }

    #[test]
    fn custom_codec_delegates() {
        let col = Column::custom(
            "celsius",
            |raw, _| {
                let f: f64 = raw.parse()?;
                Ok(Value::Double((f - 32.0) / 1.8))
            },
            |v, _| match v {
                Value::Double(c) => Ok(format!("{:.0}", c * 1.8 + 32.0)),
                _ => Err("expected a double".into()),
            },
        );
        assert_eq!(parse(&col, "212").unwrap(), Value::Double(100.0));
        assert_eq!(format(&col, &Value::Double(100.0)).unwrap(), "212");
    }

    #[test]
    fn kind_mismatch_on_format_is_an_error() {
        let col = Column::int32("n");
        assert!(format(&col, &Value::String("5".into())).is_err());
    }
}
