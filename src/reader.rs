use std::sync::Arc;

use log::{debug, trace};

use crate::column::FormatDefaults;
use crate::context::RecordContext;
use crate::delimited::{DelimitedOptions, DelimitedTokenizer, RawRecord};
use crate::error::{Error, ErrorKind, Result};
use crate::events::{
    ColumnErrorEvent, ColumnOutcome, ErrorDispatcher, ReadAction, RecordErrorEvent, RecordOutcome,
    RecordParsedEvent, RecordReadEvent,
};
use crate::fixed::{resolved_windows, FixedOptions, FixedWindowTokenizer, ResolvedWindow};
use crate::retry::RetryReader;
use crate::schema::Schema;
use crate::selector::{FixedSchemaSelector, SchemaSelector};
use crate::source::CharSource;
use crate::value::Value;

/// Which tokenizer drives the stream.
#[derive(Debug)]
enum Format {
    Delimited {
        tokenizer: DelimitedTokenizer,
        is_first_record_schema: bool,
    },
    Fixed {
        tokenizer: FixedWindowTokenizer,
        is_first_record_header: bool,
        /// Pre-resolved windows when a single schema fixes them up front.
        windows: Option<Vec<ResolvedWindow>>,
        total: Option<usize>,
    },
}

/// Where each record's schema comes from.
#[derive(Debug)]
enum SchemaSource {
    /// No schema: raw fields surface as untyped strings.
    None,
    Single(Arc<Schema>),
    Selector(SchemaSelector),
    FixedSelector(FixedSchemaSelector),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadState {
    /// No input consumed yet; the next operation handles the header.
    Fresh,
    Streaming,
    Drained,
    Errored,
}

/// A record reader over a character source.
///
/// Reading is a loop of `read` calls, each of which makes one record's
/// values available through `get_values`:
///
/// ```
/// use flatfile::{Column, DelimitedOptions, Reader, Schema, Value};
///
/// let mut schema = Schema::new();
/// schema.add_column(Column::string("word"))?.add_column(Column::int32("n"))?;
/// let opts = DelimitedOptions::default();
/// let mut rdr = Reader::delimited_with_schema("hi,1\nbye,2\n".chars(), schema, &opts)?;
///
/// assert!(rdr.read()?);
/// assert_eq!(rdr.get_values()?, vec![Value::String("hi".into()), Value::Int32(1)]);
/// assert!(rdr.read()?);
/// assert!(!rdr.read()?);
/// # Ok::<(), flatfile::Error>(())
/// ```
///
/// Records are delivered strictly in input order, and all events for one
/// record fire before the next record is tokenized. An error nobody
/// handles poisons the reader: every later call fails with a state error.
#[derive(Debug)]
pub struct Reader<R> {
    source: RetryReader<R>,
    format: Format,
    schema: SchemaSource,
    defaults: FormatDefaults,
    dispatcher: ErrorDispatcher,
    state: ReadState,
    ctx: RecordContext,
    has_record: bool,
    physical: u64,
    logical: u64,
}

impl<R: CharSource> Reader<R> {
    /// A delimited reader with no schema: every record surfaces its raw
    /// fields as untyped strings, and with
    /// [`DelimitedOptions::is_first_record_schema`] the first record
    /// names a schema of string columns instead.
    pub fn delimited(source: R, options: &DelimitedOptions) -> Result<Reader<R>> {
        Ok(Reader::with(
            source,
            Format::Delimited {
                tokenizer: DelimitedTokenizer::new(options)?,
                is_first_record_schema: options.is_first_record_schema,
            },
            SchemaSource::None,
            options.format.clone(),
        ))
    }

    /// A delimited reader parsing every record with `schema`.
    pub fn delimited_with_schema(
        source: R,
        schema: Schema,
        options: &DelimitedOptions,
    ) -> Result<Reader<R>> {
        Ok(Reader::with(
            source,
            Format::Delimited {
                tokenizer: DelimitedTokenizer::new(options)?,
                is_first_record_schema: options.is_first_record_schema,
            },
            SchemaSource::Single(Arc::new(schema)),
            options.format.clone(),
        ))
    }

    /// A delimited reader choosing a schema per record.
    pub fn delimited_with_selector(
        source: R,
        selector: SchemaSelector,
        options: &DelimitedOptions,
    ) -> Result<Reader<R>> {
        Ok(Reader::with(
            source,
            Format::Delimited {
                tokenizer: DelimitedTokenizer::new(options)?,
                is_first_record_schema: options.is_first_record_schema,
            },
            SchemaSource::Selector(selector),
            options.format.clone(),
        ))
    }

    /// A fixed-width reader partitioning every record by `schema`'s
    /// windows.
    pub fn fixed_width(source: R, schema: Schema, options: &FixedOptions) -> Result<Reader<R>> {
        let tokenizer = FixedWindowTokenizer::new(options)?;
        let windows = resolved_windows(&tokenizer, &schema)?;
        let total = windows.iter().map(|w| w.width).sum();
        Ok(Reader::with(
            source,
            Format::Fixed {
                tokenizer,
                is_first_record_header: options.is_first_record_header,
                windows: Some(windows),
                total: Some(total),
            },
            SchemaSource::Single(Arc::new(schema)),
            options.format.clone(),
        ))
    }

    /// A fixed-width reader choosing a schema per record by its raw
    /// text. Requires a record separator, since the record length is
    /// unknowable before a schema is chosen.
    pub fn fixed_width_with_selector(
        source: R,
        selector: FixedSchemaSelector,
        options: &FixedOptions,
    ) -> Result<Reader<R>> {
        if !options.has_record_separator {
            return Err(Error::new(ErrorKind::Schema {
                message: "schema selection over fixed-width records needs a record separator"
                    .to_string(),
            }));
        }
        let tokenizer = FixedWindowTokenizer::new(options)?;
        for schema in selector.schemas() {
            resolved_windows(&tokenizer, schema)?;
        }
        Ok(Reader::with(
            source,
            Format::Fixed {
                tokenizer,
                is_first_record_header: options.is_first_record_header,
                windows: None,
                total: None,
            },
            SchemaSource::FixedSelector(selector),
            options.format.clone(),
        ))
    }

    fn with(source: R, format: Format, schema: SchemaSource, defaults: FormatDefaults) -> Reader<R> {
        Reader {
            source: RetryReader::new(source),
            format,
            schema,
            defaults,
            dispatcher: ErrorDispatcher::default(),
            state: ReadState::Fresh,
            ctx: RecordContext::default(),
            has_record: false,
            physical: 0,
            logical: 0,
        }
    }

    /// Observe each raw record after tokenizing; returning
    /// [`ReadAction::Skip`] drops it without parsing or counting it
    /// logically.
    pub fn on_record_read(&mut self, handler: impl FnMut(&RecordReadEvent<'_>) -> ReadAction + 'static) {
        self.dispatcher.on_record_read(handler);
    }

    /// Observe each record after parsing succeeded.
    pub fn on_record_parsed(&mut self, handler: impl FnMut(&RecordParsedEvent<'_>) + 'static) {
        self.dispatcher.on_record_parsed(handler);
    }

    /// Intercept column conversion failures; returning
    /// [`ColumnOutcome::Substitute`] replaces the failed value and lets
    /// the record continue.
    pub fn on_column_error(
        &mut self,
        handler: impl FnMut(&ColumnErrorEvent<'_>) -> ColumnOutcome + 'static,
    ) {
        self.dispatcher.on_column_error(handler);
    }

    /// Intercept record-level failures; returning
    /// [`RecordOutcome::Handled`] suppresses the record and keeps the
    /// stream alive.
    pub fn on_record_error(
        &mut self,
        handler: impl FnMut(&RecordErrorEvent<'_>) -> RecordOutcome + 'static,
    ) {
        self.dispatcher.on_record_error(handler);
    }

    /// Advance to the next record. Returns false once the input is
    /// drained.
    pub fn read(&mut self) -> Result<bool> {
        self.start()?;
        match self.state {
            ReadState::Errored => return Err(Error::state("reading from a stream with errors")),
            ReadState::Drained => return Ok(false),
            _ => {}
        }
        loop {
            let raw = match self.next_raw() {
                Ok(Some(raw)) => raw,
                Ok(None) => {
                    trace!("input drained after {} records", self.physical);
                    self.state = ReadState::Drained;
                    self.has_record = false;
                    return Ok(false);
                }
                Err(e) => {
                    self.reset_context();
                    self.absorb_record_error(e)?;
                    continue;
                }
            };
            self.ctx = RecordContext {
                physical: self.physical,
                logical: self.logical,
                raw_text: raw.text,
                raw_fields: raw.fields,
                values: Vec::new(),
            };

            let schema = match &self.schema {
                SchemaSource::None => None,
                SchemaSource::Single(schema) => Some(schema.clone()),
                SchemaSource::Selector(selector) => selector.select(&self.ctx.raw_fields).cloned(),
                SchemaSource::FixedSelector(selector) => {
                    selector.select(&self.ctx.raw_text).cloned()
                }
            };
            let schema = match schema {
                Some(schema) => Some(schema),
                None if matches!(self.schema, SchemaSource::None) => None,
                None => {
                    let e = Error::new(ErrorKind::SchemaSelection {
                        record: self.physical,
                    });
                    self.absorb_record_error(e)?;
                    continue;
                }
            };

            // With a per-record schema the windows only now exist, so
            // fixed-width records are partitioned here.
            if matches!(self.schema, SchemaSource::FixedSelector(_)) {
                if let (Some(schema), Format::Fixed { tokenizer, .. }) =
                    (schema.as_ref(), &self.format)
                {
                    let windows = resolved_windows(tokenizer, schema)?;
                    let total = windows.iter().map(|w| w.width).sum();
                    if let Err(e) = tokenizer.check_length(&self.ctx.raw_text, total, self.physical)
                    {
                        self.absorb_record_error(e)?;
                        continue;
                    }
                    self.ctx.raw_fields = tokenizer.partition(&self.ctx.raw_text, &windows);
                }
            }

            let action = {
                let event = RecordReadEvent { context: &self.ctx };
                self.dispatcher.dispatch_record_read(&event)
            };
            if action == ReadAction::Skip {
                trace!("record {} skipped by a read handler", self.physical);
                continue;
            }

            let values = match &schema {
                None => self
                    .ctx
                    .raw_fields
                    .iter()
                    .map(|f| Value::String(f.clone()))
                    .collect(),
                Some(schema) => {
                    match schema.parse_record(
                        &self.ctx,
                        &self.ctx.raw_fields,
                        &mut self.dispatcher,
                        &self.defaults,
                    ) {
                        Ok(values) => values,
                        Err(e) => {
                            self.absorb_record_error(e)?;
                            continue;
                        }
                    }
                }
            };

            self.logical += 1;
            self.ctx.logical = self.logical;
            self.ctx.values = values;
            self.has_record = true;
            let event = RecordParsedEvent { context: &self.ctx };
            self.dispatcher.dispatch_record_parsed(&event);
            return Ok(true);
        }
    }

    /// Consume one raw record without parsing it. Returns false once the
    /// input is drained.
    pub fn skip(&mut self) -> Result<bool> {
        self.start()?;
        match self.state {
            ReadState::Errored => return Err(Error::state("reading from a stream with errors")),
            ReadState::Drained => return Ok(false),
            _ => {}
        }
        match self.next_raw() {
            Ok(Some(_)) => {
                trace!("record {} skipped", self.physical);
                Ok(true)
            }
            Ok(None) => {
                self.state = ReadState::Drained;
                self.has_record = false;
                Ok(false)
            }
            Err(e) => {
                self.reset_context();
                self.absorb_record_error(e)?;
                Ok(true)
            }
        }
    }

    /// A defensive copy of the current record's values. Fails before the
    /// first successful read, after the input drains, and on an errored
    /// stream.
    pub fn get_values(&self) -> Result<Vec<Value>> {
        if self.state == ReadState::Errored {
            return Err(Error::state("reading from a stream with errors"));
        }
        if !self.has_record {
            return Err(Error::state("no record is available; call read first"));
        }
        Ok(self.ctx.values.clone())
    }

    /// The current record's context.
    pub fn context(&self) -> &RecordContext {
        &self.ctx
    }

    /// The schema records are parsed with, when a single one exists.
    /// With `is_first_record_schema` this is the inferred schema once the
    /// header has been read.
    pub fn schema(&self) -> Option<&Schema> {
        match &self.schema {
            SchemaSource::Single(schema) => Some(schema),
            _ => None,
        }
    }

    /// Raw records consumed so far, headers and skipped records
    /// included.
    pub fn physical_record_number(&self) -> u64 {
        self.physical
    }

    /// Records parsed successfully so far, headers and skipped records
    /// excluded.
    pub fn logical_record_number(&self) -> u64 {
        self.logical
    }

    /// Iterate the remaining records' value vectors.
    pub fn records(&mut self) -> Records<'_, R> {
        Records {
            reader: self,
            done: false,
        }
    }

    /// Run header handling exactly once, before the first record.
    fn start(&mut self) -> Result<()> {
        if self.state != ReadState::Fresh {
            return Ok(());
        }
        self.state = ReadState::Streaming;
        let header_expected = match &self.format {
            Format::Delimited {
                is_first_record_schema,
                ..
            } => *is_first_record_schema,
            Format::Fixed {
                is_first_record_header,
                ..
            } => *is_first_record_header,
        };
        if !header_expected {
            return Ok(());
        }
        let raw = match self.next_raw() {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                self.state = ReadState::Drained;
                return Ok(());
            }
            Err(e) => {
                self.reset_context();
                return self.absorb_record_error(e);
            }
        };
        let delimited = matches!(self.format, Format::Delimited { .. });
        if delimited && matches!(self.schema, SchemaSource::None) {
            match Schema::infer_from_header(&raw.fields) {
                Ok(schema) => {
                    debug!(
                        "inferred a schema of {} string columns from the header",
                        schema.physical_count()
                    );
                    self.schema = SchemaSource::Single(Arc::new(schema));
                }
                Err(e) => {
                    self.reset_context();
                    return self.absorb_record_error(e);
                }
            }
        } else if delimited {
            if let SchemaSource::Single(schema) = &self.schema {
                let schema = schema.clone();
                if let Err(e) = schema.verify_header(&raw.fields, self.physical) {
                    self.ctx = RecordContext {
                        physical: self.physical,
                        logical: self.logical,
                        raw_text: raw.text,
                        raw_fields: raw.fields,
                        values: Vec::new(),
                    };
                    return self.absorb_record_error(e);
                }
            }
        } else {
            trace!("discarded the fixed-width header record");
        }
        Ok(())
    }

    /// Tokenize the next raw record, advancing the physical count for
    /// every record consumed, syntax casualties included.
    fn next_raw(&mut self) -> Result<Option<RawRecord>> {
        let record = self.physical + 1;
        let result = match &self.format {
            Format::Delimited { tokenizer, .. } => tokenizer.tokenize(&mut self.source, record),
            Format::Fixed {
                tokenizer,
                windows,
                total,
                ..
            } => match tokenizer.read_record(&mut self.source, *total, record) {
                Ok(Some(line)) => {
                    let fields = match windows {
                        Some(windows) => tokenizer.partition(&line, windows),
                        None => Vec::new(),
                    };
                    Ok(Some(RawRecord {
                        fields,
                        text: line,
                    }))
                }
                Ok(None) => Ok(None),
                Err(e) => Err(e),
            },
        };
        match result {
            Ok(Some(raw)) => {
                self.physical += 1;
                trace!(
                    "record {} tokenized into {} fields",
                    self.physical,
                    raw.fields.len()
                );
                Ok(Some(raw))
            }
            Ok(None) => Ok(None),
            Err(e) => {
                if matches!(e.kind(), ErrorKind::Syntax { .. }) {
                    // The tokenizer discarded the offending record.
                    self.physical += 1;
                }
                Err(e)
            }
        }
    }

    /// Offer a record-level error to the handlers; an unhandled one
    /// poisons the stream.
    fn absorb_record_error(&mut self, error: Error) -> Result<()> {
        if error.is_fatal() {
            self.state = ReadState::Errored;
            return Err(error);
        }
        let outcome = {
            let event = RecordErrorEvent {
                context: &self.ctx,
                error: &error,
            };
            self.dispatcher.dispatch_record_error(&event)
        };
        match outcome {
            RecordOutcome::Handled => {
                trace!("record error suppressed by a handler: {}", error);
                Ok(())
            }
            RecordOutcome::Unhandled => {
                debug!("record error left unhandled, stream is now errored: {}", error);
                self.state = ReadState::Errored;
                Err(error)
            }
        }
    }

    fn reset_context(&mut self) {
        self.ctx = RecordContext {
            physical: self.physical,
            logical: self.logical,
            ..RecordContext::default()
        };
    }
}

/// An iterator over a reader's remaining records.
///
/// ```
/// use flatfile::{DelimitedOptions, Reader};
///
/// let opts = DelimitedOptions::default();
/// let mut rdr = Reader::delimited("a,b\nc,d\n".chars(), &opts)?;
/// let records: Result<Vec<_>, _> = rdr.records().collect();
/// assert_eq!(records?.len(), 2);
/// # Ok::<(), flatfile::Error>(())
/// ```
pub struct Records<'r, R> {
    reader: &'r mut Reader<R>,
    done: bool,
}

impl<R: CharSource> Iterator for Records<'_, R> {
    type Item = crate::error::Result<Vec<Value>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.reader.read() {
            Ok(true) => Some(self.reader.get_values()),
            Ok(false) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
