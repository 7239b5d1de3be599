use std::sync::Arc;

use log::{debug, trace};

use crate::column::FormatDefaults;
use crate::context::RecordContext;
use crate::delimited::{DelimitedEncoder, DelimitedOptions};
use crate::error::{Error, ErrorKind, Result};
use crate::events::{
    ColumnErrorEvent, ColumnOutcome, ErrorDispatcher, RecordErrorEvent, RecordOutcome,
    RecordWriteEvent,
};
use crate::fixed::{pad_field, resolved_windows, FixedOptions, FixedWindowTokenizer, ResolvedWindow};
use crate::schema::Schema;
use crate::selector::SchemaInjector;
use crate::source::CharSink;
use crate::value::Value;

/// How formatted fields become record text.
#[derive(Debug)]
enum WriteFormat {
    Delimited(DelimitedEncoder),
    Fixed {
        tokenizer: FixedWindowTokenizer,
        terminator: Option<String>,
        /// Pre-resolved windows when a single schema fixes them up front.
        windows: Option<Vec<ResolvedWindow>>,
    },
}

#[derive(Debug)]
enum WriteSchemaSource {
    Single(Arc<Schema>),
    Injector(SchemaInjector),
}

/// A record writer over a character sink, the mirror of
/// [`Reader`](crate::Reader).
///
/// Each `write_record` call formats one value vector through the schema
/// and pushes the joined text, terminator included, into the sink:
///
/// ```
/// use flatfile::{Column, DelimitedOptions, Schema, Value, Writer};
///
/// let mut schema = Schema::new();
/// schema.add_column(Column::string("word"))?.add_column(Column::int32("n"))?;
/// let opts = DelimitedOptions::default();
/// let mut out = String::new();
/// let mut wtr = Writer::delimited(&mut out, schema, &opts)?;
/// wtr.write_record(&[Value::String("hi".into()), Value::Int32(1)])?;
/// wtr.write_record(&[Value::String("bye".into()), Value::Int32(2)])?;
/// drop(wtr);
/// assert_eq!(out, "hi,1\nbye,2\n");
/// # Ok::<(), flatfile::Error>(())
/// ```
///
/// Headers are never written implicitly; call [`Writer::write_header`].
/// Like the reader, an error nobody handles poisons the writer.
#[derive(Debug)]
pub struct Writer<W> {
    sink: W,
    format: WriteFormat,
    schema: WriteSchemaSource,
    defaults: FormatDefaults,
    dispatcher: ErrorDispatcher,
    errored: bool,
    ctx: RecordContext,
    physical: u64,
    logical: u64,
}

impl<W: CharSink> Writer<W> {
    /// A delimited writer formatting every record with `schema`.
    pub fn delimited(sink: W, schema: Schema, options: &DelimitedOptions) -> Result<Writer<W>> {
        Ok(Writer::with(
            sink,
            WriteFormat::Delimited(DelimitedEncoder::new(options)?),
            WriteSchemaSource::Single(Arc::new(schema)),
            options.format.clone(),
        ))
    }

    /// A delimited writer choosing a schema per record from its values.
    pub fn delimited_with_injector(
        sink: W,
        injector: SchemaInjector,
        options: &DelimitedOptions,
    ) -> Result<Writer<W>> {
        Ok(Writer::with(
            sink,
            WriteFormat::Delimited(DelimitedEncoder::new(options)?),
            WriteSchemaSource::Injector(injector),
            options.format.clone(),
        ))
    }

    /// A fixed-width writer padding every record into `schema`'s
    /// windows.
    pub fn fixed_width(sink: W, schema: Schema, options: &FixedOptions) -> Result<Writer<W>> {
        let tokenizer = FixedWindowTokenizer::new(options)?;
        let windows = resolved_windows(&tokenizer, &schema)?;
        Ok(Writer::with(
            sink,
            WriteFormat::Fixed {
                tokenizer,
                terminator: options
                    .has_record_separator
                    .then(|| options.record_separator.write_text().to_string()),
                windows: Some(windows),
            },
            WriteSchemaSource::Single(Arc::new(schema)),
            options.format.clone(),
        ))
    }

    /// A fixed-width writer choosing a schema per record from its
    /// values.
    pub fn fixed_width_with_injector(
        sink: W,
        injector: SchemaInjector,
        options: &FixedOptions,
    ) -> Result<Writer<W>> {
        let tokenizer = FixedWindowTokenizer::new(options)?;
        for schema in injector.schemas() {
            resolved_windows(&tokenizer, schema)?;
        }
        Ok(Writer::with(
            sink,
            WriteFormat::Fixed {
                tokenizer,
                terminator: options
                    .has_record_separator
                    .then(|| options.record_separator.write_text().to_string()),
                windows: None,
            },
            WriteSchemaSource::Injector(injector),
            options.format.clone(),
        ))
    }

    fn with(
        sink: W,
        format: WriteFormat,
        schema: WriteSchemaSource,
        defaults: FormatDefaults,
    ) -> Writer<W> {
        Writer {
            sink,
            format,
            schema,
            defaults,
            dispatcher: ErrorDispatcher::default(),
            errored: false,
            ctx: RecordContext::default(),
            physical: 0,
            logical: 0,
        }
    }

    /// Observe each record before it is formatted.
    pub fn on_record_writing(&mut self, handler: impl FnMut(&RecordWriteEvent<'_>) + 'static) {
        self.dispatcher.on_record_writing(handler);
    }

    /// Observe each record after its text hit the sink.
    pub fn on_record_written(&mut self, handler: impl FnMut(&RecordWriteEvent<'_>) + 'static) {
        self.dispatcher.on_record_written(handler);
    }

    /// Intercept column formatting failures; a substituted value is
    /// formatted in place of the one that failed.
    pub fn on_column_error(
        &mut self,
        handler: impl FnMut(&ColumnErrorEvent<'_>) -> ColumnOutcome + 'static,
    ) {
        self.dispatcher.on_column_error(handler);
    }

    /// Intercept record-level failures; a handled record is dropped and
    /// the writer keeps going.
    pub fn on_record_error(
        &mut self,
        handler: impl FnMut(&RecordErrorEvent<'_>) -> RecordOutcome + 'static,
    ) {
        self.dispatcher.on_record_error(handler);
    }

    /// Write a record naming the columns. Requires a single schema;
    /// per-record injection has no one set of names to write.
    pub fn write_header(&mut self) -> Result<()> {
        if self.errored {
            return Err(Error::state("writing to a stream with errors"));
        }
        let schema = match &self.schema {
            WriteSchemaSource::Single(schema) => schema.clone(),
            WriteSchemaSource::Injector(_) => {
                return Err(Error::state(
                    "writing a header needs a single schema, not an injector",
                ))
            }
        };
        let names: Vec<String> = schema
            .columns()
            .iter()
            .filter(|c| !c.is_metadata())
            .map(|c| c.name().to_string())
            .collect();
        let text = self.join_record(&names, &schema)?;
        if let Err(e) = self.sink.write(&text) {
            self.errored = true;
            return Err(e);
        }
        self.physical += 1;
        trace!("wrote a header of {} columns", names.len());
        Ok(())
    }

    /// Format one value vector through the schema and write it. A record
    /// suppressed by an error handler is dropped without output.
    pub fn write_record(&mut self, values: &[Value]) -> Result<()> {
        if self.errored {
            return Err(Error::state("writing to a stream with errors"));
        }
        let schema = match &self.schema {
            WriteSchemaSource::Single(schema) => schema.clone(),
            WriteSchemaSource::Injector(injector) => match injector.select(values) {
                Some(schema) => schema.clone(),
                None => {
                    let e = Error::new(ErrorKind::SchemaSelection {
                        record: self.physical + 1,
                    });
                    self.ctx = RecordContext {
                        physical: self.physical + 1,
                        logical: self.logical,
                        values: values.to_vec(),
                        ..RecordContext::default()
                    };
                    return self.absorb_record_error(e);
                }
            },
        };
        self.ctx = RecordContext {
            physical: self.physical + 1,
            logical: self.logical + 1,
            raw_text: String::new(),
            raw_fields: Vec::new(),
            values: values.to_vec(),
        };
        {
            let event = RecordWriteEvent { context: &self.ctx };
            self.dispatcher.dispatch_record_writing(&event);
        }
        let fields = match schema.format_record(&self.ctx, values, &mut self.dispatcher, &self.defaults)
        {
            Ok(fields) => fields,
            Err(e) => return self.absorb_record_error(e),
        };
        self.ctx.raw_fields = fields;
        let text = match self.join_record(&self.ctx.raw_fields, &schema) {
            Ok(text) => text,
            Err(e) => return self.absorb_record_error(e),
        };
        if let Err(e) = self.sink.write(&text) {
            debug!("sink failure, stream is now errored");
            self.errored = true;
            return Err(e);
        }
        self.physical += 1;
        self.logical += 1;
        let terminator_len = text.len() - self.trimmed_len(&text);
        self.ctx.raw_text = text[..text.len() - terminator_len].to_string();
        let event = RecordWriteEvent { context: &self.ctx };
        self.dispatcher.dispatch_record_written(&event);
        Ok(())
    }

    /// Records written so far, headers included.
    pub fn physical_record_number(&self) -> u64 {
        self.physical
    }

    /// Records written so far, headers excluded.
    pub fn logical_record_number(&self) -> u64 {
        self.logical
    }

    /// Unwrap the sink.
    pub fn into_inner(self) -> W {
        self.sink
    }

    /// Join formatted fields into record text, terminator included.
    fn join_record(&self, fields: &[String], schema: &Schema) -> Result<String> {
        match &self.format {
            WriteFormat::Delimited(encoder) => {
                let mut text = encoder.encode_record(fields);
                text.push_str(encoder.terminator());
                Ok(text)
            }
            WriteFormat::Fixed {
                tokenizer,
                terminator,
                windows,
            } => {
                let resolved;
                let windows = match windows {
                    Some(windows) => windows,
                    None => {
                        resolved = resolved_windows(tokenizer, schema)?;
                        &resolved
                    }
                };
                let mut text = String::new();
                for (field, window) in fields.iter().zip(windows) {
                    text.push_str(&pad_field(field, window));
                }
                if let Some(terminator) = terminator {
                    text.push_str(terminator);
                }
                Ok(text)
            }
        }
    }

    /// How long the record text is without its terminator.
    fn trimmed_len(&self, text: &str) -> usize {
        let terminator = match &self.format {
            WriteFormat::Delimited(encoder) => encoder.terminator(),
            WriteFormat::Fixed { terminator, .. } => terminator.as_deref().unwrap_or(""),
        };
        text.strip_suffix(terminator).unwrap_or(text).len()
    }

    /// Offer a record-level error to the handlers; an unhandled one
    /// poisons the stream.
    fn absorb_record_error(&mut self, error: Error) -> Result<()> {
        if error.is_fatal() {
            self.errored = true;
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
                self.errored = true;
                Err(error)
            }
        }
    }
}
