use crate::context::RecordContext;
use crate::error::Error;
use crate::value::Value;

/// A column codec failure, offered to handlers before it condemns the
/// record.
#[derive(Debug)]
pub struct ColumnErrorEvent<'a> {
    /// The record being processed.
    pub context: &'a RecordContext,
    /// Name of the offending column.
    pub column: &'a str,
    /// The raw text that failed to convert.
    pub raw: &'a str,
    /// The error that will be raised if no handler substitutes.
    pub error: &'a Error,
}

/// What a column-error handler decided.
#[derive(Debug)]
pub enum ColumnOutcome {
    /// Let the error stand.
    Unhandled,
    /// Use this value in place of the failed conversion.
    Substitute(Value),
}

/// A record-level failure, offered to handlers before it aborts the
/// stream.
#[derive(Debug)]
pub struct RecordErrorEvent<'a> {
    /// The record being processed.
    pub context: &'a RecordContext,
    /// The error that will abort the stream if no handler suppresses it.
    pub error: &'a Error,
}

/// What a record-error handler decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// Let the error abort the stream.
    Unhandled,
    /// Suppress the record and keep streaming.
    Handled,
}

/// A raw record, observed after tokenizing and before parsing.
#[derive(Debug)]
pub struct RecordReadEvent<'a> {
    /// The record just tokenized; its raw fields are populated, its
    /// values are not yet.
    pub context: &'a RecordContext,
}

/// What a record-read handler decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadAction {
    /// Parse the record.
    Accept,
    /// Drop the record without parsing it or counting it logically.
    Skip,
}

/// A record observed after parsing succeeded.
#[derive(Debug)]
pub struct RecordParsedEvent<'a> {
    /// The record just parsed; raw fields and values are populated.
    pub context: &'a RecordContext,
}

/// A record observed on the write side, before formatting
/// (`record_writing`) or after its text hit the sink (`record_written`).
#[derive(Debug)]
pub struct RecordWriteEvent<'a> {
    /// The record being written.
    pub context: &'a RecordContext,
}

type ColumnErrorHandler = Box<dyn FnMut(&ColumnErrorEvent<'_>) -> ColumnOutcome>;
type RecordErrorHandler = Box<dyn FnMut(&RecordErrorEvent<'_>) -> RecordOutcome>;
type RecordReadHandler = Box<dyn FnMut(&RecordReadEvent<'_>) -> ReadAction>;
type RecordParsedHandler = Box<dyn FnMut(&RecordParsedEvent<'_>)>;
type RecordWriteHandler = Box<dyn FnMut(&RecordWriteEvent<'_>)>;

/// Ordered handler lists with first-decision-wins folding.
///
/// Handlers run in registration order. The first one that substitutes a
/// column value, suppresses a record error, or skips a raw record decides
/// for the event; observation-only events always run every handler.
#[derive(Default)]
pub(crate) struct ErrorDispatcher {
    column_error: Vec<ColumnErrorHandler>,
    record_error: Vec<RecordErrorHandler>,
    record_read: Vec<RecordReadHandler>,
    record_parsed: Vec<RecordParsedHandler>,
    record_writing: Vec<RecordWriteHandler>,
    record_written: Vec<RecordWriteHandler>,
}

impl std::fmt::Debug for ErrorDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("ErrorDispatcher")
            .field("column_error", &self.column_error.len())
            .field("record_error", &self.record_error.len())
            .field("record_read", &self.record_read.len())
            .field("record_parsed", &self.record_parsed.len())
            .field("record_writing", &self.record_writing.len())
            .field("record_written", &self.record_written.len())
            .finish()
    }
}

impl ErrorDispatcher {
    pub(crate) fn on_column_error(
        &mut self,
        handler: impl FnMut(&ColumnErrorEvent<'_>) -> ColumnOutcome + 'static,
    ) {
        self.column_error.push(Box::new(handler));
    }

    pub(crate) fn on_record_error(
        &mut self,
        handler: impl FnMut(&RecordErrorEvent<'_>) -> RecordOutcome + 'static,
    ) {
        self.record_error.push(Box::new(handler));
    }

    pub(crate) fn on_record_read(
        &mut self,
        handler: impl FnMut(&RecordReadEvent<'_>) -> ReadAction + 'static,
    ) {
        self.record_read.push(Box::new(handler));
    }

    pub(crate) fn on_record_parsed(
        &mut self,
        handler: impl FnMut(&RecordParsedEvent<'_>) + 'static,
    ) {
        self.record_parsed.push(Box::new(handler));
    }

    pub(crate) fn on_record_writing(
        &mut self,
        handler: impl FnMut(&RecordWriteEvent<'_>) + 'static,
    ) {
        self.record_writing.push(Box::new(handler));
    }

    pub(crate) fn on_record_written(
        &mut self,
        handler: impl FnMut(&RecordWriteEvent<'_>) + 'static,
    ) {
        self.record_written.push(Box::new(handler));
    }

    pub(crate) fn dispatch_column_error(&mut self, event: &ColumnErrorEvent<'_>) -> ColumnOutcome {
        for handler in &mut self.column_error {
            if let ColumnOutcome::Substitute(value) = handler(event) {
                return ColumnOutcome::Substitute(value);
            }
        }
        ColumnOutcome::Unhandled
    }

    pub(crate) fn dispatch_record_error(&mut self, event: &RecordErrorEvent<'_>) -> RecordOutcome {
        for handler in &mut self.record_error {
            if handler(event) == RecordOutcome::Handled {
                return RecordOutcome::Handled;
            }
        }
        RecordOutcome::Unhandled
    }

    pub(crate) fn dispatch_record_read(&mut self, event: &RecordReadEvent<'_>) -> ReadAction {
        for handler in &mut self.record_read {
            if handler(event) == ReadAction::Skip {
                return ReadAction::Skip;
            }
        }
        ReadAction::Accept
    }

    pub(crate) fn dispatch_record_parsed(&mut self, event: &RecordParsedEvent<'_>) {
        for handler in &mut self.record_parsed {
            handler(event);
        }
    }

    pub(crate) fn dispatch_record_writing(&mut self, event: &RecordWriteEvent<'_>) {
        for handler in &mut self.record_writing {
            handler(event);
        }
    }

    pub(crate) fn dispatch_record_written(&mut self, event: &RecordWriteEvent<'_>) {
        for handler in &mut self.record_written {
            handler(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::cell::Cell;
    use std::rc::Rc;

    fn column_event_fixture<'a>(
        ctx: &'a RecordContext,
        error: &'a Error,
    ) -> ColumnErrorEvent<'a> {
        ColumnErrorEvent {
            context: ctx,
            column: "n",
            raw: "oops",
            error,
        }
    }

    fn conversion_error() -> Error {
        Error::new(ErrorKind::ColumnConversion {
            record: 1,
            column: "n".to_string(),
            raw: "oops".to_string(),
            message: "bad".to_string(),
        })
    }

    #[test]
    fn first_substitution_wins() {
        let mut dispatcher = ErrorDispatcher::default();
        dispatcher.on_column_error(|_| ColumnOutcome::Unhandled);
        dispatcher.on_column_error(|_| ColumnOutcome::Substitute(Value::Int32(1)));
        dispatcher.on_column_error(|_| ColumnOutcome::Substitute(Value::Int32(2)));
        let ctx = RecordContext::default();
        let error = conversion_error();
        let outcome = dispatcher.dispatch_column_error(&column_event_fixture(&ctx, &error));
        match outcome {
            ColumnOutcome::Substitute(v) => assert_eq!(v, Value::Int32(1)),
            ColumnOutcome::Unhandled => panic!("expected a substitution"),
        }
    }

    #[test]
    fn unhandled_when_no_handler_claims_it() {
        let mut dispatcher = ErrorDispatcher::default();
        dispatcher.on_column_error(|_| ColumnOutcome::Unhandled);
        let ctx = RecordContext::default();
        let error = conversion_error();
        assert!(matches!(
            dispatcher.dispatch_column_error(&column_event_fixture(&ctx, &error)),
            ColumnOutcome::Unhandled
        ));
    }

    #[test]
    fn record_error_short_circuits_after_handled() {
        let mut dispatcher = ErrorDispatcher::default();
        let late = Rc::new(Cell::new(false));
        let late2 = late.clone();
        dispatcher.on_record_error(|_| RecordOutcome::Handled);
        dispatcher.on_record_error(move |_| {
            late2.set(true);
            RecordOutcome::Handled
        });
        let ctx = RecordContext::default();
        let error = conversion_error();
        let event = RecordErrorEvent {
            context: &ctx,
            error: &error,
        };
        assert_eq!(dispatcher.dispatch_record_error(&event), RecordOutcome::Handled);
        assert!(!late.get());
    }

    #[test]
    fn observation_events_run_every_handler() {
        let mut dispatcher = ErrorDispatcher::default();
        let count = Rc::new(Cell::new(0));
        for _ in 0..3 {
            let count = count.clone();
            dispatcher.on_record_parsed(move |_| count.set(count.get() + 1));
        }
        let ctx = RecordContext::default();
        dispatcher.dispatch_record_parsed(&RecordParsedEvent { context: &ctx });
        assert_eq!(count.get(), 3);
    }
}
