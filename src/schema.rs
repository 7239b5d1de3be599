use crate::column::{Column, FormatDefaults};
use crate::context::RecordContext;
use crate::error::{snippet, Error, ErrorKind, Result};
use crate::events::{ColumnErrorEvent, ColumnOutcome, ErrorDispatcher};
use crate::fixed::Window;
use crate::value::Value;

/// An ordered, uniquely-named sequence of columns.
///
/// Insertion order is serialization order. Names compare
/// case-insensitively, so `id` and `ID` collide. A schema is immutable
/// once a reader or writer owns it.
///
/// ```
/// use flatfile::{Column, Schema};
///
/// let mut schema = Schema::new();
/// schema
///     .add_column(Column::string("name"))?
///     .add_column(Column::int32("age"))?;
/// assert_eq!(schema.physical_count(), 2);
/// # Ok::<(), flatfile::Error>(())
/// ```
#[derive(Debug, Default)]
pub struct Schema {
    columns: Vec<Column>,
    windows: Vec<Option<Window>>,
    metadata_count: usize,
    ignored_count: usize,
}

impl Schema {
    /// An empty schema.
    pub fn new() -> Schema {
        Schema::default()
    }

    /// Append a column. Fails if the name collides with an existing
    /// column, ignoring case. Returns the schema for chaining.
    pub fn add_column(&mut self, column: Column) -> Result<&mut Schema> {
        self.push(column, None)
    }

    /// Append a column with its fixed-width window.
    pub fn add_windowed_column(&mut self, column: Column, window: Window) -> Result<&mut Schema> {
        window.validate()?;
        if column.is_metadata() {
            return Err(Error::new(ErrorKind::Schema {
                message: format!(
                    "metadata column '{}' is not backed by input and takes no window",
                    column.name()
                ),
            }));
        }
        self.push(column, Some(window))
    }

    fn push(&mut self, column: Column, window: Option<Window>) -> Result<&mut Schema> {
        if self.column_index(column.name()).is_some() {
            return Err(Error::new(ErrorKind::Schema {
                message: format!("a column named '{}' already exists", column.name()),
            }));
        }
        if column.is_metadata() {
            self.metadata_count += 1;
        }
        if column.is_ignored() {
            self.ignored_count += 1;
        }
        self.columns.push(column);
        self.windows.push(window);
        Ok(self)
    }

    /// The columns in insertion order.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// The position of the named column, compared case-insensitively.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        let needle = name.to_lowercase();
        self.columns
            .iter()
            .position(|c| c.name().to_lowercase() == needle)
    }

    /// Total number of columns.
    pub fn physical_count(&self) -> usize {
        self.columns.len()
    }

    /// Number of columns backed by an input token: every column except
    /// metadata.
    pub fn logical_count(&self) -> usize {
        self.columns.len() - self.metadata_count
    }

    /// Number of metadata columns.
    pub fn metadata_count(&self) -> usize {
        self.metadata_count
    }

    /// Length of the surfaced value vector: every column except ignored.
    pub(crate) fn value_count(&self) -> usize {
        self.columns.len() - self.ignored_count
    }

    pub(crate) fn window(&self, index: usize) -> Option<&Window> {
        self.windows.get(index).and_then(|w| w.as_ref())
    }

    /// An all-string schema named by header tokens.
    pub(crate) fn infer_from_header(fields: &[String]) -> Result<Schema> {
        let mut schema = Schema::new();
        for field in fields {
            schema.add_column(Column::string(field.trim()))?;
        }
        Ok(schema)
    }

    /// Check header tokens against the column names, ignoring case and
    /// surrounding whitespace.
    pub(crate) fn verify_header(&self, fields: &[String], record: u64) -> Result<()> {
        if fields.len() != self.logical_count() {
            return Err(Error::new(ErrorKind::RecordShape {
                record,
                expected: self.logical_count(),
                actual: fields.len(),
            }));
        }
        let mut fields = fields.iter();
        for column in self.columns.iter().filter(|c| !c.is_metadata()) {
            // The filter keeps the iterators in step, so this never runs dry.
            let Some(field) = fields.next() else { break };
            if column.name().to_lowercase() != field.trim().to_lowercase() {
                return Err(Error::new(ErrorKind::Schema {
                    message: format!(
                        "header names '{}' where the schema has '{}'",
                        field.trim(),
                        column.name()
                    ),
                }));
            }
        }
        Ok(())
    }

    /// Parse raw tokens into typed values, without event handling.
    pub fn parse_values(&self, ctx: &RecordContext, raw_fields: &[String]) -> Result<Vec<Value>> {
        let mut none = ErrorDispatcher::default();
        self.parse_record(ctx, raw_fields, &mut none, &FormatDefaults::default())
    }

    /// Format typed values into raw tokens, without event handling.
    pub fn format_values(&self, ctx: &RecordContext, values: &[Value]) -> Result<Vec<String>> {
        let mut none = ErrorDispatcher::default();
        self.format_record(ctx, values, &mut none, &FormatDefaults::default())
    }

    /// Walk the columns over one record's raw tokens. Metadata columns
    /// synthesize a value without consuming a token; ignored columns
    /// consume a token without surfacing a value. Codec failures are
    /// offered to the column-error handlers before condemning the record.
    pub(crate) fn parse_record(
        &self,
        ctx: &RecordContext,
        raw_fields: &[String],
        dispatcher: &mut ErrorDispatcher,
        defaults: &FormatDefaults,
    ) -> Result<Vec<Value>> {
        if raw_fields.len() != self.logical_count() {
            return Err(Error::new(ErrorKind::RecordShape {
                record: ctx.physical,
                expected: self.logical_count(),
                actual: raw_fields.len(),
            }));
        }
        let mut values = Vec::with_capacity(self.value_count());
        let mut fields = raw_fields.iter();
        for column in &self.columns {
            if column.is_metadata() {
                values.push(column.metadata_value(ctx));
                continue;
            }
            // Shape was checked above, so every token-backed column has
            // its token.
            let Some(raw) = fields.next() else { break };
            if column.is_ignored() {
                continue;
            }
            match column.parse(raw, ctx, defaults) {
                Ok(value) => values.push(value),
                Err(message) => {
                    let error = Error::new(ErrorKind::ColumnConversion {
                        record: ctx.physical,
                        column: column.name().to_string(),
                        raw: snippet(raw),
                        message,
                    });
                    let event = ColumnErrorEvent {
                        context: ctx,
                        column: column.name(),
                        raw,
                        error: &error,
                    };
                    match dispatcher.dispatch_column_error(&event) {
                        ColumnOutcome::Substitute(value) => values.push(value),
                        ColumnOutcome::Unhandled => return Err(error),
                    }
                }
            }
        }
        Ok(values)
    }

    /// Walk the columns over one record's values, the mirror of
    /// [`Schema::parse_record`]. Metadata columns are skipped; ignored
    /// columns emit an empty token.
    pub(crate) fn format_record(
        &self,
        ctx: &RecordContext,
        values: &[Value],
        dispatcher: &mut ErrorDispatcher,
        defaults: &FormatDefaults,
    ) -> Result<Vec<String>> {
        if values.len() != self.value_count() {
            return Err(Error::new(ErrorKind::RecordShape {
                record: ctx.physical,
                expected: self.value_count(),
                actual: values.len(),
            }));
        }
        let mut fields = Vec::with_capacity(self.logical_count());
        let mut values = values.iter();
        for column in &self.columns {
            if column.is_ignored() {
                fields.push(String::new());
                continue;
            }
            let Some(value) = values.next() else { break };
            if column.is_metadata() {
                continue;
            }
            match column.format(value, ctx, defaults) {
                Ok(field) => fields.push(field),
                Err(message) => {
                    let error = Error::new(ErrorKind::ColumnConversion {
                        record: ctx.physical,
                        column: column.name().to_string(),
                        raw: snippet(&value.to_string()),
                        message,
                    });
                    let event = ColumnErrorEvent {
                        context: ctx,
                        column: column.name(),
                        raw: "",
                        error: &error,
                    };
                    match dispatcher.dispatch_column_error(&event) {
                        ColumnOutcome::Substitute(substitute) => {
                            match column.format(&substitute, ctx, defaults) {
                                Ok(field) => fields.push(field),
                                Err(_) => return Err(error),
                            }
                        }
                        ColumnOutcome::Unhandled => return Err(error),
                    }
                }
            }
        }
        Ok(fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(physical: u64) -> RecordContext {
        RecordContext {
            physical,
            ..RecordContext::default()
        }
    }

    fn raw(fields: &[&str]) -> Vec<String> {
        fields.iter().map(|f| f.to_string()).collect()
    }

    #[test]
    fn names_are_unique_ignoring_case() {
        let mut schema = Schema::new();
        schema.add_column(Column::string("Name")).unwrap();
        let err = schema.add_column(Column::int32("NAME")).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Schema { .. }));
        assert_eq!(schema.physical_count(), 1);
    }

    #[test]
    fn counts_track_metadata() {
        let mut schema = Schema::new();
        schema
            .add_column(Column::string("a"))
            .unwrap()
            .add_column(Column::physical_record_number("rec"))
            .unwrap()
            .add_column(Column::int32("b"))
            .unwrap();
        assert_eq!(schema.physical_count(), 3);
        assert_eq!(schema.logical_count(), 2);
        assert_eq!(schema.metadata_count(), 1);
    }

    #[test]
    fn parse_walks_columns_in_order() {
        let mut schema = Schema::new();
        schema
            .add_column(Column::string("name"))
            .unwrap()
            .add_column(Column::int32("age"))
            .unwrap();
        let values = schema.parse_values(&ctx(1), &raw(&["ada", "36"])).unwrap();
        assert_eq!(values, vec![Value::String("ada".into()), Value::Int32(36)]);
    }

    #[test]
    fn metadata_synthesizes_without_a_token() {
        let mut schema = Schema::new();
        schema
            .add_column(Column::physical_record_number("rec"))
            .unwrap()
            .add_column(Column::string("name"))
            .unwrap();
        let values = schema.parse_values(&ctx(12), &raw(&["ada"])).unwrap();
        assert_eq!(values, vec![Value::Int64(12), Value::String("ada".into())]);
    }

    #[test]
    fn ignored_consumes_without_surfacing() {
        let mut schema = Schema::new();
        schema
            .add_column(Column::string("name"))
            .unwrap()
            .add_column(Column::ignored("filler"))
            .unwrap()
            .add_column(Column::int32("age"))
            .unwrap();
        let values = schema
            .parse_values(&ctx(1), &raw(&["ada", "junk", "36"]))
            .unwrap();
        assert_eq!(values, vec![Value::String("ada".into()), Value::Int32(36)]);

        let fields = schema
            .format_values(&ctx(1), &[Value::String("ada".into()), Value::Int32(36)])
            .unwrap();
        assert_eq!(fields, raw(&["ada", "", "36"]));
    }

    #[test]
    fn too_few_fields_is_a_shape_error() {
        let mut schema = Schema::new();
        schema
            .add_column(Column::string("a"))
            .unwrap()
            .add_column(Column::string("b"))
            .unwrap()
            .add_column(Column::string("c"))
            .unwrap();
        let err = schema.parse_values(&ctx(4), &raw(&["x", "y"])).unwrap_err();
        match err.kind() {
            ErrorKind::RecordShape {
                record,
                expected,
                actual,
            } => {
                assert_eq!((*record, *expected, *actual), (4, 3, 2));
            }
            other => panic!("unexpected kind {:?}", other),
        }
    }

    #[test]
    fn too_many_fields_is_a_shape_error() {
        let mut schema = Schema::new();
        schema.add_column(Column::string("a")).unwrap();
        assert!(schema.parse_values(&ctx(1), &raw(&["x", "y"])).is_err());
    }

    #[test]
    fn substituted_columns_do_not_stop_the_walk() {
        let mut schema = Schema::new();
        schema
            .add_column(Column::int32("a"))
            .unwrap()
            .add_column(Column::int32("b"))
            .unwrap();
        let mut dispatcher = ErrorDispatcher::default();
        dispatcher.on_column_error(|event| {
            assert_eq!(event.column, "a");
            ColumnOutcome::Substitute(Value::Int32(-1))
        });
        let values = schema
            .parse_record(
                &ctx(1),
                &raw(&["oops", "2"]),
                &mut dispatcher,
                &FormatDefaults::default(),
            )
            .unwrap();
        assert_eq!(values, vec![Value::Int32(-1), Value::Int32(2)]);
    }

    #[test]
    fn unhandled_column_error_condemns_the_record() {
        let mut schema = Schema::new();
        schema.add_column(Column::int32("n")).unwrap();
        let err = schema.parse_values(&ctx(9), &raw(&["oops"])).unwrap_err();
        match err.kind() {
            ErrorKind::ColumnConversion { record, column, .. } => {
                assert_eq!(*record, 9);
                assert_eq!(column, "n");
            }
            other => panic!("unexpected kind {:?}", other),
        }
    }

    #[test]
    fn format_rejects_wrong_value_count() {
        let mut schema = Schema::new();
        schema
            .add_column(Column::string("a"))
            .unwrap()
            .add_column(Column::string("b"))
            .unwrap();
        assert!(schema
            .format_values(&ctx(1), &[Value::String("x".into())])
            .is_err());
    }

    #[test]
    fn format_skips_metadata() {
        let mut schema = Schema::new();
        schema
            .add_column(Column::physical_record_number("rec"))
            .unwrap()
            .add_column(Column::string("name"))
            .unwrap();
        let fields = schema
            .format_values(&ctx(3), &[Value::Int64(3), Value::String("ada".into())])
            .unwrap();
        assert_eq!(fields, raw(&["ada"]));
    }

    #[test]
    fn header_verification_ignores_case_and_whitespace() {
        let mut schema = Schema::new();
        schema
            .add_column(Column::string("Name"))
            .unwrap()
            .add_column(Column::int32("Age"))
            .unwrap();
        assert!(schema.verify_header(&raw(&[" name ", "AGE"]), 1).is_ok());
        assert!(schema.verify_header(&raw(&["name", "height"]), 1).is_err());
        assert!(schema.verify_header(&raw(&["name"]), 1).is_err());
    }

    #[test]
    fn header_verification_folds_like_column_lookup() {
        let mut schema = Schema::new();
        schema.add_column(Column::string("naïve")).unwrap();
        assert!(schema.verify_header(&raw(&["NAÏVE"]), 1).is_ok());
    }

    #[test]
    fn windows_stay_with_their_columns() {
        let mut schema = Schema::new();
        schema
            .add_windowed_column(Column::string("name"), Window::new(10))
            .unwrap()
            .add_column(Column::physical_record_number("rec"))
            .unwrap();
        assert_eq!(schema.window(0).map(Window::width), Some(10));
        assert!(schema.window(1).is_none());
    }

    #[test]
    fn metadata_columns_take_no_window() {
        let mut schema = Schema::new();
        let err = schema
            .add_windowed_column(Column::physical_record_number("rec"), Window::new(5))
            .unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Schema { .. }));
    }
}
