use std::fmt;
use std::sync::Arc;

use crate::schema::Schema;
use crate::value::Value;

/// Chooses a schema per incoming delimited record by predicates over the
/// raw fields. The first matching predicate wins, in registration order;
/// with no match and no default the record raises a selection error.
///
/// ```
/// use flatfile::{Column, Schema, SchemaSelector};
///
/// let mut narrow = Schema::new();
/// narrow.add_column(Column::string("name"))?;
/// let mut wide = Schema::new();
/// wide.add_column(Column::string("name"))?.add_column(Column::int32("age"))?;
///
/// let selector = SchemaSelector::new()
///     .when(|fields| fields.len() == 1, narrow)
///     .otherwise(wide);
/// # Ok::<(), flatfile::Error>(())
/// ```
pub struct SchemaSelector {
    choices: Vec<(Box<dyn Fn(&[String]) -> bool>, Arc<Schema>)>,
    fallback: Option<Arc<Schema>>,
}

impl fmt::Debug for SchemaSelector {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("SchemaSelector")
            .field("choices", &self.choices.len())
            .field("fallback", &self.fallback.is_some())
            .finish()
    }
}

impl Default for SchemaSelector {
    fn default() -> SchemaSelector {
        SchemaSelector::new()
    }
}

impl SchemaSelector {
    /// A selector with no choices.
    pub fn new() -> SchemaSelector {
        SchemaSelector {
            choices: Vec::new(),
            fallback: None,
        }
    }

    /// Use `schema` for records whose raw fields satisfy `predicate`.
    pub fn when(
        mut self,
        predicate: impl Fn(&[String]) -> bool + 'static,
        schema: Schema,
    ) -> SchemaSelector {
        self.choices.push((Box::new(predicate), Arc::new(schema)));
        self
    }

    /// Use `schema` for records no predicate claims.
    pub fn otherwise(mut self, schema: Schema) -> SchemaSelector {
        self.fallback = Some(Arc::new(schema));
        self
    }

    pub(crate) fn select(&self, raw_fields: &[String]) -> Option<&Arc<Schema>> {
        self.choices
            .iter()
            .find(|(predicate, _)| predicate(raw_fields))
            .map(|(_, schema)| schema)
            .or(self.fallback.as_ref())
    }

    pub(crate) fn schemas(&self) -> impl Iterator<Item = &Arc<Schema>> {
        self.choices
            .iter()
            .map(|(_, schema)| schema)
            .chain(self.fallback.iter())
    }
}

/// Chooses a schema per fixed-width record by predicates over the raw
/// record text, since the windows that would produce fields are not
/// known until a schema is chosen.
pub struct FixedSchemaSelector {
    choices: Vec<(Box<dyn Fn(&str) -> bool>, Arc<Schema>)>,
    fallback: Option<Arc<Schema>>,
}

impl fmt::Debug for FixedSchemaSelector {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("FixedSchemaSelector")
            .field("choices", &self.choices.len())
            .field("fallback", &self.fallback.is_some())
            .finish()
    }
}

impl Default for FixedSchemaSelector {
    fn default() -> FixedSchemaSelector {
        FixedSchemaSelector::new()
    }
}

impl FixedSchemaSelector {
    /// A selector with no choices.
    pub fn new() -> FixedSchemaSelector {
        FixedSchemaSelector {
            choices: Vec::new(),
            fallback: None,
        }
    }

    /// Use `schema` for records whose text satisfies `predicate`.
    pub fn when(
        mut self,
        predicate: impl Fn(&str) -> bool + 'static,
        schema: Schema,
    ) -> FixedSchemaSelector {
        self.choices.push((Box::new(predicate), Arc::new(schema)));
        self
    }

    /// Use `schema` for records no predicate claims.
    pub fn otherwise(mut self, schema: Schema) -> FixedSchemaSelector {
        self.fallback = Some(Arc::new(schema));
        self
    }

    pub(crate) fn select(&self, text: &str) -> Option<&Arc<Schema>> {
        self.choices
            .iter()
            .find(|(predicate, _)| predicate(text))
            .map(|(_, schema)| schema)
            .or(self.fallback.as_ref())
    }

    pub(crate) fn schemas(&self) -> impl Iterator<Item = &Arc<Schema>> {
        self.choices
            .iter()
            .map(|(_, schema)| schema)
            .chain(self.fallback.iter())
    }
}

/// Chooses a schema per outgoing record by predicates over the typed
/// values, the write-side mirror of the read-side selectors.
pub struct SchemaInjector {
    choices: Vec<(Box<dyn Fn(&[Value]) -> bool>, Arc<Schema>)>,
    fallback: Option<Arc<Schema>>,
}

impl fmt::Debug for SchemaInjector {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("SchemaInjector")
            .field("choices", &self.choices.len())
            .field("fallback", &self.fallback.is_some())
            .finish()
    }
}

impl Default for SchemaInjector {
    fn default() -> SchemaInjector {
        SchemaInjector::new()
    }
}

impl SchemaInjector {
    /// An injector with no choices.
    pub fn new() -> SchemaInjector {
        SchemaInjector {
            choices: Vec::new(),
            fallback: None,
        }
    }

    /// Use `schema` for records whose values satisfy `predicate`.
    pub fn when(
        mut self,
        predicate: impl Fn(&[Value]) -> bool + 'static,
        schema: Schema,
    ) -> SchemaInjector {
        self.choices.push((Box::new(predicate), Arc::new(schema)));
        self
    }

    /// Use `schema` for records no predicate claims.
    pub fn otherwise(mut self, schema: Schema) -> SchemaInjector {
        self.fallback = Some(Arc::new(schema));
        self
    }

    pub(crate) fn select(&self, values: &[Value]) -> Option<&Arc<Schema>> {
        self.choices
            .iter()
            .find(|(predicate, _)| predicate(values))
            .map(|(_, schema)| schema)
            .or(self.fallback.as_ref())
    }

    pub(crate) fn schemas(&self) -> impl Iterator<Item = &Arc<Schema>> {
        self.choices
            .iter()
            .map(|(_, schema)| schema)
            .chain(self.fallback.iter())
    }
}
