//! Structured records for parameters, inputs and outputs.
//!
//! A record is built over a [`FieldSet`]. Strict field sets enumerate the
//! accepted names; writing or reading any other name is an
//! [`UndeclaredFieldError`]. Open field sets accept every name.

use super::ContextState;
use crate::errors::UndeclaredFieldError;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// The names a record accepts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldSet {
    names: BTreeSet<String>,
    strict: bool,
}

impl FieldSet {
    /// Creates a strict field set with exactly these names.
    #[must_use]
    pub fn strict<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
            strict: true,
        }
    }

    /// Creates a field set that accepts any name.
    #[must_use]
    pub fn open() -> Self {
        Self::default()
    }

    /// Returns whether undeclared names are rejected.
    #[must_use]
    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Returns whether the name is accepted.
    #[must_use]
    pub fn accepts(&self, name: &str) -> bool {
        !self.strict || self.names.contains(name)
    }

    /// Returns the declared names (empty for open sets).
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    fn check(&self, record: &str, name: &str) -> Result<(), UndeclaredFieldError> {
        if self.accepts(name) {
            Ok(())
        } else {
            Err(UndeclaredFieldError::new(record, name))
        }
    }
}

/// Named values validated against a [`FieldSet`].
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    kind: &'static str,
    fields: FieldSet,
    values: BTreeMap<String, Value>,
}

impl Record {
    fn new(kind: &'static str, fields: FieldSet) -> Self {
        Self {
            kind,
            fields,
            values: BTreeMap::new(),
        }
    }

    /// Returns the record kind ("params", "inputs" or "outputs").
    #[must_use]
    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// Returns the field set.
    #[must_use]
    pub fn fields(&self) -> &FieldSet {
        &self.fields
    }

    /// Gets a value.
    ///
    /// # Errors
    ///
    /// Returns `UndeclaredFieldError` if a strict record does not declare
    /// the name.
    pub fn get(&self, name: &str) -> Result<Option<&Value>, UndeclaredFieldError> {
        self.fields.check(self.kind, name)?;
        Ok(self.values.get(name))
    }

    /// Gets a value without the declaration check.
    #[must_use]
    pub fn get_unchecked(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Returns whether a value is present.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Returns the number of present values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if no value is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterates over present values in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Returns the present values as a JSON object.
    #[must_use]
    pub fn to_json(&self) -> Value {
        Value::Object(
            self.values
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }

    fn insert(&mut self, name: impl Into<String>, value: Value) -> Result<(), UndeclaredFieldError> {
        let name = name.into();
        self.fields.check(self.kind, &name)?;
        self.values.insert(name, value);
        Ok(())
    }

    fn remove(&mut self, name: &str) -> Option<Value> {
        self.values.remove(name)
    }
}

macro_rules! record_deref {
    ($ty:ident) => {
        impl std::ops::Deref for $ty {
            type Target = Record;

            fn deref(&self) -> &Record {
                &self.0
            }
        }
    };
}

/// Read-only named configuration values for one invocation.
///
/// Besides the named values, params may carry a back-reference to the
/// [`ContextState`] so a callee can reach the host without a separate
/// argument.
#[derive(Clone)]
pub struct Params {
    record: Record,
    context: Option<Arc<ContextState>>,
}

impl std::ops::Deref for Params {
    type Target = Record;

    fn deref(&self) -> &Record {
        &self.record
    }
}

impl Params {
    /// Creates an empty record over the given fields.
    #[must_use]
    pub fn new(fields: FieldSet) -> Self {
        Self {
            record: Record::new("params", fields),
            context: None,
        }
    }

    /// Adds a value while building the record.
    ///
    /// # Errors
    ///
    /// Returns `UndeclaredFieldError` for names the field set rejects.
    pub fn with(mut self, name: impl Into<String>, value: Value) -> Result<Self, UndeclaredFieldError> {
        self.record.insert(name, value)?;
        Ok(self)
    }

    /// Attaches the context state back-reference.
    #[must_use]
    pub fn with_context(mut self, context: Arc<ContextState>) -> Self {
        self.context = Some(context);
        self
    }

    /// Returns the context state back-reference, if attached.
    #[must_use]
    pub fn context(&self) -> Option<&Arc<ContextState>> {
        self.context.as_ref()
    }
}

impl Default for Params {
    fn default() -> Self {
        Self::new(FieldSet::open())
    }
}

impl std::fmt::Debug for Params {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Params")
            .field("record", &self.record)
            .field("has_context", &self.context.is_some())
            .finish()
    }
}

/// Read-only named input values for one invocation.
///
/// The host owns the data; the callee only sees a copy.
#[derive(Debug, Clone, PartialEq)]
pub struct Inputs(Record);

record_deref!(Inputs);

impl Inputs {
    /// Creates an empty record over the given fields.
    #[must_use]
    pub fn new(fields: FieldSet) -> Self {
        Self(Record::new("inputs", fields))
    }

    /// Adds a value while building the record.
    ///
    /// # Errors
    ///
    /// Returns `UndeclaredFieldError` for names the field set rejects.
    pub fn with(mut self, name: impl Into<String>, value: Value) -> Result<Self, UndeclaredFieldError> {
        self.0.insert(name, value)?;
        Ok(self)
    }
}

impl Default for Inputs {
    fn default() -> Self {
        Self::new(FieldSet::open())
    }
}

/// Output slots populated by the callee.
///
/// Slots the callee leaves unset stay absent; the host treats them as "not
/// produced this call".
#[derive(Debug, Clone, PartialEq)]
pub struct Outputs(Record);

record_deref!(Outputs);

impl Outputs {
    /// Creates an empty record over the given slots.
    #[must_use]
    pub fn new(fields: FieldSet) -> Self {
        Self(Record::new("outputs", fields))
    }

    /// Fills a slot, replacing any earlier value.
    ///
    /// # Errors
    ///
    /// Returns `UndeclaredFieldError` for slots the field set rejects.
    pub fn set(&mut self, name: impl Into<String>, value: Value) -> Result<(), UndeclaredFieldError> {
        self.0.insert(name, value)
    }

    /// Fills a slot only if it is accepted and still empty.
    ///
    /// Returns whether the value was stored.
    pub fn set_if_absent(&mut self, name: &str, value: Value) -> bool {
        if self.0.contains(name) || !self.0.fields.accepts(name) {
            return false;
        }
        self.0.values.insert(name.to_string(), value);
        true
    }

    /// Removes and returns a slot value.
    pub fn take(&mut self, name: &str) -> Option<Value> {
        self.0.remove(name)
    }

    /// Consumes the record, returning the produced values.
    #[must_use]
    pub fn into_values(self) -> BTreeMap<String, Value> {
        self.0.values
    }
}

impl Default for Outputs {
    fn default() -> Self {
        Self::new(FieldSet::open())
    }
}
