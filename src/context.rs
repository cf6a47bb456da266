use std::sync::Arc;

use regex::Regex;
use serde_json::Value;

use crate::schema::Schema;

/// A closed set of allowed values, named for documentation.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumType {
    name: String,
    values: Vec<Value>,
}

impl EnumType {
    pub fn new<I, V>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self {
            name: name.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn values(&self) -> &[Value] {
        &self.values
    }
}

/// Element type of an `array` rule.
#[derive(Debug, Clone)]
pub enum ArrayKind {
    String,
    Number,
    Nested(Arc<Schema>),
}

impl ArrayKind {
    /// Primitive element kinds may also be named in the rule itself (`array:string`).
    pub fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "string" => Some(Self::String),
            "number" => Some(Self::Number),
            _ => None,
        }
    }
}

/// Options shared by the primary check of every rule.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationOptions {
    /// Apply the check to every element of an array value instead of the value itself.
    pub each: bool,
    /// Replaces the default violation message.
    pub message: Option<String>,
}

impl ValidationOptions {
    pub fn each() -> Self {
        Self { each: true, message: None }
    }
    pub fn message(message: impl Into<String>) -> Self {
        Self { each: false, message: Some(message.into()) }
    }
}

// ------------- CompileContext -------------
/// Side parameters for compiling the rule string of one field.
///
/// Only the rules that need a parameter look at it; a rule whose parameter is
/// missing fails compilation.
#[derive(Debug, Clone, Default)]
pub struct CompileContext {
    pub enum_type: Option<EnumType>,
    pub nested_type: Option<Arc<Schema>>,
    pub array_kind: Option<ArrayKind>,
    pub pattern: Option<Regex>,
    pub entity: Option<String>,
    pub example: Option<Value>,
    pub options: ValidationOptions,
}

impl CompileContext {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn with_enum(mut self, enum_type: EnumType) -> Self {
        self.enum_type = Some(enum_type);
        self
    }
    pub fn with_nested(mut self, schema: Arc<Schema>) -> Self {
        self.nested_type = Some(schema);
        self
    }
    pub fn with_array_kind(mut self, kind: ArrayKind) -> Self {
        self.array_kind = Some(kind);
        self
    }
    pub fn with_pattern(mut self, pattern: Regex) -> Self {
        self.pattern = Some(pattern);
        self
    }
    pub fn with_entity(mut self, entity: impl Into<String>) -> Self {
        self.entity = Some(entity.into());
        self
    }
    pub fn with_example(mut self, example: impl Into<Value>) -> Self {
        self.example = Some(example.into());
        self
    }
    pub fn with_options(mut self, options: ValidationOptions) -> Self {
        self.options = options;
        self
    }
}
