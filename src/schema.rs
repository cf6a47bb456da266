use serde_json::{Map, Value};

use crate::compiler::{self, CompiledField};
use crate::context::CompileContext;
use crate::error::Result;

// ------------- Schema -------------
/// A named record type: its fields, each with compiled rules, in declaration order.
///
/// Schemas are the target of `object` and `array` rules with nested element
/// types, and the unit a [`crate::validate::Validator`] checks documents against.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    name: String,
    fields: Vec<(String, CompiledField)>,
}

impl Schema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }
    /// Compiles `rules` for a new field. Redeclaring a field replaces it in place.
    pub fn field(mut self, name: impl Into<String>, rules: &str, context: CompileContext) -> Result<Self> {
        let compiled = compiler::compile(rules, &context)?;
        self.insert(name, compiled);
        Ok(self)
    }
    pub fn insert(&mut self, name: impl Into<String>, field: CompiledField) {
        let name = name.into();
        match self.fields.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, existing)) => *existing = field,
            None => self.fields.push((name, field)),
        }
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn get(&self, name: &str) -> Option<&CompiledField> {
        self.fields
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, field)| field)
    }
    pub fn fields(&self) -> impl Iterator<Item = (&str, &CompiledField)> {
        self.fields.iter().map(|(name, field)| (name.as_str(), field))
    }
    pub fn len(&self) -> usize {
        self.fields.len()
    }
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Object description for documentation renderers. Nested types are
    /// referenced by name through `nestedType`.
    pub fn describe(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for (name, field) in &self.fields {
            properties.insert(name.clone(), field.metadata().to_json());
            if field.metadata().is_required() {
                required.push(Value::String(name.clone()));
            }
        }
        let mut description = Map::new();
        description.insert("title".into(), Value::String(self.name.clone()));
        description.insert("type".into(), Value::String("object".into()));
        description.insert("properties".into(), Value::Object(properties));
        if !required.is_empty() {
            description.insert("required".into(), Value::Array(required));
        }
        Value::Object(description)
    }
}
