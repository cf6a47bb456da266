use serde::Serialize;
use serde_json::Value;

// ------------- FieldMetadata -------------
/// Schema description of one field, as consumed by documentation renderers.
///
/// Each compiled check contributes one fragment. Fragments are overlaid in
/// token order: a key set by a later fragment replaces the earlier one, keys a
/// fragment leaves unset are kept.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub example: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enum_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_array: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nested_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unique_items: Option<bool>,
}

impl FieldMetadata {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn with_example(mut self, example: Option<&Value>) -> Self {
        self.example = example.cloned();
        self
    }
    pub fn required(mut self, required: bool) -> Self {
        self.required = Some(required);
        self
    }
    pub fn type_name(mut self, type_name: &str) -> Self {
        self.type_name = Some(type_name.to_string());
        self
    }
    pub fn format(mut self, format: &str) -> Self {
        self.format = Some(format.to_string());
        self
    }
    pub fn min_length(mut self, min: usize) -> Self {
        self.min_length = Some(min);
        self
    }
    pub fn max_length(mut self, max: usize) -> Self {
        self.max_length = Some(max);
        self
    }
    pub fn pattern(mut self, pattern: &str) -> Self {
        self.pattern = Some(pattern.to_string());
        self
    }
    pub fn enumeration(mut self, name: &str, values: &[Value]) -> Self {
        self.enum_name = Some(name.to_string());
        self.enum_values = Some(values.to_vec());
        self
    }
    pub fn array_of(mut self, items: &str) -> Self {
        self.is_array = Some(true);
        self.items = Some(items.to_string());
        self
    }
    pub fn nested_type(mut self, name: &str) -> Self {
        self.nested_type = Some(name.to_string());
        self
    }
    pub fn unique_items(mut self) -> Self {
        self.unique_items = Some(true);
        self
    }

    /// Overlays `fragment` onto `self`, key by key.
    pub fn merge(&mut self, fragment: &FieldMetadata) {
        fn overlay<T: Clone>(target: &mut Option<T>, source: &Option<T>) {
            if source.is_some() {
                target.clone_from(source);
            }
        }
        overlay(&mut self.required, &fragment.required);
        overlay(&mut self.type_name, &fragment.type_name);
        overlay(&mut self.format, &fragment.format);
        overlay(&mut self.example, &fragment.example);
        overlay(&mut self.min_length, &fragment.min_length);
        overlay(&mut self.max_length, &fragment.max_length);
        overlay(&mut self.pattern, &fragment.pattern);
        overlay(&mut self.enum_values, &fragment.enum_values);
        overlay(&mut self.enum_name, &fragment.enum_name);
        overlay(&mut self.is_array, &fragment.is_array);
        overlay(&mut self.items, &fragment.items);
        overlay(&mut self.nested_type, &fragment.nested_type);
        overlay(&mut self.unique_items, &fragment.unique_items);
    }

    /// Fields count as required unless an `optional` rule said otherwise.
    pub fn is_required(&self) -> bool {
        self.required != Some(false)
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
