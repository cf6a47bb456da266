//! Applies compiled checks to values.
//!
//! A check that does not hold is reported as a [`Violation`]; only failures to
//! evaluate (a store that cannot be reached, say) are errors. Checks run in
//! token order. When one check of a multi-check rule fails, the rest of that
//! rule's checks are skipped, so an `array` rule reports a non-array value
//! once instead of also complaining about its elements.

use std::sync::Arc;

use futures_util::future::{BoxFuture, FutureExt};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::compiler::CompiledField;
use crate::error::{Result, RuleError};
use crate::registry::{coerce_date, Predicate, RuleKind};
use crate::schema::Schema;
use crate::store::{PredicateEvaluator, PredicateMode};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Violation {
    pub path: String,
    pub rule: RuleKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldReport {
    /// The value after coercions, `None` when it was absent.
    pub value: Option<Value>,
    pub violations: Vec<Violation>,
}

impl FieldReport {
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    /// The document after coercions.
    pub value: Value,
    pub violations: Vec<Violation>,
}

impl Report {
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }
    pub fn violations_at(&self, path: &str) -> Vec<&Violation> {
        self.violations.iter().filter(|v| v.path == path).collect()
    }
}

// ------------- Validator -------------
#[derive(Clone, Default)]
pub struct Validator {
    store: Option<Arc<dyn PredicateEvaluator>>,
}

impl Validator {
    /// A validator without a record store; `unique` and `exist` checks fail to evaluate.
    pub fn new() -> Self {
        Self::default()
    }
    pub fn with_store(store: Arc<dyn PredicateEvaluator>) -> Self {
        Self { store: Some(store) }
    }

    pub async fn validate(&self, schema: &Schema, document: &Value) -> Result<Report> {
        let mut value = document.clone();
        let mut violations = Vec::new();
        match &mut value {
            Value::Object(object) => {
                self.validate_object(schema, object, "", &mut violations).await?;
            }
            _ => violations.push(Violation {
                path: String::new(),
                rule: RuleKind::Object,
                message: format!("{} must be an object", schema.name()),
            }),
        }
        Ok(Report { value, violations })
    }

    /// Validates a single value; `path` names it in violations.
    pub async fn validate_field(
        &self,
        path: &str,
        field: &CompiledField,
        value: Option<Value>,
    ) -> Result<FieldReport> {
        let mut value = value;
        let mut violations = Vec::new();
        self.apply(field, path, &mut value, &mut violations).await?;
        Ok(FieldReport { value, violations })
    }

    fn validate_object<'a>(
        &'a self,
        schema: &'a Schema,
        object: &'a mut Map<String, Value>,
        prefix: &'a str,
        out: &'a mut Vec<Violation>,
    ) -> BoxFuture<'a, Result<()>> {
        async move {
            for (name, field) in schema.fields() {
                let path = format!("{prefix}{name}");
                let mut value = object.get(name).cloned();
                self.apply(field, &path, &mut value, out).await?;
                if let Some(value) = value {
                    object.insert(name.to_string(), value);
                }
            }
            Ok(())
        }
        .boxed()
    }

    async fn apply(
        &self,
        field: &CompiledField,
        path: &str,
        value: &mut Option<Value>,
        out: &mut Vec<Violation>,
    ) -> Result<()> {
        if field.is_optional() && matches!(value, None | Some(Value::Null)) {
            return Ok(());
        }
        let mut failed_position = None;
        for check in field.checks() {
            if failed_position == Some(check.position()) {
                continue;
            }
            let holds = self
                .run(check.kind(), check.predicate(), check.message(), path, value, out)
                .await?;
            if !holds {
                failed_position = Some(check.position());
            }
        }
        Ok(())
    }

    fn run<'a>(
        &'a self,
        kind: RuleKind,
        predicate: &'a Predicate,
        message: Option<&'a str>,
        path: &'a str,
        value: &'a mut Option<Value>,
        out: &'a mut Vec<Violation>,
    ) -> BoxFuture<'a, Result<bool>> {
        async move {
            let mut report = |default: String| {
                out.push(Violation {
                    path: path.to_string(),
                    rule: kind,
                    message: message.map(String::from).unwrap_or(default),
                });
                false
            };
            match predicate {
                Predicate::Optional => Ok(true),
                Predicate::CoerceDate => {
                    if let Some(coerced) = value.as_ref().and_then(coerce_date) {
                        *value = Some(coerced);
                    }
                    Ok(true)
                }
                Predicate::Primitive(primitive) => {
                    if primitive.holds(value.as_ref()) {
                        Ok(true)
                    } else {
                        Ok(report(primitive.describe(path)))
                    }
                }
                Predicate::Store(rule) => {
                    let store = self.store.as_ref().ok_or_else(|| {
                        RuleError::StoreUnavailable(format!(
                            "no record store configured for the {} check on '{path}'",
                            rule.mode
                        ))
                    })?;
                    let query = rule.query(value.as_ref().unwrap_or(&Value::Null));
                    if store.evaluate(&query).await? {
                        return Ok(true);
                    }
                    let default = match rule.mode {
                        PredicateMode::Unique => format!("{} must be unique", rule.field_name),
                        PredicateMode::Exist => format!("{} must exist in database", rule.field_name),
                    };
                    Ok(report(default))
                }
                Predicate::Nested(schema) => match value {
                    None | Some(Value::Null) => Ok(true),
                    Some(Value::Object(object)) => {
                        let before = out.len();
                        let prefix = format!("{path}.");
                        self.validate_object(schema, object, &prefix, out).await?;
                        Ok(out.len() == before)
                    }
                    Some(_) => Ok(report(format!("nested property {path} must be an object"))),
                },
                Predicate::Each(inner) => match value {
                    Some(Value::Array(items)) => {
                        let mut all = true;
                        for (i, item) in items.iter_mut().enumerate() {
                            let element_path = format!("{path}[{i}]");
                            let mut slot = Some(std::mem::take(item));
                            let holds = self
                                .run(kind, inner, message, &element_path, &mut slot, out)
                                .await;
                            *item = slot.unwrap_or(Value::Null);
                            all &= holds?;
                        }
                        Ok(all)
                    }
                    _ => Ok(report(format!("each value in {path} requires an array"))),
                },
            }
        }
        .boxed()
    }
}
