//! The fixed table from rule kind to (predicate, metadata) pairs.
//!
//! [`lookup`] is pure: given a rule whose argument has already been decoded by
//! the compiler it returns the checks for that rule, in the order they must
//! be applied. Most kinds yield one check; `date` and `array` yield two.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

// used for decimal numbers given as text
use bigdecimal::BigDecimal;
// used when coercing raw input into dates
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;

use crate::context::{ArrayKind, EnumType, ValidationOptions};
use crate::error::RuleError;
use crate::metadata::FieldMetadata;
use crate::schema::Schema;
use crate::store::{PredicateMode, PredicateQuery};

lazy_static! {
    static ref EMAIL: Regex = Regex::new(
        r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)+$"
    )
    .unwrap();
    static ref UUID_V4: Regex = Regex::new(
        r"^(?i)[0-9a-f]{8}-[0-9a-f]{4}-4[0-9a-f]{3}-[89ab][0-9a-f]{3}-[0-9a-f]{12}$"
    )
    .unwrap();
}

// ------------- RuleKind -------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleKind {
    Required,
    Optional,
    Email,
    String,
    Unique,
    Exist,
    Enum,
    Max,
    Min,
    Float,
    Int,
    Number,
    Decimal,
    Date,
    Uuid,
    Object,
    Array,
    Pattern,
}

impl RuleKind {
    pub const ALL: [RuleKind; 18] = [
        Self::Required,
        Self::Optional,
        Self::Email,
        Self::String,
        Self::Unique,
        Self::Exist,
        Self::Enum,
        Self::Max,
        Self::Min,
        Self::Float,
        Self::Int,
        Self::Number,
        Self::Decimal,
        Self::Date,
        Self::Uuid,
        Self::Object,
        Self::Array,
        Self::Pattern,
    ];
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Required => "required",
            Self::Optional => "optional",
            Self::Email => "email",
            Self::String => "string",
            Self::Unique => "unique",
            Self::Exist => "exist",
            Self::Enum => "enum",
            Self::Max => "max",
            Self::Min => "min",
            Self::Float => "float",
            Self::Int => "int",
            Self::Number => "number",
            Self::Decimal => "decimal",
            Self::Date => "date",
            Self::Uuid => "uuid",
            Self::Object => "object",
            Self::Array => "array",
            Self::Pattern => "pattern",
        }
    }
}

impl FromStr for RuleKind {
    type Err = RuleError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|kind| kind.as_str() == s)
            .copied()
            .ok_or_else(|| RuleError::UnknownRule(s.to_string()))
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ------------- ResolvedRule -------------
/// A rule token with its argument and side parameters decoded.
#[derive(Debug, Clone)]
pub enum ResolvedRule {
    Required,
    Optional,
    Email,
    String,
    Pattern(Regex),
    Min(usize),
    Max(usize),
    Enum(EnumType),
    Float,
    Decimal,
    Int,
    Number,
    Date,
    Uuid,
    Unique(StoreRule),
    Exist(StoreRule),
    Object(Arc<Schema>),
    Array(ArrayKind),
}

impl ResolvedRule {
    pub fn kind(&self) -> RuleKind {
        match self {
            Self::Required => RuleKind::Required,
            Self::Optional => RuleKind::Optional,
            Self::Email => RuleKind::Email,
            Self::String => RuleKind::String,
            Self::Pattern(_) => RuleKind::Pattern,
            Self::Min(_) => RuleKind::Min,
            Self::Max(_) => RuleKind::Max,
            Self::Enum(_) => RuleKind::Enum,
            Self::Float => RuleKind::Float,
            Self::Decimal => RuleKind::Decimal,
            Self::Int => RuleKind::Int,
            Self::Number => RuleKind::Number,
            Self::Date => RuleKind::Date,
            Self::Uuid => RuleKind::Uuid,
            Self::Unique(_) => RuleKind::Unique,
            Self::Exist(_) => RuleKind::Exist,
            Self::Object(_) => RuleKind::Object,
            Self::Array(_) => RuleKind::Array,
        }
    }
}

/// Which record kind and field a `unique`/`exist` rule looks at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreRule {
    pub record_kind: String,
    pub field_name: String,
    pub mode: PredicateMode,
}

impl StoreRule {
    pub fn query(&self, value: &Value) -> PredicateQuery {
        PredicateQuery {
            record_kind: self.record_kind.clone(),
            field_name: self.field_name.clone(),
            field_value: value.clone(),
            mode: self.mode,
        }
    }
}

// ------------- Predicates -------------
/// Synchronous checks on a single value. An absent value is `None`.
#[derive(Debug, Clone)]
pub enum Primitive {
    NotEmpty,
    Email,
    Text,
    Matches(Regex),
    MinLength(usize),
    MaxLength(usize),
    OneOf(Vec<Value>),
    Decimal,
    Integer,
    Number,
    Date,
    Uuid,
    Sequence,
}

impl Primitive {
    pub fn holds(&self, value: Option<&Value>) -> bool {
        let Some(value) = value else {
            return false;
        };
        match self {
            Self::NotEmpty => !matches!(value, Value::Null) && value.as_str() != Some(""),
            Self::Email => value.as_str().is_some_and(|s| EMAIL.is_match(s)),
            Self::Text => value.is_string(),
            Self::Matches(regex) => value.as_str().is_some_and(|s| regex.is_match(s)),
            Self::MinLength(min) => length_of(value).is_some_and(|len| len >= *min),
            Self::MaxLength(max) => length_of(value).is_some_and(|len| len <= *max),
            Self::OneOf(values) => values.contains(value),
            Self::Decimal => match value {
                Value::Number(_) => true,
                Value::String(s) => BigDecimal::from_str(s).is_ok(),
                _ => false,
            },
            Self::Integer => match value {
                Value::Number(n) => {
                    n.is_i64() || n.is_u64() || n.as_f64().is_some_and(|f| f.fract() == 0.0)
                }
                _ => false,
            },
            Self::Number => value.as_f64().is_some_and(f64::is_finite),
            Self::Date => value
                .as_str()
                .is_some_and(|s| DateTime::parse_from_rfc3339(s).is_ok()),
            Self::Uuid => value.as_str().is_some_and(|s| UUID_V4.is_match(s)),
            Self::Sequence => value.is_array(),
        }
    }

    pub fn describe(&self, property: &str) -> String {
        match self {
            Self::NotEmpty => format!("{property} should not be empty"),
            Self::Email => format!("{property} must be an email"),
            Self::Text => format!("{property} must be a string"),
            Self::Matches(regex) => {
                format!("{property} must match {} regular expression", regex.as_str())
            }
            Self::MinLength(min) => {
                format!("{property} must be longer than or equal to {min} characters")
            }
            Self::MaxLength(max) => {
                format!("{property} must be shorter than or equal to {max} characters")
            }
            Self::OneOf(values) => {
                let listed: Vec<String> = values.iter().map(render).collect();
                format!("{property} must be one of the following values: {}", listed.join(", "))
            }
            Self::Decimal => format!("{property} is not a valid decimal number"),
            Self::Integer => format!("{property} must be an integer number"),
            Self::Number => format!("{property} must be a number"),
            Self::Date => format!("{property} must be a valid date"),
            Self::Uuid => format!("{property} must be a UUID"),
            Self::Sequence => format!("{property} must be an array"),
        }
    }
}

fn length_of(value: &Value) -> Option<usize> {
    match value {
        Value::String(s) => Some(s.chars().count()),
        Value::Array(items) => Some(items.len()),
        _ => None,
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[derive(Debug, Clone)]
pub enum Predicate {
    /// Marks the field as skippable when absent; always holds.
    Optional,
    /// Rewrites a raw value into an RFC 3339 timestamp when it can; always holds.
    CoerceDate,
    Primitive(Primitive),
    Store(StoreRule),
    Nested(Arc<Schema>),
    Each(Box<Predicate>),
}

impl Predicate {
    /// Evaluates without coercion. `None` when the predicate needs the record
    /// store or a nested schema.
    pub fn holds(&self, value: Option<&Value>) -> Option<bool> {
        match self {
            Self::Optional | Self::CoerceDate => Some(true),
            Self::Primitive(primitive) => Some(primitive.holds(value)),
            Self::Store(_) | Self::Nested(_) => None,
            Self::Each(inner) => match value {
                Some(Value::Array(items)) => {
                    for item in items {
                        if !inner.holds(Some(item))? {
                            return Some(false);
                        }
                    }
                    Some(true)
                }
                _ => Some(false),
            },
        }
    }
}

/// Normalizes date-like input to an RFC 3339 UTC timestamp with milliseconds.
pub fn coerce_date(value: &Value) -> Option<Value> {
    let moment: DateTime<Utc> = match value {
        Value::String(s) => {
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                dt.with_timezone(&Utc)
            } else if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
                naive.and_utc()
            } else if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
                naive.and_utc()
            } else if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
                date.and_hms_opt(0, 0, 0)?.and_utc()
            } else {
                return None;
            }
        }
        Value::Number(n) => {
            // fractional milliseconds are dropped
            let millis = match n.as_i64() {
                Some(millis) => millis,
                None => n.as_f64().filter(|f| f.is_finite())?.trunc() as i64,
            };
            DateTime::from_timestamp_millis(millis)?
        }
        _ => return None,
    };
    Some(Value::String(moment.to_rfc3339_opts(SecondsFormat::Millis, true)))
}

// ------------- CompiledCheck -------------
#[derive(Debug, Clone)]
pub struct CompiledCheck {
    kind: RuleKind,
    position: usize,
    predicate: Predicate,
    metadata: FieldMetadata,
    message: Option<String>,
}

impl CompiledCheck {
    pub fn kind(&self) -> RuleKind {
        self.kind
    }
    /// Index of the rule token this check was compiled from.
    pub fn position(&self) -> usize {
        self.position
    }
    pub fn predicate(&self) -> &Predicate {
        &self.predicate
    }
    pub fn metadata(&self) -> &FieldMetadata {
        &self.metadata
    }
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
    pub fn holds(&self, value: &Value) -> Option<bool> {
        self.predicate.holds(Some(value))
    }
}

struct Emitter<'a> {
    kind: RuleKind,
    position: usize,
    options: &'a ValidationOptions,
    example: Option<&'a Value>,
    checks: Vec<CompiledCheck>,
}

impl Emitter<'_> {
    fn fragment(&self) -> FieldMetadata {
        FieldMetadata::new().with_example(self.example)
    }
    // the rule's own check, honoring the caller's options
    fn primary(&mut self, predicate: Predicate, metadata: FieldMetadata) {
        let predicate = if self.options.each {
            Predicate::Each(Box::new(predicate))
        } else {
            predicate
        };
        let message = self.options.message.clone();
        self.push(predicate, metadata, message);
    }
    fn push(&mut self, predicate: Predicate, metadata: FieldMetadata, message: Option<String>) {
        self.checks.push(CompiledCheck {
            kind: self.kind,
            position: self.position,
            predicate,
            metadata,
            message,
        });
    }
}

/// Produces the checks for one resolved rule, `position` being its token index.
pub fn lookup(
    rule: &ResolvedRule,
    position: usize,
    options: &ValidationOptions,
    example: Option<&Value>,
) -> Vec<CompiledCheck> {
    let mut emit = Emitter {
        kind: rule.kind(),
        position,
        options,
        example,
        checks: Vec::with_capacity(2),
    };
    let meta = emit.fragment();
    match rule {
        ResolvedRule::Required => {
            emit.primary(Predicate::Primitive(Primitive::NotEmpty), meta.required(true));
        }
        ResolvedRule::Optional => {
            emit.push(Predicate::Optional, meta.required(false), None);
        }
        ResolvedRule::Email => {
            emit.primary(Predicate::Primitive(Primitive::Email), meta.format("email"));
        }
        ResolvedRule::String => {
            emit.primary(Predicate::Primitive(Primitive::Text), meta.type_name("string"));
        }
        ResolvedRule::Pattern(regex) => {
            let meta = meta.pattern(regex.as_str());
            emit.primary(Predicate::Primitive(Primitive::Matches(regex.clone())), meta);
        }
        ResolvedRule::Min(min) => {
            emit.primary(Predicate::Primitive(Primitive::MinLength(*min)), meta.min_length(*min));
        }
        ResolvedRule::Max(max) => {
            emit.primary(Predicate::Primitive(Primitive::MaxLength(*max)), meta.max_length(*max));
        }
        ResolvedRule::Enum(enum_type) => {
            let meta = meta.enumeration(enum_type.name(), enum_type.values());
            let values = enum_type.values().to_vec();
            emit.primary(Predicate::Primitive(Primitive::OneOf(values)), meta);
        }
        ResolvedRule::Float => {
            let meta = meta.type_name("number").format("float");
            emit.primary(Predicate::Primitive(Primitive::Decimal), meta);
        }
        ResolvedRule::Decimal => {
            let meta = meta.type_name("number").format("decimal");
            emit.primary(Predicate::Primitive(Primitive::Decimal), meta);
        }
        ResolvedRule::Int => {
            emit.primary(Predicate::Primitive(Primitive::Integer), meta.type_name("integer"));
        }
        ResolvedRule::Number => {
            emit.primary(Predicate::Primitive(Primitive::Number), meta.type_name("number"));
        }
        ResolvedRule::Date => {
            let coerce = if options.each {
                Predicate::Each(Box::new(Predicate::CoerceDate))
            } else {
                Predicate::CoerceDate
            };
            let fragment = emit.fragment();
            emit.push(coerce, fragment, None);
            let meta = meta.type_name("string").format("date-time");
            emit.primary(Predicate::Primitive(Primitive::Date), meta);
        }
        ResolvedRule::Uuid => {
            emit.primary(Predicate::Primitive(Primitive::Uuid), meta.format("uuid"));
        }
        ResolvedRule::Unique(store_rule) => {
            emit.primary(Predicate::Store(store_rule.clone()), meta.unique_items());
        }
        ResolvedRule::Exist(store_rule) => {
            emit.primary(Predicate::Store(store_rule.clone()), meta);
        }
        ResolvedRule::Object(schema) => {
            let meta = meta.type_name("object").nested_type(schema.name());
            emit.primary(Predicate::Nested(Arc::clone(schema)), meta);
        }
        ResolvedRule::Array(array_kind) => {
            let message = options.message.clone();
            let sequence = Predicate::Primitive(Primitive::Sequence);
            emit.push(sequence, meta.type_name("array"), message);
            let elements = emit.fragment();
            let (element, elements) = match array_kind {
                ArrayKind::String => (Predicate::Primitive(Primitive::Text), elements.array_of("string")),
                ArrayKind::Number => (Predicate::Primitive(Primitive::Number), elements.array_of("number")),
                ArrayKind::Nested(schema) => (
                    Predicate::Nested(Arc::clone(schema)),
                    elements.array_of("object").nested_type(schema.name()),
                ),
            };
            emit.push(Predicate::Each(Box::new(element)), elements, None);
        }
    }
    emit.checks
}
