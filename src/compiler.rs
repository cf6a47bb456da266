use std::sync::Arc;

use tracing::debug;

use crate::context::{ArrayKind, CompileContext};
use crate::error::{Result, RuleError};
use crate::grammar::{self, RuleToken};
use crate::metadata::FieldMetadata;
use crate::registry::{self, CompiledCheck, Predicate, ResolvedRule, RuleKind, StoreRule};
use crate::store::PredicateMode;

// ------------- CompiledField -------------
/// Everything compiled from one field's rule string: the checks, in token
/// order, and the merged metadata.
#[derive(Debug, Clone, Default)]
pub struct CompiledField {
    checks: Vec<CompiledCheck>,
    metadata: FieldMetadata,
}

impl CompiledField {
    pub fn checks(&self) -> &[CompiledCheck] {
        &self.checks
    }
    pub fn metadata(&self) -> &FieldMetadata {
        &self.metadata
    }
    /// An `optional` rule lets an absent value skip every check.
    pub fn is_optional(&self) -> bool {
        self.checks
            .iter()
            .any(|check| matches!(check.predicate(), Predicate::Optional))
    }
    /// One entry per rule token, in order.
    pub fn kinds(&self) -> Vec<RuleKind> {
        let mut kinds = Vec::new();
        let mut last_position = None;
        for check in &self.checks {
            if last_position != Some(check.position()) {
                kinds.push(check.kind());
                last_position = Some(check.position());
            }
        }
        kinds
    }
}

/// Compiles a rule string against its side parameters.
///
/// Fails on the first token that names an unknown rule or lacks a parameter
/// its rule needs; nothing is returned for the tokens before it.
pub fn compile(rules: &str, context: &CompileContext) -> Result<CompiledField> {
    let tokens = grammar::parse(rules)?;
    let mut field = CompiledField::default();
    for (position, token) in tokens.iter().enumerate() {
        let rule = resolve(token, context)?;
        for check in registry::lookup(&rule, position, &context.options, context.example.as_ref()) {
            field.metadata.merge(check.metadata());
            field.checks.push(check);
        }
    }
    debug!(rules, tokens = tokens.len(), checks = field.checks.len(), "compiled rule string");
    Ok(field)
}

/// Decodes a token's argument and picks up the side parameters its rule needs.
pub fn resolve(token: &RuleToken, context: &CompileContext) -> Result<ResolvedRule> {
    let kind: RuleKind = token.name().parse()?;
    let rule = match kind {
        RuleKind::Required => ResolvedRule::Required,
        RuleKind::Optional => ResolvedRule::Optional,
        RuleKind::Email => ResolvedRule::Email,
        RuleKind::String => ResolvedRule::String,
        RuleKind::Pattern => {
            let regex = context.pattern.clone().ok_or_else(|| {
                RuleError::missing("pattern", "a regular expression is required for pattern validation")
            })?;
            ResolvedRule::Pattern(regex)
        }
        RuleKind::Min => ResolvedRule::Min(length_arg(token, "min")?),
        RuleKind::Max => ResolvedRule::Max(length_arg(token, "max")?),
        RuleKind::Enum => {
            let enum_type = context.enum_type.clone().ok_or_else(|| {
                RuleError::missing("enum", "an enum type is required for enum validation")
            })?;
            ResolvedRule::Enum(enum_type)
        }
        RuleKind::Float => ResolvedRule::Float,
        RuleKind::Decimal => ResolvedRule::Decimal,
        RuleKind::Int => ResolvedRule::Int,
        RuleKind::Number => ResolvedRule::Number,
        RuleKind::Date => ResolvedRule::Date,
        RuleKind::Uuid => ResolvedRule::Uuid,
        RuleKind::Unique => ResolvedRule::Unique(store_rule(token, context, PredicateMode::Unique)?),
        RuleKind::Exist => ResolvedRule::Exist(store_rule(token, context, PredicateMode::Exist)?),
        RuleKind::Object => {
            let schema = context.nested_type.as_ref().ok_or_else(|| {
                RuleError::missing("object", "a nested type is required for object validation")
            })?;
            ResolvedRule::Object(Arc::clone(schema))
        }
        RuleKind::Array => {
            let array_kind = context
                .array_kind
                .clone()
                .or_else(|| token.arg().and_then(ArrayKind::from_arg))
                .ok_or_else(|| {
                    RuleError::missing("array", "an array element type is required for array validation")
                })?;
            ResolvedRule::Array(array_kind)
        }
    };
    Ok(rule)
}

fn length_arg(token: &RuleToken, rule: &str) -> Result<usize> {
    let arg = token
        .arg()
        .filter(|arg| !arg.is_empty())
        .ok_or_else(|| RuleError::missing(rule, format!("a length is required, as in '{rule}:3'")))?;
    arg.parse::<usize>()
        .map_err(|_| RuleError::invalid(rule, format!("'{arg}' is not a non-negative integer")))
}

fn store_rule(token: &RuleToken, context: &CompileContext, mode: PredicateMode) -> Result<StoreRule> {
    let rule = mode.as_str();
    match (context.entity.as_ref(), token.arg().filter(|arg| !arg.is_empty())) {
        (Some(entity), Some(field)) => Ok(StoreRule {
            record_kind: entity.clone(),
            field_name: field.to_string(),
            mode,
        }),
        _ => Err(RuleError::missing(
            rule,
            format!("an entity and a field name are required for {rule} validation"),
        )),
    }
}
