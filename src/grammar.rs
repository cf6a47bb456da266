//! Splits a rule string such as `required|min:3|max:20` into ordered tokens.
//!
//! The parser is purely syntactic: names are kept as raw text and arguments are
//! never interpreted here. Resolving a name into a [`crate::registry::RuleKind`]
//! and decoding its argument is left to the compiler, so a misspelled name
//! surfaces there as an unknown rule.

use pest::Parser;
use pest_derive::Parser;

use crate::error::{Result, RuleError};

#[derive(Parser)]
#[grammar = "rules.pest"]
struct RuleStringParser;

/// One `name[:arg]` segment of a rule string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RuleToken {
    pub name: String,
    pub arg: Option<String>,
}

impl RuleToken {
    pub fn new(name: impl Into<String>, arg: Option<&str>) -> Self {
        Self {
            name: name.into(),
            arg: arg.map(String::from),
        }
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn arg(&self) -> Option<&str> {
        self.arg.as_deref()
    }
}

/// Parses a rule string into its tokens, in order of appearance.
///
/// The argument is everything after the first `:` of a token, so `pattern:a:b`
/// yields the argument `a:b`. An empty rule string yields no tokens. Whitespace
/// is significant: `" min"` is a token named `" min"`.
///
/// The grammar accepts every string, so this never returns `Err` in practice;
/// bad names and arguments are reported by the compiler instead.
pub fn parse(rules: &str) -> Result<Vec<RuleToken>> {
    if rules.is_empty() {
        return Ok(Vec::new());
    }
    let parsed = RuleStringParser::parse(Rule::rules, rules).map_err(|e| RuleError::Parse {
        message: e.to_string(),
    })?;
    let mut tokens = Vec::new();
    for pair in parsed.flat_map(|rules| rules.into_inner()) {
        if pair.as_rule() != Rule::token {
            continue;
        }
        let mut name = String::new();
        let mut arg = None;
        for part in pair.into_inner() {
            match part.as_rule() {
                Rule::name => name = part.as_str().to_string(),
                Rule::arg => arg = Some(part.as_str().to_string()),
                _ => (),
            }
        }
        tokens.push(RuleToken { name, arg });
    }
    Ok(tokens)
}
