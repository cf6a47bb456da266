//! Fieldrule – compact rule strings for field validation and schema metadata.
//!
//! A field's rules are written as a single string such as
//! `"required|string|min:3|max:20"`. Compiling that string (together with a
//! [`context::CompileContext`] for the rules that need side parameters) yields:
//! * an ordered list of [`registry::CompiledCheck`]s, applied to values later, and
//! * one merged [`metadata::FieldMetadata`] describing the field for documentation.
//!
//! Two rule kinds, `unique` and `exist`, ask a record store whether a record
//! with the same field value exists. The [`store::StoreChecker`] connects to the
//! store lazily, exactly once even under concurrent first use.
//!
//! ## Modules
//! * [`grammar`] – splits rule strings into tokens (grammar in `rules.pest`).
//! * [`registry`] – rule kinds and the (predicate, metadata) pairs each produces.
//! * [`compiler`] – resolves rule arguments and side parameters, aggregates checks.
//! * [`schema`] – named record types made of compiled fields, for nesting.
//! * [`validate`] – runs compiled checks against values and collects violations.
//! * [`store`] – existence/uniqueness predicates and the lazily connected checker.
//! * [`persist`] – SQLite record store.
//! * [`settings`] – connection parameters from files and `DB_*` environment variables.
//!
//! ## Rule kinds
//! `required`, `optional`, `email`, `string`, `pattern`, `min:N`, `max:N`,
//! `enum`, `float`, `decimal`, `int`, `number`, `date`, `uuid`,
//! `unique:field`, `exist:field`, `object`, `array`.
//!
//! ## Quick Start
//! ```
//! use fieldrule::{compile, CompileContext};
//! let field = compile("required|string|min:3", &CompileContext::new()).unwrap();
//! assert_eq!(field.checks().len(), 3);
//! assert_eq!(field.metadata().min_length, Some(3));
//! assert_eq!(field.checks()[2].holds(&serde_json::json!("ab")), Some(false));
//! ```
//!
//! ## License
//! Dual licensed under Apache-2.0 and MIT.

pub mod compiler;
pub mod context;
pub mod error;
pub mod grammar;
pub mod metadata;
pub mod persist;
pub mod registry;
pub mod schema;
pub mod settings;
pub mod store;
pub mod validate;

pub use compiler::{compile, CompiledField};
pub use context::{ArrayKind, CompileContext, EnumType, ValidationOptions};
pub use error::{Result, RuleError};
pub use metadata::FieldMetadata;
pub use registry::{CompiledCheck, RuleKind};
pub use schema::Schema;
pub use settings::{ConnectionParams, StoreKind};
pub use store::{PredicateEvaluator, PredicateMode, PredicateQuery, StoreChecker};
pub use validate::{Report, Validator, Violation};
