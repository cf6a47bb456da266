use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuleError {
    #[error("Parse error: {message}")]
    Parse { message: String },
    #[error("Unknown validation rule: {0}")]
    UnknownRule(String),
    #[error("Missing argument for '{rule}': {message}")]
    MissingArgument { rule: String, message: String },
    #[error("Invalid argument for '{rule}': {message}")]
    InvalidArgument { rule: String, message: String },
    #[error("Config error: {0}")]
    Config(String),
    #[error("Store initialization failed: {0}")]
    StoreInitialization(String),
    #[error("Store query failed: {0}")]
    StoreQuery(String),
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("Lock poisoned: {0}")]
    Lock(String),
}

impl RuleError {
    pub fn missing(rule: &str, message: impl Into<String>) -> Self {
        Self::MissingArgument { rule: rule.to_string(), message: message.into() }
    }
    pub fn invalid(rule: &str, message: impl Into<String>) -> Self {
        Self::InvalidArgument { rule: rule.to_string(), message: message.into() }
    }
    /// Errors raised while compiling a rule string. These are never retried.
    /// `Parse` is listed for completeness; the rule grammar accepts any string.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Parse { .. }
                | Self::UnknownRule(_)
                | Self::MissingArgument { .. }
                | Self::InvalidArgument { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, RuleError>;

// Helper conversions
impl From<rusqlite::Error> for RuleError {
    fn from(e: rusqlite::Error) -> Self { Self::StoreQuery(e.to_string()) }
}
impl From<config::ConfigError> for RuleError {
    fn from(e: config::ConfigError) -> Self { Self::Config(e.to_string()) }
}
