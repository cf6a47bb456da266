//! Existence and uniqueness checks against a record store.
//!
//! The [`StoreChecker`] owns the only shared mutable resource in the crate, the
//! store connection. It is created lazily by the first evaluation and then
//! reused for the lifetime of the checker:
//!
//! ```text
//! Uninitialized --first evaluate--> Initializing --ok--> Ready
//!       ^                                 |
//!       +------------- failure -----------+
//! ```
//!
//! The in-flight connection attempt itself is memoized, so evaluations racing
//! on an uninitialized checker all await the same attempt and share its
//! outcome. A failed attempt is forgotten and the next evaluation starts a new
//! one. Query results are never cached.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{Result, RuleError};
use crate::settings::ConnectionParams;

/// A row returned by the store, column name to value.
pub type Record = serde_json::Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PredicateMode {
    Unique,
    Exist,
}

impl PredicateMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unique => "unique",
            Self::Exist => "exist",
        }
    }
}

impl fmt::Display for PredicateMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ------------- PredicateQuery -------------
#[derive(Debug, Clone, PartialEq)]
pub struct PredicateQuery {
    pub record_kind: String,
    pub field_name: String,
    pub field_value: Value,
    pub mode: PredicateMode,
}

impl PredicateQuery {
    pub fn new(
        record_kind: impl Into<String>,
        field_name: impl Into<String>,
        field_value: impl Into<Value>,
        mode: PredicateMode,
    ) -> Self {
        Self {
            record_kind: record_kind.into(),
            field_name: field_name.into(),
            field_value: field_value.into(),
            mode,
        }
    }
    /// Turns the outcome of the lookup into the predicate's answer.
    pub fn verdict(&self, found: bool) -> bool {
        match self.mode {
            PredicateMode::Unique => !found,
            PredicateMode::Exist => found,
        }
    }
}

// ------------- Seams -------------
/// The narrow slice of a record store the checks need.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Finds one record of `record_kind` whose `field_name` equals `field_value`.
    async fn find_one(
        &self,
        record_kind: &str,
        field_name: &str,
        field_value: &Value,
    ) -> Result<Option<Record>>;
}

/// Establishes a store connection from connection parameters.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, params: &ConnectionParams) -> Result<Arc<dyn RecordStore>>;
}

/// Answers a [`PredicateQuery`]. Failures are errors, never a `false` answer.
#[async_trait]
pub trait PredicateEvaluator: Send + Sync {
    async fn evaluate(&self, query: &PredicateQuery) -> Result<bool>;
}

// ------------- StoreChecker -------------
type Connecting = Shared<BoxFuture<'static, Result<Arc<dyn RecordStore>>>>;

enum ConnectionState {
    Uninitialized,
    Initializing { attempt: u64, connecting: Connecting },
    Ready(Arc<dyn RecordStore>),
}

pub struct StoreChecker {
    connector: Arc<dyn Connector>,
    params: Arc<ConnectionParams>,
    state: Mutex<ConnectionState>,
    attempts: AtomicU64,
}

impl StoreChecker {
    pub fn new(connector: Arc<dyn Connector>, params: ConnectionParams) -> Self {
        Self {
            connector,
            params: Arc::new(params),
            state: Mutex::new(ConnectionState::Uninitialized),
            attempts: AtomicU64::new(0),
        }
    }
    pub fn params(&self) -> &ConnectionParams {
        &self.params
    }
    /// How many connection attempts have been started so far.
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::SeqCst)
    }
    pub fn is_ready(&self) -> bool {
        self.state
            .lock()
            .map(|state| matches!(*state, ConnectionState::Ready(_)))
            .unwrap_or(false)
    }

    /// Returns the connection, establishing it first if nobody has yet.
    pub async fn connection(&self) -> Result<Arc<dyn RecordStore>> {
        let (attempt, connecting) = {
            let mut state = self.state.lock().map_err(|e| RuleError::Lock(e.to_string()))?;
            let pending = match &*state {
                ConnectionState::Ready(store) => return Ok(Arc::clone(store)),
                ConnectionState::Initializing { attempt, connecting } => {
                    Some((*attempt, connecting.clone()))
                }
                ConnectionState::Uninitialized => None,
            };
            match pending {
                Some(pending) => pending,
                None => {
                    let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
                    let connector = Arc::clone(&self.connector);
                    let params = Arc::clone(&self.params);
                    let connecting = async move { connector.connect(&params).await }
                        .boxed()
                        .shared();
                    info!(attempt, kind = %self.params.kind, database = %self.params.database, "connecting to record store");
                    *state = ConnectionState::Initializing {
                        attempt,
                        connecting: connecting.clone(),
                    };
                    (attempt, connecting)
                }
            }
        };
        let outcome = connecting.await;
        {
            let mut state = self.state.lock().map_err(|e| RuleError::Lock(e.to_string()))?;
            // only the first waiter to come back settles the state of its own attempt
            let settles = matches!(
                &*state,
                ConnectionState::Initializing { attempt: current, .. } if *current == attempt
            );
            if settles {
                *state = match &outcome {
                    Ok(store) => {
                        info!(attempt, "record store ready");
                        ConnectionState::Ready(Arc::clone(store))
                    }
                    Err(e) => {
                        warn!(attempt, error = %e, "record store connection failed");
                        ConnectionState::Uninitialized
                    }
                };
            }
        }
        outcome
    }
}

#[async_trait]
impl PredicateEvaluator for StoreChecker {
    async fn evaluate(&self, query: &PredicateQuery) -> Result<bool> {
        let store = self.connection().await?;
        let found = store
            .find_one(&query.record_kind, &query.field_name, &query.field_value)
            .await?
            .is_some();
        debug!(
            record_kind = %query.record_kind,
            field = %query.field_name,
            mode = %query.mode,
            found,
            "store predicate evaluated"
        );
        Ok(query.verdict(found))
    }
}
