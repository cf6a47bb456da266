use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use fieldrule::store::{Connector, Record, RecordStore};
use fieldrule::{
    compile, CompileContext, ConnectionParams, PredicateEvaluator, PredicateMode, PredicateQuery,
    Result, RuleError, StoreChecker, ValidationOptions, Validator,
};

#[derive(Default)]
struct MemoryStore {
    // (record kind, field, value)
    rows: Mutex<Vec<(String, String, Value)>>,
}

impl MemoryStore {
    fn insert(&self, kind: &str, field: &str, value: Value) {
        self.rows.lock().unwrap().push((kind.to_string(), field.to_string(), value));
    }
    fn clear(&self) {
        self.rows.lock().unwrap().clear();
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn find_one(&self, record_kind: &str, field_name: &str, field_value: &Value) -> Result<Option<Record>> {
        if record_kind == "Broken" {
            return Err(RuleError::StoreQuery("relation does not exist".to_string()));
        }
        let rows = self.rows.lock().unwrap();
        let found = rows
            .iter()
            .find(|(kind, field, value)| kind == record_kind && field == field_name && value == field_value);
        Ok(found.map(|(_, field, value)| {
            let mut record = Record::new();
            record.insert(field.clone(), value.clone());
            record
        }))
    }
}

struct CountingConnector {
    store: Arc<MemoryStore>,
    calls: AtomicUsize,
    failures_left: AtomicUsize,
}

impl CountingConnector {
    fn new(store: Arc<MemoryStore>, failures: usize) -> Self {
        Self {
            store,
            calls: AtomicUsize::new(0),
            failures_left: AtomicUsize::new(failures),
        }
    }
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for CountingConnector {
    async fn connect(&self, _params: &ConnectionParams) -> Result<Arc<dyn RecordStore>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        // long enough for every racing caller to arrive while the attempt is in flight
        tokio::time::sleep(Duration::from_millis(50)).await;
        let remaining = self.failures_left.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures_left.store(remaining - 1, Ordering::SeqCst);
            return Err(RuleError::StoreInitialization("connection refused".to_string()));
        }
        let store: Arc<dyn RecordStore> = self.store.clone();
        Ok(store)
    }
}

fn setup(failures: usize) -> (Arc<MemoryStore>, Arc<CountingConnector>, Arc<StoreChecker>) {
    let store = Arc::new(MemoryStore::default());
    let connector = Arc::new(CountingConnector::new(Arc::clone(&store), failures));
    let checker = Arc::new(StoreChecker::new(connector.clone(), ConnectionParams::default()));
    (store, connector, checker)
}

fn email(value: &str, mode: PredicateMode) -> PredicateQuery {
    PredicateQuery::new("User", "email", value, mode)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_first_use_connects_once() {
    let (_store, connector, checker) = setup(0);
    let mut handles = Vec::new();
    for i in 0..16 {
        let checker = Arc::clone(&checker);
        handles.push(tokio::spawn(async move {
            checker
                .evaluate(&email(&format!("user{i}@example.com"), PredicateMode::Unique))
                .await
        }));
    }
    for handle in handles {
        assert_eq!(handle.await.unwrap(), Ok(true));
    }
    assert_eq!(connector.calls(), 1);
    assert_eq!(checker.attempts(), 1);
    assert!(checker.is_ready());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn failed_attempt_is_shared_then_retried() {
    let (_store, connector, checker) = setup(1);
    let mut handles = Vec::new();
    for _ in 0..8 {
        let checker = Arc::clone(&checker);
        handles.push(tokio::spawn(async move {
            checker.evaluate(&email("a@b.com", PredicateMode::Unique)).await
        }));
    }
    for handle in handles {
        assert_eq!(
            handle.await.unwrap(),
            Err(RuleError::StoreInitialization("connection refused".to_string()))
        );
    }
    assert_eq!(connector.calls(), 1);
    assert!(!checker.is_ready());

    // the next call starts a fresh attempt
    assert_eq!(checker.evaluate(&email("a@b.com", PredicateMode::Unique)).await, Ok(true));
    assert_eq!(connector.calls(), 2);
    assert_eq!(checker.attempts(), 2);
    assert!(checker.is_ready());
}

#[tokio::test]
async fn unique_and_exist_are_opposites() {
    let (store, _connector, checker) = setup(0);
    store.insert("User", "email", json!("a@b.com"));
    assert_eq!(checker.evaluate(&email("a@b.com", PredicateMode::Unique)).await, Ok(false));
    assert_eq!(checker.evaluate(&email("a@b.com", PredicateMode::Exist)).await, Ok(true));
    assert_eq!(checker.evaluate(&email("c@d.com", PredicateMode::Unique)).await, Ok(true));
    assert_eq!(checker.evaluate(&email("c@d.com", PredicateMode::Exist)).await, Ok(false));
}

#[tokio::test]
async fn results_are_not_cached() {
    let (store, connector, checker) = setup(0);
    let query = email("a@b.com", PredicateMode::Unique);
    assert_eq!(checker.evaluate(&query).await, Ok(true));
    assert_eq!(checker.evaluate(&query).await, Ok(true));
    store.insert("User", "email", json!("a@b.com"));
    assert_eq!(checker.evaluate(&query).await, Ok(false));
    store.clear();
    assert_eq!(checker.evaluate(&query).await, Ok(true));
    assert_eq!(connector.calls(), 1);
}

#[tokio::test]
async fn query_failure_is_an_error_not_false() {
    let (_store, _connector, checker) = setup(0);
    let query = PredicateQuery::new("Broken", "email", "a@b.com", PredicateMode::Exist);
    let err = checker.evaluate(&query).await.unwrap_err();
    assert!(matches!(err, RuleError::StoreQuery(_)));
    // the connection itself is unaffected
    assert!(checker.is_ready());
    assert_eq!(checker.attempts(), 1);
}

#[tokio::test]
async fn validator_reports_taken_values() {
    let (store, _connector, checker) = setup(0);
    store.insert("User", "email", json!("taken@example.com"));
    let context = CompileContext::new().with_entity("User");
    let unique = compile("required|email|unique:email", &context).unwrap();
    let exist = compile("exist:email", &context).unwrap();
    let validator = Validator::with_store(checker);

    let report = validator
        .validate_field("email", &unique, Some(json!("taken@example.com")))
        .await
        .unwrap();
    assert_eq!(report.violations.len(), 1);
    assert_eq!(report.violations[0].message, "email must be unique");

    let report = validator
        .validate_field("email", &unique, Some(json!("free@example.com")))
        .await
        .unwrap();
    assert!(report.is_valid());

    let report = validator
        .validate_field("owner", &exist, Some(json!("free@example.com")))
        .await
        .unwrap();
    assert_eq!(report.violations[0].message, "email must exist in database");
}

#[tokio::test]
async fn store_is_not_touched_until_needed() {
    let (_store, connector, checker) = setup(0);
    let field = compile("required|string", &CompileContext::new()).unwrap();
    let report = Validator::with_store(checker.clone())
        .validate_field("name", &field, Some(json!("Ada")))
        .await
        .unwrap();
    assert!(report.is_valid());
    assert_eq!(connector.calls(), 0);
    assert!(!checker.is_ready());
}

#[tokio::test]
async fn each_option_checks_every_element_against_the_store() {
    let (store, connector, checker) = setup(0);
    store.insert("User", "email", json!("taken@b.com"));
    let context = CompileContext::new()
        .with_entity("User")
        .with_options(ValidationOptions::each());
    let validator = Validator::with_store(checker);

    let unique = compile("unique:email", &context).unwrap();
    let report = validator
        .validate_field("emails", &unique, Some(json!(["taken@b.com", "free@b.com"])))
        .await
        .unwrap();
    assert_eq!(report.violations.len(), 1);
    assert_eq!(report.violations[0].path, "emails[0]");
    assert_eq!(report.violations[0].message, "email must be unique");

    let exist = compile("exist:email", &context).unwrap();
    let report = validator
        .validate_field("emails", &exist, Some(json!(["taken@b.com", "free@b.com"])))
        .await
        .unwrap();
    assert_eq!(report.violations.len(), 1);
    assert_eq!(report.violations[0].path, "emails[1]");
    assert_eq!(report.violations[0].message, "email must exist in database");
    assert_eq!(connector.calls(), 1);
}
