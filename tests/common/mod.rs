//! Common test utilities
//!
//! Shared initialization for Pact tests and in-memory stand-ins for the
//! provider, status store, finalizer and value store used by lifecycle tests.

#![allow(dead_code, reason = "each test binary uses a different subset")]

use async_trait::async_trait;
use external_service_controller::controller::reconciler::{
    reconcile_service, DeletionGuard, Directive, LifecycleContext, ReconcilerError, StatusWriter,
    ValueStore,
};
use external_service_controller::crd::{ExternalService, ExternalServiceStatus};
use external_service_controller::provider::{
    AdapterRegistry, CreatedResource, ExternalDetail, ExternalInfo, ExternalResourceAdapter,
    Params, ProviderError,
};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

static RUSTLS_INIT: Once = Once::new();

/// Initialize rustls crypto provider for tests
///
/// This must be called before any reqwest client is built.
/// Uses a `Once` to ensure it's only called once across all tests.
pub fn init_rustls() {
    RUSTLS_INIT.call_once(|| {
        // Another test binary component may already have installed it
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

pub const SERVICE_ID: &str = "mysql-catalog";
pub const RELEASE_ID: &str = "orders-db-2024-06";
pub const EXTERNAL_ID: &str = "rel-42";
pub const PRIMARY_KEY: &str = "pk-mysql";

pub const PENDING_POLL: Duration = Duration::from_secs(5);
pub const DRIFT_CHECK: Duration = Duration::from_secs(300);

/// Provider call recorded by [`FakeAdapter`]
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Create { release_id: String, params: Params },
    Update { external_id: String, params: Params },
    Delete { external_id: String },
    GetStatus { external_id: String },
    GetDetail { external_id: String },
}

/// Scriptable in-memory provider
#[derive(Debug)]
pub struct FakeAdapter {
    calls: Mutex<Vec<Call>>,
    raw_status: Mutex<String>,
    echoed_params: Mutex<Option<Value>>,
    resource_id: Mutex<Option<String>>,
    failing: Mutex<HashSet<&'static str>>,
}

impl Default for FakeAdapter {
    fn default() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            raw_status: Mutex::new("deploying".to_string()),
            echoed_params: Mutex::new(None),
            resource_id: Mutex::new(None),
            failing: Mutex::new(HashSet::new()),
        }
    }
}

impl FakeAdapter {
    pub fn set_raw_status(&self, status: &str) {
        *self.raw_status.lock().unwrap() = status.to_string();
    }

    /// Parameters the provider echoes in `request_params`
    pub fn set_echoed_params(&self, params: Value) {
        *self.echoed_params.lock().unwrap() = Some(params);
    }

    /// Workload id reported by create and get_status
    pub fn set_resource_id(&self, id: &str) {
        *self.resource_id.lock().unwrap() = Some(id.to_string());
    }

    /// Make an operation ("create", "update", "delete", "get_status", "get_detail") fail
    pub fn fail(&self, operation: &'static str) {
        self.failing.lock().unwrap().insert(operation);
    }

    pub fn recover(&self, operation: &'static str) {
        self.failing.lock().unwrap().remove(operation);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, matches: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| matches(c)).count()
    }

    fn record(&self, call: Call, operation: &'static str) -> Result<(), ProviderError> {
        self.calls.lock().unwrap().push(call);
        if self.failing.lock().unwrap().contains(operation) {
            return Err(ProviderError::Api {
                operation,
                status: 503,
                message: "provider unavailable".to_string(),
            });
        }
        Ok(())
    }

    fn info(&self, id: &str, action: &str) -> ExternalInfo {
        ExternalInfo {
            id: id.to_string(),
            raw_status: self.raw_status.lock().unwrap().clone(),
            action: action.to_string(),
            resource_id: self.resource_id.lock().unwrap().clone(),
        }
    }
}

#[async_trait]
impl ExternalResourceAdapter for FakeAdapter {
    async fn create(
        &self,
        _service_id: &str,
        release_id: &str,
        params: &Params,
    ) -> Result<CreatedResource, ProviderError> {
        self.record(
            Call::Create {
                release_id: release_id.to_string(),
                params: params.clone(),
            },
            "create",
        )?;
        Ok(CreatedResource {
            info: self.info(EXTERNAL_ID, "create"),
            primary_key: PRIMARY_KEY.to_string(),
        })
    }

    async fn update(
        &self,
        _service_id: &str,
        external_id: &str,
        params: &Params,
    ) -> Result<ExternalInfo, ProviderError> {
        self.record(
            Call::Update {
                external_id: external_id.to_string(),
                params: params.clone(),
            },
            "update",
        )?;
        Ok(self.info(external_id, "update"))
    }

    async fn delete(
        &self,
        _service_id: &str,
        external_id: &str,
    ) -> Result<ExternalInfo, ProviderError> {
        self.record(
            Call::Delete {
                external_id: external_id.to_string(),
            },
            "delete",
        )?;
        Ok(self.info(external_id, "delete"))
    }

    async fn get_status(
        &self,
        _service_id: &str,
        external_id: &str,
    ) -> Result<ExternalInfo, ProviderError> {
        self.record(
            Call::GetStatus {
                external_id: external_id.to_string(),
            },
            "get_status",
        )?;
        Ok(self.info(external_id, "get"))
    }

    async fn get_detail(
        &self,
        _service_id: &str,
        external_id: &str,
    ) -> Result<ExternalDetail, ProviderError> {
        self.record(
            Call::GetDetail {
                external_id: external_id.to_string(),
            },
            "get_detail",
        )?;
        let mut detail = ExternalDetail::new();
        detail.insert("id".to_string(), json!(external_id));
        detail.insert(
            "release_status".to_string(),
            json!(self.raw_status.lock().unwrap().clone()),
        );
        detail.insert("action".to_string(), json!("get"));
        if let Some(params) = self.echoed_params.lock().unwrap().clone() {
            detail.insert("request_params".to_string(), params);
        }
        Ok(detail)
    }
}

/// Status store that keeps every committed record
#[derive(Debug, Default)]
pub struct FakeStatusWriter {
    commits: Mutex<Vec<ExternalServiceStatus>>,
    fail: AtomicBool,
}

impl FakeStatusWriter {
    pub fn commits(&self) -> Vec<ExternalServiceStatus> {
        self.commits.lock().unwrap().clone()
    }

    pub fn last(&self) -> Option<ExternalServiceStatus> {
        self.commits.lock().unwrap().last().cloned()
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl StatusWriter for FakeStatusWriter {
    async fn commit(
        &self,
        _service: &ExternalService,
        status: &ExternalServiceStatus,
    ) -> anyhow::Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("status subresource unavailable");
        }
        self.commits.lock().unwrap().push(status.clone());
        Ok(())
    }
}

/// Finalizer stand-in tracking whether the guard is held
#[derive(Debug)]
pub struct FakeGuard {
    held: AtomicBool,
    pub adds: AtomicUsize,
    pub releases: AtomicUsize,
}

impl FakeGuard {
    pub fn new(held: bool) -> Self {
        Self {
            held: AtomicBool::new(held),
            adds: AtomicUsize::new(0),
            releases: AtomicUsize::new(0),
        }
    }

    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DeletionGuard for FakeGuard {
    fn has_guard(&self, _service: &ExternalService) -> bool {
        self.is_held()
    }

    async fn add_guard(&self, _service: &ExternalService) -> anyhow::Result<()> {
        self.adds.fetch_add(1, Ordering::SeqCst);
        self.held.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn release_guard(&self, _service: &ExternalService) -> anyhow::Result<()> {
        self.releases.fetch_add(1, Ordering::SeqCst);
        self.held.store(false, Ordering::SeqCst);
        Ok(())
    }
}

/// ConfigMap/Secret/env values held in maps
#[derive(Debug, Default)]
pub struct FakeValues {
    pub env: HashMap<String, String>,
    pub config_maps: HashMap<(String, String), String>,
    pub secrets: HashMap<(String, String), Vec<u8>>,
}

#[async_trait]
impl ValueStore for FakeValues {
    fn env_value(&self, name: &str) -> Option<String> {
        self.env.get(name).cloned()
    }

    async fn config_map_value(
        &self,
        _namespace: &str,
        name: &str,
        key: &str,
    ) -> anyhow::Result<Option<String>> {
        Ok(self
            .config_maps
            .get(&(name.to_string(), key.to_string()))
            .cloned())
    }

    async fn secret_value(
        &self,
        _namespace: &str,
        name: &str,
        key: &str,
    ) -> anyhow::Result<Option<Vec<u8>>> {
        Ok(self.secrets.get(&(name.to_string(), key.to_string())).cloned())
    }
}

/// Everything one lifecycle test needs
#[derive(Debug)]
pub struct Harness {
    pub adapter: Arc<FakeAdapter>,
    pub registry: AdapterRegistry,
    pub values: FakeValues,
    pub status: FakeStatusWriter,
    pub guard: FakeGuard,
}

impl Harness {
    /// Harness whose object already carries the cleanup finalizer
    pub fn new() -> Self {
        let adapter = Arc::new(FakeAdapter::default());
        let registry = AdapterRegistry::new()
            .with_adapter("ServiceRelease", Arc::clone(&adapter) as Arc<dyn ExternalResourceAdapter>);
        Self {
            adapter,
            registry,
            values: FakeValues::default(),
            status: FakeStatusWriter::default(),
            guard: FakeGuard::new(true),
        }
    }

    pub async fn run(&self, service: &ExternalService) -> Result<Directive, ReconcilerError> {
        let cx = LifecycleContext {
            adapters: &self.registry,
            values: &self.values,
            status: &self.status,
            guard: &self.guard,
            pending_poll: PENDING_POLL,
            drift_check_interval: DRIFT_CHECK,
        };
        reconcile_service(service, &cx).await
    }

    /// Run once and fold the committed status back into the object
    pub async fn step(
        &self,
        service: &mut ExternalService,
    ) -> Result<Directive, ReconcilerError> {
        let before = self.status.commits().len();
        let result = self.run(service).await;
        if self.status.commits().len() > before {
            service.status = self.status.last();
        }
        result
    }
}

/// `ExternalService` named `orders-db` in `default` with the given params
pub fn service(params: Value, generation: i64) -> ExternalService {
    serde_json::from_value(json!({
        "apiVersion": "externalservice.octopilot.io/v1",
        "kind": "ExternalService",
        "metadata": {
            "name": "orders-db",
            "namespace": "default",
            "uid": "6f1c2d9e-0000-4000-8000-000000000001",
            "generation": generation,
            "finalizers": ["externalservice.octopilot.io/cleanup"]
        },
        "spec": {
            "serviceId": SERVICE_ID,
            "releaseId": RELEASE_ID,
            "params": params
        }
    }))
    .expect("fixture should deserialize")
}

/// Same object with a status record
pub fn with_status(mut service: ExternalService, status: Value) -> ExternalService {
    service.status = Some(serde_json::from_value(status).expect("status should deserialize"));
    service
}

/// Same object marked for deletion
pub fn deleting(service: ExternalService) -> ExternalService {
    let mut value = serde_json::to_value(&service).expect("fixture should serialize");
    value["metadata"]["deletionTimestamp"] = json!("2024-06-01T12:00:00Z");
    serde_json::from_value(value).expect("fixture should deserialize")
}
