//! # Parameter Resolution
//!
//! Turns the typed parameter sources of an `ExternalService` into the JSON
//! parameter bag sent to the provider.
//!
//! Failures split in two: a source that can never resolve as written
//! ([`ResolveError::Invalid`]) and a transient failure to read a referenced
//! object ([`ResolveError::Lookup`]). Only the first makes the resource Invalid.

use crate::crd::{KeyRef, ParamSource};
use crate::provider::Params;
use anyhow::Context;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use kube::{Api, Client};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("The value of param '{param}' is invalid: {reason}")]
    Invalid { param: String, reason: String },

    #[error("failed to read value of param '{param}': {source}")]
    Lookup {
        param: String,
        #[source]
        source: anyhow::Error,
    },
}

impl ResolveError {
    fn invalid(param: &str, reason: impl Into<String>) -> Self {
        ResolveError::Invalid {
            param: param.to_string(),
            reason: reason.into(),
        }
    }
}

/// Read access to the values parameters can reference
#[async_trait]
pub trait ValueStore: Send + Sync {
    /// Environment variable of the controller process
    fn env_value(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }

    /// Value of a ConfigMap key; `None` when the object or key does not exist
    async fn config_map_value(
        &self,
        namespace: &str,
        name: &str,
        key: &str,
    ) -> anyhow::Result<Option<String>>;

    /// Raw bytes of a Secret key; `None` when the object or key does not exist
    async fn secret_value(
        &self,
        namespace: &str,
        name: &str,
        key: &str,
    ) -> anyhow::Result<Option<Vec<u8>>>;
}

/// [`ValueStore`] backed by the Kubernetes API
#[derive(Clone)]
pub struct KubeValueStore {
    client: Client,
}

impl std::fmt::Debug for KubeValueStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeValueStore").finish_non_exhaustive()
    }
}

impl KubeValueStore {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ValueStore for KubeValueStore {
    async fn config_map_value(
        &self,
        namespace: &str,
        name: &str,
        key: &str,
    ) -> anyhow::Result<Option<String>> {
        let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), namespace);
        let config_map = api
            .get_opt(name)
            .await
            .with_context(|| format!("Failed to get ConfigMap {namespace}/{name}"))?;

        Ok(config_map.and_then(|cm| {
            cm.data
                .as_ref()
                .and_then(|data| data.get(key).cloned())
                .or_else(|| {
                    cm.binary_data
                        .as_ref()
                        .and_then(|data| data.get(key))
                        .and_then(|bytes| String::from_utf8(bytes.0.clone()).ok())
                })
        }))
    }

    async fn secret_value(
        &self,
        namespace: &str,
        name: &str,
        key: &str,
    ) -> anyhow::Result<Option<Vec<u8>>> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        let secret = api
            .get_opt(name)
            .await
            .with_context(|| format!("Failed to get Secret {namespace}/{name}"))?;

        Ok(secret.and_then(|s| {
            s.data
                .as_ref()
                .and_then(|data| data.get(key))
                .map(|bytes| bytes.0.clone())
                .or_else(|| {
                    s.string_data
                        .as_ref()
                        .and_then(|data| data.get(key))
                        .map(|value| value.clone().into_bytes())
                })
        }))
    }
}

/// Resolve every parameter of a resource in `namespace`
///
/// Parameters whose optional reference is missing, and YAML documents that
/// are an explicit `null`, are left out of the result.
///
/// # Errors
/// Returns the first parameter that failed, in name order
pub async fn resolve_params(
    params: &BTreeMap<String, ParamSource>,
    namespace: &str,
    store: &dyn ValueStore,
) -> Result<Params, ResolveError> {
    let mut resolved = Params::new();
    for (name, source) in params {
        if let Some(value) = resolve_param(name, source, namespace, store).await? {
            resolved.insert(name.clone(), value);
        }
    }
    Ok(resolved)
}

async fn resolve_param(
    name: &str,
    source: &ParamSource,
    namespace: &str,
    store: &dyn ValueStore,
) -> Result<Option<Value>, ResolveError> {
    let value_from = source.value_from.as_ref();
    let set = [
        source.int.is_some(),
        source.string.is_some(),
        source.yaml.is_some(),
        value_from.is_some_and(|v| v.env.is_some()),
        value_from.is_some_and(|v| v.config_map_key_ref.is_some()),
        value_from.is_some_and(|v| v.secret_key_ref.is_some()),
    ]
    .into_iter()
    .filter(|is_set| *is_set)
    .count();

    match set {
        0 => return Err(ResolveError::invalid(name, "no value source is set")),
        1 => {}
        _ => {
            return Err(ResolveError::invalid(
                name,
                "exactly one value source must be set",
            ))
        }
    }

    if let Some(int) = source.int {
        return Ok(Some(Value::from(int)));
    }
    if let Some(string) = &source.string {
        return Ok(Some(Value::String(string.clone())));
    }
    if let Some(document) = &source.yaml {
        return parse_yaml(name, document);
    }

    let Some(value_from) = value_from else {
        return Err(ResolveError::invalid(name, "no value source is set"));
    };

    if let Some(var) = &value_from.env {
        return store
            .env_value(var)
            .map(|value| Some(Value::String(value)))
            .ok_or_else(|| {
                ResolveError::invalid(name, format!("environment variable '{var}' is not set"))
            });
    }

    if let Some(key_ref) = &value_from.config_map_key_ref {
        let value = store
            .config_map_value(namespace, &key_ref.name, &key_ref.key)
            .await
            .map_err(|source| ResolveError::Lookup {
                param: name.to_string(),
                source,
            })?;
        return missing_or(name, key_ref, "ConfigMap", value.map(Value::String));
    }

    if let Some(key_ref) = &value_from.secret_key_ref {
        let bytes = store
            .secret_value(namespace, &key_ref.name, &key_ref.key)
            .await
            .map_err(|source| ResolveError::Lookup {
                param: name.to_string(),
                source,
            })?;
        let value = match bytes {
            Some(bytes) => Some(Value::String(String::from_utf8(bytes).map_err(|e| {
                ResolveError::invalid(
                    name,
                    format!(
                        "key '{}' of Secret '{}' is not valid UTF-8: {e}",
                        key_ref.key, key_ref.name
                    ),
                )
            })?)),
            None => None,
        };
        return missing_or(name, key_ref, "Secret", value);
    }

    Err(ResolveError::invalid(name, "no value source is set"))
}

fn parse_yaml(name: &str, document: &str) -> Result<Option<Value>, ResolveError> {
    let value: Value = serde_yaml::from_str(document)
        .map_err(|e| ResolveError::invalid(name, format!("invalid YAML: {e}")))?;
    Ok((!value.is_null()).then_some(value))
}

fn missing_or(
    name: &str,
    key_ref: &KeyRef,
    kind: &str,
    value: Option<Value>,
) -> Result<Option<Value>, ResolveError> {
    match value {
        Some(value) => Ok(Some(value)),
        None if key_ref.optional => Ok(None),
        None => Err(ResolveError::invalid(
            name,
            format!(
                "key '{}' not found in {kind} '{}'",
                key_ref.key, key_ref.name
            ),
        )),
    }
}
