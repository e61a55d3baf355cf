//! # Client Registry
//!
//! Process-wide cache of prediction clients. Two indexes point at the same
//! client instances:
//!
//! - by [`ClientKey`], so equivalent configurations share one client
//! - by project name, which is how the pipeline finds a client for a task
//!
//! Both indexes live behind a single lock, and client construction happens
//! inside it. Concurrent `get_or_create` calls with the same fingerprint
//! therefore observe exactly one construction. Entries are inserted into both
//! maps together and are never evicted or replaced.
//!
//! ## Usage
//!
//! ```rust
//! use prediction_executor::config::{AuthConfig, PredictorConfig, PredictorKind};
//! use prediction_executor::prediction::{ClientRegistry, MockClientFactory};
//! use std::sync::Arc;
//!
//! let registry = ClientRegistry::new(Arc::new(MockClientFactory::default()), AuthConfig::default());
//! let predictor = PredictorConfig::new(PredictorKind::Mock).with_projects(["wind-farm-1"]);
//! registry.allocate(&predictor).unwrap();
//! assert!(registry.lookup_by_project("wind-farm-1").is_ok());
//! ```

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

use super::{ClientFactory, ClientHandle};
use crate::config::{AuthConfig, ClientConfig, PredictorConfig};
use crate::error::{ExecutorError, Result};
use crate::logging::log_registry_operation;

const KEY_PREFIX: &str = "model-server";

/// Deterministic identity of a client configuration
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientKey(String);

impl ClientKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fingerprint a client configuration
///
/// Covers, in order: scheme, host, port, project, target, server_version,
/// batch_size, parallelism, forward_resampled_sensors,
/// ignore_unhealthy_targets, n_retries. Nothing else contributes, so
/// configurations that differ only in metadata or unrelated keys share a key.
pub fn fingerprint(config: &ClientConfig) -> ClientKey {
    let fields: [(&str, String); 11] = [
        ("scheme", config.scheme.clone()),
        ("host", config.host.clone()),
        ("port", config.port.to_string()),
        ("project", config.project.clone()),
        ("target", config.target.clone().unwrap_or_default()),
        ("server_version", config.server_version.clone()),
        ("batch_size", config.batch_size.to_string()),
        ("parallelism", config.parallelism.to_string()),
        (
            "forward_resampled_sensors",
            config.forward_resampled_sensors.to_string(),
        ),
        (
            "ignore_unhealthy_targets",
            config.ignore_unhealthy_targets.to_string(),
        ),
        ("n_retries", config.n_retries.to_string()),
    ];

    let mut key = String::from(KEY_PREFIX);
    for (name, value) in fields {
        key.push('|');
        key.push_str(name);
        key.push('=');
        key.push_str(&value);
    }
    ClientKey(key)
}

/// The only arguments a client factory ever sees
#[derive(Debug, Clone, PartialEq)]
pub struct ClientArgs {
    pub scheme: String,
    pub host: String,
    pub port: u16,
    pub project: String,
    pub target: Option<String>,
    pub server_version: String,
    pub metadata: HashMap<String, serde_json::Value>,
    pub batch_size: u32,
    pub parallelism: u32,
    pub forward_resampled_sensors: bool,
    pub ignore_unhealthy_targets: bool,
    pub n_retries: u32,
    /// Shared by every client the registry builds
    pub auth: AuthConfig,
}

impl ClientArgs {
    /// Copy the whitelisted fields; everything in `config.extra` is dropped
    pub fn from_config(config: &ClientConfig, auth: &AuthConfig) -> Self {
        Self {
            scheme: config.scheme.clone(),
            host: config.host.clone(),
            port: config.port,
            project: config.project.clone(),
            target: config.target.clone(),
            server_version: config.server_version.clone(),
            metadata: config.metadata.clone(),
            batch_size: config.batch_size,
            parallelism: config.parallelism,
            forward_resampled_sensors: config.forward_resampled_sensors,
            ignore_unhealthy_targets: config.ignore_unhealthy_targets,
            n_retries: config.n_retries,
            auth: auth.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RegistryStats {
    pub keys: usize,
    pub projects: usize,
    pub constructions: usize,
}

#[derive(Default)]
struct RegistryMaps {
    by_key: HashMap<ClientKey, ClientHandle>,
    by_project: HashMap<String, ClientHandle>,
}

pub struct ClientRegistry {
    factory: Arc<dyn ClientFactory>,
    auth: AuthConfig,
    maps: Mutex<RegistryMaps>,
    constructions: AtomicUsize,
}

impl fmt::Debug for ClientRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientRegistry")
            .field("stats", &self.stats())
            .finish()
    }
}

impl ClientRegistry {
    pub fn new(factory: Arc<dyn ClientFactory>, auth: AuthConfig) -> Self {
        Self {
            factory,
            auth,
            maps: Mutex::new(RegistryMaps::default()),
            constructions: AtomicUsize::new(0),
        }
    }

    /// Return the client for `config`, constructing it on first use, and
    /// make it reachable under `project`
    ///
    /// `project` must equal `config.project`. A project already bound to a
    /// client with a different fingerprint is rejected, never rebound.
    pub fn get_or_create(&self, project: &str, config: &ClientConfig) -> Result<ClientHandle> {
        if project != config.project {
            return Err(ExecutorError::invalid_input(
                "get_or_create",
                format!(
                    "project '{project}' does not match client configuration project '{}'",
                    config.project
                ),
            ));
        }

        let key = fingerprint(config);
        let mut maps = self.maps.lock();

        if let Some(client) = maps.by_key.get(&key) {
            debug!(project = %project, key = %key, "Reusing registered prediction client");
            return Ok(Arc::clone(client));
        }

        if maps.by_project.contains_key(project) {
            return Err(ExecutorError::invalid_input(
                "get_or_create",
                format!("project '{project}' is already bound to a different client configuration"),
            ));
        }

        let args = ClientArgs::from_config(config, &self.auth);
        let client = self.factory.create(&args)?;
        self.constructions.fetch_add(1, Ordering::Relaxed);

        maps.by_key.insert(key.clone(), Arc::clone(&client));
        maps.by_project
            .insert(project.to_string(), Arc::clone(&client));
        drop(maps);

        log_registry_operation(
            "create_client",
            Some(project),
            Some(key.as_str()),
            "created",
            None,
        );
        Ok(client)
    }

    /// Read-only lookup used on the task path
    pub fn lookup_by_project(&self, project: &str) -> Result<ClientHandle> {
        self.maps
            .lock()
            .by_project
            .get(project)
            .cloned()
            .ok_or_else(|| ExecutorError::client_not_found(project))
    }

    /// Eagerly build a client for every configured project
    pub fn allocate(&self, predictor: &PredictorConfig) -> Result<()> {
        for project in &predictor.projects {
            let config = predictor.client_config(project);
            self.get_or_create(project, &config)?;
        }

        let stats = self.stats();
        info!(
            projects = stats.projects,
            clients = stats.keys,
            "✅ Prediction clients allocated"
        );
        Ok(())
    }

    pub fn stats(&self) -> RegistryStats {
        let maps = self.maps.lock();
        RegistryStats {
            keys: maps.by_key.len(),
            projects: maps.by_project.len(),
            constructions: self.constructions.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PredictorKind;
    use crate::prediction::MockClientFactory;

    fn base_config(project: &str) -> ClientConfig {
        PredictorConfig::new(PredictorKind::ModelServer)
            .with_host("models.example.com")
            .client_config(project)
    }

    fn registry() -> ClientRegistry {
        ClientRegistry::new(Arc::new(MockClientFactory::default()), AuthConfig::default())
    }

    #[test]
    fn test_fingerprint_format() {
        let key = fingerprint(&base_config("wind-farm-1"));
        assert_eq!(
            key.as_str(),
            "model-server|scheme=https|host=models.example.com|port=443|project=wind-farm-1\
             |target=|server_version=v0|batch_size=100000|parallelism=10\
             |forward_resampled_sensors=false|ignore_unhealthy_targets=false|n_retries=5"
        );
    }

    #[test]
    fn test_fingerprint_ignores_non_identity_fields() {
        let a = base_config("p");
        let mut b = base_config("p");
        b.metadata
            .insert("owner".to_string(), serde_json::json!("ops"));
        b.extra
            .insert("dashboard".to_string(), serde_json::json!(true));
        assert_eq!(fingerprint(&a), fingerprint(&b));

        let mut c = base_config("p");
        c.host = "other.example.com".to_string();
        assert_ne!(fingerprint(&a), fingerprint(&c));

        let mut d = base_config("p");
        d.n_retries = 1;
        assert_ne!(fingerprint(&a), fingerprint(&d));
    }

    #[test]
    fn test_client_args_whitelist() {
        let mut config = base_config("p");
        config
            .extra
            .insert("unrelated".to_string(), serde_json::json!("value"));
        config
            .metadata
            .insert("owner".to_string(), serde_json::json!("ops"));

        let args = ClientArgs::from_config(&config, &AuthConfig::default());
        assert_eq!(args.project, "p");
        assert_eq!(args.host, "models.example.com");
        assert_eq!(args.metadata.get("owner"), Some(&serde_json::json!("ops")));
    }

    #[test]
    fn test_get_or_create_reuses_client() {
        let registry = registry();
        let first = registry.get_or_create("p", &base_config("p")).unwrap();
        let second = registry.get_or_create("p", &base_config("p")).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.stats().constructions, 1);
    }

    #[test]
    fn test_mismatched_project_is_rejected() {
        let registry = registry();
        let result = registry.get_or_create("solar-park-3", &base_config("wind-farm-1"));
        assert!(matches!(
            result,
            Err(ExecutorError::InvalidInput { ref stage, .. }) if stage == "get_or_create"
        ));

        let stats = registry.stats();
        assert_eq!((stats.keys, stats.projects, stats.constructions), (0, 0, 0));
    }

    #[test]
    fn test_project_binding_is_never_replaced() {
        let registry = registry();
        let first = registry
            .get_or_create("solar-park-3", &base_config("solar-park-3"))
            .unwrap();

        let mut moved = base_config("solar-park-3");
        moved.host = "other.example.com".to_string();
        assert!(matches!(
            registry.get_or_create("solar-park-3", &moved),
            Err(ExecutorError::InvalidInput { .. })
        ));

        let bound = registry.lookup_by_project("solar-park-3").unwrap();
        assert!(Arc::ptr_eq(&first, &bound));
        let stats = registry.stats();
        assert_eq!((stats.keys, stats.projects, stats.constructions), (1, 1, 1));
    }

    #[test]
    fn test_lookup_unknown_project() {
        let registry = registry();
        assert!(matches!(
            registry.lookup_by_project("nope"),
            Err(ExecutorError::ClientNotFound { ref project }) if project == "nope"
        ));
    }

    #[test]
    fn test_allocate_registers_every_project() {
        let registry = registry();
        let predictor = PredictorConfig::new(PredictorKind::Mock)
            .with_host("models.example.com")
            .with_projects(["a", "b", "c"]);
        registry.allocate(&predictor).unwrap();

        let stats = registry.stats();
        assert_eq!(stats.projects, 3);
        assert_eq!(stats.keys, 3);
        for project in ["a", "b", "c"] {
            assert_eq!(registry.lookup_by_project(project).unwrap().project(), project);
        }

        // Re-allocation constructs nothing new
        registry.allocate(&predictor).unwrap();
        assert_eq!(registry.stats().constructions, 3);
    }
}
