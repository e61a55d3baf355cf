//! Client registry identity and concurrency properties.

mod common;

use common::*;
use proptest::prelude::*;
use std::sync::Arc;
use std::time::Duration;

use prediction_executor::config::{AuthConfig, PredictorConfig, PredictorKind};
use prediction_executor::prediction::{fingerprint, ClientArgs, ClientRegistry};

proptest! {
    /// Property: configurations agreeing on the fingerprinted fields share a key
    #[test]
    fn fingerprint_ignores_unrelated_fields(
        config in client_config_strategy(),
        metadata in noise_strategy(),
        extra in noise_strategy(),
    ) {
        let mut noisy = config.clone();
        noisy.metadata = metadata;
        noisy.extra = extra;
        prop_assert_eq!(fingerprint(&config), fingerprint(&noisy));
    }

    /// Property: fingerprinting is a pure function of its input
    #[test]
    fn fingerprint_is_deterministic(config in client_config_strategy()) {
        prop_assert_eq!(fingerprint(&config), fingerprint(&config.clone()));
    }

    /// Property: changing any identity field changes the key
    #[test]
    fn fingerprint_separates_hosts(config in client_config_strategy()) {
        let mut other = config.clone();
        other.host = format!("other-{}", config.host);
        prop_assert_ne!(fingerprint(&config), fingerprint(&other));
    }
}

#[test]
fn test_extra_fields_never_reach_the_factory() {
    let factory = Arc::new(CountingFactory::default());
    let registry = ClientRegistry::new(factory.clone(), AuthConfig::default());

    let mut predictor = PredictorConfig::new(PredictorKind::ModelServer)
        .with_host("models.example.com")
        .with_projects(["wind-farm-1"]);
    predictor
        .extra
        .insert("prediction_forwarder".to_string(), serde_json::json!({"url": "x"}));
    registry.allocate(&predictor).unwrap();

    let seen = factory.seen.lock();
    assert_eq!(seen.len(), 1);
    let expected = ClientArgs::from_config(
        &predictor.client_config("wind-farm-1"),
        &AuthConfig::default(),
    );
    assert_eq!(seen[0], expected);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_get_or_create_constructs_once() {
    let factory = Arc::new(CountingFactory::slow(Duration::from_millis(20)));
    let registry = Arc::new(ClientRegistry::new(factory.clone(), AuthConfig::default()));
    let config = PredictorConfig::new(PredictorKind::ModelServer)
        .with_host("models.example.com")
        .client_config("wind-farm-1");

    let callers: Vec<_> = (0..32)
        .map(|_| {
            let registry = Arc::clone(&registry);
            let config = config.clone();
            tokio::task::spawn_blocking(move || registry.get_or_create("wind-farm-1", &config))
        })
        .collect();

    let mut handles = Vec::new();
    for caller in callers {
        handles.push(caller.await.unwrap().unwrap());
    }

    assert_eq!(factory.count(), 1);
    assert!(handles.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));

    let stats = registry.stats();
    assert_eq!(stats.keys, 1);
    assert_eq!(stats.projects, 1);
    assert_eq!(stats.constructions, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_distinct_projects_each_construct_once() {
    let factory = Arc::new(CountingFactory::slow(Duration::from_millis(5)));
    let registry = Arc::new(ClientRegistry::new(factory.clone(), AuthConfig::default()));
    let predictor = PredictorConfig::new(PredictorKind::ModelServer).with_host("models.example.com");

    let callers: Vec<_> = (0..40)
        .map(|i| {
            let registry = Arc::clone(&registry);
            let project = format!("project-{}", i % 4);
            let config = predictor.client_config(&project);
            tokio::task::spawn_blocking(move || registry.get_or_create(&project, &config))
        })
        .collect();

    for caller in callers {
        caller.await.unwrap().unwrap();
    }

    assert_eq!(factory.count(), 4);
    for i in 0..4 {
        let client = registry.lookup_by_project(&format!("project-{i}")).unwrap();
        assert_eq!(client.project(), format!("project-{i}"));
    }
}

#[test]
fn test_project_keeps_its_first_client() {
    let factory = Arc::new(CountingFactory::default());
    let registry = ClientRegistry::new(factory.clone(), AuthConfig::default());
    let predictor = PredictorConfig::new(PredictorKind::ModelServer).with_host("models.example.com");

    let solar = registry
        .get_or_create("solar-park-3", &predictor.client_config("solar-park-3"))
        .unwrap();

    // Another project's configuration cannot be bound under this name
    let err = registry
        .get_or_create("solar-park-3", &predictor.client_config("wind-farm-1"))
        .unwrap_err();
    assert_eq!(err.kind(), "invalid_input");

    let bound = registry.lookup_by_project("solar-park-3").unwrap();
    assert!(Arc::ptr_eq(&solar, &bound));
    assert_eq!(bound.project(), "solar-park-3");
    assert_eq!(factory.count(), 1);

    let stats = registry.stats();
    assert_eq!(stats.keys, 1);
    assert_eq!(stats.projects, 1);
    assert_eq!(stats.constructions, 1);

    let metadata = tokio_test::block_on(bound.get_metadata()).unwrap();
    assert!(metadata.contains_key("model-a"));
}
