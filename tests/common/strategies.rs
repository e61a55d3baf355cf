use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use std::collections::HashMap;

use prediction_executor::config::ClientConfig;
use prediction_executor::models::Task;

/// Strategy for generating project and model names
pub fn name_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9-]{0,31}"
}

/// Strategy for generating arbitrary tasks, including inverted ranges
pub fn task_strategy() -> impl Strategy<Value = Task> {
    (
        name_strategy(),
        name_strategy(),
        0i64..4_000_000_000,
        -86_400i64..86_400 * 30,
    )
        .prop_map(|(project, model, from_secs, span_secs)| {
            let from = Utc.timestamp_opt(from_secs, 0).unwrap();
            let to = Utc.timestamp_opt(from_secs + span_secs, 0).unwrap();
            Task::new(project, model, from, to)
        })
}

/// Strategy for generating client configurations over the fingerprinted fields
pub fn client_config_strategy() -> impl Strategy<Value = ClientConfig> {
    (
        prop_oneof![Just("https".to_string()), Just("http".to_string())],
        "[a-z]{1,12}\\.example\\.com",
        1u16..=u16::MAX,
        name_strategy(),
        prop::option::of(name_strategy()),
        prop_oneof![Just("v0".to_string()), Just("v1".to_string())],
        1u32..200_000,
        1u32..64,
        any::<bool>(),
        any::<bool>(),
        0u32..10,
    )
        .prop_map(
            |(
                scheme,
                host,
                port,
                project,
                target,
                server_version,
                batch_size,
                parallelism,
                forward_resampled_sensors,
                ignore_unhealthy_targets,
                n_retries,
            )| ClientConfig {
                scheme,
                host,
                port,
                project,
                target,
                server_version,
                metadata: HashMap::new(),
                batch_size,
                parallelism,
                forward_resampled_sensors,
                ignore_unhealthy_targets,
                n_retries,
                extra: HashMap::new(),
            },
        )
}

/// Strategy for generating unrelated configuration noise
pub fn noise_strategy() -> impl Strategy<Value = HashMap<String, serde_json::Value>> {
    prop::collection::hash_map(
        "[a-z_]{1,16}",
        prop_oneof![
            Just(serde_json::json!(null)),
            Just(serde_json::json!("value")),
            Just(serde_json::json!(42)),
            Just(serde_json::json!({"nested": [1, 2, 3]})),
        ],
        0..5,
    )
}
