//! # Model Server Client
//!
//! HTTP client for a model server exposing, per project:
//!
//! - `GET  {base}/models`: model listing with metadata
//! - `POST {base}/{model}/anomaly/prediction?format=json`: predictions for a
//!   `{"start", "end"}` window
//!
//! where `base` is `{scheme}://{host}:{port}/gordo/{server_version}/{project}`.
//! A task range longer than `batch_size` minutes is requested in consecutive
//! windows and the rows are concatenated per model.
//! All clients built by one [`ModelServerClientFactory`] share a single HTTP
//! session, created from the first client's auth settings.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use futures::stream::{self, StreamExt, TryStreamExt};
use parking_lot::Mutex;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::registry::ClientArgs;
use super::{ClientFactory, ClientHandle, PredictionClient};
use crate::config::AuthConfig;
use crate::error::{ExecutorError, Result};
use crate::models::PredictionSeries;

const COLLABORATOR: &str = "model_server";
const MAX_RETRY_DELAY_MS: u64 = 5_000;
const RESAMPLED_INPUT_PREFIX: &str = "model-input";

#[derive(Debug, Serialize)]
struct PredictionRequest {
    start: String,
    end: String,
}

impl PredictionRequest {
    fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start: start.to_rfc3339(),
            end: end.to_rfc3339(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct PredictionResponse {
    data: Vec<Vec<f64>>,
    #[serde(default)]
    columns: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ModelListing {
    Detailed(HashMap<String, serde_json::Value>),
    Names(Vec<String>),
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    models: ModelListing,
}

#[derive(Debug, Clone)]
pub struct ModelServerClient {
    http: Client,
    base_url: Url,
    project: String,
    target: Option<String>,
    batch_window: ChronoDuration,
    parallelism: usize,
    forward_resampled_sensors: bool,
    ignore_unhealthy_targets: bool,
    n_retries: u32,
}

impl ModelServerClient {
    pub fn new(http: Client, args: &ClientArgs) -> Result<Self> {
        let base_url = Self::base_url(args)?;
        info!(
            project = %args.project,
            base_url = %base_url,
            target = ?args.target,
            batch_size = args.batch_size,
            "Created model server client"
        );
        Ok(Self {
            http,
            base_url,
            project: args.project.clone(),
            target: args.target.clone(),
            batch_window: ChronoDuration::minutes(i64::from(args.batch_size.max(1))),
            parallelism: args.parallelism.max(1) as usize,
            forward_resampled_sensors: args.forward_resampled_sensors,
            ignore_unhealthy_targets: args.ignore_unhealthy_targets,
            n_retries: args.n_retries,
        })
    }

    /// Trailing slash matters: `Url::join` replaces the last segment otherwise
    fn base_url(args: &ClientArgs) -> Result<Url> {
        let raw = format!(
            "{}://{}:{}/gordo/{}/{}/",
            args.scheme, args.host, args.port, args.server_version, args.project
        );
        Url::parse(&raw).map_err(|e| {
            ExecutorError::collaborator(COLLABORATOR, "build_url", format!("Invalid base URL: {e}"))
        })
    }

    pub fn base(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url.join(path).map_err(|e| {
            ExecutorError::collaborator(
                COLLABORATOR,
                "build_url",
                format!("Failed to construct URL for '{path}': {e}"),
            )
        })
    }

    /// Split `[from, to)` into request windows of at most `batch_window`
    ///
    /// An empty or inverted range is sent as a single request.
    fn request_windows(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Vec<PredictionRequest> {
        if from >= to {
            return vec![PredictionRequest::new(from, to)];
        }
        let mut windows = Vec::new();
        let mut start = from;
        while start < to {
            let end = start
                .checked_add_signed(self.batch_window)
                .map_or(to, |end| end.min(to));
            windows.push(PredictionRequest::new(start, end));
            start = end;
        }
        windows
    }

    /// Drop resampled input columns unless they are forwarded
    fn select_columns(&self, series: PredictionSeries) -> PredictionSeries {
        if self.forward_resampled_sensors {
            return series;
        }
        let keep: Vec<usize> = series
            .column_labels
            .iter()
            .enumerate()
            .filter(|(_, label)| !label.starts_with(RESAMPLED_INPUT_PREFIX))
            .map(|(i, _)| i)
            .collect();
        if keep.len() == series.column_labels.len() {
            return series;
        }

        let table = series
            .table
            .iter()
            .map(|row| keep.iter().filter_map(|&i| row.get(i).copied()).collect())
            .collect();
        let labels = keep
            .iter()
            .map(|&i| series.column_labels[i].clone())
            .collect();
        PredictionSeries::new(series.series_name, table, labels)
    }

    async fn predict_windows(
        &self,
        model: &str,
        windows: &[PredictionRequest],
    ) -> Result<PredictionSeries> {
        let mut combined: Option<PredictionSeries> = None;
        for request in windows {
            let series = self.predict_model(model, request).await?;
            match combined.as_mut() {
                Some(acc) => acc.table.extend(series.table),
                None => combined = Some(series),
            }
        }
        let series = combined.unwrap_or_else(|| PredictionSeries::new(model, Vec::new(), Vec::new()));
        Ok(self.select_columns(series))
    }

    fn retry_delay(attempt: u32) -> Duration {
        Duration::from_millis((100u64 << attempt.min(6)).min(MAX_RETRY_DELAY_MS))
    }

    async fn predict_model(
        &self,
        model: &str,
        request: &PredictionRequest,
    ) -> Result<PredictionSeries> {
        let mut url = self.endpoint(&format!("{model}/anomaly/prediction"))?;
        url.set_query(Some("format=json"));

        debug!(project = %self.project, model = %model, url = %url, "Requesting prediction");

        let mut attempt = 0;
        loop {
            let failure = match self.http.post(url.clone()).json(request).send().await {
                Ok(resp) if resp.status().is_success() => {
                    let body = resp.json::<PredictionResponse>().await.map_err(|e| {
                        ExecutorError::collaborator(
                            COLLABORATOR,
                            "predict",
                            format!("Invalid prediction response for {model}: {e}"),
                        )
                    })?;
                    return Ok(PredictionSeries::new(model, body.data, body.columns));
                }
                Ok(resp) => {
                    let status = resp.status();
                    let text = resp
                        .text()
                        .await
                        .unwrap_or_else(|_| "Unknown error".to_string());
                    // Client errors are not retried
                    if status.is_client_error() {
                        return Err(ExecutorError::collaborator(
                            COLLABORATOR,
                            "predict",
                            format!("HTTP {status} for {model}: {text}"),
                        ));
                    }
                    format!("HTTP {status}: {text}")
                }
                Err(e) => e.to_string(),
            };

            if attempt >= self.n_retries {
                error!(
                    project = %self.project,
                    model = %model,
                    attempts = attempt + 1,
                    error = %failure,
                    "Exhausted retries for prediction request"
                );
                return Err(ExecutorError::collaborator(
                    COLLABORATOR,
                    "predict",
                    format!("{model}: {failure}"),
                ));
            }

            warn!(
                project = %self.project,
                model = %model,
                retry = attempt + 1,
                max_retries = self.n_retries,
                error = %failure,
                "Prediction request failed, will retry"
            );
            tokio::time::sleep(Self::retry_delay(attempt)).await;
            attempt += 1;
        }
    }

    async fn target_models(&self) -> Result<Vec<String>> {
        if let Some(target) = &self.target {
            return Ok(vec![target.clone()]);
        }
        let mut models: Vec<String> = self.get_metadata().await?.into_keys().collect();
        models.sort();
        Ok(models)
    }
}

#[async_trait]
impl PredictionClient for ModelServerClient {
    fn project(&self) -> &str {
        &self.project
    }

    async fn predict(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<PredictionSeries>> {
        let windows = self.request_windows(from, to);
        let models = self.target_models().await?;
        debug!(
            project = %self.project,
            models = models.len(),
            windows = windows.len(),
            "Requesting predictions"
        );

        let results: Vec<Option<PredictionSeries>> = stream::iter(models)
            .map(|model| {
                let windows = &windows;
                async move {
                    match self.predict_windows(&model, windows).await {
                        Ok(series) => Ok(Some(series)),
                        Err(e) if self.ignore_unhealthy_targets => {
                            warn!(
                                project = %self.project,
                                model = %model,
                                error = %e,
                                "Skipping unhealthy target"
                            );
                            Ok(None)
                        }
                        Err(e) => Err(e),
                    }
                }
            })
            .buffered(self.parallelism)
            .try_collect()
            .await?;

        Ok(results.into_iter().flatten().collect())
    }

    async fn get_metadata(&self) -> Result<HashMap<String, serde_json::Value>> {
        let url = self.endpoint("models")?;
        let failed = |e: String| ExecutorError::collaborator(COLLABORATOR, "get_metadata", e);

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| failed(format!("Failed to send request: {e}")))?;

        if !response.status().is_success() {
            return Err(failed(format!("HTTP {}", response.status())));
        }

        let body = response
            .json::<ModelsResponse>()
            .await
            .map_err(|e| failed(format!("Failed to parse model listing: {e}")))?;

        Ok(match body.models {
            ModelListing::Detailed(models) => models,
            ModelListing::Names(names) => names
                .into_iter()
                .map(|name| (name, serde_json::Value::Object(Default::default())))
                .collect(),
        })
    }
}

/// Builds [`ModelServerClient`]s sharing one HTTP session
#[derive(Default)]
pub struct ModelServerClientFactory {
    session: Mutex<Option<Client>>,
}

impl ModelServerClientFactory {
    pub fn new() -> Self {
        Self::default()
    }

    fn session(&self, auth: &AuthConfig) -> Result<Client> {
        let mut session = self.session.lock();
        if let Some(client) = session.as_ref() {
            return Ok(client.clone());
        }

        let client = Self::build_session(auth)?;
        *session = Some(client.clone());
        Ok(client)
    }

    fn build_session(auth: &AuthConfig) -> Result<Client> {
        let mut builder = Client::builder()
            .timeout(auth.request_timeout())
            .user_agent(format!("prediction-executor/{}", env!("CARGO_PKG_VERSION")));

        if let Some(token) = &auth.bearer_token {
            let mut default_headers = reqwest::header::HeaderMap::new();
            default_headers.insert(
                reqwest::header::AUTHORIZATION,
                format!("Bearer {token}").parse().map_err(|e| {
                    ExecutorError::collaborator(
                        COLLABORATOR,
                        "create_session",
                        format!("Invalid auth token: {e}"),
                    )
                })?,
            );
            builder = builder.default_headers(default_headers);
        }

        builder.build().map_err(|e| {
            ExecutorError::collaborator(
                COLLABORATOR,
                "create_session",
                format!("Failed to create HTTP client: {e}"),
            )
        })
    }
}

impl ClientFactory for ModelServerClientFactory {
    fn create(&self, args: &ClientArgs) -> Result<ClientHandle> {
        let http = self.session(&args.auth)?;
        Ok(Arc::new(ModelServerClient::new(http, args)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PredictorConfig, PredictorKind};

    fn args(project: &str) -> ClientArgs {
        let config = PredictorConfig::new(PredictorKind::ModelServer)
            .with_host("models.example.com")
            .client_config(project);
        ClientArgs::from_config(&config, &AuthConfig::default())
    }

    fn client(args: &ClientArgs) -> ModelServerClient {
        let http = ModelServerClientFactory::build_session(&AuthConfig::default()).unwrap();
        ModelServerClient::new(http, args).unwrap()
    }

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        use chrono::TimeZone;
        Utc.with_ymd_and_hms(2024, 3, 1, hour, minute, 0).unwrap()
    }

    #[test]
    fn test_base_url_layout() {
        let factory = ModelServerClientFactory::new();
        let http = factory.session(&AuthConfig::default()).unwrap();
        let client = ModelServerClient::new(http, &args("wind-farm-1")).unwrap();

        assert_eq!(
            client.base().as_str(),
            "https://models.example.com/gordo/v0/wind-farm-1/"
        );
        let mut prediction = client.endpoint("turbine-7/anomaly/prediction").unwrap();
        prediction.set_query(Some("format=json"));
        assert_eq!(
            prediction.as_str(),
            "https://models.example.com/gordo/v0/wind-farm-1/turbine-7/anomaly/prediction?format=json"
        );
        assert_eq!(
            client.endpoint("models").unwrap().as_str(),
            "https://models.example.com/gordo/v0/wind-farm-1/models"
        );
    }

    #[test]
    fn test_session_is_shared() {
        let factory = ModelServerClientFactory::new();
        factory.create(&args("a")).unwrap();
        factory.create(&args("b")).unwrap();
        assert!(factory.session.lock().is_some());
    }

    #[test]
    fn test_invalid_token_is_rejected() {
        let auth = AuthConfig {
            bearer_token: Some("bad\ntoken".to_string()),
            ..AuthConfig::default()
        };
        assert!(ModelServerClientFactory::build_session(&auth).is_err());
    }

    #[test]
    fn test_model_listing_shapes() {
        let detailed: ModelsResponse =
            serde_json::from_str(r#"{"models": {"m1": {"healthy": true}}}"#).unwrap();
        assert!(matches!(detailed.models, ModelListing::Detailed(ref m) if m.contains_key("m1")));

        let names: ModelsResponse = serde_json::from_str(r#"{"models": ["m1", "m2"]}"#).unwrap();
        assert!(matches!(names.models, ModelListing::Names(ref n) if n.len() == 2));
    }

    #[test]
    fn test_retry_delay_is_capped() {
        assert_eq!(ModelServerClient::retry_delay(0), Duration::from_millis(100));
        assert_eq!(ModelServerClient::retry_delay(3), Duration::from_millis(800));
        assert_eq!(
            ModelServerClient::retry_delay(30),
            Duration::from_millis(MAX_RETRY_DELAY_MS)
        );
    }

    #[test]
    fn test_batch_size_splits_request_windows() {
        let mut small = args("wind-farm-1");
        small.batch_size = 30;
        let windows = client(&small).request_windows(at(10, 0), at(11, 10));

        let bounds: Vec<(&str, &str)> = windows
            .iter()
            .map(|w| (w.start.as_str(), w.end.as_str()))
            .collect();
        assert_eq!(
            bounds,
            vec![
                ("2024-03-01T10:00:00+00:00", "2024-03-01T10:30:00+00:00"),
                ("2024-03-01T10:30:00+00:00", "2024-03-01T11:00:00+00:00"),
                ("2024-03-01T11:00:00+00:00", "2024-03-01T11:10:00+00:00"),
            ]
        );

        // Default batch size covers the range in one request
        assert_eq!(client(&args("wind-farm-1")).request_windows(at(10, 0), at(11, 10)).len(), 1);
    }

    #[test]
    fn test_inverted_range_is_one_request() {
        let windows = client(&args("wind-farm-1")).request_windows(at(11, 0), at(10, 0));
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].start, "2024-03-01T11:00:00+00:00");
    }

    #[test]
    fn test_resampled_inputs_dropped_unless_forwarded() {
        let series = || {
            PredictionSeries::new(
                "turbine-7",
                vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]],
                vec![
                    "model-input|tag-1".to_string(),
                    "model-output|tag-1".to_string(),
                    "total-anomaly-scaled".to_string(),
                ],
            )
        };

        let trimmed = client(&args("wind-farm-1")).select_columns(series());
        assert_eq!(
            trimmed.column_labels,
            vec!["model-output|tag-1".to_string(), "total-anomaly-scaled".to_string()]
        );
        assert_eq!(trimmed.table, vec![vec![2.0, 3.0], vec![5.0, 6.0]]);

        let mut forwarding = args("wind-farm-1");
        forwarding.forward_resampled_sensors = true;
        assert_eq!(client(&forwarding).select_columns(series()), series());
    }
}
