use std::sync::Arc;
use std::time::Duration;

use garde::Validate;
use reqwest::header::AUTHORIZATION;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, Response, StatusCode};
use serde_json::Value;

use crate::config::ClientConfig;
use crate::models::job::Job;
use crate::models::request::{RequestOptions, IMAGE_PARAM, REMOTE_IMAGE_URL_PARAM};
use crate::services::auth::{AuthError, Authorizer};
use crate::services::clock::{Clock, TokioClock};
use crate::services::poll::Poller;

const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Register descriptions for the metrics emitted by the client.
pub fn describe_metrics() {
    metrics::describe_counter!(
        "classification_requests_total",
        "Images submitted to CloudSight, labelled by source (content or url)"
    );
    metrics::describe_counter!(
        "classification_polls_total",
        "Status checks issued against CloudSight"
    );
    metrics::describe_counter!(
        "classification_service_errors_total",
        "CloudSight responses carrying an error field"
    );
    metrics::describe_histogram!(
        "classification_wait_seconds",
        "Time spent waiting for a job to leave `not completed`"
    );
}

/// Client for the CloudSight image request/response API.
pub struct ClassificationClient {
    http: Client,
    config: ClientConfig,
    auth: Box<dyn Authorizer>,
    clock: Arc<dyn Clock>,
}

impl ClassificationClient {
    pub fn new(config: ClientConfig, auth: Box<dyn Authorizer>) -> Result<Self, ClientError> {
        Self::with_clock(config, auth, Arc::new(TokioClock))
    }

    /// Same as [`ClassificationClient::new`] with a custom time source for `wait`.
    pub fn with_clock(
        config: ClientConfig,
        auth: Box<dyn Authorizer>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ClientError> {
        config
            .validate()
            .map_err(|report| ClientError::InvalidConfig(report.to_string()))?;

        let http = Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            http,
            config,
            auth,
            clock,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Upload image bytes for classification.
    ///
    /// Returns immediately with the new job, normally still `not completed`.
    /// Use [`ClassificationClient::poll`] or [`ClassificationClient::wait`]
    /// to follow it.
    pub async fn submit_by_content(
        &self,
        content: Vec<u8>,
        filename: &str,
        options: &RequestOptions,
    ) -> Result<Job, ClientError> {
        let url = self.config.requests_url();
        let content_type = content_type(&content);

        let mut form = Form::new();
        for (name, value) in options.to_form(&self.config.locale) {
            form = form.text(name, value);
        }
        let image = Part::bytes(content)
            .file_name(filename.to_string())
            .mime_str(content_type)?;
        form = form.part(IMAGE_PARAM, image);

        // Only caller-chosen fields are signed; the default locale and the
        // file part are not.
        let signed = (!options.is_empty()).then(|| options.params());
        let authorization = self.auth.authorize(&Method::POST, &url, signed)?;

        tracing::debug!(url = %url, filename, content_type, "Uploading image to CloudSight");

        let response = self
            .http
            .post(&url)
            .header(AUTHORIZATION, authorization)
            .multipart(form)
            .send()
            .await?;

        let job = read_job(response).await?;
        metrics::counter!("classification_requests_total", "source" => "content").increment(1);
        tracing::info!(token = %job.token, status = %job.status, "Image submitted for classification");
        Ok(job)
    }

    /// Ask CloudSight to fetch and classify the image at `image_url`.
    pub async fn submit_by_url(
        &self,
        image_url: &str,
        options: &RequestOptions,
    ) -> Result<Job, ClientError> {
        let url = self.config.requests_url();

        let mut form = options.to_form(&self.config.locale);
        form.insert(REMOTE_IMAGE_URL_PARAM.to_string(), image_url.to_string());

        let authorization = self.auth.authorize(&Method::POST, &url, Some(&form))?;

        tracing::debug!(url = %url, image_url, "Submitting remote image to CloudSight");

        let response = self
            .http
            .post(&url)
            .header(AUTHORIZATION, authorization)
            .form(&form)
            .send()
            .await?;

        let job = read_job(response).await?;
        metrics::counter!("classification_requests_total", "source" => "url").increment(1);
        tracing::info!(token = %job.token, status = %job.status, "Remote image submitted for classification");
        Ok(job)
    }

    /// Fetch the current state of a job once.
    pub async fn poll(&self, token: &str) -> Result<Job, ClientError> {
        let url = self.config.responses_url(token);
        let authorization = self.auth.authorize(&Method::GET, &url, None)?;

        let response = self
            .http
            .get(&url)
            .header(AUTHORIZATION, authorization)
            .send()
            .await?;

        metrics::counter!("classification_polls_total").increment(1);

        let mut job = read_job(response).await?;
        if job.token.is_empty() {
            job.token = token.to_string();
        }

        tracing::debug!(token, status = %job.status, "Polled CloudSight job");
        Ok(job)
    }

    /// Restart processing of a job that ended in `timeout`.
    pub async fn repost(&self, token: &str) -> Result<(), ClientError> {
        let url = self.config.repost_url(token);
        let authorization = self.auth.authorize(&Method::POST, &url, None)?;

        let response = self
            .http
            .post(&url)
            .header(AUTHORIZATION, authorization)
            .send()
            .await?;

        if response.status() == StatusCode::OK {
            tracing::info!(token, "Job reposted");
            return Ok(());
        }

        read_body(response).await?;
        Ok(())
    }

    /// Poll until the job leaves `not completed` or `timeout` has passed.
    ///
    /// Sleeps the initial delay (capped by `timeout`), then polls every
    /// interval. The last observed job is returned even when it is still
    /// `not completed`; running out of time is not an error.
    pub async fn wait(&self, token: &str, timeout: Duration) -> Result<Job, ClientError> {
        let started = self.clock.now();
        let mut poller = Poller::new(self.config.schedule.with_timeout(timeout), started);

        self.clock.sleep(poller.initial_delay()).await;
        let mut job = self.poll(token).await?;

        while let Some(delay) = poller.observe(&job, self.clock.now()) {
            self.clock.sleep(delay).await;
            job = self.poll(token).await?;
        }

        let waited = self.clock.now().saturating_duration_since(started);
        metrics::histogram!("classification_wait_seconds").record(waited.as_secs_f64());

        tracing::info!(
            token,
            status = %job.status,
            phase = %poller.phase(),
            polls = poller.polls(),
            waited_ms = u64::try_from(waited.as_millis()).unwrap_or(u64::MAX),
            "Finished waiting for job"
        );

        Ok(job)
    }

    /// [`ClassificationClient::wait`] with the configured poll timeout.
    pub async fn wait_for_result(&self, token: &str) -> Result<Job, ClientError> {
        self.wait(token, self.config.schedule.timeout).await
    }
}

async fn read_job(response: Response) -> Result<Job, ClientError> {
    let body = read_body(response).await?;
    Ok(serde_json::from_value(body)?)
}

/// Parse a JSON body, turning an `error` field into [`ClientError::Service`].
async fn read_body(response: Response) -> Result<Value, ClientError> {
    let text = response.text().await?;
    let body: Value = serde_json::from_str(&text)?;
    unwrap_error(body)
}

fn unwrap_error(body: Value) -> Result<Value, ClientError> {
    let message = match body.get("error") {
        None => None,
        Some(Value::String(message)) => Some(message.clone()),
        Some(other) => Some(other.to_string()),
    };
    let Some(message) = message else {
        return Ok(body);
    };

    metrics::counter!("classification_service_errors_total").increment(1);
    tracing::warn!(error = %message, "CloudSight returned an error");
    Err(ClientError::Service(message))
}

fn content_type(content: &[u8]) -> &'static str {
    image::guess_format(content)
        .map(|format| format.to_mime_type())
        .unwrap_or(FALLBACK_CONTENT_TYPE)
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("CloudSight API error: {0}")]
    Service(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Failed to parse CloudSight response: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Failed to authorize request: {0}")]
    Auth(#[from] AuthError),

    #[error("Invalid client configuration: {0}")]
    InvalidConfig(String),
}

impl ClientError {
    pub fn is_service_error(&self) -> bool {
        matches!(self, ClientError::Service(_))
    }

    /// Message reported by CloudSight, if this is a service error.
    pub fn service_message(&self) -> Option<&str> {
        match self {
            ClientError::Service(message) => Some(message.as_str()),
            _ => None,
        }
    }
}
