//! Read-only client for the portfolio backend: project and experience listings
//! used to ground completion prompts.

use async_trait::async_trait;
use log::{ debug, info, warn };
use reqwest::Client as HttpClient;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::cli::Args;
use crate::models::portfolio::{ Experience, Project };

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("invalid backend URL '{0}': {1}")]
    InvalidUrl(String, url::ParseError),
    #[error("request to {0} failed: {1}")]
    Request(String, #[source] reqwest::Error),
    #[error("{0} returned status {1}")]
    Status(String, reqwest::StatusCode),
    #[error("unexpected payload from {0}: {1}")]
    Payload(String, String),
}

#[async_trait]
pub trait PortfolioBackend: Send + Sync {
    async fn fetch_projects(&self) -> Result<Vec<Project>, BackendError>;
    async fn fetch_experiences(&self) -> Result<Vec<Experience>, BackendError>;
}

/// Live portfolio data injected into the completion prompt for a single request.
#[derive(Debug, Clone, Default)]
pub struct GroundingContext {
    pub projects: Vec<Project>,
    pub experiences: Vec<Experience>,
    pub from_backend: bool,
}

pub struct HttpPortfolioBackend {
    http: HttpClient,
    projects_url: Url,
    experiences_url: Url,
}

impl HttpPortfolioBackend {
    pub fn new(
        base_url: &str,
        projects_path: &str,
        experiences_path: &str,
        timeout: Duration
    ) -> Result<Self, BackendError> {
        // A trailing slash keeps the last base segment when joining relative paths.
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{}/", base_url)
        };
        let base = Url::parse(&normalized).map_err(|e|
            BackendError::InvalidUrl(base_url.to_string(), e)
        )?;
        let join = |path: &str| {
            base
                .join(path.trim_start_matches('/'))
                .map_err(|e| BackendError::InvalidUrl(format!("{}{}", normalized, path), e))
        };
        let projects_url = join(projects_path)?;
        let experiences_url = join(experiences_path)?;

        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::Request(base_url.to_string(), e))?;

        Ok(Self { http, projects_url, experiences_url })
    }

    pub fn projects_url(&self) -> &Url {
        &self.projects_url
    }

    pub fn experiences_url(&self) -> &Url {
        &self.experiences_url
    }

    async fn fetch_list<T: DeserializeOwned>(
        &self,
        url: &Url,
        wrapper_key: &str
    ) -> Result<Vec<T>, BackendError> {
        let target = url.to_string();
        let resp = self.http
            .get(url.clone())
            .send().await
            .map_err(|e| BackendError::Request(target.clone(), e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(BackendError::Status(target, status));
        }

        let body: JsonValue = resp.json().await.map_err(|e| BackendError::Request(target.clone(), e))?;
        parse_listing(body, wrapper_key).map_err(|msg| BackendError::Payload(target, msg))
    }
}

#[async_trait]
impl PortfolioBackend for HttpPortfolioBackend {
    async fn fetch_projects(&self) -> Result<Vec<Project>, BackendError> {
        self.fetch_list(&self.projects_url, "projects").await
    }

    async fn fetch_experiences(&self) -> Result<Vec<Experience>, BackendError> {
        self.fetch_list(&self.experiences_url, "experiences").await
    }
}

/// Accepts a bare array or an object wrapping the array under `wrapper_key`.
/// Items that do not deserialize are skipped.
pub fn parse_listing<T: DeserializeOwned>(
    body: JsonValue,
    wrapper_key: &str
) -> Result<Vec<T>, String> {
    let items = match body {
        JsonValue::Array(items) => items,
        JsonValue::Object(mut obj) =>
            match obj.remove(wrapper_key) {
                Some(JsonValue::Array(items)) => items,
                Some(_) => {
                    return Err(format!("'{}' is not an array", wrapper_key));
                }
                None => {
                    return Err(format!("expected an array or an object with '{}'", wrapper_key));
                }
            }
        other => {
            return Err(format!("expected an array, got {}", json_kind(&other)));
        }
    };

    let total = items.len();
    let parsed: Vec<T> = items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<T>(item) {
            Ok(v) => Some(v),
            Err(e) => {
                debug!("Skipping malformed {} entry: {}", wrapper_key, e);
                None
            }
        })
        .collect();

    if parsed.len() < total {
        warn!("Kept {}/{} {} entries; the rest were malformed", parsed.len(), total, wrapper_key);
    }
    Ok(parsed)
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "an array",
        JsonValue::Object(_) => "an object",
    }
}

/// Reads projects and experiences concurrently. The two reads succeed or fail
/// together: if either fails the context is empty and `from_backend` is false.
pub async fn fetch_grounding_context(backend: &dyn PortfolioBackend) -> GroundingContext {
    let (projects, experiences) = tokio::join!(backend.fetch_projects(), backend.fetch_experiences());

    match (projects, experiences) {
        (Ok(projects), Ok(experiences)) =>
            GroundingContext { projects, experiences, from_backend: true },
        (projects, experiences) => {
            for e in [projects.err(), experiences.err()].into_iter().flatten() {
                warn!("Portfolio listing unavailable, continuing without grounding: {}", e);
            }
            GroundingContext::default()
        }
    }
}

pub fn initialize_backend(args: &Args) -> Result<Option<Arc<dyn PortfolioBackend>>, BackendError> {
    match args.backend_url.as_deref().map(str::trim) {
        Some(url) if !url.is_empty() => {
            let backend = HttpPortfolioBackend::new(
                url,
                &args.projects_path,
                &args.experiences_path,
                Duration::from_secs(args.backend_timeout_secs)
            )?;
            info!(
                "Portfolio backend configured: projects={}, experiences={}",
                backend.projects_url(),
                backend.experiences_url()
            );
            Ok(Some(Arc::new(backend)))
        }
        _ => {
            info!("No portfolio backend configured; prompts will carry no grounding context.");
            Ok(None)
        }
    }
}
